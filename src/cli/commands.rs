//! CLI command implementations

use anyhow::Result;
use dashmap::DashSet;
use dialoguer::{Input, Select};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::analyzer::{format_wallet_report, truncate_address, WalletAnalyzer};
use crate::config::Config;
use crate::holders::{format_report, HolderAnalyzer};
use crate::import::{import_holders, validate_csv_format};
use crate::rpc::{RpcClient, SolanaRpc};
use crate::stream::{BuyEvent, MonitorMode, TransactionMonitor};

/// Decode a base58 address and check it is 32 bytes
pub fn parse_address(address: &str) -> Result<String> {
    let address = address.trim();
    if address.is_empty() {
        anyhow::bail!("Address is required");
    }

    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| anyhow::anyhow!("Invalid address {}: {}", address, e))?;
    if bytes.len() != 32 {
        anyhow::bail!(
            "Invalid address {}: decodes to {} bytes, expected 32",
            address,
            bytes.len()
        );
    }

    Ok(address.to_string())
}

fn connect(config: &Config) -> Result<Arc<dyn SolanaRpc>> {
    let client = RpcClient::new(config.rpc.endpoint.clone(), config.rpc.timeout())
        .map_err(|e| anyhow::anyhow!("Failed to create RPC client: {}", e))?;
    Ok(Arc::new(client))
}

fn prompt_token() -> Result<String> {
    println!("Enter the token address to monitor");
    println!("(Example: EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v for USDC)");

    let token: String = Input::new()
        .with_prompt("Token address")
        .validate_with(|input: &String| parse_address(input).map(|_| ()).map_err(|e| e.to_string()))
        .interact_text()?;
    Ok(token)
}

fn prompt_mode() -> Result<MonitorMode> {
    let choice = Select::new()
        .with_prompt("Monitoring mode")
        .items(&["WebSocket (real-time)", "Polling (more requests)"])
        .default(0)
        .interact()?;
    Ok(if choice == 1 {
        MonitorMode::Poll
    } else {
        MonitorMode::Push
    })
}

/// Watch a token and classify every new buyer
pub async fn monitor(config: &Config, token: Option<String>, poll: bool) -> Result<()> {
    let (token, mode) = match token {
        Some(token) => (
            parse_address(&token)?,
            if poll { MonitorMode::Poll } else { MonitorMode::Push },
        ),
        None => {
            let token = parse_address(&prompt_token()?)?;
            let mode = if poll { MonitorMode::Poll } else { prompt_mode()? };
            (token, mode)
        }
    };

    println!("\n=== MONITORING {} ===\n", token);
    println!(
        "Mode: {}",
        match mode {
            MonitorMode::Push => "WebSocket",
            MonitorMode::Poll => "Polling",
        }
    );
    println!(
        "Threshold: {} tokens = OLD wallet",
        config.analyzer.old_wallet_threshold
    );
    println!("\nWaiting for new transactions... (Ctrl-C to stop)\n");

    let rpc = connect(config)?;
    let analyzer = Arc::new(WalletAnalyzer::new(rpc.clone(), config.analyzer.clone()));

    let (mut monitor, mut buys) = TransactionMonitor::new(
        rpc.clone(),
        token.clone(),
        config.rpc.ws_endpoint.clone(),
        config.monitor.clone(),
    );
    let stop = monitor.stop_handle();
    let monitor_task = tokio::spawn(async move { monitor.run(mode).await });

    let mut analyses = dispatch_buys(&mut buys, analyzer, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;

    stop.cancel();
    // Unblocks a monitor waiting on a full channel
    drop(buys);
    match monitor_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Monitor exited with error: {}", e),
        Err(e) => error!("Monitor task failed: {}", e),
    }

    while let Some(joined) = analyses.join_next().await {
        log_analysis_exit(joined);
    }

    println!("\nMonitoring stopped.");
    Ok(())
}

/// Analyse every buy until the feed closes or `shutdown` resolves.
///
/// Finished analyses are reaped as they complete; the ones still running
/// are handed back.
async fn dispatch_buys(
    buys: &mut mpsc::Receiver<BuyEvent>,
    analyzer: Arc<WalletAnalyzer>,
    shutdown: impl Future<Output = ()>,
) -> JoinSet<()> {
    // Wallets with an analysis running; a second buy from the same wallet is skipped
    let in_flight: Arc<DashSet<String>> = Arc::new(DashSet::new());
    let mut analyses = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            Some(joined) = analyses.join_next(), if !analyses.is_empty() => {
                log_analysis_exit(joined);
            }
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
            event = buys.recv() => match event {
                Some(buy) => spawn_analysis(&mut analyses, &analyzer, &in_flight, buy),
                None => break,
            },
        }
    }

    analyses
}

fn log_analysis_exit(joined: std::result::Result<(), JoinError>) {
    if let Err(e) = joined {
        warn!("Analysis task failed: {}", e);
    }
}

fn spawn_analysis(
    tasks: &mut JoinSet<()>,
    analyzer: &Arc<WalletAnalyzer>,
    in_flight: &Arc<DashSet<String>>,
    buy: BuyEvent,
) {
    if !in_flight.insert(buy.wallet.clone()) {
        debug!(wallet = %buy.wallet, "Analysis already running, skipping");
        return;
    }

    let analyzer = analyzer.clone();
    let in_flight = in_flight.clone();
    tasks.spawn(async move {
        info!(
            wallet = %buy.wallet,
            signature = %buy.signature,
            "Analyzing wallet {}",
            truncate_address(&buy.wallet, 20, 0)
        );

        match analyzer.analyze(&buy.wallet, Some(&buy.token)).await {
            Ok(record) => println!("{}", format_wallet_report(&record)),
            Err(e) => error!(wallet = %buy.wallet, "Error analyzing wallet: {}", e),
        }

        in_flight.remove(&buy.wallet);
    });
}

/// One-off classification of a single wallet
pub async fn analyze(config: &Config, wallet: &str, exclude: Option<&str>) -> Result<()> {
    let wallet = parse_address(wallet)?;
    let exclude = exclude.map(parse_address).transpose()?;

    let analyzer = WalletAnalyzer::new(connect(config)?, config.analyzer.clone());
    let record = analyzer.analyze(&wallet, exclude.as_deref()).await?;

    println!("{}", format_wallet_report(&record));
    Ok(())
}

/// Risk report for a token's largest holders
pub async fn holders(
    config: &Config,
    token: &str,
    limit: Option<usize>,
    similarity: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let token = parse_address(token)?;
    let analyzer = HolderAnalyzer::new(connect(config)?, config.holders.clone())
        .with_retry(config.rpc.max_retries, Duration::from_millis(500));
    let limit = limit.unwrap_or_else(|| analyzer.default_limit());

    let mut holders = analyzer.get_holders(&token, limit).await?;
    let grouping = if similarity {
        Some(analyzer.analyze_similarities(&mut holders, &token).await)
    } else {
        None
    };

    let report = format_report(&holders, &token, grouping.as_ref());
    println!("{}", report);

    if let Some(path) = output {
        save_report(&path, &report)?;
    }
    Ok(())
}

/// Risk report from a holder CSV export
pub async fn import(
    config: &Config,
    path: &Path,
    token: Option<&str>,
    similarity: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let token = token.map(parse_address).transpose()?;
    if similarity && token.is_none() {
        anyhow::bail!("--token is required with --similarity");
    }

    let check = validate_csv_format(path)?;
    if !check.valid {
        anyhow::bail!(
            "{} is missing an address or balance column (found: {})",
            path.display(),
            check.headers.join(", ")
        );
    }
    debug!(rows = check.row_count, delimiter = ?check.delimiter, "CSV looks valid");

    let mut imported = import_holders(path, token.as_deref())?;
    println!(
        "Imported {} holders from {} at {}",
        imported.total_holders(),
        path.display(),
        imported.imported_at.format("%Y-%m-%d %H:%M:%S")
    );

    let grouping = match token.as_deref() {
        Some(token) if similarity => {
            let analyzer = HolderAnalyzer::new(connect(config)?, config.holders.clone());
            Some(analyzer.analyze_similarities(&mut imported.holders, token).await)
        }
        _ => None,
    };

    let label = imported.token_mint.as_deref().unwrap_or("(imported)");
    let report = format_report(&imported.holders, label, grouping.as_ref());
    println!("{}", report);

    if let Some(path) = output {
        save_report(&path, &report)?;
    }
    Ok(())
}

fn save_report(path: &Path, report: &str) -> Result<()> {
    std::fs::write(path, report)
        .map_err(|e| anyhow::anyhow!("Failed to write report to {}: {}", path.display(), e))?;
    println!("\nReport saved to {}", path.display());
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
