//! Wallet Clustering - Group holders by overlapping trading history
//!
//! Two holders are linked when their recent trading sets share at least
//! `min_common` mints. Groups are the connected components of that graph,
//! so membership is transitive: A-B and B-C put all three together even if
//! A and C share nothing directly.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use super::types::Holder;

/// Two wallets with overlapping trading history
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SimilarityEdge {
    /// Unordered pair, stored in discovery order
    pub wallets: (String, String),
    pub shared: BTreeSet<String>,
}

impl SimilarityEdge {
    pub fn overlap(&self) -> usize {
        self.shared.len()
    }

    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.wallets.0 == a && self.wallets.1 == b) || (self.wallets.0 == b && self.wallets.1 == a)
    }
}

/// Connected component of the similarity graph (two or more wallets)
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WalletGroup {
    pub wallets: Vec<String>,
    /// Mints every member traded
    pub common_tokens: BTreeSet<String>,
}

impl WalletGroup {
    pub fn wallet_count(&self) -> usize {
        self.wallets.len()
    }

    pub fn common_token_count(&self) -> usize {
        self.common_tokens.len()
    }

    pub fn contains(&self, wallet: &str) -> bool {
        self.wallets.iter().any(|w| w == wallet)
    }
}

/// Output of a similarity pass over a holder set
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupingResult {
    pub holder_count: usize,
    pub edges: Vec<SimilarityEdge>,
    /// Largest first
    pub groups: Vec<WalletGroup>,
}

impl GroupingResult {
    pub fn total_groups(&self) -> usize {
        self.groups.len()
    }

    /// Group a wallet belongs to, if any
    pub fn group_for(&self, wallet: &str) -> Option<&WalletGroup> {
        self.groups.iter().find(|g| g.contains(wallet))
    }
}

/// Every unordered pair of holders with non-empty histories sharing at
/// least `min_common` mints
pub fn similarity_edges(holders: &[Holder], min_common: usize) -> Vec<SimilarityEdge> {
    let mut edges = Vec::new();
    let mut linked: HashSet<(&str, &str)> = HashSet::new();

    for (i, a) in holders.iter().enumerate() {
        if a.traded_tokens.is_empty() {
            continue;
        }

        for b in holders.iter().skip(i + 1) {
            if b.traded_tokens.is_empty() || a.owner == b.owner {
                continue;
            }

            let key = if a.owner <= b.owner {
                (a.owner.as_str(), b.owner.as_str())
            } else {
                (b.owner.as_str(), a.owner.as_str())
            };
            if linked.contains(&key) {
                continue;
            }

            let shared: BTreeSet<String> = a
                .traded_tokens
                .intersection(&b.traded_tokens)
                .cloned()
                .collect();

            if shared.len() >= min_common {
                linked.insert(key);
                edges.push(SimilarityEdge {
                    wallets: (a.owner.clone(), b.owner.clone()),
                    shared,
                });
            }
        }
    }

    edges
}

/// Connected components over `edges`, sizes two and up, largest first.
/// Ties keep first-discovery order.
pub fn group_wallets(holders: &[Holder], edges: &[SimilarityEdge]) -> Vec<WalletGroup> {
    let mut order: Vec<&str> = Vec::new();
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();

    for edge in edges {
        let (a, b) = (edge.wallets.0.as_str(), edge.wallets.1.as_str());
        for (from, to) in [(a, b), (b, a)] {
            let neighbours = adjacency.entry(from).or_insert_with(|| {
                order.push(from);
                Vec::new()
            });
            if !neighbours.contains(&to) {
                neighbours.push(to);
            }
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut groups = Vec::new();

    for start in order {
        if visited.contains(start) {
            continue;
        }

        // BFS
        let mut members: Vec<String> = Vec::new();
        let mut queue = VecDeque::from([start]);
        visited.insert(start);

        while let Some(current) = queue.pop_front() {
            members.push(current.to_string());
            for &next in adjacency.get(current).into_iter().flatten() {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        if members.len() < 2 {
            continue;
        }

        let common_tokens = common_tokens(holders, &members);
        groups.push(WalletGroup {
            wallets: members,
            common_tokens,
        });
    }

    groups.sort_by(|a, b| b.wallet_count().cmp(&a.wallet_count()));
    groups
}

/// Intersection of the non-empty trading sets held by `members`
fn common_tokens(holders: &[Holder], members: &[String]) -> BTreeSet<String> {
    let mut sets = holders
        .iter()
        .filter(|h| members.contains(&h.owner) && !h.traded_tokens.is_empty())
        .map(|h| &h.traded_tokens);

    let Some(first) = sets.next() else {
        return BTreeSet::new();
    };

    sets.fold(first.clone(), |acc, set| {
        acc.intersection(set).cloned().collect()
    })
}

/// Build edges and groups in one pass
pub fn analyze_groups(holders: &[Holder], min_common: usize) -> GroupingResult {
    let edges = similarity_edges(holders, min_common);
    let groups = group_wallets(holders, &edges);

    GroupingResult {
        holder_count: holders.len(),
        edges,
        groups,
    }
}
