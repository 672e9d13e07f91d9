//! Offline ranking quality and business metrics.
//!
//! Ranking metrics take the set of relevant ids and the retrieved ids in rank
//! order, and all return values in `[0, 1]`.

use std::collections::{BTreeMap, HashSet};

pub const DEFAULT_K_VALUES: [usize; 4] = [1, 3, 5, 10];

fn relevant_in_top_k(relevant: &HashSet<String>, retrieved: &[String], k: usize) -> usize {
    let top: HashSet<&String> = retrieved.iter().take(k).collect();
    top.into_iter().filter(|item| relevant.contains(*item)).count()
}

pub fn precision_at_k(relevant: &HashSet<String>, retrieved: &[String], k: usize) -> f64 {
    if k == 0 || retrieved.is_empty() {
        return 0.0;
    }
    relevant_in_top_k(relevant, retrieved, k) as f64 / k.min(retrieved.len()) as f64
}

pub fn recall_at_k(relevant: &HashSet<String>, retrieved: &[String], k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    relevant_in_top_k(relevant, retrieved, k) as f64 / relevant.len() as f64
}

/// Binary-gain NDCG with `1 / log2(rank + 1)` discounting.
pub fn ndcg_at_k(relevant: &HashSet<String>, retrieved: &[String], k: usize) -> f64 {
    if k == 0 || retrieved.is_empty() {
        return 0.0;
    }
    let discount = |i: usize| 1.0 / ((i + 2) as f64).log2();
    let dcg: f64 = retrieved
        .iter()
        .take(k)
        .enumerate()
        .filter(|(_, item)| relevant.contains(*item))
        .map(|(i, _)| discount(i))
        .sum();
    let idcg: f64 = (0..k.min(relevant.len())).map(discount).sum();
    if idcg > 0.0 {
        dcg / idcg
    } else {
        0.0
    }
}

/// Reciprocal rank of the first relevant item.
pub fn mean_reciprocal_rank(relevant: &HashSet<String>, retrieved: &[String]) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    retrieved
        .iter()
        .position(|item| relevant.contains(item))
        .map(|i| 1.0 / (i + 1) as f64)
        .unwrap_or(0.0)
}

/// `precision_at_{k}`, `recall_at_{k}` and `ndcg_at_{k}` for each k, plus `mrr`.
pub fn all_metrics(relevant: &HashSet<String>, retrieved: &[String], k_values: &[usize]) -> BTreeMap<String, f64> {
    let mut out = BTreeMap::new();
    for &k in k_values {
        out.insert(format!("precision_at_{k}"), precision_at_k(relevant, retrieved, k));
        out.insert(format!("recall_at_{k}"), recall_at_k(relevant, retrieved, k));
        out.insert(format!("ndcg_at_{k}"), ndcg_at_k(relevant, retrieved, k));
    }
    out.insert("mrr".to_string(), mean_reciprocal_rank(relevant, retrieved));
    out
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

pub fn click_through_rate(clicks: u64, impressions: u64) -> f64 {
    ratio(clicks as f64, impressions as f64)
}

pub fn conversion_rate(purchases: u64, searches: u64) -> f64 {
    ratio(purchases as f64, searches as f64)
}

pub fn revenue_per_search(revenue: f64, searches: u64) -> f64 {
    ratio(revenue, searches as f64)
}

pub fn average_order_value(revenue: f64, orders: u64) -> f64 {
    ratio(revenue, orders as f64)
}
