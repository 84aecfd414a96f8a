/// Output formatting: terminal tables and JSON.
use std::collections::HashMap;

use duelrank_core::{DerivedRanking, GlobalEntry};
use serde::Serialize;

#[derive(Serialize)]
struct JsonRankedItem {
    position: usize,
    name: String,
    score: f64,
    dominated: usize,
    compared: usize,
}

#[derive(Serialize)]
struct JsonRanking {
    items: Vec<JsonRankedItem>,
    approximate: bool,
}

/// Print a session ranking as a formatted terminal table.
pub fn print_ranking_table(ranking: &DerivedRanking) {
    let name_width = ranking
        .entries
        .iter()
        .map(|e| e.name.len())
        .max()
        .unwrap_or(4)
        .max(4); // at least "Item"

    println!("  # | {:<name_width$} |  Score | Beats | Compared", "Item");
    println!("----|-{}-|--------|-------|---------", "-".repeat(name_width));

    for e in &ranking.entries {
        println!(
            "{:>3} | {:<name_width$} | {:>6.3} | {:>5} | {:>8}",
            e.position, e.name, e.score, e.dominated, e.compared,
        );
    }

    if ranking.approximate {
        println!("\nNote: contradictory answers were resolved in favor of the most recent ones.");
    }
}

/// Print a session ranking as JSON.
pub fn print_ranking_json(ranking: &DerivedRanking) {
    let items = ranking
        .entries
        .iter()
        .map(|e| JsonRankedItem {
            position: e.position,
            name: e.name.clone(),
            score: e.score,
            dominated: e.dominated,
            compared: e.compared,
        })
        .collect();
    let output = JsonRanking { items, approximate: ranking.approximate };
    println!("{}", serde_json::to_string_pretty(&output).unwrap());
}

#[derive(Serialize)]
struct JsonGlobalItem {
    position: usize,
    name: String,
    cumulative_score: f64,
    cumulative_comparisons: u64,
}

/// Print the global ranking as a formatted terminal table.
pub fn print_global_table(entries: &[GlobalEntry], names: &HashMap<i64, String>) {
    let display = |id: i64| names.get(&id).cloned().unwrap_or_else(|| format!("item {id}"));
    let name_width = entries
        .iter()
        .map(|e| display(e.item_id).len())
        .max()
        .unwrap_or(4)
        .max(4);

    println!("  # | {:<name_width$} |   Score | Comparisons", "Item");
    println!("----|-{}-|---------|------------", "-".repeat(name_width));

    for (i, e) in entries.iter().enumerate() {
        println!(
            "{:>3} | {:<name_width$} | {:>7.3} | {:>11}",
            i + 1,
            display(e.item_id),
            e.cumulative_score,
            e.cumulative_comparisons,
        );
    }
}

/// Print the global ranking as JSON.
pub fn print_global_json(entries: &[GlobalEntry], names: &HashMap<i64, String>) {
    let items: Vec<JsonGlobalItem> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| JsonGlobalItem {
            position: i + 1,
            name: names.get(&e.item_id).cloned().unwrap_or_else(|| format!("item {}", e.item_id)),
            cumulative_score: e.cumulative_score,
            cumulative_comparisons: e.cumulative_comparisons,
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&items).unwrap());
}
