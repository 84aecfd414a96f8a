/// Item list loading.
///
/// Accepts a JSON array (of plain names or of full item records) or plain
/// text with one name per line. When records carry no explicit ids, items
/// get 1-based positions as ids — stable as long as the file order is.
use std::path::Path;

use duelrank_core::Item;
use serde::Deserialize;

use crate::bail;

#[derive(Deserialize)]
struct ItemRecord {
    id: Option<i64>,
    name: String,
    #[serde(default)]
    image: Option<String>,
}

/// Parse a string as a JSON array (of strings or item records) or plain
/// text (one item name per line).
pub fn parse_items_from_str(content: &str) -> Vec<Item> {
    let trimmed = content.trim();
    if trimmed.starts_with('[') {
        if let Ok(names) = serde_json::from_str::<Vec<String>>(trimmed) {
            return from_names(names.into_iter().filter(|s| !s.trim().is_empty()));
        }
        let records: Vec<ItemRecord> = serde_json::from_str(trimmed)
            .unwrap_or_else(|e| bail(format!("File looks like JSON but failed to parse: {e}")));
        return from_records(records);
    }
    // Plain text, one item per line
    from_names(
        trimmed
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|s| !s.is_empty()),
    )
}

pub fn load_items_file(path: &Path) -> Vec<Item> {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| bail(format!("Failed to read items file {}: {e}", path.display())));
    let items = parse_items_from_str(&content);
    if items.is_empty() {
        bail(format!("No items found in {}", path.display()));
    }
    items
}

fn from_names(names: impl Iterator<Item = String>) -> Vec<Item> {
    names
        .enumerate()
        .map(|(i, name)| Item::new(i as i64 + 1, name))
        .collect()
}

fn from_records(records: Vec<ItemRecord>) -> Vec<Item> {
    // Explicit ids are honored only when every record has one; a mix would
    // make the positional fallback ambiguous.
    let all_have_ids = records.iter().all(|r| r.id.is_some());
    records
        .into_iter()
        .enumerate()
        .map(|(i, r)| Item {
            id: if all_have_ids { r.id.unwrap_or_default() } else { i as i64 + 1 },
            name: r.name,
            image_ref: r.image,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_lines() {
        let items = parse_items_from_str("Asuka\n  Rei \n\nMisato\n");
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].id, 1);
        assert_eq!(items[1].name, "Rei");
    }

    #[test]
    fn test_parse_json_string_array() {
        let items = parse_items_from_str(r#"["Asuka", "Rei"]"#);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].id, 2);
    }

    #[test]
    fn test_parse_json_records_with_ids() {
        let items = parse_items_from_str(
            r#"[{"id": 10, "name": "Asuka", "image": "asuka.png"}, {"id": 20, "name": "Rei"}]"#,
        );
        assert_eq!(items[0].id, 10);
        assert_eq!(items[0].image_ref.as_deref(), Some("asuka.png"));
        assert_eq!(items[1].id, 20);
        assert!(items[1].image_ref.is_none());
    }

    #[test]
    fn test_parse_json_records_without_ids_get_positions() {
        let items = parse_items_from_str(r#"[{"name": "Asuka"}, {"id": 5, "name": "Rei"}]"#);
        // Mixed ids fall back to positions for everyone.
        assert_eq!(items[0].id, 1);
        assert_eq!(items[1].id, 2);
    }
}
