//! Unit tests for word list loading

use std::io::Write;
use tempfile::NamedTempFile;

use dict_builder::word::{load_word_list, parse_word_list, InputError, WorkItem};

#[test]
fn test_parse_skips_comments_and_blank_lines() {
    let items = parse_word_list("# header\n\ncasa|n\n  # indented comment\nagua\n\n");
    assert_eq!(items, vec![WorkItem::with_metadata("casa", "n"), WorkItem::new("agua")]);
}

#[test]
fn test_parse_trims_keys_and_metadata() {
    let items = parse_word_list("  hablar  |  v  \n\tperro\t\n");
    assert_eq!(items[0].key.as_str(), "hablar");
    assert_eq!(items[0].metadata, "v");
    assert_eq!(items[1].key.as_str(), "perro");
    assert!(items[1].metadata.is_empty());
}

#[test]
fn test_parse_preserves_order_and_drops_duplicates() {
    let items = parse_word_list("uno\ndos\nuno|n\ntres\ndos\n");
    let keys: Vec<&str> = items.iter().map(|i| i.key.as_str()).collect();
    assert_eq!(keys, vec!["uno", "dos", "tres"]);
    assert!(items[0].metadata.is_empty());
}

#[test]
fn test_load_from_disk() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "casa|n").unwrap();
    writeln!(file, "añadir|v").unwrap();
    writeln!(file, "xyz123").unwrap();

    let items = load_word_list(file.path()).unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[1].key.as_str(), "añadir");
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let result = load_word_list(&dir.path().join("missing.txt"));
    assert!(matches!(result, Err(InputError::NotFound(_))));
}

#[test]
fn test_load_empty_file() {
    let file = NamedTempFile::new().unwrap();
    assert!(load_word_list(file.path()).unwrap().is_empty());
}
