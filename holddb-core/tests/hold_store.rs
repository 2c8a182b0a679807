//! Integration tests for the hold surface
//!
//! Write paths, transactions, codecs and configuration files.

use holddb_core::{
    impl_record, key, where_, Codec, Hold, HoldConfig, HoldError, LogFormat, ReadTx, Record,
};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Item {
    sku: String,
    stock: u16,
    price: f64,
}

impl_record!(Item, bucket = "Item",
    fields { "Sku" => sku, "Stock" => stock, "Price" => price },
    indexes ["Sku", "Stock"]);

fn item(sku: &str, stock: u16, price: f64) -> Item {
    Item {
        sku: sku.to_string(),
        stock,
        price,
    }
}

fn json_hold() -> Hold {
    let mut config = HoldConfig::default();
    config.store.codec = Codec::Json;
    config.store.scan_batch_size = 2;
    Hold::open(config).unwrap()
}

#[test]
fn test_write_paths_keep_indexes_in_step() {
    let hold = json_hold();
    hold.insert("apple", &item("A-1", 5, 1.5)).unwrap();
    hold.insert("pear", &item("P-1", 0, 2.0)).unwrap();
    hold.upsert("plum", &item("L-1", 5, 0.75)).unwrap();

    let in_stock = where_("Stock").unwrap().gt(0u16);
    assert_eq!(hold.count::<Item>(Some(&in_stock)).unwrap(), 2);

    hold.update("apple", &item("A-1", 0, 1.5)).unwrap();
    hold.upsert("pear", &item("P-1", 3, 2.0)).unwrap();

    let found: Vec<Item> = hold.find(Some(&in_stock)).unwrap();
    assert_eq!(found, vec![item("P-1", 3, 2.0), item("L-1", 5, 0.75)]);

    hold.delete::<Item, _>("plum").unwrap();
    assert_eq!(hold.count::<Item>(Some(&in_stock)).unwrap(), 1);
}

#[test]
fn test_string_keys_under_json_codec() {
    let hold = json_hold();
    hold.insert("apple", &item("A-1", 5, 1.5)).unwrap();
    hold.insert("banana", &item("B-1", 7, 0.5)).unwrap();

    let by_key = where_(key()).unwrap().eq("banana");
    assert_eq!(hold.find_one::<Item>(Some(&by_key)).unwrap(), Some(item("B-1", 7, 0.5)));

    let by_pattern = where_(key())
        .unwrap()
        .matches(regex::Regex::new("^a").unwrap());
    assert_eq!(hold.count::<Item>(Some(&by_pattern)).unwrap(), 1);
}

#[test]
fn test_duplicate_and_missing_keys() {
    let hold = Hold::default();
    hold.insert(&10u32, &item("X", 1, 1.0)).unwrap();

    assert!(matches!(
        hold.insert(&10u32, &item("Y", 1, 1.0)),
        Err(HoldError::KeyExists)
    ));
    assert!(matches!(
        hold.update(&11u32, &item("Y", 1, 1.0)),
        Err(HoldError::NotFound)
    ));
    assert!(matches!(
        hold.delete::<Item, _>(&11u32),
        Err(HoldError::NotFound)
    ));
    assert!(hold.get::<Item, _>(&11u32).unwrap().is_none());
}

#[test]
fn test_caller_transaction_commits_all_or_nothing() {
    let hold = Hold::default();

    let mut tx = hold.begin_write();
    hold.tx_insert(&mut tx, &1u8, &item("A", 1, 1.0)).unwrap();
    hold.tx_insert(&mut tx, &2u8, &item("B", 2, 1.0)).unwrap();
    assert_eq!(hold.tx_count::<Item, _>(&tx, None).unwrap(), 2);
    tx.rollback();
    assert_eq!(hold.count::<Item>(None).unwrap(), 0);

    let mut tx = hold.begin_write();
    hold.tx_insert(&mut tx, &1u8, &item("A", 1, 1.0)).unwrap();
    hold.tx_upsert(&mut tx, &2u8, &item("B", 2, 1.0)).unwrap();
    let removed = hold
        .tx_delete_matching::<Item, _>(&mut tx, Some(&where_("Sku").unwrap().eq("A")))
        .unwrap();
    assert_eq!(removed, 1);
    tx.commit();

    let rest: Vec<Item> = hold.find(None).unwrap();
    assert_eq!(rest, vec![item("B", 2, 1.0)]);
}

#[test]
fn test_read_snapshot_is_isolated_from_later_writes() {
    let hold = Hold::default();
    hold.insert(&1u8, &item("A", 1, 1.0)).unwrap();

    let snapshot = hold.begin_read();
    hold.insert(&2u8, &item("B", 1, 1.0)).unwrap();

    assert_eq!(hold.tx_find::<Item, _>(&snapshot, None).unwrap().len(), 1);
    assert_eq!(hold.find::<Item>(None).unwrap().len(), 2);
    assert!(snapshot
        .get(Item::bucket(), &Codec::Bincode.encode(&2u8).unwrap())
        .unwrap()
        .is_none());
}

#[test]
fn test_open_from_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("holddb.toml");
    std::fs::write(
        &config_path,
        "[store]\nscan_batch_size = 3\ncodec = \"json\"\n\n[logging]\nformat = \"json\"\n",
    )
    .unwrap();

    let config = HoldConfig::load(&config_path).unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);

    let hold = Hold::open(config).unwrap();
    assert_eq!(hold.config().store.scan_batch_size, 3);
    assert_eq!(hold.executor().codec(), Codec::Json);

    for i in 0..10u32 {
        hold.insert(&i, &item(&format!("S-{}", i), (i % 3) as u16, 1.0)).unwrap();
    }
    let query = where_("Stock").unwrap().eq(0u16);
    assert_eq!(hold.count::<Item>(Some(&query)).unwrap(), 4);
}
