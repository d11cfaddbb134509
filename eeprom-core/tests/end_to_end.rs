//! Integration tests driving [`eeprom_core::Store`] against real temp-file-
//! backed regions, exercising the scenarios in the project's testable
//! properties: fresh-init, round-trip across reopen, capacity exhaustion,
//! grouped keys, and forced reinitialization.

use eeprom_core::{EepromError, Store};
use tempfile::tempdir;

#[test]
fn fresh_region_opens_as_empty_firmux_tlv() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("eeprom.bin");
    let mut store = Store::open(&path, Some(4096)).unwrap();

    assert!(store.list().unwrap().contains(&"PRODUCT_ID".to_string()));
    assert_eq!(store.print(Some("PRODUCT_ID"), Some("@/dev/null")).unwrap(), 1);
}

#[test]
fn scalar_property_survives_a_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("eeprom.bin");

    {
        let mut store = Store::open(&path, Some(4096)).unwrap();
        store.store("SERIAL_NO", "SN-0042").unwrap();
        store.close().unwrap();
    }

    let mut store = Store::open(&path, None).unwrap();
    let dest = dir.path().join("serial.txt");
    store.print(Some("SERIAL_NO"), Some(&format!("@{}", dest.display()))).unwrap();
    assert_eq!(std::fs::read(&dest).unwrap(), b"SN-0042");
}

#[test]
fn mac_group_resolves_distinct_tags_to_distinct_slots() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("eeprom.bin");
    let mut store = Store::open(&path, Some(4096)).unwrap();

    store.store("MAC_ADDR_eth0", "aa:bb:cc:dd:ee:ff").unwrap();
    store.store("MAC_ADDR_wlan0", "11:22:33:44:55:66").unwrap();

    let eth0 = dir.path().join("eth0.txt");
    let wlan0 = dir.path().join("wlan0.txt");
    store.print(Some("MAC_ADDR_eth0"), Some(&format!("@{}", eth0.display()))).unwrap();
    store.print(Some("MAC_ADDR_wlan0"), Some(&format!("@{}", wlan0.display()))).unwrap();

    assert_eq!(std::fs::read_to_string(&eth0).unwrap(), "aa:bb:cc:dd:ee:ff");
    assert_eq!(std::fs::read_to_string(&wlan0).unwrap(), "11:22:33:44:55:66");
}

#[test]
fn updating_a_property_reclaims_the_old_slot() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("eeprom.bin");
    let mut store = Store::open(&path, Some(4096)).unwrap();

    store.store("PCB_NAME", "a very long pcb name indeed").unwrap();
    store.store("PCB_NAME", "short").unwrap();

    let dest = dir.path().join("pcb_name.txt");
    store.print(Some("PCB_NAME"), Some(&format!("@{}", dest.display()))).unwrap();
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "short");
}

#[test]
fn running_out_of_space_reports_capacity_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("eeprom.bin");
    // A region barely bigger than the header leaves no room for any record.
    let mut store = Store::open(&path, Some(20)).unwrap();

    let err = store.store("PRODUCT_NAME", "this value is far too long to fit").unwrap_err();
    assert!(matches!(err, EepromError::Capacity { .. }));
}

#[test]
fn force_reinitializes_and_discards_prior_state() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("eeprom.bin");
    let mut store = Store::open(&path, Some(4096)).unwrap();

    store.store("PRODUCT_ID", "OLD-VALUE").unwrap();
    store.force_reinit().unwrap();

    assert_eq!(store.print(Some("PRODUCT_ID"), Some("@/dev/null")).unwrap(), 1);
}

#[test]
fn unknown_key_is_a_schema_error_not_a_panic() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("eeprom.bin");
    let mut store = Store::open(&path, Some(4096)).unwrap();

    let err = store.check("NOT_A_REAL_PROPERTY", Some("x")).unwrap_err();
    assert!(matches!(err, EepromError::Schema { .. }));
}

#[test]
fn value_from_at_file_is_read_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("eeprom.bin");
    let input = dir.path().join("input.txt");
    std::fs::write(&input, b"FROM-FILE").unwrap();

    let mut store = Store::open(&path, Some(4096)).unwrap();
    store.store("PRODUCT_ID", &format!("@{}", input.display())).unwrap();

    let dest = dir.path().join("out.txt");
    store.print(Some("PRODUCT_ID"), Some(&format!("@{}", dest.display()))).unwrap();
    assert_eq!(std::fs::read(&dest).unwrap(), b"FROM-FILE");
}
