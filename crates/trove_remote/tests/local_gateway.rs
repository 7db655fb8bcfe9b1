//! Gateway contract exercised through a boxed trait object.

use std::fs;
use tempfile::TempDir;
use trove_remote::{LocalDirGateway, RemoteError, TransferGateway};

fn gateway(root: &std::path::Path) -> Box<dyn TransferGateway> {
    Box::new(LocalDirGateway::new(root))
}

#[test]
fn test_push_to_several_folders_then_list() {
    let tmp = TempDir::new().unwrap();
    let remote = gateway(&tmp.path().join("share"));
    let doc = tmp.path().join("inventory.json");
    fs::write(&doc, "[]").unwrap();

    for folder in ["/site-a/in", "/site-b/in"] {
        remote.put(&doc, folder, "inventory.json").unwrap();
    }

    let listing = remote.list("/site-a/in").unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].name, "inventory.json");
    assert_eq!(listing[0].size, Some(2));

    let json = serde_json::to_value(&listing[0]).unwrap();
    assert_eq!(json["name"], "inventory.json");
    assert!(json.get("mtime").is_some());
}

#[test]
fn test_put_missing_local_file() {
    let tmp = TempDir::new().unwrap();
    let remote = gateway(tmp.path());
    let err = remote.put(&tmp.path().join("nope.json"), "/in", "nope.json").unwrap_err();
    assert!(matches!(err, RemoteError::Local { .. }));
    assert!(!remote.exists("/in", "nope.json").unwrap());
}

#[test]
fn test_list_missing_folder_is_error_with_destination() {
    let tmp = TempDir::new().unwrap();
    let remote = gateway(tmp.path());
    let err = remote.list("/not-there").unwrap_err();
    assert!(err.destination().unwrap().starts_with("file://"));
}
