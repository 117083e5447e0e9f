//! End-to-end pipeline properties against a real temporary backup root.

use fwbackup::error::ErrorKind;
use fwbackup::models::{Dialect, UploadRequest};
use fwbackup::pipeline::IntakePipeline;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const TEN_MB: u64 = 10 << 20;

fn pipeline(tmp: &TempDir) -> IntakePipeline {
    IntakePipeline::new(TEN_MB, tmp.path().join("backup"))
}

fn upload(bytes: &[u8]) -> UploadRequest {
    UploadRequest::new("198.51.100.4", bytes.to_vec())
}

/// Every regular file under `dir`, recursively.
fn files_under(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    if !dir.exists() {
        return out;
    }
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            out.extend(files_under(&path));
        } else {
            out.push(path);
        }
    }
    out
}

#[test]
fn pfsense_scenario() {
    let tmp = TempDir::new().unwrap();
    let bytes = b"<pfsense><system><hostname>fw1</hostname><domain>example.com</domain></system></pfsense>";

    let receipt = pipeline(&tmp).submit(&upload(bytes)).unwrap();

    assert_eq!(receipt.dialect, Dialect::PfSense);
    assert_eq!(receipt.record.hostname, "fw1.example.com");

    let dir = tmp.path().join("backup").join("fw1.example.com");
    assert_eq!(receipt.record.path.parent(), Some(dir.as_path()));

    let name = receipt.record.path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("fw1.example.com-"), "{}", name);
    assert!(name.ends_with(".xml"), "{}", name);
    // fw1.example.com-YYYYMMDD-HHMMSS.xml
    assert_eq!(name.len(), "fw1.example.com-".len() + 15 + ".xml".len());

    assert_eq!(fs::read(&receipt.record.path).unwrap(), bytes);
}

#[test]
fn opnsense_scenario() {
    let tmp = TempDir::new().unwrap();
    let bytes = b"<opnsense><system><hostname>edge01</hostname></system></opnsense>";

    let receipt = pipeline(&tmp).submit(&upload(bytes)).unwrap();

    assert_eq!(receipt.dialect, Dialect::OpnSense);
    assert_eq!(receipt.record.hostname, "edge01");
    assert!(receipt
        .record
        .path
        .starts_with(tmp.path().join("backup").join("edge01")));
}

#[test]
fn junk_creates_nothing() {
    let tmp = TempDir::new().unwrap();

    let err = pipeline(&tmp).submit(&upload(b"<junk/>")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedDialect);
    assert!(!tmp.path().join("backup").exists());
}

#[test]
fn oversized_payload_is_rejected_before_decoding() {
    let tmp = TempDir::new().unwrap();
    // Valid-looking prefix; decoding would succeed if it were attempted.
    let mut bytes =
        b"<opnsense><system><hostname>edge01</hostname></system></opnsense>".to_vec();
    bytes.resize(15 << 20, b' ');

    let err = pipeline(&tmp).submit(&upload(&bytes)).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PayloadTooLarge);
    assert!(files_under(tmp.path()).is_empty());
}

#[test]
fn empty_hostname_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let p = pipeline(&tmp);

    for bytes in [
        &b"<pfsense><system><hostname></hostname><domain>example.com</domain></system></pfsense>"[..],
        &b"<opnsense><system><hostname/></system></opnsense>"[..],
    ] {
        let err = p.submit(&upload(bytes)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingHostname);
    }
    assert!(files_under(tmp.path()).is_empty());
}

#[test]
fn pfsense_empty_domain_keeps_bare_hostname() {
    let tmp = TempDir::new().unwrap();
    let bytes = b"<pfsense><system><hostname>fw2</hostname><domain></domain></system></pfsense>";

    let receipt = pipeline(&tmp).submit(&upload(bytes)).unwrap();
    assert_eq!(receipt.record.hostname, "fw2");
}

#[test]
fn traversal_hostname_stays_inside_root() {
    let tmp = TempDir::new().unwrap();
    let bytes = b"<opnsense><system><hostname>../../escape</hostname></system></opnsense>";

    let err = pipeline(&tmp).submit(&upload(bytes)).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidHostname);
    assert!(files_under(tmp.path()).is_empty());
    assert!(!tmp.path().join("escape").exists());
}

#[test]
fn domain_cannot_smuggle_a_path() {
    let tmp = TempDir::new().unwrap();
    let bytes =
        b"<pfsense><system><hostname>fw1</hostname><domain>/../../etc</domain></system></pfsense>";

    let err = pipeline(&tmp).submit(&upload(bytes)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidHostname);
}

#[test]
fn repeated_uploads_keep_every_copy() {
    let tmp = TempDir::new().unwrap();
    let p = pipeline(&tmp);
    let bytes = b"<opnsense><system><hostname>edge01</hostname></system></opnsense>";

    let paths: Vec<_> = (0..3)
        .map(|_| p.submit(&upload(bytes)).unwrap().record.path)
        .collect();

    assert_ne!(paths[0], paths[1]);
    assert_ne!(paths[1], paths[2]);
    assert_eq!(files_under(&tmp.path().join("backup").join("edge01")).len(), 3);
}

#[test]
fn earlier_directory_survives_failed_upload() {
    let tmp = TempDir::new().unwrap();
    let p = pipeline(&tmp);
    let dir = p.store().ensure_host_dir("edge01").unwrap();

    let err = p
        .submit(&upload(b"<opnsense><system><hostname>edge01</hostname>"))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MalformedConfig);
    assert!(dir.is_dir());
    assert!(files_under(&dir).is_empty());
}

#[test]
fn concurrent_uploads_for_different_hosts() {
    let tmp = TempDir::new().unwrap();
    let p = std::sync::Arc::new(pipeline(&tmp));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let p = p.clone();
            std::thread::spawn(move || {
                let xml = format!(
                    "<opnsense><system><hostname>host{}</hostname></system></opnsense>",
                    i
                );
                p.submit(&UploadRequest::new("10.0.0.1", xml.into_bytes()))
            })
        })
        .collect();

    for h in handles {
        assert!(h.join().unwrap().is_ok());
    }
    assert_eq!(files_under(&tmp.path().join("backup")).len(), 8);
}
