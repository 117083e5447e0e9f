//! Cheap lexical probe that decides which dialect a payload claims to be.
//!
//! This is not an XML parse. A payload that contains a recognizable root
//! marker is classified even if it is broken; [`crate::extract`] does the
//! strict decoding.

use crate::error::{IntakeError, Result};
use crate::models::Dialect;

/// Returns the first dialect, in [`Dialect::ALL`] order, whose root marker
/// appears anywhere in `bytes`.
pub fn detect(bytes: &[u8]) -> Result<Dialect> {
    Dialect::ALL
        .into_iter()
        .find(|d| contains(bytes, d.marker().as_bytes()))
        .ok_or(IntakeError::UnsupportedDialect)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn detects_pfsense() {
        let xml = b"<?xml version=\"1.0\"?>\n<pfsense><system/></pfsense>";
        assert_eq!(detect(xml).unwrap(), Dialect::PfSense);
    }

    #[test]
    fn detects_opnsense() {
        let xml = b"<opnsense><system><hostname>edge01</hostname></system></opnsense>";
        assert_eq!(detect(xml).unwrap(), Dialect::OpnSense);
    }

    #[test]
    fn pfsense_wins_when_both_present() {
        let xml = b"<opnsense><note><pfsense></note></opnsense>";
        assert_eq!(detect(xml).unwrap(), Dialect::PfSense);
    }

    #[test]
    fn tolerates_broken_documents() {
        assert_eq!(detect(b"garbage <opnsense> more").unwrap(), Dialect::OpnSense);
    }

    #[test]
    fn unknown_payloads_are_rejected() {
        let inputs: [&[u8]; 5] = [b"<junk/>", b"", b"<pfsense", b"<PFSENSE>", b"\xff\xfe\x00"];
        for input in inputs {
            let err = detect(input).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedDialect);
        }
    }

    #[test]
    fn root_with_attributes_is_not_a_marker() {
        assert!(detect(b"<pfsense version=\"1\"></pfsense>").is_err());
    }
}
