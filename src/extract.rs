//! Structured decoding of firewall configuration exports.
//!
//! Walks the document with a streaming `quick-xml` reader and keeps only the
//! `system/hostname` and `system/domain` leaves directly under the dialect's
//! root element. Everything else in the document is skipped, which keeps the
//! cost linear in the payload and the result independent of unrelated
//! `hostname` elements deeper in the tree.
//!
//! No input can make this panic: every reader error becomes
//! [`IntakeError::MalformedConfig`].

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::dialect;
use crate::error::{IntakeError, Result};
use crate::models::{Dialect, FirewallConfig};

const SYSTEM: &[u8] = b"system";

/// Leaves of `<system>` that we keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leaf {
    Hostname,
    Domain,
}

impl Leaf {
    fn from_name(name: &[u8], dialect: Dialect) -> Option<Leaf> {
        match (name, dialect) {
            (b"hostname", _) => Some(Leaf::Hostname),
            (b"domain", Dialect::PfSense) => Some(Leaf::Domain),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct SystemFields {
    hostname: Option<String>,
    domain: Option<String>,
}

impl SystemFields {
    fn set(&mut self, leaf: Leaf, value: String) {
        match leaf {
            Leaf::Hostname => self.hostname = Some(value),
            Leaf::Domain => self.domain = Some(value),
        }
    }
}

/// Runs dialect detection and then extraction on the same bytes.
pub fn detect_and_extract(bytes: &[u8]) -> Result<FirewallConfig> {
    let dialect = dialect::detect(bytes)?;
    extract(bytes, dialect)
}

/// Decodes `bytes` as a `dialect` export.
///
/// Fails with `MalformedConfig` if the document is not well-formed up to the
/// end of its root element, or if the root element is not the one `dialect`
/// requires. Fails with `MissingHostname` if `system/hostname` is absent or
/// blank.
pub fn extract(bytes: &[u8], dialect: Dialect) -> Result<FirewallConfig> {
    let fields = read_system_fields(bytes, dialect)?;

    let hostname = fields
        .hostname
        .filter(|h| !h.is_empty())
        .ok_or_else(|| IntakeError::MissingHostname(dialect.to_string()))?;

    Ok(match dialect {
        Dialect::PfSense => FirewallConfig::PfSense {
            hostname,
            domain: fields.domain,
        },
        Dialect::OpnSense => FirewallConfig::OpnSense { hostname },
    })
}

fn read_system_fields(bytes: &[u8], dialect: Dialect) -> Result<SystemFields> {
    let root = dialect.root_element().as_bytes();
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    // Local names of the open elements, root first.
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut fields = SystemFields::default();
    let mut current: Option<Leaf> = None;
    let mut text = String::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| malformed(dialect, e))?;

        match event {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if stack.is_empty() {
                    check_root(&name, root, dialect)?;
                }
                if stack.len() == 2 && stack[1] == SYSTEM {
                    current = Leaf::from_name(&name, dialect);
                    text.clear();
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = e.local_name();
                if stack.is_empty() {
                    check_root(name.as_ref(), root, dialect)?;
                    // `<pfsense/>`: nothing inside, nothing more to read.
                    break;
                }
                if stack.len() == 2 && stack[1] == SYSTEM {
                    if let Some(leaf) = Leaf::from_name(name.as_ref(), dialect) {
                        fields.set(leaf, String::new());
                    }
                }
            }
            Event::Text(t) if stack.len() == 3 && current.is_some() => {
                let unescaped = t.unescape().map_err(|e| malformed(dialect, e))?;
                text.push_str(&unescaped);
            }
            Event::CData(c) if stack.len() == 3 && current.is_some() => {
                let raw = std::str::from_utf8(&c).map_err(|e| malformed(dialect, e))?;
                text.push_str(raw);
            }
            Event::End(_) => {
                if stack.is_empty() {
                    return Err(malformed(dialect, "unexpected end tag before root element"));
                }
                if stack.len() == 3 {
                    if let Some(leaf) = current.take() {
                        fields.set(leaf, text.trim().to_string());
                    }
                }
                stack.pop();
                if stack.is_empty() {
                    break;
                }
            }
            Event::Eof => {
                let reason = if stack.is_empty() {
                    format!("no <{}> root element", dialect.root_element())
                } else {
                    "unexpected end of document".to_string()
                };
                return Err(malformed(dialect, reason));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(fields)
}

fn check_root(name: &[u8], expected: &[u8], dialect: Dialect) -> Result<()> {
    if name == expected {
        return Ok(());
    }
    Err(malformed(
        dialect,
        format!(
            "expected element type <{}> but have <{}>",
            dialect.root_element(),
            String::from_utf8_lossy(name)
        ),
    ))
}

fn malformed(dialect: Dialect, reason: impl ToString) -> IntakeError {
    IntakeError::MalformedConfig {
        dialect: dialect.to_string(),
        reason: reason.to_string(),
    }
}
