//! Symbolic names for filter values and date parsing.
//!
//! Symbol files are line oriented, `value<ws>name`, with `#` comments:
//!
//! ```text
//! # ip protocols
//! 6       tcp
//! 17      udp
//! ```

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};

use crate::error::Result;

// ── Symbols ────────────────────────────────────────────────────────

pub trait SymbolResolver: Send + Sync {
    fn find_by_name(&self, name: &str) -> Option<u32>;
    fn find_by_value(&self, value: u32) -> Option<&str>;
}

/// In-memory symbol table. Name lookups are case-insensitive; the first
/// name listed for a value is the one reported back.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    by_name: HashMap<String, u32>,
    by_value: HashMap<u32, String>,
}

impl SymbolTable {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let table = Self::parse(&contents);
        tracing::debug!(path = %path.display(), symbols = table.len(), "loaded symbol table");
        Ok(table)
    }

    /// Malformed lines are skipped with a warning.
    pub fn parse(text: &str) -> Self {
        let mut table = Self::default();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.splitn(2, char::is_whitespace);
            let value = parts.next().and_then(super::primitive::parse_c_ulong);
            let name = parts.next().map(str::trim).filter(|n| !n.is_empty());
            match (value, name) {
                (Some(value), Some(name)) => table.insert(value, name),
                _ => tracing::warn!(line = lineno + 1, text = line, "bad symbol line"),
            }
        }
        table
    }

    pub fn insert(&mut self, value: u32, name: &str) {
        self.by_name.insert(name.to_ascii_lowercase(), value);
        self.by_value.entry(value).or_insert_with(|| name.to_string());
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl SymbolResolver for SymbolTable {
    fn find_by_name(&self, name: &str) -> Option<u32> {
        self.by_name.get(&name.to_ascii_lowercase()).copied()
    }

    fn find_by_value(&self, value: u32) -> Option<&str> {
        self.by_value.get(&value).map(String::as_str)
    }
}

/// Symbol tables available to the filter parser, one per value domain.
#[derive(Default)]
pub struct Symbols {
    pub ip_protocol: Option<Box<dyn SymbolResolver>>,
    pub tcp_port: Option<Box<dyn SymbolResolver>>,
    pub asn: Option<Box<dyn SymbolResolver>>,
    pub tag: Option<Box<dyn SymbolResolver>>,
}

impl Symbols {
    /// Load whichever of `ip-prot.sym`, `ip-ports.sym`, `asn.sym` and
    /// `tag.sym` exist in `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        fn table(dir: &Path, file: &str) -> Result<Option<Box<dyn SymbolResolver>>> {
            let path = dir.join(file);
            if !path.is_file() {
                return Ok(None);
            }
            Ok(Some(Box::new(SymbolTable::load(&path)?)))
        }

        Ok(Self {
            ip_protocol: table(dir, "ip-prot.sym")?,
            tcp_port: table(dir, "ip-ports.sym")?,
            asn: table(dir, "asn.sym")?,
            tag: table(dir, "tag.sym")?,
        })
    }
}

impl std::fmt::Debug for Symbols {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Symbols")
            .field("ip_protocol", &self.ip_protocol.is_some())
            .field("tcp_port", &self.tcp_port.is_some())
            .field("asn", &self.asn.is_some())
            .field("tag", &self.tag.is_some())
            .finish()
    }
}

// ── Dates ──────────────────────────────────────────────────────────

pub trait DateParser: Send + Sync {
    /// Epoch seconds for `text`, or `None` if it cannot be parsed.
    fn parse(&self, text: &str) -> Option<i64>;
}

/// Dates in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDates;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%B %d %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

impl DateParser for LocalDates {
    fn parse(&self, text: &str) -> Option<i64> {
        let text = text.trim();
        if let Some(epoch) = text.strip_prefix('@') {
            return epoch.parse().ok();
        }
        if let Ok(epoch) = text.parse::<i64>() {
            return Some(epoch);
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt.timestamp());
        }

        let naive = DATETIME_FORMATS
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
            .or_else(|| {
                DATE_FORMATS
                    .iter()
                    .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    mod symbol_tests {
        use super::*;

        #[test]
        fn test_parse_and_lookup() {
            let t = SymbolTable::parse("# comment\n6\ttcp\n17 udp\n\n0x2f gre\n");
            assert_eq!(t.len(), 3);
            assert_eq!(t.find_by_name("TCP"), Some(6));
            assert_eq!(t.find_by_name("gre"), Some(47));
            assert_eq!(t.find_by_value(17), Some("udp"));
            assert_eq!(t.find_by_name("icmp"), None);
        }

        #[test]
        fn test_bad_lines_skipped() {
            let t = SymbolTable::parse("abc\n22\n80 http\n");
            assert_eq!(t.len(), 1);
            assert_eq!(t.find_by_name("http"), Some(80));
        }

        #[test]
        fn test_first_name_is_reported() {
            let t = SymbolTable::parse("80 http\n80 www\n");
            assert_eq!(t.find_by_value(80), Some("http"));
            assert_eq!(t.find_by_name("www"), Some(80));
        }

        #[test]
        fn test_from_dir_loads_present_files() {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("ip-prot.sym"), "6 tcp\n").unwrap();
            let syms = Symbols::from_dir(dir.path()).unwrap();
            assert!(syms.ip_protocol.is_some());
            assert!(syms.tcp_port.is_none());
            assert_eq!(syms.ip_protocol.unwrap().find_by_name("tcp"), Some(6));
        }
    }

    mod date_tests {
        use super::*;

        #[test]
        fn test_epoch_forms() {
            assert_eq!(LocalDates.parse("@1000"), Some(1000));
            assert_eq!(LocalDates.parse(" 1700000000 "), Some(1_700_000_000));
        }

        #[test]
        fn test_rfc3339() {
            assert_eq!(LocalDates.parse("1970-01-01T00:01:40Z"), Some(100));
        }

        #[test]
        fn test_local_formats_agree() {
            let a = LocalDates.parse("2001-02-03 04:05:06").unwrap();
            let b = LocalDates.parse("02/03/2001 04:05:06").unwrap();
            let c = LocalDates.parse("February 03 2001 04:05:06").unwrap();
            assert_eq!(a, b);
            assert_eq!(a, c);
            let day = LocalDates.parse("2001-02-03").unwrap();
            assert_eq!(a - day, 4 * 3600 + 5 * 60 + 6);
        }

        #[test]
        fn test_garbage() {
            assert_eq!(LocalDates.parse("next tuesday"), None);
        }
    }
}
