//! `@NAME` variable substitution for filter files.
//!
//! Supported forms: `@NAME`, `@{NAME}` and `@{NAME:-default}`. `NAME` is
//! alphanumeric (plus `_`). An unknown variable expands to nothing.

use std::collections::HashMap;

use crate::error::{FlowError, Result};

pub trait VarSubst: Send + Sync {
    fn substitute(&self, line: &str) -> Result<String>;
}

#[derive(Debug, Clone, Default)]
pub struct Variables {
    bindings: HashMap<String, String>,
}

fn syntax(msg: impl Into<String>) -> FlowError {
    FlowError::ParseSyntaxError {
        file: String::new(),
        line: 0,
        msg: msg.into(),
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.bindings.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(String::as_str)
    }

    /// `NAME=value`, as given on a command line.
    pub fn set_binding(&mut self, binding: &str) -> Result<()> {
        let (name, value) = binding
            .split_once('=')
            .ok_or_else(|| syntax(format!("Expecting NAME=value, got \"{binding}\".")))?;
        if name.is_empty() || !name.chars().all(is_name_char) {
            return Err(syntax(format!("Bad variable name \"{name}\".")));
        }
        self.set(name, value);
        Ok(())
    }
}

impl VarSubst for Variables {
    fn substitute(&self, line: &str) -> Result<String> {
        let mut out = String::with_capacity(line.len());
        let mut rest = line;

        while let Some(at) = rest.find('@') {
            out.push_str(&rest[..at]);
            let after = &rest[at + 1..];

            if let Some(braced) = after.strip_prefix('{') {
                let close = braced
                    .find('}')
                    .ok_or_else(|| syntax("Missing '}' in variable reference."))?;
                let body = &braced[..close];
                let (name, default) = match body.split_once(":-") {
                    Some((n, d)) => (n, Some(d)),
                    None => (body, None),
                };
                match (self.get(name), default) {
                    (Some(v), _) => out.push_str(v),
                    (None, Some(d)) => out.push_str(d),
                    (None, None) => {}
                }
                rest = &braced[close + 1..];
            } else {
                let end = after.find(|c: char| !is_name_char(c)).unwrap_or(after.len());
                if end == 0 {
                    out.push('@');
                } else if let Some(v) = self.get(&after[..end]) {
                    out.push_str(v);
                }
                rest = &after[end..];
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> Variables {
        let mut v = Variables::new();
        v.set_binding("PORT=80").unwrap();
        v.set_binding("NET=10.0.0.0/8").unwrap();
        v
    }

    #[test]
    fn test_plain_reference() {
        assert_eq!(vars().substitute("permit @PORT").unwrap(), "permit 80");
        assert_eq!(vars().substitute("permit @PORT,443").unwrap(), "permit 80,443");
    }

    #[test]
    fn test_braced_and_default() {
        let v = vars();
        assert_eq!(v.substitute("permit @{NET}").unwrap(), "permit 10.0.0.0/8");
        assert_eq!(v.substitute("permit @{HOST:-1.2.3.4}").unwrap(), "permit 1.2.3.4");
        assert_eq!(v.substitute("permit @{PORT:-22}").unwrap(), "permit 80");
    }

    #[test]
    fn test_unknown_is_empty() {
        assert_eq!(vars().substitute("a @NOPE b").unwrap(), "a  b");
    }

    #[test]
    fn test_lone_at_kept() {
        assert_eq!(vars().substitute("a @ b").unwrap(), "a @ b");
    }

    #[test]
    fn test_missing_brace() {
        let err = vars().substitute("permit @{PORT").unwrap_err();
        assert_eq!(err.code(), "PARSE_SYNTAX_ERROR");
    }

    #[test]
    fn test_bad_binding() {
        let mut v = Variables::new();
        assert!(v.set_binding("novalue").is_err());
        assert!(v.set_binding("=x").is_err());
        v.set_binding("EMPTY=").unwrap();
        assert_eq!(v.get("EMPTY"), Some(""));
    }
}
