//! Filter primitives: named, typed lookup tables.
//!
//! A primitive answers one question about one record value: permit or deny.
//! Which value it sees is decided by the [`MatchField`] of the definition
//! item that references it.

use std::collections::HashMap;
use std::fmt;

use chrono::{Local, TimeZone};
use rand::{Rng, RngCore};

use crate::record::FieldOffsets;

use super::resolve::MatchField;
use super::symbols::SymbolResolver;
use super::trie::PrefixTrie;

// ── Verdict and operators ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Permit,
    Deny,
}

impl Verdict {
    pub fn opposite(self) -> Self {
        match self {
            Verdict::Permit => Verdict::Deny,
            Verdict::Deny => Verdict::Permit,
        }
    }

    pub fn is_permit(self) -> bool {
        self == Verdict::Permit
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Permit => "permit",
            Verdict::Deny => "deny",
        })
    }
}

/// Relational operator of the counter-like kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Lt,
    Gt,
    Eq,
    Ne,
    Le,
    Ge,
}

impl Op {
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "lt" => Some(Op::Lt),
            "gt" => Some(Op::Gt),
            "eq" => Some(Op::Eq),
            "ne" => Some(Op::Ne),
            "le" => Some(Op::Le),
            "ge" => Some(Op::Ge),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Op::Lt => "lt",
            Op::Gt => "gt",
            Op::Eq => "eq",
            Op::Ne => "ne",
            Op::Le => "le",
            Op::Ge => "ge",
        }
    }

    /// `record <op> threshold`.
    #[inline]
    pub fn apply<T: PartialOrd>(self, record: T, threshold: T) -> bool {
        match self {
            Op::Lt => record < threshold,
            Op::Gt => record > threshold,
            Op::Eq => record == threshold,
            Op::Ne => record != threshold,
            Op::Le => record <= threshold,
            Op::Ge => record >= threshold,
        }
    }
}

// ── Tables ─────────────────────────────────────────────────────────

/// Failure while loading a value list into an [`ExactTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListError {
    OutOfRange(String),
    Symbol(String),
    Syntax(String),
}

/// Direct-indexed table; unset slots fall through to the default mode.
#[derive(Debug, Clone)]
pub struct ExactTable {
    modes: Vec<Option<Verdict>>,
}

impl ExactTable {
    pub fn new(size: usize) -> Self {
        Self {
            modes: vec![None; size],
        }
    }

    pub fn size(&self) -> usize {
        self.modes.len()
    }

    #[inline]
    pub fn get(&self, v: u32) -> Option<Verdict> {
        self.modes.get(v as usize).copied().flatten()
    }

    pub fn set(&mut self, index: u32, mode: Verdict) {
        if let Some(slot) = self.modes.get_mut(index as usize) {
            if let Some(prev) = *slot {
                tracing::warn!(index, previous = %prev, "index previously set");
            }
            *slot = Some(mode);
        }
    }

    /// Load `[!]item{,item}` where an item is `v` or `a-b`.
    ///
    /// `!` assigns the opposite of `mode` to every listed index. Items
    /// starting with a letter go through `symbols`.
    pub fn load_list(
        &mut self,
        word: &str,
        mode: Verdict,
        symbols: Option<&dyn SymbolResolver>,
    ) -> std::result::Result<(), ListError> {
        let word = word.trim_start();
        let (list, mode) = match word.strip_prefix('!') {
            Some(rest) => (rest, mode.opposite()),
            None => (word, mode),
        };

        for item in list.split(',').filter(|s| !s.is_empty()) {
            let (lo, hi) = match item.split_once('-') {
                Some((a, b)) => (self.index(a, symbols)?, self.index(b, symbols)?),
                None => {
                    let v = self.index(item, symbols)?;
                    (v, v)
                }
            };
            // the start index is always set, so `9-4` sets 9
            self.set(lo, mode);
            for i in lo.saturating_add(1)..=hi {
                self.set(i, mode);
            }
        }
        Ok(())
    }

    fn index(
        &self,
        item: &str,
        symbols: Option<&dyn SymbolResolver>,
    ) -> std::result::Result<u32, ListError> {
        let v = if item.starts_with(|c: char| c.is_ascii_alphabetic()) {
            symbols
                .and_then(|s| s.find_by_name(item))
                .ok_or_else(|| ListError::Symbol(item.to_string()))?
        } else {
            parse_c_ulong(item).ok_or_else(|| ListError::Syntax(format!("Bad number \"{item}\".")))?
        };
        if v as usize >= self.modes.len() {
            return Err(ListError::OutOfRange(item.to_string()));
        }
        Ok(v)
    }
}

/// `value`/`mask` pair; matches when `(v & mask) == value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskEntry {
    pub value: u32,
    pub mask: u32,
    pub mode: Verdict,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpEntry<T> {
    pub value: T,
    pub op: Op,
    pub mode: Verdict,
}

/// Time of day, compared against the same day as the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeEntry {
    pub hour: u32,
    pub min: u32,
    pub sec: u32,
    pub op: Op,
    pub mode: Verdict,
}

// ── Primitive kinds ────────────────────────────────────────────────

pub const IP_TOS_MASK: u8 = 0xFF;
pub const TCP_FLAGS_MASK: u8 = 0xFF;

/// Each variant owns its table. List kinds are evaluated in insertion order.
#[derive(Debug, Clone)]
pub enum PrimitiveKind {
    As(ExactTable),
    IpProtocol(ExactTable),
    IpPort(ExactTable),
    PrefixLen(ExactTable),
    IpTos { table: ExactTable, mask: u8 },
    TcpFlags { table: ExactTable, mask: u8 },
    IfIndex(ExactTable),
    Engine(ExactTable),
    IpAddress(HashMap<u32, Verdict>),
    Tag(HashMap<u32, Verdict>),
    IpMask(Vec<MaskEntry>),
    TagMask(Vec<MaskEntry>),
    IpPrefix(PrefixTrie),
    Counter(Vec<OpEntry<u32>>),
    TimeDate(Vec<OpEntry<i64>>),
    Time(Vec<TimeEntry>),
    Double(Vec<OpEntry<f64>>),
    Rate { rate: u32, mode: Option<Verdict> },
}

impl PrimitiveKind {
    /// Fresh, empty table for a `type` keyword.
    pub fn from_type_name(name: &str) -> Option<Self> {
        let kind = match name.to_ascii_lowercase().as_str() {
            "as" => PrimitiveKind::As(ExactTable::new(65536)),
            "ip-address-prefix" => PrimitiveKind::IpPrefix(PrefixTrie::new()),
            "ip-address" => PrimitiveKind::IpAddress(HashMap::new()),
            "ip-address-mask" => PrimitiveKind::IpMask(Vec::new()),
            "ip-protocol" => PrimitiveKind::IpProtocol(ExactTable::new(256)),
            "ip-port" => PrimitiveKind::IpPort(ExactTable::new(65536)),
            "ip-address-prefix-len" => PrimitiveKind::PrefixLen(ExactTable::new(33)),
            "ip-tos" => PrimitiveKind::IpTos {
                table: ExactTable::new(256),
                mask: IP_TOS_MASK,
            },
            "ip-tcp-flags" => PrimitiveKind::TcpFlags {
                table: ExactTable::new(256),
                mask: TCP_FLAGS_MASK,
            },
            "ifindex" => PrimitiveKind::IfIndex(ExactTable::new(65536)),
            "counter" => PrimitiveKind::Counter(Vec::new()),
            "time-date" => PrimitiveKind::TimeDate(Vec::new()),
            "engine" => PrimitiveKind::Engine(ExactTable::new(65536)),
            "tag" => PrimitiveKind::Tag(HashMap::new()),
            "tag-mask" => PrimitiveKind::TagMask(Vec::new()),
            "time" => PrimitiveKind::Time(Vec::new()),
            "double" => PrimitiveKind::Double(Vec::new()),
            "rate" => PrimitiveKind::Rate {
                rate: 0,
                mode: None,
            },
            _ => return None,
        };
        Some(kind)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            PrimitiveKind::As(_) => "as",
            PrimitiveKind::IpProtocol(_) => "ip-protocol",
            PrimitiveKind::IpPort(_) => "ip-port",
            PrimitiveKind::PrefixLen(_) => "ip-address-prefix-len",
            PrimitiveKind::IpTos { .. } => "ip-tos",
            PrimitiveKind::TcpFlags { .. } => "ip-tcp-flags",
            PrimitiveKind::IfIndex(_) => "ifindex",
            PrimitiveKind::Engine(_) => "engine",
            PrimitiveKind::IpAddress(_) => "ip-address",
            PrimitiveKind::Tag(_) => "tag",
            PrimitiveKind::IpMask(_) => "ip-address-mask",
            PrimitiveKind::TagMask(_) => "tag-mask",
            PrimitiveKind::IpPrefix(_) => "ip-address-prefix",
            PrimitiveKind::Counter(_) => "counter",
            PrimitiveKind::TimeDate(_) => "time-date",
            PrimitiveKind::Time(_) => "time",
            PrimitiveKind::Double(_) => "double",
            PrimitiveKind::Rate { .. } => "rate",
        }
    }

    pub fn exact_table_mut(&mut self) -> Option<&mut ExactTable> {
        match self {
            PrimitiveKind::As(t)
            | PrimitiveKind::IpProtocol(t)
            | PrimitiveKind::IpPort(t)
            | PrimitiveKind::PrefixLen(t)
            | PrimitiveKind::IfIndex(t)
            | PrimitiveKind::Engine(t)
            | PrimitiveKind::IpTos { table: t, .. }
            | PrimitiveKind::TcpFlags { table: t, .. } => Some(t),
            _ => None,
        }
    }
}

// ── Primitive ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Primitive {
    pub name: String,
    pub kind: PrimitiveKind,
    pub default: Verdict,
}

impl Primitive {
    /// Evaluate `field` of `rec` against this primitive's table.
    pub fn evaluate<R: RngCore + ?Sized>(
        &self,
        field: MatchField,
        rec: &[u8],
        fo: &FieldOffsets,
        rng: &mut R,
    ) -> Verdict {
        let hit = match &self.kind {
            PrimitiveKind::As(t)
            | PrimitiveKind::IpProtocol(t)
            | PrimitiveKind::IpPort(t)
            | PrimitiveKind::PrefixLen(t)
            | PrimitiveKind::IfIndex(t)
            | PrimitiveKind::Engine(t) => t.get(field.word(rec, fo)),
            PrimitiveKind::IpTos { table, mask } | PrimitiveKind::TcpFlags { table, mask } => {
                table.get(field.word(rec, fo) & u32::from(*mask))
            }
            PrimitiveKind::IpAddress(map) | PrimitiveKind::Tag(map) => {
                map.get(&field.word(rec, fo)).copied()
            }
            PrimitiveKind::IpMask(list) | PrimitiveKind::TagMask(list) => {
                let v = field.word(rec, fo);
                list.iter().find(|e| v & e.mask == e.value).map(|e| e.mode)
            }
            PrimitiveKind::IpPrefix(trie) => trie.lookup(field.word(rec, fo)),
            PrimitiveKind::Counter(list) => {
                let v = field.word(rec, fo);
                list.iter().find(|e| e.op.apply(v, e.value)).map(|e| e.mode)
            }
            PrimitiveKind::TimeDate(list) => {
                let t = i64::from(field.word(rec, fo));
                list.iter().find(|e| e.op.apply(t, e.value)).map(|e| e.mode)
            }
            PrimitiveKind::Time(list) => {
                let t1 = i64::from(field.word(rec, fo));
                let midnight = local_midnight(t1);
                list.iter()
                    .find(|e| {
                        let t2 = midnight
                            + i64::from(e.hour) * 3600
                            + i64::from(e.min) * 60
                            + i64::from(e.sec);
                        e.op.apply(t1, t2)
                    })
                    .map(|e| e.mode)
            }
            PrimitiveKind::Double(list) => {
                let v = field.rate(rec, fo);
                list.iter().find(|e| e.op.apply(v, e.value)).map(|e| e.mode)
            }
            PrimitiveKind::Rate { rate, mode } => {
                return sample(*rate, *mode, rng);
            }
        };
        hit.unwrap_or(self.default)
    }
}

/// One draw in `[0, rate)`; 0 yields the primitive's mode.
fn sample<R: RngCore + ?Sized>(rate: u32, mode: Option<Verdict>, rng: &mut R) -> Verdict {
    let pass = if rate <= 1 {
        true
    } else {
        rng.gen_range(0..rate) == 0
    };
    let permit = mode == Some(Verdict::Permit);
    if pass == permit {
        Verdict::Permit
    } else {
        Verdict::Deny
    }
}

/// Epoch seconds of local midnight on the day containing `t`.
fn local_midnight(t: i64) -> i64 {
    let day_start = Local
        .timestamp_opt(t, 0)
        .earliest()
        .and_then(|dt| dt.date_naive().and_hms_opt(0, 0, 0))
        .and_then(|naive| Local.from_local_datetime(&naive).earliest());
    match day_start {
        Some(dt) => dt.timestamp(),
        None => t - t.rem_euclid(86400),
    }
}

// ── Scalars ────────────────────────────────────────────────────────

/// C `strtoul(s, 0, 0)` bases: `0x` hex, leading `0` octal, else decimal.
/// The whole string must be consumed.
pub fn parse_c_ulong(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if s.len() > 1 && s.starts_with('0') {
        u32::from_str_radix(&s[1..], 8).ok()
    } else {
        s.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::symbols::SymbolTable;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    mod list_tests {
        use super::*;

        #[test]
        fn test_ranges_and_singles() {
            let mut t = ExactTable::new(20);
            t.load_list("1,3-5,19", Verdict::Deny, None).unwrap();
            let set: Vec<u32> = (0..20).filter(|&i| t.get(i).is_some()).collect();
            assert_eq!(set, vec![1, 3, 4, 5, 19]);
            assert_eq!(t.get(4), Some(Verdict::Deny));
        }

        #[test]
        fn test_bang_assigns_opposite() {
            let mut t = ExactTable::new(20);
            t.load_list("!2-3", Verdict::Deny, None).unwrap();
            assert_eq!(t.get(2), Some(Verdict::Permit));
            assert_eq!(t.get(3), Some(Verdict::Permit));
            assert_eq!(t.get(4), None);
        }

        #[test]
        fn test_out_of_range() {
            let mut t = ExactTable::new(20);
            let err = t.load_list("5,20", Verdict::Permit, None).unwrap_err();
            assert_eq!(err, ListError::OutOfRange("20".into()));
        }

        #[test]
        fn test_reversed_range_sets_start_only() {
            let mut t = ExactTable::new(20);
            t.load_list("9-4", Verdict::Permit, None).unwrap();
            let set: Vec<u32> = (0..20).filter(|&i| t.get(i).is_some()).collect();
            assert_eq!(set, vec![9]);
            assert_eq!(t.get(9), Some(Verdict::Permit));
        }

        #[test]
        fn test_permit_single_and_range() {
            let mut t = ExactTable::new(20);
            t.load_list("1,5-10", Verdict::Permit, None).unwrap();
            for i in [1, 5, 6, 7, 8, 9, 10] {
                assert_eq!(t.get(i), Some(Verdict::Permit), "slot {i}");
            }
            for i in [0, 2, 3, 4].into_iter().chain(11..20) {
                assert_eq!(t.get(i), None, "slot {i}");
            }
        }

        #[test]
        fn test_bang_single_and_range() {
            let mut t = ExactTable::new(20);
            t.load_list("!1,5-10", Verdict::Permit, None).unwrap();
            for i in [1, 5, 6, 7, 8, 9, 10] {
                assert_eq!(t.get(i), Some(Verdict::Deny), "slot {i}");
            }
            for i in [0, 2, 3, 4].into_iter().chain(11..20) {
                assert_eq!(t.get(i), None, "slot {i}");
            }
        }

        #[test]
        fn test_later_setting_overrides() {
            let mut t = ExactTable::new(20);
            t.load_list("7", Verdict::Permit, None).unwrap();
            t.load_list("7", Verdict::Deny, None).unwrap();
            assert_eq!(t.get(7), Some(Verdict::Deny));
        }

        #[test]
        fn test_symbols() {
            let syms = SymbolTable::parse("6 tcp\n17 udp\n");
            let mut t = ExactTable::new(256);
            t.load_list("TCP,udp", Verdict::Permit, Some(&syms)).unwrap();
            assert_eq!(t.get(6), Some(Verdict::Permit));
            assert_eq!(t.get(17), Some(Verdict::Permit));

            let err = t.load_list("icmp", Verdict::Permit, Some(&syms)).unwrap_err();
            assert_eq!(err, ListError::Symbol("icmp".into()));
            let err = t.load_list("tcp", Verdict::Permit, None).unwrap_err();
            assert_eq!(err, ListError::Symbol("tcp".into()));
        }

        #[test]
        fn test_number_bases() {
            assert_eq!(parse_c_ulong("0x1F"), Some(31));
            assert_eq!(parse_c_ulong("017"), Some(15));
            assert_eq!(parse_c_ulong("0"), Some(0));
            assert_eq!(parse_c_ulong("443"), Some(443));
            assert_eq!(parse_c_ulong("4x"), None);
        }
    }

    mod op_tests {
        use super::*;

        #[test]
        fn test_parse_case_insensitive() {
            assert_eq!(Op::parse("GE"), Some(Op::Ge));
            assert_eq!(Op::parse("lt"), Some(Op::Lt));
            assert_eq!(Op::parse("between"), None);
        }

        #[test]
        fn test_apply_record_first() {
            assert!(Op::Lt.apply(1u32, 2));
            assert!(!Op::Gt.apply(1u32, 2));
            assert!(Op::Ne.apply(0.5f64, 0.25));
            assert!(Op::Eq.apply(0.1f64 + 0.2, 0.1 + 0.2));
        }
    }

    mod sample_tests {
        use super::*;

        #[test]
        fn test_rate_one_always_passes() {
            let mut rng = StdRng::seed_from_u64(7);
            for _ in 0..50 {
                assert_eq!(sample(1, Some(Verdict::Permit), &mut rng), Verdict::Permit);
                assert_eq!(sample(1, Some(Verdict::Deny), &mut rng), Verdict::Deny);
            }
        }

        #[test]
        fn test_rate_thins_roughly() {
            let mut rng = StdRng::seed_from_u64(42);
            let permits = (0..10_000)
                .filter(|_| sample(10, Some(Verdict::Permit), &mut rng).is_permit())
                .count();
            assert!((700..1300).contains(&permits), "permits = {permits}");
        }

        #[test]
        fn test_deny_mode_inverts_draw() {
            let mut rng = StdRng::seed_from_u64(42);
            let denies = (0..10_000)
                .filter(|_| !sample(10, Some(Verdict::Deny), &mut rng).is_permit())
                .count();
            assert!((700..1300).contains(&denies), "denies = {denies}");
        }
    }

    #[test]
    fn test_local_midnight_is_same_day() {
        let t = 1_700_000_000i64;
        let m = local_midnight(t);
        assert!(m <= t);
        assert!(t - m < 25 * 3600);
    }

    #[test]
    fn test_type_names_roundtrip() {
        for name in [
            "as",
            "ip-address-prefix",
            "ip-address",
            "ip-address-mask",
            "ip-protocol",
            "ip-port",
            "ip-address-prefix-len",
            "ip-tos",
            "ip-tcp-flags",
            "ifindex",
            "counter",
            "time-date",
            "engine",
            "tag",
            "tag-mask",
            "time",
            "double",
            "rate",
        ] {
            let kind = PrimitiveKind::from_type_name(name).unwrap();
            assert_eq!(kind.type_name(), name);
        }
        assert!(PrimitiveKind::from_type_name("IP-PORT").is_some());
        assert!(PrimitiveKind::from_type_name("ipv6").is_none());
    }
}
