//! Filter file parser, first pass.
//!
//! ```text
//! filter-primitive web
//!   type ip-port
//!   permit 80,443
//!   default deny
//!
//! filter-definition outbound-web
//!   match dst-ip-port web
//!   or
//!   match src-ip-port web
//! ```
//!
//! Primitives are built completely here. Match lines are kept as strings and
//! bound to primitives by [`resolve_definitions`](super::resolve) after the
//! whole file has been read.

use std::str::SplitWhitespace;

use crate::error::{FlowError, Result};

use super::primitive::{
    parse_c_ulong, ListError, MaskEntry, OpEntry, Primitive, PrimitiveKind, TimeEntry, Verdict,
    Op,
};
use super::resolve::resolve_definitions;
use super::symbols::SymbolResolver;
use super::{FilterSet, LoadContext, SetId};

// ── Parsed forms ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) struct ParsedMatch {
    pub match_type: String,
    pub primitive: String,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct ParsedDefinition {
    pub name: String,
    pub groups: Vec<Vec<ParsedMatch>>,
    pub invert: bool,
}

struct PrimitiveDraft {
    name: String,
    kind: Option<PrimitiveKind>,
    default: Verdict,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Top,
    Primitive,
    Definition,
}

/// Source position for error messages.
#[derive(Clone, Copy)]
struct Loc<'a> {
    file: &'a str,
    line: usize,
}

impl Loc<'_> {
    fn syntax(self, msg: impl Into<String>) -> FlowError {
        FlowError::ParseSyntaxError {
            file: self.file.to_string(),
            line: self.line,
            msg: msg.into(),
        }
    }

    fn duplicate(self, name: &str) -> FlowError {
        FlowError::DuplicateName {
            file: self.file.to_string(),
            line: self.line,
            name: name.to_string(),
        }
    }

    fn out_of_range(self, value: impl Into<String>) -> FlowError {
        FlowError::ValueOutOfRange {
            file: self.file.to_string(),
            line: self.line,
            value: value.into(),
        }
    }

    fn symbol(self, symbol: &str) -> FlowError {
        FlowError::SymbolLookupFailure {
            file: self.file.to_string(),
            line: self.line,
            symbol: symbol.to_string(),
        }
    }

    fn list(self, err: ListError) -> FlowError {
        match err {
            ListError::OutOfRange(v) => self.out_of_range(v),
            ListError::Symbol(s) => self.symbol(&s),
            ListError::Syntax(msg) => self.syntax(msg),
        }
    }
}

// ── Parser ─────────────────────────────────────────────────────────

pub(crate) fn parse(file: &str, text: &str, ctx: &LoadContext<'_>) -> Result<FilterSet> {
    let mut parser = Parser {
        file,
        ctx,
        state: State::Top,
        group_open: false,
        primitives: Vec::new(),
        definitions: Vec::new(),
    };

    for (i, raw) in text.lines().enumerate() {
        parser.line(Loc { file, line: i + 1 }, raw)?;
    }
    parser.finish()
}

struct Parser<'a> {
    file: &'a str,
    ctx: &'a LoadContext<'a>,
    state: State,
    group_open: bool,
    primitives: Vec<PrimitiveDraft>,
    definitions: Vec<ParsedDefinition>,
}

impl<'a> Parser<'a> {
    fn line(&mut self, loc: Loc<'_>, raw: &str) -> Result<()> {
        let substituted;
        let text = match self.ctx.vars {
            Some(vars) => {
                substituted = vars.substitute(raw).map_err(|e| match e {
                    FlowError::ParseSyntaxError { msg, .. } => loc.syntax(msg),
                    other => other,
                })?;
                substituted.as_str()
            }
            None => raw,
        };

        let mut words = text.split_whitespace();
        let Some(directive) = words.next() else {
            return Ok(());
        };
        if directive.starts_with('#') {
            return Ok(());
        }

        match (directive.to_ascii_lowercase().as_str(), self.state) {
            ("filter-primitive", _) => self.filter_primitive(loc, &mut words)?,
            ("filter-definition", _) => self.filter_definition(loc, &mut words)?,
            ("type", State::Primitive) => self.primitive_type(loc, &mut words)?,
            ("permit", State::Primitive) => self.primitive_value(loc, Verdict::Permit, &mut words)?,
            ("deny", State::Primitive) => self.primitive_value(loc, Verdict::Deny, &mut words)?,
            ("default", State::Primitive) => self.primitive_default(loc, &mut words)?,
            ("mask", State::Primitive) => self.primitive_mask(loc, &mut words)?,
            ("match", State::Definition) => self.definition_match(loc, &mut words)?,
            ("or", State::Definition) => self.group_open = false,
            ("invert", State::Definition) => {
                if let Some(def) = self.definitions.last_mut() {
                    def.invert = true;
                }
            }
            _ => return Err(loc.syntax(format!("Unexpected \"{directive}\"."))),
        }

        if let Some(extra) = words.next() {
            return Err(loc.syntax(format!("Unexpected \"{extra}\".")));
        }
        Ok(())
    }

    fn finish(self) -> Result<FilterSet> {
        let mut primitives = Vec::with_capacity(self.primitives.len());
        let mut untyped = Vec::new();
        for draft in self.primitives {
            match draft.kind {
                Some(kind) => primitives.push(Primitive {
                    name: draft.name,
                    kind,
                    default: draft.default,
                }),
                None => {
                    tracing::warn!(file = self.file, primitive = %draft.name, "primitive has no type");
                    untyped.push(draft.name);
                }
            }
        }

        let id = SetId::next();
        let definitions = resolve_definitions(id, self.file, self.definitions, &primitives, &untyped)?;
        Ok(FilterSet {
            id,
            primitives,
            definitions,
        })
    }

    // ── Definitions ────────────────────────────────────────────────

    fn filter_definition(&mut self, loc: Loc<'_>, words: &mut SplitWhitespace<'_>) -> Result<()> {
        let name = words.next().ok_or_else(|| loc.syntax("Expecting name."))?;
        if self.definitions.iter().any(|d| d.name.eq_ignore_ascii_case(name)) {
            return Err(loc.duplicate(name));
        }
        self.definitions.push(ParsedDefinition {
            name: name.to_string(),
            groups: Vec::new(),
            invert: false,
        });
        self.state = State::Definition;
        self.group_open = false;
        Ok(())
    }

    fn definition_match(&mut self, loc: Loc<'_>, words: &mut SplitWhitespace<'_>) -> Result<()> {
        let match_type = words.next().ok_or_else(|| loc.syntax("Expecting match type."))?;
        let primitive = words
            .next()
            .ok_or_else(|| loc.syntax("Expecting match primitive."))?;
        let Some(def) = self.definitions.last_mut() else {
            return Err(loc.syntax("Unexpected \"match\"."));
        };

        if !self.group_open || def.groups.is_empty() {
            def.groups.push(Vec::new());
            self.group_open = true;
        }
        if let Some(group) = def.groups.last_mut() {
            group.push(ParsedMatch {
                match_type: match_type.to_string(),
                primitive: primitive.to_string(),
                line: loc.line,
            });
        }
        Ok(())
    }

    // ── Primitives ─────────────────────────────────────────────────

    fn filter_primitive(&mut self, loc: Loc<'_>, words: &mut SplitWhitespace<'_>) -> Result<()> {
        let name = words.next().ok_or_else(|| loc.syntax("Expecting name."))?;
        if self.primitives.iter().any(|p| p.name.eq_ignore_ascii_case(name)) {
            return Err(loc.duplicate(name));
        }
        self.primitives.push(PrimitiveDraft {
            name: name.to_string(),
            kind: None,
            default: Verdict::Deny,
        });
        self.state = State::Primitive;
        Ok(())
    }

    fn current(&mut self, loc: Loc<'_>) -> Result<&mut PrimitiveDraft> {
        self.primitives
            .last_mut()
            .ok_or_else(|| loc.syntax("No current primitive."))
    }

    fn primitive_type(&mut self, loc: Loc<'_>, words: &mut SplitWhitespace<'_>) -> Result<()> {
        let word = words.next().ok_or_else(|| loc.syntax("Expecting type."))?;
        let draft = self.current(loc)?;
        if draft.kind.is_some() {
            return Err(loc.syntax("Type previously defined."));
        }
        let kind = PrimitiveKind::from_type_name(word).ok_or_else(|| loc.syntax("Unrecognized type."))?;
        draft.kind = Some(kind);
        Ok(())
    }

    fn primitive_default(&mut self, loc: Loc<'_>, words: &mut SplitWhitespace<'_>) -> Result<()> {
        let mode = match words.next().map(str::to_ascii_lowercase).as_deref() {
            Some("permit") => Verdict::Permit,
            Some("deny") => Verdict::Deny,
            _ => return Err(loc.syntax("Expecting permit or deny.")),
        };
        let draft = self.current(loc)?;
        match &draft.kind {
            None => Err(loc.syntax("Must set type first.")),
            Some(PrimitiveKind::Rate { .. }) => {
                tracing::warn!(file = loc.file, line = loc.line, "No default mode for rate.");
                Ok(())
            }
            Some(_) => {
                draft.default = mode;
                Ok(())
            }
        }
    }

    fn primitive_mask(&mut self, loc: Loc<'_>, words: &mut SplitWhitespace<'_>) -> Result<()> {
        let word = words.next().ok_or_else(|| loc.syntax("Expecting mask value."))?;
        let draft = self.current(loc)?;
        let mask = match &mut draft.kind {
            None => return Err(loc.syntax("Must set type first.")),
            Some(PrimitiveKind::IpTos { mask, .. }) | Some(PrimitiveKind::TcpFlags { mask, .. }) => mask,
            Some(_) => return Err(loc.syntax("Mask not supported for primitive.")),
        };
        let v = parse_c_ulong(word).ok_or_else(|| loc.syntax(format!("Bad mask \"{word}\".")))?;
        *mask = u8::try_from(v).map_err(|_| loc.out_of_range(word))?;
        Ok(())
    }

    fn primitive_value(
        &mut self,
        loc: Loc<'_>,
        mode: Verdict,
        words: &mut SplitWhitespace<'_>,
    ) -> Result<()> {
        let ctx = self.ctx;
        let draft = self.current(loc)?;
        let Some(kind) = draft.kind.as_mut() else {
            return Err(loc.syntax("Must set type first."));
        };
        let word = words
            .next()
            .ok_or_else(|| loc.syntax("Expecting permit/deny data."))?;
        load_value(loc, ctx, kind, mode, word, words)
    }
}

// ── Values ─────────────────────────────────────────────────────────

fn load_value(
    loc: Loc<'_>,
    ctx: &LoadContext<'_>,
    kind: &mut PrimitiveKind,
    mode: Verdict,
    word: &str,
    words: &mut SplitWhitespace<'_>,
) -> Result<()> {
    let symbols: Option<&dyn SymbolResolver> = match kind {
        PrimitiveKind::As(_) => ctx.symbols.asn.as_deref(),
        PrimitiveKind::IpProtocol(_) => ctx.symbols.ip_protocol.as_deref(),
        PrimitiveKind::IpPort(_) => ctx.symbols.tcp_port.as_deref(),
        _ => None,
    };
    if let Some(table) = kind.exact_table_mut() {
        return table.load_list(word, mode, symbols).map_err(|e| loc.list(e));
    }

    match kind {
        PrimitiveKind::IpAddress(map) => {
            let addr = scan_ip(word).ok_or_else(|| loc.syntax(format!("Bad address \"{word}\".")))?;
            if let Some(prev) = map.insert(addr, mode) {
                tracing::warn!(
                    file = loc.file,
                    line = loc.line,
                    entry = %std::net::Ipv4Addr::from(addr),
                    previous = %prev,
                    "entry previously set"
                );
            }
        }
        PrimitiveKind::Tag(map) => {
            let tag = tag_value(loc, ctx, word)?;
            if let Some(prev) = map.insert(tag, mode) {
                tracing::warn!(file = loc.file, line = loc.line, entry = tag, previous = %prev, "entry previously set");
            }
        }
        PrimitiveKind::IpMask(list) => {
            let mask = words.next().ok_or_else(|| loc.syntax("Expecting mask."))?;
            let value = scan_ip(word).ok_or_else(|| loc.syntax(format!("Bad address \"{word}\".")))?;
            let mask = scan_ip(mask).ok_or_else(|| loc.syntax(format!("Bad mask \"{mask}\".")))?;
            push_mask(loc, list, MaskEntry { value, mask, mode });
        }
        PrimitiveKind::TagMask(list) => {
            let mask = words.next().ok_or_else(|| loc.syntax("Expecting mask."))?;
            let value = tag_value(loc, ctx, word)?;
            let mask = parse_c_ulong(mask).ok_or_else(|| loc.syntax(format!("Bad mask \"{mask}\".")))?;
            push_mask(loc, list, MaskEntry { value, mask, mode });
        }
        PrimitiveKind::IpPrefix(trie) => {
            let (addr, len) =
                scan_ip_prefix(word).ok_or_else(|| loc.syntax(format!("Bad prefix \"{word}\".")))?;
            trie.insert(addr, len, mode);
        }
        PrimitiveKind::Counter(list) => {
            let value = words.next().ok_or_else(|| loc.syntax("Expecting counter."))?;
            let op = parse_op(loc, word)?;
            let value = parse_c_ulong(value).ok_or_else(|| loc.syntax(format!("Bad counter \"{value}\".")))?;
            push_op(loc, list, OpEntry { value, op, mode });
        }
        PrimitiveKind::TimeDate(list) => {
            let rest: Vec<&str> = words.by_ref().collect();
            if rest.is_empty() {
                return Err(loc.syntax("Expecting time/date."));
            }
            let value = ctx
                .dates
                .parse(&rest.join(" "))
                .ok_or_else(|| loc.syntax("Cannot parse time/date."))?;
            let op = parse_op(loc, word)?;
            push_op(loc, list, OpEntry { value, op, mode });
        }
        PrimitiveKind::Time(list) => {
            let value = words.next().ok_or_else(|| loc.syntax("Expecting time value."))?;
            let op = parse_op(loc, word)?;
            let (hour, min, sec) = parse_time_of_day(loc, value)?;
            let entry = TimeEntry {
                hour,
                min,
                sec,
                op,
                mode,
            };
            if let Some(prev) = list
                .iter()
                .find(|e| (e.hour, e.min, e.sec, e.op) == (hour, min, sec, op))
            {
                tracing::warn!(
                    file = loc.file,
                    line = loc.line,
                    entry = %format!("{} {}:{}:{}", op.name(), hour, min, sec),
                    previous = %prev.mode,
                    "entry previously set"
                );
            }
            list.push(entry);
        }
        PrimitiveKind::Double(list) => {
            let value = words.next().ok_or_else(|| loc.syntax("Expecting counter."))?;
            let op = parse_op(loc, word)?;
            let value: f64 = value
                .parse()
                .map_err(|_| loc.syntax(format!("Bad number \"{value}\".")))?;
            push_op(loc, list, OpEntry { value, op, mode });
        }
        PrimitiveKind::Rate { rate, mode: rate_mode } => {
            if *rate != 0 {
                tracing::warn!(file = loc.file, line = loc.line, "Rate previously set.");
            }
            let n: u32 = word.parse().unwrap_or(0);
            if n == 0 {
                return Err(loc.out_of_range(word));
            }
            *rate = n;
            *rate_mode = Some(mode);
        }
        _ => {}
    }
    Ok(())
}

fn parse_op(loc: Loc<'_>, word: &str) -> Result<Op> {
    Op::parse(word).ok_or_else(|| loc.syntax("Expecting one of {lt,gt,eq,ne,le,ge}"))
}

fn tag_value(loc: Loc<'_>, ctx: &LoadContext<'_>, word: &str) -> Result<u32> {
    if word.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return ctx
            .symbols
            .tag
            .as_deref()
            .and_then(|t| t.find_by_name(word))
            .ok_or_else(|| loc.symbol(word));
    }
    parse_c_ulong(word).ok_or_else(|| loc.syntax(format!("Bad tag \"{word}\".")))
}

fn push_mask(loc: Loc<'_>, list: &mut Vec<MaskEntry>, entry: MaskEntry) {
    if let Some(prev) = list
        .iter()
        .find(|e| e.value == entry.value && e.mask == entry.mask)
    {
        tracing::warn!(
            file = loc.file,
            line = loc.line,
            value = entry.value,
            mask = entry.mask,
            previous = %prev.mode,
            "entry previously set"
        );
    }
    list.push(entry);
}

fn push_op<T: PartialEq + std::fmt::Display + Copy>(
    loc: Loc<'_>,
    list: &mut Vec<OpEntry<T>>,
    entry: OpEntry<T>,
) {
    if let Some(prev) = list
        .iter()
        .find(|e| e.value == entry.value && e.op == entry.op)
    {
        tracing::warn!(
            file = loc.file,
            line = loc.line,
            entry = %format!("{} {}", entry.op.name(), entry.value),
            previous = %prev.mode,
            "entry previously set"
        );
    }
    list.push(entry);
}

/// `hh[:mm[:ss]]`.
fn parse_time_of_day(loc: Loc<'_>, text: &str) -> Result<(u32, u32, u32)> {
    let mut parts = text.splitn(4, ':');
    let mut next = || -> Result<u32> {
        match parts.next() {
            None => Ok(0),
            Some(p) => p
                .parse()
                .map_err(|_| loc.syntax(format!("Bad time \"{text}\"."))),
        }
    };
    let hms = (next()?, next()?, next()?);
    if let Some(extra) = parts.next() {
        return Err(loc.syntax(format!("Unexpected text: {extra}")));
    }
    Ok(hms)
}

// ── Addresses ──────────────────────────────────────────────────────

/// Dotted quad to host-order `u32`. Partial quads are left aligned, so `10`
/// is `10.0.0.0` and `10.1` is `10.1.0.0`. Host names are not resolved.
pub fn scan_ip(s: &str) -> Option<u32> {
    let mut octets = [0u8; 4];
    let mut n = 0;
    for part in s.split('.') {
        if n == 4 {
            return None;
        }
        octets[n] = part.parse().ok()?;
        n += 1;
    }
    Some(u32::from_be_bytes(octets))
}

/// `addr[/len]`. Without `/len` a classful network address gets its class
/// length (A 8, B 16, C 24, D 28); anything else is a host route. Lengths
/// above 32 clamp.
pub fn scan_ip_prefix(s: &str) -> Option<(u32, u8)> {
    let (addr, len) = match s.split_once('/') {
        Some((addr, len)) => {
            let addr = scan_ip(addr)?;
            let len: u32 = len.parse().ok()?;
            (addr, len.min(32) as u8)
        }
        None => {
            let addr = scan_ip(s)?;
            (addr, classful_len(addr))
        }
    };
    Some((addr, len))
}

fn classful_len(addr: u32) -> u8 {
    const CLASSES: [(u32, u32, u32, u8); 4] = [
        (0x8000_0000, 0x0000_0000, 0xFF00_0000, 8),
        (0xC000_0000, 0x8000_0000, 0xFFFF_0000, 16),
        (0xE000_0000, 0xC000_0000, 0xFFFF_FF00, 24),
        (0xF000_0000, 0xE000_0000, 0xFFFF_FFF0, 28),
    ];
    for (class_mask, class_bits, net_mask, len) in CLASSES {
        if addr & class_mask == class_bits {
            return if addr & net_mask == addr { len } else { 32 };
        }
    }
    32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::symbols::{SymbolTable, Symbols};
    use crate::filter::vars::Variables;

    fn parse_ok(text: &str) -> FilterSet {
        parse("test.cfg", text, &LoadContext::default()).unwrap()
    }

    fn parse_err(text: &str) -> FlowError {
        parse("test.cfg", text, &LoadContext::default()).unwrap_err()
    }

    fn syntax_msg(err: FlowError) -> (usize, String) {
        match err {
            FlowError::ParseSyntaxError { line, msg, .. } => (line, msg),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    mod grammar_tests {
        use super::*;

        #[test]
        fn test_comments_and_blank_lines() {
            let set = parse_ok("# top\n\n   \nfilter-primitive p\n  # inner\n  type ip-port\n");
            assert_eq!(set.primitives.len(), 1);
        }

        #[test]
        fn test_directives_case_insensitive() {
            let set = parse_ok("FILTER-PRIMITIVE p\n TYPE IP-PORT\n PERMIT 80\n DEFAULT Permit\n");
            assert_eq!(set.primitives[0].default, Verdict::Permit);
        }

        #[test]
        fn test_out_of_state_directive() {
            let (line, msg) = syntax_msg(parse_err("type ip-port\n"));
            assert_eq!(line, 1);
            assert_eq!(msg, "Unexpected \"type\".");

            let (line, msg) = syntax_msg(parse_err("filter-definition d\n permit 80\n"));
            assert_eq!(line, 2);
            assert_eq!(msg, "Unexpected \"permit\".");
        }

        #[test]
        fn test_trailing_word() {
            let (line, msg) = syntax_msg(parse_err("filter-primitive p\n type ip-port extra\n"));
            assert_eq!(line, 2);
            assert_eq!(msg, "Unexpected \"extra\".");
        }

        #[test]
        fn test_missing_arguments() {
            assert_eq!(syntax_msg(parse_err("filter-primitive\n")).1, "Expecting name.");
            assert_eq!(syntax_msg(parse_err("filter-primitive p\n type\n")).1, "Expecting type.");
            assert_eq!(
                syntax_msg(parse_err("filter-definition d\n match\n")).1,
                "Expecting match type."
            );
            assert_eq!(
                syntax_msg(parse_err("filter-definition d\n match src-as\n")).1,
                "Expecting match primitive."
            );
            assert_eq!(
                syntax_msg(parse_err("filter-primitive p\n type as\n permit\n")).1,
                "Expecting permit/deny data."
            );
        }

        #[test]
        fn test_duplicate_names() {
            let err = parse_err("filter-primitive p\n type as\nfilter-primitive P\n");
            assert!(matches!(err, FlowError::DuplicateName { line: 3, .. }));
            let err = parse_err("filter-definition d\nfilter-definition D\n");
            assert!(matches!(err, FlowError::DuplicateName { line: 2, .. }));
        }

        #[test]
        fn test_type_rules() {
            assert_eq!(
                syntax_msg(parse_err("filter-primitive p\n type as\n type as\n")).1,
                "Type previously defined."
            );
            assert_eq!(
                syntax_msg(parse_err("filter-primitive p\n type ipv6\n")).1,
                "Unrecognized type."
            );
            assert_eq!(
                syntax_msg(parse_err("filter-primitive p\n permit 1\n")).1,
                "Must set type first."
            );
            assert_eq!(
                syntax_msg(parse_err("filter-primitive p\n default deny\n")).1,
                "Must set type first."
            );
        }

        #[test]
        fn test_mask_rules() {
            let set = parse_ok("filter-primitive t\n type ip-tos\n mask 0x1c\n permit 4\n");
            assert!(matches!(set.primitives[0].kind, PrimitiveKind::IpTos { mask: 0x1c, .. }));
            assert_eq!(
                syntax_msg(parse_err("filter-primitive p\n type as\n mask 3\n")).1,
                "Mask not supported for primitive."
            );
            assert_eq!(
                syntax_msg(parse_err("filter-primitive p\n type ip-tos\n mask\n")).1,
                "Expecting mask value."
            );
        }

        #[test]
        fn test_default_needs_mode() {
            assert_eq!(
                syntax_msg(parse_err("filter-primitive p\n type as\n default maybe\n")).1,
                "Expecting permit or deny."
            );
        }

        #[test]
        fn test_default_on_rate_is_ignored() {
            let set = parse_ok("filter-primitive r\n type rate\n permit 10\n default deny\n");
            assert!(matches!(
                set.primitives[0].kind,
                PrimitiveKind::Rate {
                    rate: 10,
                    mode: Some(Verdict::Permit)
                }
            ));
        }
    }

    mod value_tests {
        use super::*;

        #[test]
        fn test_out_of_range_and_symbol_errors() {
            let err = parse_err("filter-primitive p\n type ip-protocol\n permit 256\n");
            assert!(matches!(err, FlowError::ValueOutOfRange { line: 3, .. }));
            let err = parse_err("filter-primitive p\n type ip-protocol\n permit tcp\n");
            assert!(matches!(err, FlowError::SymbolLookupFailure { ref symbol, .. } if symbol == "tcp"));
        }

        #[test]
        fn test_symbols_by_kind() {
            let ctx = LoadContext {
                symbols: Symbols {
                    ip_protocol: Some(Box::new(SymbolTable::parse("6 tcp\n"))),
                    ..Symbols::default()
                },
                ..LoadContext::default()
            };
            let set = parse(
                "syms",
                "filter-primitive p\n type ip-protocol\n permit tcp\n",
                &ctx,
            )
            .unwrap();
            match &set.primitives[0].kind {
                PrimitiveKind::IpProtocol(t) => assert_eq!(t.get(6), Some(Verdict::Permit)),
                other => panic!("unexpected kind {other:?}"),
            }
            // ports do not borrow the protocol table
            assert!(parse("syms", "filter-primitive q\n type ip-port\n permit tcp\n", &ctx).is_err());
        }

        #[test]
        fn test_mask_list_needs_mask() {
            assert_eq!(
                syntax_msg(parse_err("filter-primitive m\n type ip-address-mask\n permit 10.0.0.0\n")).1,
                "Expecting mask."
            );
        }

        #[test]
        fn test_counter_values() {
            let set = parse_ok("filter-primitive c\n type counter\n permit gt 0x10\n deny LE 5\n");
            match &set.primitives[0].kind {
                PrimitiveKind::Counter(list) => {
                    assert_eq!(list.len(), 2);
                    assert_eq!((list[0].op, list[0].value), (Op::Gt, 16));
                    assert_eq!((list[1].op, list[1].value), (Op::Le, 5));
                }
                other => panic!("unexpected kind {other:?}"),
            }
            assert_eq!(
                syntax_msg(parse_err("filter-primitive c\n type counter\n permit about 5\n")).1,
                "Expecting one of {lt,gt,eq,ne,le,ge}"
            );
        }

        #[test]
        fn test_time_date_takes_rest_of_line() {
            let set = parse_ok("filter-primitive t\n type time-date\n permit ge 1970-01-01T00:01:40Z\n");
            match &set.primitives[0].kind {
                PrimitiveKind::TimeDate(list) => assert_eq!(list[0].value, 100),
                other => panic!("unexpected kind {other:?}"),
            }
            let set = parse_ok("filter-primitive t\n type time-date\n permit lt 2001-02-03 04:05:06\n");
            assert!(matches!(&set.primitives[0].kind, PrimitiveKind::TimeDate(l) if l.len() == 1));
            assert_eq!(
                syntax_msg(parse_err("filter-primitive t\n type time-date\n permit lt\n")).1,
                "Expecting time/date."
            );
            assert_eq!(
                syntax_msg(parse_err("filter-primitive t\n type time-date\n permit lt someday\n")).1,
                "Cannot parse time/date."
            );
        }

        #[test]
        fn test_time_of_day() {
            let set = parse_ok("filter-primitive t\n type time\n permit gt 13\n deny lt 8:30:15\n");
            match &set.primitives[0].kind {
                PrimitiveKind::Time(list) => {
                    assert_eq!((list[0].hour, list[0].min, list[0].sec), (13, 0, 0));
                    assert_eq!((list[1].hour, list[1].min, list[1].sec), (8, 30, 15));
                }
                other => panic!("unexpected kind {other:?}"),
            }
            assert_eq!(
                syntax_msg(parse_err("filter-primitive t\n type time\n permit gt 1:2:3:4\n")).1,
                "Unexpected text: 4"
            );
        }

        #[test]
        fn test_rate_zero() {
            let err = parse_err("filter-primitive r\n type rate\n permit 0\n");
            assert!(matches!(err, FlowError::ValueOutOfRange { .. }));
        }

        #[test]
        fn test_variables_substituted_first() {
            let mut vars = Variables::new();
            vars.set("PORTS", "22,80");
            let ctx = LoadContext {
                vars: Some(&vars),
                ..LoadContext::default()
            };
            let set = parse("v", "filter-primitive p\n type ip-port\n permit @PORTS\n", &ctx).unwrap();
            match &set.primitives[0].kind {
                PrimitiveKind::IpPort(t) => {
                    assert_eq!(t.get(22), Some(Verdict::Permit));
                    assert_eq!(t.get(80), Some(Verdict::Permit));
                }
                other => panic!("unexpected kind {other:?}"),
            }

            let err = parse("v", "filter-primitive p\n type ip-port\n permit @{PORTS\n", &ctx).unwrap_err();
            assert_eq!(syntax_msg(err).0, 3);
        }
    }

    mod definition_tests {
        use super::*;

        const PRIMS: &str = "filter-primitive a\n type ip-port\n permit 1\n\
                             filter-primitive b\n type ip-port\n permit 2\n";

        #[test]
        fn test_groups_split_on_or() {
            let set = parse_ok(&format!(
                "{PRIMS}filter-definition d\n match src-ip-port a\n match dst-ip-port b\n or\n match src-ip-port b\n"
            ));
            let d = set.definition("d").unwrap();
            assert_eq!(d.groups.len(), 2);
            assert_eq!(d.groups[0].len(), 2);
            assert_eq!(d.groups[1].len(), 1);
        }

        #[test]
        fn test_leading_and_repeated_or_add_nothing() {
            let set = parse_ok(&format!(
                "{PRIMS}filter-definition d\n or\n match src-ip-port a\n or\n or\n match dst-ip-port b\n"
            ));
            assert_eq!(set.definition("d").unwrap().groups.len(), 2);
        }

        #[test]
        fn test_forward_reference() {
            let set = parse_ok(&format!(
                "filter-definition d\n match src-ip-port later\n{}",
                "filter-primitive later\n type ip-port\n"
            ));
            assert_eq!(set.definition("d").unwrap().groups[0][0].primitive.0, 0);
        }

        #[test]
        fn test_unresolved_primitive() {
            let err = parse_err("filter-definition d\n match src-ip-port ghost\n");
            assert!(matches!(
                err,
                FlowError::UnresolvedPrimitive { ref definition, ref name } if definition == "d" && name == "ghost"
            ));
        }

        #[test]
        fn test_incompatible_match() {
            let err = parse_err(&format!("{PRIMS}filter-definition d\n match src-as a\n"));
            assert!(matches!(err, FlowError::IncompatibleMatchType { .. }));
            let err = parse_err("filter-primitive u\nfilter-definition d\n match src-as u\n");
            assert!(matches!(err, FlowError::IncompatibleMatchType { .. }));
        }

        #[test]
        fn test_unknown_match_type() {
            let (line, _) = syntax_msg(parse_err(&format!("{PRIMS}filter-definition d\n\n match colour a\n")));
            assert_eq!(line, 9);
        }

        #[test]
        fn test_invert_and_xfields() {
            use crate::record::xfield;
            let set = parse_ok(&format!(
                "{PRIMS}filter-definition d\n match src-ip-port a\n or\n match dst-ip-port b\n invert\n"
            ));
            let d = set.definition("D").unwrap();
            assert!(d.invert);
            assert_eq!(d.xfields, xfield::SRCPORT | xfield::DSTPORT);
        }
    }

    mod address_tests {
        use super::*;

        #[test]
        fn test_scan_ip() {
            assert_eq!(scan_ip("10.1.2.3"), Some(0x0A01_0203));
            assert_eq!(scan_ip("10"), Some(0x0A00_0000));
            assert_eq!(scan_ip("192.168"), Some(0xC0A8_0000));
            assert_eq!(scan_ip("1.2.3.4.5"), None);
            assert_eq!(scan_ip("256.0.0.0"), None);
            assert_eq!(scan_ip("host.example"), None);
        }

        #[test]
        fn test_scan_ip_prefix() {
            assert_eq!(scan_ip_prefix("10/8"), Some((0x0A00_0000, 8)));
            assert_eq!(scan_ip_prefix("10.1.2.0/40"), Some((0x0A01_0200, 32)));
            assert_eq!(scan_ip_prefix("10"), Some((0x0A00_0000, 8)));
            assert_eq!(scan_ip_prefix("172.16"), Some((0xAC10_0000, 16)));
            assert_eq!(scan_ip_prefix("192.168.1"), Some((0xC0A8_0100, 24)));
            assert_eq!(scan_ip_prefix("224.0.0.0"), Some((0xE000_0000, 28)));
            assert_eq!(scan_ip_prefix("10.1.0.0"), Some((0x0A01_0000, 32)));
            assert_eq!(scan_ip_prefix("240.0.0.0"), Some((0xF000_0000, 32)));
            assert_eq!(scan_ip_prefix("10/x"), None);
        }
    }
}
