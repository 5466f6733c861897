//! Match types and the second parse pass.
//!
//! Definitions are parsed into string pairs first so they may name
//! primitives declared later in the file. [`resolve_definitions`] turns those
//! pairs into [`MatchItem`]s once every primitive is known.

use crate::error::{FlowError, Result};
use crate::record::{flow_time, xfield, Field, FieldOffsets};

use super::parser::ParsedDefinition;
use super::primitive::{Primitive, PrimitiveKind};
use super::{Definition, MatchItem, PrimitiveId, SetId};

/// Which record value a definition item hands to its primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchField {
    SrcAs,
    DstAs,
    IpProtocol,
    SrcPrefixLen,
    DstPrefixLen,
    IpTos,
    IpMarkedTos,
    TcpFlags,
    SrcPort,
    DstPort,
    InputIf,
    OutputIf,
    EngineId,
    EngineType,
    Flows,
    Octets,
    Packets,
    ExtraPackets,
    Duration,
    StartTime,
    EndTime,
    SrcTag,
    DstTag,
    NexthopAddr,
    ShortcutAddr,
    SrcAddr,
    DstAddr,
    ExporterAddr,
    Bps,
    Pps,
    RandomSample,
}

/// `(name, alias, field)`; an empty alias means none.
const NAMES: &[(&str, &str, MatchField)] = &[
    ("src-as", "source-as", MatchField::SrcAs),
    ("dst-as", "destination-as", MatchField::DstAs),
    ("ip-protocol", "", MatchField::IpProtocol),
    ("src-ip-addr-prefix-len", "ip-source-address-prefix-len", MatchField::SrcPrefixLen),
    ("dst-ip-addr-prefix-len", "ip-destination-address-prefix-len", MatchField::DstPrefixLen),
    ("ip-tos", "", MatchField::IpTos),
    ("ip-marked-tos", "", MatchField::IpMarkedTos),
    ("ip-tcp-flags", "", MatchField::TcpFlags),
    ("src-ip-port", "ip-source-port", MatchField::SrcPort),
    ("dst-ip-port", "ip-destination-port", MatchField::DstPort),
    ("src-ifindex", "input-interface", MatchField::InputIf),
    ("dst-ifindex", "output-interface", MatchField::OutputIf),
    ("engine-id", "", MatchField::EngineId),
    ("engine-type", "", MatchField::EngineType),
    ("flows", "", MatchField::Flows),
    ("octets", "", MatchField::Octets),
    ("packets", "", MatchField::Packets),
    ("extra-packets", "", MatchField::ExtraPackets),
    ("duration", "", MatchField::Duration),
    ("start-time", "", MatchField::StartTime),
    ("end-time", "", MatchField::EndTime),
    ("src-tag", "source-tag", MatchField::SrcTag),
    ("dst-tag", "destination-tag", MatchField::DstTag),
    ("nexthop-ip-addr", "ip-nexthop-address", MatchField::NexthopAddr),
    ("shortcut-ip-addr", "ip-shortcut-address", MatchField::ShortcutAddr),
    ("src-ip-addr", "ip-source-address", MatchField::SrcAddr),
    ("dst-ip-addr", "ip-destination-address", MatchField::DstAddr),
    ("exporter-ip-addr", "ip-exporter-address", MatchField::ExporterAddr),
    ("bps", "", MatchField::Bps),
    ("pps", "", MatchField::Pps),
    ("random-sample", "", MatchField::RandomSample),
];

impl MatchField {
    /// Case-insensitive lookup by name or alias.
    pub fn from_name(name: &str) -> Option<Self> {
        NAMES
            .iter()
            .find(|(n, alias, _)| {
                n.eq_ignore_ascii_case(name) || (!alias.is_empty() && alias.eq_ignore_ascii_case(name))
            })
            .map(|&(_, _, field)| field)
    }

    pub fn name(self) -> &'static str {
        NAMES
            .iter()
            .find(|(_, _, f)| *f == self)
            .map(|(n, _, _)| *n)
            .unwrap_or("?")
    }

    /// Record fields this match reads.
    pub fn xfields(self) -> u64 {
        use xfield::*;
        match self {
            MatchField::SrcAs => SRC_AS,
            MatchField::DstAs => DST_AS,
            MatchField::IpProtocol => PROT,
            MatchField::SrcPrefixLen => SRC_MASK,
            MatchField::DstPrefixLen => DST_MASK,
            MatchField::IpTos => TOS,
            MatchField::IpMarkedTos => MARKED_TOS,
            MatchField::TcpFlags => TCP_FLAGS,
            MatchField::SrcPort => SRCPORT,
            MatchField::DstPort => DSTPORT,
            MatchField::InputIf => INPUT,
            MatchField::OutputIf => OUTPUT,
            MatchField::EngineId => ENGINE_ID,
            MatchField::EngineType => ENGINE_TYPE,
            MatchField::Flows => DFLOWS,
            MatchField::Octets => DOCTETS,
            MatchField::Packets => DPKTS,
            MatchField::ExtraPackets => EXTRA_PKTS,
            MatchField::Duration => FIRST | LAST,
            MatchField::StartTime => FIRST | UNIX_SECS | UNIX_NSECS | SYSUPTIME,
            MatchField::EndTime => LAST | UNIX_SECS | UNIX_NSECS | SYSUPTIME,
            MatchField::SrcTag => SRC_TAG,
            MatchField::DstTag => DST_TAG,
            MatchField::NexthopAddr => NEXTHOP,
            MatchField::ShortcutAddr => ROUTER_SC,
            MatchField::SrcAddr => SRCADDR,
            MatchField::DstAddr => DSTADDR,
            MatchField::ExporterAddr => EXADDR,
            MatchField::Bps => DOCTETS | FIRST | LAST,
            MatchField::Pps => DPKTS | FIRST | LAST,
            MatchField::RandomSample => 0,
        }
    }

    /// Whether a primitive of `kind` can evaluate this match.
    pub fn accepts(self, kind: &PrimitiveKind) -> bool {
        use MatchField as M;
        use PrimitiveKind as K;
        match kind {
            K::As(_) => matches!(self, M::SrcAs | M::DstAs),
            K::IpProtocol(_) => self == M::IpProtocol,
            K::PrefixLen(_) => matches!(self, M::SrcPrefixLen | M::DstPrefixLen),
            K::IpTos { .. } => matches!(self, M::IpTos | M::IpMarkedTos),
            K::TcpFlags { .. } => self == M::TcpFlags,
            K::IpPort(_) => matches!(self, M::SrcPort | M::DstPort),
            K::IfIndex(_) => matches!(self, M::InputIf | M::OutputIf),
            K::Engine(_) => matches!(self, M::EngineId | M::EngineType),
            K::Counter(_) => matches!(
                self,
                M::Flows | M::Octets | M::Packets | M::ExtraPackets | M::Duration | M::StartTime
            ),
            K::TimeDate(_) | K::Time(_) => matches!(self, M::StartTime | M::EndTime),
            K::Tag(_) | K::TagMask(_) => matches!(self, M::SrcTag | M::DstTag),
            K::IpAddress(_) | K::IpMask(_) | K::IpPrefix(_) => matches!(
                self,
                M::NexthopAddr | M::ShortcutAddr | M::SrcAddr | M::DstAddr | M::ExporterAddr
            ),
            K::Double(_) => matches!(self, M::Bps | M::Pps),
            K::Rate { .. } => self == M::RandomSample,
        }
    }

    /// Integer value of this match for `rec`. Time matches yield flow epoch
    /// seconds.
    pub fn word(self, rec: &[u8], fo: &FieldOffsets) -> u32 {
        let field = match self {
            MatchField::Duration => {
                return fo.get(rec, Field::Last).wrapping_sub(fo.get(rec, Field::First));
            }
            MatchField::StartTime => return flow_secs(rec, fo, Field::First),
            MatchField::EndTime => return flow_secs(rec, fo, Field::Last),
            MatchField::Bps | MatchField::Pps | MatchField::RandomSample => return 0,
            MatchField::SrcAs => Field::SrcAs,
            MatchField::DstAs => Field::DstAs,
            MatchField::IpProtocol => Field::Prot,
            MatchField::SrcPrefixLen => Field::SrcMask,
            MatchField::DstPrefixLen => Field::DstMask,
            MatchField::IpTos => Field::Tos,
            MatchField::IpMarkedTos => Field::MarkedTos,
            MatchField::TcpFlags => Field::TcpFlags,
            MatchField::SrcPort => Field::Srcport,
            MatchField::DstPort => Field::Dstport,
            MatchField::InputIf => Field::Input,
            MatchField::OutputIf => Field::Output,
            MatchField::EngineId => Field::EngineId,
            MatchField::EngineType => Field::EngineType,
            MatchField::Flows => Field::DFlows,
            MatchField::Octets => Field::DOctets,
            MatchField::Packets => Field::DPkts,
            MatchField::ExtraPackets => Field::ExtraPkts,
            MatchField::SrcTag => Field::SrcTag,
            MatchField::DstTag => Field::DstTag,
            MatchField::NexthopAddr => Field::Nexthop,
            MatchField::ShortcutAddr => Field::RouterSc,
            MatchField::SrcAddr => Field::Srcaddr,
            MatchField::DstAddr => Field::Dstaddr,
            MatchField::ExporterAddr => Field::Exaddr,
        };
        fo.get(rec, field)
    }

    /// Bits or packets per second over the flow duration; 0 when the
    /// duration is 0.
    pub fn rate(self, rec: &[u8], fo: &FieldOffsets) -> f64 {
        let duration = MatchField::Duration.word(rec, fo);
        if duration == 0 {
            return 0.0;
        }
        let secs = f64::from(duration) / 1000.0;
        match self {
            MatchField::Bps => f64::from(fo.get(rec, Field::DOctets)) * 8.0 / secs,
            MatchField::Pps => f64::from(fo.get(rec, Field::DPkts)) / secs,
            _ => 0.0,
        }
    }
}

fn flow_secs(rec: &[u8], fo: &FieldOffsets, t: Field) -> u32 {
    flow_time(
        fo.get(rec, Field::SysUpTime),
        fo.get(rec, Field::UnixSecs),
        fo.get(rec, Field::UnixNsecs),
        fo.get(rec, t),
    )
    .secs
}

// ── Resolution pass ────────────────────────────────────────────────

/// Bind parsed match lines to primitives. `untyped` names primitives that
/// were declared without a `type` and so can accept no match.
pub(crate) fn resolve_definitions(
    set_id: SetId,
    file: &str,
    parsed: Vec<ParsedDefinition>,
    primitives: &[Primitive],
    untyped: &[String],
) -> Result<Vec<Definition>> {
    parsed
        .into_iter()
        .map(|pd| {
            let mut xfields = 0u64;
            let mut groups = Vec::with_capacity(pd.groups.len());
            for group in pd.groups {
                let mut items = Vec::with_capacity(group.len());
                for m in group {
                    let field = MatchField::from_name(&m.match_type).ok_or_else(|| {
                        FlowError::ParseSyntaxError {
                            file: file.to_string(),
                            line: m.line,
                            msg: format!("Unrecognized match type ({}).", m.match_type),
                        }
                    })?;

                    if untyped.iter().any(|n| n.eq_ignore_ascii_case(&m.primitive)) {
                        return Err(FlowError::IncompatibleMatchType {
                            match_type: m.match_type,
                            primitive: m.primitive,
                        });
                    }
                    let id = primitives
                        .iter()
                        .position(|p| p.name.eq_ignore_ascii_case(&m.primitive))
                        .ok_or_else(|| FlowError::UnresolvedPrimitive {
                            definition: pd.name.clone(),
                            name: m.primitive.clone(),
                        })?;
                    if !field.accepts(&primitives[id].kind) {
                        return Err(FlowError::IncompatibleMatchType {
                            match_type: m.match_type,
                            primitive: m.primitive,
                        });
                    }

                    xfields |= field.xfields();
                    items.push(MatchItem {
                        field,
                        primitive: PrimitiveId(id),
                    });
                }
                groups.push(items);
            }
            Ok(Definition {
                set: set_id,
                name: pd.name,
                groups,
                invert: pd.invert,
                xfields,
            })
        })
        .collect()
}
