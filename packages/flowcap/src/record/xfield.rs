//! Extended-field availability bits.
//!
//! Each record field a filter can read has one bit. A record shape's mask is
//! the OR of the bits of the fields its layout carries; a filter definition
//! accumulates the bits of the fields it reads.

use super::layout::{Field, Layout};

pub const UNIX_SECS: u64 = 0x1;
pub const UNIX_NSECS: u64 = 0x2;
pub const SYSUPTIME: u64 = 0x4;
pub const EXADDR: u64 = 0x8;
pub const DFLOWS: u64 = 0x10;
pub const DPKTS: u64 = 0x20;
pub const DOCTETS: u64 = 0x40;
pub const FIRST: u64 = 0x80;
pub const LAST: u64 = 0x100;
pub const ENGINE_TYPE: u64 = 0x200;
pub const ENGINE_ID: u64 = 0x400;
pub const SRCADDR: u64 = 0x1000;
pub const DSTADDR: u64 = 0x2000;
pub const NEXTHOP: u64 = 0x10000;
pub const INPUT: u64 = 0x20000;
pub const OUTPUT: u64 = 0x40000;
pub const SRCPORT: u64 = 0x80000;
pub const DSTPORT: u64 = 0x100000;
pub const PROT: u64 = 0x200000;
pub const TOS: u64 = 0x400000;
pub const TCP_FLAGS: u64 = 0x800000;
pub const SRC_MASK: u64 = 0x1000000;
pub const DST_MASK: u64 = 0x2000000;
pub const SRC_AS: u64 = 0x4000000;
pub const DST_AS: u64 = 0x8000000;
pub const IN_ENCAPS: u64 = 0x10000000;
pub const OUT_ENCAPS: u64 = 0x20000000;
pub const PEER_NEXTHOP: u64 = 0x40000000;
pub const ROUTER_SC: u64 = 0x80000000;
pub const EXTRA_PKTS: u64 = 0x1_0000_0000;
pub const MARKED_TOS: u64 = 0x2_0000_0000;
pub const SRC_TAG: u64 = 0x4_0000_0000;
pub const DST_TAG: u64 = 0x8_0000_0000;

/// Printable names, in bit order.
pub const NAMES: &[(u64, &str)] = &[
    (UNIX_SECS, "unix_secs"),
    (UNIX_NSECS, "unix_nsecs"),
    (SYSUPTIME, "sysuptime"),
    (EXADDR, "exaddr"),
    (DFLOWS, "dflows"),
    (DPKTS, "dpkts"),
    (DOCTETS, "doctets"),
    (FIRST, "first"),
    (LAST, "last"),
    (ENGINE_TYPE, "engine_type"),
    (ENGINE_ID, "engine_id"),
    (SRCADDR, "srcaddr"),
    (DSTADDR, "dstaddr"),
    (NEXTHOP, "nexthop"),
    (INPUT, "input"),
    (OUTPUT, "output"),
    (SRCPORT, "srcport"),
    (DSTPORT, "dstport"),
    (PROT, "prot"),
    (TOS, "tos"),
    (TCP_FLAGS, "tcp_flags"),
    (SRC_MASK, "src_mask"),
    (DST_MASK, "dst_mask"),
    (SRC_AS, "src_as"),
    (DST_AS, "dst_as"),
    (IN_ENCAPS, "in_encaps"),
    (OUT_ENCAPS, "out_encaps"),
    (PEER_NEXTHOP, "peer_nexthop"),
    (ROUTER_SC, "router_sc"),
    (EXTRA_PKTS, "extra_pkts"),
    (MARKED_TOS, "marked_tos"),
    (SRC_TAG, "src_tag"),
    (DST_TAG, "dst_tag"),
];

/// Names of every bit set in `mask`.
pub fn names(mask: u64) -> Vec<&'static str> {
    NAMES
        .iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|(_, name)| *name)
        .collect()
}

impl Field {
    /// The availability bit for this field, 0 for fields filters never read.
    pub fn xfield(self) -> u64 {
        match self {
            Field::UnixSecs => UNIX_SECS,
            Field::UnixNsecs => UNIX_NSECS,
            Field::SysUpTime => SYSUPTIME,
            Field::Exaddr => EXADDR,
            Field::DFlows => DFLOWS,
            Field::DPkts => DPKTS,
            Field::DOctets => DOCTETS,
            Field::First => FIRST,
            Field::Last => LAST,
            Field::EngineType => ENGINE_TYPE,
            Field::EngineId => ENGINE_ID,
            Field::Srcaddr => SRCADDR,
            Field::Dstaddr => DSTADDR,
            Field::Nexthop => NEXTHOP,
            Field::Input => INPUT,
            Field::Output => OUTPUT,
            Field::Srcport => SRCPORT,
            Field::Dstport => DSTPORT,
            Field::Prot => PROT,
            Field::Tos => TOS,
            Field::TcpFlags => TCP_FLAGS,
            Field::SrcMask => SRC_MASK,
            Field::DstMask => DST_MASK,
            Field::SrcAs => SRC_AS,
            Field::DstAs => DST_AS,
            Field::InEncaps => IN_ENCAPS,
            Field::OutEncaps => OUT_ENCAPS,
            Field::PeerNexthop => PEER_NEXTHOP,
            Field::RouterSc => ROUTER_SC,
            Field::ExtraPkts => EXTRA_PKTS,
            Field::MarkedTos => MARKED_TOS,
            Field::SrcTag => SRC_TAG,
            Field::DstTag => DST_TAG,
            Field::UnixMsecs
            | Field::Flags
            | Field::TcpRetxCnt
            | Field::TcpRetxSecs
            | Field::TcpMisseqCnt
            | Field::Drops
            | Field::Pad => 0,
        }
    }
}

impl Layout {
    /// Availability mask of this record shape.
    pub fn xfields(&self) -> u64 {
        self.fields.iter().fold(0, |acc, (f, _)| acc | f.xfield())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::layout::*;

    #[test]
    fn test_masks_match_published_constants() {
        let expected: &[(&Layout, u64)] = &[
            (&V1, 0x0000_0000_00FF_31EF),
            (&V5, 0x0000_0000_0FFF_37EF),
            (&V6, 0x0000_0000_7FFF_37EF),
            (&V7, 0x0000_0000_8FFF_37EF),
            (&V1005, 0x0000_000C_0FFF_37EF),
            (&V8_1, 0x0C06_07FF),
            (&V8_6, 0x3_8044_27EF),
            (&V8_8, 0x3_807E_37EF),
            (&V8_14, 0x037E_37FF),
        ];
        for (layout, mask) in expected {
            assert_eq!(layout.xfields(), *mask, "{}", layout.name);
        }
    }

    #[test]
    fn test_v8_10_reports_interfaces() {
        // The layout carries input/output, so the mask advertises them.
        assert_eq!(V8_10.xfields() & (INPUT | OUTPUT), INPUT | OUTPUT);
    }

    #[test]
    fn test_names() {
        assert_eq!(names(SRCADDR | DST_TAG), vec!["srcaddr", "dst_tag"]);
        assert!(names(0).is_empty());
    }
}
