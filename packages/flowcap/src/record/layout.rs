//! Physical record layouts.
//!
//! Every on-disk record shape is described by a static field table. Offsets,
//! record size and the byte-swap procedure are all derived from the table
//! using C natural alignment (each field aligned to its own width, the whole
//! record padded to 4 bytes), so the tables match the historical structs
//! byte for byte.

/// A named field of a flow record.
///
/// `Pad` covers every padding / reserved slot; it is never resolved as an
/// offset but still participates in layout and byte swapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    UnixSecs,
    UnixNsecs,
    UnixMsecs,
    SysUpTime,
    Exaddr,
    Srcaddr,
    Dstaddr,
    Nexthop,
    Input,
    Output,
    DFlows,
    DPkts,
    DOctets,
    First,
    Last,
    Srcport,
    Dstport,
    Prot,
    Tos,
    TcpFlags,
    Flags,
    EngineType,
    EngineId,
    SrcMask,
    DstMask,
    SrcAs,
    DstAs,
    InEncaps,
    OutEncaps,
    PeerNexthop,
    RouterSc,
    ExtraPkts,
    MarkedTos,
    SrcTag,
    DstTag,
    TcpRetxCnt,
    TcpRetxSecs,
    TcpMisseqCnt,
    Drops,
    Pad,
}

/// Field table for one record shape.
#[derive(Debug)]
pub struct Layout {
    pub name: &'static str,
    pub fields: &'static [(Field, u8)],
}

impl Layout {
    /// Iterate `(field, offset, width)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, usize, usize)> + '_ {
        let mut pos = 0usize;
        self.fields.iter().map(move |&(field, width)| {
            let width = width as usize;
            pos = align(pos, width);
            let off = pos;
            pos += width;
            (field, off, width)
        })
    }

    /// Record size in bytes (struct padded to 4-byte alignment).
    pub fn size(&self) -> usize {
        let end = self.iter().last().map(|(_, off, w)| off + w).unwrap_or(0);
        align(end, 4)
    }

    /// Offset and width of the first occurrence of `field`.
    pub fn locate(&self, field: Field) -> Option<(usize, usize)> {
        if field == Field::Pad {
            return None;
        }
        self.iter()
            .find(|(f, _, _)| *f == field)
            .map(|(_, off, w)| (off, w))
    }

    /// Reverse the byte order of every multi-byte field in place.
    ///
    /// Applying it twice is the identity. `rec` must be at least `size()`
    /// bytes long.
    pub fn swap(&self, rec: &mut [u8]) {
        for (_, off, width) in self.iter() {
            if width > 1 {
                rec[off..off + width].reverse();
            }
        }
    }
}

fn align(pos: usize, to: usize) -> usize {
    (pos + to - 1) / to * to
}

use Field::*;

// ── Export v1 / v5 / v6 / v7 ──────────────────────────────────────

pub static V1: Layout = Layout {
    name: "v1",
    fields: &[
        (UnixSecs, 4), (UnixNsecs, 4), (SysUpTime, 4), (Exaddr, 4),
        (Srcaddr, 4), (Dstaddr, 4), (Nexthop, 4),
        (Input, 2), (Output, 2),
        (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (Srcport, 2), (Dstport, 2),
        (Prot, 1), (Tos, 1), (TcpFlags, 1), (Pad, 1),
        (Pad, 4),
    ],
};

pub static V5: Layout = Layout {
    name: "v5",
    fields: &[
        (UnixSecs, 4), (UnixNsecs, 4), (SysUpTime, 4), (Exaddr, 4),
        (Srcaddr, 4), (Dstaddr, 4), (Nexthop, 4),
        (Input, 2), (Output, 2),
        (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (Srcport, 2), (Dstport, 2),
        (Prot, 1), (Tos, 1), (TcpFlags, 1), (Pad, 1),
        (EngineType, 1), (EngineId, 1), (SrcMask, 1), (DstMask, 1),
        (SrcAs, 2), (DstAs, 2),
    ],
};

pub static V6: Layout = Layout {
    name: "v6",
    fields: &[
        (UnixSecs, 4), (UnixNsecs, 4), (SysUpTime, 4), (Exaddr, 4),
        (Srcaddr, 4), (Dstaddr, 4), (Nexthop, 4),
        (Input, 2), (Output, 2),
        (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (Srcport, 2), (Dstport, 2),
        (Prot, 1), (Tos, 1), (TcpFlags, 1), (Pad, 1),
        (EngineType, 1), (EngineId, 1), (SrcMask, 1), (DstMask, 1),
        (SrcAs, 2), (DstAs, 2),
        (InEncaps, 1), (OutEncaps, 1), (Pad, 2),
        (PeerNexthop, 4),
    ],
};

pub static V7: Layout = Layout {
    name: "v7",
    fields: &[
        (UnixSecs, 4), (UnixNsecs, 4), (SysUpTime, 4), (Exaddr, 4),
        (Srcaddr, 4), (Dstaddr, 4), (Nexthop, 4),
        (Input, 2), (Output, 2),
        (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (Srcport, 2), (Dstport, 2),
        (Prot, 1), (Tos, 1), (TcpFlags, 1), (Flags, 1),
        (EngineType, 1), (EngineId, 1), (SrcMask, 1), (DstMask, 1),
        (SrcAs, 2), (DstAs, 2),
        (RouterSc, 4),
    ],
};

/// Internal tagged v5.
pub static V1005: Layout = Layout {
    name: "v1005",
    fields: &[
        (UnixSecs, 4), (UnixNsecs, 4), (SysUpTime, 4), (Exaddr, 4),
        (Srcaddr, 4), (Dstaddr, 4), (Nexthop, 4),
        (Input, 2), (Output, 2),
        (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (Srcport, 2), (Dstport, 2),
        (Prot, 1), (Tos, 1), (TcpFlags, 1), (Pad, 1),
        (EngineType, 1), (EngineId, 1), (SrcMask, 1), (DstMask, 1),
        (SrcAs, 2), (DstAs, 2),
        (SrcTag, 4), (DstTag, 4),
    ],
};

/// Stream format 1 record. Translated to v1 / v5 on read.
pub static COMPAT_V1: Layout = Layout {
    name: "compat",
    fields: &[
        (UnixSecs, 4), (UnixMsecs, 4),
        (Srcaddr, 4), (Dstaddr, 4), (Nexthop, 4),
        (Input, 2), (Output, 2),
        (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (Srcport, 2), (Dstport, 2), (Pad, 2),
        (Prot, 1), (Tos, 1), (Flags, 1),
        (TcpRetxCnt, 1), (TcpRetxSecs, 1), (TcpMisseqCnt, 1),
        (SrcAs, 2), (DstAs, 2),
        (SrcMask, 1), (DstMask, 1),
        (Drops, 2),
    ],
};

// ── Export v8 aggregations ─────────────────────────────────────────

pub static V8_1: Layout = Layout {
    name: "v8.1",
    fields: &[
        (UnixSecs, 4), (UnixNsecs, 4), (SysUpTime, 4), (Exaddr, 4),
        (DFlows, 4), (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (SrcAs, 2), (DstAs, 2), (Input, 2), (Output, 2),
        (EngineType, 1), (EngineId, 1), (Pad, 2),
    ],
};

pub static V8_2: Layout = Layout {
    name: "v8.2",
    fields: &[
        (UnixSecs, 4), (UnixNsecs, 4), (SysUpTime, 4), (Exaddr, 4),
        (DFlows, 4), (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (Prot, 1), (Pad, 1), (Pad, 2),
        (Srcport, 2), (Dstport, 2),
        (EngineType, 1), (EngineId, 1), (Pad, 2),
    ],
};

pub static V8_3: Layout = Layout {
    name: "v8.3",
    fields: &[
        (UnixSecs, 4), (UnixNsecs, 4), (Exaddr, 4), (SysUpTime, 4),
        (DFlows, 4), (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (Srcaddr, 4), (SrcMask, 1), (Pad, 1), (SrcAs, 2), (Input, 2),
        (EngineType, 1), (EngineId, 1),
    ],
};

pub static V8_4: Layout = Layout {
    name: "v8.4",
    fields: &[
        (UnixSecs, 4), (UnixNsecs, 4), (SysUpTime, 4), (Exaddr, 4),
        (DFlows, 4), (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (Dstaddr, 4), (DstMask, 1), (Pad, 1),
        (EngineType, 1), (EngineId, 1), (DstAs, 2), (Output, 2),
    ],
};

pub static V8_5: Layout = Layout {
    name: "v8.5",
    fields: &[
        (UnixSecs, 4), (UnixNsecs, 4), (SysUpTime, 4), (Exaddr, 4),
        (DFlows, 4), (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (Srcaddr, 4), (Dstaddr, 4), (DstMask, 1), (SrcMask, 1),
        (EngineType, 1), (EngineId, 1),
        (SrcAs, 2), (DstAs, 2), (Input, 2), (Output, 2),
    ],
};

pub static V8_6: Layout = Layout {
    name: "v8.6",
    fields: &[
        (UnixSecs, 4), (UnixNsecs, 4), (SysUpTime, 4), (Exaddr, 4),
        (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (Dstaddr, 4), (ExtraPkts, 4), (RouterSc, 4),
        (Output, 2), (Pad, 2),
        (Tos, 1), (MarkedTos, 1), (EngineType, 1), (EngineId, 1),
    ],
};

pub static V8_7: Layout = Layout {
    name: "v8.7",
    fields: &[
        (UnixSecs, 4), (UnixNsecs, 4), (SysUpTime, 4), (Exaddr, 4),
        (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (Dstaddr, 4), (Srcaddr, 4), (ExtraPkts, 4), (RouterSc, 4),
        (Output, 2), (Input, 2),
        (Tos, 1), (MarkedTos, 1), (EngineType, 1), (EngineId, 1),
    ],
};

pub static V8_8: Layout = Layout {
    name: "v8.8",
    fields: &[
        (UnixSecs, 4), (UnixNsecs, 4), (SysUpTime, 4), (Exaddr, 4),
        (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (Dstaddr, 4), (Srcaddr, 4), (ExtraPkts, 4), (RouterSc, 4),
        (Dstport, 2), (Srcport, 2), (Output, 2), (Input, 2),
        (Tos, 1), (MarkedTos, 1), (EngineType, 1), (EngineId, 1),
        (Prot, 1), (Pad, 1), (Pad, 2),
    ],
};

pub static V8_9: Layout = Layout {
    name: "v8.9",
    fields: &[
        (UnixSecs, 4), (UnixNsecs, 4), (SysUpTime, 4), (Exaddr, 4),
        (DFlows, 4), (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (SrcAs, 2), (DstAs, 2), (Input, 2), (Output, 2),
        (EngineType, 1), (EngineId, 1), (Tos, 1), (Pad, 1),
    ],
};

pub static V8_10: Layout = Layout {
    name: "v8.10",
    fields: &[
        (UnixSecs, 4), (UnixNsecs, 4), (SysUpTime, 4), (Exaddr, 4),
        (DFlows, 4), (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (Srcport, 2), (Dstport, 2), (Input, 2), (Output, 2),
        (EngineType, 1), (EngineId, 1), (Prot, 1), (Tos, 1),
    ],
};

pub static V8_11: Layout = Layout {
    name: "v8.11",
    fields: &[
        (UnixSecs, 4), (UnixNsecs, 4), (Exaddr, 4), (SysUpTime, 4),
        (DFlows, 4), (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (Srcaddr, 4), (SrcMask, 1), (Tos, 1), (SrcAs, 2), (Input, 2),
        (EngineType, 1), (EngineId, 1),
    ],
};

pub static V8_12: Layout = Layout {
    name: "v8.12",
    fields: &[
        (UnixSecs, 4), (UnixNsecs, 4), (Exaddr, 4), (SysUpTime, 4),
        (DFlows, 4), (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (Dstaddr, 4), (Output, 2), (DstAs, 2),
        (DstMask, 1), (Tos, 1), (EngineType, 1), (EngineId, 1),
    ],
};

pub static V8_13: Layout = Layout {
    name: "v8.13",
    fields: &[
        (UnixSecs, 4), (UnixNsecs, 4), (SysUpTime, 4), (Exaddr, 4),
        (DFlows, 4), (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (Srcaddr, 4), (Dstaddr, 4),
        (SrcAs, 2), (DstAs, 2), (Input, 2), (Output, 2),
        (DstMask, 1), (SrcMask, 1), (EngineType, 1), (EngineId, 1),
        (Tos, 1), (Pad, 1), (Pad, 2),
    ],
};

pub static V8_14: Layout = Layout {
    name: "v8.14",
    fields: &[
        (UnixSecs, 4), (UnixNsecs, 4), (SysUpTime, 4), (Exaddr, 4),
        (DFlows, 4), (DPkts, 4), (DOctets, 4), (First, 4), (Last, 4),
        (Srcaddr, 4), (Dstaddr, 4),
        (Srcport, 2), (Dstport, 2), (Input, 2), (Output, 2),
        (DstMask, 1), (SrcMask, 1), (EngineType, 1), (EngineId, 1),
        (Tos, 1), (Prot, 1), (Pad, 2),
    ],
};

/// v8 layouts indexed by aggregation method - 1.
pub static V8_BY_METHOD: [&Layout; 14] = [
    &V8_1, &V8_2, &V8_3, &V8_4, &V8_5, &V8_6, &V8_7,
    &V8_8, &V8_9, &V8_10, &V8_11, &V8_12, &V8_13, &V8_14,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_sizes() {
        assert_eq!(V1.size(), 60);
        assert_eq!(V5.size(), 64);
        assert_eq!(V6.size(), 72);
        assert_eq!(V7.size(), 68);
        assert_eq!(V1005.size(), 72);
        assert_eq!(COMPAT_V1.size(), 60);
    }

    #[test]
    fn test_v8_sizes() {
        let sizes: Vec<usize> = V8_BY_METHOD.iter().map(|l| l.size()).collect();
        assert_eq!(
            sizes,
            vec![48, 48, 48, 48, 56, 52, 56, 64, 48, 48, 48, 48, 60, 60]
        );
    }

    #[test]
    fn test_offsets_follow_alignment() {
        // u16 input follows seven u32 words
        assert_eq!(V5.locate(Field::Input), Some((28, 2)));
        assert_eq!(V5.locate(Field::DPkts), Some((32, 4)));
        assert_eq!(V5.locate(Field::SrcAs), Some((60, 2)));
        // v8.3 puts exaddr before sysUpTime
        assert_eq!(V8_3.locate(Field::Exaddr), Some((8, 4)));
        assert_eq!(V8_3.locate(Field::SysUpTime), Some((12, 4)));
        assert_eq!(V6.locate(Field::PeerNexthop), Some((68, 4)));
    }

    #[test]
    fn test_pad_never_located() {
        assert_eq!(V1.locate(Field::Pad), None);
        assert_eq!(V5.locate(Field::DFlows), None);
    }

    #[test]
    fn test_swap_reverses_multibyte_fields_only() {
        let mut rec = vec![0u8; V5.size()];
        rec[0..4].copy_from_slice(&[1, 2, 3, 4]);
        rec[28..30].copy_from_slice(&[5, 6]);
        rec[52] = 7; // prot
        V5.swap(&mut rec);
        assert_eq!(&rec[0..4], &[4, 3, 2, 1]);
        assert_eq!(&rec[28..30], &[6, 5]);
        assert_eq!(rec[52], 7);
    }
}
