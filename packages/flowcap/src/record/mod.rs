//! Record version registry.
//!
//! Maps a stream's version tuple (stream format, export version, aggregation
//! version, aggregation method) to the physical record layout. The layout in
//! turn yields record size, byte-swap procedure, the extended-field
//! availability mask and per-field offsets. Pure lookup, no state.
//!
//! Stream format 1 stores a legacy compatibility record; readers translate it
//! to the export v1 or v5 shape before handing it out, so there are two
//! layouts per version: the *physical* one on disk and the *delivered* one
//! callers see.

pub mod layout;
pub mod xfield;

pub use layout::{Field, Layout};

use crate::error::{FlowError, Result};
use layout::*;

/// Export version value meaning "not set".
pub const D_VERSION_UNSET: u16 = 0xFFFF;

/// Aggregation version every v8 stream must carry.
pub const V8_AGG_VERSION: u8 = 2;

// ── Version tuple ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordVersion {
    pub s_version: u8,
    pub d_version: u16,
    pub agg_version: u8,
    pub agg_method: u8,
}

impl RecordVersion {
    pub fn new(s_version: u8, d_version: u16, agg_version: u8, agg_method: u8) -> Self {
        Self {
            s_version,
            d_version,
            agg_version,
            agg_method,
        }
    }

    /// Current-format stream of a non-aggregated export version.
    pub fn export(d_version: u16) -> Self {
        Self::new(3, d_version, 0, 0)
    }

    /// Current-format v8 stream with the given aggregation method.
    pub fn v8(agg_method: u8) -> Self {
        Self::new(3, 8, V8_AGG_VERSION, agg_method)
    }

    /// Layout of records as stored in the stream.
    pub fn physical_layout(&self) -> Result<&'static Layout> {
        match self.s_version {
            1 => {
                self.layout()?;
                Ok(&COMPAT_V1)
            }
            3 => export_layout(self.d_version, self.agg_version, self.agg_method),
            s => Err(FlowError::UnsupportedStreamVersion(s)),
        }
    }

    /// Layout of records as returned to callers.
    pub fn layout(&self) -> Result<&'static Layout> {
        match self.s_version {
            1 => match self.d_version {
                1 => Ok(&V1),
                5 => Ok(&V5),
                d => Err(FlowError::UnsupportedRecordType { d_version: d }),
            },
            3 => export_layout(self.d_version, self.agg_version, self.agg_method),
            s => Err(FlowError::UnsupportedStreamVersion(s)),
        }
    }

    /// On-disk record size.
    pub fn record_size(&self) -> Result<usize> {
        Ok(self.physical_layout()?.size())
    }

    /// Fields available in delivered records.
    pub fn xfields(&self) -> Result<u64> {
        Ok(self.layout()?.xfields())
    }
}

fn export_layout(d_version: u16, agg_version: u8, agg_method: u8) -> Result<&'static Layout> {
    match d_version {
        1 => Ok(&V1),
        5 => Ok(&V5),
        6 => Ok(&V6),
        7 => Ok(&V7),
        1005 => Ok(&V1005),
        8 => {
            if agg_version != V8_AGG_VERSION {
                return Err(FlowError::UnsupportedAggregation {
                    agg_version,
                    agg_method,
                });
            }
            match agg_method {
                1..=14 => Ok(V8_BY_METHOD[agg_method as usize - 1]),
                _ => Err(FlowError::UnsupportedAggregation {
                    agg_version,
                    agg_method,
                }),
            }
        }
        d => Err(FlowError::UnsupportedRecordType { d_version: d }),
    }
}

// ── Field offsets ──────────────────────────────────────────────────

const FIELD_COUNT: usize = Field::Pad as usize + 1;

/// Per-field `(offset, width)` for one layout, resolved once per stream.
///
/// Values are read and written in host byte order; records handed out by a
/// reader are already in host order.
#[derive(Debug, Clone)]
pub struct FieldOffsets {
    layout: &'static Layout,
    slots: [Option<(u16, u8)>; FIELD_COUNT],
}

impl FieldOffsets {
    pub fn resolve(layout: &'static Layout) -> Self {
        let mut slots = [None; FIELD_COUNT];
        for (field, off, width) in layout.iter() {
            let slot = &mut slots[field as usize];
            if field != Field::Pad && slot.is_none() {
                *slot = Some((off as u16, width as u8));
            }
        }
        Self { layout, slots }
    }

    pub fn layout(&self) -> &'static Layout {
        self.layout
    }

    pub fn offset(&self, field: Field) -> Option<usize> {
        self.slots[field as usize].map(|(off, _)| off as usize)
    }

    pub fn has(&self, field: Field) -> bool {
        self.slots[field as usize].is_some()
    }

    /// Read a field, widened to u32. Absent fields read as 0.
    #[inline]
    pub fn get(&self, rec: &[u8], field: Field) -> u32 {
        match self.slots[field as usize] {
            Some((off, 1)) => rec[off as usize] as u32,
            Some((off, 2)) => {
                let off = off as usize;
                u16::from_ne_bytes([rec[off], rec[off + 1]]) as u32
            }
            Some((off, _)) => {
                let off = off as usize;
                u32::from_ne_bytes([rec[off], rec[off + 1], rec[off + 2], rec[off + 3]])
            }
            None => 0,
        }
    }

    /// Store a field, truncated to its width. Absent fields are ignored.
    pub fn set(&self, rec: &mut [u8], field: Field, value: u32) {
        match self.slots[field as usize] {
            Some((off, 1)) => rec[off as usize] = value as u8,
            Some((off, 2)) => {
                let off = off as usize;
                rec[off..off + 2].copy_from_slice(&(value as u16).to_ne_bytes());
            }
            Some((off, _)) => {
                let off = off as usize;
                rec[off..off + 4].copy_from_slice(&value.to_ne_bytes());
            }
            None => {}
        }
    }
}

// ── Format 1 translation ───────────────────────────────────────────

/// Translate a host-order compatibility record into the delivered v1 / v5
/// shape described by `to`.
///
/// sysUpTime becomes 0, nanoseconds are derived from milliseconds and the
/// legacy `flags` byte becomes `tcp_flags`; every other field the target
/// carries is copied when the source has it.
pub fn translate_compat(src: &[u8], from: &FieldOffsets, dst: &mut [u8], to: &FieldOffsets) {
    dst.fill(0);
    for (field, _, _) in to.layout().iter() {
        let value = match field {
            Field::Pad => continue,
            Field::SysUpTime => 0,
            Field::UnixNsecs => from.get(src, Field::UnixMsecs).wrapping_mul(1_000_000),
            Field::TcpFlags => from.get(src, Field::Flags),
            f if from.has(f) => from.get(src, f),
            _ => continue,
        };
        to.set(dst, field, value);
    }
}

// ── Flow time ──────────────────────────────────────────────────────

/// Absolute time as seconds + milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowTime {
    pub secs: u32,
    pub msecs: u32,
}

/// Convert a router-uptime relative timestamp `t` (ms) to absolute time.
///
/// `sys_uptime` (ms) and `unix_secs`/`unix_nsecs` are the export time of the
/// record; arithmetic wraps like the unsigned C original.
pub fn flow_time(sys_uptime: u32, unix_secs: u32, unix_nsecs: u32, t: u32) -> FlowTime {
    let sys_s = sys_uptime / 1000;
    let sys_m = sys_uptime % 1000;

    let mut secs = unix_secs.wrapping_sub(sys_s);
    let mut msecs = unix_nsecs / 1_000_000;

    if sys_m > msecs {
        secs = secs.wrapping_sub(1);
        msecs += 1000;
    }
    msecs -= sys_m;

    secs = secs.wrapping_add(t / 1000);
    msecs += t % 1000;

    if msecs >= 1000 {
        msecs -= 1000;
        secs = secs.wrapping_add(1);
    }

    FlowTime { secs, msecs }
}
