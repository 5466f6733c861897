//! Stream header: in-memory form plus the on-disk codec.
//!
//! ```text
//! Format 3 (written by this crate):
//! ┌──────┬──────┬────────────┬───────────┬──────────────┬─────────────┬─────────┐
//! │ 0xCF │ 0x10 │ byte order │ version=3 │ u32 data off │ TLV entries │ pad → 4 │
//! └──────┴──────┴────────────┴───────────┴──────────────┴─────────────┴─────────┘
//!
//! Format 1 (read only): fixed 360-byte layout
//!   magic(4) d_version u16, pad(2), start, end, flags, rotation,
//!   nflows, pdu_drops, pdu_misordered (u32 each),
//!   hostname[68], comments[256]
//! ```
//!
//! Every setter also raises the matching present bit in [`StreamHeader::fields`],
//! and only present fields are encoded.

pub mod tlv;

use std::fmt;
use std::io::Read;

use crate::error::{FlowError, Result};
use crate::record::{RecordVersion, D_VERSION_UNSET};

pub use tlv::ByteOrder;
use tlv::{c_string, TlvIter, TlvWriter};

pub const MAGIC1: u8 = 0xCF;
pub const MAGIC2: u8 = 0x10;

/// Largest accepted encoded header.
pub const MAX_HEADER_LEN: usize = 16384;

/// Size of a format-1 header on disk.
pub const FORMAT1_HEADER_LEN: usize = 360;
const FORMAT1_HOSTNAME_LEN: usize = 68;
const FORMAT1_COMMENTS_LEN: usize = 256;

/// Header flag bits.
pub mod flags {
    pub const DONE: u32 = 0x1;
    pub const COMPRESS: u32 = 0x2;
    pub const MULT_PDU: u32 = 0x4;
    pub const STREAMING: u32 = 0x8;
    pub const XLATE: u32 = 0x10;
    pub const PRELOADED: u32 = 0x20;
}

/// Present-field bits.
pub mod field {
    pub const VENDOR: u32 = 0x1;
    pub const EX_VER: u32 = 0x2;
    pub const AGG_VER: u32 = 0x4;
    pub const AGG_METHOD: u32 = 0x8;
    pub const EXPORTER_IP: u32 = 0x10;
    pub const CAP_START: u32 = 0x20;
    pub const CAP_END: u32 = 0x40;
    pub const HEADER_FLAGS: u32 = 0x80;
    pub const ROT_SCHEDULE: u32 = 0x100;
    pub const FLOW_COUNT: u32 = 0x200;
    pub const FLOW_LOST: u32 = 0x400;
    pub const FLOW_MISORDERED: u32 = 0x800;
    pub const PKT_CORRUPT: u32 = 0x1000;
    pub const SEQ_RESET: u32 = 0x2000;
    pub const CAP_HOSTNAME: u32 = 0x4000;
    pub const COMMENTS: u32 = 0x8000;
    pub const IF_NAME: u32 = 0x10000;
    pub const IF_ALIAS: u32 = 0x20000;
    pub const INTERRUPT: u32 = 0x40000;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfName {
    pub ip: u32,
    pub if_index: u16,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfAlias {
    pub ip: u32,
    pub if_indexes: Vec<u16>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    byte_order: Option<ByteOrder>,
    s_version: u8,
    d_version: u16,
    agg_version: u8,
    agg_method: u8,
    vendor: u8,
    exporter_ip: u32,
    cap_start: u32,
    cap_end: u32,
    flags: u32,
    rotation: u32,
    flows_count: u32,
    flows_lost: u32,
    flows_misordered: u32,
    pkts_corrupt: u32,
    seq_reset: u32,
    cap_hostname: Option<String>,
    comments: Option<String>,
    if_names: Vec<IfName>,
    if_aliases: Vec<IfAlias>,
    fields: u32,
    enc_len: usize,
}

impl Default for StreamHeader {
    fn default() -> Self {
        Self {
            byte_order: None,
            s_version: 3,
            d_version: D_VERSION_UNSET,
            agg_version: 0,
            agg_method: 0,
            vendor: 0,
            exporter_ip: 0,
            cap_start: 0,
            cap_end: 0,
            flags: 0,
            rotation: 0,
            flows_count: 0,
            flows_lost: 0,
            flows_misordered: 0,
            pkts_corrupt: 0,
            seq_reset: 0,
            cap_hostname: None,
            comments: None,
            if_names: Vec::new(),
            if_aliases: Vec::new(),
            fields: 0,
            enc_len: 0,
        }
    }
}

impl StreamHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// `v` when `bit` is marked present.
    fn present<T>(&self, bit: u32, v: T) -> Option<T> {
        if self.fields & bit != 0 {
            Some(v)
        } else {
            None
        }
    }

    // ── Setters ────────────────────────────────────────────────────

    /// Store the export version; v8 also records aggregation version/method.
    pub fn set_version(&mut self, d_version: u16, agg_version: u8, agg_method: u8) {
        self.d_version = d_version;
        self.fields |= field::EX_VER;
        if d_version == 8 {
            self.agg_version = agg_version;
            self.agg_method = agg_method;
            self.fields |= field::AGG_VER | field::AGG_METHOD;
        }
    }

    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.byte_order = Some(order);
    }

    /// Level 0 clears compression, anything else enables it.
    pub fn set_compressed(&mut self, level: u32) {
        self.set_flag(flags::COMPRESS, level != 0);
    }

    pub fn set_streaming(&mut self, on: bool) {
        self.set_flag(flags::STREAMING, on);
    }

    pub fn set_preloaded(&mut self, on: bool) {
        self.set_flag(flags::PRELOADED, on);
    }

    pub(crate) fn set_flag(&mut self, bit: u32, on: bool) {
        if on {
            self.flags |= bit;
        } else {
            self.flags &= !bit;
        }
        self.fields |= field::HEADER_FLAGS;
    }

    pub fn set_flows_count(&mut self, n: u32) {
        self.flows_count = n;
        self.fields |= field::FLOW_COUNT;
    }

    pub fn set_flows_lost(&mut self, n: u32) {
        self.flows_lost = n;
        self.fields |= field::FLOW_LOST;
    }

    pub fn set_flows_misordered(&mut self, n: u32) {
        self.flows_misordered = n;
        self.fields |= field::FLOW_MISORDERED;
    }

    pub fn set_pkts_corrupt(&mut self, n: u32) {
        self.pkts_corrupt = n;
        self.fields |= field::PKT_CORRUPT;
    }

    pub fn set_seq_reset(&mut self, n: u32) {
        self.seq_reset = n;
        self.fields |= field::SEQ_RESET;
    }

    pub fn set_exporter_ip(&mut self, ip: u32) {
        self.exporter_ip = ip;
        self.fields |= field::EXPORTER_IP;
    }

    pub fn set_cap_time(&mut self, start: u32, end: u32) {
        self.cap_start = start;
        self.cap_end = end;
        self.fields |= field::CAP_START | field::CAP_END;
    }

    pub fn set_cap_time_start(&mut self, start: u32) {
        self.cap_start = start;
        self.fields |= field::CAP_START;
    }

    pub fn set_cap_hostname(&mut self, name: &str) {
        self.cap_hostname = Some(name.to_string());
        self.fields |= field::CAP_HOSTNAME;
    }

    pub fn set_comments(&mut self, comments: &str) {
        self.comments = Some(comments.to_string());
        self.fields |= field::COMMENTS;
    }

    pub fn set_rotation(&mut self, rotation: u32) {
        self.rotation = rotation;
        self.fields |= field::ROT_SCHEDULE;
    }

    pub fn set_vendor(&mut self, vendor: u8) {
        self.vendor = vendor;
        self.fields |= field::VENDOR;
    }

    pub fn add_if_name(&mut self, ip: u32, if_index: u16, name: &str) {
        self.if_names.push(IfName {
            ip,
            if_index,
            name: name.to_string(),
        });
        self.fields |= field::IF_NAME;
    }

    pub fn add_if_alias(&mut self, ip: u32, if_indexes: &[u16], name: &str) {
        self.if_aliases.push(IfAlias {
            ip,
            if_indexes: if_indexes.to_vec(),
            name: name.to_string(),
        });
        self.fields |= field::IF_ALIAS;
    }

    // ── Getters ────────────────────────────────────────────────────

    pub fn byte_order(&self) -> Option<ByteOrder> {
        self.byte_order
    }

    pub fn s_version(&self) -> u8 {
        self.s_version
    }

    pub fn d_version(&self) -> Option<u16> {
        self.present(field::EX_VER, self.d_version)
    }

    pub fn agg_version(&self) -> Option<u8> {
        self.present(field::AGG_VER, self.agg_version)
    }

    pub fn agg_method(&self) -> Option<u8> {
        self.present(field::AGG_METHOD, self.agg_method)
    }

    /// Full version tuple, unset parts as zero / the unset sentinel.
    pub fn version(&self) -> RecordVersion {
        RecordVersion::new(
            self.s_version,
            self.d_version,
            self.agg_version,
            self.agg_method,
        )
    }

    pub fn vendor(&self) -> Option<u8> {
        self.present(field::VENDOR, self.vendor)
    }

    pub fn exporter_ip(&self) -> Option<u32> {
        self.present(field::EXPORTER_IP, self.exporter_ip)
    }

    pub fn cap_start(&self) -> Option<u32> {
        self.present(field::CAP_START, self.cap_start)
    }

    pub fn cap_end(&self) -> Option<u32> {
        self.present(field::CAP_END, self.cap_end)
    }

    /// Header flags; 0 when never set.
    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & flags::COMPRESS != 0
    }

    pub fn is_streaming(&self) -> bool {
        self.flags & flags::STREAMING != 0
    }

    pub fn is_preloaded(&self) -> bool {
        self.flags & flags::PRELOADED != 0
    }

    pub fn rotation(&self) -> Option<u32> {
        self.present(field::ROT_SCHEDULE, self.rotation)
    }

    pub fn flows_count(&self) -> Option<u32> {
        self.present(field::FLOW_COUNT, self.flows_count)
    }

    pub fn flows_lost(&self) -> Option<u32> {
        self.present(field::FLOW_LOST, self.flows_lost)
    }

    pub fn flows_misordered(&self) -> Option<u32> {
        self.present(field::FLOW_MISORDERED, self.flows_misordered)
    }

    pub fn pkts_corrupt(&self) -> Option<u32> {
        self.present(field::PKT_CORRUPT, self.pkts_corrupt)
    }

    pub fn seq_reset(&self) -> Option<u32> {
        self.present(field::SEQ_RESET, self.seq_reset)
    }

    pub fn cap_hostname(&self) -> Option<&str> {
        self.cap_hostname.as_deref()
    }

    pub fn comments(&self) -> Option<&str> {
        self.comments.as_deref()
    }

    pub fn if_names(&self) -> &[IfName] {
        &self.if_names
    }

    pub fn if_aliases(&self) -> &[IfAlias] {
        &self.if_aliases
    }

    /// Present-field bitmask.
    pub fn fields(&self) -> u32 {
        self.fields
    }

    /// Encoded length, i.e. where record data starts.
    pub fn enc_len(&self) -> usize {
        self.enc_len
    }

    pub(crate) fn set_enc_len(&mut self, len: usize) {
        self.enc_len = len;
    }

    pub(crate) fn force_d_version(&mut self, d_version: u16) {
        self.d_version = d_version;
    }

    pub(crate) fn mark_present(&mut self, bits: u32) {
        self.fields |= bits;
    }

    // ── Encode ─────────────────────────────────────────────────────

    /// Encode as a format-3 header in `order`.
    pub fn encode(&self, order: ByteOrder) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(&[MAGIC1, MAGIC2, order as u8, 3]);
        // data offset, patched below
        buf.extend_from_slice(&[0u8; 4]);

        let f = self.fields;
        let mut w = TlvWriter::new(&mut buf, order);

        if f & field::VENDOR != 0 {
            w.put_u8(tlv::VENDOR, self.vendor)?;
        }
        if f & field::EX_VER != 0 {
            w.put_u16(tlv::EX_VER, self.d_version)?;
        }
        if f & field::AGG_VER != 0 {
            w.put_u8(tlv::AGG_VER, self.agg_version)?;
        }
        if f & field::AGG_METHOD != 0 {
            w.put_u8(tlv::AGG_METHOD, self.agg_method)?;
        }
        if f & field::EXPORTER_IP != 0 {
            w.put_u32(tlv::EXPORTER_IP, self.exporter_ip)?;
        }
        if f & field::CAP_START != 0 {
            w.put_u32(tlv::CAP_START, self.cap_start)?;
        }
        if f & field::CAP_END != 0 {
            w.put_u32(tlv::CAP_END, self.cap_end)?;
        }
        if f & field::HEADER_FLAGS != 0 {
            w.put_u32(tlv::HEADER_FLAGS, self.flags)?;
        }
        if f & field::ROT_SCHEDULE != 0 {
            w.put_u32(tlv::ROT_SCHEDULE, self.rotation)?;
        }
        if f & field::FLOW_COUNT != 0 {
            w.put_u32(tlv::FLOW_COUNT, self.flows_count)?;
        }
        if f & field::FLOW_LOST != 0 {
            w.put_u32(tlv::FLOW_LOST, self.flows_lost)?;
        }
        if f & field::FLOW_MISORDERED != 0 {
            w.put_u32(tlv::FLOW_MISORDERED, self.flows_misordered)?;
        }
        if f & field::PKT_CORRUPT != 0 {
            w.put_u32(tlv::PKT_CORRUPT, self.pkts_corrupt)?;
        }
        if f & field::SEQ_RESET != 0 {
            w.put_u32(tlv::SEQ_RESET, self.seq_reset)?;
        }
        if f & field::CAP_HOSTNAME != 0 {
            if let Some(name) = &self.cap_hostname {
                w.put_str(tlv::CAP_HOSTNAME, name)?;
            }
        }
        if f & field::COMMENTS != 0 {
            if let Some(comments) = &self.comments {
                w.put_str(tlv::COMMENTS, comments)?;
            }
        }
        for n in &self.if_names {
            w.put_if_name(n.ip, n.if_index, &n.name)?;
        }
        for a in &self.if_aliases {
            w.put_if_alias(a.ip, &a.if_indexes, &a.name)?;
        }

        while buf.len() % 4 != 0 {
            buf.push(0);
        }
        if buf.len() > MAX_HEADER_LEN {
            return Err(FlowError::MalformedHeader(format!(
                "encoded header is {} bytes, limit {}",
                buf.len(),
                MAX_HEADER_LEN
            )));
        }
        let off = order.u32_bytes(buf.len() as u32);
        buf[4..8].copy_from_slice(&off);
        Ok(buf)
    }

    // ── Decode ─────────────────────────────────────────────────────

    /// Decode a header from the start of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = bytes;
        Self::read_from(&mut cursor)
    }

    /// Read and decode a header, leaving `r` positioned at the first record.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut prologue = [0u8; 4];
        read_exactly(r, &mut prologue)?;

        if prologue[0] != MAGIC1 || prologue[1] != MAGIC2 {
            return Err(FlowError::MalformedHeader(format!(
                "bad magic {:#04x} {:#04x}",
                prologue[0], prologue[1]
            )));
        }
        let order = ByteOrder::from_u8(prologue[2]).ok_or_else(|| {
            FlowError::MalformedHeader(format!("bad byte order {}", prologue[2]))
        })?;

        match prologue[3] {
            1 => {
                let mut buf = vec![0u8; FORMAT1_HEADER_LEN];
                buf[..4].copy_from_slice(&prologue);
                read_exactly(r, &mut buf[4..])?;
                Ok(Self::decode_format1(&buf, order))
            }
            3 => {
                let mut off = [0u8; 4];
                read_exactly(r, &mut off)?;
                let data_off = order.read_u32(&off) as usize;
                if !(8..=MAX_HEADER_LEN).contains(&data_off) {
                    return Err(FlowError::MalformedHeader(format!(
                        "data offset {} out of range",
                        data_off
                    )));
                }
                let mut body = vec![0u8; data_off - 8];
                read_exactly(r, &mut body)?;
                let mut hdr = Self::decode_tlvs(&body, order)?;
                hdr.enc_len = data_off;
                Ok(hdr)
            }
            v => Err(FlowError::UnsupportedStreamVersion(v)),
        }
    }

    fn decode_format1(buf: &[u8], order: ByteOrder) -> Self {
        let u32_at = |off: usize| order.read_u32(&buf[off..]);

        let mut hdr = Self {
            byte_order: Some(order),
            s_version: 1,
            d_version: order.read_u16(&buf[4..]),
            cap_start: u32_at(8),
            cap_end: u32_at(12),
            flags: u32_at(16) | flags::XLATE,
            rotation: u32_at(20),
            flows_count: u32_at(24),
            flows_lost: u32_at(28),
            flows_misordered: u32_at(32),
            fields: field::VENDOR
                | field::EX_VER
                | field::CAP_START
                | field::CAP_END
                | field::HEADER_FLAGS
                | field::ROT_SCHEDULE
                | field::FLOW_COUNT
                | field::FLOW_LOST
                | field::FLOW_MISORDERED,
            enc_len: FORMAT1_HEADER_LEN,
            ..Self::default()
        };

        let host_start = 36;
        let cmnt_start = host_start + FORMAT1_HOSTNAME_LEN;
        let hostname = c_string(&buf[host_start..cmnt_start]);
        if !hostname.is_empty() {
            hdr.set_cap_hostname(&hostname);
        }
        let comments = c_string(&buf[cmnt_start..cmnt_start + FORMAT1_COMMENTS_LEN]);
        if !comments.is_empty() {
            hdr.set_comments(&comments);
        }
        hdr
    }

    fn decode_tlvs(body: &[u8], order: ByteOrder) -> Result<Self> {
        let mut hdr = Self {
            byte_order: Some(order),
            s_version: 3,
            ..Self::default()
        };

        for entry in TlvIter::new(body, order) {
            let t = entry?;
            match t.t {
                tlv::NULL => {}
                tlv::VENDOR => hdr.set_vendor(t.as_u8()?),
                tlv::EX_VER => {
                    hdr.d_version = t.as_u16(order)?;
                    hdr.fields |= field::EX_VER;
                }
                tlv::AGG_VER => {
                    hdr.agg_version = t.as_u8()?;
                    hdr.fields |= field::AGG_VER;
                }
                tlv::AGG_METHOD => {
                    hdr.agg_method = t.as_u8()?;
                    hdr.fields |= field::AGG_METHOD;
                }
                tlv::EXPORTER_IP => hdr.set_exporter_ip(t.as_u32(order)?),
                tlv::CAP_START => hdr.set_cap_time_start(t.as_u32(order)?),
                tlv::CAP_END => {
                    hdr.cap_end = t.as_u32(order)?;
                    hdr.fields |= field::CAP_END;
                }
                tlv::HEADER_FLAGS => {
                    hdr.flags = t.as_u32(order)?;
                    hdr.fields |= field::HEADER_FLAGS;
                }
                tlv::ROT_SCHEDULE => hdr.set_rotation(t.as_u32(order)?),
                tlv::FLOW_COUNT => hdr.set_flows_count(t.as_u32(order)?),
                tlv::FLOW_LOST => hdr.set_flows_lost(t.as_u32(order)?),
                tlv::FLOW_MISORDERED => hdr.set_flows_misordered(t.as_u32(order)?),
                tlv::PKT_CORRUPT => hdr.set_pkts_corrupt(t.as_u32(order)?),
                tlv::SEQ_RESET => hdr.set_seq_reset(t.as_u32(order)?),
                tlv::CAP_HOSTNAME => hdr.set_cap_hostname(&t.as_str()?),
                tlv::COMMENTS => hdr.set_comments(&t.as_str()?),
                tlv::IF_NAME => {
                    let v = t.value;
                    if v.len() < 7 {
                        return Err(FlowError::MalformedHeader(format!(
                            "if_name TLV too short ({} bytes)",
                            v.len()
                        )));
                    }
                    hdr.add_if_name(order.read_u32(v), order.read_u16(&v[4..]), &c_string(&v[6..]));
                }
                tlv::IF_ALIAS => {
                    let v = t.value;
                    if v.len() < 6 {
                        return Err(FlowError::MalformedHeader(format!(
                            "if_alias TLV too short ({} bytes)",
                            v.len()
                        )));
                    }
                    let count = order.read_u16(&v[4..]) as usize;
                    let names_at = 6 + 2 * count;
                    if names_at >= v.len() {
                        return Err(FlowError::MalformedHeader(format!(
                            "if_alias TLV with {} entries does not fit {} bytes",
                            count,
                            v.len()
                        )));
                    }
                    let indexes: Vec<u16> = (0..count)
                        .map(|i| order.read_u16(&v[6 + 2 * i..]))
                        .collect();
                    hdr.add_if_alias(order.read_u32(v), &indexes, &c_string(&v[names_at..]));
                }
                tlv::INTERRUPT => {
                    t.as_u8()?;
                    hdr.fields |= field::INTERRUPT;
                }
                other => {
                    tracing::debug!(tlv = other, len = t.value.len(), "skipping unknown header TLV");
                }
            }
        }
        Ok(hdr)
    }
}

/// Fill `buf` completely or fail with `ShortRead`.
fn read_exactly<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut got = 0;
    while got < buf.len() {
        match r.read(&mut buf[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FlowError::Io(e)),
        }
    }
    if got != buf.len() {
        return Err(FlowError::ShortRead {
            expected: buf.len(),
            got,
        });
    }
    Ok(())
}

fn fmt_ip(ip: u32) -> std::net::Ipv4Addr {
    std::net::Ipv4Addr::from(ip)
}

/// Human-readable header summary, one `# key: value` line per present field.
impl fmt::Display for StreamHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = match self.byte_order {
            Some(ByteOrder::Little) => "little",
            Some(ByteOrder::Big) => "big",
            None => "unset",
        };
        writeln!(f, "# stream version:   {}", self.s_version)?;
        writeln!(f, "# byte order:       {}", order)?;
        if let Some(d) = self.d_version() {
            match (self.agg_version(), self.agg_method()) {
                (Some(av), Some(am)) => {
                    writeln!(f, "# export version:   {} (agg {} method {})", d, av, am)?
                }
                _ => writeln!(f, "# export version:   {}", d)?,
            }
        }
        writeln!(
            f,
            "# compression:      {}",
            if self.is_compressed() { "on" } else { "off" }
        )?;
        if let Some(ip) = self.exporter_ip() {
            writeln!(f, "# exporter:         {}", fmt_ip(ip))?;
        }
        if let Some(name) = self.cap_hostname() {
            writeln!(f, "# capture hostname: {}", name)?;
        }
        if let Some(s) = self.cap_start() {
            writeln!(f, "# capture start:    {}", s)?;
        }
        if self.flags & (flags::DONE | flags::PRELOADED) != 0 {
            if let Some(e) = self.cap_end() {
                writeln!(f, "# capture end:      {}", e)?;
            }
        }
        if let Some(n) = self.flows_count() {
            writeln!(f, "# flows:            {}", n)?;
        }
        if let Some(n) = self.flows_lost() {
            writeln!(f, "# lost flows:       {}", n)?;
        }
        if let Some(n) = self.flows_misordered() {
            writeln!(f, "# misordered flows: {}", n)?;
        }
        if let Some(n) = self.pkts_corrupt() {
            writeln!(f, "# corrupt packets:  {}", n)?;
        }
        if let Some(n) = self.seq_reset() {
            writeln!(f, "# sequence resets:  {}", n)?;
        }
        if let Some(c) = self.comments() {
            writeln!(f, "# comments:         {}", c)?;
        }
        for n in &self.if_names {
            writeln!(f, "# ifname {} {} {}", fmt_ip(n.ip), n.if_index, n.name)?;
        }
        for a in &self.if_aliases {
            let idx: Vec<String> = a.if_indexes.iter().map(|i| i.to_string()).collect();
            writeln!(f, "# ifalias {} {} {}", fmt_ip(a.ip), idx.join(","), a.name)?;
        }
        Ok(())
    }
}
