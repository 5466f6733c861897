//! TLV primitives for the format-3 stream header.
//!
//! Every entry is `u16 type`, `u16 len`, then `len` value bytes. All
//! multi-byte values use the header's byte order.

use crate::error::{FlowError, Result};

// ── Byte order ─────────────────────────────────────────────────────

/// Byte order marker stored in the third header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little = 1,
    Big = 2,
}

impl ByteOrder {
    pub fn host() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            1 => Some(ByteOrder::Little),
            2 => Some(ByteOrder::Big),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            ByteOrder::Little => ByteOrder::Big,
            ByteOrder::Big => ByteOrder::Little,
        }
    }

    /// True when data in this order must be swapped to reach host order.
    pub fn needs_swap(self) -> bool {
        self != Self::host()
    }

    #[inline]
    pub fn read_u16(self, b: &[u8]) -> u16 {
        let raw = [b[0], b[1]];
        match self {
            ByteOrder::Little => u16::from_le_bytes(raw),
            ByteOrder::Big => u16::from_be_bytes(raw),
        }
    }

    #[inline]
    pub fn read_u32(self, b: &[u8]) -> u32 {
        let raw = [b[0], b[1], b[2], b[3]];
        match self {
            ByteOrder::Little => u32::from_le_bytes(raw),
            ByteOrder::Big => u32::from_be_bytes(raw),
        }
    }

    pub fn u16_bytes(self, v: u16) -> [u8; 2] {
        match self {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }

    pub fn u32_bytes(self, v: u32) -> [u8; 4] {
        match self {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }
}

// ── TLV type codes ─────────────────────────────────────────────────

pub const NULL: u16 = 0x0;
pub const VENDOR: u16 = 0x1;
pub const EX_VER: u16 = 0x2;
pub const AGG_VER: u16 = 0x3;
pub const AGG_METHOD: u16 = 0x4;
pub const EXPORTER_IP: u16 = 0x5;
pub const CAP_START: u16 = 0x6;
pub const CAP_END: u16 = 0x7;
pub const HEADER_FLAGS: u16 = 0x8;
pub const ROT_SCHEDULE: u16 = 0x9;
pub const FLOW_COUNT: u16 = 0xA;
pub const FLOW_LOST: u16 = 0xB;
pub const FLOW_MISORDERED: u16 = 0xC;
pub const PKT_CORRUPT: u16 = 0xD;
pub const SEQ_RESET: u16 = 0xE;
pub const CAP_HOSTNAME: u16 = 0xF;
pub const COMMENTS: u16 = 0x10;
pub const IF_NAME: u16 = 0x11;
pub const IF_ALIAS: u16 = 0x12;
pub const INTERRUPT: u16 = 0x13;

// ── Encoder ────────────────────────────────────────────────────────

/// Appends TLVs to a growing buffer in a fixed byte order.
pub struct TlvWriter<'a> {
    buf: &'a mut Vec<u8>,
    order: ByteOrder,
}

impl<'a> TlvWriter<'a> {
    pub fn new(buf: &'a mut Vec<u8>, order: ByteOrder) -> Self {
        Self { buf, order }
    }

    fn begin(&mut self, t: u16, len: usize) -> Result<()> {
        let len = u16::try_from(len)
            .map_err(|_| FlowError::MalformedHeader(format!("TLV {t:#x} value too long ({len})")))?;
        self.buf.extend_from_slice(&self.order.u16_bytes(t));
        self.buf.extend_from_slice(&self.order.u16_bytes(len));
        Ok(())
    }

    pub fn put_u8(&mut self, t: u16, v: u8) -> Result<()> {
        self.begin(t, 1)?;
        self.buf.push(v);
        Ok(())
    }

    pub fn put_u16(&mut self, t: u16, v: u16) -> Result<()> {
        self.begin(t, 2)?;
        self.buf.extend_from_slice(&self.order.u16_bytes(v));
        Ok(())
    }

    pub fn put_u32(&mut self, t: u16, v: u32) -> Result<()> {
        self.begin(t, 4)?;
        self.buf.extend_from_slice(&self.order.u32_bytes(v));
        Ok(())
    }

    /// NUL-terminated string.
    pub fn put_str(&mut self, t: u16, s: &str) -> Result<()> {
        self.begin(t, s.len() + 1)?;
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    pub fn put_if_name(&mut self, ip: u32, if_index: u16, name: &str) -> Result<()> {
        self.begin(IF_NAME, 4 + 2 + name.len() + 1)?;
        self.buf.extend_from_slice(&self.order.u32_bytes(ip));
        self.buf.extend_from_slice(&self.order.u16_bytes(if_index));
        self.buf.extend_from_slice(name.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    pub fn put_if_alias(&mut self, ip: u32, if_indexes: &[u16], name: &str) -> Result<()> {
        let count = u16::try_from(if_indexes.len())
            .map_err(|_| FlowError::MalformedHeader("too many alias indexes".into()))?;
        self.begin(IF_ALIAS, 4 + 2 + 2 * if_indexes.len() + name.len() + 1)?;
        self.buf.extend_from_slice(&self.order.u32_bytes(ip));
        self.buf.extend_from_slice(&self.order.u16_bytes(count));
        for idx in if_indexes {
            self.buf.extend_from_slice(&self.order.u16_bytes(*idx));
        }
        self.buf.extend_from_slice(name.as_bytes());
        self.buf.push(0);
        Ok(())
    }
}

// ── Decoder ────────────────────────────────────────────────────────

/// One decoded entry, value still in stream byte order.
#[derive(Debug, Clone, Copy)]
pub struct Tlv<'a> {
    pub t: u16,
    pub value: &'a [u8],
}

/// Walks a TLV body. Stops once fewer than 4 bytes remain (alignment
/// padding); a length running past the end is an error.
pub struct TlvIter<'a> {
    body: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> TlvIter<'a> {
    pub fn new(body: &'a [u8], order: ByteOrder) -> Self {
        Self { body, pos: 0, order }
    }
}

impl<'a> Iterator for TlvIter<'a> {
    type Item = Result<Tlv<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.body.len() - self.pos < 4 {
            return None;
        }
        let t = self.order.read_u16(&self.body[self.pos..]);
        let len = self.order.read_u16(&self.body[self.pos + 2..]) as usize;
        let start = self.pos + 4;
        let end = start + len;
        if end > self.body.len() {
            self.pos = self.body.len();
            return Some(Err(FlowError::MalformedHeader(format!(
                "TLV {t:#x} length {len} overruns header"
            ))));
        }
        self.pos = end;
        Some(Ok(Tlv {
            t,
            value: &self.body[start..end],
        }))
    }
}

impl<'a> Tlv<'a> {
    fn expect_len(&self, len: usize) -> Result<()> {
        if self.value.len() != len {
            return Err(FlowError::MalformedHeader(format!(
                "TLV {:#x}: expected {} value bytes, got {}",
                self.t,
                len,
                self.value.len()
            )));
        }
        Ok(())
    }

    pub fn as_u8(&self) -> Result<u8> {
        self.expect_len(1)?;
        Ok(self.value[0])
    }

    pub fn as_u16(&self, order: ByteOrder) -> Result<u16> {
        self.expect_len(2)?;
        Ok(order.read_u16(self.value))
    }

    pub fn as_u32(&self, order: ByteOrder) -> Result<u32> {
        self.expect_len(4)?;
        Ok(order.read_u32(self.value))
    }

    pub fn as_str(&self) -> Result<String> {
        if self.value.is_empty() {
            return Err(FlowError::MalformedHeader(format!(
                "TLV {:#x}: empty string value",
                self.t
            )));
        }
        Ok(c_string(self.value))
    }
}

/// Bytes up to the first NUL, lossily decoded.
pub fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout_big_endian() {
        let mut buf = Vec::new();
        let mut w = TlvWriter::new(&mut buf, ByteOrder::Big);
        w.put_u16(EX_VER, 5).unwrap();
        w.put_str(COMMENTS, "hi").unwrap();
        assert_eq!(
            buf,
            vec![0, 2, 0, 2, 0, 5, 0, 0x10, 0, 3, b'h', b'i', 0]
        );
    }

    #[test]
    fn test_iter_stops_on_padding() {
        let mut buf = Vec::new();
        TlvWriter::new(&mut buf, ByteOrder::Little)
            .put_u8(VENDOR, 9)
            .unwrap();
        buf.extend_from_slice(&[0, 0, 0]);
        let tlvs: Vec<_> = TlvIter::new(&buf, ByteOrder::Little)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(tlvs.len(), 1);
        assert_eq!(tlvs[0].as_u8().unwrap(), 9);
    }

    #[test]
    fn test_overrunning_length_is_error() {
        let buf = vec![1, 0, 40, 0, 0, 0, 0, 0];
        let mut it = TlvIter::new(&buf, ByteOrder::Little);
        assert!(matches!(it.next(), Some(Err(FlowError::MalformedHeader(_)))));
        assert!(it.next().is_none());
    }

    #[test]
    fn test_wrong_scalar_length() {
        let tlv = Tlv { t: CAP_START, value: &[1, 2] };
        assert!(tlv.as_u32(ByteOrder::Little).is_err());
    }

    #[test]
    fn test_if_alias_value() {
        let mut buf = Vec::new();
        TlvWriter::new(&mut buf, ByteOrder::Little)
            .put_if_alias(0x0a000001, &[3, 7], "up")
            .unwrap();
        // header 4 + ip 4 + count 2 + 2 indexes + "up\0"
        assert_eq!(buf.len(), 4 + 4 + 2 + 4 + 3);
        assert_eq!(&buf[8..10], &[2, 0]);
        assert_eq!(&buf[10..14], &[3, 0, 7, 0]);
    }

    #[test]
    fn test_c_string_stops_at_nul() {
        assert_eq!(c_string(b"abc\0def"), "abc");
        assert_eq!(c_string(b"abc"), "abc");
    }
}
