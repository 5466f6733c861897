//! Read side of the stream engine.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::{Decompress, FlushDecompress, Status};
use memmap2::{MmapMut, MmapOptions};

use crate::error::{FlowError, Result};
use crate::header::{field, StreamHeader};
use crate::record::{translate_compat, FieldOffsets, Layout, RecordVersion, D_VERSION_UNSET};

use super::{ReadOptions, D_BUFSIZE, Z_BUFSIZE};

// ── Record source ──────────────────────────────────────────────────

/// Where raw (stream byte order) records come from. Picked once at open.
enum RecordSource {
    /// Private copy-on-write map, so records can be swapped in place.
    MappedPlain { map: MmapMut, pos: usize },
    MappedCompressed {
        map: MmapMut,
        pos: usize,
        inflater: Decompress,
        rec: Vec<u8>,
        filled: usize,
        done: bool,
    },
    BufferedPlain {
        file: File,
        buf: Vec<u8>,
        start: usize,
        end: usize,
        eof: bool,
    },
    BufferedCompressed {
        file: File,
        zbuf: Vec<u8>,
        in_pos: usize,
        in_end: usize,
        eof: bool,
        inflater: Decompress,
        rec: Vec<u8>,
        filled: usize,
        done: bool,
    },
}

/// Outcome of one inflate step.
struct Inflated {
    consumed: usize,
    produced: usize,
    stream_end: bool,
}

fn inflate(inflater: &mut Decompress, input: &[u8], out: &mut [u8]) -> Result<Inflated> {
    let in_before = inflater.total_in();
    let out_before = inflater.total_out();
    let status = inflater
        .decompress(input, out, FlushDecompress::Sync)
        .map_err(|e| FlowError::CompressionEngineFailure(e.to_string()))?;
    Ok(Inflated {
        consumed: (inflater.total_in() - in_before) as usize,
        produced: (inflater.total_out() - out_before) as usize,
        stream_end: status == Status::StreamEnd,
    })
}

fn warn_partial(have: usize, size: usize) {
    tracing::warn!(
        have,
        record_size = size,
        "stream ends inside a record, partial record dropped"
    );
}

impl RecordSource {
    /// Next raw record, `size` bytes, or `None` at end of data.
    fn next(&mut self, size: usize) -> Result<Option<&mut [u8]>> {
        match self {
            RecordSource::MappedPlain { map, pos } => {
                let remaining = map.len() - *pos;
                if remaining < size {
                    if remaining > 0 {
                        warn_partial(remaining, size);
                        *pos = map.len();
                    }
                    return Ok(None);
                }
                let at = *pos;
                *pos += size;
                Ok(Some(&mut map[at..at + size]))
            }

            RecordSource::MappedCompressed {
                map,
                pos,
                inflater,
                rec,
                filled,
                done,
            } => {
                while *filled < size && !*done {
                    let step = inflate(inflater, &map[*pos..], &mut rec[*filled..])?;
                    *pos += step.consumed;
                    *filled += step.produced;
                    let stalled = step.consumed == 0 && step.produced == 0;
                    if step.stream_end || (stalled && *pos >= map.len()) {
                        *done = true;
                    } else if stalled {
                        return Err(FlowError::CompressionEngineFailure(
                            "inflate made no progress".into(),
                        ));
                    }
                }
                if *filled < size {
                    if *filled > 0 {
                        warn_partial(*filled, size);
                        *filled = 0;
                    }
                    return Ok(None);
                }
                *filled = 0;
                Ok(Some(&mut rec[..size]))
            }

            RecordSource::BufferedPlain {
                file,
                buf,
                start,
                end,
                eof,
            } => {
                if *end - *start < size {
                    // compact the tail and refill
                    buf.copy_within(*start..*end, 0);
                    *end -= *start;
                    *start = 0;
                    while *end < size && !*eof {
                        let n = file.read(&mut buf[*end..])?;
                        if n == 0 {
                            *eof = true;
                        }
                        *end += n;
                    }
                    if *end < size {
                        if *end > 0 {
                            warn_partial(*end, size);
                            *end = 0;
                        }
                        return Ok(None);
                    }
                }
                let at = *start;
                *start += size;
                Ok(Some(&mut buf[at..at + size]))
            }

            RecordSource::BufferedCompressed {
                file,
                zbuf,
                in_pos,
                in_end,
                eof,
                inflater,
                rec,
                filled,
                done,
            } => {
                while *filled < size && !*done {
                    if *in_pos == *in_end && !*eof {
                        let n = file.read(&mut zbuf[..])?;
                        if n == 0 {
                            *eof = true;
                        }
                        *in_pos = 0;
                        *in_end = n;
                    }
                    let step = inflate(inflater, &zbuf[*in_pos..*in_end], &mut rec[*filled..])?;
                    *in_pos += step.consumed;
                    *filled += step.produced;
                    let stalled = step.consumed == 0 && step.produced == 0;
                    if step.stream_end || (stalled && *eof && *in_pos == *in_end) {
                        *done = true;
                    } else if stalled && *in_pos < *in_end {
                        return Err(FlowError::CompressionEngineFailure(
                            "inflate made no progress".into(),
                        ));
                    }
                }
                if *filled < size {
                    if *filled > 0 {
                        warn_partial(*filled, size);
                        *filled = 0;
                    }
                    return Ok(None);
                }
                *filled = 0;
                Ok(Some(&mut rec[..size]))
            }
        }
    }
}

// ── Reader ─────────────────────────────────────────────────────────

/// An open capture stream, read side.
///
/// Records returned by [`next_record`](Self::next_record) are in host byte
/// order (unless `no_swap`) and in the delivered shape: format-1 streams are
/// translated to v1 / v5.
pub struct StreamReader {
    header: StreamHeader,
    version: RecordVersion,
    physical: &'static Layout,
    physical_offsets: FieldOffsets,
    offsets: FieldOffsets,
    swap: bool,
    xfield: u64,
    records_read: u64,
    source: RecordSource,
    xlate: Vec<u8>,
}

impl StreamReader {
    pub fn open_path(path: &Path, opts: &ReadOptions) -> Result<Self> {
        let file = File::open(path)?;
        Self::open(file, opts)
    }

    pub fn open(mut file: File, opts: &ReadOptions) -> Result<Self> {
        let (mut header, map) = if opts.mmap {
            let map = unsafe { MmapOptions::new().map_copy(&file) }.map_err(FlowError::Io)?;
            (StreamHeader::from_bytes(&map)?, Some(map))
        } else {
            (StreamHeader::read_from(&mut file)?, None)
        };

        if header.s_version() == 1 && header.d_version().unwrap_or(D_VERSION_UNSET) == D_VERSION_UNSET {
            header.force_d_version(1);
        }
        header.mark_present(field::HEADER_FLAGS);

        let version = header.version();
        let physical = version.physical_layout()?;
        let delivered = version.layout()?;
        let xfield = version.xfields()?;
        let rec_size = physical.size();
        let compressed = header.is_compressed();
        let data_at = header.enc_len();

        let swap = !opts.no_swap && header.byte_order().map_or(false, |o| o.needs_swap());

        let source = match (map, compressed) {
            (Some(map), false) => RecordSource::MappedPlain { map, pos: data_at },
            (Some(map), true) => RecordSource::MappedCompressed {
                map,
                pos: data_at,
                inflater: Decompress::new(true),
                rec: vec![0u8; rec_size],
                filled: 0,
                done: false,
            },
            (None, false) => RecordSource::BufferedPlain {
                file,
                buf: vec![0u8; D_BUFSIZE.max(rec_size)],
                start: 0,
                end: 0,
                eof: false,
            },
            (None, true) => RecordSource::BufferedCompressed {
                file,
                zbuf: vec![0u8; Z_BUFSIZE],
                in_pos: 0,
                in_end: 0,
                eof: false,
                inflater: Decompress::new(true),
                rec: vec![0u8; rec_size],
                filled: 0,
                done: false,
            },
        };

        tracing::debug!(
            s_version = version.s_version,
            d_version = version.d_version,
            agg_method = version.agg_method,
            compressed,
            mmap = opts.mmap,
            swap,
            "opened stream for read"
        );

        Ok(Self {
            header,
            version,
            physical,
            physical_offsets: FieldOffsets::resolve(physical),
            offsets: FieldOffsets::resolve(delivered),
            swap,
            xfield,
            records_read: 0,
            source,
            xlate: vec![0u8; delivered.size()],
        })
    }

    /// Next record, valid until the following call. `None` at end of stream;
    /// a trailing partial record is logged and dropped.
    pub fn next_record(&mut self) -> Result<Option<&[u8]>> {
        let rec = match self.source.next(self.physical.size())? {
            Some(rec) => rec,
            None => return Ok(None),
        };

        if self.swap {
            self.physical.swap(rec);
        }
        self.records_read += 1;

        if self.version.s_version == 1 {
            translate_compat(rec, &self.physical_offsets, &mut self.xlate, &self.offsets);
            return Ok(Some(&self.xlate));
        }
        Ok(Some(rec))
    }

    pub fn header(&self) -> &StreamHeader {
        &self.header
    }

    pub fn version(&self) -> RecordVersion {
        self.version
    }

    /// Fields available in delivered records.
    pub fn xfield(&self) -> u64 {
        self.xfield
    }

    /// True when every bit of `need` is available.
    pub fn check_xfield(&self, need: u64) -> bool {
        need & self.xfield == need
    }

    /// Field offsets of delivered records.
    pub fn offsets(&self) -> &FieldOffsets {
        &self.offsets
    }

    /// Size of delivered records.
    pub fn record_size(&self) -> usize {
        self.offsets.layout().size()
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }
}

impl Drop for StreamReader {
    fn drop(&mut self) {
        tracing::debug!(records = self.records_read, "closed stream");
    }
}
