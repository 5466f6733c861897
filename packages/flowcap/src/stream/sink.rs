//! Write side of the stream engine.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use flate2::{Compress, Compression, FlushCompress, Status};

use crate::error::{FlowError, Result};
use crate::header::{flags, ByteOrder, StreamHeader};
use crate::record::{Layout, D_VERSION_UNSET};

use super::{WriteOptions, D_BUFSIZE, Z_BUFSIZE};

// ── Record sink ────────────────────────────────────────────────────

enum RecordSink {
    Plain { buf: Vec<u8> },
    Compressed { deflater: Compress, zout: Vec<u8> },
}

fn deflate_err(e: flate2::CompressError) -> FlowError {
    FlowError::CompressionEngineFailure(e.to_string())
}

/// `write_all` that reports a writer refusing more bytes as `ShortWrite`.
fn write_full<W: Write + ?Sized>(out: &mut W, bytes: &[u8]) -> Result<()> {
    let mut written = 0;
    while written < bytes.len() {
        match out.write(&bytes[written..]) {
            Ok(0) => {
                return Err(FlowError::ShortWrite {
                    expected: bytes.len(),
                    written,
                })
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

impl RecordSink {
    /// Stage one record; returns bytes flushed to `file` by this call.
    fn push<W: Write>(&mut self, file: &mut W, rec: &[u8]) -> Result<usize> {
        match self {
            RecordSink::Plain { buf } => {
                let mut written = 0;
                if buf.len() + rec.len() > D_BUFSIZE {
                    write_full(file, buf)?;
                    written = buf.len();
                    buf.clear();
                }
                buf.extend_from_slice(rec);
                Ok(written)
            }
            RecordSink::Compressed { deflater, zout } => {
                let mut written = 0;
                let mut consumed = 0;
                while consumed < rec.len() {
                    let before = deflater.total_in();
                    deflater
                        .compress_vec(&rec[consumed..], zout, FlushCompress::None)
                        .map_err(deflate_err)?;
                    let took = (deflater.total_in() - before) as usize;
                    consumed += took;
                    if zout.len() == zout.capacity() {
                        write_full(file, zout)?;
                        written += zout.len();
                        zout.clear();
                    } else if took == 0 {
                        return Err(FlowError::CompressionEngineFailure(
                            "deflate made no progress".into(),
                        ));
                    }
                }
                Ok(written)
            }
        }
    }

    /// Drain everything staged; returns bytes written.
    fn finish<W: Write>(&mut self, file: &mut W) -> Result<usize> {
        match self {
            RecordSink::Plain { buf } => {
                write_full(file, buf)?;
                let n = buf.len();
                buf.clear();
                Ok(n)
            }
            RecordSink::Compressed { deflater, zout } => {
                let mut written = 0;
                loop {
                    let status = deflater
                        .compress_vec(&[], zout, FlushCompress::Finish)
                        .map_err(deflate_err)?;
                    if zout.len() == zout.capacity() {
                        write_full(file, zout)?;
                        written += zout.len();
                        zout.clear();
                    }
                    if status == Status::StreamEnd {
                        break;
                    }
                }
                write_full(file, zout)?;
                written += zout.len();
                zout.clear();
                Ok(written)
            }
        }
    }
}

// ── Writer ─────────────────────────────────────────────────────────

/// An open capture stream, write side.
///
/// Set the header version through [`header_mut`](Self::header_mut), call
/// [`write_header`](Self::write_header) before the first record, and finish
/// with [`close`](Self::close). A second `write_header` call rewrites the
/// header in place and marks the stream done.
pub struct StreamWriter {
    file: File,
    header: StreamHeader,
    no_swap: bool,
    layout: Option<&'static Layout>,
    sink: RecordSink,
    header_len: Option<usize>,
    data_bytes: u64,
    records_written: u64,
}

impl StreamWriter {
    pub fn create(path: &Path, opts: &WriteOptions) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(file, opts)
    }

    pub fn new(file: File, opts: &WriteOptions) -> Result<Self> {
        let mut header = StreamHeader::new();
        header.set_byte_order(ByteOrder::host());

        let sink = if opts.compress {
            header.set_flag(flags::COMPRESS, true);
            RecordSink::Compressed {
                deflater: Compress::new(Compression::new(opts.z_level.min(9)), true),
                zout: Vec::with_capacity(Z_BUFSIZE),
            }
        } else {
            header.set_flag(flags::COMPRESS, false);
            RecordSink::Plain {
                buf: Vec::with_capacity(D_BUFSIZE),
            }
        };

        tracing::debug!(
            compress = opts.compress,
            z_level = opts.z_level,
            no_swap = opts.no_swap,
            "opened stream for write"
        );

        Ok(Self {
            file,
            header,
            no_swap: opts.no_swap,
            layout: None,
            sink,
            header_len: None,
            data_bytes: 0,
            records_written: 0,
        })
    }

    pub fn header(&self) -> &StreamHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut StreamHeader {
        &mut self.header
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    fn record_layout(&mut self) -> Result<&'static Layout> {
        if let Some(layout) = self.layout {
            return Ok(layout);
        }
        let layout = self.header.version().physical_layout()?;
        self.layout = Some(layout);
        Ok(layout)
    }

    fn needs_swap(&self) -> bool {
        !self.no_swap && self.header.byte_order().map_or(false, |o| o.needs_swap())
    }

    /// Write one host-order record. The caller's bytes are left unchanged.
    ///
    /// Returns the number of bytes that reached the file during this call,
    /// which is 0 while records are only being staged.
    pub fn write_record(&mut self, rec: &mut [u8]) -> Result<usize> {
        let layout = self.record_layout()?;
        if rec.len() != layout.size() {
            return Err(FlowError::InvalidRecordLength {
                expected: layout.size(),
                got: rec.len(),
            });
        }

        let swap = self.needs_swap();
        if swap {
            layout.swap(rec);
        }
        let pushed = self.sink.push(&mut self.file, rec);
        if swap {
            layout.swap(rec);
        }

        let n = pushed?;
        self.data_bytes += n as u64;
        self.records_written += 1;
        Ok(n)
    }

    /// Encode and write the header; see the type docs for rewrite rules.
    pub fn write_header(&mut self) -> Result<usize> {
        if self.header.d_version().unwrap_or(D_VERSION_UNSET) == D_VERSION_UNSET {
            return Err(FlowError::MissingHeaderField("d_version"));
        }
        let order = self
            .header
            .byte_order()
            .ok_or(FlowError::MissingHeaderField("byte_order"))?;

        let Some(original) = self.header_len else {
            let bytes = self.header.encode(order)?;
            write_full(&mut self.file, &bytes)?;
            self.header_len = Some(bytes.len());
            self.header.set_enc_len(bytes.len());
            return Ok(bytes.len());
        };

        self.file.seek(SeekFrom::Start(0))?;
        self.header.set_flag(flags::DONE, true);
        let res = self.rewrite_header(order, original);
        self.file.seek(SeekFrom::End(0))?;
        res
    }

    fn rewrite_header(&mut self, order: ByteOrder, original: usize) -> Result<usize> {
        let bytes = self.header.encode(order)?;
        if bytes.len() != original {
            return Err(FlowError::HeaderSizeChanged {
                original,
                now: bytes.len(),
            });
        }
        write_full(&mut self.file, &bytes)?;
        Ok(bytes.len())
    }

    /// Flush staged records and finish the compressed stream.
    ///
    /// Returns the size of the finished stream (header plus record data).
    pub fn close(mut self) -> Result<u64> {
        let n = self.sink.finish(&mut self.file)?;
        self.data_bytes += n as u64;
        self.file.flush()?;

        let total = self.data_bytes + self.header_len.unwrap_or(0) as u64;
        tracing::debug!(
            records = self.records_written,
            bytes = total,
            "closed stream"
        );
        Ok(total)
    }
}
