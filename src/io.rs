// File-level I/O helpers for encoding/decoding integer series.
//
// The text side is one decimal integer per line; blank lines and `#`
// comments are skipped. The binary side is a raw or wrapped codec stream.
// Provides stream and path helpers returning stats, optionally with a
// SHA-256 of the written output (feature-gated behind `file-io`).

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::num::ParseIntError;
use std::path::Path;

use log::debug;
#[cfg(feature = "file-io")]
use sha2::Digest;
use thiserror::Error;

use crate::codec::BucketHistogram;
use crate::compress::frame;
use crate::engine::{self, EncodeOptions};
use crate::error::{CodecError, CompressError};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `encode_stream()` and `encode_file()`.
#[derive(Debug, Clone)]
pub struct EncodeStats {
    /// Number of values read.
    pub values: u64,
    /// Text input size in bytes.
    pub input_size: u64,
    /// Raw codec stream size in bytes.
    pub codec_size: u64,
    /// Bytes written (equals `codec_size` unless wrapped).
    pub output_size: u64,
    /// Secondary backend id when the output is a wrapped frame.
    pub secondary_id: Option<u8>,
    pub histogram: BucketHistogram,
    /// SHA-256 of the written output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `decode_stream()` and `decode_file()`.
#[derive(Debug, Clone)]
pub struct DecodeStats {
    /// Encoded input size in bytes.
    pub input_size: u64,
    /// Whether the input was a wrapped frame.
    pub wrapped: bool,
    /// Number of values decoded.
    pub values: u64,
    /// Text output size in bytes.
    pub output_size: u64,
    /// SHA-256 of the written output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file I/O operations.
#[derive(Debug, Error)]
pub enum IoError {
    /// I/O error (file open, read, write).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A text line that is not a decimal `i64`.
    #[error("line {line}: invalid integer {text:?}: {source}")]
    Parse {
        line: usize,
        text: String,
        #[source]
        source: ParseIntError,
    },

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Secondary compression error.
    #[error("{0}")]
    Compress(CompressError),
}

impl From<CompressError> for IoError {
    fn from(e: CompressError) -> Self {
        match e {
            CompressError::Codec(e) => Self::Codec(e),
            CompressError::Io(e) => Self::Io(e),
            other => Self::Compress(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Text values
// ---------------------------------------------------------------------------

/// Read newline-separated decimal integers.
///
/// Leading and trailing whitespace is ignored, as is everything after a `#`.
pub fn read_values<R: BufRead>(reader: R) -> Result<Vec<i64>, IoError> {
    let mut values = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let text = line.split('#').next().unwrap_or_default().trim();
        if text.is_empty() {
            continue;
        }
        let value = text.parse::<i64>().map_err(|source| IoError::Parse {
            line: idx + 1,
            text: text.to_string(),
            source,
        })?;
        values.push(value);
    }
    Ok(values)
}

/// Write one decimal integer per line.
pub fn write_values<W: Write>(mut writer: W, values: &[i64]) -> io::Result<()> {
    for v in values {
        writeln!(writer, "{v}")?;
    }
    writer.flush()
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// Read text integers from `reader`, encode them and write the stream.
pub fn encode_stream<R: Read, W: Write>(
    reader: R,
    writer: W,
    opts: &EncodeOptions,
) -> Result<EncodeStats, IoError> {
    let mut input = CountingReader::new(reader);
    let values = read_values(BufReader::with_capacity(BUF_SIZE, &mut input))?;
    let summary = engine::encode_summary(&values, opts)?;

    let mut out = TrackingWriter::new(writer);
    out.write_all(&summary.bytes)?;
    out.flush()?;
    let (output_size, output_sha256) = out.finish();

    debug!(
        "encode: {} values, {} text bytes -> {} bytes",
        values.len(),
        input.bytes,
        output_size
    );

    Ok(EncodeStats {
        values: values.len() as u64,
        input_size: input.bytes,
        codec_size: summary.codec_len as u64,
        output_size,
        secondary_id: summary.secondary_id,
        histogram: summary.histogram,
        output_sha256,
    })
}

/// Read a raw or wrapped stream from `reader`, decode it and write text.
pub fn decode_stream<R: Read, W: Write>(mut reader: R, writer: W) -> Result<DecodeStats, IoError> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    let values = engine::decode(&data)?;

    let mut out = TrackingWriter::new(BufWriter::with_capacity(BUF_SIZE, writer));
    write_values(&mut out, &values)?;
    let (output_size, output_sha256) = out.finish();

    debug!(
        "decode: {} bytes -> {} values, {} text bytes",
        data.len(),
        values.len(),
        output_size
    );

    Ok(DecodeStats {
        input_size: data.len() as u64,
        wrapped: frame::is_wrapped(&data),
        values: values.len() as u64,
        output_size,
        output_sha256,
    })
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Encode the text file at `input_path` into `output_path`.
///
/// The input is read and encoded before anything is written, and the output
/// only replaces `output_path` once complete. A failed call leaves an
/// existing output untouched, and both paths may name the same file.
pub fn encode_file(
    input_path: &Path,
    output_path: &Path,
    opts: &EncodeOptions,
) -> Result<EncodeStats, IoError> {
    let input = fs::read(input_path)?;
    replace_file(output_path, |file| {
        encode_stream(input.as_slice(), BufWriter::with_capacity(BUF_SIZE, file), opts)
    })
}

/// Decode the stream at `input_path` into a text file at `output_path`.
///
/// Replaces the output the same way as `encode_file`.
pub fn decode_file(input_path: &Path, output_path: &Path) -> Result<DecodeStats, IoError> {
    let input = fs::read(input_path)?;
    replace_file(output_path, |file| decode_stream(input.as_slice(), file))
}

/// Write `data` to `path` through a temp file in the same directory.
pub fn write_file_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    replace_file(path, |file| file.write_all(data)).map_err(|e| match e {
        IoError::Io(e) => e,
        other => io::Error::other(other.to_string()),
    })
}

/// Run `fill` against a temp file next to `path`, then rename it over `path`.
///
/// When `fill` fails the temp file is removed and `path` is left as it was.
fn replace_file<T, E>(path: &Path, fill: impl FnOnce(&mut File) -> Result<T, E>) -> Result<T, IoError>
where
    IoError: From<E>,
{
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    let result = fill(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| IoError::Io(e.error))?;
    debug!("wrote {}", path.display());
    Ok(result)
}

// ---------------------------------------------------------------------------
// Counting adapters
// ---------------------------------------------------------------------------

struct CountingReader<R> {
    inner: R,
    bytes: u64,
}

impl<R> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, bytes: 0 }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes += n as u64;
        Ok(n)
    }
}

/// Counts bytes written and, with `file-io`, hashes them.
struct TrackingWriter<W: Write> {
    inner: W,
    written: u64,
    #[cfg(feature = "file-io")]
    hasher: sha2::Sha256,
}

impl<W: Write> TrackingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            written: 0,
            #[cfg(feature = "file-io")]
            hasher: sha2::Sha256::new(),
        }
    }

    fn finish(self) -> (u64, Option<[u8; 32]>) {
        #[cfg(feature = "file-io")]
        let digest = Some(self.hasher.finalize().into());
        #[cfg(not(feature = "file-io"))]
        let digest = None;
        (self.written, digest)
    }
}

impl<W: Write> Write for TrackingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        #[cfg(feature = "file-io")]
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
