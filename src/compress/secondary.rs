// Byte compressors a codec stream body can be passed through.
//
// A backend only sees the bytes after the indicator. Its id travels in the
// wrapped frame, and `backend_for_id` maps it back on the read side. Ids
// below 0x80 belong to this crate; custom backends pick from the rest.

use std::io::{self, Write};
use std::sync::Arc;

use crate::error::CompressError;

pub const SECONDARY_NONE_ID: u8 = 0;
pub const SECONDARY_LZMA_ID: u8 = 2;
pub const SECONDARY_ZLIB_ID: u8 = 3;

/// Bodies shorter than this never gain from a compressor's own framing.
const MIN_COMPRESS_SIZE: usize = 32;

#[cfg(feature = "zlib-secondary")]
const DEFAULT_ZLIB_LEVEL: u32 = 6;

/// Reversible compression of a codec stream body.
///
/// `decompress` streams its output into `out` instead of returning it. The
/// frame layer hands in a sink that stops accepting bytes once the restored
/// stream outgrows what its header can describe, or once the caller's
/// allocator refuses to grow it. A backend must pass such write errors up
/// and not retry.
///
/// ```no_run
/// use std::io::{self, Write};
///
/// use tscodec::compress::secondary::CompressBackend;
/// use tscodec::error::CompressError;
///
/// /// Stores bodies unchanged under id 0x90.
/// struct Stored;
///
/// impl CompressBackend for Stored {
///     fn id(&self) -> u8 {
///         0x90
///     }
///
///     fn compress(&self, body: &[u8]) -> io::Result<Vec<u8>> {
///         Ok(body.to_vec())
///     }
///
///     fn decompress(&self, packed: &[u8], out: &mut dyn Write) -> Result<(), CompressError> {
///         Ok(out.write_all(packed)?)
///     }
/// }
/// ```
pub trait CompressBackend: Send + Sync {
    fn id(&self) -> u8;

    fn compress(&self, body: &[u8]) -> io::Result<Vec<u8>>;

    fn decompress(&self, packed: &[u8], out: &mut dyn Write) -> Result<(), CompressError>;

    /// Whether `body` is worth offering to `compress` at all.
    fn should_compress(&self, body: &[u8]) -> bool {
        body.len() >= MIN_COMPRESS_SIZE
    }
}

fn corrupt(backend: &str, err: impl std::fmt::Display) -> CompressError {
    CompressError::Decompress(format!("{backend}: {err}"))
}

/// LZMA through lzma-rs (id 2).
#[cfg(feature = "lzma-secondary")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LzmaBackend;

#[cfg(feature = "lzma-secondary")]
impl CompressBackend for LzmaBackend {
    fn id(&self) -> u8 {
        SECONDARY_LZMA_ID
    }

    fn compress(&self, body: &[u8]) -> io::Result<Vec<u8>> {
        let mut packed = Vec::with_capacity(body.len() / 2);
        lzma_rs::lzma_compress(&mut io::BufReader::new(body), &mut packed)?;
        Ok(packed)
    }

    fn decompress(&self, packed: &[u8], mut out: &mut dyn Write) -> Result<(), CompressError> {
        let mut input = packed;
        lzma_rs::lzma_decompress(&mut input, &mut out).map_err(|e| corrupt("lzma", e))
    }
}

/// zlib-framed deflate through flate2 (id 3). The zlib trailer carries an
/// Adler-32 of the body, so corruption is caught on restore.
#[cfg(feature = "zlib-secondary")]
#[derive(Debug, Clone, Copy)]
pub struct ZlibBackend {
    level: u32,
}

#[cfg(feature = "zlib-secondary")]
impl ZlibBackend {
    /// Levels above 9 are clamped.
    pub fn new(level: u32) -> Self {
        Self { level: level.min(9) }
    }

    pub fn level(&self) -> u32 {
        self.level
    }
}

#[cfg(feature = "zlib-secondary")]
impl Default for ZlibBackend {
    fn default() -> Self {
        Self::new(DEFAULT_ZLIB_LEVEL)
    }
}

#[cfg(feature = "zlib-secondary")]
impl CompressBackend for ZlibBackend {
    fn id(&self) -> u8 {
        SECONDARY_ZLIB_ID
    }

    fn compress(&self, body: &[u8]) -> io::Result<Vec<u8>> {
        let packed = Vec::with_capacity(body.len() / 2);
        let mut deflate = flate2::write::ZlibEncoder::new(packed, flate2::Compression::new(self.level));
        deflate.write_all(body)?;
        deflate.finish()
    }

    fn decompress(&self, packed: &[u8], out: &mut dyn Write) -> Result<(), CompressError> {
        let mut inflate = flate2::read::ZlibDecoder::new(packed);
        io::copy(&mut inflate, out)
            .map(drop)
            .map_err(|e| corrupt("zlib", e))
    }
}

/// Declines every body, so wrapping with it is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl CompressBackend for NoCompression {
    fn id(&self) -> u8 {
        SECONDARY_NONE_ID
    }

    fn compress(&self, body: &[u8]) -> io::Result<Vec<u8>> {
        Ok(body.to_vec())
    }

    fn decompress(&self, packed: &[u8], out: &mut dyn Write) -> Result<(), CompressError> {
        Ok(out.write_all(packed)?)
    }

    fn should_compress(&self, _body: &[u8]) -> bool {
        false
    }
}

/// Built-in backend for a frame's id byte.
///
/// Id 0 is never written, so it is unknown here like any other unused id.
pub fn backend_for_id(id: u8) -> Result<Arc<dyn CompressBackend>, CompressError> {
    match id {
        #[cfg(feature = "lzma-secondary")]
        SECONDARY_LZMA_ID => Ok(Arc::new(LzmaBackend)),
        #[cfg(feature = "zlib-secondary")]
        SECONDARY_ZLIB_ID => Ok(Arc::new(ZlibBackend::default())),
        #[cfg(not(feature = "lzma-secondary"))]
        SECONDARY_LZMA_ID => Err(CompressError::Unsupported(
            "frame uses lzma; rebuild with the `lzma-secondary` feature".into(),
        )),
        #[cfg(not(feature = "zlib-secondary"))]
        SECONDARY_ZLIB_ID => Err(CompressError::Unsupported(
            "frame uses zlib; rebuild with the `zlib-secondary` feature".into(),
        )),
        other => Err(CompressError::UnknownBackend(other)),
    }
}

/// Which backend `engine` wraps encoded streams with.
#[derive(Clone, Default)]
pub enum SecondaryCompression {
    #[default]
    None,
    #[cfg(feature = "lzma-secondary")]
    Lzma,
    #[cfg(feature = "zlib-secondary")]
    Zlib { level: u32 },
    Custom(Arc<dyn CompressBackend>),
}

impl SecondaryCompression {
    pub fn backend(&self) -> Option<Arc<dyn CompressBackend>> {
        match self {
            Self::None => None,
            #[cfg(feature = "lzma-secondary")]
            Self::Lzma => Some(Arc::new(LzmaBackend)),
            #[cfg(feature = "zlib-secondary")]
            Self::Zlib { level } => Some(Arc::new(ZlibBackend::new(*level))),
            Self::Custom(backend) => Some(Arc::clone(backend)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Name as accepted by `tscodec encode --secondary`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            #[cfg(feature = "lzma-secondary")]
            Self::Lzma => "lzma",
            #[cfg(feature = "zlib-secondary")]
            Self::Zlib { .. } => "zlib",
            Self::Custom(_) => "custom",
        }
    }
}

impl std::fmt::Debug for SecondaryCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "zlib-secondary")]
            Self::Zlib { level } => f.debug_struct("Zlib").field("level", level).finish(),
            Self::Custom(backend) => f.debug_tuple("Custom").field(&backend.id()).finish(),
            other => f.write_str(other.name()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Looks like a smooth series body: mostly zero control bits.
    fn sparse_body(len: usize) -> Vec<u8> {
        (0..len).map(|i| if i % 16 == 0 { 0x40 } else { 0 }).collect()
    }

    fn restore(backend: &dyn CompressBackend, packed: &[u8]) -> Result<Vec<u8>, CompressError> {
        let mut out = Vec::new();
        backend.decompress(packed, &mut out)?;
        Ok(out)
    }

    #[cfg(feature = "lzma-secondary")]
    #[test]
    fn lzma_shrinks_and_restores() {
        let body = sparse_body(2048);
        let packed = LzmaBackend.compress(&body).unwrap();
        assert!(packed.len() < body.len() / 4);
        assert_eq!(restore(&LzmaBackend, &packed).unwrap(), body);
    }

    #[cfg(feature = "lzma-secondary")]
    #[test]
    fn lzma_reports_corrupt_input() {
        let err = restore(&LzmaBackend, &[0xFF; 8]).unwrap_err();
        assert!(matches!(err, CompressError::Decompress(ref m) if m.starts_with("lzma")));
    }

    #[cfg(feature = "zlib-secondary")]
    #[test]
    fn zlib_every_level_restores() {
        let body = sparse_body(2048);
        for level in 0..=9 {
            let backend = ZlibBackend::new(level);
            let packed = backend.compress(&body).unwrap();
            assert_eq!(restore(&backend, &packed).unwrap(), body, "level {level}");
        }
        assert_eq!(ZlibBackend::new(42).level(), 9);
    }

    #[cfg(feature = "zlib-secondary")]
    #[test]
    fn zlib_reports_corrupt_input() {
        let err = restore(&ZlibBackend::default(), b"plainly not zlib").unwrap_err();
        assert!(matches!(err, CompressError::Decompress(ref m) if m.starts_with("zlib")));
    }

    #[cfg(feature = "zlib-secondary")]
    #[test]
    fn zlib_stops_when_sink_refuses() {
        struct Capped(Vec<u8>);
        impl Write for Capped {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                if self.0.len() + buf.len() > 100 {
                    return Err(io::Error::other("full"));
                }
                self.0.extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let packed = ZlibBackend::default().compress(&vec![0u8; 1 << 20]).unwrap();
        let mut sink = Capped(Vec::new());
        assert!(ZlibBackend::default().decompress(&packed, &mut sink).is_err());
        assert!(sink.0.len() <= 100);
    }

    #[test]
    fn short_bodies_are_declined() {
        let backend = NoCompression;
        assert!(!backend.should_compress(&sparse_body(4096)));

        struct Passthrough;
        impl CompressBackend for Passthrough {
            fn id(&self) -> u8 {
                0x81
            }
            fn compress(&self, body: &[u8]) -> io::Result<Vec<u8>> {
                Ok(body.to_vec())
            }
            fn decompress(&self, packed: &[u8], out: &mut dyn Write) -> Result<(), CompressError> {
                Ok(out.write_all(packed)?)
            }
        }
        assert!(!Passthrough.should_compress(&[0; 31]));
        assert!(Passthrough.should_compress(&[0; 32]));
    }

    #[test]
    fn ids_resolve_to_builtins() {
        #[cfg(feature = "lzma-secondary")]
        assert_eq!(backend_for_id(SECONDARY_LZMA_ID).unwrap().id(), SECONDARY_LZMA_ID);
        #[cfg(feature = "zlib-secondary")]
        assert_eq!(backend_for_id(SECONDARY_ZLIB_ID).unwrap().id(), SECONDARY_ZLIB_ID);
        assert!(matches!(
            backend_for_id(SECONDARY_NONE_ID),
            Err(CompressError::UnknownBackend(0))
        ));
        assert!(matches!(
            backend_for_id(0xC0),
            Err(CompressError::UnknownBackend(0xC0))
        ));
    }

    #[test]
    fn selection_names_and_backends() {
        assert!(SecondaryCompression::None.backend().is_none());
        assert!(!SecondaryCompression::None.is_enabled());
        assert_eq!(format!("{:?}", SecondaryCompression::None), "none");

        #[cfg(feature = "zlib-secondary")]
        {
            let zlib = SecondaryCompression::Zlib { level: 2 };
            assert_eq!(zlib.name(), "zlib");
            assert_eq!(zlib.backend().unwrap().id(), SECONDARY_ZLIB_ID);
            assert_eq!(format!("{zlib:?}"), "Zlib { level: 2 }");
        }

        let custom = SecondaryCompression::Custom(Arc::new(NoCompression));
        assert!(custom.is_enabled());
        assert_eq!(format!("{custom:?}"), "Custom(0)");
    }
}
