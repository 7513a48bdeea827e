// Stream header: one indicator byte followed by a little-endian element count.
//
// Indicator byte layout:
//
//   bit 7..6  version        (0; 1..3 reserved)
//   bit 5..4  count width    (1, 2 or 3 bytes; 0 invalid)
//   bit 3..0  payload flags  (see `PayloadFlags`)

use bitflags::bitflags;

use crate::error::CodecError;

// ---------------------------------------------------------------------------
// Field masks
// ---------------------------------------------------------------------------

pub const VERSION_MASK: u8 = 0b1100_0000;
pub const WIDTH_MASK: u8 = 0b0011_0000;
pub const PAYLOAD_MASK: u8 = 0b0000_1111;

const WIDTH_SHIFT: u8 = 4;
const VERSION_SHIFT: u8 = 6;

/// The only format version defined so far.
pub const FORMAT_VERSION: u8 = 0;

/// Largest element count a 3-byte count field can hold.
pub const MAX_COUNT: usize = 0xFF_FFFF;

bitflags! {
    /// Payload-type flags carried in the low nibble of the indicator byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PayloadFlags: u8 {
        /// 64-bit integer delta-of-delta codec.
        const DELTA_I64 = 0b0001;
        /// 64-bit float codec. Reserved: never produced, rejected on decode.
        const DELTA_F64 = 0b0010;
        /// Body after the indicator byte passed through a secondary compressor.
        const WRAPPED = 0b1000;
    }
}

// ---------------------------------------------------------------------------
// Count width
// ---------------------------------------------------------------------------

/// Number of bytes used to store the element count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum CountWidth {
    One = 1,
    Two = 2,
    Three = 3,
}

impl CountWidth {
    /// Narrowest width that can hold `count`.
    pub fn for_count(count: usize) -> Result<Self, CodecError> {
        match count {
            0..=0xFF => Ok(Self::One),
            0x100..=0xFFFF => Ok(Self::Two),
            0x1_0000..=MAX_COUNT => Ok(Self::Three),
            _ => Err(CodecError::SizeOverflow { count }),
        }
    }

    #[inline]
    pub fn bytes(self) -> usize {
        self as usize
    }

    /// Largest count this width can store.
    pub fn max_count(self) -> usize {
        match self {
            Self::One => 0xFF,
            Self::Two => 0xFFFF,
            Self::Three => MAX_COUNT,
        }
    }

    /// Width class of an indicator byte. Class 0 is a format error.
    pub fn from_indicator(indicator: u8) -> Result<Self, CodecError> {
        Self::from_class((indicator & WIDTH_MASK) >> WIDTH_SHIFT).ok_or_else(|| {
            CodecError::format(format!("invalid count width class 0 in header {indicator:#04X}"))
        })
    }

    fn from_class(class: u8) -> Option<Self> {
        match class {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            3 => Some(Self::Three),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Parsed stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub width: CountWidth,
    pub payload: PayloadFlags,
    /// Number of encoded values.
    pub count: usize,
}

impl Header {
    /// Header for an integer-codec stream of `count` values.
    pub fn for_count(count: usize) -> Result<Self, CodecError> {
        Ok(Self {
            version: FORMAT_VERSION,
            width: CountWidth::for_count(count)?,
            payload: PayloadFlags::DELTA_I64,
            count,
        })
    }

    /// The indicator byte.
    pub fn indicator(&self) -> u8 {
        (self.version << VERSION_SHIFT)
            | ((self.width as u8) << WIDTH_SHIFT)
            | self.payload.bits()
    }

    /// Encoded size of indicator plus count field.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        1 + self.width.bytes()
    }

    /// Write the indicator byte and count into the front of `out`.
    ///
    /// Returns the number of bytes written. The count must fit `width`.
    pub fn write_to(&self, out: &mut [u8]) -> Result<usize, CodecError> {
        if self.count > MAX_COUNT {
            return Err(CodecError::SizeOverflow { count: self.count });
        }
        if self.count > self.width.max_count() {
            return Err(CodecError::format(format!(
                "count {} does not fit a {}-byte count field",
                self.count,
                self.width.bytes()
            )));
        }
        let len = self.encoded_len();
        if out.len() < len {
            return Err(CodecError::OutOfBounds {
                offset: out.len(),
                len: out.len(),
            });
        }
        out[0] = self.indicator();
        let count = (self.count as u32).to_le_bytes();
        out[1..len].copy_from_slice(&count[..self.width.bytes()]);
        Ok(len)
    }

    /// Parse the indicator byte and count from the front of `data`.
    ///
    /// Only structural checks happen here: the version must be known, the
    /// width class non-zero and the payload nibble made of defined flags.
    /// Which payloads a caller accepts is its own decision.
    pub fn parse(data: &[u8]) -> Result<Self, CodecError> {
        let &indicator = data.first().ok_or(CodecError::OutOfBounds {
            offset: 0,
            len: data.len(),
        })?;

        let version = (indicator & VERSION_MASK) >> VERSION_SHIFT;
        if version != FORMAT_VERSION {
            return Err(CodecError::format(format!(
                "unsupported version {version} in header {indicator:#04X}"
            )));
        }

        let width = CountWidth::from_indicator(indicator)?;

        let payload = PayloadFlags::from_bits(indicator & PAYLOAD_MASK).ok_or_else(|| {
            CodecError::format(format!("undefined payload flags in header {indicator:#04X}"))
        })?;

        let end = 1 + width.bytes();
        let field = data.get(1..end).ok_or(CodecError::OutOfBounds {
            offset: data.len(),
            len: data.len(),
        })?;
        let mut count = [0u8; 4];
        count[..field.len()].copy_from_slice(field);

        Ok(Self {
            version,
            width,
            payload,
            count: u32::from_le_bytes(count) as usize,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
