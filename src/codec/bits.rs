// Bit-level cursors over byte slices.
//
// Bits are packed MSB-first within each byte. Wider values go through 8-bit
// windows taken low-order byte first (see `BitWriter::write_bits64`); that
// window order is part of the wire format.
//
// Both cursors borrow their slice for the duration of a single encode or
// decode call and report `CodecError::OutOfBounds` instead of touching bytes
// past its end.

use crate::error::CodecError;

/// Bit offsets of the 8-bit windows used by the 64-bit operations.
const WINDOW_OFFSETS: [u8; 8] = [0, 8, 16, 24, 32, 40, 48, 56];

/// Mask selecting the low `n` bits of a byte (`n` in 0..=8).
#[inline]
fn low_mask(n: u8) -> u8 {
    debug_assert!(n <= 8);
    if n == 0 { 0 } else { u8::MAX >> (8 - n) }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Bit-addressable writer over a mutable byte slice.
#[derive(Debug)]
pub struct BitWriter<'a> {
    buf: &'a mut [u8],
    /// Next byte of `buf` to be committed.
    pos: usize,
    /// Staging byte holding pending bits in its high positions.
    current: u8,
    /// Free bits left in `current` (1..=8, 8 = empty).
    remaining: u8,
}

impl<'a> BitWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            current: 0,
            remaining: 8,
        }
    }

    /// Number of bytes committed to the slice so far.
    ///
    /// Pending bits in the staging byte are not counted until `flush`.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Write the low `n` bits of `value` (`n` in 0..=8), most significant first.
    ///
    /// When `n` exceeds the free bits of the staging byte the write splits:
    /// the high part completes and commits the current byte, the low part
    /// seeds the next one.
    pub fn write_bits(&mut self, value: u8, n: u8) -> Result<(), CodecError> {
        debug_assert!(n <= 8, "write_bits takes at most 8 bits, got {n}");
        if n == 0 {
            return Ok(());
        }
        let bits = value & low_mask(n);

        if self.remaining >= n {
            self.remaining -= n;
            self.current |= bits << self.remaining;
            if self.remaining == 0 {
                self.commit()?;
            }
            return Ok(());
        }

        let part = n - self.remaining;
        self.current |= bits >> part;
        self.commit()?;
        self.current = bits << (8 - part);
        self.remaining = 8 - part;
        Ok(())
    }

    /// Write the low `n` bits of `value` (`n` in 0..=64).
    ///
    /// The value is emitted as 8-bit windows at bit offsets 0, 8, .., 56, each
    /// clamped to the bits that remain below `n`. The low-order window goes
    /// first.
    pub fn write_bits64(&mut self, value: u64, n: u8) -> Result<(), CodecError> {
        debug_assert!(n <= 64, "write_bits64 takes at most 64 bits, got {n}");
        for off in WINDOW_OFFSETS {
            if n < off {
                break;
            }
            self.write_bits((value >> off) as u8, (n - off).min(8))?;
        }
        Ok(())
    }

    /// Commit a partially filled staging byte, zero-padding its low bits.
    ///
    /// A no-op when nothing is pending.
    pub fn flush(&mut self) -> Result<(), CodecError> {
        if self.remaining == 8 {
            return Ok(());
        }
        self.commit()
    }

    fn commit(&mut self) -> Result<(), CodecError> {
        let Some(slot) = self.buf.get_mut(self.pos) else {
            return Err(CodecError::OutOfBounds {
                offset: self.pos,
                len: self.buf.len(),
            });
        };
        *slot = self.current;
        self.pos += 1;
        self.current = 0;
        self.remaining = 8;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Bit-addressable reader over a byte slice, mirroring `BitWriter`.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    buf: &'a [u8],
    /// Byte currently being consumed.
    pos: usize,
    /// Unread bits left in `buf[pos]` (1..=8).
    remaining: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            remaining: 8,
        }
    }

    /// Bytes touched so far, counting a partially consumed byte.
    #[inline]
    pub fn bytes_consumed(&self) -> usize {
        if self.remaining == 8 {
            self.pos
        } else {
            self.pos + 1
        }
    }

    /// Unread bits left in the slice.
    pub fn bits_remaining(&self) -> usize {
        let tail = self.buf.len().saturating_sub(self.pos);
        if tail == 0 {
            0
        } else {
            (tail - 1) * 8 + self.remaining as usize
        }
    }

    /// Read `n` bits (`n` in 0..=8) in the order `BitWriter::write_bits` wrote them.
    pub fn read_bits(&mut self, n: u8) -> Result<u8, CodecError> {
        debug_assert!(n <= 8, "read_bits takes at most 8 bits, got {n}");
        if n == 0 {
            return Ok(0);
        }
        let byte = self.current_byte()?;

        if self.remaining >= n {
            self.remaining -= n;
            let bits = (byte >> self.remaining) & low_mask(n);
            if self.remaining == 0 {
                self.advance();
            }
            return Ok(bits);
        }

        let part = n - self.remaining;
        let high = byte & low_mask(self.remaining);
        self.advance();
        let byte = self.current_byte()?;
        self.remaining -= part;
        let low = (byte >> self.remaining) & low_mask(part);
        Ok((high << part) | low)
    }

    /// Read `n` bits (`n` in 0..=64) written by `BitWriter::write_bits64`.
    pub fn read_bits64(&mut self, n: u8) -> Result<u64, CodecError> {
        debug_assert!(n <= 64, "read_bits64 takes at most 64 bits, got {n}");
        let mut value = 0u64;
        for off in WINDOW_OFFSETS {
            if n < off {
                break;
            }
            value |= u64::from(self.read_bits((n - off).min(8))?) << off;
        }
        Ok(value)
    }

    #[inline]
    fn current_byte(&self) -> Result<u8, CodecError> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or(CodecError::OutOfBounds {
                offset: self.pos,
                len: self.buf.len(),
            })
    }

    #[inline]
    fn advance(&mut self) {
        self.pos += 1;
        self.remaining = 8;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
