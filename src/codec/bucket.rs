// Double-delta size classes.
//
// Each class is a unary control code (`k` one bits closed by a zero, where
// `k` is the class index) followed, for every class but the first, by a
// sign bit and a fixed-width magnitude:
//
//   class  range (exclusive)          code      magnitude bits
//   Zero   d == 0                     0         0
//   Tiny   -63 < d < 64               10        6
//   Small  -255 < d < 256             110       8
//   Medium -2047 < d < 2048           1110      11
//   Word   i32::MIN < d < i32::MAX    11110     31
//   Full   anything else              111110    63
//
// The encoder and decoder both walk `Bucket::ALL` in this order.

/// A double-delta size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    Zero,
    Tiny,
    Small,
    Medium,
    Word,
    Full,
}

impl Bucket {
    /// All classes, narrowest first.
    pub const ALL: [Bucket; 6] = [
        Bucket::Zero,
        Bucket::Tiny,
        Bucket::Small,
        Bucket::Medium,
        Bucket::Word,
        Bucket::Full,
    ];

    /// Longest control code in bits.
    pub const MAX_CONTROL_LEN: u8 = 6;

    /// Position in `ALL`; also the number of leading one bits in the code.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Control code bits, right-aligned.
    #[inline]
    pub const fn control(self) -> u8 {
        ((1u8 << self as u8) - 1) << 1
    }

    /// Control code length in bits.
    #[inline]
    pub const fn control_len(self) -> u8 {
        self as u8 + 1
    }

    /// Magnitude width in bits, excluding the sign bit.
    #[inline]
    pub const fn payload_bits(self) -> u8 {
        match self {
            Bucket::Zero => 0,
            Bucket::Tiny => 6,
            Bucket::Small => 8,
            Bucket::Medium => 11,
            Bucket::Word => 31,
            Bucket::Full => 63,
        }
    }

    /// Total encoded size in bits for one value of this class.
    #[inline]
    pub const fn encoded_bits(self) -> u32 {
        let payload = self.payload_bits() as u32;
        let sign = if payload == 0 { 0 } else { 1 };
        self.control_len() as u32 + sign + payload
    }

    /// Exclusive `(low, high)` bounds, or `None` for the catch-all class.
    const fn bounds(self) -> Option<(i64, i64)> {
        match self {
            Bucket::Zero => Some((-1, 1)),
            Bucket::Tiny => Some((-63, 64)),
            Bucket::Small => Some((-255, 256)),
            Bucket::Medium => Some((-2047, 2048)),
            Bucket::Word => Some((i32::MIN as i64, i32::MAX as i64)),
            Bucket::Full => None,
        }
    }

    /// Whether `dd` falls inside this class's range.
    #[inline]
    pub fn admits(self, dd: i64) -> bool {
        match self.bounds() {
            Some((low, high)) => low < dd && dd < high,
            None => true,
        }
    }

    /// The narrowest class that admits `dd`.
    pub fn classify(dd: i64) -> Bucket {
        Self::ALL
            .into_iter()
            .find(|b| b.admits(dd))
            .unwrap_or(Bucket::Full)
    }

    /// Class for a control code with `ones` leading one bits.
    #[inline]
    pub fn from_index(ones: usize) -> Option<Bucket> {
        Self::ALL.get(ones).copied()
    }
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

/// Per-class counts of encoded double-deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketHistogram {
    counts: [usize; 6],
}

impl BucketHistogram {
    #[inline]
    pub fn record(&mut self, bucket: Bucket) {
        self.counts[bucket.index()] += 1;
    }

    #[inline]
    pub fn get(&self, bucket: Bucket) -> usize {
        self.counts[bucket.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// `(bucket, count)` pairs, narrowest first.
    pub fn iter(&self) -> impl Iterator<Item = (Bucket, usize)> + '_ {
        Bucket::ALL.into_iter().map(|b| (b, self.get(b)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
