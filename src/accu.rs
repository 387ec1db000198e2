use dsp_fixedpoint::{Format, Rounding};

/// Saturating multiply-accumulate register
///
/// Products of data samples and coefficients are accumulated at a declared width
/// (`data.word + coefficient word` bits) with `data.frac + coefficient frac` fractional bits.
/// Every partial sum saturates to that width.
/// The result is narrowed to the data format once at the end.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Accu {
    state: i128,
    min: i128,
    max: i128,
    frac: u32,
}

impl Accu {
    /// Empty accumulator of `word` bits (at most 127) and `frac` fractional bits
    pub fn new(word: u32, frac: u32) -> Self {
        let word = word.clamp(1, 127);
        Self {
            state: 0,
            min: -(1 << (word - 1)),
            max: (1 << (word - 1)) - 1,
            frac,
        }
    }

    /// Accumulator for products of `data` samples and coefficients with
    /// `word` bits and `frac` fractional bits
    pub fn for_product(data: &Format, word: u32, frac: u32) -> Self {
        Self::new(data.word() + word, data.frac() + frac)
    }

    /// Fractional bits
    pub fn frac(&self) -> u32 {
        self.frac
    }

    /// Raw accumulator content
    pub fn state(&self) -> i128 {
        self.state
    }

    /// Add a raw value (at the accumulator scale)
    #[inline]
    pub fn add(&mut self, x: i128) -> &mut Self {
        self.state = (self.state + x).clamp(self.min, self.max);
        self
    }

    /// Add a data sample with `frac` fractional bits, aligned to the accumulator scale
    #[inline]
    pub fn add_sample(&mut self, x: i64, frac: u32) -> &mut Self {
        let x = if self.frac >= frac {
            (x as i128) << (self.frac - frac)
        } else {
            (x as i128) >> (frac - self.frac)
        };
        self.add(x)
    }

    /// Multiply and accumulate
    #[inline]
    pub fn mac(&mut self, a: i64, b: i64) -> &mut Self {
        self.add(a as i128 * b as i128)
    }

    /// Multiply and subtract
    #[inline]
    pub fn msub(&mut self, a: i64, b: i64) -> &mut Self {
        self.add(-(a as i128 * b as i128))
    }

    /// Narrow to `format` with `rounding`, saturating
    #[inline]
    pub fn narrow(&self, format: &Format, rounding: Rounding) -> i64 {
        let x = if self.frac >= format.frac() {
            rounding.shift(self.state, self.frac - format.frac())
        } else {
            self.state << (format.frac() - self.frac)
        };
        format.saturate(x)
    }
}
