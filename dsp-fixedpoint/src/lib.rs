#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![doc = include_str!("../README.md")]

#[cfg(not(any(test, feature = "std")))]
#[allow(unused_imports)]
use num_traits::float::FloatCore;

use core::fmt;
use serde::{Deserialize, Serialize};

/// Fixed point error
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Word width outside `1..=64` (`1..=63` unsigned) or more fractional bits than word bits
    #[error("invalid format: {word} bit word with {frac} fractional bits")]
    InvalidFormat {
        /// Total number of bits
        word: u32,
        /// Number of fractional bits
        frac: u32,
    },
    /// Arithmetic between values of different formats without rescaling
    #[error("format mismatch: {lhs} vs {rhs}")]
    FormatMismatch {
        /// Left operand format
        lhs: Format,
        /// Right operand format
        rhs: Format,
    },
}

/// Fixed point format
///
/// `word` total bits (including the sign bit if `signed`) and `frac` fractional bits.
///
/// * `Format::new(16, 15, true)` is `Q1.15`: `[-1, 1[`
/// * `Format::new(24, 19, true)` is `Q5.19`: `[-16, 16[`
/// * `Format::new(8, 4, false)` is `UQ4.4`: `[0, 16 - 1/16]`
///
/// The raw value of a [`Fixed`] in this format lies in `min_raw()..=max_raw()`
/// and represents `raw * 2**-frac`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "FormatRepr")]
pub struct Format {
    word: u32,
    frac: u32,
    signed: bool,
}

#[derive(Deserialize)]
struct FormatRepr {
    word: u32,
    frac: u32,
    signed: bool,
}

impl TryFrom<FormatRepr> for Format {
    type Error = Error;

    fn try_from(value: FormatRepr) -> Result<Self, Self::Error> {
        Self::new(value.word, value.frac, value.signed)
    }
}

impl Format {
    /// Create a new format
    ///
    /// ```
    /// # use dsp_fixedpoint::Format;
    /// let f = Format::new(12, 7, true).unwrap();
    /// assert_eq!((f.min_raw(), f.max_raw()), (-2048, 2047));
    /// assert!(Format::new(8, 9, true).is_err());
    /// ```
    pub const fn new(word: u32, frac: u32, signed: bool) -> Result<Self, Error> {
        let max = if signed { 64 } else { 63 };
        if word == 0 || word > max || frac > word {
            Err(Error::InvalidFormat { word, frac })
        } else {
            Ok(Self { word, frac, signed })
        }
    }

    /// Signed integer format (no fractional bits)
    pub const fn integer(word: u32) -> Result<Self, Error> {
        Self::new(word, 0, true)
    }

    /// Signed format of the given word width with the fewest integer bits
    /// (including sign) that hold `value` after rounding.
    ///
    /// ```
    /// # use dsp_fixedpoint::Format;
    /// assert_eq!(Format::fit(12, 7.3765809).unwrap().frac(), 8);
    /// assert_eq!(Format::fit(12, -0.3466036).unwrap().frac(), 11);
    /// ```
    pub fn fit(word: u32, value: f64) -> Result<Self, Error> {
        let mut fmt = Self::new(word, word.saturating_sub(1), true)?;
        while fmt.frac > 0 {
            let raw = (value * fmt.scale()).round();
            if raw >= fmt.min_raw() as f64 && raw <= fmt.max_raw() as f64 {
                break;
            }
            fmt.frac -= 1;
        }
        Ok(fmt)
    }

    /// Total number of bits
    pub const fn word(&self) -> u32 {
        self.word
    }

    /// Number of fractional bits
    pub const fn frac(&self) -> u32 {
        self.frac
    }

    /// Number of integer bits (including sign)
    pub const fn int(&self) -> u32 {
        self.word - self.frac
    }

    /// Two's complement
    pub const fn signed(&self) -> bool {
        self.signed
    }

    /// Smallest raw value
    pub const fn min_raw(&self) -> i64 {
        if self.signed {
            (-(1i128 << (self.word - 1))) as i64
        } else {
            0
        }
    }

    /// Largest raw value
    pub const fn max_raw(&self) -> i64 {
        let w = if self.signed { self.word - 1 } else { self.word };
        ((1i128 << w) - 1) as i64
    }

    /// Clamp a raw value into the representable range
    pub const fn saturate(&self, raw: i128) -> i64 {
        let (min, max) = (self.min_raw() as i128, self.max_raw() as i128);
        (if raw < min {
            min
        } else if raw > max {
            max
        } else {
            raw
        }) as i64
    }

    /// Whether a raw value lies in the representable range
    pub const fn contains(&self, raw: i128) -> bool {
        raw >= self.min_raw() as i128 && raw <= self.max_raw() as i128
    }

    /// `2**frac`
    pub fn scale(&self) -> f64 {
        2f64.powi(self.frac as i32)
    }

    /// Value of one raw count
    pub fn lsb(&self) -> f64 {
        1.0 / self.scale()
    }

    /// Largest representable value
    pub fn max(&self) -> f64 {
        self.max_raw() as f64 * self.lsb()
    }

    /// Smallest representable value
    pub fn min(&self) -> f64 {
        self.min_raw() as f64 * self.lsb()
    }

    /// Format of the exact product of two values
    ///
    /// Fractional bits add, the word width is chosen by the caller
    /// (typically the sum of the operand widths).
    pub const fn product(&self, rhs: &Self, word: u32) -> Result<Self, Error> {
        Self::new(word, self.frac + rhs.frac, self.signed || rhs.signed)
    }

    /// Format with the given word width and the same number of fractional bits
    pub const fn widen(&self, word: u32) -> Result<Self, Error> {
        Self::new(word, self.frac, self.signed)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.signed {
            f.write_str("U")?;
        }
        write!(f, "Q{}.{}", self.int(), self.frac)
    }
}

/// Signed shift (positive: left)
///
/// `x*2**s`
#[inline(always)]
fn ssh(x: i128, s: i32) -> i128 {
    if s >= 0 { x << s } else { x >> -s }
}

/// Rounding applied when discarding fractional bits
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::AsRefStr,
    strum::IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Rounding {
    /// Arithmetic right shift (towards negative infinity)
    #[default]
    Truncate,
    /// Round half up
    Nearest,
}

impl Rounding {
    /// Arithmetic right shift by `shift` bits with rounding
    ///
    /// ```
    /// # use dsp_fixedpoint::Rounding;
    /// assert_eq!(Rounding::Truncate.shift(-3, 1), -2);
    /// assert_eq!(Rounding::Nearest.shift(-3, 1), -1);
    /// assert_eq!(Rounding::Nearest.shift(5, 2), 1);
    /// assert_eq!(Rounding::Nearest.shift(6, 2), 2);
    /// ```
    #[inline]
    pub fn shift(self, x: i128, shift: u32) -> i128 {
        match self {
            _ if shift == 0 => x,
            Self::Truncate => x >> shift,
            Self::Nearest => (x + (1 << (shift - 1))) >> shift,
        }
    }
}

/// Fixed point number with a runtime format
///
/// The raw value is always within the format range.
/// Every constructor and operation saturates.
///
/// ```
/// # use dsp_fixedpoint::{Fixed, Format};
/// let f = Format::new(13, 7, true).unwrap();
/// assert_eq!(Fixed::from_real(1.5, f).raw(), 192);
/// assert_eq!(Fixed::from_real(33.0, f).raw(), 4095);
/// assert_eq!(Fixed::from_raw(192, f).to_real(), 1.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "FixedRepr")]
pub struct Fixed {
    raw: i64,
    format: Format,
}

#[derive(Deserialize)]
struct FixedRepr {
    raw: i64,
    format: Format,
}

impl TryFrom<FixedRepr> for Fixed {
    type Error = Error;

    fn try_from(value: FixedRepr) -> Result<Self, Self::Error> {
        Ok(Self::from_raw(value.raw, value.format))
    }
}

impl Fixed {
    /// Zero in the given format
    pub const fn zero(format: Format) -> Self {
        Self { raw: 0, format }
    }

    /// Create from a raw value, saturating
    pub const fn from_raw(raw: i64, format: Format) -> Self {
        Self {
            raw: format.saturate(raw as i128),
            format,
        }
    }

    /// Create from a wide raw value, saturating
    pub const fn from_wide(raw: i128, format: Format) -> Self {
        Self {
            raw: format.saturate(raw),
            format,
        }
    }

    /// Convert a real value: scale by `2**frac`, round to nearest (ties away from zero), saturate.
    ///
    /// NaN maps to zero.
    pub fn from_real(x: f64, format: Format) -> Self {
        let raw = (x * format.scale()).round();
        // float to int casts saturate and map NaN to 0
        Self::from_wide(raw as i128, format)
    }

    /// Real value `raw * 2**-frac`
    pub fn to_real(&self) -> f64 {
        self.raw as f64 * self.format.lsb()
    }

    /// Raw integer value
    pub const fn raw(&self) -> i64 {
        self.raw
    }

    /// Format
    pub const fn format(&self) -> Format {
        self.format
    }

    /// Convert to another format
    ///
    /// Fractional bits are dropped using `rounding` or appended exactly.
    /// The result saturates to the target range.
    ///
    /// ```
    /// # use dsp_fixedpoint::{Fixed, Format, Rounding};
    /// let wide = Fixed::from_real(-1.3, Format::new(16, 8, true).unwrap());
    /// let narrow = Format::new(4, 0, true).unwrap();
    /// assert_eq!(wide.rescale(narrow, Rounding::Truncate).raw(), -2);
    /// assert_eq!(wide.rescale(narrow, Rounding::Nearest).raw(), -1);
    /// ```
    pub fn rescale(&self, format: Format, rounding: Rounding) -> Self {
        let shift = self.format.frac as i32 - format.frac as i32;
        let raw = if shift > 0 {
            rounding.shift(self.raw as i128, shift as u32)
        } else {
            ssh(self.raw as i128, -shift)
        };
        Self::from_wide(raw, format)
    }

    fn check(&self, rhs: &Self) -> Result<(), Error> {
        if self.format == rhs.format {
            Ok(())
        } else {
            Err(Error::FormatMismatch {
                lhs: self.format,
                rhs: rhs.format,
            })
        }
    }

    /// Saturating addition of two values of the same format
    pub fn try_add(&self, rhs: &Self) -> Result<Self, Error> {
        self.check(rhs)?;
        Ok(Self::from_wide(
            self.raw as i128 + rhs.raw as i128,
            self.format,
        ))
    }

    /// Saturating subtraction of two values of the same format
    pub fn try_sub(&self, rhs: &Self) -> Result<Self, Error> {
        self.check(rhs)?;
        Ok(Self::from_wide(
            self.raw as i128 - rhs.raw as i128,
            self.format,
        ))
    }

    /// Saturating negation
    pub fn saturating_neg(&self) -> Self {
        Self::from_wide(-(self.raw as i128), self.format)
    }

    /// Full precision product saturated to a `word` bit result
    ///
    /// The product has `self.frac + rhs.frac` fractional bits.
    /// Use [`Fixed::rescale()`] to shrink it back.
    ///
    /// ```
    /// # use dsp_fixedpoint::{Fixed, Format, Rounding};
    /// let f = Format::new(8, 4, true).unwrap();
    /// let p = Fixed::from_real(1.5, f).mul_wide(&Fixed::from_real(-2.25, f), 16).unwrap();
    /// assert_eq!(p.format(), Format::new(16, 8, true).unwrap());
    /// assert_eq!(p.to_real(), -3.375);
    /// assert_eq!(p.rescale(f, Rounding::Nearest).to_real(), -3.375);
    /// ```
    pub fn mul_wide(&self, rhs: &Self, word: u32) -> Result<Self, Error> {
        let format = self.format.product(&rhs.format, word)?;
        Ok(Self::from_wide(
            self.raw as i128 * rhs.raw as i128,
            format,
        ))
    }
}

impl From<Fixed> for f64 {
    fn from(value: Fixed) -> Self {
        value.to_real()
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_real(), f)
    }
}

impl fmt::UpperExp for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperExp::fmt(&self.to_real(), f)
    }
}

impl fmt::LowerExp for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerExp::fmt(&self.to_real(), f)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn q(word: u32, frac: u32) -> Format {
        Format::new(word, frac, true).unwrap()
    }

    #[test]
    fn simple() {
        let f = q(13, 7);
        assert_eq!(Fixed::from_real(1.5, f).raw(), 192);
        assert_eq!(Fixed::from_raw(192, f).to_real(), 1.5);
        assert_eq!(Fixed::from_real(33.0, f).raw(), 4095);
        assert_eq!(Fixed::from_real(-33.0, f).raw(), -4096);
        assert_eq!(Fixed::from_real(f64::NAN, f).raw(), 0);
        assert_eq!(Fixed::from_real(f64::INFINITY, f).raw(), 4095);
        assert_eq!(format!("{f}"), "Q6.7");
        assert_eq!(format!("{}", Format::new(8, 4, false).unwrap()), "UQ4.4");
    }

    #[test]
    fn limits() {
        let f = q(64, 0);
        assert_eq!((f.min_raw(), f.max_raw()), (i64::MIN, i64::MAX));
        let u = Format::new(4, 2, false).unwrap();
        assert_eq!((u.min_raw(), u.max_raw()), (0, 15));
        assert_eq!(Fixed::from_real(-1.0, u).raw(), 0);
        assert!(Format::new(0, 0, true).is_err());
        assert!(Format::new(65, 0, true).is_err());
        assert!(Format::new(64, 0, false).is_err());
        assert_eq!(q(64, 64).scale(), 2f64.powi(64));
    }

    #[test]
    fn mismatch() {
        let a = Fixed::from_real(1.0, q(8, 4));
        let b = Fixed::from_real(1.0, q(8, 3));
        assert_eq!(
            a.try_add(&b),
            Err(Error::FormatMismatch {
                lhs: q(8, 4),
                rhs: q(8, 3)
            })
        );
        let c = a.try_add(&b.rescale(q(8, 4), Rounding::Truncate)).unwrap();
        assert_eq!(c.to_real(), 2.0);
        // 7.9375 + 2.0 saturates
        let m = Fixed::from_raw(i64::MAX, q(8, 4));
        assert_eq!(m.try_add(&c).unwrap().raw(), 127);
        assert_eq!(m.saturating_neg().raw(), -127);
        assert_eq!(
            Fixed::from_raw(-128, q(8, 4)).try_sub(&c).unwrap().raw(),
            -128
        );
    }

    #[test]
    fn fit() {
        for (v, frac) in [
            (7.3765809, 8),
            (0.3466036, 11),
            (-2.782608716, 9),
            (-4.606822182, 8),
            (0.0, 11),
            (-1.0, 11),
            (0.9999, 10),
        ] {
            assert_eq!(Format::fit(12, v).unwrap().frac(), frac, "{v}");
        }
    }

    #[test]
    fn persisted() {
        let f: Format = serde_json::from_str(r#"{"word":12,"frac":8,"signed":true}"#).unwrap();
        assert_eq!(f, q(12, 8));
        assert_eq!(
            serde_json::from_str::<Format>(&serde_json::to_string(&f).unwrap()).unwrap(),
            f
        );
        let e = serde_json::from_str::<Format>(r#"{"word":8,"frac":9,"signed":true}"#);
        assert!(e.unwrap_err().to_string().contains("8 bit word with 9 fractional bits"));
        assert!(serde_json::from_str::<Format>(r#"{"word":0,"frac":0,"signed":true}"#).is_err());
        assert!(serde_json::from_str::<Format>(r#"{"word":64,"frac":0,"signed":false}"#).is_err());
    }

    #[test]
    fn rounding_names() {
        assert_eq!("Nearest".parse::<Rounding>().unwrap(), Rounding::Nearest);
        assert_eq!("truncate".parse::<Rounding>().unwrap(), Rounding::Truncate);
        assert!("up".parse::<Rounding>().is_err());
        assert_eq!(Rounding::Nearest.as_ref(), "Nearest");
        let s: &'static str = Rounding::Truncate.into();
        assert_eq!(s, "Truncate");
        assert_eq!(
            serde_json::from_str::<Rounding>("\"Nearest\"").unwrap(),
            Rounding::Nearest
        );
    }

    #[quickcheck]
    fn roundtrip(x: f64) -> bool {
        let f = q(16, 8);
        if !x.is_finite() {
            return true;
        }
        let want = (x * 256.0).round().clamp(-32768.0, 32767.0) / 256.0;
        Fixed::from_real(x, f).to_real() == want
    }

    #[quickcheck]
    fn saturation(eps: u16) -> bool {
        let f = q(12, 7);
        let e = (eps as f64 + 1.0) * f.lsb();
        Fixed::from_real(f.max() + e, f).raw() == f.max_raw()
            && Fixed::from_real(f.min() - e, f).raw() == f.min_raw()
    }

    #[quickcheck]
    fn product_exact(a: i16, b: i16) -> bool {
        let (fa, fb) = (q(16, 9), q(16, 3));
        let p = Fixed::from_raw(a as _, fa)
            .mul_wide(&Fixed::from_raw(b as _, fb), 32)
            .unwrap();
        p.raw() == a as i64 * b as i64 && p.format().frac() == 12
    }
}
