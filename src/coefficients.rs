use dsp_fixedpoint::{Fixed, Format};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Coefficient quantization policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantization {
    /// All coefficients in one format
    Format(Format),
    /// Fixed word width, integer bits fitted per coefficient
    Fit(u32),
}

impl Default for Quantization {
    fn default() -> Self {
        Self::Fit(12)
    }
}

/// Quantized coefficients
///
/// Raw taps aligned to a common number of fractional bits.
/// Index order is the convolution kernel order (`h[0]` multiplies the newest sample).
///
/// Coefficients fitted individually (see [`Quantization::Fit`]) are aligned exactly
/// by left-shifting those with fewer fractional bits; the word width grows accordingly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoefficientSet {
    raw: Vec<i64>,
    word: u32,
    frac: u32,
}

impl CoefficientSet {
    /// Quantize real coefficients
    ///
    /// ```
    /// # use dsdac::{CoefficientSet, Quantization};
    /// # use dsp_fixedpoint::Format;
    /// let h = CoefficientSet::quantize(&[7.3765809, -0.3466036], Quantization::Fit(12)).unwrap();
    /// assert_eq!(h.frac(), 11);
    /// assert_eq!(h.raw(), [1888 << 3, -710]);
    /// let h = CoefficientSet::quantize(&[0.5, 0.25], Quantization::Format(Format::new(8, 7, true).unwrap())).unwrap();
    /// assert_eq!(h.raw(), [64, 32]);
    /// ```
    pub fn quantize(h: &[f64], quantization: Quantization) -> Result<Self, Error> {
        if h.is_empty() {
            return Err(Error::InvalidFilterSpec("empty coefficient set"));
        }
        let taps = match quantization {
            Quantization::Format(format) => h
                .iter()
                .map(|&h| Fixed::from_real(h, format))
                .collect::<Vec<_>>(),
            Quantization::Fit(word) => h
                .iter()
                .map(|&h| Ok(Fixed::from_real(h, Format::fit(word, h)?)))
                .collect::<Result<Vec<_>, Error>>()?,
        };
        Self::from_fixed(&taps)
    }

    /// Align fixed point coefficients of possibly different formats
    pub fn from_fixed(h: &[Fixed]) -> Result<Self, Error> {
        let (Some(frac), Some(min_frac), Some(word)) = (
            h.iter().map(|h| h.format().frac()).max(),
            h.iter().map(|h| h.format().frac()).min(),
            h.iter().map(|h| h.format().word()).max(),
        ) else {
            return Err(Error::InvalidFilterSpec("empty coefficient set"));
        };
        Ok(Self {
            raw: h
                .iter()
                .map(|h| {
                    ((h.raw() as i128) << (frac - h.format().frac()))
                        .clamp(i64::MIN as _, i64::MAX as _) as i64
                })
                .collect(),
            word: word + frac - min_frac,
            frac,
        })
    }

    /// Raw coefficients in a common format
    pub fn from_raw(raw: Vec<i64>, format: Format) -> Result<Self, Error> {
        if raw.is_empty() {
            return Err(Error::InvalidFilterSpec("empty coefficient set"));
        }
        Ok(Self {
            raw: raw
                .into_iter()
                .map(|r| format.saturate(r as i128))
                .collect(),
            word: format.word(),
            frac: format.frac(),
        })
    }

    /// Raw taps
    pub fn raw(&self) -> &[i64] {
        &self.raw
    }

    /// Word width needed for the aligned raw taps
    pub fn word(&self) -> u32 {
        self.word
    }

    /// Fractional bits
    pub fn frac(&self) -> u32 {
        self.frac
    }

    /// Number of taps
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Whether there are no taps (never true for a constructed set)
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Quantized tap values
    pub fn to_reals(&self) -> Vec<f64> {
        let lsb = 2f64.powi(-(self.frac as i32));
        self.raw.iter().map(|&r| r as f64 * lsb).collect()
    }

    /// Every `step`-th tap starting at `offset`, zero padded to `len` taps
    pub(crate) fn decimated(&self, offset: usize, step: usize, len: usize) -> Self {
        let mut raw: Vec<_> = self.raw.iter().skip(offset).step_by(step).copied().collect();
        raw.resize(len, 0);
        Self {
            raw,
            word: self.word,
            frac: self.frac,
        }
    }
}
