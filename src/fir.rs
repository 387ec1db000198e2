use dsp_fixedpoint::{Fixed, Format, Rounding};
use dsp_process::{Inplace, Process};

use crate::{Accu, CoefficientSet, Error};

/// Fixed point FIR filter configuration
///
/// Samples are raw integers in `format`. Products are accumulated at
/// `format.word() + taps.word()` bits with saturation after every partial sum,
/// oldest sample first, then narrowed back to `format` with `rounding`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fir {
    taps: CoefficientSet,
    format: Format,
    rounding: Rounding,
}

impl Fir {
    /// Create a new FIR with truncating output rounding
    pub fn new(taps: CoefficientSet, format: Format) -> Self {
        Self {
            taps,
            format,
            rounding: Rounding::Truncate,
        }
    }

    /// Select the output rounding
    pub fn with_rounding(mut self, rounding: Rounding) -> Self {
        self.rounding = rounding;
        self
    }

    /// Coefficients
    pub fn taps(&self) -> &CoefficientSet {
        &self.taps
    }

    /// Data format
    pub fn format(&self) -> Format {
        self.format
    }

    /// Output rounding
    pub fn rounding(&self) -> Rounding {
        self.rounding
    }

    fn accu(&self) -> Accu {
        Accu::for_product(&self.format, self.taps.word(), self.taps.frac())
    }

    /// Direct form state for this filter
    pub fn direct(&self) -> DirectForm<'_> {
        DirectForm {
            fir: self,
            x: vec![0; self.taps.len()],
        }
    }

    /// Transposed form state for this filter
    pub fn transposed(&self) -> TransposedForm<'_> {
        TransposedForm {
            fir: self,
            s: vec![0; self.taps.len() - 1],
        }
    }
}

/// Direct form FIR
///
/// The state is the input history, newest first.
#[derive(Clone, Debug)]
pub struct DirectForm<'a> {
    fir: &'a Fir,
    x: Vec<i64>,
}

impl DirectForm<'_> {
    /// Clear the history
    pub fn reset(&mut self) {
        self.x.fill(0);
    }
}

impl Process<i64> for DirectForm<'_> {
    fn process(&mut self, x: i64) -> i64 {
        let n = self.x.len();
        self.x.copy_within(0..n - 1, 1);
        self.x[0] = x;
        let mut acc = self.fir.accu();
        for (h, x) in self.fir.taps.raw().iter().zip(self.x.iter()).rev() {
            acc.mac(*h, *x);
        }
        acc.narrow(&self.fir.format, self.fir.rounding)
    }
}

impl Inplace<i64> for DirectForm<'_> {}

/// Transposed form FIR
///
/// The state is one partial sum register per tap beyond the first.
/// Register `k` accumulates taps `k + 1..` of past inputs at accumulator width.
#[derive(Clone, Debug)]
pub struct TransposedForm<'a> {
    fir: &'a Fir,
    s: Vec<i128>,
}

impl TransposedForm<'_> {
    /// Clear the partial sums
    pub fn reset(&mut self) {
        self.s.fill(0);
    }
}

impl Process<i64> for TransposedForm<'_> {
    fn process(&mut self, x: i64) -> i64 {
        let h = self.fir.taps.raw();
        let mut y = self.fir.accu();
        y.add(self.s.first().copied().unwrap_or_default())
            .mac(h[0], x);
        for k in 0..self.s.len() {
            let mut s = self.fir.accu();
            s.add(self.s.get(k + 1).copied().unwrap_or_default())
                .mac(h[k + 1], x);
            self.s[k] = s.state();
        }
        y.narrow(&self.fir.format, self.fir.rounding)
    }
}

impl Inplace<i64> for TransposedForm<'_> {}

fn check(x: &[Fixed], format: Format) -> Result<(), Error> {
    match x.iter().find(|x| x.format() != format) {
        Some(x) => Err(dsp_fixedpoint::Error::FormatMismatch {
            lhs: x.format(),
            rhs: format,
        }
        .into()),
        None => Ok(()),
    }
}

/// Filter a sequence with a direct form FIR
///
/// Samples before the start of `x` are zero.
///
/// ```
/// # use dsdac::{filter_direct, CoefficientSet, Quantization};
/// # use dsp_fixedpoint::{Fixed, Format};
/// // Q1.7 plus sign
/// let q17 = Format::new(9, 7, true).unwrap();
/// let h = CoefficientSet::quantize(&[1.0, 0.0, 0.0], Quantization::Format(q17)).unwrap();
/// let x: Vec<_> = [0.5, -0.25, 0.75].iter().map(|&x| Fixed::from_real(x, q17)).collect();
/// assert_eq!(filter_direct(&x, &h, q17).unwrap(), x);
/// ```
pub fn filter_direct(x: &[Fixed], h: &CoefficientSet, format: Format) -> Result<Vec<Fixed>, Error> {
    check(x, format)?;
    let fir = Fir::new(h.clone(), format);
    Ok(fir
        .direct()
        .stream(x.iter().map(Fixed::raw))
        .map(|y| Fixed::from_raw(y, format))
        .collect())
}

/// Filter a sequence with a transposed form FIR
///
/// Bit identical to [`filter_direct()`].
pub fn filter_transposed(
    x: &[Fixed],
    h: &CoefficientSet,
    format: Format,
) -> Result<Vec<Fixed>, Error> {
    check(x, format)?;
    let fir = Fir::new(h.clone(), format);
    Ok(fir
        .transposed()
        .stream(x.iter().map(Fixed::raw))
        .map(|y| Fixed::from_raw(y, format))
        .collect())
}
