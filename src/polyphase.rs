//! Polyphase rate conversion
//!
//! A prototype FIR `h` is split into `M` phases, phase `i` holding
//! `h[i], h[i + M], h[i + 2M], ...` (zero padded to equal length).
//! Decimation filters the `M` interleaved input streams with the phases in
//! reverse order and sums them in one accumulator. Interpolation filters the input with every
//! phase and interleaves the results.
//!
//! Power of two rate changes are realized as a [`Cascade`] of factor two stages.

use dsp_fixedpoint::{Format, Rounding};
use dsp_process::Process;

use crate::{Accu, CoefficientSet, Error, Fir};

/// Polyphase decomposition of a prototype FIR
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolyphaseBank {
    phases: Vec<CoefficientSet>,
    taps: usize,
}

impl PolyphaseBank {
    /// Split `h` into `factor` phases
    ///
    /// ```
    /// # use dsdac::{CoefficientSet, polyphase::PolyphaseBank};
    /// # use dsp_fixedpoint::Format;
    /// let f = Format::new(8, 0, true).unwrap();
    /// let h = CoefficientSet::from_raw(vec![1, 2, 3, 4, 5], f).unwrap();
    /// let bank = PolyphaseBank::new(&h, 2).unwrap();
    /// assert_eq!(bank.phase(0).raw(), [1, 3, 5]);
    /// assert_eq!(bank.phase(1).raw(), [2, 4, 0]);
    /// ```
    pub fn new(h: &CoefficientSet, factor: usize) -> Result<Self, Error> {
        if factor == 0 {
            return Err(Error::InvalidFilterSpec("zero rate factor"));
        }
        let len = h.len().div_ceil(factor);
        Ok(Self {
            phases: (0..factor).map(|i| h.decimated(i, factor, len)).collect(),
            taps: h.len(),
        })
    }

    /// Rate change factor
    pub fn factor(&self) -> usize {
        self.phases.len()
    }

    /// Prototype length
    pub fn taps(&self) -> usize {
        self.taps
    }

    /// Sub-filter `i`
    ///
    /// # Panics
    /// If `i >= factor`.
    pub fn phase(&self, i: usize) -> &CoefficientSet {
        &self.phases[i]
    }

    /// All sub-filters
    pub fn phases(&self) -> &[CoefficientSet] {
        &self.phases
    }

    fn filter(
        &self,
        i: usize,
        x: impl IntoIterator<Item = i64>,
        format: Format,
        rounding: Rounding,
    ) -> Vec<i64> {
        let fir = Fir::new(self.phases[i].clone(), format).with_rounding(rounding);
        fir.direct().stream(x).collect()
    }

    /// Decimate by the bank factor `M`
    ///
    /// The input is zero padded to a multiple of `M`. Stream `i` (every `M`-th sample
    /// from offset `i`) is filtered by phase `M - 1 - i`. All phase products of an
    /// output share one accumulator, oldest sample first, and are narrowed once.
    ///
    /// Output `j` is bit identical to output `j*M + M - 1` of the full rate filter.
    pub fn decimate(&self, x: &[i64], format: Format, rounding: Rounding) -> Vec<i64> {
        let m = self.factor();
        let len = self.phases[0].len();
        let (word, frac) = (self.phases[0].word(), self.phases[0].frac());
        (0..x.len().div_ceil(m))
            .map(|j| {
                let mut acc = Accu::for_product(&format, word, frac);
                // tap t = k*M + p meets stream M - 1 - p at index j - k
                for k in (0..len.min(j + 1)).rev() {
                    for p in (0..m).rev() {
                        let s = x.get((j - k) * m + m - 1 - p).copied().unwrap_or_default();
                        acc.mac(self.phases[p].raw()[k], s);
                    }
                }
                acc.narrow(&format, rounding)
            })
            .collect()
    }

    /// Interpolate by the bank factor `I`
    ///
    /// Every phase filters the same input. Output `j*I + p` is output `j` of phase `p`.
    /// This equals zero stuffing followed by the full rate prototype.
    /// The prototype carries the interpolation gain.
    pub fn interpolate(&self, x: &[i64], format: Format, rounding: Rounding) -> Vec<i64> {
        let m = self.factor();
        let mut y = vec![0; x.len() * m];
        for p in 0..m {
            let yp = self.filter(p, x.iter().copied(), format, rounding);
            for (j, yp) in yp.into_iter().enumerate() {
                y[j * m + p] = yp;
            }
        }
        y
    }

    /// Fractional delay by `branch / factor` samples using a single phase
    ///
    /// Returns the filtered sequence and the integer group delay
    /// `(taps - 1) / factor / 2` of the branch.
    pub fn fractional_delay(
        &self,
        x: &[i64],
        branch: usize,
        format: Format,
        rounding: Rounding,
    ) -> Result<(Vec<i64>, usize), Error> {
        if branch >= self.factor() {
            return Err(Error::InvalidFilterSpec("delay branch beyond factor"));
        }
        Ok((
            self.filter(branch, x.iter().copied(), format, rounding),
            (self.taps - 1) / self.factor() / 2,
        ))
    }
}

/// Cascade of factor two polyphase stages
///
/// Stage 0 runs at the lowest rate. Interpolation runs stages `0..depth` in order,
/// decimation runs them in reverse. The coefficient file of a multi-stage design
/// lists the stages in the same order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cascade {
    stages: Vec<PolyphaseBank>,
    depth: usize,
}

impl Cascade {
    /// Build a cascade from per-stage prototypes, using all stages
    pub fn new(stages: &[CoefficientSet]) -> Result<Self, Error> {
        Ok(Self {
            stages: stages
                .iter()
                .map(|h| PolyphaseBank::new(h, 2))
                .collect::<Result<_, _>>()?,
            depth: stages.len(),
        })
    }

    /// Number of available stages
    pub fn stages(&self) -> usize {
        self.stages.len()
    }

    /// Select the number of active stages
    pub fn set_depth(&mut self, n: usize) -> Result<(), Error> {
        if n > self.stages.len() {
            return Err(Error::InvalidFilterSpec("cascade depth beyond stages"));
        }
        self.depth = n;
        Ok(())
    }

    /// Number of active stages
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Select the rate change factor (a power of two)
    pub fn set_rate(&mut self, factor: usize) -> Result<(), Error> {
        if !factor.is_power_of_two() {
            return Err(Error::InvalidFilterSpec("rate factor not a power of two"));
        }
        self.set_depth(factor.trailing_zeros() as _)
    }

    /// Rate change factor
    pub fn rate(&self) -> usize {
        1 << self.depth
    }

    /// Interpolate by `rate()`
    pub fn interpolate(&self, x: &[i64], format: Format, rounding: Rounding) -> Vec<i64> {
        self.stages[..self.depth]
            .iter()
            .fold(x.to_vec(), |x, s| s.interpolate(&x, format, rounding))
    }

    /// Decimate by `rate()`
    pub fn decimate(&self, x: &[i64], format: Format, rounding: Rounding) -> Vec<i64> {
        self.stages[..self.depth]
            .iter()
            .rev()
            .fold(x.to_vec(), |x, s| s.decimate(&x, format, rounding))
    }
}
