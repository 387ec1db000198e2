//! Fixed point IIR sections and parallel section filters
//!
//! A higher order loop filter is realized as a sum of first and second order
//! sections driven by the same input.

use dsp_fixedpoint::{Fixed, Format, Rounding};
use dsp_process::{Inplace, Process};
use miniconf::Tree;
use serde::{Deserialize, Serialize};

use crate::{Accu, CoefficientSet, Error, Quantization};

/// Real valued section coefficients before quantization
///
/// `a[0]` normalizes the section. `a` must have 2 (first order) or 3
/// (second order) coefficients.
#[derive(Debug, Clone, PartialEq, Tree, Serialize, Deserialize)]
pub struct SectionConfig {
    /// Feed forward coefficients `[b0, b1]`
    #[tree(with=miniconf::leaf)]
    pub b: Vec<f64>,
    /// Feed back coefficients `[a0, a1, a2]`
    #[tree(with=miniconf::leaf)]
    pub a: Vec<f64>,
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            b: vec![0.0],
            a: vec![1.0, 0.0],
        }
    }
}

impl SectionConfig {
    /// Create from coefficient vectors
    pub fn new(b: Vec<f64>, a: Vec<f64>) -> Self {
        Self { b, a }
    }

    /// Create from a `[b0, b1, b2, a0, a1, a2]` row
    ///
    /// Trailing zero coefficients are dropped to determine the order.
    ///
    /// ```
    /// # use dsdac::iir::SectionConfig;
    /// let s = SectionConfig::from_row(&[7.3765809, 0.0, 0.0, 1.0, -0.3466036, 0.0]).unwrap();
    /// assert_eq!(s.b, [7.3765809]);
    /// assert_eq!(s.a, [1.0, -0.3466036]);
    /// ```
    pub fn from_row(row: &[f64]) -> Result<Self, Error> {
        if row.len() != 6 {
            return Err(Error::InvalidFilterSpec("section row needs 6 coefficients"));
        }
        let (b, a) = row.split_at(3);
        let trim = |c: &[f64], min: usize| {
            let n = c.iter().rposition(|&c| c != 0.0).map_or(0, |i| i + 1);
            c[..n.max(min)].to_vec()
        };
        Ok(Self {
            b: trim(b, 1),
            a: trim(a, 2),
        })
    }
}

/// Section order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// `y = b0*x - a1*y1`
    First,
    /// `w = x - a1*w1 - a2*w2`, `y = b0*w + b1*w1`
    Second,
}

/// Fixed point first or second order section
///
/// Coefficients are normalized by `a0` and quantized.
/// Sums are formed at accumulator width (data word plus coefficient word)
/// with saturation after every partial sum and narrowed back to the data
/// format with `rounding`. State is kept in the data format.
///
/// The second order section keeps the two most recent values of the summing
/// junction `w` as state (`w1`, `w2`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    order: Order,
    taps: CoefficientSet,
    format: Format,
    rounding: Rounding,
    state: [i64; 2],
}

impl Section {
    /// Quantize a section
    ///
    /// # Args
    /// * `config`: Real coefficients
    /// * `format`: Data and state format
    /// * `quantization`: Coefficient quantization
    /// * `rounding`: Rounding when narrowing sums to `format`
    pub fn new(
        config: &SectionConfig,
        format: Format,
        quantization: Quantization,
        rounding: Rounding,
    ) -> Result<Self, Error> {
        let SectionConfig { b, a } = config;
        let order = match a.len() {
            2 => Order::First,
            3 => Order::Second,
            n => return Err(Error::UnsupportedSectionOrder(n)),
        };
        let a0 = a[0];
        if a0 == 0.0 || !a0.is_finite() {
            return Err(Error::InvalidFilterSpec("a0 must be finite and non-zero"));
        }
        if b.is_empty() {
            return Err(Error::InvalidFilterSpec("empty numerator"));
        }
        let nb = match order {
            Order::First => 1,
            Order::Second => 2,
        };
        if b.iter().skip(nb).any(|&b| b != 0.0) {
            return Err(Error::InvalidFilterSpec("numerator exceeds section structure"));
        }
        let b1 = b.get(1).copied().unwrap_or_default();
        let c = match order {
            Order::First => vec![b[0], a[1]],
            Order::Second => vec![b[0], b1, a[1], a[2]],
        };
        let c: Vec<_> = c.into_iter().map(|c| c / a0).collect();
        Ok(Self {
            order,
            taps: CoefficientSet::quantize(&c, quantization)?,
            format,
            rounding,
            state: [0; 2],
        })
    }

    /// Order
    pub fn order(&self) -> Order {
        self.order
    }

    /// Quantized coefficients: `[b0, a1]` or `[b0, b1, a1, a2]`
    pub fn coefficients(&self) -> &CoefficientSet {
        &self.taps
    }

    /// Data format
    pub fn format(&self) -> Format {
        self.format
    }

    /// State: `[y1, 0]` (first order) or `[w1, w2]` (second order)
    pub fn state(&self) -> [i64; 2] {
        self.state
    }

    /// Clear the state
    pub fn reset(&mut self) {
        self.state = [0; 2];
    }

    fn accu(&self) -> Accu {
        Accu::for_product(&self.format, self.taps.word(), self.taps.frac())
    }
}

impl Process<i64> for Section {
    fn process(&mut self, x: i64) -> i64 {
        let c = self.taps.raw();
        let mut acc = self.accu();
        match self.order {
            Order::First => {
                let [y1, _] = self.state;
                acc.mac(c[0], x).msub(c[1], y1);
                let y = acc.narrow(&self.format, self.rounding);
                self.state[0] = y;
                y
            }
            Order::Second => {
                let [w1, w2] = self.state;
                acc.add_sample(x, self.format.frac())
                    .msub(c[2], w1)
                    .msub(c[3], w2);
                let w = acc.narrow(&self.format, self.rounding);
                let mut acc = self.accu();
                acc.mac(c[0], w).mac(c[1], w1);
                self.state = [w, w1];
                acc.narrow(&self.format, self.rounding)
            }
        }
    }
}

impl Inplace<i64> for Section {}

/// Parallel sections
///
/// All sections see the same input. Their outputs are summed exactly and
/// saturated once to the data format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelSections {
    sections: Vec<Section>,
    format: Format,
}

impl ParallelSections {
    /// Quantize a set of sections sharing one data format
    pub fn new(
        config: &[SectionConfig],
        format: Format,
        quantization: Quantization,
        rounding: Rounding,
    ) -> Result<Self, Error> {
        Ok(Self {
            sections: config
                .iter()
                .map(|c| Section::new(c, format, quantization, rounding))
                .collect::<Result<_, _>>()?,
            format,
        })
    }

    /// Sections
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Clear all section states
    pub fn reset(&mut self) {
        self.sections.iter_mut().for_each(Section::reset);
    }
}

impl Process<i64> for ParallelSections {
    fn process(&mut self, x: i64) -> i64 {
        let y = self
            .sections
            .iter_mut()
            .map(|s| s.process(x) as i128)
            .sum();
        self.format.saturate(y)
    }
}

impl Inplace<i64> for ParallelSections {}

/// Filter a sequence with parallel sections
///
/// Section `i` has numerator `b_list[i]` and denominator `a_list[i]`.
/// Coefficients are quantized to `format` and sums are truncated.
///
/// ```
/// # use dsdac::iir::parallel_sections;
/// # use dsp_fixedpoint::{Fixed, Format};
/// let f = Format::new(16, 8, true).unwrap();
/// let x: Vec<_> = [1.0, 0.0, 0.0].iter().map(|&x| Fixed::from_real(x, f)).collect();
/// let y = parallel_sections(&[vec![0.5], vec![0.25]], &[vec![1.0, -0.5], vec![1.0, 0.0, 0.0]], &x, f).unwrap();
/// assert_eq!(y.iter().map(|y| y.to_real()).collect::<Vec<_>>(), [0.75, 0.25, 0.125]);
/// ```
pub fn parallel_sections(
    b_list: &[Vec<f64>],
    a_list: &[Vec<f64>],
    x: &[Fixed],
    format: Format,
) -> Result<Vec<Fixed>, Error> {
    if b_list.len() != a_list.len() {
        return Err(Error::InvalidFilterSpec("numerator and denominator counts differ"));
    }
    let config: Vec<_> = b_list
        .iter()
        .zip(a_list)
        .map(|(b, a)| SectionConfig::new(b.clone(), a.clone()))
        .collect();
    let mut p = ParallelSections::new(
        &config,
        format,
        Quantization::Format(format),
        Rounding::Truncate,
    )?;
    x.iter()
        .map(|x| -> Result<_, Error> {
            if x.format() != format {
                Err(dsp_fixedpoint::Error::FormatMismatch {
                    lhs: x.format(),
                    rhs: format,
                }
                .into())
            } else {
                Ok(Fixed::from_raw(p.process(x.raw()), format))
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn q88() -> Format {
        Format::new(16, 8, true).unwrap()
    }

    fn impulse(s: &mut impl Process<i64>, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| s.process(if i == 0 { 256 } else { 0 }) as f64 / 256.0)
            .collect()
    }

    #[test]
    fn first_order() {
        let cfg = SectionConfig::new(vec![0.5], vec![1.0, -0.5]);
        let mut s = Section::new(&cfg, q88(), Quantization::Fit(12), Rounding::Truncate).unwrap();
        assert_eq!(s.order(), Order::First);
        assert_eq!(impulse(&mut s, 4), [0.5, 0.25, 0.125, 0.0625]);
        // normalization by a0
        let cfg = SectionConfig::new(vec![1.0], vec![2.0, -1.0]);
        let mut t = Section::new(&cfg, q88(), Quantization::Fit(12), Rounding::Truncate).unwrap();
        assert_eq!(t.coefficients(), s.coefficients());
        assert_eq!(impulse(&mut t, 2), [0.5, 0.25]);
        assert_eq!(t.state(), [64, 0]);
        t.reset();
        assert_eq!(t.state(), [0, 0]);
    }

    #[test]
    fn second_order() {
        let cfg = SectionConfig::new(vec![1.0], vec![1.0, -1.0, 0.5]);
        let mut s = Section::new(&cfg, q88(), Quantization::Fit(12), Rounding::Truncate).unwrap();
        assert_eq!(s.order(), Order::Second);
        assert_eq!(impulse(&mut s, 6), [1.0, 1.0, 0.5, 0.0, -0.25, -0.25]);
        assert_eq!(s.state(), [-64, -64]);

        let cfg = SectionConfig::new(vec![0.5, 0.25, 0.0], vec![1.0, 0.0, 0.0]);
        let mut s = Section::new(&cfg, q88(), Quantization::Fit(12), Rounding::Truncate).unwrap();
        assert_eq!(impulse(&mut s, 3), [0.5, 0.25, 0.0]);
    }

    #[test]
    fn saturation() {
        let cfg = SectionConfig::new(vec![1.0], vec![1.0, -1.0]);
        let mut s = Section::new(&cfg, q88(), Quantization::Fit(12), Rounding::Truncate).unwrap();
        let mut y = [i16::MAX as i64; 4];
        s.inplace(&mut y);
        assert_eq!(y, [i16::MAX as i64; 4]);
        let mut y = [i16::MIN as i64; 2];
        s.inplace(&mut y);
        // integrator state recovers from the positive rail without wrapping
        assert_eq!(y, [-1, i16::MIN as i64]);
    }

    #[test]
    fn errors() {
        let f = q88();
        let q = Quantization::Fit(12);
        let r = Rounding::Truncate;
        for (a, n) in [(vec![1.0, 0.1, 0.2, 0.3], 4), (vec![1.0], 1), (vec![], 0)] {
            assert!(matches!(
                Section::new(&SectionConfig::new(vec![1.0], a), f, q, r),
                Err(Error::UnsupportedSectionOrder(m)) if m == n
            ));
        }
        assert!(matches!(
            Section::new(&SectionConfig::new(vec![1.0], vec![0.0, 0.5]), f, q, r),
            Err(Error::InvalidFilterSpec(_))
        ));
        assert!(matches!(
            Section::new(&SectionConfig::new(vec![], vec![1.0, 0.5]), f, q, r),
            Err(Error::InvalidFilterSpec(_))
        ));
        assert!(matches!(
            Section::new(&SectionConfig::new(vec![1.0, 1.0], vec![1.0, 0.5]), f, q, r),
            Err(Error::InvalidFilterSpec(_))
        ));
        let x = [Fixed::zero(f)];
        assert!(matches!(
            parallel_sections(&[vec![1.0], vec![1.0]], &[vec![1.0, 0.5], vec![1.0; 5]], &x, f),
            Err(Error::UnsupportedSectionOrder(5))
        ));
        assert!(parallel_sections(&[vec![1.0]], &[], &x, f).is_err());
        let x = [Fixed::zero(Format::new(16, 7, true).unwrap())];
        assert!(matches!(
            parallel_sections(&[vec![1.0]], &[vec![1.0, 0.5]], &x, f),
            Err(Error::Fixed(_))
        ));
    }

    #[test]
    fn parallel() {
        let f = q88();
        let cfg = [
            SectionConfig::new(vec![0.75], vec![1.0, -0.5]),
            SectionConfig::new(vec![0.5, -0.25], vec![1.0, -0.25, 0.125]),
        ];
        let mut p =
            ParallelSections::new(&cfg, f, Quantization::Format(f), Rounding::Truncate).unwrap();
        let mut s: Vec<_> = cfg
            .iter()
            .map(|c| Section::new(c, f, Quantization::Format(f), Rounding::Truncate).unwrap())
            .collect();
        for x in [100, -3, 17, 0, 0, 255, -256, 1] {
            let want: i64 = s.iter_mut().map(|s| s.process(x)).sum();
            assert_eq!(p.process(x), want);
        }
        assert_eq!(p.sections().len(), 2);
        p.reset();
        assert!(p.sections().iter().all(|s| s.state() == [0, 0]));
    }

    #[test]
    fn rows() {
        let row = [0.424071040, -2.782608716, 0.0, 1.0, -0.66591402, 0.16260264];
        let s = SectionConfig::from_row(&row).unwrap();
        assert_eq!(s.b, [0.424071040, -2.782608716]);
        assert_eq!(s.a.len(), 3);
        let s = SectionConfig::from_row(&[0.0; 6]).unwrap();
        assert_eq!((s.b.len(), s.a.len()), (1, 2));
        assert!(SectionConfig::from_row(&[1.0; 5]).is_err());
        assert!(SectionConfig::from_row(&[1.0; 7]).is_err());
    }
}
