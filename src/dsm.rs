use dsp_fixedpoint::{Fixed, Format, Rounding};
use dsp_process::Process;
use miniconf::Tree;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::{
    Error, Quantization,
    iir::{ParallelSections, SectionConfig},
};

const fn format(word: u32, frac: u32) -> Format {
    match Format::new(word, frac, true) {
        Ok(f) => f,
        Err(_) => panic!("invalid format"),
    }
}

/// Default modulator input format `Q4.8`
pub const INPUT_FORMAT: Format = format(12, 8);
/// Default loop state format `Q5.19`
pub const STATE_FORMAT: Format = format(24, 19);
/// Default quantizer format: 5 bit integer levels
pub const QUANTIZER_FORMAT: Format = format(5, 0);

/// Delta-sigma modulator configuration
///
/// The defaults are the reference loop: three parallel sections
/// (H0 first order, H1 and H2 second order) with 12 bit coefficients.
#[derive(Debug, Clone, PartialEq, Tree, Serialize, Deserialize)]
pub struct ModulatorConfig {
    /// Input samples are rounded and saturated to this format
    #[tree(with=miniconf::leaf)]
    pub input: Format,
    /// Loop state and loop filter data format
    #[tree(with=miniconf::leaf)]
    pub state: Format,
    /// Loop filter coefficient quantization
    #[tree(with=miniconf::leaf)]
    pub coefficients: Quantization,
    /// Quantizer output format
    #[tree(with=miniconf::leaf)]
    pub quantizer: Format,
    /// Rounding of loop filter sums to the state format
    #[tree(with=miniconf::leaf)]
    pub rounding: Rounding,
    /// Quantizer rounding
    #[tree(with=miniconf::leaf)]
    pub quantizer_rounding: Rounding,
    /// First order section H0
    pub h0: SectionConfig,
    /// Second order section H1
    pub h1: SectionConfig,
    /// Second order section H2
    pub h2: SectionConfig,
}

impl Default for ModulatorConfig {
    fn default() -> Self {
        Self {
            input: INPUT_FORMAT,
            state: STATE_FORMAT,
            coefficients: Quantization::Fit(12),
            quantizer: QUANTIZER_FORMAT,
            rounding: Rounding::Nearest,
            quantizer_rounding: Rounding::Truncate,
            h0: SectionConfig::new(vec![7.3765809], vec![1.0, -0.3466036]),
            h1: SectionConfig::new(
                vec![0.424071040, -2.782608716],
                vec![1.0, -0.66591402, 0.16260264],
            ),
            h2: SectionConfig::new(
                vec![-4.606822182, 0.023331537],
                vec![1.0, -0.62380242, 0.4509869],
            ),
        }
    }
}

/// Noise shaping delta-sigma modulator
///
/// Per sample (all in the state format, saturating):
///
/// 1. `y_i = x + y_iir` (input plus the previous loop filter output)
/// 2. `v = quantize(y_i)`: the output level
/// 3. `e = y_i - v`
/// 4. `y_iir = H0(e) + H1(e) + H2(e)`
///
/// The quantization error is shaped by the loop filter out of the signal band.
///
/// ```
/// # use dsdac::{Modulator, ModulatorConfig};
/// let mut m = Modulator::new(&ModulatorConfig::default()).unwrap();
/// assert!(m.run(&[]).is_empty());
/// let y = m.run(&[0.3; 4000]);
/// let mean = y[1000..].iter().map(|&y| y as f64).sum::<f64>() / 3000.0;
/// assert!((mean - 0.3).abs() < 0.01);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modulator {
    input: Format,
    state: Format,
    quantizer: Format,
    rounding: Rounding,
    quantizer_rounding: Rounding,
    filter: ParallelSections,
    y: i64,
    saturated: usize,
}

impl Modulator {
    /// Quantize the loop filter
    pub fn new(config: &ModulatorConfig) -> Result<Self, Error> {
        let filter = ParallelSections::new(
            &[config.h0.clone(), config.h1.clone(), config.h2.clone()],
            config.state,
            config.coefficients,
            config.rounding,
        )?;
        Ok(Self {
            input: config.input,
            state: config.state,
            quantizer: config.quantizer,
            rounding: config.rounding,
            quantizer_rounding: config.quantizer_rounding,
            filter,
            y: 0,
            saturated: 0,
        })
    }

    /// Clear loop filter state
    pub fn reset(&mut self) {
        self.filter.reset();
        self.y = 0;
        self.saturated = 0;
    }

    /// Loop filter output (the feedback for the next sample)
    pub fn loop_filter(&self) -> Fixed {
        Fixed::from_raw(self.y, self.state)
    }

    /// Loop filter sections
    pub fn filter(&self) -> &ParallelSections {
        &self.filter
    }

    /// Number of samples where the quantizer input saturated since the last reset
    pub fn saturated(&self) -> usize {
        self.saturated
    }

    /// Input format
    pub fn input_format(&self) -> Format {
        self.input
    }

    /// Loop state format
    pub fn state_format(&self) -> Format {
        self.state
    }

    /// Rounding of the loop filter and the input rescale
    pub fn rounding(&self) -> Rounding {
        self.rounding
    }

    fn finish(&self, y: &[i32]) {
        if let (Some(min), Some(max)) = (y.iter().min(), y.iter().max()) {
            log::debug!(
                "modulated {} samples, levels {min}..={max}, {} saturated, loop filter {}",
                y.len(),
                self.saturated,
                self.loop_filter()
            );
        }
    }

    /// Modulate an independent real sequence
    ///
    /// The state is reset first. Each sample is rounded and saturated to the input format.
    pub fn run(&mut self, x: &[f64]) -> Vec<i32> {
        self.reset();
        let y: Vec<_> = x
            .iter()
            .map(|&x| {
                let x = Fixed::from_real(x, self.input).rescale(self.state, self.rounding);
                self.process(x.raw())
            })
            .collect();
        self.finish(&y);
        y
    }

    /// Modulate an independent fixed point sequence in the input format
    pub fn run_fixed(&mut self, x: &[Fixed]) -> Result<Vec<i32>, Error> {
        if let Some(x) = x.iter().find(|x| x.format() != self.input) {
            return Err(dsp_fixedpoint::Error::FormatMismatch {
                lhs: x.format(),
                rhs: self.input,
            }
            .into());
        }
        self.reset();
        let y: Vec<_> = x
            .iter()
            .map(|x| {
                let x = x.rescale(self.state, self.rounding);
                self.process(x.raw())
            })
            .collect();
        self.finish(&y);
        Ok(y)
    }

    /// Modulate real and imaginary parts as two independent runs
    pub fn run_complex(&mut self, x: &[Complex<f64>]) -> Vec<Complex<i32>> {
        let re = self.run(&x.iter().map(|x| x.re).collect::<Vec<_>>());
        let im = self.run(&x.iter().map(|x| x.im).collect::<Vec<_>>());
        re.into_iter()
            .zip(im)
            .map(|(re, im)| Complex::new(re, im))
            .collect()
    }
}

impl Process<i64, i32> for Modulator {
    /// Ingest a sample in the state format, emit the quantizer level.
    fn process(&mut self, x: i64) -> i32 {
        let yi = x as i128 + self.y as i128;
        if !self.state.contains(yi) {
            self.saturated += 1;
        }
        let yi = Fixed::from_wide(yi, self.state);
        let v = yi.rescale(self.quantizer, self.quantizer_rounding);
        let e = yi.raw() as i128 - v.rescale(self.state, self.rounding).raw() as i128;
        self.y = self.filter.process(self.state.saturate(e));
        v.raw() as i32
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use miniconf::{IntoKeys, Path, TreeDeserialize};
    use rand::{prelude::*, rngs::StdRng};
    use rustfft::{FftPlanner, num_complex::Complex as C};

    #[test]
    fn defaults() {
        let m = Modulator::new(&ModulatorConfig::default()).unwrap();
        let c: Vec<_> = m
            .filter()
            .sections()
            .iter()
            .map(|s| (s.coefficients().raw().to_vec(), s.coefficients().frac()))
            .collect();
        assert_eq!(
            c,
            [
                (vec![15104, -710], 11),
                (vec![868, -5700, -1364, 333], 11),
                (vec![-9432, 48, -1278, 924], 11),
            ]
        );
        assert_eq!(format!("{}", m.state_format()), "Q5.19");
    }

    #[test]
    fn zero() {
        let mut m = Modulator::new(&ModulatorConfig::default()).unwrap();
        assert!(m.run(&[]).is_empty());
        let y = m.run(&[0.0; 200]);
        assert!(y.iter().all(|&y| y == 0));
        assert_eq!(m.loop_filter().raw(), 0);
    }

    #[test]
    fn small() {
        // a small constant input toggles the quantizer around level 0
        let mut m = Modulator::new(&ModulatorConfig::default()).unwrap();
        let y = m.run(&[0.5; 1000]);
        assert!(y.iter().any(|&y| y > 0) && y.iter().any(|&y| y <= 0));
        let mean = y[200..].iter().map(|&y| y as f64).sum::<f64>() / 800.0;
        assert!((mean - 0.5).abs() < 0.02, "{mean}");
    }

    #[test]
    fn stability() {
        let mut m = Modulator::new(&ModulatorConfig::default()).unwrap();
        for a in [1.0, 4.0, 7.0] {
            let x: Vec<_> = (0..10_000)
                .map(|i| a * (core::f64::consts::TAU * 0.001 * i as f64).sin())
                .collect();
            let y = m.run(&x);
            assert_eq!(y.len(), x.len());
            assert!(y.iter().all(|y| y.abs() <= 12), "{a}");
            assert_eq!(m.saturated(), 0);
            assert!(m.loop_filter().to_real().abs() < 8.0);
            for s in m.filter().sections() {
                assert!(s.state().iter().all(|w| w.abs() < 15 << 19));
            }
        }
    }

    #[test]
    fn noise_shaping() {
        let mut m = Modulator::new(&ModulatorConfig::default()).unwrap();
        let n = 1 << 12;
        let k = 8;
        let x: Vec<_> = (0..n)
            .map(|i| 3.0 * (core::f64::consts::TAU * (k * i) as f64 / n as f64).sin())
            .collect();
        let mut y: Vec<_> = m.run(&x).iter().map(|&y| C::new(y as f64, 0.0)).collect();
        FftPlanner::new().plan_fft_forward(n).process(&mut y);
        let p: Vec<_> = y.iter().map(|y| y.norm_sqr()).collect();
        let band = n / 32;
        let inband = (p[1..band].iter().sum::<f64>() - p[k]) / (band - 2) as f64;
        let outband = p[n / 4..n / 2].iter().sum::<f64>() / (n / 4) as f64;
        let shaping = 10.0 * (outband / inband).log10();
        log::info!("noise shaping {shaping} dB");
        assert!(shaping > 30.0);
        assert!(p[k] > 1e3 * outband);
    }

    #[test]
    fn fixed_and_complex() {
        let mut m = Modulator::new(&ModulatorConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let x: Vec<f64> = (0..500).map(|_| rng.random_range(-2.0..2.0)).collect();
        let y = m.run(&x);
        let xf: Vec<_> = x.iter().map(|&x| Fixed::from_real(x, INPUT_FORMAT)).collect();
        assert_eq!(m.run_fixed(&xf).unwrap(), y);
        let z: Vec<_> = x.iter().map(|&x| Complex::new(x, -x)).collect();
        let yz = m.run_complex(&z);
        assert_eq!(yz.iter().map(|y| y.re).collect::<Vec<_>>(), y);
        let neg: Vec<_> = x.iter().map(|x| -x).collect();
        assert_eq!(yz.iter().map(|y| y.im).collect::<Vec<_>>(), m.run(&neg));
        let bad = [Fixed::zero(STATE_FORMAT)];
        assert!(matches!(m.run_fixed(&bad), Err(Error::Fixed(_))));
    }

    #[test]
    fn config_json() {
        let c = ModulatorConfig::default();
        let s = serde_json::to_string(&c).unwrap();
        let d: ModulatorConfig = serde_json::from_str(&s).unwrap();
        assert_eq!(d, c);
        let bad = s.replace(
            r#""input":{"word":12,"frac":8,"signed":true}"#,
            r#""input":{"word":8,"frac":9,"signed":true}"#,
        );
        assert_ne!(bad, s);
        assert!(serde_json::from_str::<ModulatorConfig>(&bad).is_err());
    }

    #[test]
    fn config_tree() {
        fn set(c: &mut ModulatorConfig, path: &str, value: &str) -> bool {
            let mut de = serde_json::Deserializer::from_str(value);
            c.deserialize_by_key(Path::<_, '/'>(path).into_keys(), &mut de)
                .is_ok()
                && de.end().is_ok()
        }
        let mut c = ModulatorConfig::default();
        assert!(set(&mut c, "/rounding", r#""Truncate""#));
        assert_eq!(c.rounding, Rounding::Truncate);
        assert!(set(&mut c, "/h0/b", "[2.5]"));
        assert_eq!(c.h0.b, [2.5]);
        assert!(set(&mut c, "/coefficients", r#"{"Fit":14}"#));
        assert_eq!(c.coefficients, Quantization::Fit(14));
        assert!(!set(&mut c, "/input", r#"{"word":8,"frac":9,"signed":true}"#));
        assert_eq!(c.input, INPUT_FORMAT);
        assert!(!set(&mut c, "/gain", "1"));
        let m = Modulator::new(&c).unwrap();
        assert_eq!(m.rounding(), Rounding::Truncate);
    }

    #[test]
    fn unsupported() {
        let mut c = ModulatorConfig::default();
        c.h1.a.push(0.1);
        assert!(matches!(
            Modulator::new(&c),
            Err(Error::UnsupportedSectionOrder(4))
        ));
    }
}
