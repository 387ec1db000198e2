use dsp_fixedpoint::Fixed;
use miniconf::Tree;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::{
    CoefficientSet, Error, Lut, LutId, Modulator, ModulatorConfig, QuantType, Quantization,
    Serialized, Serializer, polyphase::Cascade,
};

/// Converter chain configuration
#[derive(Debug, Clone, PartialEq, Tree, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Modulator
    pub modulator: ModulatorConfig,
    /// Interpolation factor ahead of the modulator (a power of two, `1` bypasses)
    pub interpolation: usize,
    /// Interpolation stage coefficient quantization
    #[tree(with=miniconf::leaf)]
    pub quantization: Quantization,
    /// Serializer table
    #[tree(with=miniconf::leaf)]
    pub lut: LutId,
    /// Quantizer type, defaults to the one the table is laid out for
    #[tree(with=miniconf::leaf)]
    pub quant_type: Option<QuantType>,
    /// LUT level offset override
    #[tree(with=miniconf::leaf)]
    pub offset: Option<i64>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            modulator: ModulatorConfig::default(),
            interpolation: 1,
            quantization: Quantization::Fit(16),
            lut: LutId::Lut1,
            quant_type: None,
            offset: None,
        }
    }
}

/// Modulator output and its serialization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversion {
    /// Quantizer levels at the modulator rate
    pub levels: Vec<i32>,
    /// Serialized codewords
    pub serialized: Serialized,
}

/// Interpolation, modulation and serialization
#[derive(Debug, Clone)]
pub struct Converter {
    cascade: Cascade,
    modulator: Modulator,
    lut: Lut,
    quant_type: QuantType,
    offset: Option<i64>,
}

impl Converter {
    /// Build the chain
    ///
    /// `stages` are the factor two interpolation prototypes, lowest rate first.
    /// Each carries the interpolation gain of two.
    ///
    /// ```
    /// # use dsdac::{Converter, ConverterConfig};
    /// let mut c = Converter::new(&ConverterConfig::default(), &[]).unwrap();
    /// let out = c.run(&[0.0; 16]).unwrap();
    /// assert_eq!(out.levels, [0; 16]);
    /// assert_eq!(out.serialized.symbols.len(), 16 * 16);
    /// ```
    pub fn new(config: &ConverterConfig, stages: &[Vec<f64>]) -> Result<Self, Error> {
        let stages = stages
            .iter()
            .map(|h| CoefficientSet::quantize(h, config.quantization))
            .collect::<Result<Vec<_>, _>>()?;
        let mut cascade = Cascade::new(&stages)?;
        cascade.set_rate(config.interpolation)?;
        Ok(Self {
            cascade,
            modulator: Modulator::new(&config.modulator)?,
            lut: config.lut.table().clone(),
            quant_type: config.quant_type.unwrap_or(config.lut.quant_type()),
            offset: config.offset,
        })
    }

    /// Use a custom table
    pub fn with_lut(mut self, lut: Lut, quant_type: QuantType) -> Self {
        self.lut = lut;
        self.quant_type = quant_type;
        self
    }

    /// Modulator
    pub fn modulator(&self) -> &Modulator {
        &self.modulator
    }

    /// Interpolation cascade
    pub fn cascade(&self) -> &Cascade {
        &self.cascade
    }

    /// The serializer in use
    pub fn serializer(&self) -> Serializer<'_> {
        let s = Serializer::new(&self.lut, self.quant_type);
        match self.offset {
            Some(offset) => s.with_offset(offset),
            None => s,
        }
    }

    fn levels(&mut self, x: &[f64]) -> Result<Vec<i32>, Error> {
        let format = self.modulator.input_format();
        let x: Vec<_> = x
            .iter()
            .map(|&x| Fixed::from_real(x, format).raw())
            .collect();
        let x: Vec<_> = self
            .cascade
            .interpolate(&x, format, self.modulator.rounding())
            .into_iter()
            .map(|x| Fixed::from_raw(x, format))
            .collect();
        self.modulator.run_fixed(&x)
    }

    /// Convert an independent real sequence
    pub fn run(&mut self, x: &[f64]) -> Result<Conversion, Error> {
        let levels = self.levels(x)?;
        let serialized = self.serializer().serialize(&levels);
        if !serialized.skipped.is_empty() {
            log::warn!(
                "{} of {} samples outside the table",
                serialized.skipped.len(),
                levels.len()
            );
        }
        Ok(Conversion { levels, serialized })
    }

    /// Convert real and imaginary parts as independent sequences
    pub fn run_complex(&mut self, x: &[Complex<f64>]) -> Result<Complex<Conversion>, Error> {
        let re: Vec<_> = x.iter().map(|x| x.re).collect();
        let im: Vec<_> = x.iter().map(|x| x.im).collect();
        Ok(Complex::new(self.run(&re)?, self.run(&im)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rfiq;

    #[test]
    fn config_json() {
        let mut v = serde_json::to_value(ConverterConfig::default()).unwrap();
        assert_eq!(v["lut"], "LUT1");
        assert_eq!(v["quant_type"], serde_json::Value::Null);
        v["lut"] = "LUT4".into();
        v["quant_type"] = "mid-rise".into();
        v["offset"] = 6.into();
        let cfg: ConverterConfig = serde_json::from_value(v.clone()).unwrap();
        assert_eq!(
            (cfg.lut, cfg.quant_type, cfg.offset),
            (LutId::Lut4, Some(QuantType::MidRise), Some(6))
        );
        let c = Converter::new(&cfg, &[]).unwrap();
        assert_eq!(c.serializer().offset(), 6);
        v["lut"] = "LUT9".into();
        assert!(serde_json::from_value::<ConverterConfig>(v).is_err());
    }

    #[test]
    fn bypass() {
        let mut c = Converter::new(&ConverterConfig::default(), &[]).unwrap();
        let x: Vec<_> = (0..1000).map(|i| 3.0 * (0.01 * i as f64).sin()).collect();
        let out = c.run(&x).unwrap();
        let mut m = Modulator::new(&ModulatorConfig::default()).unwrap();
        assert_eq!(out.levels, m.run(&x));
        assert!(out.serialized.skipped.is_empty());
        assert_eq!(out.serialized.symbols.len(), 16 * x.len());
    }

    #[test]
    fn interpolate() {
        let cfg = ConverterConfig {
            interpolation: 4,
            lut: LutId::Lut2,
            ..Default::default()
        };
        let stages = [vec![0.5, 1.0, 0.5], vec![0.5, 1.0, 0.5]];
        let mut c = Converter::new(&cfg, &stages).unwrap();
        assert_eq!(c.cascade().rate(), 4);
        let out = c.run(&[1.5; 500]).unwrap();
        assert_eq!(out.levels.len(), 2000);
        let mean = out.levels[1000..].iter().map(|&l| l as f64).sum::<f64>() / 1000.0;
        assert!((mean - 1.5).abs() < 0.02, "{mean}");
        // LUT2 row weights are four times the level
        let dc = out.serialized.symbols[1000 * 32..]
            .iter()
            .map(|&s| s as f64)
            .sum::<f64>()
            / 1000.0;
        assert!((dc - 4.0 * 1.5).abs() < 0.1, "{dc}");
    }

    #[test]
    fn rate() {
        let cfg = ConverterConfig {
            interpolation: 3,
            ..Default::default()
        };
        assert!(matches!(
            Converter::new(&cfg, &[vec![1.0]]),
            Err(Error::InvalidFilterSpec(_))
        ));
        let cfg = ConverterConfig {
            interpolation: 2,
            ..Default::default()
        };
        assert!(Converter::new(&cfg, &[]).is_err());
    }

    #[test]
    fn offset() {
        let cfg = ConverterConfig {
            offset: Some(0),
            ..Default::default()
        };
        let mut c = Converter::new(&cfg, &[]).unwrap();
        let out = c.run(&[-2.0; 100]).unwrap();
        assert!(!out.serialized.skipped.is_empty());
        assert_eq!(
            out.serialized.symbols.len(),
            16 * (100 - out.serialized.skipped.len())
        );
    }

    #[test]
    fn complex() {
        let mut c = Converter::new(&ConverterConfig::default(), &[])
            .unwrap()
            .with_lut(LutId::Lut4.table().clone(), QuantType::MidRise);
        let x: Vec<_> = (0..256)
            .map(|i| Complex::from_polar(2.0, 0.05 * i as f64))
            .collect();
        let out = c.run_complex(&x).unwrap();
        assert_eq!(out.re.serialized.symbols.len(), out.im.serialized.symbols.len());
        let z = rfiq(&out.re.serialized.symbols, &out.im.serialized.symbols);
        assert_eq!(z.len(), 4 * 256 * 15);
    }
}
