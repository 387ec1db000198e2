//! Signal and coefficient text formats
//!
//! Signal files carry `# key=value` metadata lines followed by one sample per line.
//! Complex samples are written as `re im`, and also read in the `(re+imj)` form.

use std::{collections::BTreeMap, fmt, fs, path::Path, str::FromStr};

use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::{Error, iir::SectionConfig};

/// Sample sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Samples {
    /// Real samples
    Real(Vec<f64>),
    /// I/Q samples
    Complex(Vec<Complex<f64>>),
}

impl Samples {
    /// Number of samples
    pub fn len(&self) -> usize {
        match self {
            Self::Real(x) => x.len(),
            Self::Complex(x) => x.len(),
        }
    }

    /// Whether there are no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A sample sequence with its metadata
///
/// ```
/// # use dsdac::signal::{Signal, Samples};
/// let s: Signal = "# OSR=16\n# fs=1e6\n# Signal data below\n0.5\n-1\n".parse().unwrap();
/// assert_eq!(s.get("OSR"), Some(16.0));
/// assert_eq!(s.samples, Samples::Real(vec![0.5, -1.0]));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Numeric metadata
    pub metadata: BTreeMap<String, f64>,
    /// Samples
    pub samples: Samples,
}

const HEADER_END: &str = "Signal data below";

fn parse_real(line: usize, s: &str) -> Result<f64, Error> {
    s.parse().map_err(|e| Error::Parse {
        line,
        msg: format!("`{s}`: {e}"),
    })
}

/// Parse `(re+imj)`, `(re-imj)` or `re`
fn parse_paren(line: usize, s: &str) -> Result<Complex<f64>, Error> {
    let Some(z) = s.strip_prefix('(').and_then(|s| s.strip_suffix(')')) else {
        return Ok(Complex::new(parse_real(line, s)?, 0.0));
    };
    let Some(z) = z.strip_suffix('j') else {
        return Ok(Complex::new(parse_real(line, z)?, 0.0));
    };
    let split = z
        .char_indices()
        .skip(1)
        .filter(|&(i, c)| (c == '+' || c == '-') && !z[..i].ends_with(['e', 'E']))
        .map(|(i, _)| i)
        .last();
    Ok(match split {
        Some(i) => Complex::new(parse_real(line, &z[..i])?, parse_real(line, &z[i..])?),
        None => Complex::new(0.0, parse_real(line, z)?),
    })
}

impl Signal {
    /// Real signal without metadata
    pub fn real(samples: Vec<f64>) -> Self {
        Self {
            metadata: BTreeMap::new(),
            samples: Samples::Real(samples),
        }
    }

    /// Complex signal without metadata
    pub fn complex(samples: Vec<Complex<f64>>) -> Self {
        Self {
            metadata: BTreeMap::new(),
            samples: Samples::Complex(samples),
        }
    }

    /// Integer stream (levels or symbols)
    pub fn integer<T: Copy + Into<f64>>(samples: &[T]) -> Self {
        Self::real(samples.iter().map(|&x| x.into()).collect())
    }

    /// Complex integer stream
    pub fn complex_integer<T: Copy + Into<f64>>(samples: &[Complex<T>]) -> Self {
        Self::complex(
            samples
                .iter()
                .map(|z| Complex::new(z.re.into(), z.im.into()))
                .collect(),
        )
    }

    /// Add a metadata entry
    pub fn with(mut self, key: &str, value: f64) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Metadata value
    pub fn get(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).copied()
    }

    /// Read and parse a file
    pub fn read(path: impl AsRef<Path>) -> Result<Self, Error> {
        fs::read_to_string(path)?.parse()
    }

    /// Write to a file
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        Ok(fs::write(path, self.to_string())?)
    }
}

impl FromStr for Signal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let mut metadata = BTreeMap::new();
        let mut data = Vec::new();
        let mut paired = false;
        for (i, line) in s.lines().enumerate() {
            let line_no = i + 1;
            let line = line.trim();
            if let Some(meta) = line.strip_prefix('#') {
                let Some((key, value)) = meta.split_once('=') else {
                    continue;
                };
                match value.trim().parse::<f64>() {
                    Ok(v) => {
                        metadata.insert(key.trim().to_string(), v);
                    }
                    Err(_) => log::warn!("line {line_no}: ignoring non-numeric metadata `{meta}`"),
                }
                continue;
            }
            let mut fields = line.split_whitespace();
            let z = match (fields.next(), fields.next(), fields.next()) {
                (None, ..) => continue,
                (Some(x), None, _) => parse_paren(line_no, x)?,
                (Some(re), Some(im), None) => {
                    paired = true;
                    Complex::new(parse_real(line_no, re)?, parse_real(line_no, im)?)
                }
                _ => {
                    return Err(Error::Parse {
                        line: line_no,
                        msg: "more than two values".into(),
                    });
                }
            };
            paired |= z.im != 0.0;
            data.push(z);
        }
        let complex = paired || metadata.get("complex").is_some_and(|&c| c != 0.0);
        let samples = if complex {
            Samples::Complex(data)
        } else {
            Samples::Real(data.into_iter().map(|z| z.re).collect())
        };
        Ok(Self { metadata, samples })
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let complex = matches!(self.samples, Samples::Complex(_));
        for (key, value) in self.metadata.iter().filter(|(k, _)| *k != "complex") {
            writeln!(f, "# {key}={value}")?;
        }
        writeln!(f, "# complex={}", complex as u8)?;
        writeln!(f, "# {HEADER_END}")?;
        match &self.samples {
            Samples::Real(x) => x.iter().try_for_each(|x| writeln!(f, "{x}")),
            Samples::Complex(x) => x.iter().try_for_each(|x| writeln!(f, "{} {}", x.re, x.im)),
        }
    }
}

fn numbers(line_no: usize, line: &str) -> Result<Vec<f64>, Error> {
    line.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| parse_real(line_no, s))
        .collect()
}

fn data_lines(s: &str) -> impl Iterator<Item = (usize, &str)> {
    s.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
}

/// Parse multi-stage coefficients: one stage per line, lowest rate stage first
///
/// ```
/// # use dsdac::signal::parse_stages;
/// let h = parse_stages("0.25 0.5 0.25\n\n-0.125 0.5 1 0.5 -0.125\n").unwrap();
/// assert_eq!(h.len(), 2);
/// assert_eq!(h[1][2], 1.0);
/// ```
pub fn parse_stages(s: &str) -> Result<Vec<Vec<f64>>, Error> {
    data_lines(s).map(|(i, l)| numbers(i, l)).collect()
}

/// Write multi-stage coefficients at full precision
pub fn write_stages(stages: &[Vec<f64>]) -> String {
    stages
        .iter()
        .map(|h| {
            let h: Vec<_> = h.iter().map(|h| format!("{h:e}")).collect();
            h.join(" ") + "\n"
        })
        .collect()
}

/// A coefficient block of a tagged file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaggedCoefficients {
    /// Polyphase factor (`I=`)
    pub factor: Option<usize>,
    /// Stop band attenuation in dB (`AdB=`)
    pub attenuation: Option<f64>,
    /// Taps
    pub taps: Vec<f64>,
}

/// Parse tagged coefficient blocks
///
/// Each block is an optional `I=<factor>, AdB=<attenuation>` header
/// followed by one coefficient per line.
///
/// ```
/// # use dsdac::signal::parse_tagged;
/// let t = parse_tagged("I=2, AdB=60\n0.5\n1.0\nI=4, AdB=40\n0.25\n").unwrap();
/// assert_eq!(t.len(), 2);
/// assert_eq!(t[0].factor, Some(2));
/// assert_eq!(t[1].attenuation, Some(40.0));
/// assert_eq!(t[1].taps, [0.25]);
/// ```
pub fn parse_tagged(s: &str) -> Result<Vec<TaggedCoefficients>, Error> {
    let mut blocks: Vec<TaggedCoefficients> = Vec::new();
    for (line_no, line) in data_lines(s) {
        if !line.contains('=') {
            let v = parse_real(line_no, line)?;
            match blocks.last_mut() {
                Some(b) => b.taps.push(v),
                None => blocks.push(TaggedCoefficients {
                    taps: vec![v],
                    ..Default::default()
                }),
            }
            continue;
        }
        let mut block = TaggedCoefficients::default();
        for tag in line.split(',') {
            let err = |msg: String| Error::Parse { line: line_no, msg };
            let (key, value) = tag
                .split_once('=')
                .ok_or_else(|| err(format!("malformed tag `{tag}`")))?;
            let value = value.trim();
            match key.trim() {
                "I" => {
                    block.factor = Some(
                        value
                            .parse()
                            .map_err(|e| err(format!("factor `{value}`: {e}")))?,
                    )
                }
                "AdB" => block.attenuation = Some(parse_real(line_no, value)?),
                key => log::warn!("line {line_no}: ignoring tag `{key}`"),
            }
        }
        blocks.push(block);
    }
    Ok(blocks)
}

/// Write tagged coefficient blocks
pub fn write_tagged(blocks: &[TaggedCoefficients]) -> String {
    let mut s = String::new();
    for b in blocks {
        match (b.factor, b.attenuation) {
            (Some(i), Some(a)) => s += &format!("I={i}, AdB={a}\n"),
            (Some(i), None) => s += &format!("I={i}\n"),
            (None, Some(a)) => s += &format!("AdB={a}\n"),
            (None, None) => {}
        }
        for h in b.taps.iter() {
            s += &format!("{h:e}\n");
        }
    }
    s
}

/// Parse loop filter sections: one `b0 b1 b2 a0 a1 a2` row per line
///
/// ```
/// # use dsdac::signal::parse_sections;
/// let s = parse_sections("7.3765809 0 0 1 -0.3466036 0\n").unwrap();
/// assert_eq!(s[0].a.len(), 2);
/// ```
pub fn parse_sections(s: &str) -> Result<Vec<SectionConfig>, Error> {
    data_lines(s)
        .map(|(i, l)| {
            SectionConfig::from_row(&numbers(i, l)?).map_err(|e| Error::Parse {
                line: i,
                msg: e.to_string(),
            })
        })
        .collect()
}
