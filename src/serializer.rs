use core::ops::Neg;

use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::{Error, Lut};

/// Quantizer characteristic the LUT rows are laid out for
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::AsRefStr,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum QuantType {
    /// Zero is a level
    #[default]
    MidTread,
    /// Zero is a decision threshold
    MidRise,
}

/// A level that has no row in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skipped {
    /// Sample index in the level sequence
    pub position: usize,
    /// Offending level
    pub level: i32,
    /// Computed row index
    pub index: i64,
}

/// Serialized stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Serialized {
    /// Bipolar symbols, one codeword per serialized sample
    pub symbols: Vec<i8>,
    /// Table row used for each input sample (`None` if skipped)
    pub rows: Vec<Option<usize>>,
    /// Samples without a codeword
    pub skipped: Vec<Skipped>,
}

/// Level to codeword stream serializer
///
/// Level `l` selects row `rows - 1 - (l + offset)` of the table.
#[derive(Debug, Clone, Copy)]
pub struct Serializer<'a> {
    lut: &'a Lut,
    offset: i64,
}

impl<'a> Serializer<'a> {
    /// Serializer with the offset centering the levels on the table
    ///
    /// The offset is half the row count, one less for mid-rise.
    pub fn new(lut: &'a Lut, quant: QuantType) -> Self {
        let offset = (lut.rows() / 2) as i64
            - match quant {
                QuantType::MidTread => 0,
                QuantType::MidRise => 1,
            };
        Self { lut, offset }
    }

    /// Override the level offset
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Level offset
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// The table
    pub fn lut(&self) -> &'a Lut {
        self.lut
    }

    /// Row of a level
    ///
    /// ```
    /// # use dsdac::{LutId, QuantType, Serializer};
    /// let s = Serializer::new(LutId::Lut1.table(), QuantType::MidTread);
    /// assert_eq!(s.row(8).unwrap(), 0);
    /// assert_eq!(s.row(-8).unwrap(), 16);
    /// assert!(s.row(9).is_err());
    /// ```
    pub fn row(&self, level: i32) -> Result<usize, Error> {
        let index = level as i64 + self.offset;
        let rows = self.lut.rows();
        if (0..rows as i64).contains(&index) {
            Ok(rows - 1 - index as usize)
        } else {
            Err(Error::IndexOutOfRange { level, index, rows })
        }
    }

    /// Bipolar codeword of a level
    pub fn codeword(&self, level: i32) -> Result<impl Iterator<Item = i8> + 'a, Error> {
        let row = self.row(level)?;
        let lut = self.lut;
        lut.bipolar(row).ok_or(Error::IndexOutOfRange {
            level,
            index: row as i64,
            rows: lut.rows(),
        })
    }

    /// Concatenate the codewords of a level sequence
    ///
    /// Levels without a row are skipped, logged and reported.
    pub fn serialize(&self, levels: &[i32]) -> Serialized {
        let mut out = Serialized {
            symbols: Vec::with_capacity(levels.len() * self.lut.width()),
            rows: Vec::with_capacity(levels.len()),
            skipped: Vec::new(),
        };
        for (position, &level) in levels.iter().enumerate() {
            match self.row(level) {
                Ok(row) => {
                    out.symbols.extend(self.lut.bipolar(row).into_iter().flatten());
                    out.rows.push(Some(row));
                }
                Err(err) => {
                    log::warn!("sample {position}: {err}");
                    out.skipped.push(Skipped {
                        position,
                        level,
                        index: level as i64 + self.offset,
                    });
                    out.rows.push(None);
                }
            }
        }
        out
    }

    /// Serialize real and imaginary parts independently
    pub fn serialize_complex(&self, levels: &[Complex<i32>]) -> Complex<Serialized> {
        let re: Vec<_> = levels.iter().map(|l| l.re).collect();
        let im: Vec<_> = levels.iter().map(|l| l.im).collect();
        Complex::new(self.serialize(&re), self.serialize(&im))
    }
}

/// Quarter rate upconversion of an I/Q symbol pair: `a, b, -a, -b` per sample
///
/// The shorter input determines the length.
///
/// ```
/// # use dsdac::rfiq;
/// assert_eq!(rfiq(&[1, -1], &[1, 1]), [1, 1, -1, -1, -1, 1, 1, -1]);
/// ```
pub fn rfiq<T: Copy + Neg<Output = T>>(a: &[T], b: &[T]) -> Vec<T> {
    a.iter()
        .zip(b)
        .flat_map(|(&a, &b)| [a, b, -a, -b])
        .collect()
}
