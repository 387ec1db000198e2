use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::{Error, QuantType};

mod builtin {
    include!(concat!(env!("OUT_DIR"), "/luts.rs"));
}

/// Quantization level to codeword lookup table
///
/// Row 0 is the codeword of the highest level. All rows have the same width.
/// Symbols are `1`, and `0` or `-1` (both the low symbol).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<i8>>", into = "Vec<Vec<i8>>")]
pub struct Lut {
    rows: Vec<Vec<i8>>,
}

impl TryFrom<Vec<Vec<i8>>> for Lut {
    type Error = Error;
    fn try_from(rows: Vec<Vec<i8>>) -> Result<Self, Error> {
        Self::new(rows)
    }
}

impl From<Lut> for Vec<Vec<i8>> {
    fn from(value: Lut) -> Self {
        value.rows
    }
}

impl Lut {
    /// Validate a table
    pub fn new(rows: Vec<Vec<i8>>) -> Result<Self, Error> {
        let Some(width) = rows.first().map(Vec::len) else {
            return Err(Error::InvalidLut("no rows"));
        };
        if width == 0 {
            return Err(Error::InvalidLut("empty codeword"));
        }
        if rows.iter().any(|r| r.len() != width) {
            return Err(Error::InvalidLut("rows differ in width"));
        }
        if rows.iter().flatten().any(|s| !(-1..=1).contains(s)) {
            return Err(Error::InvalidLut("symbol not in {-1, 0, 1}"));
        }
        Ok(Self { rows })
    }

    fn from_static(rows: &[&[i8]]) -> Self {
        Self {
            rows: rows.iter().map(|r| r.to_vec()).collect(),
        }
    }

    /// Parse nested JSON arrays
    ///
    /// ```
    /// # use dsdac::Lut;
    /// let lut = Lut::from_json("[[1, 1], [0, 1], [0, 0]]").unwrap();
    /// assert_eq!(lut.weights(), [2, 0, -2]);
    /// assert!(Lut::from_json("[[1, 1], [0]]").is_err());
    /// ```
    pub fn from_json(s: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(s)?)
    }

    /// Serialize as nested JSON arrays
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// Number of rows (quantizer levels)
    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    /// Codeword length
    pub fn width(&self) -> usize {
        self.rows[0].len()
    }

    /// Stored codeword by row index
    pub fn row(&self, row: usize) -> Option<&[i8]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    /// Codeword of a row as `-1`/`+1` symbols
    pub fn bipolar(&self, row: usize) -> Option<impl Iterator<Item = i8> + '_> {
        self.row(row)
            .map(|r| r.iter().map(|&s| if s == 1 { 1 } else { -1 }))
    }

    /// Sum of the bipolar symbols of each row
    pub fn weights(&self) -> Vec<i32> {
        (0..self.rows())
            .filter_map(|i| self.bipolar(i))
            .map(|r| r.map(i32::from).sum())
            .collect()
    }
}

/// Built-in tables
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::AsRefStr,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum LutId {
    /// 17 levels, 16 symbols
    Lut1,
    /// 17 levels, 32 symbols
    Lut2,
    /// 17 levels, 32 symbols
    Lut3,
    /// 16 half-integer levels, 15 symbols
    Lut4,
    /// 16 half-integer levels, 19 symbols
    Lut5,
}

static LUTS: LazyLock<[Lut; 5]> = LazyLock::new(|| {
    [
        builtin::LUT1,
        builtin::LUT2,
        builtin::LUT3,
        builtin::LUT4,
        builtin::LUT5,
    ]
    .map(Lut::from_static)
});

impl LutId {
    /// The table
    pub fn table(&self) -> &'static Lut {
        &LUTS[*self as usize]
    }

    /// Quantizer type the table is laid out for
    pub fn quant_type(&self) -> QuantType {
        match self {
            Self::Lut1 | Self::Lut2 | Self::Lut3 => QuantType::MidTread,
            Self::Lut4 | Self::Lut5 => QuantType::MidRise,
        }
    }
}
