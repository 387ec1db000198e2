/// Datapath error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed filter: empty taps, zero `a0`, zero rate factor or
    /// numerator taps the section structure cannot realize
    #[error("invalid filter specification: {0}")]
    InvalidFilterSpec(&'static str),
    /// An IIR section denominator has neither 2 nor 3 coefficients
    #[error("unsupported section order: denominator with {0} coefficients")]
    UnsupportedSectionOrder(usize),
    /// A quantizer level maps outside the LUT
    #[error("level {level} maps to LUT index {index} outside 0..{rows}")]
    IndexOutOfRange {
        /// Quantizer level
        level: i32,
        /// Computed row index (before reversal)
        index: i64,
        /// Number of LUT rows
        rows: usize,
    },
    /// Fixed point format error
    #[error(transparent)]
    Fixed(#[from] dsp_fixedpoint::Error),
    /// Malformed lookup table
    #[error("invalid LUT: {0}")]
    InvalidLut(&'static str),
    /// Malformed signal or coefficient text
    #[error("line {line}: {msg}")]
    Parse {
        /// One-based line number
        line: usize,
        /// Description
        msg: String,
    },
    /// I/O
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
