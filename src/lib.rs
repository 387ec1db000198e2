#![doc = include_str!("../README.md")]

pub use dsp_fixedpoint::{Fixed, Format, Rounding};
pub use dsp_process::{Inplace, Process};

mod error;
pub use error::*;
mod accu;
pub use accu::*;
mod coefficients;
pub use coefficients::*;
mod fir;
pub use fir::*;
pub mod iir;
pub mod polyphase;
mod dsm;
pub use dsm::*;
mod lut;
pub use lut::*;
mod serializer;
pub use serializer::*;
pub mod signal;
mod converter;
pub use converter::*;
