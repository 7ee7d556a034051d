//! MRZ image preparation
//!
//! Locates the MRZ band in a document photo and turns it into a bitmap the OCR
//! engine reads well.

pub mod pipeline;
pub mod region;
pub mod steps;

pub use pipeline::{NormalizedImage, Normalizer, StepTiming};
pub use region::{Region, SourceImage};
