//! Individual normalization steps, each a pure function of its input

pub mod contrast;
pub mod grayscale;
pub mod resize;
