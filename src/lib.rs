//! Passport MRZ extraction: crop the machine readable zone out of a photo,
//! normalize it for OCR and decode the ICAO 9303 TD3 fields.

pub mod config;
pub mod engine;
pub mod engines;
pub mod error;
pub mod gate;
pub mod mrz;
pub mod preprocessing;
pub mod scan;
pub mod server;
pub mod sink;
