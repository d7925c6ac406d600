//! Audio export
//!
//! Renders platform output to files.

pub mod wav;

pub use wav::{export_to_wav, write_wav_file};
