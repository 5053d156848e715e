//! # Convert Module
//!
//! Normalizes videos to a single target format (H.264 in MP4).
//!
//! ## Decision matrix
//! - Output already present: skip
//! - Legacy container (`.mov`): always re-encode
//! - Target container with target codec: copy or rename, never re-encode
//! - Target container with another or unknown codec: re-encode
//! - Any other video container: re-encode
//!
//! Encodes are written to a hidden `*.partial.mp4` file next to the final
//! output and only renamed into place after the encoder exits cleanly.

mod decision;
mod encoder;
mod engine;
mod progress;

pub use decision::{decide, ConversionAction, EncodeReason, TargetFormat};
pub use encoder::{AudioStreams, EncodeRequest, EncoderSettings, FfmpegEncoder, VideoEncoder};
pub use engine::{
    find_unconverted, mirrored_output_path, sweep_partials, ConversionJob, NormalizeConfig,
    NormalizeReport, Normalizer,
};
pub use progress::{estimate, ProgressSample, ProgressStream};
