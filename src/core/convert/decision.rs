//! Per-file normalization decisions.
//!
//! [`decide`] is a pure function of the input path, the output path, the
//! probed codec and whether the output already exists. It never touches the
//! filesystem, so the whole matrix is unit-tested without media files.

use std::path::Path;

/// The container/codec pair every video is normalized to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFormat {
    /// Target container extension, lower-case
    pub container: String,
    /// Target video codec as reported by the prober
    pub codec: String,
    /// Containers that are always re-encoded regardless of codec
    pub legacy_containers: Vec<String>,
}

impl Default for TargetFormat {
    fn default() -> Self {
        Self {
            container: "mp4".to_string(),
            codec: "h264".to_string(),
            legacy_containers: vec!["mov".to_string()],
        }
    }
}

impl TargetFormat {
    /// True when `extension` (any case) is the target container
    pub fn is_target_container(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case(&self.container)
    }

    pub fn is_legacy_container(&self, extension: &str) -> bool {
        self.legacy_containers
            .iter()
            .any(|c| c.eq_ignore_ascii_case(extension))
    }

    pub fn is_target_codec(&self, codec: Option<&str>) -> bool {
        codec.is_some_and(|c| c.eq_ignore_ascii_case(&self.codec))
    }
}

/// Why a file is being re-encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeReason {
    /// Legacy container, always re-encoded
    LegacyContainer,
    /// Target container, but the codec is unknown or different
    CodecMismatch,
    /// Some other video container
    OtherContainer,
}

impl std::fmt::Display for EncodeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeReason::LegacyContainer => write!(f, "legacy container"),
            EncodeReason::CodecMismatch => write!(f, "codec mismatch"),
            EncodeReason::OtherContainer => write!(f, "non-target container"),
        }
    }
}

/// What to do with one video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionAction {
    /// Run the encoder
    Encode(EncodeReason),
    /// Already in the target format; copy or rename into place
    Passthrough,
    /// Output is already present
    SkipOutputExists,
    /// In-place target file that already has the target codec
    SkipAlreadyNormalized,
}

impl ConversionAction {
    pub fn needs_encoder(&self) -> bool {
        matches!(self, ConversionAction::Encode(_))
    }
}

/// Decide how to handle `input`.
///
/// `codec` is only consulted for target-container inputs; callers may pass
/// `None` for everything else without probing.
pub fn decide(
    target: &TargetFormat,
    input: &Path,
    output: &Path,
    codec: Option<&str>,
    output_exists: bool,
) -> ConversionAction {
    let in_place = input == output;

    if in_place {
        return if target.is_target_codec(codec) {
            ConversionAction::SkipAlreadyNormalized
        } else {
            ConversionAction::Encode(EncodeReason::CodecMismatch)
        };
    }

    if output_exists {
        return ConversionAction::SkipOutputExists;
    }

    let extension = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();

    if target.is_legacy_container(&extension) {
        ConversionAction::Encode(EncodeReason::LegacyContainer)
    } else if target.is_target_container(&extension) {
        if target.is_target_codec(codec) {
            ConversionAction::Passthrough
        } else {
            ConversionAction::Encode(EncodeReason::CodecMismatch)
        }
    } else {
        ConversionAction::Encode(EncodeReason::OtherContainer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decide_for(input: &str, output: &str, codec: Option<&str>, exists: bool) -> ConversionAction {
        decide(
            &TargetFormat::default(),
            Path::new(input),
            Path::new(output),
            codec,
            exists,
        )
    }

    #[test]
    fn legacy_container_always_encodes() {
        assert_eq!(
            decide_for("/in/a.mov", "/out/a.mp4", Some("h264"), false),
            ConversionAction::Encode(EncodeReason::LegacyContainer)
        );
        assert_eq!(
            decide_for("/in/a.MOV", "/out/a.mp4", None, false),
            ConversionAction::Encode(EncodeReason::LegacyContainer)
        );
    }

    #[test]
    fn target_codec_mp4_passes_through() {
        assert_eq!(
            decide_for("/in/a.mp4", "/out/a.mp4", Some("h264"), false),
            ConversionAction::Passthrough
        );
        assert!(!ConversionAction::Passthrough.needs_encoder());
    }

    #[test]
    fn mp4_with_other_or_unknown_codec_encodes() {
        assert_eq!(
            decide_for("/in/a.mp4", "/out/a.mp4", Some("hevc"), false),
            ConversionAction::Encode(EncodeReason::CodecMismatch)
        );
        assert_eq!(
            decide_for("/in/a.mp4", "/out/a.mp4", None, false),
            ConversionAction::Encode(EncodeReason::CodecMismatch)
        );
    }

    #[test]
    fn other_containers_encode() {
        assert_eq!(
            decide_for("/in/a.avi", "/out/a.mp4", None, false),
            ConversionAction::Encode(EncodeReason::OtherContainer)
        );
    }

    #[test]
    fn existing_output_skips() {
        assert_eq!(
            decide_for("/in/a.mov", "/out/a.mp4", None, true),
            ConversionAction::SkipOutputExists
        );
    }

    #[test]
    fn in_place_decides_on_codec() {
        assert_eq!(
            decide_for("/in/a.mp4", "/in/a.mp4", Some("h264"), true),
            ConversionAction::SkipAlreadyNormalized
        );
        assert_eq!(
            decide_for("/in/a.mp4", "/in/a.mp4", Some("mpeg4"), true),
            ConversionAction::Encode(EncodeReason::CodecMismatch)
        );
    }
}
