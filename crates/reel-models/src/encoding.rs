//! Output encoding settings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// H.264 encoder; profile and level flags are only emitted for it.
pub const H264_CODEC: &str = "libx264";

/// Encoder settings for a rendered reel.
///
/// Defaults target broad player support: H.264 main@4.0, yuv420p, 24 fps,
/// CRF 23, AAC at 192k. Missing fields deserialize to these defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EncodingConfig {
    pub codec: String,
    /// x264 speed/quality trade-off
    pub preset: String,
    /// Constant rate factor, lower is better quality
    pub crf: u8,
    pub fps: u32,
    pub profile: Option<String>,
    pub level: Option<String>,
    pub pixel_format: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// Appended verbatim after the stream options
    pub extra_args: Vec<String>,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: H264_CODEC.into(),
            preset: "medium".into(),
            crf: 23,
            fps: 24,
            profile: Some("main".into()),
            level: Some("4.0".into()),
            pixel_format: "yuv420p".into(),
            audio_codec: "aac".into(),
            audio_bitrate: "192k".into(),
            extra_args: Vec::new(),
        }
    }
}

impl EncodingConfig {
    /// Settings for silent batch intermediates: same geometry and frame rate,
    /// faster preset and near-lossless quality since they are re-encoded.
    pub fn intermediate(&self) -> Self {
        Self {
            preset: "veryfast".into(),
            crf: 18,
            extra_args: Vec::new(),
            ..self.clone()
        }
    }

    /// `-c:v` through `-r` for the video stream.
    pub fn video_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-c:v".into(),
            self.codec.clone(),
            "-preset".into(),
            self.preset.clone(),
            "-crf".into(),
            self.crf.to_string(),
        ];
        if self.codec == H264_CODEC {
            if let Some(profile) = &self.profile {
                args.extend(["-profile:v".into(), profile.clone()]);
            }
            if let Some(level) = &self.level {
                args.extend(["-level".into(), level.clone()]);
            }
        }
        args.extend(["-pix_fmt".into(), self.pixel_format.clone(), "-r".into(), self.fps.to_string()]);
        args
    }

    pub fn audio_args(&self) -> Vec<String> {
        vec!["-c:a".into(), self.audio_codec.clone(), "-b:a".into(), self.audio_bitrate.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EncodingConfig::default();
        assert_eq!(config.codec, "libx264");
        assert_eq!(config.crf, 23);
        assert_eq!(config.fps, 24);
        assert_eq!(config.profile.as_deref(), Some("main"));
    }

    #[test]
    fn test_video_args() {
        let args = EncodingConfig::default().video_args();
        assert_eq!(
            args,
            [
                "-c:v", "libx264", "-preset", "medium", "-crf", "23", "-profile:v", "main", "-level", "4.0", "-pix_fmt",
                "yuv420p", "-r", "24"
            ]
        );
    }

    #[test]
    fn test_profile_only_for_h264() {
        let config = EncodingConfig {
            codec: "libx265".into(),
            ..Default::default()
        };
        let args = config.video_args();
        assert!(!args.iter().any(|a| a == "-profile:v" || a == "-level"));
    }

    #[test]
    fn test_intermediate_keeps_frame_rate() {
        let config = EncodingConfig {
            fps: 30,
            extra_args: vec!["-tune".into(), "film".into()],
            ..Default::default()
        };
        let intermediate = config.intermediate();
        assert_eq!(intermediate.fps, 30);
        assert_eq!(intermediate.crf, 18);
        assert!(intermediate.extra_args.is_empty());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EncodingConfig = serde_json::from_str(r#"{"crf": 20}"#).unwrap();
        assert_eq!(config.crf, 20);
        assert_eq!(config.audio_bitrate, "192k");
    }
}
