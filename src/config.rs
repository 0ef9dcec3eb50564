use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use once_cell::sync::Lazy;

pub static FFMPEG_BINARY_ENV: &str = "FFMPEG_BINARY";
pub static YT_DLP_BINARY_ENV: &str = "YT_DLP_BINARY";

pub static DEFAULT_YT_DLP: &str = "yt-dlp";
pub const DEFAULT_AUDIO_QUALITY_KBPS: u32 = 192;

static DEFAULT_FFMPEG: Lazy<FfmpegLocation> =
    Lazy::new(|| FfmpegLocation::from_env_value(env::var_os(FFMPEG_BINARY_ENV)));

/// Where yt-dlp should find ffmpeg.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FfmpegLocation {
    /// Let the tool look up `ffmpeg` on `PATH`.
    SearchPath,
    Path(PathBuf),
}

impl FfmpegLocation {
    pub fn from_env_value(value: Option<OsString>) -> Self {
        match value {
            Some(path) if !path.is_empty() => Self::Path(PathBuf::from(path)),
            _ => Self::SearchPath,
        }
    }
}

/// Resolved once per process from `FFMPEG_BINARY`.
pub fn default_ffmpeg() -> FfmpegLocation {
    DEFAULT_FFMPEG.clone()
}

#[derive(Clone, Debug)]
pub struct Options {
    pub yt_dlp: PathBuf,
    pub ffmpeg: FfmpegLocation,
    pub audio_quality_kbps: u32,
    pub max_height: Option<u32>,
}

#[cfg(test)]
impl Default for Options {
    fn default() -> Self {
        Options {
            yt_dlp: PathBuf::from(DEFAULT_YT_DLP),
            ffmpeg: default_ffmpeg(),
            audio_quality_kbps: DEFAULT_AUDIO_QUALITY_KBPS,
            max_height: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ffmpeg_from_env_value() {
        assert_eq!(
            FfmpegLocation::from_env_value(None),
            FfmpegLocation::SearchPath
        );
        // An empty value is treated as unset.
        assert_eq!(
            FfmpegLocation::from_env_value(Some(OsString::new())),
            FfmpegLocation::SearchPath
        );
        assert_eq!(
            FfmpegLocation::from_env_value(Some(OsString::from("/opt/ffmpeg/bin/ffmpeg"))),
            FfmpegLocation::Path(PathBuf::from("/opt/ffmpeg/bin/ffmpeg"))
        );
    }

    #[test]
    fn default_options() {
        let options = Options::default();
        assert_eq!(options.yt_dlp, PathBuf::from("yt-dlp"));
        assert_eq!(options.audio_quality_kbps, 192);
        assert_eq!(options.max_height, None);
    }
}
