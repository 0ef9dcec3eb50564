use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::config::{FfmpegLocation, Options};

static AUDIO_SELECTION: &str = "bestaudio/best";
static AUDIO_CODEC: &str = "mp3";
static VIDEO_CONTAINER: &str = "mp4";
static PROGRESS_TEMPLATE: &str = "download:%(progress)j";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaFormat {
    Audio,
    Video,
}

impl MediaFormat {
    /// `mp3` in any case selects audio; every other selector means video.
    pub fn from_selector(selector: &str) -> Self {
        if selector.eq_ignore_ascii_case(AUDIO_CODEC) {
            Self::Audio
        } else {
            Self::Video
        }
    }
}

#[derive(Clone, Debug)]
pub struct Request {
    pub url: String,
    pub format: MediaFormat,
    /// Destination path without extension.
    pub output_base: PathBuf,
}

impl Request {
    pub fn new(url: String, selector: &str, output_base: PathBuf) -> Self {
        Request {
            url,
            format: MediaFormat::from_selector(selector),
            output_base,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PostProcess {
    ExtractAudio {
        codec: &'static str,
        quality_kbps: u32,
    },
    Merge {
        container: &'static str,
    },
}

#[derive(Clone, Debug)]
pub struct FetchPlan {
    pub url: String,
    pub selection: String,
    pub output_template: OsString,
    pub post_process: PostProcess,
    pub quiet: bool,
    pub no_warnings: bool,
    pub ffmpeg: FfmpegLocation,
}

impl FetchPlan {
    pub fn derive(request: &Request, options: &Options) -> Self {
        let (selection, post_process) = match request.format {
            MediaFormat::Audio => (
                AUDIO_SELECTION.to_owned(),
                PostProcess::ExtractAudio {
                    codec: AUDIO_CODEC,
                    quality_kbps: options.audio_quality_kbps,
                },
            ),
            MediaFormat::Video => (
                video_selection(options.max_height),
                PostProcess::Merge {
                    container: VIDEO_CONTAINER,
                },
            ),
        };

        FetchPlan {
            url: request.url.clone(),
            selection,
            output_template: output_template(&request.output_base),
            post_process,
            quiet: true,
            no_warnings: true,
            ffmpeg: options.ffmpeg.clone(),
        }
    }

    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--format".into(),
            self.selection.clone().into(),
            "--output".into(),
            self.output_template.clone().into(),
        ];

        match &self.post_process {
            PostProcess::ExtractAudio {
                codec,
                quality_kbps,
            } => {
                args.push("--extract-audio".into());
                args.push("--audio-format".into());
                args.push((*codec).into());
                args.push("--audio-quality".into());
                args.push(format!("{}K", quality_kbps).into());
            }
            PostProcess::Merge { container } => {
                args.push("--merge-output-format".into());
                args.push((*container).into());
            }
        }

        if self.quiet {
            args.push("--quiet".into());
        }
        if self.no_warnings {
            args.push("--no-warnings".into());
        }
        // --quiet also silences progress unless it is asked for explicitly.
        args.push("--progress".into());
        args.push("--newline".into());
        args.push("--progress-template".into());
        args.push(PROGRESS_TEMPLATE.into());

        if let FfmpegLocation::Path(path) = &self.ffmpeg {
            args.push("--ffmpeg-location".into());
            args.push(path.clone().into_os_string());
        }

        args.push("--".into());
        args.push(self.url.clone().into());
        args
    }
}

fn video_selection(max_height: Option<u32>) -> String {
    match max_height {
        Some(h) => format!(
            "bestvideo[ext={c}][height<={h}]+bestaudio/best[height<={h}]",
            c = VIDEO_CONTAINER,
            h = h
        ),
        None => format!("bestvideo[ext={}]+bestaudio/best", VIDEO_CONTAINER),
    }
}

fn output_template(output_base: &Path) -> OsString {
    let mut template = escape_percent(output_base.as_os_str());
    template.push(".%(ext)s");
    template
}

// `%` starts a template field, so literal ones are doubled.
#[cfg(unix)]
fn escape_percent(s: &OsStr) -> OsString {
    use std::os::unix::ffi::{OsStrExt, OsStringExt};

    let mut escaped = Vec::with_capacity(s.len());
    for &b in s.as_bytes() {
        if b == b'%' {
            escaped.push(b'%');
        }
        escaped.push(b);
    }
    OsString::from_vec(escaped)
}

#[cfg(not(unix))]
fn escape_percent(s: &OsStr) -> OsString {
    match s.to_str() {
        Some(s) => s.replace('%', "%%").into(),
        None => s.to_os_string(),
    }
}
