use std::env;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::Parser;

use crate::commands;
use crate::config::{self, FfmpegLocation, Options};
use crate::downloader::YtDlp;
use crate::error::{Error, Result};
use crate::plan::Request;
use crate::progress::Reporter;

pub static APP_NAME: &str = clap::crate_name!();

pub fn run() -> i32 {
    run_from(env::args_os())
}

/// Parses `args` and runs the download, returning the process exit code.
pub fn run_from<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::new(args) {
        Ok(cli) => cli,
        Err(e) => return report(&e),
    };
    log::trace!("cli: {:?}", cli);
    match cli.run() {
        Ok(()) => 0,
        Err(e) => report(&e),
    }
}

fn report(e: &Error) -> i32 {
    match e {
        // Usage goes to stdout along with the progress stream.
        Error::InvalidArguments(usage) => {
            let stdout = io::stdout();
            let mut stdout = stdout.lock();
            let _ = write!(stdout, "{}", usage);
            let _ = stdout.flush();
        }
        _ => eprintln!("ERROR: {}", e.one_line()),
    }
    e.exit_code()
}

#[derive(Debug, Parser)]
#[clap(name = APP_NAME, version, about = "Downloads a media URL as mp3 audio or mp4 video")]
pub struct Cli {
    #[clap(
        value_name = "URL",
        allow_hyphen_values = true,
        help = "Media URL, passed through to the downloader"
    )]
    url: String,
    #[clap(
        value_name = "FORMAT",
        allow_hyphen_values = true,
        help = "`mp3` (any case) for audio; anything else for video"
    )]
    format: String,
    #[clap(
        value_name = "OUTPUT_BASE",
        allow_hyphen_values = true,
        value_parser,
        help = "Output path without extension; missing directories are created"
    )]
    output_base: PathBuf,
    // Anything past the output base is accepted and ignored.
    #[clap(hide = true, allow_hyphen_values = true, value_parser)]
    rest: Vec<OsString>,
    #[clap(
        long = "yt-dlp",
        value_name = "PATH",
        env = config::YT_DLP_BINARY_ENV,
        default_value = config::DEFAULT_YT_DLP,
        value_parser,
        help = "Sets the yt-dlp executable"
    )]
    yt_dlp: PathBuf,
    #[clap(
        long,
        value_name = "PATH",
        value_parser,
        help = "Sets the ffmpeg executable [default: $FFMPEG_BINARY or ffmpeg on PATH]"
    )]
    ffmpeg: Option<PathBuf>,
    #[clap(
        long,
        value_name = "KBPS",
        default_value_t = config::DEFAULT_AUDIO_QUALITY_KBPS,
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Sets the mp3 bitrate"
    )]
    audio_quality: u32,
    #[clap(
        long,
        value_name = "PX",
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Limits the video height"
    )]
    max_height: Option<u32>,
}

impl Cli {
    pub fn new<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match Self::try_parse_from(args) {
            Ok(cli) => Ok(cli),
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                e.exit()
            }
            Err(e) => Err(Error::InvalidArguments(e.to_string())),
        }
    }

    pub fn run(self) -> Result<()> {
        let (request, options) = self.into_parts();
        let fetcher = YtDlp::new(options.yt_dlp.clone());
        let stdout = io::stdout();
        let mut reporter = Reporter::new(stdout.lock());
        commands::download::run(&request, &options, &fetcher, &mut reporter)
    }

    fn into_parts(self) -> (Request, Options) {
        if !self.rest.is_empty() {
            log::debug!("ignoring extra arguments; args={:?}", self.rest);
        }
        let request = Request::new(self.url, &self.format, self.output_base);
        let options = Options {
            yt_dlp: self.yt_dlp,
            ffmpeg: self
                .ffmpeg
                .map(FfmpegLocation::Path)
                .unwrap_or_else(config::default_ffmpeg),
            audio_quality_kbps: self.audio_quality,
            max_height: self.max_height,
        };
        (request, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::MediaFormat;

    #[test]
    fn parses_positionals() {
        let cli = Cli::new(["mediafetch", "https://example.test/video", "MP3", "/tmp/out/clip"])
            .unwrap();
        let (request, options) = cli.into_parts();
        assert_eq!(request.url, "https://example.test/video");
        assert_eq!(request.format, MediaFormat::Audio);
        assert_eq!(request.output_base, PathBuf::from("/tmp/out/clip"));
        assert_eq!(options.audio_quality_kbps, 192);
        assert_eq!(options.max_height, None);
    }

    #[test]
    fn empty_format_selects_video() {
        let cli = Cli::new(["mediafetch", "https://example.test/video", "", "clip"]).unwrap();
        let (request, _) = cli.into_parts();
        assert_eq!(request.format, MediaFormat::Video);
    }

    #[test]
    fn missing_arguments_are_invalid() {
        for args in [
            vec!["mediafetch"],
            vec!["mediafetch", "https://example.test/video"],
            vec!["mediafetch", "https://example.test/video", "mp3"],
        ] {
            match Cli::new(args) {
                Err(e @ Error::InvalidArguments(_)) => {
                    assert_eq!(e.exit_code(), 2);
                    assert!(e.to_string().contains("USAGE"));
                }
                other => panic!("unexpected result: {:?}", other),
            }
        }
    }

    #[test]
    fn hyphen_leading_values_are_positionals() {
        let cli = Cli::new(["mediafetch", "-dQw4w9WgXcQ", "mp3", "out/clip"]).unwrap();
        let (request, _) = cli.into_parts();
        assert_eq!(request.url, "-dQw4w9WgXcQ");
        assert_eq!(request.format, MediaFormat::Audio);

        let cli = Cli::new(["mediafetch", "https://example.test/video", "mp3", "-clip"]).unwrap();
        let (request, _) = cli.into_parts();
        assert_eq!(request.output_base, PathBuf::from("-clip"));
    }

    #[test]
    fn extra_arguments_are_ignored() {
        let cli = Cli::new([
            "mediafetch",
            "https://example.test/video",
            "mp4",
            "out/clip",
            "extra",
            "-x",
        ])
        .unwrap();
        let (request, _) = cli.into_parts();
        assert_eq!(request.url, "https://example.test/video");
        assert_eq!(request.format, MediaFormat::Video);
        assert_eq!(request.output_base, PathBuf::from("out/clip"));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_output_base() {
        use std::os::unix::ffi::OsStringExt;

        let output_base = OsString::from_vec(b"out/caf\xe9".to_vec());
        let cli = Cli::new(vec![
            OsString::from("mediafetch"),
            OsString::from("https://example.test/video"),
            OsString::from("mp3"),
            output_base.clone(),
        ])
        .unwrap();
        let (request, _) = cli.into_parts();
        assert_eq!(request.output_base, PathBuf::from(output_base));
    }

    #[test]
    fn options() {
        let cli = Cli::new([
            "mediafetch",
            "--yt-dlp",
            "/opt/bin/yt-dlp",
            "--ffmpeg",
            "/opt/bin/ffmpeg",
            "--audio-quality",
            "320",
            "--max-height",
            "720",
            "https://example.test/video",
            "mp4",
            "clip",
        ])
        .unwrap();
        let (_, options) = cli.into_parts();
        assert_eq!(options.yt_dlp, PathBuf::from("/opt/bin/yt-dlp"));
        assert_eq!(
            options.ffmpeg,
            FfmpegLocation::Path(PathBuf::from("/opt/bin/ffmpeg"))
        );
        assert_eq!(options.audio_quality_kbps, 320);
        assert_eq!(options.max_height, Some(720));
    }

    #[test]
    fn zero_max_height_is_invalid() {
        let result = Cli::new([
            "mediafetch",
            "--max-height",
            "0",
            "https://example.test/video",
            "mp4",
            "clip",
        ]);
        assert!(matches!(result, Err(Error::InvalidArguments(_))));
    }
}
