use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;

use crate::error::{Error, Result};
use crate::plan::FetchPlan;
use crate::progress::{self, ProgressEvent, ProgressHandler};

/// Runs a fetch plan to completion, relaying progress to `handler`.
pub trait Fetch {
    fn fetch(&self, plan: &FetchPlan, handler: &mut dyn ProgressHandler) -> Result<()>;
}

pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    pub fn new(program: PathBuf) -> Self {
        YtDlp { program }
    }

    fn spawn(&self, args: &[OsString]) -> Result<Child> {
        log::trace!("spawning downloader; program={:?}, args={:?}", self.program, args);
        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::Download(format!(
                    "Could not run {}: {}",
                    self.program.display(),
                    e
                ))
            })
    }
}

impl Fetch for YtDlp {
    fn fetch(&self, plan: &FetchPlan, handler: &mut dyn ProgressHandler) -> Result<()> {
        let mut child = self.spawn(&plan.to_args())?;

        let stderr = child.stderr.take();
        let stderr_reader = thread::spawn(move || match stderr {
            Some(stderr) => collect_lines(stderr),
            None => vec![],
        });

        let relayed = match child.stdout.take() {
            Some(stdout) => relay_progress(stdout, handler),
            None => Ok(Relayed::default()),
        };

        if relayed.is_err() {
            log::debug!("killing downloader; pid={}", child.id());
            let _ = child.kill();
        }
        let status = child.wait();
        let stderr_lines = stderr_reader.join().unwrap_or_default();

        let relayed = relayed?;
        let status = status
            .map_err(|e| Error::Download(format!("Could not wait for the downloader: {}", e)))?;
        log::trace!(
            "downloader exited; status={}, events={}",
            status,
            relayed.events
        );

        if !status.success() {
            return Err(classify_failure(status, &stderr_lines));
        }

        // A completion marker is always the last thing reported on success.
        if !relayed.last_finished {
            handler
                .on_progress(ProgressEvent::finished())
                .map_err(Error::Progress)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Relayed {
    events: usize,
    last_finished: bool,
}

fn relay_progress<R: Read>(stdout: R, handler: &mut dyn ProgressHandler) -> Result<Relayed> {
    let mut relayed = Relayed::default();
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf).map_err(|e| {
            Error::Download(format!("Could not read the downloader output: {}", e))
        })?;
        if n == 0 {
            break;
        }
        // Titles and file names may come in the console encoding.
        let line = String::from_utf8_lossy(&buf);
        match progress::parse_line(&line) {
            Some(event) => {
                handler.on_progress(event).map_err(Error::Progress)?;
                relayed.events += 1;
                relayed.last_finished = event.is_finished();
            }
            None if !line.trim().is_empty() => log::trace!("downloader: {}", line.trim_end()),
            None => {}
        }
    }
    Ok(relayed)
}

fn collect_lines<R: Read>(r: R) -> Vec<String> {
    let mut lines = vec![];
    let mut reader = BufReader::new(r);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim_end().to_owned();
                log::debug!("downloader stderr: {}", line);
                lines.push(line);
            }
            Err(e) => {
                log::debug!("failed to read downloader stderr; error={:?}", e);
                break;
            }
        }
    }
    lines
}

fn classify_failure(status: ExitStatus, stderr_lines: &[String]) -> Error {
    let error_line = stderr_lines
        .iter()
        .rev()
        .find_map(|l| l.trim().strip_prefix("ERROR:"))
        .map(str::trim);

    let message = match error_line {
        Some(message) => message.to_owned(),
        None => {
            let last = stderr_lines.iter().rev().map(|l| l.trim()).find(|l| !l.is_empty());
            match last {
                Some(last) => format!("Downloader exited with {}: {}", status, last),
                None => format!("Downloader exited with {}", status),
            }
        }
    };

    if is_postprocess_message(&message) {
        Error::Postprocess(message)
    } else {
        Error::Download(message)
    }
}

// Phrases yt-dlp uses when the ffmpeg stage fails.
static POSTPROCESS_PHRASES: &[&str] = &[
    "ffprobe and ffmpeg not found",
    "ffmpeg not found",
    "ffprobe not found",
    "ffmpeg exited with code",
    "conversion failed",
];

fn is_postprocess_message(message: &str) -> bool {
    if message.starts_with("Postprocessing:") {
        return true;
    }
    let message = message.to_ascii_lowercase();
    POSTPROCESS_PHRASES
        .iter()
        .any(|phrase| message.contains(phrase))
}
