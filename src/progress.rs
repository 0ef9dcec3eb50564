use std::io::{self, Write};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// Written once a download has finished.
pub static COMPLETE_MARKER: &str = "100.0%";

static PERCENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)%").expect("percent pattern must compile"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Downloading,
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub percent: Option<f64>,
}

impl ProgressEvent {
    pub fn downloading(percent: Option<f64>) -> Self {
        ProgressEvent {
            phase: Phase::Downloading,
            percent: percent.map(|p| p.clamp(0.0, 100.0)),
        }
    }

    pub fn finished() -> Self {
        ProgressEvent {
            phase: Phase::Finished,
            percent: Some(100.0),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }
}

pub trait ProgressHandler {
    fn on_progress(&mut self, event: ProgressEvent) -> io::Result<()>;
}

impl<F> ProgressHandler for F
where
    F: FnMut(ProgressEvent) -> io::Result<()>,
{
    fn on_progress(&mut self, event: ProgressEvent) -> io::Result<()> {
        self(event)
    }
}

/// Writes one line per event and flushes it, so a parent process can follow
/// the progress live.
pub struct Reporter<W: Write> {
    out: W,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Reporter { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ProgressHandler for Reporter<W> {
    fn on_progress(&mut self, event: ProgressEvent) -> io::Result<()> {
        match (event.phase, event.percent) {
            (Phase::Finished, _) => writeln!(self.out, "{}", COMPLETE_MARKER)?,
            (Phase::Downloading, Some(percent)) => writeln!(self.out, "{:.1}%", percent)?,
            (Phase::Downloading, None) => return Ok(()),
        }
        self.out.flush()
    }
}

// Subset of yt-dlp's progress hook dict as emitted by `%(progress)j`.
#[derive(Debug, Deserialize)]
struct ProgressDict {
    status: String,
    downloaded_bytes: Option<f64>,
    total_bytes: Option<f64>,
    total_bytes_estimate: Option<f64>,
    #[serde(rename = "_percent")]
    percent: Option<f64>,
    #[serde(rename = "_percent_str")]
    percent_str: Option<String>,
}

impl ProgressDict {
    fn percent(&self) -> Option<f64> {
        if let Some(percent) = self.percent {
            return Some(percent);
        }
        let total = self.total_bytes.or(self.total_bytes_estimate);
        if let (Some(done), Some(total)) = (self.downloaded_bytes, total) {
            if total > 0.0 {
                return Some(done / total * 100.0);
            }
        }
        self.percent_str.as_deref().and_then(find_percent)
    }

    fn into_event(self) -> Option<ProgressEvent> {
        match self.status.as_str() {
            "downloading" => Some(ProgressEvent::downloading(self.percent())),
            "finished" => Some(ProgressEvent::finished()),
            _ => None,
        }
    }
}

/// Parses one line of yt-dlp stdout into a progress event, if it is one.
pub fn parse_line(line: &str) -> Option<ProgressEvent> {
    let line = line.trim();
    if line.starts_with('{') {
        return match serde_json::from_str::<ProgressDict>(line) {
            Ok(dict) => dict.into_event(),
            Err(e) => {
                log::debug!("unparsable progress line; error={}, line={:?}", e, line);
                None
            }
        };
    }
    if let Some(rest) = line.strip_prefix("[download]") {
        return find_percent(rest).map(|p| ProgressEvent::downloading(Some(p)));
    }
    None
}

fn find_percent(s: &str) -> Option<f64> {
    PERCENT_RE
        .captures(s)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
