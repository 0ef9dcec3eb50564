use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    InvalidArguments(String),
    #[error("Could not create the directory at {path:?}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0}")]
    Download(String),
    #[error("{0}")]
    Postprocess(String),
    #[error("Could not report progress: {0}")]
    Progress(#[source] io::Error),
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArguments(_) => 2,
            _ => 1,
        }
    }

    /// Renders the error as a single line suitable for `ERROR: ...` reporting.
    pub fn one_line(&self) -> String {
        self.to_string()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(Error::InvalidArguments("x".into()).exit_code(), 2);
        assert_eq!(Error::Download("x".into()).exit_code(), 1);
        assert_eq!(Error::Postprocess("x".into()).exit_code(), 1);
        let fs_error = Error::Filesystem {
            path: PathBuf::from("/foo"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(fs_error.exit_code(), 1);
        let progress_error = Error::Progress(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        assert_eq!(progress_error.exit_code(), 1);
    }

    #[test]
    fn one_line() {
        let e = Error::Download("first line\n  second line\n\n".into());
        assert_eq!(e.one_line(), "first line second line");
    }
}
