//! Traced errors produced while preparing copy jobs
//!
//! Every error carries the ordered list of operations (and the URLs they were working on) it
//! passed through, so that callers can report a causal path instead of a bare message.
//!
//! # Logging Convention
//! `Display` shows only the error kind. The alternate form also prints the trace:
//! ```ignore
//! tracing::error!("{}", &error);   // kind only
//! tracing::error!("{:#}", &error); // kind followed by the trace
//! ```

/// What went wrong.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("invalid arguments provided, unable to determine the type of copy operation")]
    InvalidArgument,
    #[error("invalid source {0:?}, not a regular file")]
    InvalidSource(String),
    #[error("source {0:?} is a directory, use --recursive to copy directories")]
    SourceIsDir(String),
    #[error("object {0:?} does not exist")]
    NotFound(String),
    #[error("{0} is not supported by this backend")]
    NotSupported(&'static str),
    #[error("operation cancelled")]
    Cancelled,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// One step of the causal path of an [`Error`].
#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub operation: &'static str,
    pub urls: Vec<String>,
    pub caller: &'static std::panic::Location<'static>,
}

impl std::fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} {:?} ({}:{})",
            self.operation,
            self.urls,
            self.caller.file(),
            self.caller.line()
        )
    }
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    trace: Vec<TraceEntry>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            trace: Vec::new(),
        }
    }

    /// Appends a trace entry recording the operation and the URLs involved.
    #[must_use]
    #[track_caller]
    pub fn trace<I, S>(mut self, operation: &'static str, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trace.push(TraceEntry {
            operation,
            urls: urls.into_iter().map(Into::into).collect(),
            caller: std::panic::Location::caller(),
        });
        self
    }

    /// Trace entries, oldest first.
    pub fn causal_path(&self) -> &[TraceEntry] {
        &self.trace
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound(_))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl From<anyhow::Error> for Error {
    fn from(source: anyhow::Error) -> Self {
        Error::new(ErrorKind::Backend(source))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.kind {
            ErrorKind::Backend(source) if f.alternate() => write!(f, "{source:#}")?,
            kind => write!(f, "{kind}")?,
        }
        if f.alternate() {
            for entry in self.trace.iter().rev() {
                write!(f, "\n  at {entry}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Backend(source) => source.source(),
            _ => None,
        }
    }
}
