//! Parsing of PostgreSQL-style server log lines.
//!
//! A line carries an optional prefix, a severity token followed by a colon,
//! an optional SQLSTATE (present with verbose error output), and the message:
//!
//! ```text
//! 2024-05-01 10:00:00 UTC [4711] ERROR:  42P01: relation "t" does not exist
//! ```

use std::fmt;

use thiserror::Error;

use crate::stats::code::{well_known, ErrorCode};
use crate::stats::severity::MessageType;

/// Errors that can occur while parsing a log line.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty line")]
    Empty,

    #[error("no severity token in line")]
    NoSeverity,
}

/// Server log severity, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Log,
    Info,
    Notice,
    Warning,
    Error,
    Fatal,
    Panic,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Log => "LOG",
            Self::Info => "INFO",
            Self::Notice => "NOTICE",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
            Self::Panic => "PANIC",
        }
    }

    /// Parse a severity token. `DEBUG1`..`DEBUG5` all map to `Debug`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "DEBUG" | "DEBUG1" | "DEBUG2" | "DEBUG3" | "DEBUG4" | "DEBUG5" => Some(Self::Debug),
            "LOG" => Some(Self::Log),
            "INFO" => Some(Self::Info),
            "NOTICE" => Some(Self::Notice),
            "WARNING" => Some(Self::Warning),
            "ERROR" => Some(Self::Error),
            "FATAL" => Some(Self::Fatal),
            "PANIC" => Some(Self::Panic),
            _ => None,
        }
    }

    /// The window-counted message type for this level, if any.
    pub fn message_type(self) -> Option<MessageType> {
        match self {
            Self::Warning => Some(MessageType::Warning),
            Self::Error => Some(MessageType::Error),
            Self::Fatal => Some(MessageType::Fatal),
            _ => None,
        }
    }

    /// Code the server assigns when a report carries none.
    pub fn default_code(self) -> ErrorCode {
        match self {
            Self::Error | Self::Fatal | Self::Panic => well_known::INTERNAL_ERROR,
            Self::Warning => well_known::WARNING,
            _ => well_known::SUCCESSFUL_COMPLETION,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed log event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub level: LogLevel,
    pub sqlstate: Option<ErrorCode>,
    pub message: String,
}

impl LogEvent {
    /// Classification code, defaulted from the level when absent.
    pub fn code(&self) -> ErrorCode {
        self.sqlstate.unwrap_or_else(|| self.level.default_code())
    }
}

/// Parse a single log line into a [`LogEvent`].
pub fn parse_line(line: &str) -> Result<LogEvent, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let (level, rest) = find_severity(line).ok_or(ParseError::NoSeverity)?;
    let rest = rest.trim_start();
    let (sqlstate, message) = split_sqlstate(rest);

    Ok(LogEvent {
        level,
        sqlstate,
        message: message.trim_end().to_string(),
    })
}

/// Labels the server puts on continuation lines of a multi-line report.
const CONTINUATION_LABELS: &[&str] = &[
    "DETAIL",
    "HINT",
    "CONTEXT",
    "STATEMENT",
    "QUERY",
    "LOCATION",
];

/// Locate the line's label token and return its level and the text after it.
///
/// The first `LABEL:` token that is a severity or a continuation label
/// decides. Continuation lines yield `None` even when their text quotes a
/// severity. Colons inside prefix fields such as timestamps are not labels.
fn find_severity(line: &str) -> Option<(LogLevel, &str)> {
    for (pos, _) in line.match_indices(':') {
        let rest = &line[pos + 1..];
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            continue;
        }
        let word = line[..pos]
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or_default();
        if let Some(level) = LogLevel::from_name(word) {
            return Some((level, rest));
        }
        if CONTINUATION_LABELS.contains(&word) {
            return None;
        }
    }
    None
}

/// Split a leading `SQLSTATE:` off the message, if present.
fn split_sqlstate(rest: &str) -> (Option<ErrorCode>, &str) {
    if rest.as_bytes().get(5) == Some(&b':') {
        if let Some(code) = rest.get(..5).and_then(ErrorCode::from_sqlstate) {
            return (Some(code), rest[6..].trim_start());
        }
    }
    (None, rest)
}
