// Core structs: Offer, Verdict and the error types shared by the pipeline
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// One tender row as read from the portal.
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    pub fingerprint: String,
    pub reference: String,
    pub buyer: String,
    pub object_text: String,
    pub deadline: String,
    pub link: String,
    pub verdict: Option<Verdict>,
}

impl Offer {
    pub fn with_verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = Some(verdict);
        self
    }

    pub fn score(&self) -> u32 {
        self.verdict.as_ref().map(|v| v.score).unwrap_or(0)
    }

    pub fn category(&self) -> String {
        self.verdict
            .as_ref()
            .map(|v| v.tag.to_string())
            .unwrap_or_default()
    }

    pub fn is_priority(&self) -> bool {
        self.verdict.as_ref().is_some_and(Verdict::is_priority)
    }
}

/// Why an offer scored the way it did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchTag {
    Excluded(String),
    Priority(String),
    Category(String),
    WeakOnly(String),
    NoMatch,
}

impl fmt::Display for MatchTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchTag::Excluded(term) => write!(f, "excluded:{}", term),
            MatchTag::Priority(tag) => write!(f, "{}", tag),
            MatchTag::Category(name) => write!(f, "{}", name),
            MatchTag::WeakOnly(keyword) => write!(f, "weak-only:{}", keyword),
            MatchTag::NoMatch => write!(f, "no-match"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub score: u32,
    pub tag: MatchTag,
}

impl Verdict {
    pub fn reject(tag: MatchTag) -> Self {
        Self { score: 0, tag }
    }

    pub fn is_accepted(&self) -> bool {
        self.score > 0
    }

    pub fn is_priority(&self) -> bool {
        matches!(self.tag, MatchTag::Priority(_)) && self.is_accepted()
    }
}

/// What happened to one result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Accepted,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Fingerprint already alerted in an earlier run.
    AlreadySeen,
    /// Same fingerprint met earlier in this attempt.
    Duplicate,
    Unreadable(String),
    Rejected(MatchTag),
}

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("HTTP error: {0}")]
    HttpError(String),
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },
    #[error("element not found: {0}")]
    ElementNotFound(String),
    #[error("option '{value}' not available in {selector}")]
    OptionNotFound { selector: String, value: String },
    #[error("invalid selector: {0}")]
    InvalidSelector(String),
    #[error("no enclosing form for {0}")]
    NoForm(String),
    #[error("no page loaded")]
    NoDocument,
    #[error("browser launch failed: {0}")]
    Launch(String),
}

impl BrowserError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BrowserError::Timeout { .. })
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("row read failed: {0}")]
    Browser(#[from] BrowserError),
    #[error("row has no text")]
    EmptyRow,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("API error: {0}")]
    ApiError(String),
    #[error("endpoint rejected message [{status}]: {body}")]
    Rejected { status: u16, body: String },
    #[error("endpoint unreachable")]
    Unreachable,
}

/// Errors that abort a whole scan attempt.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("browser launch failed: {0}")]
    Launch(#[source] BrowserError),
    #[error("{stage} failed: {source}")]
    Navigation {
        stage: &'static str,
        #[source]
        source: BrowserError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
