pub use anyhow::Result;

use serde::Serialize;
use serde_json::Value as Json;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};

/// An error raised while parsing, simplifying or translating an expression.
///
/// There is no source text to point into (the input is a JSON tree), so
/// instead of a span the error carries the offending subtree (its JSON form)
/// in `cause`.
#[derive(Debug, Clone)]
pub struct Error {
    pub reason: Reason,
    pub cause: Option<Json>,
    pub help: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Reason {
    Simple(String),
    Expected {
        who: Option<String>,
        expected: String,
        found: String,
    },
    UnknownOperator {
        op: String,
    },
    InvalidVariable {
        name: String,
    },
    ScriptingDisabled,
    NotBoolean {
        found: String,
    },
    ColumnNotFound {
        path: String,
    },
    Unsupported {
        op: String,
        language: String,
    },
    Invariant {
        detail: String,
    },
}

/// Coarse classification of [Reason], for callers that branch on policy
/// rather than on the specific failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Parse,
    Type,
    Schema,
    Invariant,
}

impl Error {
    pub fn new(reason: Reason) -> Self {
        Error {
            reason,
            cause: None,
            help: None,
        }
    }

    pub fn new_simple<S: Into<String>>(message: S) -> Self {
        Error::new(Reason::Simple(message.into()))
    }

    pub fn with_help<S: Into<String>>(mut self, help: S) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_cause(mut self, cause: Json) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        match &self.reason {
            Reason::Simple(_)
            | Reason::Expected { .. }
            | Reason::UnknownOperator { .. }
            | Reason::InvalidVariable { .. }
            | Reason::ScriptingDisabled => ErrorKind::Parse,
            Reason::NotBoolean { .. } | Reason::Unsupported { .. } => ErrorKind::Type,
            Reason::ColumnNotFound { .. } => ErrorKind::Schema,
            Reason::Invariant { .. } => ErrorKind::Invariant,
        }
    }
}

// Needed for anyhow
impl StdError for Error {}

// Needed for StdError
impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason.message())?;
        if let Some(cause) = &self.cause {
            write!(f, "\n  in: {cause}")?;
        }
        Ok(())
    }
}

impl Reason {
    pub fn message(&self) -> String {
        match self {
            Reason::Simple(text) => text.clone(),
            Reason::Expected {
                who,
                expected,
                found,
            } => {
                let who = who.clone().map(|x| format!("{x} ")).unwrap_or_default();
                format!("{who}expected {expected}, but found {found}")
            }
            Reason::UnknownOperator { op } => format!("unknown operator `{op}`"),
            Reason::InvalidVariable { name } => format!("`{name}` is not a valid variable name"),
            Reason::ScriptingDisabled => {
                "scripting is disabled; call set_allow_scripting(true) to enable".to_string()
            }
            Reason::NotBoolean { found } => format!("expected a boolean, but found {found}"),
            Reason::ColumnNotFound { path } => format!("schema has no column at `{path}`"),
            Reason::Unsupported { op, language } => {
                format!("operator `{op}` can not be expressed in {language}")
            }
            Reason::Invariant { detail } => format!("internal invariant violated: {detail}"),
        }
    }
}

/// The flattened, user-facing form of [Error].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessage {
    /// Plain text of the error
    pub reason: String,
    /// A suggestion of how to fix the error
    pub hint: Option<String>,
    /// The JSON of the offending subtree
    pub cause: Option<Json>,
    pub kind: ErrorKind,
}

impl Display for ErrorMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n  help: {hint}")?;
        }
        if let Some(cause) = &self.cause {
            write!(f, "\n  in: {cause}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessages {
    pub inner: Vec<ErrorMessage>,
}

impl From<ErrorMessage> for ErrorMessages {
    fn from(e: ErrorMessage) -> Self {
        ErrorMessages { inner: vec![e] }
    }
}

impl Display for ErrorMessages {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for e in &self.inner {
            Display::fmt(&e, f)?;
        }
        Ok(())
    }
}

impl StdError for ErrorMessages {}

impl ErrorMessages {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}

/// Turn an `anyhow::Error` into the user-facing [ErrorMessages] at the public
/// API boundary.
pub fn downcast(error: anyhow::Error) -> ErrorMessages {
    let error = match error.downcast::<ErrorMessages>() {
        Ok(messages) => return messages,
        Err(error) => error,
    };

    match error.downcast::<Error>() {
        Ok(error) => {
            let kind = error.kind();
            ErrorMessage {
                reason: error.reason.message(),
                hint: error.help,
                cause: error.cause,
                kind,
            }
            .into()
        }
        Err(error) => ErrorMessage {
            // default to basic Display
            reason: format!("{:#?}", error),
            hint: None,
            cause: None,
            kind: ErrorKind::Invariant,
        }
        .into(),
    }
}

pub trait WithErrorInfo {
    fn with_help<S: Into<String>>(self, help: S) -> Self;

    fn with_cause(self, cause: Json) -> Self;
}

impl<T> WithErrorInfo for Result<T, Error> {
    fn with_help<S: Into<String>>(self, help: S) -> Self {
        self.map_err(|e| e.with_help(help))
    }

    fn with_cause(self, cause: Json) -> Self {
        self.map_err(|e| e.with_cause(cause))
    }
}
