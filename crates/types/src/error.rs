use thiserror::Error;

/// Failures surfaced by the template engine.
///
/// Execution failures of individual commands are not represented here: they
/// are stored on the command node itself and reported as data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// Text could not be parsed into a statement.
    #[error("syntax error on line {line} near '{token}': {message}")]
    Syntax { line: usize, token: String, message: String },

    /// A reference points at a declaration without a usable result.
    #[error("unresolved reference ${identifier}: {reason}")]
    UnresolvedReference { identifier: String, reason: String },

    /// A hole has no filler.
    #[error("missing input for hole {{{hole}}}")]
    MissingInput { hole: String },

    /// The template contains a command that cannot be undone.
    #[error("cannot revert '{action} {entity}': {reason}")]
    NotRevertible { action: String, entity: String, reason: String },

    /// No record is stored under this identity.
    #[error("no template execution found for id '{id}'")]
    NotFound { id: String },

    /// Stored bytes or an identity could not be decoded.
    #[error("cannot decode template execution: {reason}")]
    Decode { reason: String },
}

impl TemplateError {
    pub fn syntax(line: usize, token: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            token: token.into(),
            message: message.into(),
        }
    }

    /// Same error reported against another line number.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            Self::Syntax { token, message, .. } => Self::Syntax { line, token, message },
            other => other,
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode { reason: reason.into() }
    }
}
