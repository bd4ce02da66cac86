pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy of a grading run.
///
/// Everything a student can provoke (bad spec file, missing commit,
/// stale compilation, unknown exercise) is a `User` error carrying a
/// message and an optional tip, rendered nicely and never logged as a
/// defect. Anything else is `Internal` and goes through the diagnostic
/// dump path. Test verdicts are ordinary values, not errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{msg}")]
    User { msg: String, tip: Option<String> },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn user(msg: impl Into<String>) -> Self {
        Self::User {
            msg: msg.into(),
            tip: None,
        }
    }

    pub fn user_with_tip(msg: impl Into<String>, tip: impl Into<String>) -> Self {
        Self::User {
            msg: msg.into(),
            tip: Some(tip.into()),
        }
    }
}

impl From<fsutil::Error> for Error {
    fn from(e: fsutil::Error) -> Self {
        Self::Internal(anyhow::Error::new(e))
    }
}
