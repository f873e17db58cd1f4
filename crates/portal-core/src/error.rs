/// Failures raised by portal rules. Storage failures pass through untouched
/// as `Internal`.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("not signed in")]
    Unauthenticated,

    #[error("account is awaiting approval")]
    AwaitingApproval,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PortalError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
}
