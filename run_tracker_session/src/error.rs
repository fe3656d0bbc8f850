/// Failures reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Quota exceeded: {0}")]
    Quota(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Plan is incomplete, directions have not been resolved")]
    IncompletePlan,

    #[error("External service failure: {0}")]
    ExternalServiceFailure(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Record not found")]
    NotFound,

    #[error("Session controller is no longer running")]
    ControllerStopped,
}

impl From<ServiceError> for SessionError {
    fn from(value: ServiceError) -> Self {
        SessionError::ExternalServiceFailure(value.to_string())
    }
}
