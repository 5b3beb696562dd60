use thiserror::Error;

/// Transport-level failures talking to the job server.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("request timed out")]
    Timeout,
    #[error("server answered {code}: {message}")]
    Status { code: u16, message: String },
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("no video link given")]
    Empty,
    #[error("not a recognized YouTube link: {0}")]
    Unrecognized(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("could not reach the server: {0}")]
    Connection(String),
    #[error("{0}")]
    Upstream(String),
    #[error("server offered no download variants")]
    NoVariants,
}

impl From<ApiError> for FetchError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Status { message, .. } => Self::Upstream(message),
            other => Self::Connection(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    #[error("variant {0:?} is not offered for this video")]
    InvalidSelection(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error("could not reach the server: {0}")]
    Connection(String),
    #[error("server rejected the job: {0}")]
    Rejected(String),
    #[error("no video information loaded")]
    NoMetadata,
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

impl From<ApiError> for SubmitError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Status { message, .. } => Self::Rejected(message),
            other => Self::Connection(other.to_string()),
        }
    }
}

/// Anything a [`crate::session::ClientSession`] operation can surface to its caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Api(#[from] ApiError),
}
