/// Internal failures of the shield's collaborators.
///
/// None of these messages carry token material.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("secure random source failed: {0}")]
    Random(#[from] rand::Error),
    #[error("could not seal csrf cookie")]
    Encode,
    // Absent, malformed, expired, forged and wrong-key cookies all end up here.
    #[error("could not open csrf cookie")]
    Decode,
    #[error("invalid csrf configuration: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why a secure request's `Referer` was not accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefererRejection {
    /// The header was absent or empty.
    Missing,
    /// The header did not parse as an absolute URL.
    Malformed,
    /// The header named a different scheme or host than the request.
    CrossOrigin,
}

/// Why a request failed CSRF checks, as seen by the failure handler.
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CsrfError {
    #[error("There was an error handling the CSRF protected request")]
    ServerIssue,
    #[error("A secure request was received with an empty, malformed or cross-origin Referer")]
    NoReferer(RefererRejection),
    #[error("No CSRF token found in the request")]
    NoToken,
    // NOTE: The message intentionally does not say what was expected.
    #[error("Invalid CSRF token received")]
    BadToken,
}

impl CsrfError {
    /// Failures caused by what the client sent, as opposed to the server itself.
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::ServerIssue)
    }
}
