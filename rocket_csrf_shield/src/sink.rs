use crate::error::Error;

/// Where the shield reports server-side failures (token minting, masking, sealing).
///
/// Client mistakes such as a missing token are not reported here; they are only
/// visible to the failure handler through [`crate::CsrfContext`].
pub trait ErrorSink: Send + Sync + 'static {
    fn server_issue(&self, message: &str, error: &Error);
}

/// Forwards to the `log` facade, which Rocket's own logger serves.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn server_issue(&self, message: &str, error: &Error) {
        log::error!(target: "rocket_csrf_shield", "{message}: {error}");
    }
}
