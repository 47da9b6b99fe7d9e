use crate::{error::CsrfError, token::MaskedToken};

use rocket::{
    http::Status,
    request::{FromRequest, Outcome, Request},
};

/// The outcome of the csrf checks for one request.
///
/// Attached to the request by the shield before either continuation runs. Use it as a
/// request guard to embed the fresh masked token in a form, or, in a failure handler,
/// to find out why the request was rejected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CsrfContext {
    masked_token: Option<MaskedToken>,
    failure: Option<CsrfError>,
}

impl CsrfContext {
    /// The masked token to hand to the client with this response.
    pub const fn masked_token(&self) -> Option<&MaskedToken> {
        self.masked_token.as_ref()
    }

    /// Why the request was rejected, if it was.
    pub const fn failure(&self) -> Option<CsrfError> {
        self.failure
    }

    pub const fn passed(&self) -> bool {
        self.failure.is_none()
    }

    pub(crate) fn issue(&mut self, token: MaskedToken) {
        self.masked_token = Some(token);
    }

    /// Records why the request failed.
    ///
    /// Client errors can only be found after a token was issued; getting here without
    /// one is a bug in the shield.
    pub(crate) fn fail(&mut self, reason: CsrfError) {
        if reason.is_client_error() && self.masked_token.is_none() {
            debug_assert!(false, "csrf failure {reason:?} recorded before a token was issued");
            log::error!(target: "rocket_csrf_shield", "csrf failure recorded before a token was issued");
        }
        self.failure = Some(reason);
    }

    /// The context the shield attached to `request`, if it ran.
    pub fn of<'r>(request: &'r Request<'_>) -> Option<&'r Self> {
        request.local_cache(|| None::<Self>).as_ref()
    }

    /// Attaches the context to `request`. The cache is write-once, so a request that
    /// already carries a context (or a cached absence of one) keeps it; that case
    /// returns `None`.
    pub(crate) fn attach<'r>(self, request: &'r Request<'_>) -> Option<&'r Self> {
        let mut fresh = false;
        let attached = request.local_cache(|| {
            fresh = true;
            Some(self)
        });
        if fresh {
            attached.as_ref()
        } else {
            None
        }
    }
}

/// Routes that are not wrapped by the shield have no context; those forward.
#[async_trait::async_trait]
impl<'r> FromRequest<'r> for &'r CsrfContext {
    type Error = std::convert::Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        CsrfContext::of(request)
            .map(Outcome::Success)
            .unwrap_or_else(|| Outcome::Forward(Status::InternalServerError))
    }
}
