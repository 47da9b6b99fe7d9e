//! Double-submit cookie CSRF protection for Rocket, with a freshly masked token on
//! every response.
//!
//! Wrap routes with [`CsrfShield::protect`]. Protected routes can take a
//! [`&CsrfContext`](CsrfContext) guard to render the masked token into a form field or
//! hand it to scripts, which send it back in the `X-CSRF-Token` header.

mod config;
mod context;
mod cookie;
mod error;
mod form;
mod header;
mod middleware;
mod origin;
mod seal;
mod sink;
mod token;
mod util;
mod verifier;


pub use config::{
    CookieSameSite, CsrfConfig, Transport, CSRF_COOKIE_MAX_AGE_SECONDS, CSRF_COOKIE_NAME,
    CSRF_FORM_FIELD_NAME, CSRF_HEADER_NAME, EXEMPT_METHODS,
};
pub use context::CsrfContext;
pub use cookie::CsrfCookie;
pub use error::{CsrfError, Error, RefererRejection, Result};
pub use form::PEEK_LIMIT;
pub use middleware::{CsrfProtectedHandler, CsrfShield, CsrfShieldBuilder, DefaultCsrfFailureHandler};
pub use origin::{check_referer, same_origin, RequestOrigin};
pub use seal::{AesGcmSealer, CookieSealer};
pub use sink::{ErrorSink, LogSink};
pub use token::{decode, mask, unmask, MaskedToken, RealToken, MASKED_TOKEN_LENGTH, TOKEN_LENGTH};
pub use util::{constant_time_eq, OsRandom, SecureRandom};
pub use verifier::verify_submitted_token;
