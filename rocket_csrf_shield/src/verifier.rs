use crate::{
    error::CsrfError,
    token::{decode, unmask, RealToken},
    util::constant_time_eq,
};

/// Checks a submitted masked token against the real token from the cookie.
///
/// Tokens that fail to decode or unmask are compared as an empty token, so every
/// kind of wrong token is reported as [`CsrfError::BadToken`].
pub fn verify_submitted_token(submitted: &str, real: &RealToken) -> Result<(), CsrfError> {
    let unmasked = decode(submitted).and_then(|masked| unmask(&masked));
    let candidate: &[u8] = match &unmasked {
        Some(token) => token.as_bytes(),
        None => &[],
    };
    if constant_time_eq(candidate, real.as_bytes()) {
        Ok(())
    } else {
        Err(CsrfError::BadToken)
    }
}
