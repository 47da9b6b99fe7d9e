use crate::{
    error::Result,
    util::{random_bytes, xor_into, SecureRandom},
};

use std::fmt;

use serde::{Serialize, Serializer};

/// Length in bytes of the secret stored in the csrf cookie.
pub const TOKEN_LENGTH: usize = 32;

/// Length in bytes of a masked token before transport encoding.
pub const MASKED_TOKEN_LENGTH: usize = TOKEN_LENGTH * 2;

const ENCODING: base64::Config = base64::URL_SAFE_NO_PAD;

/// The secret persisted in the sealed cookie. Never sent to clients as-is.
#[derive(Clone, PartialEq, Eq)]
pub struct RealToken([u8; TOKEN_LENGTH]);

impl RealToken {
    /// Draws a fresh token from the random source.
    pub fn generate(random: &dyn SecureRandom) -> Result<Self> {
        let mut token = [0; TOKEN_LENGTH];
        random.fill(&mut token)?;
        Ok(Self(token))
    }

    /// Returns `None` unless `bytes` is exactly [`TOKEN_LENGTH`] long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; TOKEN_LENGTH]>::try_from(bytes).ok().map(Self)
    }

    pub const fn as_bytes(&self) -> &[u8; TOKEN_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for RealToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RealToken(..)")
    }
}

/// A single-use, base64url encoded `pad ‖ (pad XOR real)` handed to clients.
///
/// Serializes as its string value, so it can be placed straight into a template
/// context and rendered into a hidden form field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskedToken(String);

impl MaskedToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MaskedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for MaskedToken {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

/// Masks `real` with a one-time pad freshly drawn from `random`.
///
/// Every call must use a new pad, otherwise repeated page bodies would each contain
/// the same secret-dependent bytes.
pub fn mask(real: &RealToken, random: &dyn SecureRandom) -> Result<MaskedToken> {
    let mut masked = random_bytes(random, MASKED_TOKEN_LENGTH)?;
    let (pad, xored) = masked.split_at_mut(TOKEN_LENGTH);
    xor_into(pad, real.as_bytes(), xored);
    Ok(MaskedToken(base64::encode_config(masked, ENCODING)))
}

/// Recovers the real token from a decoded masked token.
///
/// Anything that is not exactly [`MASKED_TOKEN_LENGTH`] bytes is invalid.
pub fn unmask(masked: &[u8]) -> Option<RealToken> {
    if masked.len() != MASKED_TOKEN_LENGTH {
        return None;
    }
    let (pad, xored) = masked.split_at(TOKEN_LENGTH);
    let mut real = [0; TOKEN_LENGTH];
    xor_into(pad, xored, &mut real);
    Some(RealToken(real))
}

/// Decodes a token submitted by a client, with or without base64 padding.
pub fn decode(submitted: &str) -> Option<Vec<u8>> {
    let trimmed = submitted.trim().trim_end_matches('=');
    base64::decode_config(trimmed, ENCODING).ok()
}
