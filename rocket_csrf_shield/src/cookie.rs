use crate::{
    error::{Error, Result},
    seal::CookieSealer,
    token::{RealToken, TOKEN_LENGTH},
};

use std::sync::Arc;

use rocket::{
    http::{Cookie, CookieJar, SameSite},
    time::{Duration, OffsetDateTime},
};

const TIMESTAMP_LENGTH: usize = 8;

/// The sealed cookie holding the real csrf token.
///
/// The cookie value is `seal(issued_at ‖ token)`, where `issued_at` is the big-endian
/// unix timestamp of when the token was minted. Values older than `max_age` no longer
/// open, so the browser's own expiry is not the only line of defense.
pub struct CsrfCookie {
    pub(crate) name: String,
    pub(crate) max_age: i64,
    pub(crate) secure: bool,
    pub(crate) http_only: bool,
    pub(crate) same_site: SameSite,
    pub(crate) path: String,
    pub(crate) domain: Option<String>,
    pub(crate) sealer: Arc<dyn CookieSealer>,
}

impl CsrfCookie {
    /// Reads and opens the real token from the request cookies.
    ///
    /// Absent, malformed, expired and forged cookies are all reported as
    /// [`Error::Decode`]. A cookie minted earlier in the same request (e.g. by a
    /// route that then forwarded) takes precedence over the one the client sent.
    pub fn get(&self, cookies: &CookieJar<'_>) -> Result<RealToken> {
        let cookie = cookies.get_pending(&self.name).ok_or(Error::Decode)?;
        let payload = self.sealer.open(&self.name, cookie.value())?;
        if payload.len() != TIMESTAMP_LENGTH + TOKEN_LENGTH {
            return Err(Error::Decode);
        }
        let (timestamp, token) = payload.split_at(TIMESTAMP_LENGTH);
        let mut issued_at = [0; TIMESTAMP_LENGTH];
        issued_at.copy_from_slice(timestamp);
        if self.is_expired(i64::from_be_bytes(issued_at)) {
            return Err(Error::Decode);
        }
        RealToken::from_slice(token).ok_or(Error::Decode)
    }

    /// Seals the token and queues the cookie on the response.
    pub fn set(&self, token: &RealToken, cookies: &CookieJar<'_>) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        let value = self.seal_at(token, now.unix_timestamp())?;

        let mut cookie = Cookie::build((self.name.clone(), value))
            .http_only(self.http_only)
            .secure(self.secure)
            .same_site(self.same_site)
            .path(self.path.clone());
        if let Some(domain) = &self.domain {
            cookie = cookie.domain(domain.clone());
        }
        if self.max_age > 0 {
            cookie = cookie
                .max_age(Duration::seconds(self.max_age))
                .expires(now + Duration::seconds(self.max_age));
        }
        cookies.add(cookie);
        Ok(())
    }

    pub(crate) fn seal_at(&self, token: &RealToken, issued_at: i64) -> Result<String> {
        let mut payload = Vec::with_capacity(TIMESTAMP_LENGTH + TOKEN_LENGTH);
        payload.extend_from_slice(&issued_at.to_be_bytes());
        payload.extend_from_slice(token.as_bytes());
        self.sealer
            .seal(&self.name, &payload)
            .map_err(|_| Error::Encode)
    }

    fn is_expired(&self, issued_at: i64) -> bool {
        self.max_age > 0
            && OffsetDateTime::now_utc().unix_timestamp() - issued_at > self.max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{seal::AesGcmSealer, util::OsRandom};

    use rocket::local::blocking::Client;

    fn make_codec(key: &[u8], max_age: i64) -> CsrfCookie {
        CsrfCookie {
            name: "csrf_token".into(),
            max_age,
            secure: true,
            http_only: true,
            same_site: SameSite::Strict,
            path: "/".into(),
            domain: Some(".dummy.url".into()),
            sealer: Arc::new(AesGcmSealer::new(key, Arc::new(OsRandom)).unwrap()),
        }
    }

    fn client() -> Client {
        Client::untracked(rocket::build()).unwrap()
    }

    #[test]
    fn set_writes_configured_attributes() {
        let client = client();
        let request = client.get("/");
        let codec = make_codec(b"supersecure", 1800);
        let token = RealToken::generate(&OsRandom).unwrap();

        codec.set(&token, request.inner().cookies()).unwrap();

        let cookie = request.inner().cookies().get_pending("csrf_token").unwrap();
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.domain(), Some("dummy.url"));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(1800)));
        assert!(cookie.expires_datetime().is_some());
    }

    #[test]
    fn get_reads_back_what_set_wrote() {
        let client = client();
        let codec = make_codec(b"supersecure", 1800);
        let token = RealToken::generate(&OsRandom).unwrap();

        let first = client.get("/");
        codec.set(&token, first.inner().cookies()).unwrap();
        let cookie = first.inner().cookies().get_pending("csrf_token").unwrap();

        let second = client.get("/").cookie(cookie);
        assert_eq!(codec.get(second.inner().cookies()).unwrap(), token);
    }

    #[test]
    fn absent_forged_and_wrong_key_cookies_do_not_decode() {
        let client = client();
        let codec = make_codec(b"supersecure", 1800);
        let token = RealToken::generate(&OsRandom).unwrap();

        assert!(matches!(codec.get(client.get("/").inner().cookies()), Err(Error::Decode)));

        let forged = client.get("/").cookie(Cookie::new("csrf_token", "i_am_wrong"));
        assert!(matches!(codec.get(forged.inner().cookies()), Err(Error::Decode)));

        let other_key = make_codec(b"another key", 1800);
        let sealed = other_key.seal_at(&token, OffsetDateTime::now_utc().unix_timestamp()).unwrap();
        let wrong_key = client.get("/").cookie(Cookie::new("csrf_token", sealed));
        assert!(matches!(codec.get(wrong_key.inner().cookies()), Err(Error::Decode)));
    }

    #[test]
    fn expired_cookies_do_not_decode() {
        let client = client();
        let codec = make_codec(b"supersecure", 60);
        let token = RealToken::generate(&OsRandom).unwrap();
        let issued_at = OffsetDateTime::now_utc().unix_timestamp() - 120;

        let sealed = codec.seal_at(&token, issued_at).unwrap();
        let request = client.get("/").cookie(Cookie::new("csrf_token", sealed));
        assert!(matches!(codec.get(request.inner().cookies()), Err(Error::Decode)));

        // Without a max age the timestamp is not enforced.
        let session_only = make_codec(b"supersecure", 0);
        let sealed = session_only.seal_at(&token, issued_at).unwrap();
        let request = client.get("/").cookie(Cookie::new("csrf_token", sealed));
        assert_eq!(session_only.get(request.inner().cookies()).unwrap(), token);
    }
}
