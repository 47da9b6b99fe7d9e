use crate::error::{Error, Result};

use std::str::FromStr;

use rocket::{
    figment::Figment,
    http::{Method, SameSite},
};
use serde_derive::Deserialize;

/// Default name of the sealed csrf cookie.
pub const CSRF_COOKIE_NAME: &str = "csrf_token";

/// Default name of the hidden form field carrying the masked token.
pub const CSRF_FORM_FIELD_NAME: &str = "csrf_token";

/// Default name of the header carrying the masked token.
pub const CSRF_HEADER_NAME: &str = "X-CSRF-Token";

/// Default cookie lifetime: 365 days.
pub const CSRF_COOKIE_MAX_AGE_SECONDS: i64 = 365 * 24 * 60 * 60;

/// Safe methods per RFC 7231 section 4.2.1.
pub const EXEMPT_METHODS: [Method; 4] = [Method::Get, Method::Head, Method::Connect, Method::Trace];

/// How to decide whether a request arrived over an encrypted transport.
///
/// Only secure requests have their `Referer` checked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Secure iff this server terminates TLS itself.
    #[default]
    Tls,
    /// Also secure when a trusted proxy sends `X-Forwarded-Proto: https`.
    ForwardedProto,
    /// Every request is treated as secure.
    AlwaysSecure,
}

/// `SameSite` attribute of the csrf cookie, as written in configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CookieSameSite {
    #[default]
    Strict,
    Lax,
    None,
}

impl From<CookieSameSite> for SameSite {
    fn from(value: CookieSameSite) -> Self {
        match value {
            CookieSameSite::Strict => Self::Strict,
            CookieSameSite::Lax => Self::Lax,
            CookieSameSite::None => Self::None,
        }
    }
}

/// Settings for the csrf shield.
///
/// Reads from the `csrf` table of Rocket's configuration, e.g.
///
/// ```toml
/// [default.csrf]
/// auth_key = "a long random secret"
/// max_age = 3600
/// exempt_paths = ["/webhooks"]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CsrfConfig {
    pub cookie_name: String,
    pub max_age: i64,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: CookieSameSite,
    pub path: String,
    pub domain: Option<String>,
    /// Secret the cookie sealing key is derived from. A random key is generated when
    /// absent, which invalidates every cookie on restart.
    pub auth_key: Option<String>,
    pub header_name: String,
    pub form_field_name: String,
    pub exempt_methods: Vec<String>,
    pub exempt_paths: Vec<String>,
    pub transport: Transport,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            cookie_name: CSRF_COOKIE_NAME.to_owned(),
            max_age: CSRF_COOKIE_MAX_AGE_SECONDS,
            secure: true,
            http_only: true,
            same_site: CookieSameSite::default(),
            path: "/".to_owned(),
            domain: None,
            auth_key: None,
            header_name: CSRF_HEADER_NAME.to_owned(),
            form_field_name: CSRF_FORM_FIELD_NAME.to_owned(),
            exempt_methods: EXEMPT_METHODS.iter().map(|m| m.as_str().to_owned()).collect(),
            exempt_paths: Vec::new(),
            transport: Transport::default(),
        }
    }
}

impl CsrfConfig {
    /// Extracts the `csrf` table, falling back to defaults when it is absent.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        if !figment.contains("csrf") {
            return Ok(Self::default());
        }
        figment
            .extract_inner("csrf")
            .map_err(|e| Error::Config(e.to_string()))
    }

    pub(crate) fn parsed_exempt_methods(&self) -> Result<Vec<Method>> {
        self.exempt_methods
            .iter()
            .map(|m| {
                Method::from_str(&m.to_ascii_uppercase()).map_err(|_| Error::Config(format!("unknown HTTP method {m:?}")))
            })
            .collect()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.cookie_name.is_empty() {
            return Err(Error::Config("cookie_name must not be empty".into()));
        }
        if self.header_name.is_empty() || self.form_field_name.is_empty() {
            return Err(Error::Config("token header and form field names must not be empty".into()));
        }
        if let Some(path) = self.exempt_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(Error::Config(format!("exempt path {path:?} must start with '/'")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rocket::figment::providers::{Format, Toml};

    #[test]
    fn defaults_match_documented_values() {
        let config = CsrfConfig::default();
        assert_eq!(config.cookie_name, "csrf_token");
        assert_eq!(config.max_age, 31_536_000);
        assert_eq!(config.header_name, "X-CSRF-Token");
        assert_eq!(config.path, "/");
        assert_eq!(
            config.parsed_exempt_methods().unwrap(),
            vec![Method::Get, Method::Head, Method::Connect, Method::Trace]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reads_csrf_table_from_figment() {
        let figment = Figment::new().merge(Toml::string(
            r#"
            [csrf]
            cookie_name = "__Host-csrf"
            max_age = 600
            same_site = "lax"
            transport = "forwarded_proto"
            exempt_methods = ["GET", "options"]
            exempt_paths = ["/hooks"]
            "#,
        ));
        let config = CsrfConfig::from_figment(&figment).unwrap();
        assert_eq!(config.cookie_name, "__Host-csrf");
        assert_eq!(config.max_age, 600);
        assert_eq!(config.same_site, CookieSameSite::Lax);
        assert_eq!(config.transport, Transport::ForwardedProto);
        assert_eq!(config.exempt_paths, vec!["/hooks".to_owned()]);
        assert_eq!(config.header_name, CSRF_HEADER_NAME);
        assert_eq!(
            config.parsed_exempt_methods().unwrap(),
            vec![Method::Get, Method::Options]
        );
    }

    #[test]
    fn missing_table_means_defaults() {
        let config = CsrfConfig::from_figment(&Figment::new()).unwrap();
        assert_eq!(config, CsrfConfig::default());
    }

    #[test]
    fn rejects_invalid_settings() {
        let config = CsrfConfig {
            exempt_methods: vec!["YEET".into()],
            ..CsrfConfig::default()
        };
        assert!(matches!(config.parsed_exempt_methods(), Err(Error::Config(_))));

        let config = CsrfConfig {
            exempt_paths: vec!["hooks".into()],
            ..CsrfConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
