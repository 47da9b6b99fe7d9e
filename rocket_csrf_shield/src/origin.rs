use crate::{config::Transport, error::RefererRejection};

use rocket::{
    http::uri::{Absolute, Authority},
    Request,
};

/// Scheme and authority a request was addressed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: &'static str,
    pub host: String,
    pub port: Option<u16>,
}

impl RequestOrigin {
    /// The `https` origin the request was addressed to.
    ///
    /// Prefers the host Rocket parsed for the connection, which is the only place an
    /// HTTP/2 `:authority` shows up, and falls back to the raw `Host` header.
    pub fn secure_from_request(request: &Request<'_>) -> Option<Self> {
        if let Some(host) = request.host() {
            return Some(Self {
                scheme: "https",
                host: host.domain().as_str().to_owned(),
                port: host.port(),
            });
        }
        let host = request.headers().get_one("Host")?;
        let authority = Authority::parse(host).ok()?;
        Some(Self {
            scheme: "https",
            host: authority.host().to_owned(),
            port: authority.port(),
        })
    }
}

const fn default_port(scheme: &str) -> Option<u16> {
    match scheme.as_bytes() {
        b"https" => Some(443),
        b"http" => Some(80),
        _ => None,
    }
}

/// True iff `referer` has the same scheme and host as `origin`. Paths are ignored.
pub fn same_origin(referer: &Absolute<'_>, origin: &RequestOrigin) -> bool {
    let Some(authority) = referer.authority() else {
        return false;
    };
    referer.scheme().eq_ignore_ascii_case(origin.scheme)
        && authority.host().eq_ignore_ascii_case(&origin.host)
        && authority.port().or_else(|| default_port(origin.scheme))
            == origin.port.or_else(|| default_port(origin.scheme))
}

/// Checks the `Referer` of a secure request against the request origin.
pub fn check_referer(
    referer: Option<&str>,
    origin: Option<&RequestOrigin>,
) -> Result<(), RefererRejection> {
    let referer = referer
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or(RefererRejection::Missing)?;
    let referer = Absolute::parse(referer).map_err(|_| RefererRejection::Malformed)?;
    match origin {
        Some(origin) if same_origin(&referer, origin) => Ok(()),
        _ => Err(RefererRejection::CrossOrigin),
    }
}

/// Whether the request arrived over an encrypted transport under `transport`.
pub fn is_secure(request: &Request<'_>, transport: Transport) -> bool {
    let tls = request.rocket().config().tls_enabled();
    match transport {
        Transport::Tls => tls,
        Transport::ForwardedProto => {
            tls || request
                .headers()
                .get_one("X-Forwarded-Proto")
                .map_or(false, |proto| proto.trim().eq_ignore_ascii_case("https"))
        }
        Transport::AlwaysSecure => true,
    }
}
