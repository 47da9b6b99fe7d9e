use crate::{
    config::{CsrfConfig, Transport},
    context::CsrfContext,
    cookie::CsrfCookie,
    error::{CsrfError, Result},
    form::token_from_body,
    header::token_from_header,
    origin::{check_referer, is_secure, RequestOrigin},
    seal::{AesGcmSealer, CookieSealer},
    sink::{ErrorSink, LogSink},
    token::{mask, RealToken},
    util::{random_bytes, OsRandom, SecureRandom},
    verifier::verify_submitted_token,
};

use std::sync::Arc;

use rocket::{
    fairing::{Fairing, Info, Kind},
    figment::Figment,
    http::{Method, Status},
    outcome::Outcome,
    route::{self, Handler},
    Data, Request, Response, Route,
};

/// Double-submit cookie csrf protection for Rocket routes.
///
/// Every request to a protected route is handled in the same order:
///
/// 1. the real token is read from the sealed cookie, or minted and set when the
///    cookie is missing or does not open;
/// 2. a freshly masked token is stored in the request's [`CsrfContext`];
/// 3. exempt methods and paths go straight to the route;
/// 4. secure requests must carry a same-origin `Referer`;
/// 5. the submitted token (header, then form, then multipart field) must unmask to
///    the real token.
///
/// Requests that fail go to the failure handler instead of the route, which by
/// default answers `400 Bad Request`. Either way the response varies on `Cookie`.
/// When the route or failure handler errors out to a catcher, only an attached
/// shield (`rocket.attach(shield.clone())`) can add that header to the catcher's
/// response.
///
/// Form and multipart tokens are read from at most the first
/// [`PEEK_LIMIT`](crate::PEEK_LIMIT) bytes of the body, so the body reaches the route
/// untouched. Render the hidden `csrf_token` field before any large inputs, or send
/// the token in the header.
///
/// ```rust,no_run
/// # use rocket::{get, post, routes};
/// # use rocket_csrf_shield::{CsrfConfig, CsrfContext, CsrfShield};
/// #[get("/")]
/// fn form(csrf: &CsrfContext) -> String {
///     format!("<input type=hidden name=csrf_token value={}>",
///         csrf.masked_token().map(|t| t.as_str()).unwrap_or_default())
/// }
///
/// #[post("/", data = "<body>")]
/// fn submit(body: String) -> String { body }
///
/// #[rocket::launch]
/// fn rocket() -> _ {
///     let shield = CsrfShield::new(CsrfConfig::default()).expect("valid csrf config");
///     rocket::build().mount("/", shield.protect(routes![form, submit]))
/// }
/// ```
#[derive(Clone)]
pub struct CsrfShield {
    inner: Arc<Shield>,
}

struct Shield {
    cookie: CsrfCookie,
    random: Arc<dyn SecureRandom>,
    sink: Arc<dyn ErrorSink>,
    failure: Box<dyn Handler>,
    exempt_methods: Vec<Method>,
    exempt_paths: Vec<String>,
    header_name: String,
    form_field_name: String,
    transport: Transport,
}

/// Builds a [`CsrfShield`] from configuration and its collaborators.
pub struct CsrfShieldBuilder {
    config: CsrfConfig,
    random: Arc<dyn SecureRandom>,
    sealer: Option<Arc<dyn CookieSealer>>,
    sink: Arc<dyn ErrorSink>,
    failure: Box<dyn Handler>,
}

impl CsrfShieldBuilder {
    /// Source for tokens, pads and a generated sealing key. Defaults to [`OsRandom`].
    pub fn random(mut self, random: impl SecureRandom) -> Self {
        self.random = Arc::new(random);
        self
    }

    /// Overrides the sealer derived from `auth_key`.
    pub fn sealer(mut self, sealer: impl CookieSealer) -> Self {
        self.sealer = Some(Arc::new(sealer));
        self
    }

    /// Where server-side failures are reported. Defaults to [`LogSink`].
    pub fn sink(mut self, sink: impl ErrorSink) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Runs instead of the route when checks fail. It can read the reason from the
    /// request's [`CsrfContext`].
    pub fn failure_handler(mut self, handler: impl Handler) -> Self {
        self.failure = Box::new(handler);
        self
    }

    pub fn build(self) -> Result<CsrfShield> {
        let Self {
            config,
            random,
            sealer,
            sink,
            failure,
        } = self;
        config.validate()?;
        let exempt_methods = config.parsed_exempt_methods()?;

        let sealer = match (sealer, &config.auth_key) {
            (Some(sealer), _) => sealer,
            (None, Some(key)) => Arc::new(AesGcmSealer::new(key.as_bytes(), random.clone())?),
            (None, None) => {
                log::warn!(
                    target: "rocket_csrf_shield",
                    "no csrf auth_key configured, generating one; csrf cookies will not survive a restart"
                );
                let key = random_bytes(&*random, 32)?;
                Arc::new(AesGcmSealer::new(&key, random.clone())?)
            }
        };

        let cookie = CsrfCookie {
            name: config.cookie_name,
            max_age: config.max_age,
            secure: config.secure,
            http_only: config.http_only,
            same_site: config.same_site.into(),
            path: config.path,
            domain: config.domain.filter(|domain| !domain.is_empty()),
            sealer,
        };

        Ok(CsrfShield {
            inner: Arc::new(Shield {
                cookie,
                random,
                sink,
                failure,
                exempt_methods,
                exempt_paths: config.exempt_paths,
                header_name: config.header_name,
                form_field_name: config.form_field_name,
                transport: config.transport,
            }),
        })
    }
}

impl CsrfShield {
    pub fn new(config: CsrfConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: CsrfConfig) -> CsrfShieldBuilder {
        CsrfShieldBuilder {
            config,
            random: Arc::new(OsRandom),
            sealer: None,
            sink: Arc::new(LogSink),
            failure: Box::new(DefaultCsrfFailureHandler),
        }
    }

    /// Builds a shield from the `csrf` table of a Rocket figment.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        Self::new(CsrfConfig::from_figment(figment)?)
    }

    /// The cookie codec, for reading the real token outside a protected route.
    pub fn cookie(&self) -> &CsrfCookie {
        &self.inner.cookie
    }

    /// Wraps the handler of every route with csrf checks.
    pub fn protect<R: Into<Vec<Route>>>(&self, routes: R) -> Vec<Route> {
        routes
            .into()
            .into_iter()
            .map(|mut route| {
                route.handler = Box::new(CsrfProtectedHandler {
                    shield: self.clone(),
                    success: route.handler,
                });
                route
            })
            .collect()
    }

    /// Runs the checks for one request and returns their outcome.
    pub(crate) async fn evaluate(&self, request: &Request<'_>, data: &mut Data<'_>) -> CsrfContext {
        let shield = &*self.inner;
        let mut context = CsrfContext::default();

        let real = match self.resolve_real_token(request) {
            Ok(real) => real,
            Err(_) => {
                context.fail(CsrfError::ServerIssue);
                return context;
            }
        };

        match mask(&real, &*shield.random) {
            Ok(masked) => context.issue(masked),
            Err(e) => {
                shield.sink.server_issue("Error masking CSRF token", &e);
                context.fail(CsrfError::ServerIssue);
                return context;
            }
        }

        if self.is_exempt(request) {
            return context;
        }

        if is_secure(request, shield.transport) {
            let origin = RequestOrigin::secure_from_request(request);
            let referer = request.headers().get_one("Referer");
            if let Err(rejection) = check_referer(referer, origin.as_ref()) {
                log::debug!(target: "rocket_csrf_shield", "rejecting {}: referer {:?}", request.uri(), rejection);
                context.fail(CsrfError::NoReferer(rejection));
                return context;
            }
        }

        let submitted = match token_from_header(request, &shield.header_name) {
            Some(token) => Some(token.to_owned()),
            None => token_from_body(request, data, &shield.form_field_name).await,
        };
        let Some(submitted) = submitted else {
            log::debug!(target: "rocket_csrf_shield", "rejecting {}: no csrf token", request.uri());
            context.fail(CsrfError::NoToken);
            return context;
        };

        if let Err(e) = verify_submitted_token(&submitted, &real) {
            log::debug!(target: "rocket_csrf_shield", "rejecting {}: csrf token mismatch", request.uri());
            context.fail(e);
        }
        context
    }

    /// The real token from the cookie, or a new one set on the response.
    ///
    /// Missing and unreadable cookies are deliberately treated alike.
    fn resolve_real_token(&self, request: &Request<'_>) -> Result<RealToken> {
        let shield = &*self.inner;
        if let Ok(real) = shield.cookie.get(request.cookies()) {
            return Ok(real);
        }

        let real = RealToken::generate(&*shield.random).map_err(|e| {
            shield.sink.server_issue("Error generating random bytes for CSRF token", &e);
            e
        })?;
        shield.cookie.set(&real, request.cookies()).map_err(|e| {
            shield.sink.server_issue("Error setting CSRF cookie", &e);
            e
        })?;
        Ok(real)
    }

    fn is_exempt(&self, request: &Request<'_>) -> bool {
        let shield = &*self.inner;
        if shield.exempt_methods.contains(&request.method()) {
            return true;
        }
        let path = request.uri().path();
        let path = path.as_str();
        shield
            .exempt_paths
            .iter()
            .any(|prefix| path_has_prefix(path, prefix))
    }
}

/// Segment-aware prefix match: `/hooks` covers `/hooks` and `/hooks/x`, not `/hooksy`.
fn path_has_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

fn add_vary_cookie(response: &mut Response<'_>) {
    let present = response
        .headers()
        .get("Vary")
        .flat_map(|value| value.split(','))
        .any(|value| value.trim().eq_ignore_ascii_case("Cookie"));
    if !present {
        response.adjoin_raw_header("Vary", "Cookie");
    }
}

fn vary_on_cookie(outcome: route::Outcome<'_>) -> route::Outcome<'_> {
    match outcome {
        Outcome::Success(mut response) => {
            add_vary_cookie(&mut response);
            Outcome::Success(response)
        }
        other => other,
    }
}

/// Adds `Vary: Cookie` to every response for a request the shield handled,
/// including responses produced by error catchers.
#[async_trait::async_trait]
impl Fairing for CsrfShield {
    fn info(&self) -> Info {
        Info {
            name: "CSRF Vary: Cookie",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if CsrfContext::of(request).is_some() {
            add_vary_cookie(response);
        }
    }
}

/// A route handler wrapped by [`CsrfShield::protect`].
#[derive(Clone)]
pub struct CsrfProtectedHandler {
    shield: CsrfShield,
    success: Box<dyn Handler>,
}

#[async_trait::async_trait]
impl Handler for CsrfProtectedHandler {
    async fn handle<'r>(&self, request: &'r Request<'_>, mut data: Data<'r>) -> route::Outcome<'r> {
        let context = self.shield.evaluate(request, &mut data).await;
        let passed = context.passed();
        if context.attach(request).is_none() {
            log::warn!(
                target: "rocket_csrf_shield",
                "{} already carried a csrf context; keeping the first one",
                request.uri()
            );
        }

        let outcome = if passed {
            self.success.handle(request, data).await
        } else {
            self.shield.inner.failure.handle(request, data).await
        };
        vary_on_cookie(outcome)
    }
}

/// Answers `400 Bad Request` without revealing which check failed.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCsrfFailureHandler;

#[async_trait::async_trait]
impl Handler for DefaultCsrfFailureHandler {
    async fn handle<'r>(&self, request: &'r Request<'_>, _data: Data<'r>) -> route::Outcome<'r> {
        route::Outcome::from(request, (Status::BadRequest, "Bad Request"))
    }
}
