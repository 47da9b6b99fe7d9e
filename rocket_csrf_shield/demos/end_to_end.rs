#![deny(missing_docs)]

//! This example demonstrates how to use this library in an end to end scenario.
//!
//! Every route that changes state is wrapped with [`CsrfShield::protect`]. The shield
//! keeps the secret token in a sealed cookie and hands each response a freshly masked
//! copy through [`CsrfContext`], which [`show_home_page`] renders into a hidden
//! `csrf_token` form field. The field comes first in each form: the shield only
//! looks at the first [`rocket_csrf_shield::PEEK_LIMIT`] bytes of a body.
//!
//! Scripts send the same masked token in the `X-CSRF-Token` header instead, as
//! [`check_csrf_header`] expects. Webhooks that cannot carry a token live under an
//! exempt path; see [`receive_webhook`].
//!
//! The shield is also attached as a fairing, so responses from error catchers vary
//! on `Cookie` as well.
//!
//! Rejected requests are answered by [`csrf_failure`], which reads the reason from
//! the [`CsrfContext`] and renders an error page with a new token so the user can
//! retry.
//!
//! The shield is configured from the `csrf` table of `Rocket.toml`, for example:
//!
//! ```toml
//! [default.csrf]
//! auth_key = "a long random secret"
//! exempt_paths = ["/hooks"]
//! transport = "forwarded_proto"
//! ```

use rocket::{
    form::{Form, FromForm},
    get,
    http::{Cookie, CookieJar, SameSite, Status},
    post,
    response::Redirect,
    route, routes, uri, Data, Request,
};
use rocket_dyn_templates::{context, Template};

use rocket_csrf_shield::{CsrfConfig, CsrfContext, CsrfShield};

const SESSION_COOKIE_NAME: &str = "__Host-session";

/// The masked token for this response, for rendering into a form.
fn form_token(csrf: &CsrfContext) -> String {
    csrf.masked_token()
        .map(ToString::to_string)
        .unwrap_or_default()
}

#[derive(Debug, FromForm)]
struct LoginForm {
    name: String,
}

#[post("/", data = "<form>")]
fn do_login(form: Form<LoginForm>, cookies: &CookieJar<'_>) -> Redirect {
    // In a real application, we'd check for passwords or something.
    let session = Cookie::build((SESSION_COOKIE_NAME, form.into_inner().name))
        .max_age(rocket::time::Duration::days(1))
        .same_site(SameSite::Strict)
        .secure(true);
    cookies.add_private(session);
    Redirect::to(uri!(show_home_page))
}

/// Shows the logged in page when a session cookie is present, the login page otherwise.
#[get("/")]
fn show_home_page(csrf: &CsrfContext, cookies: &CookieJar<'_>) -> Template {
    let csrf_token = form_token(csrf);
    match cookies.get_private(SESSION_COOKIE_NAME) {
        Some(session) => Template::render(
            "loggedin",
            context! {
                csrf_token,
                name: session.value(),
            },
        ),
        None => Template::render("login", context! { csrf_token }),
    }
}

#[post("/logout")]
fn do_logout(cookies: &CookieJar<'_>) -> Redirect {
    cookies.remove_private(SESSION_COOKIE_NAME);
    Redirect::to(uri!(show_home_page))
}

#[post("/header")]
fn check_csrf_header() -> &'static str {
    "You successfully passed the right CSRF token, congrats!"
}

#[post("/github", data = "<payload>")]
fn receive_webhook(payload: String) -> String {
    format!("received {} bytes", payload.len())
}

/// Renders the reason a request was rejected, with a new token to retry with.
fn csrf_failure<'r>(request: &'r Request<'_>, _data: Data<'r>) -> route::BoxFuture<'r> {
    let csrf = CsrfContext::of(request);
    let reason = csrf
        .and_then(CsrfContext::failure)
        .map(|reason| reason.to_string())
        .unwrap_or_default();
    let template = Template::render(
        "rejected",
        context! {
            csrf_token: csrf.map(form_token).unwrap_or_default(),
            reason,
        },
    );
    route::Outcome::from(request, (Status::Forbidden, template)).pin()
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    let figment = rocket::Config::figment().merge((
        "template_dir",
        concat!(env!("CARGO_MANIFEST_DIR"), "/demos/templates"),
    ));
    let config = CsrfConfig {
        exempt_paths: vec!["/hooks".to_owned()],
        ..CsrfConfig::from_figment(&figment)?
    };
    let shield = CsrfShield::builder(config)
        .failure_handler(csrf_failure)
        .build()?;

    let _ = rocket::custom(figment)
        .mount(
            "/",
            shield.protect(routes![
                check_csrf_header,
                show_home_page,
                do_login,
                do_logout
            ]),
        )
        .mount("/hooks", shield.protect(routes![receive_webhook]))
        .attach(shield.clone())
        .attach(Template::fairing())
        .launch()
        .await?;
    Ok(())
}
