use rocket::Request;

/// The masked token sent in the csrf header, if any. Blank values count as absent.
pub(crate) fn token_from_header<'r>(request: &'r Request<'_>, name: &str) -> Option<&'r str> {
    request
        .headers()
        .get_one(name)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
