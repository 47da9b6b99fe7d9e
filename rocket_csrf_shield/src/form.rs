//! Finding the csrf field in a request body without consuming it.
//!
//! The body is inspected through Rocket's peek buffer, so the wrapped handler still
//! receives the full, untouched data stream. Only fields that are complete inside the
//! peeked prefix are seen, which is why forms should render the hidden csrf field
//! before any large inputs.

use std::convert::Infallible;

use rocket::{form::Form, futures::stream, http::RawStr, Data, Request};

/// Most bytes Rocket will buffer ahead of the wrapped handler.
pub const PEEK_LIMIT: usize = 512;

/// The masked token in a URL-encoded or multipart form body, if any.
pub(crate) async fn token_from_body(
    request: &Request<'_>,
    data: &mut Data<'_>,
    field: &str,
) -> Option<String> {
    let content_type = request.content_type()?;
    if content_type.is_form() {
        let prefix = data.peek(PEEK_LIMIT).await.to_vec();
        find_urlencoded(&prefix, data.peek_complete(), field)
    } else if content_type.is_form_data() {
        let boundary = content_type
            .params()
            .find(|(name, _)| name.as_str().eq_ignore_ascii_case("boundary"))
            .map(|(_, value)| value.trim_matches('"').to_owned())?;
        let prefix = data.peek(PEEK_LIMIT).await.to_vec();
        find_multipart(prefix, &boundary, field).await
    } else {
        None
    }
}

/// The first value of `field` in a URL-encoded body prefix.
///
/// Unless `complete`, the trailing pair may have been cut off and is ignored.
pub(crate) fn find_urlencoded(body: &[u8], complete: bool, field: &str) -> Option<String> {
    let body = String::from_utf8_lossy(body);
    let body = match (complete, body.rfind('&')) {
        (true, _) => &body[..],
        (false, Some(end)) => &body[..end],
        (false, None) => "",
    };
    let value = Form::values(body)
        .find(|pair| RawStr::new(pair.name.source().as_str()).url_decode_lossy() == field)
        .map(|pair| RawStr::new(pair.value).url_decode_lossy().trim().to_owned())
        .filter(|value| !value.is_empty());
    value
}

/// The first non-file value of `field` in a multipart body prefix.
///
/// A part only counts once it ends inside the prefix, so a part cut off by the
/// prefix is never mistaken for a shorter value.
pub(crate) async fn find_multipart(body: Vec<u8>, boundary: &str, field: &str) -> Option<String> {
    let body = stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(body, boundary);
    while let Some(part) = multipart.next_field().await.ok()? {
        if part.file_name().is_some() || part.name() != Some(field) {
            continue;
        }
        let value = part.text().await.ok()?;
        let value = value.trim();
        return (!value.is_empty()).then(|| value.to_owned());
    }
    None
}
