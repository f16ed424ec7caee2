use axum::{
    http::{
        HeaderName, HeaderValue, StatusCode,
        header::{ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN},
    },
    response::{IntoResponse, Response},
};

pub const FUNCTION_ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";
pub const WEBHOOK_ALLOW_HEADERS: &str =
    "authorization, x-client-info, apikey, content-type, stripe-signature";

/// Headers attached to every response of the browser-facing functions,
/// errors included.
pub fn cors_headers(allow_headers: &'static str) -> [(HeaderName, HeaderValue); 2] {
    [
        (ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
        (
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(allow_headers),
        ),
    ]
}

// tower_http's CorsLayer answers OPTIONS itself with an empty body; clients
// of these functions expect `ok`.
pub fn preflight(allow_headers: &'static str) -> Response {
    (StatusCode::OK, cors_headers(allow_headers), "ok").into_response()
}
