//! Channel protocol constants.

/// Query parameter carrying the bearer token on the push channel.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Default push channel path, relative to the page origin.
pub const DEFAULT_WS_PATH: &str = "/api/ws";

/// Default REST API base path, relative to the page origin.
pub const DEFAULT_API_BASE: &str = "/api";

/// Map an HTTP scheme onto the matching WebSocket scheme.
/// WebSocket schemes pass through; anything else is unsupported.
pub fn ws_scheme_for(scheme: &str) -> Option<&'static str> {
    match scheme {
        "https" | "wss" => Some("wss"),
        "http" | "ws" => Some("ws"),
        _ => None,
    }
}

/// Map a WebSocket scheme onto the matching HTTP scheme.
pub fn http_scheme_for(scheme: &str) -> Option<&'static str> {
    match scheme {
        "https" | "wss" => Some("https"),
        "http" | "ws" => Some("http"),
        _ => None,
    }
}
