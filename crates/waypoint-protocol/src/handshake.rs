//! Handshake parameters carried on the WebSocket upgrade request.
//!
//! Clients identify themselves before the first frame is exchanged:
//! through query parameters on the upgrade URL and through the auth
//! cookie. All values are opaque tokens drawn from URL-safe alphabets, so
//! no percent-decoding is attempted.

use waypoint_transport::HandshakeRequest;

use crate::GuestReconnectionToken;

/// Query parameter carrying an encrypted session claim token (Game Server
/// admission).
pub const SESSION_CLAIM_TOKEN_PARAM: &str = "session_claim_token";

/// Query parameter carrying a guest's cached reconnection token (Lobby
/// reconnection lookup).
pub const GUEST_RECONNECTION_TOKEN_PARAM: &str = "guest_reconnection_token";

/// Cookie carrying an authenticated user's token.
pub const AUTH_COOKIE_NAME: &str = "authUserIdToken";

/// Everything a tier needs from the handshake to admit a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeParams {
    /// Auth token from the [`AUTH_COOKIE_NAME`] cookie.
    pub auth_token: Option<String>,
    /// Guest token cached from a previous `CacheGuestSessionReconnectionToken`.
    pub guest_reconnection_token: Option<GuestReconnectionToken>,
    /// Encrypted claim token issued by the Lobby.
    pub session_claim_token: Option<String>,
}

impl HandshakeParams {
    /// Extracts the parameters from a captured upgrade request.
    ///
    /// Empty values are treated as absent.
    pub fn from_request(request: &HandshakeRequest) -> Self {
        let mut params = Self::default();

        if let Some(query) = request.query.as_deref() {
            for (key, value) in pairs(query, '&') {
                match key {
                    SESSION_CLAIM_TOKEN_PARAM => {
                        params.session_claim_token = Some(value.to_owned());
                    }
                    GUEST_RECONNECTION_TOKEN_PARAM => {
                        params.guest_reconnection_token =
                            Some(GuestReconnectionToken::new(value));
                    }
                    _ => {}
                }
            }
        }

        if let Some(cookie) = request.cookie.as_deref() {
            params.auth_token = pairs(cookie, ';')
                .find(|(key, _)| *key == AUTH_COOKIE_NAME)
                .map(|(_, value)| value.to_owned());
        }

        params
    }
}

/// Splits `a=1<sep>b=2` into non-empty `(key, value)` pairs.
fn pairs(raw: &str, separator: char) -> impl Iterator<Item = (&str, &str)> {
    raw.split(separator)
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(_, value)| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(query: Option<&str>, cookie: Option<&str>) -> HandshakeRequest {
        HandshakeRequest {
            query: query.map(str::to_owned),
            cookie: cookie.map(str::to_owned),
        }
    }

    #[test]
    fn test_from_request_reads_both_query_params() {
        let params = HandshakeParams::from_request(&request(
            Some("session_claim_token=abc-_12&guest_reconnection_token=tok9"),
            None,
        ));
        assert_eq!(params.session_claim_token.as_deref(), Some("abc-_12"));
        assert_eq!(
            params.guest_reconnection_token,
            Some(GuestReconnectionToken::new("tok9"))
        );
        assert!(params.auth_token.is_none());
    }

    #[test]
    fn test_from_request_reads_auth_cookie_among_others() {
        let params = HandshakeParams::from_request(&request(
            None,
            Some("theme=dark; authUserIdToken=secret-1; lang=en"),
        ));
        assert_eq!(params.auth_token.as_deref(), Some("secret-1"));
    }

    #[test]
    fn test_from_request_ignores_empty_and_unknown_values() {
        let params = HandshakeParams::from_request(&request(
            Some("session_claim_token=&foo=bar&novalue"),
            Some("authUserIdToken="),
        ));
        assert_eq!(params, HandshakeParams::default());
    }

    #[test]
    fn test_from_request_with_nothing_is_default() {
        let params = HandshakeParams::from_request(&HandshakeRequest::default());
        assert_eq!(params, HandshakeParams::default());
    }
}
