//! Login-session shim over the signed cookie codec.
//!
//! No server-side session store exists: the session *is* the signed cookie,
//! created at login and destroyed by overwriting it with an empty value at
//! logout. Cookie access is a small trait implemented once over the request
//! header map and composed into handlers by explicit delegation.

use crate::token::TokenSigner;
use axum::http::{header, HeaderMap, HeaderValue};

/// Cookie carrying the signed user id.
pub const SESSION_COOKIE: &str = "user_id";

/// Cookie carrying the signed visit counter.
pub const VISITS_COOKIE: &str = "visits";

/// Read access to request cookies.
pub trait Cookies {
    /// Value of the named cookie, if present.
    fn cookie(&self, name: &str) -> Option<String>;
}

impl Cookies for HeaderMap {
    fn cookie(&self, name: &str) -> Option<String> {
        self.get(header::COOKIE)
            .and_then(|v| v.to_str().ok())?
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_owned())
    }
}

/// Session cookie lifecycle: mint at login, verify per request, clear at
/// logout.
#[derive(Clone)]
pub struct Sessions {
    signer: TokenSigner,
}

impl Sessions {
    pub fn new(signer: TokenSigner) -> Self {
        Self { signer }
    }

    /// `Set-Cookie` value logging the given user in.
    pub fn login_cookie(&self, user_id: i64) -> HeaderValue {
        let token = self.signer.sign(&user_id.to_string());
        HeaderValue::from_str(&format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly"))
            .expect("signed tokens are ASCII")
    }

    /// `Set-Cookie` value clearing the session.
    pub fn logout_cookie(&self) -> HeaderValue {
        HeaderValue::from_static("user_id=; Path=/; HttpOnly")
    }

    /// Identity carried by the request, or `None` for anonymous.
    ///
    /// Absent cookie, bad signature, and non-numeric payload all mean
    /// anonymous — never an error.
    pub fn current_user_id(&self, headers: &HeaderMap) -> Option<i64> {
        let token = headers.cookie(SESSION_COOKIE)?;
        self.signer.verify(&token)?.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sessions() -> Sessions {
        Sessions::new(TokenSigner::new("session-secret"))
    }

    fn headers_with_cookie(raw: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(raw).unwrap());
        headers
    }

    #[test]
    fn cookie_trait_finds_named_cookie() {
        let headers = headers_with_cookie("visits=3; user_id=42|abc; theme=dark");
        assert_eq!(headers.cookie("user_id").as_deref(), Some("42|abc"));
        assert_eq!(headers.cookie("visits").as_deref(), Some("3"));
        assert_eq!(headers.cookie("missing"), None);
    }

    #[test]
    fn cookie_trait_handles_absent_header() {
        assert_eq!(HeaderMap::new().cookie("user_id"), None);
    }

    #[test]
    fn login_cookie_round_trips_through_headers() {
        let s = sessions();
        let set_cookie = s.login_cookie(42);
        let pair = set_cookie
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_owned();

        let headers = headers_with_cookie(&pair);
        assert_eq!(s.current_user_id(&headers), Some(42));
    }

    #[test]
    fn login_cookie_sets_path_and_httponly() {
        let value = sessions().login_cookie(7);
        let value = value.to_str().unwrap();
        assert!(value.starts_with("user_id=7|"));
        assert!(value.contains("Path=/"));
        assert!(value.contains("HttpOnly"));
    }

    #[test]
    fn tampered_cookie_is_anonymous() {
        let s = sessions();
        let headers = headers_with_cookie(&format!("{SESSION_COOKIE}=42|{}", "ab".repeat(32)));
        assert_eq!(s.current_user_id(&headers), None);
    }

    #[test]
    fn unsigned_cookie_is_anonymous() {
        let s = sessions();
        let headers = headers_with_cookie("user_id=42");
        assert_eq!(s.current_user_id(&headers), None);
    }

    #[test]
    fn non_numeric_payload_is_anonymous() {
        let s = sessions();
        let token = TokenSigner::new("session-secret").sign("alice");
        let headers = headers_with_cookie(&format!("user_id={token}"));
        assert_eq!(s.current_user_id(&headers), None);
    }

    #[test]
    fn visit_token_does_not_grant_a_session() {
        let s = sessions();
        let visit_token = TokenSigner::new("visits-secret").sign("42");
        let headers = headers_with_cookie(&format!("user_id={visit_token}"));
        assert_eq!(s.current_user_id(&headers), None);
    }

    #[test]
    fn logout_cookie_overwrites_with_empty_value() {
        let value = sessions().logout_cookie();
        let value = value.to_str().unwrap();
        assert!(value.starts_with(&format!("{SESSION_COOKIE}=;")));
        assert!(value.contains("Path=/"));
    }
}
