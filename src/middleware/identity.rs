use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue},
};

use crate::error::ApiError;
use crate::types::ActingUser;

/// Header naming the acting user; wins over the cookie.
pub const USER_HEADER: &str = "x-user-id";

/// Cookie set by a successful `authenticate_user`.
pub const USER_COOKIE: &str = "current_user";

/// Acting user resolved from the request, `None` for anonymous callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity(pub Option<ActingUser>);

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        resolve(&parts.headers).map(Identity)
    }
}

/// Header `x-user-id` first, then cookie `current_user`. Blank values count as
/// absent; anything else must be a positive integer.
pub fn resolve(headers: &HeaderMap) -> Result<Option<ActingUser>, ApiError> {
    let raw = header_value(headers).or_else(|| cookie_value(headers, USER_COOKIE));
    match raw {
        None => Ok(None),
        Some(raw) => raw
            .parse::<ActingUser>()
            .map(Some)
            .map_err(|e| ApiError::bad_request(format!("Invalid acting user: {}", e))),
    }
}

fn header_value(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| value.trim().trim_matches('"').to_string())
        })
        .find(|v| !v.is_empty())
}

/// Cookie attributes for the identity cookie.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieSettings {
    pub secure: bool,
}

impl CookieSettings {
    pub fn login(&self, user: &str) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.render(user, None)).ok()
    }

    pub fn logout(&self) -> HeaderValue {
        HeaderValue::from_str(&self.render("", Some(0)))
            .unwrap_or_else(|_| HeaderValue::from_static("current_user=; Path=/; Max-Age=0"))
    }

    fn render(&self, value: &str, max_age: Option<i64>) -> String {
        let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", USER_COOKIE, value);
        if self.secure {
            cookie.push_str("; Secure");
        }
        if let Some(age) = max_age {
            cookie.push_str(&format!("; Max-Age={}", age));
        }
        cookie
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn header_takes_precedence_over_cookie() {
        let map = headers(&[("x-user-id", "42"), ("cookie", "current_user=7")]);
        assert_eq!(resolve(&map).unwrap().map(|u| u.id()), Some(42));
    }

    #[test]
    fn falls_back_to_cookie() {
        let map = headers(&[("cookie", "theme=dark; current_user=7; lang=es")]);
        assert_eq!(resolve(&map).unwrap().map(|u| u.id()), Some(7));

        let map = headers(&[("cookie", "theme=dark"), ("cookie", "current_user=9")]);
        assert_eq!(resolve(&map).unwrap().map(|u| u.id()), Some(9));
    }

    #[test]
    fn blank_values_are_anonymous() {
        assert_eq!(resolve(&HeaderMap::new()).unwrap(), None);
        let map = headers(&[("x-user-id", "  "), ("cookie", "current_user=")]);
        assert_eq!(resolve(&map).unwrap(), None);
    }

    #[test]
    fn blank_header_defers_to_cookie() {
        let map = headers(&[("x-user-id", ""), ("cookie", "current_user=12")]);
        assert_eq!(resolve(&map).unwrap().map(|u| u.id()), Some(12));
    }

    #[test]
    fn malformed_ids_are_rejected() {
        let map = headers(&[("x-user-id", "admin")]);
        assert_eq!(resolve(&map).unwrap_err().status_code(), 400);
    }

    #[test]
    fn renders_http_only_cookies() {
        let plain = CookieSettings { secure: false };
        assert_eq!(
            plain.login("42").unwrap(),
            "current_user=42; Path=/; HttpOnly; SameSite=Lax"
        );

        let secure = CookieSettings { secure: true };
        assert_eq!(
            secure.logout(),
            "current_user=; Path=/; HttpOnly; SameSite=Lax; Secure; Max-Age=0"
        );
    }
}
