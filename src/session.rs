//! Session cookie protocol.
//!
//! This module owns the wire contract of the session cookie: its name,
//! scope and lifetime, how it is read from a request and how renewed and
//! cleared cookies are rendered into `Set-Cookie` headers.

use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};
use tower_cookies::cookie::{Cookie, SameSite};

use crate::config::Config;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "sws-session-id";

/// Session cookie configuration
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// The name of the session cookie
    pub cookie_name: String,
    /// The path the cookie is scoped to
    pub path: String,
    /// Lifetime of the session and of the cookie
    pub max_age: time::Duration,
    /// The same-site policy for the session cookie
    pub same_site: SameSite,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SessionConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cookie_name: SESSION_COOKIE.to_string(),
            path: config.uri_path.clone(),
            max_age: time::Duration::seconds(
                i64::try_from(config.session_max_age).unwrap_or(i64::MAX),
            ),
            same_site: SameSite::Lax,
        }
    }

    /// Read the session id from the request's `Cookie` headers.
    ///
    /// Missing, unparseable and empty cookies all yield `None`.
    pub fn session_id(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == self.cookie_name)
            .map(|cookie| cookie.value().to_string())
            .filter(|sid| !sid.is_empty())
    }

    /// Cookie carrying `sid` for another full lifetime.
    pub fn session_cookie(&self, sid: &str) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), sid.to_string()))
            .path(self.path.clone())
            .max_age(self.max_age)
            .same_site(self.same_site)
            .http_only(true)
            .build()
    }

    /// Cookie instructing the client to drop the session.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build((self.cookie_name.clone(), ""))
            .path(self.path.clone())
            .http_only(true)
            .build();
        cookie.make_removal();
        cookie
    }
}

/// Append `cookie` as a `Set-Cookie` header.
pub(crate) fn append_cookie(headers: &mut HeaderMap, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            headers.append(SET_COOKIE, value);
        }
        Err(err) => tracing::warn!("dropping unencodable cookie: {}", err),
    }
}
