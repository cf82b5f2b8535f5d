use base64::Engine;
use http::header::AUTHORIZATION;
use http::HeaderMap;

/// Username and password taken from a `Basic` authorization header.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Extract credentials from the request headers.
    ///
    /// Anything other than exactly one well-formed `Basic` header counts as
    /// absent: wrong scheme, bad base64, non UTF-8 payload, missing `:`.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let mut values = headers.get_all(AUTHORIZATION).iter();
        let value = values.next()?;
        if values.next().is_some() {
            return None;
        }

        let (scheme, encoded) = value.to_str().ok()?.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;

        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn basic(user_pass: &str) -> String {
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(user_pass)
        )
    }

    fn headers(values: &[&str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for value in values {
            headers.append(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn test_extracts_basic_credentials() {
        let creds = Credentials::from_headers(&headers(&[&basic("admin:s3cr:et")])).unwrap();
        assert_eq!(creds.username, "admin");
        assert_eq!(creds.password, "s3cr:et");
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        let value = basic("admin:pw").replace("Basic", "bAsIc");
        assert!(Credentials::from_headers(&headers(&[&value])).is_some());
    }

    #[test]
    fn test_malformed_headers_are_absent() {
        assert!(Credentials::from_headers(&HeaderMap::new()).is_none());
        assert!(Credentials::from_headers(&headers(&["Bearer token"])).is_none());
        assert!(Credentials::from_headers(&headers(&["Basic !!!notbase64"])).is_none());
        assert!(Credentials::from_headers(&headers(&[&basic("no-colon")])).is_none());
        assert!(
            Credentials::from_headers(&headers(&[&basic("a:b"), &basic("c:d")])).is_none()
        );
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = Credentials {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
