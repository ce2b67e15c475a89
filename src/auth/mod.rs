//! Caller identity for API-secret authentication.

use subtle::ConstantTimeEq;

use crate::config::AuthApiSecret;

/// Authenticated caller, inserted into request extensions by the auth middleware.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Auth {
    /// Id of the matched API secret; `None` when authentication is disabled
    pub id: Option<String>,
}

impl Auth {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
        }
    }

    /// Context used when authentication is disabled.
    pub fn empty() -> Self {
        Self { id: None }
    }

    pub fn is_authenticated(&self) -> bool {
        self.id.is_some()
    }
}

/// Find the id of the API secret matching `token`.
///
/// Every configured secret is compared in constant time, and the loop does
/// not stop at the first match.
pub fn match_api_secret_id<'a>(token: &str, secrets: &'a [AuthApiSecret]) -> Option<&'a str> {
    let mut matched = None;
    for entry in secrets {
        if bool::from(token.as_bytes().ct_eq(entry.secret.as_bytes())) && matched.is_none() {
            matched = Some(entry.id.as_str());
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> Vec<AuthApiSecret> {
        vec![
            AuthApiSecret {
                id: "client-a".to_string(),
                secret: "secret-a".to_string(),
            },
            AuthApiSecret {
                id: "client-b".to_string(),
                secret: "secret-b".to_string(),
            },
        ]
    }

    #[test]
    fn test_match_api_secret_id() {
        let secrets = secrets();
        assert_eq!(match_api_secret_id("secret-b", &secrets), Some("client-b"));
        assert_eq!(match_api_secret_id("secret-a", &secrets), Some("client-a"));
        assert_eq!(match_api_secret_id("secret", &secrets), None);
        assert_eq!(match_api_secret_id("", &secrets), None);
        assert_eq!(match_api_secret_id("secret-a", &[]), None);
    }

    #[test]
    fn test_auth_context() {
        assert!(!Auth::empty().is_authenticated());
        let auth = Auth::new("client-a");
        assert!(auth.is_authenticated());
        assert_eq!(auth.id.as_deref(), Some("client-a"));
    }
}
