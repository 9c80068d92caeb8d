//! Identity token claims.
//!
//! `sub` and `email` identify a person and are redacted in Debug output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Claims carried by a verified identity token.
///
/// Parsed once at the verification boundary. Optional claims stay `None`
/// when the authority omits them; nothing downstream inspects raw JSON.
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id at the identity authority).
    pub sub: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,

    /// Custom admin claim set by the identity authority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("email_verified", &self.email_verified)
            .field("admin", &self.admin)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_debug_redacts_identity() {
        let claims = Claims {
            sub: "firebase-uid-8812".to_string(),
            exp: 1_900_000_000,
            iat: 1_800_000_000,
            email: Some("buyer@client.example".to_string()),
            email_verified: Some(true),
            admin: None,
        };

        let debug_str = format!("{:?}", claims);

        assert!(!debug_str.contains("firebase-uid-8812"));
        assert!(!debug_str.contains("buyer@client.example"));
        assert!(debug_str.contains("[REDACTED]"));
        assert!(debug_str.contains("1900000000"));
    }

    #[test]
    fn test_claims_deserialize_minimal() {
        let json = r#"{"sub":"u1","exp":2000,"iat":1000}"#;
        let claims: Claims = serde_json::from_str(json).unwrap();

        assert_eq!(claims.sub, "u1");
        assert!(claims.email.is_none());
        assert!(claims.email_verified.is_none());
        assert!(claims.admin.is_none());
    }

    #[test]
    fn test_claims_deserialize_with_admin_claim() {
        let json = r#"{
            "sub": "u2",
            "exp": 2000,
            "iat": 1000,
            "email": "ops@aerofren.com",
            "email_verified": true,
            "admin": true,
            "firebase": {"sign_in_provider": "google.com"}
        }"#;
        let claims: Claims = serde_json::from_str(json).unwrap();

        assert_eq!(claims.admin, Some(true));
        assert_eq!(claims.email.as_deref(), Some("ops@aerofren.com"));
        assert_eq!(claims.email_verified, Some(true));
    }

    #[test]
    fn test_claims_reject_non_boolean_admin() {
        let json = r#"{"sub":"u3","exp":2000,"iat":1000,"admin":"yes"}"#;
        assert!(serde_json::from_str::<Claims>(json).is_err());
    }
}
