//! Admin privilege resolution.
//!
//! The custom `admin` claim is authoritative. The email allow-list is an
//! additive fallback for accounts that have not been given the claim yet: it
//! can grant admin but never revoke a claim-granted admin.

use crate::auth::claims::Claims;
use std::collections::HashSet;

/// Decides whether verified claims carry admin privilege.
#[derive(Debug, Clone, Default)]
pub struct AdminResolver {
    allow_list: HashSet<String>,
}

impl AdminResolver {
    /// Build a resolver from an allow-list of emails.
    ///
    /// Entries are trimmed and lowercased; blank entries are ignored.
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allow_list = emails
            .into_iter()
            .map(|email| email.as_ref().trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .collect();
        Self { allow_list }
    }

    /// 1. `admin == true` admits.
    /// 2. A non-empty email in the allow-list admits (case-insensitive).
    /// 3. Anything else is denied.
    pub fn is_admin(&self, claims: &Claims) -> bool {
        if claims.admin == Some(true) {
            return true;
        }

        match claims.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => {
                self.allow_list.contains(&email.to_lowercase())
            }
            _ => false,
        }
    }

    pub fn allow_list_len(&self) -> usize {
        self.allow_list.len()
    }
}
