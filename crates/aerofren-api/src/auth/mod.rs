//! Authentication and authorization for the AEROFREN API.
//!
//! # Components
//!
//! - `claims` - Decoded identity token claims
//! - `jwks` - JWKS client caching the identity authority's public keys
//! - `jwt` - EdDSA token validation using cached keys
//! - `verifier` - The `TokenVerifier` seam used by the admission pipeline
//! - `authorization` - Admin privilege resolution

pub mod authorization;
pub mod claims;
pub mod jwks;
pub mod jwt;
pub mod verifier;

pub use authorization::AdminResolver;
pub use claims::Claims;
pub use jwks::JwksClient;
pub use jwt::JwtValidator;
pub use verifier::{verifier_from_config, TokenVerifier, UnconfiguredVerifier};
