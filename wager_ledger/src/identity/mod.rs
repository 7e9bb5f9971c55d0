//! Identity verification at the trust boundary.
//!
//! Bearer tokens issued by the external auth provider are HS256 JWTs. They
//! are decoded into [`VerifiedIdentity`], a closed record with the fields the
//! ledger needs, before anything reaches the ledger.

pub mod errors;
pub mod models;
pub mod verifier;

pub use errors::{IdentityError, IdentityResult};
pub use models::{AppMetadata, IdentityClaims, Role, UserMetadata, VerifiedIdentity};
pub use verifier::TokenVerifier;
