//! Credential issuing, parsing, revocation and request gating.

pub mod claims;
pub mod codec;
pub mod gate;
pub mod revocation;

pub use claims::{CredentialClaims, Role, SessionClaims, VerificationClaims};
pub use codec::{CredentialCodec, CredentialError};
pub use gate::{bearer_token, AuthContext, AuthError, AuthGate, RoleGate};
pub use revocation::{
    remaining_lifetime, InMemoryRevocationStore, RedisRevocationSettings, RedisRevocationStore,
    RevocationStore,
};

use std::sync::Arc;

/// The two independently keyed codecs. Rotating one secret leaves the other
/// kind of credential untouched.
#[derive(Clone)]
pub struct CredentialCodecs {
    pub session: Arc<CredentialCodec>,
    pub verification: Arc<CredentialCodec>,
}
