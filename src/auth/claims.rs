use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Claims carried by a signed credential.
///
/// The codec stamps `iat`/`exp` at issue time, so callers only fill in the
/// identity part.
pub trait CredentialClaims: Serialize + DeserializeOwned {
    fn subject_id(&self) -> &str;
    fn issued_at(&self) -> i64;
    fn expires_at(&self) -> i64;
    fn stamp(&mut self, issued_at: i64, expires_at: i64);
}

/// Claims of an ordinary authenticated-request credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn new(
        subject_id: impl Into<String>,
        email: impl Into<String>,
        role: Role,
        name: Option<String>,
    ) -> Self {
        Self {
            sub: subject_id.into(),
            email: email.into(),
            role,
            name,
            iat: 0,
            exp: 0,
        }
    }
}

impl CredentialClaims for SessionClaims {
    fn subject_id(&self) -> &str {
        &self.sub
    }

    fn issued_at(&self) -> i64 {
        self.iat
    }

    fn expires_at(&self) -> i64 {
        self.exp
    }

    fn stamp(&mut self, issued_at: i64, expires_at: i64) {
        self.iat = issued_at;
        self.exp = expires_at;
    }
}

/// Claims of a short-lived one-time proof (e.g. email verification link).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationClaims {
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl VerificationClaims {
    pub fn new(subject_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            sub: subject_id.into(),
            email: email.into(),
            iat: 0,
            exp: 0,
        }
    }
}

impl CredentialClaims for VerificationClaims {
    fn subject_id(&self) -> &str {
        &self.sub
    }

    fn issued_at(&self) -> i64 {
        self.iat
    }

    fn expires_at(&self) -> i64 {
        self.exp
    }

    fn stamp(&mut self, issued_at: i64, expires_at: i64) {
        self.iat = issued_at;
        self.exp = expires_at;
    }
}
