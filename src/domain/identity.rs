use std::fmt;

/// Identity of the locally authenticated marketplace user, as supplied by
/// the host application's auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Bearer credential issued by the host application's auth layer.
///
/// The token is opaque to this crate and never printed; the `Debug`
/// implementation redacts it.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    token: String,
}

impl SessionCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_empty(&self) -> bool {
        self.token.trim().is_empty()
    }
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("token", &"[REDACTED]")
            .finish()
    }
}
