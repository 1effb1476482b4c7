//! Bearer token lookup

/// Source of the bearer token attached to every stream request
pub trait CredentialStore: Send + Sync {
    /// The current access token, if the user is signed in
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed token, e.g. passed on the command line
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl CredentialStore for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.clone())
        }
    }
}

/// Format an `Authorization` header value
pub fn bearer_header(token: &str) -> String {
    format!("Bearer {}", token)
}
