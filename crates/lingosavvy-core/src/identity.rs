//! Caller identity as seen by the pipeline: anonymous or authenticated as a
//! username. Tokens are opaque; issuing them is the identity provider's job.

use std::collections::HashMap;

/// Authentication state passed explicitly into the access gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated { username: String },
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            AuthState::Authenticated { username } => Some(username),
            AuthState::Anonymous => None,
        }
    }
}

/// A bearer token was presented but is not known.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown bearer token")]
pub struct UnknownToken;

/// Maps opaque bearer tokens to usernames.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: HashMap<String, String>,
}

impl TokenRegistry {
    /// Build from `token -> username`. Blank tokens or usernames are skipped.
    pub fn new(tokens: HashMap<String, String>) -> Self {
        let tokens = tokens
            .into_iter()
            .map(|(t, u)| (t.trim().to_string(), u.trim().to_string()))
            .filter(|(t, u)| !t.is_empty() && !u.is_empty())
            .collect();
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Resolves an `Authorization` header value. No header means anonymous;
    /// a header that is not a known bearer token is an error.
    pub fn resolve(&self, authorization: Option<&str>) -> Result<AuthState, UnknownToken> {
        let Some(header) = authorization else {
            return Ok(AuthState::Anonymous);
        };
        let (scheme, token) = header.trim().split_once(' ').ok_or(UnknownToken)?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(UnknownToken);
        }
        let token = token.trim();
        self.tokens
            .get(token)
            .map(|username| AuthState::Authenticated {
                username: username.clone(),
            })
            .ok_or(UnknownToken)
    }
}
