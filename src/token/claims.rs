use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload of a session token.
///
/// `exp` and `nbf` are epoch seconds; a missing bound means the token is not
/// limited on that side. Unknown claims are preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Claims identifying an authenticated user, both as `sub` and `userId`.
    #[must_use]
    pub fn for_user(user_id: &str) -> Self {
        Self {
            sub: Some(user_id.to_string()),
            user_id: Some(user_id.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// The `userId` claim alone. Page access requires it; `sub` does not count.
    #[must_use]
    pub fn session_user_id(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|id| !id.is_empty())
    }

    /// The authenticated user: `userId`, falling back to `sub`.
    #[must_use]
    pub fn current_user_id(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .or(self.sub.as_deref())
            .filter(|id| !id.is_empty())
    }

    pub(crate) fn is_not_yet_valid(&self, now: i64) -> bool {
        self.nbf.is_some_and(|nbf| nbf > now)
    }

    pub(crate) fn is_expired(&self, now: i64) -> bool {
        self.exp.is_some_and(|exp| exp < now)
    }
}
