//! Authentication state and wire types
//!
//! Timestamps are epoch milliseconds taken from the injected clock so that
//! expiry checks stay deterministic under test.

use serde::{Deserialize, Serialize};

/// Identity returned by the login, refresh and userinfo endpoints
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(alias = "id", alias = "openid")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl UserInfo {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), nickname: None, avatar_url: None }
    }
}

/// Payload of `POST /auth/login` and `POST /auth/refresh`
///
/// `token` is optional: a backend without token issuance answers login with
/// identity only, which switches the coordinator into legacy mode.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    #[serde(default, alias = "accessToken")]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user_info: Option<UserInfo>,
    /// Access token lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Credential produced by the platform login step (e.g. a one-time code)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginCredential {
    pub code: String,
    #[serde(default)]
    pub profile: serde_json::Value,
}

/// How outgoing requests are authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Bearer access token with refresh
    #[default]
    Token,
    /// Backend cannot issue tokens; a stable identity header is attached instead
    Legacy,
}

crate::impl_status_conversions!(AuthMode {
    Token => "token",
    Legacy => "legacy",
});

/// Current credential, owned by the auth coordinator
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthState {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Absolute expiry in epoch milliseconds
    pub expires_at_ms: Option<i64>,
    pub user_info: Option<UserInfo>,
}

impl AuthState {
    /// Build state from a grant received at `now_ms`
    pub fn from_grant(grant: TokenGrant, now_ms: i64) -> Self {
        let expires_at_ms = grant
            .expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| now_ms.saturating_add(secs.saturating_mul(1_000)));
        Self {
            access_token: grant.token,
            refresh_token: grant.refresh_token,
            expires_at_ms,
            user_info: grant.user_info,
        }
    }

    /// Apply a refresh grant, keeping identity if the server omitted it
    pub fn rotate(&self, grant: TokenGrant, now_ms: i64) -> Self {
        let previous_user = self.user_info.clone();
        let previous_refresh = self.refresh_token.clone();
        let mut next = Self::from_grant(grant, now_ms);
        if next.user_info.is_none() {
            next.user_info = previous_user;
        }
        if next.refresh_token.is_none() {
            next.refresh_token = previous_refresh;
        }
        next
    }

    pub fn has_token(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// True when the token expires within `window_ms` of `now_ms`.
    ///
    /// A token without expiry never needs proactive refresh.
    pub fn expires_within(&self, now_ms: i64, window_ms: i64) -> bool {
        match self.expires_at_ms {
            Some(expires_at) => expires_at - now_ms <= window_ms,
            None => false,
        }
    }

    /// Milliseconds until expiry, if an expiry is known
    pub fn millis_until_expiry(&self, now_ms: i64) -> Option<i64> {
        self.expires_at_ms.map(|expires_at| expires_at - now_ms)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_grant_parses_wire_format() {
        let grant: TokenGrant = serde_json::from_value(json!({
            "token": "at-1",
            "refreshToken": "rt-1",
            "userInfo": {"userId": "u-42", "nickname": "Mo"},
            "expiresIn": 7200
        }))
        .unwrap();

        let state = AuthState::from_grant(grant, 1_000);
        assert_eq!(state.access_token.as_deref(), Some("at-1"));
        assert_eq!(state.refresh_token.as_deref(), Some("rt-1"));
        assert_eq!(state.expires_at_ms, Some(1_000 + 7_200_000));
        assert_eq!(state.user_info.unwrap().user_id, "u-42");
    }

    #[test]
    fn test_expires_within_window() {
        let state = AuthState { expires_at_ms: Some(600_000), ..Default::default() };
        assert!(!state.expires_within(0, 300_000));
        assert!(state.expires_within(300_000, 300_000));
        assert!(state.expires_within(700_000, 300_000));

        let no_expiry = AuthState { access_token: Some("t".into()), ..Default::default() };
        assert!(!no_expiry.expires_within(i64::MAX / 2, 300_000));
    }

    #[test]
    fn test_rotate_keeps_identity_and_refresh_token_when_omitted() {
        let current = AuthState {
            access_token: Some("old".into()),
            refresh_token: Some("rt-old".into()),
            expires_at_ms: Some(10),
            user_info: Some(UserInfo::new("u-1")),
        };
        let grant = TokenGrant { token: Some("new".into()), expires_in: Some(60), ..Default::default() };

        let next = current.rotate(grant, 0);
        assert_eq!(next.access_token.as_deref(), Some("new"));
        assert_eq!(next.refresh_token.as_deref(), Some("rt-old"));
        assert_eq!(next.user_info, Some(UserInfo::new("u-1")));
        assert_eq!(next.expires_at_ms, Some(60_000));
    }

    #[test]
    fn test_user_info_accepts_id_alias() {
        let user: UserInfo = serde_json::from_value(json!({"openid": "o-9"})).unwrap();
        assert_eq!(user.user_id, "o-9");
    }
}
