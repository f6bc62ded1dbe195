// Authentication types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NetworkError;

/// Seconds subtracted from a server-provided lifetime
const EXPIRY_SKEW_SECS: i64 = 60;

/// Lifetime assumed when the server omits one
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Complete credential set of an authenticated session.
/// All three fields are always present together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialBundle {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CredentialBundle {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        }
    }

    /// True when `expires_at` is at or before `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Refresh endpoint request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh endpoint response body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl RefreshResponse {
    /// Build the replacement bundle, keeping `previous_refresh_token` when the
    /// server does not rotate it. Fails with `Decoding` when the lifetime does
    /// not fit in a timestamp.
    pub fn into_bundle(
        self,
        previous_refresh_token: String,
        now: DateTime<Utc>,
    ) -> Result<CredentialBundle, NetworkError> {
        let expires_at = match self.expires_at {
            Some(expires_at) => expires_at,
            None => {
                let expires_in = self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
                i64::try_from(expires_in)
                    .ok()
                    .and_then(|secs| Duration::try_seconds(secs - EXPIRY_SKEW_SECS))
                    .and_then(|lifetime| now.checked_add_signed(lifetime))
                    .ok_or_else(|| {
                        NetworkError::Decoding(format!("expiresIn out of range: {}", expires_in))
                    })?
            }
        };

        Ok(CredentialBundle {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .filter(|t| !t.is_empty())
                .unwrap_or(previous_refresh_token),
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_serializes_camel_case() {
        let expires_at = DateTime::parse_from_rfc3339("2026-01-12T10:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let bundle = CredentialBundle::new("a", "r", expires_at);
        let json = serde_json::to_value(&bundle).unwrap();

        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["refreshToken"], "r");
        assert_eq!(json["expiresAt"], "2026-01-12T10:30:00Z");
    }

    #[test]
    fn test_expiry_boundary_counts_as_expired() {
        let now = Utc::now();
        let bundle = CredentialBundle::new("a", "r", now);
        assert!(bundle.is_expired_at(now));
        assert!(!bundle.is_expired_at(now - Duration::seconds(1)));
    }

    #[test]
    fn test_refresh_response_preserves_refresh_token() {
        let now = Utc::now();
        let response: RefreshResponse =
            serde_json::from_str(r#"{"accessToken":"new","expiresIn":600}"#).unwrap();
        let bundle = response.into_bundle("old-refresh".to_string(), now).unwrap();

        assert_eq!(bundle.access_token, "new");
        assert_eq!(bundle.refresh_token, "old-refresh");
        assert_eq!(bundle.expires_at, now + Duration::seconds(540));
    }

    #[test]
    fn test_refresh_response_rotates_refresh_token() {
        let now = Utc::now();
        let response: RefreshResponse = serde_json::from_str(
            r#"{"accessToken":"new","refreshToken":"rotated","expiresAt":"2030-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        let bundle = response.into_bundle("old-refresh".to_string(), now).unwrap();

        assert_eq!(bundle.refresh_token, "rotated");
        assert_eq!(bundle.expires_at.to_rfc3339(), "2030-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_refresh_response_default_lifetime() {
        let now = Utc::now();
        let response: RefreshResponse =
            serde_json::from_str(r#"{"accessToken":"new","refreshToken":""}"#).unwrap();
        let bundle = response.into_bundle("keep".to_string(), now).unwrap();

        assert_eq!(bundle.refresh_token, "keep");
        assert_eq!(bundle.expires_at, now + Duration::seconds(3540));
    }

    #[test]
    fn test_refresh_response_rejects_unrepresentable_lifetime() {
        let now = Utc::now();

        for expires_in in [10_000_000_000_000u64, u64::MAX] {
            let response: RefreshResponse = serde_json::from_str(&format!(
                r#"{{"accessToken":"new","expiresIn":{}}}"#,
                expires_in
            ))
            .unwrap();

            assert!(matches!(
                response.into_bundle("keep".to_string(), now),
                Err(NetworkError::Decoding(_))
            ));
        }
    }
}
