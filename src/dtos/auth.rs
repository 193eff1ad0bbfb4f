//! Grant request and token-set response bodies, field names per the
//! OAuth2 token endpoint.

use serde::{Deserialize, Serialize};

/// Parameters of a token-endpoint request. All fields arrive as form
/// strings; validation happens in the issuer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GrantRequest {
    pub grant_type: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub assertion: Option<String>,
    pub refresh_token: Option<String>,
    pub code: Option<String>,
    /// Desired token-issuer target cell for federation.
    pub p_target: Option<String>,
    /// `"true"` requests unit-user promotion.
    pub p_owner: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub expires_in: Option<String>,
    pub refresh_token_expires_in: Option<String>,
    pub scope: Option<String>,
}

impl GrantRequest {
    pub fn password_grant(username: &str, password: &str) -> Self {
        Self {
            grant_type: Some(grant_type::PASSWORD.to_string()),
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            ..Self::default()
        }
    }

    pub fn refresh_grant(refresh_token: &str) -> Self {
        Self {
            grant_type: Some(grant_type::REFRESH_TOKEN.to_string()),
            refresh_token: Some(refresh_token.to_string()),
            ..Self::default()
        }
    }

    pub fn assertion_grant(assertion: &str) -> Self {
        Self {
            grant_type: Some(grant_type::SAML2_BEARER.to_string()),
            assertion: Some(assertion.to_string()),
            ..Self::default()
        }
    }

    pub fn code_grant(code: &str) -> Self {
        Self {
            grant_type: Some(grant_type::AUTHORIZATION_CODE.to_string()),
            code: Some(code.to_string()),
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.p_target = Some(target.to_string());
        self
    }
}

/// Supported `grant_type` values.
pub mod grant_type {
    pub const PASSWORD: &str = "password";
    pub const SAML2_BEARER: &str = "urn:ietf:params:oauth:grant-type:saml2-bearer";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const AUTHORIZATION_CODE: &str = "authorization_code";
}

/// Successful token-endpoint response.
#[derive(Debug, Clone, Serialize)]
pub struct TokenSetResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token_expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Federation target, present on trans-cell issues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_target: Option<String>,
    /// Previous successful authentication, epoch seconds. Interactive
    /// grants only; always absent for exempted accounts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_authenticated: Option<i64>,
    /// Failures since the previous success. Interactive grants only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_count: Option<u32>,
}

/// OAuth2 error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub error_description: String,
}

impl From<&crate::error::BrokerError> for ErrorBody {
    fn from(err: &crate::error::BrokerError) -> Self {
        Self {
            error: err.oauth_error().to_string(),
            error_description: err.oauth_error_description(),
        }
    }
}
