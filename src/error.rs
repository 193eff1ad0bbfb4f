use thiserror::Error;

/// Broker-level error taxonomy.
///
/// Variants stay distinguishable inside the crate (for logging and for
/// callers that need to branch), but the OAuth2 wire mapping collapses
/// everything credential-related into `invalid_grant` so a client cannot
/// tell a bad password from a suspended account or an active lock.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("required parameter missing or invalid: {0}")]
    RequiredParamMissing(String),

    #[error("unsupported grant_type: {0}")]
    UnsupportedGrantType(String),

    #[error("p_target is not a valid URL")]
    InvalidTarget,

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("account is locked")]
    AccountLocked,

    #[error("authentication attempted before the valid interval elapsed")]
    TooFrequent,

    #[error("token expired")]
    TokenExpired,

    #[error("token could not be parsed")]
    TokenParse,

    #[error("token signature or certificate chain invalid")]
    TokenSignatureInvalid,

    #[error("token target does not match this cell: {0}")]
    TokenTargetWrong(String),

    #[error("presented token is not a refresh token")]
    NotRefreshToken,

    #[error("grant code invalid")]
    InvalidGrantCode,

    #[error("client authentication required")]
    ClientAuthRequired,

    #[error("client mismatch: token schema {token_schema:?}, client {client:?}")]
    ClientMismatch {
        token_schema: Option<String>,
        client: Option<String>,
    },

    #[error("client secret expired")]
    ClientSecretExpired,

    #[error("client secret issuer does not match client_id")]
    ClientSecretIssuerMismatch,

    #[error("client secret target is not this cell")]
    ClientSecretTargetWrong,

    #[error("password change required")]
    PasswordChangeRequired {
        access_token: String,
        last_authenticated: Option<i64>,
        failed_count: u32,
    },

    #[error("schema authentication required")]
    SchemaRequired,

    #[error("token schema does not match box schema")]
    SchemaMismatch,

    #[error("schema authentication level is insufficient")]
    InsufficientSchemaLevel,

    #[error("trans-cell access representing owner is not allowed")]
    TcAccessRepresentingOwner,

    #[error("account is not allowed to represent the cell owner")]
    NotAllowedRepresentOwner,

    #[error("cell has no owner")]
    NoCellOwner,

    #[error("root CA configuration error: {0}")]
    TrustConfiguration(String),

    #[error("directory unavailable: {0}")]
    Transient(#[from] anyhow::Error),
}

impl BrokerError {
    /// OAuth2 `error` code for the response body.
    pub fn oauth_error(&self) -> &'static str {
        match self {
            Self::RequiredParamMissing(_) | Self::InvalidTarget => "invalid_request",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::ClientAuthRequired
            | Self::ClientMismatch { .. }
            | Self::ClientSecretExpired
            | Self::ClientSecretIssuerMismatch
            | Self::ClientSecretTargetWrong => "invalid_client",
            Self::SchemaRequired | Self::SchemaMismatch | Self::InsufficientSchemaLevel => {
                "access_denied"
            }
            Self::TrustConfiguration(_) => "server_error",
            Self::Transient(_) => "temporarily_unavailable",
            Self::PasswordChangeRequired { .. } => "invalid_grant",
            // Everything credential- or token-related collapses here,
            // including lockout and the interval guard.
            _ => "invalid_grant",
        }
    }

    /// OAuth2 `error_description`. Lockout and interval rejections reuse
    /// the generic authentication-failure text so the states cannot be
    /// told apart from outside.
    pub fn oauth_error_description(&self) -> String {
        match self {
            Self::AuthenticationFailed
            | Self::AccountLocked
            | Self::TooFrequent
            | Self::TokenExpired
            | Self::TokenParse
            | Self::TokenSignatureInvalid
            | Self::TokenTargetWrong(_)
            | Self::NotRefreshToken => "authentication failed".to_string(),
            Self::PasswordChangeRequired { .. } => "password change required".to_string(),
            other => other.to_string(),
        }
    }

    /// True for errors the client may retry unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
