//! Token issuance orchestration.
//!
//! One entry point per OAuth2 grant, each wiring the lockout guard,
//! credential verifier, trust-graph resolver, and token codec together
//! in a fixed order: admission, credential, role resolution, minting,
//! outcome recording. Refresh exchanges skip the guard entirely; they
//! are not credential attempts.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::TokenConfig;
use crate::dtos::auth::{grant_type, GrantRequest, TokenSetResponse};
use crate::error::BrokerError;
use crate::models::{Account, Cell};
use crate::services::credential::{check_pre_password, check_status, CredentialVerifier};
use crate::services::directory::Directory;
use crate::services::lockout::{AuthHistory, LockoutGuard};
use crate::services::resolver::RoleResolver;
use crate::services::schema_gate::CONFIDENTIAL_MARKER;
use crate::services::token::{
    validate_expires_in, validate_refresh_expires_in, MintRequest, TokenCodec, TokenKind,
};
use crate::utils::ip;
use crate::utils::password::Password;
use crate::utils::uri::is_clean_url;

/// Role name that marks a client application as confidential. An app
/// cell grants it, in its main box, to secrets it issues for
/// confidential clients.
pub const CONFIDENTIAL_CLIENT_ROLE: &str = "confidentialClient";

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

pub struct TokenIssuer {
    directory: Arc<dyn Directory>,
    codec: TokenCodec,
    guard: LockoutGuard,
    verifier: Arc<dyn CredentialVerifier>,
    resolver: RoleResolver,
    token_config: TokenConfig,
}

impl TokenIssuer {
    pub fn new(
        directory: Arc<dyn Directory>,
        codec: TokenCodec,
        guard: LockoutGuard,
        verifier: Arc<dyn CredentialVerifier>,
        token_config: TokenConfig,
    ) -> Self {
        let resolver = RoleResolver::new(directory.clone(), codec.resolver().clone());
        Self {
            directory,
            codec,
            guard,
            verifier,
            resolver,
            token_config,
        }
    }

    pub fn resolver(&self) -> &RoleResolver {
        &self.resolver
    }

    /// Token-endpoint entry point for one cell. `x_forwarded_for` is
    /// the raw header value; the first hop is taken as the client
    /// address for IP-restricted accounts.
    pub async fn grant(
        &self,
        cell_url: &str,
        request: &GrantRequest,
        x_forwarded_for: Option<&str>,
    ) -> Result<TokenSetResponse, BrokerError> {
        let cell = self.require_cell(cell_url).await?;
        if let Some(target) = request.p_target.as_deref() {
            if !is_clean_url(target) {
                return Err(BrokerError::InvalidTarget);
            }
        }

        match request.grant_type.as_deref() {
            Some(grant_type::PASSWORD) => {
                self.password_grant(&cell, request, x_forwarded_for).await
            }
            Some(grant_type::SAML2_BEARER) => self.assertion_grant(&cell, request).await,
            Some(grant_type::REFRESH_TOKEN) => self.refresh_grant(&cell, request).await,
            Some(grant_type::AUTHORIZATION_CODE) => self.code_grant(&cell, request).await,
            Some(other) => Err(BrokerError::UnsupportedGrantType(other.to_string())),
            None => Err(BrokerError::RequiredParamMissing("grant_type".to_string())),
        }
    }

    /// Mint an authorization code for the companion browser flow. The
    /// code is bound to the client application and later exchanged via
    /// the `authorization_code` grant.
    pub async fn issue_grant_code(
        &self,
        cell_url: &str,
        account_name: &str,
        client_id: &str,
    ) -> Result<String, BrokerError> {
        let cell = self.require_cell(cell_url).await?;
        self.codec.mint(&MintRequest {
            kind: TokenKind::GrantCode,
            issuer: cell.url.clone(),
            subject: resident_subject(&cell.url, account_name),
            audience: cell.url.clone(),
            schema: Some(client_id.to_string()),
            roles: vec![],
            owner: false,
            scope: None,
            lifetime_secs: self.token_config.grant_code_secs,
        })
    }

    async fn password_grant(
        &self,
        cell: &Cell,
        request: &GrantRequest,
        x_forwarded_for: Option<&str>,
    ) -> Result<TokenSetResponse, BrokerError> {
        let username = required(request.username.as_deref(), "username")?;
        let password = Password::new(required(request.password.as_deref(), "password")?);
        let schema = self.client_schema(cell, request).await?;
        let now = Utc::now().timestamp();

        let track_history = !self.is_history_exempt(cell, username).await?;
        self.guard.admit(&cell.url, username, now).await?;

        let account = match self.directory.get_account(&cell.url, username).await? {
            Some(account) => account,
            None => {
                // Same work and same error as a wrong password.
                self.verifier.burn(&password).await;
                self.guard
                    .record_failure(&cell.url, username, track_history, now)
                    .await?;
                warn!(cell = %cell.url, "password grant for unknown account");
                return Err(BrokerError::AuthenticationFailed);
            }
        };

        let client_ip = ip::client_ip(x_forwarded_for);
        let credential_ok = check_pre_password(&account, client_ip).is_ok()
            && self.verifier.verify(&account, &password).await
            && check_status(&account).is_ok();
        if !credential_ok {
            self.guard
                .record_failure(&cell.url, username, track_history, now)
                .await?;
            warn!(cell = %cell.url, account = %username, "password grant failed");
            return Err(BrokerError::AuthenticationFailed);
        }

        let history = self
            .guard
            .record_success(&cell.url, username, track_history, now)
            .await?;

        if account.password_change_required() {
            let token = self.codec.mint(&MintRequest {
                kind: TokenKind::AccountAccess,
                issuer: cell.url.clone(),
                subject: resident_subject(&cell.url, username),
                audience: cell.url.clone(),
                schema: schema.clone(),
                roles: vec![],
                owner: false,
                scope: None,
                lifetime_secs: self.access_lifetime(request)?,
            })?;
            info!(cell = %cell.url, account = %username, "password change required, restricted token issued");
            return Err(BrokerError::PasswordChangeRequired {
                access_token: token,
                last_authenticated: history.last_authenticated,
                failed_count: history.failed_count,
            });
        }

        if request.p_owner.as_deref() == Some("true") {
            return self
                .owner_grant(cell, &account, request, schema, history, track_history)
                .await;
        }

        info!(cell = %cell.url, account = %username, "password grant succeeded");
        self.issue_resident_set(cell, username, request, schema, Some((history, track_history)))
            .await
    }

    /// Unit-user promotion: the account must be allowed to represent
    /// the cell owner, and the cell must have one.
    async fn owner_grant(
        &self,
        cell: &Cell,
        account: &Account,
        request: &GrantRequest,
        schema: Option<String>,
        history: AuthHistory,
        track_history: bool,
    ) -> Result<TokenSetResponse, BrokerError> {
        if request.p_target.is_some() {
            return Err(BrokerError::RequiredParamMissing(
                "p_owner cannot be combined with p_target".to_string(),
            ));
        }
        let owner = cell.owner.as_deref().ok_or(BrokerError::NoCellOwner)?;
        let representatives = self
            .directory
            .owner_representative_accounts(&cell.url)
            .await?;
        if !representatives.iter().any(|a| a == &account.name) {
            return Err(BrokerError::NotAllowedRepresentOwner);
        }

        let access_token = self.codec.mint(&MintRequest {
            kind: TokenKind::UnitLocalUnitUser,
            issuer: cell.url.clone(),
            subject: owner.to_string(),
            audience: self.codec.resolver().unit_url().to_string(),
            schema,
            roles: vec![],
            owner: true,
            scope: request.scope.clone(),
            lifetime_secs: self.access_lifetime(request)?,
        })?;
        info!(cell = %cell.url, account = %account.name, "unit-user token issued");

        Ok(self.response(
            access_token,
            self.access_lifetime(request)?,
            None,
            None,
            None,
            Some((history, track_history)),
        ))
    }

    async fn assertion_grant(
        &self,
        cell: &Cell,
        request: &GrantRequest,
    ) -> Result<TokenSetResponse, BrokerError> {
        let assertion = required(request.assertion.as_deref(), "assertion")?;
        if request.p_owner.as_deref() == Some("true") {
            return Err(BrokerError::TcAccessRepresentingOwner);
        }

        let claims = self.codec.parse(assertion, &cell.url)?;
        if claims.knd != TokenKind::TransCellAccess {
            return Err(BrokerError::TokenParse);
        }
        let schema = match self.client_schema(cell, request).await? {
            Some(schema) => Some(schema),
            None => claims.schema.clone(),
        };

        let resolved = self
            .resolver
            .resolve_roles(&claims.iss, &claims.sub, &claims.roles, &cell.url)
            .await?;
        debug!(
            cell = %cell.url,
            subject = %claims.sub,
            roles = resolved.len(),
            "assertion verified, roles resolved"
        );

        let access_secs = self.access_lifetime(request)?;
        let access_token = match request.p_target.as_deref() {
            // Chained federation: re-mint toward the next hop with the
            // roles resolved here, never the presented set.
            Some(target) => self.codec.mint(&MintRequest {
                kind: TokenKind::TransCellAccess,
                issuer: cell.url.clone(),
                subject: claims.sub.clone(),
                audience: target.to_string(),
                schema: schema.clone(),
                roles: self.resolver.role_urls(&resolved, &cell.url),
                owner: false,
                scope: request.scope.clone(),
                lifetime_secs: access_secs,
            })?,
            None => self.codec.mint(&MintRequest {
                kind: TokenKind::VisitorLocalAccess,
                issuer: cell.url.clone(),
                subject: claims.sub.clone(),
                audience: cell.url.clone(),
                schema: schema.clone(),
                roles: self.resolver.role_urls(&resolved, &cell.url),
                owner: false,
                scope: request.scope.clone(),
                lifetime_secs: access_secs,
            })?,
        };

        // The visitor refresh keeps the original foreign roles so every
        // refresh re-resolves against the current trust graph.
        let refresh_secs = self.refresh_lifetime(request)?;
        let refresh_token = self.codec.mint(&MintRequest {
            kind: TokenKind::CellLocalRefresh,
            issuer: cell.url.clone(),
            subject: claims.sub.clone(),
            audience: cell.url.clone(),
            schema: schema.clone(),
            roles: claims.roles.clone(),
            owner: false,
            scope: request.scope.clone(),
            lifetime_secs: refresh_secs,
        })?;
        info!(cell = %cell.url, subject = %claims.sub, "assertion grant succeeded");

        Ok(self.response(
            access_token,
            access_secs,
            Some(refresh_token),
            Some(refresh_secs),
            request.p_target.clone(),
            None,
        ))
    }

    async fn refresh_grant(
        &self,
        cell: &Cell,
        request: &GrantRequest,
    ) -> Result<TokenSetResponse, BrokerError> {
        let presented = required(request.refresh_token.as_deref(), "refresh_token")?;
        let claims = self.codec.parse(presented, &cell.url)?;
        if !claims.knd.is_refresh() {
            return Err(BrokerError::NotRefreshToken);
        }

        // A schema-bound refresh token stays bound: the same client must
        // authenticate again, and a different application is refused.
        let client_schema = self.client_schema(cell, request).await?;
        let schema = match (&claims.schema, &client_schema) {
            (Some(bound), Some(presented)) => {
                let bound_bare = bound.trim_end_matches(CONFIDENTIAL_MARKER);
                let presented_bare = presented.trim_end_matches(CONFIDENTIAL_MARKER);
                if !self.codec.resolver().urls_equal(bound_bare, presented_bare) {
                    return Err(BrokerError::ClientMismatch {
                        token_schema: Some(bound.clone()),
                        client: Some(presented.clone()),
                    });
                }
                client_schema.clone()
            }
            (Some(_), None) => return Err(BrokerError::ClientAuthRequired),
            (None, presented) => presented.clone(),
        };

        let home = principal_home(&claims.sub);
        let resident = self.codec.resolver().urls_equal(&home, &cell.url);
        let access_secs = self.access_lifetime(request)?;
        let refresh_secs = self.refresh_lifetime(request)?;

        // Unit-user promotion through refresh, residents only.
        if request.p_owner.as_deref() == Some("true") {
            if !resident {
                return Err(BrokerError::TcAccessRepresentingOwner);
            }
            if request.p_target.is_some() {
                return Err(BrokerError::RequiredParamMissing(
                    "p_owner cannot be combined with p_target".to_string(),
                ));
            }
            let owner = cell.owner.as_deref().ok_or(BrokerError::NoCellOwner)?;
            let account_name = claims.sub.rsplit_once('#').map(|(_, n)| n).unwrap_or("");
            let representatives = self
                .directory
                .owner_representative_accounts(&cell.url)
                .await?;
            if !representatives.iter().any(|a| a == account_name) {
                return Err(BrokerError::NotAllowedRepresentOwner);
            }

            let access_token = self.codec.mint(&MintRequest {
                kind: TokenKind::UnitLocalUnitUser,
                issuer: cell.url.clone(),
                subject: owner.to_string(),
                audience: self.codec.resolver().unit_url().to_string(),
                schema: schema.clone(),
                roles: vec![],
                owner: true,
                scope: claims.scope.clone(),
                lifetime_secs: access_secs,
            })?;
            let refresh_token = self.codec.mint(&MintRequest {
                kind: claims.knd,
                issuer: claims.iss.clone(),
                subject: claims.sub.clone(),
                audience: cell.url.clone(),
                schema,
                roles: claims.roles.clone(),
                owner: false,
                scope: claims.scope.clone(),
                lifetime_secs: refresh_secs,
            })?;
            info!(cell = %cell.url, "unit-user token issued through refresh");
            return Ok(self.response(
                access_token,
                access_secs,
                Some(refresh_token),
                Some(refresh_secs),
                None,
                None,
            ));
        }

        let (access_token, p_target) = match request.p_target.as_deref() {
            Some(target) => {
                let roles = if resident {
                    let direct = self
                        .resolver
                        .resolve_roles(&cell.url, &claims.sub, &[], &cell.url)
                        .await?;
                    self.resolver.role_urls(&direct, &cell.url)
                } else {
                    let resolved = self
                        .resolver
                        .resolve_roles(&home, &claims.sub, &claims.roles, &cell.url)
                        .await?;
                    self.resolver.role_urls(&resolved, &cell.url)
                };
                let token = self.codec.mint(&MintRequest {
                    kind: TokenKind::TransCellAccess,
                    issuer: cell.url.clone(),
                    subject: claims.sub.clone(),
                    audience: target.to_string(),
                    schema: schema.clone(),
                    roles,
                    owner: false,
                    scope: claims.scope.clone(),
                    lifetime_secs: access_secs,
                })?;
                (token, Some(target.to_string()))
            }
            None if resident => {
                let token = self.codec.mint(&MintRequest {
                    kind: TokenKind::ResidentLocalAccess,
                    issuer: cell.url.clone(),
                    subject: claims.sub.clone(),
                    audience: cell.url.clone(),
                    schema: schema.clone(),
                    roles: vec![],
                    owner: false,
                    scope: claims.scope.clone(),
                    lifetime_secs: access_secs,
                })?;
                (token, None)
            }
            None => {
                let resolved = self
                    .resolver
                    .resolve_roles(&home, &claims.sub, &claims.roles, &cell.url)
                    .await?;
                let token = self.codec.mint(&MintRequest {
                    kind: TokenKind::VisitorLocalAccess,
                    issuer: cell.url.clone(),
                    subject: claims.sub.clone(),
                    audience: cell.url.clone(),
                    schema: schema.clone(),
                    roles: self.resolver.role_urls(&resolved, &cell.url),
                    owner: false,
                    scope: claims.scope.clone(),
                    lifetime_secs: access_secs,
                })?;
                (token, None)
            }
        };

        // Same kind, issuer, subject, schema; only id and timestamps
        // move.
        let refresh_token = self.codec.mint(&MintRequest {
            kind: claims.knd,
            issuer: claims.iss.clone(),
            subject: claims.sub.clone(),
            audience: cell.url.clone(),
            schema: schema.clone(),
            roles: claims.roles.clone(),
            owner: false,
            scope: claims.scope.clone(),
            lifetime_secs: refresh_secs,
        })?;
        debug!(cell = %cell.url, subject = %claims.sub, "refresh exchange completed");

        Ok(self.response(
            access_token,
            access_secs,
            Some(refresh_token),
            Some(refresh_secs),
            p_target,
            None,
        ))
    }

    async fn code_grant(
        &self,
        cell: &Cell,
        request: &GrantRequest,
    ) -> Result<TokenSetResponse, BrokerError> {
        let code = required(request.code.as_deref(), "code")?;
        let claims = self
            .codec
            .parse(code, &cell.url)
            .map_err(|e| match e {
                BrokerError::TokenExpired => BrokerError::TokenExpired,
                _ => BrokerError::InvalidGrantCode,
            })?;
        if claims.knd != TokenKind::GrantCode {
            return Err(BrokerError::InvalidGrantCode);
        }
        // A grant code never carries owner authority.
        if request.p_owner.as_deref() == Some("true") {
            return Err(BrokerError::TcAccessRepresentingOwner);
        }

        // The exchanging client must be the one the code was issued to.
        let client_id = request
            .client_id
            .as_deref()
            .ok_or(BrokerError::ClientAuthRequired)?;
        let bound = claims.schema.as_deref().unwrap_or("");
        let bound_bare = bound.trim_end_matches(CONFIDENTIAL_MARKER);
        if !self.codec.resolver().urls_equal(bound_bare, client_id) {
            return Err(BrokerError::ClientMismatch {
                token_schema: claims.schema.clone(),
                client: Some(client_id.to_string()),
            });
        }
        let schema = match self.client_schema(cell, request).await? {
            Some(schema) => Some(schema),
            None => Some(client_id.to_string()),
        };

        let access_secs = self.access_lifetime(request)?;
        let refresh_secs = self.refresh_lifetime(request)?;
        let access_token = match request.p_target.as_deref() {
            Some(target) => {
                let direct = self
                    .resolver
                    .resolve_roles(&cell.url, &claims.sub, &[], &cell.url)
                    .await?;
                self.codec.mint(&MintRequest {
                    kind: TokenKind::TransCellAccess,
                    issuer: cell.url.clone(),
                    subject: claims.sub.clone(),
                    audience: target.to_string(),
                    schema: schema.clone(),
                    roles: self.resolver.role_urls(&direct, &cell.url),
                    owner: false,
                    scope: claims.scope.clone(),
                    lifetime_secs: access_secs,
                })?
            }
            None => self.codec.mint(&MintRequest {
                kind: TokenKind::ResidentLocalAccess,
                issuer: cell.url.clone(),
                subject: claims.sub.clone(),
                audience: cell.url.clone(),
                schema: schema.clone(),
                roles: vec![],
                owner: false,
                scope: claims.scope.clone(),
                lifetime_secs: access_secs,
            })?,
        };
        let refresh_token = self.codec.mint(&MintRequest {
            kind: TokenKind::CellLocalRefresh,
            issuer: cell.url.clone(),
            subject: claims.sub.clone(),
            audience: cell.url.clone(),
            schema,
            roles: vec![],
            owner: false,
            scope: claims.scope.clone(),
            lifetime_secs: refresh_secs,
        })?;
        info!(cell = %cell.url, subject = %claims.sub, "authorization code exchanged");

        Ok(self.response(
            access_token,
            access_secs,
            Some(refresh_token),
            Some(refresh_secs),
            request.p_target.clone(),
            None,
        ))
    }

    /// Resolve client (application) authentication into the schema
    /// claim the issued tokens will carry. `client_secret` is a
    /// trans-cell token the application's cell issued toward this cell;
    /// the confidential marker is appended when that token grants the
    /// confidential-client role.
    async fn client_schema(
        &self,
        cell: &Cell,
        request: &GrantRequest,
    ) -> Result<Option<String>, BrokerError> {
        let Some(client_id) = request.client_id.as_deref() else {
            if request.client_secret.is_some() {
                return Err(BrokerError::ClientAuthRequired);
            }
            return Ok(None);
        };
        let Some(secret) = request.client_secret.as_deref() else {
            // A bare client_id names the application without proving it.
            return Ok(Some(client_id.to_string()));
        };

        let claims = self.codec.parse(secret, &cell.url).map_err(|e| match e {
            BrokerError::TokenExpired => BrokerError::ClientSecretExpired,
            BrokerError::TokenTargetWrong(_) => BrokerError::ClientSecretTargetWrong,
            _ => BrokerError::ClientAuthRequired,
        })?;
        if claims.knd != TokenKind::TransCellAccess {
            return Err(BrokerError::ClientAuthRequired);
        }
        if !self.codec.resolver().urls_equal(&claims.iss, client_id) {
            return Err(BrokerError::ClientSecretIssuerMismatch);
        }

        let confidential = claims.roles.iter().any(|r| {
            r.ends_with(&format!("__role/__/{CONFIDENTIAL_CLIENT_ROLE}"))
        });
        let schema = self.codec.resolver().normalize(client_id);
        Ok(Some(if confidential {
            format!("{schema}{CONFIDENTIAL_MARKER}")
        } else {
            schema
        }))
    }

    async fn issue_resident_set(
        &self,
        cell: &Cell,
        account_name: &str,
        request: &GrantRequest,
        schema: Option<String>,
        history: Option<(AuthHistory, bool)>,
    ) -> Result<TokenSetResponse, BrokerError> {
        let subject = resident_subject(&cell.url, account_name);
        let access_secs = self.access_lifetime(request)?;
        let refresh_secs = self.refresh_lifetime(request)?;

        let access_token = match request.p_target.as_deref() {
            Some(target) => {
                let direct = self
                    .resolver
                    .resolve_roles(&cell.url, &subject, &[], &cell.url)
                    .await?;
                self.codec.mint(&MintRequest {
                    kind: TokenKind::TransCellAccess,
                    issuer: cell.url.clone(),
                    subject: subject.clone(),
                    audience: target.to_string(),
                    schema: schema.clone(),
                    roles: self.resolver.role_urls(&direct, &cell.url),
                    owner: false,
                    scope: request.scope.clone(),
                    lifetime_secs: access_secs,
                })?
            }
            None => self.codec.mint(&MintRequest {
                kind: TokenKind::ResidentLocalAccess,
                issuer: cell.url.clone(),
                subject: subject.clone(),
                audience: cell.url.clone(),
                schema: schema.clone(),
                roles: vec![],
                owner: false,
                scope: request.scope.clone(),
                lifetime_secs: access_secs,
            })?,
        };

        let refresh_token = self.codec.mint(&MintRequest {
            kind: TokenKind::CellLocalRefresh,
            issuer: cell.url.clone(),
            subject,
            audience: cell.url.clone(),
            schema,
            roles: vec![],
            owner: false,
            scope: request.scope.clone(),
            lifetime_secs: refresh_secs,
        })?;

        Ok(self.response(
            access_token,
            access_secs,
            Some(refresh_token),
            Some(refresh_secs),
            request.p_target.clone(),
            history,
        ))
    }

    fn response(
        &self,
        access_token: String,
        expires_in: i64,
        refresh_token: Option<String>,
        refresh_token_expires_in: Option<i64>,
        p_target: Option<String>,
        history: Option<(AuthHistory, bool)>,
    ) -> TokenSetResponse {
        let (last_authenticated, failed_count) = match history {
            Some((h, true)) => (h.last_authenticated, Some(h.failed_count)),
            // Exempt accounts always report an empty history.
            Some((_, false)) => (None, Some(0)),
            None => (None, None),
        };
        TokenSetResponse {
            access_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in,
            refresh_token,
            refresh_token_expires_in,
            scope: None,
            p_target,
            last_authenticated,
            failed_count,
        }
    }

    async fn require_cell(&self, cell_url: &str) -> Result<Cell, BrokerError> {
        let url = self.codec.resolver().normalize(cell_url);
        self.directory
            .get_cell(&url)
            .await?
            .ok_or(BrokerError::AuthenticationFailed)
    }

    async fn is_history_exempt(&self, cell: &Cell, username: &str) -> Result<bool, BrokerError> {
        let exempt = self
            .directory
            .accounts_not_recording_auth_history(&cell.url)
            .await?;
        Ok(exempt.iter().any(|a| a == username))
    }

    fn access_lifetime(&self, request: &GrantRequest) -> Result<i64, BrokerError> {
        match request.expires_in.as_deref() {
            None => Ok(self.token_config.access_token_secs),
            Some(raw) => validate_expires_in(Some(raw)),
        }
    }

    fn refresh_lifetime(&self, request: &GrantRequest) -> Result<i64, BrokerError> {
        match request.refresh_token_expires_in.as_deref() {
            None => Ok(self.token_config.refresh_token_secs),
            Some(raw) => validate_refresh_expires_in(Some(raw)),
        }
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, BrokerError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(BrokerError::RequiredParamMissing(name.to_string())),
    }
}

fn resident_subject(cell_url: &str, account_name: &str) -> String {
    format!("{cell_url}#{account_name}")
}

/// Home cell of a principal subject URL (`{cell}#{account}` for
/// residents and visitors alike).
fn principal_home(subject: &str) -> String {
    match subject.rsplit_once('#') {
        Some((cell, _)) => cell.to_string(),
        None => subject.to_string(),
    }
}
