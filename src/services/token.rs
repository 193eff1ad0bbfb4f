//! Token codec: mint, parse, and verify every token kind.
//!
//! All tokens are JWTs. Kinds whose issuer and audience live on the
//! same deployment are signed HS256 with the unit master secret.
//! Trans-cell kinds are signed RS256 with the unit's certificate chain
//! in the `x5c` header, so a foreign deployment can verify them against
//! its configured root CAs without any shared secret.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use x509_parser::pem::parse_x509_pem;

use crate::config::{ACCESS_TOKEN_EXPIRES_SECS, REFRESH_TOKEN_EXPIRES_SECS};
use crate::error::BrokerError;
use crate::services::trust::TrustStore;
use crate::utils::uri::{host_of, UnitUrlResolver};

/// String prefix carried by grant codes on the wire.
pub const GRANT_CODE_PREFIX: &str = "GC~";

/// Discriminant of the token union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    /// Password-change-only token issued to an account whose status
    /// requires a new password before normal access.
    #[serde(rename = "account_access")]
    AccountAccess,
    /// Generic same-cell access token minted from a refresh exchange
    /// when the principal kind is no longer distinguishable.
    #[serde(rename = "cell_local_access")]
    CellLocalAccess,
    #[serde(rename = "cell_local_refresh")]
    CellLocalRefresh,
    #[serde(rename = "trans_cell_access")]
    TransCellAccess,
    #[serde(rename = "trans_cell_refresh")]
    TransCellRefresh,
    /// Access token held by a foreign-cell principal inside this cell.
    #[serde(rename = "visitor_local_access")]
    VisitorLocalAccess,
    /// Access token held by one of this cell's own accounts.
    #[serde(rename = "resident_local_access")]
    ResidentLocalAccess,
    /// Unit-level token representing the cell owner.
    #[serde(rename = "unit_local_unit_user")]
    UnitLocalUnitUser,
    #[serde(rename = "grant_code")]
    GrantCode,
}

impl TokenKind {
    pub fn is_refresh(&self) -> bool {
        matches!(self, Self::CellLocalRefresh | Self::TransCellRefresh)
    }

    /// Trans-cell kinds cross deployments and must be RS256-signed.
    pub fn is_trans_cell(&self) -> bool {
        matches!(self, Self::TransCellAccess | Self::TransCellRefresh)
    }

    /// Kinds that grant access to resources (as opposed to refresh
    /// tokens, grant codes, and the password-change-only token).
    pub fn grants_resource_access(&self) -> bool {
        matches!(
            self,
            Self::CellLocalAccess
                | Self::TransCellAccess
                | Self::VisitorLocalAccess
                | Self::ResidentLocalAccess
                | Self::UnitLocalUnitUser
        )
    }
}

/// Claims carried by every token kind. Kind-specific payloads are
/// optional fields rather than separate structs so Parse stays a single
/// exhaustive path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuing cell root URL.
    pub iss: String,
    /// Principal URL: `{cell}#{account}` for residents, the foreign
    /// subject URL for visitors, the cell owner for unit tokens.
    pub sub: String,
    /// Cell root URL the token is addressed to.
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    /// Time-derived id, second resolution plus entropy. A refresh
    /// exchange always produces a fresh one.
    pub jti: String,
    pub knd: TokenKind,
    /// Client application cell URL, `#c` suffix when confidential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Role instance URLs resolved for the audience cell.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    /// Set when the token represents the cell owner at unit level.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub owner: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenClaims {
    pub fn lifetime_secs(&self) -> i64 {
        self.exp - self.iat
    }
}

/// Parameters for minting one token.
#[derive(Debug, Clone)]
pub struct MintRequest {
    pub kind: TokenKind,
    pub issuer: String,
    pub subject: String,
    pub audience: String,
    pub schema: Option<String>,
    pub roles: Vec<String>,
    pub owner: bool,
    pub scope: Option<String>,
    pub lifetime_secs: i64,
}

struct TransCellSigner {
    key: EncodingKey,
    /// Base64 DER, leaf first, as the `x5c` header wants it.
    x5c: Vec<String>,
}

/// Stateless mint/parse engine. Verification of trans-cell chains is
/// delegated to the [`TrustStore`].
pub struct TokenCodec {
    resolver: UnitUrlResolver,
    hs_encoding: EncodingKey,
    hs_decoding: DecodingKey,
    signer: Option<TransCellSigner>,
    trust: Option<Arc<TrustStore>>,
}

impl TokenCodec {
    pub fn new(resolver: UnitUrlResolver, master_secret: &str) -> Self {
        Self {
            hs_encoding: EncodingKey::from_secret(master_secret.as_bytes()),
            hs_decoding: DecodingKey::from_secret(master_secret.as_bytes()),
            resolver,
            signer: None,
            trust: None,
        }
    }

    /// Attach the RS256 signing key and its certificate chain (leaf
    /// first). Without this, minting trans-cell kinds fails.
    pub fn with_signing_pem(
        mut self,
        key_pem: &str,
        cert_chain_pem: &str,
    ) -> Result<Self, BrokerError> {
        let key = EncodingKey::from_rsa_pem(key_pem.as_bytes())
            .map_err(|e| BrokerError::TrustConfiguration(format!("signing key: {e}")))?;
        let mut x5c = Vec::new();
        let mut remaining = cert_chain_pem.as_bytes();
        while remaining.iter().any(|b| !b.is_ascii_whitespace()) {
            let (rest, pem) = parse_x509_pem(remaining)
                .map_err(|e| BrokerError::TrustConfiguration(format!("signing cert: {e}")))?;
            x5c.push(BASE64.encode(&pem.contents));
            remaining = rest;
        }
        if x5c.is_empty() {
            return Err(BrokerError::TrustConfiguration(
                "signing certificate chain is empty".to_string(),
            ));
        }
        self.signer = Some(TransCellSigner { key, x5c });
        Ok(self)
    }

    /// Attach the root CA set used to verify foreign trans-cell tokens.
    pub fn with_trust_store(mut self, trust: Arc<TrustStore>) -> Self {
        self.trust = Some(trust);
        self
    }

    pub fn resolver(&self) -> &UnitUrlResolver {
        &self.resolver
    }

    /// Mint a token. Local kinds go out HS256; trans-cell kinds RS256
    /// with the configured chain in `x5c`.
    pub fn mint(&self, req: &MintRequest) -> Result<String, BrokerError> {
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            iss: self.resolver.normalize(&req.issuer),
            sub: req.subject.clone(),
            aud: self.resolver.normalize(&req.audience),
            iat: now,
            exp: now + req.lifetime_secs,
            jti: new_token_id(now),
            knd: req.kind,
            schema: req.schema.clone(),
            roles: req.roles.clone(),
            owner: req.owner,
            scope: req.scope.clone(),
        };
        let jwt = if req.kind.is_trans_cell() {
            let signer = self.signer.as_ref().ok_or_else(|| {
                BrokerError::TrustConfiguration("no trans-cell signing key configured".to_string())
            })?;
            let mut header = Header::new(Algorithm::RS256);
            header.x5c = Some(signer.x5c.clone());
            encode(&header, &claims, &signer.key)
                .map_err(|e| BrokerError::Transient(anyhow::anyhow!("token signing: {e}")))?
        } else {
            encode(&Header::new(Algorithm::HS256), &claims, &self.hs_encoding)
                .map_err(|e| BrokerError::Transient(anyhow::anyhow!("token signing: {e}")))?
        };
        if req.kind == TokenKind::GrantCode {
            Ok(format!("{GRANT_CODE_PREFIX}{jwt}"))
        } else {
            Ok(jwt)
        }
    }

    /// Parse and verify a token addressed to `audience_cell`. Signature,
    /// expiry, kind/algorithm consistency, and audience are all checked
    /// here; anything beyond that (refresh-only, schema gating) is the
    /// caller's business.
    pub fn parse(&self, token: &str, audience_cell: &str) -> Result<TokenClaims, BrokerError> {
        let raw = token.strip_prefix(GRANT_CODE_PREFIX).unwrap_or(token);
        let header = decode_header(raw).map_err(|_| BrokerError::TokenParse)?;

        let claims = match header.alg {
            Algorithm::HS256 => self.decode_claims(raw, &self.hs_decoding, Algorithm::HS256)?,
            Algorithm::RS256 => self.parse_trans_cell(raw, &header)?,
            _ => return Err(BrokerError::TokenSignatureInvalid),
        };

        // A local kind arriving RS256 (or the reverse) means somebody
        // re-wrapped claims under the wrong key class.
        let expect_rs = claims.knd.is_trans_cell();
        if expect_rs != (header.alg == Algorithm::RS256) {
            return Err(BrokerError::TokenSignatureInvalid);
        }
        if token.starts_with(GRANT_CODE_PREFIX) != (claims.knd == TokenKind::GrantCode) {
            return Err(BrokerError::TokenParse);
        }

        if !self.resolver.urls_equal(&claims.aud, audience_cell) {
            return Err(BrokerError::TokenTargetWrong(claims.aud));
        }
        Ok(claims)
    }

    fn parse_trans_cell(
        &self,
        raw: &str,
        header: &Header,
    ) -> Result<TokenClaims, BrokerError> {
        let trust = self
            .trust
            .as_ref()
            .ok_or_else(|| BrokerError::TrustConfiguration("no root CAs configured".to_string()))?;
        let x5c = header.x5c.as_ref().ok_or(BrokerError::TokenSignatureInvalid)?;
        let chain: Vec<Vec<u8>> = x5c
            .iter()
            .map(|c| BASE64.decode(c))
            .collect::<Result<_, _>>()
            .map_err(|_| BrokerError::TokenSignatureInvalid)?;

        let leaf = trust.verify_chain(&chain, Utc::now().timestamp())?;
        let key = DecodingKey::from_rsa_der(&leaf.rsa_public_key_der);
        let claims = self.decode_claims(raw, &key, Algorithm::RS256)?;

        // The certificate must belong to the deployment that claims to
        // have issued the token.
        let issuer_host = host_of(&self.resolver.to_http(&claims.iss));
        if issuer_host.is_none() || issuer_host != leaf.subject_common_name {
            return Err(BrokerError::TokenSignatureInvalid);
        }
        Ok(claims)
    }

    fn decode_claims(
        &self,
        raw: &str,
        key: &DecodingKey,
        alg: Algorithm,
    ) -> Result<TokenClaims, BrokerError> {
        let mut validation = Validation::new(alg);
        validation.leeway = 0;
        validation.validate_aud = false;
        decode::<TokenClaims>(raw, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => BrokerError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    BrokerError::TokenSignatureInvalid
                }
                _ => BrokerError::TokenParse,
            })
    }
}

/// Time-derived token id. Two refreshes in different seconds always
/// differ in the leading component; the entropy tail covers same-second
/// exchanges.
pub fn new_token_id(now_epoch: i64) -> String {
    format!("{:x}-{}", now_epoch, Uuid::new_v4().simple())
}

/// Validate an `expires_in` override. Bounds are inclusive and an
/// out-of-range or non-numeric value is a client error, never clamped.
pub fn validate_expires_in(raw: Option<&str>) -> Result<i64, BrokerError> {
    bounded_lifetime(raw, "expires_in", ACCESS_TOKEN_EXPIRES_SECS)
}

/// Validate a `refresh_token_expires_in` override.
pub fn validate_refresh_expires_in(raw: Option<&str>) -> Result<i64, BrokerError> {
    bounded_lifetime(raw, "refresh_token_expires_in", REFRESH_TOKEN_EXPIRES_SECS)
}

fn bounded_lifetime(raw: Option<&str>, name: &str, max: i64) -> Result<i64, BrokerError> {
    match raw {
        None => Ok(max),
        Some(v) => {
            let secs: i64 = v
                .parse()
                .map_err(|_| BrokerError::RequiredParamMissing(name.to_string()))?;
            if (1..=max).contains(&secs) {
                Ok(secs)
            } else {
                Err(BrokerError::RequiredParamMissing(name.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT_KEY_PEM: &str = include_str!("../../tests/fixtures/unit_key.pem");
    const UNIT_CERT_PEM: &str = include_str!("../../tests/fixtures/unit.pem");
    const WRONGCN_KEY_PEM: &str = include_str!("../../tests/fixtures/wrongcn_key.pem");
    const WRONGCN_CERT_PEM: &str = include_str!("../../tests/fixtures/wrongcn.pem");
    const ROOT_PEM: &str = include_str!("../../tests/fixtures/root.pem");

    const CELL1: &str = "https://unit.example/cell1/";
    const CELL2: &str = "https://unit.example/cell2/";

    fn codec() -> TokenCodec {
        let trust = TrustStore::from_pem_documents(&[ROOT_PEM.to_string()]).unwrap();
        TokenCodec::new(
            UnitUrlResolver::new("https://unit.example/"),
            "unit-master-secret",
        )
        .with_signing_pem(UNIT_KEY_PEM, UNIT_CERT_PEM)
        .unwrap()
        .with_trust_store(Arc::new(trust))
    }

    fn mint_request(kind: TokenKind, audience: &str) -> MintRequest {
        MintRequest {
            kind,
            issuer: CELL1.to_string(),
            subject: format!("{CELL1}#account1"),
            audience: audience.to_string(),
            schema: None,
            roles: vec![],
            owner: false,
            scope: None,
            lifetime_secs: 3600,
        }
    }

    #[test]
    fn local_token_round_trip() {
        let codec = codec();
        let token = codec
            .mint(&mint_request(TokenKind::ResidentLocalAccess, CELL1))
            .unwrap();
        let claims = codec.parse(&token, CELL1).unwrap();

        assert_eq!(claims.knd, TokenKind::ResidentLocalAccess);
        assert_eq!(claims.iss, CELL1);
        assert_eq!(claims.sub, format!("{CELL1}#account1"));
        assert_eq!(claims.lifetime_secs(), 3600);
    }

    #[test]
    fn local_token_fails_under_other_secret() {
        let token = codec()
            .mint(&mint_request(TokenKind::ResidentLocalAccess, CELL1))
            .unwrap();
        let other = TokenCodec::new(
            UnitUrlResolver::new("https://unit.example/"),
            "a-different-secret",
        );
        let err = other.parse(&token, CELL1).unwrap_err();
        assert!(matches!(err, BrokerError::TokenSignatureInvalid));
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = codec();
        let mut req = mint_request(TokenKind::ResidentLocalAccess, CELL1);
        req.lifetime_secs = -10;
        let token = codec.mint(&req).unwrap();
        let err = codec.parse(&token, CELL1).unwrap_err();
        assert!(matches!(err, BrokerError::TokenExpired));
    }

    #[test]
    fn audience_mismatch_is_rejected() {
        let codec = codec();
        let token = codec
            .mint(&mint_request(TokenKind::ResidentLocalAccess, CELL1))
            .unwrap();
        let err = codec.parse(&token, CELL2).unwrap_err();
        assert!(matches!(err, BrokerError::TokenTargetWrong(aud) if aud == CELL1));
    }

    #[test]
    fn audience_accepts_localunit_spelling() {
        let codec = codec();
        let token = codec
            .mint(&mint_request(TokenKind::ResidentLocalAccess, CELL1))
            .unwrap();
        assert!(codec.parse(&token, "personium-localunit:/cell1/").is_ok());
    }

    #[test]
    fn trans_cell_token_round_trip() {
        let codec = codec();
        let mut req = mint_request(TokenKind::TransCellAccess, CELL2);
        req.roles = vec![format!("{CELL1}__role/__/friend")];
        let token = codec.mint(&req).unwrap();

        let claims = codec.parse(&token, CELL2).unwrap();
        assert_eq!(claims.knd, TokenKind::TransCellAccess);
        assert_eq!(claims.roles, vec![format!("{CELL1}__role/__/friend")]);
    }

    #[test]
    fn trans_cell_cn_must_match_issuer_host() {
        let trust = TrustStore::from_pem_documents(&[ROOT_PEM.to_string()]).unwrap();
        // wrongcn.pem chains to the trusted root but carries
        // CN=other.example, which no cell under unit.example may use.
        let codec = TokenCodec::new(
            UnitUrlResolver::new("https://unit.example/"),
            "unit-master-secret",
        )
        .with_signing_pem(WRONGCN_KEY_PEM, WRONGCN_CERT_PEM)
        .unwrap()
        .with_trust_store(Arc::new(trust));

        let token = codec
            .mint(&mint_request(TokenKind::TransCellAccess, CELL2))
            .unwrap();
        let err = codec.parse(&token, CELL2).unwrap_err();
        assert!(matches!(err, BrokerError::TokenSignatureInvalid));
    }

    #[test]
    fn local_claims_rewrapped_as_rs256_are_rejected() {
        // A resident kind must never arrive under the asymmetric
        // signature path, even with a fully valid chain.
        let codec = codec();
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            iss: CELL1.to_string(),
            sub: format!("{CELL1}#account1"),
            aud: CELL1.to_string(),
            iat: now,
            exp: now + 3600,
            jti: new_token_id(now),
            knd: TokenKind::ResidentLocalAccess,
            schema: None,
            roles: vec![],
            owner: false,
            scope: None,
        };
        let mut header = Header::new(Algorithm::RS256);
        let (_, pem) = parse_x509_pem(UNIT_CERT_PEM.as_bytes()).unwrap();
        header.x5c = Some(vec![BASE64.encode(&pem.contents)]);
        let key = EncodingKey::from_rsa_pem(UNIT_KEY_PEM.as_bytes()).unwrap();
        let token = encode(&header, &claims, &key).unwrap();

        let err = codec.parse(&token, CELL1).unwrap_err();
        assert!(matches!(err, BrokerError::TokenSignatureInvalid));
    }

    #[test]
    fn grant_code_carries_prefix_and_round_trips() {
        let codec = codec();
        let token = codec
            .mint(&mint_request(TokenKind::GrantCode, CELL1))
            .unwrap();
        assert!(token.starts_with(GRANT_CODE_PREFIX));

        let claims = codec.parse(&token, CELL1).unwrap();
        assert_eq!(claims.knd, TokenKind::GrantCode);
    }

    #[test]
    fn stripped_grant_code_prefix_is_rejected() {
        let codec = codec();
        let token = codec
            .mint(&mint_request(TokenKind::GrantCode, CELL1))
            .unwrap();
        let bare = token.strip_prefix(GRANT_CODE_PREFIX).unwrap();
        assert!(codec.parse(bare, CELL1).is_err());
    }

    #[test]
    fn expires_in_bounds_are_enforced_not_clamped() {
        assert_eq!(validate_expires_in(None).unwrap(), 3600);
        assert_eq!(validate_expires_in(Some("1")).unwrap(), 1);
        assert_eq!(validate_expires_in(Some("3600")).unwrap(), 3600);
        assert!(validate_expires_in(Some("0")).is_err());
        assert!(validate_expires_in(Some("3601")).is_err());
        assert!(validate_expires_in(Some("abc")).is_err());
        assert!(validate_expires_in(Some("-5")).is_err());

        assert_eq!(validate_refresh_expires_in(None).unwrap(), 86400);
        assert!(validate_refresh_expires_in(Some("86401")).is_err());
    }

    #[test]
    fn token_ids_differ_across_seconds_and_within_one() {
        let a = new_token_id(1_700_000_000);
        let b = new_token_id(1_700_000_001);
        let c = new_token_id(1_700_000_001);
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert!(b.starts_with(&format!("{:x}-", 1_700_000_001)));
    }
}
