//! Credential verification seam.
//!
//! The trait exists so a deployment can plug in a different credential
//! backend (an external IdP bridge, an HSM) without touching the
//! issuer. The default backend checks the account's stored hash through
//! the [`HashRegistry`].
//!
//! Eligibility (account type, IP allow-list, status) is policy, not
//! cryptography, and lives here as plain functions the issuer calls in
//! a fixed order. Every eligibility failure maps to the same
//! authentication error as a wrong password.

use std::net::Ipv4Addr;

use async_trait::async_trait;

use crate::error::BrokerError;
use crate::models::{Account, AccountStatus};
use crate::utils::ip;
use crate::utils::password::{HashRegistry, Password};

/// Pluggable password check.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Whether `presented` matches the account's stored credential.
    async fn verify(&self, account: &Account, presented: &Password) -> bool;

    /// Spend the same work as a real verification. Called when no such
    /// account exists so response timing does not reveal which accounts
    /// are real.
    async fn burn(&self, presented: &Password);
}

/// Default backend over the stored-hash registry.
pub struct HashCredentialVerifier {
    registry: HashRegistry,
    /// Hash of a throwaway credential, verified against in `burn`.
    decoy_hash: String,
    decoy_algorithm: String,
}

impl HashCredentialVerifier {
    pub fn new(registry: HashRegistry) -> Result<Self, BrokerError> {
        let decoy_algorithm = registry.default_algorithm().to_string();
        let decoy_hash = registry.hash_default(&Password::new("decoy-credential"))?;
        Ok(Self {
            registry,
            decoy_hash,
            decoy_algorithm,
        })
    }

    pub fn registry(&self) -> &HashRegistry {
        &self.registry
    }
}

#[async_trait]
impl CredentialVerifier for HashCredentialVerifier {
    async fn verify(&self, account: &Account, presented: &Password) -> bool {
        self.registry
            .verify(&account.hash_algorithm, &account.credential_hash, presented)
    }

    async fn burn(&self, presented: &Password) {
        let _ = self
            .registry
            .verify(&self.decoy_algorithm, &self.decoy_hash, presented);
    }
}

/// Pre-password eligibility: the account must support the password
/// grant, and when it carries an IP allow-list the client address must
/// be present and inside it.
pub fn check_pre_password(
    account: &Account,
    client_ip: Option<Ipv4Addr>,
) -> Result<(), BrokerError> {
    if !account.supports_password() {
        return Err(BrokerError::AuthenticationFailed);
    }
    if let Some(range) = account.ip_address_range.as_deref() {
        if !range.trim().is_empty() {
            let Some(addr) = client_ip else {
                return Err(BrokerError::AuthenticationFailed);
            };
            if !ip::is_allowed(range, addr) {
                return Err(BrokerError::AuthenticationFailed);
            }
        }
    }
    Ok(())
}

/// Post-password status check. `PasswordChangeRequired` is not an
/// eligibility failure; the issuer turns it into a password-change-only
/// token.
pub fn check_status(account: &Account) -> Result<(), BrokerError> {
    match account.status {
        AccountStatus::Deactivated => Err(BrokerError::AuthenticationFailed),
        AccountStatus::Active | AccountStatus::PasswordChangeRequired => Ok(()),
    }
}
