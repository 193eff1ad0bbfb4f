use serde::{Deserialize, Serialize};

/// Account status values carried by the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccountStatus {
    Active,
    Deactivated,
    PasswordChangeRequired,
}

/// Credential types an account supports. `Basic` is password-capable;
/// `Oidc` accounts authenticate only through an external IdP and must
/// not pass the password grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    #[serde(rename = "basic")]
    Basic,
    #[serde(rename = "oidc:google")]
    Oidc,
}

/// An account as read from the directory. Lockout bookkeeping lives in
/// the lock store, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub status: AccountStatus,
    pub types: Vec<AccountType>,
    /// Stored credential hash in the registry's string format.
    pub credential_hash: String,
    /// Tag naming the algorithm that produced `credential_hash`.
    pub hash_algorithm: String,
    /// Comma-separated single addresses and/or CIDR ranges. Empty or
    /// absent means no restriction.
    pub ip_address_range: Option<String>,
}

impl Account {
    pub fn password_change_required(&self) -> bool {
        self.status == AccountStatus::PasswordChangeRequired
    }

    pub fn supports_password(&self) -> bool {
        self.types.contains(&AccountType::Basic)
    }
}
