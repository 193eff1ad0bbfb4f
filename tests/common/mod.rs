#![allow(dead_code)]

use std::sync::Arc;

use cell_broker::config::TokenConfig;
use cell_broker::models::{Account, AccountStatus, AccountType, Cell, RoleRef};
use cell_broker::services::credential::HashCredentialVerifier;
use cell_broker::services::directory::MemoryDirectory;
use cell_broker::services::lockout::{LockoutGuard, MemoryLockStore};
use cell_broker::services::token::TokenCodec;
use cell_broker::services::trust::TrustStore;
use cell_broker::utils::password::{HashRegistry, Password, ALGORITHM_SHA256};
use cell_broker::utils::uri::UnitUrlResolver;
use cell_broker::{LockoutConfig, TokenIssuer};

pub const UNIT: &str = "https://unit.example/";
pub const CELL1: &str = "https://unit.example/testcell1/";
pub const CELL2: &str = "https://unit.example/testcell2/";
pub const APP_CELL: &str = "https://unit.example/appcell/";

pub const UNIT_KEY_PEM: &str = include_str!("../fixtures/unit_key.pem");
pub const UNIT_CERT_PEM: &str = include_str!("../fixtures/unit.pem");
pub const ROOT_PEM: &str = include_str!("../fixtures/root.pem");

pub struct TestBroker {
    pub directory: Arc<MemoryDirectory>,
    pub issuer: TokenIssuer,
    /// Codec configured identically to the issuer's, for assertions on
    /// issued tokens and for minting foreign inputs.
    pub codec: TokenCodec,
}

pub fn codec() -> TokenCodec {
    let trust = TrustStore::from_pem_documents(&[ROOT_PEM.to_string()]).unwrap();
    TokenCodec::new(UnitUrlResolver::new(UNIT), "test-master-secret")
        .with_signing_pem(UNIT_KEY_PEM, UNIT_CERT_PEM)
        .unwrap()
        .with_trust_store(Arc::new(trust))
}

pub fn account(registry: &HashRegistry, name: &str, password: &str) -> Account {
    Account {
        id: format!("id-{name}"),
        name: name.to_string(),
        status: AccountStatus::Active,
        types: vec![AccountType::Basic],
        credential_hash: registry
            .hash(ALGORITHM_SHA256, &Password::new(password))
            .unwrap(),
        hash_algorithm: ALGORITHM_SHA256.to_string(),
        ip_address_range: None,
    }
}

/// Two cells plus an application cell. `account1`/`password1` lives in
/// testcell1 and holds the unscoped `staff` role there.
pub fn broker(lockout: LockoutConfig) -> TestBroker {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let registry = HashRegistry::default();
    let directory = Arc::new(MemoryDirectory::new());

    directory.add_cell(Cell {
        url: CELL1.to_string(),
        name: "testcell1".to_string(),
        owner: Some("https://owner.example/#me".to_string()),
    });
    directory.add_cell(Cell {
        url: CELL2.to_string(),
        name: "testcell2".to_string(),
        owner: None,
    });
    directory.add_cell(Cell {
        url: APP_CELL.to_string(),
        name: "appcell".to_string(),
        owner: None,
    });

    directory.add_account(CELL1, account(&registry, "account1", "password1"));
    directory.link_account_role(CELL1, "account1", RoleRef::unscoped("staff"));

    let issuer = TokenIssuer::new(
        directory.clone(),
        codec(),
        LockoutGuard::new(Arc::new(MemoryLockStore::new()), lockout),
        Arc::new(HashCredentialVerifier::new(registry).unwrap()),
        TokenConfig::default(),
    );

    TestBroker {
        directory,
        issuer,
        codec: codec(),
    }
}

pub fn no_lockout() -> LockoutConfig {
    LockoutConfig {
        lock_count: 0,
        lock_time_secs: 0,
        valid_authn_interval_secs: 0,
    }
}
