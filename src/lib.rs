//! Multi-tenant identity and access broker.
//!
//! Each cell (tenant) issues, verifies, and federates signed tokens
//! proving a principal's identity and the roles it holds, with every
//! credential attempt gated by a lockout and rate-limit policy. The
//! HTTP transport and the tenant directory are external collaborators;
//! this crate is the policy and cryptography core between them.

pub mod config;
pub mod dtos;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{BrokerConfig, LockoutConfig, TokenConfig};
pub use error::BrokerError;
pub use services::credential::{CredentialVerifier, HashCredentialVerifier};
pub use services::directory::{Directory, MemoryDirectory};
pub use services::issuer::TokenIssuer;
pub use services::lockout::{LockStore, LockoutGuard, MemoryLockStore};
pub use services::resolver::RoleResolver;
pub use services::schema_gate::SchemaGate;
pub use services::token::{TokenClaims, TokenCodec, TokenKind};
pub use services::trust::TrustStore;
