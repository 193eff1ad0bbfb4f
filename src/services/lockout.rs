//! Account lockout and authentication rate limiting.
//!
//! Two guards layer in front of the credential check. The interval
//! guard rejects any attempt made sooner than `valid_authn_interval`
//! after the previous one, regardless of credential correctness, and
//! without consuming a failure-count slot. The count-based lock engages
//! after `lock_count` consecutive failures and releases lazily once
//! `lock_time` has elapsed; nothing runs on a timer, expiry is decided
//! by comparing `now` to the stored timestamp on the next attempt.
//!
//! Refresh exchanges never touch this module: a refresh token is not a
//! credential attempt.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tracing::debug;

use crate::config::LockoutConfig;
use crate::error::BrokerError;

/// Mutable per-account authentication state, held in the shared store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountAuthState {
    /// When the previous attempt (of any outcome) was made. Arms the
    /// interval guard.
    pub last_attempt_at: Option<i64>,
    /// Consecutive failures since the previous success. Survives lock
    /// expiry; only a success resets it.
    pub failed_count: u32,
    /// When the count-based lock engaged, if it has.
    pub locked_at: Option<i64>,
    /// Previous successful authentication, epoch seconds.
    pub last_authenticated: Option<i64>,
}

/// What a successful authentication reports back to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthHistory {
    pub last_authenticated: Option<i64>,
    pub failed_count: u32,
}

/// Shared counter/lock storage. The guard owns the policy; this trait
/// owns the storage primitive. `try_acquire` grants an exclusive slot
/// per key so concurrent attempts against one account serialize instead
/// of racing to the same post-increment value.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Take the per-key slot. `false` means another request holds it.
    async fn try_acquire(&self, key: &str) -> Result<bool, BrokerError>;

    async fn release(&self, key: &str) -> Result<(), BrokerError>;

    async fn read(&self, key: &str) -> Result<AccountAuthState, BrokerError>;

    async fn write(&self, key: &str, state: AccountAuthState) -> Result<(), BrokerError>;
}

/// In-process store. A deployment spanning several nodes would back
/// this trait with its shared counter service instead.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    states: DashMap<String, AccountAuthState>,
    slots: DashSet<String>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn try_acquire(&self, key: &str) -> Result<bool, BrokerError> {
        Ok(self.slots.insert(key.to_string()))
    }

    async fn release(&self, key: &str) -> Result<(), BrokerError> {
        self.slots.remove(key);
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<AccountAuthState, BrokerError> {
        Ok(self.states.get(key).map(|s| s.clone()).unwrap_or_default())
    }

    async fn write(&self, key: &str, state: AccountAuthState) -> Result<(), BrokerError> {
        self.states.insert(key.to_string(), state);
        Ok(())
    }
}

/// Lockout policy over a [`LockStore`].
pub struct LockoutGuard {
    store: Arc<dyn LockStore>,
    config: LockoutConfig,
}

impl LockoutGuard {
    pub fn new(store: Arc<dyn LockStore>, config: LockoutConfig) -> Self {
        Self { store, config }
    }

    /// Admission check, run before the credential is even looked at.
    /// Both rejections re-arm the interval guard but never advance the
    /// failure counter.
    pub async fn admit(
        &self,
        cell_url: &str,
        account_name: &str,
        now: i64,
    ) -> Result<(), BrokerError> {
        let key = state_key(cell_url, account_name);
        self.acquire(&key).await?;
        let mut state = match self.store.read(&key).await {
            Ok(s) => s,
            Err(e) => {
                self.store.release(&key).await?;
                return Err(e);
            }
        };

        let verdict = if self.interval_active(&state, now) {
            debug!(account = %account_name, "authentication attempted inside the valid interval");
            Err(BrokerError::TooFrequent)
        } else if self.lock_active(&state, now) {
            debug!(account = %account_name, "authentication attempted against a locked account");
            Err(BrokerError::AccountLocked)
        } else {
            Ok(())
        };

        if verdict.is_err() {
            state.last_attempt_at = Some(now);
            self.store.write(&key, state).await?;
        }
        self.store.release(&key).await?;
        verdict
    }

    /// Record a failed credential check. For history-exempt accounts
    /// only the interval guard is re-armed; the counter never moves and
    /// the account can never lock.
    pub async fn record_failure(
        &self,
        cell_url: &str,
        account_name: &str,
        track_history: bool,
        now: i64,
    ) -> Result<(), BrokerError> {
        let key = state_key(cell_url, account_name);
        self.acquire(&key).await?;
        let mut state = match self.store.read(&key).await {
            Ok(s) => s,
            Err(e) => {
                self.store.release(&key).await?;
                return Err(e);
            }
        };

        state.last_attempt_at = Some(now);
        if track_history {
            state.failed_count += 1;
            if self.config.lock_count > 0 && state.failed_count >= self.config.lock_count {
                state.locked_at = Some(now);
                debug!(
                    account = %account_name,
                    failed_count = state.failed_count,
                    "account lock engaged"
                );
            }
        }
        self.store.write(&key, state).await?;
        self.store.release(&key).await?;
        Ok(())
    }

    /// Record a successful credential check and report the history the
    /// response carries. A success while the lock is still active is
    /// refused; admission should have caught it, but success must not
    /// leak through a race either.
    pub async fn record_success(
        &self,
        cell_url: &str,
        account_name: &str,
        track_history: bool,
        now: i64,
    ) -> Result<AuthHistory, BrokerError> {
        let key = state_key(cell_url, account_name);
        self.acquire(&key).await?;
        let mut state = match self.store.read(&key).await {
            Ok(s) => s,
            Err(e) => {
                self.store.release(&key).await?;
                return Err(e);
            }
        };

        if self.lock_active(&state, now) {
            state.last_attempt_at = Some(now);
            self.store.write(&key, state).await?;
            self.store.release(&key).await?;
            return Err(BrokerError::AccountLocked);
        }

        let history = if track_history {
            AuthHistory {
                last_authenticated: state.last_authenticated,
                failed_count: state.failed_count,
            }
        } else {
            AuthHistory::default()
        };

        state.last_attempt_at = Some(now);
        state.failed_count = 0;
        state.locked_at = None;
        if track_history {
            state.last_authenticated = Some(now);
        }
        self.store.write(&key, state).await?;
        self.store.release(&key).await?;
        Ok(history)
    }

    async fn acquire(&self, key: &str) -> Result<(), BrokerError> {
        if self.store.try_acquire(key).await? {
            Ok(())
        } else {
            // The attempt was not counted; the caller retries rather
            // than dropping it.
            Err(BrokerError::Transient(anyhow::anyhow!(
                "authentication slot busy, retry"
            )))
        }
    }

    fn interval_active(&self, state: &AccountAuthState, now: i64) -> bool {
        if self.config.valid_authn_interval_secs <= 0 {
            return false;
        }
        match state.last_attempt_at {
            Some(at) => now < at + self.config.valid_authn_interval_secs,
            None => false,
        }
    }

    fn lock_active(&self, state: &AccountAuthState, now: i64) -> bool {
        if self.config.lock_count == 0 {
            return false;
        }
        match state.locked_at {
            Some(at) => now < at + self.config.lock_time_secs,
            None => false,
        }
    }
}

fn state_key(cell_url: &str, account_name: &str) -> String {
    format!("{cell_url}#{account_name}")
}
