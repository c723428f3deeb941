//! IP access policy and login-failure lockout.
//!
//! # Responsibilities
//! - Allow/deny lists with independent enable flags
//! - Per-IP failure history trimmed to the failure window
//! - Temporary lockout once the failure threshold is reached
//! - Persist lists and settings on every administrative change
//!
//! Locks expire lazily: the first `is_locked` after the unlock time clears
//! both the lock and the failure history.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::{self, ceil_secs};
use crate::config::schema::GuardSettings;
use crate::error::PersistError;
use crate::observability::metrics;
use crate::persist;
use crate::security::keys::{lockout_key, normalize_ip};

const SWEEP_INTERVAL_MS: u64 = 5 * 60 * 1000;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("not a valid IP address: {0:?}")]
    InvalidIp(String),

    #[error("invalid setting {field}: {message}")]
    InvalidSetting { field: &'static str, message: String },

    /// The change was applied in memory but could not be saved.
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    DenyListed,
    NotAllowListed,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::DenyListed => "ip is deny-listed",
            DenyReason::NotAllowListed => "ip is not on the allow list",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
}

/// Result of recording a failed login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FailureOutcome {
    /// Threshold reached; the address is locked for `lockout_secs`.
    Locked { lockout_secs: u64 },
    /// Still below the threshold.
    Counted { failures: u32, remaining_attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockStatus {
    pub locked: bool,
    pub remaining_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockedIp {
    pub ip: String,
    pub remaining_secs: u64,
    pub failures: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuardStats {
    pub allow_list_count: usize,
    pub deny_list_count: usize,
    pub locked_ips: usize,
    pub tracked_failure_ips: usize,
    pub settings: GuardSettings,
}

/// Partial update of [`GuardSettings`]; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SettingsPatch {
    pub enable_allow_list: Option<bool>,
    pub enable_deny_list: Option<bool>,
    pub max_failures: Option<u32>,
    pub failure_window_secs: Option<u64>,
    pub lockout_duration_secs: Option<u64>,
    pub csrf_enabled: Option<bool>,
    pub csrf_lifetime_secs: Option<u64>,
}

impl From<&GuardSettings> for SettingsPatch {
    fn from(settings: &GuardSettings) -> Self {
        Self {
            enable_allow_list: Some(settings.enable_allow_list),
            enable_deny_list: Some(settings.enable_deny_list),
            max_failures: Some(settings.max_failures),
            failure_window_secs: Some(settings.failure_window_secs),
            lockout_duration_secs: Some(settings.lockout_duration_secs),
            csrf_enabled: Some(settings.csrf_enabled),
            csrf_lifetime_secs: Some(settings.csrf_lifetime_secs),
        }
    }
}

impl SettingsPatch {
    fn apply(&self, settings: &mut GuardSettings) -> Result<(), GuardError> {
        fn positive<T: PartialEq + Default + Copy>(
            field: &'static str,
            value: Option<T>,
        ) -> Result<Option<T>, GuardError> {
            match value {
                Some(v) if v == T::default() => Err(GuardError::InvalidSetting {
                    field,
                    message: "must be greater than zero".into(),
                }),
                other => Ok(other),
            }
        }

        let max_failures = positive("max_failures", self.max_failures)?;
        let failure_window = positive("failure_window_secs", self.failure_window_secs)?;
        let lockout = positive("lockout_duration_secs", self.lockout_duration_secs)?;
        let csrf_lifetime = positive("csrf_lifetime_secs", self.csrf_lifetime_secs)?;

        if let Some(v) = self.enable_allow_list {
            settings.enable_allow_list = v;
        }
        if let Some(v) = self.enable_deny_list {
            settings.enable_deny_list = v;
        }
        if let Some(v) = max_failures {
            settings.max_failures = v;
        }
        if let Some(v) = failure_window {
            settings.failure_window_secs = v;
        }
        if let Some(v) = lockout {
            settings.lockout_duration_secs = v;
        }
        if let Some(v) = self.csrf_enabled {
            settings.csrf_enabled = v;
        }
        if let Some(v) = csrf_lifetime {
            settings.csrf_lifetime_secs = v;
        }
        Ok(())
    }
}

/// On-disk document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardSnapshot {
    pub config: GuardSettings,
    pub allow_list: Vec<String>,
    pub deny_list: Vec<String>,
}

#[derive(Debug, Default)]
struct Policy {
    settings: GuardSettings,
    allow: BTreeSet<String>,
    deny: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct LockoutRecord {
    failures: VecDeque<u64>,
    unlock_at_ms: Option<u64>,
}

/// IP policy plus brute-force lockout.
pub struct IntrusionGuard {
    policy: RwLock<Policy>,
    lockouts: Mutex<HashMap<String, LockoutRecord>>,
    path: Option<PathBuf>,
    persist_lock: Mutex<()>,
    last_sweep_ms: AtomicU64,
}

impl IntrusionGuard {
    /// In-memory guard with the given settings and empty lists.
    pub fn new(settings: GuardSettings, path: Option<PathBuf>) -> Self {
        Self {
            policy: RwLock::new(Policy {
                settings,
                ..Policy::default()
            }),
            lockouts: Mutex::new(HashMap::new()),
            path,
            persist_lock: Mutex::new(()),
            last_sweep_ms: AtomicU64::new(0),
        }
    }

    /// Restore lists and settings from `path`, falling back to `defaults`.
    ///
    /// A missing or unreadable snapshot is logged and never fatal.
    pub fn load(path: Option<PathBuf>, defaults: GuardSettings) -> Self {
        let guard = Self::new(defaults, path);
        let Some(path) = guard.path.as_deref() else {
            return guard;
        };

        match persist::read_snapshot::<GuardSnapshot>(path) {
            Ok(Some(snapshot)) => {
                let mut policy = guard.write_policy();
                let mut settings = policy.settings.clone();
                match SettingsPatch::from(&snapshot.config).apply(&mut settings) {
                    Ok(()) => policy.settings = settings,
                    Err(e) => tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Ignoring invalid settings in security snapshot, using configured defaults"
                    ),
                }
                policy.allow = canonical_set(snapshot.allow_list, "allow_list");
                policy.deny = canonical_set(snapshot.deny_list, "deny_list");
                tracing::info!(
                    path = %path.display(),
                    allow = policy.allow.len(),
                    deny = policy.deny.len(),
                    "Loaded security policy"
                );
            }
            Ok(None) => {
                tracing::info!(path = %path.display(), "No security snapshot, using configured defaults");
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to load security snapshot, using configured defaults");
            }
        }
        guard
    }

    fn read_policy(&self) -> std::sync::RwLockReadGuard<'_, Policy> {
        self.policy.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_policy(&self) -> std::sync::RwLockWriteGuard<'_, Policy> {
        self.policy.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lockouts(&self) -> MutexGuard<'_, HashMap<String, LockoutRecord>> {
        self.lockouts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply the deny list, then the allow list.
    pub fn is_allowed(&self, ip: &str) -> AccessDecision {
        let key = normalize_ip(ip);
        let policy = self.read_policy();
        let listed = |set: &BTreeSet<String>| key.as_ref().is_some_and(|k| set.contains(k));

        let reason = if policy.settings.enable_deny_list && listed(&policy.deny) {
            Some(DenyReason::DenyListed)
        } else if policy.settings.enable_allow_list && !listed(&policy.allow) {
            Some(DenyReason::NotAllowListed)
        } else {
            None
        };

        if let Some(reason) = reason {
            tracing::warn!(ip = %ip, reason = reason.as_str(), "Request from blocked address");
        }
        AccessDecision {
            allowed: reason.is_none(),
            reason,
        }
    }

    pub fn record_failure(&self, ip: &str) -> FailureOutcome {
        self.record_failure_at(ip, clock::now_millis())
    }

    pub fn record_failure_at(&self, ip: &str, now_ms: u64) -> FailureOutcome {
        let (max_failures, window_ms, lockout_ms) = {
            let s = &self.read_policy().settings;
            (
                s.max_failures,
                s.failure_window_secs.saturating_mul(1000),
                s.lockout_duration_secs.saturating_mul(1000),
            )
        };

        self.maybe_sweep(now_ms);

        let key = lockout_key(ip);
        let mut lockouts = self.lockouts();
        let record = lockouts.entry(key.clone()).or_default();

        let cutoff = now_ms.saturating_sub(window_ms);
        while record.failures.front().is_some_and(|&ts| ts < cutoff) {
            record.failures.pop_front();
        }
        record.failures.push_back(now_ms);

        let failures = u32::try_from(record.failures.len()).unwrap_or(u32::MAX);
        if failures >= max_failures {
            record.unlock_at_ms = Some(now_ms.saturating_add(lockout_ms));
            drop(lockouts);
            let lockout_secs = ceil_secs(lockout_ms);
            tracing::warn!(ip = %key, failures, lockout_secs, "Address locked after repeated login failures");
            metrics::record_lockout();
            FailureOutcome::Locked { lockout_secs }
        } else {
            tracing::info!(ip = %key, failures, "Login failure recorded");
            FailureOutcome::Counted {
                failures,
                remaining_attempts: max_failures - failures,
            }
        }
    }

    pub fn is_locked(&self, ip: &str) -> LockStatus {
        self.is_locked_at(ip, clock::now_millis())
    }

    pub fn is_locked_at(&self, ip: &str, now_ms: u64) -> LockStatus {
        let key = lockout_key(ip);
        let mut lockouts = self.lockouts();
        let Some(unlock_at) = lockouts.get(&key).and_then(|r| r.unlock_at_ms) else {
            return LockStatus {
                locked: false,
                remaining_secs: 0,
            };
        };

        if unlock_at > now_ms {
            LockStatus {
                locked: true,
                remaining_secs: ceil_secs(unlock_at - now_ms),
            }
        } else {
            lockouts.remove(&key);
            tracing::info!(ip = %key, "Lockout expired");
            LockStatus {
                locked: false,
                remaining_secs: 0,
            }
        }
    }

    /// Forget failures and any lock for `ip`. Returns whether anything was tracked.
    pub fn clear_failures(&self, ip: &str) -> bool {
        self.lockouts().remove(&lockout_key(ip)).is_some()
    }

    /// Currently locked addresses, longest remaining lock first.
    pub fn locked(&self) -> Vec<LockedIp> {
        self.locked_at(clock::now_millis())
    }

    pub fn locked_at(&self, now_ms: u64) -> Vec<LockedIp> {
        let mut out: Vec<LockedIp> = self
            .lockouts()
            .iter()
            .filter_map(|(ip, record)| {
                let unlock_at = record.unlock_at_ms.filter(|&t| t > now_ms)?;
                Some(LockedIp {
                    ip: ip.clone(),
                    remaining_secs: ceil_secs(unlock_at - now_ms),
                    failures: record.failures.len(),
                })
            })
            .collect();
        out.sort_by(|a, b| b.remaining_secs.cmp(&a.remaining_secs).then_with(|| a.ip.cmp(&b.ip)));
        out
    }

    fn maybe_sweep(&self, now_ms: u64) {
        let last = self.last_sweep_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) >= SWEEP_INTERVAL_MS
            && self
                .last_sweep_ms
                .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
        {
            self.sweep_at(now_ms);
        }
    }

    /// Remove records whose lock has lapsed and whose failures left the window.
    pub fn sweep_at(&self, now_ms: u64) -> usize {
        let window_ms = self.read_policy().settings.failure_window_secs.saturating_mul(1000);
        let cutoff = now_ms.saturating_sub(window_ms);
        let mut lockouts = self.lockouts();
        let before = lockouts.len();
        lockouts.retain(|_, record| {
            if record.unlock_at_ms.is_some_and(|t| t > now_ms) {
                return true;
            }
            record.unlock_at_ms = None;
            while record.failures.front().is_some_and(|&ts| ts < cutoff) {
                record.failures.pop_front();
            }
            !record.failures.is_empty()
        });
        before - lockouts.len()
    }

    pub fn allow(&self, ip: &str) -> Result<bool, GuardError> {
        self.mutate_list(ip, |p, k| p.allow.insert(k))
    }

    pub fn disallow(&self, ip: &str) -> Result<bool, GuardError> {
        self.mutate_list(ip, |p, k| p.allow.remove(&k))
    }

    pub fn deny(&self, ip: &str) -> Result<bool, GuardError> {
        self.mutate_list(ip, |p, k| p.deny.insert(k))
    }

    pub fn undeny(&self, ip: &str) -> Result<bool, GuardError> {
        self.mutate_list(ip, |p, k| p.deny.remove(&k))
    }

    fn mutate_list(
        &self,
        ip: &str,
        op: impl FnOnce(&mut Policy, String) -> bool,
    ) -> Result<bool, GuardError> {
        let key = normalize_ip(ip).ok_or_else(|| GuardError::InvalidIp(ip.to_owned()))?;
        let changed = op(&mut self.write_policy(), key);
        if changed {
            self.save()?;
        }
        Ok(changed)
    }

    pub fn allow_list(&self) -> Vec<String> {
        self.read_policy().allow.iter().cloned().collect()
    }

    pub fn deny_list(&self) -> Vec<String> {
        self.read_policy().deny.iter().cloned().collect()
    }

    pub fn settings(&self) -> GuardSettings {
        self.read_policy().settings.clone()
    }

    /// Validate and apply `patch`, then persist. Returns the new settings.
    pub fn update_settings(&self, patch: &SettingsPatch) -> Result<GuardSettings, GuardError> {
        let updated = {
            let mut policy = self.write_policy();
            let mut next = policy.settings.clone();
            patch.apply(&mut next)?;
            policy.settings = next.clone();
            next
        };
        tracing::info!(settings = ?updated, "Security settings updated");
        self.save()?;
        Ok(updated)
    }

    pub fn stats(&self) -> GuardStats {
        self.stats_at(clock::now_millis())
    }

    pub fn stats_at(&self, now_ms: u64) -> GuardStats {
        let (tracked, locked) = {
            let lockouts = self.lockouts();
            let locked = lockouts
                .values()
                .filter(|r| r.unlock_at_ms.is_some_and(|t| t > now_ms))
                .count();
            (lockouts.len(), locked)
        };
        let policy = self.read_policy();
        GuardStats {
            allow_list_count: policy.allow.len(),
            deny_list_count: policy.deny.len(),
            locked_ips: locked,
            tracked_failure_ips: tracked,
            settings: policy.settings.clone(),
        }
    }

    pub fn snapshot(&self) -> GuardSnapshot {
        let policy = self.read_policy();
        GuardSnapshot {
            config: policy.settings.clone(),
            allow_list: policy.allow.iter().cloned().collect(),
            deny_list: policy.deny.iter().cloned().collect(),
        }
    }

    /// Write lists and settings to the snapshot file, if one is configured.
    pub fn save(&self) -> Result<(), PersistError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let _writer = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.snapshot();
        persist::write_snapshot(path, &snapshot).inspect_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to save security policy");
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn canonical_set(entries: Vec<String>, list: &str) -> BTreeSet<String> {
    entries
        .into_iter()
        .filter_map(|raw| {
            let ip = normalize_ip(&raw);
            if ip.is_none() {
                tracing::warn!(list, entry = %raw, "Dropping malformed address from snapshot");
            }
            ip
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: u64 = 1_700_000_000_000;
    const IP: &str = "203.0.113.5";

    fn secs(s: u64) -> u64 {
        T0 + s * 1000
    }

    fn guard() -> IntrusionGuard {
        IntrusionGuard::new(GuardSettings::default(), None)
    }

    #[test]
    fn lockout_example() {
        let guard = guard();
        for i in 0..4u32 {
            let outcome = guard.record_failure_at(IP, secs(0));
            assert_eq!(
                outcome,
                FailureOutcome::Counted {
                    failures: i + 1,
                    remaining_attempts: 4 - i
                }
            );
        }
        assert_eq!(
            guard.record_failure_at(IP, secs(0)),
            FailureOutcome::Locked { lockout_secs: 900 }
        );

        assert!(guard.is_locked_at(IP, secs(899)).locked);
        assert_eq!(guard.is_locked_at(IP, secs(899)).remaining_secs, 1);

        let status = guard.is_locked_at(IP, secs(901));
        assert!(!status.locked);

        // Expiry wiped the history: the next failure starts from one.
        assert_eq!(
            guard.record_failure_at(IP, secs(902)),
            FailureOutcome::Counted {
                failures: 1,
                remaining_attempts: 4
            }
        );
    }

    #[test]
    fn failures_spread_over_ten_seconds_lock() {
        let guard = guard();
        for s in [0, 2, 5, 8] {
            assert!(matches!(
                guard.record_failure_at(IP, secs(s)),
                FailureOutcome::Counted { .. }
            ));
        }
        assert!(matches!(
            guard.record_failure_at(IP, secs(10)),
            FailureOutcome::Locked { .. }
        ));
        assert!(guard.is_locked_at(IP, secs(909)).locked);
        assert!(!guard.is_locked_at(IP, secs(911)).locked);
    }

    #[test]
    fn failures_outside_window_do_not_count() {
        let guard = guard();
        for i in 0..4 {
            guard.record_failure_at(IP, secs(i));
        }
        let outcome = guard.record_failure_at(IP, secs(400));
        assert_eq!(
            outcome,
            FailureOutcome::Counted {
                failures: 1,
                remaining_attempts: 4
            }
        );
    }

    #[test]
    fn clear_failures_unlocks_immediately() {
        let guard = guard();
        for _ in 0..5 {
            guard.record_failure_at(IP, secs(0));
        }
        assert!(guard.is_locked_at(IP, secs(1)).locked);

        assert!(guard.clear_failures(IP));
        assert!(!guard.is_locked_at(IP, secs(2)).locked);
        assert!(!guard.clear_failures(IP));
        assert_eq!(guard.stats_at(secs(2)).tracked_failure_ips, 0);
    }

    #[test]
    fn deny_list_wins_and_allow_list_is_opt_in() {
        let guard = guard();
        assert!(guard.is_allowed(IP).allowed);

        guard.deny(IP).unwrap();
        let d = guard.is_allowed(IP);
        assert!(!d.allowed);
        assert_eq!(d.reason, Some(DenyReason::DenyListed));

        guard
            .update_settings(&SettingsPatch {
                enable_deny_list: Some(false),
                enable_allow_list: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(guard.is_allowed(IP).reason, Some(DenyReason::NotAllowListed));

        guard.allow(IP).unwrap();
        assert!(guard.is_allowed(IP).allowed);
        assert!(!guard.is_allowed("garbage").allowed);
    }

    #[test]
    fn list_entries_are_canonical() {
        let guard = guard();
        assert!(guard.deny("::ffff:10.1.1.1").unwrap());
        assert!(!guard.deny("10.1.1.1").unwrap());
        assert_eq!(guard.deny_list(), vec!["10.1.1.1".to_string()]);
        assert!(matches!(guard.deny("not-an-ip"), Err(GuardError::InvalidIp(_))));
        assert!(guard.undeny("10.1.1.1").unwrap());
        assert!(guard.deny_list().is_empty());
    }

    #[test]
    fn zero_settings_are_rejected() {
        let guard = guard();
        let err = guard
            .update_settings(&SettingsPatch {
                max_failures: Some(0),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, GuardError::InvalidSetting { field: "max_failures", .. }));
        assert_eq!(guard.settings(), GuardSettings::default());
    }

    #[test]
    fn locked_listing_and_sweep() {
        let guard = guard();
        for _ in 0..5 {
            guard.record_failure_at("10.0.0.1", secs(0));
        }
        guard.record_failure_at("10.0.0.2", secs(0));

        let locked = guard.locked_at(secs(100));
        assert_eq!(locked.len(), 1);
        assert_eq!(locked[0].ip, "10.0.0.1");
        assert_eq!(locked[0].remaining_secs, 800);

        assert_eq!(guard.sweep_at(secs(350)), 1);
        assert_eq!(guard.sweep_at(secs(1_000)), 1);
        assert_eq!(guard.stats_at(secs(1_000)).tracked_failure_ips, 0);
    }

    #[test]
    fn snapshot_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("security.json");

        let guard = IntrusionGuard::load(Some(path.clone()), GuardSettings::default());
        guard.deny("198.51.100.1").unwrap();
        guard.allow("198.51.100.2").unwrap();
        guard
            .update_settings(&SettingsPatch {
                max_failures: Some(3),
                csrf_enabled: Some(false),
                ..Default::default()
            })
            .unwrap();

        let reloaded = IntrusionGuard::load(Some(path), GuardSettings::default());
        assert_eq!(reloaded.deny_list(), vec!["198.51.100.1".to_string()]);
        assert_eq!(reloaded.allow_list(), vec!["198.51.100.2".to_string()]);
        assert_eq!(reloaded.settings().max_failures, 3);
        assert!(!reloaded.settings().csrf_enabled);
    }

    #[test]
    fn zero_valued_snapshot_settings_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("security.json");
        let mut settings = GuardSettings::default();
        settings.max_failures = 0;
        settings.csrf_lifetime_secs = 0;
        persist::write_snapshot(
            &path,
            &GuardSnapshot {
                config: settings,
                allow_list: vec![],
                deny_list: vec!["198.51.100.1".into()],
            },
        )
        .unwrap();

        let mut defaults = GuardSettings::default();
        defaults.max_failures = 7;
        let guard = IntrusionGuard::load(Some(path), defaults.clone());
        assert_eq!(guard.settings(), defaults);
        assert_eq!(guard.deny_list(), vec!["198.51.100.1".to_string()]);

        // One failure must not lock the address.
        assert!(matches!(
            guard.record_failure_at(IP, secs(0)),
            FailureOutcome::Counted { failures: 1, .. }
        ));
    }

    #[test]
    fn corrupt_snapshot_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("security.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let mut defaults = GuardSettings::default();
        defaults.max_failures = 7;
        let guard = IntrusionGuard::load(Some(path), defaults);
        assert_eq!(guard.settings().max_failures, 7);
        assert!(guard.deny_list().is_empty());
    }

    #[test]
    fn concurrent_failures_lock_the_address() {
        let guard = guard();
        let locked_outcomes = std::sync::atomic::AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    for _ in 0..10 {
                        if let FailureOutcome::Locked { .. } = guard.record_failure_at(IP, secs(0)) {
                            locked_outcomes.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert!(locked_outcomes.into_inner() >= 1);
        assert!(guard.is_locked_at(IP, secs(1)).locked);
        assert_eq!(guard.locked_at(secs(1)).len(), 1);
    }
}
