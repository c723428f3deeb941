//! One-time anti-forgery tokens.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

use crate::clock;

const TOKEN_BYTES: usize = 32;

/// Issued tokens mapped to their issue time. A token is removed on its first
/// successful verification; expired ones are swept whenever a new token is issued.
pub struct CsrfTokenStore {
    tokens: Mutex<HashMap<String, u64>>,
    enabled: AtomicBool,
    lifetime_ms: AtomicU64,
}

impl CsrfTokenStore {
    pub fn new(enabled: bool, lifetime_secs: u64) -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
            enabled: AtomicBool::new(enabled),
            lifetime_ms: AtomicU64::new(lifetime_secs.saturating_mul(1000)),
        }
    }

    fn tokens(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Apply new settings. Disabling drops every outstanding token.
    pub fn reconfigure(&self, enabled: bool, lifetime_secs: u64) {
        self.lifetime_ms
            .store(lifetime_secs.saturating_mul(1000), Ordering::Relaxed);
        let was_enabled = self.enabled.swap(enabled, Ordering::Relaxed);
        if was_enabled && !enabled {
            self.tokens().clear();
        }
        if was_enabled != enabled {
            tracing::info!(enabled, lifetime_secs, "CSRF protection reconfigured");
        }
    }

    /// New token, or `None` while protection is disabled.
    pub fn issue(&self) -> Option<String> {
        self.issue_at(clock::now_millis())
    }

    pub fn issue_at(&self, now_ms: u64) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }

        let mut raw = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut raw);
        let token = URL_SAFE_NO_PAD.encode(raw);

        let lifetime = self.lifetime_ms.load(Ordering::Relaxed);
        let mut tokens = self.tokens();
        tokens.retain(|_, issued| now_ms.saturating_sub(*issued) < lifetime);
        tokens.insert(token.clone(), now_ms);
        Some(token)
    }

    /// Consume `token`. Always true while protection is disabled.
    pub fn verify(&self, token: &str) -> bool {
        self.verify_at(token, clock::now_millis())
    }

    pub fn verify_at(&self, token: &str, now_ms: u64) -> bool {
        if !self.is_enabled() {
            return true;
        }
        if token.is_empty() || token.len() > 128 {
            return false;
        }

        let lifetime = self.lifetime_ms.load(Ordering::Relaxed);
        match self.tokens().remove(token) {
            Some(issued) => now_ms.saturating_sub(issued) < lifetime,
            None => false,
        }
    }

    /// Tokens issued and not yet consumed or swept.
    pub fn active_count(&self) -> usize {
        self.tokens().len()
    }
}
