//! Startup orchestration.
//!
//! Builds every long-lived service from the validated configuration and
//! restores persisted state. Order: guard (and the CSRF store it configures),
//! token service, ledger, then the external collaborators.

use std::sync::Arc;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::directory::{StaticDirectory, UserDirectory};
use crate::engine::{EngineError, Recognizer, RemoteRecognizer};
use crate::ledger::UsageLedger;
use crate::security::identity::TokenError;
use crate::security::{AdmissionChain, AdmissionGate, CsrfTokenStore, IdentityTokenService, IntrusionGuard};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("token service: {0}")]
    Token(#[from] TokenError),

    #[error("recognition engine: {0}")]
    Engine(#[from] EngineError),
}

/// Explicitly owned service objects, shared with the HTTP layer.
#[derive(Clone)]
pub struct Services {
    pub gate: Arc<AdmissionGate>,
    pub guard: Arc<IntrusionGuard>,
    pub csrf: Arc<CsrfTokenStore>,
    pub tokens: Arc<IdentityTokenService>,
    pub ledger: Arc<UsageLedger>,
    pub directory: Arc<dyn UserDirectory>,
    pub engine: Arc<dyn Recognizer>,
}

impl Services {
    pub fn chain(&self) -> AdmissionChain {
        AdmissionChain::new(
            self.gate.clone(),
            self.guard.clone(),
            self.csrf.clone(),
            self.tokens.clone(),
        )
    }
}

/// Construct services and load their snapshots. Never fails on bad snapshots.
pub fn bootstrap(config: &GatewayConfig) -> Result<Services, StartupError> {
    let guard = IntrusionGuard::load(
        config.security.state_path.clone(),
        config.security.settings.clone(),
    );
    let settings = guard.settings();
    let csrf = CsrfTokenStore::new(settings.csrf_enabled, settings.csrf_lifetime_secs);

    let tokens = IdentityTokenService::from_env(&config.auth.secret_env, config.auth.token_ttl_secs)?;

    let ledger = UsageLedger::new(&config.ledger);
    let restored = ledger.load();

    let directory = StaticDirectory::from_config(&config.directory);
    let engine = RemoteRecognizer::new(&config.engine)?;

    tracing::info!(
        restored_records = restored,
        deny_list = guard.deny_list().len(),
        allow_list = guard.allow_list().len(),
        accounts = config.directory.accounts.len(),
        "Services initialised"
    );

    Ok(Services {
        gate: Arc::new(AdmissionGate::new()),
        guard: Arc::new(guard),
        csrf: Arc::new(csrf),
        tokens: Arc::new(tokens),
        ledger: Arc::new(ledger),
        directory: Arc::new(directory),
        engine: Arc::new(engine),
    })
}
