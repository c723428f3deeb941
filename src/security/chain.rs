//! Ordered admission chain.
//!
//! A route declares which [`GuardStep`]s run and in what order. Steps run
//! strictly in sequence and the first denial ends evaluation, so a request
//! rejected by the IP policy never consumes rate-limit budget.

use std::sync::Arc;

use axum::http::Method;

use crate::config::schema::{GuardStep, RateKey, RoutePolicy};
use crate::error::Rejection;
use crate::observability::metrics;
use crate::security::access_control::IntrusionGuard;
use crate::security::csrf::CsrfTokenStore;
use crate::security::identity::{Claims, IdentityTokenService, TokenError};
use crate::security::keys::sanitize_key;
use crate::security::rate_limit::{AdmissionGate, RateDecision};

/// What the chain needs to know about a request.
#[derive(Debug, Clone, Copy)]
pub struct RequestFacts<'a> {
    /// Canonical client address.
    pub ip: &'a str,
    pub method: &'a Method,
    /// Raw `X-API-Key` value.
    pub caller_key: Option<&'a str>,
    /// Raw `Authorization` value.
    pub authorization: Option<&'a str>,
    /// Raw `X-CSRF-Token` value.
    pub csrf_token: Option<&'a str>,
}

/// Metadata produced by a successful evaluation, handed to handlers via
/// request extensions.
#[derive(Debug, Clone, Default)]
pub struct Admission {
    pub route: String,
    pub client_ip: String,
    pub principal: Option<Claims>,
    pub rate: Option<RateDecision>,
}

#[derive(Clone)]
pub struct AdmissionChain {
    gate: Arc<AdmissionGate>,
    guard: Arc<IntrusionGuard>,
    csrf: Arc<CsrfTokenStore>,
    tokens: Arc<IdentityTokenService>,
}

impl AdmissionChain {
    pub fn new(
        gate: Arc<AdmissionGate>,
        guard: Arc<IntrusionGuard>,
        csrf: Arc<CsrfTokenStore>,
        tokens: Arc<IdentityTokenService>,
    ) -> Self {
        Self {
            gate,
            guard,
            csrf,
            tokens,
        }
    }

    pub fn evaluate(
        &self,
        policy: &RoutePolicy,
        facts: &RequestFacts<'_>,
    ) -> Result<Admission, Rejection> {
        let mut admission = Admission {
            route: policy.name.clone(),
            client_ip: facts.ip.to_owned(),
            ..Admission::default()
        };

        for step in &policy.steps {
            if let Err(rejection) = self.run_step(*step, policy, facts, &mut admission) {
                metrics::record_admission_denied(step.as_str());
                tracing::debug!(
                    route = %policy.name,
                    step = step.as_str(),
                    ip = %facts.ip,
                    code = rejection.code(),
                    "Request rejected"
                );
                return Err(rejection);
            }
        }
        Ok(admission)
    }

    fn run_step(
        &self,
        step: GuardStep,
        policy: &RoutePolicy,
        facts: &RequestFacts<'_>,
        admission: &mut Admission,
    ) -> Result<(), Rejection> {
        match step {
            GuardStep::IpAllowed => {
                let decision = self.guard.is_allowed(facts.ip);
                match decision.reason {
                    Some(reason) => Err(Rejection::Forbidden {
                        reason: reason.as_str().to_owned(),
                    }),
                    None => Ok(()),
                }
            }
            GuardStep::LockCheck => {
                let status = self.guard.is_locked(facts.ip);
                if status.locked {
                    Err(Rejection::Locked {
                        remaining_secs: status.remaining_secs,
                    })
                } else {
                    Ok(())
                }
            }
            GuardStep::RateLimit => {
                let Some(rule) = policy.rate_limit.as_ref() else {
                    return Ok(());
                };
                let identifier = self.rate_identifier(rule.key, facts, admission);
                let decision = self.gate.check(
                    &format!("{}:{}", policy.name, identifier),
                    rule.max_requests,
                    rule.window_secs,
                );
                admission.rate = Some(decision.clone());
                if decision.allowed {
                    Ok(())
                } else {
                    metrics::record_rate_limited(&policy.name);
                    tracing::warn!(route = %policy.name, identifier = %identifier, "Rate limit exceeded");
                    Err(Rejection::RateLimited(decision))
                }
            }
            GuardStep::Authenticate => {
                admission.principal = Some(self.authenticate(facts)?);
                Ok(())
            }
            GuardStep::RequireAdmin => {
                let claims = match admission.principal.take() {
                    Some(claims) => claims,
                    None => self.authenticate(facts)?,
                };
                let is_admin = claims.is_admin;
                admission.principal = Some(claims);
                if is_admin {
                    Ok(())
                } else {
                    Err(Rejection::InsufficientRole)
                }
            }
            GuardStep::Csrf => {
                if is_safe_method(facts.method) {
                    return Ok(());
                }
                if self.csrf.verify(facts.csrf_token.unwrap_or_default()) {
                    Ok(())
                } else {
                    Err(Rejection::CsrfRejected)
                }
            }
        }
    }

    fn authenticate(&self, facts: &RequestFacts<'_>) -> Result<Claims, Rejection> {
        let token = facts
            .authorization
            .and_then(IdentityTokenService::extract_from_header)
            .ok_or(Rejection::InvalidToken)?;
        self.tokens.verify(token).map_err(|e| match e {
            TokenError::Expired => Rejection::ExpiredToken,
            _ => Rejection::InvalidToken,
        })
    }

    /// Identifier for the rate-limit window; every key falls back to the address.
    fn rate_identifier(&self, key: RateKey, facts: &RequestFacts<'_>, admission: &Admission) -> String {
        let address = || format!("ip:{}", facts.ip);
        match key {
            RateKey::CallerKey => facts
                .caller_key
                .and_then(sanitize_key)
                .map(|k| format!("key:{k}"))
                .unwrap_or_else(address),
            RateKey::Subject => admission
                .principal
                .as_ref()
                .map(Claims::subject)
                .or_else(|| self.authenticate(facts).ok().map(|c| c.subject()))
                .unwrap_or_else(address),
            RateKey::Address => address(),
        }
    }
}

fn is_safe_method(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD || *method == Method::OPTIONS
}
