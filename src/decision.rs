//! The authorization engine: turns a raw client address into a [`Decision`].
//!
//! # Outcomes
//!
//! ```text
//!                 raw address
//!                      │
//!          parse fails │ parse ok
//!        ┌─────────────┴──────────────┐
//!        ▼                            ▼
//!  Denied(InvalidAddress)      evaluator.evaluate()
//!                     ┌───────────────┼────────────────┐
//!                  Err(_)           false             true
//!                     ▼               ▼                │
//!           Denied(Internal)  Denied(Forbidden)        │
//!                                       ┌──────────────┴─────────────┐
//!                                 ForwardToNext               TerminateChain
//!                                       ▼                            ▼
//!                                  PassThrough            Accepted { identity }
//! ```
//!
//! `PassThrough` is explicitly *not* an authentication result: the address is
//! allowed, but the next check in the chain still has to establish identity.
//!
//! Evaluators run in their own task, so a panic inside one denies that request
//! as `Denied(Internal)` instead of taking the process down.
//!
//! # Error Reporting
//!
//! Invalid addresses and evaluator failures are handed to the configured
//! [`Reporter`] synchronously before the denial is returned. There is no
//! process-wide fallback; callers choose a reporter explicitly (for example
//! [`TracingReporter`]).

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::address::Address;
use crate::error::AuthError;
use crate::metrics;
use crate::policy::{BuiltinEvaluator, Policy, PolicyEvaluator};

/// Status code hint attached to every denial (HTTP 401 Unauthorized).
pub const DENIED_STATUS_HINT: u16 = 401;

/// What a successful match produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Signal "not rejected" and let the next check decide.
    #[default]
    ForwardToNext,
    /// Authenticate the client with its address as identity.
    TerminateChain,
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The client address was missing or malformed.
    InvalidAddress,
    /// The address matched neither policy arm.
    Forbidden,
    /// A custom evaluator failed.
    Internal,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::InvalidAddress => "invalid_address",
            DenyReason::Forbidden => "forbidden",
            DenyReason::Internal => "internal_error",
        }
    }
}

/// Terminal result of one authorization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Denied(DenyReason),
    PassThrough,
    Accepted { identity: Address },
}

impl Decision {
    pub fn is_denied(&self) -> bool {
        matches!(self, Decision::Denied(_))
    }

    /// The established identity, only for `Accepted`.
    pub fn identity(&self) -> Option<Address> {
        match self {
            Decision::Accepted { identity } => Some(*identity),
            _ => None,
        }
    }

    /// Suggested transport status for denials; `None` when the request proceeds.
    pub fn status_hint(&self) -> Option<u16> {
        self.is_denied().then_some(DENIED_STATUS_HINT)
    }

    /// Label used for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            Decision::Denied(_) => "denied",
            Decision::PassThrough => "pass_through",
            Decision::Accepted { .. } => "accepted",
        }
    }
}

// =============================================================================
// Reporter
// =============================================================================

/// Receives per-request errors before they are converted into denials.
pub trait Reporter: Send + Sync {
    fn report(&self, error: &AuthError);
}

impl<F> Reporter for F
where
    F: Fn(&AuthError) + Send + Sync,
{
    fn report(&self, error: &AuthError) {
        self(error)
    }
}

/// Reporter that emits a `tracing` event per error.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, error: &AuthError) {
        match error {
            AuthError::InternalEvaluation(_) => {
                error!(error = %error, kind = error.kind(), "IP whitelist evaluation failed")
            }
            _ => warn!(error = %error, kind = error.kind(), "Could not read client IP address"),
        }
    }
}

/// Reporter that drops everything. Used when no reporter is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn report(&self, _error: &AuthError) {}
}

// =============================================================================
// Authorizer
// =============================================================================

/// IP whitelist authorization engine.
///
/// Cheap to clone; all fields are shared and immutable, so one instance can
/// serve any number of concurrent requests.
///
/// # Example
///
/// ```
/// use ip_whitelist::{Address, Authorizer, Decision, Mode, Policy, SubnetRule};
///
/// # tokio_test_block_on(async {
/// let rule = SubnetRule::new("172.24.0.0".parse().unwrap(), 16).unwrap();
/// let authorizer = Authorizer::new(Policy::subnet(rule), Mode::TerminateChain);
///
/// let decision = authorizer.authorize(Some("172.24.4.4")).await;
/// assert_eq!(decision.identity(), Some("172.24.4.4".parse::<Address>().unwrap()));
/// assert!(authorizer.authorize(Some("172.18.4.4")).await.is_denied());
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone)]
pub struct Authorizer {
    policy: Arc<Policy>,
    mode: Mode,
    evaluator: Arc<dyn PolicyEvaluator>,
    reporter: Arc<dyn Reporter>,
}

impl Authorizer {
    /// Create an engine using the built-in evaluator and no reporter.
    pub fn new(policy: Policy, mode: Mode) -> Self {
        Self {
            policy: Arc::new(policy),
            mode,
            evaluator: Arc::new(BuiltinEvaluator),
            reporter: Arc::new(NoopReporter),
        }
    }

    /// Replace the built-in evaluator.
    pub fn with_evaluator(mut self, evaluator: impl PolicyEvaluator + 'static) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    /// Set the reporter for invalid addresses and evaluator failures.
    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Decide on a raw client address.
    ///
    /// Never fails: every per-request error ends up as [`Decision::Denied`].
    pub async fn authorize(&self, raw_address: Option<&str>) -> Decision {
        let decision = self.decide(raw_address).await;
        metrics::record_decision(decision.outcome());
        decision
    }

    async fn decide(&self, raw_address: Option<&str>) -> Decision {
        let client = match Address::parse(raw_address.unwrap_or_default()) {
            Ok(client) => client,
            Err(e) => {
                self.reporter.report(&e);
                return Decision::Denied(DenyReason::InvalidAddress);
            }
        };

        let evaluator = Arc::clone(&self.evaluator);
        let policy = Arc::clone(&self.policy);

        let started = Instant::now();
        // A panicking evaluator only fails its own request
        let verdict = tokio::spawn(async move { evaluator.evaluate(&policy, &client).await })
            .await
            .unwrap_or_else(|e| Err(anyhow::anyhow!("policy evaluator did not complete: {e}")));
        metrics::record_evaluation_duration(started.elapsed().as_secs_f64());

        match verdict {
            Err(e) => {
                metrics::record_evaluation_error();
                self.reporter
                    .report(&AuthError::InternalEvaluation(format!("{e:#}")));
                Decision::Denied(DenyReason::Internal)
            }
            Ok(false) => {
                debug!(client_ip = %client, "Client IP not in whitelist");
                Decision::Denied(DenyReason::Forbidden)
            }
            Ok(true) => match self.mode {
                Mode::TerminateChain => {
                    debug!(client_ip = %client, "Client IP whitelisted, authenticated");
                    Decision::Accepted { identity: client }
                }
                Mode::ForwardToNext => {
                    debug!(client_ip = %client, "Client IP whitelisted, forwarding to next check");
                    Decision::PassThrough
                }
            },
        }
    }
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer")
            .field("policy", &self.policy)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
