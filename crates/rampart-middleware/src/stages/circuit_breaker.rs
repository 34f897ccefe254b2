//! Circuit breaker middleware.
//!
//! Tracks consecutive qualifying failures per request type. Once
//! `exception_allowed` failures happen in a row the circuit opens and every
//! call fails fast with [`PipelineError::CircuitOpen`] for
//! `duration_of_break`. The first call after the break is a trial: its
//! success closes the circuit, a qualifying failure opens it again. While
//! the trial runs, other calls are rejected.
//!
//! A failure qualifies when it is not an expected outcome, or when it is
//! selected by the policy's [`ErrorMatcher`](crate::ErrorMatcher).
//!
//! # Pipeline Position
//!
//! ```text
//! ... → RateLimit → [CircuitBreaker] → Retry → Timeout → ... → Handler
//! ```
//!
//! The breaker wraps retry: a call whose retries are all exhausted counts
//! as a single failure.

use crate::classifier::is_qualifying;
use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::observer::Observers;
use crate::registry::{CircuitBreakerPolicy, PolicyRegistry};
use crate::types::{Invocation, PipelineResult};
use dashmap::DashMap;
use parking_lot::Mutex;
use rampart_core::{PipelineError, RequestType};
use rampart_telemetry::metrics;
use std::any::TypeId;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// State of one circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected until the break elapses.
    Open,
    /// A single trial call decides whether the circuit closes.
    HalfOpen,
}

impl CircuitState {
    /// Returns the state as a metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl Circuit {
    const fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.trial_in_flight = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Proceed { trial: bool },
    Reject { retry_after: Option<Duration> },
}

/// Releases the trial slot if the trial never reports back.
struct TrialGuard {
    circuit: Arc<Mutex<Circuit>>,
    armed: bool,
}

impl TrialGuard {
    fn new(circuit: Arc<Mutex<Circuit>>, armed: bool) -> Self {
        Self { circuit, armed }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TrialGuard {
    fn drop(&mut self) {
        if self.armed {
            self.circuit.lock().trial_in_flight = false;
        }
    }
}

/// Per-request-type circuit breaker.
#[derive(Debug)]
pub struct CircuitBreakerMiddleware {
    registry: Arc<PolicyRegistry>,
    observers: Observers,
    circuits: DashMap<TypeId, Arc<Mutex<Circuit>>>,
}

impl CircuitBreakerMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new(registry: Arc<PolicyRegistry>, observers: Observers) -> Self {
        Self {
            registry,
            observers,
            circuits: DashMap::new(),
        }
    }

    /// Returns the current state of the circuit for `request_type`.
    ///
    /// Types that never failed report [`CircuitState::Closed`].
    #[must_use]
    pub fn state(&self, request_type: RequestType) -> CircuitState {
        self.circuits
            .get(&request_type.id())
            .map_or(CircuitState::Closed, |c| c.lock().state)
    }

    fn circuit(&self, request_type: RequestType) -> Arc<Mutex<Circuit>> {
        self.circuits
            .entry(request_type.id())
            .or_insert_with(|| Arc::new(Mutex::new(Circuit::closed())))
            .clone()
    }

    fn admit(
        circuit: &Mutex<Circuit>,
        policy: &CircuitBreakerPolicy,
        request_type: RequestType,
    ) -> Admission {
        let now = Instant::now();
        let mut circuit = circuit.lock();
        let state = circuit.state;
        match state {
            CircuitState::Closed => Admission::Proceed { trial: false },
            CircuitState::Open => {
                let opened_at = circuit.opened_at.unwrap_or(now);
                let elapsed = now.saturating_duration_since(opened_at);
                if elapsed < policy.duration_of_break {
                    return Admission::Reject {
                        retry_after: Some(policy.duration_of_break - elapsed),
                    };
                }
                circuit.state = CircuitState::HalfOpen;
                circuit.trial_in_flight = true;
                drop(circuit);

                metrics::record_circuit_transition(
                    request_type.name(),
                    CircuitState::HalfOpen.as_str(),
                );
                tracing::info!(
                    request_name = request_type.name(),
                    "Circuit half-open, allowing a trial call"
                );
                Admission::Proceed { trial: true }
            }
            CircuitState::HalfOpen => {
                if circuit.trial_in_flight {
                    Admission::Reject { retry_after: None }
                } else {
                    circuit.trial_in_flight = true;
                    Admission::Proceed { trial: true }
                }
            }
        }
    }

    fn on_success(&self, circuit: &Mutex<Circuit>, trial: bool, request_type: RequestType) {
        let mut circuit = circuit.lock();
        let state = circuit.state;
        let recovered = match state {
            CircuitState::Closed => {
                circuit.consecutive_failures = 0;
                false
            }
            CircuitState::HalfOpen if trial => {
                *circuit = Circuit::closed();
                true
            }
            CircuitState::HalfOpen | CircuitState::Open => false,
        };
        drop(circuit);

        if recovered {
            metrics::record_circuit_transition(request_type.name(), CircuitState::Closed.as_str());
            tracing::info!(request_name = request_type.name(), "Circuit closed");
            if let Some(on_reset) = &self.observers.on_reset {
                on_reset(request_type);
            }
        }
    }

    fn on_failure(
        &self,
        circuit: &Mutex<Circuit>,
        trial: bool,
        policy: &CircuitBreakerPolicy,
        error: &PipelineError,
        request_type: RequestType,
    ) {
        let qualifying = is_qualifying(error, policy.handle.as_ref());
        let now = Instant::now();

        let mut circuit = circuit.lock();
        if !qualifying {
            if trial {
                circuit.trial_in_flight = false;
            }
            return;
        }

        let state = circuit.state;
        let opened = match state {
            CircuitState::Closed => {
                circuit.consecutive_failures += 1;
                if circuit.consecutive_failures >= policy.exception_allowed {
                    circuit.open(now);
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen if trial => {
                circuit.open(now);
                true
            }
            CircuitState::HalfOpen | CircuitState::Open => false,
        };
        let failures = circuit.consecutive_failures;
        drop(circuit);

        if opened {
            metrics::record_circuit_transition(request_type.name(), CircuitState::Open.as_str());
            tracing::warn!(
                request_name = request_type.name(),
                consecutive_failures = failures,
                break_ms = policy.duration_of_break.as_millis() as u64,
                error = %error,
                "Circuit opened"
            );
            if let Some(on_break) = &self.observers.on_break {
                on_break(request_type, policy.duration_of_break);
            }
        }
    }
}

impl Middleware for CircuitBreakerMiddleware {
    fn name(&self) -> &'static str {
        "circuit_breaker"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        invocation: &'a Invocation,
        next: Next<'a>,
    ) -> BoxFuture<'a, PipelineResult> {
        Box::pin(async move {
            let request_type = invocation.request_type();
            let Some(policy) = self.registry.circuit_breaker(request_type) else {
                return next.run(ctx, invocation).await;
            };

            let circuit = self.circuit(request_type);
            let trial = match Self::admit(&circuit, &policy, request_type) {
                Admission::Proceed { trial } => trial,
                Admission::Reject { retry_after } => {
                    tracing::debug!(
                        request_id = %ctx.request_id(),
                        request_name = invocation.name(),
                        "Circuit open, rejecting call"
                    );
                    return Err(PipelineError::circuit_open(invocation.name(), retry_after));
                }
            };

            let mut guard = TrialGuard::new(circuit.clone(), trial);
            let result = next.run(ctx, invocation).await;
            guard.disarm();

            match &result {
                Ok(_) => self.on_success(&circuit, trial, request_type),
                Err(error) => self.on_failure(&circuit, trial, &policy, error, request_type),
            }
            result
        })
    }
}
