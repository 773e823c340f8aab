//! Call observation link.
//!
//! Reports every call that gets past authentication: once before the handler
//! runs ("pre") and once with the outcome ("post"). Observation never changes
//! the outcome. A failing sink is logged and otherwise ignored.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use common::protocol::{Method, Request};
use common::Code;
use thiserror::Error;
use tracing::{info, warn};

use super::{BoxFuture, CallResult, Interceptor, Next};
use crate::server::context::CallContext;

/// Errors a sink may report.
#[derive(Debug, Error)]
pub enum ObserveError {
    #[error("observation sink unavailable: {0}")]
    Unavailable(String),
}

/// One observation event.
#[derive(Debug)]
pub enum Observation<'a> {
    Pre {
        call_id: u64,
        method: Method,
        request: &'a Request,
    },
    Post {
        call_id: u64,
        method: Method,
        outcome: &'a CallResult,
        elapsed: Duration,
    },
}

/// Destination for observations.
pub trait ObservationSink: Send + Sync {
    fn record(&self, observation: &Observation<'_>) -> Result<(), ObserveError>;
}

/// Emits each observation as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ObservationSink for TracingSink {
    fn record(&self, observation: &Observation<'_>) -> Result<(), ObserveError> {
        match observation {
            Observation::Pre {
                call_id,
                method,
                request,
            } => info!(call_id, method = %method, request = ?request, "pre"),
            Observation::Post {
                call_id,
                method,
                outcome: Ok(reply),
                elapsed,
            } => info!(call_id, method = %method, reply = ?reply, elapsed_ms = elapsed.as_millis() as u64, "post"),
            Observation::Post {
                call_id,
                method,
                outcome: Err(status),
                elapsed,
            } => info!(
                call_id,
                method = %method,
                code = ?status.code(),
                message = status.message(),
                elapsed_ms = elapsed.as_millis() as u64,
                "post"
            ),
        }
        Ok(())
    }
}

/// Which side of the handler an entry was recorded on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pre,
    Post,
}

/// Summary of one observation kept by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedCall {
    pub call_id: u64,
    pub method: Method,
    pub phase: Phase,
    /// Outcome code; `None` for [`Phase::Pre`].
    pub code: Option<Code>,
}

/// Keeps observations in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<ObservedCall>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, oldest first.
    pub fn entries(&self) -> Vec<ObservedCall> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ObservationSink for RecordingSink {
    fn record(&self, observation: &Observation<'_>) -> Result<(), ObserveError> {
        let entry = match observation {
            Observation::Pre {
                call_id, method, ..
            } => ObservedCall {
                call_id: *call_id,
                method: *method,
                phase: Phase::Pre,
                code: None,
            },
            Observation::Post {
                call_id,
                method,
                outcome,
                ..
            } => ObservedCall {
                call_id: *call_id,
                method: *method,
                phase: Phase::Post,
                code: Some(match outcome {
                    Ok(_) => Code::Ok,
                    Err(status) => status.code(),
                }),
            },
        };
        self.entries
            .lock()
            .map_err(|e| ObserveError::Unavailable(e.to_string()))?
            .push(entry);
        Ok(())
    }
}

/// Reports calls to an [`ObservationSink`].
pub struct CallObserver {
    sink: Arc<dyn ObservationSink>,
}

impl CallObserver {
    pub fn new(sink: Arc<dyn ObservationSink>) -> Self {
        Self { sink }
    }

    fn report(&self, observation: &Observation<'_>) {
        if let Err(e) = self.sink.record(observation) {
            warn!(error = %e, "failed to record call observation");
        }
    }
}

impl Interceptor for CallObserver {
    fn name(&self) -> &'static str {
        "call-observer"
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a CallContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, CallResult> {
        Box::pin(async move {
            self.report(&Observation::Pre {
                call_id: ctx.call_id,
                method: ctx.method,
                request: &request,
            });

            let start = Instant::now();
            let outcome = next.run(ctx, request).await;

            self.report(&Observation::Post {
                call_id: ctx.call_id,
                method: ctx.method,
                outcome: &outcome,
                elapsed: start.elapsed(),
            });
            outcome
        })
    }
}
