//! Request coordinator
//!
//! Serializes the visible outcome of overlapping scoring submissions. Every
//! submission is tagged with a correlation id; only an outcome whose id
//! equals the currently tracked one may change visible state or history.
//! Outcomes for superseded submissions are dropped wherever they arrive.
//!
//! Superseded calls are not aborted unless `abort_superseded` is enabled,
//! in which case the in-flight call's cancellation token is triggered and
//! its task exits without reporting an arrival.

use std::sync::Arc;

use fg_common::api::{ScreeningRequest, ScreeningResult};
use fg_common::events::{EventBus, ScreeningEvent, ScreeningStatus};
use fg_common::time;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::ScoringService;
use crate::error::TransportError;
use crate::history::{HistoryEntry, HistoryStore, HistoryView};

/// Visible screening state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoordinatorView {
    pub status: ScreeningStatus,
    pub result: Option<ScreeningResult>,
    pub error_message: Option<String>,
}

/// What happened to an arriving outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// Outcome belonged to the current submission and was applied
    Applied,
    /// Outcome was stale (or already applied) and was dropped
    Discarded,
}

/// The tracked correlation id
///
/// Written only by `submit` and `select_history`; read only when an
/// outcome arrives.
#[derive(Debug, Default)]
struct CorrelationRegister {
    current: Option<String>,
}

impl CorrelationRegister {
    fn track(&mut self, id: String) {
        self.current = Some(id);
    }

    fn invalidate(&mut self) {
        self.current = None;
    }

    fn is_current(&self, id: &str) -> bool {
        self.current.as_deref() == Some(id)
    }

    fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }
}

struct CoordinatorState {
    register: CorrelationRegister,
    /// Request behind the tracked id, taken when its outcome is applied
    pending: Option<ScreeningRequest>,
    in_flight: Option<CancellationToken>,
    view: CoordinatorView,
    history: HistoryStore,
}

/// Coordinates scoring submissions, visible state and history
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct RequestCoordinator {
    scorer: Arc<dyn ScoringService>,
    state: Arc<Mutex<CoordinatorState>>,
    events: EventBus,
    abort_superseded: bool,
}

impl RequestCoordinator {
    pub fn new(scorer: Arc<dyn ScoringService>, history: HistoryStore) -> Self {
        Self {
            scorer,
            state: Arc::new(Mutex::new(CoordinatorState {
                register: CorrelationRegister::default(),
                pending: None,
                in_flight: None,
                view: CoordinatorView::default(),
                history,
            })),
            events: EventBus::default(),
            abort_superseded: false,
        }
    }

    /// Cancel superseded in-flight calls instead of letting them finish
    pub fn with_abort_superseded(mut self, abort: bool) -> Self {
        self.abort_superseded = abort;
        self
    }

    /// Publish events on an existing bus
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ScreeningEvent> {
        self.events.subscribe()
    }

    /// Submit a request for scoring
    ///
    /// Tracks the request's correlation id, moves to `Loading` (clearing any
    /// displayed result or error) and dispatches the call in a background
    /// task. The returned handle completes once the outcome has been
    /// handled; callers need not await it.
    ///
    /// Invalid requests are rejected before any state changes.
    pub async fn submit(&self, request: ScreeningRequest) -> fg_common::Result<JoinHandle<()>> {
        request.validate()?;

        let token = CancellationToken::new();
        {
            let mut state = self.state.lock().await;
            self.supersede_in_flight(&mut state);

            state.register.track(request.correlation_id.clone());
            state.pending = Some(request.clone());
            state.in_flight = Some(token.clone());
            state.history.set_selected(None);

            let old_status = state.view.status;
            state.view = CoordinatorView {
                status: ScreeningStatus::Loading,
                result: None,
                error_message: None,
            };
            info!(correlation_id = %request.correlation_id, "Screening submitted");
            self.emit_status(old_status, ScreeningStatus::Loading, Some(request.correlation_id.clone()));
        }

        let coordinator = self.clone();
        Ok(tokio::spawn(async move {
            coordinator.dispatch(request, token).await;
        }))
    }

    async fn dispatch(&self, request: ScreeningRequest, token: CancellationToken) {
        let correlation_id = request.correlation_id.clone();

        let outcome = tokio::select! {
            _ = token.cancelled() => {
                debug!(correlation_id = %correlation_id, "Superseded call aborted");
                return;
            }
            outcome = self.scorer.score_one(&request) => outcome,
        };

        let outcome = outcome.and_then(|result| check_result(&correlation_id, result));
        self.on_result_arrived(&correlation_id, outcome).await;
    }

    /// Handle the outcome of a scoring call
    ///
    /// Applied only if `correlation_id` is the tracked id; otherwise dropped
    /// silently. A success moves to `Ready` and records a history entry; a
    /// failure moves to `Error` with the transport message and leaves
    /// history untouched.
    pub async fn on_result_arrived(
        &self,
        correlation_id: &str,
        outcome: Result<ScreeningResult, TransportError>,
    ) -> Arrival {
        let mut state = self.state.lock().await;

        if !state.register.is_current(correlation_id) {
            debug!(
                correlation_id = %correlation_id,
                current = ?state.register.current(),
                "Discarding outcome of superseded submission"
            );
            self.events.emit_lossy(ScreeningEvent::ResultDiscarded {
                correlation_id: correlation_id.to_string(),
                current_id: state.register.current().map(str::to_string),
                timestamp: time::now(),
            });
            return Arrival::Discarded;
        }

        let Some(request) = state.pending.take() else {
            debug!(correlation_id = %correlation_id, "Outcome already applied, discarding repeat");
            return Arrival::Discarded;
        };
        state.in_flight = None;

        let old_status = state.view.status;
        match outcome {
            Ok(result) => {
                info!(
                    correlation_id = %correlation_id,
                    risk_level = %result.risk_level,
                    decision = %result.decision,
                    "Screening result ready"
                );
                let entry = HistoryEntry::new(request, result.clone());
                let entry_id = entry.id.clone();
                let evicted = state.history.append(entry);
                state.history.set_selected(Some(entry_id.clone()));

                state.view = CoordinatorView {
                    status: ScreeningStatus::Ready,
                    result: Some(result),
                    error_message: None,
                };

                self.events.emit_lossy(ScreeningEvent::HistoryAppended {
                    entry_id,
                    len: state.history.len(),
                    evicted,
                    timestamp: time::now(),
                });
                self.emit_status(old_status, ScreeningStatus::Ready, Some(correlation_id.to_string()));
            }
            Err(e) => {
                warn!(correlation_id = %correlation_id, "Screening failed: {}", e);
                state.view = CoordinatorView {
                    status: ScreeningStatus::Error,
                    result: None,
                    error_message: Some(e.to_string()),
                };
                self.emit_status(old_status, ScreeningStatus::Error, Some(correlation_id.to_string()));
            }
        }

        Arrival::Applied
    }

    /// Display a past screening
    ///
    /// Stops tracking any outstanding submission, so its outcome will be
    /// discarded, and shows the entry's stored result directly.
    pub async fn select_history(&self, entry: &HistoryEntry) {
        let mut state = self.state.lock().await;
        self.supersede_in_flight(&mut state);

        state.register.invalidate();
        state.pending = None;
        if state.history.select(&entry.id).is_none() {
            state.history.set_selected(None);
        }

        let old_status = state.view.status;
        state.view = CoordinatorView {
            status: ScreeningStatus::Ready,
            result: Some(entry.result.clone()),
            error_message: None,
        };

        info!(entry_id = %entry.id, "History entry selected");
        self.events.emit_lossy(ScreeningEvent::HistorySelected {
            entry_id: entry.id.clone(),
            timestamp: time::now(),
        });
        self.emit_status(old_status, ScreeningStatus::Ready, None);
    }

    /// Select a history entry by id; returns false if no such entry exists
    pub async fn select_history_by_id(&self, id: &str) -> bool {
        let entry = {
            let state = self.state.lock().await;
            state.history.get(id).cloned()
        };
        match entry {
            Some(entry) => {
                self.select_history(&entry).await;
                true
            }
            None => false,
        }
    }

    /// Empty the history (visible state is left as is)
    pub async fn clear_history(&self) {
        let mut state = self.state.lock().await;
        state.history.clear();
        info!("History cleared");
        self.events.emit_lossy(ScreeningEvent::HistoryCleared {
            timestamp: time::now(),
        });
    }

    pub async fn view(&self) -> CoordinatorView {
        self.state.lock().await.view.clone()
    }

    pub async fn history(&self) -> HistoryView {
        self.state.lock().await.history.view()
    }

    /// Correlation id currently tracked, if any
    pub async fn current_correlation_id(&self) -> Option<String> {
        self.state.lock().await.register.current().map(str::to_string)
    }

    fn supersede_in_flight(&self, state: &mut CoordinatorState) {
        if let Some(token) = state.in_flight.take() {
            if self.abort_superseded {
                debug!(current = ?state.register.current(), "Aborting superseded call");
                token.cancel();
            }
        }
    }

    fn emit_status(&self, old_status: ScreeningStatus, new_status: ScreeningStatus, correlation_id: Option<String>) {
        self.events.emit_lossy(ScreeningEvent::StatusChanged {
            old_status,
            new_status,
            correlation_id,
            timestamp: time::now(),
        });
    }
}

/// Reject results that do not belong to the request or are out of range
fn check_result(correlation_id: &str, result: ScreeningResult) -> Result<ScreeningResult, TransportError> {
    if result.correlation_id != correlation_id {
        return Err(TransportError::Malformed(format!(
            "response transaction_id {:?} does not match request {:?}",
            result.correlation_id, correlation_id
        )));
    }
    result.check_well_formed().map_err(TransportError::Malformed)?;
    Ok(result)
}
