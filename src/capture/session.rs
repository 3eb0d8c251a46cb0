//! Drives the capture state machine against the native collaborator.
//!
//! `dispatch()` applies the reducer synchronously under a lock, so the
//! `Starting`/`Stopping` guards are in place before any native call is awaited.
//! The lock is never held across an await.
//!
//! Native start/stop effects run in spawned tasks that dispatch their own
//! completion events. A caller that drops its `start()`/`stop()` future
//! detaches from the task; the session still lands in `Idle` or `Capturing`.
//! Start and stop must run inside a Tokio runtime.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use uuid::Uuid;

use super::paths::OutputPaths;
use super::state_machine::{reduce, status_of, ActiveCapture, CaptureStatus, Effect, Event, State};
use crate::cache::{CacheKey, ResourceCache};
use crate::error::{CaptureRejection, OrchestratorError, Result};
use crate::model::SelectedSource;
use crate::native::Native;

/// Result of a `stop()` call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The native capture was stopped and the recordings list invalidated.
    Stopped(ActiveCapture),
    /// Nothing was capturing; no native call was made.
    AlreadyIdle,
    /// Another stop is in flight; no native call was made.
    AlreadyStopping,
}

struct SessionInner {
    native: Native,
    cache: ResourceCache,
    paths: Arc<OutputPaths>,
    state: Mutex<State>,
    status_tx: watch::Sender<CaptureStatus>,
}

/// The single capture session of the process. Clones share the session.
#[derive(Clone)]
pub struct CaptureSession {
    inner: Arc<SessionInner>,
}

impl CaptureSession {
    pub fn new(native: Native, cache: ResourceCache, paths: OutputPaths) -> Self {
        let (status_tx, _) = watch::channel(CaptureStatus::Idle);
        Self {
            inner: Arc::new(SessionInner {
                native,
                cache,
                paths: Arc::new(paths),
                state: Mutex::new(State::Idle),
                status_tx,
            }),
        }
    }

    pub fn status(&self) -> CaptureStatus {
        self.inner.status()
    }

    /// Receiver that observes every published status change.
    pub fn subscribe(&self) -> watch::Receiver<CaptureStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Start capturing `source` into a fresh output file.
    ///
    /// Valid only while idle. On failure the session is back to idle and the
    /// native error is returned unchanged.
    pub async fn start(&self, source: SelectedSource) -> Result<ActiveCapture> {
        let mut invoke = None;
        for effect in self.inner.dispatch(Event::StartRequested { source }).1 {
            match effect {
                Effect::Reject(reason) => {
                    log::info!("Capture: start rejected: {}", reason);
                    return Err(reason.into());
                }
                Effect::InvokeStart { id, source } => invoke = Some((id, source)),
                _ => {}
            }
        }
        // reduce() either rejects a start request or invokes it.
        let Some((id, source)) = invoke else {
            return Err(CaptureRejection::StartPending.into());
        };

        let inner = self.inner.clone();
        let task = tokio::spawn(async move { inner.run_start(id, source).await });
        match task.await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Capture: start task for session {} aborted: {}", id, e);
                self.inner.dispatch(Event::StartFail {
                    id,
                    err: e.to_string(),
                });
                Err(OrchestratorError::Task(e.to_string()))
            }
        }
    }

    /// Stop the running capture.
    ///
    /// Idle and already-stopping sessions return without a native call. A
    /// failed native stop still returns the session to idle; the error is
    /// returned and the recordings list is left as is. On success the
    /// recordings list is invalidated after the native stop resolves.
    pub async fn stop(&self) -> Result<StopOutcome> {
        let (next, effects) = self.inner.dispatch(Event::StopRequested);
        let mut invoke = None;
        for effect in effects {
            match effect {
                Effect::Reject(reason) => {
                    log::info!("Capture: stop rejected: {}", reason);
                    return Err(reason.into());
                }
                Effect::InvokeStop(active) => invoke = Some(active),
                _ => {}
            }
        }
        let Some(active) = invoke else {
            return Ok(match next {
                State::Stopping(_) => StopOutcome::AlreadyStopping,
                _ => StopOutcome::AlreadyIdle,
            });
        };

        let id = active.session_id;
        let inner = self.inner.clone();
        let task = tokio::spawn(async move { inner.run_stop(active).await });
        match task.await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Capture: stop task for session {} aborted: {}", id, e);
                self.inner.dispatch(Event::StopDone {
                    id,
                    err: Some(e.to_string()),
                });
                Err(OrchestratorError::Task(e.to_string()))
            }
        }
    }
}

impl SessionInner {
    /// Apply one event. Status effects are published here; the remaining
    /// effects are returned for the caller to run.
    fn dispatch(&self, event: Event) -> (State, Vec<Effect>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        log::debug!("Capture: event {:?}", event);

        let old_discriminant = std::mem::discriminant(&*state);
        let (next, effects) = reduce(&state, event);
        if old_discriminant != std::mem::discriminant(&next) {
            log::info!("Capture: state transition {:?} -> {:?}", *state, next);
        }
        *state = next.clone();

        let mut pending = Vec::with_capacity(effects.len());
        for effect in effects {
            match effect {
                Effect::EmitStatus => {
                    self.status_tx.send_replace(status_of(&state));
                }
                other => pending.push(other),
            }
        }
        (next, pending)
    }

    fn status(&self) -> CaptureStatus {
        status_of(&self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    async fn run_start(&self, id: Uuid, source: SelectedSource) -> Result<ActiveCapture> {
        match self.invoke_start(&source).await {
            Ok(output_path) => match self.dispatch(Event::StartOk { id, output_path }).0 {
                State::Capturing(active) if active.session_id == id => {
                    log::info!("Capture: session {} recording to {:?}", id, active.output_path);
                    Ok(active)
                }
                // Only reachable if the session was replaced underneath us.
                _ => Err(CaptureRejection::StartPending.into()),
            },
            Err(e) => {
                log::warn!("Capture: session {} failed to start: {}", id, e);
                self.dispatch(Event::StartFail {
                    id,
                    err: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn invoke_start(&self, source: &SelectedSource) -> Result<PathBuf> {
        let paths = self.paths.clone();
        let output_path = tokio::task::spawn_blocking(move || paths.next())
            .await
            .map_err(|e| OrchestratorError::Task(e.to_string()))?
            .map_err(|e| {
                OrchestratorError::Storage(format!(
                    "Failed to prepare recordings directory {:?}: {}",
                    self.paths.dir(),
                    e
                ))
            })?;
        self.cache
            .mutate(
                &[],
                self.native.start_capture(source.kind, &source.id, &output_path),
            )
            .await?;
        Ok(output_path)
    }

    async fn run_stop(&self, active: ActiveCapture) -> Result<StopOutcome> {
        let id = active.session_id;
        let result = self
            .cache
            .mutate(&[CacheKey::Recordings], self.native.stop_capture())
            .await;
        self.dispatch(Event::StopDone {
            id,
            err: result.as_ref().err().map(|e| e.to_string()),
        });

        match result {
            Ok(()) => {
                log::info!("Capture: session {} stopped", id);
                Ok(StopOutcome::Stopped(active))
            }
            Err(e) => {
                log::warn!("Capture: session {} released after failed stop: {}", id, e);
                Err(e)
            }
        }
    }
}
