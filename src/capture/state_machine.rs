//! Capture lifecycle state machine.
//!
//! All transitions go through `reduce()`, which returns the next state and the
//! effects the driver must run. The public lifecycle is Idle/Capturing;
//! `Starting` and `Stopping` hold the machine while a native call is pending
//! so a second start or stop is refused synchronously.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::CaptureRejection;
use crate::model::{SelectedSource, SourceKind};

/// The capture currently owning the native recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCapture {
    pub session_id: Uuid,
    pub source: SelectedSource,
    pub output_path: PathBuf,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub enum State {
    #[default]
    Idle,
    Starting {
        session_id: Uuid,
        source: SelectedSource,
    },
    Capturing(ActiveCapture),
    Stopping(ActiveCapture),
}

#[derive(Debug, Clone)]
pub enum Event {
    StartRequested { source: SelectedSource },
    StartOk { id: Uuid, output_path: PathBuf },
    StartFail { id: Uuid, err: String },
    StopRequested,
    /// Native stop resolved; `err` is set when it failed.
    StopDone { id: Uuid, err: Option<String> },
}

#[derive(Debug, Clone)]
pub enum Effect {
    InvokeStart { id: Uuid, source: SelectedSource },
    InvokeStop(ActiveCapture),
    Reject(CaptureRejection),
    EmitStatus,
}

/// Reducer: (state, event) -> (next_state, effects)
///
/// Events carrying a session id that does not match the current session are
/// ignored.
pub fn reduce(state: &State, event: Event) -> (State, Vec<Effect>) {
    use Effect::*;
    use Event::*;
    use State::*;

    match (state, event) {
        // -----------------
        // Start requests
        // -----------------
        (Idle, StartRequested { source }) => {
            let id = Uuid::new_v4();
            (
                Starting {
                    session_id: id,
                    source: source.clone(),
                },
                vec![InvokeStart { id, source }, EmitStatus],
            )
        }
        (Starting { .. }, StartRequested { .. }) => {
            (state.clone(), vec![Reject(CaptureRejection::StartPending)])
        }
        (Capturing(_), StartRequested { .. }) => {
            (state.clone(), vec![Reject(CaptureRejection::AlreadyCapturing)])
        }
        (Stopping(_), StartRequested { .. }) => {
            (state.clone(), vec![Reject(CaptureRejection::StopPending)])
        }

        // -----------------
        // Starting
        // -----------------
        (Starting { session_id, source }, StartOk { id, output_path }) if *session_id == id => (
            Capturing(ActiveCapture {
                session_id: id,
                source: source.clone(),
                output_path,
                started_at: Utc::now(),
            }),
            vec![EmitStatus],
        ),
        (Starting { session_id, .. }, StartFail { id, .. }) if *session_id == id => {
            (Idle, vec![EmitStatus])
        }

        // -----------------
        // Stop requests
        // -----------------
        (Idle, StopRequested) => (Idle, vec![]),
        (Starting { .. }, StopRequested) => {
            (state.clone(), vec![Reject(CaptureRejection::StartPending)])
        }
        (Capturing(active), StopRequested) => (
            Stopping(active.clone()),
            vec![InvokeStop(active.clone()), EmitStatus],
        ),
        (Stopping(_), StopRequested) => (state.clone(), vec![]),

        // -----------------
        // Stopping: best effort, always back to Idle
        // -----------------
        (Stopping(active), StopDone { id, .. }) if active.session_id == id => {
            (Idle, vec![EmitStatus])
        }

        // -----------------
        // Stale completions and anything else: no transition
        // -----------------
        _ => (state.clone(), vec![]),
    }
}

/// Capture status published to subscribers.
/// Tagged union: `{ "status": "idle" }`, `{ "status": "capturing", ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CaptureStatus {
    Idle,
    Starting {
        #[serde(rename = "sourceKind")]
        source_kind: SourceKind,
        #[serde(rename = "sourceId")]
        source_id: String,
    },
    Capturing(ActiveCapture),
    Stopping(ActiveCapture),
}

impl CaptureStatus {
    pub fn is_capturing(&self) -> bool {
        matches!(self, CaptureStatus::Capturing(_))
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, CaptureStatus::Idle)
    }
}

pub fn status_of(state: &State) -> CaptureStatus {
    match state {
        State::Idle => CaptureStatus::Idle,
        State::Starting { source, .. } => CaptureStatus::Starting {
            source_kind: source.kind,
            source_id: source.id.clone(),
        },
        State::Capturing(active) => CaptureStatus::Capturing(active.clone()),
        State::Stopping(active) => CaptureStatus::Stopping(active.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(id: Uuid) -> ActiveCapture {
        ActiveCapture {
            session_id: id,
            source: SelectedSource::application("10"),
            output_path: PathBuf::from("/rec/capture-1.wav"),
            started_at: Utc::now(),
        }
    }

    fn starting(id: Uuid) -> State {
        State::Starting {
            session_id: id,
            source: SelectedSource::application("10"),
        }
    }

    fn has_reject(effects: &[Effect], reason: CaptureRejection) -> bool {
        effects
            .iter()
            .any(|e| matches!(e, Effect::Reject(r) if *r == reason))
    }

    #[test]
    fn idle_start_transitions_to_starting() {
        let (next, effects) = reduce(
            &State::Idle,
            Event::StartRequested {
                source: SelectedSource::application("10"),
            },
        );
        assert!(matches!(next, State::Starting { .. }));
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::InvokeStart { source, .. } if source.id == "10")));
        assert!(effects.iter().any(|e| matches!(e, Effect::EmitStatus)));
    }

    #[test]
    fn start_while_pending_or_capturing_is_rejected() {
        let id = Uuid::new_v4();
        let request = || Event::StartRequested {
            source: SelectedSource::application("10"),
        };

        let (next, effects) = reduce(&starting(id), request());
        assert!(matches!(next, State::Starting { session_id, .. } if session_id == id));
        assert!(has_reject(&effects, CaptureRejection::StartPending));

        let (next, effects) = reduce(&State::Capturing(active(id)), request());
        assert!(matches!(next, State::Capturing(_)));
        assert!(has_reject(&effects, CaptureRejection::AlreadyCapturing));
        assert!(!effects.iter().any(|e| matches!(e, Effect::InvokeStart { .. })));

        let (_, effects) = reduce(&State::Stopping(active(id)), request());
        assert!(has_reject(&effects, CaptureRejection::StopPending));
    }

    #[test]
    fn start_ok_records_output_path() {
        let id = Uuid::new_v4();
        let (next, _) = reduce(
            &starting(id),
            Event::StartOk {
                id,
                output_path: PathBuf::from("/rec/capture-5.wav"),
            },
        );
        match next {
            State::Capturing(active) => {
                assert_eq!(active.session_id, id);
                assert_eq!(active.output_path, PathBuf::from("/rec/capture-5.wav"));
            }
            other => panic!("expected Capturing, got {:?}", other),
        }
    }

    #[test]
    fn start_fail_returns_to_idle() {
        let id = Uuid::new_v4();
        let (next, effects) = reduce(
            &starting(id),
            Event::StartFail {
                id,
                err: "permission denied".into(),
            },
        );
        assert!(matches!(next, State::Idle));
        assert!(effects.iter().any(|e| matches!(e, Effect::EmitStatus)));
    }

    #[test]
    fn stale_start_completion_is_ignored() {
        let id = Uuid::new_v4();
        let (next, effects) = reduce(
            &starting(id),
            Event::StartOk {
                id: Uuid::new_v4(),
                output_path: PathBuf::from("/rec/x.wav"),
            },
        );
        assert!(matches!(next, State::Starting { .. }));
        assert!(effects.is_empty());
    }

    #[test]
    fn stop_while_idle_is_a_no_op() {
        let (next, effects) = reduce(&State::Idle, Event::StopRequested);
        assert!(matches!(next, State::Idle));
        assert!(effects.is_empty());
    }

    #[test]
    fn stop_while_starting_is_rejected() {
        let (next, effects) = reduce(&starting(Uuid::new_v4()), Event::StopRequested);
        assert!(matches!(next, State::Starting { .. }));
        assert!(has_reject(&effects, CaptureRejection::StartPending));
    }

    #[test]
    fn stop_while_capturing_invokes_native_stop() {
        let id = Uuid::new_v4();
        let (next, effects) = reduce(&State::Capturing(active(id)), Event::StopRequested);
        assert!(matches!(next, State::Stopping(_)));
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::InvokeStop(a) if a.session_id == id)));

        let (again, effects) = reduce(&next, Event::StopRequested);
        assert!(matches!(again, State::Stopping(_)));
        assert!(effects.is_empty());
    }

    #[test]
    fn failed_native_stop_still_releases_session() {
        let id = Uuid::new_v4();
        let (next, _) = reduce(
            &State::Stopping(active(id)),
            Event::StopDone {
                id,
                err: Some("device vanished".into()),
            },
        );
        assert!(matches!(next, State::Idle));
    }

    #[test]
    fn status_serializes_as_tagged_union() {
        let json = serde_json::to_value(status_of(&State::Idle)).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "idle" }));

        let json = serde_json::to_value(status_of(&starting(Uuid::new_v4()))).unwrap();
        assert_eq!(json["status"], "starting");
        assert_eq!(json["sourceKind"], "application");
        assert_eq!(json["sourceId"], "10");

        let json = serde_json::to_value(status_of(&State::Capturing(active(Uuid::new_v4())))).unwrap();
        assert_eq!(json["status"], "capturing");
        assert_eq!(json["outputPath"], "/rec/capture-1.wav");
    }
}
