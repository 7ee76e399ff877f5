pub mod poller;

use serde::Deserialize;
use thiserror::Error;

use crate::model::CampaignId;

pub use poller::{spawn_poller, DEFAULT_POLL_INTERVAL};

pub const GENERIC_ERROR: &str = "Erreur inconnue";
pub const CAMPAIGN_RUNNING: &str = "Envoi en cours...";
pub const COMPLETE_MESSAGE: &str = "Terminé";

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("not a progress event: {name}")]
    UnknownEvent { name: String },

    #[error("invalid payload for {name}: {source}")]
    Payload {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Progress,
    Complete,
    Error,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct CampaignResult {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub total_sent: u64,
    #[serde(default)]
    pub total_failed: u64,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ProgressPayload {
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub campagne_id: Option<CampaignId>,
    #[serde(default)]
    pub current: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub sent: Option<u64>,
    #[serde(default)]
    pub failed: Option<u64>,
    #[serde(default)]
    pub result: Option<CampaignResult>,
}

impl ProgressPayload {
    pub fn percent(&self) -> u8 {
        self.progress
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 100.0).round() as u8)
            .unwrap_or(0)
    }

    fn text(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }
}

/// One socket notification, e.g. `campagne_progress` or
/// `seo_analysis_error`.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressEvent {
    pub task: String,
    pub kind: EventKind,
    pub payload: ProgressPayload,
}

impl ProgressEvent {
    pub fn parse(name: &str, payload: serde_json::Value) -> Result<Self, ProgressError> {
        let (task, kind) = split_event_name(name).ok_or_else(|| ProgressError::UnknownEvent {
            name: name.to_string(),
        })?;
        let mut payload: ProgressPayload =
            serde_json::from_value(payload).map_err(|e| ProgressError::Payload {
                name: name.to_string(),
                source: e,
            })?;
        if kind == EventKind::Complete {
            // campaign completions only carry the aggregated result
            if let Some(result) = payload.result.clone() {
                payload.current.get_or_insert(result.total);
                payload.total.get_or_insert(result.total);
                payload.sent.get_or_insert(result.total_sent);
                payload.failed.get_or_insert(result.total_failed);
            }
            payload.progress = Some(100.0);
        }
        Ok(Self {
            task: task.to_string(),
            kind,
            payload,
        })
    }
}

fn split_event_name(name: &str) -> Option<(&str, EventKind)> {
    [
        ("_progress", EventKind::Progress),
        ("_complete", EventKind::Complete),
        ("_error", EventKind::Error),
    ]
    .into_iter()
    .find_map(|(suffix, kind)| {
        name.strip_suffix(suffix)
            .filter(|task| !task.is_empty())
            .map(|task| (task, kind))
    })
}

/// Progress text of a campaign send: the server message, else the
/// counters, else a generic line.
pub fn campaign_progress_message(message: Option<&str>, current: u64, total: u64) -> String {
    match message.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => m.to_string(),
        None if current > 0 && total > 0 => format!("Envoi {}/{}", current, total),
        None => CAMPAIGN_RUNNING.to_string(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running { percent: u8, message: String },
    Complete { message: String },
}

/// Follows one background task through its socket events.
#[derive(Clone, Debug)]
pub struct ProgressTracker {
    task: String,
    state: TaskState,
    last_error: Option<String>,
}

impl ProgressTracker {
    pub fn new(task: &str) -> Self {
        Self {
            task: task.to_string(),
            state: TaskState::Idle,
            last_error: None,
        }
    }

    pub fn start(&mut self, message: &str) {
        self.last_error = None;
        self.state = TaskState::Running {
            percent: 0,
            message: message.to_string(),
        };
    }

    /// Applies `event` when it belongs to this task. Returns whether it did.
    pub fn apply(&mut self, event: &ProgressEvent) -> bool {
        if event.task != self.task {
            return false;
        }
        let payload = &event.payload;
        match event.kind {
            EventKind::Progress => {
                let message = match ProgressPayload::text(&payload.message) {
                    Some(m) => m.to_string(),
                    None => campaign_progress_message(
                        None,
                        payload.current.unwrap_or(0),
                        payload.total.unwrap_or(0),
                    ),
                };
                self.state = TaskState::Running {
                    percent: payload.percent(),
                    message,
                };
            }
            EventKind::Complete => {
                self.state = TaskState::Complete {
                    message: ProgressPayload::text(&payload.message)
                        .unwrap_or(COMPLETE_MESSAGE)
                        .to_string(),
                };
            }
            EventKind::Error => {
                let message = ProgressPayload::text(&payload.error)
                    .or_else(|| ProgressPayload::text(&payload.message))
                    .unwrap_or(GENERIC_ERROR)
                    .to_string();
                tracing::warn!(task = %self.task, error = %message, "task failed");
                self.last_error = Some(message);
                self.state = TaskState::Idle;
            }
        }
        true
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, TaskState::Running { .. })
    }
}
