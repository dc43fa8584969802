//! Scenario replay: feed recorded host notifications through the actor.
//!
//! A scenario file is JSON:
//!
//! ```json
//! {
//!   "name": "popup merge",
//!   "steps": [ { "type": "open", "channel": { ... } }, ... ],
//!   "expect": { "agents": 1, "disconnects": 0 }
//! }
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use porthub_core::{AgentInfo, Context, EventKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::actor::{ActorError, AgentEvent, RegistryHandle};
use crate::host::HostNotification;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid scenario: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Actor(#[from] ActorError),
    #[error("scenario '{scenario}' expectation failed: {detail}")]
    Mismatch { scenario: String, detail: String },
}

// ─── Scenario ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<HostNotification>,
    #[serde(default)]
    pub expect: Option<Expectation>,
}

/// Final-state assertions. Absent fields are not checked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Expectation {
    pub agents: Option<usize>,
    pub disconnects: Option<usize>,
    /// Expected context of every surviving agent, in creation order.
    pub contexts: Option<Vec<Context>>,
}

impl Scenario {
    pub async fn load(path: &Path) -> Result<Self, ReplayError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&raw)?)
    }
}

// ─── Report ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub scenario: String,
    pub finished_at: DateTime<Utc>,
    /// Notifications the registry refused (rejected opens, unknown channels).
    pub refused: usize,
    pub agents: Vec<AgentInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<AgentEvent>,
}

impl ReplayReport {
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }

    pub fn verify(&self, expect: &Expectation) -> Result<(), ReplayError> {
        let mismatch = |detail: String| ReplayError::Mismatch {
            scenario: self.scenario.clone(),
            detail,
        };

        if let Some(agents) = expect.agents {
            if self.agents.len() != agents {
                return Err(mismatch(format!(
                    "expected {agents} agents, found {}",
                    self.agents.len()
                )));
            }
        }
        if let Some(disconnects) = expect.disconnects {
            let actual = self.count(EventKind::Disconnect);
            if actual != disconnects {
                return Err(mismatch(format!(
                    "expected {disconnects} disconnects, found {actual}"
                )));
            }
        }
        if let Some(contexts) = &expect.contexts {
            let actual: Vec<Context> = self.agents.iter().map(|a| a.key.context).collect();
            if &actual != contexts {
                return Err(mismatch(format!(
                    "expected contexts {contexts:?}, found {actual:?}"
                )));
            }
        }
        Ok(())
    }
}

// ─── Replay ──────────────────────────────────────────────────────────

/// Apply every step in order and collect the resulting agents and events.
///
/// Events are drained after each reply so a long scenario never outruns
/// the broadcast buffer.
pub async fn run(handle: &RegistryHandle, scenario: &Scenario) -> Result<ReplayReport, ReplayError> {
    let mut events_rx = handle.subscribe_events();
    let mut events = Vec::new();
    let mut refused = 0;

    for (i, step) in scenario.steps.iter().enumerate() {
        let channel_id = step.channel_id();
        if !handle.notify(step.clone()).await? {
            tracing::debug!(scenario = %scenario.name, step = i, channel_id = %channel_id, "step refused");
            refused += 1;
        }
        drain(&mut events_rx, &mut events, &scenario.name);
    }

    let agents = handle.snapshot().await?;
    drain(&mut events_rx, &mut events, &scenario.name);

    let report = ReplayReport {
        scenario: scenario.name.clone(),
        finished_at: Utc::now(),
        refused,
        agents,
        events,
    };
    if let Some(expect) = &scenario.expect {
        report.verify(expect)?;
    }
    tracing::info!(
        scenario = %scenario.name,
        steps = scenario.steps.len(),
        agents = report.agents.len(),
        refused,
        "replay finished"
    );
    Ok(report)
}

/// Move every event already broadcast into `events`.
///
/// A reply arrives only after its events were broadcast, so this sees all
/// of them.
fn drain(rx: &mut broadcast::Receiver<AgentEvent>, events: &mut Vec<AgentEvent>, scenario: &str) {
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(scenario, skipped, "replay event log lagged");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
