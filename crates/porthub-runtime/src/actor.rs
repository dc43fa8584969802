//! Single-owner actor around `AgentRegistry`.
//!
//! The registry is not thread-safe. One tokio task owns it and processes
//! commands in arrival order; any number of tasks hold a cloneable
//! [`RegistryHandle`]. Lifecycle events are re-broadcast as serializable
//! [`AgentEvent`]s.

use porthub_core::{
    Admission, AgentId, AgentInfo, AgentRegistry, ChannelId, ConfigError, EventKind, PartialKey,
    RegistryConfig, RegistryEvent,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::host::{HostChannel, HostNotification};

const COMMAND_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 1024;

// ─── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActorError {
    #[error("registry actor is closed")]
    Closed,
}

// ─── Events ──────────────────────────────────────────────────────────

/// Owned, serializable form of a registry event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    Setup {
        agent: AgentInfo,
        channel: HostChannel,
    },
    Message {
        agent: AgentInfo,
        payload: serde_json::Value,
    },
    Disconnect {
        agent: AgentInfo,
    },
}

impl AgentEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Setup { .. } => EventKind::Setup,
            Self::Message { .. } => EventKind::Message,
            Self::Disconnect { .. } => EventKind::Disconnect,
        }
    }

    pub fn agent(&self) -> &AgentInfo {
        match self {
            Self::Setup { agent, .. } | Self::Message { agent, .. } | Self::Disconnect { agent } => {
                agent
            }
        }
    }
}

impl From<&RegistryEvent<HostChannel>> for AgentEvent {
    fn from(event: &RegistryEvent<HostChannel>) -> Self {
        match event {
            RegistryEvent::Setup { agent, channel } => Self::Setup {
                agent: agent.clone(),
                channel: channel.clone(),
            },
            RegistryEvent::Message { payload, agent } => Self::Message {
                agent: agent.clone(),
                payload: payload.clone(),
            },
            RegistryEvent::Disconnect { agent } => Self::Disconnect {
                agent: agent.clone(),
            },
        }
    }
}

// ─── Commands ────────────────────────────────────────────────────────

#[derive(Debug)]
enum Command {
    Open {
        channel: HostChannel,
        reply: oneshot::Sender<Admission>,
    },
    Message {
        channel_id: ChannelId,
        payload: serde_json::Value,
        reply: oneshot::Sender<bool>,
    },
    Close {
        channel_id: ChannelId,
        reply: oneshot::Sender<bool>,
    },
    ForceRemove {
        agent_id: AgentId,
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<AgentInfo>>,
    },
    Get {
        agent_id: AgentId,
        reply: oneshot::Sender<Option<AgentInfo>>,
    },
    Query {
        filter: PartialKey,
        reply: oneshot::Sender<Vec<AgentInfo>>,
    },
    Shutdown,
}

// ─── Handle ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RegistryHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<AgentEvent>,
}

impl RegistryHandle {
    async fn request<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, ActorError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| ActorError::Closed)?;
        rx.await.map_err(|_| ActorError::Closed)
    }

    /// Host opened a channel.
    pub async fn open(&self, channel: HostChannel) -> Result<Admission, ActorError> {
        self.request(|reply| Command::Open { channel, reply }).await
    }

    /// Host delivered a payload on a channel.
    pub async fn message(
        &self,
        channel_id: ChannelId,
        payload: serde_json::Value,
    ) -> Result<bool, ActorError> {
        self.request(|reply| Command::Message {
            channel_id,
            payload,
            reply,
        })
        .await
    }

    /// Host closed a channel.
    pub async fn close(&self, channel_id: ChannelId) -> Result<bool, ActorError> {
        self.request(|reply| Command::Close { channel_id, reply })
            .await
    }

    /// Route one host notification to `open`, `message` or `close`.
    ///
    /// Returns whether the registry accepted it.
    pub async fn notify(&self, notification: HostNotification) -> Result<bool, ActorError> {
        match notification {
            HostNotification::Open { channel } => {
                Ok(matches!(self.open(channel).await?, Admission::Accepted { .. }))
            }
            HostNotification::Message {
                channel_id,
                payload,
            } => self.message(channel_id, payload).await,
            HostNotification::Close { channel_id } => self.close(channel_id).await,
        }
    }

    pub async fn force_remove(&self, agent_id: AgentId) -> Result<bool, ActorError> {
        self.request(|reply| Command::ForceRemove { agent_id, reply })
            .await
    }

    /// All agents in creation order.
    pub async fn snapshot(&self) -> Result<Vec<AgentInfo>, ActorError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn get(&self, agent_id: AgentId) -> Result<Option<AgentInfo>, ActorError> {
        self.request(|reply| Command::Get { agent_id, reply }).await
    }

    pub async fn query(&self, filter: PartialKey) -> Result<Vec<AgentInfo>, ActorError> {
        self.request(|reply| Command::Query { filter, reply }).await
    }

    /// Events published after this call. Slow receivers may lag.
    pub fn subscribe_events(&self) -> broadcast::Receiver<AgentEvent> {
        self.events.subscribe()
    }

    /// Stop the actor after commands already queued.
    pub async fn shutdown(&self) -> Result<(), ActorError> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| ActorError::Closed)
    }
}

// ─── Actor ───────────────────────────────────────────────────────────

pub struct RegistryActor {
    registry: AgentRegistry<HostChannel>,
    commands: mpsc::Receiver<Command>,
}

impl RegistryActor {
    /// Build a registry from `config` and spawn its owning task.
    pub fn spawn(config: &RegistryConfig) -> Result<(RegistryHandle, JoinHandle<()>), ConfigError> {
        let registry = AgentRegistry::from_config(config)?;
        Ok(Self::spawn_registry(registry))
    }

    /// Spawn an owning task around an existing registry. Handlers already
    /// subscribed on it keep running inside the actor.
    pub fn spawn_registry(registry: AgentRegistry<HostChannel>) -> (RegistryHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);

        for kind in [EventKind::Setup, EventKind::Message, EventKind::Disconnect] {
            let events = events_tx.clone();
            registry.subscribe(kind, move |_, event| {
                // no receivers is fine
                let _ = events.send(AgentEvent::from(event));
                Ok(())
            });
        }

        let actor = Self {
            registry,
            commands: commands_rx,
        };
        let join = tokio::spawn(actor.run());
        let handle = RegistryHandle {
            commands: commands_tx,
            events: events_tx,
        };
        (handle, join)
    }

    async fn run(mut self) {
        tracing::info!("registry actor started");
        while let Some(command) = self.commands.recv().await {
            if !self.handle(command) {
                break;
            }
        }
        tracing::info!(agents = self.registry.len(), "registry actor stopped");
    }

    /// Returns `false` on shutdown.
    fn handle(&self, command: Command) -> bool {
        let registry = &self.registry;
        // Dropped reply receivers mean the caller gave up; nothing to do.
        match command {
            Command::Open { channel, reply } => {
                let _ = reply.send(registry.connect(channel));
            }
            Command::Message {
                channel_id,
                payload,
                reply,
            } => {
                let _ = reply.send(registry.deliver(channel_id, payload));
            }
            Command::Close { channel_id, reply } => {
                let _ = reply.send(registry.disconnect(channel_id));
            }
            Command::ForceRemove { agent_id, reply } => {
                let _ = reply.send(registry.force_remove(&agent_id));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(registry.all().iter().map(|a| a.info()).collect());
            }
            Command::Get { agent_id, reply } => {
                let _ = reply.send(registry.get(&agent_id).map(|a| a.info()));
            }
            Command::Query { filter, reply } => {
                let _ = reply.send(registry.query(&filter).iter().map(|a| a.info()).collect());
            }
            Command::Shutdown => {
                tracing::debug!("registry actor shutdown requested");
                return false;
            }
        }
        true
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
