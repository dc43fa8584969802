use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseContextError;

// ─── Context ──────────────────────────────────────────────────────

/// Kind of peer location a channel was opened from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Context {
    ContentPage,
    SidePanel,
    OptionsPage,
    Popup,
    Devtools,
    NewTabOverride,
    BookmarksOverride,
    HistoryOverride,
    Unknown,
}

impl Context {
    pub const ALL: [Self; 9] = [
        Self::ContentPage,
        Self::SidePanel,
        Self::OptionsPage,
        Self::Popup,
        Self::Devtools,
        Self::NewTabOverride,
        Self::BookmarksOverride,
        Self::HistoryOverride,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContentPage => "content-page",
            Self::SidePanel => "side-panel",
            Self::OptionsPage => "options-page",
            Self::Popup => "popup",
            Self::Devtools => "devtools",
            Self::NewTabOverride => "new-tab-override",
            Self::BookmarksOverride => "bookmarks-override",
            Self::HistoryOverride => "history-override",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Context {
    type Err = ParseContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ctx| ctx.as_str() == s)
            .ok_or_else(|| ParseContextError(s.to_owned()))
    }
}

// ─── Identity Key ─────────────────────────────────────────────────

/// Logical location of a peer: `(context, owner_id, sub_owner_id)`.
///
/// At most one live agent exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityKey {
    pub context: Context,
    /// Containing top-level unit (tab id), `0` when absent.
    pub owner_id: u64,
    /// Containing sub-unit (frame id), `0` when absent.
    pub sub_owner_id: u64,
}

impl IdentityKey {
    pub fn new(context: Context, owner_id: u64, sub_owner_id: u64) -> Self {
        Self {
            context,
            owner_id,
            sub_owner_id,
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}.{}", self.context, self.owner_id, self.sub_owner_id)
    }
}

// ─── Identifiers ──────────────────────────────────────────────────

/// Opaque agent identifier. Generated once per created agent, never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub(crate) fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AgentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport-assigned identity of one physical channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

// ─── Channel ──────────────────────────────────────────────────────

/// Where a channel was opened from, as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOrigin {
    /// Owning tab, if the sender lives in one.
    #[serde(default)]
    pub tab_id: Option<u64>,
    /// Frame inside the owning tab.
    #[serde(default)]
    pub frame_id: Option<u64>,
    /// Full origin URL including scheme.
    #[serde(default)]
    pub url: Option<String>,
}

/// Handle to a physical duplex connection.
///
/// Cloning must be cheap and yield a handle to the same connection.
pub trait Channel: Clone {
    fn id(&self) -> ChannelId;

    /// Name the peer opened the channel with. Not guaranteed unique.
    fn name(&self) -> &str;

    /// `None` when the host supplied no sender information at all.
    fn origin(&self) -> Option<&ChannelOrigin>;
}

// ─── Agent ────────────────────────────────────────────────────────

/// Logical agent backed by one or more channels.
#[derive(Debug, Clone)]
pub struct Agent<C> {
    pub id: AgentId,
    pub key: IdentityKey,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub channels: Vec<C>,
}

impl<C: Channel> Agent<C> {
    pub fn info(&self) -> AgentInfo {
        AgentInfo {
            id: self.id.clone(),
            key: self.key,
            created_at: self.created_at,
            last_active_at: self.last_active_at,
            channel_count: self.channels.len(),
        }
    }

    pub fn has_channel(&self, channel_id: ChannelId) -> bool {
        self.channels.iter().any(|c| c.id() == channel_id)
    }
}

/// Channel-free snapshot of an agent, carried by lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: AgentId,
    pub key: IdentityKey,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub channel_count: usize,
}

// ─── Tests ────────────────────────────────────────────────────────
