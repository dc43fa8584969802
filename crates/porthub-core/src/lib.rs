//! porthub-core: agent registry for a hub-and-spoke messaging layer.
//!
//! Collapses the many physical channels opened by extension pages and
//! content frames into one stable logical agent per location, tracks the
//! channel set backing each agent, and fans lifecycle events out to
//! subscribers. Pure library: no async runtime, no transport.

pub mod classifier;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod query;
pub mod registry;
pub mod store;
pub mod types;

pub use classifier::{LocationClassifier, PageDescriptors, classify};
pub use config::RegistryConfig;
pub use error::{ConfigError, HandlerError, ParseContextError, RejectReason};
pub use events::{EventKind, RegistryEvent, SubscriptionId};
pub use query::PartialKey;
pub use registry::{Admission, AgentRegistry};
pub use types::{Agent, AgentId, AgentInfo, Channel, ChannelId, ChannelOrigin, Context, IdentityKey};
