//! porthub-runtime: async host integration for the porthub agent registry.
//!
//! The core registry is single-threaded; [`actor`] gives multi-threaded
//! hosts one owning task and a cloneable handle. [`replay`] drives recorded
//! host notifications through that actor.

pub mod actor;
pub mod host;
pub mod replay;

pub use actor::{ActorError, AgentEvent, RegistryActor, RegistryHandle};
pub use host::{HostChannel, HostNotification};
