//! # linkwatch-builder
//!
//! The two channels to the remote build service:
//!
//! - [`client`]: request/response: full link, incremental relink, clean,
//!   availability (blocking, via `ureq`)
//! - [`events`]: the long-lived push stream of build lifecycle events
//!   (server-sent events, via `reqwest-eventsource`)
//!
//! [`host`] picks a sticky-routing hint; [`protocol`] holds the wire shapes.

pub mod client;
pub mod error;
pub mod events;
pub mod host;
pub mod protocol;

pub use client::{BuildService, HttpBuildService, LinkOptions};
pub use error::BuildError;
pub use events::{
    BuildEvent, BuildEventKind, EventHandlers, EventSubscriber, ListenOptions, SseSubscriber,
    Subscription,
};
pub use host::most_available_host;
pub use protocol::{Availability, CleanResponse, LinkResponse};
