//! Command event bus between the container shell and hosted apps.
//!
//! Endpoints register handlers on a [`CommandBus`] and emit
//! [`CommandEvent`]s through an [`EventChannel`]. The in-process
//! [`LocalHub`] routes addressed events to one endpoint and broadcasts to
//! everyone but the sender.

mod command_bus;
mod event;
mod local;

pub use command_bus::{BusError, BusStats, CommandBus, EventChannel};
pub use event::{BusIdentity, CommandEvent, COMMAND_EVENT};
pub use local::{spawn_dispatch, LocalChannel, LocalHub};
