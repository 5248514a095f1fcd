//! Typed realtime events and their per-variant subscriber dispatch.

pub mod dispatcher;
pub mod event;

pub use dispatcher::{DispatchError, EventDispatcher, Subscription};
pub use event::{RealtimeEvent, RealtimeEventKind};
