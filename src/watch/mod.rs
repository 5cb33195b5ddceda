//! Watch mode.
//!
//! [`FsWatcher`] forwards OS events into a channel, [`debounce`] groups them
//! into batches, and [`WatchEngine`] maps each batch onto sync actions that run
//! one after another.

mod debounce;
mod engine;
mod event;
mod source;

pub use debounce::{EventBuffer, debounce};
pub use engine::{WatchConfig, WatchEngine};
pub use event::{Probe, WatchEvent, WatchEventKind, classify, translate};
pub use source::FsWatcher;
