use indexmap::IndexMap;
use log::trace;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, timeout_at};

use super::{WatchEvent, WatchEventKind};

/// Pending events, one per path. A later event replaces the earlier one and
/// moves the path to the end.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: IndexMap<PathBuf, WatchEventKind>,
}

impl EventBuffer {
    pub fn push(&mut self, event: WatchEvent) {
        self.events.shift_remove(&event.path);
        self.events.insert(event.path, event.kind);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn drain(&mut self) -> Vec<WatchEvent> {
        self.events
            .drain(..)
            .map(|(path, kind)| WatchEvent { path, kind })
            .collect()
    }
}

/// Group events from `events` into batches sent to `batches`.
///
/// The first event of a cycle opens a window of `window`; every event received
/// before it closes joins the batch. Events arriving after the batch is sent
/// open the next cycle. When `events` closes, a pending batch is still sent.
pub async fn debounce(
    mut events: UnboundedReceiver<WatchEvent>,
    batches: UnboundedSender<Vec<WatchEvent>>,
    window: Duration,
) {
    let mut buffer = EventBuffer::default();
    while let Some(first) = events.recv().await {
        buffer.push(first);
        let deadline = Instant::now() + window;
        let mut open = true;
        while open {
            match timeout_at(deadline, events.recv()).await {
                Ok(Some(event)) => buffer.push(event),
                Ok(None) => open = false,
                Err(_) => break,
            }
        }

        trace!("Draining {} watch events", buffer.len());
        if batches.send(buffer.drain()).is_err() || !open {
            return;
        }
    }
}
