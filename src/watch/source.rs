use anyhow::{Context, Result};
use log::{debug, warn};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

use super::{WatchEvent, translate};

/// OS file watcher feeding [`WatchEvent`]s into a channel.
///
/// The notify callback runs on the watcher's own thread and only forwards
/// events. Closing the watcher drops the sender, which ends the stream.
pub struct FsWatcher {
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl FsWatcher {
    #[tracing::instrument]
    pub fn start(roots: &[PathBuf]) -> Result<(Self, UnboundedReceiver<WatchEvent>)> {
        let (tx, rx) = unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    for event in translate(&event) {
                        // receiver gone means the engine stopped
                        let _ = tx.send(event);
                    }
                }
                Err(e) => warn!("Watch error: {}", e),
            }
        })
        .context("Failed to create file watcher")?;

        for root in roots {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .with_context(|| format!("Failed to watch {:?}", root))?;
            debug!("Watching {:?}", root);
        }

        Ok((
            Self {
                watcher: Mutex::new(Some(watcher)),
            },
            rx,
        ))
    }

    /// Stop intake. Events already forwarded are still delivered.
    pub fn close(&self) {
        if let Ok(mut watcher) = self.watcher.lock()
            && watcher.take().is_some()
        {
            debug!("Watcher closed");
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.lock().map(|w| w.is_some()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_close_ends_stream() {
        let dir = tempdir().unwrap();
        let (watcher, mut rx) = FsWatcher::start(&[dir.path().to_path_buf()]).unwrap();
        assert!(watcher.is_watching());

        watcher.close();
        assert!(!watcher.is_watching());
        watcher.close();

        let ended = tokio::time::timeout(Duration::from_secs(5), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(ended.is_ok());
    }

    #[tokio::test]
    async fn test_missing_root_fails() {
        let dir = tempdir().unwrap();
        assert!(FsWatcher::start(&[dir.path().join("missing")]).is_err());
    }
}
