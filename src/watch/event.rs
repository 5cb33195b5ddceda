use notify::EventKind;
use notify::event::{CreateKind, ModifyKind, RemoveKind};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    Add,
    AddDir,
    Change,
    Unlink,
    UnlinkDir,
}

impl WatchEventKind {
    pub fn is_remove(&self) -> bool {
        matches!(self, WatchEventKind::Unlink | WatchEventKind::UnlinkDir)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, WatchEventKind::AddDir | WatchEventKind::UnlinkDir)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

impl WatchEvent {
    pub fn new(path: impl Into<PathBuf>, kind: WatchEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// What is currently at an event's path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Dir,
    File,
    Missing,
}

impl Probe {
    pub fn of(path: &Path) -> Self {
        match std::fs::metadata(path) {
            Ok(metadata) if metadata.is_dir() => Probe::Dir,
            Ok(_) => Probe::File,
            Err(_) => Probe::Missing,
        }
    }
}

/// Map a notify event kind onto a [`WatchEventKind`]. `probe` is only called
/// when the notify kind leaves the entry type open.
pub fn classify(kind: &EventKind, probe: impl Fn() -> Probe) -> Option<WatchEventKind> {
    match kind {
        EventKind::Create(CreateKind::File) => Some(WatchEventKind::Add),
        EventKind::Create(CreateKind::Folder) => Some(WatchEventKind::AddDir),
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_)) => match probe() {
            Probe::Dir => Some(WatchEventKind::AddDir),
            Probe::File => Some(WatchEventKind::Add),
            Probe::Missing if matches!(kind, EventKind::Modify(_)) => Some(WatchEventKind::Unlink),
            Probe::Missing => None,
        },
        EventKind::Modify(_) => match probe() {
            Probe::Dir => None,
            _ => Some(WatchEventKind::Change),
        },
        EventKind::Remove(RemoveKind::Folder) => Some(WatchEventKind::UnlinkDir),
        EventKind::Remove(_) => Some(WatchEventKind::Unlink),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

/// Translate a notify event into one [`WatchEvent`] per path.
pub fn translate(event: &notify::Event) -> Vec<WatchEvent> {
    event
        .paths
        .iter()
        .filter_map(|path| {
            classify(&event.kind, || Probe::of(path)).map(|kind| WatchEvent::new(path.clone(), kind))
        })
        .collect()
}
