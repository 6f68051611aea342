//! Reader registry — opens media readers on demand, keyed by clip, and
//! retires them by time-range activity rather than LRU.
//!
//! The registry is owned exclusively by the scheduler thread. Eviction is
//! two-phase: an idle reader is asked to `stop()` and parked on a
//! stopping list; it is only dropped once it reports `has_stopped()`, so
//! a reader's asynchronous shutdown can never re-enter the scheduler.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use rp_common::TimeRange;
use rp_media::{IoSystem, MediaError, MediaInfo, Options, VideoRead, SEQUENCE_DEFAULT_SPEED};
use rp_timeline::{walker, ClipId, Composition};

/// An open reader plus the metadata snapshot taken at open time.
pub(crate) struct ReaderEntry {
    pub read: Arc<dyn VideoRead>,
    pub info: MediaInfo,
}

impl std::fmt::Debug for ReaderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderEntry")
            .field("path", &self.read.path())
            .field("info", &self.info)
            .finish()
    }
}

pub(crate) struct ReaderRegistry {
    io: Arc<dyn IoSystem>,
    /// Directory relative media paths resolve against (the document's).
    timeline_dir: Option<PathBuf>,
    open: HashMap<ClipId, ReaderEntry>,
    stopping: Vec<Arc<dyn VideoRead>>,
}

impl ReaderRegistry {
    pub fn new(io: Arc<dyn IoSystem>, timeline_dir: Option<PathBuf>) -> Self {
        Self {
            io,
            timeline_dir,
            open: HashMap::new(),
            stopping: Vec::new(),
        }
    }

    /// Resolve a clip's media path, fixing relative paths against the
    /// timeline directory.
    pub fn resolve_path(&self, comp: &Composition, id: ClipId) -> PathBuf {
        let path = comp.clip(id).media.path();
        match (&self.timeline_dir, path.is_relative()) {
            (Some(dir), true) => dir.join(path),
            _ => path,
        }
    }

    /// Return the reader for a clip, opening it on first access.
    ///
    /// Opening resolves the media path, injects the timeline rate as the
    /// sequence default speed, and snapshots the reader's info. Media
    /// without a video stream is rejected.
    pub fn get_or_open(
        &mut self,
        comp: &Composition,
        id: ClipId,
        options: &Options,
    ) -> Result<&ReaderEntry, MediaError> {
        if !self.open.contains_key(&id) {
            let path = self.resolve_path(comp, id);
            let mut options = options.clone();
            options.insert(SEQUENCE_DEFAULT_SPEED.to_string(), comp.rate().to_string());
            let read = self.io.read(&path, &options)?;
            let info = read.info().clone();
            if !info.has_video() {
                return Err(MediaError::NoVideo { path });
            }
            info!(clip = %id, path = %path.display(), "opened media reader");
            self.open.insert(id, ReaderEntry { read, info });
        }
        Ok(self.open.get(&id).expect("just inserted"))
    }

    /// Stop readers whose effective range no longer intersects any active
    /// range. Readers with unresolved reads survive until those drain.
    pub fn evict_idle(&mut self, comp: &Composition, active: &[TimeRange]) {
        let mut idle = Vec::new();
        for (&id, entry) in &self.open {
            let range = walker::effective_range(comp, id);
            let wanted = active.iter().any(|a| range.intersects(*a));
            if !wanted && !entry.read.has_pending() {
                idle.push(id);
            }
        }
        for id in idle {
            let entry = self.open.remove(&id).expect("picked from the map");
            info!(clip = %id, path = %entry.read.path().display(), "stopping idle media reader");
            entry.read.stop();
            self.stopping.push(entry.read);
        }
    }

    /// Drop readers whose asynchronous shutdown has completed.
    pub fn reap(&mut self) {
        self.stopping.retain(|read| {
            if read.has_stopped() {
                debug!(path = %read.path().display(), "dropped stopped media reader");
                false
            } else {
                true
            }
        });
    }

    /// Ask every open reader to discard queued decode work.
    pub fn cancel_all(&self) {
        for entry in self.open.values() {
            entry.read.cancel_all();
        }
    }

    /// Move every open reader to the stopping list (facade teardown).
    pub fn stop_all(&mut self) {
        for (_, entry) in self.open.drain() {
            entry.read.stop();
            self.stopping.push(entry.read);
        }
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn stopping_count(&self) -> usize {
        self.stopping.len()
    }
}
