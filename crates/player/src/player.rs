//! The public playback facade.
//!
//! A `Player` owns one composition and one scheduler thread. Frame
//! requests are submitted from any thread and resolve through
//! [`FrameFuture`]s; tuning knobs and the active-range set are
//! thread-safe. Dropping the player joins the scheduler and guarantees
//! every outstanding future is resolved first.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use rp_common::{Frame, Image, ImageInfo, RationalTime, TimeRange};
use rp_media::{IoSystem, MediaInfo, MediaKind, Options, SEQUENCE_DEFAULT_SPEED};
use rp_timeline::{
    document, Clip, Composition, Item, MediaReference, TimelineError, Track, TrackKind,
};

use crate::error::PlayerError;
use crate::future::{frame_channel, FrameFuture};
use crate::registry::ReaderRegistry;
use crate::scheduler::{QueuedRequest, Scheduler, State};

/// Point-in-time pipeline counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerStats {
    /// Requests waiting in the queue.
    pub pending: usize,
    /// Requests with outstanding reader reads.
    pub in_flight: usize,
    /// The in-flight budget.
    pub request_count: usize,
    /// Open media readers.
    pub readers: usize,
}

/// Serves composited frames for one composition.
pub struct Player {
    comp: Arc<Composition>,
    state: Arc<State>,
    duration: RationalTime,
    video_info: Vec<ImageInfo>,
    path: Option<PathBuf>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Player {
    /// Create a player over an already-parsed composition.
    pub fn from_composition(
        comp: Composition,
        io: Arc<dyn IoSystem>,
    ) -> Result<Self, PlayerError> {
        Self::create(comp, io, None)
    }

    /// Create a player from a path.
    ///
    /// If the I/O system can read the path directly, a single-clip
    /// timeline is synthesized around it; otherwise the path is parsed as
    /// an edit-list document.
    pub fn open(path: impl AsRef<Path>, io: Arc<dyn IoSystem>) -> Result<Self, PlayerError> {
        let path = path.as_ref();
        let comp = match io.read(path, &Options::new()) {
            Ok(read) => synthesize_composition(path, read.info())?,
            Err(error) => {
                debug!(path = %path.display(), error = %error, "not direct media, parsing as document");
                document::from_json_file(path)?
            }
        };
        Self::create(comp, io, Some(path.to_path_buf()))
    }

    fn create(
        comp: Composition,
        io: Arc<dyn IoSystem>,
        path: Option<PathBuf>,
    ) -> Result<Self, PlayerError> {
        let comp = Arc::new(comp);
        let duration = comp.duration();
        let timeline_dir = path.as_deref().and_then(Path::parent).map(PathBuf::from);
        let video_info = probe_video_info(&comp, io.as_ref(), timeline_dir.as_deref());
        let label = path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<composition>".to_string());
        info!(
            timeline = %label,
            duration = %duration,
            clips = comp.clip_count(),
            "created player"
        );

        let state = State::new();
        let registry = ReaderRegistry::new(io, timeline_dir);
        let scheduler = Scheduler::new(comp.clone(), state.clone(), registry, label);
        let worker = thread::Builder::new()
            .name("rp-player".to_string())
            .spawn(move || scheduler.run())
            .expect("spawn player scheduler thread");

        Ok(Self {
            comp,
            state,
            duration,
            video_info,
            path,
            worker: Some(worker),
        })
    }

    // ── Metadata ─────────────────────────────────────────────────

    pub fn composition(&self) -> &Composition {
        &self.comp
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn global_start_time(&self) -> RationalTime {
        self.comp.global_start()
    }

    pub fn duration(&self) -> RationalTime {
        self.duration
    }

    /// Video stream descriptors of the first readable clip, depth-first.
    /// Empty when no clip yields video info.
    pub fn video_info(&self) -> &[ImageInfo] {
        &self.video_info
    }

    // ── Frame serving ────────────────────────────────────────────

    /// Request the composited frame at `time`.
    ///
    /// `video_layer` selects the stream for multi-stream media; `buffer`
    /// is an optional reusable image for the primary layer.
    pub fn frame(
        &self,
        time: RationalTime,
        video_layer: u16,
        buffer: Option<Arc<Image>>,
    ) -> FrameFuture {
        let (promise, future) = frame_channel(time);
        let mut shared = self.state.shared.lock();
        if shared.stopped {
            drop(shared);
            promise.fulfill(Frame::empty(time));
        } else {
            shared.queue.push_back(QueuedRequest {
                time,
                video_layer,
                buffer,
                promise,
            });
            drop(shared);
            self.state.cond.notify_one();
        }
        future
    }

    /// Drop queued requests and ask every open reader to discard queued
    /// decode work. In-flight requests still resolve, possibly with
    /// missing images; dropped requests resolve with empty frames.
    pub fn cancel_frames(&self) {
        let drained: Vec<QueuedRequest> = {
            let mut shared = self.state.shared.lock();
            shared.cancel_generation += 1;
            shared.queue.drain(..).collect()
        };
        for request in drained {
            request.promise.fulfill(Frame::empty(request.time));
        }
        self.state.cond.notify_one();
    }

    // ── Tuning ───────────────────────────────────────────────────

    /// Replace the active-range set. Readers whose effective range
    /// intersects no active range become eligible for eviction on the
    /// next scheduler tick.
    pub fn set_active_ranges(&self, ranges: Vec<TimeRange>) {
        self.state.shared.lock().active_ranges = ranges;
    }

    pub fn active_ranges(&self) -> Vec<TimeRange> {
        self.state.shared.lock().active_ranges.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.shared.lock().tuning.request_count
    }

    /// Set the in-flight request budget.
    pub fn set_request_count(&self, count: usize) {
        self.state.shared.lock().tuning.request_count = count;
    }

    pub fn request_timeout(&self) -> Duration {
        self.state.shared.lock().tuning.request_timeout
    }

    /// Set the scheduler's bounded condition-variable wait.
    pub fn set_request_timeout(&self, timeout: Duration) {
        self.state.shared.lock().tuning.request_timeout = timeout;
    }

    /// Replace the options forwarded on every reader open.
    pub fn set_io_options(&self, options: Options) {
        self.state.shared.lock().tuning.io_options = options;
    }

    pub fn stats(&self) -> PlayerStats {
        let shared = self.state.shared.lock();
        PlayerStats {
            pending: shared.queue.len(),
            in_flight: shared.in_flight,
            request_count: shared.tuning.request_count,
            readers: shared.open_readers,
        }
    }
}

impl Drop for Player {
    /// Joins the scheduler thread; every outstanding future is resolved
    /// before this returns.
    fn drop(&mut self) {
        self.state.running.store(false, Ordering::SeqCst);
        self.state.cond.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Wrap a directly-readable media file in a single-clip timeline.
fn synthesize_composition(path: &Path, info: &MediaInfo) -> Result<Composition, TimelineError> {
    let range = info.video_time_range;
    let rate = range.duration.rate;
    let mut global_start = RationalTime::new(0, rate);
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let media = match split_sequence_name(path) {
        Some((prefix, digits, suffix)) if info.kind == MediaKind::Sequence => {
            // Numbered sequences keep their own clock as the global start.
            global_start = range.start;
            MediaReference::Sequence {
                base: path
                    .parent()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                prefix,
                suffix,
                start_frame: range.start.value,
                padding: digits.len(),
                rate,
            }
        }
        _ => MediaReference::External {
            url: path.to_string_lossy().into_owned(),
        },
    };

    let mut track = Track::new(TrackKind::Video, "V1");
    track.push(Item::Clip(Clip::new(name, media, range)));
    Composition::new(vec![track], global_start)
}

/// Split a filename with a trailing frame number into
/// `(prefix, digits, suffix)`: `"frame.0101.exr"` ->
/// `("frame.", "0101", ".exr")`.
fn split_sequence_name(path: &Path) -> Option<(String, String, String)> {
    let file = path.file_name()?.to_str()?;
    let (stem, suffix) = match file.rfind('.') {
        Some(i) => (&file[..i], &file[i..]),
        None => (file, ""),
    };
    let prefix = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &stem[prefix.len()..];
    if digits.is_empty() {
        return None;
    }
    Some((prefix.to_string(), digits.to_string(), suffix.to_string()))
}

/// Depth-first scan for the first clip whose reader yields non-empty
/// video info; that clip defines the image information for the timeline.
fn probe_video_info(
    comp: &Composition,
    io: &dyn IoSystem,
    timeline_dir: Option<&Path>,
) -> Vec<ImageInfo> {
    for id in comp.clip_ids() {
        let clip = comp.clip(id);
        let mut path = clip.media.path();
        if path.is_relative() {
            if let Some(dir) = timeline_dir {
                path = dir.join(path);
            }
        }
        let mut options = Options::new();
        options.insert(
            SEQUENCE_DEFAULT_SPEED.to_string(),
            clip.source_range.duration.rate.to_string(),
        );
        match io.read(&path, &options) {
            Ok(read) => {
                let info = read.info();
                if info.has_video() {
                    return info.video.clone();
                }
            }
            Err(error) => {
                debug!(path = %path.display(), error = %error, "video info probe skipped clip");
            }
        }
    }
    Vec::new()
}
