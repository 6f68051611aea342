//! In-memory synthetic media.
//!
//! `MemoryIo` stands in for a real codec stack: it registers media
//! descriptions keyed by path and opens `MemoryReader`s over them. Each
//! reader runs a decode worker thread fed through a crossbeam channel, so
//! the full reader contract is exercised — serialized reads, configurable
//! decode latency, cancellation of queued work, asynchronous shutdown.
//! Frames are solid-pattern images derived from the request time.
//!
//! Used by the engine's tests and demos; production deployments plug in a
//! real `IoSystem`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

use rp_common::{Image, ImageInfo, PixelFormat, RationalTime, Resolution, TimeRange};

use crate::error::MediaError;
use crate::info::{MediaInfo, MediaKind};
use crate::io::IoSystem;
use crate::options::Options;
use crate::read::{PendingVideo, VideoFrame, VideoPromise, VideoRead};

/// Description of one registered media source.
#[derive(Clone, Debug)]
pub struct MemoryMedia {
    pub info: MediaInfo,
    /// Simulated decode time per frame.
    pub latency: Duration,
}

impl MemoryMedia {
    /// A video-only container with RGBA frames of the given size.
    pub fn video(video_time_range: TimeRange, size: Resolution) -> Self {
        Self {
            info: MediaInfo {
                video: vec![ImageInfo::new(size, PixelFormat::Rgba8)],
                video_time_range,
                kind: MediaKind::Container,
                tags: Default::default(),
            },
            latency: Duration::ZERO,
        }
    }

    pub fn with_kind(mut self, kind: MediaKind) -> Self {
        self.info.kind = kind;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

type ServeLog = Arc<Mutex<Vec<(PathBuf, RationalTime)>>>;

/// An I/O system over registered in-memory media.
#[derive(Default)]
pub struct MemoryIo {
    media: Mutex<HashMap<PathBuf, MemoryMedia>>,
    opened: Mutex<Vec<PathBuf>>,
    last_options: Mutex<Options>,
    served: ServeLog,
}

impl MemoryIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register media under a path.
    pub fn insert(&self, path: impl Into<PathBuf>, media: MemoryMedia) {
        self.media.lock().insert(path.into(), media);
    }

    /// Every path successfully opened, in order.
    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().clone()
    }

    /// How many times `path` has been opened.
    pub fn open_count(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        self.opened.lock().iter().filter(|p| *p == path).count()
    }

    /// The options map passed to the most recent open.
    pub fn last_options(&self) -> Options {
        self.last_options.lock().clone()
    }

    /// Every `(path, time)` served by any reader, in decode order.
    pub fn served(&self) -> Vec<(PathBuf, RationalTime)> {
        self.served.lock().clone()
    }
}

impl IoSystem for MemoryIo {
    fn read(&self, path: &Path, options: &Options) -> Result<Arc<dyn VideoRead>, MediaError> {
        let media = self
            .media
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| MediaError::OpenFailed {
                path: path.to_path_buf(),
                reason: "no such media registered".to_string(),
            })?;
        self.opened.lock().push(path.to_path_buf());
        *self.last_options.lock() = options.clone();
        Ok(Arc::new(MemoryReader::open(
            path.to_path_buf(),
            media,
            self.served.clone(),
        )))
    }
}

enum Job {
    Read {
        time: RationalTime,
        buffer: Option<Arc<Image>>,
        generation: u64,
        reply: VideoPromise,
    },
    Stop,
}

/// A reader over registered in-memory media, decoding on its own worker
/// thread.
pub struct MemoryReader {
    path: PathBuf,
    info: MediaInfo,
    tx: Sender<Job>,
    pending: Arc<AtomicUsize>,
    generation: Arc<AtomicU64>,
    stopped: Arc<AtomicBool>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl MemoryReader {
    fn open(path: PathBuf, media: MemoryMedia, served: ServeLog) -> Self {
        let (tx, rx) = unbounded();
        let pending = Arc::new(AtomicUsize::new(0));
        let generation = Arc::new(AtomicU64::new(0));
        let stopped = Arc::new(AtomicBool::new(false));

        let worker = {
            let path = path.clone();
            let info = media.info.clone();
            let latency = media.latency;
            let pending = pending.clone();
            let generation = generation.clone();
            let stopped = stopped.clone();
            thread::Builder::new()
                .name("rp-memory-reader".to_string())
                .spawn(move || {
                    decode_loop(rx, path, info, latency, served, pending, generation);
                    stopped.store(true, Ordering::SeqCst);
                })
                .expect("spawn memory reader worker")
        };

        Self {
            path,
            info: media.info,
            tx,
            pending,
            generation,
            stopped,
            worker: Mutex::new(Some(worker)),
        }
    }
}

fn decode_loop(
    rx: Receiver<Job>,
    path: PathBuf,
    info: MediaInfo,
    latency: Duration,
    served: ServeLog,
    pending: Arc<AtomicUsize>,
    generation: Arc<AtomicU64>,
) {
    while let Ok(job) = rx.recv() {
        match job {
            Job::Stop => break,
            Job::Read {
                time,
                buffer,
                generation: job_generation,
                reply,
            } => {
                if job_generation < generation.load(Ordering::SeqCst) {
                    // Cancelled; dropping the reply resolves the future.
                    pending.fetch_sub(1, Ordering::SeqCst);
                    continue;
                }
                if !latency.is_zero() {
                    thread::sleep(latency);
                }
                // Re-check after the decode: a cancel that arrived while
                // decoding discards the result, the future still resolves.
                if job_generation < generation.load(Ordering::SeqCst) {
                    pending.fetch_sub(1, Ordering::SeqCst);
                    continue;
                }
                let frame = if info.video_time_range.contains(time) {
                    VideoFrame {
                        time,
                        image: Some(render(&info, time, buffer)),
                    }
                } else {
                    VideoFrame { time, image: None }
                };
                served.lock().push((path.clone(), time));
                reply.fulfill(frame);
                pending.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
    // Reads queued behind the stop never decode; their futures resolve as
    // the jobs are dropped here.
    while let Ok(job) = rx.try_recv() {
        if matches!(job, Job::Read { .. }) {
            pending.fetch_sub(1, Ordering::SeqCst);
        }
    }
    debug!(path = %path.display(), "memory reader worker exited");
}

/// Produce the solid-pattern frame for `time`, reusing `buffer` when its
/// descriptor matches.
fn render(info: &MediaInfo, time: RationalTime, buffer: Option<Arc<Image>>) -> Arc<Image> {
    let descriptor = info.video[0];
    let mut image = match buffer {
        Some(buffer) if buffer.info() == descriptor => buffer,
        _ => Arc::new(Image::new(descriptor)),
    };
    let byte = (time.value.rem_euclid(251) + 1) as u8;
    Arc::make_mut(&mut image).data_mut().fill(byte);
    image
}

impl VideoRead for MemoryReader {
    fn path(&self) -> &Path {
        &self.path
    }

    fn info(&self) -> &MediaInfo {
        &self.info
    }

    fn read_video(
        &self,
        time: RationalTime,
        _layer: u16,
        buffer: Option<Arc<Image>>,
    ) -> PendingVideo {
        let (reply, pending_video) = PendingVideo::channel();
        self.pending.fetch_add(1, Ordering::SeqCst);
        let job = Job::Read {
            time,
            buffer,
            generation: self.generation.load(Ordering::SeqCst),
            reply,
        };
        if self.tx.send(job).is_err() {
            // Worker already gone; the dropped job resolved the future.
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
        pending_video
    }

    fn has_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    fn cancel_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        let _ = self.tx.send(Job::Stop);
    }

    fn has_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for MemoryReader {
    fn drop(&mut self) {
        let _ = self.tx.send(Job::Stop);
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rt(value: i64, rate: i64) -> RationalTime {
        RationalTime::new(value, rate)
    }

    fn range(start: i64, duration: i64) -> TimeRange {
        TimeRange::new(rt(start, 24), rt(duration, 24))
    }

    fn io_with(path: &str, media: MemoryMedia) -> MemoryIo {
        let io = MemoryIo::new();
        io.insert(path, media);
        io
    }

    fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        check()
    }

    // ── Opening ──────────────────────────────────────────────────

    #[test]
    fn open_unregistered_path_fails() {
        let io = MemoryIo::new();
        let err = io.read(Path::new("/missing.mov"), &Options::new()).unwrap_err();
        assert!(matches!(err, MediaError::OpenFailed { .. }));
    }

    #[test]
    fn open_records_path_and_options() {
        let io = io_with("/a.mov", MemoryMedia::video(range(0, 48), Resolution::new(8, 8)));
        let mut options = Options::new();
        options.insert("Custom/Key".into(), "value".into());

        let read = io.read(Path::new("/a.mov"), &options).unwrap();
        assert_eq!(read.info().video_time_range, range(0, 48));
        assert_eq!(io.opened(), vec![PathBuf::from("/a.mov")]);
        assert_eq!(io.last_options().get("Custom/Key").unwrap(), "value");
    }

    // ── Reading ──────────────────────────────────────────────────

    #[test]
    fn read_in_range_produces_image() {
        let io = io_with("/a.mov", MemoryMedia::video(range(0, 48), Resolution::new(8, 8)));
        let read = io.read(Path::new("/a.mov"), &Options::new()).unwrap();

        let frame = read.read_video(rt(10, 24), 0, None).wait().unwrap();
        assert_eq!(frame.time, rt(10, 24));
        let image = frame.image.unwrap();
        assert!(image.data().iter().all(|&b| b == 11));
    }

    #[test]
    fn read_outside_range_is_empty_not_an_error() {
        let io = io_with("/a.mov", MemoryMedia::video(range(0, 48), Resolution::new(8, 8)));
        let read = io.read(Path::new("/a.mov"), &Options::new()).unwrap();

        let frame = read.read_video(rt(99, 24), 0, None).wait().unwrap();
        assert_eq!(frame.time, rt(99, 24));
        assert!(frame.image.is_none());
    }

    #[test]
    fn reads_are_served_in_submission_order() {
        let io = io_with("/a.mov", MemoryMedia::video(range(0, 48), Resolution::new(4, 4)));
        let read = io.read(Path::new("/a.mov"), &Options::new()).unwrap();

        let futures: Vec<_> = (0..5).map(|i| read.read_video(rt(i, 24), 0, None)).collect();
        for future in futures {
            future.wait().unwrap();
        }
        let times: Vec<_> = io.served().into_iter().map(|(_, t)| t.value).collect();
        assert_eq!(times, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn mismatched_buffer_is_ignored() {
        let io = io_with("/a.mov", MemoryMedia::video(range(0, 48), Resolution::new(8, 8)));
        let read = io.read(Path::new("/a.mov"), &Options::new()).unwrap();

        let wrong = Arc::new(Image::new(ImageInfo::new(
            Resolution::new(2, 2),
            PixelFormat::Rgba8,
        )));
        let frame = read.read_video(rt(0, 24), 0, Some(wrong)).wait().unwrap();
        assert_eq!(frame.image.unwrap().info().size, Resolution::new(8, 8));
    }

    // ── Pending / cancel ─────────────────────────────────────────

    #[test]
    fn has_pending_while_decoding() {
        let media = MemoryMedia::video(range(0, 48), Resolution::new(4, 4))
            .with_latency(Duration::from_millis(50));
        let io = io_with("/slow.mov", media);
        let read = io.read(Path::new("/slow.mov"), &Options::new()).unwrap();

        let future = read.read_video(rt(0, 24), 0, None);
        assert!(read.has_pending());
        future.wait().unwrap();
        assert!(wait_until(Duration::from_secs(1), || !read.has_pending()));
    }

    #[test]
    fn cancel_discards_queued_and_in_decode_work() {
        let media = MemoryMedia::video(range(0, 48), Resolution::new(4, 4))
            .with_latency(Duration::from_millis(100));
        let io = io_with("/slow.mov", media);
        let read = io.read(Path::new("/slow.mov"), &Options::new()).unwrap();

        let first = read.read_video(rt(0, 24), 0, None);
        let second = read.read_video(rt(1, 24), 0, None);
        read.cancel_all();

        // Both futures resolve, neither carries a decode result.
        assert!(first.wait().is_none());
        assert!(second.wait().is_none());
    }

    #[test]
    fn reads_after_cancel_decode_normally() {
        let io = io_with("/a.mov", MemoryMedia::video(range(0, 48), Resolution::new(4, 4)));
        let read = io.read(Path::new("/a.mov"), &Options::new()).unwrap();

        read.cancel_all();
        let frame = read.read_video(rt(2, 24), 0, None).wait().unwrap();
        assert!(frame.image.is_some());
    }

    // ── Shutdown ─────────────────────────────────────────────────

    #[test]
    fn stop_finishes_asynchronously() {
        let io = io_with("/a.mov", MemoryMedia::video(range(0, 48), Resolution::new(4, 4)));
        let read = io.read(Path::new("/a.mov"), &Options::new()).unwrap();

        assert!(!read.has_stopped());
        read.stop();
        assert!(wait_until(Duration::from_secs(1), || read.has_stopped()));
    }

    #[test]
    fn reads_after_stop_resolve_to_nothing() {
        let io = io_with("/a.mov", MemoryMedia::video(range(0, 48), Resolution::new(4, 4)));
        let read = io.read(Path::new("/a.mov"), &Options::new()).unwrap();

        read.stop();
        assert!(wait_until(Duration::from_secs(1), || read.has_stopped()));
        assert!(read.read_video(rt(0, 24), 0, None).wait().is_none());
    }
}
