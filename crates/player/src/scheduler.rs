//! The frame scheduler: a single background worker that drains the
//! request queue, fans each request out into per-clip reader reads,
//! collects the results into composited frames, and drives reader
//! lifetimes against the active-range set.
//!
//! One tick:
//!
//! 1. Under the lock: wait (bounded) for work, promote queued requests up
//!    to the in-flight budget, snapshot tuning and active ranges.
//! 2. Propagate a pending cancel to every open reader.
//! 3. Dispatch promoted requests through the composition walker.
//! 4. Poll in-flight requests non-blockingly; a request is fulfilled only
//!    once every layer read has resolved.
//! 5. Evict idle readers against the active ranges, then reap stopped
//!    ones. Eviction runs after dispatch so a just-promoted request is
//!    never orphaned.
//!
//! The scheduler never blocks on a reader during normal operation and
//! never lets a promise dangle: errors are captured per request, logged,
//! and reflected as empty or partial frames.

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use rp_common::{Frame, FrameLayer, Image, RationalTime, TimeRange, TransitionKind};
use rp_media::{MediaError, Options, PendingVideo};
use rp_timeline::{walker, ClipId, Composition};

use crate::future::FramePromise;
use crate::registry::ReaderRegistry;

pub(crate) const DEFAULT_REQUEST_COUNT: usize = 16;
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(1);

/// How often the scheduler emits a status line.
const STATUS_LOG_PERIOD: Duration = Duration::from_secs(10);

/// Runtime tuning knobs, read under the lock each tick.
pub(crate) struct Tuning {
    pub request_count: usize,
    pub request_timeout: Duration,
    pub io_options: Options,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            request_count: DEFAULT_REQUEST_COUNT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            io_options: Options::new(),
        }
    }
}

/// A caller request waiting in the queue.
pub(crate) struct QueuedRequest {
    pub time: RationalTime,
    pub video_layer: u16,
    pub buffer: Option<Arc<Image>>,
    pub promise: FramePromise,
}

/// Everything shared between caller threads and the scheduler thread.
pub(crate) struct Shared {
    pub queue: VecDeque<QueuedRequest>,
    pub stopped: bool,
    pub tuning: Tuning,
    pub active_ranges: Vec<TimeRange>,
    /// Bumped by `cancel_frames`; the scheduler forwards each bump to the
    /// open readers within one tick.
    pub cancel_generation: u64,
    // Mirrors of scheduler-owned state, refreshed each tick for stats.
    pub in_flight: usize,
    pub open_readers: usize,
}

pub(crate) struct State {
    pub shared: Mutex<Shared>,
    pub cond: Condvar,
    pub running: AtomicBool,
}

impl State {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            shared: Mutex::new(Shared {
                queue: VecDeque::new(),
                stopped: false,
                tuning: Tuning::default(),
                active_ranges: Vec::new(),
                cancel_generation: 0,
                in_flight: 0,
                open_readers: 0,
            }),
            cond: Condvar::new(),
            running: AtomicBool::new(true),
        })
    }
}

struct LayerInFlight {
    video: Option<PendingVideo>,
    video_b: Option<PendingVideo>,
    transition: TransitionKind,
    transition_value: f32,
}

struct RequestInFlight {
    time: RationalTime,
    promise: Option<FramePromise>,
    layers: Vec<LayerInFlight>,
}

impl RequestInFlight {
    /// Non-blocking poll: true once every layer read has resolved.
    fn ready(&mut self) -> bool {
        let mut all = true;
        for layer in &mut self.layers {
            if let Some(video) = layer.video.as_mut() {
                all &= video.ready();
            }
            if let Some(video) = layer.video_b.as_mut() {
                all &= video.ready();
            }
        }
        all
    }

    /// Assemble the frame and fulfill the promise. With `blocking` the
    /// unresolved reads are waited for (shutdown path); otherwise every
    /// read must already be resolved.
    fn finish(mut self, blocking: bool) {
        let mut frame = Frame::empty(self.time);
        for layer in self.layers.drain(..) {
            frame.layers.push(FrameLayer {
                image: resolve(layer.video, blocking),
                image_b: resolve(layer.video_b, blocking),
                transition: layer.transition,
                transition_value: layer.transition_value,
            });
        }
        if let Some(promise) = self.promise.take() {
            promise.fulfill(frame);
        }
    }
}

fn resolve(pending: Option<PendingVideo>, blocking: bool) -> Option<Arc<Image>> {
    let pending = pending?;
    let frame = if blocking {
        pending.wait()
    } else {
        pending.take()
    };
    frame.and_then(|f| f.image)
}

pub(crate) struct Scheduler {
    comp: Arc<Composition>,
    state: Arc<State>,
    registry: ReaderRegistry,
    in_flight: Vec<RequestInFlight>,
    seen_cancel: u64,
    log_timer: Instant,
    label: String,
}

impl Scheduler {
    pub fn new(
        comp: Arc<Composition>,
        state: Arc<State>,
        registry: ReaderRegistry,
        label: String,
    ) -> Self {
        Self {
            comp,
            state,
            registry,
            in_flight: Vec::new(),
            seen_cancel: 0,
            log_timer: Instant::now(),
            label,
        }
    }

    pub fn run(mut self) {
        while self.state.running.load(std::sync::atomic::Ordering::SeqCst) {
            self.tick();
        }
        self.shutdown();
    }

    fn tick(&mut self) {
        let mut promoted = Vec::new();
        let ranges;
        let options;
        let cancel_generation;
        {
            let mut shared = self.state.shared.lock();
            if shared.queue.is_empty() && self.in_flight.is_empty() {
                let timeout = shared.tuning.request_timeout;
                let _ = self.state.cond.wait_for(&mut shared, timeout);
            }
            let budget = shared.tuning.request_count;
            while self.in_flight.len() + promoted.len() < budget {
                match shared.queue.pop_front() {
                    Some(request) => promoted.push(request),
                    None => break,
                }
            }
            ranges = shared.active_ranges.clone();
            options = shared.tuning.io_options.clone();
            cancel_generation = shared.cancel_generation;
        }

        if cancel_generation != self.seen_cancel {
            self.seen_cancel = cancel_generation;
            self.registry.cancel_all();
        }

        for request in promoted {
            self.dispatch(request, &options);
        }

        // Fulfill whatever has fully resolved; later requests may finish
        // before earlier ones whose readers are still warming up.
        let mut i = 0;
        while i < self.in_flight.len() {
            if self.in_flight[i].ready() {
                self.in_flight.remove(i).finish(false);
            } else {
                i += 1;
            }
        }

        self.registry.evict_idle(&self.comp, &ranges);
        self.registry.reap();

        {
            let mut shared = self.state.shared.lock();
            shared.in_flight = self.in_flight.len();
            shared.open_readers = self.registry.open_count();
            if self.log_timer.elapsed() > STATUS_LOG_PERIOD {
                self.log_timer = Instant::now();
                debug!(
                    timeline = %self.label,
                    pending = shared.queue.len(),
                    in_flight = shared.in_flight,
                    budget = shared.tuning.request_count,
                    readers = shared.open_readers,
                    "frame scheduler status"
                );
            }
        }
    }

    /// Walk the composition for a promoted request and submit the
    /// per-layer reads. Failures are captured per layer: the request
    /// still completes, with empty images where reads could not start.
    fn dispatch(&mut self, request: QueuedRequest, options: &Options) {
        let track_time = request.time - self.comp.global_start();
        let mut layers = Vec::new();
        for layer in walker::video_layers(&self.comp, request.time) {
            let mut in_flight = LayerInFlight {
                video: None,
                video_b: None,
                transition: layer.transition,
                transition_value: layer.transition_value,
            };
            if let Some(id) = layer.clip {
                match self.read_clip(id, track_time, request.video_layer, request.buffer.clone(), options)
                {
                    Ok(pending) => in_flight.video = Some(pending),
                    Err(error) => self.log_read_error(id, &error),
                }
            }
            if let Some(id) = layer.clip_b {
                match self.read_clip(id, track_time, request.video_layer, None, options) {
                    Ok(pending) => in_flight.video_b = Some(pending),
                    Err(error) => self.log_read_error(id, &error),
                }
            }
            layers.push(in_flight);
        }
        self.in_flight.push(RequestInFlight {
            time: request.time,
            promise: Some(request.promise),
            layers,
        });
    }

    fn read_clip(
        &mut self,
        id: ClipId,
        track_time: RationalTime,
        video_layer: u16,
        buffer: Option<Arc<Image>>,
        options: &Options,
    ) -> Result<PendingVideo, MediaError> {
        let entry = self.registry.get_or_open(&self.comp, id, options)?;
        let media_rate = entry.info.video_rate();
        let time = walker::media_time(&self.comp, id, track_time, media_rate);
        Ok(entry.read.read_video(time, video_layer, buffer))
    }

    fn log_read_error(&self, id: ClipId, error: &MediaError) {
        let path = self.registry.resolve_path(&self.comp, id);
        warn!(
            timeline = %self.label,
            clip = %id,
            path = %path.display(),
            error = %error,
            "layer read failed"
        );
    }

    /// Drain everything and resolve every outstanding promise before the
    /// thread exits. Queued requests get empty frames; in-flight requests
    /// get whatever their reads deliver.
    fn shutdown(&mut self) {
        let drained: Vec<QueuedRequest> = {
            let mut shared = self.state.shared.lock();
            shared.stopped = true;
            shared.queue.drain(..).collect()
        };
        for request in drained {
            request.promise.fulfill(Frame::empty(request.time));
        }
        for request in std::mem::take(&mut self.in_flight) {
            request.finish(true);
        }
        self.registry.stop_all();
        // The stopping readers drop with the registry; their worker
        // threads wind down on their own.
    }
}
