//! The reader abstraction: an opaque media source producing one image
//! per requested media time.
//!
//! Readers decode on their own threads and hand results back through
//! [`PendingVideo`], a one-shot future the scheduler polls without
//! blocking. A reader that drops a request (cancel, shutdown, decode
//! failure) resolves the future to "no image" — a pending read can never
//! hang its consumer.

use std::path::Path;
use std::sync::Arc;

use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError};

use rp_common::{Image, RationalTime};

use crate::info::MediaInfo;

/// One decoded video frame. `image` is `None` when the requested time is
/// outside the media's range or the decode was cancelled.
#[derive(Clone, Debug, Default)]
pub struct VideoFrame {
    pub time: RationalTime,
    pub image: Option<Arc<Image>>,
}

/// Producer half of a pending read. Fulfilling is infallible: if the
/// consumer is gone the frame is simply dropped.
pub struct VideoPromise {
    tx: Sender<VideoFrame>,
}

impl VideoPromise {
    pub fn fulfill(self, frame: VideoFrame) {
        let _ = self.tx.send(frame);
    }
}

/// Consumer half of a pending read: a cancellable one-shot future.
///
/// `ready()` is a non-blocking poll; once it returns true, `take()`
/// yields the frame (or `None` if the producer dropped the request).
/// `wait()` blocks until resolution.
pub struct PendingVideo {
    rx: Option<Receiver<VideoFrame>>,
    slot: Option<VideoFrame>,
    done: bool,
}

impl PendingVideo {
    /// Create a connected promise/future pair.
    pub fn channel() -> (VideoPromise, PendingVideo) {
        let (tx, rx) = bounded(1);
        (
            VideoPromise { tx },
            PendingVideo {
                rx: Some(rx),
                slot: None,
                done: false,
            },
        )
    }

    /// A future that is already resolved.
    pub fn ready_now(frame: VideoFrame) -> Self {
        Self {
            rx: None,
            slot: Some(frame),
            done: true,
        }
    }

    /// Non-blocking poll. Returns true once the read has resolved,
    /// including resolution-by-abandonment.
    pub fn ready(&mut self) -> bool {
        if self.done {
            return true;
        }
        match self.rx.as_ref().map(|rx| rx.try_recv()) {
            Some(Ok(frame)) => {
                self.slot = Some(frame);
                self.done = true;
            }
            Some(Err(TryRecvError::Disconnected)) | None => {
                self.done = true;
            }
            Some(Err(TryRecvError::Empty)) => {}
        }
        self.done
    }

    /// Consume the resolved frame. Polls once if not yet polled.
    pub fn take(mut self) -> Option<VideoFrame> {
        if !self.done {
            self.ready();
        }
        self.slot.take()
    }

    /// Block until the read resolves.
    pub fn wait(mut self) -> Option<VideoFrame> {
        if self.done {
            return self.slot.take();
        }
        self.rx.take().and_then(|rx| rx.recv().ok())
    }
}

/// Capability set every media reader implements.
///
/// Variants include image-sequence readers and movie-container readers;
/// consumers do not distinguish them. Concurrent reads against one reader
/// are serialized by the reader itself.
pub trait VideoRead: Send + Sync {
    /// The path this reader was opened from.
    fn path(&self) -> &Path;

    /// Metadata snapshot, resolved at open time.
    fn info(&self) -> &MediaInfo;

    /// Request the frame at `time` (in the media's clock).
    ///
    /// Times outside the declared video range resolve to an empty frame
    /// rather than fail. `buffer` is an optional reusable image the reader
    /// may fill when its descriptor matches.
    fn read_video(
        &self,
        time: RationalTime,
        layer: u16,
        buffer: Option<Arc<Image>>,
    ) -> PendingVideo;

    /// Whether any accepted reads have not yet resolved.
    fn has_pending(&self) -> bool;

    /// Discard queued decode work. Outstanding futures resolve to
    /// "no image".
    fn cancel_all(&self);

    /// Begin asynchronous shutdown.
    fn stop(&self);

    /// True once shutdown has finished and the reader is safe to drop.
    fn has_stopped(&self) -> bool;
}

impl std::fmt::Debug for dyn VideoRead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoRead").field("path", &self.path()).finish()
    }
}
