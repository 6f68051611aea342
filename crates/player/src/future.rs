//! One-shot frame promise/future pair.
//!
//! The promise side lives with the scheduler, the future side with the
//! caller. Dropping an unfulfilled promise resolves the future with the
//! empty frame for the requested time, so a caller-held future can never
//! dangle — on cancel and shutdown paths resolution is automatic.

use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError};

use rp_common::{Frame, RationalTime};

/// Create a connected promise/future pair for a request at `time`.
pub fn frame_channel(time: RationalTime) -> (FramePromise, FrameFuture) {
    let (tx, rx) = bounded(1);
    (
        FramePromise {
            tx: Some(tx),
            time,
        },
        FrameFuture { rx, time },
    )
}

/// Producer half: fulfilled once, or auto-resolved empty on drop.
pub struct FramePromise {
    tx: Option<Sender<Frame>>,
    time: RationalTime,
}

impl FramePromise {
    pub fn fulfill(mut self, frame: Frame) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(frame);
        }
    }
}

impl Drop for FramePromise {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Frame::empty(self.time));
        }
    }
}

/// Caller-visible future for a requested frame.
pub struct FrameFuture {
    rx: Receiver<Frame>,
    time: RationalTime,
}

impl FrameFuture {
    /// The requested presentation time.
    pub fn time(&self) -> RationalTime {
        self.time
    }

    /// Non-blocking poll; consumes the frame when it has arrived.
    pub fn try_frame(&self) -> Option<Frame> {
        match self.rx.try_recv() {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty) => None,
            // The promise guarantees a send before disconnecting; an empty
            // frame here means it was consumed by an earlier poll.
            Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Block until the frame arrives.
    pub fn wait(self) -> Frame {
        self.rx.recv().unwrap_or_else(|_| Frame::empty(self.time))
    }
}
