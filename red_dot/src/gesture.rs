//! Gesture classifier: camera frames in, grow/shrink commands out.
//!
//! The classifier only talks to two seams: a [`Camera`] that produces frames
//! and a [`HandDetector`] that finds at most one hand in a frame.  Commands
//! are edge-triggered: holding the same hand shape across many frames sends
//! one command, not one per frame.
//!
//! Backends:
//!
//! * (default): [`SimCamera`] + [`SimDetector`]: the hand is a finger count
//!   set from the window's number keys.
//! * `leap`: `LeapCamera` + [`PassthroughDetector`]: landmarks from a real
//!   LeapMotion controller.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dot_signal::{CancelFlag, CommandSender};
use dot_state::Command;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::hand::{classify_fingers, count_extended_fingers, HandLandmarks};

/// Pause between frames, observed through the cancellation flag.
pub const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(10);

// ════════════════════════════════════════════════════════════════════════════
// Seams
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("no camera found")]
    NotFound,
    #[error("failed to read frame: {0}")]
    Read(String),
}

/// A frame source.  Dropping the camera releases the device, so every exit
/// path of the classifier releases it.
pub trait Camera {
    type Frame;

    fn read_frame(&mut self) -> Result<Self::Frame, CameraError>;
}

/// Finds zero or one hand in a frame.
pub trait HandDetector<F> {
    fn detect(&mut self, frame: &F) -> Option<HandLandmarks>;
}

// ════════════════════════════════════════════════════════════════════════════
// EdgeTrigger
// ════════════════════════════════════════════════════════════════════════════

/// Remembers the last emitted state and lets only changes through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EdgeTrigger {
    last: Option<Command>,
}

impl EdgeTrigger {
    /// `Some(cmd)` when `state` differs from the last emitted state.
    pub fn observe(&mut self, state: Command) -> Option<Command> {
        if self.last == Some(state) {
            return None;
        }
        self.last = Some(state);
        Some(state)
    }

    /// Forget the last state; the next observation always fires.
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn last(&self) -> Option<Command> {
        self.last
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Classifier loop
// ════════════════════════════════════════════════════════════════════════════

/// Why the gesture classifier stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureExit {
    /// No camera; gesture control never started.
    Disabled,
    Cancelled,
    /// A frame could not be read.  Only gesture control ends.
    CameraFailed,
    ChannelClosed,
}

pub struct GestureClassifier<C, D> {
    camera:   C,
    detector: D,
    trigger:  EdgeTrigger,
    tx:       CommandSender,
    cancel:   CancelFlag,
    poll:     Duration,
    /// Finger count of the last processed frame, for the status overlay.
    seen:     FingerCell,
}

impl<C, D> GestureClassifier<C, D>
where
    C: Camera,
    D: HandDetector<C::Frame>,
{
    pub fn new(camera: C, detector: D, tx: CommandSender, cancel: CancelFlag) -> Self {
        GestureClassifier {
            camera,
            detector,
            trigger: EdgeTrigger::default(),
            tx,
            cancel,
            poll: FRAME_POLL_INTERVAL,
            seen: FingerCell::new(),
        }
    }

    /// Publish each frame's finger count (or no hand) into `seen`.
    pub fn with_readout(mut self, seen: FingerCell) -> Self {
        self.seen = seen;
        self
    }

    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Process one frame.  `Some` means the loop must stop.
    pub fn step(&mut self) -> Option<GestureExit> {
        let frame = match self.camera.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!(reason = %e, "gesture control stopped");
                return Some(GestureExit::CameraFailed);
            }
        };
        if self.cancel.is_cancelled() {
            return Some(GestureExit::Cancelled);
        }

        match self.detector.detect(&frame) {
            Some(hand) => {
                let fingers = count_extended_fingers(&hand);
                debug!(fingers, "hand detected");
                self.seen.set(Some(fingers));
                if let Some(cmd) = self.trigger.observe(classify_fingers(fingers)) {
                    debug!(command = %cmd, "gesture command");
                    if self.tx.send(cmd).is_err() {
                        return Some(GestureExit::ChannelClosed);
                    }
                }
            }
            None => {
                self.seen.set(None);
                self.trigger.reset();
            }
        }
        None
    }

    /// Run until cancelled, the camera fails or the render loop goes away.
    /// The camera is dropped (released) on return.
    pub fn run(mut self) -> GestureExit {
        let exit = loop {
            if self.cancel.is_cancelled() {
                break GestureExit::Cancelled;
            }
            if let Some(exit) = self.step() {
                break exit;
            }
            if self.cancel.wait_timeout(self.poll) {
                break GestureExit::Cancelled;
            }
        };
        self.seen.set(None);
        info!(?exit, "gesture worker finished, releasing camera");
        exit
    }
}

/// Open the camera and run the classifier on the current thread.
pub fn run_gesture_classifier<C, D, O>(
    open:     O,
    detector: D,
    tx:       CommandSender,
    cancel:   CancelFlag,
    seen:     FingerCell,
) -> GestureExit
where
    O: FnOnce() -> Result<C, CameraError>,
    C: Camera,
    D: HandDetector<C::Frame>,
{
    match open() {
        Ok(camera) => {
            info!("camera opened, gesture control active");
            GestureClassifier::new(camera, detector, tx, cancel)
                .with_readout(seen)
                .run()
        }
        Err(e) => {
            warn!(reason = %e, "gesture control disabled");
            GestureExit::Disabled
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Simulation backend
// ════════════════════════════════════════════════════════════════════════════

const NO_HAND: u8 = u8::MAX;

/// A finger count shared between threads, or no hand in view.
#[derive(Clone, Debug)]
pub struct FingerCell {
    fingers: Arc<AtomicU8>,
}

/// The simulated hand.  The window writes it from the keyboard;
/// [`SimCamera`] reads it.
pub type SimHand = FingerCell;

impl FingerCell {
    pub fn new() -> Self {
        FingerCell { fingers: Arc::new(AtomicU8::new(NO_HAND)) }
    }

    pub fn set(&self, fingers: Option<u8>) {
        let raw = fingers.map_or(NO_HAND, |n| n.min(5));
        self.fingers.store(raw, Ordering::Relaxed);
    }

    pub fn get(&self) -> Option<u8> {
        match self.fingers.load(Ordering::Relaxed) {
            NO_HAND => None,
            n => Some(n),
        }
    }
}

impl Default for FingerCell {
    fn default() -> Self {
        Self::new()
    }
}

/// A frame from [`SimCamera`]: just the finger count in view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimFrame {
    pub fingers: Option<u8>,
}

/// Delivers a [`SimFrame`] every `frame_interval`, like a ~30 fps webcam.
pub struct SimCamera {
    hand:           SimHand,
    frame_interval: Duration,
}

impl SimCamera {
    pub const FRAME_INTERVAL: Duration = Duration::from_millis(33);

    pub fn open(hand: SimHand) -> Result<Self, CameraError> {
        Ok(SimCamera { hand, frame_interval: Self::FRAME_INTERVAL })
    }
}

impl Camera for SimCamera {
    type Frame = SimFrame;

    fn read_frame(&mut self) -> Result<SimFrame, CameraError> {
        thread::sleep(self.frame_interval);
        Ok(SimFrame { fingers: self.hand.get() })
    }
}

impl Drop for SimCamera {
    fn drop(&mut self) {
        debug!("simulated camera released");
    }
}

/// Turns a finger count into a synthetic landmark set.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimDetector;

impl HandDetector<SimFrame> for SimDetector {
    fn detect(&mut self, frame: &SimFrame) -> Option<HandLandmarks> {
        frame.fingers.map(HandLandmarks::with_extended)
    }
}

/// For cameras whose frames already are detector output.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughDetector;

impl HandDetector<Option<HandLandmarks>> for PassthroughDetector {
    fn detect(&mut self, frame: &Option<HandLandmarks>) -> Option<HandLandmarks> {
        frame.clone()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LeapCamera: real hardware (feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// Hand tracking from a LeapMotion controller.
///
/// Requires the `leap` feature flag and the LeapC shared library installed.
/// Each frame is the landmark set of the first tracked hand, projected onto
/// the controller's x/y plane (y flipped so it grows downward).
#[cfg(feature = "leap")]
pub struct LeapCamera {
    connection: leaprs::Connection,
    cancel:     CancelFlag,
}

#[cfg(feature = "leap")]
impl LeapCamera {
    /// Poll wait (ms) and consecutive failed polls before a read fails.
    const POLL_MS:      u32 = 50;
    const MAX_ATTEMPTS: u32 = 40;
    /// Interaction box half-width and height in millimetres.
    const SPAN_X_MM:    f32 = 200.0;
    const SPAN_Y_MM:    f32 = 400.0;

    /// `cancel` ends a frame read that is still waiting for tracking data.
    pub fn open(cancel: CancelFlag) -> Result<Self, CameraError> {
        use leaprs::{Connection, ConnectionConfig};

        let mut connection = Connection::create(ConnectionConfig::default())
            .map_err(|_| CameraError::NotFound)?;
        connection.open().map_err(|_| CameraError::NotFound)?;
        Ok(LeapCamera { connection, cancel })
    }

    /// Millimetres above the controller to normalised image coordinates.
    fn project(x: f32, y: f32) -> crate::hand::Landmark {
        crate::hand::Landmark::new(
            (x + Self::SPAN_X_MM) / (2.0 * Self::SPAN_X_MM),
            1.0 - y / Self::SPAN_Y_MM,
        )
    }

    fn landmarks(hand: &leaprs::Hand) -> HandLandmarks {
        use crate::hand::{Landmark, LANDMARK_COUNT, WRIST};

        let mut points = [Landmark::default(); LANDMARK_COUNT];
        let palm = hand.palm().position();
        points[WRIST] = Self::project(palm.x, palm.y);
        for (d, digit) in hand.digits().enumerate().take(5) {
            let base = 1 + 4 * d;
            let joints = [
                digit.metacarpal().next_joint(),
                digit.proximal().next_joint(),
                digit.intermediate().next_joint(),
                digit.distal().next_joint(),
            ];
            for (k, j) in joints.iter().enumerate() {
                points[base + k] = Self::project(j.x, j.y);
            }
        }
        HandLandmarks::new(points)
    }
}

#[cfg(feature = "leap")]
impl Camera for LeapCamera {
    type Frame = Option<HandLandmarks>;

    /// A cancelled read reports no hand; the classifier sees the flag next.
    fn read_frame(&mut self) -> Result<Self::Frame, CameraError> {
        use leaprs::Event;

        let connection = &mut self.connection;
        let frame = poll_frame(&self.cancel, Self::MAX_ATTEMPTS, || {
            connection.poll(Self::POLL_MS).map(|msg| match msg.event() {
                Event::Tracking(frame) => Some(frame.hands().next().map(|h| Self::landmarks(&h))),
                _ => None,
            })
        })?;
        Ok(frame.flatten())
    }
}

/// Call `poll` until it yields a frame.
///
/// `poll` returns `Ok(None)` for events that carry no frame.  Returns
/// `Ok(None)` once `cancel` is set, and an error after `max_failures`
/// consecutive failed polls.
#[cfg_attr(not(feature = "leap"), allow(dead_code))]
fn poll_frame<T, E, P>(cancel: &CancelFlag, max_failures: u32, mut poll: P) -> Result<Option<T>, CameraError>
where
    P: FnMut() -> Result<Option<T>, E>,
{
    let mut failures = 0;
    while !cancel.is_cancelled() {
        match poll() {
            Ok(Some(frame)) => return Ok(Some(frame)),
            Ok(None) => failures = 0,
            Err(_) => {
                failures += 1;
                if failures >= max_failures {
                    return Err(CameraError::Read(format!("{failures} polls failed in a row")));
                }
            }
        }
    }
    Ok(None)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
