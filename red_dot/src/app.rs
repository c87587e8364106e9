//! Top-level application: the render loop and the wiring around it.
//!
//! `RenderLoop` owns the [`DotState`] and the receiving end of the command
//! channel.  Each tick it checks the cancellation flag, handles local keys,
//! drains every queued command, ramps the radius and presents a frame.
//! [`run`] spawns the enabled input workers, drives the loop until the user
//! quits, then gives each worker a bounded time to finish.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use dot_signal::{command_channel, CancelFlag, CommandReceiver, CommandSender, JoinOutcome, Worker};
use dot_state::{Command, DotState, TICK_HZ};
use dot_voice::line::{LineMicrophone, TextTranscriber};
use dot_voice::{run_voice_classifier, VoiceTiming};
use tracing::{debug, info, warn};

use crate::config::{AppConfig, GestureSource, VoiceSource};
use crate::gesture::{run_gesture_classifier, FingerCell, SimCamera, SimDetector, SimHand};
use crate::visualizer::Visualizer;

// ════════════════════════════════════════════════════════════════════════════
// Surface: what the render loop draws on and reads keys from
// ════════════════════════════════════════════════════════════════════════════

/// Input handled by the render loop itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalInput {
    /// Escape: request shutdown.
    Quit,
    /// Space: enqueue a `Toggle`.
    Toggle,
}

pub trait Surface {
    /// `false` once the user has closed the window.
    fn is_open(&self) -> bool;

    /// Keys pressed since the last call, in order.
    fn poll_input(&mut self) -> Vec<LocalInput>;

    /// Clear, draw the dot and show the frame.
    fn present(&mut self, dot: &DotState);
}

// ════════════════════════════════════════════════════════════════════════════
// Pacer: fixed tick rate
// ════════════════════════════════════════════════════════════════════════════

/// Keeps the loop at a fixed tick rate.  Waits go through the cancellation
/// flag, so a quit from another thread ends the wait early.
#[derive(Debug)]
pub struct Pacer {
    period: Duration,
    next:   Instant,
}

impl Pacer {
    pub fn new(hz: u32) -> Self {
        Pacer {
            period: Duration::from_secs(1) / hz.max(1),
            next:   Instant::now(),
        }
    }

    /// No waiting at all.
    pub fn unpaced() -> Self {
        Pacer { period: Duration::ZERO, next: Instant::now() }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sleep until the next tick.  Returns whether cancellation was seen.
    pub fn wait(&mut self, cancel: &CancelFlag) -> bool {
        if self.period.is_zero() {
            return cancel.is_cancelled();
        }
        self.next += self.period;
        let now = Instant::now();
        if self.next <= now {
            // Running behind: start counting again from now instead of
            // bursting to catch up.
            self.next = now;
            return cancel.is_cancelled();
        }
        cancel.wait_timeout(self.next - now)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// RenderLoop
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// Another thread set the cancellation flag.
    Cancelled,
    /// Escape pressed.
    Quit,
    WindowClosed,
}

pub struct RenderLoop<S> {
    surface:  S,
    dot:      DotState,
    commands: CommandReceiver,
    /// Where Space-bar toggles are queued, behind any classifier commands.
    toggles:  CommandSender,
    cancel:   CancelFlag,
    pacer:    Pacer,
}

impl<S: Surface> RenderLoop<S> {
    pub fn new(
        surface:  S,
        dot:      DotState,
        commands: CommandReceiver,
        toggles:  CommandSender,
        cancel:   CancelFlag,
    ) -> Self {
        RenderLoop {
            surface,
            dot,
            commands,
            toggles,
            cancel,
            pacer: Pacer::new(TICK_HZ),
        }
    }

    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn dot(&self)     -> &DotState { &self.dot }
    pub fn surface(&self) -> &S        { &self.surface }

    /// One tick.  `Some` means the loop is over.
    pub fn step(&mut self) -> Option<ExitReason> {
        // 1. Shutdown requested elsewhere
        if self.cancel.is_cancelled() {
            return Some(ExitReason::Cancelled);
        }

        // 2. Local input
        if !self.surface.is_open() {
            info!("window closed, signalling stop");
            self.cancel.cancel();
            return Some(ExitReason::WindowClosed);
        }
        for input in self.surface.poll_input() {
            match input {
                LocalInput::Quit => {
                    info!("escape pressed, signalling stop");
                    self.cancel.cancel();
                    return Some(ExitReason::Quit);
                }
                LocalInput::Toggle => {
                    // Cannot fail: this loop owns the receiver.
                    let _ = self.toggles.send(Command::Toggle);
                }
            }
        }

        // 3. Drain the channel, oldest first
        for cmd in self.commands.drain() {
            debug!(command = %cmd, "applying");
            self.dot.apply(cmd);
        }

        // 4. Ramp
        self.dot.tick();

        // 5–6. Draw and present
        self.surface.present(&self.dot);
        None
    }

    /// Tick until something ends the loop.  The cancellation flag is always
    /// set on return.
    pub fn run(mut self) -> ExitReason {
        let reason = loop {
            if let Some(reason) = self.step() {
                break reason;
            }
            if self.pacer.wait(&self.cancel) {
                break ExitReason::Cancelled;
            }
        };
        self.cancel.cancel();
        info!(?reason, radius = self.dot.radius(), "main loop exited");
        reason
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Workers
// ════════════════════════════════════════════════════════════════════════════

fn spawn_gesture_worker(
    source: GestureSource,
    hand:   SimHand,
    seen:   FingerCell,
    tx:     CommandSender,
    cancel: CancelFlag,
) -> Result<Option<Worker>> {
    let worker = match source {
        GestureSource::Sim => Worker::spawn("gesture", move || {
            run_gesture_classifier(move || SimCamera::open(hand), SimDetector, tx, cancel, seen);
        }),
        GestureSource::Leap => return spawn_leap_worker(seen, tx, cancel),
    };
    worker.context("spawning gesture worker").map(Some)
}

#[cfg(feature = "leap")]
fn spawn_leap_worker(seen: FingerCell, tx: CommandSender, cancel: CancelFlag) -> Result<Option<Worker>> {
    use crate::gesture::{LeapCamera, PassthroughDetector};

    Worker::spawn("gesture", move || {
        let camera_cancel = cancel.clone();
        run_gesture_classifier(move || LeapCamera::open(camera_cancel), PassthroughDetector, tx, cancel, seen);
    })
    .context("spawning gesture worker")
    .map(Some)
}

#[cfg(not(feature = "leap"))]
fn spawn_leap_worker(_seen: FingerCell, _tx: CommandSender, _cancel: CancelFlag) -> Result<Option<Worker>> {
    warn!("built without the `leap` feature, gesture control disabled");
    Ok(None)
}

fn spawn_voice_worker(
    source: VoiceSource,
    cfg:    &AppConfig,
    tx:     CommandSender,
    cancel: CancelFlag,
) -> Result<Option<Worker>> {
    let timing = cfg.voice_timing;
    let worker = match source {
        VoiceSource::Stdin => Worker::spawn("voice", move || {
            run_voice_classifier(LineMicrophone::stdin, TextTranscriber, tx, cancel, timing);
        }),
        VoiceSource::Mic => return spawn_mic_worker(&cfg.speech_url, timing, tx, cancel),
    };
    worker.context("spawning voice worker").map(Some)
}

#[cfg(feature = "speech")]
fn spawn_mic_worker(
    url:    &str,
    timing: VoiceTiming,
    tx:     CommandSender,
    cancel: CancelFlag,
) -> Result<Option<Worker>> {
    use dot_voice::speech::{CpalMicrophone, HttpTranscriber};

    let url = url.to_string();
    Worker::spawn("voice", move || {
        let transcriber = match HttpTranscriber::new(url) {
            Ok(t) => t,
            Err(e) => {
                warn!(reason = %e, "voice control disabled");
                return;
            }
        };
        let mic_cancel = cancel.clone();
        run_voice_classifier(move || CpalMicrophone::open(mic_cancel), transcriber, tx, cancel, timing);
    })
    .context("spawning voice worker")
    .map(Some)
}

#[cfg(not(feature = "speech"))]
fn spawn_mic_worker(
    _url:    &str,
    _timing: VoiceTiming,
    _tx:     CommandSender,
    _cancel: CancelFlag,
) -> Result<Option<Worker>> {
    warn!("built without the `speech` feature, voice control disabled");
    Ok(None)
}

/// Give every worker `grace` to notice the flag and finish.
pub fn shutdown_workers(workers: Vec<Worker>, grace: Duration) -> Vec<(String, JoinOutcome)> {
    info!("waiting for worker threads to finish");
    workers
        .into_iter()
        .map(|worker| {
            let name = worker.name().to_string();
            let outcome = worker.join_timeout(grace);
            match outcome {
                JoinOutcome::Finished => debug!(worker = %name, "worker joined"),
                JoinOutcome::TimedOut => warn!(worker = %name, "worker did not finish cleanly"),
            }
            (name, outcome)
        })
        .collect()
}

// ════════════════════════════════════════════════════════════════════════════
// run(): the main application loop
// ════════════════════════════════════════════════════════════════════════════

/// Run the full application.
///
/// Opens the window, starts the enabled input workers and drives the render
/// loop at `TICK_HZ` until the user quits or closes the window.
pub fn run(cfg: AppConfig) -> Result<ExitReason> {
    let cancel = CancelFlag::new();
    let (tx, rx) = command_channel();

    let sim_hand = (cfg.gesture == Some(GestureSource::Sim)).then(SimHand::new);
    let seen = cfg.gesture.map(|_| FingerCell::new());
    let vis = Visualizer::new(sim_hand.clone(), seen.clone()).context("opening the window")?;

    let mut workers = Vec::new();
    if let Some(source) = cfg.gesture {
        let hand = sim_hand.unwrap_or_default();
        let seen = seen.unwrap_or_default();
        workers.extend(spawn_gesture_worker(source, hand, seen, tx.clone(), cancel.clone())?);
    }
    if let Some(source) = cfg.voice {
        workers.extend(spawn_voice_worker(source, &cfg, tx.clone(), cancel.clone())?);
    }
    info!(workers = workers.len(), "input workers started");

    let reason = RenderLoop::new(vis, DotState::default(), rx, tx, cancel.clone()).run();

    shutdown_workers(workers, cfg.shutdown_grace);
    Ok(reason)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
