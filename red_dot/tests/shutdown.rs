//! Cross-thread behaviour: input workers feeding the render loop, and the
//! bounded shutdown that follows.

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use dot_signal::{command_channel, CancelFlag, JoinOutcome, Worker};
use dot_state::{Direction, DotState, RadiusBounds, CHANGE_RATE};
use dot_voice::line::{LineMicrophone, TextTranscriber};
use dot_voice::{run_voice_classifier, TranscribeError, Transcriber, VoiceExit, VoiceTiming};
use red_dot::app::{shutdown_workers, ExitReason, LocalInput, Pacer, RenderLoop, Surface};
use red_dot::gesture::{run_gesture_classifier, FingerCell, GestureExit, SimCamera, SimDetector, SimHand};

const GRACE: Duration = Duration::from_secs(2);

struct Headless;

impl Surface for Headless {
    fn is_open(&self) -> bool { true }
    fn poll_input(&mut self) -> Vec<LocalInput> { Vec::new() }
    fn present(&mut self, _dot: &DotState) {}
}

fn quick_timing() -> VoiceTiming {
    VoiceTiming {
        calibration:    Duration::ZERO,
        listen_timeout: Duration::from_millis(50),
        ..VoiceTiming::default()
    }
}

/// Step the loop until `done` holds or two seconds pass.
fn step_until<S: Surface>(lp: &mut RenderLoop<S>, done: impl Fn(&DotState) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        assert_eq!(lp.step(), None);
        if done(lp.dot()) {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn open_hand_reaches_the_render_loop() {
    let (tx, rx) = command_channel();
    let cancel = CancelFlag::new();
    let hand = SimHand::new();
    let seen = FingerCell::new();
    let (exit_tx, exit_rx) = mpsc::channel();
    hand.set(Some(5));

    let worker = {
        let (tx, cancel, hand, seen) = (tx.clone(), cancel.clone(), hand.clone(), seen.clone());
        Worker::spawn("gesture", move || {
            let exit = run_gesture_classifier(move || SimCamera::open(hand), SimDetector, tx, cancel, seen);
            let _ = exit_tx.send(exit);
        })
        .unwrap()
    };

    let dot = DotState::new(100, Direction::Shrinking, RadiusBounds::default(), CHANGE_RATE);
    let mut lp = RenderLoop::new(Headless, dot, rx, tx, cancel.clone()).with_pacer(Pacer::unpaced());
    assert!(step_until(&mut lp, |d| d.direction() == Direction::Growing));
    assert_eq!(seen.get(), Some(5));

    // Fist: shrink.
    hand.set(Some(0));
    assert!(step_until(&mut lp, |d| d.direction() == Direction::Shrinking));
    assert_eq!(seen.get(), Some(0));

    cancel.cancel();
    assert_eq!(lp.step(), Some(ExitReason::Cancelled));
    let outcomes = shutdown_workers(vec![worker], GRACE);
    assert_eq!(outcomes, vec![("gesture".to_string(), JoinOutcome::Finished)]);
    assert_eq!(exit_rx.try_recv(), Ok(GestureExit::Cancelled));
    assert_eq!(seen.get(), None);
}

#[test]
fn spoken_line_reaches_the_render_loop() {
    let (tx, rx) = command_channel();
    let cancel = CancelFlag::new();
    let (lines, heard) = mpsc::channel();
    let (exit_tx, exit_rx) = mpsc::channel();

    let worker = {
        let (tx, cancel) = (tx.clone(), cancel.clone());
        Worker::spawn("voice", move || {
            let mic = LineMicrophone::new(heard);
            let exit = run_voice_classifier(move || Ok(mic), TextTranscriber, tx, cancel, quick_timing());
            let _ = exit_tx.send(exit);
        })
        .unwrap()
    };

    let dot = DotState::new(100, Direction::Growing, RadiusBounds::default(), CHANGE_RATE);
    let mut lp = RenderLoop::new(Headless, dot, rx, tx, cancel.clone()).with_pacer(Pacer::unpaced());
    lines.send("Could you make it SMALLER?".to_string()).unwrap();
    assert!(step_until(&mut lp, |d| d.direction() == Direction::Shrinking));

    cancel.cancel();
    let outcomes = shutdown_workers(vec![worker], GRACE);
    assert_eq!(outcomes[0].1, JoinOutcome::Finished);
    // The line sender is still open: the worker left because of the flag.
    assert_eq!(exit_rx.try_recv(), Ok(VoiceExit::Cancelled));
    drop(lines);
}

#[test]
fn all_workers_stop_promptly_after_cancel() {
    let (tx, _rx) = command_channel();
    let cancel = CancelFlag::new();
    let hand = SimHand::new();
    let (_lines, heard) = mpsc::channel::<String>();
    let (gesture_tx, gesture_rx) = mpsc::channel();
    let (voice_tx, voice_rx) = mpsc::channel();

    let gesture = {
        let (tx, cancel) = (tx.clone(), cancel.clone());
        Worker::spawn("gesture", move || {
            let exit = run_gesture_classifier(
                move || SimCamera::open(hand),
                SimDetector,
                tx,
                cancel,
                FingerCell::new(),
            );
            let _ = gesture_tx.send(exit);
        })
        .unwrap()
    };
    let voice = {
        let (tx, cancel) = (tx.clone(), cancel.clone());
        Worker::spawn("voice", move || {
            let mic = LineMicrophone::new(heard);
            let exit = run_voice_classifier(move || Ok(mic), TextTranscriber, tx, cancel, VoiceTiming::default());
            let _ = voice_tx.send(exit);
        })
        .unwrap()
    };

    thread::sleep(Duration::from_millis(100));
    cancel.cancel();
    let start = Instant::now();
    let outcomes = shutdown_workers(vec![gesture, voice], GRACE);
    assert!(outcomes.iter().all(|(_, o)| *o == JoinOutcome::Finished), "{outcomes:?}");
    assert!(start.elapsed() < GRACE);
    assert_eq!(gesture_rx.try_recv(), Ok(GestureExit::Cancelled));
    assert_eq!(voice_rx.try_recv(), Ok(VoiceExit::Cancelled));
}

struct ServiceDown;

impl Transcriber<String> for ServiceDown {
    fn transcribe(&mut self, _audio: &String) -> Result<String, TranscribeError> {
        Err(TranscribeError::Service("connection refused".into()))
    }
}

#[test]
fn service_backoff_is_cut_short_by_cancel() {
    let (tx, _rx) = command_channel();
    let cancel = CancelFlag::new();
    let (lines, heard) = mpsc::channel();
    let (exit_tx, exit_rx) = mpsc::channel();
    lines.send("grow".to_string()).unwrap();

    let worker = {
        let cancel = cancel.clone();
        Worker::spawn("voice", move || {
            let mic = LineMicrophone::new(heard);
            let timing = VoiceTiming { backoff: Duration::from_secs(30), ..quick_timing() };
            let exit = run_voice_classifier(move || Ok(mic), ServiceDown, tx, cancel, timing);
            let _ = exit_tx.send(exit);
        })
        .unwrap()
    };

    thread::sleep(Duration::from_millis(100));
    cancel.cancel();
    let start = Instant::now();
    assert_eq!(worker.join_timeout(GRACE), JoinOutcome::Finished);
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(exit_rx.try_recv(), Ok(VoiceExit::Cancelled));
    drop(lines);
}

#[test]
fn worker_exit_reason_is_seen_even_after_a_panic() {
    let (exit_tx, exit_rx) = mpsc::channel::<GestureExit>();
    let worker = Worker::spawn("gesture", move || {
        let _keep = exit_tx;
        panic!("classifier blew up");
    })
    .unwrap();
    let outcomes = shutdown_workers(vec![worker], GRACE);
    assert_eq!(outcomes[0].1, JoinOutcome::Finished);
    // No exit reason was reported, so a missing one is detectable.
    assert!(exit_rx.try_recv().is_err());
}

#[test]
fn stuck_worker_is_reported_not_waited_for() {
    let stuck = Worker::spawn("stuck", || thread::sleep(Duration::from_millis(500))).unwrap();
    let start = Instant::now();
    let outcomes = shutdown_workers(vec![stuck], Duration::from_millis(50));
    assert_eq!(outcomes, vec![("stuck".to_string(), JoinOutcome::TimedOut)]);
    assert!(start.elapsed() < Duration::from_millis(400));
}
