//! # dot_voice
//!
//! Voice input for the dot.  A [`Microphone`] captures one utterance at a
//! time, a [`Transcriber`] turns it into text, and [`match_command`] picks
//! the first grow/shrink word in speech order.
//!
//! ## Failure handling
//!
//! | Situation | Effect |
//! |---|---|
//! | No microphone | classifier disabled, logged once |
//! | Listen timeout | loop again silently |
//! | Speech not understood | ignored (debug log) |
//! | Speech service error | back off, then retry |
//! | Microphone device lost | classifier ends; the rest keeps running |
//!
//! ## Backends
//!
//! * (default): [`line`]: every line typed on stdin is one utterance.
//! * `speech`: [`speech`]: the default input device via cpal, transcribed
//!   by a scribble-compatible HTTP server.

use std::time::Duration;

use dot_signal::{CancelFlag, CommandSender};
use dot_state::Command;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub mod line;
#[cfg(feature = "speech")]
pub mod speech;

// ════════════════════════════════════════════════════════════════════════════
// Vocabulary
// ════════════════════════════════════════════════════════════════════════════

pub const GROW_WORDS:   [&str; 6] = ["grow", "expand", "go", "enlarge", "big", "bigger"];
/// "drink" is here because it is what "shrink" is most often heard as.
pub const SHRINK_WORDS: [&str; 6] = ["shrink", "drink", "small", "smaller", "reduce", "less"];

/// Map a single word to a command, ignoring case and surrounding punctuation.
pub fn word_command(word: &str) -> Option<Command> {
    let word = word
        .trim_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase();
    if GROW_WORDS.contains(&word.as_str()) {
        Some(Command::Grow)
    } else if SHRINK_WORDS.contains(&word.as_str()) {
        Some(Command::Shrink)
    } else {
        None
    }
}

/// The command for the first recognised word in `phrase`, if any.
pub fn match_command(phrase: &str) -> Option<Command> {
    phrase.split_whitespace().find_map(word_command)
}

// ════════════════════════════════════════════════════════════════════════════
// Errors
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MicError {
    #[error("no microphone found")]
    NotFound,
    #[error("microphone unavailable: {0}")]
    Device(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListenError {
    /// Nobody spoke within the listen window.
    #[error("no speech before timeout")]
    Timeout,
    #[error("microphone failed: {0}")]
    Device(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscribeError {
    #[error("speech not understood")]
    Unrecognized,
    #[error("speech service error: {0}")]
    Service(String),
}

// ════════════════════════════════════════════════════════════════════════════
// Seams
// ════════════════════════════════════════════════════════════════════════════

/// A source of recorded utterances.
pub trait Microphone {
    type Audio;

    /// Measure background noise once before listening starts.
    fn calibrate(&mut self, duration: Duration) -> Result<(), MicError>;

    /// Wait up to `timeout` for speech to start, then record until the
    /// speaker pauses or `phrase_limit` elapses.
    fn listen(&mut self, timeout: Duration, phrase_limit: Duration)
        -> Result<Self::Audio, ListenError>;
}

/// Speech-to-text over audio of type `A`.
pub trait Transcriber<A> {
    fn transcribe(&mut self, audio: &A) -> Result<String, TranscribeError>;
}

// ════════════════════════════════════════════════════════════════════════════
// Classifier loop
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoiceTiming {
    pub calibration:    Duration,
    pub listen_timeout: Duration,
    pub phrase_limit:   Duration,
    /// Pause after a speech-service error before listening again.
    pub backoff:        Duration,
}

impl Default for VoiceTiming {
    fn default() -> Self {
        VoiceTiming {
            calibration:    Duration::from_secs(1),
            listen_timeout: Duration::from_secs(1),
            phrase_limit:   Duration::from_secs(5),
            backoff:        Duration::from_secs(5),
        }
    }
}

/// Why [`run_voice_classifier`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceExit {
    /// No usable microphone; voice control never started.
    Disabled,
    Cancelled,
    DeviceLost,
    /// The render loop is gone.
    ChannelClosed,
}

/// Run the voice classifier until cancelled or the microphone is lost.
///
/// `open` is called on the current thread, so the microphone itself does
/// not need to be `Send`.
pub fn run_voice_classifier<M, T, O>(
    open:            O,
    mut transcriber: T,
    tx:              CommandSender,
    cancel:          CancelFlag,
    timing:          VoiceTiming,
) -> VoiceExit
where
    O: FnOnce() -> Result<M, MicError>,
    M: Microphone,
    T: Transcriber<M::Audio>,
{
    let mut mic = match open() {
        Ok(mic) => mic,
        Err(e) => {
            warn!(reason = %e, "voice control disabled");
            return VoiceExit::Disabled;
        }
    };
    info!("microphone found, adjusting for ambient noise");
    if let Err(e) = mic.calibrate(timing.calibration) {
        warn!(reason = %e, "calibration failed, voice control disabled");
        return VoiceExit::Disabled;
    }
    info!("ready to listen");

    while !cancel.is_cancelled() {
        let audio = match mic.listen(timing.listen_timeout, timing.phrase_limit) {
            Ok(audio) => audio,
            Err(ListenError::Timeout) => continue,
            Err(ListenError::Device(reason)) => {
                error!(%reason, "microphone lost, voice control stopped");
                return VoiceExit::DeviceLost;
            }
        };
        if cancel.is_cancelled() {
            break;
        }

        match transcriber.transcribe(&audio) {
            Ok(phrase) => {
                debug!(%phrase, "heard");
                if let Some(cmd) = match_command(&phrase) {
                    debug!(command = %cmd, "voice command");
                    if tx.send(cmd).is_err() {
                        return VoiceExit::ChannelClosed;
                    }
                }
            }
            Err(TranscribeError::Unrecognized) => debug!("speech not understood"),
            Err(TranscribeError::Service(reason)) => {
                warn!(%reason, backoff_ms = timing.backoff.as_millis() as u64, "speech service error");
                if cancel.wait_timeout(timing.backoff) {
                    break;
                }
            }
        }
    }

    info!("voice worker finished");
    VoiceExit::Cancelled
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
