//! Line-based simulation backend.
//!
//! Each line of text is treated as one already-captured utterance, so the
//! voice path can be driven from a terminal (or a pipe) without a
//! microphone or a speech service.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::{ListenError, MicError, Microphone, TranscribeError, Transcriber};

/// Utterances arriving as lines of text over a channel.
pub struct LineMicrophone {
    lines: Receiver<String>,
}

impl LineMicrophone {
    pub fn new(lines: Receiver<String>) -> Self {
        LineMicrophone { lines }
    }

    /// Read utterances from stdin.
    ///
    /// The reader thread blocks in `read_line` and cannot be interrupted; it
    /// is left detached and ends with the process or at end of input.
    pub fn stdin() -> Result<Self, MicError> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("stdin-lines".into())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                debug!("stdin closed");
            })
            .map_err(|e| MicError::Device(e.to_string()))?;
        Ok(LineMicrophone::new(rx))
    }
}

impl Microphone for LineMicrophone {
    type Audio = String;

    fn calibrate(&mut self, _duration: Duration) -> Result<(), MicError> {
        Ok(())
    }

    fn listen(&mut self, timeout: Duration, _phrase_limit: Duration) -> Result<String, ListenError> {
        match self.lines.recv_timeout(timeout) {
            Ok(line) => Ok(line),
            Err(RecvTimeoutError::Timeout) => Err(ListenError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(ListenError::Device("input closed".into())),
        }
    }
}

/// The "transcript" of a typed line is the line itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextTranscriber;

impl Transcriber<String> for TextTranscriber {
    fn transcribe(&mut self, audio: &String) -> Result<String, TranscribeError> {
        let text = audio.trim();
        if text.is_empty() {
            return Err(TranscribeError::Unrecognized);
        }
        Ok(text.to_lowercase())
    }
}
