//! Command-line switches and the application configuration built from them.
//!
//! Radius bounds and change rate are compile-time constants in `dot_state`;
//! only the choice of input sources and log verbosity is made at run time.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use dot_voice::VoiceTiming;

pub const DEFAULT_SPEECH_URL: &str = "http://127.0.0.1:8080/v1/transcribe";

/// How long shutdown waits for each input worker before giving up on it.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum GestureSource {
    /// Number keys in the window stand in for the hand.
    #[default]
    Sim,
    /// LeapMotion controller (needs the `leap` feature).
    Leap,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum VoiceSource {
    /// Each line typed on stdin is one utterance.
    #[default]
    Stdin,
    /// Default microphone plus an HTTP speech-to-text server (needs the
    /// `speech` feature).
    Mic,
}

#[derive(Parser, Debug)]
#[command(name = "red_dot")]
#[command(about = "A red dot that grows and shrinks on keyboard, gesture and voice commands")]
pub struct Args {
    /// Turn off hand-gesture input.
    #[arg(long)]
    pub no_gesture: bool,

    /// Turn off voice input.
    #[arg(long)]
    pub no_voice: bool,

    /// Log per-frame and per-utterance detail (overridden by RED_DOT_LOG).
    #[arg(long)]
    pub debug: bool,

    #[arg(long, value_enum, default_value_t = GestureSource::Sim)]
    pub gesture_source: GestureSource,

    #[arg(long, value_enum, default_value_t = VoiceSource::Stdin)]
    pub voice_source: VoiceSource,

    /// Transcription endpoint used with `--voice-source mic`.
    #[arg(long, default_value = DEFAULT_SPEECH_URL)]
    pub speech_url: String,
}

/// Configuration for the full application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    /// `None` disables gesture input.
    pub gesture:        Option<GestureSource>,
    /// `None` disables voice input.
    pub voice:          Option<VoiceSource>,
    pub speech_url:     String,
    pub debug:          bool,
    pub voice_timing:   VoiceTiming,
    pub shutdown_grace: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            gesture:        Some(GestureSource::Sim),
            voice:          Some(VoiceSource::Stdin),
            speech_url:     DEFAULT_SPEECH_URL.to_string(),
            debug:          false,
            voice_timing:   VoiceTiming::default(),
            shutdown_grace: SHUTDOWN_GRACE,
        }
    }
}

impl From<Args> for AppConfig {
    fn from(args: Args) -> Self {
        AppConfig {
            gesture:    (!args.no_gesture).then_some(args.gesture_source),
            voice:      (!args.no_voice).then_some(args.voice_source),
            speech_url: args.speech_url,
            debug:      args.debug,
            ..AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> AppConfig {
        let args = Args::try_parse_from(std::iter::once("red_dot").chain(argv.iter().copied()))
            .unwrap();
        AppConfig::from(args)
    }

    #[test]
    fn no_flags_matches_default() {
        assert_eq!(parse(&[]), AppConfig::default());
    }

    #[test]
    fn sources_can_be_switched_off() {
        let cfg = parse(&["--no-gesture", "--no-voice"]);
        assert_eq!(cfg.gesture, None);
        assert_eq!(cfg.voice, None);
    }

    #[test]
    fn hardware_sources_selectable() {
        let cfg = parse(&["--gesture-source", "leap", "--voice-source", "mic", "--speech-url", "http://h/v1/transcribe"]);
        assert_eq!(cfg.gesture, Some(GestureSource::Leap));
        assert_eq!(cfg.voice, Some(VoiceSource::Mic));
        assert_eq!(cfg.speech_url, "http://h/v1/transcribe");
    }

    #[test]
    fn unknown_source_rejected() {
        assert!(Args::try_parse_from(["red_dot", "--voice-source", "telepathy"]).is_err());
    }
}
