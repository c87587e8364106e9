//! # red_dot
//!
//! A red dot in the middle of a window that keeps growing or shrinking.
//! Three independent inputs steer it: the keyboard, a hand held up to a
//! hand tracker, and spoken words.  Each input runs on its own thread and
//! sends commands over one channel; the render loop drains that channel
//! every tick at 60 Hz.
//!
//! ## Command mapping
//!
//! | Source | Input | Command |
//! |---|---|---|
//! | Keyboard | `Space` | Toggle direction |
//! | Keyboard | `Escape` | Quit |
//! | Hand | 3–5 fingers extended | Grow |
//! | Hand | 0–2 fingers extended | Shrink |
//! | Voice | grow, expand, go, enlarge, big, bigger | Grow |
//! | Voice | shrink, drink, small, smaller, reduce, less | Shrink |
//!
//! A hand command is sent only when the classification changes; holding the
//! same hand still sends nothing further.  A phrase yields at most one
//! command, taken from the first command word spoken.
//!
//! ## Feature flags
//!
//! * (default): **Simulation mode**.  The number keys `0`–`5` in the window set
//!   how many fingers the simulated hand shows, `N` takes the hand away, and
//!   each line typed on stdin is treated as one utterance.
//! * `leap`: hand landmarks from a LeapMotion controller via LeapC.
//! * `speech`: default microphone plus an HTTP speech-to-text server.
//!
//! Logging goes through `tracing`; set `RED_DOT_LOG` (e.g.
//! `RED_DOT_LOG=red_dot=debug,dot_voice=debug`) to change verbosity.

pub mod hand;
pub mod gesture;
pub mod config;
pub mod logging;
pub mod visualizer;
pub mod app;
