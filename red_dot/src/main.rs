//! red_dot command-line entry point.

use clap::Parser;
use red_dot::app::run;
use red_dot::config::{AppConfig, Args, GestureSource, VoiceSource};
use red_dot::logging;
use tracing::{error, info};

fn main() {
    let args = Args::parse();
    logging::init(args.debug);
    let cfg = AppConfig::from(args);

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║          Red Dot — Gesture / Voice Controlled Dot            ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("  Gesture: {}", match cfg.gesture {
        Some(GestureSource::Sim)  => "keyboard simulation  (0-5 fingers, N no hand)",
        Some(GestureSource::Leap) => "LeapMotion hardware",
        None                      => "off",
    });
    println!("  Voice:   {}", match cfg.voice {
        Some(VoiceSource::Stdin) => "typed lines on stdin  (try \"grow\" or \"shrink\")",
        Some(VoiceSource::Mic)   => "microphone",
        None                     => "off",
    });
    println!("  Keys:    Space toggles, Escape quits");
    println!();

    match run(cfg) {
        Ok(reason) => info!(?reason, "bye"),
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    }
}
