//! Software-rendered window using `minifb`.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ radius 40  growing        hand: 3 fingers│
//! │                                          │
//! │                   ●                      │
//! │                                          │
//! │ esc quit  space toggle  0-5 hand  n none │
//! └──────────────────────────────────────────┘
//! ```

use anyhow::{anyhow, Result};
use dot_state::DotState;
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use tracing::debug;

use crate::app::{LocalInput, Surface};
use crate::gesture::{FingerCell, SimHand};

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:    usize = 600;
pub const WIN_H:    usize = 400;
const CENTER_X:     usize = WIN_W / 2;
const CENTER_Y:     usize = WIN_H / 2;
const BG_COLOR:     u32   = 0xFF000000;
const DOT_COLOR:    u32   = 0xFFFF0000;
const TEXT_COLOR:   u32   = 0xFFCCCCCC;
const LEGEND_COLOR: u32   = 0xFF777777;
/// Each font pixel is drawn as a `FONT_SCALE`×`FONT_SCALE` block.
const FONT_SCALE:   usize = 2;

const FINGER_KEYS: [(Key, u8); 6] = [
    (Key::Key0, 0), (Key::Key1, 1), (Key::Key2, 2),
    (Key::Key3, 3), (Key::Key4, 4), (Key::Key5, 5),
];

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window:   Window,
    buf:      Vec<u32>,
    /// Present only when the simulated hand is the gesture source.
    sim_hand: Option<SimHand>,
    /// What the gesture classifier last saw; `None` when gestures are off.
    seen:     Option<FingerCell>,
}

impl Visualizer {
    pub fn new(sim_hand: Option<SimHand>, seen: Option<FingerCell>) -> Result<Self> {
        let window = Window::new(
            "Gesture / Voice Controlled Dot",
            WIN_W, WIN_H,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| anyhow!("failed to create window: {e}"))?;

        Ok(Visualizer {
            window,
            buf: vec![BG_COLOR; WIN_W * WIN_H],
            sim_hand,
            seen,
        })
    }

    fn pressed(&self, key: Key) -> bool {
        self.window.is_key_pressed(key, KeyRepeat::No)
    }

}

impl Surface for Visualizer {
    fn is_open(&self) -> bool {
        self.window.is_open()
    }

    fn poll_input(&mut self) -> Vec<LocalInput> {
        let mut inputs = Vec::new();
        if self.pressed(Key::Escape) {
            inputs.push(LocalInput::Quit);
        }
        if self.pressed(Key::Space) {
            inputs.push(LocalInput::Toggle);
        }

        if let Some(hand) = &self.sim_hand {
            for (key, fingers) in FINGER_KEYS {
                if self.window.is_key_pressed(key, KeyRepeat::No) {
                    hand.set(Some(fingers));
                }
            }
            if self.window.is_key_pressed(Key::N, KeyRepeat::No) {
                hand.set(None);
            }
        }
        inputs
    }

    fn present(&mut self, dot: &DotState) {
        self.buf.fill(BG_COLOR);
        fill_circle(&mut self.buf, CENTER_X, CENTER_Y, dot.radius() as usize, DOT_COLOR);

        let status = format!("radius {}  {}", dot.radius(), dot.direction().label());
        draw_text(&mut self.buf, &status, 10, 10, TEXT_COLOR);
        if let Some(seen) = &self.seen {
            let label = hand_label(seen.get());
            let x = WIN_W.saturating_sub(text_width(&label) + 10);
            draw_text(&mut self.buf, &label, x, 10, TEXT_COLOR);
        }
        let keys = legend(self.sim_hand.is_some());
        draw_text(&mut self.buf, keys, 10, WIN_H - 5 * FONT_SCALE - 10, LEGEND_COLOR);

        if let Err(e) = self.window.update_with_buffer(&self.buf, WIN_W, WIN_H) {
            debug!(error = %e, "frame not presented");
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Overlay text
// ════════════════════════════════════════════════════════════════════════════

fn hand_label(fingers: Option<u8>) -> String {
    match fingers {
        Some(1) => "hand: 1 finger".to_string(),
        Some(n) => format!("hand: {n} fingers"),
        None    => "hand: none".to_string(),
    }
}

fn legend(simulated_hand: bool) -> &'static str {
    if simulated_hand {
        "esc quit  space toggle  0-5 fingers  n no hand"
    } else {
        "esc quit  space toggle"
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Drawing primitives
// ════════════════════════════════════════════════════════════════════════════

/// Filled circle, clipped to the window.
fn fill_circle(buf: &mut [u32], cx: usize, cy: usize, r: usize, color: u32) {
    let r2 = (r * r) as isize;
    let (cx, cy, r) = (cx as isize, cy as isize, r as isize);
    for dy in -r..=r {
        let y = cy + dy;
        if y < 0 || y >= WIN_H as isize {
            continue;
        }
        let half = ((r2 - dy * dy) as f64).sqrt() as isize;
        let x0 = (cx - half).max(0) as usize;
        let x1 = ((cx + half).min(WIN_W as isize - 1)).max(-1);
        if x1 < x0 as isize {
            continue;
        }
        let row = y as usize * WIN_W;
        buf[row + x0..=row + x1 as usize].fill(color);
    }
}

fn set_pixel(buf: &mut [u32], x: usize, y: usize, color: u32) {
    if x < WIN_W && y < WIN_H {
        buf[y * WIN_W + x] = color;
    }
}

fn text_width(text: &str) -> usize {
    text.chars().count() * 4 * FONT_SCALE
}

/// 3×5 bitmap text, lowercased.  Unknown characters render as blanks.
fn draw_text(buf: &mut [u32], text: &str, x: usize, y: usize, color: u32) {
    for (i, ch) in text.chars().enumerate() {
        let Some(bits) = glyph(ch.to_ascii_lowercase()) else { continue };
        let gx = x + i * 4 * FONT_SCALE;
        for row in 0..5 {
            for col in 0..3 {
                if bits & (1 << (14 - (row * 3 + col))) == 0 {
                    continue;
                }
                for sy in 0..FONT_SCALE {
                    for sx in 0..FONT_SCALE {
                        set_pixel(buf, gx + col * FONT_SCALE + sx, y + row * FONT_SCALE + sy, color);
                    }
                }
            }
        }
    }
}

fn glyph(c: char) -> Option<u16> {
    FONT.iter().find(|(g, _)| *g == c).map(|&(_, bits)| bits)
}

/// Five rows of three bits, top row in the high bits.
const FONT: [(char, u16); 39] = [
    ('a', 0b111_101_111_101_101), ('b', 0b110_101_110_101_110), ('c', 0b111_100_100_100_111), ('d', 0b110_101_101_101_110),
    ('e', 0b111_100_111_100_111), ('f', 0b111_100_111_100_100), ('g', 0b111_100_101_101_111), ('h', 0b101_101_111_101_101),
    ('i', 0b111_010_010_010_111), ('j', 0b001_001_001_101_111), ('k', 0b101_101_110_101_101), ('l', 0b100_100_100_100_111),
    ('m', 0b101_111_101_101_101), ('n', 0b111_101_101_101_101), ('o', 0b111_101_101_101_111), ('p', 0b111_101_111_100_100),
    ('q', 0b111_101_101_111_001), ('r', 0b110_101_110_101_101), ('s', 0b111_100_111_001_111), ('t', 0b111_010_010_010_010),
    ('u', 0b101_101_101_101_111), ('v', 0b101_101_101_010_010), ('w', 0b101_101_101_111_101), ('x', 0b101_101_010_101_101),
    ('y', 0b101_101_111_010_010), ('z', 0b111_001_010_100_111), ('0', 0b111_101_101_101_111), ('1', 0b010_110_010_010_111),
    ('2', 0b111_001_111_100_111), ('3', 0b111_001_111_001_111), ('4', 0b101_101_111_001_001), ('5', 0b111_100_111_001_111),
    ('6', 0b111_100_111_101_111), ('7', 0b111_001_001_001_001), ('8', 0b111_101_111_101_111), ('9', 0b111_101_111_001_111),
    (':', 0b000_010_000_010_000), ('-', 0b000_000_111_000_000), ('/', 0b001_001_010_100_100),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> Vec<u32> {
        vec![BG_COLOR; WIN_W * WIN_H]
    }

    #[test]
    fn circle_covers_centre_and_respects_radius() {
        let mut buf = blank();
        fill_circle(&mut buf, CENTER_X, CENTER_Y, 20, DOT_COLOR);
        assert_eq!(buf[CENTER_Y * WIN_W + CENTER_X], DOT_COLOR);
        assert_eq!(buf[CENTER_Y * WIN_W + CENTER_X + 20], DOT_COLOR);
        assert_eq!(buf[CENTER_Y * WIN_W + CENTER_X + 21], BG_COLOR);
        assert_eq!(buf[(CENTER_Y - 21) * WIN_W + CENTER_X], BG_COLOR);
    }

    #[test]
    fn largest_circle_is_clipped_not_panicking() {
        let mut buf = blank();
        fill_circle(&mut buf, CENTER_X, CENTER_Y, 260, DOT_COLOR);
        assert_eq!(buf[0], BG_COLOR);
        assert_eq!(buf[CENTER_X], DOT_COLOR);
        assert_eq!(buf[(WIN_H - 1) * WIN_W + CENTER_X], DOT_COLOR);
    }

    #[test]
    fn every_glyph_fits_fifteen_bits() {
        for (c, bits) in FONT {
            assert!(bits < 1 << 15, "glyph {c:?}");
        }
    }

    #[test]
    fn text_draws_inside_its_box_only() {
        let mut buf = blank();
        draw_text(&mut buf, "-", 0, 0, TEXT_COLOR);
        // Middle row of '-' is lit, top row is not.
        assert_eq!(buf[2 * FONT_SCALE * WIN_W], TEXT_COLOR);
        assert_eq!(buf[0], BG_COLOR);
        assert_eq!(text_width("ab"), 8 * FONT_SCALE);
    }

    #[test]
    fn hand_label_tracks_the_detected_count() {
        assert_eq!(hand_label(None), "hand: none");
        assert_eq!(hand_label(Some(1)), "hand: 1 finger");
        assert_eq!(hand_label(Some(4)), "hand: 4 fingers");
    }

    #[test]
    fn legend_lists_hand_keys_only_in_simulation() {
        assert!(legend(true).contains("0-5 fingers"));
        assert_eq!(legend(false), "esc quit  space toggle");
    }

    #[test]
    fn overlay_text_all_has_glyphs() {
        let labels = [hand_label(None), hand_label(Some(1)), hand_label(Some(5))];
        for text in labels.iter().map(String::as_str).chain([legend(true), legend(false)]) {
            for c in text.chars() {
                assert!(c == ' ' || glyph(c).is_some(), "missing glyph {c:?} in {text:?}");
            }
        }
    }

    #[test]
    fn status_characters_all_have_glyphs() {
        for c in "radius 0123456789 growing shrinking hand: none fingers esc quit space toggle 0-5".chars() {
            assert!(c == ' ' || glyph(c).is_some(), "missing glyph {c:?}");
        }
    }
}
