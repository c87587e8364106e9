//! Hand landmarks and the extended-finger heuristic.
//!
//! Landmarks use the 21-point hand layout common to hand-pose detectors:
//! wrist at 0, then four points per digit from the base to the tip
//! (thumb 1–4, index 5–8, middle 9–12, ring 13–16, pinky 17–20).
//! Coordinates are normalised image coordinates: `x` grows to the right and
//! `y` grows downward.

use dot_state::Command;

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST:     usize = 0;
pub const THUMB_IP:  usize = 3;
pub const THUMB_TIP: usize = 4;
/// Index, middle, ring and pinky tips.  Each is compared with the joint two
/// places below it (the PIP joint).
pub const FINGER_TIPS: [usize; 4] = [8, 12, 16, 20];

/// Extended fingers at or above this count mean "grow".
pub const GROW_THRESHOLD: u8 = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32) -> Self {
        Landmark { x, y }
    }
}

/// One detected hand.
#[derive(Clone, Debug, PartialEq)]
pub struct HandLandmarks {
    points: [Landmark; LANDMARK_COUNT],
}

impl HandLandmarks {
    pub fn new(points: [Landmark; LANDMARK_COUNT]) -> Self {
        HandLandmarks { points }
    }

    pub fn point(&self, idx: usize) -> Landmark {
        self.points[idx]
    }

    pub fn points(&self) -> &[Landmark; LANDMARK_COUNT] {
        &self.points
    }

    /// A synthetic upright right hand with its first `extended` digits
    /// straightened, in the order index, middle, ring, pinky, thumb.
    /// Counts above five are treated as five.
    pub fn with_extended(extended: u8) -> Self {
        let mut points = [Landmark::default(); LANDMARK_COUNT];
        points[WRIST] = Landmark::new(0.5, 0.9);

        for (i, &tip) in FINGER_TIPS.iter().enumerate() {
            let x = 0.42 + 0.06 * i as f32;
            let straight = (i as u8) < extended;
            // base, PIP, DIP, tip
            let ys = if straight {
                [0.60, 0.50, 0.42, 0.35]
            } else {
                [0.60, 0.52, 0.58, 0.62]
            };
            for (k, &y) in ys.iter().enumerate() {
                points[tip - 3 + k] = Landmark::new(x, y);
            }
        }

        let thumb_out = extended >= 5;
        points[1] = Landmark::new(0.40, 0.75);
        points[2] = Landmark::new(0.36, 0.70);
        points[THUMB_IP] = Landmark::new(0.33, 0.66);
        points[THUMB_TIP] = if thumb_out {
            Landmark::new(0.36, 0.62)
        } else {
            Landmark::new(0.30, 0.63)
        };

        HandLandmarks { points }
    }
}

/// Count extended digits.
///
/// A finger is extended when its tip sits above its PIP joint.  The thumb is
/// extended when its tip lies to the right of its IP joint.
pub fn count_extended_fingers(hand: &HandLandmarks) -> u8 {
    let fingers = FINGER_TIPS
        .iter()
        .filter(|&&tip| hand.point(tip).y < hand.point(tip - 2).y)
        .count() as u8;
    let thumb = (hand.point(THUMB_TIP).x > hand.point(THUMB_IP).x) as u8;
    fingers + thumb
}

/// Open hand grows the dot, a mostly closed hand shrinks it.
pub fn classify_fingers(extended: u8) -> Command {
    if extended >= GROW_THRESHOLD {
        Command::Grow
    } else {
        Command::Shrink
    }
}

pub fn classify_hand(hand: &HandLandmarks) -> Command {
    classify_fingers(count_extended_fingers(hand))
}
