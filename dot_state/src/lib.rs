//! # dot_state
//!
//! The whole of the dot's mutable state: one radius and one direction.
//!
//! Input sources never touch this state directly.  They emit [`Command`]s,
//! and the render loop applies them here in arrival order, then advances
//! the radius by one [`DotState::tick`].
//!
//! ## Direction state machine
//!
//! | Command | Growing | Shrinking |
//! |---|---|---|
//! | `Grow` | Growing | Growing |
//! | `Shrink` | Shrinking | Shrinking |
//! | `Toggle` | Shrinking | Growing |
//!
//! The direction only changes through a command.  Ticking moves the radius
//! toward the current direction and clamps it to [`RadiusBounds`].

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

// ════════════════════════════════════════════════════════════════════════════
// Compile-time tuning
// ════════════════════════════════════════════════════════════════════════════

/// Smallest radius the dot can shrink to (pixels).
pub const MIN_RADIUS:     u32 = 5;
/// Largest radius the dot can grow to (pixels).
pub const MAX_RADIUS:     u32 = 200;
/// Pixels added or removed per tick.
pub const CHANGE_RATE:    u32 = 2;
/// Radius at start-up.
pub const INITIAL_RADIUS: u32 = 20;
/// Target render ticks per second.
pub const TICK_HZ:        u32 = 60;

// ════════════════════════════════════════════════════════════════════════════
// Command
// ════════════════════════════════════════════════════════════════════════════

/// A coarse instruction produced by an input source.
///
/// `Grow` and `Shrink` set the direction absolutely; `Toggle` flips it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Grow,
    Shrink,
    Toggle,
}

impl Command {
    pub const ALL: [Command; 3] = [Command::Grow, Command::Shrink, Command::Toggle];

    pub fn as_str(self) -> &'static str {
        match self {
            Command::Grow   => "grow",
            Command::Shrink => "shrink",
            Command::Toggle => "toggle",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command {0:?} (expected grow, shrink or toggle)")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grow"   => Ok(Command::Grow),
            "shrink" => Ok(Command::Shrink),
            "toggle" => Ok(Command::Toggle),
            _        => Err(UnknownCommand(s.to_string())),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Direction
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Growing,
    Shrinking,
}

impl Direction {
    pub fn flip(self) -> Self {
        match self {
            Direction::Growing   => Direction::Shrinking,
            Direction::Shrinking => Direction::Growing,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::Growing   => "growing",
            Direction::Shrinking => "shrinking",
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// RadiusBounds
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("minimum radius {min} exceeds maximum radius {max}")]
pub struct BoundsError {
    pub min: u32,
    pub max: u32,
}

/// Inclusive `[min, max]` range the radius is kept in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RadiusBounds {
    min: u32,
    max: u32,
}

impl RadiusBounds {
    pub fn new(min: u32, max: u32) -> Result<Self, BoundsError> {
        if min > max {
            return Err(BoundsError { min, max });
        }
        Ok(RadiusBounds { min, max })
    }

    pub fn min(&self) -> u32 { self.min }
    pub fn max(&self) -> u32 { self.max }

    pub fn clamp(&self, radius: u32) -> u32 {
        radius.clamp(self.min, self.max)
    }

    pub fn contains(&self, radius: u32) -> bool {
        (self.min..=self.max).contains(&radius)
    }
}

impl Default for RadiusBounds {
    fn default() -> Self {
        RadiusBounds { min: MIN_RADIUS, max: MAX_RADIUS }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// DotState
// ════════════════════════════════════════════════════════════════════════════

/// Radius and direction of the dot, owned by the render loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DotState {
    radius:    u32,
    direction: Direction,
    bounds:    RadiusBounds,
    step:      u32,
}

impl DotState {
    /// Build a state; a `radius` outside `bounds` is clamped into them.
    pub fn new(radius: u32, direction: Direction, bounds: RadiusBounds, step: u32) -> Self {
        DotState {
            radius: bounds.clamp(radius),
            direction,
            bounds,
            step,
        }
    }

    pub fn radius(&self)    -> u32          { self.radius }
    pub fn direction(&self) -> Direction    { self.direction }
    pub fn bounds(&self)    -> RadiusBounds { self.bounds }
    pub fn step(&self)      -> u32          { self.step }

    pub fn apply(&mut self, cmd: Command) {
        self.direction = match cmd {
            Command::Grow   => Direction::Growing,
            Command::Shrink => Direction::Shrinking,
            Command::Toggle => self.direction.flip(),
        };
    }

    /// Apply a batch of commands in order.  Only the direction changes.
    pub fn apply_all<I>(&mut self, cmds: I)
    where
        I: IntoIterator<Item = Command>,
    {
        for cmd in cmds {
            self.apply(cmd);
        }
    }

    /// Advance the radius one step in the current direction.
    pub fn tick(&mut self) {
        self.radius = match self.direction {
            Direction::Growing   => self.radius.saturating_add(self.step).min(self.bounds.max),
            Direction::Shrinking => self.radius.saturating_sub(self.step).max(self.bounds.min),
        };
    }
}

impl Default for DotState {
    fn default() -> Self {
        DotState::new(INITIAL_RADIUS, Direction::Growing, RadiusBounds::default(), CHANGE_RATE)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
