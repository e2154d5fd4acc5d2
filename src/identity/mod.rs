//! # Identity Pool
//!
//! A finite set of reusable display colors. Every named session holds exactly
//! one color for the lifetime of its connection; the color goes back to the
//! pool when the session disconnects.
//!
//! Colors are handed out FIFO from the free queue. The initial order is a
//! uniform Fisher-Yates shuffle of the palette, released colors are appended
//! to the back.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::warn;

/// Palette used when none is configured
pub const DEFAULT_PALETTE: [&str; 7] = [
    "red", "green", "blue", "magenta", "purple", "plum", "orange",
];

/// A display color token, serialized as a bare string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(String);

impl Color {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Color {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Pool of colors not currently held by any session
///
/// # Invariant
/// `free ∪ held == palette` and no color is in `free` twice. `release`
/// refuses tokens that would break this.
#[derive(Debug)]
pub struct IdentityPool {
    palette: Vec<Color>,
    free: VecDeque<Color>,
}

impl IdentityPool {
    /// Creates a pool over `palette` in uniformly shuffled order
    pub fn new(palette: Vec<Color>) -> Self {
        let mut shuffled = dedup(palette);
        shuffled.shuffle(&mut rand::rng());
        Self::ordered(shuffled)
    }

    /// Creates a pool that hands out colors in exactly the given order
    pub fn ordered(palette: Vec<Color>) -> Self {
        let palette = dedup(palette);
        let free = palette.iter().cloned().collect();
        Self { palette, free }
    }

    /// Takes the next free color, `None` when every color is held
    pub fn acquire(&mut self) -> Option<Color> {
        self.free.pop_front()
    }

    /// Returns a held color to the pool
    pub fn release(&mut self, color: Color) {
        if !self.palette.contains(&color) {
            warn!("Ignoring release of color outside the palette: {}", color);
            return;
        }
        if self.free.contains(&color) {
            warn!("Ignoring release of color that is already free: {}", color);
            return;
        }
        self.free.push_back(color);
    }

    /// Number of colors currently free
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Total palette size
    pub fn capacity(&self) -> usize {
        self.palette.len()
    }
}

impl Default for IdentityPool {
    fn default() -> Self {
        Self::new(DEFAULT_PALETTE.iter().map(|c| Color::from(*c)).collect())
    }
}

fn dedup(palette: Vec<Color>) -> Vec<Color> {
    let mut unique: Vec<Color> = Vec::with_capacity(palette.len());
    for color in palette {
        if !unique.contains(&color) {
            unique.push(color);
        }
    }
    unique
}
