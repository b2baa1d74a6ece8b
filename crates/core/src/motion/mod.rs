use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use serde::{Deserialize, Serialize};

use crate::{geometry::Bounds, scene::CanvasSize};

/// Speed value shared between the context that sets it (heart-rate updates)
/// and the tick thread that reads it inside step functions.
///
/// Stored as raw `f32` bits so either side can touch it without a lock.
#[derive(Debug, Clone)]
pub struct SharedSpeed {
    bits: Arc<AtomicU32>,
}

impl SharedSpeed {
    pub fn new(speed: f32) -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(speed.to_bits())),
        }
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub fn set(&self, speed: f32) {
        self.bits.store(speed.to_bits(), Ordering::Release);
    }
}

impl Default for SharedSpeed {
    fn default() -> Self {
        Self::new(2.0)
    }
}

/// Sign of travel on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Heading {
    Backward,
    Forward,
}

impl Heading {
    pub fn sign(self) -> f32 {
        match self {
            Heading::Backward => -1.0,
            Heading::Forward => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Direction {
    pub horizontal: Heading,
    pub vertical: Heading,
}

impl Default for Direction {
    fn default() -> Self {
        Self {
            horizontal: Heading::Forward,
            vertical: Heading::Forward,
        }
    }
}

/// Elastic-wall animation context for a single shape.
///
/// Every step moves the box by `speed * direction` and then re-checks the
/// walls: an edge past the far wall turns that axis backward, an edge past
/// zero turns it forward. The check runs on every step, so a box that
/// overshoots by more than one step keeps heading back until it is inside.
#[derive(Debug, Clone)]
pub struct Bounce {
    canvas: CanvasSize,
    speed: SharedSpeed,
    direction: Direction,
}

impl Bounce {
    pub fn new(canvas: CanvasSize, speed: SharedSpeed) -> Self {
        Self::with_direction(canvas, speed, Direction::default())
    }

    pub fn with_direction(canvas: CanvasSize, speed: SharedSpeed, direction: Direction) -> Self {
        Self {
            canvas,
            speed,
            direction,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn speed(&self) -> &SharedSpeed {
        &self.speed
    }

    pub fn advance(&mut self, bounds: &mut Bounds) {
        let speed = self.speed.get();
        bounds.offset(
            speed * self.direction.horizontal.sign(),
            speed * self.direction.vertical.sign(),
        );

        self.direction.horizontal = reflect(
            self.direction.horizontal,
            bounds.min_x(),
            bounds.max_x(),
            self.canvas.width as f32,
        );
        self.direction.vertical = reflect(
            self.direction.vertical,
            bounds.min_y(),
            bounds.max_y(),
            self.canvas.height as f32,
        );
    }
}

fn reflect(current: Heading, min: f32, max: f32, limit: f32) -> Heading {
    if max > limit {
        Heading::Backward
    } else if min < 0.0 {
        Heading::Forward
    } else {
        current
    }
}
