//! Authoritative match state (ball, paddles, scores)

use serde::{Deserialize, Serialize};

use super::{
    BALL_RADIUS, BASE_SPEED, COURT_HEIGHT, COURT_WIDTH, PADDLE_HEIGHT, PADDLE_START_Y,
    PADDLE_WIDTH,
};

/// Which paddle a participant controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Participant index 0, paddle1
    Left,
    /// Participant index 1, paddle2
    Right,
}

impl Side {
    /// Side for a position in the participant list
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Left),
            1 => Some(Self::Right),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub r: f64,
}

impl Default for Ball {
    fn default() -> Self {
        Self {
            x: COURT_WIDTH / 2.0,
            y: COURT_HEIGHT / 2.0,
            vx: BASE_SPEED,
            vy: BASE_SPEED,
            r: BALL_RADIUS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Paddle {
    /// Top edge
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Paddle {
    /// Whether a vertical coordinate lies on the paddle face (edges inclusive)
    pub fn covers(&self, y: f64) -> bool {
        y >= self.y && y <= self.y + self.height
    }
}

impl Default for Paddle {
    fn default() -> Self {
        Self {
            y: PADDLE_START_Y,
            width: PADDLE_WIDTH,
            height: PADDLE_HEIGHT,
        }
    }
}

/// Full per-match simulation state, broadcast as-is every tick
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchState {
    pub ball: Ball,
    pub paddle1: Paddle,
    pub paddle2: Paddle,
    pub score1: u32,
    pub score2: u32,
}

impl MatchState {
    pub fn paddle(&self, side: Side) -> &Paddle {
        match side {
            Side::Left => &self.paddle1,
            Side::Right => &self.paddle2,
        }
    }

    pub fn paddle_mut(&mut self, side: Side) -> &mut Paddle {
        match side {
            Side::Left => &mut self.paddle1,
            Side::Right => &mut self.paddle2,
        }
    }

    pub fn score(&self, side: Side) -> u32 {
        match side {
            Side::Left => self.score1,
            Side::Right => self.score2,
        }
    }
}
