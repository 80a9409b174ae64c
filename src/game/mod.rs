//! Game simulation modules

pub mod physics;
pub mod registry;
pub mod state;
pub mod ticker;

pub use physics::{PhysicsSystem, StepOutcome};
pub use registry::{JoinError, MatchEntry, MatchHandle, MatchRegistry};
pub use state::{Ball, MatchState, Paddle, Side};
pub use ticker::{spawn_ticker, TickerHandle};

/// Court dimensions
pub const COURT_WIDTH: f64 = 400.0;
pub const COURT_HEIGHT: f64 = 400.0;

pub const BALL_RADIUS: f64 = 10.0;
pub const PADDLE_WIDTH: f64 = 10.0;
pub const PADDLE_HEIGHT: f64 = 60.0;
/// Top edge of both paddles when a match is created
pub const PADDLE_START_Y: f64 = 180.0;

/// X coordinate of each paddle's striking face
pub const LEFT_PADDLE_FACE: f64 = 30.0;
pub const RIGHT_PADDLE_FACE: f64 = 370.0;

/// Horizontal serve speed and the speed of both axes after a reset
pub const BASE_SPEED: f64 = 3.0;
/// Applied to |vx| on every paddle hit
pub const SPEEDUP_FACTOR: f64 = 1.05;

pub const WINNING_SCORE: u32 = 5;

/// Participants needed before a match starts ticking
pub const MAX_PARTICIPANTS: usize = 2;
