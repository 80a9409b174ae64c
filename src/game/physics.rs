//! Ball movement, collisions and scoring

use rand::Rng;

use super::state::{MatchState, Side};
use super::{
    BASE_SPEED, COURT_HEIGHT, COURT_WIDTH, LEFT_PADDLE_FACE, RIGHT_PADDLE_FACE, SPEEDUP_FACTOR,
    WINNING_SCORE,
};

/// Result of advancing a match by one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// A score reached the threshold this frame
    MatchOver { winner: Side },
}

/// Physics system for the Pong court
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance the match by exactly one frame.
    ///
    /// Order is fixed: integrate, wall bounce, left paddle, right paddle,
    /// scoring, win check. Paddle checks see the integrated position and the
    /// post-bounce `vy`. There is no swept collision, so a fast ball can pass
    /// partially through a boundary.
    pub fn step<R: Rng>(state: &mut MatchState, rng: &mut R) -> StepOutcome {
        let ball = &mut state.ball;

        ball.x += ball.vx;
        ball.y += ball.vy;

        if ball.y - ball.r <= 0.0 || ball.y + ball.r >= COURT_HEIGHT {
            ball.vy = -ball.vy;
        }

        if ball.x - ball.r <= LEFT_PADDLE_FACE && state.paddle1.covers(ball.y) {
            ball.vx = ball.vx.abs() * SPEEDUP_FACTOR;
            ball.x = LEFT_PADDLE_FACE + ball.r;
        }

        if ball.x + ball.r >= RIGHT_PADDLE_FACE && state.paddle2.covers(ball.y) {
            ball.vx = -ball.vx.abs() * SPEEDUP_FACTOR;
            ball.x = RIGHT_PADDLE_FACE - ball.r;
        }

        if state.ball.x - state.ball.r <= 0.0 {
            state.score2 += 1;
            Self::reset_ball(state, BASE_SPEED, rng);
        }

        if state.ball.x + state.ball.r >= COURT_WIDTH {
            state.score1 += 1;
            Self::reset_ball(state, -BASE_SPEED, rng);
        }

        Self::check_winner(state)
    }

    /// Put the ball back at center after a point
    pub fn reset_ball<R: Rng>(state: &mut MatchState, vx: f64, rng: &mut R) {
        let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        state.ball.x = COURT_WIDTH / 2.0;
        state.ball.y = COURT_HEIGHT / 2.0;
        state.ball.vx = vx;
        state.ball.vy = sign * BASE_SPEED;
    }

    fn check_winner(state: &MatchState) -> StepOutcome {
        if state.score1 >= WINNING_SCORE {
            StepOutcome::MatchOver { winner: Side::Left }
        } else if state.score2 >= WINNING_SCORE {
            StepOutcome::MatchOver { winner: Side::Right }
        } else {
            StepOutcome::Continue
        }
    }

    /// Convert a raw pointer position into a paddle top edge that keeps the
    /// paddle inside the court. Returns `None` for non-finite input.
    pub fn clamp_paddle(input_y: f64, paddle_height: f64) -> Option<f64> {
        if !input_y.is_finite() {
            return None;
        }
        let max = (COURT_HEIGHT - paddle_height).max(0.0);
        Some((input_y - paddle_height / 2.0).clamp(0.0, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn integrates_velocity() {
        let mut state = MatchState::default();
        let outcome = PhysicsSystem::step(&mut state, &mut rng());
        assert_eq!(outcome, StepOutcome::Continue);
        assert_eq!(state.ball.x, 203.0);
        assert_eq!(state.ball.y, 203.0);
    }

    #[test]
    fn bounces_off_top_wall_without_correction() {
        let mut state = MatchState::default();
        state.ball.y = 12.0;
        state.ball.vy = -3.0;
        PhysicsSystem::step(&mut state, &mut rng());
        assert_eq!(state.ball.vy, 3.0);
        assert_eq!(state.ball.y, 9.0);
    }

    #[test]
    fn bounces_off_bottom_wall() {
        let mut state = MatchState::default();
        state.ball.y = 388.0;
        state.ball.vy = 3.0;
        PhysicsSystem::step(&mut state, &mut rng());
        assert_eq!(state.ball.vy, -3.0);
    }

    #[test]
    fn paddle_hits_speed_up_ball() {
        let mut state = MatchState::default();
        state.ball.x = 42.0;
        state.ball.vx = -3.0;
        state.ball.vy = 0.0;

        PhysicsSystem::step(&mut state, &mut rng());
        assert!(approx(state.ball.vx, 3.15));
        assert_eq!(state.ball.x, 40.0);

        state.ball.x = 357.0;
        PhysicsSystem::step(&mut state, &mut rng());
        assert!(approx(state.ball.vx, -3.3075));
        assert_eq!(state.ball.x, 360.0);
    }

    #[test]
    fn paddle_edge_counts_as_hit() {
        let mut state = MatchState::default();
        state.ball.x = 42.0;
        state.ball.y = 180.0;
        state.ball.vx = -3.0;
        state.ball.vy = 0.0;
        PhysicsSystem::step(&mut state, &mut rng());
        assert!(approx(state.ball.vx, 3.15));
    }

    #[test]
    fn miss_scores_for_right_and_resets() {
        let mut state = MatchState::default();
        state.ball.x = 12.0;
        state.ball.y = 50.0;
        state.ball.vx = -4.5;
        state.ball.vy = 0.0;

        let outcome = PhysicsSystem::step(&mut state, &mut rng());
        assert_eq!(outcome, StepOutcome::Continue);
        assert_eq!(state.score2, 1);
        assert_eq!(state.score1, 0);
        assert_eq!(state.ball.x, 200.0);
        assert_eq!(state.ball.y, 200.0);
        assert_eq!(state.ball.vx, 3.0);
        assert_eq!(state.ball.vy.abs(), 3.0);
    }

    #[test]
    fn miss_scores_for_left_and_resets() {
        let mut state = MatchState::default();
        state.ball.x = 388.0;
        state.ball.y = 50.0;
        state.ball.vx = 5.0;
        state.ball.vy = 0.0;

        PhysicsSystem::step(&mut state, &mut rng());
        assert_eq!(state.score1, 1);
        assert_eq!(state.ball.vx, -3.0);
    }

    #[test]
    fn reset_picks_both_vertical_signs() {
        let mut state = MatchState::default();
        let mut rng = rng();
        let mut seen_up = false;
        let mut seen_down = false;
        for _ in 0..64 {
            PhysicsSystem::reset_ball(&mut state, 3.0, &mut rng);
            if state.ball.vy > 0.0 {
                seen_down = true;
            } else {
                seen_up = true;
            }
        }
        assert!(seen_up && seen_down);
    }

    #[test]
    fn winning_point_ends_match_same_frame() {
        let mut state = MatchState::default();
        state.score1 = 4;
        state.ball.x = 388.0;
        state.ball.y = 50.0;
        state.ball.vx = 5.0;
        state.ball.vy = 0.0;

        let outcome = PhysicsSystem::step(&mut state, &mut rng());
        assert_eq!(outcome, StepOutcome::MatchOver { winner: Side::Left });
        assert_eq!(state.score1, 5);
    }

    #[test]
    fn preset_threshold_ends_match() {
        let mut state = MatchState::default();
        state.score2 = 5;
        let outcome = PhysicsSystem::step(&mut state, &mut rng());
        assert_eq!(outcome, StepOutcome::MatchOver { winner: Side::Right });
        assert_eq!(state.score2, 5);
    }

    #[test]
    fn long_rally_never_exceeds_threshold() {
        let mut state = MatchState::default();
        // Paddles parked at the top so most serves go past
        state.paddle1.y = 0.0;
        state.paddle2.y = 0.0;
        let mut rng = rng();
        let mut frames = 0;
        loop {
            frames += 1;
            let before = (state.score1, state.score2);
            let outcome = PhysicsSystem::step(&mut state, &mut rng);
            assert!(state.score1 >= before.0 && state.score2 >= before.1);
            if let StepOutcome::MatchOver { .. } = outcome {
                break;
            }
            assert!(frames < 100_000, "match never ended");
        }
        assert!(state.score1.max(state.score2) == 5);
    }

    #[test]
    fn clamp_keeps_paddle_on_court() {
        assert_eq!(PhysicsSystem::clamp_paddle(200.0, 60.0), Some(170.0));
        assert_eq!(PhysicsSystem::clamp_paddle(-50.0, 60.0), Some(0.0));
        assert_eq!(PhysicsSystem::clamp_paddle(10.0, 60.0), Some(0.0));
        assert_eq!(PhysicsSystem::clamp_paddle(399.0, 60.0), Some(340.0));
        assert_eq!(PhysicsSystem::clamp_paddle(1e9, 60.0), Some(340.0));
        assert_eq!(PhysicsSystem::clamp_paddle(f64::NAN, 60.0), None);
        assert_eq!(PhysicsSystem::clamp_paddle(f64::INFINITY, 60.0), None);
    }
}
