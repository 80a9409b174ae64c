//! Connection sessions and the coordinator that drives matches from them

pub mod coordinator;

pub use coordinator::{Joined, Session, SessionCoordinator};
