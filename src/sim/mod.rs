//! Guided physics simulation
//!
//! Everything that moves a ball lives here. The simulation never decides
//! an outcome: each ball carries the `Round` it reveals and is steered
//! toward that round's bucket.
//! - Fixed timestep only
//! - Seeded RNG only (spawn jitter, stall nudges)
//! - No rendering or platform dependencies

pub mod collision;
pub mod guidance;
pub mod landing;
pub mod layout;
pub mod multipliers;
pub mod state;
pub mod tick;
pub mod world;

pub use collision::{CollisionResult, ball_box_collision, ball_circle_collision};
pub use guidance::{GuidanceBand, GuidanceController, StallRecovery};
pub use landing::{Landing, LandingVia};
pub use layout::{Bucket, Layout, Peg, compute_layout};
pub use multipliers::{RiskTier, bucket_probability, multipliers};
pub use state::{Ball, BallArena, BallId, SimulationSession, TRAIL_LENGTH, TrailPoint};
pub use tick::{SimEvent, TickInput, tick};
pub use world::{BodyLabel, CollisionFilter, PhysicsWorld};
