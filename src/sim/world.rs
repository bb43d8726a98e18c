//! Rigid-body world for the peg field
//!
//! Everything except the ball is static. Four collision categories are
//! filtered with bit masks: balls touch pegs, bucket sensors and walls;
//! static bodies never test against each other, and balls never touch
//! other balls.

use glam::Vec2;

use super::collision::{ball_box_collision, ball_circle_collision, bounce_velocity};
use super::layout::Layout;
use super::state::Ball;

/// Collision category bits
pub mod category {
    pub const BALL: u32 = 0x0001;
    pub const PEG: u32 = 0x0002;
    pub const BUCKET_SENSOR: u32 = 0x0004;
    pub const WALL: u32 = 0x0008;
}

/// Gravity in peg spacings per second squared
pub const GRAVITY_SPACINGS: f32 = 30.0;
/// Peg bounciness
pub const PEG_RESTITUTION: f32 = 0.5;
/// Wall and bucket-floor bounciness
pub const WALL_RESTITUTION: f32 = 0.2;
/// Wall thickness as a fraction of the spacing
const WALL_THICKNESS_SPACINGS: f32 = 0.06;
/// Upper bound on motion substeps per tick
const MAX_MOTION_STEPS: usize = 20;

/// Category/mask pair; two bodies interact only if each accepts the other
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionFilter {
    pub category: u32,
    pub mask: u32,
}

impl CollisionFilter {
    pub const BALL: Self = Self {
        category: category::BALL,
        mask: category::PEG | category::BUCKET_SENSOR | category::WALL,
    };
    pub const PEG: Self = Self {
        category: category::PEG,
        mask: category::BALL,
    };
    pub const BUCKET_SENSOR: Self = Self {
        category: category::BUCKET_SENSOR,
        mask: category::BALL,
    };
    pub const WALL: Self = Self {
        category: category::WALL,
        mask: category::BALL,
    };

    #[inline]
    pub fn collides_with(&self, other: &CollisionFilter) -> bool {
        (self.mask & other.category) != 0 && (other.mask & self.category) != 0
    }
}

/// Which side of a container a wall sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallSide {
    Left,
    Right,
    Bottom,
}

/// What a static body is; bucket geometry always names its owning bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLabel {
    Peg { index: usize },
    BucketSensor { bucket: usize },
    BucketWall { bucket: usize, side: WallSide },
    Boundary { side: WallSide },
}

impl BodyLabel {
    /// Owning bucket for sensors and bucket walls
    pub fn bucket(&self) -> Option<usize> {
        match *self {
            BodyLabel::BucketSensor { bucket } | BodyLabel::BucketWall { bucket, .. } => {
                Some(bucket)
            }
            _ => None,
        }
    }

    pub fn is_peg(&self) -> bool {
        matches!(self, BodyLabel::Peg { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Circle { center: Vec2, radius: f32 },
    Box { center: Vec2, half_extents: Vec2 },
}

/// A fixed body in the world
#[derive(Debug, Clone, PartialEq)]
pub struct StaticBody {
    pub label: BodyLabel,
    pub shape: Shape,
    pub filter: CollisionFilter,
    /// Sensors report overlap but never push the ball
    pub sensor: bool,
    pub restitution: f32,
}

/// One body touched by the ball during a step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Index into `PhysicsWorld::bodies`
    pub body: usize,
    pub label: BodyLabel,
    pub normal: Vec2,
    pub point: Vec2,
    pub sensor: bool,
}

/// The static collision world built from a layout
#[derive(Debug, Clone)]
pub struct PhysicsWorld {
    pub gravity: Vec2,
    bodies: Vec<StaticBody>,
}

impl PhysicsWorld {
    pub fn from_layout(layout: &Layout) -> Self {
        let spacing = layout.spacing;
        let thickness = (spacing * WALL_THICKNESS_SPACINGS).max(1.0);
        let half_t = thickness / 2.0;
        let mut bodies = Vec::with_capacity(layout.pegs.len() + layout.buckets.len() * 4 + 3);

        for (index, peg) in layout.pegs.iter().enumerate() {
            bodies.push(StaticBody {
                label: BodyLabel::Peg { index },
                shape: Shape::Circle {
                    center: peg.pos(),
                    radius: peg.radius,
                },
                filter: CollisionFilter::PEG,
                sensor: false,
                restitution: PEG_RESTITUTION,
            });
        }

        for bucket in &layout.buckets {
            let b = bucket.index;
            let half_h = bucket.height / 2.0;
            bodies.push(StaticBody {
                label: BodyLabel::BucketSensor { bucket: b },
                shape: Shape::Box {
                    center: Vec2::new(bucket.x, bucket.y),
                    half_extents: Vec2::new(bucket.width / 2.0 - half_t, half_h),
                },
                filter: CollisionFilter::BUCKET_SENSOR,
                sensor: true,
                restitution: 0.0,
            });
            let walls = [
                (
                    WallSide::Left,
                    Vec2::new(bucket.left(), bucket.y),
                    Vec2::new(half_t, half_h),
                ),
                (
                    WallSide::Right,
                    Vec2::new(bucket.right(), bucket.y),
                    Vec2::new(half_t, half_h),
                ),
                (
                    WallSide::Bottom,
                    Vec2::new(bucket.x, bucket.bottom()),
                    Vec2::new(bucket.width / 2.0, half_t),
                ),
            ];
            for (side, center, half_extents) in walls {
                bodies.push(StaticBody {
                    label: BodyLabel::BucketWall { bucket: b, side },
                    shape: Shape::Box {
                        center,
                        half_extents,
                    },
                    filter: CollisionFilter::WALL,
                    sensor: false,
                    restitution: WALL_RESTITUTION,
                });
            }
        }

        // Field boundaries: side walls from the top of the canvas down to the floor
        let floor = layout.floor_y();
        let side_half = Vec2::new(half_t, floor / 2.0 + thickness);
        let boundaries = [
            (
                WallSide::Left,
                Vec2::new(layout.field_left() - half_t, floor / 2.0),
                side_half,
            ),
            (
                WallSide::Right,
                Vec2::new(layout.field_right() + half_t, floor / 2.0),
                side_half,
            ),
            (
                WallSide::Bottom,
                Vec2::new(layout.width / 2.0, floor + thickness),
                Vec2::new(layout.width / 2.0, half_t),
            ),
        ];
        for (side, center, half_extents) in boundaries {
            bodies.push(StaticBody {
                label: BodyLabel::Boundary { side },
                shape: Shape::Box {
                    center,
                    half_extents,
                },
                filter: CollisionFilter::WALL,
                sensor: false,
                restitution: WALL_RESTITUTION,
            });
        }

        Self {
            gravity: Vec2::new(0.0, GRAVITY_SPACINGS * spacing),
            bodies,
        }
    }

    pub fn bodies(&self) -> &[StaticBody] {
        &self.bodies
    }

    /// Integrate one tick for a ball and collect its contacts
    ///
    /// Accumulated forces are applied and cleared; motion is split into
    /// substeps no longer than 0.3 radii so the ball cannot skip a peg.
    pub fn step_ball(&self, ball: &mut Ball, dt: f32) -> Vec<Contact> {
        let accel = self.gravity + ball.force / ball.mass;
        ball.vel += accel * dt;
        ball.force = Vec2::ZERO;

        let move_dist = ball.vel.length() * dt;
        let step_size = ball.radius * 0.3;
        let num_steps = ((move_dist / step_size).ceil() as usize).clamp(1, MAX_MOTION_STEPS);
        let step_dt = dt / num_steps as f32;

        let mut contacts: Vec<Contact> = Vec::new();
        for _step in 0..num_steps {
            ball.pos += ball.vel * step_dt;

            for (idx, body) in self.bodies.iter().enumerate() {
                if !CollisionFilter::BALL.collides_with(&body.filter) {
                    continue;
                }
                let result = match body.shape {
                    Shape::Circle { center, radius } => {
                        ball_circle_collision(ball.pos, ball.radius, center, radius)
                    }
                    Shape::Box {
                        center,
                        half_extents,
                    } => ball_box_collision(ball.pos, ball.radius, center, half_extents),
                };
                if !result.hit {
                    continue;
                }

                if !body.sensor {
                    ball.pos += result.normal * result.penetration;
                    ball.vel = bounce_velocity(ball.vel, result.normal, body.restitution);
                }

                if !contacts.iter().any(|c| c.body == idx) {
                    contacts.push(Contact {
                        body: idx,
                        label: body.label,
                        normal: result.normal,
                        point: result.point,
                        sensor: body.sensor,
                    });
                }
            }
        }

        contacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::layout::compute_layout;
    use crate::sim::multipliers::RiskTier;
    use crate::sim::state::{Ball, BallId};
    use crate::sim::tests_support::sample_round;

    fn world_8() -> (Layout, PhysicsWorld) {
        let layout = compute_layout(8, RiskTier::Low, 800.0, 700.0).unwrap();
        let world = PhysicsWorld::from_layout(&layout);
        (layout, world)
    }

    #[test]
    fn test_filters() {
        use CollisionFilter as F;
        assert!(F::BALL.collides_with(&F::PEG));
        assert!(F::BALL.collides_with(&F::BUCKET_SENSOR));
        assert!(F::BALL.collides_with(&F::WALL));
        assert!(!F::BALL.collides_with(&F::BALL));
        assert!(!F::PEG.collides_with(&F::WALL));
        assert!(!F::PEG.collides_with(&F::BUCKET_SENSOR));
        assert!(!F::WALL.collides_with(&F::BUCKET_SENSOR));
        assert!(!F::PEG.collides_with(&F::PEG));
    }

    #[test]
    fn test_body_counts_and_labels() {
        let (layout, world) = world_8();
        let pegs = world.bodies().iter().filter(|b| b.label.is_peg()).count();
        assert_eq!(pegs, layout.pegs.len());

        for bucket in 0..layout.bucket_count() {
            let owned: Vec<_> = world
                .bodies()
                .iter()
                .filter(|b| b.label.bucket() == Some(bucket))
                .collect();
            // One sensor plus three solid walls
            assert_eq!(owned.len(), 4);
            assert_eq!(owned.iter().filter(|b| b.sensor).count(), 1);
        }
    }

    #[test]
    fn test_ball_falls_and_hits_centre_peg() {
        let (layout, world) = world_8();
        let mut ball = Ball::new(BallId::new(0, 0), &layout, layout.drop_point, sample_round(4), 0.0);
        let mut hit_peg = false;
        for _ in 0..240 {
            let contacts = world.step_ball(&mut ball, crate::consts::SIM_DT);
            if contacts.iter().any(|c| c.label == BodyLabel::Peg { index: 1 }) {
                hit_peg = true;
                break;
            }
        }
        assert!(hit_peg, "ball dropped on the centre line should hit the first-row centre peg");
        // Bounced: now moving upward or sideways, not straight through
        assert!(ball.pos.y < layout.pegs[1].y);
    }

    #[test]
    fn test_sensor_does_not_push() {
        let (layout, world) = world_8();
        let bucket = layout.buckets[3];
        let start = Vec2::new(bucket.x, bucket.y);
        let mut ball = Ball::new(BallId::new(0, 0), &layout, start, sample_round(3), 0.0);
        ball.vel = Vec2::ZERO;
        let contacts = world.step_ball(&mut ball, 1.0 / 1000.0);
        assert!(contacts
            .iter()
            .any(|c| c.sensor && c.label == BodyLabel::BucketSensor { bucket: 3 }));
        assert!((ball.pos.x - start.x).abs() < 1e-3);
    }

    #[test]
    fn test_bucket_floor_stops_ball() {
        let (layout, world) = world_8();
        let bucket = layout.buckets[0];
        let mut ball = Ball::new(
            BallId::new(0, 0),
            &layout,
            Vec2::new(bucket.x, bucket.top()),
            sample_round(0),
            0.0,
        );
        ball.vel = Vec2::new(0.0, 40.0 * layout.spacing);
        for _ in 0..240 {
            world.step_ball(&mut ball, crate::consts::SIM_DT);
        }
        assert!(ball.pos.y <= bucket.bottom());
        assert!(ball.pos.x >= bucket.left() && ball.pos.x <= bucket.right());
    }
}
