//! Collision detection and response for pegs and box geometry
//!
//! Pegs are circles; bucket walls, sensors and field boundaries are
//! axis-aligned boxes. Normals always point from the obstacle toward the
//! ball centre so a ball can be pushed out along them.

use glam::Vec2;

/// Result of a collision check
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Contact point on the obstacle surface (if hit)
    pub point: Vec2,
    /// Surface normal at contact, pointing toward the ball centre
    pub normal: Vec2,
    /// Penetration depth (for position correction)
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            point: Vec2::ZERO,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }
}

/// Check collision between a ball and a circular obstacle (peg)
pub fn ball_circle_collision(
    ball_pos: Vec2,
    ball_radius: f32,
    center: Vec2,
    radius: f32,
) -> CollisionResult {
    let offset = ball_pos - center;
    let dist = offset.length();
    let reach = ball_radius + radius;

    if dist >= reach {
        return CollisionResult::miss();
    }

    // Dead-centre overlap: push straight up so the ball keeps falling around it
    let normal = if dist > 1e-5 { offset / dist } else { Vec2::NEG_Y };
    CollisionResult {
        hit: true,
        point: center + normal * radius,
        normal,
        penetration: reach - dist,
    }
}

/// Check collision between a ball and an axis-aligned box
pub fn ball_box_collision(
    ball_pos: Vec2,
    ball_radius: f32,
    center: Vec2,
    half_extents: Vec2,
) -> CollisionResult {
    let min = center - half_extents;
    let max = center + half_extents;
    let closest = ball_pos.clamp(min, max);
    let offset = ball_pos - closest;
    let dist_sq = offset.length_squared();

    if dist_sq > 1e-10 {
        if dist_sq >= ball_radius * ball_radius {
            return CollisionResult::miss();
        }
        let dist = dist_sq.sqrt();
        return CollisionResult {
            hit: true,
            point: closest,
            normal: offset / dist,
            penetration: ball_radius - dist,
        };
    }

    // Centre is inside the box (tunnelling case) - exit through the nearest face
    let to_min = ball_pos - min;
    let to_max = max - ball_pos;
    let candidates = [
        (to_min.x, Vec2::NEG_X),
        (to_max.x, Vec2::X),
        (to_min.y, Vec2::NEG_Y),
        (to_max.y, Vec2::Y),
    ];
    let (depth, normal) = candidates
        .into_iter()
        .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or((0.0, Vec2::NEG_Y));

    CollisionResult {
        hit: true,
        point: ball_pos + normal * depth,
        normal,
        penetration: depth + ball_radius,
    }
}

/// Reflect with energy loss along the normal
///
/// Only the normal component is scaled by `restitution`; tangential motion
/// is kept so balls roll off pegs instead of sticking.
pub fn bounce_velocity(velocity: Vec2, normal: Vec2, restitution: f32) -> Vec2 {
    let vn = velocity.dot(normal);
    if vn >= 0.0 {
        // Already separating
        return velocity;
    }
    velocity - (1.0 + restitution) * vn * normal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_hit_and_miss() {
        let peg = Vec2::new(100.0, 100.0);
        let result = ball_circle_collision(Vec2::new(100.0, 90.0), 7.0, peg, 4.0);
        assert!(result.hit);
        assert!((result.penetration - 1.0).abs() < 1e-4);
        // Normal points from peg to ball (upward in screen space)
        assert!(result.normal.y < -0.99);

        let result = ball_circle_collision(Vec2::new(100.0, 80.0), 7.0, peg, 4.0);
        assert!(!result.hit);
    }

    #[test]
    fn test_circle_dead_centre() {
        let peg = Vec2::new(10.0, 10.0);
        let result = ball_circle_collision(peg, 7.0, peg, 4.0);
        assert!(result.hit);
        assert_eq!(result.normal, Vec2::NEG_Y);
        assert!((result.penetration - 11.0).abs() < 1e-4);
    }

    #[test]
    fn test_box_side_hit() {
        // Wall 4 wide, 40 tall centred at (50, 50)
        let result = ball_box_collision(
            Vec2::new(57.0, 50.0),
            6.0,
            Vec2::new(50.0, 50.0),
            Vec2::new(2.0, 20.0),
        );
        assert!(result.hit);
        assert!((result.normal.x - 1.0).abs() < 1e-4);
        assert!((result.penetration - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_box_inside_uses_nearest_face() {
        let result = ball_box_collision(
            Vec2::new(50.0, 31.0),
            5.0,
            Vec2::new(50.0, 50.0),
            Vec2::new(20.0, 20.0),
        );
        assert!(result.hit);
        assert_eq!(result.normal, Vec2::NEG_Y);
        assert!((result.penetration - 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_box_miss() {
        let result = ball_box_collision(
            Vec2::new(0.0, 0.0),
            5.0,
            Vec2::new(50.0, 50.0),
            Vec2::new(2.0, 2.0),
        );
        assert!(!result.hit);
    }

    #[test]
    fn test_bounce_velocity_restitution() {
        let bounced = bounce_velocity(Vec2::new(30.0, 100.0), Vec2::NEG_Y, 0.5);
        assert!((bounced.y - (-50.0)).abs() < 1e-3);
        assert!((bounced.x - 30.0).abs() < 1e-3);

        // Separating velocity is untouched
        let v = Vec2::new(0.0, -10.0);
        assert_eq!(bounce_velocity(v, Vec2::NEG_Y, 0.5), v);
    }
}
