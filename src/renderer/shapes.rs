//! Shape generation for 2D primitives

use glam::Vec2;
use std::f32::consts::PI;

use super::vertex::Vertex;
use crate::sim::state::TrailPoint;

/// Trail speed (in spacings/s) that maps to the hottest color
const TRAIL_HOT_SPEED: f32 = 25.0;

/// Interpolate color based on speed (slow=blue, medium=green, fast=orange)
fn speed_color(speed: f32, alpha: f32) -> [f32; 4] {
    let t = (speed / TRAIL_HOT_SPEED).clamp(0.0, 1.0);

    let (r, g, b) = if t < 0.33 {
        let u = t / 0.33;
        (0.2, 0.4 + 0.4 * u, 1.0)
    } else if t < 0.66 {
        let u = (t - 0.33) / 0.33;
        (0.2 + 0.6 * u, 0.8, 1.0 - 0.8 * u)
    } else {
        let u = (t - 0.66) / 0.34;
        (0.8 + 0.2 * u, 0.8 - 0.4 * u, 0.2)
    };

    [r, g, b, alpha]
}

/// Linear blend between two colors
pub fn mix(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    let t = t.clamp(0.0, 1.0);
    std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
}

/// Tapered trail behind a ball
///
/// `trail` is newest first; speeds are divided by `spacing` so colors do not
/// depend on canvas size.
pub fn ball_trail(trail: &[TrailPoint], ball_radius: f32, spacing: f32) -> Vec<Vertex> {
    if trail.len() < 2 {
        return Vec::new();
    }

    let mut vertices = Vec::with_capacity((trail.len() - 1) * 6);
    let trail_len = trail.len() as f32;
    let spacing = spacing.max(f32::EPSILON);

    for (i, pair) in trail.windows(2).enumerate() {
        let (p1, p2) = (&pair[0], &pair[1]);

        let t1 = i as f32 / trail_len;
        let t2 = (i + 1) as f32 / trail_len;

        let color1 = speed_color(p1.speed / spacing, (1.0 - t1) * 0.6);
        let color2 = speed_color(p2.speed / spacing, (1.0 - t2) * 0.6);

        let width1 = ball_radius * (1.0 - t1 * 0.8);
        let width2 = ball_radius * (1.0 - t2 * 0.8);

        let dir = (p2.pos - p1.pos).normalize_or_zero();
        let perp = Vec2::new(-dir.y, dir.x);

        let v1a = p1.pos + perp * width1;
        let v1b = p1.pos - perp * width1;
        let v2a = p2.pos + perp * width2;
        let v2b = p2.pos - perp * width2;

        vertices.push(Vertex::new(v1a.x, v1a.y, color1));
        vertices.push(Vertex::new(v1b.x, v1b.y, color1));
        vertices.push(Vertex::new(v2a.x, v2a.y, color2));

        vertices.push(Vertex::new(v2a.x, v2a.y, color2));
        vertices.push(Vertex::new(v1b.x, v1b.y, color1));
        vertices.push(Vertex::new(v2b.x, v2b.y, color2));
    }

    vertices
}

/// Generate vertices for a filled circle
pub fn circle(center: Vec2, radius: f32, color: [f32; 4], segments: u32) -> Vec<Vertex> {
    let segments = segments.max(3);
    let mut vertices = Vec::with_capacity((segments * 3) as usize);

    for i in 0..segments {
        let theta1 = (i as f32 / segments as f32) * 2.0 * PI;
        let theta2 = ((i + 1) as f32 / segments as f32) * 2.0 * PI;

        vertices.push(Vertex::new(center.x, center.y, color));
        vertices.push(Vertex::new(
            center.x + radius * theta1.cos(),
            center.y + radius * theta1.sin(),
            color,
        ));
        vertices.push(Vertex::new(
            center.x + radius * theta2.cos(),
            center.y + radius * theta2.sin(),
            color,
        ));
    }

    vertices
}

/// Axis-aligned filled rectangle from its top-left corner
pub fn rect(min: Vec2, size: Vec2, color: [f32; 4]) -> Vec<Vertex> {
    let max = min + size;
    vec![
        Vertex::new(min.x, min.y, color),
        Vertex::new(max.x, min.y, color),
        Vertex::new(min.x, max.y, color),
        Vertex::new(min.x, max.y, color),
        Vertex::new(max.x, min.y, color),
        Vertex::new(max.x, max.y, color),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_vertex_count() {
        assert_eq!(circle(Vec2::ZERO, 1.0, [1.0; 4], 16).len(), 48);
        assert_eq!(circle(Vec2::ZERO, 1.0, [1.0; 4], 0).len(), 9);
    }

    #[test]
    fn test_trail_needs_two_points() {
        let one = [TrailPoint {
            pos: Vec2::ZERO,
            speed: 0.0,
        }];
        assert!(ball_trail(&one, 5.0, 10.0).is_empty());

        let three = [
            TrailPoint { pos: Vec2::new(0.0, 20.0), speed: 100.0 },
            TrailPoint { pos: Vec2::new(0.0, 10.0), speed: 80.0 },
            TrailPoint { pos: Vec2::ZERO, speed: 60.0 },
        ];
        let verts = ball_trail(&three, 5.0, 10.0);
        assert_eq!(verts.len(), 12);
        // Fades toward the tail
        assert!(verts[0].color[3] > verts[11].color[3]);
    }

    #[test]
    fn test_rect_bounds() {
        let verts = rect(Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0), [0.0; 4]);
        assert_eq!(verts.len(), 6);
        assert!(verts.iter().all(|v| (1.0..=4.0).contains(&v.position[0])));
        assert!(verts.iter().all(|v| (2.0..=6.0).contains(&v.position[1])));
    }

    #[test]
    fn test_mix_endpoints() {
        let a = [0.0, 0.0, 0.0, 1.0];
        let b = [1.0, 0.5, 0.0, 1.0];
        assert_eq!(mix(a, b, 0.0), a);
        assert_eq!(mix(a, b, 1.0), b);
        assert_eq!(mix(a, b, 2.0), b);
    }
}
