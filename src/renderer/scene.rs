//! Builds the frame's triangle list from game state
//!
//! Everything is emitted in field coordinates (pixels, y down); the pipeline
//! maps them to clip space.

use glam::Vec2;

use super::shapes::{ball_trail, circle, mix, rect};
use super::vertex::{Vertex, colors};
use crate::game::PlinkoGame;
use crate::sim::layout::Layout;

/// Colors for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub background: [f32; 4],
    pub peg: [f32; 4],
    pub ball: [f32; 4],
    pub wall: [f32; 4],
    pub bucket_cold: [f32; 4],
    pub bucket_hot: [f32; 4],
}

impl Palette {
    pub fn new(high_contrast: bool) -> Self {
        if high_contrast {
            Self {
                background: colors::contrast::BACKGROUND,
                peg: colors::contrast::PEG,
                ball: colors::contrast::BALL,
                wall: colors::contrast::WALL,
                bucket_cold: colors::contrast::BUCKET_COLD,
                bucket_hot: colors::contrast::BUCKET_HOT,
            }
        } else {
            Self {
                background: colors::BACKGROUND,
                peg: colors::PEG,
                ball: colors::BALL,
                wall: colors::WALL,
                bucket_cold: colors::BUCKET_COLD,
                bucket_hot: colors::BUCKET_HOT,
            }
        }
    }
}

/// 0.0 for the smallest multiplier on the field, 1.0 for the largest (log scale)
fn bucket_heat(layout: &Layout, multiplier: f64) -> f32 {
    let (lo, hi) = layout
        .buckets
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), b| (lo.min(b.multiplier), hi.max(b.multiplier)));
    let lo = lo.max(0.01);
    if hi <= lo {
        return 0.0;
    }
    ((multiplier.max(lo).ln() - lo.ln()) / (hi.ln() - lo.ln())) as f32
}

/// Triangles for the whole field
pub fn build_scene(game: &PlinkoGame, now_ms: f64, hovered: Option<usize>) -> Vec<Vertex> {
    let settings = game.settings();
    let layout = game.layout();
    let palette = Palette::new(settings.high_contrast);
    let segments = settings.quality.circle_segments();

    let mut vertices = Vec::with_capacity(layout.pegs.len() * segments as usize * 3 + 512);

    // Walls
    let wall_width = layout.peg_radius;
    let wall_top = layout.first_row_y() - layout.row_spacing;
    let wall_height = layout.floor_y() - wall_top;
    vertices.extend(rect(
        Vec2::new(layout.field_left() - wall_width, wall_top),
        Vec2::new(wall_width, wall_height),
        palette.wall,
    ));
    vertices.extend(rect(
        Vec2::new(layout.field_right(), wall_top),
        Vec2::new(wall_width, wall_height),
        palette.wall,
    ));

    // Buckets
    let gap = layout.spacing * 0.05;
    for bucket in &layout.buckets {
        let color = mix(
            palette.bucket_cold,
            palette.bucket_hot,
            bucket_heat(layout, bucket.multiplier),
        );
        let min = Vec2::new(bucket.left() + gap, bucket.top());
        let size = Vec2::new(bucket.width - gap * 2.0, bucket.height);
        vertices.extend(rect(min, size, color));

        if settings.tooltips && hovered == Some(bucket.index) {
            vertices.extend(rect(min, size, colors::HOVER));
        }
    }

    if settings.effective_landing_flash() {
        for flash in game.flashes() {
            let Some(bucket) = layout.bucket(flash.bucket) else {
                continue;
            };
            let mut color = colors::FLASH;
            color[3] *= flash.intensity(now_ms);
            vertices.extend(rect(
                Vec2::new(bucket.left(), bucket.top()),
                Vec2::new(bucket.width, bucket.height),
                color,
            ));
        }
    }

    for peg in &layout.pegs {
        vertices.extend(circle(peg.pos(), peg.radius, palette.peg, segments));
    }

    let balls = &game.session().balls;
    if settings.effective_trails() {
        let quality = settings.quality.trail_quality();
        for ball in balls.iter() {
            let keep = ((ball.trail.len() as f32 * quality).ceil() as usize).min(ball.trail.len());
            vertices.extend(ball_trail(&ball.trail[..keep], ball.radius, layout.spacing));
        }
    }
    for ball in balls.iter() {
        vertices.extend(circle(ball.pos, ball.radius, palette.ball, segments));
    }

    vertices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{QualityPreset, Settings};
    use crate::sim::multipliers::RiskTier;

    fn game(settings: Settings) -> PlinkoGame {
        PlinkoGame::new(settings, 800.0, 800.0, 100_000, 3).unwrap()
    }

    #[test]
    fn test_static_field_counts() {
        let settings = Settings {
            rows: 8,
            quality: QualityPreset::Low,
            ..Default::default()
        };
        let g = game(settings);
        let verts = build_scene(&g, 0.0, None);
        let segments = QualityPreset::Low.circle_segments() as usize;
        let expected = 2 * 6 + g.layout().buckets.len() * 6 + g.layout().pegs.len() * segments * 3;
        assert_eq!(verts.len(), expected);
    }

    #[test]
    fn test_hover_adds_overlay_only_with_tooltips() {
        let mut settings = Settings {
            rows: 8,
            ..Default::default()
        };
        let base = build_scene(&game(settings.clone()), 0.0, None).len();
        assert_eq!(build_scene(&game(settings.clone()), 0.0, Some(2)).len(), base + 6);
        settings.tooltips = false;
        assert_eq!(build_scene(&game(settings), 0.0, Some(2)).len(), base);
    }

    #[test]
    fn test_ball_drawn_after_drop() {
        let settings = Settings {
            rows: 8,
            ..Default::default()
        };
        let mut g = game(settings);
        let before = build_scene(&g, 0.0, None).len();
        let mut authority = crate::round::LocalAuthority::new(100_000, "s", "c");
        g.drop_with(&mut authority, 100, 0.0).unwrap();
        assert!(build_scene(&g, 0.0, None).len() > before);
    }

    #[test]
    fn test_bucket_heat_extremes() {
        let layout = crate::sim::compute_layout(16, RiskTier::High, 800.0, 800.0).unwrap();
        assert_eq!(bucket_heat(&layout, 1000.0), 1.0);
        assert_eq!(bucket_heat(&layout, 0.2), 0.0);
        let mid = bucket_heat(&layout, 9.0);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn test_high_contrast_palette() {
        assert_ne!(Palette::new(true), Palette::new(false));
        assert_eq!(Palette::new(true).background, colors::contrast::BACKGROUND);
    }
}
