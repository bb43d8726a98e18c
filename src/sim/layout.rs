//! Peg field and bucket geometry
//!
//! Field coordinates match the canvas: origin at the top-left, y grows
//! downward. Everything is sized in units of the peg spacing so the same
//! field looks and plays the same on any canvas.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::multipliers::{RiskTier, multipliers, validate_rows};
use crate::consts::*;
use crate::error::PlinkoError;

/// Drop zone above the first peg row, in spacings
const TOP_OFFSET_SPACINGS: f32 = 1.5;
/// Gap between the last peg row and the bucket tops, in spacings
const BUCKET_GAP_SPACINGS: f32 = 0.9;
/// Bucket height, in spacings
const BUCKET_HEIGHT_SPACINGS: f32 = 1.0;
/// Room below the buckets, in spacings
const BOTTOM_PAD_SPACINGS: f32 = 0.25;
/// Radii are shrunk slightly past the passage limit so float error never violates it
const PASSAGE_SAFETY: f32 = 0.98;

/// A static peg
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peg {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

impl Peg {
    #[inline]
    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// A landing slot; `x`/`y` is the centre
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub index: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub multiplier: f64,
}

impl Bucket {
    pub fn left(&self) -> f32 {
        self.x - self.width / 2.0
    }

    pub fn right(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn top(&self) -> f32 {
        self.y - self.height / 2.0
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.left()
            && point.x <= self.right()
            && point.y >= self.top()
            && point.y <= self.bottom()
    }
}

/// Complete geometry for one (rows, risk, canvas) configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub rows: u8,
    pub risk: RiskTier,
    pub width: f32,
    pub height: f32,
    /// Combined canvas and row-count scale factor
    pub scale: f32,
    /// Horizontal distance between neighbouring pegs
    pub spacing: f32,
    /// Vertical distance between peg rows
    pub row_spacing: f32,
    pub ball_radius: f32,
    pub peg_radius: f32,
    /// Where new balls appear
    pub drop_point: Vec2,
    pub pegs: Vec<Peg>,
    pub buckets: Vec<Bucket>,
}

/// Compute the field for a row count, risk tier and logical canvas size
pub fn compute_layout(
    rows: u8,
    risk: RiskTier,
    width: f32,
    height: f32,
) -> Result<Layout, PlinkoError> {
    validate_rows(rows)?;
    if !(width.is_finite() && width > 0.0) {
        return Err(PlinkoError::validation("width", format!("bad canvas width {}", width)));
    }
    if !(height.is_finite() && height > 0.0) {
        return Err(PlinkoError::validation("height", format!("bad canvas height {}", height)));
    }
    let table = multipliers(rows, risk)?;

    let scale = (width / REFERENCE_WIDTH) * (REFERENCE_ROWS as f32 / rows as f32);
    let mut ball_radius = BASE_BALL_RADIUS * scale;
    let mut peg_radius = BASE_PEG_RADIUS * scale;

    // Widest row has rows + 2 pegs, so rows + 1 gaps
    let margin = width * SIDE_MARGIN_FRAC;
    let mut spacing = (width - 2.0 * margin) / (rows as f32 + 1.0);

    let height_in_spacings = TOP_OFFSET_SPACINGS
        + (rows as f32 - 1.0) * ROW_SPACING_RATIO
        + BUCKET_GAP_SPACINGS
        + BUCKET_HEIGHT_SPACINGS
        + BOTTOM_PAD_SPACINGS;
    if spacing * height_in_spacings > height {
        spacing = height / height_in_spacings;
    }

    // Hard constraint: the ball always fits between pegs
    let min_spacing = MIN_PASSAGE_FACTOR * 2.0 * ball_radius;
    if spacing < min_spacing {
        let shrink = spacing / min_spacing * PASSAGE_SAFETY;
        ball_radius *= shrink;
        peg_radius *= shrink;
        log::debug!(
            "Layout shrunk ball/peg by {:.3} to keep passage (spacing {:.2})",
            shrink,
            spacing
        );
    }

    let row_spacing = spacing * ROW_SPACING_RATIO;
    let center_x = width / 2.0;
    let top_y = spacing * TOP_OFFSET_SPACINGS;

    let mut pegs = Vec::with_capacity((0..rows as usize).map(|r| r + 3).sum());
    for row in 0..rows as usize {
        let count = row + 3;
        let y = top_y + row as f32 * row_spacing;
        for i in 0..count {
            let x = center_x + (i as f32 - (count as f32 - 1.0) / 2.0) * spacing;
            pegs.push(Peg {
                x,
                y,
                radius: peg_radius,
            });
        }
    }

    let last_row_y = top_y + (rows as f32 - 1.0) * row_spacing;
    let bucket_height = spacing * BUCKET_HEIGHT_SPACINGS;
    let bucket_y = last_row_y + spacing * BUCKET_GAP_SPACINGS + bucket_height / 2.0;
    let buckets = table
        .iter()
        .enumerate()
        .map(|(index, &multiplier)| Bucket {
            index,
            x: center_x + (index as f32 - rows as f32 / 2.0) * spacing,
            y: bucket_y,
            width: spacing,
            height: bucket_height,
            multiplier,
        })
        .collect();

    Ok(Layout {
        rows,
        risk,
        width,
        height,
        scale,
        spacing,
        row_spacing,
        ball_radius,
        peg_radius,
        drop_point: Vec2::new(center_x, spacing * 0.5),
        pegs,
        buckets,
    })
}

impl Layout {
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Y of the first peg row
    pub fn first_row_y(&self) -> f32 {
        self.spacing * TOP_OFFSET_SPACINGS
    }

    /// Balls above this line are still in the drop zone and left alone
    pub fn drop_zone_y(&self) -> f32 {
        self.drop_point.y + self.spacing * 0.5
    }

    /// Y of the bucket tops
    pub fn bucket_top_y(&self) -> f32 {
        self.buckets.first().map(|b| b.top()).unwrap_or(self.height)
    }

    /// Y a ball centre must reach before the fallback landing check fires
    pub fn fallback_line_y(&self) -> f32 {
        self.buckets.first().map(|b| b.y).unwrap_or(self.height)
    }

    /// Left edge of the playable field (outer edge of bucket 0)
    pub fn field_left(&self) -> f32 {
        self.buckets.first().map(|b| b.left()).unwrap_or(0.0)
    }

    /// Right edge of the playable field
    pub fn field_right(&self) -> f32 {
        self.buckets.last().map(|b| b.right()).unwrap_or(self.width)
    }

    /// Floor below the buckets
    pub fn floor_y(&self) -> f32 {
        self.buckets.first().map(|b| b.bottom()).unwrap_or(self.height)
    }

    /// Fraction of the way from the first peg row to the bucket row, clamped to [0, 1]
    pub fn progress(&self, y: f32) -> f32 {
        let start = self.first_row_y();
        let end = self.bucket_top_y();
        if end <= start {
            return 1.0;
        }
        ((y - start) / (end - start)).clamp(0.0, 1.0)
    }

    pub fn bucket(&self, index: usize) -> Option<&Bucket> {
        self.buckets.get(index)
    }

    /// Bucket whose rectangle contains the point (hover tooltips)
    pub fn bucket_at(&self, point: Vec2) -> Option<&Bucket> {
        self.buckets.iter().find(|b| b.contains(point))
    }

    /// Bucket with the horizontally closest centre
    pub fn nearest_bucket(&self, x: f32) -> usize {
        self.buckets
            .iter()
            .min_by(|a, b| {
                (a.x - x)
                    .abs()
                    .partial_cmp(&(b.x - x).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|b| b.index)
            .unwrap_or(0)
    }

    /// Physical mass of a ball at this layout's size (unit density)
    pub fn ball_mass(&self) -> f32 {
        std::f32::consts::PI * self.ball_radius * self.ball_radius
    }
}
