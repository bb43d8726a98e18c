//! Player settings and preferences
//!
//! Persisted separately from round history in LocalStorage.

use serde::{Deserialize, Serialize};

use crate::Cents;
use crate::consts::{MAX_BET_CENTS, SUPPORTED_ROWS};
use crate::error::PlinkoError;
use crate::sim::multipliers::RiskTier;
use crate::tuning::GuidanceTuning;

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(QualityPreset::Low),
            "medium" | "med" => Some(QualityPreset::Medium),
            "high" => Some(QualityPreset::High),
            _ => None,
        }
    }

    /// Trail length multiplier (1.0 = full)
    pub fn trail_quality(&self) -> f32 {
        match self {
            QualityPreset::Low => 0.25,
            QualityPreset::Medium => 0.6,
            QualityPreset::High => 1.0,
        }
    }

    /// Triangles per circle
    pub fn circle_segments(&self) -> u32 {
        match self {
            QualityPreset::Low => 10,
            QualityPreset::Medium => 16,
            QualityPreset::High => 24,
        }
    }
}

/// Player settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Game ===
    pub rows: u8,
    pub risk: RiskTier,
    /// Bet placed by the drop button
    pub bet_cents: Cents,
    /// Where round requests are POSTed
    pub round_endpoint: String,

    // === Visual ===
    pub quality: QualityPreset,
    /// Ball trails
    pub trails: bool,
    /// Bucket flash on landing
    pub landing_flash: bool,
    /// Hover tooltips over buckets
    pub tooltips: bool,

    // === Accessibility ===
    /// Reduced motion (no trails, no flashes)
    pub reduced_motion: bool,
    /// High contrast mode
    pub high_contrast: bool,

    /// Guidance constants
    pub tuning: GuidanceTuning,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rows: 16,
            risk: RiskTier::Low,
            bet_cents: 100,
            round_endpoint: "/round".to_string(),

            quality: QualityPreset::Medium,
            trails: true,
            landing_flash: true,
            tooltips: true,

            reduced_motion: false,
            high_contrast: false,

            tuning: GuidanceTuning::default(),
        }
    }
}

impl Settings {
    /// Apply a quality preset (updates quality-dependent settings)
    pub fn apply_preset(&mut self, preset: QualityPreset) {
        self.quality = preset;
        if preset == QualityPreset::Low {
            self.landing_flash = false;
        }
    }

    /// Effective trails (respects reduced_motion)
    pub fn effective_trails(&self) -> bool {
        self.trails && !self.reduced_motion
    }

    /// Effective landing flash (respects reduced_motion)
    pub fn effective_landing_flash(&self) -> bool {
        self.landing_flash && !self.reduced_motion
    }

    /// Check everything a stored or edited settings blob could get wrong
    pub fn validate(&self) -> Result<(), PlinkoError> {
        if !SUPPORTED_ROWS.contains(&self.rows) {
            return Err(PlinkoError::validation("rows", format!("{} rows is not supported", self.rows)));
        }
        if self.bet_cents <= 0 || self.bet_cents > MAX_BET_CENTS {
            return Err(PlinkoError::validation("bet", "Bet is out of range"));
        }
        if self.round_endpoint.trim().is_empty() {
            return Err(PlinkoError::validation("round_endpoint", "Endpoint must not be empty"));
        }
        self.tuning.validate()
    }

    /// LocalStorage key
    const STORAGE_KEY: &'static str = "plinko_drop_settings";

    /// Load settings, falling back to defaults if missing or invalid
    pub fn load() -> Self {
        match crate::platform::load_json::<Self>(Self::STORAGE_KEY) {
            Some(settings) => match settings.validate() {
                Ok(()) => {
                    log::info!("Loaded settings from LocalStorage");
                    settings
                }
                Err(e) => {
                    log::warn!("Stored settings rejected ({}), using defaults", e);
                    Self::default()
                }
            },
            None => {
                log::info!("Using default settings");
                Self::default()
            }
        }
    }

    pub fn save(&self) {
        crate::platform::save_json(Self::STORAGE_KEY, self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        Settings::default().validate().unwrap();
    }

    #[test]
    fn test_reduced_motion_overrides() {
        let settings = Settings {
            reduced_motion: true,
            ..Default::default()
        };
        assert!(!settings.effective_trails());
        assert!(!settings.effective_landing_flash());
    }

    #[test]
    fn test_partial_json() {
        let settings: Settings =
            serde_json::from_str(r#"{"rows": 8, "risk": "high", "bet_cents": 250}"#).unwrap();
        assert_eq!(settings.rows, 8);
        assert_eq!(settings.risk, RiskTier::High);
        assert_eq!(settings.round_endpoint, "/round");
        settings.validate().unwrap();
    }

    #[test]
    fn test_rejects_bad_rows() {
        let settings = Settings {
            rows: 10,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_presets() {
        let mut settings = Settings::default();
        settings.apply_preset(QualityPreset::Low);
        assert!(!settings.landing_flash);
        assert_eq!(QualityPreset::parse("HIGH"), Some(QualityPreset::High));
        assert!(QualityPreset::High.circle_segments() > QualityPreset::Low.circle_segments());
    }
}
