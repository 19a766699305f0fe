//! Expression Presets
//!
//! Named points in the pleasure/arousal plane. A preset is applied with an
//! intensity percentage: `happy%50` targets half of `happy`'s amplitudes.

use serde::Serialize;

use crate::protocol::ProtocolError;

/// Separator between preset name and intensity in `name%percent`
pub const INTENSITY_SEPARATOR: char = '%';

/// A named (pleasure, arousal) amplitude pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ExpressionPreset {
    /// Preset name as used on the wire
    pub name: &'static str,
    /// Pleasure amplitude at 100%
    pub pleasure: i32,
    /// Arousal amplitude at 100%
    pub arousal: i32,
}

/// The fixed preset catalog
pub const PRESETS: [ExpressionPreset; 8] = [
    ExpressionPreset::new("neutral", 0, 0),
    ExpressionPreset::new("happy", 85, 12),
    ExpressionPreset::new("sad", -71, -36),
    ExpressionPreset::new("attentive", 0, 91),
    ExpressionPreset::new("sleepy", 5, -97),
    ExpressionPreset::new("frustrated", -56, 44),
    ExpressionPreset::new("excited", 63, 72),
    ExpressionPreset::new("relaxed", 70, -64),
];

impl ExpressionPreset {
    const fn new(name: &'static str, pleasure: i32, arousal: i32) -> Self {
        Self {
            name,
            pleasure,
            arousal,
        }
    }

    /// Find a preset by exact name
    #[must_use]
    pub fn lookup(name: &str) -> Option<&'static ExpressionPreset> {
        PRESETS.iter().find(|preset| preset.name == name)
    }

    /// Targets for this preset at `intensity` (1.0 = 100%)
    ///
    /// Rounds half away from zero, so `happy` at 0.5 gives pleasure 43.
    #[must_use]
    pub fn scaled(&self, intensity: f64) -> ExpressionTarget {
        ExpressionTarget {
            pleasure: (f64::from(self.pleasure) * intensity).round() as i32,
            arousal: (f64::from(self.arousal) * intensity).round() as i32,
        }
    }
}

/// Pleasure/arousal targets resolved from an `expression` command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpressionTarget {
    /// Target pleasure
    pub pleasure: i32,
    /// Target arousal
    pub arousal: i32,
}

/// Resolve `name%percent` into targets
///
/// The percentage may be fractional and is not clamped.
///
/// # Errors
///
/// Returns [`ProtocolError::ExpressionLookup`] for a missing `%`, an
/// unparseable or non-finite percentage, or an unknown preset name.
pub fn resolve(input: &str) -> Result<ExpressionTarget, ProtocolError> {
    let (name, percent) = input.split_once(INTENSITY_SEPARATOR).ok_or_else(|| {
        ProtocolError::ExpressionLookup(format!(
            "\"{input}\" is not in the form name{INTENSITY_SEPARATOR}intensity"
        ))
    })?;

    let percent: f64 = percent
        .trim()
        .parse()
        .ok()
        .filter(|p: &f64| p.is_finite())
        .ok_or_else(|| {
            ProtocolError::ExpressionLookup(format!("\"{percent}\" is not a valid intensity"))
        })?;

    let preset = ExpressionPreset::lookup(name)
        .ok_or_else(|| ProtocolError::ExpressionLookup(format!("unknown expression \"{name}\"")))?;

    Ok(preset.scaled(percent / 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lookup() {
        let sad = ExpressionPreset::lookup("sad").unwrap();
        assert_eq!((sad.pleasure, sad.arousal), (-71, -36));
        assert!(ExpressionPreset::lookup("grumpy").is_none());
        assert_eq!(PRESETS.len(), 8);
    }

    #[test]
    fn test_happy_at_half_intensity() {
        let target = resolve("happy%50").unwrap();
        assert_eq!(
            target,
            ExpressionTarget {
                pleasure: 43,
                arousal: 6
            }
        );
    }

    #[test]
    fn test_full_intensity_matches_preset() {
        for preset in &PRESETS {
            let target = resolve(&format!("{}%100", preset.name)).unwrap();
            assert_eq!(target.pleasure, preset.pleasure);
            assert_eq!(target.arousal, preset.arousal);
        }
    }

    #[test]
    fn test_negative_amplitudes_round_away_from_zero() {
        // -71 * 0.5 = -35.5, -36 * 0.5 = -18
        let target = resolve("sad%50").unwrap();
        assert_eq!(target.pleasure, -36);
        assert_eq!(target.arousal, -18);
    }

    #[test]
    fn test_fractional_intensity() {
        let target = resolve("attentive%12.5").unwrap();
        assert_eq!(target.arousal, 11); // 91 * 0.125 = 11.375
    }

    #[test]
    fn test_unknown_name() {
        let err = resolve("grumpy%50").unwrap_err();
        assert!(err.to_string().starts_with("Expression error:"));
        assert!(err.to_string().contains("grumpy"));
    }

    #[test]
    fn test_missing_intensity_separator() {
        assert!(matches!(
            resolve("happy"),
            Err(ProtocolError::ExpressionLookup(_))
        ));
    }

    #[test]
    fn test_invalid_intensity() {
        assert!(resolve("happy%lots").is_err());
        assert!(resolve("happy%NaN").is_err());
    }
}
