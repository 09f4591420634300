//! Validated processing parameters.
//!
//! [`ProcessingParameters`] is the only form in which settings reach the pipeline: every value
//! has been range-checked once at construction, so detectors and jobs never re-validate.

use std::ops::RangeInclusive;

use anonymizer_utils::config::AnonymizeSettings;

use crate::error::{AnonymizeError, Result};

const CONFIDENCE_RANGE: RangeInclusive<f64> = 0.0..=1.0;
const FACE_MIN_SIZE_RANGE: RangeInclusive<u32> = 0..=100;
const FACE_EXPAND_RANGE: RangeInclusive<f64> = 0.0..=1.0;
const PIXELATION_RANGE: RangeInclusive<u32> = 1..=150;

/// Immutable, range-checked knobs for one anonymization run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingParameters {
    confidence: f64,
    face_min_size: u32,
    face_expand: f64,
    pixelation_factor: u32,
    window_sizes: Vec<u32>,
}

impl ProcessingParameters {
    /// Build parameters, failing with [`AnonymizeError::Configuration`] when any value is out
    /// of range or a window size is zero.
    pub fn new(
        confidence: f64,
        face_min_size: u32,
        face_expand: f64,
        pixelation_factor: u32,
        window_sizes: Vec<u32>,
    ) -> Result<Self> {
        check_range("confidence", confidence, CONFIDENCE_RANGE)?;
        check_range("face_min_size", face_min_size, FACE_MIN_SIZE_RANGE)?;
        check_range("face_expand", face_expand, FACE_EXPAND_RANGE)?;
        check_range("pixelation_factor", pixelation_factor, PIXELATION_RANGE)?;
        if let Some(pos) = window_sizes.iter().position(|&size| size == 0) {
            return Err(AnonymizeError::Configuration(format!(
                "window_sizes[{pos}] must be a positive integer"
            )));
        }

        Ok(Self {
            confidence,
            face_min_size,
            face_expand,
            pixelation_factor,
            window_sizes,
        })
    }

    /// Minimum detector confidence.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Minimum accepted box side in pixels.
    pub fn face_min_size(&self) -> u32 {
        self.face_min_size
    }

    /// Fraction each box grows by before clamping.
    pub fn face_expand(&self) -> f64 {
        self.face_expand
    }

    /// Mosaic divisor.
    pub fn pixelation_factor(&self) -> u32 {
        self.pixelation_factor
    }

    /// Tile sizes scanned in order before the full-frame pass.
    pub fn window_sizes(&self) -> &[u32] {
        &self.window_sizes
    }
}

impl Default for ProcessingParameters {
    fn default() -> Self {
        Self {
            confidence: 0.5,
            face_min_size: 5,
            face_expand: 0.2,
            pixelation_factor: 20,
            window_sizes: vec![400, 700],
        }
    }
}

impl TryFrom<&AnonymizeSettings> for ProcessingParameters {
    type Error = AnonymizeError;

    fn try_from(settings: &AnonymizeSettings) -> Result<Self> {
        Self::new(
            settings.confidence,
            settings.face_min_size,
            settings.face_expand,
            settings.pixelation_factor,
            settings.window_sizes.clone(),
        )
    }
}

/// Parse a comma separated list of tile sizes such as `"400, 700"`.
///
/// Every token must be a positive integer; an empty list is rejected as well.
pub fn parse_window_sizes(text: &str) -> Result<Vec<u32>> {
    let mut sizes = Vec::new();
    for token in text.split(',') {
        let token = token.trim();
        let size: u32 = token.parse().map_err(|_| {
            AnonymizeError::Configuration(format!(
                "window size {token:?} is not a positive integer"
            ))
        })?;
        if size == 0 {
            return Err(AnonymizeError::Configuration(
                "window sizes must be greater than zero".into(),
            ));
        }
        sizes.push(size);
    }
    Ok(sizes)
}

fn check_range<T>(name: &str, value: T, range: RangeInclusive<T>) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    // `contains` is false for NaN, which rejects it as well.
    if range.contains(&value) {
        Ok(())
    } else {
        Err(AnonymizeError::Configuration(format!(
            "{name} must be within [{}, {}], got {value}",
            range.start(),
            range.end()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let defaults = ProcessingParameters::default();
        let rebuilt = ProcessingParameters::try_from(&AnonymizeSettings::default()).unwrap();
        assert_eq!(defaults, rebuilt);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let cases = [
            ProcessingParameters::new(1.5, 5, 0.2, 20, vec![400]),
            ProcessingParameters::new(f64::NAN, 5, 0.2, 20, vec![400]),
            ProcessingParameters::new(0.5, 101, 0.2, 20, vec![400]),
            ProcessingParameters::new(0.5, 5, -0.1, 20, vec![400]),
            ProcessingParameters::new(0.5, 5, 0.2, 0, vec![400]),
            ProcessingParameters::new(0.5, 5, 0.2, 151, vec![400]),
            ProcessingParameters::new(0.5, 5, 0.2, 20, vec![400, 0]),
        ];
        for case in cases {
            assert!(matches!(case, Err(AnonymizeError::Configuration(_))));
        }
    }

    #[test]
    fn bounds_are_inclusive() {
        let params = ProcessingParameters::new(1.0, 100, 1.0, 150, vec![1]).unwrap();
        assert_eq!(params.pixelation_factor(), 150);
        assert!(ProcessingParameters::new(0.0, 0, 0.0, 1, Vec::new()).is_ok());
    }

    #[test]
    fn window_sizes_parse_from_text() {
        assert_eq!(parse_window_sizes("400, 700").unwrap(), vec![400, 700]);
        assert_eq!(parse_window_sizes(" 256 ").unwrap(), vec![256]);
    }

    #[test]
    fn malformed_window_sizes_fail() {
        for text in ["", "400,", "400, abc", "12.5", "-3", "0"] {
            assert!(
                matches!(
                    parse_window_sizes(text),
                    Err(AnonymizeError::Configuration(_))
                ),
                "{text:?} should be rejected"
            );
        }
    }
}
