//! Input validation for detections and request identifiers
//!
//! Rejects malformed detections (inverted boxes, NaN coordinates,
//! out-of-range scores, centres outside the frame) and image sizes beyond
//! [`MAX_IMAGE_DIMENSION`]. Everything entering a monitor passes through
//! here first.

use crate::detections::{BoundingBox, Detection};
use thiserror::Error;

// ============================================================================
// CONSTANTS: Input Size Limits
// ============================================================================

/// Maximum length for resource IDs (venue_id, alert_id, etc.)
pub const MAX_ID_LENGTH: usize = 256;

/// Maximum number of detections accepted for a single frame
pub const MAX_DETECTIONS_PER_FRAME: usize = 10_000;

/// Maximum accepted image width or height in pixels
pub const MAX_IMAGE_DIMENSION: u32 = 16_384;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    Empty { field: String },

    #[error("{field} exceeds maximum length of {max} bytes (got {actual})")]
    TooLong {
        field: String,
        max: usize,
        actual: usize,
    },

    #[error("{field} contains invalid characters (no path separators or '..' allowed)")]
    InvalidCharacters { field: String },

    #[error("image dimensions must be positive (got {width}x{height})")]
    InvalidImageSize { width: u32, height: u32 },

    #[error("image dimensions exceed {max}x{max} (got {width}x{height})")]
    ImageTooLarge { width: u32, height: u32, max: u32 },

    #[error("too many detections in one frame: {count} (max {max})")]
    TooManyDetections { count: usize, max: usize },

    #[error("detection {index}: score {score} is outside [0, 1]")]
    ScoreOutOfRange { index: usize, score: f32 },

    #[error("detection {index}: bounding box has non-finite coordinates")]
    NonFiniteBox { index: usize },

    #[error("detection {index}: bounding box is inverted ({bbox:?})")]
    InvertedBox { index: usize, bbox: BoundingBox },

    #[error("detection {index}: centre ({x}, {y}) lies outside the {width}x{height} image")]
    CenterOutsideImage {
        index: usize,
        x: f64,
        y: f64,
        width: u32,
        height: u32,
    },
}

// ============================================================================
// Identifier Validation
// ============================================================================

/// Validate resource ID (venue_id, etc.)
pub fn validate_id(id: &str, field_name: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::Empty {
            field: field_name.to_string(),
        });
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: field_name.to_string(),
            max: MAX_ID_LENGTH,
            actual: id.len(),
        });
    }

    // Prevent path traversal in IDs
    if id.contains("..") || id.contains('/') || id.contains('\\') {
        return Err(ValidationError::InvalidCharacters {
            field: field_name.to_string(),
        });
    }

    Ok(())
}

// ============================================================================
// Detection Validation
// ============================================================================

pub fn validate_image_size(width: u32, height: u32) -> Result<(), ValidationError> {
    if width == 0 || height == 0 {
        return Err(ValidationError::InvalidImageSize { width, height });
    }
    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return Err(ValidationError::ImageTooLarge {
            width,
            height,
            max: MAX_IMAGE_DIMENSION,
        });
    }
    Ok(())
}

/// Validate a single detection; `index` is only used for error reporting
pub fn validate_detection(index: usize, detection: &Detection) -> Result<(), ValidationError> {
    let score = detection.score;
    if !score.is_finite() || !(0.0..=1.0).contains(&score) {
        return Err(ValidationError::ScoreOutOfRange { index, score });
    }

    let bbox = &detection.bbox;
    let coords = [bbox.xmin, bbox.ymin, bbox.xmax, bbox.ymax];
    if coords.iter().any(|c| !c.is_finite()) {
        return Err(ValidationError::NonFiniteBox { index });
    }

    if bbox.width() < 0.0 || bbox.height() < 0.0 {
        return Err(ValidationError::InvertedBox { index, bbox: *bbox });
    }

    Ok(())
}

/// Validate a full frame of detections, stopping at the first invalid one.
///
/// Box centres must fall inside `[0, image_width] x [0, image_height]`.
pub fn validate_detections(
    detections: &[Detection],
    image_width: u32,
    image_height: u32,
) -> Result<(), ValidationError> {
    if detections.len() > MAX_DETECTIONS_PER_FRAME {
        return Err(ValidationError::TooManyDetections {
            count: detections.len(),
            max: MAX_DETECTIONS_PER_FRAME,
        });
    }

    for (index, detection) in detections.iter().enumerate() {
        if let Err(e) = validate_detection(index, detection)
            .and_then(|_| validate_center(index, detection, image_width, image_height))
        {
            tracing::debug!(error = %e, "rejecting detection");
            return Err(e);
        }
    }

    Ok(())
}

fn validate_center(
    index: usize,
    detection: &Detection,
    image_width: u32,
    image_height: u32,
) -> Result<(), ValidationError> {
    let (x, y) = detection.bbox.center();
    let inside_x = (0.0..=image_width as f64).contains(&x);
    let inside_y = (0.0..=image_height as f64).contains(&y);
    if !inside_x || !inside_y {
        return Err(ValidationError::CenterOutsideImage {
            index,
            x,
            y,
            width: image_width,
            height: image_height,
        });
    }
    Ok(())
}
