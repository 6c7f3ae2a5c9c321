//! Detection contracts shared by the crowd analytics pipeline.
//!
//! Detections are produced by an external person detector and arrive here
//! already decoded. Coordinates are in image pixel units.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Center point of the box (x, y)
    pub fn center(&self) -> (f64, f64) {
        (
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}

/// A single person observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Object class/label
    #[serde(default = "default_label")]
    pub label: String,

    /// Detection confidence (0.0 to 1.0)
    pub score: f32,

    /// Bounding box in pixel coordinates
    #[serde(rename = "box", alias = "bbox")]
    pub bbox: BoundingBox,
}

fn default_label() -> String {
    "person".to_string()
}

impl Detection {
    /// Create a person detection
    pub fn person(score: f32, bbox: BoundingBox) -> Self {
        Self {
            label: default_label(),
            score,
            bbox,
        }
    }

    /// Center of the detection normalized into [0, 1] image space
    pub fn normalized_center(&self, image_width: f64, image_height: f64) -> (f64, f64) {
        let (cx, cy) = self.bbox.center();
        (cx / image_width, cy / image_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_center() {
        let bbox = BoundingBox::new(10.0, 20.0, 30.0, 60.0);
        assert_eq!(bbox.center(), (20.0, 40.0));
        assert_eq!(bbox.width(), 20.0);
        assert_eq!(bbox.height(), 40.0);
    }

    #[test]
    fn test_detection_deserialize_defaults_label() {
        let detection: Detection = serde_json::from_value(serde_json::json!({
            "score": 0.9,
            "box": {"xmin": 0.0, "ymin": 0.0, "xmax": 10.0, "ymax": 20.0}
        }))
        .unwrap();

        assert_eq!(detection.label, "person");
        assert_eq!(detection.bbox.ymax, 20.0);
    }

    #[test]
    fn test_normalized_center() {
        let detection = Detection::person(0.8, BoundingBox::new(0.0, 0.0, 100.0, 50.0));
        let (x, y) = detection.normalized_center(200.0, 100.0);
        assert!((x - 0.25).abs() < f64::EPSILON);
        assert!((y - 0.25).abs() < f64::EPSILON);
    }
}
