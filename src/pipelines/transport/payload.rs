// SPDX-License-Identifier: GPL-3.0-only

//! Wire document exchanged between sender and listener

use crate::errors::TransportResult;
use serde::{Deserialize, Serialize};

/// JSON document with the coordinate lists of one detection run
///
/// Missing fields parse as empty lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportPayload {
    /// `[sx, sy, sz, ex, ey, ez]` (or `[sx, sy, sz]`) per box, centimeters
    #[serde(default)]
    pub bounding_boxes: Vec<Vec<f64>>,
    /// `[cx, cy, cz]` per box, centimeters
    #[serde(default)]
    pub center_points: Vec<Vec<f64>>,
}

impl TransportPayload {
    pub fn new(bounding_boxes: Vec<Vec<f64>>, center_points: Vec<Vec<f64>>) -> Self {
        Self {
            bounding_boxes,
            center_points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bounding_boxes.is_empty() && self.center_points.is_empty()
    }

    pub fn to_json(&self) -> TransportResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> TransportResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names() {
        let payload = TransportPayload::new(vec![vec![1.0, 2.0, 3.0]], vec![vec![4.5, 5.0, 6.0]]);
        let json = String::from_utf8(payload.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"bounding_boxes":[[1.0,2.0,3.0]],"center_points":[[4.5,5.0,6.0]]}"#
        );
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let payload = TransportPayload::from_json(br#"{"center_points": [[1, 2, 3]]}"#).unwrap();
        assert!(payload.bounding_boxes.is_empty());
        assert_eq!(payload.center_points, vec![vec![1.0, 2.0, 3.0]]);
        assert!(TransportPayload::from_json(b"{}").unwrap().is_empty());
    }

    #[test]
    fn test_garbage_is_serialization_error() {
        assert!(TransportPayload::from_json(b"not json").is_err());
    }
}
