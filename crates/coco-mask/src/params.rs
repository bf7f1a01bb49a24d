use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How the contours of one polygon set combine into a single mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillRule {
    /// Each contour is filled on its own (even-odd within the contour) and the
    /// results are OR-ed together. This is what pycocotools does with multi-part
    /// polygon annotations.
    #[default]
    Union,
    /// Crossing parity is counted over all contours at once, so a contour lying
    /// inside another one cuts a hole.
    EvenOdd,
}

/// Decoding parameters.
///
/// Defaults match the COCO conventions: contours are unioned, and a mask may not
/// hold more pixels than a `u32` run count can describe.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Params {
    /// Multi-contour fill rule used by the polygon rasterizer.
    pub fill_rule: FillRule,
    /// Upper bound on `h * w` for any mask this codec allocates. Guards against
    /// corrupt size fields in annotation files.
    pub max_pixels: u64,
}

impl Params {
    pub fn new(fill_rule: FillRule) -> Self {
        Params {
            fill_rule,
            ..Params::default()
        }
    }

    /// Parse parameters from a JSON object; missing fields keep their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

impl Default for Params {
    fn default() -> Self {
        Params {
            fill_rule: FillRule::Union,
            max_pixels: u64::from(u32::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = Params::default();
        assert_eq!(params.fill_rule, FillRule::Union);
        assert_eq!(params.max_pixels, u32::MAX as u64);
    }

    #[test]
    fn test_from_json_partial() {
        let params = Params::from_json(r#"{"fill_rule": "even_odd"}"#).unwrap();
        assert_eq!(params.fill_rule, FillRule::EvenOdd);
        assert_eq!(params.max_pixels, u32::MAX as u64);
    }

    #[test]
    fn test_from_json_rejects_unknown_rule() {
        assert!(Params::from_json(r#"{"fill_rule": "nonzero"}"#).is_err());
    }
}
