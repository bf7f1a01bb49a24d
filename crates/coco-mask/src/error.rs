use std::fmt;

use thiserror::Error;

/// The mask representation a failure was detected in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskKind {
    Dense,
    Rle,
    CompressedRle,
    Polygons,
    PolygonsRS,
}

impl fmt::Display for MaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MaskKind::Dense => "dense mask",
            MaskKind::Rle => "RLE",
            MaskKind::CompressedRle => "compressed RLE",
            MaskKind::Polygons => "polygons",
            MaskKind::PolygonsRS => "self-sized polygons",
        };
        f.write_str(name)
    }
}

/// Why a contour cannot be rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryIssue {
    /// Fewer than 3 vertices; carries the actual vertex count.
    TooFewVertices(usize),
    /// A NaN or infinite coordinate at the given vertex index.
    NonFinite { vertex: usize },
}

impl fmt::Display for GeometryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryIssue::TooFewVertices(n) => {
                write!(f, "needs at least 3 vertices, found {n}")
            }
            GeometryIssue::NonFinite { vertex } => {
                write!(f, "vertex {vertex} has a non-finite coordinate")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum MaskError {
    #[error("malformed {kind}: field `{field}` expected {expected}, found {found}")]
    Format {
        kind: MaskKind,
        field: &'static str,
        expected: String,
        found: String,
    },

    #[error("cannot decode {kind} without both width and height")]
    MissingDimensions { kind: MaskKind },

    #[error("invalid {kind}: contour {contour} {issue}")]
    Geometry {
        kind: MaskKind,
        contour: usize,
        issue: GeometryIssue,
    },

    #[error("invalid segmentation record: {0}")]
    Json(#[from] serde_json::Error),
}

impl MaskError {
    /// Create a format error for `field` of a `kind` value.
    pub fn format(
        kind: MaskKind,
        field: &'static str,
        expected: impl fmt::Display,
        found: impl fmt::Display,
    ) -> Self {
        Self::Format {
            kind,
            field,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub fn is_format(&self) -> bool {
        matches!(self, MaskError::Format { .. })
    }
}

pub type Result<T> = std::result::Result<T, MaskError>;
