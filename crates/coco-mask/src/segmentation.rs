//! Entry points over every encoded mask variant.
//!
//! One function per variant, plus [`decode`] / [`decode_with`] which dispatch on
//! the [`Segmentation`] tag, and [`encode`] / [`convert`] for the forward
//! direction.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{MaskError, MaskKind, Result};
use crate::mask;
use crate::params::{FillRule, Params};
use crate::poly;
use crate::types::{CompressedRle, DenseMask, Polygons, PolygonsRS, Rle, Segmentation};

/// Representation to encode a dense mask into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Uncompressed RLE.
    Rle,
    /// Compressed RLE string, as stored in COCO result files.
    CocoRle,
    /// Pixel-boundary contours without a size.
    Polygons,
    /// Pixel-boundary contours carrying the mask size.
    PolygonsRs,
}

/// Expand an uncompressed RLE.
pub fn decode_rle(rle: &Rle) -> Result<DenseMask> {
    mask::decode(rle)
}

/// Decompress and expand a COCO compressed RLE.
pub fn decode_encoded_rle(compressed: &CompressedRle) -> Result<DenseMask> {
    mask::decode_compressed(compressed)
}

/// Rasterize polygons onto a `height × width` raster, unioning the contours.
///
/// Both dimensions are required; COCO polygons take them from the image record.
pub fn decode_polygons(
    polygons: &Polygons,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<DenseMask> {
    let (h, w) = require_dims(MaskKind::Polygons, width, height)?;
    poly::rasterize(polygons, h, w, FillRule::default())
}

/// Rasterize polygons onto the raster size they carry.
pub fn decode_polygons_self_sized(polygons: &PolygonsRS) -> Result<DenseMask> {
    poly::rasterize_as(
        MaskKind::PolygonsRS,
        &polygons.contours,
        polygons.h,
        polygons.w,
        FillRule::default(),
    )
}

pub fn encode_dense_to_rle(mask: &DenseMask) -> Rle {
    mask::encode(mask)
}

fn require_dims(kind: MaskKind, width: Option<u32>, height: Option<u32>) -> Result<(u32, u32)> {
    match (height, width) {
        (Some(h), Some(w)) => Ok((h, w)),
        _ => {
            debug!(%kind, ?width, ?height, "missing raster dimensions");
            Err(MaskError::MissingDimensions { kind })
        }
    }
}

fn check_budget(kind: MaskKind, h: u32, w: u32, params: &Params) -> Result<()> {
    let n = u64::from(h) * u64::from(w);
    if n > params.max_pixels {
        return Err(MaskError::format(
            kind,
            "size",
            format!("at most {} pixels", params.max_pixels),
            format!("{h}x{w} = {n} pixels"),
        ));
    }
    Ok(())
}

/// Decode any segmentation with default parameters.
///
/// `width` and `height` are only consulted for [`Segmentation::Polygons`]; every
/// other variant carries its own size.
pub fn decode(seg: &Segmentation, width: Option<u32>, height: Option<u32>) -> Result<DenseMask> {
    decode_with(seg, width, height, &Params::default())
}

/// Decode any segmentation.
#[instrument(level = "trace", skip_all, fields(kind = %seg.kind()))]
pub fn decode_with(
    seg: &Segmentation,
    width: Option<u32>,
    height: Option<u32>,
    params: &Params,
) -> Result<DenseMask> {
    let kind = seg.kind();
    let (h, w) = match seg.size() {
        Some(size) => size,
        None => require_dims(kind, width, height)?,
    };
    check_budget(kind, h, w, params)?;

    match seg {
        Segmentation::Rle(rle) => decode_rle(rle),
        Segmentation::CompressedRle(compressed) => decode_encoded_rle(compressed),
        Segmentation::Polygons(polygons) => {
            poly::rasterize_as(kind, &polygons.contours, h, w, params.fill_rule)
        }
        Segmentation::PolygonsRS(polygons) => {
            poly::rasterize_as(kind, &polygons.contours, h, w, params.fill_rule)
        }
    }
}

/// Decode many segmentations in parallel, e.g. every object of one image.
///
/// Results come back in input order; one bad record does not affect the others.
pub fn decode_batch(
    segs: &[Segmentation],
    width: Option<u32>,
    height: Option<u32>,
    params: &Params,
) -> Vec<Result<DenseMask>> {
    segs.par_iter()
        .map(|seg| decode_with(seg, width, height, params))
        .collect()
}

/// Encode a dense mask into the requested representation.
///
/// Polygon targets are traced along pixel boundaries and include hole contours;
/// decode them with [`FillRule::EvenOdd`] to get the mask back exactly.
pub fn encode(mask: &DenseMask, target: Target) -> Segmentation {
    match target {
        Target::Rle => Segmentation::Rle(mask::encode(mask)),
        Target::CocoRle => {
            let rle = mask::encode(mask);
            Segmentation::CompressedRle(CompressedRle::new(rle.h, rle.w, mask::rle_to_bytes(&rle)))
        }
        Target::Polygons => Segmentation::Polygons(poly::trace(mask)),
        Target::PolygonsRs => {
            Segmentation::PolygonsRS(poly::trace(mask).with_size(mask.h(), mask.w()))
        }
    }
}

/// Convert a segmentation into another representation.
///
/// Conversions between the two RLE forms and between the two polygon forms do
/// not go through a dense mask.
pub fn convert(
    seg: &Segmentation,
    target: Target,
    width: Option<u32>,
    height: Option<u32>,
    params: &Params,
) -> Result<Segmentation> {
    match (seg, target) {
        (Segmentation::Rle(rle), Target::Rle) => {
            rle.validate()?;
            Ok(seg.clone())
        }
        (Segmentation::Rle(rle), Target::CocoRle) => Ok(mask::compress(rle)?.into()),
        (Segmentation::CompressedRle(compressed), Target::Rle) => {
            Ok(mask::decompress(compressed)?.into())
        }
        (Segmentation::CompressedRle(compressed), Target::CocoRle) => {
            mask::decompress(compressed)?;
            Ok(seg.clone())
        }
        (Segmentation::Polygons(polygons), Target::Polygons) => {
            poly::check_contours(MaskKind::Polygons, &polygons.contours)?;
            Ok(seg.clone())
        }
        (Segmentation::Polygons(polygons), Target::PolygonsRs) => {
            poly::check_contours(MaskKind::Polygons, &polygons.contours)?;
            let (h, w) = require_dims(MaskKind::Polygons, width, height)?;
            Ok(polygons.clone().with_size(h, w).into())
        }
        (Segmentation::PolygonsRS(polygons), Target::Polygons) => {
            poly::check_contours(MaskKind::PolygonsRS, &polygons.contours)?;
            Ok(polygons.clone().into_polygons().into())
        }
        (Segmentation::PolygonsRS(polygons), Target::PolygonsRs) => {
            poly::check_contours(MaskKind::PolygonsRS, &polygons.contours)?;
            Ok(seg.clone())
        }
        _ => {
            let dense = decode_with(seg, width, height, params)?;
            Ok(encode(&dense, target))
        }
    }
}
