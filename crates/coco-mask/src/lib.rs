//! Lossless conversions between the COCO segmentation mask encodings: dense
//! column-major masks, uncompressed RLE, compressed RLE strings and polygons.

pub mod error;
pub mod mask;
pub mod params;
pub mod poly;
pub mod segmentation;
pub mod types;

pub use error::{GeometryIssue, MaskError, MaskKind, Result};
pub use params::{FillRule, Params};
pub use segmentation::{
    convert, decode, decode_batch, decode_encoded_rle, decode_polygons,
    decode_polygons_self_sized, decode_rle, decode_with, encode, encode_dense_to_rle, Target,
};
pub use types::{CompressedRle, Contour, DenseMask, Polygons, PolygonsRS, Rle, Segmentation};
