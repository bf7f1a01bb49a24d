use std::str::FromStr;

use serde::{ser, Deserialize, Serialize, Serializer};

use crate::error::{MaskError, MaskKind, Result};

/// Number of pixels in an `h × w` mask, rejecting sizes whose runs could not be
/// stored as `u32` counts.
pub(crate) fn pixel_count(h: u32, w: u32, kind: MaskKind) -> Result<u64> {
    let n = u64::from(h) * u64::from(w);
    if n > u64::from(u32::MAX) {
        return Err(MaskError::format(
            kind,
            "size",
            format!("at most {} pixels", u32::MAX),
            format!("{h}x{w} = {n} pixels"),
        ));
    }
    Ok(n)
}

/// A binary mask of `h` rows and `w` columns.
///
/// Pixels are stored in column-major order (Fortran order): pixel `(x, y)` is at
/// index `y + h * x`. Every value is 0 or 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseMask {
    h: u32,
    w: u32,
    pixels: Vec<u8>,
}

impl DenseMask {
    /// Wrap column-major pixels, checking the length and that every value is binary.
    pub fn new(h: u32, w: u32, pixels: Vec<u8>) -> Result<Self> {
        let n = pixel_count(h, w, MaskKind::Dense)?;
        if pixels.len() as u64 != n {
            return Err(MaskError::format(
                MaskKind::Dense,
                "pixels",
                format!("{n} values for {h}x{w}"),
                format!("{} values", pixels.len()),
            ));
        }
        if let Some(i) = pixels.iter().position(|&v| v > 1) {
            return Err(MaskError::format(
                MaskKind::Dense,
                "pixels",
                "only 0 or 1",
                format!("{} at index {i}", pixels[i]),
            ));
        }
        Ok(DenseMask { h, w, pixels })
    }

    /// An all-background mask.
    pub fn zeros(h: u32, w: u32) -> Result<Self> {
        let n = pixel_count(h, w, MaskKind::Dense)?;
        Ok(DenseMask {
            h,
            w,
            pixels: vec![0; n as usize],
        })
    }

    /// Build a mask from row-major data (pixel `(x, y)` at `y * w + x`), as laid
    /// out by most image buffers.
    pub fn from_row_major(h: u32, w: u32, data: &[u8]) -> Result<Self> {
        let n = pixel_count(h, w, MaskKind::Dense)?;
        if data.len() as u64 != n {
            return Err(MaskError::format(
                MaskKind::Dense,
                "pixels",
                format!("{n} values for {h}x{w}"),
                format!("{} values", data.len()),
            ));
        }
        let (h_us, w_us) = (h as usize, w as usize);
        let mut col_major = vec![0u8; data.len()];
        for y in 0..h_us {
            for x in 0..w_us {
                col_major[y + h_us * x] = data[y * w_us + x];
            }
        }
        DenseMask::new(h, w, col_major)
    }

    /// Unchecked constructor for buffers the codec filled itself.
    pub(crate) fn from_raw(h: u32, w: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), h as usize * w as usize);
        DenseMask { h, w, pixels }
    }

    pub fn h(&self) -> u32 {
        self.h
    }

    pub fn w(&self) -> u32 {
        self.w
    }

    /// Column-major pixel values.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Value at column `x`, row `y`, or `None` when out of bounds.
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.w || y >= self.h {
            return None;
        }
        Some(self.pixels[y as usize + self.h as usize * x as usize])
    }

    pub fn to_row_major(&self) -> Vec<u8> {
        let (h, w) = (self.h as usize, self.w as usize);
        let mut out = vec![0u8; self.pixels.len()];
        for x in 0..w {
            for y in 0..h {
                out[y * w + x] = self.pixels[y + h * x];
            }
        }
        out
    }
}

/// Record shape shared by every sized COCO encoding: `{"size": [h, w], "counts": ...}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct SizedCounts<T> {
    size: [u32; 2],
    counts: T,
}

/// Run-length encoding for masks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "SizedCounts<Vec<u32>>", into = "SizedCounts<Vec<u32>>")]
pub struct Rle {
    pub h: u32,
    pub w: u32,
    /// Run counts: alternating runs of 0s and 1s, starting with 0s.
    pub counts: Vec<u32>,
}

impl Rle {
    /// Check that the runs cover exactly `h * w` pixels and alternate strictly.
    ///
    /// Only the first run may be empty (the mask then starts with a 1); an empty
    /// run anywhere else would put two runs of the same value next to each other.
    pub fn validate(&self) -> Result<()> {
        self.validate_as(MaskKind::Rle)
    }

    pub(crate) fn validate_as(&self, kind: MaskKind) -> Result<()> {
        let n = pixel_count(self.h, self.w, kind)?;
        if let Some(i) = self.counts.iter().skip(1).position(|&c| c == 0) {
            return Err(MaskError::format(
                kind,
                "counts",
                "non-empty runs after the first",
                format!("empty run at index {}", i + 1),
            ));
        }
        let sum: u64 = self.counts.iter().map(|&c| u64::from(c)).sum();
        if sum != n {
            return Err(MaskError::format(
                kind,
                "counts",
                format!("runs summing to {}x{} = {n}", self.h, self.w),
                format!("sum {sum}"),
            ));
        }
        Ok(())
    }
}

impl From<SizedCounts<Vec<u32>>> for Rle {
    fn from(r: SizedCounts<Vec<u32>>) -> Self {
        Rle {
            h: r.size[0],
            w: r.size[1],
            counts: r.counts,
        }
    }
}

impl From<Rle> for SizedCounts<Vec<u32>> {
    fn from(r: Rle) -> Self {
        SizedCounts {
            size: [r.h, r.w],
            counts: r.counts,
        }
    }
}

/// Compressed RLE: the COCO "counts" string, kept as raw ASCII bytes.
///
/// The size is not part of the byte string; it travels alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "SizedCounts<String>")]
pub struct CompressedRle {
    pub h: u32,
    pub w: u32,
    pub counts: Vec<u8>,
}

impl CompressedRle {
    pub fn new(h: u32, w: u32, counts: impl Into<Vec<u8>>) -> Self {
        CompressedRle {
            h,
            w,
            counts: counts.into(),
        }
    }

    /// The counts as text, if they are valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.counts).ok()
    }
}

impl From<SizedCounts<String>> for CompressedRle {
    fn from(r: SizedCounts<String>) -> Self {
        CompressedRle {
            h: r.size[0],
            w: r.size[1],
            counts: r.counts.into_bytes(),
        }
    }
}

// Counts that are not text cannot be written as a COCO record.
impl Serialize for CompressedRle {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let counts = self.as_str().ok_or_else(|| {
            ser::Error::custom(MaskError::format(
                MaskKind::CompressedRle,
                "counts",
                "ASCII text",
                "non-UTF-8 bytes",
            ))
        })?;
        SizedCounts {
            size: [self.h, self.w],
            counts,
        }
        .serialize(serializer)
    }
}

/// A closed polygon contour in image coordinates. The segment from the last
/// vertex back to the first is implied.
///
/// Serialized the COCO way, as a flat list `[x0, y0, x1, y1, ...]`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Contour {
    pub points: Vec<(f64, f64)>,
}

impl Contour {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Contour { points }
    }

    /// Build a contour from interleaved `x, y` coordinates.
    pub fn from_flat(xy: &[f64]) -> Result<Self> {
        if xy.len() % 2 != 0 {
            return Err(MaskError::format(
                MaskKind::Polygons,
                "counts",
                "an even number of coordinates",
                xy.len(),
            ));
        }
        Ok(Contour {
            points: xy.chunks_exact(2).map(|p| (p[0], p[1])).collect(),
        })
    }

    pub fn to_flat(&self) -> Vec<f64> {
        self.points.iter().flat_map(|&(x, y)| [x, y]).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl TryFrom<Vec<f64>> for Contour {
    type Error = MaskError;

    fn try_from(xy: Vec<f64>) -> Result<Self> {
        Contour::from_flat(&xy)
    }
}

impl From<Contour> for Vec<f64> {
    fn from(c: Contour) -> Self {
        c.to_flat()
    }
}

/// Polygon contours of one object. The raster size is supplied when decoding.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Polygons {
    pub contours: Vec<Contour>,
}

impl Polygons {
    pub fn new(contours: Vec<Contour>) -> Self {
        Polygons { contours }
    }

    /// Attach a raster size, producing the self-contained variant.
    pub fn with_size(self, h: u32, w: u32) -> PolygonsRS {
        PolygonsRS {
            h,
            w,
            contours: self.contours,
        }
    }
}

/// Polygon contours that carry their own raster size.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "SizedCounts<Vec<Contour>>", into = "SizedCounts<Vec<Contour>>")]
pub struct PolygonsRS {
    pub h: u32,
    pub w: u32,
    pub contours: Vec<Contour>,
}

impl PolygonsRS {
    /// Drop the embedded size.
    pub fn into_polygons(self) -> Polygons {
        Polygons {
            contours: self.contours,
        }
    }
}

impl From<SizedCounts<Vec<Contour>>> for PolygonsRS {
    fn from(r: SizedCounts<Vec<Contour>>) -> Self {
        PolygonsRS {
            h: r.size[0],
            w: r.size[1],
            contours: r.counts,
        }
    }
}

impl From<PolygonsRS> for SizedCounts<Vec<Contour>> {
    fn from(r: PolygonsRS) -> Self {
        SizedCounts {
            size: [r.h, r.w],
            counts: r.contours,
        }
    }
}

/// An encoded mask in any of the supported representations.
///
/// Deserializes from the COCO record shapes. Variants are tried in declaration
/// order: a string `counts` is compressed RLE, a list of integers is plain RLE, a
/// list of coordinate lists is self-sized polygons, and a bare list of coordinate
/// lists is plain polygons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segmentation {
    CompressedRle(CompressedRle),
    Rle(Rle),
    PolygonsRS(PolygonsRS),
    Polygons(Polygons),
}

impl Segmentation {
    pub fn kind(&self) -> MaskKind {
        match self {
            Segmentation::CompressedRle(_) => MaskKind::CompressedRle,
            Segmentation::Rle(_) => MaskKind::Rle,
            Segmentation::PolygonsRS(_) => MaskKind::PolygonsRS,
            Segmentation::Polygons(_) => MaskKind::Polygons,
        }
    }

    /// The embedded `(h, w)`, if this variant carries one.
    pub fn size(&self) -> Option<(u32, u32)> {
        match self {
            Segmentation::CompressedRle(r) => Some((r.h, r.w)),
            Segmentation::Rle(r) => Some((r.h, r.w)),
            Segmentation::PolygonsRS(p) => Some((p.h, p.w)),
            Segmentation::Polygons(_) => None,
        }
    }
}

impl FromStr for Segmentation {
    type Err = MaskError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

impl From<Rle> for Segmentation {
    fn from(r: Rle) -> Self {
        Segmentation::Rle(r)
    }
}

impl From<CompressedRle> for Segmentation {
    fn from(r: CompressedRle) -> Self {
        Segmentation::CompressedRle(r)
    }
}

impl From<Polygons> for Segmentation {
    fn from(p: Polygons) -> Self {
        Segmentation::Polygons(p)
    }
}

impl From<PolygonsRS> for Segmentation {
    fn from(p: PolygonsRS) -> Self {
        Segmentation::PolygonsRS(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_rejects_wrong_length() {
        let err = DenseMask::new(2, 2, vec![0, 1, 0]).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_dense_rejects_non_binary() {
        let err = DenseMask::new(1, 2, vec![0, 255]).unwrap_err();
        assert!(err.to_string().contains("255 at index 1"), "{err}");
    }

    #[test]
    fn test_dense_rejects_oversized() {
        assert!(DenseMask::zeros(u32::MAX, 2).is_err());
    }

    #[test]
    fn test_row_major_roundtrip() {
        // 2 rows x 3 cols
        let rows = vec![0, 1, 1, 1, 0, 0];
        let mask = DenseMask::from_row_major(2, 3, &rows).unwrap();
        assert_eq!(mask.pixels(), &[0, 1, 1, 0, 1, 0]);
        assert_eq!(mask.get(0, 1), Some(1));
        assert_eq!(mask.get(2, 0), Some(1));
        assert_eq!(mask.get(3, 0), None);
        assert_eq!(mask.to_row_major(), rows);
    }

    #[test]
    fn test_rle_validate_sum() {
        let rle = Rle {
            h: 2,
            w: 2,
            counts: vec![1, 2],
        };
        let err = rle.validate().unwrap_err();
        assert!(err.to_string().contains("sum 3"), "{err}");
    }

    #[test]
    fn test_rle_validate_polarity() {
        let rle = Rle {
            h: 2,
            w: 2,
            counts: vec![1, 0, 3],
        };
        let err = rle.validate().unwrap_err();
        assert!(err.to_string().contains("empty run at index 1"), "{err}");
    }

    #[test]
    fn test_rle_validate_leading_zero() {
        let rle = Rle {
            h: 2,
            w: 2,
            counts: vec![0, 4],
        };
        assert!(rle.validate().is_ok());
    }

    #[test]
    fn test_contour_from_flat_odd() {
        assert!(Contour::from_flat(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_parse_variants() {
        let seg: Segmentation = r#"{"size": [9, 10], "counts": "61X13mN000`0"}"#.parse().unwrap();
        assert_eq!(seg.kind(), MaskKind::CompressedRle);

        let seg: Segmentation = r#"{"size": [2, 2], "counts": [1, 2, 1]}"#.parse().unwrap();
        assert_eq!(
            seg,
            Segmentation::Rle(Rle {
                h: 2,
                w: 2,
                counts: vec![1, 2, 1]
            })
        );

        let seg: Segmentation = r#"{"size": [4, 5], "counts": [[0, 0, 2, 0, 2, 2]]}"#
            .parse()
            .unwrap();
        assert_eq!(seg.kind(), MaskKind::PolygonsRS);
        assert_eq!(seg.size(), Some((4, 5)));

        let seg: Segmentation = "[[0.5, 0.5, 2.5, 0.5, 2.5, 2.5]]".parse().unwrap();
        match seg {
            Segmentation::Polygons(p) => {
                assert_eq!(p.contours[0].points[1], (2.5, 0.5));
            }
            other => panic!("expected polygons, got {other:?}"),
        }
    }

    #[test]
    fn test_serialize_non_utf8_counts_fails() {
        let seg = Segmentation::CompressedRle(CompressedRle::new(1, 2, vec![0x31, 0xff]));
        let err = serde_json::to_string(&seg).unwrap_err();
        assert!(err.to_string().contains("non-UTF-8"), "{err}");
    }

    #[test]
    fn test_parse_odd_polygon_fails() {
        assert!("[[0.0, 0.0, 1.0]]".parse::<Segmentation>().is_err());
    }

    #[test]
    fn test_serialize_record_shape() {
        let seg = Segmentation::CompressedRle(CompressedRle::new(9, 10, "61X13mN000`0"));
        let json = serde_json::to_string(&seg).unwrap();
        assert_eq!(json, r#"{"size":[9,10],"counts":"61X13mN000`0"}"#);

        let seg = Segmentation::Polygons(Polygons::new(vec![Contour::new(vec![
            (1.0, 2.0),
            (3.0, 4.0),
            (5.0, 6.0),
        ])]));
        let json = serde_json::to_string(&seg).unwrap();
        assert_eq!(json, "[[1.0,2.0,3.0,4.0,5.0,6.0]]");
    }
}
