use std::path::PathBuf;

use coco_mask::{
    decode, decode_batch, decode_encoded_rle, decode_polygons, decode_rle, encode,
    encode_dense_to_rle, CompressedRle, Contour, DenseMask, FillRule, MaskError, Params,
    Polygons, Rle, Segmentation, Target,
};
use serde::Deserialize;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

#[derive(Debug, Deserialize)]
struct Case {
    name: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    segmentation: Segmentation,
    #[serde(default)]
    area: Option<usize>,
    #[serde(default)]
    error: Option<String>,
}

fn load_cases() -> Vec<Case> {
    let path = fixtures_dir().join("segmentations.json");
    let file = std::fs::File::open(&path).expect("Failed to open fixture");
    serde_json::from_reader(std::io::BufReader::new(file)).expect("Failed to parse fixture")
}

fn foreground(mask: &DenseMask) -> usize {
    mask.pixels().iter().filter(|&&v| v == 1).count()
}

#[test]
fn test_load_fixture() {
    let cases = load_cases();
    assert_eq!(cases.len(), 10);
    assert!(matches!(cases[0].segmentation, Segmentation::CompressedRle(_)));
    assert!(matches!(cases[2].segmentation, Segmentation::Rle(_)));
    assert!(matches!(cases[3].segmentation, Segmentation::Polygons(_)));
    assert!(matches!(cases[5].segmentation, Segmentation::PolygonsRS(_)));
}

#[test]
fn test_fixture_areas() {
    for case in load_cases() {
        let Some(expected) = case.area else { continue };
        let mask = decode(&case.segmentation, case.width, case.height)
            .unwrap_or_else(|e| panic!("{}: {e}", case.name));
        assert_eq!(foreground(&mask), expected, "{}", case.name);
    }
}

#[test]
fn test_fixture_errors() {
    for case in load_cases() {
        let Some(expected) = case.error.as_deref() else { continue };
        let err = decode(&case.segmentation, case.width, case.height)
            .expect_err(&case.name);
        let kind = match err {
            MaskError::Format { .. } => "format",
            MaskError::MissingDimensions { .. } => "missing_dimensions",
            MaskError::Geometry { .. } => "geometry",
            MaskError::Json(_) => "json",
        };
        assert_eq!(kind, expected, "{}", case.name);
    }
}

#[test]
fn test_fixture_records_reserialize() {
    for case in load_cases() {
        let json = serde_json::to_string(&case.segmentation).unwrap();
        let parsed: Segmentation = json.parse().unwrap();
        assert_eq!(parsed, case.segmentation, "{}", case.name);
    }
}

#[test]
fn test_batch_matches_sequential() {
    let cases = load_cases();
    let sized: Vec<Segmentation> = cases
        .iter()
        .filter(|c| c.width.is_none() && c.error.is_none())
        .map(|c| c.segmentation.clone())
        .collect();
    let params = Params::default();
    let batch = decode_batch(&sized, None, None, &params);
    for (seg, result) in sized.iter().zip(&batch) {
        assert_eq!(result.as_ref().unwrap(), &decode(seg, None, None).unwrap());
    }
}

#[test]
fn test_all_zero_mask() {
    let mask = DenseMask::zeros(3, 3).unwrap();
    let rle = encode_dense_to_rle(&mask);
    assert_eq!(rle.counts, vec![9]);
    assert_eq!(decode_rle(&rle).unwrap(), mask);
}

#[test]
fn test_two_by_two_pattern() {
    let mask = DenseMask::new(2, 2, vec![0, 1, 1, 0]).unwrap();
    let rle = encode_dense_to_rle(&mask);
    assert_eq!(rle.counts, vec![1, 2, 1]);
    assert_eq!(decode_rle(&rle).unwrap().pixels(), &[0, 1, 1, 0]);
}

#[test]
fn test_square_polygon() {
    let polygons = Polygons::new(vec![Contour::new(vec![
        (0.0, 0.0),
        (2.0, 0.0),
        (2.0, 2.0),
        (0.0, 2.0),
    ])]);
    let mask = decode_polygons(&polygons, Some(2), Some(2)).unwrap();
    assert_eq!(mask.pixels(), &[1, 1, 1, 1]);
}

#[test]
fn test_dangling_continuation_bit() {
    // Last byte '`' = 48 + 0x30 has the continuation bit set.
    let compressed = CompressedRle::new(9, 10, "61X13mN000`");
    let err = decode_encoded_rle(&compressed).unwrap_err();
    assert!(err.is_format(), "{err}");
}

#[test]
fn test_dense_through_every_target() {
    // 5x6 mask with a hole and a detached pixel, given row-major.
    #[rustfmt::skip]
    let rows = [
        1, 1, 1, 0, 0, 0,
        1, 0, 1, 0, 0, 0,
        1, 1, 1, 0, 0, 0,
        0, 0, 0, 0, 0, 1,
        0, 0, 0, 0, 0, 0,
    ];
    let mask = DenseMask::from_row_major(5, 6, &rows).unwrap();
    let params = Params::new(FillRule::EvenOdd);

    for target in [Target::Rle, Target::CocoRle, Target::PolygonsRs] {
        let seg = encode(&mask, target);
        let json = serde_json::to_string(&seg).unwrap();
        let parsed: Segmentation = json.parse().unwrap();
        let back = coco_mask::decode_with(&parsed, None, None, &params).unwrap();
        assert_eq!(back, mask, "{target:?}");
    }

    let seg = encode(&mask, Target::Polygons);
    let back = coco_mask::decode_with(&seg, Some(6), Some(5), &params).unwrap();
    assert_eq!(back.to_row_major(), rows);
}

#[test]
fn test_compressed_matches_uncompressed() {
    let rle = Rle {
        h: 40,
        w: 40,
        counts: vec![245, 5, 35, 5, 35, 5, 35, 5, 35, 5, 1190],
    };
    let compressed = CompressedRle::new(40, 40, "e75S10000000ST1");
    assert_eq!(
        decode_encoded_rle(&compressed).unwrap(),
        decode_rle(&rle).unwrap()
    );
}
