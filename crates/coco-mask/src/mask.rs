//! Run-length codecs for COCO masks.
//!
//! Dense column-major masks convert to and from uncompressed RLE, and RLE
//! converts to and from the compact "counts" string of `maskApi.c`
//! (`rleToString` / `rleFrString`). The string format is persisted in annotation
//! files, so both directions must stay bit-exact with the C implementation.

use tracing::debug;

use crate::error::{MaskError, MaskKind, Result};
use crate::types::{pixel_count, CompressedRle, DenseMask, Rle};

/// Offset added to every 6-bit group so the output is printable ASCII.
const ASCII_OFFSET: u8 = 48;
/// Largest byte the string format can contain (`48 + 0x3f`).
const ASCII_MAX: u8 = ASCII_OFFSET + 0x3f;

/// Encode a column-major binary mask into RLE.
///
/// The first run always counts background pixels, so a mask starting with a 1
/// gets a leading run of length 0. An empty mask has no runs at all.
pub fn encode(mask: &DenseMask) -> Rle {
    let pixels = mask.pixels();
    let mut counts = Vec::new();
    if !pixels.is_empty() {
        let mut p: u8 = 0;
        let mut c: u32 = 0;
        for &v in pixels {
            if v != p {
                counts.push(c);
                c = 0;
                p = v;
            }
            c += 1;
        }
        counts.push(c);
    }

    Rle {
        h: mask.h(),
        w: mask.w(),
        counts,
    }
}

/// Decode an RLE to a column-major binary mask of size `h * w`.
///
/// Fails if the runs do not cover exactly `h * w` pixels or do not alternate.
pub fn decode(rle: &Rle) -> Result<DenseMask> {
    if let Err(err) = rle.validate() {
        debug!(h = rle.h, w = rle.w, runs = rle.counts.len(), %err, "rejecting RLE");
        return Err(err);
    }
    Ok(expand(rle))
}

/// Expand runs that are already known to be valid.
fn expand(rle: &Rle) -> DenseMask {
    let n = (rle.h as usize) * (rle.w as usize);
    let mut mask = vec![0u8; n];
    let mut idx = 0usize;
    let mut v = 0u8;
    for &c in &rle.counts {
        let end = idx + c as usize;
        mask[idx..end].fill(v);
        idx = end;
        v = 1 - v;
    }
    DenseMask::from_raw(rle.h, rle.w, mask)
}

/// Compress an RLE into the LEB128-like byte format used by COCO.
///
/// Runs after the third are stored as the difference to the run two places
/// earlier, then every value is written as little-endian 5-bit groups with bit
/// `0x20` marking continuation and bit `0x10` of the last group carrying the sign.
///
/// This does not validate `rle`; see [`compress`] for the checked variant.
pub fn rle_to_bytes(rle: &Rle) -> Vec<u8> {
    let mut out = Vec::with_capacity(rle.counts.len() * 2);
    for (i, &cnt) in rle.counts.iter().enumerate() {
        let mut x = i64::from(cnt);
        if i > 2 {
            x -= i64::from(rle.counts[i - 2]);
        }
        loop {
            let mut c = (x & 0x1f) as u8;
            x >>= 5;
            let more = if c & 0x10 != 0 { x != -1 } else { x != 0 };
            if more {
                c |= 0x20;
            }
            out.push(c + ASCII_OFFSET);
            if !more {
                break;
            }
        }
    }
    out
}

/// [`rle_to_bytes`] as a string, the form stored in COCO JSON.
pub fn rle_to_string(rle: &Rle) -> String {
    rle_to_bytes(rle).into_iter().map(char::from).collect()
}

/// Validate `rle` and compress it.
pub fn compress(rle: &Rle) -> Result<CompressedRle> {
    rle.validate()?;
    Ok(CompressedRle::new(rle.h, rle.w, rle_to_bytes(rle)))
}

/// Maximum number of 5-bit groups a single stored value may use for a mask of
/// `n` pixels.
///
/// Every stored value (a run, or the difference of two runs) lies in `[-n, n]`
/// and so fits in `bits(n) + 1` bits of two's complement.
fn max_groups(n: u64) -> u32 {
    let bits = u64::BITS - n.leading_zeros();
    (bits + 5) / 5
}

/// Decompress a COCO counts byte string back to an RLE of size `h × w`.
///
/// Inverse of [`rle_to_bytes`]. Fails on bytes outside `'0'..='o'`, on a string
/// that ends in the middle of a value, on values wider than the mask size allows,
/// and when the decoded runs are negative or do not cover `h * w` pixels.
pub fn rle_from_bytes(bytes: &[u8], h: u32, w: u32) -> Result<Rle> {
    const KIND: MaskKind = MaskKind::CompressedRle;

    let n = pixel_count(h, w, KIND)?;
    let max_groups = max_groups(n);
    let mut counts: Vec<u32> = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let start = i;
        let mut x: i64 = 0;
        let mut k: u32 = 0;
        loop {
            let Some(&b) = bytes.get(i) else {
                return Err(MaskError::format(
                    KIND,
                    "counts",
                    "last byte without the continuation bit",
                    format!("string ending inside the value starting at byte {start}"),
                ));
            };
            if !(ASCII_OFFSET..=ASCII_MAX).contains(&b) {
                return Err(MaskError::format(
                    KIND,
                    "counts",
                    "bytes in '0'..='o'",
                    format!("{b:#04x} at byte {i}"),
                ));
            }
            if k == max_groups {
                return Err(MaskError::format(
                    KIND,
                    "counts",
                    format!("at most {max_groups} groups per value for {n} pixels"),
                    format!("a longer value starting at byte {start}"),
                ));
            }
            let c = i64::from(b - ASCII_OFFSET);
            x |= (c & 0x1f) << (5 * k);
            k += 1;
            i += 1;
            if c & 0x20 == 0 {
                if c & 0x10 != 0 {
                    x |= -1i64 << (5 * k);
                }
                break;
            }
        }

        let m = counts.len();
        if m > 2 {
            x += i64::from(counts[m - 2]);
        }
        let count = u32::try_from(x).map_err(|_| {
            MaskError::format(KIND, "counts", "run lengths >= 0", format!("{x} for run {m}"))
        })?;
        counts.push(count);
    }

    let rle = Rle { h, w, counts };
    rle.validate_as(KIND)?;
    Ok(rle)
}

/// Decompress a COCO counts string. See [`rle_from_bytes`].
pub fn rle_from_string(s: &str, h: u32, w: u32) -> Result<Rle> {
    rle_from_bytes(s.as_bytes(), h, w)
}

/// Decompress a [`CompressedRle`] into its uncompressed runs.
pub fn decompress(compressed: &CompressedRle) -> Result<Rle> {
    rle_from_bytes(&compressed.counts, compressed.h, compressed.w).inspect_err(|err| {
        debug!(h = compressed.h, w = compressed.w, %err, "rejecting compressed RLE");
    })
}

/// Decode a compressed RLE all the way to a dense mask.
pub fn decode_compressed(compressed: &CompressedRle) -> Result<DenseMask> {
    decompress(compressed).map(|rle| expand(&rle))
}
