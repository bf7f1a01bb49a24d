//! Polygon rasterization and tracing.
//!
//! Rasterization is a scan-line fill with an edge table: every row is sampled at
//! its pixel centre `y + 0.5`, crossings are sorted and the spans between the
//! 1st-2nd, 3rd-4th, ... crossings are filled. A pixel is filled when its centre
//! `x + 0.5` lies in `[x_left, x_right)`. Edges are half-open in y, so a vertex
//! lying exactly on a sample line is counted once and horizontal edges never
//! contribute.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::error::{GeometryIssue, MaskError, MaskKind, Result};
use crate::mask;
use crate::params::FillRule;
use crate::types::{pixel_count, Contour, DenseMask, Polygons, Rle};

/// A non-horizontal contour edge, oriented top to bottom.
#[derive(Debug, Clone, Copy)]
struct Edge {
    x_top: f64,
    y_top: f64,
    /// dx / dy along the edge.
    slope: f64,
    /// First row (exclusive) this edge no longer crosses.
    row_end: usize,
}

impl Edge {
    fn x_at(&self, row: usize) -> f64 {
        self.x_top + (row as f64 + 0.5 - self.y_top) * self.slope
    }
}

fn check_contour(kind: MaskKind, index: usize, contour: &Contour) -> Result<()> {
    let issue = if contour.len() < 3 {
        Some(GeometryIssue::TooFewVertices(contour.len()))
    } else {
        contour
            .points
            .iter()
            .position(|&(x, y)| !x.is_finite() || !y.is_finite())
            .map(|vertex| GeometryIssue::NonFinite { vertex })
    };
    match issue {
        Some(issue) => {
            debug!(%kind, contour = index, %issue, "rejecting contour");
            Err(MaskError::Geometry {
                kind,
                contour: index,
                issue,
            })
        }
        None => Ok(()),
    }
}

/// Reject the first contour with fewer than 3 vertices or a non-finite vertex.
pub(crate) fn check_contours(kind: MaskKind, contours: &[Contour]) -> Result<()> {
    contours
        .iter()
        .enumerate()
        .try_for_each(|(i, contour)| check_contour(kind, i, contour))
}

/// Collect the edges of `contour` together with the first row each one crosses.
fn push_edges(contour: &Contour, h: u32, edges: &mut Vec<(usize, Edge)>) {
    let pts = &contour.points;
    let rows = h as f64;
    for (i, &p0) in pts.iter().enumerate() {
        let p1 = pts[(i + 1) % pts.len()];
        if p0.1 == p1.1 {
            continue;
        }
        let (top, bottom) = if p0.1 < p1.1 { (p0, p1) } else { (p1, p0) };
        // Rows whose centre y + 0.5 lies in [top.y, bottom.y).
        let first = (top.1 - 0.5).ceil().clamp(0.0, rows) as usize;
        let end = (bottom.1 - 0.5).ceil().clamp(0.0, rows) as usize;
        if first >= end {
            continue;
        }
        edges.push((
            first,
            Edge {
                x_top: top.0,
                y_top: top.1,
                slope: (bottom.0 - top.0) / (bottom.1 - top.1),
                row_end: end,
            },
        ));
    }
}

/// Edges bucketed by first row, covering only rows `first..first + rows.len()`.
struct EdgeTable {
    first: usize,
    rows: Vec<Vec<Edge>>,
}

/// Fill the edge table into `pixels` (column-major, `h × w`) using even-odd
/// pairing of the crossings on each row. Only ever sets pixels to 1.
fn scan(table: EdgeTable, h: u32, w: u32, pixels: &mut [u8]) {
    let h_us = h as usize;
    let cols = w as f64;
    let EdgeTable { first, mut rows } = table;
    let mut active: Vec<Edge> = Vec::new();
    let mut xs: Vec<f64> = Vec::new();

    for (offset, bucket) in rows.iter_mut().enumerate() {
        let y = first + offset;
        active.retain(|e| e.row_end > y);
        active.append(bucket);
        if active.is_empty() {
            continue;
        }

        xs.clear();
        xs.extend(active.iter().map(|e| e.x_at(y)));
        xs.sort_by(f64::total_cmp);

        for pair in xs.chunks_exact(2) {
            let start = (pair[0] - 0.5).ceil().clamp(0.0, cols) as usize;
            let end = (pair[1] - 0.5).ceil().clamp(0.0, cols) as usize;
            for x in start..end {
                pixels[y + h_us * x] = 1;
            }
        }
    }
}

fn edge_table(contours: &[Contour], h: u32) -> EdgeTable {
    let mut edges = Vec::new();
    for contour in contours {
        push_edges(contour, h, &mut edges);
    }
    let first = edges.iter().map(|&(row, _)| row).min().unwrap_or(0);
    let end = edges.iter().map(|(_, e)| e.row_end).max().unwrap_or(first);
    let mut rows = vec![Vec::new(); end - first];
    for (row, edge) in edges {
        rows[row - first].push(edge);
    }
    EdgeTable { first, rows }
}

pub(crate) fn rasterize_as(
    kind: MaskKind,
    contours: &[Contour],
    h: u32,
    w: u32,
    rule: FillRule,
) -> Result<DenseMask> {
    check_contours(kind, contours)?;
    let n = pixel_count(h, w, kind)?;
    let mut pixels = vec![0u8; n as usize];
    if n == 0 {
        return Ok(DenseMask::from_raw(h, w, pixels));
    }

    match rule {
        FillRule::Union => {
            for contour in contours {
                scan(edge_table(std::slice::from_ref(contour), h), h, w, &mut pixels);
            }
        }
        FillRule::EvenOdd => scan(edge_table(contours, h), h, w, &mut pixels),
    }
    trace!(%kind, contours = contours.len(), h, w, ?rule, "rasterized polygons");
    Ok(DenseMask::from_raw(h, w, pixels))
}

/// Rasterize polygon contours into an `h × w` mask.
///
/// Vertices may lie outside the raster; spans are clipped to it. Fails with a
/// geometry error if any contour has fewer than 3 vertices or a non-finite
/// coordinate.
pub fn rasterize(polygons: &Polygons, h: u32, w: u32, rule: FillRule) -> Result<DenseMask> {
    rasterize_as(MaskKind::Polygons, &polygons.contours, h, w, rule)
}

/// Convert the polygons of one object to a single RLE.
pub fn fr_polys(polygons: &Polygons, h: u32, w: u32, rule: FillRule) -> Result<Rle> {
    rasterize(polygons, h, w, rule).map(|m| mask::encode(&m))
}

// Unit steps along pixel boundaries, in image coordinates (y grows downwards).
type Dir = (i64, i64);

fn turn_right((dx, dy): Dir) -> Dir {
    (-dy, dx)
}

fn turn_left((dx, dy): Dir) -> Dir {
    (dy, -dx)
}

/// Trace the pixel boundaries of a mask into closed contours.
///
/// Every contour runs along pixel edges (integer coordinates), clockwise on
/// screen around foreground and counter-clockwise around holes. Outer boundaries
/// and hole boundaries are both emitted, so decoding the result with
/// [`FillRule::EvenOdd`] reproduces the mask exactly; [`FillRule::Union`] fills
/// the holes back in. Diagonally touching pixels end up in separate contours.
pub fn trace(mask: &DenseMask) -> Polygons {
    let (h, w) = (i64::from(mask.h()), i64::from(mask.w()));
    let fg = |x: i64, y: i64| -> bool {
        x >= 0 && y >= 0 && x < w && y < h && mask.get(x as u32, y as u32) == Some(1)
    };

    // Directed boundary edges as (start vertex, direction).
    let mut edges: Vec<((i64, i64), Dir)> = Vec::new();
    for x in 0..w {
        for y in 0..h {
            if !fg(x, y) {
                continue;
            }
            if !fg(x, y - 1) {
                edges.push(((x, y), (1, 0)));
            }
            if !fg(x + 1, y) {
                edges.push(((x + 1, y), (0, 1)));
            }
            if !fg(x, y + 1) {
                edges.push(((x + 1, y + 1), (-1, 0)));
            }
            if !fg(x - 1, y) {
                edges.push(((x, y + 1), (0, -1)));
            }
        }
    }

    let mut outgoing: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (i, &(start, _)) in edges.iter().enumerate() {
        outgoing.entry(start).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut contours = Vec::new();
    for first in 0..edges.len() {
        if used[first] {
            continue;
        }
        let origin = edges[first].0;
        let mut corners: Vec<(f64, f64)> = Vec::new();
        let mut current = first;
        loop {
            used[current] = true;
            let (start, dir) = edges[current];
            let end = (start.0 + dir.0, start.1 + dir.1);
            if end == origin {
                break;
            }
            // Hug the current pixel at pinch points: right, straight, then left.
            let candidates = outgoing.get(&end).map(Vec::as_slice).unwrap_or(&[]);
            let next = [turn_right(dir), dir, turn_left(dir)]
                .into_iter()
                .find_map(|want| {
                    candidates
                        .iter()
                        .copied()
                        .find(|&j| !used[j] && edges[j].1 == want)
                });
            let Some(next) = next else {
                break;
            };
            if edges[next].1 != dir {
                corners.push((end.0 as f64, end.1 as f64));
            }
            current = next;
        }
        // The origin is a corner unless the loop passes straight through it.
        let (_, last_dir) = edges[current];
        if last_dir != edges[first].1 {
            corners.insert(0, (origin.0 as f64, origin.1 as f64));
        }
        contours.push(Contour::new(corners));
    }

    trace!(h, w, contours = contours.len(), "traced mask");
    Polygons::new(contours)
}
