//! Brush shapes and stamping.
//!
//! A brush is stamped at every lattice position a stroke visits. Two
//! shapes are supported:
//!
//! - [`Brush::Kernel`]: a centered 0/1 matrix lying in the edited slice.
//!   Columns run along the slice's first in-plane axis, rows along the
//!   second (x and y for the default K slice).
//! - [`Brush::Ellipsoid`]: an axis-aligned ellipsoid given by its radius
//!   in voxels. With a slicing axis set, the ellipsoid is flattened onto
//!   the slice through its center.
//!
//! Stamping is clipped to the volume; positions outside are skipped.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, IndexPoint, MaskError, SliceAxis};

/// A brush shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Brush {
    /// Planar brush from a centered 0/1 matrix.
    Kernel(BrushKernel),
    /// Axis-aligned ellipsoid with per-axis radius in voxels.
    Ellipsoid {
        /// Radius along x, y and z.
        radius: [f64; 3],
    },
}

impl Brush {
    /// An ellipsoid brush.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidBrush`] if any radius component is
    /// negative or not finite.
    pub fn ellipsoid(radius: [f64; 3]) -> Result<Self, MaskError> {
        if radius.iter().any(|r| !r.is_finite() || *r < 0.0) {
            return Err(MaskError::InvalidBrush(format!(
                "ellipsoid radius must be finite and non-negative, got {radius:?}"
            )));
        }
        Ok(Self::Ellipsoid { radius })
    }

    /// Stamp the brush centered on `center`, calling `mark` with the flat
    /// index of every covered voxel inside the volume.
    pub fn stamp(
        &self,
        center: IndexPoint,
        dims: Dimensions,
        slicing: Option<SliceAxis>,
        mark: impl FnMut(usize),
    ) {
        match self {
            Self::Kernel(kernel) => {
                kernel.stamp(center, dims, slicing.unwrap_or(SliceAxis::K), mark);
            }
            Self::Ellipsoid { radius } => {
                stamp_ellipsoid(center, *radius, dims, slicing.map(SliceAxis::index), mark);
            }
        }
    }
}

/// A centered 0/1 brush matrix.
///
/// Both the row count and every row's width are odd, so each row has a
/// well-defined center cell. Serialized as nested arrays of 0/1 values;
/// any non-zero entry counts as set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<u8>>", into = "Vec<Vec<u8>>")]
pub struct BrushKernel {
    rows: Vec<Vec<bool>>,
}

impl BrushKernel {
    /// Build a kernel from rows of set/unset cells.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidBrush`] if the kernel has no rows, an
    /// even number of rows, or a row of even width.
    pub fn new(rows: Vec<Vec<bool>>) -> Result<Self, MaskError> {
        if rows.len() % 2 == 0 {
            return Err(MaskError::InvalidBrush(format!(
                "kernel needs an odd number of rows, got {}",
                rows.len()
            )));
        }
        if let Some((j, row)) = rows.iter().enumerate().find(|(_, row)| row.len() % 2 == 0) {
            return Err(MaskError::InvalidBrush(format!(
                "kernel row {j} has even width {}",
                row.len()
            )));
        }
        Ok(Self { rows })
    }

    /// A fully set `size × size` square.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidBrush`] if `size` is even (including 0).
    pub fn square(size: usize) -> Result<Self, MaskError> {
        Self::new(vec![vec![true; size]; size])
    }

    /// A digital disk of the given radius, `2 * radius + 1` cells wide.
    #[must_use]
    pub fn disk(radius: usize) -> Self {
        let size = 2 * radius + 1;
        let r2 = radius * radius;
        let rows = (0..size)
            .map(|j| {
                (0..size)
                    .map(|i| {
                        let dx = i.abs_diff(radius);
                        let dy = j.abs_diff(radius);
                        dx * dx + dy * dy <= r2
                    })
                    .collect()
            })
            .collect();
        Self { rows }
    }

    /// The kernel cells, row by row.
    #[must_use]
    pub fn rows(&self) -> &[Vec<bool>] {
        &self.rows
    }

    /// `(column, row)` offsets of every set cell relative to the center.
    #[allow(clippy::cast_possible_wrap)]
    pub fn offsets(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        let row_offset = -((self.rows.len() / 2) as i64);
        self.rows.iter().enumerate().flat_map(move |(j, row)| {
            let col_offset = -((row.len() / 2) as i64);
            row.iter()
                .enumerate()
                .filter(|(_, set)| **set)
                .map(move |(i, _)| (col_offset + i as i64, row_offset + j as i64))
        })
    }

    fn stamp(&self, center: IndexPoint, dims: Dimensions, axis: SliceAxis, mut mark: impl FnMut(usize)) {
        let (col, row) = axis.plane_axes();
        for (di, dj) in self.offsets() {
            let mut p = center.to_array();
            p[col] += di;
            p[row] += dj;
            if let Some(index) = dims.index_of(IndexPoint::from(p)) {
                mark(index);
            }
        }
    }
}

impl TryFrom<Vec<Vec<u8>>> for BrushKernel {
    type Error = MaskError;

    fn try_from(rows: Vec<Vec<u8>>) -> Result<Self, Self::Error> {
        Self::new(
            rows.into_iter()
                .map(|row| row.into_iter().map(|v| v != 0).collect())
                .collect(),
        )
    }
}

impl From<BrushKernel> for Vec<Vec<u8>> {
    fn from(kernel: BrushKernel) -> Self {
        kernel
            .rows
            .into_iter()
            .map(|row| row.into_iter().map(u8::from).collect())
            .collect()
    }
}

/// Whether an ellipsoid axis contributes extent.
fn spans(radius: f64, flat: bool) -> bool {
    !flat && radius.is_finite() && radius > 0.0
}

/// Normalized distance of `v` from `c` along an axis (`0` when flat).
#[allow(clippy::cast_precision_loss)]
fn unit_offset(c: i64, v: i64, radius: f64, flat: bool) -> f64 {
    if spans(radius, flat) {
        (c - v) as f64 / radius
    } else {
        0.0
    }
}

/// Slack for lattice points sitting exactly on the ellipsoid surface.
const SURFACE_EPS: f64 = 1e-9;

/// Inclusive lattice range lying within `half` voxels of `c` along one
/// axis, clamped to `[0, extent - 1]`. Bounds round inward so no point of
/// the range is farther than `half` from the center.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap
)]
fn axis_range(c: i64, radius: f64, flat: bool, half: f64, extent: usize) -> (i64, i64) {
    if !spans(radius, flat) {
        return (c, c);
    }
    let last = (extent - 1) as f64;
    let lo = (c as f64 - half - SURFACE_EPS).ceil().max(0.0) as i64;
    let hi = (c as f64 + half + SURFACE_EPS).floor().min(last) as i64;
    (lo, hi)
}

/// Fill every voxel of an axis-aligned ellipsoid, one x-run at a time.
#[allow(clippy::cast_possible_wrap)]
fn stamp_ellipsoid(
    center: IndexPoint,
    radius: [f64; 3],
    dims: Dimensions,
    flat_axis: Option<usize>,
    mut mark: impl FnMut(usize),
) {
    let c = center.to_array();
    let ext = dims.to_array();
    let flat = [flat_axis == Some(0), flat_axis == Some(1), flat_axis == Some(2)];
    let in_axis = |axis: usize, v: i64| v >= 0 && v < ext[axis] as i64;

    let (zmin, zmax) = axis_range(c[2], radius[2], flat[2], radius[2], ext[2]);
    for z in zmin..=zmax {
        let dz = unit_offset(c[2], z, radius[2], flat[2]);
        let dz2 = dz * dz;
        if dz2 > 1.0 || !in_axis(2, z) {
            continue;
        }

        let ay = radius[1] * (1.0 - dz2).sqrt();
        let (ymin, ymax) = axis_range(c[1], radius[1], flat[1], ay, ext[1]);
        for y in ymin..=ymax {
            let dy = unit_offset(c[1], y, radius[1], flat[1]);
            let dy2 = dy * dy;
            if dy2 + dz2 > 1.0 + SURFACE_EPS || !in_axis(1, y) {
                continue;
            }

            let ax = radius[0] * (1.0 - dy2 - dz2).max(0.0).sqrt();
            let (xmin, xmax) = axis_range(c[0], radius[0], flat[0], ax, ext[0]);
            let xmin = xmin.max(0);
            let xmax = xmax.min(ext[0] as i64 - 1);
            for x in xmin..=xmax {
                if let Some(index) = dims.index_of(IndexPoint::new(x, y, z)) {
                    mark(index);
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dims(nx: usize, ny: usize, nz: usize) -> Dimensions {
        Dimensions::new(nx, ny, nz).unwrap()
    }

    fn stamped(brush: &Brush, center: IndexPoint, dims: Dimensions, slicing: Option<SliceAxis>) -> Vec<usize> {
        let mut out = Vec::new();
        brush.stamp(center, dims, slicing, |i| out.push(i));
        out.sort_unstable();
        out
    }

    #[test]
    fn kernel_rejects_even_sizes() {
        assert!(BrushKernel::square(2).is_err());
        assert!(BrushKernel::square(0).is_err());
        assert!(BrushKernel::new(vec![vec![true, true]]).is_err());
        assert!(BrushKernel::square(3).is_ok());
    }

    #[test]
    fn kernel_offsets_are_centered() {
        let kernel = BrushKernel::square(3).unwrap();
        let offsets: Vec<_> = kernel.offsets().collect();
        assert_eq!(offsets.len(), 9);
        assert!(offsets.contains(&(-1, -1)));
        assert!(offsets.contains(&(1, 1)));
        assert!(offsets.contains(&(0, 0)));
    }

    #[test]
    fn ragged_rows_center_independently() {
        let kernel = BrushKernel::new(vec![vec![true], vec![true, true, true], vec![true]]).unwrap();
        let mut offsets: Vec<_> = kernel.offsets().collect();
        offsets.sort_unstable();
        assert_eq!(offsets, vec![(-1, 0), (0, -1), (0, 0), (0, 1), (1, 0)]);
    }

    #[test]
    fn disk_of_radius_one_is_a_plus() {
        let kernel = BrushKernel::disk(1);
        assert_eq!(kernel.offsets().count(), 5);
        assert_eq!(BrushKernel::disk(0).offsets().count(), 1);
    }

    #[test]
    fn kernel_deserializes_from_01_matrix() {
        let kernel: BrushKernel = serde_json::from_str("[[0,1,0],[1,1,1],[0,1,0]]").unwrap();
        assert_eq!(kernel, BrushKernel::disk(1));
        assert!(serde_json::from_str::<BrushKernel>("[[1,1]]").is_err());
    }

    #[test]
    fn kernel_stamp_clips_at_volume_edge() {
        let brush = Brush::Kernel(BrushKernel::square(3).unwrap());
        let d = dims(4, 4, 1);
        let marked = stamped(&brush, IndexPoint::new(0, 0, 0), d, Some(SliceAxis::K));
        assert_eq!(marked, vec![0, 1, 4, 5]);
    }

    #[test]
    fn kernel_stamp_follows_slicing_axis() {
        let brush = Brush::Kernel(BrushKernel::square(3).unwrap());
        let d = dims(3, 3, 3);
        let marked = stamped(&brush, IndexPoint::new(1, 1, 1), d, Some(SliceAxis::I));
        assert_eq!(marked.len(), 9);
        assert!(marked.iter().all(|i| i % 3 == 1), "every voxel has x == 1");
    }

    #[test]
    fn unit_ellipsoid_is_a_six_neighborhood() {
        let brush = Brush::ellipsoid([1.0, 1.0, 1.0]).unwrap();
        let d = dims(5, 5, 5);
        let marked = stamped(&brush, IndexPoint::new(2, 2, 2), d, None);
        let center = d.index(2, 2, 2);
        assert_eq!(marked.len(), 7);
        assert!(marked.contains(&center));
        assert!(marked.contains(&d.index(2, 2, 1)));
        assert!(marked.contains(&d.index(1, 2, 2)));
        assert!(!marked.contains(&d.index(1, 1, 2)));
    }

    #[test]
    fn sliced_ellipsoid_stays_in_its_slice() {
        let brush = Brush::ellipsoid([1.0, 1.0, 5.0]).unwrap();
        let d = dims(5, 5, 5);
        let marked = stamped(&brush, IndexPoint::new(2, 2, 2), d, Some(SliceAxis::K));
        assert_eq!(marked.len(), 5);
        assert!(marked.iter().all(|&i| i / d.slice_len() == 2));
    }

    #[test]
    fn fractional_radius_ellipsoid_is_symmetric() {
        let brush = Brush::ellipsoid([1.6, 1.6, 1.6]).unwrap();
        let d = dims(9, 9, 1);
        let marked = stamped(&brush, IndexPoint::new(4, 4, 0), d, Some(SliceAxis::K));
        // Distance 2 lies outside a 1.6 radius on every axis.
        for (x, y) in [(6, 4), (2, 4), (4, 6), (4, 2)] {
            assert!(!marked.contains(&d.index(x, y, 0)), "({x}, {y}) is outside");
        }
        // The diagonal neighbours sit at distance sqrt(2) < 1.6.
        assert!(marked.contains(&d.index(5, 5, 0)));
        assert!(marked.contains(&d.index(3, 3, 0)));
        assert_eq!(marked.len(), 9);
    }

    #[test]
    fn ellipsoid_marks_only_voxels_inside_it() {
        let radius = [2.3, 1.7, 1.2];
        let brush = Brush::ellipsoid(radius).unwrap();
        let d = dims(11, 11, 11);
        let marked = stamped(&brush, IndexPoint::new(5, 5, 5), d, None);
        for z in 0..11_u32 {
            for y in 0..11_u32 {
                for x in 0..11_u32 {
                    let r = [x, y, z]
                        .iter()
                        .zip(radius)
                        .map(|(&v, r)| ((f64::from(v) - 5.0) / r).powi(2))
                        .sum::<f64>();
                    let index = d.index(x as usize, y as usize, z as usize);
                    assert_eq!(marked.contains(&index), r <= 1.0, "voxel ({x}, {y}, {z})");
                }
            }
        }
    }

    #[test]
    fn zero_radius_ellipsoid_marks_center_only() {
        let brush = Brush::ellipsoid([0.0, 0.0, 0.0]).unwrap();
        let d = dims(3, 3, 3);
        assert_eq!(stamped(&brush, IndexPoint::new(1, 1, 1), d, None), vec![d.index(1, 1, 1)]);
    }

    #[test]
    fn ellipsoid_outside_volume_marks_nothing() {
        let brush = Brush::ellipsoid([1.0, 1.0, 0.0]).unwrap();
        let d = dims(3, 3, 1);
        assert!(stamped(&brush, IndexPoint::new(1, 1, 4), d, Some(SliceAxis::K)).is_empty());
    }

    #[test]
    fn ellipsoid_rejects_negative_radius() {
        assert!(Brush::ellipsoid([1.0, -1.0, 1.0]).is_err());
        assert!(Brush::ellipsoid([1.0, f64::NAN, 1.0]).is_err());
    }
}
