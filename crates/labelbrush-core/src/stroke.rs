//! The per-stroke scratch buffer and the operations that mark it.
//!
//! A [`StrokeBuffer`] has the same shape as the label volume and holds a
//! 0/1 mark per voxel. Stroke operations only ever write marks; turning
//! marks into labels is [`crate::apply_binary_mask`]'s job.
//!
//! Slice-based operations (flood fill, crop, split) work on slices
//! orthogonal to the slicing axis, K (constant z) unless told otherwise.

use crate::brush::Brush;
use crate::flood::scanline_fill;
use crate::raster::polyline;
use crate::types::{Dimensions, IndexPoint, Label, MaskError, ScratchType, SliceAxis};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Scratch {
    U8(Vec<u8>),
    U16(Vec<u16>),
}

/// A zero-initialized mark buffer sized to a volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrokeBuffer {
    dims: Dimensions,
    scratch: Scratch,
}

impl StrokeBuffer {
    /// Allocate an unmarked buffer.
    #[must_use]
    pub fn new(dims: Dimensions, scratch_type: ScratchType) -> Self {
        let n = dims.voxel_count();
        let scratch = match scratch_type {
            ScratchType::U8 => Scratch::U8(vec![0; n]),
            ScratchType::U16 => Scratch::U16(vec![0; n]),
        };
        Self { dims, scratch }
    }

    #[must_use]
    pub const fn dims(&self) -> Dimensions {
        self.dims
    }

    #[must_use]
    pub const fn scratch_type(&self) -> ScratchType {
        match self.scratch {
            Scratch::U8(_) => ScratchType::U8,
            Scratch::U16(_) => ScratchType::U16,
        }
    }

    /// Number of voxels covered.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.dims.voxel_count()
    }

    /// Always `false`: dimensions are never zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Whether voxel `index` is marked. Out-of-range indices are unmarked.
    #[must_use]
    pub fn is_marked(&self, index: usize) -> bool {
        match &self.scratch {
            Scratch::U8(v) => v.get(index).is_some_and(|&m| m != 0),
            Scratch::U16(v) => v.get(index).is_some_and(|&m| m != 0),
        }
    }

    /// Set or clear the mark on voxel `index`. Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, marked: bool) {
        match &mut self.scratch {
            Scratch::U8(v) => {
                if let Some(m) = v.get_mut(index) {
                    *m = u8::from(marked);
                }
            }
            Scratch::U16(v) => {
                if let Some(m) = v.get_mut(index) {
                    *m = u16::from(marked);
                }
            }
        }
    }

    /// Mark voxel `index`.
    pub fn mark(&mut self, index: usize) {
        self.set(index, true);
    }

    /// Set or clear every mark.
    pub fn fill(&mut self, marked: bool) {
        match &mut self.scratch {
            Scratch::U8(v) => v.fill(u8::from(marked)),
            Scratch::U16(v) => v.fill(u16::from(marked)),
        }
    }

    /// Number of marked voxels.
    #[must_use]
    pub fn marked_count(&self) -> usize {
        match &self.scratch {
            Scratch::U8(v) => v.iter().filter(|&&m| m != 0).count(),
            Scratch::U16(v) => v.iter().filter(|&&m| m != 0).count(),
        }
    }

    /// Flat indices of all marked voxels, ascending.
    pub fn marked_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter(|&i| self.is_marked(i))
    }

    // ─────────────────────────── stroke operations ───────────────────────────

    /// Stamp `brush` at every lattice position along the polyline through
    /// `points`.
    pub fn paint(&mut self, points: &[IndexPoint], brush: &Brush, slicing: Option<SliceAxis>) {
        let dims = self.dims;
        for center in polyline(points) {
            brush.stamp(center, dims, slicing, |i| self.mark(i));
        }
    }

    /// Paint a closed free-hand outline of `label` and fill its interior.
    ///
    /// 1. Reseed the buffer with every voxel currently holding `label`.
    /// 2. Paint the outline with `brush`.
    /// 3. On the slice of the first point, flood the outside from the first
    ///    unmarked voxel outside the points' bounding box and mark
    ///    everything the flood did not reach.
    /// 4. With `label_constraint`, keep only marks on that slice whose
    ///    voxel currently holds the constraint label.
    ///
    /// If no seed exists the buffer keeps just the seeded and painted marks.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::DimensionMismatch`] if `labels` is not the
    /// size of the buffer.
    pub fn paint_flood_fill(
        &mut self,
        labels: &[Label],
        label: Label,
        label_constraint: Option<Label>,
        points: &[IndexPoint],
        brush: &Brush,
        slicing: Option<SliceAxis>,
    ) -> Result<(), MaskError> {
        self.check_labels(labels)?;
        let Some(&first) = points.first() else {
            return Ok(());
        };

        for (i, &l) in labels.iter().enumerate() {
            self.set(i, l == label);
        }
        self.paint(points, brush, slicing);

        let Some(plane) = Plane::new(self.dims, slicing, first) else {
            return Ok(());
        };

        let mut grid = vec![0u8; plane.width * plane.height];
        for v in 0..plane.height {
            for u in 0..plane.width {
                grid[u + v * plane.width] = u8::from(self.is_marked(plane.index(u, v)));
            }
        }

        let bounds = plane.bounds(points);
        let Some(seed) = find_seed(&grid, &plane, bounds) else {
            return Ok(());
        };
        scanline_fill(&mut grid, plane.width, plane.height, seed);

        for v in 0..plane.height {
            for u in 0..plane.width {
                if grid[u + v * plane.width] == 0 {
                    self.mark(plane.index(u, v));
                }
            }
        }

        if let Some(constraint) = label_constraint {
            for v in 0..plane.height {
                for u in 0..plane.width {
                    let i = plane.index(u, v);
                    let keep = self.is_marked(i) && labels[i] == constraint;
                    self.set(i, keep);
                }
            }
        }
        Ok(())
    }

    /// Mark the rectangle spanned by `p1` and `p2` on the slice of `p1`.
    pub fn crop(&mut self, p1: IndexPoint, p2: IndexPoint, slicing: Option<SliceAxis>) {
        let Some(plane) = Plane::new(self.dims, slicing, p1) else {
            return;
        };
        let a = p1.to_array();
        let b = p2.to_array();
        let Some((u0, u1)) = clamp_span(a[plane.col], b[plane.col], plane.width) else {
            return;
        };
        let Some((v0, v1)) = clamp_span(a[plane.row], b[plane.row], plane.height) else {
            return;
        };
        for v in v0..=v1 {
            for u in u0..=u1 {
                self.mark(plane.index(u, v));
            }
        }
    }

    /// Mark every voxel holding `split_label` on slices at or beyond
    /// `slice_index` along the slicing axis.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::DimensionMismatch`] if `labels` is not the
    /// size of the buffer.
    pub fn split(
        &mut self,
        labels: &[Label],
        split_label: Label,
        slice_index: usize,
        slicing: Option<SliceAxis>,
    ) -> Result<(), MaskError> {
        self.check_labels(labels)?;
        let axis = slicing.unwrap_or(SliceAxis::K).index();
        let [nx, ny, _] = self.dims.to_array();
        for (i, &l) in labels.iter().enumerate() {
            let coord = [i % nx, (i / nx) % ny, i / (nx * ny)];
            if l == split_label && coord[axis] >= slice_index {
                self.mark(i);
            }
        }
        Ok(())
    }

    /// Mark every voxel holding `merge_label`.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::DimensionMismatch`] if `labels` is not the
    /// size of the buffer.
    pub fn merge(&mut self, labels: &[Label], merge_label: Label) -> Result<(), MaskError> {
        self.check_labels(labels)?;
        for (i, &l) in labels.iter().enumerate() {
            if l == merge_label {
                self.mark(i);
            }
        }
        Ok(())
    }

    /// Mark the whole buffer.
    pub fn delete(&mut self) {
        self.fill(true);
    }

    fn check_labels(&self, labels: &[Label]) -> Result<(), MaskError> {
        if labels.len() == self.len() {
            Ok(())
        } else {
            Err(MaskError::DimensionMismatch {
                expected: self.len(),
                actual: labels.len(),
            })
        }
    }
}

/// One slice of the volume, addressed by in-plane `(u, v)` coordinates.
struct Plane {
    dims: Dimensions,
    axis: usize,
    slice: usize,
    col: usize,
    row: usize,
    width: usize,
    height: usize,
}

impl Plane {
    /// The slice through `at`, or `None` if `at` lies outside the volume
    /// along the slicing axis.
    fn new(dims: Dimensions, slicing: Option<SliceAxis>, at: IndexPoint) -> Option<Self> {
        let axis = slicing.unwrap_or(SliceAxis::K);
        let (col, row) = axis.plane_axes();
        let ext = dims.to_array();
        let slice = usize::try_from(at.to_array()[axis.index()])
            .ok()
            .filter(|&s| s < ext[axis.index()])?;
        Some(Self {
            dims,
            axis: axis.index(),
            slice,
            col,
            row,
            width: ext[col],
            height: ext[row],
        })
    }

    fn index(&self, u: usize, v: usize) -> usize {
        let mut c = [0; 3];
        c[self.axis] = self.slice;
        c[self.col] = u;
        c[self.row] = v;
        self.dims.index(c[0], c[1], c[2])
    }

    /// In-plane bounding box `(umin, umax, vmin, vmax)` of the points.
    fn bounds(&self, points: &[IndexPoint]) -> (i64, i64, i64, i64) {
        points.iter().fold(
            (i64::MAX, i64::MIN, i64::MAX, i64::MIN),
            |(umin, umax, vmin, vmax), p| {
                let a = p.to_array();
                (
                    umin.min(a[self.col]),
                    umax.max(a[self.col]),
                    vmin.min(a[self.row]),
                    vmax.max(a[self.row]),
                )
            },
        )
    }
}

/// First unmarked cell outside `bounds`, scanning columns then rows.
#[allow(clippy::cast_possible_wrap)]
fn find_seed(grid: &[u8], plane: &Plane, bounds: (i64, i64, i64, i64)) -> Option<(usize, usize)> {
    let (umin, umax, vmin, vmax) = bounds;
    (0..plane.width)
        .flat_map(|u| (0..plane.height).map(move |v| (u, v)))
        .find(|&(u, v)| {
            let (su, sv) = (u as i64, v as i64);
            let outside = su < umin || su > umax || sv < vmin || sv > vmax;
            outside && grid[u + v * plane.width] == 0
        })
}

/// Order two coordinates and clamp them to `[0, extent - 1]`, or `None` if
/// the span misses the range entirely.
fn clamp_span(a: i64, b: i64, extent: usize) -> Option<(usize, usize)> {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let last = i64::try_from(extent).ok()? - 1;
    if hi < 0 || lo > last {
        return None;
    }
    let lo = usize::try_from(lo.max(0)).ok()?;
    let hi = usize::try_from(hi.min(last)).ok()?;
    Some((lo, hi))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::brush::BrushKernel;

    fn dims(nx: usize, ny: usize, nz: usize) -> Dimensions {
        Dimensions::new(nx, ny, nz).unwrap()
    }

    fn p(x: i64, y: i64, z: i64) -> IndexPoint {
        IndexPoint::new(x, y, z)
    }

    fn dot() -> Brush {
        Brush::Kernel(BrushKernel::square(1).unwrap())
    }

    fn marked(buffer: &StrokeBuffer) -> Vec<usize> {
        buffer.marked_indices().collect()
    }

    #[test]
    fn new_buffer_is_unmarked() {
        for scratch in [ScratchType::U8, ScratchType::U16] {
            let buffer = StrokeBuffer::new(dims(3, 3, 2), scratch);
            assert_eq!(buffer.len(), 18);
            assert_eq!(buffer.marked_count(), 0);
            assert_eq!(buffer.scratch_type(), scratch);
        }
    }

    #[test]
    fn set_ignores_out_of_range() {
        let mut buffer = StrokeBuffer::new(dims(2, 2, 1), ScratchType::U16);
        buffer.mark(7);
        assert_eq!(buffer.marked_count(), 0);
        assert!(!buffer.is_marked(7));
    }

    #[test]
    fn paint_connects_distant_samples() {
        let d = dims(8, 4, 1);
        let mut buffer = StrokeBuffer::new(d, ScratchType::U8);
        buffer.paint(&[p(0, 1, 0), p(7, 1, 0)], &dot(), None);
        assert_eq!(marked(&buffer), (0..8).map(|x| d.index(x, 1, 0)).collect::<Vec<_>>());
    }

    #[test]
    fn paint_with_no_points_marks_nothing() {
        let mut buffer = StrokeBuffer::new(dims(4, 4, 1), ScratchType::U8);
        buffer.paint(&[], &dot(), None);
        assert_eq!(buffer.marked_count(), 0);
    }

    #[test]
    fn flood_fill_of_existing_square() {
        // 4x4x1 with label 1 on the 2x2 center block.
        let d = dims(4, 4, 1);
        let mut labels = vec![0; 16];
        for (x, y) in [(1, 1), (1, 2), (2, 1), (2, 2)] {
            labels[d.index(x, y, 0)] = 1;
        }
        let mut buffer = StrokeBuffer::new(d, ScratchType::U8);
        buffer
            .paint_flood_fill(&labels, 1, None, &[p(1, 1, 0), p(2, 2, 0)], &dot(), None)
            .unwrap();
        assert_eq!(marked(&buffer), vec![5, 6, 9, 10]);
    }

    #[test]
    fn flood_fill_closes_a_drawn_loop() {
        let d = dims(7, 7, 1);
        let labels = vec![0; 49];
        let outline = [p(1, 1, 0), p(5, 1, 0), p(5, 5, 0), p(1, 5, 0), p(1, 1, 0)];
        let mut buffer = StrokeBuffer::new(d, ScratchType::U8);
        buffer
            .paint_flood_fill(&labels, 1, None, &outline, &dot(), None)
            .unwrap();
        for y in 0..7 {
            for x in 0..7 {
                let inside = (1..=5).contains(&x) && (1..=5).contains(&y);
                assert_eq!(buffer.is_marked(d.index(x, y, 0)), inside, "voxel ({x}, {y})");
            }
        }
    }

    #[test]
    fn flood_fill_only_touches_the_first_points_slice() {
        let d = dims(5, 5, 2);
        let labels = vec![0; 50];
        let outline = [p(1, 1, 1), p(3, 1, 1), p(3, 3, 1), p(1, 3, 1), p(1, 1, 1)];
        let mut buffer = StrokeBuffer::new(d, ScratchType::U8);
        buffer
            .paint_flood_fill(&labels, 1, None, &outline, &dot(), None)
            .unwrap();
        assert_eq!(buffer.marked_count(), 9);
        assert!(buffer.marked_indices().all(|i| i >= d.slice_len()));
    }

    #[test]
    fn flood_fill_reseeds_from_target_label_only() {
        let d = dims(4, 4, 1);
        let mut labels = vec![0; 16];
        labels[0] = 2;
        labels[15] = 1;
        let mut buffer = StrokeBuffer::new(d, ScratchType::U8);
        buffer.mark(5);
        buffer
            .paint_flood_fill(&labels, 1, None, &[p(1, 2, 0)], &dot(), None)
            .unwrap();
        assert!(buffer.is_marked(15), "existing voxels of the label are kept");
        assert!(buffer.is_marked(d.index(1, 2, 0)));
        assert!(!buffer.is_marked(0), "other labels are not seeded");
        assert!(!buffer.is_marked(5), "earlier marks are replaced by the reseed");
    }

    #[test]
    fn flood_fill_without_seed_keeps_painted_marks() {
        let d = dims(3, 3, 1);
        let labels = vec![0; 9];
        let mut buffer = StrokeBuffer::new(d, ScratchType::U8);
        buffer
            .paint_flood_fill(&labels, 1, None, &[p(0, 0, 0), p(2, 2, 0)], &dot(), None)
            .unwrap();
        assert_eq!(marked(&buffer), vec![0, 4, 8]);
    }

    #[test]
    fn flood_fill_label_constraint_limits_to_matching_voxels() {
        let d = dims(7, 7, 1);
        let mut labels = vec![0; 49];
        labels[d.index(3, 3, 0)] = 2;
        labels[d.index(1, 1, 0)] = 2;
        let outline = [p(1, 1, 0), p(5, 1, 0), p(5, 5, 0), p(1, 5, 0), p(1, 1, 0)];
        let mut buffer = StrokeBuffer::new(d, ScratchType::U8);
        buffer
            .paint_flood_fill(&labels, 1, Some(0), &outline, &dot(), None)
            .unwrap();
        assert_eq!(buffer.marked_count(), 23);
        assert!(!buffer.is_marked(d.index(3, 3, 0)));
        assert!(!buffer.is_marked(d.index(1, 1, 0)));
        assert!(buffer.is_marked(d.index(2, 2, 0)));
    }

    #[test]
    fn flood_fill_rejects_wrong_label_length() {
        let mut buffer = StrokeBuffer::new(dims(2, 2, 1), ScratchType::U8);
        let err = buffer
            .paint_flood_fill(&[0; 3], 1, None, &[p(0, 0, 0)], &dot(), None)
            .unwrap_err();
        assert!(matches!(err, MaskError::DimensionMismatch { expected: 4, actual: 3 }));
    }

    #[test]
    fn crop_marks_normalized_clipped_rectangle() {
        let d = dims(4, 4, 2);
        let mut buffer = StrokeBuffer::new(d, ScratchType::U8);
        buffer.crop(p(2, 5, 1), p(-3, 2, 1), None);
        let expected: Vec<usize> = [(0, 2), (1, 2), (2, 2), (0, 3), (1, 3), (2, 3)]
            .iter()
            .map(|&(x, y)| d.index(x, y, 1))
            .collect();
        assert_eq!(marked(&buffer), expected);
    }

    #[test]
    fn crop_off_volume_is_a_no_op() {
        let mut buffer = StrokeBuffer::new(dims(4, 4, 1), ScratchType::U8);
        buffer.crop(p(0, 0, 3), p(2, 2, 3), None);
        buffer.crop(p(5, 0, 0), p(9, 2, 0), None);
        assert_eq!(buffer.marked_count(), 0);
    }

    #[test]
    fn split_marks_label_from_slice_onward() {
        let d = dims(2, 1, 4);
        let labels = vec![3, 1, 3, 3, 3, 0, 3, 3];
        let mut buffer = StrokeBuffer::new(d, ScratchType::U8);
        buffer.split(&labels, 3, 2, None).unwrap();
        assert_eq!(marked(&buffer), vec![4, 6, 7]);
    }

    #[test]
    fn merge_ors_into_existing_marks() {
        let labels = vec![0, 5, 5, 2];
        let mut buffer = StrokeBuffer::new(dims(4, 1, 1), ScratchType::U8);
        buffer.mark(0);
        buffer.merge(&labels, 5).unwrap();
        assert_eq!(marked(&buffer), vec![0, 1, 2]);
    }

    #[test]
    fn delete_marks_everything() {
        let mut buffer = StrokeBuffer::new(dims(3, 2, 2), ScratchType::U16);
        buffer.delete();
        assert_eq!(buffer.marked_count(), 12);
    }
}
