//! Integer DDA line rasterization in index space.
//!
//! Interaction widgets sample the pointer sparsely, so consecutive points
//! of a drag can be many voxels apart. [`line`] walks every lattice
//! position between two points, stepping the major axis once per step and
//! each minor axis whenever its error threshold runs out. No two
//! consecutive positions differ by more than one along any axis.

use crate::types::IndexPoint;

/// Iterator over the lattice positions of a 3-D DDA line, both endpoints
/// included.
#[derive(Debug, Clone)]
pub struct Dda {
    pt: [i64; 3],
    delta: [i64; 3],
    inc: [i64; 3],
    thresh: [i64; 3],
    step: i64,
    remaining: u64,
}

/// Walk from `from` to `to`, yielding `max(|dx|, |dy|, |dz|) + 1` positions.
#[must_use]
pub fn line(from: IndexPoint, to: IndexPoint) -> Dda {
    let a = from.to_array();
    let b = to.to_array();
    let mut delta = [0; 3];
    let mut inc = [1; 3];
    for axis in 0..3 {
        delta[axis] = b[axis] - a[axis];
        if delta[axis] < 0 {
            delta[axis] = -delta[axis];
            inc[axis] = -1;
        }
    }
    let step = delta.into_iter().max().unwrap_or(0);
    Dda {
        pt: a,
        delta,
        inc,
        thresh: [step; 3],
        step,
        remaining: step.unsigned_abs() + 1,
    }
}

impl Iterator for Dda {
    type Item = IndexPoint;

    fn next(&mut self) -> Option<IndexPoint> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let out = IndexPoint::from(self.pt);
        for axis in 0..3 {
            self.thresh[axis] -= self.delta[axis];
            if self.thresh[axis] <= 0 {
                self.thresh[axis] += self.step;
                self.pt[axis] += self.inc[axis];
            }
        }
        Some(out)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Dda {}

/// Every lattice position along a polyline through `points`.
///
/// The first point is visited once on its own; each following segment
/// skips its start point, which the previous segment already visited.
pub fn polyline(points: &[IndexPoint]) -> impl Iterator<Item = IndexPoint> + '_ {
    let first = points.first().copied();
    let segments = points
        .windows(2)
        .flat_map(|pair| line(pair[0], pair[1]).skip(1));
    first.into_iter().chain(segments)
}

/// Convenience wrapper: collect a single segment.
#[must_use]
pub fn line_points(from: IndexPoint, to: IndexPoint) -> Vec<IndexPoint> {
    line(from, to).collect()
}
