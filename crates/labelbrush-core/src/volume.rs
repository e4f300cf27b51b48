//! The label volume being edited and the read-only background image.
//!
//! World↔index transforms are supplied by whoever loads the volume; this
//! module only applies them. [`LabelVolume::with_geometry`] builds the
//! common axis-aligned case from spacing and origin.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, IndexPoint, Label, MaskError, WorldPoint};

/// A row-major 4×4 homogeneous transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    rows: [[f64; 4]; 4],
}

impl Transform {
    pub const IDENTITY: Self = Self {
        rows: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Wrap an explicit row-major matrix.
    #[must_use]
    pub const fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        Self { rows }
    }

    /// Per-axis scale followed by a translation: `p' = p * scale + translate`.
    #[must_use]
    pub const fn scale_translate(scale: [f64; 3], translate: [f64; 3]) -> Self {
        Self {
            rows: [
                [scale[0], 0.0, 0.0, translate[0]],
                [0.0, scale[1], 0.0, translate[1]],
                [0.0, 0.0, scale[2], translate[2]],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// The underlying row-major matrix.
    #[must_use]
    pub const fn rows(&self) -> [[f64; 4]; 4] {
        self.rows
    }

    /// Transform a point, dividing by the homogeneous coordinate when it
    /// is neither zero nor one.
    #[must_use]
    pub fn apply(&self, p: [f64; 3]) -> [f64; 3] {
        let row = |r: [f64; 4]| r[3] + r[2].mul_add(p[2], r[1].mul_add(p[1], r[0] * p[0]));
        let mut out = [row(self.rows[0]), row(self.rows[1]), row(self.rows[2])];
        let w = row(self.rows[3]);
        if w != 0.0 && (w - 1.0).abs() > f64::EPSILON {
            for v in &mut out {
                *v /= w;
            }
        }
        out
    }

    /// Transform a world point and round to the nearest lattice position.
    /// Halves round toward positive infinity (`-0.5` becomes `0`).
    #[must_use]
    pub fn to_index(&self, p: WorldPoint) -> IndexPoint {
        let [x, y, z] = self.apply(p.into());
        IndexPoint::new(round_half_up(x), round_half_up(y), round_half_up(z))
    }

    /// Transform a lattice position into world space.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_world(&self, p: IndexPoint) -> WorldPoint {
        let [x, y, z] = self.apply([p.x as f64, p.y as f64, p.z as f64]);
        WorldPoint::new(x, y, z)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn round_half_up(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// The label assignment being edited.
///
/// Owns the flat label buffer (`labels.len() == dims.voxel_count()`) and
/// the transforms between world and index space. Every mutation bumps
/// [`generation`](Self::generation) so consumers can tell when to rebuild
/// a surface or contour.
#[derive(Debug, Clone)]
pub struct LabelVolume {
    dims: Dimensions,
    spacing: [f64; 3],
    origin: [f64; 3],
    world_to_index: Transform,
    index_to_world: Transform,
    labels: Vec<Label>,
    generation: u64,
}

impl LabelVolume {
    /// Create an unlabeled volume with unit spacing at the origin.
    #[must_use]
    pub fn new(dims: Dimensions) -> Self {
        Self {
            dims,
            spacing: [1.0; 3],
            origin: [0.0; 3],
            world_to_index: Transform::IDENTITY,
            index_to_world: Transform::IDENTITY,
            labels: vec![0; dims.voxel_count()],
            generation: 0,
        }
    }

    /// Wrap an existing label buffer.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::DimensionMismatch`] if `labels` does not hold
    /// exactly one label per voxel.
    pub fn from_labels(dims: Dimensions, labels: Vec<Label>) -> Result<Self, MaskError> {
        if labels.len() != dims.voxel_count() {
            return Err(MaskError::DimensionMismatch {
                expected: dims.voxel_count(),
                actual: labels.len(),
            });
        }
        Ok(Self {
            dims,
            spacing: [1.0; 3],
            origin: [0.0; 3],
            world_to_index: Transform::IDENTITY,
            index_to_world: Transform::IDENTITY,
            labels,
            generation: 0,
        })
    }

    /// Set axis-aligned geometry and derive both transforms from it.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidSpacing`] unless every spacing component
    /// is finite and positive.
    pub fn with_geometry(mut self, spacing: [f64; 3], origin: [f64; 3]) -> Result<Self, MaskError> {
        if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(MaskError::InvalidSpacing(spacing));
        }
        let inverse = spacing.map(|s| 1.0 / s);
        let shift = [
            -origin[0] * inverse[0],
            -origin[1] * inverse[1],
            -origin[2] * inverse[2],
        ];
        self.spacing = spacing;
        self.origin = origin;
        self.world_to_index = Transform::scale_translate(inverse, shift);
        self.index_to_world = Transform::scale_translate(spacing, origin);
        Ok(self)
    }

    /// Install transforms computed elsewhere (e.g. oriented volumes).
    pub const fn set_transforms(&mut self, world_to_index: Transform, index_to_world: Transform) {
        self.world_to_index = world_to_index;
        self.index_to_world = index_to_world;
    }

    #[must_use]
    pub const fn dims(&self) -> Dimensions {
        self.dims
    }

    #[must_use]
    pub const fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    #[must_use]
    pub const fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// The flat label buffer.
    #[must_use]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Label at a flat voxel index.
    #[must_use]
    pub fn label_at(&self, index: usize) -> Option<Label> {
        self.labels.get(index).copied()
    }

    /// Nearest lattice position of a world point.
    #[must_use]
    pub fn world_to_index(&self, p: WorldPoint) -> IndexPoint {
        self.world_to_index.to_index(p)
    }

    /// World position of a lattice point.
    #[must_use]
    pub fn index_to_world(&self, p: IndexPoint) -> WorldPoint {
        self.index_to_world.to_world(p)
    }

    /// Modification counter, bumped on every committed change.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Immutable copy of the labels for sharing with a worker thread.
    #[must_use]
    pub fn snapshot(&self) -> Arc<[Label]> {
        Arc::from(self.labels.as_slice())
    }

    /// Consume the volume and return its label buffer.
    #[must_use]
    pub fn into_labels(self) -> Vec<Label> {
        self.labels
    }

    pub(crate) fn labels_mut(&mut self) -> &mut [Label] {
        &mut self.labels
    }

    pub(crate) const fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

/// The background intensity image the labels were drawn over.
#[derive(Debug, Clone)]
pub struct IntensityVolume {
    dims: Dimensions,
    samples: Vec<f32>,
}

impl IntensityVolume {
    /// Wrap a flat buffer of intensity samples.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::DimensionMismatch`] if `samples` does not hold
    /// exactly one value per voxel.
    pub fn from_samples(dims: Dimensions, samples: Vec<f32>) -> Result<Self, MaskError> {
        if samples.len() != dims.voxel_count() {
            return Err(MaskError::DimensionMismatch {
                expected: dims.voxel_count(),
                actual: samples.len(),
            });
        }
        Ok(Self { dims, samples })
    }

    #[must_use]
    pub const fn dims(&self) -> Dimensions {
        self.dims
    }

    /// Intensity at a flat voxel index.
    #[must_use]
    pub fn sample(&self, index: usize) -> Option<f32> {
        self.samples.get(index).copied()
    }
}
