//! Shared types for the labelbrush editing engine.

use serde::{Deserialize, Serialize};

/// A voxel label. `0` means unlabeled.
pub type Label = u16;

/// Volume dimensions in voxels.
///
/// Serialized as an `[nx, ny, nz]` array. Every axis is non-zero and the
/// voxel count fits in `usize`; both are checked on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[usize; 3]", into = "[usize; 3]")]
pub struct Dimensions {
    nx: usize,
    ny: usize,
    nz: usize,
}

impl Dimensions {
    /// Create dimensions for an `nx * ny * nz` volume.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::InvalidDimensions`] if any axis is zero or the
    /// voxel count overflows `usize`.
    pub fn new(nx: usize, ny: usize, nz: usize) -> Result<Self, MaskError> {
        let valid = nx > 0
            && ny > 0
            && nz > 0
            && nx.checked_mul(ny).and_then(|s| s.checked_mul(nz)).is_some();
        if valid {
            Ok(Self { nx, ny, nz })
        } else {
            Err(MaskError::InvalidDimensions([nx, ny, nz]))
        }
    }

    /// Extent along the x axis.
    #[must_use]
    pub const fn nx(self) -> usize {
        self.nx
    }

    /// Extent along the y axis.
    #[must_use]
    pub const fn ny(self) -> usize {
        self.ny
    }

    /// Extent along the z axis.
    #[must_use]
    pub const fn nz(self) -> usize {
        self.nz
    }

    /// Extents as `[nx, ny, nz]`.
    #[must_use]
    pub const fn to_array(self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    /// Total number of voxels.
    #[must_use]
    pub const fn voxel_count(self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Number of voxels in one z slice.
    #[must_use]
    pub const fn slice_len(self) -> usize {
        self.nx * self.ny
    }

    /// Flat index of an in-bounds voxel (x fastest, then y, then z).
    #[must_use]
    pub const fn index(self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.nx + z * self.nx * self.ny
    }

    /// Flat index of a lattice point, or `None` if it lies outside the volume.
    #[must_use]
    pub fn index_of(self, p: IndexPoint) -> Option<usize> {
        let x = usize::try_from(p.x).ok().filter(|&x| x < self.nx)?;
        let y = usize::try_from(p.y).ok().filter(|&y| y < self.ny)?;
        let z = usize::try_from(p.z).ok().filter(|&z| z < self.nz)?;
        Some(self.index(x, y, z))
    }

    /// Returns `true` if the lattice point lies inside the volume.
    #[must_use]
    pub fn contains(self, p: IndexPoint) -> bool {
        self.index_of(p).is_some()
    }
}

impl TryFrom<[usize; 3]> for Dimensions {
    type Error = MaskError;

    fn try_from([nx, ny, nz]: [usize; 3]) -> Result<Self, Self::Error> {
        Self::new(nx, ny, nz)
    }
}

impl From<Dimensions> for [usize; 3] {
    fn from(dims: Dimensions) -> Self {
        dims.to_array()
    }
}

/// A lattice position in index (IJK) space.
///
/// Signed so that brush offsets and DDA steps can leave the volume; callers
/// clip through [`Dimensions::index_of`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i64; 3]", into = "[i64; 3]")]
pub struct IndexPoint {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl IndexPoint {
    /// Create a new lattice point.
    #[must_use]
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Coordinates as `[x, y, z]`.
    #[must_use]
    pub const fn to_array(self) -> [i64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[i64; 3]> for IndexPoint {
    fn from([x, y, z]: [i64; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<IndexPoint> for [i64; 3] {
    fn from(p: IndexPoint) -> Self {
        p.to_array()
    }
}

/// A point in world space, as sampled by an interaction widget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl WorldPoint {
    /// Create a new world point.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl From<[f64; 3]> for WorldPoint {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<WorldPoint> for [f64; 3] {
    fn from(p: WorldPoint) -> Self {
        [p.x, p.y, p.z]
    }
}

/// Element type of a stroke's scratch buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScratchType {
    /// One byte per voxel.
    #[default]
    U8,
    /// Two bytes per voxel, matching the label width.
    U16,
}

/// The axis orthogonal to the slice being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceAxis {
    /// Slices of constant x.
    I,
    /// Slices of constant y.
    J,
    /// Slices of constant z.
    K,
}

impl SliceAxis {
    /// Coordinate index of this axis (`0`, `1` or `2`).
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::I => 0,
            Self::J => 1,
            Self::K => 2,
        }
    }

    /// The two in-plane axes as `(column_axis, row_axis)`.
    #[must_use]
    pub const fn plane_axes(self) -> (usize, usize) {
        match self {
            Self::I => (1, 2),
            Self::J => (0, 2),
            Self::K => (0, 1),
        }
    }
}

/// Inclusive background-intensity window for threshold-constrained painting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntensityRange {
    /// Lowest accepted intensity.
    pub lower: f32,
    /// Highest accepted intensity.
    pub upper: f32,
}

impl IntensityRange {
    /// Returns `true` if `value` lies within `[lower, upper]`.
    #[must_use]
    pub fn contains(self, value: f32) -> bool {
        (self.lower..=self.upper).contains(&value)
    }
}

/// Configuration for a mask painter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PainterConfig {
    /// Element type of each stroke's scratch buffer.
    pub scratch_type: ScratchType,

    /// Axis orthogonal to the edited slice. Planar brushes lie in that
    /// slice and ellipsoid brushes are flattened onto it. `None` paints
    /// ellipsoids in full 3-D.
    pub slicing_mode: Option<SliceAxis>,

    /// Only commit painted voxels whose background intensity falls in
    /// this window. Requires a background image on the painter.
    pub threshold: Option<IntensityRange>,
}

impl PainterConfig {
    pub const DEFAULT_SCRATCH_TYPE: ScratchType = ScratchType::U8;
    pub const DEFAULT_SLICING_MODE: Option<SliceAxis> = Some(SliceAxis::K);
}

impl Default for PainterConfig {
    fn default() -> Self {
        Self {
            scratch_type: Self::DEFAULT_SCRATCH_TYPE,
            slicing_mode: Self::DEFAULT_SLICING_MODE,
            threshold: None,
        }
    }
}

/// Errors raised by the editing engine.
#[derive(Debug, thiserror::Error)]
pub enum MaskError {
    /// Volume dimensions are zero along some axis or overflow `usize`.
    #[error("invalid volume dimensions {0:?}")]
    InvalidDimensions([usize; 3]),

    /// A buffer does not match the volume it is used with.
    #[error("buffer has {actual} voxels but the volume has {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Voxel spacing must be finite and positive on every axis.
    #[error("invalid voxel spacing {0:?}")]
    InvalidSpacing([f64; 3]),

    /// A brush shape is unusable.
    #[error("invalid brush: {0}")]
    InvalidBrush(String),

    /// A stroke operation reached a worker that was never started.
    #[error("stroke worker has not been started")]
    NotStarted,

    /// The worker thread could not be spawned.
    #[error("failed to spawn stroke worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// The worker went away before answering a request.
    #[error("stroke worker disconnected before replying")]
    WorkerDisconnected,
}
