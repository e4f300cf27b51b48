//! Edit scripts: a starting volume plus a sequence of strokes, undos and
//! redos, stored as JSON.
//!
//! ```json
//! {
//!   "dims": [64, 64, 8],
//!   "spacing": [0.5, 0.5, 2.0],
//!   "config": { "slicing_mode": "K" },
//!   "seed": [{ "at": [10, 10, 0], "label": 3 }],
//!   "steps": [
//!     { "step": "stroke", "label": 2, "ops": [
//!       { "op": "paint_flood_fill",
//!         "points": [[1, 1, 0], [20, 1, 0], [20, 20, 0], [1, 1, 0]],
//!         "brush": { "kernel": [[1]] } }
//!     ] },
//!     { "step": "undo" },
//!     { "step": "redo" }
//!   ]
//! }
//! ```
//!
//! Points are in world space and go through the volume's transform.

use std::path::Path;

use labelbrush::{Brush, Dimensions, IndexPoint, Label, LabelVolume, PainterConfig, WorldPoint};
use serde::Deserialize;

/// A complete edit script.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    pub dims: Dimensions,
    #[serde(default = "unit_spacing")]
    pub spacing: [f64; 3],
    #[serde(default)]
    pub origin: [f64; 3],
    #[serde(default)]
    pub config: PainterConfig,
    /// Labels present before the first step.
    #[serde(default)]
    pub seed: Vec<SeedVoxel>,
    pub steps: Vec<Step>,
}

const fn unit_spacing() -> [f64; 3] {
    [1.0; 3]
}

/// One pre-labeled voxel.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SeedVoxel {
    pub at: IndexPoint,
    pub label: Label,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Stroke {
        label: Label,
        #[serde(default)]
        erase: bool,
        #[serde(default)]
        label_constraint: Option<Label>,
        ops: Vec<ScriptOp>,
    },
    Undo,
    Redo,
}

/// An operation inside a stroke.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptOp {
    Paint {
        points: Vec<WorldPoint>,
        brush: Brush,
    },
    PaintFloodFill {
        points: Vec<WorldPoint>,
        brush: Brush,
    },
    Erase {
        points: Vec<WorldPoint>,
        brush: Brush,
    },
    Crop {
        p1: WorldPoint,
        p2: WorldPoint,
    },
    Split {
        split_label: Label,
        slice_index: usize,
    },
    Merge {
        merge_label: Label,
    },
    Delete,
}

impl Script {
    /// Read and parse a script file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
        Self::parse(&text).map_err(|e| format!("Error parsing {}: {e}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Build the starting volume: geometry plus seed labels.
    pub fn build_volume(&self) -> Result<LabelVolume, String> {
        let mut labels = vec![0; self.dims.voxel_count()];
        for seed in &self.seed {
            let index = self.dims.index_of(seed.at).ok_or_else(|| {
                format!(
                    "seed voxel {:?} lies outside a {:?} volume",
                    seed.at.to_array(),
                    self.dims.to_array()
                )
            })?;
            labels[index] = seed.label;
        }
        LabelVolume::from_labels(self.dims, labels)
            .and_then(|v| v.with_geometry(self.spacing, self.origin))
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use labelbrush::SliceAxis;

    use super::*;

    const EXAMPLE: &str = r#"{
        "dims": [4, 4, 2],
        "spacing": [2.0, 2.0, 1.0],
        "config": { "slicing_mode": "J", "scratch_type": "u16" },
        "seed": [{ "at": [1, 2, 1], "label": 3 }],
        "steps": [
            { "step": "stroke", "label": 2, "erase": true, "ops": [
                { "op": "paint", "points": [[0, 0, 0]], "brush": { "kernel": [[1]] } },
                { "op": "crop", "p1": [0, 0, 0], "p2": [2, 2, 0] },
                { "op": "split", "split_label": 3, "slice_index": 1 },
                { "op": "delete" }
            ] },
            { "step": "undo" },
            { "step": "redo" }
        ]
    }"#;

    #[test]
    fn parses_full_script() {
        let script = Script::parse(EXAMPLE).unwrap();
        assert_eq!(script.dims.to_array(), [4, 4, 2]);
        assert_eq!(script.origin, [0.0; 3]);
        assert_eq!(script.config.slicing_mode, Some(SliceAxis::J));
        assert_eq!(script.steps.len(), 3);
        assert!(matches!(
            &script.steps[0],
            Step::Stroke { label: 2, erase: true, ops, .. } if ops.len() == 4
        ));
        assert!(matches!(script.steps[1], Step::Undo));
    }

    #[test]
    fn seeds_land_in_the_volume() {
        let volume = Script::parse(EXAMPLE).unwrap().build_volume().unwrap();
        let dims = volume.dims();
        assert_eq!(volume.label_at(dims.index(1, 2, 1)), Some(3));
        assert_eq!(volume.labels().iter().filter(|&&l| l != 0).count(), 1);
        assert_eq!(volume.spacing(), [2.0, 2.0, 1.0]);
    }

    #[test]
    fn seed_outside_volume_is_rejected() {
        let script = Script::parse(
            r#"{ "dims": [2, 2, 1], "seed": [{ "at": [2, 0, 0], "label": 1 }], "steps": [] }"#,
        )
        .unwrap();
        assert!(script.build_volume().is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Script::parse(r#"{ "dims": [1, 1, 1], "steps": [], "extra": 1 }"#).is_err());
    }
}
