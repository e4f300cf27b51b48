//! Script replay with per-step diagnostics.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::{Duration, Instant};

use labelbrush::{LabelVolume, MaskError, MaskPainter, Pending};
use serde::Serialize;
use tracing::debug;

use crate::script::{Script, ScriptOp, Step};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }
}

/// Diagnostics collected from one replay of a script.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayDiagnostics {
    /// Volume dimensions `[nx, ny, nz]`.
    pub dims: [usize; 3],
    /// One entry per script step, in order.
    pub steps: Vec<StepDiagnostics>,
    /// Wall-clock duration of the whole replay (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    pub summary: ReplaySummary,
}

/// Diagnostics for a single step.
#[derive(Debug, Clone, Serialize)]
pub struct StepDiagnostics {
    /// Wall-clock duration of this step (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    pub metrics: StepMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub enum StepMetrics {
    Stroke {
        label: u16,
        erase: bool,
        /// Operations submitted to the worker.
        operations: usize,
        /// Voxels whose label changed.
        changed_voxels: usize,
    },
    Undo {
        /// `false` when there was nothing to undo.
        applied: bool,
    },
    Redo {
        /// `false` when there was nothing to redo.
        applied: bool,
    },
}

/// Totals over a replay.
#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub voxel_count: usize,
    pub strokes: usize,
    pub changed_voxels: usize,
    /// Entries left in history at the end.
    pub history_len: usize,
    /// Position of the undo cursor at the end.
    pub undo_count: usize,
    /// Voxels holding a non-zero label at the end.
    pub labeled_voxels: usize,
}

/// Replay `script` against `volume`, returning the final painter and the
/// diagnostics.
///
/// # Errors
///
/// Returns the first error raised by the painter or reported by the
/// worker for any operation.
pub fn replay(
    script: &Script,
    volume: LabelVolume,
) -> Result<(MaskPainter, ReplayDiagnostics), MaskError> {
    let dims = volume.dims();
    let mut painter = MaskPainter::with_config(volume, script.config.clone());
    let mut steps = Vec::with_capacity(script.steps.len());
    let started = Instant::now();

    for (n, step) in script.steps.iter().enumerate() {
        let t = Instant::now();
        let metrics = match step {
            Step::Stroke {
                label,
                erase,
                label_constraint,
                ops,
            } => {
                painter.set_label(*label);
                painter.set_label_constraint(*label_constraint);
                painter.start_stroke()?;
                let pending: Vec<Pending<()>> =
                    ops.iter().filter_map(|op| submit(&mut painter, op)).collect();
                let changed = painter.end_stroke(*erase)?.unwrap_or(0);
                for p in pending {
                    p.wait()?;
                }
                StepMetrics::Stroke {
                    label: *label,
                    erase: *erase,
                    operations: ops.len(),
                    changed_voxels: changed,
                }
            }
            Step::Undo => StepMetrics::Undo {
                applied: painter.undo(),
            },
            Step::Redo => StepMetrics::Redo {
                applied: painter.redo(),
            },
        };
        let duration = t.elapsed();
        debug!(step = n, ?metrics, ?duration, "replayed step");
        steps.push(StepDiagnostics { duration, metrics });
    }

    let summary = ReplaySummary {
        voxel_count: dims.voxel_count(),
        strokes: steps
            .iter()
            .filter(|s| matches!(s.metrics, StepMetrics::Stroke { .. }))
            .count(),
        changed_voxels: steps
            .iter()
            .map(|s| match s.metrics {
                StepMetrics::Stroke { changed_voxels, .. } => changed_voxels,
                _ => 0,
            })
            .sum(),
        history_len: painter.history().entries().len(),
        undo_count: painter.history().undo_count(),
        labeled_voxels: painter.volume().labels().iter().filter(|&&l| l != 0).count(),
    };

    let diagnostics = ReplayDiagnostics {
        dims: dims.to_array(),
        steps,
        total_duration: started.elapsed(),
        summary,
    };
    Ok((painter, diagnostics))
}

fn submit(painter: &mut MaskPainter, op: &ScriptOp) -> Option<Pending<()>> {
    match op {
        ScriptOp::Paint { points, brush } => painter.paint(points, brush),
        ScriptOp::PaintFloodFill { points, brush } => painter.paint_flood_fill(points, brush),
        ScriptOp::Erase { points, brush } => painter.erase(points, brush),
        ScriptOp::Crop { p1, p2 } => painter.crop(*p1, *p2),
        ScriptOp::Split {
            split_label,
            slice_index,
        } => painter.split(*split_label, *slice_index),
        ScriptOp::Merge { merge_label } => painter.merge(*merge_label),
        ScriptOp::Delete => painter.delete_region(),
    }
}

impl ReplayDiagnostics {
    /// Format a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Replay Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Volume: {}x{}x{} ({} voxels)",
            self.dims[0], self.dims[1], self.dims[2], self.summary.voxel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!("{:<6} {:<8} {:>10}  {}", "Step", "Kind", "Duration", "Details"));
        lines.push("-".repeat(60));

        for (n, step) in self.steps.iter().enumerate() {
            let ms = duration_ms(step.duration);
            let (kind, details) = match &step.metrics {
                StepMetrics::Stroke {
                    label,
                    erase,
                    operations,
                    changed_voxels,
                } => (
                    if *erase { "erase" } else { "stroke" },
                    format!("label={label} ops={operations} changed={changed_voxels}"),
                ),
                StepMetrics::Undo { applied } => ("undo", format!("applied={applied}")),
                StepMetrics::Redo { applied } => ("redo", format!("applied={applied}")),
            };
            lines.push(format!("{n:<6} {kind:<8} {ms:>8.3}ms  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Strokes: {}  |  Changed voxels: {}  |  History: {} ({} applied)  |  Labeled: {}",
            self.summary.strokes,
            self.summary.changed_voxels,
            self.summary.history_len,
            self.summary.undo_count,
            self.summary.labeled_voxels,
        ));

        lines.join("\n")
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
