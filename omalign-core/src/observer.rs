//! Hooks for diagnostics and progress reporting.

use serde::Serialize;

use crate::correlate::Peak;
use crate::types::{MoleculeId, Strand};

/// Which pass of the coordinator produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    First,
    Second,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    InitialPeaks {
        reference_id: MoleculeId,
        query_id: MoleculeId,
        strand: Strand,
        peaks: Vec<Peak>,
        max_value: f64,
        noise_level: f64,
    },
    RefinedPeak {
        reference_id: MoleculeId,
        query_id: MoleculeId,
        strand: Strand,
        seed: Peak,
        refined: Option<Peak>,
    },
    Record {
        pass: Pass,
        reference_id: MoleculeId,
        query_id: MoleculeId,
        strand: Strand,
        confidence: f64,
        segments: usize,
        hit_enum: String,
    },
}

/// Receives every pipeline event. Called from worker threads.
pub trait AlignmentObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Called once per finished query task, from worker threads.
pub trait ProgressObserver: Sync {
    fn on_start(&self, _total: usize) {}
    fn on_task_complete(&self);
    fn on_finish(&self) {}
}
