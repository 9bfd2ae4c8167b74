//! omalign core library
//!
//! Cross-correlation seeding, pairwise label alignment, segment chaining and
//! the two-pass coordinator for optical map alignment, plus CMAP/XMAP I/O.

pub mod benchmark;
pub mod chain;
pub mod cigar;
pub mod conflict;
pub mod correlate;
pub mod error;
pub mod io;
pub mod multipass;
pub mod observer;
pub mod pairs;
pub mod params;
pub mod pipeline;
pub mod record;
pub mod scoring;
pub mod segment;
pub mod stats;
pub mod types;

// Re-export commonly used types and functions
pub use correlate::{CorrelationEngine, Peak};
pub use error::{AlignError, AlignResult};
pub use multipass::{MultiPassCoordinator, OutputKind, OutputMode, OutputSet};
pub use observer::{AlignmentObserver, Pass, PipelineEvent, ProgressObserver};
pub use params::AlignmentParams;
pub use pipeline::Aligner;
pub use record::AlignmentRecord;
pub use stats::RecordStats;
pub use types::{MoleculeId, OpticalMap, Position, PositionWithSiteId, Strand};

/// Version information for the omalign core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
