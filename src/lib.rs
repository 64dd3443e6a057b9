//! Bridges genome-assembly contigs into longer sequences using read-to-contig
//! and contig-to-contig overlaps.

pub mod config;
pub mod error;
pub mod graph;
pub mod io;
pub mod overlap;
pub mod pipeline;
pub mod seq;
pub mod stats;

pub use config::{BranchPolicy, BridgeConfig, LengthMismatchPolicy, LinkConfig};
pub use error::{BridgeError, Result};
