//! Pipeline module - the contig bridging run

pub mod bridge;

pub use bridge::{select_thresholds, ContigBridge, OverlapKind, SelectedThresholds};
