//! Link aggregation, the contig-end graph and path stitching.

pub mod contig_graph;
pub mod link;
pub mod stitch;

pub use contig_graph::{BestCriterion, ContigGraph, ContigPath};
pub use link::{ContigLink, ContigLinks};
pub use stitch::{build_outputs, write_outputs, BridgedRecord};
