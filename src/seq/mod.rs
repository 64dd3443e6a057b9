//! Sequence identifiers, contig ends and sequence areas shared by every stage
//! of the bridging pipeline.

pub mod store;

use ahash::AHashMap;
use serde::Serialize;
use std::fmt;

pub use store::SequenceStore;

/// Dense identifier of a read or contig, assigned by a [`NameTable`].
pub type SeqId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn flip(self) -> Self {
        match self {
            Strand::Forward => Strand::Reverse,
            Strand::Reverse => Strand::Forward,
        }
    }

    /// Combine two relative orientations.
    pub fn compose(self, other: Strand) -> Self {
        if self == other {
            Strand::Forward
        } else {
            Strand::Reverse
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

/// One oriented terminus of a contig, used as a graph node.
///
/// `Forward` means the contig is read in its stored orientation, so leaving
/// the node exits through the contig's tail. The two ends of a contig are
/// distinct nodes and never interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ContigEnd {
    pub id: SeqId,
    pub strand: Strand,
}

impl ContigEnd {
    pub fn new(id: SeqId, strand: Strand) -> Self {
        Self { id, strand }
    }

    pub fn forward(id: SeqId) -> Self {
        Self::new(id, Strand::Forward)
    }

    pub fn reverse(id: SeqId) -> Self {
        Self::new(id, Strand::Reverse)
    }

    /// The same contig entered from the opposite side.
    pub fn flip(self) -> Self {
        Self::new(self.id, self.strand.flip())
    }

    pub fn is_reverse(self) -> bool {
        self.strand == Strand::Reverse
    }
}

impl fmt::Display for ContigEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.id, self.strand.symbol())
    }
}

/// A span of a stored sequence, taken in the given orientation.
///
/// `start..end` are forward-strand half-open coordinates; a `Reverse` area
/// is the reverse complement of that span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SeqArea {
    pub id: SeqId,
    pub strand: Strand,
    pub start: u32,
    pub end: u32,
}

impl SeqArea {
    pub fn new(id: SeqId, strand: Strand, start: u32, end: u32) -> Self {
        Self { id, strand, start, end }
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The same bases read on the opposite strand.
    pub fn flipped(self) -> Self {
        Self { strand: self.strand.flip(), ..self }
    }
}

/// Bidirectional mapping between sequence names and [`SeqId`]s.
///
/// Overlap files and sequence files share one table so that ids agree.
#[derive(Debug, Default, Clone)]
pub struct NameTable {
    ids: AHashMap<String, SeqId>,
    names: Vec<String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `name`, assigning the next free one if unseen.
    pub fn intern(&mut self, name: &str) -> SeqId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len() as SeqId;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    pub fn get(&self, name: &str) -> Option<SeqId> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: SeqId) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SeqId, &str)> {
        self.names.iter().enumerate().map(|(i, n)| (i as SeqId, n.as_str()))
    }
}

/// Generate reverse complement of a DNA sequence
pub fn reverse_complement(sequence: &str) -> String {
    let mut result = String::with_capacity(sequence.len());

    for c in sequence.chars().rev() {
        let complement = match c {
            'A' => 'T',
            'T' => 'A',
            'G' => 'C',
            'C' => 'G',
            'a' => 't',
            't' => 'a',
            'g' => 'c',
            'c' => 'g',
            _ => c, // keep N and IUPAC codes as-is
        };
        result.push(complement);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement("ACGTN"), "NACGT");
        assert_eq!(reverse_complement("aacg"), "cgtt");
        assert_eq!(reverse_complement(""), "");
    }

    #[test]
    fn test_name_table_interning() {
        let mut names = NameTable::new();
        let a = names.intern("ctg1");
        let b = names.intern("read7");
        assert_eq!(names.intern("ctg1"), a);
        assert_ne!(a, b);
        assert_eq!(names.name(b), Some("read7"));
        assert_eq!(names.get("missing"), None);
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_contig_end_flip() {
        let end = ContigEnd::forward(3);
        assert_eq!(end.flip(), ContigEnd::reverse(3));
        assert_eq!(end.flip().flip(), end);
        assert_eq!(end.to_string(), "3+");
        assert!(ContigEnd::forward(1) < ContigEnd::reverse(1));
    }

    #[test]
    fn test_strand_compose() {
        assert_eq!(Strand::Reverse.compose(Strand::Reverse), Strand::Forward);
        assert_eq!(Strand::Forward.compose(Strand::Reverse), Strand::Reverse);
    }
}
