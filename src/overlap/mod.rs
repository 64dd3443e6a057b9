//! Overlap records (pre-computed alignments between two sequences) and the
//! geometry derived from them.

pub mod parse;
pub mod store;

use crate::seq::{SeqId, Strand};

pub use parse::OverlapFormat;
pub use store::{InMemoryOverlaps, OverlapFile, OverlapSource, ScanOutcome};

/// One aligned interval of an overlap, in forward-strand half-open coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Area {
    pub id: SeqId,
    pub start: u32,
    pub end: u32,
    pub len: u32,
}

impl Area {
    pub fn new(id: SeqId, start: u32, end: u32, len: u32) -> Self {
        Self { id, start, end, len }
    }

    pub fn aligned(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

/// How two aligned sequences sit relative to each other, seen from `a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// Both sequences carry unaligned sequence at the same junction; likely a
    /// repeat or chimeric hit rather than a true overlap.
    Abnormal,
    /// Both sequences are aligned end to end.
    Equal,
    /// `a` contains `b`.
    Contains,
    /// `a` is contained in `b`.
    Contained,
    /// `b` continues past the left end of `a` (`b` precedes `a`).
    Left,
    /// `b` continues past the right end of `a` (`a` precedes `b`).
    Right,
}

impl Location {
    pub fn is_normal(self) -> bool {
        self != Location::Abnormal
    }
}

/// Unaligned flank lengths of both sequences, with `b` oriented onto `a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Flanks {
    a_left: i64,
    a_right: i64,
    b_left: i64,
    b_right: i64,
}

/// An alignment record between two sequences.
///
/// `strand` is the orientation of `b` relative to `a`; `identity` is a
/// percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlap {
    pub a: Area,
    pub b: Area,
    pub strand: Strand,
    pub identity: f64,
}

impl Overlap {
    pub fn new(a: Area, b: Area, strand: Strand, identity: f64) -> Self {
        Self { a, b, strand, identity }
    }

    pub fn area(&self, side: Side) -> &Area {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    /// The same alignment seen from `b`.
    pub fn swapped(&self) -> Self {
        Self {
            a: self.b,
            b: self.a,
            strand: self.strand,
            identity: self.identity,
        }
    }

    pub fn aligned_length_of(&self, side: Side) -> u32 {
        self.area(side).aligned()
    }

    /// Mean aligned span of the two sides.
    pub fn aligned_length(&self) -> u32 {
        ((self.a.aligned() as u64 + self.b.aligned() as u64) / 2) as u32
    }

    /// `b`'s aligned interval in the orientation it takes when laid onto `a`.
    pub fn oriented_b(&self) -> (u32, u32) {
        match self.strand {
            Strand::Forward => (self.b.start, self.b.end),
            Strand::Reverse => (self.b.len - self.b.end, self.b.len - self.b.start),
        }
    }

    fn flanks(&self) -> Flanks {
        let (b_start, b_end) = self.oriented_b();
        Flanks {
            a_left: self.a.start as i64,
            a_right: self.a.len as i64 - self.a.end as i64,
            b_left: b_start as i64,
            b_right: self.b.len as i64 - b_end as i64,
        }
    }

    /// Classify the alignment geometry, tolerating up to `max_overhang`
    /// unaligned bases where the alignment should have continued.
    pub fn location(&self, max_overhang: i64) -> Location {
        let f = self.flanks();
        let left = f.a_left.min(f.b_left);
        let right = f.a_right.min(f.b_right);
        if left > max_overhang || right > max_overhang {
            return Location::Abnormal;
        }

        let a_full = f.a_left <= max_overhang && f.a_right <= max_overhang;
        let b_full = f.b_left <= max_overhang && f.b_right <= max_overhang;
        match (a_full, b_full) {
            (true, true) => Location::Equal,
            (false, true) => Location::Contains,
            (true, false) => Location::Contained,
            (false, false) => {
                if f.a_left > max_overhang {
                    Location::Right
                } else {
                    Location::Left
                }
            }
        }
    }

    /// Per-side overhang: the longest unaligned flank of that sequence on an
    /// end where the other sequence continues at least as far, i.e. bases
    /// that should have been aligned. `-1` when the side has no such end.
    pub fn overhang(&self) -> [i64; 2] {
        let f = self.flanks();
        let pick = |mine: [i64; 2], theirs: [i64; 2]| {
            mine.iter()
                .zip(theirs.iter())
                .filter(|(m, t)| m <= t)
                .map(|(m, _)| *m)
                .max()
                .unwrap_or(-1)
        };
        [
            pick([f.a_left, f.a_right], [f.b_left, f.b_right]),
            pick([f.b_left, f.b_right], [f.a_left, f.a_right]),
        ]
    }
}
