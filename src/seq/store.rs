use ahash::{AHashMap, AHashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{BridgeError, Result};
use crate::io::fasta::open_records;
use super::{reverse_complement, NameTable, SeqArea, SeqId, Strand};

/// In-memory sequence store keyed by [`SeqId`].
///
/// Read-only once loaded; the pipeline never mutates sequences while
/// stitching.
#[derive(Debug, Default)]
pub struct SequenceStore {
    names: NameTable,
    seqs: AHashMap<SeqId, String>,
    files: AHashMap<PathBuf, Vec<SeqId>>,
}

impl SequenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store around a name table already populated by overlap loading.
    pub fn with_names(names: NameTable) -> Self {
        Self {
            names,
            ..Self::default()
        }
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    pub fn names_mut(&mut self) -> &mut NameTable {
        &mut self.names
    }

    /// Load every record of a FASTA/FASTQ(.gz) file.
    ///
    /// With `filter` set, only records whose name is already known and whose id
    /// is in the set are kept (used for raw reads, which are only needed as
    /// filler). Records shorter than `min_length` are skipped.
    pub fn load(&mut self, path: &Path, filter: Option<&AHashSet<SeqId>>, min_length: usize) -> Result<usize> {
        let mut loaded = Vec::new();
        for record in open_records(path)? {
            let record = record?;
            if record.sequence.len() < min_length {
                continue;
            }
            let id = match filter {
                Some(wanted) => match self.names.get(&record.name) {
                    Some(id) if wanted.contains(&id) => id,
                    _ => continue,
                },
                None => self.names.intern(&record.name),
            };
            self.seqs.insert(id, record.sequence);
            loaded.push(id);
        }
        info!("Loaded {} sequences from {}", loaded.len(), path.display());
        let count = loaded.len();
        self.files.entry(path.to_path_buf()).or_default().extend(loaded);
        Ok(count)
    }

    /// Add a sequence directly, returning its id.
    pub fn insert(&mut self, name: &str, sequence: impl Into<String>) -> SeqId {
        let id = self.names.intern(name);
        self.seqs.insert(id, sequence.into());
        id
    }

    pub fn seq(&self, id: SeqId) -> Result<&str> {
        self.seqs
            .get(&id)
            .map(String::as_str)
            .ok_or(BridgeError::UnknownSequence { id })
    }

    pub fn seq_len(&self, id: SeqId) -> Result<usize> {
        self.seq(id).map(str::len)
    }

    /// Bases covered by `area`, reverse-complemented for reverse areas.
    pub fn area(&self, area: &SeqArea) -> Result<String> {
        let seq = self.seq(area.id)?;
        let start = (area.start as usize).min(seq.len());
        let end = (area.end as usize).clamp(start, seq.len());
        let span = &seq[start..end];
        Ok(match area.strand {
            Strand::Forward => span.to_string(),
            Strand::Reverse => reverse_complement(span),
        })
    }

    pub fn id_to_name(&self, id: SeqId) -> Result<&str> {
        self.names.name(id).ok_or(BridgeError::UnknownSequence { id })
    }

    /// Ids loaded from `path`, in file order.
    pub fn ids_in_file(&self, path: &Path) -> &[SeqId] {
        self.files.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    /// Write the `id\tname` table for diagnostics.
    pub fn save_id_to_name(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| BridgeError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        for (id, name) in self.names.iter() {
            writeln!(writer, "{}\t{}", id, name).map_err(|e| BridgeError::io(path, e))?;
        }
        writer.flush().map_err(|e| BridgeError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_area_extraction() {
        let mut store = SequenceStore::new();
        let id = store.insert("ctg1", "AACCGGTT");
        assert_eq!(store.area(&SeqArea::new(id, Strand::Forward, 2, 5)).unwrap(), "CCG");
        assert_eq!(store.area(&SeqArea::new(id, Strand::Reverse, 0, 3)).unwrap(), "GTT");
        assert!(store.seq(99).is_err());
    }

    #[test]
    fn test_load_with_filter() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, ">r1\nACGT\n>r2\nGGGG\n>r3\nTT").unwrap();

        let mut names = NameTable::new();
        let r2 = names.intern("r2");
        let r3 = names.intern("r3");
        let mut store = SequenceStore::with_names(names);

        let wanted: AHashSet<SeqId> = [r2, r3].into_iter().collect();
        let n = store.load(file.path(), Some(&wanted), 3).unwrap();

        // r1 is unknown, r3 is too short
        assert_eq!(n, 1);
        assert_eq!(store.seq(r2).unwrap(), "GGGG");
        assert!(store.seq(r3).is_err());
        assert_eq!(store.ids_in_file(file.path()), &[r2]);
    }

    #[test]
    fn test_load_all_interns_names() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, ">c1\nACGT\n>c2\nGG").unwrap();

        let mut store = SequenceStore::new();
        store.load(file.path(), None, 0).unwrap();
        let ids = store.ids_in_file(file.path()).to_vec();
        assert_eq!(ids.len(), 2);
        assert_eq!(store.id_to_name(ids[1]).unwrap(), "c2");
        assert_eq!(store.seq_len(ids[0]).unwrap(), 4);
    }
}
