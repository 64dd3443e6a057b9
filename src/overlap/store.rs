//! Blocked, parallel delivery of overlap records.
//!
//! The reader (the calling thread) parses records in blocks and feeds a fixed
//! pool of workers over a bounded channel. Every worker owns a private state
//! value created by the caller's `init`; no lock is held while a record is
//! visited. Records whose visitor returns `true` are retained and handed back
//! in a deterministic order, so results never depend on worker scheduling.

use crossbeam::channel;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::error::{BridgeError, Result};
use crate::io::fasta::open_text;
use crate::seq::NameTable;
use super::{Overlap, OverlapFormat};

/// Records per block handed to a worker.
pub const BLOCK_SIZE: usize = 10_000;

/// Everything a scan leaves behind.
pub struct ScanOutcome<W> {
    /// Final state of every worker, for the caller's closing merge.
    pub workers: Vec<W>,
    /// Records the visitor asked to keep, sorted by coordinates.
    pub retained: Vec<Overlap>,
    pub scanned: usize,
}

/// A dataset of overlaps that can be swept by a pool of workers.
pub trait OverlapSource {
    /// Visit every record on `threads` workers.
    ///
    /// `visit` returns whether to retain the record in memory; an error aborts
    /// the whole scan and is returned once all workers have stopped.
    fn scan<W, I, V>(&mut self, threads: usize, init: I, visit: V) -> Result<ScanOutcome<W>>
    where
        W: Send,
        I: Fn() -> W + Sync,
        V: Fn(&mut W, &Overlap) -> Result<bool> + Sync;
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn record_failure(slot: &Mutex<Option<BridgeError>>, failed: &AtomicBool, error: BridgeError) {
    failed.store(true, Ordering::Relaxed);
    lock(slot).get_or_insert(error);
}

fn overlap_order(x: &Overlap, y: &Overlap) -> std::cmp::Ordering {
    (x.a.id, x.b.id, x.a.start, x.a.end, x.b.start, x.b.end)
        .cmp(&(y.a.id, y.b.id, y.a.start, y.a.end, y.b.start, y.b.end))
        .then(x.identity.total_cmp(&y.identity))
}

fn run_pool<B, W, I, V>(blocks: B, threads: usize, init: I, visit: V) -> Result<ScanOutcome<W>>
where
    B: Iterator<Item = Result<Vec<Overlap>>>,
    W: Send,
    I: Fn() -> W + Sync,
    V: Fn(&mut W, &Overlap) -> Result<bool> + Sync,
{
    let threads = threads.max(1);
    let (sender, receiver) = channel::bounded::<Vec<Overlap>>(threads * 2);
    let failure: Mutex<Option<BridgeError>> = Mutex::new(None);
    let failed = AtomicBool::new(false);
    let retained: Mutex<Vec<Overlap>> = Mutex::new(Vec::new());
    let mut scanned = 0usize;

    let joined = crossbeam::thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let receiver = receiver.clone();
                let (init, visit) = (&init, &visit);
                let (failure, failed, retained) = (&failure, &failed, &retained);
                scope.spawn(move |_| {
                    let mut state = init();
                    let mut kept = Vec::new();
                    'blocks: for block in receiver.iter() {
                        if failed.load(Ordering::Relaxed) {
                            break;
                        }
                        for o in &block {
                            match visit(&mut state, o) {
                                Ok(true) => kept.push(*o),
                                Ok(false) => {}
                                Err(e) => {
                                    record_failure(failure, failed, e);
                                    break 'blocks;
                                }
                            }
                        }
                    }
                    lock(retained).extend(kept);
                    state
                })
            })
            .collect();
        drop(receiver);

        for block in blocks {
            if failed.load(Ordering::Relaxed) {
                break;
            }
            match block {
                Ok(block) => {
                    scanned += block.len();
                    if sender.send(block).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    record_failure(&failure, &failed, e);
                    break;
                }
            }
        }
        drop(sender);

        handles.into_iter().map(|h| h.join()).collect::<Vec<_>>()
    })
    .map_err(|_| BridgeError::WorkerPanic)?;

    let workers = joined
        .into_iter()
        .collect::<std::result::Result<Vec<W>, _>>()
        .map_err(|_| BridgeError::WorkerPanic)?;

    if let Some(error) = failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
        return Err(error);
    }

    let mut retained = retained.into_inner().unwrap_or_else(PoisonError::into_inner);
    retained.sort_by(overlap_order);
    Ok(ScanOutcome { workers, retained, scanned })
}

/// Overlaps read from a PAF or M4 file (optionally gzipped).
///
/// Sequence names are interned into the shared [`NameTable`] on the reader
/// thread, so ids agree with later sequence loading.
pub struct OverlapFile<'a> {
    path: PathBuf,
    format: OverlapFormat,
    names: &'a mut NameTable,
}

impl<'a> OverlapFile<'a> {
    pub fn new(path: &Path, names: &'a mut NameTable) -> Self {
        Self {
            path: path.to_path_buf(),
            format: OverlapFormat::detect(path),
            names,
        }
    }

    pub fn with_format(mut self, format: OverlapFormat) -> Self {
        self.format = format;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

struct BlockReader<'a> {
    reader: Box<dyn BufRead + Send>,
    format: OverlapFormat,
    names: &'a mut NameTable,
    path: &'a Path,
    line_no: usize,
    done: bool,
}

impl Iterator for BlockReader<'_> {
    type Item = Result<Vec<Overlap>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut block = Vec::with_capacity(BLOCK_SIZE);
        let mut line = String::new();
        while block.len() < BLOCK_SIZE {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => {
                    self.done = true;
                    break;
                }
                Ok(_) => {
                    self.line_no += 1;
                    match self.format.parse_line(&line, self.names) {
                        Ok(Some(o)) => block.push(o),
                        Ok(None) => {}
                        Err(message) => {
                            self.done = true;
                            return Some(Err(BridgeError::parse(self.path, self.line_no, message)));
                        }
                    }
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(BridgeError::io(self.path, e)));
                }
            }
        }
        if block.is_empty() {
            None
        } else {
            Some(Ok(block))
        }
    }
}

impl OverlapSource for OverlapFile<'_> {
    fn scan<W, I, V>(&mut self, threads: usize, init: I, visit: V) -> Result<ScanOutcome<W>>
    where
        W: Send,
        I: Fn() -> W + Sync,
        V: Fn(&mut W, &Overlap) -> Result<bool> + Sync,
    {
        debug!("Scanning {} as {:?} with {} threads", self.path.display(), self.format, threads);
        let blocks = BlockReader {
            reader: open_text(&self.path)?,
            format: self.format,
            names: &mut *self.names,
            path: &self.path,
            line_no: 0,
            done: false,
        };
        let outcome = run_pool(blocks, threads, init, visit)?;
        info!(
            "Scanned {} overlaps from {}, retained {}",
            outcome.scanned,
            self.path.display(),
            outcome.retained.len()
        );
        Ok(outcome)
    }
}

/// Overlaps already in memory, delivered in fixed-size blocks.
pub struct InMemoryOverlaps<'a> {
    records: &'a [Overlap],
    block_size: usize,
}

impl<'a> InMemoryOverlaps<'a> {
    pub fn new(records: &'a [Overlap]) -> Self {
        Self { records, block_size: BLOCK_SIZE }
    }

    /// Smaller blocks spread a small dataset over more workers.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }
}

impl OverlapSource for InMemoryOverlaps<'_> {
    fn scan<W, I, V>(&mut self, threads: usize, init: I, visit: V) -> Result<ScanOutcome<W>>
    where
        W: Send,
        I: Fn() -> W + Sync,
        V: Fn(&mut W, &Overlap) -> Result<bool> + Sync,
    {
        let blocks = self.records.chunks(self.block_size).map(|c| Ok(c.to_vec()));
        run_pool(blocks, threads, init, visit)
    }
}
