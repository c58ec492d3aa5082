#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use rand::Rng;
use std::collections::VecDeque;

use crate::domain::MemoryLedger;

pub const MIB: usize = 1024 * 1024;
pub const PAGE_SIZE: usize = 4096;
/// Growth chunk sizes in MiB. Odd, non power of two sizes on purpose.
pub const ODD_CHUNK_MIB: [usize; 10] = [1, 3, 5, 7, 9, 11, 13, 15, 17, 19];
/// Shrink only once above `target * SHRINK_HYSTERESIS`.
pub const SHRINK_HYSTERESIS: f64 = 1.1;

/// 1 MiB of repeating alphabet, copied for the initial fill.
pub fn pattern_buffer() -> Vec<u8> {
    (0..MIB).map(|i| b'A' + (i % 26) as u8).collect()
}

/// Writes one byte per page so the buffer is physically backed.
pub fn touch_pages(buf: &mut [u8]) {
    for (n, page) in (0..buf.len()).step_by(PAGE_SIZE).enumerate() {
        buf[page] = n as u8;
    }
}

/// Chunks owned by a single worker.
///
/// `allocated()` is always the exact sum of the chunk lengths. Every change is
/// mirrored into the shared ledger, and released from it on drop.
#[derive(Debug)]
pub struct WorkerMemory {
    chunks: VecDeque<Vec<u8>>,
    allocated: usize,
    ledger: MemoryLedger,
}

impl WorkerMemory {
    pub fn new(ledger: MemoryLedger) -> Self {
        Self {
            chunks: VecDeque::new(),
            allocated: 0,
            ledger,
        }
    }

    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk_sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.chunks.iter().map(Vec::len)
    }

    pub fn chunks_mut(&mut self) -> &mut [Vec<u8>] {
        self.chunks.make_contiguous()
    }

    /// Fills up to `baseline` bytes with copies of `pattern`, the last copy
    /// truncated. Reports the ledger total to `progress` after each copy.
    pub fn initial_fill(&mut self, baseline: usize, pattern: &[u8], mut progress: impl FnMut(i64)) {
        if pattern.is_empty() {
            return;
        }
        while self.allocated < baseline {
            let len = pattern.len().min(baseline - self.allocated);
            let mut chunk = pattern[..len].to_vec();
            touch_pages(&mut chunk);
            progress(self.push(chunk));
        }
    }

    /// Size of the next growth chunk, cycling through [`ODD_CHUNK_MIB`] by the
    /// currently allocated MiB.
    pub fn next_chunk_size(&self) -> usize {
        ODD_CHUNK_MIB[(self.allocated / MIB) % ODD_CHUNK_MIB.len()] * MIB
    }

    /// Allocates one random-filled chunk when below `target`. Returns its size.
    pub fn grow_toward<R: Rng>(&mut self, target: usize, rng: &mut R) -> Option<usize> {
        if self.allocated >= target {
            return None;
        }
        let mut chunk = vec![0u8; self.next_chunk_size()];
        rng.fill(&mut chunk[..]);
        touch_pages(&mut chunk);
        let len = chunk.len();
        self.push(chunk);
        Some(len)
    }

    /// Drops the oldest chunks when above the hysteresis band around `target`,
    /// proportionally to the excess. Returns the number of evicted chunks.
    pub fn shrink_toward(&mut self, target: usize) -> usize {
        if self.allocated == 0 || self.allocated as f64 <= target as f64 * SHRINK_HYSTERESIS {
            return 0;
        }
        let excess = (self.allocated - target.min(self.allocated)) as f64 / self.allocated as f64;
        let evict = ((self.chunks.len() as f64 * excess).ceil() as usize).min(self.chunks.len());
        drop(self.chunks.drain(..evict));

        let before = self.allocated;
        self.allocated = self.chunks.iter().map(Vec::len).sum();
        self.ledger.add(-to_i64(before - self.allocated));
        evict
    }

    fn push(&mut self, chunk: Vec<u8>) -> i64 {
        self.allocated += chunk.len();
        let total = self.ledger.add(to_i64(chunk.len()));
        self.chunks.push_back(chunk);
        total
    }
}

impl Drop for WorkerMemory {
    fn drop(&mut self) {
        self.ledger.add(-to_i64(self.allocated));
    }
}

fn to_i64(bytes: usize) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}
