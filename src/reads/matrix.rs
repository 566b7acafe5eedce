use crate::seq::MISSING;
use super::AlignedSeq;

/// Dense matrix of base calls (reads x reference positions) over the reference window `[start, end)`.
/// Cells, not observed by a read, contain `MISSING`.
#[derive(Clone, Debug)]
pub struct BaseMatrix {
    start: u32,
    width: usize,
    /// Row-major cells.
    cells: Vec<u8>,
}

impl BaseMatrix {
    /// Creates an empty matrix for the window `[start, end)`.
    pub fn new(start: u32, end: u32) -> Self {
        assert!(start < end, "Cannot create base matrix for an empty window [{}, {})", start, end);
        Self {
            start,
            width: (end - start) as usize,
            cells: Vec::new(),
        }
    }

    /// Window start (inclusive).
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Window end (exclusive).
    pub fn end(&self) -> u32 {
        self.start + self.width as u32
    }

    /// Number of rows (reads).
    pub fn n_rows(&self) -> usize {
        self.cells.len() / self.width
    }

    /// Adds a new row for the read, if it overlaps the window.
    pub fn push_read(&mut self, aln: &AlignedSeq) {
        let end = self.end();
        if aln.end() <= self.start || aln.start() >= end {
            return;
        }
        let row_start = self.cells.len();
        self.cells.resize(row_start + self.width, MISSING);
        let overl_start = aln.start().max(self.start);
        let overl_end = aln.end().min(end);
        let calls = &aln.calls()[(overl_start - aln.start()) as usize..(overl_end - aln.start()) as usize];
        let shift = row_start + (overl_start - self.start) as usize;
        self.cells[shift..shift + calls.len()].copy_from_slice(calls);
    }

    /// Iterates over calls of all reads at the reference position `pos`.
    pub fn column(&self, pos: u32) -> impl Iterator<Item = u8> + '_ {
        assert!(self.start <= pos && pos < self.end(), "Position {} is outside of the window [{}, {})",
            pos, self.start, self.end());
        self.cells.iter().skip((pos - self.start) as usize).step_by(self.width).copied()
    }
}
