//! Parallel pairwise covariation testing.

use std::{
    thread,
    time::Duration,
    sync::mpsc::{self, Sender, Receiver, RecvTimeoutError},
};
use nohash::IntMap;
use smallvec::SmallVec;
use crate::{
    Error,
    err::error,
    ext::progress::Progress,
    math::{RoundDiv, fisher::Table},
    reads::{AlnSource, BaseMatrix},
    seq::{self, MISSING},
};
use super::tests_table::{TestRow, TestResults};

/// Block index and the block of position pairs.
type Task = (usize, Vec<(u32, u32)>);
/// Block index and the test results for the block.
type BlockResult = (usize, crate::Result<Vec<TestRow>>);

/// Reference window `[start, end)` that contains all positions of the block.
pub fn block_window(pairs: &[(u32, u32)]) -> (u32, u32) {
    assert!(!pairs.is_empty(), "Cannot process an empty block");
    let start = pairs.iter().map(|&(i, _)| i).min().expect("Block is not empty");
    let end = pairs.iter().map(|&(_, j)| j).max().expect("Block is not empty") + 1;
    (start, end)
}

/// Calls of all reads at a single position, together with distinct alleles in the canonical order.
struct Column {
    calls: Vec<u8>,
    alleles: SmallVec<[u8; 6]>,
}

impl Column {
    fn new(matrix: &BaseMatrix, pos: u32) -> Self {
        let calls: Vec<u8> = matrix.column(pos).collect();
        let mut alleles: SmallVec<[u8; 6]> = SmallVec::new();
        for &call in calls.iter() {
            if call != MISSING && !alleles.contains(&call) {
                alleles.push(call);
            }
        }
        alleles.sort_unstable_by_key(|&call| (seq::allele_order(call), call));
        Self { calls, alleles }
    }
}

/// Tests all pairs of the block against the base matrix, that covers the whole block window.
/// For each pair, only reads with calls at both positions are used.
/// Every combination of alleles produces one 2x2 table and one test row.
pub fn test_block(matrix: &BaseMatrix, pairs: &[(u32, u32)], rows: &mut Vec<TestRow>) {
    let mut columns: IntMap<u32, Column> = IntMap::default();
    for &(i, j) in pairs {
        columns.entry(i).or_insert_with(|| Column::new(matrix, i));
        columns.entry(j).or_insert_with(|| Column::new(matrix, j));
        let col_i = &columns[&i];
        let col_j = &columns[&j];

        let valid: Vec<(u8, u8)> = col_i.calls.iter().zip(&col_j.calls)
            .filter(|(&a, &b)| a != MISSING && b != MISSING)
            .map(|(&a, &b)| (a, b))
            .collect();
        if valid.is_empty() {
            continue;
        }
        for &a in col_i.alleles.iter() {
            for &b in col_j.alleles.iter() {
                let mut table = Table::default();
                for &(x, y) in valid.iter() {
                    match (x == a, y == b) {
                        (true, true) => table.x11 += 1,
                        (true, false) => table.x12 += 1,
                        (false, true) => table.x21 += 1,
                        (false, false) => table.x22 += 1,
                    }
                }
                rows.push(TestRow::new(i, j, a, b, table));
            }
        }
    }
}

/// Loads the base matrix for the block window and tests all pairs in the block.
pub fn process_block(source: &impl AlnSource, pairs: &[(u32, u32)]) -> crate::Result<Vec<TestRow>> {
    let (start, end) = block_window(pairs);
    let matrix = source.base_matrix(start, end)?;
    let mut rows = Vec::new();
    test_block(&matrix, pairs, &mut rows);
    Ok(rows)
}

/// Tests all candidate pairs, split into blocks of `block_size` pairs, using `threads` workers.
/// Any failed block fails the whole run.
pub fn run<S: AlnSource>(
    source: &S,
    pairs: &[(u32, u32)],
    block_size: usize,
    threads: usize,
) -> crate::Result<TestResults>
{
    assert!(block_size > 0 && threads > 0);
    let n_blocks = pairs.len().fast_ceil_div(block_size);
    log::info!("Testing covariation across {} position pairs ({} blocks of up to {} pairs, {} threads)",
        pairs.len(), n_blocks, block_size, threads);
    let mut progress = Progress::new("blocks", Some(n_blocks as u64));
    let mut block_rows: Vec<Option<Vec<TestRow>>> = vec![None; n_blocks];

    if threads == 1 || n_blocks <= 1 {
        for (block_ix, block) in pairs.chunks(block_size).enumerate() {
            let rows = process_block(source, block).map_err(|e| Error::worker(block_ix, e))?;
            block_rows[block_ix] = Some(rows);
            progress.inc(1);
        }
    } else {
        let main_worker = MainWorker::new(source, threads.min(n_blocks));
        main_worker.run(pairs, block_size, &mut block_rows, &mut progress)?;
    }
    progress.finish();

    let rows: Vec<TestRow> = block_rows.into_iter()
        .flat_map(|rows| rows.expect("All blocks must be processed"))
        .collect();
    let res = TestResults::from_unsorted(rows);
    log::info!("    {} test rows", res.len());
    Ok(res)
}

struct MainWorker {
    senders: Vec<Sender<Task>>,
    receiver: Receiver<BlockResult>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl MainWorker {
    fn new<S: AlnSource>(source: &S, n_workers: usize) -> Self {
        let mut senders = Vec::with_capacity(n_workers);
        let mut handles = Vec::with_capacity(n_workers);
        let (res_sender, receiver) = mpsc::channel();
        for _ in 0..n_workers {
            let (task_sender, task_receiver) = mpsc::channel();
            let worker = Worker {
                source: source.clone(),
                receiver: task_receiver,
                sender: res_sender.clone(),
            };
            senders.push(task_sender);
            handles.push(thread::spawn(move || worker.run()));
        }
        MainWorker { senders, receiver, handles }
    }

    fn run(
        self,
        pairs: &[(u32, u32)],
        block_size: usize,
        block_rows: &mut [Option<Vec<TestRow>>],
        progress: &mut Progress,
    ) -> crate::Result<()>
    {
        let n_workers = self.senders.len();
        for (block_ix, block) in pairs.chunks(block_size).enumerate() {
            self.senders[block_ix % n_workers].send((block_ix, block.to_vec()))
                .map_err(|_| error!(RuntimeError, "Covariation test worker has failed"))?;
        }

        let mut res = Ok(());
        let mut remaining = block_rows.len();
        while remaining > 0 {
            match self.receiver.recv_timeout(Duration::from_secs(1)) {
                Ok((block_ix, Ok(rows))) => {
                    block_rows[block_ix] = Some(rows);
                    remaining -= 1;
                    progress.inc(1);
                }
                Ok((_, Err(e))) => {
                    res = Err(e);
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {
                    // Workers only stop once task channels are closed, so a finished worker has panicked.
                    if self.handles.iter().any(thread::JoinHandle::is_finished) {
                        res = Err(error!(RuntimeError, "Covariation test worker has panicked"));
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    res = Err(error!(RuntimeError, "All covariation test workers have failed"));
                    break;
                }
            }
        }

        std::mem::drop(self.senders);
        // Unblock workers waiting to send their results.
        std::mem::drop(self.receiver);
        for handle in self.handles.into_iter() {
            if handle.join().is_err() && res.is_ok() {
                res = Err(error!(RuntimeError, "Covariation test worker has panicked"));
            }
        }
        res
    }
}

struct Worker<S> {
    source: S,
    receiver: Receiver<Task>,
    sender: Sender<BlockResult>,
}

impl<S: AlnSource> Worker<S> {
    fn run(self) {
        // Block thread and wait for the shipment.
        while let Ok((block_ix, block)) = self.receiver.recv() {
            let res = process_block(&self.source, &block).map_err(|e| Error::worker(block_ix, e));
            if self.sender.send((block_ix, res)).is_err() {
                log::error!("Covariation test: main thread has stopped receiving results");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, seq::SliceRandom, rngs::SmallRng};
    use htslib::bam::record::Cigar as HtsCigar;
    use crate::{
        covar::pairs::candidate_pairs,
        reads::{AlignedSeq, BaseMatrix, ReadView, mem::{self, MemSource}},
    };

    fn linked_source() -> MemSource {
        // Positions 2 and 5 are linked, position 7 is independent.
        let mut reads = Vec::new();
        for k in 0..20 {
            let mut calls = b"AAAAAAAAAA".to_vec();
            if k % 2 == 0 {
                calls[2] = b'C';
                calls[5] = b'G';
            }
            if k % 4 < 2 {
                calls[7] = b'T';
            }
            reads.push((0, calls));
        }
        MemSource::from_calls(10, reads)
    }

    #[test]
    fn window() {
        assert_eq!(block_window(&[(3, 10), (3, 12), (5, 6)]), (3, 13));
    }

    #[test]
    fn linked_pair() {
        let source = linked_source();
        let rows = process_block(&source, &[(2, 5), (2, 7)]).unwrap();
        // Two alleles at each position.
        assert_eq!(rows.len(), 8);
        let ca = rows.iter().find(|r| (r.col_i, r.col_j, r.i_char, r.j_char) == (2, 5, b'C', b'G')).unwrap();
        assert_eq!(ca.table, Table::new(10, 0, 0, 10));
        assert!(ca.p_value < 1e-4);
        let ind = rows.iter().find(|r| (r.col_i, r.col_j, r.i_char, r.j_char) == (2, 7, b'A', b'T')).unwrap();
        assert_eq!(ind.table, Table::new(5, 5, 5, 5));
        assert!(ind.p_value > 0.5);
    }

    #[test]
    fn partial_overlap() {
        let mut matrix = BaseMatrix::new(0, 6);
        matrix.push_read(&AlignedSeq::new(0, b"ACG".to_vec()));
        matrix.push_read(&AlignedSeq::new(0, b"TCGAAA".to_vec()));
        matrix.push_read(&AlignedSeq::new(0, b"AC~AAC".to_vec()));
        matrix.push_read(&AlignedSeq::new(4, b"AG".to_vec()));
        let mut rows = Vec::new();
        test_block(&matrix, &[(0, 5), (2, 4)], &mut rows);
        // Alleles at 0: A, T; alleles at 5: A, C, G (including reads, not covering position 0).
        let pair_rows: Vec<_> = rows.iter().filter(|r| r.col_i == 0).collect();
        assert_eq!(pair_rows.len(), 6);
        // Valid reads: the second and the third.
        assert!(pair_rows.iter().all(|r| r.table.total() == 2));
        let tg = pair_rows.iter().find(|r| r.i_char == b'T' && r.j_char == b'G').unwrap();
        assert_eq!(tg.table, Table::new(0, 1, 0, 1));
        // Pair (2, 4) has only one valid read with a single allele at each position.
        let other: Vec<_> = rows.iter().filter(|r| r.col_i == 2).collect();
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].table, Table::new(1, 0, 0, 0));
        assert_eq!(other[0].p_value, 1.0);
    }

    #[test]
    fn no_valid_reads() {
        let mut matrix = BaseMatrix::new(0, 10);
        matrix.push_read(&AlignedSeq::new(0, b"AC".to_vec()));
        matrix.push_read(&AlignedSeq::new(8, b"GT".to_vec()));
        let mut rows = Vec::new();
        test_block(&matrix, &[(1, 8)], &mut rows);
        assert!(rows.is_empty());
    }

    #[test]
    fn parallel_matches_sequential() {
        let source = linked_source();
        let pairs = candidate_pairs(&[2, 5, 7], 10);
        let seq_res = run(&source, &pairs, 1, 1).unwrap();
        let par_res = run(&source, &pairs, 1, 3).unwrap();
        assert_eq!(seq_res.rows(), par_res.rows());
        let large_block = run(&source, &pairs, 250, 4).unwrap();
        assert_eq!(seq_res.rows(), large_block.rows());
    }

    #[test]
    fn block_order_independence() {
        let source = linked_source();
        let pairs = candidate_pairs(&[2, 5, 7, 8], 10);
        let expected: Vec<TestRow> = pairs.chunks(2).flat_map(|block| process_block(&source, block).unwrap()).collect();
        let expected = TestResults::from_unsorted(expected);

        let mut rng = SmallRng::seed_from_u64(7);
        let mut blocks: Vec<&[(u32, u32)]> = pairs.chunks(2).collect();
        blocks.shuffle(&mut rng);
        let shuffled: Vec<TestRow> = blocks.into_iter().flat_map(|block| process_block(&source, block).unwrap()).collect();
        assert_eq!(TestResults::from_unsorted(shuffled).rows(), expected.rows());
        assert_eq!(run(&source, &pairs, 2, 2).unwrap().rows(), expected.rows());
    }

    #[test]
    fn indexed_bam() {
        // Linked sites 10, 20 and 28; reads at the block window edges.
        let mut records = vec![mem::record("edge", 0, vec![HtsCigar::Match(10)], b"GGGGGGGGGG")];
        for k in 0..20 {
            let mut seq = vec![b'G'; 25];
            for site in [10, 20, 28] {
                seq[site - 5] = if k % 2 == 0 { b'A' } else { b'C' };
            }
            records.push(mem::record(&format!("r{}", k), 5, vec![HtsCigar::Match(25)], &seq));
        }
        records.push(mem::record("partial", 15, vec![HtsCigar::SoftClip(2), HtsCigar::Match(10)], b"AAGGGGGTGGGG"));
        records.push(mem::record("after", 30, vec![HtsCigar::Match(10)], b"TTTTTTTTTT"));

        let dir = mem::temp_dir("tester");
        let location = mem::write_bam(&dir.join("reads.bam"), 40, &records).unwrap();
        let in_memory = mem::from_records(40, &records).unwrap();
        let pairs = candidate_pairs(&[10, 20, 28], 25);
        assert_eq!(pairs.len(), 3);

        let bam_res = run(&location, &pairs, 1, 2).unwrap();
        assert_eq!(bam_res.rows(), run(&in_memory, &pairs, 1, 1).unwrap().rows());
        // Two alleles at 10 and 28, three alleles at 20 (T from the partial read).
        assert_eq!(bam_res.len(), 16);
        let aa = bam_res.rows().iter().find(|r| (r.col_i, r.col_j, r.i_char, r.j_char) == (10, 20, b'A', b'A')).unwrap();
        assert_eq!(aa.table, Table::new(10, 0, 0, 10));
        let ta = bam_res.rows().iter().find(|r| (r.col_i, r.col_j, r.i_char, r.j_char) == (20, 28, b'T', b'A')).unwrap();
        assert_eq!(ta.table.total(), 20);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    /// Source that fails on windows, containing a specific position.
    #[derive(Clone)]
    struct FailingSource {
        inner: MemSource,
        bad_pos: u32,
    }

    impl AlnSource for FailingSource {
        fn ref_len(&self) -> u32 {
            self.inner.ref_len()
        }

        fn for_each_read<F>(&self, f: F) -> crate::Result<()>
        where F: FnMut(&ReadView) -> crate::Result<()>,
        {
            self.inner.for_each_read(f)
        }

        fn base_matrix(&self, start: u32, end: u32) -> crate::Result<BaseMatrix> {
            if start <= self.bad_pos && self.bad_pos < end {
                Err(error!(InvalidData, "Cannot read window [{}, {})", start, end))
            } else {
                self.inner.base_matrix(start, end)
            }
        }
    }

    #[test]
    fn failed_block() {
        let source = FailingSource { inner: linked_source(), bad_pos: 8 };
        let pairs = vec![(2, 5), (2, 7), (5, 7), (7, 8)];
        for threads in [1, 2] {
            match run(&source, &pairs, 1, threads) {
                Err(Error::Worker(block_ix, _)) => assert_eq!(block_ix, 3),
                Err(e) => panic!("Unexpected error {}", e.display()),
                Ok(_) => panic!("Covariation test must fail"),
            }
        }
    }
}
