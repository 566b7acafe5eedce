//! Per-position nucleotide counts.

use std::io::{self, Write};
use crate::{
    ext::progress::Progress,
    reads::AlnSource,
    seq::{self, NUCLEOTIDES, GAP},
};
use super::fdr::CovaryingSites;

/// Counts of A, C, G, T and gaps at a single reference position.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct NtCounts([u32; 5]);

impl NtCounts {
    pub fn new(a: u32, c: u32, g: u32, t: u32, gaps: u32) -> Self {
        Self([a, c, g, t, gaps])
    }

    /// Adds one observation. Calls other than A, C, G, T and gap are ignored.
    #[inline]
    pub fn add(&mut self, call: u8) {
        if let Some(ix) = seq::tally_ix(call) {
            self.0[ix] += 1;
        }
    }

    /// Number of times `call` was observed (0 for N and missing calls).
    #[inline]
    pub fn get(&self, call: u8) -> u32 {
        seq::tally_ix(call).map(|ix| self.0[ix]).unwrap_or(0)
    }

    /// Counts of A, C, G, T.
    #[inline]
    pub fn nt_counts(&self) -> &[u32] {
        &self.0[..4]
    }

    #[inline]
    pub fn gaps(&self) -> u32 {
        self.0[4]
    }

    /// Sum of A, C, G, T counts (gaps are not included).
    #[inline]
    pub fn coverage(&self) -> u32 {
        self.nt_counts().iter().sum()
    }

    /// Largest nucleotide count.
    #[inline]
    pub fn max_count(&self) -> u32 {
        self.nt_counts().iter().copied().max().unwrap_or(0)
    }

    /// Most frequent nucleotide (first in the ACGT order in case of ties), or gap if there is no coverage.
    pub fn consensus(&self) -> u8 {
        let max_count = self.max_count();
        if max_count == 0 {
            return GAP;
        }
        let ix = self.nt_counts().iter().position(|&count| count == max_count).expect("Max count must be present");
        NUCLEOTIDES[ix]
    }

    /// Position is interesting if at least two nucleotides were observed.
    pub fn is_interesting(&self) -> bool {
        self.nt_counts().iter().filter(|&&count| count == 0).count() < 3
    }

    /// Frequencies of A, C, G, T (all zeros if there is no coverage).
    pub fn frequencies(&self) -> [f64; 4] {
        let coverage = self.coverage();
        let mut freqs = [0.0; 4];
        if coverage > 0 {
            for (freq, &count) in freqs.iter_mut().zip(self.nt_counts()) {
                *freq = f64::from(count) / f64::from(coverage);
            }
        }
        freqs
    }

    /// Frequencies in decreasing order.
    pub fn sorted_frequencies(&self) -> [f64; 4] {
        let mut freqs = self.frequencies();
        freqs.sort_unstable_by(|a, b| b.total_cmp(a));
        freqs
    }
}

/// Nucleotide counts for every reference position, together with basic read statistics.
/// Calculated in a single pass over all reads.
#[derive(Clone, Debug)]
pub struct PositionTally {
    counts: Vec<NtCounts>,
    n_reads: u64,
    max_read_len: u32,
}

/// Table header for `PositionTally::write`.
pub const COUNTS_HEADER: &'static str = "pos\tA\tC\tG\tT\tgap\tcoverage\tconsensus\tinteresting\tcovarying";

impl PositionTally {
    /// Counts nucleotides across all reads of the source.
    pub fn build(source: &impl AlnSource) -> crate::Result<Self> {
        log::info!("Calculating nucleotide counts");
        let ref_len = source.ref_len();
        let mut counts = vec![NtCounts::default(); ref_len as usize];
        let mut max_read_len = 0;
        let mut progress = Progress::new("reads", None);
        let mut outside = 0_u64;
        source.for_each_read(|read| {
            let aln = read.aln;
            max_read_len = max_read_len.max(read.query_len);
            if aln.end() > ref_len {
                outside += 1;
            }
            let start = aln.start() as usize;
            for (pos_counts, &call) in counts.iter_mut().skip(start).zip(aln.calls()) {
                pos_counts.add(call);
            }
            progress.inc(1);
            Ok(())
        })?;
        progress.finish();
        if outside > 0 {
            log::warn!("    {} reads extend past the end of the reference", outside);
        }

        let tally = Self {
            counts,
            n_reads: progress.done(),
            max_read_len,
        };
        log::info!("    {} reads, reference length {}, {} interesting positions, max read length {}",
            tally.n_reads, ref_len, tally.interesting().count(), max_read_len);
        Ok(tally)
    }

    /// Reference length.
    pub fn ref_len(&self) -> u32 {
        self.counts.len() as u32
    }

    /// Total number of reads.
    pub fn n_reads(&self) -> u64 {
        self.n_reads
    }

    /// Largest query length across all reads.
    pub fn max_read_len(&self) -> u32 {
        self.max_read_len
    }

    #[inline]
    pub fn at(&self, pos: u32) -> &NtCounts {
        &self.counts[pos as usize]
    }

    pub fn counts(&self) -> &[NtCounts] {
        &self.counts
    }

    /// Iterates over interesting positions in increasing order.
    pub fn interesting(&self) -> impl Iterator<Item = u32> + '_ {
        self.counts.iter().enumerate()
            .filter(|(_, counts)| counts.is_interesting())
            .map(|(pos, _)| pos as u32)
    }

    /// Consensus nucleotide at every position.
    pub fn consensus_seq(&self) -> Vec<u8> {
        self.counts.iter().map(NtCounts::consensus).collect()
    }

    /// Writes per-position counts in a tab-separated format, see `COUNTS_HEADER`.
    pub fn write(&self, mut writer: impl Write, sites: Option<&CovaryingSites>) -> io::Result<()> {
        writeln!(writer, "{}", COUNTS_HEADER)?;
        for (pos, counts) in self.counts.iter().enumerate() {
            let pos = pos as u32;
            let covarying = match sites {
                Some(sites) => if sites.contains(pos) { "T" } else { "F" },
                None => "NA",
            };
            writeln!(writer, "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                pos, counts.0[0], counts.0[1], counts.0[2], counts.0[3], counts.gaps(), counts.coverage(),
                char::from(counts.consensus()), if counts.is_interesting() { "T" } else { "F" }, covarying)?;
        }
        Ok(())
    }
}
