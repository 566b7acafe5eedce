//! Detection of covarying sites and read correction/filtering, driven by them.

pub mod tally;
pub mod pairs;
pub mod tests_table;
pub mod tester;
pub mod fdr;
pub mod errors;
pub mod correct;
pub mod kmers;
pub mod pipeline;

pub use tally::{NtCounts, PositionTally};
pub use tests_table::{TestRow, TestResults};
pub use fdr::CovaryingSites;
pub use errors::{ErrorModel, CovaryingError};
pub use correct::ReadCorrector;
pub use kmers::{KmerTable, KmerFilter};
pub use pipeline::Pipeline;

use crate::err::validate_param;

/// Parameters of the covariation analysis and of the read-level passes.
#[derive(Clone, Debug)]
pub struct Params {
    /// False discovery rate for the Benjamini-Hochberg procedure.
    pub fdr: f64,
    /// Allele counts are compared against the `1 - error_threshold` quantile of the background error distribution.
    pub error_threshold: f64,
    /// Number of positions at both ends of the reference, excluded from covarying sites.
    pub end_correction: u32,
    /// Number of covariation test workers.
    pub threads: usize,
    /// Number of position pairs, processed by a worker at once.
    pub block_size: usize,

    /// Number of consecutive covarying sites in a k-mer.
    pub kmer_size: usize,
    /// Reads with k-mers, observed in fewer reads, are discarded.
    pub kmer_cutoff: usize,
    /// Filtered reads must be longer than this.
    pub min_length: u32,
    /// Frequency threshold for the simple site caller: a site is covarying if
    /// at least two nucleotides have frequency over the threshold.
    pub freq_threshold: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            fdr: 0.001,
            error_threshold: 1e-3,
            end_correction: 0,
            threads: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            block_size: 250,

            kmer_size: 4,
            kmer_cutoff: 20,
            min_length: 100,
            freq_threshold: 0.01,
        }
    }
}

impl Params {
    pub fn validate(self) -> crate::Result<Self> {
        validate_param!(0.0 < self.fdr && self.fdr <= 1.0, "False discovery rate ({}) must be in (0, 1]", self.fdr);
        validate_param!(0.0 < self.error_threshold && self.error_threshold < 1.0,
            "Error threshold ({}) must be in (0, 1)", self.error_threshold);
        validate_param!(self.threads > 0, "Number of threads must be positive");
        validate_param!(self.block_size > 0, "Block size must be positive");
        validate_param!(self.kmer_size > 0, "k-mer size must be positive");
        validate_param!(0.0 <= self.freq_threshold && self.freq_threshold < 1.0,
            "Frequency threshold ({}) must be in [0, 1)", self.freq_threshold);
        Ok(self)
    }
}
