//! Analysis stages, each computed once on demand from the previous ones.

use std::cell::OnceCell;
use crate::reads::AlnSource;
use super::{
    Params,
    pairs,
    tester,
    fdr::{self, CovaryingSites},
    tally::PositionTally,
    tests_table::TestResults,
    errors::ErrorModel,
    correct::ReadCorrector,
    kmers::{KmerTable, KmerFilter},
};

/// Returns the cell value, initializing it with `f` if needed.
fn get_or_try_init<T>(cell: &OnceCell<T>, f: impl FnOnce() -> crate::Result<T>) -> crate::Result<&T> {
    if let Some(val) = cell.get() {
        return Ok(val);
    }
    let val = f()?;
    Ok(cell.get_or_init(|| val))
}

/// Covariation analysis over a single alignment source.
/// Every stage is an immutable snapshot, calculated at most once.
pub struct Pipeline<S> {
    source: S,
    params: Params,
    tally: OnceCell<PositionTally>,
    pairs: OnceCell<Vec<(u32, u32)>>,
    tests: OnceCell<TestResults>,
    sites: OnceCell<CovaryingSites>,
    threshold_sites: OnceCell<CovaryingSites>,
    error_model: OnceCell<ErrorModel>,
}

impl<S: AlnSource> Pipeline<S> {
    pub fn new(source: S, params: Params) -> Self {
        Self {
            source, params,
            tally: OnceCell::new(),
            pairs: OnceCell::new(),
            tests: OnceCell::new(),
            sites: OnceCell::new(),
            threshold_sites: OnceCell::new(),
            error_model: OnceCell::new(),
        }
    }

    /// Uses previously calculated covariation tests instead of running them.
    /// Any previously calculated tests and the stages, derived from them, are discarded.
    pub fn with_tests(mut self, tests: TestResults) -> Self {
        self.tests = OnceCell::from(tests);
        self.sites = OnceCell::new();
        self.error_model = OnceCell::new();
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn tally(&self) -> crate::Result<&PositionTally> {
        get_or_try_init(&self.tally, || PositionTally::build(&self.source))
    }

    /// Pairs of interesting positions, at most the longest read apart.
    pub fn pairs(&self) -> crate::Result<&[(u32, u32)]> {
        get_or_try_init(&self.pairs, || {
            let tally = self.tally()?;
            let interesting: Vec<u32> = tally.interesting().collect();
            Ok(pairs::candidate_pairs(&interesting, tally.max_read_len()))
        }).map(Vec::as_slice)
    }

    pub fn tests(&self) -> crate::Result<&TestResults> {
        get_or_try_init(&self.tests, ||
            tester::run(&self.source, self.pairs()?, self.params.block_size, self.params.threads))
    }

    /// Covarying sites according to the Benjamini-Hochberg procedure.
    pub fn covarying_sites(&self) -> crate::Result<&CovaryingSites> {
        get_or_try_init(&self.sites, || {
            let ref_len = self.source.ref_len();
            Ok(fdr::benjamini_hochberg(self.tests()?, self.params.fdr, ref_len, self.params.end_correction))
        })
    }

    /// Sites with at least two frequent nucleotides.
    pub fn threshold_sites(&self) -> crate::Result<&CovaryingSites> {
        get_or_try_init(&self.threshold_sites, || Ok(fdr::threshold_sites(self.tally()?,
            self.params.freq_threshold, self.params.end_correction)))
    }

    pub fn error_model(&self) -> crate::Result<&ErrorModel> {
        get_or_try_init(&self.error_model, ||
            ErrorModel::estimate(self.tally()?, self.covarying_sites()?, self.params.error_threshold))
    }

    pub fn corrector(&self) -> crate::Result<ReadCorrector> {
        Ok(ReadCorrector::new(self.tally()?, self.covarying_sites()?, self.params.end_correction))
    }

    /// Builds k-mer filter using either covarying sites or frequency-threshold sites.
    pub fn kmer_filter(&self, use_covarying: bool) -> crate::Result<KmerFilter> {
        let sites = if use_covarying { self.covarying_sites()? } else { self.threshold_sites()? };
        let table = KmerTable::collect(&self.source, sites, self.params.kmer_size)?;
        Ok(table.filter(self.params.kmer_cutoff, self.params.min_length))
    }
}
