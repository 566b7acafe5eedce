//! Output filenames within the covariation analysis directory.

/// Per-position nucleotide counts.
pub(super) const COUNTS: &'static str = "counts.tsv.gz";
/// Consensus sequence.
pub(super) const CONSENSUS: &'static str = "consensus.fa";
/// Covariation test table.
pub(super) const TESTS: &'static str = "tests.csv.gz";
/// Covarying sites, one per line.
pub(super) const SITES: &'static str = "sites.txt";
/// Allele counts at covarying sites compared to the error model.
pub(super) const ERRORS: &'static str = "errors.tsv";
/// Run summary.
pub(super) const SUMMARY: &'static str = "summary.json";
