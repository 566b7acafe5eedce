//! Read filtering based on allele combinations at consecutive covarying sites.

use std::collections::{HashMap, HashSet};
use nohash::IntSet;
use smallvec::SmallVec;
use crate::reads::{AlnSource, ReadView};
use super::fdr::CovaryingSites;

/// Calls of a read at `k` consecutive covarying sites.
type Kmer = SmallVec<[u8; 8]>;

/// For every first site and every k-mer, stores reads that produced it.
pub struct KmerTable {
    k: usize,
    names: Vec<Vec<u8>>,
    name_ids: HashMap<Vec<u8>, u32>,
    kmers: HashMap<(u32, Kmer), Vec<u32>>,
}

impl KmerTable {
    pub fn new(k: usize) -> Self {
        assert!(k > 0, "k-mer size must be positive");
        Self {
            k,
            names: Vec::new(),
            name_ids: HashMap::new(),
            kmers: HashMap::new(),
        }
    }

    /// Builds k-mer table from all reads of the source.
    pub fn collect(source: &impl AlnSource, sites: &CovaryingSites, k: usize) -> crate::Result<Self> {
        log::info!("Collecting {}-mers across {} covarying sites", k, sites.len());
        let mut table = Self::new(k);
        source.for_each_read(|read| {
            table.add_read(read, sites);
            Ok(())
        })?;
        log::info!("    {} reads, {} distinct k-mers", table.names.len(), table.kmers.len());
        Ok(table)
    }

    /// Records all k-mers of the read: windows of `k` consecutive covarying sites within the read span.
    pub fn add_read(&mut self, read: &ReadView, sites: &CovaryingSites) {
        let aln = read.aln;
        let read_sites = sites.in_range(aln.start(), aln.end());
        if read_sites.len() < self.k {
            return;
        }
        let next_id = self.names.len() as u32;
        let read_id = *self.name_ids.entry(read.name.to_vec()).or_insert(next_id);
        if read_id == next_id {
            self.names.push(read.name.to_vec());
        }

        let calls: Kmer = read_sites.iter().map(|&site| aln.call_at(site)).collect();
        for (window, kmer) in read_sites.windows(self.k).zip(calls.windows(self.k)) {
            let ids = self.kmers.entry((window[0], Kmer::from_slice(kmer))).or_default();
            // Both mates of a pair produce the same read name.
            if ids.last() != Some(&read_id) {
                ids.push(read_id);
            }
        }
    }

    /// Number of distinct reads that produced the k-mer at the first site.
    pub fn count(&self, site: u32, kmer: &[u8]) -> usize {
        self.kmers.get(&(site, Kmer::from_slice(kmer)))
            .map(|ids| ids.iter().copied().collect::<IntSet<u32>>().len())
            .unwrap_or(0)
    }

    /// Reads that produced any k-mer, observed in fewer than `cutoff` reads, are suspect.
    pub fn filter(&self, cutoff: usize, min_length: u32) -> KmerFilter {
        let mut suspect_ids = IntSet::default();
        let mut rare_kmers = 0;
        for ids in self.kmers.values() {
            let uniq: IntSet<u32> = ids.iter().copied().collect();
            if uniq.len() < cutoff {
                rare_kmers += 1;
                suspect_ids.extend(uniq);
            }
        }
        log::info!("    {} k-mers observed in fewer than {} reads, {} suspect reads",
            rare_kmers, cutoff, suspect_ids.len());
        KmerFilter {
            suspect: suspect_ids.into_iter().map(|id| self.names[id as usize].clone()).collect(),
            min_length,
        }
    }
}

/// Decides which reads are kept after k-mer filtering.
pub struct KmerFilter {
    suspect: HashSet<Vec<u8>>,
    min_length: u32,
}

impl KmerFilter {
    /// Read is kept if it is not suspect and its query is longer than the minimal length.
    pub fn keep(&self, name: &[u8], query_len: u32) -> bool {
        query_len > self.min_length && !self.suspect.contains(name)
    }

    pub fn n_suspect(&self) -> usize {
        self.suspect.len()
    }
}
