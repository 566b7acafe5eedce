//! Consensus-based read correction.

use htslib::bam::{
    self,
    record::{Cigar as HtsCigar, CigarString},
};
use crate::{
    reads::{AlignedRead, AlignedSeq},
    seq::{GAP, MISSING, UNKNOWN},
};
use super::{
    tally::PositionTally,
    fdr::CovaryingSites,
};

/// Base quality, assigned to all corrected bases.
pub const PLACEHOLDER_QUAL: u8 = 27;

/// Replaces calls at non-covarying positions with the consensus nucleotide.
pub struct ReadCorrector {
    consensus: Vec<u8>,
    /// True if the observed call is kept at the position.
    keep: Vec<bool>,
}

impl ReadCorrector {
    /// Observed calls are kept only at covarying sites that are at least `end_correction` away from the reference ends.
    pub fn new(tally: &PositionTally, sites: &CovaryingSites, end_correction: u32) -> Self {
        let ref_len = tally.ref_len();
        let end = ref_len.saturating_sub(end_correction);
        let keep = (0..ref_len).map(|pos| end_correction <= pos && pos < end && sites.contains(pos)).collect();
        Self {
            consensus: tally.consensus_seq(),
            keep,
        }
    }

    /// Returns corrected calls in reference coordinates (same span as the input).
    /// Calls past the reference end are left unchanged.
    pub fn correct_calls(&self, aln: &AlignedSeq) -> Vec<u8> {
        let start = aln.start() as usize;
        aln.calls().iter().enumerate()
            .map(|(i, &call)| match self.keep.get(start + i) {
                Some(false) => self.consensus[start + i],
                _ => call,
            })
            .collect()
    }

    /// Creates a new record with the corrected sequence and a single-match CIGAR.
    /// Gaps and missing calls are stored as N.
    /// Name, flags, positions, mapping quality, mate information and tags are copied from the input record.
    pub fn corrected_record(&self, read: &AlignedRead) -> crate::Result<bam::Record> {
        let seq: Vec<u8> = self.correct_calls(read.aln()).into_iter()
            .map(|call| if call == GAP || call == MISSING { UNKNOWN } else { call })
            .collect();
        let qual = vec![PLACEHOLDER_QUAL; seq.len()];
        let cigar = CigarString(if seq.is_empty() { Vec::new() } else { vec![HtsCigar::Match(seq.len() as u32)] });

        let src = read.record();
        let mut record = bam::Record::new();
        record.set(src.qname(), Some(&cigar), &seq, &qual);
        record.set_flags(src.flags());
        record.set_tid(src.tid());
        record.set_pos(src.pos());
        record.set_mapq(src.mapq());
        record.set_mtid(src.mtid());
        record.set_mpos(src.mpos());
        record.set_insert_size(src.insert_size());
        for aux in src.aux_iter() {
            let (tag, value) = aux?;
            record.push_aux(tag, value)?;
        }
        Ok(record)
    }
}
