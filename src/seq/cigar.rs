//! CIGAR operations and conversion of aligned reads into reference-coordinate base calls.

use std::fmt::{self, Write};
use htslib::bam::Record;
use crate::err::error;
use super::{GAP, MISSING, standardize_nt};

/// CIGAR operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Match,
    Ins,
    Del,
    RefSkip,
    Soft,
    Hard,
    Pad,
    Equal,
    Diff,
}

impl Operation {
    /// Does the Cigar operation consume reference sequence?
    pub const fn consumes_ref(self) -> bool {
        match self {
            Operation::Match | Operation::Equal | Operation::Diff | Operation::Del | Operation::RefSkip => true,
            _ => false,
        }
    }

    /// Does the Cigar operation consume query sequence?
    pub const fn consumes_query(self) -> bool {
        match self {
            Operation::Match | Operation::Equal | Operation::Diff | Operation::Ins | Operation::Soft => true,
            _ => false,
        }
    }

    /// Convert operation into char.
    pub const fn to_char(self) -> char {
        match self {
            Operation::Match => 'M',
            Operation::Ins => 'I',
            Operation::Del => 'D',
            Operation::RefSkip => 'N',
            Operation::Soft => 'S',
            Operation::Hard => 'H',
            Operation::Pad => 'P',
            Operation::Equal => '=',
            Operation::Diff => 'X',
        }
    }

    /// Get operation from a raw u32 value, None for unknown operation codes.
    pub const fn from_u32(val: u32) -> Option<Operation> {
        match val {
            0 => Some(Operation::Match),
            1 => Some(Operation::Ins),
            2 => Some(Operation::Del),
            3 => Some(Operation::RefSkip),
            4 => Some(Operation::Soft),
            5 => Some(Operation::Hard),
            6 => Some(Operation::Pad),
            7 => Some(Operation::Equal),
            8 => Some(Operation::Diff),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_char(self.to_char())
    }
}

/// Tuple operation + length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarItem {
    op: Operation,
    len: u32,
}

impl CigarItem {
    /// Creates a new tuple.
    pub fn new(op: Operation, len: u32) -> Self {
        CigarItem { op, len }
    }

    /// Creates a new tuple from a raw u32 value.
    pub fn from_u32(val: u32) -> crate::Result<Self> {
        let op = Operation::from_u32(val & 0b1111)
            .ok_or_else(|| error!(InvalidData, "Unexpected CIGAR operation code {}", val & 0b1111))?;
        Ok(Self::new(op, val >> 4))
    }
}

impl fmt::Display for CigarItem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.len, self.op)
    }
}

/// Wrapper over vector of `CigarItem`.
#[derive(Default, Clone)]
pub struct Cigar {
    tuples: Vec<CigarItem>,
    /// Reference length.
    rlen: u32,
    /// Query length.
    qlen: u32,
}

impl Cigar {
    /// Create an empty CIGAR.
    #[inline]
    pub fn new() -> Cigar {
        Cigar::default()
    }

    /// Parses raw CIGAR of the record. Fails on unknown operation codes.
    pub fn from_raw(record: &Record) -> crate::Result<Cigar> {
        let mut res = Cigar::new();
        for &val in record.raw_cigar().iter() {
            res.push(CigarItem::from_u32(val)?);
        }
        Ok(res)
    }

    /// Length of the reference sequence.
    pub fn ref_len(&self) -> u32 {
        self.rlen
    }

    /// Length of the query sequence (hard clipping is not included).
    pub fn query_len(&self) -> u32 {
        self.qlen
    }

    /// Push a new `CigarItem`, does not merge with the latest entry.
    pub fn push(&mut self, item: CigarItem) {
        if item.op.consumes_ref() {
            self.rlen += item.len;
        }
        if item.op.consumes_query() {
            self.qlen += item.len;
        }
        self.tuples.push(item);
    }

    /// Returns iterator over CIGAR items.
    pub fn iter<'a>(&'a self) -> std::slice::Iter<'a, CigarItem> {
        self.tuples.iter()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Converts the query sequence into one call per reference position, covered by the alignment.
    /// Aligned bases are standardized (A, C, G, T or N), deletions produce gaps,
    /// reference skips produce missing calls. Insertions and clipping produce nothing.
    ///
    /// Output length is always equal to `self.ref_len()`.
    /// If the query sequence is absent (`*`), aligned positions are marked as missing.
    pub fn ref_calls(&self, query_seq: &[u8], calls: &mut Vec<u8>) {
        calls.clear();
        calls.reserve(self.rlen as usize);
        let has_seq = !query_seq.is_empty();
        let mut qpos = 0;
        for item in self.tuples.iter() {
            let len = item.len as usize;
            match item.op {
                Operation::Match | Operation::Equal | Operation::Diff => {
                    if has_seq {
                        calls.extend(query_seq[qpos..qpos + len].iter().copied().map(standardize_nt));
                    } else {
                        calls.extend(std::iter::repeat(MISSING).take(len));
                    }
                    qpos += len;
                }
                Operation::Del => calls.extend(std::iter::repeat(GAP).take(len)),
                Operation::RefSkip => calls.extend(std::iter::repeat(MISSING).take(len)),
                Operation::Ins | Operation::Soft => qpos += len,
                Operation::Hard | Operation::Pad => {}
            }
        }
        debug_assert_eq!(calls.len(), self.rlen as usize);
    }
}

impl PartialEq for Cigar {
    fn eq(&self, oth: &Self) -> bool {
        self.tuples.eq(&oth.tuples)
    }
}

impl Eq for Cigar {}

impl fmt::Debug for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            write!(f, "*")
        } else {
            for tup in self.iter() {
                write!(f, "{}", tup)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cigar(items: &[(Operation, u32)]) -> Cigar {
        let mut res = Cigar::new();
        for &(op, len) in items {
            res.push(CigarItem::new(op, len));
        }
        res
    }

    #[test]
    fn lengths() {
        let c = cigar(&[(Operation::Soft, 2), (Operation::Match, 5), (Operation::Ins, 1),
            (Operation::Del, 3), (Operation::Match, 4), (Operation::Hard, 7)]);
        assert_eq!(c.ref_len(), 12);
        assert_eq!(c.query_len(), 12);
        assert_eq!(c.to_string(), "2S5M1I3D4M7H");
    }

    #[test]
    fn raw_items() {
        let raw = (17 << 4) | 2;
        assert_eq!(CigarItem::from_u32(raw).unwrap(), CigarItem::new(Operation::Del, 17));
        assert_eq!(CigarItem::from_u32((5 << 4) | 8).unwrap().to_string(), "5X");
        for code in 9..16 {
            assert!(matches!(CigarItem::from_u32((3 << 4) | code), Err(crate::Error::InvalidData(_))));
        }
    }

    #[test]
    fn calls_in_reference_coordinates() {
        // Query: SS ACGTA I CCCC, reference: ACGTA --- CCCC
        let c = cigar(&[(Operation::Soft, 2), (Operation::Match, 5), (Operation::Ins, 1),
            (Operation::Del, 3), (Operation::Match, 4)]);
        let mut calls = Vec::new();
        c.ref_calls(b"ggACGTAtCCRC", &mut calls);
        assert_eq!(calls, b"ACGTA---CCNC".to_vec());
    }

    #[test]
    fn leading_deletion_and_skip() {
        let c = cigar(&[(Operation::Del, 2), (Operation::Match, 2), (Operation::RefSkip, 3), (Operation::Equal, 1)]);
        let mut calls = Vec::new();
        c.ref_calls(b"ACG", &mut calls);
        assert_eq!(calls, b"--AC~~~G".to_vec());
        c.ref_calls(b"", &mut calls);
        assert_eq!(calls, b"--~~~~~~".to_vec());
    }
}
