//! Indexed BAM input: read streaming, conversion of reads into reference-coordinate calls,
//! and dense base-call matrices over reference windows.

pub mod matrix;
#[cfg(test)]
pub mod mem;

use std::path::{Path, PathBuf};
use htslib::bam::{self, Read as _};
use crate::{
    Error,
    err::error,
    ext::{self, progress::Progress},
    seq::cigar::Cigar,
};
pub use matrix::BaseMatrix;

/// Calls of a single read in reference coordinates: `calls[i]` corresponds to reference position `start + i`.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct AlignedSeq {
    start: u32,
    calls: Vec<u8>,
}

impl AlignedSeq {
    pub fn new(start: u32, calls: Vec<u8>) -> Self {
        Self { start, calls }
    }

    /// First reference position, covered by the read (inclusive).
    #[inline]
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Last reference position, covered by the read (exclusive).
    #[inline]
    pub fn end(&self) -> u32 {
        self.start + self.calls.len() as u32
    }

    /// Calls, one per reference position in `start..end`.
    #[inline]
    pub fn calls(&self) -> &[u8] {
        &self.calls
    }

    /// Call at the reference position `pos`, or `MISSING` if the read does not cover it.
    #[inline]
    pub fn call_at(&self, pos: u32) -> u8 {
        if pos >= self.start {
            self.calls.get((pos - self.start) as usize).copied().unwrap_or(crate::seq::MISSING)
        } else {
            crate::seq::MISSING
        }
    }
}

/// Read, as seen by the read-level passes: name, query length and calls in reference coordinates.
pub struct ReadView<'a> {
    pub name: &'a [u8],
    /// Number of query bases (soft clipping included, hard clipping excluded).
    pub query_len: u32,
    pub aln: &'a AlignedSeq,
}

/// Source of aligned reads over a single reference sequence.
/// Source is passed around by value: every user (including every covariation test worker)
/// opens its own underlying reader.
pub trait AlnSource: Clone + Send + 'static {
    /// Reference sequence length.
    fn ref_len(&self) -> u32;

    /// Calls `f` on every mapped read of the reference sequence.
    fn for_each_read<F>(&self, f: F) -> crate::Result<()>
    where F: FnMut(&ReadView) -> crate::Result<()>;

    /// Builds a dense matrix of base calls for the reference window `[start, end)`
    /// from all reads overlapping the window.
    fn base_matrix(&self, start: u32, end: u32) -> crate::Result<BaseMatrix>;
}

/// Indexed BAM file: data and index locations, as well as the name and the length of the first reference sequence.
#[derive(Clone, Debug)]
pub struct BamLocation {
    path: PathBuf,
    index: PathBuf,
    ref_name: String,
    ref_len: u32,
}

impl BamLocation {
    /// Finds the index (`<path>.bai` or `<path>.csi` if not provided), opens the file once,
    /// and loads the first reference sequence from the header.
    pub fn new(path: impl Into<PathBuf>, index: Option<PathBuf>) -> crate::Result<Self> {
        let path = path.into();
        let index = match index {
            Some(index) => index,
            None => {
                let bai = ext::sys::append_path(&path, ".bai");
                let csi = ext::sys::append_path(&path, ".csi");
                if bai.exists() {
                    bai
                } else if csi.exists() {
                    csi
                } else {
                    return Err(error!(InvalidInput, "Alignment file {} is not indexed (tried {} and {})",
                        ext::fmt::path(&path), ext::fmt::path(&bai), ext::fmt::path(&csi)));
                }
            }
        };
        if !index.exists() {
            return Err(error!(InvalidInput, "Index file {} does not exist", ext::fmt::path(&index)));
        }

        let reader = bam::IndexedReader::from_path_and_index(&path, &index)?;
        let header = reader.header();
        let n_refs = header.target_count();
        if n_refs == 0 {
            return Err(error!(InvalidData, "Alignment file {} has no reference sequences",
                ext::fmt::path(&path)));
        } else if n_refs > 1 {
            log::warn!("Alignment file {} contains {} reference sequences, only the first one will be analyzed",
                ext::fmt::path(&path), n_refs);
        }
        let ref_name = std::str::from_utf8(header.tid2name(0))
            .map_err(|_| Error::Utf8("reference name", header.tid2name(0).to_vec()))?
            .to_owned();
        let ref_len = header.target_len(0)
            .ok_or_else(|| error!(InvalidData, "Reference {} has no length", ref_name))?;
        let ref_len = u32::try_from(ref_len)
            .map_err(|_| error!(InvalidData, "Reference {} is too long ({} bp)", ref_name, ref_len))?;
        Ok(Self { path, index, ref_name, ref_len })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> &Path {
        &self.index
    }

    pub fn ref_name(&self) -> &str {
        &self.ref_name
    }

    /// Opens a new reader.
    pub fn open(&self) -> crate::Result<BamReader> {
        let reader = bam::IndexedReader::from_path_and_index(&self.path, &self.index)?;
        Ok(BamReader { reader })
    }

    /// Streams all reads of the reference sequence through `f` and writes produced records
    /// to `out_path` with the same header. Output file is indexed afterwards.
    /// Returns the number of input and output records.
    pub fn rewrite<F>(&self, out_path: &Path, mut f: F) -> crate::Result<(u64, u64)>
    where F: FnMut(&AlignedRead) -> crate::Result<Option<bam::Record>>,
    {
        let mut reader = self.open()?;
        let header = bam::Header::from_template(reader.header());
        reader.fetch_all()?;
        let mut writer = bam::Writer::from_path(out_path, &header, bam::Format::Bam)?;
        let mut progress = Progress::new("reads", None);
        let mut written = 0;
        let mut read = AlignedRead::new();
        while reader.read_next(&mut read)? {
            if let Some(record) = f(&read)? {
                writer.write(&record)?;
                written += 1;
            }
            progress.inc(1);
        }
        std::mem::drop(writer);
        progress.finish();
        // Use 1 thread.
        bam::index::build(out_path, None, bam::index::Type::Bai, 1)?;
        log::info!("    Wrote {} / {} reads to {}", written, progress.done(), ext::fmt::path(out_path));
        Ok((progress.done(), written))
    }
}

impl AlnSource for BamLocation {
    fn ref_len(&self) -> u32 {
        self.ref_len
    }

    fn for_each_read<F>(&self, mut f: F) -> crate::Result<()>
    where F: FnMut(&ReadView) -> crate::Result<()>,
    {
        let mut reader = self.open()?;
        reader.fetch_all()?;
        let mut read = AlignedRead::new();
        while reader.read_next(&mut read)? {
            f(&read.view())?;
        }
        Ok(())
    }

    fn base_matrix(&self, start: u32, end: u32) -> crate::Result<BaseMatrix> {
        let mut reader = self.open()?;
        reader.fetch_window(start, end)?;
        let mut matrix = BaseMatrix::new(start, end);
        let mut read = AlignedRead::new();
        while reader.read_next(&mut read)? {
            matrix.push_read(read.aln());
        }
        Ok(matrix)
    }
}

/// BAM record together with its CIGAR and calls in reference coordinates.
pub struct AlignedRead {
    record: bam::Record,
    cigar: Cigar,
    aln: AlignedSeq,
}

impl AlignedRead {
    pub fn new() -> Self {
        Self {
            record: bam::Record::new(),
            cigar: Cigar::new(),
            aln: AlignedSeq::default(),
        }
    }

    /// Creates a read from an already loaded record.
    pub fn from_record(record: bam::Record) -> crate::Result<Self> {
        let mut read = Self {
            record,
            cigar: Cigar::new(),
            aln: AlignedSeq::default(),
        };
        read.decode()?;
        Ok(read)
    }

    /// Recalculates CIGAR and calls after the record was replaced.
    fn decode(&mut self) -> crate::Result<()> {
        self.cigar = Cigar::from_raw(&self.record).map_err(|e| match e {
            Error::InvalidData(msg) => error!(InvalidData, "Read {}: {}", String::from_utf8_lossy(self.record.qname()), msg),
            e => e,
        })?;
        self.aln.start = u32::try_from(self.record.pos()).map_err(|_| error!(InvalidData,
            "Read {} has invalid position {}", String::from_utf8_lossy(self.record.qname()), self.record.pos()))?;
        let query_seq = self.record.seq().as_bytes();
        self.cigar.ref_calls(&query_seq, &mut self.aln.calls);
        Ok(())
    }

    #[inline]
    pub fn record(&self) -> &bam::Record {
        &self.record
    }

    #[inline]
    pub fn aln(&self) -> &AlignedSeq {
        &self.aln
    }

    #[inline]
    pub fn name(&self) -> &[u8] {
        self.record.qname()
    }

    /// Number of query bases (soft clipping included, hard clipping excluded).
    #[inline]
    pub fn query_len(&self) -> u32 {
        self.cigar.query_len()
    }

    pub fn view(&self) -> ReadView<'_> {
        ReadView {
            name: self.name(),
            query_len: self.query_len(),
            aln: &self.aln,
        }
    }
}

/// Opened indexed BAM reader; only reads, aligned to the first reference sequence, are reported.
pub struct BamReader {
    reader: bam::IndexedReader,
}

impl BamReader {
    pub fn header(&self) -> &bam::HeaderView {
        self.reader.header()
    }

    /// Starts iteration over all reads aligned to the reference sequence.
    pub fn fetch_all(&mut self) -> crate::Result<()> {
        self.reader.fetch(bam::FetchDefinition::CompleteTid(0))?;
        Ok(())
    }

    /// Starts iteration over all reads overlapping `[start, end)`.
    pub fn fetch_window(&mut self, start: u32, end: u32) -> crate::Result<()> {
        self.reader.fetch(bam::FetchDefinition::Region(0, i64::from(start), i64::from(end)))?;
        Ok(())
    }

    /// Loads next mapped read. Returns false if there are no more reads.
    pub fn read_next(&mut self, read: &mut AlignedRead) -> crate::Result<bool> {
        while self.reader.read(&mut read.record).transpose()?.is_some() {
            if read.record.is_unmapped() || read.record.tid() != 0 {
                continue;
            }
            read.decode()?;
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use htslib::bam::record::{Cigar as HtsCigar, CigarString};

    #[test]
    fn calls_outside() {
        let aln = AlignedSeq::new(10, b"AC-T".to_vec());
        assert_eq!(aln.end(), 14);
        assert_eq!(aln.call_at(9), crate::seq::MISSING);
        assert_eq!(aln.call_at(12), b'-');
        assert_eq!(aln.call_at(14), crate::seq::MISSING);
    }

    #[test]
    fn decode_record() {
        let mut record = bam::Record::new();
        let cigar = CigarString(vec![HtsCigar::SoftClip(1), HtsCigar::Match(3), HtsCigar::Del(2),
            HtsCigar::Ins(1), HtsCigar::Match(2)]);
        record.set(b"read1", Some(&cigar), b"TACGAGT", &[30; 7]);
        record.set_tid(0);
        record.set_pos(5);
        record.unset_unmapped();
        let read = AlignedRead::from_record(record).unwrap();
        assert_eq!(read.aln().start(), 5);
        assert_eq!(read.aln().calls(), b"ACG--GT");
        assert_eq!(read.query_len(), 7);
        assert_eq!(read.name(), b"read1");
    }

    #[test]
    fn index_lookup() {
        let dir = mem::temp_dir("index");
        let path = dir.join("reads.bam");
        let records = vec![mem::record("r1", 0, vec![HtsCigar::Match(4)], b"ACGT")];
        mem::write_unindexed_bam(&path, 10, &records).unwrap();
        assert!(matches!(BamLocation::new(&path, None), Err(Error::InvalidInput(_))));
        assert!(matches!(BamLocation::new(&path, Some(dir.join("absent.bai"))), Err(Error::InvalidInput(_))));

        bam::index::build(&path, None, bam::index::Type::Csi(14), 1).unwrap();
        let location = BamLocation::new(&path, None).unwrap();
        assert_eq!(location.index(), ext::sys::append_path(&path, ".csi"));
        assert_eq!((location.ref_name(), location.ref_len()), ("ref", 10));

        // BAI index is preferred.
        bam::index::build(&path, None, bam::index::Type::Bai, 1).unwrap();
        let location = BamLocation::new(&path, None).unwrap();
        assert_eq!(location.index(), ext::sys::append_path(&path, ".bai"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
