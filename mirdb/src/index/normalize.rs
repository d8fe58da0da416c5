use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::BuildConfig;
use crate::error::{DbError, Result};
use crate::record::SequenceRecord;
use crate::util::dna;

/// 已接受序列在 reference buffer 中的区间 [offset, offset + len)，不含结尾的 `$`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqSpan {
    pub offset: usize,
    pub len: usize,
}

/// 单条记录的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    Accepted(SeqSpan),
    /// 短于最小有效长度：仍然收录，仅告警
    Flagged(SeqSpan),
    /// 短于 k：不进入任何 buffer
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeStats {
    pub seen: usize,
    pub accepted: usize,
    pub skipped_short: usize,
    pub flagged_short: usize,
}

/// 大写化、`_`/`.` -> N，并校验只含 [A-Z@]
pub fn normalize(rec: &SequenceRecord) -> Result<Vec<u8>> {
    let seq = dna::normalize_seq(&rec.seq);
    if let Some((position, byte)) = dna::first_invalid(&seq) {
        return Err(DbError::InvalidCharacter { id: rec.id_lossy(), byte, position });
    }
    Ok(seq)
}

/// 参考序列集合：拼接后的序列（每条以 `$` 结尾）与 id（每个以 `\n` 结尾），
/// 两者只按遍历顺序对应。
#[derive(Debug, Clone)]
pub struct ReferenceSet {
    kmer_len: usize,
    min_valid_len: usize,
    ref_seqs: Vec<u8>,
    ref_ids: Vec<u8>,
    spans: Vec<SeqSpan>,
    stats: NormalizeStats,
}

impl ReferenceSet {
    pub fn new(kmer_len: usize, min_valid_len: usize) -> Self {
        Self {
            kmer_len,
            min_valid_len,
            ref_seqs: Vec::new(),
            ref_ids: Vec::new(),
            spans: Vec::new(),
            stats: NormalizeStats::default(),
        }
    }

    /// 按顺序消费全部记录；任何非法字符都会中止整个构建
    pub fn from_records<I>(records: I, cfg: &BuildConfig) -> Result<Self>
    where
        I: IntoIterator<Item = SequenceRecord>,
    {
        let mut set = Self::new(cfg.kmer_len, cfg.min_valid_len);
        for rec in records {
            set.push(&rec)?;
        }
        Ok(set)
    }

    pub fn push(&mut self, rec: &SequenceRecord) -> Result<Acceptance> {
        self.stats.seen += 1;
        let seq = normalize(rec)?;

        if seq.len() < self.kmer_len {
            warn!(
                id = %rec.id_lossy(),
                seq = %String::from_utf8_lossy(&seq),
                "discarding sequence shorter than k-mer length {}",
                self.kmer_len
            );
            self.stats.skipped_short += 1;
            return Ok(Acceptance::Skipped);
        }

        let span = SeqSpan { offset: self.ref_seqs.len(), len: seq.len() };
        self.ref_seqs.extend_from_slice(&seq);
        self.ref_seqs.push(dna::SEQ_TERMINATOR);
        self.ref_ids.extend_from_slice(&rec.id);
        self.ref_ids.push(b'\n');
        self.spans.push(span);
        self.stats.accepted += 1;

        if seq.len() < self.min_valid_len {
            warn!(
                id = %rec.id_lossy(),
                seq = %String::from_utf8_lossy(&seq),
                "sequence shorter than minimum valid length {} (kept)",
                self.min_valid_len
            );
            self.stats.flagged_short += 1;
            return Ok(Acceptance::Flagged(span));
        }
        Ok(Acceptance::Accepted(span))
    }

    pub fn kmer_len(&self) -> usize {
        self.kmer_len
    }

    pub fn ref_seqs(&self) -> &[u8] {
        &self.ref_seqs
    }

    pub fn ref_ids(&self) -> &[u8] {
        &self.ref_ids
    }

    pub fn spans(&self) -> &[SeqSpan] {
        &self.spans
    }

    /// 第 i 条已接受序列（不含 `$`）
    pub fn seq(&self, i: usize) -> Option<&[u8]> {
        let s = self.spans.get(i)?;
        self.ref_seqs.get(s.offset..s.offset + s.len)
    }

    pub fn stats(&self) -> NormalizeStats {
        self.stats
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, seq: &str) -> SequenceRecord {
        SequenceRecord::new(id, "", seq)
    }

    #[test]
    fn offsets_advance_by_len_plus_terminator() {
        let mut set = ReferenceSet::new(9, 18);
        let a = set.push(&rec("a", "acgtacgtacgtacgtacgt")).unwrap();
        let b = set.push(&rec("b", "TTTTTTTTTTTTTTTTTTTT")).unwrap();
        assert_eq!(a, Acceptance::Accepted(SeqSpan { offset: 0, len: 20 }));
        assert_eq!(b, Acceptance::Accepted(SeqSpan { offset: 21, len: 20 }));
        assert_eq!(set.ref_seqs().len(), 42);
        assert_eq!(set.ref_seqs()[20], b'$');
        assert_eq!(set.ref_seqs()[41], b'$');
        assert_eq!(set.ref_ids(), b"a\nb\n");
        assert_eq!(set.seq(0), Some(&b"ACGTACGTACGTACGTACGT"[..]));
        assert_eq!(set.seq(1), Some(&b"TTTTTTTTTTTTTTTTTTTT"[..]));
        assert_eq!(set.seq(2), None);
    }

    #[test]
    fn short_sequences_are_skipped_or_flagged() {
        let mut set = ReferenceSet::new(9, 18);
        assert_eq!(set.push(&rec("k-1", "ACGTACGT")).unwrap(), Acceptance::Skipped);
        let flagged = set.push(&rec("k", "ACGTACGTA")).unwrap();
        assert_eq!(flagged, Acceptance::Flagged(SeqSpan { offset: 0, len: 9 }));
        assert_eq!(set.ref_seqs(), b"ACGTACGTA$");
        assert_eq!(set.ref_ids(), b"k\n");

        let stats = set.stats();
        assert_eq!(stats.seen, 2);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.skipped_short, 1);
        assert_eq!(stats.flagged_short, 1);
    }

    #[test]
    fn placeholders_become_wildcards() {
        let mut set = ReferenceSet::new(3, 0);
        set.push(&rec("p", "ac_g.t")).unwrap();
        assert_eq!(set.ref_seqs(), b"ACNGNT$");
    }

    #[test]
    fn invalid_character_aborts() {
        let mut set = ReferenceSet::new(3, 0);
        let err = set.push(&rec("bad", "ACG-TT")).unwrap_err();
        match err {
            DbError::InvalidCharacter { id, byte, position } => {
                assert_eq!(id, "bad");
                assert_eq!(byte, b'-');
                assert_eq!(position, 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(set.is_empty());
    }

    #[test]
    fn strand_delimiter_is_allowed() {
        let mut set = ReferenceSet::new(3, 0);
        assert!(matches!(set.push(&rec("s", "ACG@@@CGT")).unwrap(), Acceptance::Accepted(_)));
    }
}
