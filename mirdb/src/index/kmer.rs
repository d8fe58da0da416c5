use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::MAX_KMER_LEN;
use crate::error::{DbError, Result};
use crate::index::normalize::{ReferenceSet, SeqSpan};
use crate::util::dna;

/// 倒排索引：打包后的 k-mer -> 全局偏移列表（按遇到顺序，不去重）
#[derive(Debug, Clone, Default)]
pub struct KmerIndex {
    kmer_len: usize,
    runs: HashMap<u32, Vec<u32>>,
    n_positions: usize,
}

/// 序列中所有可索引窗口：(窗口起点, 打包值)。含 N 或 @ 的窗口被直接过滤。
pub fn indexable_kmers(seq: &[u8], k: usize) -> impl Iterator<Item = (usize, u32)> + '_ {
    seq.windows(k)
        .enumerate()
        .filter_map(|(i, w)| dna::try_pack_kmer(w).map(|packed| (i, packed)))
}

fn check_kmer_len(k: usize) -> Result<()> {
    if k == 0 || k > MAX_KMER_LEN {
        return Err(DbError::InvalidKmerLength(k));
    }
    Ok(())
}

/// 位置表以 i32 存储，最后一项取负，所以最大偏移不能超过 i32::MAX
fn check_span(span: SeqSpan, k: usize) -> Result<()> {
    let last = span.offset + span.len - k;
    if last > i32::MAX as usize {
        return Err(DbError::OffsetTooLarge(last));
    }
    Ok(())
}

fn extract_span(set: &ReferenceSet, span: SeqSpan, k: usize) -> Vec<(u32, u32)> {
    let seq = &set.ref_seqs()[span.offset..span.offset + span.len];
    indexable_kmers(seq, k)
        .map(|(i, packed)| (packed, (span.offset + i) as u32))
        .collect()
}

impl KmerIndex {
    pub fn new(kmer_len: usize) -> Self {
        Self { kmer_len, runs: HashMap::new(), n_positions: 0 }
    }

    /// 单线程构建：按序列顺序、序列内按位置顺序追加
    pub fn build(set: &ReferenceSet) -> Result<Self> {
        let k = set.kmer_len();
        check_kmer_len(k)?;
        let mut idx = Self::new(k);
        for &span in set.spans() {
            check_span(span, k)?;
            let seq = &set.ref_seqs()[span.offset..span.offset + span.len];
            for (i, packed) in indexable_kmers(seq, k) {
                idx.insert(packed, (span.offset + i) as u32);
            }
        }
        idx.log_summary();
        Ok(idx)
    }

    /// 多线程构建：每条序列独立抽取，`collect` 保持序列顺序，再顺序合并，
    /// 因此结果与 [`KmerIndex::build`] 完全一致。
    pub fn build_parallel(set: &ReferenceSet, threads: usize) -> Result<Self> {
        let k = set.kmer_len();
        check_kmer_len(k)?;
        for &span in set.spans() {
            check_span(span, k)?;
        }

        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
        let shards: Vec<Vec<(u32, u32)>> = pool.install(|| {
            set.spans()
                .par_iter()
                .map(|&span| extract_span(set, span, k))
                .collect()
        });
        debug!(threads, shards = shards.len(), "merging per-sequence k-mer shards");

        let mut idx = Self::new(k);
        for shard in shards {
            for (packed, offset) in shard {
                idx.insert(packed, offset);
            }
        }
        idx.log_summary();
        Ok(idx)
    }

    #[inline]
    pub fn insert(&mut self, packed: u32, offset: u32) {
        self.runs.entry(packed).or_default().push(offset);
        self.n_positions += 1;
    }

    fn log_summary(&self) {
        info!(
            k = self.kmer_len,
            distinct = self.runs.len(),
            positions = self.n_positions,
            "k-mer index built"
        );
    }

    pub fn kmer_len(&self) -> usize {
        self.kmer_len
    }

    /// 不同 k-mer 的数量
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn position_count(&self) -> usize {
        self.n_positions
    }

    pub fn get(&self, kmer: &[u8]) -> Option<&[u32]> {
        if kmer.len() != self.kmer_len {
            return None;
        }
        self.get_packed(dna::try_pack_kmer(kmer)?)
    }

    pub fn get_packed(&self, packed: u32) -> Option<&[u32]> {
        self.runs.get(&packed).map(Vec::as_slice)
    }

    /// 按打包值升序排列的 (k-mer, 偏移列表)。
    /// 对 A<C<G<T 来说，打包值的顺序与字节字典序一致。
    pub fn sorted_runs(&self) -> Vec<(u32, &[u32])> {
        let mut out: Vec<(u32, &[u32])> =
            self.runs.iter().map(|(&kmer, offs)| (kmer, offs.as_slice())).collect();
        out.sort_unstable_by_key(|&(kmer, _)| kmer);
        debug_assert!(out.windows(2).all(|w| {
            dna::unpack_kmer(w[0].0, self.kmer_len) < dna::unpack_kmer(w[1].0, self.kmer_len)
        }));
        out
    }
}
