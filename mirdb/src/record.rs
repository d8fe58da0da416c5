use crate::util::dna;

/// 输入记录：(id, 描述, 原始序列)。id 唯一且非空，描述可为空。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub id: Vec<u8>,
    pub desc: Vec<u8>,
    pub seq: Vec<u8>,
}

impl SequenceRecord {
    pub fn new(id: impl Into<Vec<u8>>, desc: impl Into<Vec<u8>>, seq: impl Into<Vec<u8>>) -> Self {
        Self { id: id.into(), desc: desc.into(), seq: seq.into() }
    }

    pub fn id_lossy(&self) -> String {
        String::from_utf8_lossy(&self.id).into_owned()
    }
}

/// 正反链之间的分隔，避免 k-mer 窗口跨链
pub const STRAND_PAIR_DELIM: &[u8] = b"@@@";

/// RNA 输入：U -> T
pub fn back_transcribe_all(records: Vec<SequenceRecord>) -> Vec<SequenceRecord> {
    records
        .into_iter()
        .map(|mut r| {
            r.seq = dna::back_transcribe(&r.seq);
            r
        })
        .collect()
}

/// 把每条序列改写为 `seq@@@revcomp(seq)`，并按输入顺序重命名为 `seq_<n>`。
/// 正反链因此共用同一个 `$` 结尾的条目，查询命中任一条链都计到同一条参考序列。
pub fn strand_paired(records: Vec<SequenceRecord>) -> Vec<SequenceRecord> {
    records
        .into_iter()
        .enumerate()
        .map(|(n, r)| {
            let fwd = dna::back_transcribe(&r.seq.to_ascii_uppercase());
            let rev = dna::revcomp(&fwd);
            let mut seq = Vec::with_capacity(fwd.len() * 2 + STRAND_PAIR_DELIM.len());
            seq.extend_from_slice(&fwd);
            seq.extend_from_slice(STRAND_PAIR_DELIM);
            seq.extend_from_slice(&rev);
            SequenceRecord { id: format!("seq_{n}").into_bytes(), desc: Vec::new(), seq }
        })
        .collect()
}
