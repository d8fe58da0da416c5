//! 数据库二进制格式（解压后），所有整数均为 big-endian：
//!
//! ```text
//! u32 len(ref_seqs) | u32 len(ref_seq_ids) | u32 len(kmer_table) | u32 len(pos_list)
//! ref_seqs      每条序列后跟 '$'
//! ref_seq_ids   每个 id 后跟 '\n'，与 ref_seqs 按顺序对应
//! kmer_table    重复 (i32 packed_kmer, i32 pos_list 起始下标)，按 packed_kmer 升序
//! pos_list      重复 i32 全局偏移，每个 run 的最后一项取负
//! ```
//!
//! 偏移 0 作为 run 末项时无法用符号区分（-0 == 0）。写出时保持原样以兼容现有读取端；
//! [`Database`] 用 k-mer 表中的起始下标确定 run 边界，不依赖符号。

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use tracing::{debug, warn};

use crate::error::{DbError, Result, Section};
use crate::index::kmer::KmerIndex;
use crate::index::normalize::ReferenceSet;
use crate::util::dna;

pub const HEADER_LEN: usize = 16;
const INT_SIZE: usize = 4;
const TABLE_ENTRY_SIZE: usize = 2 * INT_SIZE;

/// 各分区字节数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SectionSizes {
    pub ref_seqs: u32,
    pub ref_seq_ids: u32,
    pub kmer_table: u32,
    pub pos_list: u32,
}

impl SectionSizes {
    pub fn total(&self) -> usize {
        HEADER_LEN
            + self.ref_seqs as usize
            + self.ref_seq_ids as usize
            + self.kmer_table as usize
            + self.pos_list as usize
    }
}

/// 编码结果
#[derive(Debug, Clone)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub sizes: SectionSizes,
    /// 是否出现了以偏移 0 结尾的 run（符号哨兵失效）
    pub zero_terminal: bool,
}

fn section_len(section: Section, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| DbError::SectionTooLarge { section, len })
}

/// k-mer 表与位置表。run 的最后一项取负作为结束标记。
pub fn encode_tables(index: &KmerIndex) -> Result<(Vec<u8>, Vec<u8>, bool)> {
    let runs = index.sorted_runs();
    let mut table = Vec::with_capacity(runs.len() * TABLE_ENTRY_SIZE);
    let mut positions = Vec::with_capacity(index.position_count() * INT_SIZE);
    let mut pos_offset: usize = 0;
    let mut zero_terminal = false;

    for (packed, offsets) in runs {
        let start = i32::try_from(pos_offset).map_err(|_| DbError::SectionTooLarge {
            section: Section::PositionList,
            len: pos_offset * INT_SIZE,
        })?;
        table.write_i32::<BigEndian>(packed as i32)?;
        table.write_i32::<BigEndian>(start)?;

        let last = offsets.len() - 1;
        for (j, &off) in offsets.iter().enumerate() {
            let value = i32::try_from(off).map_err(|_| DbError::OffsetTooLarge(off as usize))?;
            if j == last {
                if value == 0 {
                    zero_terminal = true;
                }
                positions.write_i32::<BigEndian>(-value)?;
            } else {
                positions.write_i32::<BigEndian>(value)?;
            }
        }
        pos_offset += offsets.len();
    }

    if zero_terminal {
        warn!(
            kmer = %String::from_utf8_lossy(&dna::unpack_kmer(first_kmer_at_zero(index), index.kmer_len())),
            "a position run ends at offset 0; readers that scan for a negative entry cannot see its end"
        );
    }
    Ok((table, positions, zero_terminal))
}

fn first_kmer_at_zero(index: &KmerIndex) -> u32 {
    index
        .sorted_runs()
        .into_iter()
        .find(|(_, offs)| offs.last() == Some(&0))
        .map_or(0, |(kmer, _)| kmer)
}

/// 把参考序列、id 与 k-mer 索引序列化为带长度头的字节流
pub fn encode(set: &ReferenceSet, index: &KmerIndex) -> Result<Encoded> {
    let (table, positions, zero_terminal) = encode_tables(index)?;

    let sizes = SectionSizes {
        ref_seqs: section_len(Section::RefSeqs, set.ref_seqs().len())?,
        ref_seq_ids: section_len(Section::RefSeqIds, set.ref_ids().len())?,
        kmer_table: section_len(Section::KmerTable, table.len())?,
        pos_list: section_len(Section::PositionList, positions.len())?,
    };
    debug!(?sizes, "encoded database sections");

    let mut bytes = Vec::with_capacity(sizes.total());
    bytes.write_u32::<BigEndian>(sizes.ref_seqs)?;
    bytes.write_u32::<BigEndian>(sizes.ref_seq_ids)?;
    bytes.write_u32::<BigEndian>(sizes.kmer_table)?;
    bytes.write_u32::<BigEndian>(sizes.pos_list)?;
    bytes.extend_from_slice(set.ref_seqs());
    bytes.extend_from_slice(set.ref_ids());
    bytes.extend_from_slice(&table);
    bytes.extend_from_slice(&positions);

    Ok(Encoded { bytes, sizes, zero_terminal })
}

/// 已解码的数据库，供查询与校验使用
#[derive(Debug, Clone)]
pub struct Database {
    ref_seqs: Vec<u8>,
    ref_ids: Vec<String>,
    /// 每条参考序列结尾 `$` 的位置
    terminators: Vec<usize>,
    kmers: Vec<u32>,
    starts: Vec<usize>,
    positions: Vec<i32>,
}

fn read_section(cur: &mut Cursor<&[u8]>, len: usize, what: Section) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    cur.read_exact(&mut buf)
        .map_err(|_| DbError::format(format!("{what} section truncated")))?;
    Ok(buf)
}

impl Database {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(DbError::format("stream shorter than the 16-byte header"));
        }
        let mut cur = Cursor::new(bytes);
        let sizes = SectionSizes {
            ref_seqs: cur.read_u32::<BigEndian>()?,
            ref_seq_ids: cur.read_u32::<BigEndian>()?,
            kmer_table: cur.read_u32::<BigEndian>()?,
            pos_list: cur.read_u32::<BigEndian>()?,
        };
        if sizes.kmer_table as usize % TABLE_ENTRY_SIZE != 0 {
            return Err(DbError::format(format!("k-mer table length {} is not a multiple of 8", sizes.kmer_table)));
        }
        if sizes.pos_list as usize % INT_SIZE != 0 {
            return Err(DbError::format(format!("position list length {} is not a multiple of 4", sizes.pos_list)));
        }
        if sizes.total() != bytes.len() {
            return Err(DbError::format(format!(
                "section lengths add up to {} bytes but stream has {}",
                sizes.total(),
                bytes.len()
            )));
        }

        let ref_seqs = read_section(&mut cur, sizes.ref_seqs as usize, Section::RefSeqs)?;
        let raw_ids = read_section(&mut cur, sizes.ref_seq_ids as usize, Section::RefSeqIds)?;
        let terminators: Vec<usize> = ref_seqs
            .iter()
            .enumerate()
            .filter(|&(_, &b)| b == dna::SEQ_TERMINATOR)
            .map(|(i, _)| i)
            .collect();
        if ref_seqs.last().is_some_and(|&b| b != dna::SEQ_TERMINATOR) {
            return Err(DbError::format("reference sequences do not end with a terminator"));
        }
        if raw_ids.last().is_some_and(|&b| b != b'\n') {
            return Err(DbError::format("reference ids do not end with a newline"));
        }
        let ref_ids: Vec<String> = raw_ids
            .split(|&b| b == b'\n')
            .take(raw_ids.iter().filter(|&&b| b == b'\n').count())
            .map(|id| String::from_utf8_lossy(id).into_owned())
            .collect();
        if ref_ids.len() != terminators.len() {
            return Err(DbError::format(format!(
                "{} reference ids for {} reference sequences",
                ref_ids.len(),
                terminators.len()
            )));
        }

        let n_kmers = sizes.kmer_table as usize / TABLE_ENTRY_SIZE;
        let mut kmers = Vec::with_capacity(n_kmers);
        let mut starts = Vec::with_capacity(n_kmers);
        for _ in 0..n_kmers {
            let kmer = cur.read_i32::<BigEndian>()?;
            let start = cur.read_i32::<BigEndian>()?;
            if kmer < 0 || start < 0 {
                return Err(DbError::format(format!("negative k-mer table entry ({kmer}, {start})")));
            }
            kmers.push(kmer as u32);
            starts.push(start as usize);
        }
        let n_positions = sizes.pos_list as usize / INT_SIZE;
        let mut positions = Vec::with_capacity(n_positions);
        for _ in 0..n_positions {
            positions.push(cur.read_i32::<BigEndian>()?);
        }

        let db = Self { ref_seqs, ref_ids, terminators, kmers, starts, positions };
        db.check_runs()?;
        Ok(db)
    }

    fn check_runs(&self) -> Result<()> {
        if self.kmers.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DbError::format("k-mer table is not strictly ascending"));
        }
        if self.starts.first().is_some_and(|&s| s != 0) {
            return Err(DbError::format("first position run does not start at 0"));
        }
        if self.kmers.is_empty() != self.positions.is_empty() {
            return Err(DbError::format("k-mer table and position list disagree on emptiness"));
        }
        for i in 0..self.kmers.len() {
            let (start, end) = self.run_bounds(i);
            if start >= end || end > self.positions.len() {
                return Err(DbError::format(format!("invalid position run [{start}, {end})")));
            }
            let run = &self.positions[start..end];
            if run[..run.len() - 1].iter().any(|&p| p < 0) {
                return Err(DbError::format(format!("negative entry inside position run [{start}, {end})")));
            }
            // 末项为 0 时无法取负，只能接受
            if run[run.len() - 1] > 0 {
                return Err(DbError::format(format!("position run [{start}, {end}) lacks a terminal marker")));
            }
            if run.iter().any(|&p| p.unsigned_abs() as usize >= self.ref_seqs.len()) {
                return Err(DbError::format("position outside the reference sequences"));
            }
        }
        Ok(())
    }

    fn run_bounds(&self, i: usize) -> (usize, usize) {
        let start = self.starts[i];
        let end = self.starts.get(i + 1).copied().unwrap_or(self.positions.len());
        (start, end)
    }

    fn run(&self, i: usize) -> Vec<u32> {
        let (start, end) = self.run_bounds(i);
        self.positions[start..end].iter().map(|p| p.unsigned_abs()).collect()
    }

    /// 按打包值二分查找
    pub fn lookup_packed(&self, packed: u32) -> Option<Vec<u32>> {
        let i = self.kmers.binary_search(&packed).ok()?;
        Some(self.run(i))
    }

    /// 查询一个 k-mer；长度不是 `kmer_len`、或含非 ACGT 字符时返回 None
    pub fn lookup(&self, kmer: &[u8], kmer_len: usize) -> Option<Vec<u32>> {
        if kmer.len() != kmer_len {
            return None;
        }
        self.lookup_packed(dna::try_pack_kmer(&kmer.to_ascii_uppercase())?)
    }

    /// 全局偏移所属的参考序列下标
    pub fn ref_seq_index(&self, offset: usize) -> Option<usize> {
        let i = match self.terminators.binary_search(&offset) {
            Ok(i) | Err(i) => i,
        };
        (i < self.terminators.len()).then_some(i)
    }

    pub fn ref_seq_id(&self, index: usize) -> Option<&str> {
        self.ref_ids.get(index).map(String::as_str)
    }

    /// 第 index 条参考序列（不含 `$`）
    pub fn ref_seq(&self, index: usize) -> Option<&[u8]> {
        let end = *self.terminators.get(index)?;
        let start = if index == 0 { 0 } else { self.terminators[index - 1] + 1 };
        Some(&self.ref_seqs[start..end])
    }

    pub fn ref_seqs(&self) -> &[u8] {
        &self.ref_seqs
    }

    pub fn ref_ids(&self) -> &[String] {
        &self.ref_ids
    }

    pub fn ref_seq_count(&self) -> usize {
        self.terminators.len()
    }

    pub fn kmer_count(&self) -> usize {
        self.kmers.len()
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terminators.is_empty()
    }

    /// 原始位置表（含符号）
    pub fn raw_positions(&self) -> &[i32] {
        &self.positions
    }

    /// (打包 k-mer, 偏移列表) 按表顺序迭代
    pub fn iter_runs(&self) -> impl Iterator<Item = (u32, Vec<u32>)> + '_ {
        (0..self.kmers.len()).map(move |i| (self.kmers[i], self.run(i)))
    }
}
