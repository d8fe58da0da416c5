use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::config::BuildConfig;
use crate::error::Result;
use crate::index::codec::{self, Database, SectionSizes};
use crate::index::kmer::KmerIndex;
use crate::index::normalize::{NormalizeStats, ReferenceSet};
use crate::record::SequenceRecord;

/// 一次构建的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    #[serde(flatten)]
    pub sequences: NormalizeStats,
    pub distinct_kmers: usize,
    pub positions: usize,
    pub sections: SectionSizes,
    pub zero_terminal: bool,
}

impl BuildStats {
    /// 没有任何序列被接受：合法的空数据库，而不是失败的构建
    pub fn is_empty(&self) -> bool {
        self.sequences.accepted == 0
    }
}

/// 构建元信息，可写成 JSON 放在数据库旁边
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub output: PathBuf,
    pub sequences_file: Option<PathBuf>,
    pub build_args: Option<String>,
    pub build_timestamp: String,
    pub compressed_bytes: u64,
    pub config: BuildConfig,
    pub stats: BuildStats,
}

impl BuildReport {
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).map_err(std::io::Error::from)?;
        write_atomically(path, text.as_bytes())
    }
}

/// 归一化 -> 建索引 -> 编码，返回未压缩的字节流。纯函数，不触碰文件系统。
pub fn encode_records<I>(records: I, cfg: &BuildConfig) -> Result<(Vec<u8>, BuildStats)>
where
    I: IntoIterator<Item = SequenceRecord>,
{
    cfg.validate()?;
    let set = ReferenceSet::from_records(records, cfg)?;
    let stats = set.stats();
    info!(
        seen = stats.seen,
        accepted = stats.accepted,
        skipped = stats.skipped_short,
        flagged = stats.flagged_short,
        "reference sequences normalized"
    );
    if set.is_empty() {
        warn!("no sequences accepted, the database will be empty");
    }

    let index = match cfg.parallel_threads() {
        Some(n) => KmerIndex::build_parallel(&set, n)?,
        None => KmerIndex::build(&set)?,
    };
    let encoded = codec::encode(&set, &index)?;

    let stats = BuildStats {
        sequences: stats,
        distinct_kmers: index.len(),
        positions: index.position_count(),
        sections: encoded.sizes,
        zero_terminal: encoded.zero_terminal,
    };
    Ok((encoded.bytes, stats))
}

/// gzip 封装，内部不再有其他分帧
pub fn compress(bytes: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut enc = GzEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::new(level));
    enc.write_all(bytes)?;
    Ok(enc.finish()?)
}

pub fn decompress<R: Read>(reader: R) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    MultiGzDecoder::new(reader).read_to_end(&mut out)?;
    Ok(out)
}

/// 先写同目录下的临时文件并 fsync，再 rename 覆盖目标；失败时目标文件保持不变
pub fn write_atomically(dest: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;
    let mut tmp = NamedTempFile::new_in(&parent)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

/// 构建并写出压缩后的数据库
pub fn build_database<I>(records: I, cfg: &BuildConfig, dest: &Path) -> Result<BuildReport>
where
    I: IntoIterator<Item = SequenceRecord>,
{
    let (raw, stats) = encode_records(records, cfg)?;
    let gz = compress(&raw, cfg.compression_level)?;
    write_atomically(dest, &gz)?;
    info!(
        path = %dest.display(),
        raw_bytes = raw.len(),
        compressed_bytes = gz.len(),
        "database written"
    );

    Ok(BuildReport {
        output: dest.to_path_buf(),
        sequences_file: None,
        build_args: None,
        build_timestamp: chrono::Utc::now().to_rfc3339(),
        compressed_bytes: gz.len() as u64,
        config: cfg.clone(),
        stats,
    })
}

impl Database {
    pub fn load(path: &Path) -> Result<Self> {
        let fh = File::open(path)?;
        let raw = decompress(BufReader::new(fh))?;
        Database::from_bytes(&raw)
    }
}
