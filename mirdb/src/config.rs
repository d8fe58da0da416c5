use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};

/// 默认 k-mer 长度。改变它会改变二进制格式，读取端必须同步修改。
pub const DEFAULT_KMER_LEN: usize = 9;
/// 低于此长度的序列只告警，不影响索引
pub const DEFAULT_MIN_VALID_LEN: usize = 18;
/// 打包后的 k-mer 须为非负 i32，且读取端按 4^K 建查找表
pub const MAX_KMER_LEN: usize = 15;

/// 构建参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub kmer_len: usize,
    pub min_valid_len: usize,
    /// gzip 压缩级别 0..=9
    pub compression_level: u32,
    /// None 或 1 表示单线程；>1 时并行抽取 k-mer，合并时保持遇到顺序
    pub threads: Option<usize>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            kmer_len: DEFAULT_KMER_LEN,
            min_valid_len: DEFAULT_MIN_VALID_LEN,
            compression_level: 6,
            threads: None,
        }
    }
}

impl BuildConfig {
    pub fn with_kmer_len(mut self, k: usize) -> Self {
        self.kmer_len = k;
        self
    }

    pub fn with_min_valid_len(mut self, n: usize) -> Self {
        self.min_valid_len = n;
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    pub fn with_threads(mut self, n: usize) -> Self {
        self.threads = Some(n);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.kmer_len == 0 || self.kmer_len > MAX_KMER_LEN {
            return Err(DbError::InvalidKmerLength(self.kmer_len));
        }
        // 反序列化得到的配置不经过 with_compression_level
        if self.compression_level > 9 {
            return Err(DbError::InvalidCompressionLevel(self.compression_level));
        }
        Ok(())
    }

    pub(crate) fn parallel_threads(&self) -> Option<usize> {
        self.threads.filter(|&n| n > 1)
    }
}

/// 进入核心之前对记录的预处理
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareOptions {
    /// 输入为 RNA，U -> T
    pub rna: bool,
    /// 正反链拼接为一条记录（rnatype 数据库）
    pub strand_pair: bool,
}
