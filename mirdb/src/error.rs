use std::fmt;

/// 数据库构建 / 解析过程中的统一结果类型
pub type Result<T> = std::result::Result<T, DbError>;

/// 序列化后的四个分区，用于报错和统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    RefSeqs,
    RefSeqIds,
    KmerTable,
    PositionList,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::RefSeqs => "reference sequences",
            Section::RefSeqIds => "reference sequence ids",
            Section::KmerTable => "k-mer table",
            Section::PositionList => "position list",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DbError {
    /// 归一化之后仍含有 [A-Z@] 以外的字符，整个构建中止
    #[error("invalid character {:?} at position {position} in sequence '{id}'", as_char(.byte))]
    InvalidCharacter { id: String, byte: u8, position: usize },

    #[error("{section} section is {len} bytes, exceeds the 32-bit size limit")]
    SectionTooLarge { section: Section, len: usize },

    #[error("duplicate sequence id: '{0}'")]
    DuplicateIdentifier(String),

    #[error("k-mer length {0} is out of range (1..=15)")]
    InvalidKmerLength(usize),

    #[error("gzip compression level {0} is out of range (0..=9)")]
    InvalidCompressionLevel(u32),

    /// 全局偏移必须能以 i32 存储（末尾项取负）
    #[error("global offset {0} does not fit a signed 32-bit position entry")]
    OffsetTooLarge(usize),

    #[error("could not parse FASTA id line: {0:?}")]
    MalformedHeader(String),

    #[error("malformed database: {0}")]
    Format(String),

    #[error("could not start k-mer extraction workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn as_char(b: &u8) -> char {
    char::from(*b)
}

impl DbError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        DbError::Format(msg.into())
    }
}
