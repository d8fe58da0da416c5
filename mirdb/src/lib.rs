//! # mirdb
//!
//! 为 miRNA / tRNA / rRNA / artifact 参考序列库构建紧凑的 k-mer 位置数据库。
//!
//! 下游分类引擎拿到一条短 read 后，可以用 O(1) 的查表回答
//! "这条 read 的某个 k-mer 是否出现在参考集合中？出现在哪里？"。
//!
//! 构建流程（单遍、顺序执行）：
//!
//! - **归一化与校验**：大写化，`_` / `.` 变为 N，拒绝 [A-Z@] 以外的字符，丢弃短于 k 的序列
//! - **k-mer 索引**：滑动窗口，记录每个纯 ACGT 窗口的全局偏移
//! - **二进制编码**：四个带长度头的分区，2-bit 打包 k-mer，big-endian
//! - **压缩**：整体 gzip，原子写入目标文件
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use mirdb::{build_database, BuildConfig, Database, SequenceRecord};
//! use std::path::Path;
//!
//! let records = vec![
//!     SequenceRecord::new("hsa-let-7a-5p", "", "TGAGGTAGTAGGTTGTATAGTT"),
//!     SequenceRecord::new("hsa-miR-21-5p", "", "TAGCTTATCAGACTGATGTTGA"),
//! ];
//! let out = Path::new("rnatype.hsa.mirna.db.gz");
//! let report = build_database(records, &BuildConfig::default(), out)?;
//! println!("{} k-mers", report.stats.distinct_kmers);
//!
//! let db = Database::load(out)?;
//! if let Some(offsets) = db.lookup(b"TAGCTTATC", 9) {
//!     for off in offsets {
//!         let i = db.ref_seq_index(off as usize).unwrap_or_default();
//!         println!("{} @ {}", db.ref_seq_id(i).unwrap_or("?"), off);
//!     }
//! }
//! # Ok::<(), mirdb::DbError>(())
//! ```
//!
//! ## 模块说明
//!
//! - [`io`] — FASTA 解析
//! - [`index`] — 归一化、k-mer 索引、二进制编解码、压缩与写出
//! - [`record`] — 输入记录与预处理（RNA 反转录、正反链拼接）
//! - [`util`] — 2-bit 编码 / 反向互补等工具函数

pub mod config;
pub mod error;
pub mod index;
pub mod io;
pub mod record;
pub mod util;

pub use config::{BuildConfig, PrepareOptions};
pub use error::{DbError, Result};
pub use index::codec::Database;
pub use index::db::{build_database, compress, encode_records, BuildReport, BuildStats};
pub use record::SequenceRecord;

/// 按预处理选项改写记录
pub fn prepare_records(records: Vec<SequenceRecord>, opts: PrepareOptions) -> Vec<SequenceRecord> {
    if opts.strand_pair {
        // strand_paired 内部已做 U -> T
        record::strand_paired(records)
    } else if opts.rna {
        record::back_transcribe_all(records)
    } else {
        records
    }
}
