//! 演示如何在 library 模式下构建并查询 k-mer 数据库。
//!
//! 运行方式：
//! ```bash
//! cargo run --example build_db
//! ```

use mirdb::index::codec::Database;
use mirdb::index::db::{compress, encode_records};
use mirdb::record::strand_paired;
use mirdb::util::dna;
use mirdb::{BuildConfig, SequenceRecord};

fn main() -> mirdb::Result<()> {
    // 1. 参考序列（RNA）
    let records = vec![
        SequenceRecord::new("hsa-let-7a-5p", "", "UGAGGUAGUAGGUUGUAUAGUU"),
        SequenceRecord::new("hsa-miR-21-5p", "", "UAGCUUAUCAGACUGAUGUUGA"),
        SequenceRecord::new("hsa-miR-16-5p", "", "UAGCAGCACGUAAAUAUUGGCG"),
    ];
    println!("参考序列: {} 条", records.len());

    // 2. 正反链拼接（rnatype 数据库的做法）
    let paired = strand_paired(records);
    for r in &paired {
        println!("  {}: {}", String::from_utf8_lossy(&r.id), String::from_utf8_lossy(&r.seq));
    }

    // 3. 编码与压缩
    let cfg = BuildConfig::default();
    let (raw, stats) = encode_records(paired, &cfg)?;
    let gz = compress(&raw, cfg.compression_level)?;
    println!(
        "\n编码完成：{} 个 k-mer，{} 个位置，原始 {} 字节，压缩后 {} 字节",
        stats.distinct_kmers,
        stats.positions,
        raw.len(),
        gz.len()
    );

    // 4. 解码并查询
    let db = Database::from_bytes(&raw)?;
    let read = b"TAGCTTATCAGACTGATG";
    for (i, window) in read.windows(cfg.kmer_len).enumerate() {
        if let Some(offsets) = db.lookup(window, cfg.kmer_len) {
            for off in offsets {
                let seq_idx = db.ref_seq_index(off as usize).unwrap_or_default();
                println!(
                    "  read[{}..{}] {} -> {} @ {}",
                    i,
                    i + cfg.kmer_len,
                    String::from_utf8_lossy(window),
                    db.ref_seq_id(seq_idx).unwrap_or("?"),
                    off
                );
            }
        }
    }

    // 5. 反向互补的 read 也能命中同一条参考序列
    let rc = dna::revcomp(read);
    let hits = rc
        .windows(cfg.kmer_len)
        .filter(|w| db.lookup(w, cfg.kmer_len).is_some())
        .count();
    println!("\n反向互补 read 命中 {} 个窗口", hits);

    println!("\n完成！");
    Ok(())
}
