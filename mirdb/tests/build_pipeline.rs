use std::collections::HashMap;
use std::io::Cursor;

use proptest::prelude::*;

use mirdb::index::codec::{Database, HEADER_LEN};
use mirdb::io::fasta::FastaReader;
use mirdb::util::dna;
use mirdb::{encode_records, prepare_records, BuildConfig, PrepareOptions, SequenceRecord};

fn cfg(k: usize) -> BuildConfig {
    BuildConfig::default().with_kmer_len(k).with_min_valid_len(0)
}

fn records(seqs: &[Vec<u8>]) -> Vec<SequenceRecord> {
    seqs.iter()
        .enumerate()
        .map(|(i, s)| SequenceRecord::new(format!("ref{i}"), "", s.clone()))
        .collect()
}

/// 直接扫描每条被接受的序列，得到期望的 k-mer -> 偏移
fn naive_index(seqs: &[Vec<u8>], k: usize) -> HashMap<Vec<u8>, Vec<u32>> {
    let mut out: HashMap<Vec<u8>, Vec<u32>> = HashMap::new();
    let mut base = 0usize;
    for s in seqs {
        let s = dna::normalize_seq(s);
        if s.len() < k {
            continue;
        }
        for i in 0..=s.len() - k {
            let w = &s[i..i + k];
            if w.iter().all(|b| b"ACGT".contains(b)) {
                out.entry(w.to_vec()).or_default().push((base + i) as u32);
            }
        }
        base += s.len() + 1;
    }
    out
}

#[test]
fn single_nine_mer_example() {
    let recs = vec![SequenceRecord::new("s1", "", "ACGTACGTA")];
    let (raw, stats) = encode_records(recs, &BuildConfig::default()).unwrap();
    assert_eq!(stats.distinct_kmers, 1);
    assert_eq!(stats.positions, 1);
    assert!(stats.zero_terminal);

    let db = Database::from_bytes(&raw).unwrap();
    assert_eq!(db.lookup(b"ACGTACGTA", 9), Some(vec![0]));
    assert_eq!(db.raw_positions(), &[0]);
}

#[test]
fn k_minus_one_excluded_everywhere() {
    let recs = vec![
        SequenceRecord::new("short", "", "ACGTACGT"),
        SequenceRecord::new("exact", "", "TTTTGGGGC"),
    ];
    let (raw, stats) = encode_records(recs, &BuildConfig::default()).unwrap();
    let db = Database::from_bytes(&raw).unwrap();
    assert_eq!(db.ref_seqs(), b"TTTTGGGGC$");
    assert_eq!(db.ref_ids(), &["exact".to_string()]);
    assert_eq!(stats.positions, 1);
    assert_eq!(db.lookup(b"TTTTGGGGC", 9), Some(vec![0]));
}

#[test]
fn wildcards_stay_in_reference_but_not_in_index() {
    let seq = "ACGTTGCAANNACGTTGCAAG";
    let recs = vec![SequenceRecord::new("n", "", seq)];
    let (raw, _) = encode_records(recs, &cfg(9)).unwrap();
    let db = Database::from_bytes(&raw).unwrap();
    assert_eq!(db.ref_seq(0), Some(seq.as_bytes()));
    for (_, offsets) in db.iter_runs() {
        for off in offsets {
            let window = &db.ref_seqs()[off as usize..off as usize + 9];
            assert!(!window.contains(&b'N'));
        }
    }
    assert_eq!(db.position_count(), 3);
}

#[test]
fn shared_kmer_across_sequences() {
    let recs = vec![
        SequenceRecord::new("a", "", "GATTACAGATTACA"),
        SequenceRecord::new("b", "", "CCCGATTACAGAT"),
    ];
    let (raw, _) = encode_records(recs, &cfg(9)).unwrap();
    let db = Database::from_bytes(&raw).unwrap();
    // a: 偏移 0..14，b 从 15 开始，GATTACAGA 在 b 中位于 3
    assert_eq!(db.lookup(b"GATTACAGA", 9), Some(vec![0, 18]));
}

#[test]
fn strand_paired_fasta_end_to_end() {
    let fasta = b">mmu-miR-1a-3p MIMAT0000123\nUGGAAUGUAAAGAAGUAUGUAU\n>mmu-miR-122-5p\nUGGAGUGUGACAAUGGUGUUUG\n";
    let recs: Vec<_> = FastaReader::new(Cursor::new(&fasta[..]))
        .collect::<mirdb::Result<_>>()
        .unwrap();
    let recs = prepare_records(recs, PrepareOptions { rna: true, strand_pair: true });
    let (raw, _) = encode_records(recs, &BuildConfig::default()).unwrap();
    let db = Database::from_bytes(&raw).unwrap();

    assert_eq!(db.ref_ids(), &["seq_0".to_string(), "seq_1".to_string()]);
    // 反向互补 read 的 k-mer 也能落到同一条参考序列
    let rc = dna::revcomp(b"TGGAATGTAAAGAAGTATGTAT");
    let offsets = db.lookup(&rc[..9], 9).unwrap();
    assert!(offsets.iter().all(|&o| db.ref_seq_index(o as usize) == Some(0)));
    // 没有窗口跨越 @@@
    for (_, offsets) in db.iter_runs() {
        for off in offsets {
            assert!(!db.ref_seqs()[off as usize..off as usize + 9].contains(&b'@'));
        }
    }
}

#[test]
fn parallel_and_sequential_builds_are_byte_identical() {
    let seqs: Vec<Vec<u8>> = (0..40)
        .map(|i| {
            let unit = ["ACGTTGCA", "GGATCCNA", "TTAGGCAT", "CAT@GGCA"][i % 4];
            unit.repeat(3 + i % 5).into_bytes()
        })
        .collect();
    let (a, _) = encode_records(records(&seqs), &cfg(7)).unwrap();
    let (b, _) = encode_records(records(&seqs), &cfg(7).with_threads(4)).unwrap();
    assert_eq!(a, b);
}

fn seq_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(b"ACGTACGTacgtN_.@".to_vec()), 0..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_round_trip_matches_naive_scan(
        k in 1usize..=9,
        seqs in prop::collection::vec(seq_strategy(), 0..12),
    ) {
        let (raw, stats) = encode_records(records(&seqs), &cfg(k)).unwrap();
        let db = Database::from_bytes(&raw).unwrap();
        let expected = naive_index(&seqs, k);

        prop_assert_eq!(db.kmer_count(), expected.len());
        prop_assert_eq!(db.position_count(), stats.positions);
        for (kmer, offsets) in &expected {
            let got = db.lookup(kmer, k);
            prop_assert_eq!(got.as_ref(), Some(offsets));
        }

        // 接受的序列数与 id 数一致
        let accepted = seqs.iter().filter(|s| s.len() >= k).count();
        prop_assert_eq!(db.ref_seq_count(), accepted);
        prop_assert_eq!(db.ref_ids().len(), accepted);
    }

    #[test]
    fn prop_every_run_has_one_terminal_marker(
        seqs in prop::collection::vec(seq_strategy(), 1..12),
    ) {
        let (raw, _) = encode_records(records(&seqs), &cfg(4)).unwrap();
        let db = Database::from_bytes(&raw).unwrap();
        let raw_pos = db.raw_positions();

        let table_at = HEADER_LEN
            + u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
            + u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]) as usize;
        let n_kmers = db.kmer_count();
        let mut starts: Vec<usize> = (0..n_kmers)
            .map(|i| {
                let p = table_at + i * 8 + 4;
                i32::from_be_bytes([raw[p], raw[p + 1], raw[p + 2], raw[p + 3]]) as usize
            })
            .collect();
        starts.push(raw_pos.len());

        for w in starts.windows(2) {
            let run = &raw_pos[w[0]..w[1]];
            let last = run.len() - 1;
            prop_assert!(run[..last].iter().all(|&p| p >= 0));
            // 偏移 0 作为末项时无法取负
            prop_assert!(run[last] < 0 || (run[last] == 0 && w[0] == w[1] - 1));
        }
    }

    #[test]
    fn prop_binary_search_reports_absence(
        seqs in prop::collection::vec(seq_strategy(), 1..8),
        query in prop::collection::vec(prop::sample::select(b"ACGT".to_vec()), 5),
    ) {
        let (raw, _) = encode_records(records(&seqs), &cfg(5)).unwrap();
        let db = Database::from_bytes(&raw).unwrap();
        let expected = naive_index(&seqs, 5);
        prop_assert_eq!(db.lookup(&query, 5).is_some(), expected.contains_key(&query));
    }
}
