/// 通配符：`_` 与 `.` 归一化后变为 N
pub const WILDCARD: u8 = b'N';
/// 序列终止符，写在 reference buffer 中每条序列之后
pub const SEQ_TERMINATOR: u8 = b'$';
/// 正反链拼接时使用的分隔符
pub const STRAND_DELIMITER: u8 = b'@';

/// 2-bit 编码：A=00, C=01, G=10, T=11；其他字符返回 None
#[inline]
pub fn to_code(b: u8) -> Option<u32> {
    match b {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

#[inline]
pub fn from_code(code: u32) -> u8 {
    match code & 0b11 {
        0 => b'A',
        1 => b'C',
        2 => b'G',
        _ => b'T',
    }
}

#[inline]
pub fn is_acgt(b: u8) -> bool {
    matches!(b, b'A' | b'C' | b'G' | b'T')
}

/// 窗口内全部为 ACGT 时才可作为 k-mer 锚点（N 与 @ 均排除）
#[inline]
pub fn is_indexable(window: &[u8]) -> bool {
    window.iter().all(|&b| is_acgt(b))
}

/// 大写化，并把 `_` / `.` 替换成 N。不做合法性检查，见 [`first_invalid`]。
pub fn normalize_seq(seq: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(seq.len());
    for &b in seq {
        let nb = match b.to_ascii_uppercase() {
            b'_' | b'.' => WILDCARD,
            up => up,
        };
        out.push(nb);
    }
    out
}

/// 返回第一个不在 [A-Z@] 中的字节及其位置
pub fn first_invalid(seq: &[u8]) -> Option<(usize, u8)> {
    seq.iter()
        .enumerate()
        .find(|&(_, &b)| !(b.is_ascii_uppercase() || b == STRAND_DELIMITER))
        .map(|(i, &b)| (i, b))
}

/// 按 2-bit 打包 k-mer，最早的碱基位于最高位。
/// 含非 ACGT 字符、为空或长度超过 16 时返回 None。
#[inline]
pub fn try_pack_kmer(kmer: &[u8]) -> Option<u32> {
    if kmer.is_empty() || kmer.len() > 16 {
        return None;
    }
    kmer.iter().try_fold(0u32, |acc, &b| Some((acc << 2) | to_code(b)?))
}

pub fn unpack_kmer(packed: u32, k: usize) -> Vec<u8> {
    (0..k).rev().map(|i| from_code(packed >> (2 * i))).collect()
}

#[inline]
pub fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        _ => WILDCARD,
    }
}

pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(seq.len());
    for &b in seq.iter().rev() {
        out.push(complement(b));
    }
    out
}

pub fn back_transcribe(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .map(|&b| match b {
            b'U' => b'T',
            b'u' => b't',
            other => other,
        })
        .collect()
}
