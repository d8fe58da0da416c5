use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::{DbError, Result};
use crate::record::SequenceRecord;

pub struct FastaReader<R: BufRead> {
    reader: R,
    buf: Vec<u8>,
    done: bool,
    peek_header: Option<Vec<u8>>,
    seen_ids: HashSet<Vec<u8>>,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            done: false,
            peek_header: None,
            seen_ids: HashSet::new(),
        }
    }

    fn read_line(&mut self) -> Result<usize> {
        self.buf.clear();
        Ok(self.reader.read_until(b'\n', &mut self.buf)?)
    }

    pub fn next_record(&mut self) -> Result<Option<SequenceRecord>> {
        if self.done {
            return Ok(None);
        }

        // Find header line
        let header = if let Some(h) = self.peek_header.take() {
            h
        } else {
            loop {
                if self.read_line()? == 0 {
                    self.done = true;
                    return Ok(None);
                }
                if self.buf.first() == Some(&b'>') {
                    break self.buf[1..].to_vec();
                }
            }
        };

        let (id, desc) = split_header(&header)?;
        if !self.seen_ids.insert(id.clone()) {
            return Err(DbError::DuplicateIdentifier(String::from_utf8_lossy(&id).into_owned()));
        }

        // Read sequence lines
        let mut seq: Vec<u8> = Vec::new();
        loop {
            if self.read_line()? == 0 {
                self.done = true;
                break;
            }
            if self.buf.first() == Some(&b'>') {
                self.peek_header = Some(self.buf[1..].to_vec());
                break;
            }
            let line = self.buf.trim_ascii();
            if line.first() == Some(&b'#') {
                continue;
            }
            seq.extend_from_slice(line);
        }

        Ok(Some(SequenceRecord { id, desc, seq }))
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = Result<SequenceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// `>ID  description` -> (ID, description)。ID 必须紧跟 `>`
fn split_header(header: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let header = header.trim_ascii_end();
    let id_end = header
        .iter()
        .position(u8::is_ascii_whitespace)
        .unwrap_or(header.len());
    if id_end == 0 {
        return Err(DbError::MalformedHeader(format!(">{}", String::from_utf8_lossy(header))));
    }
    let id = header[..id_end].to_vec();
    let desc = header[id_end..].trim_ascii().to_vec();
    Ok((id, desc))
}

/// 读取整个 FASTA 文件；`.gz` 结尾时透明解压
pub fn read_fasta_path(path: &Path) -> Result<Vec<SequenceRecord>> {
    let fh = File::open(path)?;
    let gzipped = path.extension().is_some_and(|ext| ext == "gz");
    if gzipped {
        FastaReader::new(BufReader::new(MultiGzDecoder::new(fh))).collect()
    } else {
        FastaReader::new(BufReader::new(fh)).collect()
    }
}
