//! One logical byte stream over a recording split into numbered parts.

use log::info;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

#[derive(Debug)]
struct Part {
    path: PathBuf,
    file: File,
    start: u64,
    len: u64,
}

/// `Read + Seek` over a file and, optionally, its follow-up parts.
///
/// Follow-ups are found by incrementing the last run of digits in the file
/// stem: `rec_001.ts`, `rec_002.ts`, ... until a name does not exist.
#[derive(Debug)]
pub struct MultiFileReader {
    parts: Vec<Part>,
    current: usize,
    position: u64,
    total: u64,
}

/// Name of the part following `path`, if its stem ends in digits.
pub fn next_part_path(path: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let digits = stem.len() - stem.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let (prefix, number) = stem.split_at(stem.len() - digits);
    let next = number.parse::<u64>().ok()?.checked_add(1)?;

    let mut name = format!("{}{:0width$}", prefix, next, width = digits);
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        name.push('.');
        name.push_str(ext);
    }
    Some(path.with_file_name(name))
}

impl MultiFileReader {
    pub fn open<P: AsRef<Path>>(path: P, append: bool) -> io::Result<Self> {
        let mut reader = Self {
            parts: Vec::new(),
            current: 0,
            position: 0,
            total: 0,
        };
        reader.push_part(path.as_ref().to_path_buf())?;

        if append {
            let mut candidate = next_part_path(path.as_ref());
            while let Some(next) = candidate {
                if !next.is_file() {
                    break;
                }
                info!("appending {}", next.display());
                reader.push_part(next.clone())?;
                candidate = next_part_path(&next);
            }
        }

        Ok(reader)
    }

    fn push_part(&mut self, path: PathBuf) -> io::Result<()> {
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        self.parts.push(Part {
            path,
            file,
            start: self.total,
            len,
        });
        self.total += len;
        Ok(())
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.parts.iter().map(|p| p.path.as_path())
    }

    /// Combined size of all parts.
    pub fn len(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    fn part_index(&self, position: u64) -> usize {
        self.parts
            .partition_point(|p| p.start + p.len <= position)
            .min(self.parts.len().saturating_sub(1))
    }
}

impl Read for MultiFileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.position < self.total && !buf.is_empty() {
            let part = &mut self.parts[self.current];
            let local = self.position - part.start;
            if local >= part.len {
                self.current += 1;
                continue;
            }
            part.file.seek(SeekFrom::Start(local))?;
            let want = buf.len().min((part.len - local) as usize);
            let n = part.file.read(&mut buf[..want])?;
            if n == 0 {
                // file shrank underneath us
                return Ok(0);
            }
            self.position += n as u64;
            return Ok(n);
        }
        Ok(0)
    }
}

impl Seek for MultiFileReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.total.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )
        })?;

        self.position = target;
        self.current = self.part_index(target);
        Ok(target)
    }
}
