//! Chunked content matching.
//!
//! Files are read `chunk_size` bytes at a time. After each chunk the tail
//! of the buffer is kept so a match that straddles two reads is still seen:
//! `needle.len() - 1` bytes for a case-sensitive literal, four bytes per
//! character minus one for a case-folded literal, and [`REGEX_OVERLAP`]
//! bytes for a regular expression.

use std::io::{self, Read};

use regex::bytes::{Regex, RegexBuilder};

use fmjob_core::{JobError, JobResult};

use crate::settings::ContentMode;

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Bytes carried between chunks in regex mode. Matches longer than this
/// that cross a chunk boundary are not found.
pub const REGEX_OVERLAP: usize = 4096;

#[derive(Debug, Clone)]
enum Needle {
    Exact(Vec<u8>),
    /// A literal matched with Unicode case folding; `chars` is its length
    /// in characters.
    Folded { regex: Regex, chars: usize },
    Regex(Regex),
}

/// A compiled content pattern.
#[derive(Debug, Clone)]
pub struct ContentMatcher {
    needle: Needle,
    chunk_size: usize,
}

impl ContentMatcher {
    pub fn new(pattern: &str, mode: ContentMode, case_sensitive: bool) -> JobResult<Self> {
        if pattern.is_empty() {
            return Err(JobError::InvalidPattern {
                pattern: String::new(),
                message: "empty content pattern".to_string(),
            });
        }
        let compile = |source: &str| {
            RegexBuilder::new(source)
                .case_insensitive(!case_sensitive)
                .build()
                .map_err(|e| JobError::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })
        };
        let needle = match mode {
            ContentMode::Exact if case_sensitive => Needle::Exact(pattern.as_bytes().to_vec()),
            ContentMode::Exact => Needle::Folded {
                regex: compile(&regex::escape(pattern))?,
                chars: pattern.chars().count(),
            },
            ContentMode::Regex => Needle::Regex(compile(pattern)?),
        };
        Ok(Self {
            needle,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Bytes kept from one buffer to the next.
    pub fn overlap(&self) -> usize {
        match &self.needle {
            Needle::Exact(bytes) => bytes.len() - 1,
            // A folded character can take up to four bytes in the file.
            Needle::Folded { chars, .. } => chars * 4 - 1,
            Needle::Regex(_) => REGEX_OVERLAP,
        }
    }

    /// Whether `haystack` contains the pattern.
    pub fn is_match(&self, haystack: &[u8]) -> bool {
        match &self.needle {
            Needle::Exact(bytes) => haystack.windows(bytes.len()).any(|w| w == bytes.as_slice()),
            Needle::Folded { regex, .. } | Needle::Regex(regex) => regex.is_match(haystack),
        }
    }

    /// Scan `reader` chunk by chunk. `stop` is polled before every read;
    /// returning `true` ends the scan without a match.
    pub fn find_in(&self, mut reader: impl Read, stop: impl Fn() -> bool) -> io::Result<bool> {
        let overlap = self.overlap();
        let mut chunk = vec![0u8; self.chunk_size];
        let mut window: Vec<u8> = Vec::with_capacity(self.chunk_size + overlap);

        loop {
            if stop() {
                return Ok(false);
            }
            let read = match reader.read(&mut chunk) {
                Ok(0) => return Ok(false),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            window.extend_from_slice(&chunk[..read]);
            if self.is_match(&window) {
                return Ok(true);
            }

            let keep = overlap.min(window.len());
            window.drain(..window.len() - keep);
        }
    }
}
