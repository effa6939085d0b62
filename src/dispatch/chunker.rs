//! Tab-separated bulk sources.
//!
//! A source file starts with a header line naming the fields; every chunk
//! read from it repeats that header followed by up to `max_lines` data lines.
//! Blank lines are skipped.

use crate::command::executor::decode_lossy;
use crate::error::{DispatchError, Result};

use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

pub struct TsvChunkReader<R> {
    reader: R,
    source: String,
    header: String,
    buffer: Vec<u8>,
}

impl TsvChunkReader<BufReader<File>> {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).await?;
        Self::new(BufReader::new(file), &path.display().to_string()).await
    }
}

impl<R: AsyncBufRead + Unpin> TsvChunkReader<R> {
    /// Reads the header. Fails with `EmptySource` when there is none.
    pub async fn new(reader: R, source: &str) -> Result<Self> {
        let mut chunker = Self {
            reader,
            source: source.to_string(),
            header: String::new(),
            buffer: Vec::new(),
        };
        match chunker.read_line().await? {
            Some(header) if !header.trim().is_empty() => chunker.header = header,
            _ => {
                tracing::error!("input file: {} has no content", source);
                return Err(DispatchError::EmptySource(source.to_string()));
            }
        }
        Ok(chunker)
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    /// Name of the first header column, which holds each row's unique id.
    pub fn id_field(&self) -> &str {
        self.header.split('\t').next().unwrap_or_default()
    }

    /// Next non-blank data line.
    pub async fn next_row(&mut self) -> Result<Option<String>> {
        while let Some(line) = self.read_line().await? {
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    /// Header plus up to `max_lines` data lines, or `None` once the source
    /// has no data left. Never returns a header-only chunk.
    pub async fn next_chunk(&mut self, max_lines: usize) -> Result<Option<String>> {
        let mut chunk = self.header.clone();
        let mut count = 0;
        while count < max_lines {
            let Some(line) = self.next_row().await? else {
                break;
            };
            chunk.push('\n');
            chunk.push_str(&line);
            count += 1;
        }

        if count == 0 {
            return Ok(None);
        }
        chunk.push('\n');
        Ok(Some(chunk))
    }

    /// One line without its terminator. Bytes that are not UTF-8 become
    /// U+FFFD so a single bad row never stops the source.
    async fn read_line(&mut self) -> Result<Option<String>> {
        self.buffer.clear();
        if self.reader.read_until(b'\n', &mut self.buffer).await? == 0 {
            return Ok(None);
        }
        if self.buffer.last() == Some(&b'\n') {
            self.buffer.pop();
            if self.buffer.last() == Some(&b'\r') {
                self.buffer.pop();
            }
        }
        Ok(Some(decode_lossy(&self.buffer, &self.source)))
    }
}

/// Regular files of `path`, sorted by name, or `path` itself when it is a
/// file. Subdirectories are not visited.
pub async fn list_input_files(path: &Path) -> Result<Vec<PathBuf>> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::error!("cannot read {}: {}", path.display(), e);
            return Err(DispatchError::NoInputFiles(path.display().to_string()));
        }
    };
    if metadata.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(path).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }

    if files.is_empty() {
        return Err(DispatchError::NoInputFiles(path.display().to_string()));
    }
    files.sort();
    Ok(files)
}
