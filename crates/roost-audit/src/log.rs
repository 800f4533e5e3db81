//! Append-only NDJSON log with mmap-based reads.
//!
//! [`SecurityLog`] owns a [`BufWriter`] opened in append mode; each record
//! becomes one JSON line followed by a flush. Flushing per record is
//! intentional: a reader may remap at any time, and unflushed bytes would be
//! invisible to it.
//!
//! [`SecurityLogReader`] memory-maps the file for zero-copy access to the
//! most recent records. The mapping is a snapshot; call `remap()` to pick up
//! records appended since. Writer and reader share no state, so the admin's
//! log view never contends with the gate's write path.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use crate::record::SecurityRecord;

/// Append-only writer for the security audit log.
pub struct SecurityLog {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl SecurityLog {
    /// Open or create the audit log for appending, creating parent
    /// directories as needed.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    /// Append one record and flush it to disk.
    pub fn append(&mut self, record: &SecurityRecord) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, record).map_err(std::io::Error::other)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        debug!(
            tenant = %record.tenant_id,
            command = %record.blocked_command,
            "security record appended"
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Memory-mapped reader over the audit log.
///
/// Not `Send`/`Sync` (the mapping is not); create one per reader.
pub struct SecurityLogReader {
    path: PathBuf,
    mmap: Option<Mmap>,
}

impl SecurityLogReader {
    /// Open the log and map its current contents. A missing file is treated
    /// as an empty log.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let mut reader = Self {
            path: path.as_ref().to_path_buf(),
            mmap: None,
        };
        reader.remap()?;
        Ok(reader)
    }

    /// Refresh the mapping to include records appended since the last open
    /// or remap.
    pub fn remap(&mut self) -> std::io::Result<()> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.mmap = None;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if file.metadata()?.len() == 0 {
            self.mmap = None;
            return Ok(());
        }
        // SAFETY: read-only mapping of an append-only file. Bytes already
        // written are never modified in place; appends land beyond the
        // mapping's range and stay invisible until the next remap().
        let mmap = unsafe { Mmap::map(&file)? };
        self.mmap = Some(mmap);
        Ok(())
    }

    /// The last `n` records in chronological order. Lines that fail to parse
    /// (torn writes from a crash) are skipped.
    pub fn tail(&self, n: usize) -> Vec<SecurityRecord> {
        let mut records: Vec<SecurityRecord> = self
            .tail_lines(n)
            .into_iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        records.reverse();
        records
    }

    /// Total number of records in the mapped snapshot.
    pub fn record_count(&self) -> usize {
        match &self.mmap {
            Some(m) => m.as_ref().iter().filter(|&&b| b == b'\n').count(),
            None => 0,
        }
    }

    /// The last `n` lines, newest first, borrowed from the mapping.
    fn tail_lines(&self, n: usize) -> Vec<&str> {
        let Some(mmap) = &self.mmap else {
            return vec![];
        };
        let Ok(data) = std::str::from_utf8(mmap.as_ref()) else {
            return vec![];
        };

        let mut lines = Vec::with_capacity(n);
        let mut end = data.len();
        if end > 0 && data.as_bytes()[end - 1] == b'\n' {
            end -= 1;
        }
        while lines.len() < n && end > 0 {
            let start = data[..end].rfind('\n').map(|i| i + 1).unwrap_or(0);
            let line = &data[start..end];
            if !line.is_empty() {
                lines.push(line);
            }
            end = if start > 0 { start - 1 } else { 0 };
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roost_types::{TenantId, UserId};
    use tempfile::TempDir;

    fn record(i: i64) -> SecurityRecord {
        SecurityRecord::new(
            TenantId::from_millis(1_700_000_000_000),
            UserId(i),
            format!("user{i}"),
            "eval",
            i,
            "group",
        )
    }

    #[test]
    fn append_then_tail_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("security.ndjson");

        let mut log = SecurityLog::open(&path).unwrap();
        for i in 0..10 {
            log.append(&record(i)).unwrap();
        }

        let reader = SecurityLogReader::open(&path).unwrap();
        let tail = reader.tail(3);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].user_id, UserId(7));
        assert_eq!(tail[2].user_id, UserId(9));
        assert_eq!(reader.record_count(), 10);
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let reader = SecurityLogReader::open(dir.path().join("absent.ndjson")).unwrap();
        assert!(reader.tail(5).is_empty());
        assert_eq!(reader.record_count(), 0);
    }

    #[test]
    fn remap_sees_new_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("security.ndjson");

        let mut log = SecurityLog::open(&path).unwrap();
        log.append(&record(1)).unwrap();

        let mut reader = SecurityLogReader::open(&path).unwrap();
        assert_eq!(reader.record_count(), 1);

        log.append(&record(2)).unwrap();
        // The snapshot is stale until remapped.
        assert_eq!(reader.record_count(), 1);
        reader.remap().unwrap();
        assert_eq!(reader.record_count(), 2);
    }

    #[test]
    fn torn_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("security.ndjson");

        let mut log = SecurityLog::open(&path).unwrap();
        log.append(&record(1)).unwrap();
        // Simulate a torn write from a crash mid-append.
        std::fs::write(
            &path,
            format!(
                "{}{{\"timestamp\":\"2024",
                std::fs::read_to_string(&path).unwrap()
            ),
        )
        .unwrap();

        let reader = SecurityLogReader::open(&path).unwrap();
        let tail = reader.tail(10);
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].user_id, UserId(1));
    }
}
