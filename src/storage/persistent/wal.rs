//! Write-Ahead Log (WAL) for crash recovery.
//!
//! Every mutation is appended here before it touches the in-memory index,
//! and the log is replayed on startup.
//!
//! # File Format
//! ```text
//! [MAGIC: 4 bytes][VERSION: 1 byte]
//! [ENTRY 1: codec-framed WalEntry]
//! [ENTRY 2: codec-framed WalEntry]
//! ...
//! ```
//!
//! Each entry is written with a single unbuffered write. An append that fails
//! cuts the file back to where it started, so a failed write never reaches a
//! later replay.
//!
//! Recovery reads entries until the first torn frame or checksum mismatch, then
//! cuts the file back to the end of the last valid entry so new appends are
//! readable. A frame whose checksum holds but whose contents do not decode is
//! not a torn write, and fails the open instead.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Error as IoError, ErrorKind, Result as IoResult, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cosmonaut::{Cosmonaut, CosmonautId};
use crate::superpower::{Superpower, SuperpowerId};

use super::codec;

/// A single entry in the write-ahead log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    /// Monotonically increasing sequence number.
    pub sequence: u64,
    /// When this entry was written.
    pub timestamp: DateTime<Utc>,
    /// The change being logged.
    pub kind: WalEntryKind,
}

/// The change carried by a WAL entry.
///
/// Puts carry the whole post-change document, so replay is idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalEntryKind {
    /// A cosmonaut was inserted or changed.
    CosmonautPut(Cosmonaut),
    /// A cosmonaut was removed.
    CosmonautDelete {
        /// Removed cosmonaut.
        id: CosmonautId,
    },
    /// A superpower was inserted or changed.
    SuperpowerPut(Superpower),
    /// A superpower was removed.
    SuperpowerDelete {
        /// Removed superpower.
        id: SuperpowerId,
    },
}

/// Outcome of reading an existing log.
#[derive(Debug, Default)]
pub struct Recovery {
    /// Entries read before the first invalid one.
    pub entries: Vec<WalEntry>,
    /// Description of the invalid tail, if one was cut off.
    pub discarded_tail: Option<String>,
}

struct WalWriter {
    file: File,
    sequence: u64,
    /// Set when a failed append could not be cut back off the file.
    torn: bool,
}

/// File the log appends to.
trait LogSink: Write {
    fn size(&self) -> IoResult<u64>;
    fn truncate(&mut self, len: u64) -> IoResult<()>;
    fn sync(&self) -> IoResult<()>;
}

impl LogSink for File {
    fn size(&self) -> IoResult<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> IoResult<()> {
        self.set_len(len)
    }

    fn sync(&self) -> IoResult<()> {
        self.sync_data()
    }
}

/// Writes one frame, or nothing.
///
/// On failure the sink is cut back to its previous length. If even that
/// fails, `torn` is set and the partial frame stays on disk until the next
/// open discards it.
fn append_frame(
    sink: &mut impl LogSink,
    frame: &[u8],
    sync: bool,
    torn: &mut bool,
) -> IoResult<()> {
    let start = sink.size()?;
    let written = sink
        .write_all(frame)
        .and_then(|()| sink.flush())
        .and_then(|()| if sync { sink.sync() } else { Ok(()) });

    if let Err(err) = written {
        if let Err(cut) = sink.truncate(start) {
            *torn = true;
            return Err(IoError::new(
                err.kind(),
                format!("{err}; removing the partial entry also failed: {cut}"),
            ));
        }
        return Err(err);
    }
    Ok(())
}

/// Append-only write-ahead log. Thread-safe via an internal mutex.
pub struct WriteAheadLog {
    path: PathBuf,
    writer: Mutex<WalWriter>,
    sync_on_write: bool,
}

fn poisoned() -> IoError {
    IoError::new(ErrorKind::Other, "poisoned lock: wal.writer")
}

impl WriteAheadLog {
    /// Opens or creates a log file and recovers its entries.
    ///
    /// # Errors
    /// - Any I/O error
    /// - `InvalidData` if the header is not a CosmoQL log, or an entry with a
    ///   valid checksum does not decode
    /// - `Unsupported` if an entry was written by another codec version
    pub fn open(path: &Path, sync_on_write: bool) -> IoResult<(Self, Recovery)> {
        let existing = path.exists() && fs::metadata(path)?.len() > 0;

        let recovery = if existing {
            let (recovery, valid_len) = read_entries(path)?;
            if recovery.discarded_tail.is_some() {
                let file = OpenOptions::new().write(true).open(path)?;
                file.set_len(valid_len)?;
                file.sync_all()?;
            }
            recovery
        } else {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?;
            codec::write_header(&mut file)?;
            file.sync_all()?;
            Recovery::default()
        };

        let sequence = recovery.entries.last().map_or(0, |entry| entry.sequence);
        let file = OpenOptions::new().append(true).open(path)?;

        let wal = Self {
            path: path.to_path_buf(),
            writer: Mutex::new(WalWriter {
                file,
                sequence,
                torn: false,
            }),
            sync_on_write,
        };
        Ok((wal, recovery))
    }

    /// Appends an entry and returns its sequence number.
    ///
    /// # Errors
    /// Any I/O error; the entry is then not written. Once a failed entry could
    /// not be removed, every later append fails until the log is reopened.
    pub fn append(&self, kind: WalEntryKind) -> IoResult<u64> {
        let mut writer = self.lock()?;
        if writer.torn {
            return Err(IoError::new(
                ErrorKind::Other,
                "log ends in a partial entry; reopen it to recover",
            ));
        }

        let sequence = writer.sequence + 1;
        let encoded = codec::encode(&WalEntry {
            sequence,
            timestamp: Utc::now(),
            kind,
        })?;

        let WalWriter { file, torn, .. } = &mut *writer;
        append_frame(file, &encoded, self.sync_on_write, torn)?;

        writer.sequence = sequence;
        Ok(sequence)
    }

    /// Replaces the whole log with `kinds`.
    ///
    /// The new log is written to a sibling temp file, synced, and renamed over
    /// the old one, so a crash mid-rewrite leaves the previous log in place.
    ///
    /// # Errors
    /// Any I/O error; the previous log is then still the live one.
    pub fn rewrite(&self, kinds: Vec<WalEntryKind>) -> IoResult<()> {
        let mut writer = self.lock()?;

        let tmp_path = self.path.with_extension("wal.tmp");
        let mut sequence = 0;
        {
            let mut tmp = BufWriter::new(
                OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&tmp_path)?,
            );
            codec::write_header(&mut tmp)?;
            for kind in kinds {
                sequence += 1;
                tmp.write_all(&codec::encode(&WalEntry {
                    sequence,
                    timestamp: Utc::now(),
                    kind,
                })?)?;
            }
            tmp.flush()?;
            tmp.get_ref().sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;

        writer.file = OpenOptions::new().append(true).open(&self.path)?;
        writer.sequence = sequence;
        writer.torn = false;
        Ok(())
    }

    /// Sequence number of the last written entry.
    ///
    /// # Errors
    /// Returns an error if the writer lock is poisoned.
    pub fn current_sequence(&self) -> IoResult<u64> {
        Ok(self.lock()?.sequence)
    }

    /// Log size in bytes.
    ///
    /// # Errors
    /// Any I/O error from reading the file metadata.
    pub fn size_bytes(&self) -> IoResult<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    fn lock(&self) -> IoResult<MutexGuard<'_, WalWriter>> {
        self.writer.lock().map_err(|_| poisoned())
    }
}

/// Reads entries up to the first torn or corrupted frame.
///
/// Returns the recovered entries and the byte length of the valid prefix.
/// Any other failure is returned, and nothing is discarded.
fn read_entries(path: &Path) -> IoResult<(Recovery, u64)> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    codec::read_header(&mut reader)?;

    let mut recovery = Recovery::default();
    let mut valid_len = codec::HEADER_LEN;
    while valid_len < file_len {
        match codec::read_frame(&mut reader) {
            Ok(data) => {
                let entry: WalEntry = codec::decode_payload(&data).map_err(|err| {
                    IoError::new(
                        ErrorKind::InvalidData,
                        format!(
                            "entry at byte {valid_len} has a valid checksum but does not decode: {err}"
                        ),
                    )
                })?;
                recovery.entries.push(entry);
                valid_len = reader.stream_position()?;
            }
            Err(err) if matches!(err.kind(), ErrorKind::UnexpectedEof | ErrorKind::InvalidData) => {
                recovery.discarded_tail = Some(format!(
                    "{} bytes after sequence {}: {err}",
                    file_len - valid_len,
                    recovery.entries.last().map_or(0, |e| e.sequence)
                ));
                break;
            }
            Err(err) => return Err(err),
        }
    }

    Ok((recovery, valid_len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::superpower::Superpower;
    use tempfile::tempdir;

    #[test]
    fn test_append_and_recover() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");

        {
            let (wal, recovery) = WriteAheadLog::open(&path, false).unwrap();
            assert!(recovery.entries.is_empty());
            let power = Superpower::new("Flight");
            wal.append(WalEntryKind::SuperpowerPut(power.clone())).unwrap();
            wal.append(WalEntryKind::SuperpowerDelete { id: power.id }).unwrap();
            assert_eq!(wal.current_sequence().unwrap(), 2);
        }

        let (wal, recovery) = WriteAheadLog::open(&path, false).unwrap();
        assert_eq!(recovery.entries.len(), 2);
        assert!(recovery.discarded_tail.is_none());
        assert!(matches!(
            recovery.entries[0].kind,
            WalEntryKind::SuperpowerPut(_)
        ));
        assert_eq!(wal.current_sequence().unwrap(), 2);
    }

    #[test]
    fn test_torn_tail_is_cut_and_appends_stay_readable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("torn.wal");

        {
            let (wal, _) = WriteAheadLog::open(&path, false).unwrap();
            wal.append(WalEntryKind::SuperpowerPut(Superpower::new("A"))).unwrap();
            wal.append(WalEntryKind::SuperpowerPut(Superpower::new("B"))).unwrap();
        }
        let len = fs::metadata(&path).unwrap().len();
        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(len - 3)
            .unwrap();

        {
            let (wal, recovery) = WriteAheadLog::open(&path, false).unwrap();
            assert_eq!(recovery.entries.len(), 1);
            assert!(recovery.discarded_tail.is_some());
            wal.append(WalEntryKind::SuperpowerPut(Superpower::new("C"))).unwrap();
        }

        let (_, recovery) = WriteAheadLog::open(&path, false).unwrap();
        assert_eq!(recovery.entries.len(), 2);
        assert!(recovery.discarded_tail.is_none());
        assert_eq!(recovery.entries[1].sequence, 2);
    }

    #[test]
    fn test_rewrite_replaces_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rewrite.wal");

        let (wal, _) = WriteAheadLog::open(&path, false).unwrap();
        for name in ["A", "B", "C"] {
            wal.append(WalEntryKind::SuperpowerPut(Superpower::new(name))).unwrap();
        }
        let keep = Superpower::new("Kept");
        wal.rewrite(vec![WalEntryKind::SuperpowerPut(keep.clone())]).unwrap();
        assert_eq!(wal.current_sequence().unwrap(), 1);
        wal.append(WalEntryKind::SuperpowerDelete { id: keep.id }).unwrap();
        drop(wal);

        let (_, recovery) = WriteAheadLog::open(&path, false).unwrap();
        assert_eq!(recovery.entries.len(), 2);
        assert!(!dir.path().join("rewrite.wal.tmp").exists());
    }

    fn frame(sequence: u64, name: &str) -> Vec<u8> {
        codec::encode(&WalEntry {
            sequence,
            timestamp: Utc::now(),
            kind: WalEntryKind::SuperpowerPut(Superpower::new(name)),
        })
        .unwrap()
    }

    fn names(recovery: &Recovery) -> Vec<(u64, String)> {
        recovery
            .entries
            .iter()
            .map(|entry| match &entry.kind {
                WalEntryKind::SuperpowerPut(power) => (entry.sequence, power.name.clone()),
                other => panic!("unexpected entry {other:?}"),
            })
            .collect()
    }

    /// Accepts `room` more bytes, then fails every write.
    struct Cramped {
        bytes: Vec<u8>,
        room: usize,
        cut_fails: bool,
    }

    impl Cramped {
        fn new() -> Self {
            Self {
                bytes: Vec::new(),
                room: usize::MAX,
                cut_fails: false,
            }
        }
    }

    impl Write for Cramped {
        fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
            let n = buf.len().min(self.room);
            if n == 0 {
                return Err(IoError::new(ErrorKind::Other, "file too large"));
            }
            self.bytes.extend_from_slice(&buf[..n]);
            self.room -= n;
            Ok(n)
        }

        fn flush(&mut self) -> IoResult<()> {
            Ok(())
        }
    }

    impl LogSink for Cramped {
        fn size(&self) -> IoResult<u64> {
            Ok(self.bytes.len() as u64)
        }

        fn truncate(&mut self, len: u64) -> IoResult<()> {
            if self.cut_fails {
                return Err(IoError::new(ErrorKind::Other, "read-only"));
            }
            self.bytes.truncate(usize::try_from(len).unwrap());
            Ok(())
        }

        fn sync(&self) -> IoResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_append_leaves_nothing_to_replay() {
        let mut sink = Cramped::new();
        let mut torn = false;
        codec::write_header(&mut sink).unwrap();
        append_frame(&mut sink, &frame(1, "ok1"), false, &mut torn).unwrap();

        sink.room = 10;
        let err = append_frame(&mut sink, &frame(2, "lost"), false, &mut torn).unwrap_err();
        assert!(err.to_string().contains("file too large"));
        assert!(!torn);

        sink.room = usize::MAX;
        append_frame(&mut sink, &frame(2, "ok2"), false, &mut torn).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("cramped.wal");
        fs::write(&path, &sink.bytes).unwrap();
        let (_, recovery) = WriteAheadLog::open(&path, false).unwrap();
        assert!(recovery.discarded_tail.is_none());
        assert_eq!(
            names(&recovery),
            [(1, "ok1".to_string()), (2, "ok2".to_string())]
        );
    }

    #[test]
    fn test_unremovable_partial_entry_marks_log_torn() {
        let mut sink = Cramped::new();
        let mut torn = false;
        sink.room = 3;
        sink.cut_fails = true;

        let err = append_frame(&mut sink, &frame(1, "lost"), false, &mut torn).unwrap_err();
        assert!(err.to_string().contains("partial entry"));
        assert!(torn);
    }

    #[test]
    fn test_undecodable_entry_fails_open_and_keeps_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("undecodable.wal");

        let mut bytes = Vec::new();
        codec::write_header(&mut bytes).unwrap();
        bytes.extend(frame(1, "A"));
        bytes.extend(codec::encode(&"not an entry").unwrap());
        bytes.extend(frame(3, "C"));
        fs::write(&path, &bytes).unwrap();

        let err = WriteAheadLog::open(&path, false).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(err.to_string().contains("does not decode"));
        assert_eq!(fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn test_foreign_codec_version_fails_open_and_keeps_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("version.wal");

        let mut bytes = Vec::new();
        codec::write_header(&mut bytes).unwrap();
        bytes.extend(frame(1, "A"));
        let mut newer = frame(2, "B");
        newer[0] = codec::CODEC_VERSION + 1;
        bytes.extend(newer);
        fs::write(&path, &bytes).unwrap();

        let err = WriteAheadLog::open(&path, false).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn test_checksum_mismatch_is_cut() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("crc.wal");

        let mut bytes = Vec::new();
        codec::write_header(&mut bytes).unwrap();
        bytes.extend(frame(1, "A"));
        let valid_len = bytes.len() as u64;
        let mut flipped = frame(2, "B");
        flipped[7] ^= 0xFF;
        bytes.extend(flipped);
        fs::write(&path, &bytes).unwrap();

        let (_, recovery) = WriteAheadLog::open(&path, false).unwrap();
        assert_eq!(names(&recovery), [(1, "A".to_string())]);
        assert!(recovery.discarded_tail.unwrap().contains("CRC mismatch"));
        assert_eq!(fs::metadata(&path).unwrap().len(), valid_len);
    }
}
