use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::claim::{NodeAllocation, SignedClaim};
use crate::error::{StoreError, StoreResult};

/// One durable store mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalRecord {
    /// Raw blob bytes; the handle is recomputed on replay.
    Blob(Vec<u8>),
    Node(NodeAllocation),
    Claim(SignedClaim),
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

struct JournalWriter {
    writer: BufWriter<File>,
    offset: u64,
}

/// Append-only journal of store mutations.
///
/// On-disk format, repeated per record:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized JournalRecord)]
/// ```
///
/// Replay reads front to back. A truncated or corrupt tail (a torn write) is
/// logged and ends replay; everything before it is kept.
pub struct Journal {
    path: PathBuf,
    writer: Mutex<JournalWriter>,
}

impl Journal {
    /// Open (or create) the journal file at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let offset = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(JournalWriter {
                writer: BufWriter::new(file),
                offset,
            }),
        })
    }

    /// Append and flush a record. Returns its byte offset.
    pub fn append(&self, record: &JournalRecord) -> StoreResult<u64> {
        let payload =
            bincode::serialize(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let length = u32::try_from(payload.len())
            .map_err(|_| StoreError::Serialization("journal record too large".into()))?;
        let crc = crc32fast::hash(&payload);

        let mut w = self.writer.lock().expect("journal mutex poisoned");
        let record_offset = w.offset;
        w.writer.write_all(&length.to_le_bytes())?;
        w.writer.write_all(&crc.to_le_bytes())?;
        w.writer.write_all(&payload)?;
        w.writer.flush()?;
        w.offset += (HEADER_SIZE + payload.len()) as u64;

        debug!(offset = record_offset, len = payload.len(), "journal append");
        Ok(record_offset)
    }

    /// Read back every intact record.
    pub fn replay(&self) -> StoreResult<Vec<JournalRecord>> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        let mut offset: u64 = 0;

        loop {
            let mut header = [0u8; HEADER_SIZE];
            match reader.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            let mut payload = vec![0u8; length as usize];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    warn!(offset, "truncated journal record; stopping replay");
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let actual_crc = crc32fast::hash(&payload);
            if actual_crc != expected_crc {
                warn!(
                    offset,
                    expected = expected_crc,
                    actual = actual_crc,
                    "journal CRC mismatch; stopping replay"
                );
                break;
            }

            match bincode::deserialize::<JournalRecord>(&payload) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(offset, error = %e, "undecodable journal record; stopping replay");
                    break;
                }
            }
            offset += (HEADER_SIZE + payload.len()) as u64;
        }

        debug!(replayed = records.len(), path = %self.path.display(), "journal replay complete");
        Ok(records)
    }

    /// Current end-of-journal offset.
    pub fn offset(&self) -> u64 {
        self.writer.lock().expect("journal mutex poisoned").offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::Claim;
    use chrono::{TimeZone, Utc};
    use std::io::{Seek, SeekFrom};
    use tk_crypto::SigningKey;
    use tk_types::ObjectId;

    fn claim_record(value: &str) -> JournalRecord {
        let key = SigningKey::from_bytes([9u8; 32]);
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let claim = Claim::set_attr(ObjectId::from_bytes(b"node"), "title", value);
        JournalRecord::Claim(SignedClaim::sign(claim, date, &key).unwrap())
    }

    #[test]
    fn append_and_replay() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(&dir.path().join("keep.journal")).unwrap();

        let records = vec![
            JournalRecord::Blob(b"hello".to_vec()),
            claim_record("Foo"),
            claim_record("Bar"),
        ];
        for r in &records {
            journal.append(r).unwrap();
        }
        assert_eq!(journal.replay().unwrap(), records);
    }

    #[test]
    fn replay_empty_journal() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(&dir.path().join("empty.journal")).unwrap();
        assert!(journal.replay().unwrap().is_empty());
        assert_eq!(journal.offset(), 0);
    }

    #[test]
    fn reopen_continues_at_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reopen.journal");
        let first = Journal::open(&path).unwrap();
        first.append(&JournalRecord::Blob(b"one".to_vec())).unwrap();
        let end = first.offset();
        drop(first);

        let second = Journal::open(&path).unwrap();
        assert_eq!(second.offset(), end);
        assert_eq!(second.append(&JournalRecord::Blob(b"two".to_vec())).unwrap(), end);
        assert_eq!(second.replay().unwrap().len(), 2);
    }

    #[test]
    fn torn_tail_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("torn.journal");
        let journal = Journal::open(&path).unwrap();
        journal.append(&claim_record("Foo")).unwrap();
        journal.append(&claim_record("Bar")).unwrap();
        let len = journal.offset();
        drop(journal);

        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 3).unwrap();

        let journal = Journal::open(&path).unwrap();
        assert_eq!(journal.replay().unwrap(), vec![claim_record("Foo")]);
    }

    #[test]
    fn corruption_stops_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.journal");
        let journal = Journal::open(&path).unwrap();
        journal.append(&JournalRecord::Blob(b"first".to_vec())).unwrap();
        let second = journal.append(&JournalRecord::Blob(b"second".to_vec())).unwrap();
        drop(journal);

        {
            let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
            let at = second + HEADER_SIZE as u64;
            file.seek(SeekFrom::Start(at)).unwrap();
            let mut buf = [0u8; 1];
            file.read_exact(&mut buf).unwrap();
            buf[0] ^= 0xFF;
            file.seek(SeekFrom::Start(at)).unwrap();
            file.write_all(&buf).unwrap();
        }

        let journal = Journal::open(&path).unwrap();
        assert_eq!(
            journal.replay().unwrap(),
            vec![JournalRecord::Blob(b"first".to_vec())]
        );
    }
}
