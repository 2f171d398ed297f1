use std::{fmt, path::PathBuf};

use chrono::{DateTime, FixedOffset, Utc};
use parking_lot::RwLock;
use rocksdb::{DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{RecordError, Result};

/// Reserved key namespace for readings. Kept byte-identical to the format the
/// original journal wrote, so existing databases open unchanged.
const RECORD_PREFIX: &[u8] = b"bpnRecord:";

type Db = DBWithThreadMode<MultiThreaded>;

/// One blood-pressure measurement. The JSON field names are pinned to the
/// legacy on-disk encoding; `pulse` of 0 means the value was not supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "Ts")]
    pub taken_at: DateTime<FixedOffset>,
    #[serde(rename = "Sys")]
    pub systolic: u8,
    #[serde(rename = "Dia")]
    pub diastolic: u8,
    #[serde(rename = "Pulse", default)]
    pub pulse: u8,
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - Sys: {}, Dia: {}, Pulse: {}",
            self.taken_at.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S"),
            self.systolic,
            self.diastolic,
            self.pulse
        )
    }
}

/// Owns the embedded database handle and the in-memory cache of readings.
/// The cache is a derived view: it can always be rebuilt from the reserved
/// key range via [`RecordStore::reload`].
pub struct RecordStore {
    db: Option<Db>,
    cache: RwLock<Vec<Reading>>,
}

impl RecordStore {
    /// Opens (or creates) the backing store at `path` and loads every stored
    /// reading into the cache.
    pub fn connect(path: PathBuf) -> Result<Self> {
        let mut options = Options::default();
        options.create_if_missing(true);
        let db = Db::open(&options, &path)
            .map_err(|err| RecordError::StoreUnavailable(err.to_string()))?;

        let store = Self {
            db: Some(db),
            cache: RwLock::new(Vec::new()),
        };
        store.reload()?;
        info!(
            path = %path.display(),
            readings = store.cache.read().len(),
            "record store connected"
        );
        Ok(store)
    }

    /// Releases the backing store. Any later call on this store fails with
    /// [`RecordError::StoreClosed`].
    pub fn close(&mut self) -> Result<()> {
        match self.db.take() {
            Some(db) => {
                drop(db);
                info!("record store closed");
                Ok(())
            }
            None => Err(RecordError::StoreClosed),
        }
    }

    /// Rebuilds the cache from the reserved key range. The read happens on a
    /// point-in-time snapshot and the cache is replaced in one step, so
    /// readers never observe a partially loaded state. A single value that
    /// fails to deserialize aborts the whole reload; the previous cache
    /// contents stay in place.
    pub fn reload(&self) -> Result<()> {
        let db = self.db()?;
        let snapshot = db.snapshot();
        let iter = snapshot.iterator(IteratorMode::From(RECORD_PREFIX, Direction::Forward));

        let mut records = Vec::new();
        for item in iter {
            let (key, value) =
                item.map_err(|err| RecordError::StoreUnavailable(err.to_string()))?;
            if !key.starts_with(RECORD_PREFIX) {
                break;
            }
            let reading: Reading =
                serde_json::from_slice(&value).map_err(|err| RecordError::CorruptRecord {
                    key: String::from_utf8_lossy(&key).into_owned(),
                    reason: err.to_string(),
                })?;
            records.push(reading);
        }

        // Key order is lexicographic; the user-visible ordering guarantee
        // comes from this sort, not from iteration order.
        records.sort_by_key(|reading| reading.taken_at.timestamp());
        debug!(readings = records.len(), "cache reloaded");
        *self.cache.write() = records;
        Ok(())
    }

    /// Returns a snapshot of all readings, ascending by timestamp. The
    /// returned vector is the caller's own; mutating it does not touch the
    /// store.
    pub fn read_all(&self) -> Result<Vec<Reading>> {
        self.db()?;
        Ok(self.cache.read().clone())
    }

    /// Persists one reading and folds it into the cache. The write and the
    /// cache update form one critical section, so concurrent readers see
    /// either the state before the save or after it, never in between. If
    /// the commit fails the cache is left unchanged.
    pub fn save(&self, reading: Reading) -> Result<()> {
        let db = self.db()?;
        let key = record_key(&reading);
        let value = serde_json::to_vec(&reading)?;

        let mut cache = self.cache.write();
        db.put(&key, value)
            .map_err(|err| RecordError::PersistFailed(err.to_string()))?;
        debug!(key = %String::from_utf8_lossy(&key), "reading persisted");

        // Same-second saves overwrite on disk; mirror that in the cache.
        let epoch = reading.taken_at.timestamp();
        cache.retain(|existing| existing.taken_at.timestamp() != epoch);
        cache.push(reading);
        cache.sort_by_key(|existing| existing.taken_at.timestamp());
        Ok(())
    }

    fn db(&self) -> Result<&Db> {
        self.db.as_ref().ok_or(RecordError::StoreClosed)
    }
}

fn record_key(reading: &Reading) -> Vec<u8> {
    let mut key = RECORD_PREFIX.to_vec();
    key.extend_from_slice(reading.taken_at.timestamp().to_string().as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reading(epoch: i64, systolic: u8, diastolic: u8, pulse: u8) -> Reading {
        Reading {
            taken_at: Utc.timestamp_opt(epoch, 0).unwrap().fixed_offset(),
            systolic,
            diastolic,
            pulse,
        }
    }

    #[test]
    fn empty_store_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::connect(dir.path().join("records")).unwrap();
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn record_key_matches_legacy_format() {
        let key = record_key(&reading(1_700_000_000, 120, 80, 60));
        assert_eq!(key, b"bpnRecord:1700000000".to_vec());
    }

    #[test]
    fn reading_round_trips_through_json() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let original = Reading {
            taken_at: offset.with_ymd_and_hms(2024, 3, 9, 7, 45, 12).unwrap(),
            systolic: 128,
            diastolic: 82,
            pulse: 0,
        };

        let bytes = serde_json::to_vec(&original).unwrap();
        let decoded: Reading = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.taken_at.offset(), original.taken_at.offset());

        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        for field in ["Ts", "Sys", "Dia", "Pulse"] {
            assert!(value.get(field).is_some(), "missing field {field}");
        }
    }

    #[test]
    fn readings_are_ordered_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::connect(dir.path().join("records")).unwrap();

        store.save(reading(100, 120, 80, 60)).unwrap();
        store.save(reading(50, 130, 85, 0)).unwrap();
        store.save(reading(75, 118, 76, 55)).unwrap();

        let all = store.read_all().unwrap();
        let epochs: Vec<i64> = all.iter().map(|r| r.taken_at.timestamp()).collect();
        assert_eq!(epochs, vec![50, 75, 100]);
        assert_eq!(all[0].systolic, 130);
        assert_eq!(all[0].pulse, 0, "unset pulse must survive as zero");
        assert_eq!(all[1].pulse, 55);
        assert_eq!(all[2].systolic, 120);
    }

    #[test]
    fn reload_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::connect(dir.path().join("records")).unwrap();
        store.save(reading(200, 125, 78, 64)).unwrap();
        store.save(reading(150, 140, 90, 72)).unwrap();

        store.reload().unwrap();
        let first = store.read_all().unwrap();
        store.reload().unwrap();
        let second = store.read_all().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn same_second_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::connect(dir.path().join("records")).unwrap();

        store.save(reading(300, 120, 80, 60)).unwrap();
        store.save(reading(300, 135, 88, 70)).unwrap();

        let all = store.read_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].systolic, 135);

        // The backing store must also hold exactly one record at that key.
        store.reload().unwrap();
        let reloaded = store.read_all().unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].diastolic, 88);
    }

    #[test]
    fn corrupt_record_aborts_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::connect(dir.path().join("records")).unwrap();
        store.save(reading(700, 124, 82, 61)).unwrap();

        // Plant an unreadable value inside the reserved key range.
        store
            .db
            .as_ref()
            .unwrap()
            .put(b"bpnRecord:800", b"not json")
            .unwrap();

        match store.reload().unwrap_err() {
            RecordError::CorruptRecord { key, .. } => assert_eq!(key, "bpnRecord:800"),
            other => panic!("expected CorruptRecord, got {other:?}"),
        }

        // The aborted reload must leave the previous cache intact.
        let all = store.read_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].taken_at.timestamp(), 700);
    }

    #[test]
    fn persists_across_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records");

        {
            let mut store = RecordStore::connect(path.clone()).unwrap();
            store.save(reading(400, 122, 79, 58)).unwrap();
            store.close().unwrap();
        }

        let store = RecordStore::connect(path).unwrap();
        let all = store.read_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].systolic, 122);
        assert_eq!(all[0].taken_at.timestamp(), 400);
    }

    #[test]
    fn closed_store_rejects_operations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records");

        let mut store = RecordStore::connect(path.clone()).unwrap();
        store.save(reading(500, 119, 75, 62)).unwrap();
        store.close().unwrap();

        assert!(matches!(
            store.save(reading(600, 121, 81, 66)),
            Err(RecordError::StoreClosed)
        ));
        assert!(matches!(store.read_all(), Err(RecordError::StoreClosed)));
        assert!(matches!(store.reload(), Err(RecordError::StoreClosed)));
        assert!(matches!(store.close(), Err(RecordError::StoreClosed)));

        // A save that failed must leave no trace behind.
        let store = RecordStore::connect(path).unwrap();
        let all = store.read_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].taken_at.timestamp(), 500);
    }
}
