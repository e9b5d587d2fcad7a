use crate::common::Error;
use crate::persistence::JsonFile;
use log::{error, info, warn};
use townhall_base::date_time::Stamp;
use townhall_base::{Fields, Kind, Record, RecordId};

/// Canonical in-memory collection of one kind together with its file mirror.
pub struct CollectionStore {
    kind: Kind,
    records: Vec<Record>,
    mirror: JsonFile,
    /// Largest id issued or loaded, ids only ever grow.
    last_id: i64,
}

impl CollectionStore {
    /// Never fails: a missing or unreadable document resets the collection to empty and the empty
    /// state is written back right away.
    ///
    /// Entries whose `id` is not an integer are kept as they are. A document that parses but is
    /// not a list of objects is moved aside before the reset so its contents survive.
    pub async fn load(kind: Kind, mirror: JsonFile) -> Self {
        let records = match mirror.read_all().await {
            Ok(records) => {
                info!("{kind}: loaded {} records", records.len());
                records
            }
            Err(e) => {
                let path = mirror.path().display();
                if e.is_not_found() {
                    info!("{kind}: {path} absent, starting empty");
                } else if e.is_shape() {
                    match mirror.set_aside().await {
                        Ok(moved) => error!(
                            "{kind}: {path} rejected ({e}), moved to {}, starting empty",
                            moved.display()
                        ),
                        Err(move_err) => error!(
                            "{kind}: {path} rejected ({e}) and could not be moved ({move_err})"
                        ),
                    }
                } else {
                    warn!("{kind}: {path} unreadable ({e}), starting empty");
                }
                if let Err(e) = mirror.write_all(&[]).await {
                    warn!("{kind}: could not seed empty collection: {e}");
                }
                Vec::new()
            }
        };
        let last_id = records.iter().filter_map(|r| r.id.as_i64()).max().unwrap_or(0);
        CollectionStore {
            kind,
            records,
            mirror,
            last_id,
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn append(&mut self, fields: Fields) -> Record {
        self.append_at(fields, Stamp::now())
    }

    pub(crate) fn append_at(&mut self, fields: Fields, stamp: Stamp) -> Record {
        let id = stamp.millis().max(self.last_id.saturating_add(1));
        self.last_id = id;
        let record = Record::new(id, fields, stamp);
        self.records.push(record.clone());
        record
    }

    /// Returns the removed record together with the position it held, `None` when nothing matched.
    pub fn remove_by_id(&mut self, id: Option<RecordId>) -> Option<(usize, Record)> {
        let id = id?;
        let index = self.records.iter().position(|r| r.id.as_i64() == Some(id.0))?;
        Some((index, self.records.remove(index)))
    }

    /// Undo for a rejected append.
    pub fn pop(&mut self) -> Option<Record> {
        self.records.pop()
    }

    /// Undo for a rejected removal.
    pub fn restore(&mut self, index: usize, record: Record) {
        let index = index.min(self.records.len());
        self.records.insert(index, record);
    }

    pub async fn persist(&self) -> Result<(), Error> {
        self.mirror.write_all(&self.records).await
    }
}

#[cfg(test)]
mod tests {
    use super::CollectionStore;
    use crate::persistence::JsonFile;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use townhall_base::date_time::Stamp;
    use townhall_base::{Fields, Kind, RecordId};

    fn fields(title: &str) -> Fields {
        let Value::Object(fields) = json!({"title": title, "description": "d"}) else {
            unreachable!()
        };
        fields
    }

    #[tokio::test]
    async fn absent_file_is_seeded_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let mirror = JsonFile::for_kind(tmp.path().join("data"), Kind::Events);
        let store = CollectionStore::load(Kind::Events, mirror.clone()).await;
        assert!(store.records().is_empty());
        assert_eq!(std::fs::read_to_string(mirror.path()).unwrap(), "[]");
    }

    #[tokio::test]
    async fn corrupt_file_is_reset() {
        let tmp = tempfile::tempdir().unwrap();
        let mirror = JsonFile::for_kind(tmp.path(), Kind::Programs);
        std::fs::write(mirror.path(), "not json").unwrap();
        let store = CollectionStore::load(Kind::Programs, mirror.clone()).await;
        assert!(store.records().is_empty());
        assert!(mirror.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ids_stay_unique_within_one_millisecond() {
        let tmp = tempfile::tempdir().unwrap();
        let mirror = JsonFile::for_kind(tmp.path(), Kind::Events);
        let mut store = CollectionStore::load(Kind::Events, mirror).await;
        let stamp = Stamp::from(Utc.with_ymd_and_hms(2024, 5, 1, 19, 0, 0).unwrap());
        let a = store.append_at(fields("a"), stamp);
        let b = store.append_at(fields("b"), stamp);
        let c = store.append_at(fields("c"), stamp);
        let a_id = a.id.as_i64().unwrap();
        assert_eq!(a_id, stamp.millis());
        assert_eq!(b.id.as_i64(), Some(a_id + 1));
        assert_eq!(c.id.as_i64(), Some(a_id + 2));
        assert_eq!(a.created_at, b.created_at);
    }

    #[tokio::test]
    async fn ids_continue_after_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let mirror = JsonFile::for_kind(tmp.path(), Kind::Events);
        let mut store = CollectionStore::load(Kind::Events, mirror.clone()).await;
        let far_future = Stamp::from(Utc.with_ymd_and_hms(2999, 1, 1, 0, 0, 0).unwrap());
        let first = store.append_at(fields("future"), far_future);
        store.persist().await.unwrap();

        let mut reloaded = CollectionStore::load(Kind::Events, mirror).await;
        let next = reloaded.append(fields("now"));
        assert_eq!(next.id.as_i64(), Some(first.id.as_i64().unwrap() + 1));
    }

    #[tokio::test]
    async fn remove_and_restore() {
        let tmp = tempfile::tempdir().unwrap();
        let mirror = JsonFile::for_kind(tmp.path(), Kind::Events);
        let mut store = CollectionStore::load(Kind::Events, mirror).await;
        let a = store.append(fields("a"));
        let b = store.append(fields("b"));
        let c = store.append(fields("c"));

        assert!(store.remove_by_id(None).is_none());
        assert!(store.remove_by_id(Some(RecordId(-1))).is_none());
        assert_eq!(store.records().len(), 3);

        let (index, removed) = store.remove_by_id(Some(RecordId(b.id.as_i64().unwrap()))).unwrap();
        assert_eq!(index, 1);
        assert_eq!(removed, b);
        assert_eq!(store.records(), &[a.clone(), c.clone()]);

        store.restore(index, removed);
        assert_eq!(store.records(), &[a, b, c]);
    }

    #[tokio::test]
    async fn foreign_ids_are_kept_on_load() {
        let tmp = tempfile::tempdir().unwrap();
        let mirror = JsonFile::for_kind(tmp.path(), Kind::Events);
        let document = json!([
            {"id": "legacy", "title": "Old"},
            {"id": 1714590000000_i64, "title": "Gala", "createdAt": "2024-05-01T19:00:00.000Z"}
        ]);
        std::fs::write(mirror.path(), document.to_string()).unwrap();

        let mut store = CollectionStore::load(Kind::Events, mirror.clone()).await;
        assert_eq!(store.records().len(), 2);
        let on_disk: Value =
            serde_json::from_slice(&std::fs::read(mirror.path()).unwrap()).unwrap();
        assert_eq!(on_disk, document);

        // "legacy" never parses as an id, and nothing else may match it.
        assert!(store.remove_by_id(RecordId::parse_lenient("legacy")).is_none());
        assert!(store.remove_by_id(Some(RecordId(0))).is_none());

        let next = store.append(fields("new"));
        assert!(next.id.as_i64().unwrap() > 1714590000000);
        store.persist().await.unwrap();
        let reloaded = CollectionStore::load(Kind::Events, mirror).await;
        assert_eq!(reloaded.records().len(), 3);
        assert_eq!(reloaded.records()[0].fields["title"], "Old");
        assert_eq!(reloaded.records()[0].id.to_string(), "legacy");
    }

    #[tokio::test]
    async fn wrong_shape_is_set_aside() {
        let tmp = tempfile::tempdir().unwrap();
        let mirror = JsonFile::for_kind(tmp.path(), Kind::Programs);
        std::fs::write(mirror.path(), r#"{"programs": [{"id": 1}]}"#).unwrap();

        let store = CollectionStore::load(Kind::Programs, mirror.clone()).await;
        assert!(store.records().is_empty());
        assert_eq!(std::fs::read_to_string(mirror.path()).unwrap(), "[]");

        let rejected: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.to_string_lossy().contains("programs.json.rejected-"))
            .collect();
        assert_eq!(rejected.len(), 1);
        assert_eq!(
            std::fs::read_to_string(&rejected[0]).unwrap(),
            r#"{"programs": [{"id": 1}]}"#
        );
    }
}
