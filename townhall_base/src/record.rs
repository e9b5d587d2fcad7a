use crate::date_time::Stamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

/// Free-form fields of a record, kept in the order the client sent them.
///
/// Events usually carry `title`, `date`, `time` and `description`, programs `title` and
/// `description`. Nothing is validated.
pub type Fields = Map<String, Value>;

/// Identity of a record.
///
/// Records created here always get `Id`. Older data files may hold anything else under `id`
/// (a string, a float, or no key at all), such a value is kept verbatim in `Other` so a rewrite
/// of the file does not lose it. `Other` never matches a delete.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordKey {
    Id(i64),
    Other(Value),
}

impl RecordKey {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RecordKey::Id(id) => Some(*id),
            RecordKey::Other(_) => None,
        }
    }

    /// No `id` key in the document, a literal `null` reads the same way.
    pub fn is_missing(&self) -> bool {
        matches!(self, RecordKey::Other(Value::Null))
    }
}

impl Default for RecordKey {
    fn default() -> Self {
        RecordKey::Other(Value::Null)
    }
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKey::Id(id) => write!(f, "{id}"),
            RecordKey::Other(Value::String(s)) => f.write_str(s),
            RecordKey::Other(other) => write!(f, "{other}"),
        }
    }
}

/// One event or program entry.
///
/// Serialized flat: `{"id": .., <fields>.., "createdAt": ..}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "RecordKey::is_missing")]
    pub id: RecordKey,
    #[serde(flatten)]
    pub fields: Fields,
    /// Assigned once at creation.
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
}

impl Record {
    /// Builds a record from client fields. Client supplied `id` and `createdAt` are dropped so the
    /// assigned ones always win.
    pub fn new(id: i64, mut fields: Fields, stamp: Stamp) -> Self {
        fields.retain(|key, _| key != "id" && key != "createdAt");
        Record {
            id: RecordKey::Id(id),
            fields,
            created_at: stamp.iso(),
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.fields.get("title").and_then(Value::as_str)
    }

    /// Human readable handle: the title if there is one, the id otherwise.
    pub fn label(&self) -> String {
        match self.title() {
            Some(title) if !title.trim().is_empty() => title.to_string(),
            _ => self.id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Record, RecordKey};
    use crate::date_time::Stamp;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    fn stamp() -> Stamp {
        Stamp::from(Utc.with_ymd_and_hms(2024, 5, 1, 19, 0, 0).unwrap())
    }

    #[test]
    fn serializes_flat_in_order() {
        let Value::Object(fields) = json!({
            "title": "Gala",
            "date": "2024-05-01",
            "time": "19:00",
            "description": "Annual gala"
        }) else {
            unreachable!()
        };
        let record = Record::new(7, fields, stamp());
        let s = serde_json::to_string(&record).unwrap();
        assert_eq!(
            s,
            r#"{"id":7,"title":"Gala","date":"2024-05-01","time":"19:00","description":"Annual gala","createdAt":"2024-05-01T19:00:00.000Z"}"#
        );
    }

    #[test]
    fn client_id_and_created_at_are_ignored() {
        let Value::Object(fields) = json!({"id": 1, "createdAt": "yesterday", "title": "x"}) else {
            unreachable!()
        };
        let record = Record::new(42, fields, stamp());
        assert_eq!(record.id, RecordKey::Id(42));
        assert_eq!(record.created_at, "2024-05-01T19:00:00.000Z");
        assert_eq!(record.fields.len(), 1);
    }

    #[test]
    fn deserializes_with_unknown_fields() {
        let record: Record =
            serde_json::from_str(r#"{"id":3,"title":"Choir","extra":[1,2],"createdAt":"t"}"#)
                .unwrap();
        assert_eq!(record.id.as_i64(), Some(3));
        assert_eq!(record.title(), Some("Choir"));
        assert_eq!(record.fields["extra"], json!([1, 2]));
        assert_eq!(record.created_at, "t");
    }

    #[test]
    fn label_falls_back_to_id() {
        let record: Record = serde_json::from_str(r#"{"id":9,"title":"  "}"#).unwrap();
        assert_eq!(record.label(), "9");
        assert_eq!(record.created_at, "");
    }

    #[test]
    fn foreign_ids_survive_a_rewrite() {
        let text = r#"[{"id":"legacy","title":"Old"},{"id":1.5},{"title":"No id"}]"#;
        let records: Vec<Record> = serde_json::from_str(text).unwrap();
        assert_eq!(records[0].id, RecordKey::Other(json!("legacy")));
        assert_eq!(records[0].id.as_i64(), None);
        assert_eq!(records[0].label(), "Old");
        assert_eq!(records[1].id, RecordKey::Other(json!(1.5)));
        assert!(records[2].id.is_missing());
        assert_eq!(records[2].label(), "null");

        let back: Value = serde_json::to_value(&records).unwrap();
        assert_eq!(
            back,
            json!([
                {"id": "legacy", "title": "Old", "createdAt": ""},
                {"id": 1.5, "createdAt": ""},
                {"title": "No id", "createdAt": ""}
            ])
        );
    }
}
