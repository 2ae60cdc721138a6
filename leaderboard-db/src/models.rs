use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::DbError;

/// A stored record. Documents handed out by the store always carry `_id`.
pub type Document = serde_json::Map<String, Value>;

/// Field name used for the record id inside documents.
pub const ID_FIELD: &str = "_id";

/// The two collections the API serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
  Users,
  Players,
}

impl Collection {
  pub const ALL: [Collection; 2] = [Collection::Users, Collection::Players];

  /// Backing table name.
  pub fn table(self) -> &'static str {
    match self {
      Collection::Users => "users",
      Collection::Players => "players",
    }
  }
}

/// 12-byte record id: 4 bytes of big-endian unix seconds followed by 8 random bytes.
/// Rendered as 24 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId([u8; 12]);

impl RecordId {
  /// Generate a fresh id stamped with the current time.
  pub fn new() -> Self {
    let secs = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .map(|d| d.as_secs())
      .unwrap_or(0);
    Self::with_timestamp(secs as u32)
  }

  pub fn with_timestamp(secs: u32) -> Self {
    let mut bytes = [0u8; 12];
    bytes[..4].copy_from_slice(&secs.to_be_bytes());
    bytes[4..].copy_from_slice(&rand::random::<[u8; 8]>());
    Self(bytes)
  }

  /// Seconds since the epoch encoded in the id.
  pub fn timestamp(&self) -> u32 {
    u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
  }
}

impl Default for RecordId {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for RecordId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for byte in self.0 {
      write!(f, "{:02x}", byte)?;
    }
    Ok(())
  }
}

impl FromStr for RecordId {
  type Err = DbError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s.len() != 24 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
      return Err(DbError::MalformedId(s.to_string()));
    }

    let mut bytes = [0u8; 12];
    for (i, byte) in bytes.iter_mut().enumerate() {
      *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
        .map_err(|_| DbError::MalformedId(s.to_string()))?;
    }
    Ok(Self(bytes))
  }
}

impl Serialize for RecordId {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

/// Query for `find_one`.
#[derive(Debug, Clone)]
pub enum Filter {
  /// Match the record with this id.
  Id(RecordId),
  /// Match a top-level field by JSON equality. `Null` also matches a missing field.
  Eq { field: String, value: Value },
}

impl Filter {
  pub fn eq(field: impl Into<String>, value: Value) -> Self {
    Filter::Eq {
      field: field.into(),
      value,
    }
  }
}

/// The fields an upsert is allowed to replace. Absent fields are stored as `null`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerFields {
  #[serde(default)]
  pub name: Value,
  #[serde(default)]
  pub country: Value,
  #[serde(default)]
  pub score: Value,
}

impl PlayerFields {
  pub(crate) fn apply(self, doc: &mut Document) {
    doc.insert("name".to_string(), self.name);
    doc.insert("country".to_string(), self.country);
    doc.insert("score".to_string(), self.score);
  }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResult {
  pub acknowledged: bool,
  pub inserted_id: RecordId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
  pub acknowledged: bool,
  pub matched_count: u64,
  pub modified_count: u64,
  pub upserted_id: Option<RecordId>,
  pub upserted_count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
  pub acknowledged: bool,
  pub deleted_count: u64,
}

/// Projection returned by rank queries: score is always an integer.
#[derive(Debug, Clone, Serialize)]
pub struct RankedPlayer {
  #[serde(rename = "_id")]
  pub id: RecordId,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub country: Option<Value>,
  pub score: i64,
}

/// Integer rank key for a submitted score.
///
/// Integers are kept, floats truncate toward zero, strings are parsed (integer
/// first, then float). Anything else ranks as 0.
pub fn coerce_score(score: Option<&Value>) -> i64 {
  match score {
    Some(Value::Number(n)) => n
      .as_i64()
      .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
      .unwrap_or(0),
    Some(Value::String(s)) => {
      let s = s.trim();
      s.parse::<i64>()
        .ok()
        .or_else(|| {
          s.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
        })
        .unwrap_or(0)
    }
    _ => 0,
  }
}
