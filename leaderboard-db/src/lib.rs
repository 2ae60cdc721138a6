mod error;
mod models;

pub use error::{DbError, Result};
pub use models::{
  Collection, DeleteResult, Document, Filter, ID_FIELD, InsertOneResult, PlayerFields,
  RankedPlayer, RecordId, UpdateResult, coerce_score,
};

use serde_json::Value;
use std::path::Path;
use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite::{self, OptionalExtension, params, types::Value as SqlValue};
use tracing::{debug, info};

/// Document store holding the `users` and `players` collections.
///
/// Each collection is a table of JSON bodies keyed by [`RecordId`]. The
/// `rank_score` column is the integer score derived at write time, so rank
/// queries never re-parse submitted scores.
#[derive(Clone)]
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open or create a database at the given path.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = Connection::open(path).await.map_err(DbError::Sqlite)?;
    let db = Self { conn };
    db.initialize().await?;
    Ok(db)
  }

  /// Create an in-memory database (useful for testing).
  pub async fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .await
      .map_err(DbError::Sqlite)?;
    let db = Self { conn };
    db.initialize().await?;
    Ok(db)
  }

  /// Close the underlying connection. Clones of this handle stop working afterwards.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    info!("database closed");
    Ok(())
  }

  async fn initialize(&self) -> Result<()> {
    self
      .conn
      .call(|conn| -> rusqlite::Result<()> {
        // journal_mode echoes the resulting mode; in-memory databases stay "memory"
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;

        for collection in Collection::ALL {
          let table = collection.table();
          // seq keeps insertion order and breaks rank ties
          conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                body TEXT NOT NULL,
                rank_score INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_{table}_rank ON {table}(rank_score DESC, seq ASC);
            "#
          ))?;
        }
        Ok(())
      })
      .await?;

    info!("database initialized");
    Ok(())
  }

  // ========================================================================
  // Reads
  // ========================================================================

  /// Every document in the collection, in insertion order.
  pub async fn find_all(&self, collection: Collection) -> Result<Vec<Document>> {
    let sql = format!("SELECT id, body FROM {} ORDER BY seq", collection.table());
    let rows = self
      .conn
      .call(move |conn| -> rusqlite::Result<Vec<(String, String)>> {
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    debug!(collection = collection.table(), count = rows.len(), "find all");
    rows.into_iter().map(decode_document).collect()
  }

  pub async fn find_by_id(&self, collection: Collection, id: &RecordId) -> Result<Option<Document>> {
    self.find_one(collection, Filter::Id(*id)).await
  }

  /// First document (in insertion order) matching the filter.
  pub async fn find_one(&self, collection: Collection, filter: Filter) -> Result<Option<Document>> {
    let table = collection.table();
    let (sql, param) = match filter {
      Filter::Id(id) => (
        format!("SELECT id, body FROM {table} WHERE id = ?1"),
        Some(SqlValue::Text(id.to_string())),
      ),
      Filter::Eq { field, value } => {
        let path = json_path(&field);
        match value {
          Value::Null => (
            format!(
              "SELECT id, body FROM {table} WHERE json_extract(body, '{path}') IS NULL ORDER BY seq LIMIT 1"
            ),
            None,
          ),
          value => (
            format!(
              "SELECT id, body FROM {table} WHERE json_extract(body, '{path}') = ?1 ORDER BY seq LIMIT 1"
            ),
            Some(to_sql_value(value)),
          ),
        }
      }
    };

    let row = self
      .conn
      .call(move |conn| -> rusqlite::Result<Option<(String, String)>> {
        let mut stmt = conn.prepare_cached(&sql)?;
        let row = match param {
          Some(param) => stmt.query_row([param], |row| Ok((row.get(0)?, row.get(1)?))),
          None => stmt.query_row([], |row| Ok((row.get(0)?, row.get(1)?))),
        };
        row.optional()
      })
      .await?;

    debug!(collection = table, found = row.is_some(), "find one");
    row.map(decode_document).transpose()
  }

  /// Up to `n` documents chosen uniformly at random.
  pub async fn sample_random(&self, collection: Collection, n: usize) -> Result<Vec<Document>> {
    let sql = format!("SELECT id, body FROM {} ORDER BY RANDOM() LIMIT ?1", collection.table());
    let limit = i64::try_from(n).unwrap_or(i64::MAX);
    let rows = self
      .conn
      .call(move |conn| -> rusqlite::Result<Vec<(String, String)>> {
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
          .query_map(params![limit], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows.into_iter().map(decode_document).collect()
  }

  /// All documents ordered by integer score, highest first. Equal scores keep
  /// insertion order.
  pub async fn ranked_by_score(&self, collection: Collection) -> Result<Vec<RankedPlayer>> {
    let sql = format!(
      "SELECT id, body, rank_score FROM {} ORDER BY rank_score DESC, seq ASC",
      collection.table()
    );
    let rows = self
      .conn
      .call(move |conn| -> rusqlite::Result<Vec<(String, String, i64)>> {
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(id, body, score)| -> Result<RankedPlayer> {
        let mut doc = decode_body(&body)?;
        Ok(RankedPlayer {
          id: id.parse()?,
          name: doc.remove("name"),
          country: doc.remove("country"),
          score,
        })
      })
      .collect()
  }

  // ========================================================================
  // Writes
  // ========================================================================

  /// Insert a document. A well-formed `_id` supplied by the caller is kept;
  /// anything else is replaced by a fresh id.
  pub async fn insert_one(&self, collection: Collection, mut doc: Document) -> Result<InsertOneResult> {
    let id = match doc.remove(ID_FIELD) {
      Some(Value::String(s)) => s.parse().unwrap_or_else(|_| RecordId::new()),
      _ => RecordId::new(),
    };
    let rank_score = coerce_score(doc.get("score"));
    let body = serde_json::to_string(&doc)?;
    let sql = format!(
      "INSERT INTO {} (id, body, rank_score) VALUES (?1, ?2, ?3)",
      collection.table()
    );

    self
      .conn
      .call(move |conn| -> rusqlite::Result<()> {
        conn
          .prepare_cached(&sql)?
          .execute(params![id.to_string(), body, rank_score])?;
        Ok(())
      })
      .await?;

    debug!(collection = collection.table(), %id, "inserted document");
    Ok(InsertOneResult {
      acknowledged: true,
      inserted_id: id,
    })
  }

  /// Replace `name`, `country` and `score` on the document with this id,
  /// creating it if it does not exist.
  pub async fn upsert_by_id(
    &self,
    collection: Collection,
    id: &RecordId,
    fields: PlayerFields,
  ) -> Result<UpdateResult> {
    let id = *id;
    let table = collection.table();
    let select_sql = format!("SELECT body FROM {table} WHERE id = ?1");
    let update_sql = format!("UPDATE {table} SET body = ?2, rank_score = ?3 WHERE id = ?1");
    let insert_sql = format!("INSERT INTO {table} (id, body, rank_score) VALUES (?1, ?2, ?3)");

    let result = self
      .conn
      .call(move |conn| -> rusqlite::Result<Result<UpdateResult>> {
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
          .prepare_cached(&select_sql)?
          .query_row(params![id.to_string()], |row| row.get(0))
          .optional()?;

        let (mut doc, matched) = match existing {
          Some(body) => match decode_body(&body) {
            Ok(doc) => (doc, true),
            Err(e) => return Ok(Err(e)),
          },
          None => (Document::new(), false),
        };

        let before = doc.clone();
        fields.apply(&mut doc);
        let modified = matched && doc != before;
        let rank_score = coerce_score(doc.get("score"));
        let body = match serde_json::to_string(&doc) {
          Ok(body) => body,
          Err(e) => return Ok(Err(e.into())),
        };

        if !matched {
          tx.prepare_cached(&insert_sql)?
            .execute(params![id.to_string(), body, rank_score])?;
        } else if modified {
          tx.prepare_cached(&update_sql)?
            .execute(params![id.to_string(), body, rank_score])?;
        }

        tx.commit()?;
        Ok(Ok(UpdateResult {
          acknowledged: true,
          matched_count: matched as u64,
          modified_count: modified as u64,
          upserted_id: (!matched).then_some(id),
          upserted_count: (!matched) as u64,
        }))
      })
      .await??;

    debug!(
      collection = table,
      %id,
      matched = result.matched_count,
      upserted = result.upserted_count,
      "upserted document"
    );
    Ok(result)
  }

  /// Delete by id. Deleting a missing id is not an error; it reports zero deletions.
  pub async fn delete_by_id(&self, collection: Collection, id: &RecordId) -> Result<DeleteResult> {
    let id = *id;
    let sql = format!("DELETE FROM {} WHERE id = ?1", collection.table());
    let deleted = self
      .conn
      .call(move |conn| -> rusqlite::Result<usize> {
        conn.prepare_cached(&sql)?.execute(params![id.to_string()])
      })
      .await?;

    debug!(collection = collection.table(), %id, deleted, "deleted document");
    Ok(DeleteResult {
      acknowledged: true,
      deleted_count: deleted as u64,
    })
  }
}

fn decode_body(body: &str) -> Result<Document> {
  match serde_json::from_str(body)? {
    Value::Object(doc) => Ok(doc),
    _ => Err(DbError::NotAnObject),
  }
}

fn decode_document((id, body): (String, String)) -> Result<Document> {
  let mut doc = decode_body(&body)?;
  doc.insert(ID_FIELD.to_string(), Value::String(id));
  Ok(doc)
}

/// JSON path for a top-level field, quoted so any key is addressable.
fn json_path(field: &str) -> String {
  let escaped = field.replace('\\', "\\\\").replace('"', "\\\"").replace('\'', "''");
  format!("$.\"{escaped}\"")
}

fn to_sql_value(value: Value) -> SqlValue {
  match value {
    Value::Null => SqlValue::Null,
    Value::Bool(b) => SqlValue::Integer(b as i64),
    Value::Number(n) => match n.as_i64() {
      Some(i) => SqlValue::Integer(i),
      None => SqlValue::Real(n.as_f64().unwrap_or_default()),
    },
    Value::String(s) => SqlValue::Text(s),
    other => SqlValue::Text(other.to_string()),
  }
}
