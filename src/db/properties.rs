use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::db::connection::Database;
use crate::domain::property::document_id;
use crate::errors::ServerError;

const ID_BYTES: usize = 12;

/// Path segments that name a collection route under `/api/properties/`, so
/// they can never address a single document.
pub const RESERVED_IDS: [&str; 3] = ["search", "geojson", "export.xlsx"];

/// Result of loading a batch of documents into the store.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// URL-safe random id for documents that arrive without one.
pub fn generate_document_id() -> String {
    let mut buf = [0u8; ID_BYTES];
    OsRng.fill_bytes(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// An incoming id is kept only when it can be used verbatim as a path segment.
fn storable_id(raw: Option<String>) -> Option<String> {
    let id = raw?.trim().to_string();
    if id.is_empty() {
        return None;
    }

    let url_safe = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'));
    if !url_safe || RESERVED_IDS.contains(&id.as_str()) || id == "." || id == ".." {
        warn!(%id, "Document id is not usable in a URL, assigning a new one");
        return None;
    }
    Some(id)
}

/// Canonical UTC RFC 3339 with milliseconds, so `created_at` sorts as text.
/// Accepts RFC 3339 with any offset, a naive date-time read as UTC, or a
/// bare date.
fn canonical_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|naive| naive.and_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })?;

    Some(parsed.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Rebuilds the stored document with the columns the store owns, so the
/// normalizer sees the same `id`, `approved` and `createdAt` as the table.
fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Value> {
    let id: String = row.get(0)?;
    let document: String = row.get(1)?;
    let approved: bool = row.get(2)?;
    let created_at: String = row.get(3)?;

    let mut doc = serde_json::from_str::<Value>(&document).unwrap_or_else(|e| {
        warn!(%id, error = %e, "Stored document is not valid JSON");
        Value::Null
    });

    // Unreadable documents are wrapped so the normalizer can still report them by id.
    if !doc.is_object() {
        doc = json!({ "document": doc });
    }
    if let Some(obj) = doc.as_object_mut() {
        obj.remove("_id");
        obj.insert("id".into(), json!(id));
        obj.insert("approved".into(), json!(approved));
        obj.insert("createdAt".into(), json!(created_at));
    }

    Ok(doc)
}

fn query_documents(conn: &Connection, sql: &str) -> Result<Vec<Value>, ServerError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| ServerError::DbError(e.to_string()))?;

    let rows = stmt
        .query_map([], document_from_row)
        .map_err(|e| ServerError::DbError(e.to_string()))?;

    let docs = rows
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::DbError(e.to_string()))?;
    Ok(docs)
}

/// Every stored document, reviewed or not, newest first.
pub fn fetch_all(db: &Database) -> Result<Vec<Value>, ServerError> {
    db.with_conn(|conn| {
        query_documents(
            conn,
            "select id, document, approved, created_at
             from properties
             order by created_at desc, rowid desc",
        )
    })
}

/// Documents still waiting for review, newest first.
pub fn fetch_pending(db: &Database) -> Result<Vec<Value>, ServerError> {
    db.with_conn(|conn| {
        query_documents(
            conn,
            "select id, document, approved, created_at
             from properties
             where approved = 0
             order by created_at desc, rowid desc",
        )
    })
}

pub fn get_by_id(db: &Database, id: &str) -> Result<Option<Value>, ServerError> {
    db.with_conn(|conn| find_document(conn, id))
}

fn find_document(conn: &Connection, id: &str) -> Result<Option<Value>, ServerError> {
    conn.query_row(
        "select id, document, approved, created_at from properties where id = ?",
        params![id],
        document_from_row,
    )
    .optional()
    .map_err(|e| ServerError::DbError(e.to_string()))
}

/// Marks a document as reviewed and returns it as stored afterwards.
pub fn approve(db: &Database, id: &str) -> Result<Value, ServerError> {
    db.with_conn(|conn| {
        let updated = conn
            .execute(
                "update properties set approved = 1 where id = ?",
                params![id],
            )
            .map_err(|e| ServerError::DbError(e.to_string()))?;

        if updated == 0 {
            return Err(ServerError::NotFound);
        }

        info!(%id, "Property approved");
        find_document(conn, id)?.ok_or(ServerError::NotFound)
    })
}

pub fn delete(db: &Database, id: &str) -> Result<(), ServerError> {
    db.with_conn(|conn| {
        let deleted = conn
            .execute("delete from properties where id = ?", params![id])
            .map_err(|e| ServerError::DbError(e.to_string()))?;

        if deleted == 0 {
            return Err(ServerError::NotFound);
        }

        info!(%id, "Property deleted");
        Ok(())
    })
}

/// Loads raw documents as they are. Validation happens on read, so anything
/// that is a JSON object is accepted; an existing id is overwritten. Ids that
/// are not URL-safe or that collide with a route name are replaced.
/// With `replace`, the table is emptied first, in the same transaction.
pub fn import_documents(
    db: &Database,
    docs: &[Value],
    replace: bool,
) -> Result<ImportSummary, ServerError> {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

    db.with_conn(|conn| {
        let tx = conn
            .transaction()
            .map_err(|e| ServerError::DbError(e.to_string()))?;

        if replace {
            let cleared = tx
                .execute("delete from properties", [])
                .map_err(|e| ServerError::DbError(e.to_string()))?;
            info!(cleared, "Cleared existing properties");
        }

        let mut summary = ImportSummary::default();
        for (index, doc) in docs.iter().enumerate() {
            if !doc.is_object() {
                warn!(index, "Skipping document that is not a JSON object");
                summary.skipped += 1;
                continue;
            }

            let id = storable_id(document_id(doc)).unwrap_or_else(generate_document_id);
            let approved = doc.get("approved").and_then(Value::as_bool).unwrap_or(false);
            let created_at = match doc.get("createdAt").and_then(Value::as_str) {
                Some(raw) => canonical_timestamp(raw).unwrap_or_else(|| {
                    warn!(%id, created_at = raw, "Unrecognised createdAt, using import time");
                    now.clone()
                }),
                None => now.clone(),
            };

            tx.execute(
                "insert into properties (id, document, approved, created_at)
                 values (?, ?, ?, ?)
                 on conflict(id) do update set
                    document = excluded.document,
                    approved = excluded.approved,
                    created_at = excluded.created_at",
                params![id, doc.to_string(), approved, created_at],
            )
            .map_err(|e| ServerError::DbError(format!("insert property failed: {e}")))?;

            summary.inserted += 1;
        }

        tx.commit()
            .map_err(|e| ServerError::DbError(e.to_string()))?;

        Ok(summary)
    })
}
