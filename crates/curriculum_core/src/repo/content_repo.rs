//! Backing content documents for curriculum nodes.
//!
//! # Responsibility
//! - Provision lesson/video/quiz documents and hand back their durable id.
//! - Offer catalog access used by the orphan cleanup sweep.
//!
//! # Invariants
//! - A returned content id refers to a committed row.
//! - Content ids are UUID v4 text and double as node ids.

use crate::db::DbError;
use crate::model::node::{NodeId, NodeKind};
use crate::repo::schema::{ensure_table_ready, SchemaError};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Errors from content provisioning and catalog access.
#[derive(Debug)]
pub enum ContentError {
    Db(DbError),
    Schema(SchemaError),
    /// Provisioner refused the request (validation, quota, upstream failure).
    Rejected(String),
    InvalidData(String),
}

impl Display for ContentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::Rejected(message) => write!(f, "content request rejected: {message}"),
            Self::InvalidData(message) => write!(f, "invalid content data: {message}"),
        }
    }
}

impl Error for ContentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::Rejected(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<rusqlite::Error> for ContentError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<SchemaError> for ContentError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

/// Request for one new content document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    pub kind: NodeKind,
    pub title: String,
    /// Optional editor hint (e.g. lesson input flavor) stored with the document.
    pub sub_type: Option<String>,
}

/// Stored content document metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDocument {
    pub content_id: NodeId,
    pub kind: NodeKind,
    pub title: String,
    pub sub_type: Option<String>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
}

/// Creates backing content documents for new nodes.
pub trait ContentProvisioner {
    /// Creates one document and returns its durable id.
    fn create_content(&self, request: &ContentRequest) -> Result<NodeId, ContentError>;
}

/// Read/delete access to provisioned documents.
pub trait ContentCatalog {
    fn get_content(&self, content_id: &str) -> Result<Option<ContentDocument>, ContentError>;
    /// Lists ids ordered by `created_at ASC, content_id ASC`.
    fn list_content_ids(&self) -> Result<Vec<NodeId>, ContentError>;
    /// Lists ids with `created_at < cutoff_ms`, in the same order.
    fn list_content_ids_created_before(
        &self,
        cutoff_ms: i64,
    ) -> Result<Vec<NodeId>, ContentError>;
    /// Returns whether a row was removed.
    fn delete_content(&self, content_id: &str) -> Result<bool, ContentError>;
}

/// SQLite-backed content repository.
pub struct SqliteContentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContentRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> Result<Self, ContentError> {
        ensure_table_ready(
            conn,
            "content_documents",
            &["content_id", "kind", "title", "sub_type", "created_at"],
        )?;
        Ok(Self { conn })
    }
}

impl ContentProvisioner for SqliteContentRepository<'_> {
    fn create_content(&self, request: &ContentRequest) -> Result<NodeId, ContentError> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(ContentError::Rejected("title must not be blank".to_string()));
        }

        let content_id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO content_documents (content_id, kind, title, sub_type)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                content_id,
                request.kind.as_str(),
                title,
                request.sub_type.as_deref(),
            ],
        )?;
        Ok(content_id)
    }
}

impl ContentCatalog for SqliteContentRepository<'_> {
    fn get_content(&self, content_id: &str) -> Result<Option<ContentDocument>, ContentError> {
        let mut stmt = self.conn.prepare(
            "SELECT content_id, kind, title, sub_type, created_at
             FROM content_documents
             WHERE content_id = ?1;",
        )?;
        let mut rows = stmt.query([content_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_content_row(row)?));
        }
        Ok(None)
    }

    fn list_content_ids(&self) -> Result<Vec<NodeId>, ContentError> {
        let mut stmt = self.conn.prepare(
            "SELECT content_id
             FROM content_documents
             ORDER BY created_at ASC, content_id ASC;",
        )?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn list_content_ids_created_before(
        &self,
        cutoff_ms: i64,
    ) -> Result<Vec<NodeId>, ContentError> {
        let mut stmt = self.conn.prepare(
            "SELECT content_id
             FROM content_documents
             WHERE created_at < ?1
             ORDER BY created_at ASC, content_id ASC;",
        )?;
        let ids = stmt
            .query_map([cutoff_ms], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn delete_content(&self, content_id: &str) -> Result<bool, ContentError> {
        let changed = self.conn.execute(
            "DELETE FROM content_documents WHERE content_id = ?1;",
            [content_id],
        )?;
        Ok(changed > 0)
    }
}

fn parse_content_row(row: &Row<'_>) -> Result<ContentDocument, ContentError> {
    let kind_text: String = row.get("kind")?;
    let kind = kind_text.parse::<NodeKind>().map_err(|_| {
        ContentError::InvalidData(format!(
            "invalid content kind `{kind_text}` in content_documents.kind"
        ))
    })?;

    Ok(ContentDocument {
        content_id: row.get("content_id")?,
        kind,
        title: row.get("title")?,
        sub_type: row.get("sub_type")?,
        created_at: row.get("created_at")?,
    })
}
