//! Unit repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist a unit's forest as flat `unit_nodes` rows (parent id + sort order).
//! - Maintain the advisory `unit_summaries` row next to each unit.
//!
//! # Invariants
//! - `save_unit` succeeds only when the stored version equals `unit.version`;
//!   the version bump and the node rewrite commit in one transaction.
//! - Forest assembly is iterative, so stored depth is bounded by memory only.
//! - Summary node counts never go below zero.
//! - Read paths reject dangling or cyclic parent links instead of masking them.

use crate::db::DbError;
use crate::model::node::{CurriculumNode, Forest, NodeKind};
use crate::model::unit::{Unit, UnitId, UnitSummary};
use crate::repo::schema::{ensure_table_ready, SchemaError};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const UNIT_SELECT_SQL: &str = "SELECT unit_id, title, version FROM units";
const SUMMARY_SELECT_SQL: &str = "SELECT unit_id, title, node_count FROM unit_summaries";

/// Result type used by unit repository operations.
pub type UnitRepoResult<T> = Result<T, UnitRepoError>;

/// Errors from unit repository operations.
#[derive(Debug)]
pub enum UnitRepoError {
    Db(DbError),
    Schema(SchemaError),
    UnitNotFound(UnitId),
    /// Stored version moved on since the unit was loaded.
    VersionConflict {
        unit_id: UnitId,
        expected_version: i64,
        actual_version: i64,
    },
    InvalidData(String),
}

impl Display for UnitRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::UnitNotFound(id) => write!(f, "unit not found: {id}"),
            Self::VersionConflict {
                unit_id,
                expected_version,
                actual_version,
            } => write!(
                f,
                "unit {unit_id} was modified concurrently: expected version {expected_version}, found {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted unit data: {message}"),
        }
    }
}

impl Error for UnitRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::UnitNotFound(_) | Self::VersionConflict { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for UnitRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for UnitRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<SchemaError> for UnitRepoError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

/// Repository interface for unit storage.
pub trait UnitRepository {
    /// Creates a unit at version 1 and seeds its summary with `node_count`.
    fn create_unit(&self, title: &str, forest: &Forest, node_count: i64) -> UnitRepoResult<Unit>;
    /// Loads one unit with its full forest.
    fn get_unit(&self, unit_id: &str) -> UnitRepoResult<Option<Unit>>;
    /// Loads every unit. Used by maintenance sweeps, not by request paths.
    fn list_units(&self) -> UnitRepoResult<Vec<Unit>>;
    /// Writes the forest if the stored version equals `unit.version`.
    ///
    /// Returns the new stored version.
    fn save_unit(&self, unit: &Unit) -> UnitRepoResult<i64>;
    /// Loads one summary.
    fn get_summary(&self, unit_id: &str) -> UnitRepoResult<Option<UnitSummary>>;
    /// Lists summaries ordered by `title ASC, unit_id ASC`.
    fn list_summaries(&self) -> UnitRepoResult<Vec<UnitSummary>>;
    /// Adds `delta` to the summary node count, clamped at zero.
    fn adjust_node_count(&self, unit_id: &str, delta: i64) -> UnitRepoResult<()>;
    /// Overwrites the summary node count.
    fn set_node_count(&self, unit_id: &str, node_count: i64) -> UnitRepoResult<()>;
}

/// SQLite-backed unit repository.
pub struct SqliteUnitRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUnitRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> UnitRepoResult<Self> {
        ensure_table_ready(
            conn,
            "units",
            &["unit_id", "title", "version", "updated_at"],
        )?;
        ensure_table_ready(
            conn,
            "unit_nodes",
            &[
                "unit_id",
                "node_id",
                "parent_id",
                "sort_order",
                "kind",
                "title",
                "description",
            ],
        )?;
        ensure_table_ready(conn, "unit_summaries", &["unit_id", "title", "node_count"])?;
        Ok(Self { conn })
    }
}

impl UnitRepository for SqliteUnitRepository<'_> {
    fn create_unit(&self, title: &str, forest: &Forest, node_count: i64) -> UnitRepoResult<Unit> {
        let unit_id = Uuid::new_v4().to_string();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO units (unit_id, title, version)
             VALUES (?1, ?2, 1);",
            params![unit_id, title],
        )?;
        insert_node_rows(&tx, &unit_id, forest)?;
        tx.execute(
            "INSERT INTO unit_summaries (unit_id, title, node_count)
             VALUES (?1, ?2, ?3);",
            params![unit_id, title, node_count.max(0)],
        )?;
        tx.commit()?;

        Ok(Unit {
            id: unit_id,
            title: title.to_string(),
            forest: forest.clone(),
            version: 1,
        })
    }

    fn get_unit(&self, unit_id: &str) -> UnitRepoResult<Option<Unit>> {
        // One read transaction so the unit row and its node rows agree.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let unit = load_unit(&tx, unit_id)?;
        tx.commit()?;
        Ok(unit)
    }

    fn list_units(&self) -> UnitRepoResult<Vec<Unit>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let unit_ids = tx
            .prepare("SELECT unit_id FROM units ORDER BY unit_id ASC;")?
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut units = Vec::with_capacity(unit_ids.len());
        for unit_id in unit_ids {
            if let Some(unit) = load_unit(&tx, &unit_id)? {
                units.push(unit);
            }
        }
        tx.commit()?;
        Ok(units)
    }

    fn save_unit(&self, unit: &Unit) -> UnitRepoResult<i64> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE units
             SET version = version + 1,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE unit_id = ?1
               AND version = ?2;",
            params![unit.id, unit.version],
        )?;
        if changed != 1 {
            let stored: Option<i64> = tx
                .query_row(
                    "SELECT version FROM units WHERE unit_id = ?1;",
                    [unit.id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            return match stored {
                None => Err(UnitRepoError::UnitNotFound(unit.id.clone())),
                Some(actual_version) => Err(UnitRepoError::VersionConflict {
                    unit_id: unit.id.clone(),
                    expected_version: unit.version,
                    actual_version,
                }),
            };
        }

        tx.execute(
            "DELETE FROM unit_nodes WHERE unit_id = ?1;",
            [unit.id.as_str()],
        )?;
        insert_node_rows(&tx, &unit.id, &unit.forest)?;
        tx.commit()?;
        Ok(unit.version + 1)
    }

    fn get_summary(&self, unit_id: &str) -> UnitRepoResult<Option<UnitSummary>> {
        let summary = self
            .conn
            .query_row(
                &format!("{SUMMARY_SELECT_SQL} WHERE unit_id = ?1;"),
                [unit_id],
                parse_summary_row,
            )
            .optional()?;
        Ok(summary)
    }

    fn list_summaries(&self) -> UnitRepoResult<Vec<UnitSummary>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SUMMARY_SELECT_SQL} ORDER BY title ASC, unit_id ASC;"))?;
        let summaries = stmt
            .query_map([], parse_summary_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    fn adjust_node_count(&self, unit_id: &str, delta: i64) -> UnitRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE unit_summaries
             SET node_count = MAX(node_count + ?2, 0),
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE unit_id = ?1;",
            params![unit_id, delta],
        )?;
        if changed == 0 {
            return Err(UnitRepoError::UnitNotFound(unit_id.to_string()));
        }
        Ok(())
    }

    fn set_node_count(&self, unit_id: &str, node_count: i64) -> UnitRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE unit_summaries
             SET node_count = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE unit_id = ?1;",
            params![unit_id, node_count.max(0)],
        )?;
        if changed == 0 {
            return Err(UnitRepoError::UnitNotFound(unit_id.to_string()));
        }
        Ok(())
    }
}

fn load_unit(conn: &Connection, unit_id: &str) -> UnitRepoResult<Option<Unit>> {
    let header = conn
        .query_row(
            &format!("{UNIT_SELECT_SQL} WHERE unit_id = ?1;"),
            [unit_id],
            parse_unit_header,
        )
        .optional()?;
    let Some((title, version)) = header else {
        return Ok(None);
    };
    if version < 1 {
        return Err(UnitRepoError::InvalidData(format!(
            "invalid version `{version}` in units.version for unit {unit_id}"
        )));
    }

    Ok(Some(Unit {
        id: unit_id.to_string(),
        title,
        forest: load_forest(conn, unit_id)?,
        version,
    }))
}

fn parse_unit_header(row: &Row<'_>) -> rusqlite::Result<(String, i64)> {
    Ok((row.get("title")?, row.get("version")?))
}

fn insert_node_rows(
    conn: &Connection,
    unit_id: &str,
    forest: &[CurriculumNode],
) -> UnitRepoResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO unit_nodes (
            unit_id,
            node_id,
            parent_id,
            sort_order,
            kind,
            title,
            description
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
    )?;

    let mut stack: Vec<(Option<&str>, usize, &CurriculumNode)> = forest
        .iter()
        .enumerate()
        .map(|(index, node)| (None, index, node))
        .collect();
    while let Some((parent_id, sort_order, node)) = stack.pop() {
        stmt.execute(params![
            unit_id,
            node.id,
            parent_id,
            sort_order as i64,
            node.kind.as_str(),
            node.title,
            node.description,
        ])?;
        stack.extend(
            node.children
                .iter()
                .enumerate()
                .map(|(index, child)| (Some(node.id.as_str()), index, child)),
        );
    }
    Ok(())
}

fn load_forest(conn: &Connection, unit_id: &str) -> UnitRepoResult<Forest> {
    let mut stmt = conn.prepare(
        "SELECT node_id, parent_id, kind, title, description
         FROM unit_nodes
         WHERE unit_id = ?1
         ORDER BY sort_order ASC, node_id ASC;",
    )?;
    let mut rows = stmt.query([unit_id])?;

    let mut nodes = Vec::new();
    let mut parent_ids = Vec::new();
    while let Some(row) = rows.next()? {
        let kind_text: String = row.get("kind")?;
        let kind = kind_text.parse::<NodeKind>().map_err(|_| {
            UnitRepoError::InvalidData(format!(
                "invalid node kind `{kind_text}` in unit_nodes.kind for unit {unit_id}"
            ))
        })?;
        nodes.push(CurriculumNode::leaf(
            row.get::<_, String>("node_id")?,
            kind,
            row.get::<_, String>("title")?,
            row.get::<_, String>("description")?,
        ));
        parent_ids.push(row.get::<_, Option<String>>("parent_id")?);
    }

    assemble_forest(unit_id, nodes, &parent_ids)
}

/// Rebuilds the nested forest from rows already ordered by `sort_order`.
fn assemble_forest(
    unit_id: &str,
    nodes: Vec<CurriculumNode>,
    parent_ids: &[Option<String>],
) -> UnitRepoResult<Forest> {
    let slot_by_id: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(slot, node)| (node.id.as_str(), slot))
        .collect();

    let mut roots = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (slot, parent_id) in parent_ids.iter().enumerate() {
        match parent_id {
            None => roots.push(slot),
            Some(parent_id) => {
                let parent_slot = slot_by_id.get(parent_id.as_str()).ok_or_else(|| {
                    UnitRepoError::InvalidData(format!(
                        "node {} in unit {unit_id} references missing parent {parent_id}",
                        nodes[slot].id
                    ))
                })?;
                children[*parent_slot].push(slot);
            }
        }
    }

    // Pre-order from the roots. Rows caught in a parent cycle are never reached.
    let mut order = Vec::with_capacity(nodes.len());
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
    while let Some(slot) = stack.pop() {
        order.push(slot);
        stack.extend(children[slot].iter().rev().copied());
    }
    if order.len() != nodes.len() {
        return Err(UnitRepoError::InvalidData(format!(
            "unit {unit_id} has {} node rows unreachable from its roots",
            nodes.len() - order.len()
        )));
    }

    // Reverse pre-order finishes every child before its parent.
    let mut slots: Vec<Option<CurriculumNode>> = nodes.into_iter().map(Some).collect();
    for &slot in order.iter().rev() {
        let mut attached = Vec::with_capacity(children[slot].len());
        for &child_slot in &children[slot] {
            attached.push(take_slot(&mut slots, child_slot, unit_id)?);
        }
        if let Some(node) = slots[slot].as_mut() {
            node.children = attached;
        }
    }

    roots
        .into_iter()
        .map(|slot| take_slot(&mut slots, slot, unit_id))
        .collect()
}

fn take_slot(
    slots: &mut [Option<CurriculumNode>],
    slot: usize,
    unit_id: &str,
) -> UnitRepoResult<CurriculumNode> {
    slots[slot].take().ok_or_else(|| {
        UnitRepoError::InvalidData(format!("node row attached twice in unit {unit_id}"))
    })
}

fn parse_summary_row(row: &Row<'_>) -> rusqlite::Result<UnitSummary> {
    Ok(UnitSummary {
        id: row.get("unit_id")?,
        title: row.get("title")?,
        node_count: row.get("node_count")?,
    })
}
