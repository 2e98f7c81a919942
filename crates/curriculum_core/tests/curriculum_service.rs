use curriculum_core::db::open_db_in_memory;
use curriculum_core::{
    ContentCatalog, ContentError, ContentProvisioner, ContentRequest, CurriculumNode,
    CurriculumService, CurriculumServiceError, Forest, NodeId, NodeKind, NodeMutationRequest,
    NodeSpec, SqliteContentRepository, SqliteUnitRepository, Unit, UnitRepoError, UnitRepoResult,
    UnitRepository, UnitSummary,
};
use rusqlite::Connection;
use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn service(
    conn: &Connection,
) -> CurriculumService<SqliteUnitRepository<'_>, SqliteContentRepository<'_>> {
    CurriculumService::new(
        SqliteUnitRepository::try_new(conn).unwrap(),
        SqliteContentRepository::try_new(conn).unwrap(),
    )
}

fn leaf(id: &str) -> CurriculumNode {
    CurriculumNode::leaf(id, NodeKind::Lesson, format!("Lesson {id}"), "")
}

fn request(unit_id: &str, target: &str, kind: NodeKind, title: &str) -> NodeMutationRequest {
    NodeMutationRequest {
        unit_id: unit_id.to_string(),
        target_node_id: target.to_string(),
        spec: NodeSpec::new(kind, title, "  shown on hover  "),
        input_sub_type: None,
    }
}

fn child_ids(node: &CurriculumNode) -> Vec<&str> {
    node.children.iter().map(|child| child.id.as_str()).collect()
}

fn node_count(conn: &Connection, unit_id: &str) -> i64 {
    SqliteUnitRepository::try_new(conn)
        .unwrap()
        .get_summary(unit_id)
        .unwrap()
        .unwrap()
        .node_count
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

fn content_ids(conn: &Connection) -> Vec<NodeId> {
    SqliteContentRepository::try_new(conn)
        .unwrap()
        .list_content_ids()
        .unwrap()
}

struct FailingProvisioner {
    calls: Cell<usize>,
}

impl ContentProvisioner for FailingProvisioner {
    fn create_content(&self, _request: &ContentRequest) -> Result<NodeId, ContentError> {
        self.calls.set(self.calls.get() + 1);
        Err(ContentError::Rejected("upstream unavailable".to_string()))
    }
}

struct FixedIdProvisioner(&'static str);

impl ContentProvisioner for FixedIdProvisioner {
    fn create_content(&self, _request: &ContentRequest) -> Result<NodeId, ContentError> {
        Ok(self.0.to_string())
    }
}

/// Delegating repository with injectable failures.
struct ScriptedRepo<'conn> {
    inner: SqliteUnitRepository<'conn>,
    fail_summary: bool,
    race_on_save: bool,
}

impl UnitRepository for ScriptedRepo<'_> {
    fn create_unit(&self, title: &str, forest: &Forest, node_count: i64) -> UnitRepoResult<Unit> {
        self.inner.create_unit(title, forest, node_count)
    }

    fn get_unit(&self, unit_id: &str) -> UnitRepoResult<Option<Unit>> {
        self.inner.get_unit(unit_id)
    }

    fn list_units(&self) -> UnitRepoResult<Vec<Unit>> {
        self.inner.list_units()
    }

    fn save_unit(&self, unit: &Unit) -> UnitRepoResult<i64> {
        if self.race_on_save {
            // Another writer commits its own copy first.
            let mut other = self.inner.get_unit(&unit.id)?.unwrap();
            other.forest.push(leaf("from-other-writer"));
            self.inner.save_unit(&other)?;
        }
        self.inner.save_unit(unit)
    }

    fn get_summary(&self, unit_id: &str) -> UnitRepoResult<Option<UnitSummary>> {
        self.inner.get_summary(unit_id)
    }

    fn list_summaries(&self) -> UnitRepoResult<Vec<UnitSummary>> {
        self.inner.list_summaries()
    }

    fn adjust_node_count(&self, unit_id: &str, delta: i64) -> UnitRepoResult<()> {
        if self.fail_summary {
            return Err(UnitRepoError::InvalidData("summary store offline".to_string()));
        }
        self.inner.adjust_node_count(unit_id, delta)
    }

    fn set_node_count(&self, unit_id: &str, node_count: i64) -> UnitRepoResult<()> {
        self.inner.set_node_count(unit_id, node_count)
    }
}

#[test]
fn create_unit_seeds_summary_with_full_count() {
    let conn = setup();
    let service = service(&conn);

    let forest = vec![leaf("1").with_children(vec![leaf("2"), leaf("3")])];
    let unit = service.create_unit("  Fractions  ", forest).unwrap();

    assert_eq!(unit.title, "Fractions");
    assert_eq!(unit.version, 1);
    let summaries = service.list_units().unwrap();
    assert_eq!(
        summaries,
        vec![UnitSummary {
            id: unit.id.clone(),
            title: "Fractions".to_string(),
            node_count: 3,
        }]
    );
}

#[test]
fn create_unit_rejects_blank_title_and_duplicate_ids() {
    let conn = setup();
    let service = service(&conn);

    let err = service.create_unit("   ", Vec::new()).unwrap_err();
    assert!(matches!(err, CurriculumServiceError::InvalidTitle));

    let err = service
        .create_unit("Dupes", vec![leaf("a"), leaf("a")])
        .unwrap_err();
    assert!(matches!(err, CurriculumServiceError::DuplicateNodeId(id) if id == "a"));
    assert!(service.list_units().unwrap().is_empty());
}

#[test]
fn append_child_provisions_content_and_persists_tree() {
    let conn = setup();
    let service = service(&conn);
    let unit = service
        .create_unit("Fractions", vec![leaf("1").with_children(vec![leaf("2")])])
        .unwrap();

    let mut append = request(&unit.id, "1", NodeKind::Video, " Halves explained ");
    append.input_sub_type = Some(" slides ".to_string());
    let created = service.append_child(&append).unwrap();

    assert_eq!(created.kind, NodeKind::Video);
    assert_eq!(created.title, "Halves explained");
    assert_eq!(created.description, "  shown on hover  ");
    assert!(created.children.is_empty());

    let stored = service.get_unit(&unit.id).unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(child_ids(&stored.forest[0]), vec!["2", created.id.as_str()]);

    let catalog = SqliteContentRepository::try_new(&conn).unwrap();
    let document = catalog.get_content(&created.id).unwrap().unwrap();
    assert_eq!(document.kind, NodeKind::Video);
    assert_eq!(document.title, "Halves explained");
    assert_eq!(document.sub_type.as_deref(), Some("slides"));

    assert_eq!(node_count(&conn, &unit.id), 3);
}

#[test]
fn insert_between_moves_children_under_new_node() {
    let conn = setup();
    let service = service(&conn);
    let unit = service
        .create_unit(
            "Fractions",
            vec![leaf("1").with_children(vec![leaf("a"), leaf("b")])],
        )
        .unwrap();

    let created = service
        .insert_between(&request(&unit.id, "1", NodeKind::Quiz, "Checkpoint"))
        .unwrap();
    assert_eq!(child_ids(&created), vec!["a", "b"]);

    let stored = service.get_unit(&unit.id).unwrap();
    assert_eq!(child_ids(&stored.forest[0]), vec![created.id.as_str()]);
    assert_eq!(child_ids(&stored.forest[0].children[0]), vec!["a", "b"]);
    assert_eq!(node_count(&conn, &unit.id), 4);
}

#[test]
fn delete_node_reparents_and_keeps_content() {
    let conn = setup();
    let service = service(&conn);
    let unit = service
        .create_unit("Fractions", vec![leaf("1").with_children(vec![leaf("2")])])
        .unwrap();

    let created = service
        .insert_between(&request(&unit.id, "1", NodeKind::Quiz, "Checkpoint"))
        .unwrap();
    let removed = service.delete_node(&unit.id, &created.id).unwrap();
    assert_eq!(removed.id, created.id);

    let stored = service.get_unit(&unit.id).unwrap();
    assert_eq!(
        stored.forest,
        vec![leaf("1").with_children(vec![leaf("2")])]
    );
    assert_eq!(stored.version, 3);
    assert_eq!(node_count(&conn, &unit.id), 2);
    assert_eq!(content_ids(&conn), vec![created.id]);
}

#[test]
fn missing_unit_and_nodes_surface_not_found() {
    let conn = setup();
    let service = service(&conn);
    let unit = service.create_unit("Fractions", vec![leaf("1")]).unwrap();

    let err = service
        .append_child(&request("nope", "1", NodeKind::Lesson, "X"))
        .unwrap_err();
    assert!(matches!(err, CurriculumServiceError::UnitNotFound(id) if id == "nope"));

    let err = service
        .insert_between(&request(&unit.id, "missing", NodeKind::Lesson, "X"))
        .unwrap_err();
    assert!(matches!(err, CurriculumServiceError::TargetNotFound(id) if id == "missing"));

    let err = service.delete_node(&unit.id, "missing").unwrap_err();
    assert!(matches!(err, CurriculumServiceError::NodeNotFound(id) if id == "missing"));

    let err = service.find_node(&unit.id, "missing").unwrap_err();
    assert!(matches!(err, CurriculumServiceError::NodeNotFound(_)));

    // Target is checked before provisioning, so nothing was created.
    assert!(content_ids(&conn).is_empty());
    assert_eq!(service.get_unit(&unit.id).unwrap().version, 1);
}

#[test]
fn find_node_returns_subtree() {
    let conn = setup();
    let service = service(&conn);
    let unit = service
        .create_unit("Fractions", vec![leaf("1").with_children(vec![leaf("2")])])
        .unwrap();

    let first = service.find_node(&unit.id, "1").unwrap();
    let second = service.find_node(&unit.id, "1").unwrap();
    assert_eq!(first, second);
    assert_eq!(child_ids(&first), vec!["2"]);
}

#[test]
fn blank_title_is_rejected_before_provisioning() {
    let conn = setup();
    let provisioner = FailingProvisioner {
        calls: Cell::new(0),
    };
    let service = CurriculumService::new(SqliteUnitRepository::try_new(&conn).unwrap(), provisioner);
    let unit = service.create_unit("Fractions", vec![leaf("1")]).unwrap();

    let err = service
        .append_child(&request(&unit.id, "1", NodeKind::Lesson, "  "))
        .unwrap_err();
    assert!(matches!(err, CurriculumServiceError::InvalidTitle));
}

#[test]
fn provisioning_failure_aborts_before_mutation() {
    let conn = setup();
    let service = CurriculumService::new(
        SqliteUnitRepository::try_new(&conn).unwrap(),
        FailingProvisioner {
            calls: Cell::new(0),
        },
    );
    let unit = service.create_unit("Fractions", vec![leaf("1")]).unwrap();

    let err = service
        .append_child(&request(&unit.id, "1", NodeKind::Lesson, "Halves"))
        .unwrap_err();
    assert!(matches!(err, CurriculumServiceError::ContentCreationFailed(_)));

    let stored = service.get_unit(&unit.id).unwrap();
    assert_eq!(stored, unit);
    assert_eq!(node_count(&conn, &unit.id), 1);
}

#[test]
fn colliding_content_id_is_rejected_and_tree_untouched() {
    let conn = setup();
    let service = CurriculumService::new(
        SqliteUnitRepository::try_new(&conn).unwrap(),
        FixedIdProvisioner("1"),
    );
    let unit = service.create_unit("Fractions", vec![leaf("1")]).unwrap();

    let err = service
        .append_child(&request(&unit.id, "1", NodeKind::Lesson, "Halves"))
        .unwrap_err();
    assert!(matches!(err, CurriculumServiceError::DuplicateNodeId(id) if id == "1"));
    assert_eq!(service.get_unit(&unit.id).unwrap(), unit);
}

#[test]
fn summary_failure_does_not_fail_mutation() {
    let conn = setup();
    let service = CurriculumService::new(
        ScriptedRepo {
            inner: SqliteUnitRepository::try_new(&conn).unwrap(),
            fail_summary: true,
            race_on_save: false,
        },
        SqliteContentRepository::try_new(&conn).unwrap(),
    );
    let unit = service.create_unit("Fractions", vec![leaf("1")]).unwrap();

    let created = service
        .append_child(&request(&unit.id, "1", NodeKind::Lesson, "Halves"))
        .unwrap();
    assert!(service.find_node(&unit.id, &created.id).is_ok());
    // Stale but harmless.
    assert_eq!(node_count(&conn, &unit.id), 1);

    assert_eq!(service.rebuild_summary(&unit.id).unwrap(), 2);
    assert_eq!(node_count(&conn, &unit.id), 2);
}

#[test]
fn concurrent_write_surfaces_conflict_and_keeps_other_writer() {
    let conn = setup();
    let service = CurriculumService::new(
        ScriptedRepo {
            inner: SqliteUnitRepository::try_new(&conn).unwrap(),
            fail_summary: false,
            race_on_save: true,
        },
        SqliteContentRepository::try_new(&conn).unwrap(),
    );
    let unit = service.create_unit("Fractions", vec![leaf("1")]).unwrap();

    let err = service
        .append_child(&request(&unit.id, "1", NodeKind::Lesson, "Halves"))
        .unwrap_err();
    assert!(matches!(err, CurriculumServiceError::ConcurrentModification(id) if id == unit.id));

    let stored = SqliteUnitRepository::try_new(&conn)
        .unwrap()
        .get_unit(&unit.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(stored.forest, vec![leaf("1"), leaf("from-other-writer")]);
    // The provisioned document is left orphaned.
    assert_eq!(content_ids(&conn).len(), 1);
    assert_eq!(node_count(&conn, &unit.id), 1);
}

#[test]
fn sweep_removes_only_unreferenced_content() {
    let conn = setup();
    let service = service(&conn);
    let unit = service.create_unit("Fractions", vec![leaf("1")]).unwrap();

    let kept = service
        .append_child(&request(&unit.id, "1", NodeKind::Lesson, "Halves"))
        .unwrap();
    let dropped = service
        .append_child(&request(&unit.id, "1", NodeKind::Quiz, "Check"))
        .unwrap();
    service.delete_node(&unit.id, &dropped.id).unwrap();

    let catalog = SqliteContentRepository::try_new(&conn).unwrap();
    let deleted = service.sweep_orphaned_content(&catalog, i64::MAX).unwrap();
    assert_eq!(deleted, vec![dropped.id]);
    assert_eq!(content_ids(&conn), vec![kept.id]);
}

#[test]
fn sweep_spares_content_newer_than_cutoff() {
    let conn = setup();
    let service = service(&conn);
    let unit = service.create_unit("Fractions", vec![leaf("1")]).unwrap();
    let catalog = SqliteContentRepository::try_new(&conn).unwrap();

    // Provisioned for a mutation that has not persisted its node yet.
    let pending = catalog
        .create_content(&ContentRequest {
            kind: NodeKind::Lesson,
            title: "Halves".to_string(),
            sub_type: None,
        })
        .unwrap();
    let an_hour_ago = now_ms() - 3_600_000;

    let deleted = service
        .sweep_orphaned_content(&catalog, an_hour_ago)
        .unwrap();
    assert!(deleted.is_empty());
    assert_eq!(content_ids(&conn), vec![pending.clone()]);

    conn.execute(
        "UPDATE content_documents SET created_at = created_at - 7200000 WHERE content_id = ?1;",
        [&pending],
    )
    .unwrap();
    let deleted = service
        .sweep_orphaned_content(&catalog, an_hour_ago)
        .unwrap();
    assert_eq!(deleted, vec![pending]);
    assert!(content_ids(&conn).is_empty());
    assert_eq!(node_count(&conn, &unit.id), 1);
}

#[test]
fn get_summary_reads_listing_row() {
    let conn = setup();
    let service = service(&conn);
    let unit = service
        .create_unit("Fractions", vec![leaf("1").with_children(vec![leaf("2")])])
        .unwrap();

    let summary = service.get_summary(&unit.id).unwrap();
    assert_eq!(summary.id, unit.id);
    assert_eq!(summary.title, "Fractions");
    assert_eq!(summary.node_count, 2);

    let err = service.get_summary("missing").unwrap_err();
    assert!(matches!(err, CurriculumServiceError::UnitNotFound(id) if id == "missing"));
}

#[test]
fn persisted_forest_round_trips_after_mixed_edits() {
    let conn = setup();
    let service = service(&conn);
    let unit = service
        .create_unit("Fractions", vec![leaf("root").with_children(vec![leaf("a")])])
        .unwrap();

    let appended = service
        .append_child(&request(&unit.id, "a", NodeKind::Video, "Clip"))
        .unwrap();
    service
        .insert_between(&request(&unit.id, "root", NodeKind::Quiz, "Gate"))
        .unwrap();
    service.delete_node(&unit.id, "a").unwrap();

    let stored = service.get_unit(&unit.id).unwrap();
    let gate = &stored.forest[0].children[0];
    assert_eq!(gate.kind, NodeKind::Quiz);
    assert_eq!(child_ids(gate), vec![appended.id.as_str()]);
    assert_eq!(node_count(&conn, &unit.id), 3);

    let reloaded = service.get_unit(&unit.id).unwrap();
    assert_eq!(reloaded, stored);
}
