//! Curriculum tree use-case service.
//!
//! # Responsibility
//! - Orchestrate load -> provision -> mutate -> persist -> summary for node edits.
//! - Expose unit/node lookups and unit creation to API callers.
//!
//! # Invariants
//! - Content is provisioned before the forest is touched; a provisioning
//!   failure leaves the stored unit unchanged.
//! - New node ids are the provisioned content ids.
//! - Unit writes are version-checked; conflicts surface as
//!   `ConcurrentModification` and are never retried here.
//! - Summary updates are best-effort and never fail a mutation.
//! - Content created for a mutation that later fails is left in place.

use crate::model::node::{CurriculumNode, Forest, NodeId, NodeSpec};
use crate::model::unit::{Unit, UnitId, UnitSummary};
use crate::repo::content_repo::{ContentCatalog, ContentError, ContentProvisioner, ContentRequest};
use crate::repo::unit_repo::{UnitRepoError, UnitRepository};
use crate::tree::{self, TreeError};
use log::{error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Errors from curriculum service operations.
#[derive(Debug)]
pub enum CurriculumServiceError {
    /// Title is blank after trim.
    InvalidTitle,
    UnitNotFound(UnitId),
    /// Append/insert target does not exist in the unit.
    TargetNotFound(NodeId),
    /// Lookup/delete target does not exist in the unit.
    NodeNotFound(NodeId),
    /// Forest would contain the same node id twice.
    DuplicateNodeId(NodeId),
    /// Content provisioner failed; the tree was not modified.
    ContentCreationFailed(ContentError),
    /// Unit was written by someone else since it was loaded.
    ConcurrentModification(UnitId),
    /// Content catalog failure outside the provisioning step.
    Content(ContentError),
    /// Repository-level failure.
    Repo(UnitRepoError),
}

impl Display for CurriculumServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTitle => write!(f, "title must not be blank"),
            Self::UnitNotFound(id) => write!(f, "unit not found: {id}"),
            Self::TargetNotFound(id) => write!(f, "target node not found: {id}"),
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::DuplicateNodeId(id) => write!(f, "node id already present in unit: {id}"),
            Self::ContentCreationFailed(err) => write!(f, "content creation failed: {err}"),
            Self::ConcurrentModification(id) => {
                write!(f, "unit {id} was modified concurrently; reload and retry")
            }
            Self::Content(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CurriculumServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ContentCreationFailed(err) | Self::Content(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<UnitRepoError> for CurriculumServiceError {
    fn from(value: UnitRepoError) -> Self {
        match value {
            UnitRepoError::UnitNotFound(unit_id) => Self::UnitNotFound(unit_id),
            UnitRepoError::VersionConflict { unit_id, .. } => Self::ConcurrentModification(unit_id),
            other => Self::Repo(other),
        }
    }
}

impl From<TreeError> for CurriculumServiceError {
    fn from(value: TreeError) -> Self {
        match value {
            TreeError::TargetNotFound(id) => Self::TargetNotFound(id),
            TreeError::NodeNotFound(id) => Self::NodeNotFound(id),
            TreeError::DuplicateNodeId(id) => Self::DuplicateNodeId(id),
        }
    }
}

/// Request to create a node next to an existing target node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMutationRequest {
    pub unit_id: UnitId,
    pub target_node_id: NodeId,
    pub spec: NodeSpec,
    /// Editor hint forwarded to the content provisioner.
    pub input_sub_type: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Placement {
    Append,
    Insert,
}

impl Placement {
    fn event(self) -> &'static str {
        match self {
            Self::Append => "node_append",
            Self::Insert => "node_insert",
        }
    }
}

/// Curriculum service facade.
pub struct CurriculumService<R: UnitRepository, P: ContentProvisioner> {
    repo: R,
    provisioner: P,
}

impl<R: UnitRepository, P: ContentProvisioner> CurriculumService<R, P> {
    /// Creates service from repository and provisioner implementations.
    pub fn new(repo: R, provisioner: P) -> Self {
        Self { repo, provisioner }
    }

    /// Creates a unit with an initial forest.
    ///
    /// The forest must not reuse node ids; the summary is seeded with its full
    /// node count.
    pub fn create_unit(
        &self,
        title: impl Into<String>,
        forest: Forest,
    ) -> Result<Unit, CurriculumServiceError> {
        let title = normalize_title(title.into())?;
        tree::validate_forest(&forest)?;
        let node_count = tree::count_nodes(&forest) as i64;
        let unit = self.repo.create_unit(&title, &forest, node_count)?;
        info!(
            "event=unit_create module=curriculum status=ok unit_id={} node_count={}",
            unit.id, node_count
        );
        Ok(unit)
    }

    /// Loads one unit with its full forest.
    pub fn get_unit(&self, unit_id: &str) -> Result<Unit, CurriculumServiceError> {
        self.repo
            .get_unit(unit_id)?
            .ok_or_else(|| CurriculumServiceError::UnitNotFound(unit_id.to_string()))
    }

    /// Lists unit summaries for listing views.
    pub fn list_units(&self) -> Result<Vec<UnitSummary>, CurriculumServiceError> {
        self.repo.list_summaries().map_err(Into::into)
    }

    /// Loads the listing row of one unit.
    pub fn get_summary(&self, unit_id: &str) -> Result<UnitSummary, CurriculumServiceError> {
        self.repo
            .get_summary(unit_id)?
            .ok_or_else(|| CurriculumServiceError::UnitNotFound(unit_id.to_string()))
    }

    /// Looks up one node by id inside one unit.
    pub fn find_node(
        &self,
        unit_id: &str,
        node_id: &str,
    ) -> Result<CurriculumNode, CurriculumServiceError> {
        let unit = self.get_unit(unit_id)?;
        tree::find(&unit.forest, node_id)
            .cloned()
            .ok_or_else(|| CurriculumServiceError::NodeNotFound(node_id.to_string()))
    }

    /// Provisions content and appends it as the target's last child.
    pub fn append_child(
        &self,
        request: &NodeMutationRequest,
    ) -> Result<CurriculumNode, CurriculumServiceError> {
        self.create_and_attach(request, Placement::Append)
    }

    /// Provisions content and interposes it between the target and its children.
    pub fn insert_between(
        &self,
        request: &NodeMutationRequest,
    ) -> Result<CurriculumNode, CurriculumServiceError> {
        self.create_and_attach(request, Placement::Insert)
    }

    /// Deletes one node, moving its children into its former position.
    ///
    /// The backing content document is kept. Returns the removed node with an
    /// empty children list.
    pub fn delete_node(
        &self,
        unit_id: &str,
        node_id: &str,
    ) -> Result<CurriculumNode, CurriculumServiceError> {
        let started_at = Instant::now();
        let mut unit = self.get_unit(unit_id)?;
        let removed = tree::delete(&mut unit.forest, node_id)?;
        self.persist(&mut unit, "node_delete")?;
        self.update_summary(&unit.id, -1);

        info!(
            "event=node_delete module=curriculum status=ok unit_id={} node_id={} version={} duration_ms={}",
            unit.id,
            node_id,
            unit.version,
            started_at.elapsed().as_millis()
        );
        Ok(removed)
    }

    /// Recounts the forest and overwrites the advisory summary count.
    pub fn rebuild_summary(&self, unit_id: &str) -> Result<i64, CurriculumServiceError> {
        let unit = self.get_unit(unit_id)?;
        let node_count = tree::count_nodes(&unit.forest) as i64;
        self.repo.set_node_count(unit_id, node_count)?;
        info!(
            "event=summary_rebuild module=curriculum status=ok unit_id={unit_id} node_count={node_count}"
        );
        Ok(node_count)
    }

    /// Deletes content documents that no unit forest references and that
    /// were created strictly before `created_before_ms` (epoch milliseconds).
    ///
    /// Newer documents may belong to a mutation that has provisioned content
    /// but not yet persisted its node; they are left for a later sweep.
    /// Returns deleted ids.
    pub fn sweep_orphaned_content<C: ContentCatalog>(
        &self,
        catalog: &C,
        created_before_ms: i64,
    ) -> Result<Vec<NodeId>, CurriculumServiceError> {
        let units = self.repo.list_units()?;
        let referenced: HashSet<&str> = units
            .iter()
            .flat_map(|unit| tree::collect_ids(&unit.forest))
            .collect();

        let mut deleted = Vec::new();
        for content_id in catalog
            .list_content_ids_created_before(created_before_ms)
            .map_err(CurriculumServiceError::Content)?
        {
            if referenced.contains(content_id.as_str()) {
                continue;
            }
            if catalog
                .delete_content(&content_id)
                .map_err(CurriculumServiceError::Content)?
            {
                deleted.push(content_id);
            }
        }

        info!(
            "event=content_sweep module=curriculum status=ok created_before_ms={} deleted={}",
            created_before_ms,
            deleted.len()
        );
        Ok(deleted)
    }

    fn create_and_attach(
        &self,
        request: &NodeMutationRequest,
        placement: Placement,
    ) -> Result<CurriculumNode, CurriculumServiceError> {
        let started_at = Instant::now();
        let event = placement.event();
        let title = normalize_title(request.spec.title.clone())?;
        let description = request.spec.description.clone();

        let mut unit = self.get_unit(&request.unit_id)?;
        if tree::find(&unit.forest, &request.target_node_id).is_none() {
            return Err(CurriculumServiceError::TargetNotFound(
                request.target_node_id.clone(),
            ));
        }

        let content_request = ContentRequest {
            kind: request.spec.kind,
            title: title.clone(),
            sub_type: request
                .input_sub_type
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
        };
        let content_id = self
            .provisioner
            .create_content(&content_request)
            .map_err(|err| {
                error!(
                    "event={event} module=curriculum status=error unit_id={} error_code=content_creation_failed error={err}",
                    unit.id
                );
                CurriculumServiceError::ContentCreationFailed(err)
            })?;

        let new_node =
            NodeSpec::new(request.spec.kind, title, description).into_node(content_id.as_str());
        let mutation = match placement {
            Placement::Append => tree::append(&mut unit.forest, &request.target_node_id, new_node),
            Placement::Insert => tree::insert(&mut unit.forest, &request.target_node_id, new_node),
        };
        if let Err(err) = mutation {
            warn!(
                "event={event} module=curriculum status=error unit_id={} orphaned_content_id={content_id} error={err}",
                unit.id
            );
            return Err(err.into());
        }

        if let Err(err) = self.persist(&mut unit, event) {
            warn!(
                "event={event} module=curriculum status=error unit_id={} orphaned_content_id={content_id}",
                unit.id
            );
            return Err(err);
        }
        self.update_summary(&unit.id, 1);

        let created = tree::find(&unit.forest, &content_id)
            .cloned()
            .ok_or_else(|| CurriculumServiceError::NodeNotFound(content_id.clone()))?;
        info!(
            "event={event} module=curriculum status=ok unit_id={} target_node_id={} node_id={} version={} duration_ms={}",
            unit.id,
            request.target_node_id,
            created.id,
            unit.version,
            started_at.elapsed().as_millis()
        );
        Ok(created)
    }

    fn persist(&self, unit: &mut Unit, event: &str) -> Result<(), CurriculumServiceError> {
        match self.repo.save_unit(unit) {
            Ok(version) => {
                unit.version = version;
                Ok(())
            }
            Err(err) => {
                error!(
                    "event={event} module=curriculum status=error unit_id={} error_code=persist_failed error={err}",
                    unit.id
                );
                Err(err.into())
            }
        }
    }

    fn update_summary(&self, unit_id: &str, delta: i64) {
        if let Err(err) = self.repo.adjust_node_count(unit_id, delta) {
            warn!(
                "event=summary_update module=curriculum status=error unit_id={unit_id} delta={delta} error={err}"
            );
        }
    }
}

fn normalize_title(value: String) -> Result<String, CurriculumServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CurriculumServiceError::InvalidTitle);
    }
    Ok(trimmed.to_string())
}
