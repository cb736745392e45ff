//! The planner: observed state in, per-node operations and actions out.
//!
//! Planning is atomic. Observed state is fetched for every node first (in
//! parallel, through the rate-limited facade); any non-NotFound failure
//! aborts the pass with every plan slot still empty. Operations then follow
//! the decision table, recreates propagate to referencing nodes, and each
//! node lowers into DAG-ready actions.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info};

use converge_cloud::{CallContext, Cloud};
use converge_exec::Action;
use converge_resource::{diff, Frozen, ResourceId};

use crate::builder::derive_known_refs;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::node::{Node, Ownership, ResourceRef};
use crate::plan::{Operation, Plan};

/// One planned node, for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct PlanRow {
    /// The node.
    pub id: ResourceId,
    /// The chosen operation.
    pub operation: Operation,
    /// Why it was chosen.
    pub why: String,
}

/// Outcome of a planning pass.
pub struct PlanResult {
    /// Per-node decisions in identity order.
    pub rows: Vec<PlanRow>,
    /// Lowered actions, ready for an executor.
    pub actions: Vec<Arc<dyn Action>>,
}

impl PlanResult {
    /// Whether the pass found nothing to change.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.rows.iter().all(|r| r.operation == Operation::Nothing)
    }
}

/// Plan the graph against observed cloud state.
///
/// On success every node's plan slot is recorded and the lowered actions
/// are returned. On failure the graph is untouched.
pub async fn plan(ctx: &CallContext, cloud: &Cloud, graph: &mut Graph) -> Result<PlanResult> {
    let ids = graph.ids();

    // observe everything before deciding anything
    let mut observations = observe(ctx, cloud, &ids).await?;

    // delete-intent nodes carry no desired payload; their observed payload
    // may still reference other graph nodes and orders teardown
    let mut observed_refs: BTreeMap<ResourceId, Vec<ResourceRef>> = BTreeMap::new();
    for id in &ids {
        let node = graph.get(id);
        let is_delete_intent = node.map(|n| n.desired().is_none()).unwrap_or(false);
        if let (true, Some(Some(observed))) = (is_delete_intent, observations.get(id)) {
            let refs = derive_known_refs(id, observed, |to| observations.contains_key(to));
            if !refs.is_empty() {
                observed_refs.insert(id.clone(), refs);
            }
        }
    }

    let mut edges = graph.edges();
    edges.extend(observed_refs.values().flatten().cloned());

    // decision table
    let mut plans: BTreeMap<ResourceId, Plan> = BTreeMap::new();
    for id in &ids {
        let Some(node) = graph.get(id) else { continue };
        let observed = observations.get(id).and_then(|o| o.as_ref());
        plans.insert(id.clone(), decide(node, observed)?);
    }

    // a reference into a deletion is fatal; a reference into a recreate
    // promotes the referrer so it refreshes its target
    for edge in &edges {
        let Some(to_op) = plans.get(&edge.to).map(|p| p.operation) else {
            continue;
        };
        let Some(from_op) = plans.get(&edge.from).map(|p| p.operation) else {
            continue;
        };
        if to_op == Operation::Delete && from_op != Operation::Delete {
            return Err(Error::dangling_ref(edge.from.clone(), edge.to.clone()));
        }
        if to_op == Operation::Recreate && from_op == Operation::Nothing {
            let from_managed = graph
                .get(&edge.from)
                .map(|n| n.ownership() == Ownership::Managed && n.desired().is_some())
                .unwrap_or(false);
            if from_managed {
                debug!(node = %edge.from, target = %edge.to, "promoting to update after recreate");
                plans.insert(
                    edge.from.clone(),
                    Plan::new(
                        Operation::Update,
                        format!("refresh reference to recreated {}", edge.to),
                    ),
                );
            }
        }
    }

    // everything decided; record plans and lower actions
    let mut rows = Vec::with_capacity(ids.len());
    for id in &ids {
        let plan = plans
            .remove(id)
            .ok_or_else(|| Error::missing_plan(id.clone()))?;
        let Some(node) = graph.get_mut(id) else { continue };
        node.record_observation(observations.remove(id).flatten());
        if let Some(refs) = observed_refs.remove(id) {
            node.extend_out_refs(refs);
        }
        info!(node = %id, operation = %plan.operation, why = %plan.why, "planned");
        rows.push(PlanRow {
            id: id.clone(),
            operation: plan.operation,
            why: plan.why.clone(),
        });
        node.record_plan(plan);
    }

    let mut actions: Vec<Arc<dyn Action>> = Vec::new();
    for id in &ids {
        let Some(node) = graph.get(id) else { continue };
        let mut deleters: Vec<ResourceId> = Vec::new();
        for edge in &edges {
            if &edge.to != id {
                continue;
            }
            let emits_teardown = graph
                .get(&edge.from)
                .and_then(|n| n.plan())
                .map(|p| matches!(p.operation, Operation::Delete | Operation::Recreate))
                .unwrap_or(false);
            if emits_teardown && !deleters.contains(&edge.from) {
                deleters.push(edge.from.clone());
            }
        }
        actions.extend(node.actions(&deleters)?);
    }

    info!(
        nodes = rows.len(),
        actions = actions.len(),
        "planning pass complete"
    );
    Ok(PlanResult { rows, actions })
}

/// Fetch observed state for every id through the facade, concurrently.
/// `None` records NotFound; any other failure aborts the whole pass.
async fn observe(
    ctx: &CallContext,
    cloud: &Cloud,
    ids: &[ResourceId],
) -> Result<BTreeMap<ResourceId, Option<Frozen>>> {
    let mut tasks: JoinSet<(ResourceId, converge_cloud::Result<Frozen>)> = JoinSet::new();
    for id in ids {
        let id = id.clone();
        let ctx = ctx.clone();
        let cloud = cloud.clone();
        tasks.spawn(async move {
            let result = cloud.get_frozen(&ctx, &id).await;
            (id, result)
        });
    }

    let mut observations = BTreeMap::new();
    let mut failure: Option<Error> = None;
    while let Some(joined) = tasks.join_next().await {
        let Ok((id, result)) = joined else { continue };
        match result {
            Ok(frozen) => {
                observations.insert(id, Some(frozen));
            }
            Err(err) if err.is_not_found() => {
                observations.insert(id, None);
            }
            Err(err) => {
                // drain remaining fetches; first fatal error wins
                failure.get_or_insert(Error::observation_failed(id, err));
            }
        }
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(observations),
    }
}

/// The operation decision table for one node.
fn decide(node: &Node, observed: Option<&Frozen>) -> Result<Plan> {
    let id = node.id();
    match node.ownership() {
        Ownership::Unknown => Err(Error::unknown_ownership(id.clone())),
        Ownership::External => match (observed, node.desired()) {
            (Some(_), _) => Ok(Plan::new(
                Operation::Nothing,
                "external resource is attached, never mutated",
            )),
            (None, Some(_)) => Err(Error::missing_external(id.clone())),
            (None, None) => Ok(Plan::new(
                Operation::Nothing,
                "neither observed nor desired",
            )),
        },
        Ownership::Managed => match (observed, node.desired()) {
            (None, None) => Ok(Plan::new(
                Operation::Nothing,
                "neither observed nor desired",
            )),
            (None, Some(_)) => Ok(Plan::new(Operation::Create, "not observed")),
            (Some(_), None) => Ok(Plan::new(Operation::Delete, "observed but not desired")),
            (Some(got), Some(want)) => {
                let delta = diff(got, want)?;
                if delta.is_empty() {
                    return Ok(Plan::new(
                        Operation::Nothing,
                        "observed matches desired",
                    ));
                }
                let immutable: Vec<String> = delta
                    .matching_paths(want.metadata().immutable)
                    .iter()
                    .map(|p| p.to_string())
                    .collect();
                if immutable.is_empty() {
                    let why = format!("update in place ({} fields differ)", delta.items.len());
                    Ok(Plan::new(Operation::Update, why).with_diff(delta))
                } else {
                    let why = format!("immutable fields changed: {}", immutable.join(", "));
                    Ok(Plan::new(Operation::Recreate, why).with_diff(delta))
                }
            }
        },
    }
}
