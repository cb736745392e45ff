//! Graph vertices.
//!
//! A node pins a resource identity, who may mutate it, the frozen desired
//! payload (absent for delete intent), the observed payload filled in by
//! the planner, the plan slot, and the outgoing references derived from
//! whichever payload the node carries.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use converge_exec::{Action, CreateAction, DeleteAction, Event, ExistsAction, UpdateAction};
use converge_resource::{Frozen, Path, ResourceId};

use crate::error::{Error, Result};
use crate::plan::{Operation, Plan};

/// Whether the engine may mutate a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ownership {
    /// The engine owns the resource and may create, update and delete it.
    Managed,
    /// The resource belongs to someone else; it is asserted to exist and
    /// never modified.
    External,
    /// Ownership has not been decided; the planner refuses such nodes.
    Unknown,
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Managed => "managed",
            Self::External => "external",
            Self::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

/// Observed liveness of a node's resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    /// Not observed in the cloud.
    DoesNotExist,
    /// Observed and structurally equal to the desired payload.
    Exists,
    /// Observed but differing from the desired payload.
    Stale,
}

/// A cross-resource reference: the field at `path` inside `from`'s payload
/// holds the self-link of `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    /// Referencing resource.
    pub from: ResourceId,
    /// Structural location of the self-link slot inside `from`.
    pub path: Path,
    /// Referenced resource.
    pub to: ResourceId,
}

/// A vertex of the resource graph.
#[derive(Debug, Clone)]
pub struct Node {
    id: ResourceId,
    ownership: Ownership,
    state: NodeState,
    desired: Option<Frozen>,
    observed: Option<Frozen>,
    out_refs: Vec<ResourceRef>,
    plan: Option<Plan>,
}

impl Node {
    pub(crate) fn new(
        id: ResourceId,
        ownership: Ownership,
        desired: Option<Frozen>,
        out_refs: Vec<ResourceRef>,
    ) -> Self {
        Self {
            id,
            ownership,
            state: NodeState::DoesNotExist,
            desired,
            observed: None,
            out_refs,
            plan: None,
        }
    }

    /// The node's identity.
    #[must_use]
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Who may mutate the resource.
    #[must_use]
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Observed liveness, valid after planning.
    #[must_use]
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// The frozen desired payload; absent for delete intent.
    #[must_use]
    pub fn desired(&self) -> Option<&Frozen> {
        self.desired.as_ref()
    }

    /// The observed payload recorded by the planner.
    #[must_use]
    pub fn observed(&self) -> Option<&Frozen> {
        self.observed.as_ref()
    }

    /// Outgoing references of this node.
    #[must_use]
    pub fn out_refs(&self) -> &[ResourceRef] {
        &self.out_refs
    }

    /// The recorded plan, present after a successful planning pass.
    #[must_use]
    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub(crate) fn record_observation(&mut self, observed: Option<Frozen>) {
        self.observed = observed;
    }

    pub(crate) fn record_plan(&mut self, plan: Plan) {
        self.state = match (&self.observed, plan.operation) {
            (None, _) => NodeState::DoesNotExist,
            (Some(_), Operation::Nothing) => NodeState::Exists,
            (Some(_), _) => NodeState::Stale,
        };
        self.plan = Some(plan);
    }

    pub(crate) fn extend_out_refs(&mut self, refs: Vec<ResourceRef>) {
        for r in refs {
            if !self.out_refs.contains(&r) {
                self.out_refs.push(r);
            }
        }
    }

    /// Lower the node's plan into executable actions.
    ///
    /// `inbound_deleters` are the referencing nodes whose own lowering
    /// emits a does-not-exist event; delete actions wait for those so
    /// references are torn down before their target.
    pub fn actions(&self, inbound_deleters: &[ResourceId]) -> Result<Vec<Arc<dyn Action>>> {
        let plan = self
            .plan
            .as_ref()
            .ok_or_else(|| Error::missing_plan(self.id.clone()))?;

        let ref_wants = || -> Vec<Event> {
            let mut wants: Vec<Event> = Vec::new();
            for r in &self.out_refs {
                let event = Event::Exists(r.to.clone());
                if !wants.contains(&event) {
                    wants.push(event);
                }
            }
            wants
        };
        let teardown_wants = || -> Vec<Event> {
            inbound_deleters
                .iter()
                .map(|from| Event::DoesNotExist(from.clone()))
                .collect()
        };

        match plan.operation {
            Operation::Nothing => {
                if self.observed.is_some() {
                    Ok(vec![Arc::new(ExistsAction::new(self.id.clone()))])
                } else {
                    // neither observed nor desired; nothing to assert
                    Ok(Vec::new())
                }
            }
            Operation::Create => {
                let desired = self.desired_or_err(Operation::Create)?;
                Ok(vec![Arc::new(CreateAction::new(
                    desired.clone(),
                    ref_wants(),
                ))])
            }
            Operation::Update => {
                let desired = self.desired_or_err(Operation::Update)?;
                Ok(vec![Arc::new(UpdateAction::new(
                    desired.clone(),
                    ref_wants(),
                ))])
            }
            Operation::Delete => Ok(vec![Arc::new(DeleteAction::new(
                self.id.clone(),
                teardown_wants(),
            ))]),
            Operation::Recreate => {
                let desired = self.desired_or_err(Operation::Recreate)?;
                let mut create_wants = ref_wants();
                // the create half waits for its own delete to finish
                create_wants.push(Event::DoesNotExist(self.id.clone()));
                Ok(vec![
                    Arc::new(DeleteAction::new(self.id.clone(), teardown_wants())),
                    Arc::new(CreateAction::new(desired.clone(), create_wants)),
                ])
            }
        }
    }

    fn desired_or_err(&self, operation: Operation) -> Result<&Frozen> {
        self.desired
            .as_ref()
            .ok_or_else(|| Error::missing_desired(self.id.clone(), operation))
    }
}
