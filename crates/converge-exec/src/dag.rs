//! The action DAG.
//!
//! Event edges connect each emitter to every action awaiting that event.
//! Building validates that every awaited event has an emitter and that the
//! graph is acyclic, and fixes a deterministic topological order for the
//! serial executor.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::action::Action;
use crate::error::{Error, Result};
use crate::event::Event;

/// A validated, ordered DAG over actions.
pub struct ActionDag {
    actions: Vec<Arc<dyn Action>>,
    graph: DiGraph<usize, Event>,
    indices: Vec<NodeIndex>,
    order: Vec<usize>,
}

impl ActionDag {
    /// Build and validate the DAG for `actions`.
    ///
    /// Fails with [`Error::MissingEvent`] when an awaited event has no
    /// emitter and [`Error::CycleDetected`] when the event edges form a
    /// cycle.
    pub fn build(actions: Vec<Arc<dyn Action>>) -> Result<Self> {
        let mut graph = DiGraph::new();
        let indices: Vec<NodeIndex> = (0..actions.len()).map(|i| graph.add_node(i)).collect();

        let mut emitters: HashMap<Event, Vec<usize>> = HashMap::new();
        for (i, action) in actions.iter().enumerate() {
            for event in action.events() {
                emitters.entry(event.clone()).or_default().push(i);
            }
        }

        for (i, action) in actions.iter().enumerate() {
            for event in action.wants() {
                let from = emitters.get(event).ok_or_else(|| {
                    Error::missing_event(action.metadata().name.clone(), event)
                })?;
                for &emitter in from {
                    graph.add_edge(indices[emitter], indices[i], event.clone());
                }
            }
        }

        let order = deterministic_topological_order(&actions, &graph, &indices)?;

        Ok(Self {
            actions,
            graph,
            indices,
            order,
        })
    }

    /// The actions, in construction order.
    #[must_use]
    pub fn actions(&self) -> &[Arc<dyn Action>] {
        &self.actions
    }

    /// A dependency-consistent, name-sorted topological order.
    #[must_use]
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Indices of the actions that directly depend on `index`.
    #[must_use]
    pub fn dependents(&self, index: usize) -> Vec<usize> {
        self.graph
            .neighbors_directed(self.indices[index], Direction::Outgoing)
            .map(|n| self.graph[n])
            .collect()
    }

    /// Every emitter of `event`.
    #[must_use]
    pub fn emitters_of(&self, event: &Event) -> Vec<usize> {
        self.actions
            .iter()
            .enumerate()
            .filter(|(_, a)| a.events().contains(event))
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the DAG holds no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Kahn's algorithm with a name-ordered ready set, so equal inputs always
/// produce the same schedule.
fn deterministic_topological_order(
    actions: &[Arc<dyn Action>],
    graph: &DiGraph<usize, Event>,
    indices: &[NodeIndex],
) -> Result<Vec<usize>> {
    let mut indegree: Vec<usize> = indices
        .iter()
        .map(|&n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();

    let mut ready: BTreeSet<(String, usize)> = indegree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(i, _)| (actions[i].metadata().name.clone(), i))
        .collect();

    let mut order = Vec::with_capacity(actions.len());
    while let Some((_, i)) = ready.pop_first() {
        order.push(i);
        for neighbor in graph.neighbors_directed(indices[i], Direction::Outgoing) {
            let j = graph[neighbor];
            indegree[j] = indegree[j].saturating_sub(1);
            if indegree[j] == 0 {
                ready.insert((actions[j].metadata().name.clone(), j));
            }
        }
    }

    if order.len() != actions.len() {
        let cycle = tarjan_scc(graph)
            .into_iter()
            .find(|scc| scc.len() > 1)
            .unwrap_or_default()
            .into_iter()
            .map(|n| actions[graph[n]].metadata().name.clone())
            .collect();
        return Err(Error::cycle_detected(cycle));
    }
    Ok(order)
}
