//! Graph construction.
//!
//! Callers describe nodes with [`NodeSpec`]: identity, ownership, an
//! optional desired payload and logical references (`field name` +
//! `target id`). Building resolves every logical reference to a concrete
//! self-link slot, injects the target's self-link into empty slots,
//! derives edges from the schema's reference fields, and validates the
//! graph invariants: unique ids, resolvable targets, slots holding exactly
//! their target's self-link.

use std::collections::BTreeMap;

use serde_json::Value;

use converge_resource::{ApiVersion, Frozen, Path, ResourceId};

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::node::{Node, Ownership, ResourceRef};

/// A reference in logical form: a field of the source resource that should
/// hold the target's self-link.
#[derive(Debug, Clone)]
pub struct LogicalRef {
    /// Field name on the source payload, matched case-insensitively.
    pub field: String,
    /// Target identity.
    pub to: ResourceId,
}

/// Everything the builder needs to know about one node.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    id: ResourceId,
    ownership: Ownership,
    desired: Option<Frozen>,
    refs: Vec<LogicalRef>,
}

impl NodeSpec {
    /// A node the engine owns.
    #[must_use]
    pub fn managed(id: ResourceId) -> Self {
        Self {
            id,
            ownership: Ownership::Managed,
            desired: None,
            refs: Vec::new(),
        }
    }

    /// A node asserted to exist but never mutated.
    #[must_use]
    pub fn external(id: ResourceId) -> Self {
        Self {
            id,
            ownership: Ownership::External,
            desired: None,
            refs: Vec::new(),
        }
    }

    /// A node whose ownership is still undecided. Such nodes can be built
    /// into a graph but the planner refuses to plan them.
    #[must_use]
    pub fn unknown(id: ResourceId) -> Self {
        Self {
            id,
            ownership: Ownership::Unknown,
            desired: None,
            refs: Vec::new(),
        }
    }

    /// Attach the frozen desired payload. Omitting it on a managed node
    /// declares delete intent.
    #[must_use]
    pub fn with_desired(mut self, desired: Frozen) -> Self {
        self.desired = Some(desired);
        self
    }

    /// Declare a logical reference from `field` to `to`.
    #[must_use]
    pub fn with_ref(mut self, field: impl Into<String>, to: ResourceId) -> Self {
        self.refs.push(LogicalRef {
            field: field.into(),
            to,
        });
        self
    }
}

/// Assembles and validates a [`Graph`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    specs: Vec<NodeSpec>,
}

impl GraphBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node spec.
    #[must_use]
    pub fn node(mut self, spec: NodeSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Resolve references, validate invariants and freeze the graph.
    pub fn build(self) -> Result<Graph> {
        // duplicate-id check
        let mut versions: BTreeMap<ResourceId, ApiVersion> = BTreeMap::new();
        for spec in &self.specs {
            let version = spec
                .desired
                .as_ref()
                .map(|d| d.version())
                .unwrap_or_default();
            if versions.insert(spec.id.clone(), version).is_some() {
                return Err(Error::duplicate_id(spec.id.clone()));
            }
        }

        let mut nodes: BTreeMap<ResourceId, Node> = BTreeMap::new();
        for spec in self.specs {
            let NodeSpec {
                id,
                ownership,
                desired,
                refs,
            } = spec;

            let (desired, mut out_refs) = match desired {
                Some(desired) => {
                    let (resolved, edges) = resolve_logical_refs(&id, desired, &refs, &versions)?;
                    (Some(resolved), edges)
                }
                None if refs.is_empty() => (None, Vec::new()),
                None => {
                    let field = refs[0].field.clone();
                    return Err(Error::unresolved_ref(
                        id,
                        field,
                        "node has no desired payload to hold the reference",
                    ));
                }
            };

            if let Some(desired) = &desired {
                let derived = derive_refs(&id, desired, |to| {
                    if versions.contains_key(to) {
                        Ok(())
                    } else {
                        Err(Error::unresolved_ref(
                            id.clone(),
                            to.to_string(),
                            "reference target is not a node in the graph",
                        ))
                    }
                })?;
                for edge in derived {
                    if !out_refs.contains(&edge) {
                        out_refs.push(edge);
                    }
                }
            }

            nodes.insert(id.clone(), Node::new(id, ownership, desired, out_refs));
        }

        let graph = Graph::from_nodes(nodes);
        validate_edges(&graph)?;
        Ok(graph)
    }
}

/// Inject or verify the self-link slot for each logical reference, and
/// return the concrete edges alongside the patched payload.
fn resolve_logical_refs(
    id: &ResourceId,
    desired: Frozen,
    refs: &[LogicalRef],
    versions: &BTreeMap<ResourceId, ApiVersion>,
) -> Result<(Frozen, Vec<ResourceRef>)> {
    let mut current = desired;
    let mut edges = Vec::new();
    for logical in refs {
        let Some(target_version) = versions.get(&logical.to).copied() else {
            return Err(Error::unresolved_ref(
                id.clone(),
                logical.field.clone(),
                format!("target {} is not a node in the graph", logical.to),
            ));
        };
        let link = logical.to.self_link(target_version);

        let fields = match current.value() {
            Value::Object(fields) => fields,
            _ => {
                return Err(Error::unresolved_ref(
                    id.clone(),
                    logical.field.clone(),
                    "payload is not an object",
                ))
            }
        };
        // field names arrive in caller spelling; match the wire name
        // case-insensitively
        let Some(key) = fields
            .keys()
            .find(|k| k.eq_ignore_ascii_case(&logical.field))
            .cloned()
        else {
            return Err(Error::unresolved_ref(
                id.clone(),
                logical.field.clone(),
                "no such field on the payload",
            ));
        };

        let slot = fields.get(&key).cloned().unwrap_or(Value::Null);
        let (patched_value, path) = match slot {
            Value::Null => (Value::String(link.clone()), Path::root().field(key.clone())),
            Value::String(existing) if existing.is_empty() => {
                (Value::String(link.clone()), Path::root().field(key.clone()))
            }
            Value::String(existing) => {
                if existing != link {
                    return Err(Error::ref_path_mismatch(
                        id.clone(),
                        Path::root().field(key.clone()),
                        existing,
                        link,
                    ));
                }
                (Value::String(existing), Path::root().field(key.clone()))
            }
            Value::Array(mut items) => {
                let position = items
                    .iter()
                    .position(|v| matches!(v, Value::String(s) if *s == link))
                    .unwrap_or_else(|| {
                        items.push(Value::String(link.clone()));
                        items.len() - 1
                    });
                (Value::Array(items), Path::root().field(key.clone()).index(position))
            }
            other => {
                return Err(Error::unresolved_ref(
                    id.clone(),
                    logical.field.clone(),
                    format!("field holds {other}, not a self-link slot"),
                ))
            }
        };

        current = current.patched(|fields| {
            fields.insert(key.clone(), patched_value);
        })?;
        let edge = ResourceRef {
            from: id.clone(),
            path,
            to: logical.to.clone(),
        };
        if !edges.contains(&edge) {
            edges.push(edge);
        }
    }
    Ok((current, edges))
}

/// Derive concrete references from the payload's schema reference fields.
///
/// Every non-empty self-link found in a reference field becomes an edge;
/// `check_target` decides what to do with targets outside the graph (the
/// builder rejects them, the planner ignores observed strays).
pub(crate) fn derive_refs(
    id: &ResourceId,
    payload: &Frozen,
    check_target: impl Fn(&ResourceId) -> Result<()>,
) -> Result<Vec<ResourceRef>> {
    let mut out = Vec::new();
    for pattern in payload.metadata().refs {
        let fields: Vec<&str> = pattern.split('.').collect();
        let mut slots = Vec::new();
        collect_links(payload.value(), &fields, Path::root(), &mut slots);
        for (path, link) in slots {
            let (to, _version) = ResourceId::parse_self_link(&link).map_err(|err| {
                Error::unresolved_ref(id.clone(), path.to_string(), err.to_string())
            })?;
            check_target(&to)?;
            out.push(ResourceRef {
                from: id.clone(),
                path,
                to,
            });
        }
    }
    Ok(out)
}

/// Like [`derive_refs`] but silently skips targets outside the graph and
/// malformed links; observed payloads may reference anything.
pub(crate) fn derive_known_refs(
    id: &ResourceId,
    payload: &Frozen,
    known: impl Fn(&ResourceId) -> bool,
) -> Vec<ResourceRef> {
    let mut out = Vec::new();
    for pattern in payload.metadata().refs {
        let fields: Vec<&str> = pattern.split('.').collect();
        let mut slots = Vec::new();
        collect_links(payload.value(), &fields, Path::root(), &mut slots);
        for (path, link) in slots {
            if let Ok((to, _)) = ResourceId::parse_self_link(&link) {
                if known(&to) {
                    out.push(ResourceRef {
                        from: id.clone(),
                        path,
                        to,
                    });
                }
            }
        }
    }
    out
}

/// Collect `(path, link)` pairs for every non-empty string reachable by the
/// dotted field pattern. Arrays are transparent.
fn collect_links(value: &Value, pattern: &[&str], at: Path, out: &mut Vec<(Path, String)>) {
    match value {
        Value::Array(items) => {
            for (i, inner) in items.iter().enumerate() {
                collect_links(inner, pattern, at.clone().index(i), out);
            }
        }
        Value::Object(fields) => {
            if let Some((first, rest)) = pattern.split_first() {
                if let Some(inner) = fields.get(*first) {
                    collect_links(inner, rest, at.clone().field(*first), out);
                }
            }
        }
        Value::String(link) if pattern.is_empty() && !link.is_empty() => {
            out.push((at, link.clone()));
        }
        _ => {}
    }
}

/// Verify that every edge's slot holds exactly its target's identity.
fn validate_edges(graph: &Graph) -> Result<()> {
    for edge in graph.edges() {
        let Some(source) = graph.get(&edge.from) else {
            continue;
        };
        let Some(payload) = source.desired() else {
            continue;
        };
        let held = read_path(payload.value(), &edge.path);
        let matches_target = match held {
            Some(Value::String(link)) => ResourceId::parse_self_link(link)
                .map(|(id, _)| id == edge.to)
                .unwrap_or(false),
            _ => false,
        };
        if !matches_target {
            return Err(Error::ref_path_mismatch(
                edge.from.clone(),
                &edge.path,
                held.map(|v| v.to_string()).unwrap_or_default(),
                edge.to.self_link(ApiVersion::Ga),
            ));
        }
    }
    Ok(())
}

fn read_path<'a>(value: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = value;
    for elem in path.elements() {
        current = match elem {
            converge_resource::PathElem::Field(name) => current.get(name)?,
            converge_resource::PathElem::Index(i) => current.get(i)?,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use converge_cloud::{BackendService, HealthCheck};
    use converge_resource::MutableResource;

    use super::*;

    fn hc_id(name: &str) -> ResourceId {
        ResourceId::global("proj", "healthChecks", name)
    }

    fn bs_id(name: &str) -> ResourceId {
        ResourceId::global("proj", "backendServices", name)
    }

    fn frozen_hc(name: &str) -> Frozen {
        MutableResource::<HealthCheck>::new(hc_id(name))
            .and_then(|mut res| {
                res.access(|hc| {
                    hc.check_type = "HTTP".to_string();
                    hc.check_interval_sec = 10;
                })?;
                res.freeze()
            })
            .expect("health check fixture")
    }

    fn frozen_bs(name: &str, mutate: impl FnOnce(&mut BackendService)) -> Frozen {
        MutableResource::<BackendService>::new(bs_id(name))
            .and_then(|mut res| {
                res.access(mutate)?;
                res.freeze()
            })
            .expect("backend service fixture")
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let result = GraphBuilder::new()
            .node(NodeSpec::managed(hc_id("hc1")).with_desired(frozen_hc("hc1")))
            .node(NodeSpec::managed(hc_id("hc1")).with_desired(frozen_hc("hc1")))
            .build();
        assert!(matches!(result, Err(Error::DuplicateId { .. })));
    }

    #[test]
    fn test_logical_ref_injects_self_link() {
        let graph = GraphBuilder::new()
            .node(NodeSpec::managed(hc_id("hc1")).with_desired(frozen_hc("hc1")))
            .node(
                NodeSpec::managed(bs_id("bs1"))
                    .with_desired(frozen_bs("bs1", |bs| {
                        bs.load_balancing_scheme = "INTERNAL_SELF_MANAGED".to_string();
                        bs.protocol = "TCP".to_string();
                    }))
                    // caller spelling differs from the wire name
                    .with_ref("Healthchecks", hc_id("hc1")),
            )
            .build()
            .expect("graph builds");

        let bs = graph.get(&bs_id("bs1")).expect("bs node");
        assert_eq!(bs.out_refs().len(), 1);
        assert_eq!(bs.out_refs()[0].to, hc_id("hc1"));

        let desired = bs.desired().expect("desired payload");
        assert_eq!(
            desired.value()["healthChecks"][0],
            Value::String(hc_id("hc1").self_link(ApiVersion::Ga))
        );
    }

    #[test]
    fn test_prefilled_matching_slot_is_accepted() {
        let link = hc_id("hc1").self_link(ApiVersion::Ga);
        let graph = GraphBuilder::new()
            .node(NodeSpec::managed(hc_id("hc1")).with_desired(frozen_hc("hc1")))
            .node(
                NodeSpec::managed(bs_id("bs1"))
                    .with_desired(frozen_bs("bs1", |bs| {
                        bs.health_checks = vec![link.clone()];
                    }))
                    .with_ref("healthChecks", hc_id("hc1")),
            )
            .build()
            .expect("graph builds");

        let bs = graph.get(&bs_id("bs1")).expect("bs node");
        let desired = bs.desired().expect("desired payload");
        // not duplicated
        assert_eq!(
            desired.value()["healthChecks"],
            serde_json::json!([link])
        );
    }

    #[test]
    fn test_unknown_field_is_unresolved() {
        let result = GraphBuilder::new()
            .node(NodeSpec::managed(hc_id("hc1")).with_desired(frozen_hc("hc1")))
            .node(
                NodeSpec::managed(bs_id("bs1"))
                    .with_desired(frozen_bs("bs1", |_| {}))
                    .with_ref("noSuchField", hc_id("hc1")),
            )
            .build();
        assert!(matches!(result, Err(Error::UnresolvedRef { .. })));
    }

    #[test]
    fn test_ref_to_missing_node_is_unresolved() {
        let result = GraphBuilder::new()
            .node(
                NodeSpec::managed(bs_id("bs1"))
                    .with_desired(frozen_bs("bs1", |_| {}))
                    .with_ref("healthChecks", hc_id("not-in-graph")),
            )
            .build();
        assert!(matches!(result, Err(Error::UnresolvedRef { .. })));
    }

    #[test]
    fn test_payload_link_to_missing_node_is_unresolved() {
        // no logical ref at all: the payload itself names a health check
        // that is not part of the graph
        let stray = hc_id("stray").self_link(ApiVersion::Ga);
        let result = GraphBuilder::new()
            .node(
                NodeSpec::managed(bs_id("bs1"))
                    .with_desired(frozen_bs("bs1", |bs| bs.health_checks = vec![stray])),
            )
            .build();
        assert!(matches!(result, Err(Error::UnresolvedRef { .. })));
    }

    #[test]
    fn test_mismatched_string_slot_is_rejected() {
        let hc1 = hc_id("hc1");
        let other = hc_id("other").self_link(ApiVersion::Ga);
        let result = GraphBuilder::new()
            .node(NodeSpec::managed(hc1.clone()).with_desired(frozen_hc("hc1")))
            .node(NodeSpec::managed(hc_id("other")).with_desired(frozen_hc("other")))
            .node(
                NodeSpec::managed(bs_id("bs1"))
                    .with_desired(frozen_bs("bs1", |bs| bs.network = other))
                    .with_ref("network", hc1),
            )
            .build();
        assert!(matches!(result, Err(Error::RefPathMismatch { .. })));
    }

    #[test]
    fn test_builds_are_deterministic() {
        let build = || {
            GraphBuilder::new()
                .node(
                    NodeSpec::managed(bs_id("bs1"))
                        .with_desired(frozen_bs("bs1", |_| {}))
                        .with_ref("healthChecks", hc_id("hc1")),
                )
                .node(NodeSpec::managed(hc_id("hc1")).with_desired(frozen_hc("hc1")))
                .build()
        };
        let (first, second) = (build(), build());
        match (first, second) {
            (Ok(a), Ok(b)) => {
                assert_eq!(a.ids(), b.ids());
                assert_eq!(a.edges(), b.edges());
                let desired_eq = a
                    .nodes()
                    .zip(b.nodes())
                    .all(|(x, y)| x.desired() == y.desired());
                assert!(desired_eq);
            }
            other => panic!("builds failed: {other:?}"),
        }
    }

    #[test]
    fn test_delete_intent_node_without_payload() {
        let graph = GraphBuilder::new()
            .node(NodeSpec::managed(hc_id("hc1")))
            .build()
            .expect("graph builds");
        let node = graph.get(&hc_id("hc1")).expect("node");
        assert!(node.desired().is_none());
        assert!(node.out_refs().is_empty());
    }
}
