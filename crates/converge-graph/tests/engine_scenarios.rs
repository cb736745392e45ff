//! End-to-end scenarios: build a graph, plan it against the fake cloud,
//! execute the lowered actions, and check the resulting cloud state.

use std::sync::Arc;

use converge_cloud::{
    compute, BackendService, CallContext, Cloud, CloudError, FakeTransport, HealthCheck,
    HttpHealthCheck,
};
use converge_exec::{ActionKind, Event, ExecutorConfig, SerialExecutor};
use converge_graph::{plan, Graph, GraphBuilder, NodeSpec, Operation};
use converge_resource::{ApiVersion, Frozen, MutableResource, ResourceId};

fn hc_id(name: &str) -> ResourceId {
    ResourceId::global("proj", compute::HEALTH_CHECKS, name)
}

fn bs_id(name: &str) -> ResourceId {
    ResourceId::global("proj", compute::BACKEND_SERVICES, name)
}

fn frozen_hc(name: &str, mutate: impl FnOnce(&mut HealthCheck)) -> Frozen {
    MutableResource::<HealthCheck>::new(hc_id(name))
        .and_then(|mut res| {
            res.access(mutate)?;
            res.freeze()
        })
        .expect("health check fixture")
}

fn default_hc(name: &str) -> Frozen {
    frozen_hc(name, |hc| {
        hc.check_type = "HTTP".to_string();
        hc.check_interval_sec = 10;
        hc.http_health_check = Some(HttpHealthCheck {
            port: 80,
            port_name: "http".to_string(),
            ..HttpHealthCheck::default()
        });
    })
}

fn frozen_bs(name: &str, mutate: impl FnOnce(&mut BackendService)) -> Frozen {
    MutableResource::<BackendService>::new(bs_id(name))
        .and_then(|mut res| {
            res.access(mutate)?;
            res.freeze()
        })
        .expect("backend service fixture")
}

fn default_bs(name: &str) -> Frozen {
    frozen_bs(name, |bs| {
        bs.load_balancing_scheme = "INTERNAL_SELF_MANAGED".to_string();
        bs.protocol = "TCP".to_string();
    })
}

fn hc_graph(desired: Frozen) -> Graph {
    GraphBuilder::new()
        .node(NodeSpec::managed(desired.id().clone()).with_desired(desired))
        .build()
        .expect("graph builds")
}

fn bs_graph(hc: Frozen, bs: Frozen) -> Graph {
    GraphBuilder::new()
        .node(NodeSpec::managed(hc.id().clone()).with_desired(hc.clone()))
        .node(
            NodeSpec::managed(bs.id().clone())
                .with_desired(bs)
                .with_ref("Healthchecks", hc.id().clone()),
        )
        .build()
        .expect("graph builds")
}

async fn plan_and_run(cloud: &Cloud, graph: &mut Graph) -> converge_exec::ExecutionResult {
    let ctx = CallContext::new();
    let result = plan(&ctx, cloud, graph).await.expect("planning succeeds");
    let executor = SerialExecutor::new(result.actions, ExecutorConfig::default())
        .expect("valid action dag");
    executor.run(&ctx, cloud).await
}

fn operation_of(graph: &Graph, id: &ResourceId) -> Operation {
    graph
        .get(id)
        .and_then(|n| n.plan())
        .map(|p| p.operation)
        .expect("plan recorded")
}

#[tokio::test]
async fn test_health_check_create_then_noop() {
    let transport = Arc::new(FakeTransport::new());
    let cloud = Cloud::unlimited(transport.clone());

    // first pass: absent observed, one create
    let mut graph = hc_graph(default_hc("hc1"));
    let result = plan_and_run(&cloud, &mut graph).await;
    assert!(result.is_success(), "unexpected result: {result:?}");
    assert_eq!(operation_of(&graph, &hc_id("hc1")), Operation::Create);
    assert!(transport.resource(&hc_id("hc1")).is_some());
    assert_eq!(transport.mutation_count(), 1);

    // second pass: same desired against now-present observed
    let mut graph = hc_graph(default_hc("hc1"));
    let result = plan_and_run(&cloud, &mut graph).await;
    assert!(result.is_success());
    assert_eq!(operation_of(&graph, &hc_id("hc1")), Operation::Nothing);
    // exists event only, zero further mutations
    assert_eq!(transport.mutation_count(), 1);
}

#[tokio::test]
async fn test_health_check_in_place_update() {
    let transport = Arc::new(FakeTransport::new());
    let cloud = Cloud::unlimited(transport.clone());

    let mut graph = hc_graph(default_hc("hc1"));
    plan_and_run(&cloud, &mut graph).await;

    // change the probe port and interval
    let updated = frozen_hc("hc1", |hc| {
        hc.check_type = "HTTP".to_string();
        hc.check_interval_sec = 60;
        hc.http_health_check = Some(HttpHealthCheck {
            port: 123,
            port_name: "http".to_string(),
            ..HttpHealthCheck::default()
        });
    });
    let mut graph = hc_graph(updated.clone());
    let result = plan_and_run(&cloud, &mut graph).await;
    assert!(result.is_success(), "unexpected result: {result:?}");
    assert_eq!(operation_of(&graph, &hc_id("hc1")), Operation::Update);
    assert_eq!(transport.calls_of("update").len(), 1);

    // observed now equals desired on non-server-assigned fields
    let observed = transport.resource(&hc_id("hc1")).expect("stored");
    let delta = converge_resource::diff(&observed, &updated).expect("diff");
    assert!(delta.is_empty(), "unexpected delta: {:?}", delta.items);
}

#[tokio::test]
async fn test_backend_service_waits_for_health_check() {
    let transport = Arc::new(FakeTransport::new());
    let cloud = Cloud::unlimited(transport.clone());

    let ctx = CallContext::new();
    let mut graph = bs_graph(default_hc("hc1"), default_bs("bs1"));
    let result = plan(&ctx, &cloud, &mut graph).await.expect("planning");

    assert_eq!(operation_of(&graph, &hc_id("hc1")), Operation::Create);
    assert_eq!(operation_of(&graph, &bs_id("bs1")), Operation::Create);

    // the backend service create awaits the health check's existence
    let bs_create = result
        .actions
        .iter()
        .find(|a| a.metadata().subject == bs_id("bs1"))
        .expect("bs action");
    assert_eq!(bs_create.metadata().kind, ActionKind::Create);
    assert!(bs_create.wants().contains(&Event::Exists(hc_id("hc1"))));

    let executor =
        SerialExecutor::new(result.actions, ExecutorConfig::default()).expect("valid dag");
    let run = executor.run(&ctx, &cloud).await;
    assert!(run.is_success(), "unexpected result: {run:?}");

    // the stored backend service points at the health check's self-link
    let stored = transport.resource(&bs_id("bs1")).expect("bs stored");
    assert_eq!(
        stored.value()["healthChecks"][0],
        serde_json::json!(hc_id("hc1").self_link(ApiVersion::Ga))
    );
}

#[tokio::test]
async fn test_scheme_change_forces_recreate() {
    let transport = Arc::new(FakeTransport::new());
    let cloud = Cloud::unlimited(transport.clone());

    // existing internal backend service
    let mut graph = hc_graph_bs_only(default_bs("bs1"));
    plan_and_run(&cloud, &mut graph).await;

    // desired scheme flips to external
    let desired = frozen_bs("bs1", |bs| {
        bs.load_balancing_scheme = "EXTERNAL".to_string();
        bs.protocol = "TCP".to_string();
    });
    let ctx = CallContext::new();
    let mut graph = hc_graph_bs_only(desired);
    let result = plan(&ctx, &cloud, &mut graph).await.expect("planning");

    assert_eq!(operation_of(&graph, &bs_id("bs1")), Operation::Recreate);
    let why = graph
        .get(&bs_id("bs1"))
        .and_then(|n| n.plan())
        .map(|p| p.why.clone())
        .unwrap_or_default();
    assert!(why.contains("loadBalancingScheme"), "why: {why}");

    // lowered to delete then create, the create awaiting the delete
    let kinds: Vec<ActionKind> = result.actions.iter().map(|a| a.metadata().kind).collect();
    assert_eq!(kinds, vec![ActionKind::Delete, ActionKind::Create]);
    assert!(result.actions[1]
        .wants()
        .contains(&Event::DoesNotExist(bs_id("bs1"))));

    let executor =
        SerialExecutor::new(result.actions, ExecutorConfig::default()).expect("valid dag");
    let run = executor.run(&ctx, &cloud).await;
    assert!(run.is_success(), "unexpected result: {run:?}");

    let stored = transport.resource(&bs_id("bs1")).expect("bs stored");
    assert_eq!(stored.value()["loadBalancingScheme"], "EXTERNAL");
}

fn hc_graph_bs_only(bs: Frozen) -> Graph {
    GraphBuilder::new()
        .node(NodeSpec::managed(bs.id().clone()).with_desired(bs))
        .build()
        .expect("graph builds")
}

#[tokio::test]
async fn test_update_of_referenced_health_check_leaves_service_alone() {
    // supplement from the original end-to-end suite: update the health
    // check while a backend service keeps referencing it
    let transport = Arc::new(FakeTransport::new());
    let cloud = Cloud::unlimited(transport.clone());

    let mut graph = bs_graph(default_hc("hc1"), default_bs("bs1"));
    plan_and_run(&cloud, &mut graph).await;
    let mutations_after_setup = transport.mutation_count();

    let updated_hc = frozen_hc("hc1", |hc| {
        hc.check_type = "HTTP".to_string();
        hc.check_interval_sec = 60;
        hc.http_health_check = Some(HttpHealthCheck {
            port: 123,
            port_name: "http".to_string(),
            ..HttpHealthCheck::default()
        });
    });
    let mut graph = bs_graph(updated_hc, default_bs("bs1"));
    let result = plan_and_run(&cloud, &mut graph).await;
    assert!(result.is_success(), "unexpected result: {result:?}");

    assert_eq!(operation_of(&graph, &hc_id("hc1")), Operation::Update);
    assert_eq!(operation_of(&graph, &bs_id("bs1")), Operation::Nothing);
    // exactly one further mutation: the health check update
    assert_eq!(transport.mutation_count(), mutations_after_setup + 1);
}

#[tokio::test]
async fn test_recreate_promotes_referencing_node_to_update() {
    let transport = Arc::new(FakeTransport::new());
    let cloud = Cloud::unlimited(transport.clone());

    let mut graph = bs_graph(default_hc("hc1"), default_bs("bs1"));
    plan_and_run(&cloud, &mut graph).await;

    // flip the health check's immutable probe type
    let recreated_hc = frozen_hc("hc1", |hc| {
        hc.check_type = "TCP".to_string();
        hc.check_interval_sec = 10;
    });
    let ctx = CallContext::new();
    let mut graph = bs_graph(recreated_hc, default_bs("bs1"));
    let result = plan(&ctx, &cloud, &mut graph).await.expect("planning");

    assert_eq!(operation_of(&graph, &hc_id("hc1")), Operation::Recreate);
    // the backend service had no diff of its own but refreshes its target
    assert_eq!(operation_of(&graph, &bs_id("bs1")), Operation::Update);

    let executor =
        SerialExecutor::new(result.actions, ExecutorConfig::default()).expect("valid dag");
    let run = executor.run(&ctx, &cloud).await;
    assert!(run.is_success(), "unexpected result: {run:?}");
}

#[tokio::test]
async fn test_delete_orders_after_referrer_teardown() {
    let transport = Arc::new(FakeTransport::new());
    let cloud = Cloud::unlimited(transport.clone());

    // both resources exist, both are delete intent
    let mut graph = bs_graph(default_hc("hc1"), default_bs("bs1"));
    plan_and_run(&cloud, &mut graph).await;

    let ctx = CallContext::new();
    let mut graph = GraphBuilder::new()
        .node(NodeSpec::managed(hc_id("hc1")))
        .node(NodeSpec::managed(bs_id("bs1")))
        .build()
        .expect("graph builds");
    let result = plan(&ctx, &cloud, &mut graph).await.expect("planning");

    assert_eq!(operation_of(&graph, &hc_id("hc1")), Operation::Delete);
    assert_eq!(operation_of(&graph, &bs_id("bs1")), Operation::Delete);

    let executor =
        SerialExecutor::new(result.actions, ExecutorConfig::default()).expect("valid dag");
    let run = executor.run(&ctx, &cloud).await;
    assert!(run.is_success(), "unexpected result: {run:?}");

    // the referencing service is torn down before its health check
    let deletes = transport.calls_of("delete");
    assert_eq!(deletes.len(), 2);
    assert_eq!(deletes[0].id, bs_id("bs1"));
    assert_eq!(deletes[1].id, hc_id("hc1"));
}

#[tokio::test]
async fn test_dangling_reference_fails_planning() {
    let transport = Arc::new(FakeTransport::new());
    let cloud = Cloud::unlimited(transport.clone());

    let mut graph = bs_graph(default_hc("hc1"), default_bs("bs1"));
    plan_and_run(&cloud, &mut graph).await;

    // delete the health check while the service still references it
    let ctx = CallContext::new();
    let mut graph = GraphBuilder::new()
        .node(NodeSpec::managed(hc_id("hc1")))
        .node(
            NodeSpec::managed(bs_id("bs1"))
                .with_desired(default_bs("bs1"))
                .with_ref("healthChecks", hc_id("hc1")),
        )
        .build()
        .expect("graph builds");

    let result = plan(&ctx, &cloud, &mut graph).await;
    assert!(matches!(
        result,
        Err(converge_graph::Error::DanglingRef { .. })
    ));
    // atomic: nothing was planned
    assert!(graph.nodes().all(|n| n.plan().is_none()));
}

#[tokio::test]
async fn test_missing_external_fails_planning() {
    let transport = Arc::new(FakeTransport::new());
    let cloud = Cloud::unlimited(transport);

    let ctx = CallContext::new();
    let mut graph = GraphBuilder::new()
        .node(NodeSpec::external(hc_id("shared-hc")).with_desired(default_hc("shared-hc")))
        .build()
        .expect("graph builds");

    let result = plan(&ctx, &cloud, &mut graph).await;
    assert!(matches!(
        result,
        Err(converge_graph::Error::MissingExternal { .. })
    ));
}

#[tokio::test]
async fn test_external_node_is_attached_not_mutated() {
    let transport = Arc::new(FakeTransport::new());
    let cloud = Cloud::unlimited(transport.clone());

    // the external health check exists with a different interval than the
    // graph carries; it must still never be touched
    transport.seed(default_hc("shared-hc"));

    let desired_hc = frozen_hc("shared-hc", |hc| {
        hc.check_type = "HTTP".to_string();
        hc.check_interval_sec = 99;
    });
    let mut graph = GraphBuilder::new()
        .node(NodeSpec::external(hc_id("shared-hc")).with_desired(desired_hc))
        .node(
            NodeSpec::managed(bs_id("bs1"))
                .with_desired(default_bs("bs1"))
                .with_ref("healthChecks", hc_id("shared-hc")),
        )
        .build()
        .expect("graph builds");

    let result = plan_and_run(&cloud, &mut graph).await;
    assert!(result.is_success(), "unexpected result: {result:?}");
    assert_eq!(operation_of(&graph, &hc_id("shared-hc")), Operation::Nothing);
    assert_eq!(operation_of(&graph, &bs_id("bs1")), Operation::Create);

    // only the backend service was written
    let mutated: Vec<_> = transport
        .calls()
        .into_iter()
        .filter(|c| c.operation != "get")
        .collect();
    assert!(mutated.iter().all(|c| c.id == bs_id("bs1")));
}

#[tokio::test]
async fn test_unknown_ownership_is_refused() {
    let transport = Arc::new(FakeTransport::new());
    let cloud = Cloud::unlimited(transport);

    let mut graph = GraphBuilder::new()
        .node(NodeSpec::managed(hc_id("hc1")).with_desired(default_hc("hc1")))
        .build()
        .expect("graph builds");

    let ctx = CallContext::new();
    let ok = plan(&ctx, &cloud, &mut graph).await;
    assert!(ok.is_ok());

    let mut unknown = GraphBuilder::new()
        .node(NodeSpec::unknown(hc_id("hc2")).with_desired(default_hc("hc2")))
        .build()
        .expect("graph builds");
    let result = plan(&ctx, &cloud, &mut unknown).await;
    assert!(matches!(
        result,
        Err(converge_graph::Error::UnknownOwnership { .. })
    ));
}

#[tokio::test]
async fn test_observation_failure_aborts_planning() {
    let transport = Arc::new(FakeTransport::new());
    let cloud = Cloud::unlimited(transport.clone());

    transport.fail_next("get", CloudError::server(500, "backend unavailable"));

    let ctx = CallContext::new();
    let mut graph = hc_graph(default_hc("hc1"));
    let result = plan(&ctx, &cloud, &mut graph).await;
    assert!(matches!(
        result,
        Err(converge_graph::Error::ObservationFailed { .. })
    ));
    assert!(graph.nodes().all(|n| n.plan().is_none()));
}

#[tokio::test]
async fn test_plan_rows_report_every_node() {
    let transport = Arc::new(FakeTransport::new());
    let cloud = Cloud::unlimited(transport);

    let ctx = CallContext::new();
    let mut graph = bs_graph(default_hc("hc1"), default_bs("bs1"));
    let result = plan(&ctx, &cloud, &mut graph).await.expect("planning");

    assert_eq!(result.rows.len(), 2);
    assert!(!result.is_converged());
    // identity order: backendServices sorts before healthChecks
    assert_eq!(result.rows[0].id, bs_id("bs1"));
    assert_eq!(result.rows[1].id, hc_id("hc1"));
}

#[tokio::test]
async fn test_rebuilt_graphs_are_structurally_equal() {
    let build = || bs_graph(default_hc("hc1"), default_bs("bs1"));
    let (a, b) = (build(), build());
    assert_eq!(a.ids(), b.ids());
    assert_eq!(a.edges(), b.edges());
    let payloads_equal = a
        .nodes()
        .zip(b.nodes())
        .all(|(x, y)| x.desired() == y.desired() && x.ownership() == y.ownership());
    assert!(payloads_equal);
}
