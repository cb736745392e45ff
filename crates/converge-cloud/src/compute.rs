//! Compute resource payloads.
//!
//! Typed schemas for the resource collections the engine manages, with the
//! field semantics the planner needs: server-assigned fields, explicit-zero
//! fields, immutable (recreate-forcing) fields and cross-resource
//! reference slots. Serde names match the wire format.

use serde::{Deserialize, Serialize};

use converge_resource::{ApiVersion, Schema, SchemaMetadata};

/// Collection name for health checks.
pub const HEALTH_CHECKS: &str = "healthChecks";
/// Collection name for backend services.
pub const BACKEND_SERVICES: &str = "backendServices";
/// Collection name for network endpoint groups.
pub const NETWORK_ENDPOINT_GROUPS: &str = "networkEndpointGroups";

/// A health check resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HealthCheck {
    pub name: String,
    pub description: String,
    /// Probe protocol, e.g. `"HTTP"` or `"TCP"`. Changing it requires a
    /// recreate.
    #[serde(rename = "type")]
    pub check_type: String,
    pub check_interval_sec: i64,
    pub timeout_sec: i64,
    pub healthy_threshold: i64,
    pub unhealthy_threshold: i64,
    pub http_health_check: Option<HttpHealthCheck>,
    pub tcp_health_check: Option<TcpHealthCheck>,
    /// Per-probe logging; only surfaced on the beta channel and above.
    pub log_config: Option<HealthCheckLogConfig>,
    pub self_link: String,
    pub creation_timestamp: String,
}

/// HTTP probe parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpHealthCheck {
    pub port: i64,
    pub port_name: String,
    pub request_path: String,
    pub host: String,
    pub proxy_header: String,
}

/// TCP probe parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TcpHealthCheck {
    pub port: i64,
    pub port_name: String,
    pub request: String,
    pub response: String,
    pub proxy_header: String,
}

/// Probe logging toggle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HealthCheckLogConfig {
    pub enable: bool,
}

static HEALTH_CHECK_METADATA: SchemaMetadata = SchemaMetadata {
    collection: HEALTH_CHECKS,
    output_only: &["selfLink", "creationTimestamp"],
    allow_zero: &["logConfig.enable"],
    immutable: &["type"],
    min_versions: &[("logConfig", ApiVersion::Beta)],
    refs: &[],
};

impl Schema for HealthCheck {
    fn metadata() -> &'static SchemaMetadata {
        &HEALTH_CHECK_METADATA
    }
}

/// A backend service resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackendService {
    pub name: String,
    pub description: String,
    /// Self-links of the health checks guarding this service.
    pub health_checks: Vec<String>,
    pub backends: Vec<Backend>,
    /// Traffic scheme, e.g. `"INTERNAL_SELF_MANAGED"`. Immutable.
    pub load_balancing_scheme: String,
    /// Backend protocol, e.g. `"TCP"`. Immutable.
    pub protocol: String,
    /// Network the service is attached to. Immutable.
    pub network: String,
    pub port: i64,
    pub port_name: String,
    pub timeout_sec: i64,
    pub session_affinity: String,
    /// TLS client policy; only surfaced on the beta channel and above.
    pub security_settings: Option<SecuritySettings>,
    pub fingerprint: String,
    pub self_link: String,
    pub creation_timestamp: String,
}

/// One backend group attached to a backend service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Backend {
    /// Self-link of the instance group or network endpoint group.
    pub group: String,
    pub description: String,
    pub balancing_mode: String,
    /// Fraction of capacity to use; an explicit zero drains the backend.
    pub capacity_scaler: f64,
    pub max_utilization: f64,
    pub max_connections: i64,
    pub max_rate_per_endpoint: f64,
}

/// Client TLS settings, beta surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SecuritySettings {
    pub client_tls_policy: String,
    pub subject_alt_names: Vec<String>,
}

static BACKEND_SERVICE_METADATA: SchemaMetadata = SchemaMetadata {
    collection: BACKEND_SERVICES,
    output_only: &["selfLink", "creationTimestamp", "fingerprint"],
    allow_zero: &["backends.capacityScaler"],
    immutable: &["loadBalancingScheme", "protocol", "network"],
    min_versions: &[("securitySettings", ApiVersion::Beta)],
    refs: &["healthChecks", "backends.group"],
};

impl Schema for BackendService {
    fn metadata() -> &'static SchemaMetadata {
        &BACKEND_SERVICE_METADATA
    }
}

/// A network endpoint group resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkEndpointGroup {
    pub name: String,
    pub description: String,
    /// Endpoint kind, e.g. `"GCE_VM_IP_PORT"`. Immutable.
    pub network_endpoint_type: String,
    /// Attached network. Immutable.
    pub network: String,
    /// Attached subnetwork. Immutable.
    pub subnetwork: String,
    pub default_port: i64,
    /// Endpoint count, maintained by the server.
    pub size: i64,
    pub self_link: String,
    pub creation_timestamp: String,
}

static NETWORK_ENDPOINT_GROUP_METADATA: SchemaMetadata = SchemaMetadata {
    collection: NETWORK_ENDPOINT_GROUPS,
    output_only: &["selfLink", "creationTimestamp", "size"],
    allow_zero: &[],
    immutable: &["networkEndpointType", "network", "subnetwork"],
    min_versions: &[],
    refs: &[],
};

impl Schema for NetworkEndpointGroup {
    fn metadata() -> &'static SchemaMetadata {
        &NETWORK_ENDPOINT_GROUP_METADATA
    }
}

/// Schema metadata for a collection name, if the collection is known.
#[must_use]
pub fn metadata_for(collection: &str) -> Option<&'static SchemaMetadata> {
    match collection {
        HEALTH_CHECKS => Some(&HEALTH_CHECK_METADATA),
        BACKEND_SERVICES => Some(&BACKEND_SERVICE_METADATA),
        NETWORK_ENDPOINT_GROUPS => Some(&NETWORK_ENDPOINT_GROUP_METADATA),
        _ => None,
    }
}
