//! Shared fixtures for exec tests.

use converge_cloud::compute::metadata_for;
use converge_resource::{ApiVersion, Frozen, ResourceId};

/// A minimal frozen payload for any known collection.
pub fn frozen_fixture(id: &ResourceId) -> Frozen {
    let meta = metadata_for(&id.collection).expect("known collection");
    Frozen::of_observed(id.clone(), ApiVersion::Ga, serde_json::json!({}), meta)
        .expect("fixture payload")
}
