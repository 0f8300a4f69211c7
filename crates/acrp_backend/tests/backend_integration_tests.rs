//! Integration tests: plan a request, apply it against the mock backend,
//! check outputs, destroy.

use std::sync::Arc;

use acrp_backend::{
    unique_id, BackendError, MockBackend, ProvisioningBackend, ProvisioningSession, RetryPolicy, RetryingBackend,
};
use acrp_core::{NetworkBinding, ProvisioningPlan, ProvisioningRequest, RegistryConfig, RegistryValidator, Team};

const SUBNET_ID: &str = "/subscriptions/test-sub/resourceGroups/test-vnet-rg/providers/Microsoft.Network/virtualNetworks/test-vnet/subnets/test-subnet";

fn sandbox_plan(unique: &str) -> ProvisioningPlan {
    let registry = format!("testacr{}", unique);
    ProvisioningRequest::new(
        RegistryConfig::new(&registry, format!("test-rg-{}", unique), "East US").with_environment("sandbox"),
    )
    .with_team(Team::new(
        "integration-team",
        "11111111-1111-1111-1111-111111111111",
        ["sandbox"],
    ))
    .with_domain_name("brightcloud.test")
    .plan(&RegistryValidator::default())
    .unwrap()
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::default().with_backoff(1)
}

#[tokio::test]
async fn test_round_trip_leaves_backend_clean() {
    let mock = MockBackend::new();
    let session = ProvisioningSession::new(Arc::new(mock.clone()));
    let plan = sandbox_plan(&unique_id());
    let registry = plan.registry.name.clone();
    assert_eq!(registry, registry.to_lowercase());

    let scope_maps = session
        .round_trip(&plan.desired_state, |outcome| async move {
            assert!(outcome.output("login_server").unwrap_or_default().contains(&registry));
            outcome.output_list("scope_map_names")
        })
        .await
        .unwrap();

    assert_eq!(scope_maps, plan.scope_map_names());
    assert!(mock.is_clean());
    assert!(mock.was_called("destroy"));
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let mock = MockBackend::new()
        .fail_next_apply(true, "StatusCode=429 TooManyRequests", false)
        .fail_next_apply(true, "StatusCode=503 ServiceUnavailable", false);
    let backend = RetryingBackend::new(mock.clone(), fast_retry());
    let plan = sandbox_plan(&unique_id());

    let outcome = backend.apply(&plan.desired_state).await.unwrap();
    assert_eq!(outcome.output("registry_name"), Some(plan.registry.name.as_str()));
    assert_eq!(mock.call_count(), 3);

    backend.destroy(&plan.desired_state.handle).await.unwrap();
    assert!(mock.is_clean());
}

#[tokio::test]
async fn test_permanent_failure_is_not_retried_and_cleaned_up() {
    let mock = MockBackend::new().fail_next_apply(false, "InvalidSKU", true);
    let session = ProvisioningSession::new(Arc::new(RetryingBackend::new(mock.clone(), fast_retry())));
    let plan = sandbox_plan(&unique_id());

    let err = session.apply(&plan.desired_state).await.unwrap_err();
    assert!(matches!(err, BackendError::Permanent(_)));

    let methods: Vec<_> = mock.get_calls().into_iter().map(|c| c.method).collect();
    assert_eq!(methods, vec!["apply", "destroy"]);
    assert!(mock.is_clean());
}

#[tokio::test]
async fn test_private_endpoint_outputs() {
    let unique = unique_id();
    let registry = format!("testacr{}", unique);
    let plan = ProvisioningRequest::new(RegistryConfig::new(&registry, "test-rg", "East US"))
        .with_network(NetworkBinding::new(SUBNET_ID))
        .plan(&RegistryValidator::default())
        .unwrap();

    let mock = MockBackend::new();
    let outcome = mock.apply(&plan.desired_state).await.unwrap();

    let endpoint = outcome.output("private_endpoint_name").unwrap();
    assert!(endpoint.contains(&registry));
    assert!(outcome.output("private_endpoint_id").is_some());

    mock.destroy(&plan.desired_state.handle).await.unwrap();
    assert!(mock.is_clean());
}

#[tokio::test]
async fn test_parallel_requests_are_isolated() {
    let mock = MockBackend::new();
    let session = ProvisioningSession::new(Arc::new(mock.clone()));

    let first = sandbox_plan(&unique_id());
    let second = sandbox_plan(&unique_id());
    assert_ne!(first.desired_state.handle, second.desired_state.handle);

    let (a, b) = tokio::join!(
        session.apply(&first.desired_state),
        session.apply(&second.desired_state)
    );
    a.unwrap();
    b.unwrap();

    session.destroy(&first.desired_state.handle).await.unwrap();
    assert!(mock.live_resources(&first.desired_state.handle).is_empty());
    assert_eq!(mock.live_resources(&second.desired_state.handle).len(), 3);

    session.destroy(&second.desired_state.handle).await.unwrap();
    assert!(mock.is_clean());
}
