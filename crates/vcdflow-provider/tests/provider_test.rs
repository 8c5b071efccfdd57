mod common;

use common::{MockVcd, executor};
use std::sync::Arc;
use vcdflow_cloud::{ActionType, StateManager, VcdApi};
use vcdflow_provider::{
    NetworkAttachment, NetworkResource, ProviderState, ResourceSet, ResourceSpec, VAppResource,
    VcdProvider,
};

fn provider(mock: &Arc<MockVcd>) -> VcdProvider {
    let api: Arc<dyn VcdApi> = mock.clone();
    VcdProvider::new(api, executor())
}

fn standard_mock() -> Arc<MockVcd> {
    MockVcd::new()
        .with_edge_gateway("edge-01")
        .with_template("public", "ubuntu-22.04")
        .shared()
}

fn lan() -> NetworkResource {
    NetworkResource::new("lan", "edge-01", "10.10.0.1")
}

fn web() -> VAppResource {
    VAppResource {
        template_name: Some("ubuntu-22.04".to_string()),
        catalog_name: Some("public".to_string()),
        networks: vec![NetworkAttachment {
            orgnetwork: "lan".to_string(),
            ip: None,
            ip_allocation_mode: Some("allocated".to_string()),
            is_primary: true,
        }],
        ..VAppResource::new("web")
    }
}

fn desired(resources: Vec<ResourceSpec>) -> ResourceSet {
    ResourceSet::new(resources)
}

fn action_types(plan: &vcdflow_cloud::Plan) -> Vec<(String, ActionType)> {
    plan.actions
        .iter()
        .map(|a| (a.resource_key.clone(), a.action_type))
        .collect()
}

/// Apply `network:lan` and `vapp:web` onto an empty state
async fn applied(provider: &VcdProvider) -> (ResourceSet, ProviderState) {
    let desired = desired(vec![ResourceSpec::Network(lan()), ResourceSpec::Vapp(web())]);
    let mut state = ProviderState::new();
    let plan = provider.plan(&desired, &state);
    let result = provider.apply(&plan, &desired, &mut state).await;
    assert!(result.is_success(), "{:?}", result.failed);
    (desired, state)
}

#[tokio::test(start_paused = true)]
async fn test_plan_creates_everything_on_empty_state() {
    let mock = standard_mock();
    let provider = provider(&mock);
    let desired = desired(vec![ResourceSpec::Network(lan()), ResourceSpec::Vapp(web())]);

    let plan = provider.plan(&desired, &ProviderState::new());

    assert!(plan.has_changes);
    assert_eq!(
        action_types(&plan),
        [
            ("network:lan".to_string(), ActionType::Create),
            ("vapp:web".to_string(), ActionType::Create),
        ]
    );
    assert!(mock.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_apply_then_plan_is_unchanged() {
    let mock = standard_mock();
    let provider = provider(&mock);
    let (desired, state) = applied(&provider).await;

    assert_eq!(state.len(), 2);
    assert_eq!(
        state.get_resource("vapp:web").and_then(|r| r.id()),
        Some("web")
    );
    assert!(mock.has_network("lan"));

    let plan = provider.plan(&desired, &state);
    assert!(!plan.has_changes);
    assert_eq!(plan.summary().no_change, 2);
}

#[tokio::test(start_paused = true)]
async fn test_in_place_update() {
    let mock = standard_mock();
    let provider = provider(&mock);
    let (_, mut state) = applied(&provider).await;

    let changed = desired(vec![
        ResourceSpec::Network(lan()),
        ResourceSpec::Vapp(VAppResource {
            memory: Some(2048),
            ..web()
        }),
    ]);
    let plan = provider.plan(&changed, &state);

    let updates = plan.actions_by_type(ActionType::Update);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].resource_key, "vapp:web");
    assert_eq!(updates[0].changes, ["memory"]);

    let result = provider.apply(&plan, &changed, &mut state).await;
    assert!(result.is_success(), "{:?}", result.failed);
    assert_eq!(mock.vapp("web").unwrap().memory, Some(2048));
    assert_eq!(mock.count("compose_vapp"), 1);
    assert!(!provider.plan(&changed, &state).has_changes);
}

#[tokio::test(start_paused = true)]
async fn test_replace_deletes_then_creates() {
    let mock = standard_mock();
    let provider = provider(&mock);
    let (_, mut state) = applied(&provider).await;

    let changed = desired(vec![
        ResourceSpec::Network(NetworkResource {
            dns1: "1.1.1.1".to_string(),
            ..lan()
        }),
        ResourceSpec::Vapp(web()),
    ]);
    let plan = provider.plan(&changed, &state);
    assert_eq!(
        action_types(&plan),
        [
            ("network:lan".to_string(), ActionType::Replace),
            ("vapp:web".to_string(), ActionType::NoOp),
        ]
    );

    let result = provider.apply(&plan, &changed, &mut state).await;
    assert!(result.is_success(), "{:?}", result.failed);

    let deleted = mock.position("delete_network:lan").unwrap();
    let created = mock.calls().iter().rposition(|c| c == "create_network:lan").unwrap();
    assert!(deleted < created);
    assert_eq!(mock.network_spec("lan").unwrap().dns1, "1.1.1.1");
}

#[tokio::test(start_paused = true)]
async fn test_undeclared_resource_is_deleted() {
    let mock = standard_mock();
    let provider = provider(&mock);
    let (_, mut state) = applied(&provider).await;

    let remaining = desired(vec![ResourceSpec::Network(lan())]);
    let plan = provider.plan(&remaining, &state);
    assert_eq!(plan.actions_by_type(ActionType::Delete).len(), 1);

    let result = provider.apply(&plan, &remaining, &mut state).await;

    assert!(result.is_success(), "{:?}", result.failed);
    assert!(mock.vapp("web").is_none());
    assert!(state.get_resource("vapp:web").is_none());
    assert!(state.get_resource("network:lan").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_apply_continues_after_failure() {
    let mock = standard_mock();
    let provider = provider(&mock);
    let desired = desired(vec![
        ResourceSpec::Network(NetworkResource::new("dmz", "edge-99", "10.20.0.1")),
        ResourceSpec::Network(lan()),
    ]);
    let mut state = ProviderState::new();

    let plan = provider.plan(&desired, &state);
    let result = provider.apply(&plan, &desired, &mut state).await;

    assert!(!result.is_success());
    assert_eq!(result.failed.len(), 1);
    assert!(result.failed[0].error.as_deref().unwrap().contains("edge-99"));
    assert_eq!(result.succeeded.len(), 1);
    assert!(state.get_resource("network:dmz").is_none());
    assert!(state.get_resource("network:lan").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_removes_vanished_resources() {
    let mock = standard_mock();
    let provider = provider(&mock);
    let (desired, mut state) = applied(&provider).await;

    mock.remove_vapp("web");
    let removed = provider.refresh(&mut state).await.unwrap();

    assert_eq!(removed, ["vapp:web"]);
    assert_eq!(state.len(), 1);
    assert_eq!(
        action_types(&provider.plan(&desired, &state))[1],
        ("vapp:web".to_string(), ActionType::Create)
    );
}

#[tokio::test(start_paused = true)]
async fn test_destroy_all_removes_vapps_before_networks() {
    let mock = standard_mock();
    let provider = provider(&mock);
    let (_, mut state) = applied(&provider).await;

    let result = provider.destroy_all(&mut state).await;

    assert!(result.is_success(), "{:?}", result.failed);
    assert!(state.is_empty());
    assert!(mock.position("delete_vapp").unwrap() < mock.position("delete_network:lan").unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_check_auth_reports_org_and_vdc() {
    let mock = standard_mock();
    let status = provider(&mock).check_auth().await;

    assert!(status.authenticated);
    assert_eq!(status.account_info.as_deref(), Some("acme / acme-vdc"));
}

#[tokio::test(start_paused = true)]
async fn test_state_survives_save_and_load() {
    let mock = standard_mock();
    let provider = provider(&mock);
    let (_, state) = applied(&provider).await;

    let dir = tempfile::tempdir().unwrap();
    let manager = StateManager::new(dir.path());
    manager.save(&state).await.unwrap();

    let loaded: ProviderState = manager.load().await.unwrap();
    assert_eq!(loaded.resources, state.resources);
}
