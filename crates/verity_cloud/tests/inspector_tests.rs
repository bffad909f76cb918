//! Integration tests for snapshot flattening and mock collaborators.

use serde_json::json;
use verity_cloud::{
    AttributeValue, CloudError, CredentialProvider, MockCredentials, MockInspection, MockInspector,
    ResourceInspector, ResourceSnapshot, ResourceTarget,
};

fn vmss(name: &str) -> ResourceTarget {
    ResourceTarget::new(
        "rg-agents",
        name,
        "Microsoft.Compute/virtualMachineScaleSets",
        "2019-07-01",
    )
}

#[test]
fn test_snapshot_keeps_target_and_types() {
    let body = json!({
        "sku": {"capacity": 2, "name": "Standard_B2s"},
        "properties": {"singlePlacementGroup": true, "provisioningState": "Updating"}
    });
    let snapshot = ResourceSnapshot::from_arm_json(vmss("vmss-a"), &body);

    assert_eq!(snapshot.target().name, "vmss-a");
    assert_eq!(snapshot.len(), 4);
    assert_eq!(snapshot.get("sku.capacity").map(|v| v.kind()), Some("integer"));
    assert_eq!(
        snapshot.get("properties.singlePlacementGroup"),
        Some(&AttributeValue::Enum("true".into()))
    );
    assert!(snapshot.get("sku").is_none());
}

#[tokio::test]
async fn test_mock_inspector_per_target_scripts() {
    let inspector = MockInspector::new()
        .respond(
            "rg-agents",
            "vmss-a",
            vec![MockInspection::found([("sku.capacity", AttributeValue::Integer(2))])],
        )
        .respond(
            "rg-agents",
            "vmss-b",
            vec![MockInspection::Unauthorized("AuthorizationFailed".into())],
        );
    let session = MockCredentials::new("sub-1").authenticate().await.unwrap();

    let a = inspector.inspect(&session, &vmss("vmss-a")).await.unwrap();
    assert_eq!(a.get("sku.capacity"), Some(&AttributeValue::Integer(2)));

    let b = inspector.inspect(&session, &vmss("vmss-b")).await.unwrap_err();
    assert!(matches!(b, CloudError::Authorization(_)));
    assert!(!b.is_transient());

    let names: Vec<String> = inspector.calls().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["vmss-a", "vmss-b"]);
}

#[tokio::test]
async fn test_transient_then_found() {
    let inspector = MockInspector::new().respond(
        "rg-agents",
        "vmss-a",
        vec![
            MockInspection::Transient("503".into()),
            MockInspection::found([("properties.provisioningState", AttributeValue::Enum("Succeeded".into()))]),
        ],
    );
    let session = MockCredentials::new("sub-1").authenticate().await.unwrap();

    let first = inspector.inspect(&session, &vmss("vmss-a")).await.unwrap_err();
    assert!(first.is_transient());
    assert!(inspector.inspect(&session, &vmss("vmss-a")).await.is_ok());
}
