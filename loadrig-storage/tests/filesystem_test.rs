use loadrig_core::{Execution, ExecutionStatus, LoadShape, ProfileId, ResultSummary};
use loadrig_interfaces::{ProfileStore, ResultPersister, StoreError, TerminalUpdate};
use loadrig_storage::{load_profile_file, FileExecutionStore, FileProfileStore};
use tempfile::TempDir;

const YAML_PROFILE: &str = r#"
name: Checkout
url: https://shop.example.com/api/checkout
method: post
headers:
  - key: Content-Type
    value: application/json
body: '{"sku": "{{sku}}"}'
loadCategory: rps
loadSubMode: simple
rps: 50
duration: 1m
preAllocatedVUs: 5
maxVUs: 20
thresholds:
  - metric: http_req_duration
    condition: p(95)<500
stopOnFailure: true
dataFile: /data/skus.csv
"#;

#[tokio::test]
async fn test_profile_directory() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("checkout.yaml"), YAML_PROFILE).unwrap();
    std::fs::write(
        dir.path().join("ping.json"),
        r#"{"url": "http://localhost/ping", "vus": 2, "duration": "10s"}"#,
    )
    .unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a profile").unwrap();
    std::fs::write(dir.path().join("broken.yaml"), "url: [unterminated").unwrap();

    let store = FileProfileStore::new(dir.path());
    let profiles = store.list_profiles().await.unwrap();
    let ids: Vec<_> = profiles.iter().map(|p| p.id.as_str().to_string()).collect();
    assert_eq!(ids, vec!["checkout", "ping"]);

    let checkout = store.get_profile(&ProfileId::new("checkout")).await.unwrap();
    assert_eq!(checkout.name, "Checkout");
    assert!(checkout.stop_on_failure);
    assert_eq!(checkout.headers["Content-Type"], "application/json");
    assert_eq!(
        checkout.load,
        LoadShape::ConstantArrivalRate {
            rate: 50,
            duration: "1m".into(),
            pre_allocated_vus: 5,
            max_vus: 20
        }
    );

    let missing = store.get_profile(&ProfileId::new("nope")).await.unwrap_err();
    assert!(missing.is_not_found());
    let escaped = store
        .get_profile(&ProfileId::new("../checkout"))
        .await
        .unwrap_err();
    assert!(escaped.is_not_found());
}

#[tokio::test]
async fn test_load_single_profile_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("smoke.yml");
    std::fs::write(&path, "url: http://localhost\nloadSubMode: stages\n").unwrap();

    let err = load_profile_file(&path).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation { .. }));
}

#[tokio::test]
async fn test_execution_records_roundtrip_and_stay_terminal() {
    let dir = TempDir::new().unwrap();
    let store = FileExecutionStore::new(dir.path().join("executions"));

    let mut record = Execution::new(ProfileId::new("checkout"), "Checkout");
    store.save_execution(&record).await.unwrap();
    assert!(matches!(
        store.save_execution(&record).await,
        Err(StoreError::AlreadyExists { .. })
    ));

    record.transition(ExecutionStatus::Running).unwrap();
    record.transition(ExecutionStatus::Completed).unwrap();
    record.summary = Some(ResultSummary {
        http_reqs: 300,
        ..Default::default()
    });
    store
        .update_execution(record.id, TerminalUpdate::from_execution(&record))
        .await
        .unwrap();

    let loaded = store.get_execution(record.id).await.unwrap();
    assert_eq!(loaded.status, ExecutionStatus::Completed);
    assert_eq!(loaded.summary.unwrap().http_reqs, 300);

    let again = store
        .update_execution(record.id, TerminalUpdate::from_execution(&record))
        .await;
    assert!(matches!(again, Err(StoreError::Immutable { .. })));

    let listed = store.list_executions().await.unwrap();
    assert_eq!(listed.len(), 1);

    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("executions"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_unknown_execution() {
    let dir = TempDir::new().unwrap();
    let store = FileExecutionStore::new(dir.path());
    let err = store
        .get_execution(loadrig_core::ExecutionId::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(store.list_executions().await.unwrap().is_empty());
}
