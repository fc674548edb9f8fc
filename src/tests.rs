//! Integration tests for the document store and the HTTP sync path.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::classroom::Classroom;
use crate::db::{init_database, Preferences, Repository};
use crate::models::{HistoryLog, Student, SyncDocument};
use crate::session::{SessionId, SessionManager, SessionSources};
use crate::sync::{HttpGateway, RemoteStore, SyncEngine, SyncSettings, SyncStatus};
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let state = AppState {
            repo: Arc::new(Repository::new(pool)),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn gateway(&self) -> HttpGateway {
        HttpGateway::with_client(self.client.clone(), &self.base_url)
    }

    /// An engine on its own in-memory device storage, talking to this store.
    fn device(&self, link: &str, settings: SyncSettings) -> SyncEngine<HttpGateway> {
        let prefs = Arc::new(Preferences::in_memory());
        let sources = SessionSources::new(Some(link), "http://localhost:3000/", None).unwrap();
        SyncEngine::new(
            Arc::new(Classroom::new()),
            self.gateway(),
            SessionManager::new(prefs.clone(), sources),
            prefs,
            settings,
        )
    }
}

fn fast_settings() -> SyncSettings {
    SyncSettings {
        poll_interval: Duration::from_millis(300),
        guard_window: Duration::from_millis(200),
        debounce: Duration::from_millis(100),
        ..SyncSettings::default()
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_missing_document() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/NOPE1234"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_put_then_get() {
    let fixture = TestFixture::new().await;
    let document = json!({
        "students": [{
            "id": "s1",
            "name": "Kim",
            "studentId": "1",
            "points": 7,
            "avatarId": 25,
            "classGroup": "Class A"
        }],
        "logs": [],
        "version": "1.2"
    });

    let resp = fixture
        .client
        .put(fixture.url("/ABC12345"))
        .json(&document)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .get(fixture.url("/ABC12345"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, document);
}

#[tokio::test]
async fn test_put_replaces_document() {
    let fixture = TestFixture::new().await;

    for students in [json!([1, 2]), json!([3])] {
        fixture
            .client
            .put(fixture.url("/ABC"))
            .json(&json!({ "students": students }))
            .send()
            .await
            .unwrap();
    }

    let body: Value = fixture
        .client
        .get(fixture.url("/ABC"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "students": [3] }));
}

#[tokio::test]
async fn test_put_rejects_non_object() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .put(fixture.url("/ABC"))
        .json(&json!([1, 2, 3]))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_gateway_round_trip() {
    let fixture = TestFixture::new().await;
    let gateway = fixture.gateway();
    let code = SessionId::parse("ROUNDTRIP").unwrap();

    assert!(matches!(
        gateway.fetch(&code).await,
        Err(crate::errors::AppError::NotFound(_))
    ));

    let kim = Student::new("Kim", "1", Some("Class A"));
    let lee = Student::new("Lee", "10", None);
    let logs = vec![
        HistoryLog::new(&kim, 2, Some("Homework Complete")),
        HistoryLog::new(&lee, -1, None),
    ];
    let document = SyncDocument::new(vec![kim, lee], logs);

    gateway.publish(&code, &document).await.unwrap();
    let fetched = gateway.fetch(&code).await.unwrap();

    assert_eq!(fetched, document);
}

#[tokio::test]
async fn test_gateway_rejects_malformed_document() {
    let fixture = TestFixture::new().await;
    fixture
        .client
        .put(fixture.url("/BROKEN"))
        .json(&json!({ "logs": [] }))
        .send()
        .await
        .unwrap();

    let result = fixture
        .gateway()
        .fetch(&SessionId::parse("BROKEN").unwrap())
        .await;

    assert!(matches!(result, Err(crate::errors::AppError::Parse(_))));
}

#[tokio::test]
async fn test_two_devices_share_a_session() {
    let fixture = TestFixture::new().await;
    let link = "http://class.local/?code=CLASSROOM";

    let mut first = fixture.device(link, fast_settings());
    assert_eq!(first.start().await, SyncStatus::Synced);
    let seeded = first.classroom().students().await;
    assert!(!seeded.is_empty());

    let mut second = fixture.device(link, fast_settings());
    assert_eq!(second.start().await, SyncStatus::Synced);
    assert_eq!(second.classroom().students().await, seeded);

    // An edit on the first device reaches the second one.
    let id = seeded[0].id.clone();
    first
        .classroom()
        .apply_behavior(&id, 3, Some("Helped a Friend"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1200)).await;

    let student = second.classroom().student(&id).await.unwrap();
    assert_eq!(student.points, 3);
    assert_eq!(second.classroom().logs().await.len(), 1);

    first.shutdown();
    second.shutdown();
}
