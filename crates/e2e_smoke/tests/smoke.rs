use std::collections::HashMap;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use catalog_gateway::config::GatewayConfig;
use catalog_gateway::graphql::{GraphqlRequest, GraphqlTransport};
use catalog_gateway::http;
use catalog_gateway::testing::StubBackend;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const ADMIN_SECRET: &str = "smoke-admin-secret-5d1c";
const MISSING_CATEGORY: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Clone)]
struct MockGraphql {
    backend: Arc<StubBackend>,
    secret: &'static str,
}

async fn graphql_endpoint(
    State(mock): State<MockGraphql>,
    headers: HeaderMap,
    Json(request): Json<GraphqlRequest>,
) -> Response {
    let authorized = headers
        .get("x-hasura-admin-secret")
        .and_then(|v| v.to_str().ok())
        == Some(mock.secret);
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match mock.backend.execute(request).await {
        Ok(response) => Json(response).into_response(),
        Err(_) => StatusCode::BAD_GATEWAY.into_response(),
    }
}

async fn spawn_mock_graphql(
    backend: Arc<StubBackend>,
) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/v1/graphql", post(graphql_endpoint))
        .with_state(MockGraphql {
            backend,
            secret: ADMIN_SECRET,
        });
    spawn_server(app).await
}

fn gateway_config(graphql_addr: SocketAddr, secret: &str) -> GatewayConfig {
    let mut kv = HashMap::new();
    kv.insert("CATALOG_BIND_ADDR".to_string(), "127.0.0.1:0".to_string());
    kv.insert(
        "CATALOG_GRAPHQL_ENDPOINT".to_string(),
        format!("http://{}/v1/graphql", graphql_addr),
    );
    kv.insert(
        "CATALOG_GRAPHQL_ADMIN_SECRET".to_string(),
        secret.to_string(),
    );
    kv.insert("CATALOG_GRAPHQL_TIMEOUT_MS".to_string(), "5000".to_string());
    GatewayConfig::from_kv(&kv).expect("gateway config should parse")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn smoke_catalog_round_trip_through_graphql_backend() {
    let log_buf = init_test_tracing();

    let backend = StubBackend::new();
    let (graphql_addr, graphql_shutdown, graphql_task) =
        spawn_mock_graphql(backend.clone()).await;

    let app = http::router(gateway_config(graphql_addr, ADMIN_SECRET))
        .await
        .expect("gateway router should build");
    let (gateway_addr, gateway_shutdown, gateway_task) = spawn_server(app).await;

    let client = reqwest::Client::new();
    wait_for_healthz(&client, gateway_addr).await;
    let base = format!("http://{}", gateway_addr);

    let ready = client
        .get(format!("{}/readyz", base))
        .send()
        .await
        .expect("readyz should respond");
    assert_eq!(ready.status(), reqwest::StatusCode::OK);

    // Category lifecycle.
    let created = client
        .post(format!("{}/categories", base))
        .json(&json!({ "name": "Tech", "description": "All things <i>tech</i>" }))
        .send()
        .await
        .expect("create category should respond");
    assert_eq!(created.status(), reqwest::StatusCode::CREATED);
    let category = created.json::<Value>().await.expect("category json");
    let category_id = category["id"]
        .as_str()
        .expect("category id should be a string")
        .to_string();
    assert_eq!(category["description"], "All things tech");
    assert!(category.get("__typename").is_none());

    let listed = client
        .get(format!("{}/categories", base))
        .send()
        .await
        .expect("list categories should respond")
        .json::<Value>()
        .await
        .expect("categories json");
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    // Episodes referencing the category.
    for (name, featured) in [("Alpha", false), ("Gamma", true), ("Beta", false)] {
        let response = client
            .post(format!("{}/episodes", base))
            .json(&json!({
                "name": name,
                "description": format!("{} episode", name),
                "featured": featured,
                "categoryid": category_id,
            }))
            .send()
            .await
            .expect("create episode should respond");
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    }

    let mutations_before = backend.mutation_count();
    let dangling = client
        .post(format!("{}/episodes", base))
        .header("x-request-id", "req_smoke_dangling")
        .json(&json!({
            "name": "Orphan",
            "description": "No parent",
            "categoryid": MISSING_CATEGORY,
        }))
        .send()
        .await
        .expect("dangling create should respond");
    assert_eq!(dangling.status(), reqwest::StatusCode::NOT_FOUND);
    assert_eq!(
        dangling
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("req_smoke_dangling")
    );
    let body = dangling.json::<Value>().await.expect("error json");
    assert_eq!(body["code"], "ERR_NOT_FOUND");
    assert_eq!(
        body["message"],
        format!("Category with ID {} not found", MISSING_CATEGORY)
    );
    assert_eq!(backend.mutation_count(), mutations_before);
    assert_eq!(backend.episode_count(), 3);

    let names = |episodes: &Value| -> Vec<String> {
        episodes
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|e| e["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    };

    let desc = client
        .get(format!("{}/episodes?sort=desc", base))
        .send()
        .await
        .expect("list desc should respond")
        .json::<Value>()
        .await
        .expect("episodes json");
    assert_eq!(names(&desc), vec!["Gamma", "Beta", "Alpha"]);

    let asc = client
        .get(format!("{}/episodes", base))
        .send()
        .await
        .expect("list asc should respond")
        .json::<Value>()
        .await
        .expect("episodes json");
    assert_eq!(names(&asc), vec!["Alpha", "Beta", "Gamma"]);

    let featured = client
        .get(format!("{}/episodes/featured", base))
        .send()
        .await
        .expect("featured should respond")
        .json::<Value>()
        .await
        .expect("featured json");
    assert_eq!(names(&featured), vec!["Gamma"]);

    // Validation happens before any backend call.
    let requests_before = backend.requests().len();
    let markup_only = client
        .post(format!("{}/categories", base))
        .json(&json!({ "name": "<script></script>", "description": "x" }))
        .send()
        .await
        .expect("markup create should respond");
    assert_eq!(markup_only.status(), reqwest::StatusCode::BAD_REQUEST);

    let unknown_field = client
        .post(format!("{}/episodes", base))
        .json(&json!({
            "name": "Delta",
            "description": "d",
            "categoryid": category_id,
            "id": "client-chosen",
        }))
        .send()
        .await
        .expect("unknown field create should respond");
    assert_eq!(unknown_field.status(), reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(backend.requests().len(), requests_before);

    // Repeated delete of the same episode.
    let alpha_id = asc[0]["id"]
        .as_str()
        .expect("episode id should be a string")
        .to_string();
    let first_delete = client
        .delete(format!("{}/episodes/{}", base, alpha_id))
        .send()
        .await
        .expect("delete should respond");
    assert_eq!(first_delete.status(), reqwest::StatusCode::OK);
    let second_delete = client
        .delete(format!("{}/episodes/{}", base, alpha_id))
        .send()
        .await
        .expect("repeated delete should respond");
    assert_eq!(second_delete.status(), reqwest::StatusCode::NOT_FOUND);

    let metrics = client
        .get(format!("{}/metrics", base))
        .send()
        .await
        .expect("metrics should respond")
        .text()
        .await
        .expect("metrics body");
    assert!(metrics.contains("catalog_gateway_dangling_reference_rejections_total"));
    assert!(metrics.contains("catalog_gateway_backend_calls_total"));

    let _ = gateway_shutdown.send(());
    let _ = graphql_shutdown.send(());
    let _ = tokio::time::timeout(Duration::from_secs(3), gateway_task).await;
    let _ = tokio::time::timeout(Duration::from_secs(3), graphql_task).await;

    let logs = String::from_utf8(
        log_buf
            .lock()
            .expect("log lock should be available")
            .clone(),
    )
    .expect("logs should be valid utf-8");

    assert!(
        logs.lines().any(|line| {
            line.contains("episode.category_missing") && line.contains("req_smoke_dangling")
        }),
        "expected a category_missing log carrying the request id; logs:\n{}",
        logs
    );
    assert!(
        !logs.contains(ADMIN_SECRET),
        "logs must not contain the backend admin secret; logs:\n{}",
        logs
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn smoke_wrong_secret_surfaces_as_backend_failure() {
    let backend = StubBackend::new();
    let (graphql_addr, graphql_shutdown, graphql_task) =
        spawn_mock_graphql(backend.clone()).await;

    // Startup tolerates an unusable backend; readiness reports it instead.
    let app = http::router(gateway_config(graphql_addr, "not-the-secret"))
        .await
        .expect("gateway router should build despite failed probe");
    let (gateway_addr, gateway_shutdown, gateway_task) = spawn_server(app).await;

    let client = reqwest::Client::new();
    wait_for_healthz(&client, gateway_addr).await;

    let ready = client
        .get(format!("http://{}/readyz", gateway_addr))
        .send()
        .await
        .expect("readyz should respond");
    assert_eq!(ready.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    let response = client
        .get(format!("http://{}/categories", gateway_addr))
        .send()
        .await
        .expect("list should respond");
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.json::<Value>().await.expect("error json");
    assert_eq!(body["code"], "ERR_BACKEND_FAILURE");
    assert!(!body.to_string().contains("401"));

    let _ = gateway_shutdown.send(());
    let _ = graphql_shutdown.send(());
    let _ = tokio::time::timeout(Duration::from_secs(3), gateway_task).await;
    let _ = tokio::time::timeout(Duration::from_secs(3), graphql_task).await;
}

async fn spawn_server(
    app: Router,
) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("local_addr should succeed");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
    });

    (addr, shutdown_tx, handle)
}

async fn wait_for_healthz(client: &reqwest::Client, addr: SocketAddr) {
    let url = format!("http://{}/healthz", addr);

    for _ in 0..50 {
        if let Ok(response) = client.get(&url).send().await
            && response.status().is_success()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    panic!("gateway did not become healthy at {}", url);
}

#[derive(Clone)]
struct TestWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut lock = self
            .buf
            .lock()
            .map_err(|_| std::io::Error::other("log mutex poisoned"))?;
        lock.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn init_test_tracing() -> Arc<Mutex<Vec<u8>>> {
    static LOG_BUF: OnceLock<Arc<Mutex<Vec<u8>>>> = OnceLock::new();

    LOG_BUF
        .get_or_init(|| {
            let buf = Arc::new(Mutex::new(Vec::new()));
            let make_writer = {
                let buf = buf.clone();
                move || TestWriter { buf: buf.clone() }
            };

            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .with_ansi(false)
                .with_writer(make_writer)
                .finish();

            tracing::subscriber::set_global_default(subscriber)
                .expect("global tracing subscriber should be set once");

            buf
        })
        .clone()
}
