// End-to-end: token manager feeding the api client, fanned out over a worker pool.

use std::sync::{Arc, Mutex};

use http::StatusCode;
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::cache::{Cache, RedbCache};
use crate::client::ApiClient;
use crate::config::loader::parse_config;
use crate::error::IrDataError;
use crate::tests::common::{fast_retry, manager, token_data, token_json, DATA_PATH, TOKEN_PATH};
use crate::worker::WorkerPool;

type Outcomes = Arc<Mutex<Vec<(usize, Result<Vec<u8>, IrDataError>)>>>;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_pool_fetches_with_the_managed_token() {
    let server = MockServer::start_async().await;
    let fresh = token_data(3600, 7200);
    let bearer = format!("Bearer {}", fresh.access_token);
    server
        .mock_async(|when, then| {
            when.method(POST).path(TOKEN_PATH);
            then.status(200).json_body(token_json(&fresh));
        })
        .await;
    let series = server
        .mock_async(|when, then| {
            when.method(GET).path_includes("/data/series/").header("authorization", bearer.as_str());
            then.status(200).body(r#"{"ok":true}"#);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/data/missing");
            then.status(404);
        })
        .await;

    let tokens = manager(&server, None);
    tokens.login().await.unwrap();
    let api = ApiClient::builder()
        .base_url(server.url(DATA_PATH))
        .retry(fast_retry(2))
        .token_provider(Arc::new(tokens.token_provider()))
        .build()
        .unwrap();

    let uris: Vec<String> = vec![
        "/data/series/get".into(),
        "/data/series/seasons".into(),
        "/data/missing".into(),
        "/data/series/assets".into(),
    ];

    let outcomes: Outcomes = Arc::default();
    let sink = outcomes.clone();
    let mut pool = WorkerPool::builder(move |uri: String| {
        let api = api.clone();
        async move { api.get(&uri).await }
    })
    .workers(3)
    .on_result(move |index, outcome| sink.lock().unwrap().push((index, outcome)))
    .build()
    .unwrap();

    assert_eq!(pool.process(uris).await, 4);
    series.assert_hits_async(3).await;

    let mut outcomes = outcomes.lock().unwrap();
    outcomes.sort_by_key(|(index, _)| *index);
    for (index, outcome) in outcomes.iter() {
        match index {
            2 => assert!(matches!(outcome, Err(IrDataError::UnexpectedStatus(StatusCode::NOT_FOUND)))),
            _ => assert_eq!(outcome.as_ref().unwrap(), &br#"{"ok":true}"#.to_vec()),
        }
    }
    tokens.shutdown().await;
}

#[tokio::test]
async fn app_wires_config_into_a_caching_client() {
    let server = MockServer::start_async().await;
    let fresh = token_data(3600, 7200);
    let login = server
        .mock_async(|when, then| {
            when.method(POST).path(TOKEN_PATH).body_includes("grant_type=password_limited");
            then.status(200).json_body(token_json(&fresh));
        })
        .await;
    let data = server
        .mock_async(|when, then| {
            when.method(GET).path("/data/track/get");
            then.status(200).body("[]");
        })
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache_file = dir.path().join("cache.redb");
    let yaml = format!(
        r#"
auth:
  client_id: myclient
  client_secret: secret
  username: driver@example.com
  password: MyPassWord
  token_url: {token_url}
api:
  base_url: {base_url}
  cache_file: {cache_file}
  cache_policy: read_write
  workers: 2
retry:
  attempts: 2
  base_delay_ms: 1
  max_delay_ms: 5
"#,
        token_url = server.url(TOKEN_PATH),
        base_url = server.url(DATA_PATH),
        cache_file = cache_file.display(),
    );
    let config = parse_config(&yaml).unwrap();

    let cancel = CancellationToken::new();
    let app = App::init(&config, &cancel).await.unwrap();
    login.assert_hits_async(1).await;
    assert_eq!(app.workers(), 2);

    assert_eq!(app.client.get("/data/track/get").await.unwrap(), b"[]".to_vec());
    assert_eq!(app.client.get("/data/track/get").await.unwrap(), b"[]".to_vec());
    data.assert_hits_async(1).await;

    // cancelling the root token stops the client as well
    cancel.cancel();
    let err = app.client.get("/data/track/get").await.unwrap_err();
    assert!(matches!(err, IrDataError::Cancelled));
    app.shutdown().await;
    assert!(!app.tokens.is_renewing());

    drop(app);
    let cache = RedbCache::open(&cache_file).unwrap();
    assert_eq!(cache.get("/data/track/get"), Some(b"[]".to_vec()));
}
