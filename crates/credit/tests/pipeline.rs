//! Whole pipeline over a filesystem store: HTTP ingestion, notification,
//! decision worker, decision object.

use credit::config::{FileConfig, ServeArgs, ServiceConfig};
use credit::service;
use credit_store::{FsStore, ObjectStore};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

fn config(store_root: &std::path::Path) -> ServiceConfig {
    let args = ServeArgs {
        bucket_input: Some("propostas".to_string()),
        bucket_output: Some("decisoes".to_string()),
        listen: Some("127.0.0.1:0".to_string()),
        store_root: Some(store_root.to_path_buf()),
        ..ServeArgs::default()
    };
    ServiceConfig::resolve(&args, FileConfig::default(), store_root).unwrap()
}

async fn wait_for_decisions(store: &FsStore, expected: usize) -> Vec<String> {
    for _ in 0..100 {
        let listed = store.list("decisoes", "decisions/").await.unwrap();
        if listed.len() >= expected {
            return listed.into_iter().map(|meta| meta.key).collect();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("decisions did not appear in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn submitted_proposal_gets_a_decision() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let store = Arc::new(FsStore::new(tmp.path()));

    let listener = tokio::net::TcpListener::bind(config.listen).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(service::run(
        config,
        store.clone(),
        listener,
        async {
            let _ = stop_rx.await;
        },
    ));

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/propostas"))
        .body(r#"{"nome":"Ana","idade":30,"rendaMensal":3000}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(
        created["local"],
        format!("file://propostas/applications/{id}.json")
    );

    let keys = wait_for_decisions(&store, 1).await;
    assert_eq!(keys.len(), 1);
    assert!(keys[0].starts_with(&format!("decisions/{id}_")), "{keys:?}");

    let decision: Value =
        serde_json::from_slice(&store.get("decisoes", &keys[0]).await.unwrap()).unwrap();
    assert_eq!(decision["status"], "APPROVED");
    assert_eq!(decision["valorAprovado"], 3600.0);
    assert!(decision["dataDecisao"].is_string());

    stop_tx.send(()).unwrap();
    let stats = tokio::time::timeout(Duration::from_secs(15), running)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(stats.persisted, 1);
    assert_eq!(stats.dead_lettered, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn documents_do_not_produce_decisions() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let store = Arc::new(FsStore::new(tmp.path()));

    let listener = tokio::net::TcpListener::bind(config.listen).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(service::run(
        config,
        store.clone(),
        listener,
        async {
            let _ = stop_rx.await;
        },
    ));

    let form = reqwest::multipart::Form::new().part(
        "arquivo",
        reqwest::multipart::Part::bytes(b"%PDF".to_vec()).file_name("renda.pdf"),
    );
    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/propostas/abc/documentos"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    stop_tx.send(()).unwrap();
    let stats = tokio::time::timeout(Duration::from_secs(15), running)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(stats.ignored, 1);
    assert_eq!(stats.persisted, 0);
    assert!(store.list("decisoes", "").await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn proposals_stored_while_down_are_decided_at_start() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let store = Arc::new(FsStore::new(tmp.path()));
    store
        .put(
            "propostas",
            "applications/offline.json",
            "application/json",
            br#"{"idade":45,"rendaMensal":2500}"#.to_vec(),
        )
        .await
        .unwrap();
    store
        .put(
            "propostas",
            "applications/settled.json",
            "application/json",
            br#"{"idade":45,"rendaMensal":2500}"#.to_vec(),
        )
        .await
        .unwrap();
    store
        .put(
            "decisoes",
            "decisions/settled_d0.json",
            "application/json",
            b"{}".to_vec(),
        )
        .await
        .unwrap();

    let listener = tokio::net::TcpListener::bind(config.listen).await.unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(service::run(
        config,
        store.clone(),
        listener,
        async {
            let _ = stop_rx.await;
        },
    ));

    let keys = wait_for_decisions(&store, 2).await;
    assert_eq!(keys.len(), 2, "{keys:?}");
    assert!(keys.iter().any(|k| k.starts_with("decisions/offline_")));

    stop_tx.send(()).unwrap();
    let stats = tokio::time::timeout(Duration::from_secs(15), running)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(stats.received, 1);
    assert_eq!(stats.persisted, 1);
}
