//! End-to-end sync passes against an in-process mock control plane.
//!
//! Wires the real components (redb store, REST client, cached tag
//! discovery, syncer) together the way the daemon does, with DNS answers
//! scripted per test.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tgsync_control::{ControlPlaneClient, TagSyncFinder};
use tgsync_state::{
    CachedSyncFinder, FixedSyncFinder, RedbStateStore, State as PairState, StateKey, StateStore,
};
use tgsync_sync::{Resolver, SyncConfig, Syncer};

// ── Mock control plane ─────────────────────────────────────────────

#[derive(Clone, Default)]
struct ControlPlane {
    groups: Arc<Mutex<HashMap<String, Vec<String>>>>,
    resources: Arc<Mutex<Vec<serde_json::Value>>>,
    discovery_calls: Arc<AtomicUsize>,
}

impl ControlPlane {
    fn registered(&self, tg: &str) -> Vec<String> {
        let mut ips = self
            .groups
            .lock()
            .unwrap()
            .get(tg)
            .cloned()
            .unwrap_or_default();
        ips.sort();
        ips
    }
}

#[derive(serde::Deserialize)]
struct GroupQuery {
    group: String,
}

#[derive(serde::Deserialize)]
struct MutateBody {
    targets: Vec<String>,
}

async fn serve(plane: ControlPlane) -> SocketAddr {
    let router = Router::new()
        .route(
            "/v1/target-groups/targets",
            get(
                |State(p): State<ControlPlane>, Query(q): Query<GroupQuery>| async move {
                    let targets: Vec<serde_json::Value> = p
                        .groups
                        .lock()
                        .unwrap()
                        .get(&q.group)
                        .cloned()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|ip| serde_json::json!({ "id": ip }))
                        .collect();
                    Json(serde_json::json!({ "targets": targets }))
                },
            ),
        )
        .route(
            "/v1/target-groups/register",
            post(
                |State(p): State<ControlPlane>,
                 Query(q): Query<GroupQuery>,
                 Json(body): Json<MutateBody>| async move {
                    p.groups
                        .lock()
                        .unwrap()
                        .entry(q.group)
                        .or_default()
                        .extend(body.targets);
                    StatusCode::OK
                },
            ),
        )
        .route(
            "/v1/target-groups/deregister",
            post(
                |State(p): State<ControlPlane>,
                 Query(q): Query<GroupQuery>,
                 Json(body): Json<MutateBody>| async move {
                    if let Some(ips) = p.groups.lock().unwrap().get_mut(&q.group) {
                        ips.retain(|ip| !body.targets.contains(ip));
                    }
                    StatusCode::OK
                },
            ),
        )
        .route(
            "/v1/resources",
            get(|State(p): State<ControlPlane>| async move {
                p.discovery_calls.fetch_add(1, Ordering::SeqCst);
                let resources = p.resources.lock().unwrap().clone();
                Json(serde_json::json!({ "resources": resources }))
            }),
        )
        .with_state(plane);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

// ── Scripted DNS ───────────────────────────────────────────────────

#[derive(Clone, Default)]
struct ScriptedDns {
    zones: Arc<Mutex<HashMap<String, Vec<IpAddr>>>>,
}

impl ScriptedDns {
    fn set(&self, host: &str, ips: &[[u8; 4]]) {
        self.zones.lock().unwrap().insert(
            host.to_string(),
            ips.iter()
                .map(|[a, b, c, d]| IpAddr::V4(Ipv4Addr::new(*a, *b, *c, *d)))
                .collect(),
        );
    }
}

#[async_trait]
impl Resolver for ScriptedDns {
    async fn lookup_ips(&self, host: &str) -> anyhow::Result<Vec<IpAddr>> {
        self.zones
            .lock()
            .unwrap()
            .get(host)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such host {host}"))
    }
}

// ── Scenarios ──────────────────────────────────────────────────────

#[tokio::test]
async fn lifecycle_register_grace_deregister_reregister() {
    let plane = ControlPlane::default();
    let addr = serve(plane.clone()).await;
    let client = ControlPlaneClient::new(format!("http://{addr}"), None).unwrap();
    let store = Arc::new(RedbStateStore::open_in_memory("").unwrap());
    let dns = ScriptedDns::default();
    dns.set("web.internal", &[[1, 2, 3, 4]]);

    let syncer = Syncer::new(
        store.clone(),
        Arc::new(client),
        Arc::new(dns.clone()),
        Arc::new(FixedSyncFinder::new("arn:lb:tg/web", "web.internal")),
        SyncConfig {
            invocations_before_deregistration: 2,
            remove_unknown_tg_ips: false,
        },
    );
    let key = StateKey::new("arn:lb:tg/web", "web.internal");

    // Pass 1: fresh hostname registers.
    syncer.sync().await.unwrap();
    assert_eq!(plane.registered("arn:lb:tg/web"), vec!["1.2.3.4"]);
    let state = store.get_states(std::slice::from_ref(&key)).await.unwrap()[&key].clone();
    assert_eq!(state.version, 1);
    assert_eq!(state.targets[0].times_missing, 0);

    // Pass 2: the IP drops out of DNS but survives the grace period.
    dns.set("web.internal", &[]);
    syncer.sync().await.unwrap();
    assert_eq!(plane.registered("arn:lb:tg/web"), vec!["1.2.3.4"]);
    let state = store.get_states(std::slice::from_ref(&key)).await.unwrap()[&key].clone();
    assert_eq!(state.targets[0].times_missing, 1);

    // Pass 3: second consecutive miss crosses the threshold.
    syncer.sync().await.unwrap();
    assert!(plane.registered("arn:lb:tg/web").is_empty());
    // Empty state means the record was deleted.
    let state = store.get_states(std::slice::from_ref(&key)).await.unwrap()[&key].clone();
    assert_eq!(state, PairState::default());

    // Pass 4: a new IP appears and registers from scratch.
    dns.set("web.internal", &[[5, 6, 7, 8]]);
    syncer.sync().await.unwrap();
    assert_eq!(plane.registered("arn:lb:tg/web"), vec!["5.6.7.8"]);
}

#[tokio::test]
async fn unknown_ips_are_evicted_when_configured() {
    let plane = ControlPlane::default();
    plane.groups.lock().unwrap().insert(
        "arn:lb:tg/web".to_string(),
        vec!["9.9.9.9".to_string()],
    );
    let addr = serve(plane.clone()).await;
    let client = ControlPlaneClient::new(format!("http://{addr}"), None).unwrap();
    let store = Arc::new(RedbStateStore::open_in_memory("").unwrap());
    let dns = ScriptedDns::default();
    dns.set("web.internal", &[[1, 2, 3, 4]]);

    let syncer = Syncer::new(
        store,
        Arc::new(client),
        Arc::new(dns),
        Arc::new(FixedSyncFinder::new("arn:lb:tg/web", "web.internal")),
        SyncConfig {
            invocations_before_deregistration: 3,
            remove_unknown_tg_ips: true,
        },
    );

    // The stray IP goes on the first pass; the resolved one arrives.
    syncer.sync().await.unwrap();
    assert_eq!(plane.registered("arn:lb:tg/web"), vec!["1.2.3.4"]);
}

#[tokio::test]
async fn tag_discovery_is_cached_across_process_restarts() {
    let plane = ControlPlane::default();
    *plane.resources.lock().unwrap() = vec![
        serde_json::json!({
            "arn": "arn:lb:tg/web",
            "tags": [ { "key": "sync-hostname", "value": "web.internal" } ],
        }),
        serde_json::json!({
            "arn": "arn:lb:tg/api",
            "tags": [ { "key": "sync-hostname", "value": "api.internal" } ],
        }),
    ];
    let addr = serve(plane.clone()).await;
    let dns = ScriptedDns::default();
    dns.set("web.internal", &[[1, 1, 1, 1]]);
    dns.set("api.internal", &[[2, 2, 2, 2]]);

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("state.redb");

    // The short-lived shells wire the durable store as the discovery cache,
    // so a fresh process reuses the previous discovery.
    let run_once = || {
        let client = ControlPlaneClient::new(format!("http://{addr}"), None).unwrap();
        let store = Arc::new(RedbStateStore::open(&db_path, "e2e").unwrap());
        let finder = CachedSyncFinder::new(
            Arc::new(TagSyncFinder::new(client.clone(), "sync-hostname")),
            store.clone(),
            Duration::from_secs(300),
        );
        Syncer::new(
            store,
            Arc::new(client),
            Arc::new(dns.clone()),
            Arc::new(finder),
            SyncConfig::default(),
        )
    };

    run_once().sync().await.unwrap();
    assert_eq!(plane.registered("arn:lb:tg/web"), vec!["1.1.1.1"]);
    assert_eq!(plane.registered("arn:lb:tg/api"), vec!["2.2.2.2"]);
    assert_eq!(plane.discovery_calls.load(Ordering::SeqCst), 1);

    // Second invocation: discovery comes from the durable cache.
    run_once().sync().await.unwrap();
    assert_eq!(plane.discovery_calls.load(Ordering::SeqCst), 1);
}
