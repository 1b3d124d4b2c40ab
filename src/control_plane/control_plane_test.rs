use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::Error;

fn description(state: &str) -> ClusterDescription {
    ClusterDescription {
        name: "Cluster0".into(),
        state_name: state.into(),
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn poll_until_healthy_ignores_errors_until_idle() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let mut control_plane = MockControlPlane::new();
    control_plane.expect_cluster_status().returning(move || {
        match counter.fetch_add(1, Ordering::SeqCst) {
            0 => Err(ControlPlaneError::Status {
                status: 503,
                body: "unavailable".into(),
            }
            .into()),
            1 => Ok(description("REPAIRING")),
            _ => Ok(description("IDLE")),
        }
    });

    poll_until_healthy(&control_plane, Duration::from_secs(60), Duration::from_secs(2))
        .await
        .expect("cluster should become idle");

    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn poll_until_healthy_times_out() {
    let mut control_plane = MockControlPlane::new();
    control_plane
        .expect_cluster_status()
        .returning(|| Ok(description("UPDATING")));

    let started = tokio::time::Instant::now();
    let result = poll_until_healthy(&control_plane, Duration::from_secs(10), Duration::from_secs(2)).await;

    assert!(matches!(
        result,
        Err(Error::ControlPlane(ControlPlaneError::HealthyTimeout(d))) if d == Duration::from_secs(10)
    ));
    assert!(started.elapsed() >= Duration::from_secs(10));
}

#[test]
fn process_membership_matches_alias_or_hostname() {
    let process = |hostname: &str, alias: Option<&str>| ClusterProcess {
        id: "p".into(),
        hostname: hostname.into(),
        port: 27017,
        type_name: "REPLICA_PRIMARY".into(),
        user_alias: alias.map(String::from),
    };

    assert!(belongs_to_cluster(
        &process("a.mongodb.net", Some("Cluster0-shard-00-00")),
        "Cluster0"
    ));
    assert!(belongs_to_cluster(
        &process("cluster0-shard-00-01.abcde.mongodb.net", None),
        "Cluster0"
    ));
    assert!(!belongs_to_cluster(&process("other-shard-00-00.mongodb.net", Some("Other")), "Cluster0"));
}

#[test]
fn cluster_description_deserializes_api_payload() {
    let payload = r#"{
        "name": "Cluster0",
        "stateName": "IDLE",
        "mongoDBVersion": "7.0.5",
        "connectionStrings": {"standardSrv": "mongodb+srv://cluster0.abcde.mongodb.net"},
        "paused": false
    }"#;

    let description: ClusterDescription = serde_json::from_str(payload).unwrap();
    assert_eq!(description.state_name, "IDLE");
    assert_eq!(description.mongo_db_version.as_deref(), Some("7.0.5"));
    assert_eq!(
        description.connection_strings.unwrap().standard_srv.as_deref(),
        Some("mongodb+srv://cluster0.abcde.mongodb.net")
    );
}
