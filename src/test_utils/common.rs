use std::time::Duration;

use tokio::sync::broadcast;

use crate::FailoverEvent;
use crate::Settings;

/// Settings that pass validation without touching any real service
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.control_plane.public_key = "public-key".to_string();
    settings.control_plane.private_key = "private-key".to_string();
    settings.control_plane.project_id = "project-1".to_string();
    settings.control_plane.cluster_name = "Cluster0".to_string();
    settings.database.uri = "mongodb://localhost:27017/?replicaSet=rs0".to_string();
    settings
}

/// Everything currently buffered for `rx`
pub fn drain_events(rx: &mut broadcast::Receiver<FailoverEvent>) -> Vec<FailoverEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn event_names(events: &[FailoverEvent]) -> Vec<&'static str> {
    events.iter().map(FailoverEvent::name).collect()
}

/// Let in-flight fake operations finish; short enough to stay inside any test window
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
