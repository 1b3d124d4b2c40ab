use std::future::Future;

use tokio::task::JoinHandle;
use tracing::error;

use crate::Result;

/// Spawn a named background task, logging instead of dropping its error
pub fn spawn_task<Fut>(
    name: &str,
    task: Fut,
) -> JoinHandle<()>
where
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    // Clone the name so it can be safely moved into the async block
    let name = name.to_string();
    tokio::spawn(async move {
        if let Err(e) = task.await {
            error!("spawned task: {name} stopped or encountered an error: {:?}", e);
        }
    })
}
