//! Custom test assertions and event helpers

use std::future::Future;
use std::time::Duration;

use episode_dl::{DownloadScheduler, Event, TaskId, TaskState};
use tokio::sync::broadcast;

/// Poll `condition` until it holds, panicking after `timeout`
pub async fn wait_until<F, Fut>(what: &str, timeout: Duration, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until the task has left the active list
pub async fn wait_for_removal(scheduler: &DownloadScheduler, id: TaskId) {
    wait_until("task removal", Duration::from_secs(10), || async {
        scheduler.task(id).await.is_none()
    })
    .await;
}

/// Wait until the task is in `state`
pub async fn wait_for_state(scheduler: &DownloadScheduler, id: TaskId, state: TaskState) {
    wait_until(&format!("{:?}", state), Duration::from_secs(10), || async {
        scheduler.task(id).await.is_some_and(|t| t.state == state)
    })
    .await;
}

/// Collect events until `predicate` matches one (inclusive) or the timeout passes
pub async fn collect_events_until<P>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    mut predicate: P,
) -> Vec<Event>
where
    P: FnMut(&Event) -> bool,
{
    let mut collected = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            let done = predicate(&event);
            collected.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    collected
}

/// Final state reported for `id` among `events`
pub fn final_state(events: &[Event], id: TaskId) -> Option<TaskState> {
    events.iter().rev().find_map(|e| match e {
        Event::StateChanged { id: event_id, state } if *event_id == id => Some(*state),
        _ => None,
    })
}
