//! Scheduler tests. The downloader is `/bin/sh`, so these only run on unix.
#![cfg(unix)]

use super::test_helpers::*;
use crate::error::Error;
use crate::types::{Event, NoticeKind, TaskId, TaskState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;


/// Collect everything currently buffered on a receiver
fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn state_of(scheduler: &super::DownloadScheduler, id: TaskId) -> Option<TaskState> {
    scheduler.task(id).await.map(|info| info.state)
}
