//! Spawning and supervising the downloader process

use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::sync::broadcast;

use super::parser::OutputLine;
use super::reader::OutputReader;
use super::traits::{DownloaderTool, TransferJob};
use crate::error::ProcessError;
use crate::task::DownloadTask;
use crate::types::{Event, NoticeKind};

pub(crate) const NOTICE_TITLE: &str = "Download Error";

/// How a supervised transfer ended
#[derive(Debug)]
pub(crate) enum ProcessOutcome {
    /// Exited with success
    Completed,
    /// Killed after the task's cancel flag was observed
    Cancelled,
    /// Could not be started, supervised, or exited unsuccessfully
    Failed(ProcessError),
}

/// Runs one transfer through a [`DownloaderTool`]
///
/// The cancel flag is polled after every output line and at least once per
/// `poll_interval` while the tool is silent. A positive flag kills the process.
pub(crate) struct ProcessSupervisor<'a> {
    tool: &'a dyn DownloaderTool,
    poll_interval: Duration,
    events: &'a broadcast::Sender<Event>,
}

impl<'a> ProcessSupervisor<'a> {
    pub(crate) fn new(
        tool: &'a dyn DownloaderTool,
        poll_interval: Duration,
        events: &'a broadcast::Sender<Event>,
    ) -> Self {
        Self {
            tool,
            poll_interval,
            events,
        }
    }

    /// Spawn the tool for `job` and supervise it until exit or cancellation
    pub(crate) async fn run(&self, task: &DownloadTask, job: &TransferJob) -> ProcessOutcome {
        let program = self.tool.program();
        let mut child = match Command::new(program)
            .args(self.tool.arguments(job))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(source) => {
                return ProcessOutcome::Failed(ProcessError::Spawn {
                    program: program.to_path_buf(),
                    source,
                });
            }
        };

        tracing::debug!(
            task_id = task.id().0,
            program = ?program,
            pid = child.id(),
            "Downloader started"
        );

        let mut stdout = child.stdout.take().map(OutputReader::new);
        let mut stderr = child.stderr.take().map(OutputReader::new);

        while stdout.is_some() || stderr.is_some() {
            if task.is_cancel_requested() {
                return self.kill(task, &mut child).await;
            }

            let read = tokio::time::timeout(self.poll_interval, async {
                tokio::select! {
                    line = next_line(&mut stdout) => (true, line),
                    line = next_line(&mut stderr) => (false, line),
                }
            })
            .await;

            match read {
                // silent tool; go back and check the flag
                Err(_) => continue,
                Ok((_, Ok(Some(line)))) => self.handle_line(task, &line),
                Ok((from_stdout, Ok(None))) => {
                    if from_stdout {
                        stdout = None;
                    } else {
                        stderr = None;
                    }
                }
                Ok((_, Err(e))) => {
                    tracing::error!(task_id = task.id().0, error = %e, "Failed to read downloader output");
                    if let Err(kill_err) = child.kill().await {
                        tracing::warn!(task_id = task.id().0, error = %kill_err, "Failed to kill downloader");
                    }
                    return ProcessOutcome::Failed(ProcessError::Wait(e));
                }
            }
        }

        // output closed; the process may still be finishing up
        let status = loop {
            if task.is_cancel_requested() {
                return self.kill(task, &mut child).await;
            }
            match tokio::time::timeout(self.poll_interval, child.wait()).await {
                Ok(Ok(status)) => break status,
                Ok(Err(e)) => return ProcessOutcome::Failed(ProcessError::Wait(e)),
                Err(_) => continue,
            }
        };

        if status.success() {
            ProcessOutcome::Completed
        } else {
            ProcessOutcome::Failed(ProcessError::Exited {
                code: status.code(),
            })
        }
    }

    fn handle_line(&self, task: &DownloadTask, line: &str) {
        let parsed = self.tool.parse_line(line);
        let percent = match &parsed {
            OutputLine::Progress { percent, .. } => Some(*percent),
            OutputLine::Error(text) => {
                tracing::warn!(task_id = task.id().0, line = %text, "Downloader reported an error");
                self.events
                    .send(Event::Notice {
                        id: Some(task.id()),
                        title: NOTICE_TITLE.to_string(),
                        message: format!("{}\n{}", task.display_name(), text),
                        kind: NoticeKind::ProcessError,
                    })
                    .ok();
                None
            }
            OutputLine::Other(text) if text.is_empty() => return,
            OutputLine::Other(_) => None,
        };

        if let Some((percent, text)) = task.record_progress(percent, parsed.text()) {
            self.events
                .send(Event::Progress {
                    id: task.id(),
                    percent,
                    text,
                })
                .ok();
        }
    }

    async fn kill(&self, task: &DownloadTask, child: &mut Child) -> ProcessOutcome {
        tracing::info!(task_id = task.id().0, "Killing downloader for cancelled task");
        if let Err(e) = child.kill().await {
            tracing::warn!(task_id = task.id().0, error = %e, "Failed to kill downloader");
        }
        ProcessOutcome::Cancelled
    }
}

/// Next line from an optional reader; pends forever once the reader is gone
async fn next_line<R>(reader: &mut Option<OutputReader<R>>) -> io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    match reader {
        Some(reader) => reader.next_line().await,
        None => std::future::pending().await,
    }
}
