//! Reconfiguration task handling with timeout support.
//!
//! Reconfiguration requests return immediately with a task handle. This
//! module provides the polling loop that blocks until the task reaches a
//! terminal state, with a configurable timeout and a progress callback.

use crate::client::VimClient;
use crate::error::{Error, Result};
use core::fmt;
use std::time::{Duration, Instant};

/// Default polling interval for task status.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default task timeout.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300); // 5 minutes

/// Task state as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Task is running.
    Running,
    /// Task completed successfully.
    Success,
    /// Task finished with an error.
    Error,
    /// Unknown state.
    Unknown,
}

impl TaskState {
    /// Check if task is still pending.
    pub fn is_running(&self) -> bool {
        *self == TaskState::Running
    }

    /// Check if task completed successfully.
    pub fn is_completed(&self) -> bool {
        *self == TaskState::Success
    }

    /// Check if task failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, TaskState::Error | TaskState::Unknown)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Running => write!(f, "Running"),
            TaskState::Success => write!(f, "Success"),
            TaskState::Error => write!(f, "Error"),
            TaskState::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Handle of an asynchronous unit of work on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Task {
    id: String,
}

impl Task {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Task status snapshot.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    /// Current task state.
    pub state: TaskState,
    /// Error message if the task failed.
    pub error: Option<String>,
}

impl TaskInfo {
    pub fn running() -> Self {
        Self {
            state: TaskState::Running,
            error: None,
        }
    }

    pub fn success() -> Self {
        Self {
            state: TaskState::Success,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            state: TaskState::Error,
            error: Some(message.into()),
        }
    }
}

/// Configuration for task waiting.
#[derive(Debug, Clone)]
pub struct TaskWaitConfig {
    /// Maximum time to wait for task completion.
    pub timeout: Duration,
    /// Polling interval for task status.
    pub poll_interval: Duration,
}

impl Default for TaskWaitConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TASK_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl TaskWaitConfig {
    /// Create a new configuration with specified timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Set the polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Blocks on platform tasks until they reach a terminal state.
pub struct TaskWaiter<'a, C: VimClient + ?Sized> {
    client: &'a C,
    config: TaskWaitConfig,
}

impl<'a, C: VimClient + ?Sized> TaskWaiter<'a, C> {
    /// Create a task waiter with custom configuration.
    pub fn with_config(client: &'a C, config: TaskWaitConfig) -> Self {
        Self { client, config }
    }

    /// Wait for a task to complete, returning the final status.
    pub fn wait(&self, task: &Task, operation: &'static str) -> Result<TaskInfo> {
        self.wait_with_callback(task, operation, |_, _| {})
    }

    /// Wait for a task to complete with a progress callback.
    pub fn wait_with_callback<F>(
        &self,
        task: &Task,
        operation: &'static str,
        mut callback: F,
    ) -> Result<TaskInfo>
    where
        F: FnMut(&TaskInfo, Duration),
    {
        let start = Instant::now();
        let mut last_state = TaskState::Unknown;

        loop {
            let elapsed = start.elapsed();

            if elapsed > self.config.timeout {
                return Err(Error::task_timeout(
                    operation,
                    task.id(),
                    self.config.timeout,
                    last_state,
                ));
            }

            let info = self.client.task_info(task)?;
            tracing::debug!(task = %task, state = %info.state, "polled task");

            callback(&info, elapsed);

            if !info.state.is_running() {
                if info.state.is_completed() {
                    return Ok(info);
                }
                let message = info
                    .error
                    .clone()
                    .unwrap_or_else(|| "Unknown error".to_string());
                return Err(Error::task_failed(operation, task.id(), info.state, message));
            }

            last_state = info.state;

            std::thread::sleep(self.config.poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeVim;

    fn fast() -> TaskWaitConfig {
        TaskWaitConfig::with_timeout(Duration::from_secs(5)).with_poll_interval(Duration::ZERO)
    }

    #[test]
    fn test_task_state_predicates() {
        assert!(TaskState::Running.is_running());
        assert!(!TaskState::Success.is_running());

        assert!(TaskState::Success.is_completed());
        assert!(!TaskState::Error.is_completed());

        assert!(TaskState::Error.is_failed());
        assert!(TaskState::Unknown.is_failed());
        assert!(!TaskState::Running.is_failed());
    }

    #[test]
    fn test_task_wait_config() {
        let config = TaskWaitConfig::default();
        assert_eq!(config.timeout, DEFAULT_TASK_TIMEOUT);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);

        let custom = TaskWaitConfig::with_timeout(Duration::from_secs(60))
            .with_poll_interval(Duration::from_millis(50));
        assert_eq!(custom.timeout, Duration::from_secs(60));
        assert_eq!(custom.poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_wait_polls_until_success() {
        let fake = FakeVim::new();
        fake.set_task_polls_before_done(3);
        let task = fake.start_task(TaskInfo::success());

        let mut polls = 0;
        let info = TaskWaiter::with_config(&fake, fast())
            .wait_with_callback(&task, "detach", |_, _| polls += 1)
            .unwrap();

        assert!(info.state.is_completed());
        assert_eq!(polls, 4);
    }

    #[test]
    fn test_wait_reports_task_error() {
        let fake = FakeVim::new();
        let task = fake.start_task(TaskInfo::failed("device is locked"));

        let err = TaskWaiter::with_config(&fake, fast())
            .wait(&task, "detach")
            .unwrap_err();

        match err {
            Error::TaskFailed { message, state, .. } => {
                assert_eq!(message, "device is locked");
                assert_eq!(state, TaskState::Error);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_wait_times_out() {
        let fake = FakeVim::new();
        fake.set_task_polls_before_done(u32::MAX);
        let task = fake.start_task(TaskInfo::success());

        let config = TaskWaitConfig::with_timeout(Duration::from_millis(20))
            .with_poll_interval(Duration::from_millis(5));
        let err = TaskWaiter::with_config(&fake, config)
            .wait(&task, "attach")
            .unwrap_err();

        assert!(matches!(
            err,
            Error::TaskTimeout {
                last_state: TaskState::Running,
                ..
            }
        ));
    }
}
