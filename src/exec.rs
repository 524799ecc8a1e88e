//! External tool execution.
//!
//! ffprobe and the face detection command run through [`CommandExecutor`],
//! so the adapters built on them are testable without the tools installed.

use crate::error::{FacetrailError, Result};
use std::process::Command;

/// Trait for executing system commands.
///
/// Object-safe, Send + Sync for use in concurrent contexts.
pub trait CommandExecutor: Send + Sync {
    /// Execute a command with arguments.
    ///
    /// Returns the stdout of the command on success.
    /// Returns an error if the command fails or is not found.
    fn execute(&self, command: &str, args: &[&str]) -> Result<String>;
}

/// Production command executor using std::process::Command.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, command: &str, args: &[&str]) -> Result<String> {
        let output = Command::new(command)
            .args(args)
            .output()
            .map_err(|e| spawn_error(command, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FacetrailError::ToolFailed {
                tool: command.to_string(),
                message: format!("exited with {}: {}", output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Map a failure to start a process onto the tool error variants.
pub(crate) fn spawn_error(command: &str, e: std::io::Error) -> FacetrailError {
    if e.kind() == std::io::ErrorKind::NotFound {
        FacetrailError::ToolNotFound {
            tool: command.to_string(),
        }
    } else {
        FacetrailError::ToolFailed {
            tool: command.to_string(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Records all command executions and returns queued responses.
    #[derive(Debug, Default)]
    pub struct MockCommandExecutor {
        calls: Mutex<Vec<(String, Vec<String>)>>,
        responses: Mutex<VecDeque<Result<String>>>,
    }

    impl MockCommandExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_response(self, response: &str) -> Self {
            self.responses
                .lock()
                .unwrap()
                .push_back(Ok(response.to_string()));
            self
        }

        pub fn with_error(self, error: FacetrailError) -> Self {
            self.responses.lock().unwrap().push_back(Err(error));
            self
        }

        pub fn calls(&self) -> Vec<(String, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandExecutor for MockCommandExecutor {
        fn execute(&self, command: &str, args: &[&str]) -> Result<String> {
            self.calls.lock().unwrap().push((
                command.to_string(),
                args.iter().map(|s| s.to_string()).collect(),
            ));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_executor_reports_missing_tool() {
        let executor = SystemCommandExecutor::new();
        let result = executor.execute("facetrail-definitely-not-a-tool", &[]);
        match result {
            Err(FacetrailError::ToolNotFound { tool }) => {
                assert_eq!(tool, "facetrail-definitely-not-a-tool")
            }
            other => panic!("Expected ToolNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_mock_executor_records_calls() {
        let executor = mock::MockCommandExecutor::new().with_response("ok");
        assert_eq!(executor.execute("tool", &["a", "b"]).unwrap(), "ok");
        assert_eq!(
            executor.calls(),
            vec![(
                "tool".to_string(),
                vec!["a".to_string(), "b".to_string()]
            )]
        );
    }
}
