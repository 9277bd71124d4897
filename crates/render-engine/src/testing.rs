//! Scripted executor for unit tests.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::executor::{CommandExecutor, ExecError, Stage, ToolCommand};

/// Records every command and writes a plausible output file instead of
/// running anything. Chosen (clip, stage) pairs fail as if retries ran out.
#[derive(Default)]
pub struct ScriptedExecutor {
    failures: HashSet<(String, Stage)>,
    fail_merge: bool,
    calls: Mutex<Vec<ToolCommand>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(mut self, clip_id: &str, stage: Stage) -> Self {
        self.failures.insert((clip_id.to_string(), stage));
        self
    }

    pub fn fail_merge(mut self) -> Self {
        self.fail_merge = true;
        self
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.calls().iter().map(|c| c.stage).collect()
    }

    fn clip_id(command: &ToolCommand) -> Option<String> {
        let name = command.output.as_ref()?.file_name()?.to_str()?;
        name.strip_suffix("_raw.mp4")
            .or_else(|| name.strip_suffix("_vertical.mp4"))
            .map(str::to_string)
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, command: &ToolCommand) -> Result<(), ExecError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.clone());
        }

        let failing = match command.stage {
            Stage::Merge => self.fail_merge,
            stage => Self::clip_id(command)
                .map(|id| self.failures.contains(&(id, stage)))
                .unwrap_or(false),
        };
        if failing {
            return Err(ExecError::Exhausted {
                tool: command.program.clone(),
                stage: command.stage,
                attempts: 3,
                status: "exit status: 1".to_string(),
                stderr_tail: "scripted failure".to_string(),
            });
        }

        if let Some(output) = &command.output {
            std::fs::write(output, vec![0u8; 4096]).map_err(|e| ExecError::Launch {
                tool: command.program.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }
}
