//! External-program segmentation corrector.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{CorrectionInputs, CorrectionStatus, SegmentationCorrector};
use crate::error::CorrectionError;

/// Runs `<program> [script] <lung> <airway> <summary> <tree>` per subject.
#[derive(Debug, Clone)]
pub struct ProcessCorrector {
    program: String,
    script: Option<PathBuf>,
    timeout: Duration,
}

impl ProcessCorrector {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            script: None,
            timeout: Duration::from_secs(600),
        }
    }

    /// Passes `script` as the first argument, e.g. for interpreters.
    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, inputs: &CorrectionInputs) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(script) = &self.script {
            cmd.arg(script);
        }
        cmd.args(inputs.ordered_paths())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for ProcessCorrector {
    fn default() -> Self {
        Self::new("python3").with_script("./flag_potential_seg_errors.py")
    }
}

#[async_trait]
impl SegmentationCorrector for ProcessCorrector {
    async fn correct(&self, inputs: &CorrectionInputs) -> Result<CorrectionStatus, CorrectionError> {
        let child = self
            .command(inputs)
            .spawn()
            .map_err(|source| CorrectionError::SpawnFailed {
                program: self.program.clone(),
                source,
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CorrectionError::Timeout(self.timeout))??;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        for line in stdout.lines() {
            debug!(subject = %inputs.subject_id, "[correction stdout] {}", line);
        }

        if !output.status.success() {
            return Err(CorrectionError::NonZeroExit {
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(CorrectionStatus {
            exit_code: output.status.code(),
            output: stdout,
        })
    }
}
