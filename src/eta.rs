//! Travel-time estimation seam. The real estimator (a traffic API call) is
//! out of scope; callers program against `EtaProvider` and the binary ships a
//! fixed-value provider and a subprocess provider as concrete sources.

use std::process::Command;

use thiserror::Error;

/// Opaque estimation failure. Retry policy belongs to the worker loop, never
/// to the provider itself.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EtaError(String);

impl EtaError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub trait EtaProvider: Send {
    /// Current door-to-door travel duration in whole seconds.
    fn estimate_travel_seconds(&self, origin: &str, destination: &str) -> Result<u32, EtaError>;
}

/// Constant travel time, for dry runs and tests.
pub struct FixedEtaProvider {
    eta_seconds: u32,
}

impl FixedEtaProvider {
    pub fn new(eta_seconds: u32) -> Self {
        Self { eta_seconds }
    }
}

impl EtaProvider for FixedEtaProvider {
    fn estimate_travel_seconds(&self, _origin: &str, _destination: &str) -> Result<u32, EtaError> {
        Ok(self.eta_seconds)
    }
}

/// Runs an external command as `PROGRAM <origin> <destination>` and parses a
/// whole-seconds integer from its stdout.
pub struct CommandEtaProvider {
    program: String,
}

impl CommandEtaProvider {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl EtaProvider for CommandEtaProvider {
    fn estimate_travel_seconds(&self, origin: &str, destination: &str) -> Result<u32, EtaError> {
        let output = Command::new(&self.program)
            .arg(origin)
            .arg(destination)
            .output()
            .map_err(|err| EtaError::new(format!("failed to run '{}': {err}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EtaError::new(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = stdout.trim();
        text.parse::<u32>().map_err(|_| {
            EtaError::new(format!(
                "'{}' printed '{text}', expected whole travel seconds",
                self.program
            ))
        })
    }
}
