//! Outcomes of applying desired-state declarations to hosts

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-host outcomes of a single backend call, keyed by host name
pub type HostOutcomes = BTreeMap<String, Outcome>;

/// Result of applying one declaration to one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// The backend reached the host and the declaration now holds
    Applied(Applied),
    /// The backend could not apply the declaration on this host
    Failed(Failure),
}

/// Successful application of a declaration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applied {
    /// Whether the host state was (or, when planning, would be) changed
    pub changed: bool,
    /// Commands executed (or planned) on the host
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

/// Backend failure for a single host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

impl Outcome {
    /// The declaration already held; nothing was done
    pub fn unchanged() -> Self {
        Outcome::Applied(Applied::default())
    }

    /// The declaration required the given commands
    pub fn changed(commands: Vec<String>) -> Self {
        Outcome::Applied(Applied {
            changed: true,
            commands,
            ..Applied::default()
        })
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Outcome::Failed(Failure {
            message: message.into(),
            exit_code: None,
            stderr: String::new(),
        })
    }

    pub fn with_output(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        match &mut self {
            Outcome::Applied(applied) => {
                applied.stdout = stdout.into();
                applied.stderr = stderr.into();
            }
            Outcome::Failed(failure) => failure.stderr = stderr.into(),
        }
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        if let Outcome::Failed(failure) = &mut self {
            failure.exit_code = Some(code);
        }
        self
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, Outcome::Applied(Applied { changed: true, .. }))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Failed(failure) => Some(failure),
            Outcome::Applied(_) => None,
        }
    }

    pub fn stdout(&self) -> &str {
        match self {
            Outcome::Applied(applied) => &applied.stdout,
            Outcome::Failed(_) => "",
        }
    }
}

/// One declaration issued to a host during a rule, with its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub declaration: String,
    pub outcome: Outcome,
}

/// Everything a rule did to a single host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostResult {
    pub steps: Vec<Step>,
}

impl HostResult {
    pub fn push(&mut self, declaration: impl Into<String>, outcome: Outcome) {
        self.steps.push(Step {
            declaration: declaration.into(),
            outcome,
        });
    }

    /// Whether any step changed the host
    pub fn changed(&self) -> bool {
        self.steps.iter().any(|s| s.outcome.is_changed())
    }

    /// The first failure recorded for this host, if any
    pub fn failure(&self) -> Option<&Failure> {
        self.steps.iter().find_map(|s| s.outcome.failure())
    }

    pub fn is_failure(&self) -> bool {
        self.failure().is_some()
    }

    /// Captured stdout of all steps, in order
    pub fn stdout(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.outcome.stdout())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
