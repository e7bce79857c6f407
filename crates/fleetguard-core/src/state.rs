//! Desired-state declarations issued by rules to an execution backend

use serde::{Deserialize, Serialize};

/// An idempotent description of a condition a host should be in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DesiredState {
    /// A kernel module is loaded (`present`) or unloaded
    KernelModule { module: String, present: bool },

    /// An exact line exists (`present`) or does not exist in a file
    FileLine {
        path: String,
        line: String,
        present: bool,
    },

    /// A system package is installed (`present`) or removed
    Package { package: String, present: bool },

    /// A read-only audit script whose output is reported; never changes the host
    Audit { name: String, script: String },
}

impl DesiredState {
    pub fn kernel_module_absent(module: impl Into<String>) -> Self {
        DesiredState::KernelModule {
            module: module.into(),
            present: false,
        }
    }

    pub fn kernel_module_present(module: impl Into<String>) -> Self {
        DesiredState::KernelModule {
            module: module.into(),
            present: true,
        }
    }

    pub fn line_present(path: impl Into<String>, line: impl Into<String>) -> Self {
        DesiredState::FileLine {
            path: path.into(),
            line: line.into(),
            present: true,
        }
    }

    pub fn line_absent(path: impl Into<String>, line: impl Into<String>) -> Self {
        DesiredState::FileLine {
            path: path.into(),
            line: line.into(),
            present: false,
        }
    }

    pub fn package_installed(package: impl Into<String>) -> Self {
        DesiredState::Package {
            package: package.into(),
            present: true,
        }
    }

    pub fn package_removed(package: impl Into<String>) -> Self {
        DesiredState::Package {
            package: package.into(),
            present: false,
        }
    }

    pub fn audit(name: impl Into<String>, script: impl Into<String>) -> Self {
        DesiredState::Audit {
            name: name.into(),
            script: script.into(),
        }
    }

    /// Whether applying this declaration can modify the host
    pub fn is_mutating(&self) -> bool {
        !matches!(self, DesiredState::Audit { .. })
    }

    /// Short human-readable description used in reports and logs
    pub fn describe(&self) -> String {
        match self {
            DesiredState::KernelModule { module, present } => {
                format!("kernel module {} {}", module, presence(*present))
            }
            DesiredState::FileLine {
                path,
                line,
                present,
            } => format!("line '{}' {} in {}", line, presence(*present), path),
            DesiredState::Package { package, present } => {
                let state = if *present { "installed" } else { "removed" };
                format!("package {} {}", package, state)
            }
            DesiredState::Audit { name, .. } => format!("audit {}", name),
        }
    }
}

fn presence(present: bool) -> &'static str {
    if present {
        "present"
    } else {
        "absent"
    }
}

impl std::fmt::Display for DesiredState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.describe())
    }
}
