//! Transports - run a shell script on a host and capture its output

use fleetguard_core::{Error, Host, Result};
use std::process::Command;
use tracing::trace;

/// Exit status ssh uses for its own errors
const SSH_FAILURE_EXIT: i32 = 255;

/// Captured result of a script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    fn from_process(output: std::process::Output) -> Self {
        Self {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Runs a POSIX shell script on a host.
///
/// `Err` means the host could not be reached or the script could not be
/// started; a script that ran and failed is an `Ok` with a non-zero exit code.
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, host: &Host, script: &str) -> Result<CommandOutput>;
}

/// Runs scripts on the machine FleetGuard runs on
#[derive(Debug, Clone, Default)]
pub struct LocalTransport;

impl Transport for LocalTransport {
    fn name(&self) -> &str {
        "local"
    }

    fn run(&self, host: &Host, script: &str) -> Result<CommandOutput> {
        trace!(host = %host.name, "sh -c {}", script);
        let output = Command::new("sh")
            .arg("-c")
            .arg(script)
            .output()
            .map_err(|e| Error::Backend {
                host: host.name.clone(),
                message: format!("failed to start sh: {}", e),
            })?;
        Ok(CommandOutput::from_process(output))
    }
}

/// Runs scripts on remote hosts through the `ssh` client.
///
/// Per-host inventory data overrides the defaults: `ssh_hostname`,
/// `ssh_user` and `ssh_port`.
#[derive(Debug, Clone)]
pub struct SshTransport {
    binary: String,
    user: Option<String>,
    connect_timeout: u64,
}

impl SshTransport {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            user: None,
            connect_timeout: 10,
        }
    }

    /// Default login user for hosts without `ssh_user`
    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    pub fn with_connect_timeout(mut self, seconds: u64) -> Self {
        self.connect_timeout = seconds;
        self
    }

    /// Arguments passed to the ssh binary for a script on a host.
    ///
    /// Destination, user and port come from inventory data and are rejected
    /// when ssh could read them as options.
    pub fn args(&self, host: &Host, script: &str) -> Result<Vec<String>> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout),
        ];

        if let Some(port) = host.data_str("ssh_port") {
            if port.parse::<u16>().map_or(true, |p| p == 0) {
                return Err(invalid_target(host, "ssh_port", &port));
            }
            args.push("-p".to_string());
            args.push(port);
        }
        if let Some(user) = host.data_str("ssh_user").or_else(|| self.user.clone()) {
            check_argument(host, "ssh_user", &user)?;
            args.push("-l".to_string());
            args.push(user);
        }

        let destination = host
            .data_str("ssh_hostname")
            .unwrap_or_else(|| host.name.clone());
        check_argument(host, "ssh_hostname", &destination)?;
        args.push(destination);
        args.push("--".to_string());
        args.push(format!("sh -c {}", shell_quote(script)));
        Ok(args)
    }
}

fn check_argument(host: &Host, key: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.starts_with('-') || value.chars().any(char::is_whitespace) {
        return Err(invalid_target(host, key, value));
    }
    Ok(())
}

fn invalid_target(host: &Host, key: &str, value: &str) -> Error {
    Error::Backend {
        host: host.name.clone(),
        message: format!("invalid {} '{}'", key, value),
    }
}

impl Transport for SshTransport {
    fn name(&self) -> &str {
        "ssh"
    }

    fn run(&self, host: &Host, script: &str) -> Result<CommandOutput> {
        let args = self.args(host, script)?;
        trace!(host = %host.name, "{} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .map_err(|e| Error::Backend {
                host: host.name.clone(),
                message: format!("failed to start {}: {}", self.binary, e),
            })?;
        let output = CommandOutput::from_process(output);

        if output.exit_code == Some(SSH_FAILURE_EXIT) {
            return Err(Error::Backend {
                host: host.name.clone(),
                message: format!("ssh connection failed: {}", output.stderr.trim()),
            });
        }
        Ok(output)
    }
}

/// Sends `@local` to a local transport and every other host over ssh
pub struct HostRouter {
    local: LocalTransport,
    remote: SshTransport,
}

impl HostRouter {
    pub fn new(remote: SshTransport) -> Self {
        Self {
            local: LocalTransport,
            remote,
        }
    }
}

impl Transport for HostRouter {
    fn name(&self) -> &str {
        "router"
    }

    fn run(&self, host: &Host, script: &str) -> Result<CommandOutput> {
        if host.is_local() {
            self.local.run(host, script)
        } else {
            self.remote.run(host, script)
        }
    }
}

/// Quote a string for a POSIX shell
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("blacklist hfs"), "'blacklist hfs'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_ssh_args_defaults() {
        let ssh = SshTransport::new("ssh").with_connect_timeout(5);
        let args = ssh.args(&Host::new("web-01"), "lsmod").unwrap();
        assert_eq!(
            args,
            vec![
                "-o",
                "BatchMode=yes",
                "-o",
                "ConnectTimeout=5",
                "web-01",
                "--",
                "sh -c 'lsmod'"
            ]
        );
    }

    #[test]
    fn test_ssh_args_from_host_data() {
        let ssh = SshTransport::new("ssh").with_user(Some("deploy".to_string()));
        let host = Host::new("web-01")
            .with_data("ssh_hostname", "10.0.0.5")
            .with_data("ssh_port", 2222)
            .with_data("ssh_user", "admin");
        let args = ssh.args(&host, "true").unwrap();

        assert!(args.windows(2).any(|w| w == ["-p", "2222"]));
        assert!(args.windows(2).any(|w| w == ["-l", "admin"]));
        assert!(args.contains(&"10.0.0.5".to_string()));
        assert!(!args.contains(&"web-01".to_string()));
    }

    #[test]
    fn test_ssh_default_user() {
        let ssh = SshTransport::new("ssh").with_user(Some("deploy".to_string()));
        let args = ssh.args(&Host::new("db-01"), "true").unwrap();
        assert!(args.windows(2).any(|w| w == ["-l", "deploy"]));
    }

    #[test]
    fn test_ssh_rejects_option_like_targets() {
        let ssh = SshTransport::new("ssh");
        for (key, value) in [
            ("ssh_hostname", "-oProxyCommand=touch /tmp/x"),
            ("ssh_hostname", "web 01"),
            ("ssh_user", "-oLocalCommand=id"),
            ("ssh_port", "22 -v"),
            ("ssh_port", "-1"),
            ("ssh_port", "ssh"),
        ] {
            let host = Host::new("web-01").with_data(key, value);
            let err = ssh.args(&host, "true").unwrap_err();
            assert!(
                err.to_string().contains(key),
                "{} = {:?} was accepted",
                key,
                value
            );
        }

        let err = ssh.args(&Host::new("-oProxyJump=evil"), "true").unwrap_err();
        assert!(matches!(err, Error::Backend { .. }));
    }

    #[test]
    fn test_ssh_invalid_target_is_host_failure() {
        let ssh = SshTransport::new("/nonexistent/ssh");
        let host = Host::new("web-01").with_data("ssh_hostname", "-oProxyCommand=id");
        let err = ssh.run(&host, "true").unwrap_err();
        assert_eq!(
            err.to_string(),
            Error::Backend {
                host: "web-01".to_string(),
                message: "invalid ssh_hostname '-oProxyCommand=id'".to_string(),
            }
            .to_string()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_local_transport_captures_output() {
        let output = LocalTransport
            .run(&Host::local(), "echo out; echo err >&2; exit 3")
            .unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert!(!output.success());
    }
}
