//! Shell execution backend - turns declarations into probe and change scripts

use super::transport::{shell_quote, CommandOutput, Transport};
use fleetguard_core::{
    Applied, DesiredState, Error, ExecutionBackend, Host, HostOutcomes, HostSet, Outcome, Result,
};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Tuning for [`ShellBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOptions {
    /// Hosts handled concurrently per declaration
    pub max_parallel: usize,
    /// Wrap change commands in `sudo -n`
    pub sudo: bool,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            max_parallel: 8,
            sudo: false,
        }
    }
}

/// What a declaration runs on a host.
///
/// The probe exits 0 when the declaration already holds. Declarations without
/// a probe always run their command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub probe: Option<String>,
    pub command: String,
    /// Whether `command` modifies the host
    pub mutating: bool,
}

/// Execution backend that drives hosts with POSIX shell scripts
pub struct ShellBackend {
    transport: Box<dyn Transport>,
    options: ShellOptions,
    pool: ThreadPool,
}

impl ShellBackend {
    /// Create a backend with a worker pool of `options.max_parallel` threads
    pub fn new(transport: Box<dyn Transport>, options: ShellOptions) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.max_parallel.max(1))
            .thread_name(|i| format!("fleetguard-host-{}", i))
            .build()
            .map_err(|e| Error::Internal(format!("failed to start host worker pool: {}", e)))?;
        Ok(Self {
            transport,
            options,
            pool,
        })
    }

    /// Build the scripts for a declaration, rejecting values that are unsafe
    /// to place in a shell command
    pub fn script(declaration: &DesiredState) -> Result<Script> {
        match declaration {
            DesiredState::KernelModule { module, present } => {
                check_identifier("kernel module", module, module_pattern()?)?;
                let loaded = format!(
                    "lsmod | awk 'NR > 1 {{print $1}}' | grep -qx {}",
                    shell_quote(&module.replace('-', "_"))
                );
                let module = shell_quote(module);
                Ok(if *present {
                    Script {
                        probe: Some(loaded),
                        command: format!("modprobe {}", module),
                        mutating: true,
                    }
                } else {
                    Script {
                        probe: Some(format!("! {}", loaded)),
                        command: format!("modprobe -r {}", module),
                        mutating: true,
                    }
                })
            }
            DesiredState::FileLine {
                path,
                line,
                present,
            } => {
                check_path(path)?;
                if line.contains('\n') || line.contains('\0') {
                    return Err(Error::InvalidDeclaration(format!(
                        "line for {} must be a single line",
                        path
                    )));
                }
                let (quoted_path, quoted_line) = (shell_quote(path), shell_quote(line));
                let contains = format!("grep -qxF -- {} {}", quoted_line, quoted_path);
                Ok(if *present {
                    Script {
                        probe: Some(contains),
                        command: format!(
                            "mkdir -p \"$(dirname {p})\" && printf '%s\\n' {l} >> {p}",
                            p = quoted_path,
                            l = quoted_line
                        ),
                        mutating: true,
                    }
                } else {
                    let tmp = shell_quote(&format!("{}.fleetguard", path));
                    Script {
                        probe: Some(format!("! {}", contains)),
                        command: format!(
                            "{{ grep -vxF -- {l} {p} || true; }} > {t} && cat {t} > {p} && rm -f {t}",
                            l = quoted_line,
                            p = quoted_path,
                            t = tmp
                        ),
                        mutating: true,
                    }
                })
            }
            DesiredState::Package { package, present } => {
                check_identifier("package", package, package_pattern()?)?;
                let installed = format!(
                    "dpkg-query -W -f='${{Status}}' {} 2>/dev/null | grep -q 'install ok installed'",
                    shell_quote(package)
                );
                Ok(if *present {
                    Script {
                        probe: Some(installed),
                        command: format!(
                            "{} && DEBIAN_FRONTEND=noninteractive apt-get install -y {}",
                            APT_REFRESH, package
                        ),
                        mutating: true,
                    }
                } else {
                    Script {
                        probe: Some(format!("! {}", installed)),
                        command: format!(
                            "DEBIAN_FRONTEND=noninteractive apt-get remove -y {}",
                            package
                        ),
                        mutating: true,
                    }
                })
            }
            DesiredState::Audit { script, .. } => Ok(Script {
                probe: None,
                command: script.clone(),
                mutating: false,
            }),
        }
    }

    fn wrap(&self, script: &Script) -> String {
        if self.options.sudo && script.mutating {
            format!("sudo -n sh -c {}", shell_quote(&script.command))
        } else {
            script.command.clone()
        }
    }

    /// Run the probe; `Ok(true)` when the declaration already holds
    fn probe(&self, host: &Host, script: &Script) -> std::result::Result<bool, Outcome> {
        match &script.probe {
            None => Ok(false),
            Some(probe) => match self.transport.run(host, probe) {
                Ok(output) => Ok(output.success()),
                Err(e) => Err(Outcome::failed(e.to_string())),
            },
        }
    }

    fn apply_host(&self, host: &Host, script: &Script) -> Outcome {
        match self.probe(host, script) {
            Err(failure) => return failure,
            Ok(true) => return Outcome::unchanged(),
            Ok(false) => {}
        }

        let command = self.wrap(script);
        match self.transport.run(host, &command) {
            Err(e) => Outcome::failed(e.to_string()),
            Ok(output) if output.success() => Outcome::Applied(Applied {
                changed: script.mutating,
                commands: vec![command],
                stdout: output.stdout,
                stderr: output.stderr,
            }),
            Ok(output) => command_failed(output),
        }
    }

    fn plan_host(&self, host: &Host, script: &Script) -> Outcome {
        if !script.mutating {
            return Outcome::Applied(Applied {
                changed: false,
                commands: vec![script.command.clone()],
                ..Applied::default()
            });
        }

        match self.probe(host, script) {
            Err(failure) => failure,
            Ok(true) => Outcome::unchanged(),
            Ok(false) => Outcome::changed(vec![self.wrap(script)]),
        }
    }

    /// Run `work` for every host, at most `max_parallel` at a time.
    ///
    /// Each host is its own pool task, so a slow host only holds its own slot.
    fn fan_out<F>(&self, hosts: &HostSet, work: F) -> HostOutcomes
    where
        F: Fn(&Host) -> Outcome + Sync,
    {
        let hosts: Vec<&Host> = hosts.iter().collect();
        self.pool.install(|| {
            hosts
                .par_iter()
                .with_max_len(1)
                .map(|&host| (host.name.clone(), work(host)))
                .collect()
        })
    }
}

impl ExecutionBackend for ShellBackend {
    fn name(&self) -> &str {
        "shell"
    }

    fn apply(&self, hosts: &HostSet, declaration: &DesiredState) -> Result<HostOutcomes> {
        let script = Self::script(declaration)?;
        debug!(
            transport = self.transport.name(),
            "Applying '{}' to {} hosts",
            declaration,
            hosts.len()
        );
        Ok(self.fan_out(hosts, |host| self.apply_host(host, &script)))
    }

    fn plan(&self, hosts: &HostSet, declaration: &DesiredState) -> Result<HostOutcomes> {
        let script = Self::script(declaration)?;
        debug!(
            transport = self.transport.name(),
            "Planning '{}' on {} hosts",
            declaration,
            hosts.len()
        );
        Ok(self.fan_out(hosts, |host| self.plan_host(host, &script)))
    }
}

fn command_failed(output: CommandOutput) -> Outcome {
    let message = match output.exit_code {
        Some(code) => format!("command exited with status {}", code),
        None => String::from("command terminated by signal"),
    };
    let outcome = Outcome::failed(message).with_output(output.stdout, output.stderr);
    match output.exit_code {
        Some(code) => outcome.with_exit_code(code),
        None => outcome,
    }
}

/// Refresh the apt cache when it is older than an hour
const APT_REFRESH: &str = "if [ -z \"$(find /var/lib/apt/lists -maxdepth 0 -mmin -60 2>/dev/null)\" ]; \
then DEBIAN_FRONTEND=noninteractive apt-get update -q; fi";

type Pattern = std::result::Result<Regex, regex::Error>;

fn compiled(pattern: &'static Pattern) -> Result<&'static Regex> {
    pattern
        .as_ref()
        .map_err(|e| Error::Internal(format!("invalid identifier pattern: {}", e)))
}

fn module_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<Pattern> = OnceLock::new();
    compiled(PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$")))
}

fn package_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<Pattern> = OnceLock::new();
    compiled(PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9+.-]*$")))
}

fn check_identifier(kind: &str, value: &str, pattern: &Regex) -> Result<()> {
    if pattern.is_match(value) {
        Ok(())
    } else {
        Err(Error::InvalidDeclaration(format!(
            "invalid {} name '{}'",
            kind, value
        )))
    }
}

fn check_path(path: &str) -> Result<()> {
    if !path.starts_with('/') || path.contains('\n') || path.contains('\0') {
        return Err(Error::InvalidDeclaration(format!(
            "file path must be absolute: '{}'",
            path
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Answers scripts with a closure and records every call
    struct FakeTransport<F> {
        respond: F,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl<F> FakeTransport<F>
    where
        F: Fn(&Host, &str) -> Result<CommandOutput> + Send + Sync,
    {
        fn new(respond: F) -> Self {
            Self {
                respond,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl<F> Transport for FakeTransport<F>
    where
        F: Fn(&Host, &str) -> Result<CommandOutput> + Send + Sync,
    {
        fn name(&self) -> &str {
            "fake"
        }

        fn run(&self, host: &Host, script: &str) -> Result<CommandOutput> {
            self.calls
                .lock()
                .unwrap()
                .push((host.name.clone(), script.to_string()));
            (self.respond)(host, script)
        }
    }

    /// Shares one fake between the backend and the test
    struct Shared<T>(std::sync::Arc<T>);

    impl<T: Transport> Transport for Shared<T> {
        fn name(&self) -> &str {
            self.0.name()
        }

        fn run(&self, host: &Host, script: &str) -> Result<CommandOutput> {
            self.0.run(host, script)
        }
    }

    fn exit(code: i32) -> Result<CommandOutput> {
        Ok(CommandOutput {
            exit_code: Some(code),
            ..CommandOutput::default()
        })
    }

    fn backend<T: Transport + 'static>(
        transport: &std::sync::Arc<T>,
        options: ShellOptions,
    ) -> ShellBackend {
        ShellBackend::new(Box::new(Shared(std::sync::Arc::clone(transport))), options).unwrap()
    }

    fn hosts() -> HostSet {
        vec![Host::new("h1"), Host::new("h2")].into_iter().collect()
    }

    fn is_probe(script: &str) -> bool {
        ["! ", "grep -q", "lsmod", "dpkg-query"]
            .iter()
            .any(|prefix| script.starts_with(prefix))
    }

    #[test]
    fn test_satisfied_probe_skips_change() {
        let transport = std::sync::Arc::new(FakeTransport::new(|_: &Host, _: &str| exit(0)));
        let backend = backend(&transport, ShellOptions::default());

        let outcomes = backend
            .apply(&hosts(), &DesiredState::kernel_module_absent("cramfs"))
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.values().all(|o| *o == Outcome::unchanged()));
        assert_eq!(transport.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_unsatisfied_probe_runs_change() {
        let transport = std::sync::Arc::new(FakeTransport::new(|_: &Host, script: &str| {
            if is_probe(script) {
                exit(1)
            } else {
                exit(0)
            }
        }));
        let backend = backend(&transport, ShellOptions::default());

        let outcomes = backend
            .apply(&hosts(), &DesiredState::kernel_module_absent("cramfs"))
            .unwrap();

        match &outcomes["h1"] {
            Outcome::Applied(applied) => {
                assert!(applied.changed);
                assert_eq!(applied.commands, vec!["modprobe -r 'cramfs'"]);
            }
            other => panic!("expected applied, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_change_reports_exit_code() {
        let transport = std::sync::Arc::new(FakeTransport::new(|_: &Host, script: &str| {
            if is_probe(script) {
                exit(1)
            } else {
                Ok(CommandOutput {
                    exit_code: Some(1),
                    stdout: String::new(),
                    stderr: "Permission denied".to_string(),
                })
            }
        }));
        let backend = backend(&transport, ShellOptions::default());

        let outcomes = backend
            .apply(
                &hosts(),
                &DesiredState::line_present("/etc/modprobe.d/cis.conf", "blacklist hfs"),
            )
            .unwrap();

        let failure = outcomes["h2"].failure().unwrap();
        assert_eq!(failure.exit_code, Some(1));
        assert_eq!(failure.stderr, "Permission denied");
    }

    #[test]
    fn test_unreachable_host_fails_alone() {
        let transport = std::sync::Arc::new(FakeTransport::new(|host: &Host, _: &str| {
            if host.name == "h2" {
                Err(Error::Backend {
                    host: host.name.clone(),
                    message: "ssh connection failed".to_string(),
                })
            } else {
                exit(0)
            }
        }));
        let backend = backend(&transport, ShellOptions::default());

        let outcomes = backend
            .apply(&hosts(), &DesiredState::package_installed("unzip"))
            .unwrap();

        assert!(!outcomes["h1"].is_failure());
        assert!(outcomes["h2"]
            .failure()
            .unwrap()
            .message
            .contains("ssh connection failed"));
    }

    #[test]
    fn test_plan_never_runs_changes() {
        let transport = std::sync::Arc::new(FakeTransport::new(|_: &Host, _: &str| exit(1)));
        let backend = backend(&transport, ShellOptions::default());

        let outcomes = backend
            .plan(&hosts(), &DesiredState::kernel_module_absent("udf"))
            .unwrap();

        assert!(outcomes.values().all(Outcome::is_changed));
        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(_, script)| is_probe(script)));
    }

    #[test]
    fn test_audit_captures_output_and_is_not_run_when_planning() {
        let transport = std::sync::Arc::new(FakeTransport::new(|_: &Host, _: &str| {
            Ok(CommandOutput {
                exit_code: Some(0),
                stdout: "cramfs: not disabled\n".to_string(),
                stderr: String::new(),
            })
        }));
        let backend = backend(&transport, ShellOptions::default());
        let audit = DesiredState::audit("unused filesystems", "echo audit");

        let planned = backend.plan(&hosts(), &audit).unwrap();
        assert!(!planned["h1"].is_changed());
        assert!(transport.calls.lock().unwrap().is_empty());

        let applied = backend.apply(&hosts(), &audit).unwrap();
        assert!(!applied["h1"].is_changed());
        assert_eq!(applied["h1"].stdout(), "cramfs: not disabled\n");
    }

    #[test]
    fn test_sudo_wraps_changes_only() {
        let transport = std::sync::Arc::new(FakeTransport::new(|_: &Host, script: &str| {
            if is_probe(script) {
                exit(1)
            } else {
                exit(0)
            }
        }));
        let backend = backend(
            &transport,
            ShellOptions {
                max_parallel: 1,
                sudo: true,
            },
        );

        backend
            .apply(&HostSet::local(), &DesiredState::kernel_module_absent("hfs"))
            .unwrap();

        let calls = transport.calls.lock().unwrap();
        assert!(!calls[0].1.starts_with("sudo"));
        assert_eq!(calls[1].1, "sudo -n sh -c 'modprobe -r '\\''hfs'\\'''");
    }

    #[test]
    fn test_rejects_unsafe_values() {
        for declaration in [
            DesiredState::kernel_module_absent("cramfs; rm -rf /"),
            DesiredState::package_installed("Bad Package"),
            DesiredState::line_present("relative/path", "x"),
            DesiredState::line_present("/etc/x", "two\nlines"),
        ] {
            assert!(matches!(
                ShellBackend::script(&declaration),
                Err(Error::InvalidDeclaration(_))
            ));
        }
    }

    #[test]
    fn test_module_probe_uses_lsmod_name() {
        let script = ShellBackend::script(&DesiredState::kernel_module_absent("usb-storage"))
            .unwrap();
        assert!(script.probe.unwrap().contains("'usb_storage'"));
        assert_eq!(script.command, "modprobe -r 'usb-storage'");
    }

    #[test]
    fn test_parallelism_bound_covers_all_hosts() {
        let transport = std::sync::Arc::new(FakeTransport::new(|_: &Host, _: &str| exit(0)));
        let backend = backend(
            &transport,
            ShellOptions {
                max_parallel: 2,
                sudo: false,
            },
        );
        let hosts: HostSet = (0..5).map(|i| Host::new(format!("h{}", i))).collect();

        let outcomes = backend
            .apply(&hosts, &DesiredState::kernel_module_absent("jffs2"))
            .unwrap();
        assert_eq!(outcomes.len(), 5);
    }

    #[test]
    fn test_slow_host_does_not_delay_others() {
        let started = std::time::Instant::now();
        let transport = std::sync::Arc::new(FakeTransport::new(
            move |host: &Host, _: &str| {
                if host.name == "h0" {
                    std::thread::sleep(std::time::Duration::from_millis(600));
                }
                Ok(CommandOutput {
                    exit_code: Some(0),
                    stdout: started.elapsed().as_millis().to_string(),
                    stderr: String::new(),
                })
            },
        ));
        let backend = backend(
            &transport,
            ShellOptions {
                max_parallel: 2,
                sudo: false,
            },
        );
        let hosts: HostSet = (0..3).map(|i| Host::new(format!("h{}", i))).collect();
        let audit = DesiredState::audit("timing", "true");

        let outcomes = backend.apply(&hosts, &audit).unwrap();

        let finished_at = |name: &str| outcomes[name].stdout().parse::<u128>().unwrap();
        assert!(finished_at("h0") >= 600);
        assert!(finished_at("h1") < 300);
        assert!(finished_at("h2") < 300);
    }

    #[test]
    fn test_package_install_refreshes_stale_apt_cache() {
        let script = ShellBackend::script(&DesiredState::package_installed("aide")).unwrap();
        assert!(script.command.contains("-mmin -60"));
        assert!(script.command.contains("apt-get update"));
        assert!(script.command.ends_with("apt-get install -y aide"));

        let removal = ShellBackend::script(&DesiredState::package_removed("telnet")).unwrap();
        assert!(!removal.command.contains("apt-get update"));
    }

    #[test]
    fn test_zero_parallelism_still_runs() {
        let transport = std::sync::Arc::new(FakeTransport::new(|_: &Host, _: &str| exit(0)));
        let backend = backend(
            &transport,
            ShellOptions {
                max_parallel: 0,
                sudo: false,
            },
        );

        let outcomes = backend
            .apply(&hosts(), &DesiredState::kernel_module_absent("hfs"))
            .unwrap();
        assert_eq!(outcomes.len(), 2);
    }
}
