//! Shipped execution backend: shell scripts over a local or ssh transport

pub mod shell;
pub mod transport;

pub use shell::{Script, ShellBackend, ShellOptions};
pub use transport::{CommandOutput, HostRouter, LocalTransport, SshTransport, Transport};
