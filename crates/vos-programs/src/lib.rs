//! vos-programs — sample userland for the vos kernel.
//!
//! Every program here is a hand-written state machine over the syscall
//! surface: it yields requests and consumes their results on resume.
//! `register_builtins` installs the whole set into a kernel so the shell
//! (and hosts) can reach them by name.

pub mod coreutils;
pub mod echo;
pub mod shell;

use serde_json::Value;
use vos_kernel::System;
use vos_kernel_core::PortKey;

pub use coreutils::{Cat, Ls, Netstat, Ps, Rm};
pub use echo::{EchoClient, EchoServer};
pub use shell::{Shell, SHELL_PORT};

/// Port the echo server conventionally listens on.
pub const ECHO_PORT: u64 = 8080;

/// Install every sample program into the kernel's registry.
pub fn register_builtins(system: &mut System) {
    system.register_program(
        "echo-server",
        Box::new(|args| {
            let port = args
                .first()
                .and_then(PortKey::from_value)
                .unwrap_or_else(|| PortKey::from(ECHO_PORT));
            Box::new(EchoServer::new(port))
        }),
    );
    system.register_program(
        "echo-client",
        Box::new(|args| {
            let port = args
                .first()
                .and_then(PortKey::from_value)
                .unwrap_or_else(|| PortKey::from(ECHO_PORT));
            let payload = args.get(1).cloned().unwrap_or(Value::Null);
            Box::new(EchoClient::new(port, payload))
        }),
    );
    system.register_program("shell", Box::new(|_args| Box::new(Shell::new())));
    system.register_program("ps", Box::new(|_args| Box::new(Ps::new())));
    system.register_program("ls", Box::new(|_args| Box::new(Ls::new())));
    system.register_program("netstat", Box::new(|_args| Box::new(Netstat::new())));
    system.register_program(
        "cat",
        Box::new(|args| {
            let path = args.first().and_then(Value::as_str).unwrap_or("");
            Box::new(Cat::new(path))
        }),
    );
    system.register_program(
        "rm",
        Box::new(|args| {
            let path = args.first().and_then(Value::as_str).unwrap_or("");
            Box::new(Rm::new(path))
        }),
    );
}
