//! The syscall surface.
//!
//! Userland routines do not call into the kernel; they *yield* one of
//! these requests and are resumed with its result. The dispatcher in
//! `step` is a total function over this sum type.

use serde_json::Value;

use crate::types::{Pid, PortKey};

/// Snapshot kinds for the `Kinfo` syscall.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InfoKind {
    /// Process table
    Ps,
    /// Ports table
    Ports,
    /// File listing
    Vfs,
}

/// A syscall request yielded by a routine.
///
/// File descriptors travel as `i64` so that userland can hand the kernel
/// a nonsense descriptor and get the documented sentinel back instead of
/// failing to construct the request. The `mode` of `Open` is the raw
/// userland string for the same reason.
#[derive(Clone, Debug, PartialEq)]
pub enum Syscall {
    /// Block for `ms` of logical time
    Sleep { ms: u64 },
    /// Append to the kernel log
    Log { message: String },
    /// The caller's own pid
    GetPid,
    /// Direct message to another process's mailbox
    Send { to: Pid, message: Value },
    /// Receive from the caller's mailbox, optionally from one sender
    Recv { from: Option<Pid> },
    /// Open a file (`mode` is `r`, `w`, or `a`)
    Open { path: String, mode: String },
    /// Read up to `count` characters from a descriptor (to end if unset)
    Read { fd: i64, count: Option<u64> },
    /// Write at the descriptor's position (fds 1/2 go to the host)
    Write { fd: i64, data: String },
    /// Close a descriptor
    Close { fd: i64 },
    /// Replace the caller's routine with a registered program
    Exec { program: String, args: Vec<Value> },
    /// Terminate with an exit code
    Exit { code: i64 },
    /// Set a key in the caller's heap
    HeapSet { key: String, value: Value },
    /// Get a key from the caller's heap
    HeapGet { key: String },
    /// Claim a port
    Listen { port: PortKey },
    /// Release an owned port
    Unlisten { port: PortKey },
    /// Enqueue a payload on a port
    SendPort { port: PortKey, payload: Value },
    /// Receive from an owned port, with an optional timeout
    RecvPort {
        port: PortKey,
        timeout_ms: Option<u64>,
    },
    /// Spawn a registered program as a new process
    Spawn {
        program: String,
        args: Vec<Value>,
        priority: i64,
    },
    /// Kernel snapshot by kind
    Kinfo { kind: InfoKind },
    /// File listing (path, size, preview)
    ListFiles,
    /// Whole-file read without a descriptor
    ReadFile { path: String },
    /// Whole-file truncate-write without a descriptor
    WriteFile { path: String, text: String },
    /// Remove a file
    Unlink { path: String },
    /// Ports table snapshot
    ListPorts,
    /// Force-terminate a process
    Kill { target: Pid, signal: Option<String> },
    /// Cooperative no-op: give up the rest of the tick
    Yield,
}

impl Syscall {
    /// The wire tag of this request, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Syscall::Sleep { .. } => "SLEEP",
            Syscall::Log { .. } => "LOG",
            Syscall::GetPid => "GETPID",
            Syscall::Send { .. } => "SEND",
            Syscall::Recv { .. } => "RECV",
            Syscall::Open { .. } => "OPEN",
            Syscall::Read { .. } => "READ",
            Syscall::Write { .. } => "WRITE",
            Syscall::Close { .. } => "CLOSE",
            Syscall::Exec { .. } => "EXEC",
            Syscall::Exit { .. } => "EXIT",
            Syscall::HeapSet { .. } => "HEAP_SET",
            Syscall::HeapGet { .. } => "HEAP_GET",
            Syscall::Listen { .. } => "LISTEN",
            Syscall::Unlisten { .. } => "UNLISTEN",
            Syscall::SendPort { .. } => "SEND_PORT",
            Syscall::RecvPort { .. } => "RECV_PORT",
            Syscall::Spawn { .. } => "SPAWN",
            Syscall::Kinfo { .. } => "KINFO",
            Syscall::ListFiles => "LIST_FILES",
            Syscall::ReadFile { .. } => "READ_FILE",
            Syscall::WriteFile { .. } => "WRITE_FILE",
            Syscall::Unlink { .. } => "UNLINK",
            Syscall::ListPorts => "LIST_PORTS",
            Syscall::Kill { .. } => "KILL",
            Syscall::Yield => "YIELD",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syscall_names() {
        assert_eq!(Syscall::GetPid.name(), "GETPID");
        assert_eq!(
            Syscall::RecvPort {
                port: PortKey::from(8080u64),
                timeout_ms: None
            }
            .name(),
            "RECV_PORT"
        );
        assert_eq!(
            Syscall::HeapSet {
                key: String::from("k"),
                value: Value::Null
            }
            .name(),
            "HEAP_SET"
        );
    }
}
