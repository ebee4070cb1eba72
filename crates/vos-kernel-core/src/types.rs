//! Core kernel types.
//!
//! All types here are pure data. The routine objects that drive
//! processes live in the runtime crate; the process control block keeps
//! everything else.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Process identifier. Unique and strictly increasing over a kernel
/// lifetime; never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pid(pub u64);

impl Pid {
    /// Reserved pid for kernel-originated log entries.
    pub const KERNEL: Pid = Pid(0);
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProcessState {
    /// Runnable, waiting for selection
    Ready,
    /// Being resumed inside the current dispatch step
    Running,
    /// Waiting on time, a mailbox, or a port
    Blocked,
    /// Finished; removed by an explicit reap
    Terminated,
}

/// Why a blocked process is waiting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// Sleeping until `wake_time`
    Sleep,
    /// Waiting for a mailbox message (optionally from one sender)
    RecvMailbox,
    /// Waiting for a message on an owned port
    RecvPort,
}

/// Canonical port identifier.
///
/// Userland may address ports with numbers or strings; both collapse to
/// one canonical string form here, applied at every entry point so that
/// `listen(8080)` and `send_to_port("8080")` meet at the same queue.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortKey(String);

impl PortKey {
    /// Canonicalize a raw identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Canonicalize a dynamic value: integers render in decimal, strings
    /// pass through. Anything else has no port form.
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Some(n) = value.as_i64() {
            Some(Self(n.to_string()))
        } else {
            value.as_str().map(|s| Self(String::from(s)))
        }
    }

    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for PortKey {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<&str> for PortKey {
    fn from(s: &str) -> Self {
        Self(String::from(s))
    }
}

impl fmt::Display for PortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message delivered directly to a process mailbox.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MailboxMessage {
    /// Sending process
    pub from: Pid,
    /// Application payload
    pub payload: Value,
    /// Logical enqueue time
    pub time: u64,
}

/// A message queued on a port.
///
/// Deliberately a different shape from `MailboxMessage` (`from_pid` vs
/// `from`): userland sees both and tells them apart by field name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortMessage {
    /// Sending process
    pub from_pid: Pid,
    /// Application payload
    pub payload: Value,
    /// Logical enqueue time
    pub time: u64,
}

/// A named rendezvous queue with a single owner.
#[derive(Clone, Debug)]
pub struct Port {
    /// Canonical port identifier
    pub key: PortKey,
    /// Owning process; the only pid allowed to receive
    pub owner: Pid,
    /// Pending messages, FIFO
    pub queue: VecDeque<PortMessage>,
}

impl Port {
    /// Create an empty port owned by `owner`.
    pub fn new(key: PortKey, owner: Pid) -> Self {
        Self {
            key,
            owner,
            queue: VecDeque::new(),
        }
    }

    /// Enqueue a message.
    pub fn enqueue(&mut self, msg: PortMessage) {
        self.queue.push_back(msg);
    }

    /// Dequeue the oldest message.
    pub fn dequeue(&mut self) -> Option<PortMessage> {
        self.queue.pop_front()
    }
}

/// Open-file mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenMode {
    /// Read from position 0; the file must exist
    Read,
    /// Truncate (create if missing), position 0
    Write,
    /// Create if missing, position at end
    Append,
}

impl OpenMode {
    /// Parse the userland mode string (`r`, `w`, `a`).
    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "r" => Some(OpenMode::Read),
            "w" => Some(OpenMode::Write),
            "a" => Some(OpenMode::Append),
            _ => None,
        }
    }
}

/// An open file descriptor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Canonical path of the open file
    pub path: String,
    /// Current character position
    pub position: usize,
    /// Mode the file was opened with
    pub mode: OpenMode,
}

/// Reserved descriptor: standard input.
pub const FD_STDIN: u32 = 0;
/// Reserved descriptor: standard output.
pub const FD_STDOUT: u32 = 1;
/// Reserved descriptor: standard error.
pub const FD_STDERR: u32 = 2;

/// First descriptor handed out by `open`.
pub const FIRST_USER_FD: u32 = 3;

/// Process control block.
///
/// Everything the kernel knows about one process except its routine,
/// which the runtime keeps keyed by pid. `pending_result` is the value
/// injected into the routine on its next resume.
#[derive(Clone, Debug)]
pub struct Pcb {
    /// Process identifier
    pub pid: Pid,
    /// Human label
    pub name: String,
    /// Scheduling weight; higher wins
    pub priority: i64,
    /// Current state
    pub state: ProcessState,
    /// Set while `Blocked`
    pub block_reason: Option<BlockReason>,
    /// Value to inject on the next resume
    pub pending_result: Value,
    /// Absolute wake time for a sleep block
    pub wake_time: Option<u64>,
    /// Sender filter for a mailbox block; `None` matches any sender
    pub wait_from: Option<Pid>,
    /// Port awaited by a port block
    pub wait_port: Option<PortKey>,
    /// Absolute deadline for a port block, if any
    pub wait_timeout_at: Option<u64>,
    /// Exit code, set at termination
    pub exit_code: Option<i64>,
    /// Open files; 0/1/2 are the standard streams
    pub fd_table: BTreeMap<u32, FileDescriptor>,
    /// Next descriptor to allocate
    pub next_fd: u32,
    /// Per-process key/value store
    pub heap: BTreeMap<String, Value>,
    /// Wall-clock creation time in ms, display only
    pub spawn_time: u64,
}

impl Pcb {
    /// Create a fresh `Ready` PCB with the standard streams open.
    pub fn new(pid: Pid, name: impl Into<String>, priority: i64, spawn_time: u64) -> Self {
        let mut fd_table = BTreeMap::new();
        fd_table.insert(
            FD_STDIN,
            FileDescriptor {
                path: String::from("/dev/stdin"),
                position: 0,
                mode: OpenMode::Read,
            },
        );
        fd_table.insert(
            FD_STDOUT,
            FileDescriptor {
                path: String::from("/dev/stdout"),
                position: 0,
                mode: OpenMode::Write,
            },
        );
        fd_table.insert(
            FD_STDERR,
            FileDescriptor {
                path: String::from("/dev/stderr"),
                position: 0,
                mode: OpenMode::Write,
            },
        );

        Self {
            pid,
            name: name.into(),
            priority,
            state: ProcessState::Ready,
            block_reason: None,
            pending_result: Value::Null,
            wake_time: None,
            wait_from: None,
            wait_port: None,
            wait_timeout_at: None,
            exit_code: None,
            fd_table,
            next_fd: FIRST_USER_FD,
            heap: BTreeMap::new(),
            spawn_time,
        }
    }

    /// Process is not yet terminated.
    pub fn is_live(&self) -> bool {
        self.state != ProcessState::Terminated
    }

    /// Transition to `Ready` with the given syscall result pending.
    pub fn set_ready(&mut self, result: Value) {
        self.state = ProcessState::Ready;
        self.pending_result = result;
        self.clear_block();
    }

    /// Block on a sleep until `wake_time`.
    pub fn block_sleep(&mut self, wake_time: u64) {
        self.state = ProcessState::Blocked;
        self.block_reason = Some(BlockReason::Sleep);
        self.wake_time = Some(wake_time);
    }

    /// Block on a mailbox receive with an optional sender filter.
    pub fn block_recv_mailbox(&mut self, from: Option<Pid>) {
        self.state = ProcessState::Blocked;
        self.block_reason = Some(BlockReason::RecvMailbox);
        self.wait_from = from;
    }

    /// Block on a port receive with an optional absolute deadline.
    pub fn block_recv_port(&mut self, port: PortKey, deadline: Option<u64>) {
        self.state = ProcessState::Blocked;
        self.block_reason = Some(BlockReason::RecvPort);
        self.wait_port = Some(port);
        self.wait_timeout_at = deadline;
    }

    /// Terminate with the given exit code. Absorbing until reap.
    pub fn terminate(&mut self, code: i64) {
        self.state = ProcessState::Terminated;
        self.exit_code = Some(code);
        self.clear_block();
    }

    /// Clear every wait field.
    pub fn clear_block(&mut self) {
        self.block_reason = None;
        self.wake_time = None;
        self.wait_from = None;
        self.wait_port = None;
        self.wait_timeout_at = None;
    }

    /// Allocate the next file descriptor.
    pub fn alloc_fd(&mut self) -> u32 {
        let fd = self.next_fd;
        self.next_fd += 1;
        fd
    }
}

// ============================================================================
// Snapshot types
// ============================================================================

/// One row of the process table snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    /// Process identifier
    pub pid: Pid,
    /// Human label
    pub name: String,
    /// Scheduling weight
    pub priority: i64,
    /// Current state
    pub state: ProcessState,
    /// Wait discriminator when blocked
    pub block_reason: Option<BlockReason>,
    /// Sleep wake time when blocked on sleep
    pub wake_time: Option<u64>,
    /// Exit code when terminated
    pub exit_code: Option<i64>,
    /// Wall-clock creation time in ms
    pub spawn_time: u64,
}

impl From<&Pcb> for ProcessSnapshot {
    fn from(pcb: &Pcb) -> Self {
        Self {
            pid: pcb.pid,
            name: pcb.name.clone(),
            priority: pcb.priority,
            state: pcb.state,
            block_reason: pcb.block_reason,
            wake_time: pcb.wake_time,
            exit_code: pcb.exit_code,
            spawn_time: pcb.spawn_time,
        }
    }
}

/// One row of the ports table snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortSnapshot {
    /// Canonical port identifier
    pub port: String,
    /// Owning process
    pub owner_pid: Pid,
    /// Messages currently queued
    pub queue_length: usize,
}

impl From<&Port> for PortSnapshot {
    fn from(port: &Port) -> Self {
        Self {
            port: String::from(port.key.as_str()),
            owner_pid: port.owner,
            queue_length: port.queue.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_port_key_normalization() {
        assert_eq!(PortKey::from(8080u64), PortKey::new("8080"));
        assert_eq!(PortKey::from("8080"), PortKey::new("8080"));
        assert_eq!(PortKey::from_value(&json!(8080)), Some(PortKey::new("8080")));
        assert_eq!(
            PortKey::from_value(&json!("shell")),
            Some(PortKey::new("shell"))
        );
        assert_eq!(PortKey::from_value(&json!(null)), None);
        assert_eq!(PortKey::from_value(&json!([1])), None);
    }

    #[test]
    fn test_open_mode_parse() {
        assert_eq!(OpenMode::parse("r"), Some(OpenMode::Read));
        assert_eq!(OpenMode::parse("w"), Some(OpenMode::Write));
        assert_eq!(OpenMode::parse("a"), Some(OpenMode::Append));
        assert_eq!(OpenMode::parse("rw"), None);
        assert_eq!(OpenMode::parse(""), None);
    }

    #[test]
    fn test_pcb_starts_with_standard_streams() {
        let pcb = Pcb::new(Pid(1), "init", 1, 0);

        assert_eq!(pcb.state, ProcessState::Ready);
        assert_eq!(pcb.fd_table.len(), 3);
        assert!(pcb.fd_table.contains_key(&FD_STDIN));
        assert!(pcb.fd_table.contains_key(&FD_STDOUT));
        assert!(pcb.fd_table.contains_key(&FD_STDERR));
        assert_eq!(pcb.next_fd, FIRST_USER_FD);
    }

    #[test]
    fn test_pcb_fd_allocation() {
        let mut pcb = Pcb::new(Pid(1), "p", 1, 0);
        assert_eq!(pcb.alloc_fd(), 3);
        assert_eq!(pcb.alloc_fd(), 4);
        assert_eq!(pcb.next_fd, 5);
    }

    #[test]
    fn test_pcb_block_and_wake() {
        let mut pcb = Pcb::new(Pid(1), "p", 1, 0);

        pcb.block_sleep(500);
        assert_eq!(pcb.state, ProcessState::Blocked);
        assert_eq!(pcb.block_reason, Some(BlockReason::Sleep));
        assert_eq!(pcb.wake_time, Some(500));

        pcb.set_ready(json!(true));
        assert_eq!(pcb.state, ProcessState::Ready);
        assert_eq!(pcb.block_reason, None);
        assert_eq!(pcb.wake_time, None);
        assert_eq!(pcb.pending_result, json!(true));
    }

    #[test]
    fn test_pcb_terminate_clears_block() {
        let mut pcb = Pcb::new(Pid(1), "p", 1, 0);
        pcb.block_recv_port(PortKey::from(9999u64), Some(100));

        pcb.terminate(-1);
        assert_eq!(pcb.state, ProcessState::Terminated);
        assert_eq!(pcb.exit_code, Some(-1));
        assert_eq!(pcb.wait_port, None);
        assert_eq!(pcb.wait_timeout_at, None);
        assert!(!pcb.is_live());
    }

    #[test]
    fn test_port_fifo() {
        let mut port = Port::new(PortKey::from(8080u64), Pid(1));
        port.enqueue(PortMessage {
            from_pid: Pid(2),
            payload: json!("first"),
            time: 10,
        });
        port.enqueue(PortMessage {
            from_pid: Pid(3),
            payload: json!("second"),
            time: 20,
        });

        assert_eq!(port.dequeue().unwrap().payload, json!("first"));
        assert_eq!(port.dequeue().unwrap().payload, json!("second"));
        assert!(port.dequeue().is_none());
    }

    #[test]
    fn test_message_shapes_differ_on_the_wire() {
        let mb = serde_json::to_value(MailboxMessage {
            from: Pid(1),
            payload: json!("x"),
            time: 5,
        })
        .unwrap();
        let pm = serde_json::to_value(PortMessage {
            from_pid: Pid(1),
            payload: json!("x"),
            time: 5,
        })
        .unwrap();

        assert!(mb.get("from").is_some());
        assert!(mb.get("from_pid").is_none());
        assert!(pm.get("from_pid").is_some());
        assert!(pm.get("from").is_none());
    }

    #[test]
    fn test_state_serialization_names() {
        assert_eq!(
            serde_json::to_value(ProcessState::Ready).unwrap(),
            json!("READY")
        );
        assert_eq!(
            serde_json::to_value(BlockReason::RecvMailbox).unwrap(),
            json!("recv_mailbox")
        );
    }
}
