//! vos-kernel-core — the pure kernel state machine.
//!
//! This crate holds all kernel data and every state transformation, with
//! no routine objects and no host I/O (log entries are mirrored through
//! the `log` facade, nothing more). The runtime wrapper (`vos-kernel`)
//! adds the scheduler loop, the program registry, and the resumable
//! routines; it drives this crate exclusively through:
//!
//! - `KernelState` — the process table, mailboxes, ports, namespace,
//!   log ring, and clock
//! - `dispatch` — the pure `(state, pid, syscall) -> disposition`
//!   function
//! - `KernelState::wake_expired` / `select_ready` / `reap_terminated` —
//!   the scheduling support passes
//! - `check_all_invariants` — runtime-checkable correctness properties

pub mod invariants;
pub mod klog;
pub mod state;
pub mod step;
pub mod syscall;
pub mod types;

pub use invariants::{check_all_invariants, InvariantViolation};
pub use klog::{KernelLog, LogEntry, MAX_LOG_ENTRIES};
pub use state::{Clock, KernelState};
pub use step::{dispatch, Dispatch};
pub use syscall::{InfoKind, Syscall};
pub use types::{
    BlockReason, FileDescriptor, MailboxMessage, OpenMode, Pcb, Pid, Port, PortKey, PortMessage,
    PortSnapshot, ProcessSnapshot, ProcessState, FD_STDERR, FD_STDIN, FD_STDOUT, FIRST_USER_FD,
};
