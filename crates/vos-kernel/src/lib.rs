//! vos-kernel — the runtime wrapper around the pure kernel core.
//!
//! This crate adds the pieces the pure state machine cannot hold:
//!
//! - `Routine` — the resumable-program contract (`resume(input)` yields
//!   the next syscall, completes, or crashes)
//! - `ProgramRegistry` — name -> factory table behind `spawn`/`exec`
//! - `System` — construction options, the tick loop, reap, and the
//!   read-only snapshot API for hosts
//!
//! Hosts drive the kernel by calling `tick` at whatever cadence they
//! like; logical time advances by `tick_ms` per call regardless.

pub mod routine;
pub mod system;
pub mod testing;

pub use routine::{ProgramFactory, ProgramRegistry, Routine, RoutineError, Step};
pub use system::{KernelOptions, SpawnOptions, System, VFS_STORE_KEY};

// Userland-facing kernel types, re-exported so programs depend on one
// crate.
pub use vos_kernel_core::{
    check_all_invariants, InfoKind, LogEntry, Pid, PortKey, PortSnapshot, ProcessSnapshot,
    ProcessState, Syscall,
};
