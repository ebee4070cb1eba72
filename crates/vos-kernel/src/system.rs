//! The `System` struct: construction options, the scheduler tick loop,
//! and the host-facing control surface.
//!
//! `System` wraps the pure `KernelState` with the two things the core
//! cannot hold: the routine objects and the program registry. Resuming a
//! routine is the only impure step of a tick; everything the resume
//! yields is handed straight to the pure dispatcher, except `Spawn` and
//! `Exec`, which need the registry and are handled here.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use vos_kernel_core::{
    dispatch, KernelState, LogEntry, Pid, PortSnapshot, ProcessSnapshot, ProcessState, Syscall,
};
use vos_vfs::{bootstrap, ensure_motd, save_namespace, FileStat, KvStore, MemoryVfs, VfsError};

use crate::routine::{ProgramFactory, ProgramRegistry, Routine, Step};

/// Store key under which the file namespace persists.
pub const VFS_STORE_KEY: &str = "vos.vfs";

/// Kernel construction options.
#[derive(Clone, Copy, Debug)]
pub struct KernelOptions {
    /// Logical-time step per tick in ms, independent of the host's
    /// wall-clock cadence.
    pub tick_ms: u64,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self { tick_ms: 50 }
    }
}

/// Options for a host-side `spawn`.
#[derive(Clone, Debug)]
pub struct SpawnOptions {
    /// Human label for the process table
    pub name: String,
    /// Scheduling weight; higher wins
    pub priority: i64,
    /// Arguments handed to the routine factory
    pub args: Vec<Value>,
}

impl SpawnOptions {
    /// Options with the given name, priority 1, no arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 1,
            args: Vec::new(),
        }
    }

    /// Set the priority.
    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Set the factory arguments.
    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }
}

/// Wall-clock milliseconds since the epoch, for display-only spawn
/// times.
fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The kernel runtime: pure state, routines, programs.
pub struct System {
    state: KernelState,
    routines: std::collections::BTreeMap<Pid, Box<dyn Routine>>,
    programs: ProgramRegistry,
}

impl System {
    /// Create a kernel with a fresh namespace (default `/etc/motd`
    /// included).
    pub fn new(options: KernelOptions) -> Self {
        let mut vfs = MemoryVfs::new();
        ensure_motd(&mut vfs, 0);
        Self::with_vfs(options, vfs)
    }

    /// Create a kernel, restoring the namespace from a durable store if
    /// serialized data exists under `VFS_STORE_KEY`.
    pub fn with_store<S: KvStore>(options: KernelOptions, store: &S) -> Self {
        let vfs = bootstrap(store, VFS_STORE_KEY, 0);
        Self::with_vfs(options, vfs)
    }

    /// Create a kernel around an existing namespace.
    pub fn with_vfs(options: KernelOptions, vfs: MemoryVfs) -> Self {
        Self {
            state: KernelState::new(options.tick_ms, vfs),
            routines: std::collections::BTreeMap::new(),
            programs: ProgramRegistry::new(),
        }
    }

    /// Serialize the namespace into a durable store.
    pub fn persist<S: KvStore>(&self, store: &mut S) -> Result<(), VfsError> {
        save_namespace(&self.state.vfs, store, VFS_STORE_KEY)
    }

    /// The underlying kernel state, for inspection between ticks.
    pub fn state(&self) -> &KernelState {
        &self.state
    }

    // ========================================================================
    // Program registry
    // ========================================================================

    /// Install a program factory under `name`.
    pub fn register_program(&mut self, name: impl Into<String>, factory: ProgramFactory) {
        self.programs.register(name, factory);
    }

    /// Registered program names.
    pub fn program_names(&self) -> Vec<&str> {
        self.programs.names()
    }

    // ========================================================================
    // Process control
    // ========================================================================

    /// Create and schedule a process from a routine factory. Returns its
    /// pid.
    pub fn spawn<F>(&mut self, factory: F, opts: SpawnOptions) -> Pid
    where
        F: FnOnce(&[Value]) -> Box<dyn Routine>,
    {
        let pid = self
            .state
            .register_process(&opts.name, opts.priority, wall_clock_ms());
        self.routines.insert(pid, factory(&opts.args));
        pid
    }

    /// Spawn a registered program by name. Returns `None` when the name
    /// is not registered.
    pub fn spawn_program(&mut self, name: &str, args: Vec<Value>, priority: i64) -> Option<Pid> {
        let routine = self.programs.instantiate(name, &args)?;
        let pid = self.state.register_process(name, priority, wall_clock_ms());
        self.routines.insert(pid, routine);
        Some(pid)
    }

    /// Remove every terminated process, with its mailbox, ports, and
    /// routine. Returns the reaped pids.
    pub fn reap_terminated(&mut self) -> Vec<Pid> {
        let reaped = self.state.reap_terminated();
        for pid in &reaped {
            self.routines.remove(pid);
        }
        reaped
    }

    // ========================================================================
    // The tick loop
    // ========================================================================

    /// Run one scheduling step: advance the clock, wake expired waits,
    /// select the highest-priority ready process, resume it with its
    /// pending result, and dispatch whatever it yields. At most one
    /// process advances, by exactly one syscall.
    pub fn tick(&mut self) {
        self.state.advance_clock();
        self.state.wake_expired();

        let Some(pid) = self.state.select_ready() else {
            return;
        };

        let input = match self.state.get_process_mut(pid) {
            Some(pcb) => {
                pcb.state = ProcessState::Running;
                std::mem::replace(&mut pcb.pending_result, Value::Null)
            }
            None => return,
        };

        let Some(mut routine) = self.routines.remove(&pid) else {
            // A scheduled pid without a routine cannot make progress.
            self.state
                .log(Pid::KERNEL, format!("pid={} has no routine; terminating", pid));
            if let Some(pcb) = self.state.get_process_mut(pid) {
                pcb.terminate(1);
            }
            return;
        };

        let outcome = routine.resume(input);
        self.routines.insert(pid, routine);

        match outcome {
            Ok(Step::Done(code)) => {
                if let Some(pcb) = self.state.get_process_mut(pid) {
                    pcb.terminate(code);
                }
                self.state
                    .log(Pid::KERNEL, format!("pid={} completed with code {}", pid, code));
            }
            Ok(Step::Yield(request)) => self.handle_request(pid, request),
            Err(err) => {
                if let Some(pcb) = self.state.get_process_mut(pid) {
                    pcb.terminate(1);
                }
                self.state
                    .log(Pid::KERNEL, format!("Process crashed: pid={} {}", pid, err));
            }
        }
    }

    /// Route one yielded request. `Spawn`/`Exec` need the program
    /// registry and are resolved here; everything else is pure and goes
    /// to the core dispatcher.
    fn handle_request(&mut self, pid: Pid, request: Syscall) {
        match request {
            Syscall::Spawn {
                program,
                args,
                priority,
            } => {
                let result = match self.spawn_program(&program, args, priority) {
                    Some(child) => json!(child.0),
                    None => {
                        self.state
                            .log(Pid::KERNEL, format!("spawn: unknown program '{}'", program));
                        json!(-1)
                    }
                };
                if let Some(pcb) = self.state.get_process_mut(pid) {
                    pcb.set_ready(result);
                }
            }
            Syscall::Exec { program, args } => {
                let result = match self.programs.instantiate(&program, &args) {
                    Some(routine) => {
                        // Same pid, fd table, mailbox, heap, and owned
                        // ports; only the routine (and name) change.
                        self.routines.insert(pid, routine);
                        if let Some(pcb) = self.state.get_process_mut(pid) {
                            pcb.name = program;
                        }
                        json!(0)
                    }
                    None => {
                        self.state
                            .log(Pid::KERNEL, format!("exec: unknown program '{}'", program));
                        json!(-1)
                    }
                };
                if let Some(pcb) = self.state.get_process_mut(pid) {
                    pcb.set_ready(result);
                }
            }
            other => {
                dispatch(&mut self.state, pid, other);
            }
        }
    }

    // ========================================================================
    // Read-only snapshots (safe between ticks)
    // ========================================================================

    /// Process table snapshot.
    pub fn process_table(&self) -> Vec<ProcessSnapshot> {
        self.state.process_table()
    }

    /// Ports table snapshot.
    pub fn ports_table(&self) -> Vec<PortSnapshot> {
        self.state.ports_table()
    }

    /// File listing snapshot.
    pub fn list_files(&self) -> Vec<FileStat> {
        self.state.list_files()
    }

    /// The most recent `limit` log entries, most-recent-last.
    pub fn logs(&self, limit: usize) -> Vec<LogEntry> {
        self.state.logs(limit)
    }
}
