//! Kernel state: the process table and every registry the dispatcher
//! mutates.
//!
//! `KernelState` is pure data plus state transformations. The scheduler
//! in the runtime crate drives it: advance the clock, run the timed
//! unblock pass, select a process, dispatch its request via `step`.

use std::collections::{BTreeMap, VecDeque};

use serde_json::Value;
use vos_vfs::{FileStat, MemoryVfs};

use crate::klog::{KernelLog, LogEntry};
use crate::types::{
    BlockReason, MailboxMessage, Pcb, Pid, Port, PortKey, PortSnapshot, ProcessSnapshot,
    ProcessState,
};

/// Monotonic logical clock, advanced by a fixed step per tick.
///
/// Logical time is independent of the host's wall-clock cadence: one
/// `advance` per tick, always by the same step.
#[derive(Clone, Copy, Debug)]
pub struct Clock {
    now_ms: u64,
    step_ms: u64,
}

impl Clock {
    /// A clock at time zero with the given step.
    pub fn new(step_ms: u64) -> Self {
        Self { now_ms: 0, step_ms }
    }

    /// Current logical time in ms.
    pub fn now(&self) -> u64 {
        self.now_ms
    }

    /// The step per tick in ms.
    pub fn step_ms(&self) -> u64 {
        self.step_ms
    }

    /// Advance by one step.
    pub fn advance(&mut self) {
        self.now_ms += self.step_ms;
    }
}

/// All mutable kernel state.
pub struct KernelState {
    /// Process table
    pub processes: BTreeMap<Pid, Pcb>,
    /// Per-pid direct message queues. May hold orphan keys: `send`
    /// buffers against unknown pids by design.
    pub mailboxes: BTreeMap<Pid, VecDeque<MailboxMessage>>,
    /// Port registry
    pub ports: BTreeMap<PortKey, Port>,
    /// File namespace
    pub vfs: MemoryVfs,
    /// Kernel log ring
    pub klog: KernelLog,
    /// Next pid to allocate
    pub next_pid: u64,
    /// Logical clock
    clock: Clock,
}

impl KernelState {
    /// Create a fresh state around an existing namespace.
    pub fn new(tick_ms: u64, vfs: MemoryVfs) -> Self {
        Self {
            processes: BTreeMap::new(),
            mailboxes: BTreeMap::new(),
            ports: BTreeMap::new(),
            vfs,
            klog: KernelLog::new(),
            next_pid: 1,
            clock: Clock::new(tick_ms),
        }
    }

    /// Current logical time in ms.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Logical step per tick in ms.
    pub fn tick_ms(&self) -> u64 {
        self.clock.step_ms()
    }

    /// Advance logical time by one tick step.
    pub fn advance_clock(&mut self) {
        self.clock.advance();
    }

    /// Allocate the next pid.
    pub fn alloc_pid(&mut self) -> Pid {
        let pid = Pid(self.next_pid);
        self.next_pid += 1;
        pid
    }

    /// Register a new process: fresh pid, `Ready` PCB with standard
    /// streams, empty mailbox. Returns the pid.
    pub fn register_process(&mut self, name: &str, priority: i64, spawn_time: u64) -> Pid {
        let pid = self.alloc_pid();
        self.processes.insert(pid, Pcb::new(pid, name, priority, spawn_time));
        self.mailboxes.entry(pid).or_default();
        pid
    }

    /// Get a process.
    pub fn get_process(&self, pid: Pid) -> Option<&Pcb> {
        self.processes.get(&pid)
    }

    /// Get a process mutably.
    pub fn get_process_mut(&mut self, pid: Pid) -> Option<&mut Pcb> {
        self.processes.get_mut(&pid)
    }

    /// The mailbox for `pid`, created on demand.
    pub fn mailbox_mut(&mut self, pid: Pid) -> &mut VecDeque<MailboxMessage> {
        self.mailboxes.entry(pid).or_default()
    }

    /// Append a kernel log entry at the current logical time.
    pub fn log(&mut self, pid: Pid, message: impl Into<String>) {
        let now = self.clock.now();
        self.klog.append(now, pid, message);
    }

    // ========================================================================
    // Scheduling support
    // ========================================================================

    /// Timed unblock pass: wake expired sleepers (injecting the success
    /// sentinel `true`) and expired port waits (injecting `null`). Runs
    /// at the start of every tick, before selection.
    pub fn wake_expired(&mut self) {
        let now = self.clock.now();
        for pcb in self.processes.values_mut() {
            if pcb.state != ProcessState::Blocked {
                continue;
            }
            match pcb.block_reason {
                Some(BlockReason::Sleep) => {
                    if pcb.wake_time.is_some_and(|t| t <= now) {
                        pcb.set_ready(Value::Bool(true));
                    }
                }
                Some(BlockReason::RecvPort) => {
                    if pcb.wait_timeout_at.is_some_and(|t| t <= now) {
                        pcb.set_ready(Value::Null);
                    }
                }
                _ => {}
            }
        }
    }

    /// Select the next process to run: highest priority among `Ready`
    /// PCBs, ties broken by lowest pid (table insertion order).
    pub fn select_ready(&self) -> Option<Pid> {
        let mut best: Option<(&Pid, &Pcb)> = None;
        for (pid, pcb) in &self.processes {
            if pcb.state != ProcessState::Ready {
                continue;
            }
            match best {
                Some((_, current)) if pcb.priority <= current.priority => {}
                _ => best = Some((pid, pcb)),
            }
        }
        best.map(|(pid, _)| *pid)
    }

    /// Remove every terminated PCB together with its mailbox and owned
    /// ports. Returns the reaped pids.
    pub fn reap_terminated(&mut self) -> Vec<Pid> {
        let reaped: Vec<Pid> = self
            .processes
            .iter()
            .filter(|(_, pcb)| pcb.state == ProcessState::Terminated)
            .map(|(pid, _)| *pid)
            .collect();

        for pid in &reaped {
            self.processes.remove(pid);
            self.mailboxes.remove(pid);
            self.ports.retain(|_, port| port.owner != *pid);
        }

        reaped
    }

    // ========================================================================
    // Read-only snapshots
    // ========================================================================

    /// Process table snapshot.
    pub fn process_table(&self) -> Vec<ProcessSnapshot> {
        self.processes.values().map(ProcessSnapshot::from).collect()
    }

    /// Ports table snapshot.
    pub fn ports_table(&self) -> Vec<PortSnapshot> {
        self.ports.values().map(PortSnapshot::from).collect()
    }

    /// File listing snapshot.
    pub fn list_files(&self) -> Vec<FileStat> {
        self.vfs.list()
    }

    /// The most recent `limit` log entries, most-recent-last.
    pub fn logs(&self, limit: usize) -> Vec<LogEntry> {
        self.klog.recent(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> KernelState {
        KernelState::new(50, MemoryVfs::new())
    }

    #[test]
    fn test_clock_advances_by_tick() {
        let mut state = state();
        assert_eq!(state.now(), 0);
        state.advance_clock();
        state.advance_clock();
        assert_eq!(state.now(), 100);
    }

    #[test]
    fn test_register_process_allocates_monotonic_pids() {
        let mut state = state();
        let a = state.register_process("a", 1, 0);
        let b = state.register_process("b", 1, 0);

        assert_eq!(a, Pid(1));
        assert_eq!(b, Pid(2));
        assert_eq!(state.next_pid, 3);
        assert!(state.mailboxes.contains_key(&a));
        assert!(state.mailboxes.contains_key(&b));
    }

    #[test]
    fn test_select_ready_prefers_priority_then_pid() {
        let mut state = state();
        let low = state.register_process("low", 1, 0);
        let high = state.register_process("high", 5, 0);
        let high2 = state.register_process("high2", 5, 0);

        // Highest priority wins.
        assert_eq!(state.select_ready(), Some(high));

        // Tie broken by lower pid.
        state.get_process_mut(high).unwrap().state = ProcessState::Blocked;
        state.get_process_mut(high).unwrap().block_reason = Some(BlockReason::Sleep);
        state.get_process_mut(high).unwrap().wake_time = Some(u64::MAX);
        assert_eq!(state.select_ready(), Some(high2));

        state.get_process_mut(high2).unwrap().terminate(0);
        assert_eq!(state.select_ready(), Some(low));

        state.get_process_mut(low).unwrap().terminate(0);
        assert_eq!(state.select_ready(), None);
    }

    #[test]
    fn test_wake_expired_sleep() {
        let mut state = state();
        let pid = state.register_process("sleeper", 1, 0);
        state.get_process_mut(pid).unwrap().block_sleep(100);

        state.advance_clock(); // 50
        state.wake_expired();
        assert_eq!(state.get_process(pid).unwrap().state, ProcessState::Blocked);

        state.advance_clock(); // 100
        state.wake_expired();
        let pcb = state.get_process(pid).unwrap();
        assert_eq!(pcb.state, ProcessState::Ready);
        assert_eq!(pcb.pending_result, json!(true));
        assert_eq!(pcb.wake_time, None);
    }

    #[test]
    fn test_wake_expired_port_timeout_injects_null() {
        let mut state = state();
        let pid = state.register_process("owner", 1, 0);
        state
            .get_process_mut(pid)
            .unwrap()
            .block_recv_port(PortKey::from(7000u64), Some(100));

        state.advance_clock();
        state.wake_expired();
        assert_eq!(state.get_process(pid).unwrap().state, ProcessState::Blocked);

        state.advance_clock();
        state.wake_expired();
        let pcb = state.get_process(pid).unwrap();
        assert_eq!(pcb.state, ProcessState::Ready);
        assert_eq!(pcb.pending_result, Value::Null);
        assert_eq!(pcb.wait_port, None);
    }

    #[test]
    fn test_wake_expired_ignores_untimed_port_wait() {
        let mut state = state();
        let pid = state.register_process("owner", 1, 0);
        state
            .get_process_mut(pid)
            .unwrap()
            .block_recv_port(PortKey::from(7000u64), None);

        for _ in 0..10 {
            state.advance_clock();
            state.wake_expired();
        }
        assert_eq!(state.get_process(pid).unwrap().state, ProcessState::Blocked);
    }

    #[test]
    fn test_reap_removes_process_mailbox_and_ports() {
        let mut state = state();
        let pid = state.register_process("victim", 1, 0);
        let other = state.register_process("other", 1, 0);

        let key = PortKey::from(5000u64);
        state.ports.insert(key.clone(), Port::new(key.clone(), pid));
        state.mailbox_mut(pid).push_back(MailboxMessage {
            from: other,
            payload: json!("pending"),
            time: 0,
        });

        state.get_process_mut(pid).unwrap().terminate(-1);
        let reaped = state.reap_terminated();

        assert_eq!(reaped, vec![pid]);
        assert!(state.get_process(pid).is_none());
        assert!(!state.mailboxes.contains_key(&pid));
        assert!(state.ports.is_empty());
        assert!(state.get_process(other).is_some());
    }

    #[test]
    fn test_snapshots() {
        let mut state = state();
        let pid = state.register_process("p", 2, 1234);
        let key = PortKey::from(8080u64);
        state.ports.insert(key.clone(), Port::new(key, pid));

        let procs = state.process_table();
        assert_eq!(procs.len(), 1);
        assert_eq!(procs[0].pid, pid);
        assert_eq!(procs[0].priority, 2);
        assert_eq!(procs[0].spawn_time, 1234);

        let ports = state.ports_table();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port, "8080");
        assert_eq!(ports[0].owner_pid, pid);
        assert_eq!(ports[0].queue_length, 0);
    }
}
