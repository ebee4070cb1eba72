//! Runtime-checkable kernel invariants.
//!
//! These are the properties that must hold of any quiescent kernel state
//! (between ticks). Tests call `check_all_invariants` after driving the
//! scheduler and assert the result is empty.

use crate::state::KernelState;
use crate::types::{BlockReason, ProcessState};

/// An invariant violation with details.
#[derive(Clone, Debug)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: &'static str,
    /// Description of what went wrong
    pub description: String,
}

/// Check all kernel invariants.
///
/// Returns a list of violations (empty if all invariants hold).
pub fn check_all_invariants(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    violations.extend(check_no_running_outside_dispatch(state));
    violations.extend(check_blocked_wait_fields(state));
    violations.extend(check_port_ownership(state));
    violations.extend(check_live_processes_have_mailboxes(state));
    violations.extend(check_pid_monotonicity(state));
    violations.extend(check_terminated_have_exit_codes(state));

    violations
}

/// Outside of a dispatch step, no PCB is `Running`.
fn check_no_running_outside_dispatch(state: &KernelState) -> Vec<InvariantViolation> {
    state
        .processes
        .values()
        .filter(|pcb| pcb.state == ProcessState::Running)
        .map(|pcb| InvariantViolation {
            invariant: "no_running_outside_dispatch",
            description: format!("pid={} is RUNNING between ticks", pcb.pid),
        })
        .collect()
}

/// A `Blocked` PCB carries a block reason and the wait fields that
/// reason requires; a port wait names an existing port owned by the
/// waiter.
fn check_blocked_wait_fields(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for pcb in state.processes.values() {
        if pcb.state != ProcessState::Blocked {
            continue;
        }
        match pcb.block_reason {
            None => violations.push(InvariantViolation {
                invariant: "blocked_wait_fields",
                description: format!("pid={} is BLOCKED without a block reason", pcb.pid),
            }),
            Some(BlockReason::Sleep) => {
                if pcb.wake_time.is_none() {
                    violations.push(InvariantViolation {
                        invariant: "blocked_wait_fields",
                        description: format!("pid={} sleeps without a wake time", pcb.pid),
                    });
                }
            }
            Some(BlockReason::RecvPort) => match &pcb.wait_port {
                None => violations.push(InvariantViolation {
                    invariant: "blocked_wait_fields",
                    description: format!("pid={} waits on a port without naming it", pcb.pid),
                }),
                Some(key) => match state.ports.get(key) {
                    None => violations.push(InvariantViolation {
                        invariant: "blocked_wait_fields",
                        description: format!(
                            "pid={} waits on nonexistent port {}",
                            pcb.pid, key
                        ),
                    }),
                    Some(port) if port.owner != pcb.pid => violations.push(InvariantViolation {
                        invariant: "blocked_wait_fields",
                        description: format!(
                            "pid={} waits on port {} owned by pid={}",
                            pcb.pid, key, port.owner
                        ),
                    }),
                    Some(_) => {}
                },
            },
            // A mailbox wait with no filter is legal; nothing to check.
            Some(BlockReason::RecvMailbox) => {}
        }
    }

    violations
}

/// Every port's owner is in the process table. A terminated owner is
/// legal until the reap pass, which removes its ports with it.
fn check_port_ownership(state: &KernelState) -> Vec<InvariantViolation> {
    state
        .ports
        .values()
        .filter(|port| !state.processes.contains_key(&port.owner))
        .map(|port| InvariantViolation {
            invariant: "port_ownership",
            description: format!("port {} owned by missing pid={}", port.key, port.owner),
        })
        .collect()
}

/// Every live PCB has a mailbox. (Orphan mailboxes are legal: `send`
/// buffers against unknown pids.)
fn check_live_processes_have_mailboxes(state: &KernelState) -> Vec<InvariantViolation> {
    state
        .processes
        .values()
        .filter(|pcb| pcb.is_live() && !state.mailboxes.contains_key(&pcb.pid))
        .map(|pcb| InvariantViolation {
            invariant: "live_processes_have_mailboxes",
            description: format!("pid={} has no mailbox", pcb.pid),
        })
        .collect()
}

/// `next_pid` exceeds every allocated pid.
fn check_pid_monotonicity(state: &KernelState) -> Vec<InvariantViolation> {
    state
        .processes
        .keys()
        .filter(|pid| pid.0 >= state.next_pid)
        .map(|pid| InvariantViolation {
            invariant: "pid_monotonicity",
            description: format!("pid={} is not below next_pid={}", pid, state.next_pid),
        })
        .collect()
}

/// A terminated PCB exposes an exit code.
fn check_terminated_have_exit_codes(state: &KernelState) -> Vec<InvariantViolation> {
    state
        .processes
        .values()
        .filter(|pcb| pcb.state == ProcessState::Terminated && pcb.exit_code.is_none())
        .map(|pcb| InvariantViolation {
            invariant: "terminated_have_exit_codes",
            description: format!("pid={} terminated without an exit code", pcb.pid),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Pid, Port, PortKey};
    use vos_vfs::MemoryVfs;

    fn state() -> KernelState {
        KernelState::new(50, MemoryVfs::new())
    }

    #[test]
    fn test_fresh_state_holds() {
        let state = state();
        assert!(check_all_invariants(&state).is_empty());
    }

    #[test]
    fn test_populated_state_holds() {
        let mut state = state();
        let a = state.register_process("a", 1, 0);
        state.register_process("b", 2, 0);
        let key = PortKey::from(8080u64);
        state.ports.insert(key.clone(), Port::new(key, a));

        assert!(check_all_invariants(&state).is_empty());
    }

    #[test]
    fn test_detects_running_between_ticks() {
        let mut state = state();
        let pid = state.register_process("p", 1, 0);
        state.get_process_mut(pid).unwrap().state = ProcessState::Running;

        let violations = check_all_invariants(&state);
        assert!(violations
            .iter()
            .any(|v| v.invariant == "no_running_outside_dispatch"));
    }

    #[test]
    fn test_detects_blocked_without_reason() {
        let mut state = state();
        let pid = state.register_process("p", 1, 0);
        state.get_process_mut(pid).unwrap().state = ProcessState::Blocked;

        let violations = check_all_invariants(&state);
        assert!(violations
            .iter()
            .any(|v| v.invariant == "blocked_wait_fields"));
    }

    #[test]
    fn test_detects_port_wait_on_foreign_port() {
        let mut state = state();
        let a = state.register_process("a", 1, 0);
        let b = state.register_process("b", 1, 0);

        let key = PortKey::from(5000u64);
        state.ports.insert(key.clone(), Port::new(key.clone(), a));
        state.get_process_mut(b).unwrap().block_recv_port(key, None);

        let violations = check_all_invariants(&state);
        assert!(violations
            .iter()
            .any(|v| v.invariant == "blocked_wait_fields"));
    }

    #[test]
    fn test_detects_orphan_port() {
        let mut state = state();
        let key = PortKey::from(5000u64);
        state.ports.insert(key.clone(), Port::new(key, Pid(42)));

        let violations = check_all_invariants(&state);
        assert!(violations.iter().any(|v| v.invariant == "port_ownership"));
    }

    #[test]
    fn test_port_owned_by_terminated_is_legal_until_reap() {
        let mut state = state();
        let pid = state.register_process("p", 1, 0);
        let key = PortKey::from(5000u64);
        state.ports.insert(key.clone(), Port::new(key, pid));
        state.get_process_mut(pid).unwrap().terminate(0);

        assert!(check_all_invariants(&state).is_empty());

        state.reap_terminated();
        assert!(state.ports.is_empty());
        assert!(check_all_invariants(&state).is_empty());
    }

    #[test]
    fn test_detects_bad_next_pid() {
        let mut state = state();
        state.register_process("p", 1, 0);
        state.next_pid = 1;

        let violations = check_all_invariants(&state);
        assert!(violations.iter().any(|v| v.invariant == "pid_monotonicity"));
    }

    #[test]
    fn test_orphan_mailbox_is_legal() {
        let mut state = state();
        state.register_process("p", 1, 0);
        state.mailbox_mut(Pid(999));

        assert!(check_all_invariants(&state).is_empty());
    }
}
