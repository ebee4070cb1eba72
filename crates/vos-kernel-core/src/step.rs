//! Pure syscall dispatcher.
//!
//! `dispatch` is a total function over the syscall sum type: given the
//! kernel state and the calling pid it executes one request and leaves
//! the caller in exactly one of `Ready` (result recorded in
//! `pending_result`), `Blocked` (wait fields set), or `Terminated`.
//!
//! Wakeups induced by `Send`/`SendPort` happen synchronously in here,
//! inside the sender's dispatch; the woken process is only *runnable*
//! from the next tick on, because selection already happened this tick.
//!
//! `Spawn` and `Exec` are the two requests that need the program
//! registry and routine objects; the runtime intercepts them before
//! calling in here.

use serde::Serialize;
use serde_json::{json, Value};
use vos_vfs::canonicalize;

use crate::state::KernelState;
use crate::syscall::{InfoKind, Syscall};
use crate::types::{
    BlockReason, FileDescriptor, MailboxMessage, OpenMode, Pid, Port, PortKey, PortMessage,
    ProcessState, FD_STDERR, FD_STDOUT,
};

/// Where the caller ended up after one dispatch.
#[derive(Clone, Debug, PartialEq)]
pub enum Dispatch {
    /// Caller stays runnable; the value is its syscall result
    Ready(Value),
    /// Caller is waiting; the result arrives on wake or delivery
    Blocked,
    /// Caller is finished
    Terminated,
}

/// Serialize a result value, collapsing the (unreachable in practice)
/// failure case to the null sentinel.
fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Execute one syscall for `pid`.
///
/// On `Ready` the result is also stored into the caller's
/// `pending_result`, so the scheduler can resume it with the value on a
/// later tick.
pub fn dispatch(state: &mut KernelState, pid: Pid, request: Syscall) -> Dispatch {
    let disposition = match request {
        Syscall::Sleep { ms } => step_sleep(state, pid, ms),
        Syscall::Log { message } => step_log(state, pid, message),
        Syscall::GetPid => Dispatch::Ready(json!(pid.0)),
        Syscall::Exit { code } => step_exit(state, pid, code),
        Syscall::Send { to, message } => step_send(state, pid, to, message),
        Syscall::Recv { from } => step_recv(state, pid, from),
        Syscall::Listen { port } => step_listen(state, pid, port),
        Syscall::Unlisten { port } => step_unlisten(state, pid, port),
        Syscall::SendPort { port, payload } => step_send_port(state, pid, port, payload),
        Syscall::RecvPort { port, timeout_ms } => step_recv_port(state, pid, port, timeout_ms),
        Syscall::Open { path, mode } => step_open(state, pid, path, mode),
        Syscall::Read { fd, count } => step_read(state, pid, fd, count),
        Syscall::Write { fd, data } => step_write(state, pid, fd, data),
        Syscall::Close { fd } => step_close(state, pid, fd),
        Syscall::ReadFile { path } => step_read_file(state, path),
        Syscall::WriteFile { path, text } => step_write_file(state, path, text),
        Syscall::Unlink { path } => step_unlink(state, path),
        Syscall::ListFiles => Dispatch::Ready(to_value(&state.list_files())),
        Syscall::HeapSet { key, value } => step_heap_set(state, pid, key, value),
        Syscall::HeapGet { key } => step_heap_get(state, pid, key),
        Syscall::Kinfo { kind } => step_kinfo(state, kind),
        Syscall::ListPorts => Dispatch::Ready(to_value(&state.ports_table())),
        Syscall::Kill { target, signal } => step_kill(state, pid, target, signal),
        Syscall::Spawn { .. } => {
            log::warn!(target: "vos", "SPAWN reached the core dispatcher unhandled");
            Dispatch::Ready(Value::Null)
        }
        Syscall::Exec { .. } => {
            log::warn!(target: "vos", "EXEC reached the core dispatcher unhandled");
            Dispatch::Ready(Value::Null)
        }
        Syscall::Yield => Dispatch::Ready(Value::Null),
    };

    if let Dispatch::Ready(value) = &disposition {
        if let Some(pcb) = state.get_process_mut(pid) {
            pcb.set_ready(value.clone());
        }
    }
    disposition
}

// ============================================================================
// Time and control
// ============================================================================

fn step_sleep(state: &mut KernelState, pid: Pid, ms: u64) -> Dispatch {
    let wake_time = state.now() + ms;
    if let Some(pcb) = state.get_process_mut(pid) {
        pcb.block_sleep(wake_time);
    }
    Dispatch::Blocked
}

fn step_log(state: &mut KernelState, pid: Pid, message: String) -> Dispatch {
    state.log(pid, message);
    Dispatch::Ready(json!(true))
}

fn step_exit(state: &mut KernelState, pid: Pid, code: i64) -> Dispatch {
    if let Some(pcb) = state.get_process_mut(pid) {
        pcb.terminate(code);
    }
    state.log(Pid::KERNEL, format!("pid={} exited with code {}", pid, code));
    Dispatch::Terminated
}

// ============================================================================
// Direct mailbox IPC
// ============================================================================

fn step_send(state: &mut KernelState, pid: Pid, to: Pid, message: Value) -> Dispatch {
    let now = state.now();
    state.mailbox_mut(to).push_back(MailboxMessage {
        from: pid,
        payload: message,
        time: now,
    });
    try_deliver_mailbox(state, to);
    // Never fails: unknown destinations simply buffer.
    Dispatch::Ready(json!(true))
}

fn step_recv(state: &mut KernelState, pid: Pid, from: Option<Pid>) -> Dispatch {
    let mailbox = state.mailbox_mut(pid);
    let taken = match from {
        None => mailbox.pop_front(),
        Some(wanted) => mailbox
            .iter()
            .position(|m| m.from == wanted)
            .and_then(|i| mailbox.remove(i)),
    };

    match taken {
        Some(msg) => Dispatch::Ready(to_value(&msg)),
        None => {
            if let Some(pcb) = state.get_process_mut(pid) {
                pcb.block_recv_mailbox(from);
            }
            Dispatch::Blocked
        }
    }
}

/// Wake `target` if it is blocked on its mailbox and a matching message
/// is queued. The delivered message is the *first* one its filter
/// matches, which is not necessarily the newest.
fn try_deliver_mailbox(state: &mut KernelState, target: Pid) {
    let filter = match state.get_process(target) {
        Some(pcb)
            if pcb.state == ProcessState::Blocked
                && pcb.block_reason == Some(BlockReason::RecvMailbox) =>
        {
            pcb.wait_from
        }
        _ => return,
    };

    let Some(mailbox) = state.mailboxes.get_mut(&target) else {
        return;
    };
    let index = match filter {
        None => {
            if mailbox.is_empty() {
                return;
            }
            0
        }
        Some(wanted) => match mailbox.iter().position(|m| m.from == wanted) {
            Some(i) => i,
            None => return,
        },
    };

    if let Some(msg) = mailbox.remove(index) {
        let value = to_value(&msg);
        if let Some(pcb) = state.get_process_mut(target) {
            pcb.set_ready(value);
        }
    }
}

// ============================================================================
// Port IPC
// ============================================================================

fn step_listen(state: &mut KernelState, pid: Pid, port: PortKey) -> Dispatch {
    match state.ports.get(&port) {
        // Re-listen on an owned port is idempotent.
        Some(entry) if entry.owner == pid => Dispatch::Ready(json!(true)),
        Some(_) => Dispatch::Ready(json!(false)),
        None => {
            state.ports.insert(port.clone(), Port::new(port, pid));
            Dispatch::Ready(json!(true))
        }
    }
}

fn step_unlisten(state: &mut KernelState, pid: Pid, port: PortKey) -> Dispatch {
    match state.ports.get(&port) {
        Some(entry) if entry.owner == pid => {
            // Queued messages are discarded with the port.
            state.ports.remove(&port);
            Dispatch::Ready(json!(true))
        }
        _ => Dispatch::Ready(json!(false)),
    }
}

fn step_send_port(state: &mut KernelState, pid: Pid, port: PortKey, payload: Value) -> Dispatch {
    let now = state.now();
    let owner = match state.ports.get_mut(&port) {
        None => return Dispatch::Ready(json!(false)),
        Some(entry) => {
            entry.enqueue(PortMessage {
                from_pid: pid,
                payload,
                time: now,
            });
            entry.owner
        }
    };
    try_deliver_port(state, owner, &port);
    Dispatch::Ready(json!(true))
}

fn step_recv_port(
    state: &mut KernelState,
    pid: Pid,
    port: PortKey,
    timeout_ms: Option<u64>,
) -> Dispatch {
    let now = state.now();
    match state.ports.get_mut(&port) {
        Some(entry) if entry.owner == pid => match entry.dequeue() {
            Some(msg) => Dispatch::Ready(to_value(&msg)),
            None => {
                let deadline = timeout_ms.map(|t| now + t);
                if let Some(pcb) = state.get_process_mut(pid) {
                    pcb.block_recv_port(port, deadline);
                }
                Dispatch::Blocked
            }
        },
        // Missing port or non-owner: receive is owner-gated.
        _ => Dispatch::Ready(Value::Null),
    }
}

/// Wake the owner of `port` if it is blocked receiving on it, handing it
/// the oldest queued message.
fn try_deliver_port(state: &mut KernelState, owner: Pid, port: &PortKey) {
    let waiting = matches!(
        state.get_process(owner),
        Some(pcb)
            if pcb.state == ProcessState::Blocked
                && pcb.block_reason == Some(BlockReason::RecvPort)
                && pcb.wait_port.as_ref() == Some(port)
    );
    if !waiting {
        return;
    }

    let msg = state.ports.get_mut(port).and_then(|entry| entry.dequeue());
    if let Some(msg) = msg {
        let value = to_value(&msg);
        if let Some(pcb) = state.get_process_mut(owner) {
            pcb.set_ready(value);
        }
    }
}

// ============================================================================
// File namespace
// ============================================================================

fn step_open(state: &mut KernelState, pid: Pid, path: String, mode: String) -> Dispatch {
    let Some(mode) = OpenMode::parse(&mode) else {
        return Dispatch::Ready(json!(-1));
    };

    let now = state.now();
    let path = canonicalize(&path);
    let position = match mode {
        OpenMode::Read => {
            if !state.vfs.exists(&path) {
                return Dispatch::Ready(json!(-1));
            }
            0
        }
        OpenMode::Write => {
            state.vfs.write(&path, "", now);
            0
        }
        OpenMode::Append => {
            state.vfs.ensure(&path, now);
            state.vfs.len_chars(&path).unwrap_or(0)
        }
    };

    let Some(pcb) = state.get_process_mut(pid) else {
        return Dispatch::Ready(json!(-1));
    };
    let fd = pcb.alloc_fd();
    pcb.fd_table.insert(
        fd,
        FileDescriptor {
            path,
            position,
            mode,
        },
    );
    Dispatch::Ready(json!(fd))
}

fn step_read(state: &mut KernelState, pid: Pid, fd: i64, count: Option<u64>) -> Dispatch {
    let Ok(fd) = u32::try_from(fd) else {
        return Dispatch::Ready(Value::Null);
    };
    let Some((path, position)) = state
        .get_process(pid)
        .and_then(|pcb| pcb.fd_table.get(&fd))
        .map(|desc| (desc.path.clone(), desc.position))
    else {
        return Dispatch::Ready(Value::Null);
    };

    // A descriptor whose file vanished (or a standard stream) reads as
    // empty rather than erroring.
    let text = state
        .vfs
        .read_at(&path, position, count.map(|n| n as usize))
        .unwrap_or_default();
    let advanced = text.chars().count();

    if let Some(desc) = state
        .get_process_mut(pid)
        .and_then(|pcb| pcb.fd_table.get_mut(&fd))
    {
        desc.position += advanced;
    }
    Dispatch::Ready(json!(text))
}

fn step_write(state: &mut KernelState, pid: Pid, fd: i64, data: String) -> Dispatch {
    let written = data.chars().count();

    // The standard streams go to the host's diagnostic streams and never
    // touch the namespace.
    if fd == i64::from(FD_STDOUT) {
        log::info!(target: "vos::stdout", "{}", data);
        return Dispatch::Ready(json!(written));
    }
    if fd == i64::from(FD_STDERR) {
        log::warn!(target: "vos::stderr", "{}", data);
        return Dispatch::Ready(json!(written));
    }

    let Ok(fd) = u32::try_from(fd) else {
        return Dispatch::Ready(json!(-1));
    };
    let Some((path, position)) = state
        .get_process(pid)
        .and_then(|pcb| pcb.fd_table.get(&fd))
        .map(|desc| (desc.path.clone(), desc.position))
    else {
        return Dispatch::Ready(json!(-1));
    };

    let now = state.now();
    let written = state.vfs.splice(&path, position, &data, now);
    if let Some(desc) = state
        .get_process_mut(pid)
        .and_then(|pcb| pcb.fd_table.get_mut(&fd))
    {
        desc.position += written;
    }
    Dispatch::Ready(json!(written))
}

fn step_close(state: &mut KernelState, pid: Pid, fd: i64) -> Dispatch {
    if let Ok(fd) = u32::try_from(fd) {
        if let Some(pcb) = state.get_process_mut(pid) {
            pcb.fd_table.remove(&fd);
        }
    }
    // Closing an unknown descriptor is not an error.
    Dispatch::Ready(json!(0))
}

fn step_read_file(state: &mut KernelState, path: String) -> Dispatch {
    match state.vfs.read(&path) {
        Some(content) => Dispatch::Ready(json!(content)),
        None => Dispatch::Ready(Value::Null),
    }
}

fn step_write_file(state: &mut KernelState, path: String, text: String) -> Dispatch {
    let now = state.now();
    let written = state.vfs.write(&path, &text, now);
    Dispatch::Ready(json!(written))
}

fn step_unlink(state: &mut KernelState, path: String) -> Dispatch {
    Dispatch::Ready(json!(state.vfs.unlink(&path)))
}

// ============================================================================
// Heap and introspection
// ============================================================================

fn step_heap_set(state: &mut KernelState, pid: Pid, key: String, value: Value) -> Dispatch {
    if let Some(pcb) = state.get_process_mut(pid) {
        pcb.heap.insert(key, value);
    }
    Dispatch::Ready(json!(true))
}

fn step_heap_get(state: &mut KernelState, pid: Pid, key: String) -> Dispatch {
    let value = state
        .get_process(pid)
        .and_then(|pcb| pcb.heap.get(&key).cloned())
        .unwrap_or(Value::Null);
    Dispatch::Ready(value)
}

fn step_kinfo(state: &mut KernelState, kind: InfoKind) -> Dispatch {
    let value = match kind {
        InfoKind::Ps => to_value(&state.process_table()),
        InfoKind::Ports => to_value(&state.ports_table()),
        InfoKind::Vfs => to_value(&state.list_files()),
    };
    Dispatch::Ready(value)
}

// ============================================================================
// Process control
// ============================================================================

fn step_kill(state: &mut KernelState, pid: Pid, target: Pid, signal: Option<String>) -> Dispatch {
    let signal = signal.unwrap_or_else(|| String::from("SIGKILL"));
    state.log(
        Pid::KERNEL,
        format!("pid={} sent {} to pid={}", pid, signal, target),
    );

    if target == pid {
        if let Some(pcb) = state.get_process_mut(pid) {
            pcb.terminate(-1);
        }
        return Dispatch::Terminated;
    }

    if let Some(pcb) = state.get_process_mut(target) {
        pcb.terminate(-1);
    }
    // Succeeds even when the target does not exist.
    Dispatch::Ready(json!(true))
}
