//! Small utilities: `ps`, `ls`, `netstat`, `cat`, `rm`.
//!
//! Each takes a kernel snapshot or touches one file, logs what it found,
//! and exits. They are what the shell typically dispatches.

use serde_json::Value;
use vos_kernel::{InfoKind, Routine, RoutineError, Step, Syscall};

// ============================================================================
// Snapshot printers
// ============================================================================

enum SnapshotState {
    Start,
    Render,
    Finish,
}

/// Process table listing.
pub struct Ps {
    state: SnapshotState,
}

impl Default for Ps {
    fn default() -> Self {
        Self::new()
    }
}

impl Ps {
    /// New `ps` instance.
    pub fn new() -> Self {
        Self {
            state: SnapshotState::Start,
        }
    }
}

impl Routine for Ps {
    fn resume(&mut self, input: Value) -> Result<Step, RoutineError> {
        match self.state {
            SnapshotState::Start => {
                self.state = SnapshotState::Render;
                Ok(Step::Yield(Syscall::Kinfo { kind: InfoKind::Ps }))
            }
            SnapshotState::Render => {
                self.state = SnapshotState::Finish;
                Ok(Step::Yield(Syscall::Log {
                    message: render_ps(&input),
                }))
            }
            SnapshotState::Finish => Ok(Step::Done(0)),
        }
    }
}

fn render_ps(rows: &Value) -> String {
    let mut out = String::from("PID NAME STATE PRI");
    for row in rows.as_array().map(Vec::as_slice).unwrap_or(&[]) {
        out.push_str(&format!(
            "\n{} {} {} {}",
            row["pid"],
            row["name"].as_str().unwrap_or("?"),
            row["state"].as_str().unwrap_or("?"),
            row["priority"],
        ));
    }
    out
}

/// File listing.
pub struct Ls {
    state: SnapshotState,
}

impl Default for Ls {
    fn default() -> Self {
        Self::new()
    }
}

impl Ls {
    /// New `ls` instance.
    pub fn new() -> Self {
        Self {
            state: SnapshotState::Start,
        }
    }
}

impl Routine for Ls {
    fn resume(&mut self, input: Value) -> Result<Step, RoutineError> {
        match self.state {
            SnapshotState::Start => {
                self.state = SnapshotState::Render;
                Ok(Step::Yield(Syscall::ListFiles))
            }
            SnapshotState::Render => {
                self.state = SnapshotState::Finish;
                Ok(Step::Yield(Syscall::Log {
                    message: render_ls(&input),
                }))
            }
            SnapshotState::Finish => Ok(Step::Done(0)),
        }
    }
}

fn render_ls(rows: &Value) -> String {
    let mut out = String::from("PATH SIZE");
    for row in rows.as_array().map(Vec::as_slice).unwrap_or(&[]) {
        out.push_str(&format!(
            "\n{} {}",
            row["path"].as_str().unwrap_or("?"),
            row["size"],
        ));
    }
    out
}

/// Ports table listing.
pub struct Netstat {
    state: SnapshotState,
}

impl Default for Netstat {
    fn default() -> Self {
        Self::new()
    }
}

impl Netstat {
    /// New `netstat` instance.
    pub fn new() -> Self {
        Self {
            state: SnapshotState::Start,
        }
    }
}

impl Routine for Netstat {
    fn resume(&mut self, input: Value) -> Result<Step, RoutineError> {
        match self.state {
            SnapshotState::Start => {
                self.state = SnapshotState::Render;
                Ok(Step::Yield(Syscall::ListPorts))
            }
            SnapshotState::Render => {
                self.state = SnapshotState::Finish;
                Ok(Step::Yield(Syscall::Log {
                    message: render_netstat(&input),
                }))
            }
            SnapshotState::Finish => Ok(Step::Done(0)),
        }
    }
}

fn render_netstat(rows: &Value) -> String {
    let mut out = String::from("PORT OWNER QUEUED");
    for row in rows.as_array().map(Vec::as_slice).unwrap_or(&[]) {
        out.push_str(&format!(
            "\n{} {} {}",
            row["port"].as_str().unwrap_or("?"),
            row["owner_pid"],
            row["queue_length"],
        ));
    }
    out
}

// ============================================================================
// cat / rm
// ============================================================================

enum CatState {
    Start,
    AwaitFd,
    AwaitContent { fd: i64 },
    AwaitLog { fd: i64 },
    AwaitClose,
    Failed,
}

/// Prints one file through the descriptor path (open, read, close).
pub struct Cat {
    path: String,
    state: CatState,
}

impl Cat {
    /// `cat` for the given path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: CatState::Start,
        }
    }
}

impl Routine for Cat {
    fn resume(&mut self, input: Value) -> Result<Step, RoutineError> {
        let state = std::mem::replace(&mut self.state, CatState::Failed);
        match state {
            CatState::Start => {
                self.state = CatState::AwaitFd;
                Ok(Step::Yield(Syscall::Open {
                    path: self.path.clone(),
                    mode: String::from("r"),
                }))
            }
            CatState::AwaitFd => {
                let fd = input.as_i64().unwrap_or(-1);
                if fd < 0 {
                    self.state = CatState::Failed;
                    Ok(Step::Yield(Syscall::Log {
                        message: format!("cat: {}: no such file", self.path),
                    }))
                } else {
                    self.state = CatState::AwaitContent { fd };
                    Ok(Step::Yield(Syscall::Read { fd, count: None }))
                }
            }
            CatState::AwaitContent { fd } => {
                let content = input.as_str().unwrap_or("");
                self.state = CatState::AwaitLog { fd };
                Ok(Step::Yield(Syscall::Log {
                    message: String::from(content),
                }))
            }
            CatState::AwaitLog { fd } => {
                self.state = CatState::AwaitClose;
                Ok(Step::Yield(Syscall::Close { fd }))
            }
            CatState::AwaitClose => Ok(Step::Done(0)),
            CatState::Failed => Ok(Step::Done(1)),
        }
    }
}

enum RmState {
    Start,
    AwaitResult,
    Failed,
}

/// Removes one file.
pub struct Rm {
    path: String,
    state: RmState,
}

impl Rm {
    /// `rm` for the given path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: RmState::Start,
        }
    }
}

impl Routine for Rm {
    fn resume(&mut self, input: Value) -> Result<Step, RoutineError> {
        match self.state {
            RmState::Start => {
                self.state = RmState::AwaitResult;
                Ok(Step::Yield(Syscall::Unlink {
                    path: self.path.clone(),
                }))
            }
            RmState::AwaitResult => {
                if input == Value::Bool(true) {
                    Ok(Step::Done(0))
                } else {
                    self.state = RmState::Failed;
                    Ok(Step::Yield(Syscall::Log {
                        message: format!("rm: {}: no such file", self.path),
                    }))
                }
            }
            RmState::Failed => Ok(Step::Done(1)),
        }
    }
}
