//! The shell: a command dispatcher on port 9999.
//!
//! Clients mail `{ "command": "<line>" }` to the shell's port. The shell
//! splits the line, spawns the named program with the remaining words as
//! arguments, and replies to the sender with a `SHELL_RESULT` object.

use serde_json::{json, Value};
use vos_kernel::{Routine, RoutineError, Step, Syscall};
use vos_kernel_core::{Pid, PortKey};

/// Port the shell conventionally listens on.
pub const SHELL_PORT: u64 = 9999;

enum ShellState {
    Start,
    Claimed,
    Waiting,
    Dispatched { reply_to: Pid, program: String },
    Replying,
    Failed,
}

/// The command dispatcher.
pub struct Shell {
    port: PortKey,
    state: ShellState,
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

impl Shell {
    /// Shell on the conventional port.
    pub fn new() -> Self {
        Self::on_port(PortKey::from(SHELL_PORT))
    }

    /// Shell on a specific port.
    pub fn on_port(port: PortKey) -> Self {
        Self {
            port,
            state: ShellState::Start,
        }
    }

    fn recv(&mut self) -> Step {
        self.state = ShellState::Waiting;
        Step::Yield(Syscall::RecvPort {
            port: self.port.clone(),
            timeout_ms: None,
        })
    }

    fn reply(&mut self, to: Pid, ok: bool, output: String) -> Step {
        self.state = ShellState::Replying;
        Step::Yield(Syscall::Send {
            to,
            message: json!({
                "type": "SHELL_RESULT",
                "ok": ok,
                "output": output,
            }),
        })
    }
}

impl Routine for Shell {
    fn resume(&mut self, input: Value) -> Result<Step, RoutineError> {
        let state = std::mem::replace(&mut self.state, ShellState::Failed);
        match state {
            ShellState::Start => {
                self.state = ShellState::Claimed;
                Ok(Step::Yield(Syscall::Listen {
                    port: self.port.clone(),
                }))
            }
            ShellState::Claimed => {
                if input == Value::Bool(true) {
                    Ok(self.recv())
                } else {
                    self.state = ShellState::Failed;
                    Ok(Step::Yield(Syscall::Log {
                        message: format!("shell: port {} is taken", self.port),
                    }))
                }
            }
            ShellState::Waiting => {
                let Some(reply_to) = input.get("from_pid").and_then(Value::as_u64).map(Pid)
                else {
                    // Not a message; keep listening.
                    return Ok(self.recv());
                };

                let command = input
                    .get("payload")
                    .and_then(|p| p.get("command"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                let mut words = command.split_whitespace();
                match words.next() {
                    None => Ok(self.reply(reply_to, false, String::from("missing command"))),
                    Some(program) => {
                        let args: Vec<Value> = words.map(|w| json!(w)).collect();
                        let program = String::from(program);
                        self.state = ShellState::Dispatched {
                            reply_to,
                            program: program.clone(),
                        };
                        Ok(Step::Yield(Syscall::Spawn {
                            program,
                            args,
                            priority: 1,
                        }))
                    }
                }
            }
            ShellState::Dispatched { reply_to, program } => {
                let pid = input.as_i64().unwrap_or(-1);
                if pid >= 0 {
                    let output = format!("Started {} (pid={})", program, pid);
                    Ok(self.reply(reply_to, true, output))
                } else {
                    Ok(self.reply(reply_to, false, format!("{}: not found", program)))
                }
            }
            ShellState::Replying => Ok(self.recv()),
            ShellState::Failed => Ok(Step::Done(1)),
        }
    }
}
