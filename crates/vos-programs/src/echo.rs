//! Echo server and client.
//!
//! The server owns a port and mails every payload it receives straight
//! back to the sender. The client pushes one payload at the server's
//! port, waits for the mailed-back copy, logs it, and exits. Together
//! they exercise both IPC paths: port queues inbound, mailboxes
//! outbound.

use serde_json::Value;
use vos_kernel::{Routine, RoutineError, Step, Syscall};
use vos_kernel_core::{Pid, PortKey};

enum ServerState {
    Start,
    Claimed,
    Waiting,
    Replying,
    Failed,
}

/// Echoes every port message back to its sender, forever.
pub struct EchoServer {
    port: PortKey,
    state: ServerState,
}

impl EchoServer {
    /// Server for the given port.
    pub fn new(port: PortKey) -> Self {
        Self {
            port,
            state: ServerState::Start,
        }
    }

    fn recv(&mut self) -> Step {
        self.state = ServerState::Waiting;
        Step::Yield(Syscall::RecvPort {
            port: self.port.clone(),
            timeout_ms: None,
        })
    }
}

impl Routine for EchoServer {
    fn resume(&mut self, input: Value) -> Result<Step, RoutineError> {
        match self.state {
            ServerState::Start => {
                self.state = ServerState::Claimed;
                Ok(Step::Yield(Syscall::Listen {
                    port: self.port.clone(),
                }))
            }
            ServerState::Claimed => {
                if input == Value::Bool(true) {
                    Ok(self.recv())
                } else {
                    self.state = ServerState::Failed;
                    Ok(Step::Yield(Syscall::Log {
                        message: format!("echo-server: port {} is taken", self.port),
                    }))
                }
            }
            ServerState::Waiting => match input.get("from_pid").and_then(Value::as_u64) {
                Some(from) => {
                    let payload = input.get("payload").cloned().unwrap_or(Value::Null);
                    self.state = ServerState::Replying;
                    Ok(Step::Yield(Syscall::Send {
                        to: Pid(from),
                        message: payload,
                    }))
                }
                // Not a message (shouldn't happen without a timeout):
                // go back to waiting.
                None => Ok(self.recv()),
            },
            ServerState::Replying => Ok(self.recv()),
            ServerState::Failed => Ok(Step::Done(1)),
        }
    }
}

enum ClientState {
    Start,
    Sent,
    AwaitReply,
    Finish,
    Failed,
}

/// Sends one payload to a port, waits for the echoed reply, logs it.
pub struct EchoClient {
    port: PortKey,
    payload: Value,
    state: ClientState,
}

impl EchoClient {
    /// Client that sends `payload` to `port`.
    pub fn new(port: PortKey, payload: Value) -> Self {
        Self {
            port,
            payload,
            state: ClientState::Start,
        }
    }
}

impl Routine for EchoClient {
    fn resume(&mut self, input: Value) -> Result<Step, RoutineError> {
        match self.state {
            ClientState::Start => {
                self.state = ClientState::Sent;
                Ok(Step::Yield(Syscall::SendPort {
                    port: self.port.clone(),
                    payload: self.payload.clone(),
                }))
            }
            ClientState::Sent => {
                if input == Value::Bool(true) {
                    self.state = ClientState::AwaitReply;
                    Ok(Step::Yield(Syscall::Recv { from: None }))
                } else {
                    self.state = ClientState::Failed;
                    Ok(Step::Yield(Syscall::Log {
                        message: format!("echo-client: nothing listening on {}", self.port),
                    }))
                }
            }
            ClientState::AwaitReply => {
                let payload = input.get("payload").cloned().unwrap_or(Value::Null);
                self.state = ClientState::Finish;
                Ok(Step::Yield(Syscall::Log {
                    message: format!("reply = {}", payload),
                }))
            }
            ClientState::Finish => Ok(Step::Done(0)),
            ClientState::Failed => Ok(Step::Done(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn yielded(step: Result<Step, RoutineError>) -> Syscall {
        match step {
            Ok(Step::Yield(sc)) => sc,
            other => panic!("expected a yield, got {:?}", other),
        }
    }

    #[test]
    fn test_server_claims_then_waits_then_echoes() {
        let mut server = EchoServer::new(PortKey::from(8080u64));

        match yielded(server.resume(Value::Null)) {
            Syscall::Listen { port } => assert_eq!(port, PortKey::from(8080u64)),
            other => panic!("expected LISTEN, got {:?}", other),
        }
        match yielded(server.resume(json!(true))) {
            Syscall::RecvPort { port, timeout_ms } => {
                assert_eq!(port, PortKey::from(8080u64));
                assert_eq!(timeout_ms, None);
            }
            other => panic!("expected RECV_PORT, got {:?}", other),
        }

        let msg = json!({"from_pid": 7, "payload": "ping", "time": 100});
        match yielded(server.resume(msg)) {
            Syscall::Send { to, message } => {
                assert_eq!(to, Pid(7));
                assert_eq!(message, json!("ping"));
            }
            other => panic!("expected SEND, got {:?}", other),
        }

        // After replying it goes right back to the port.
        match yielded(server.resume(json!(true))) {
            Syscall::RecvPort { .. } => {}
            other => panic!("expected RECV_PORT, got {:?}", other),
        }
    }

    #[test]
    fn test_server_gives_up_when_port_taken() {
        let mut server = EchoServer::new(PortKey::from(8080u64));
        server.resume(Value::Null).unwrap();

        match yielded(server.resume(json!(false))) {
            Syscall::Log { message } => assert!(message.contains("taken")),
            other => panic!("expected LOG, got {:?}", other),
        }
        match server.resume(json!(true)) {
            Ok(Step::Done(1)) => {}
            other => panic!("expected Done(1), got {:?}", other),
        }
    }

    #[test]
    fn test_client_round_trip() {
        let mut client = EchoClient::new(PortKey::from(8080u64), json!("hi"));

        match yielded(client.resume(Value::Null)) {
            Syscall::SendPort { port, payload } => {
                assert_eq!(port, PortKey::from(8080u64));
                assert_eq!(payload, json!("hi"));
            }
            other => panic!("expected SEND_PORT, got {:?}", other),
        }
        match yielded(client.resume(json!(true))) {
            Syscall::Recv { from } => assert_eq!(from, None),
            other => panic!("expected RECV, got {:?}", other),
        }

        let reply = json!({"from": 1, "payload": "hi", "time": 150});
        match yielded(client.resume(reply)) {
            Syscall::Log { message } => assert_eq!(message, "reply = \"hi\""),
            other => panic!("expected LOG, got {:?}", other),
        }
        match client.resume(json!(true)) {
            Ok(Step::Done(0)) => {}
            other => panic!("expected Done(0), got {:?}", other),
        }
    }

    #[test]
    fn test_client_fails_without_listener() {
        let mut client = EchoClient::new(PortKey::from(4444u64), json!("x"));
        client.resume(Value::Null).unwrap();

        match yielded(client.resume(json!(false))) {
            Syscall::Log { message } => assert!(message.contains("nothing listening")),
            other => panic!("expected LOG, got {:?}", other),
        }
        match client.resume(json!(true)) {
            Ok(Step::Done(1)) => {}
            other => panic!("expected Done(1), got {:?}", other),
        }
    }
}
