//! Test helpers for driving the kernel.
//!
//! `ScriptRoutine` plays a fixed sequence of syscalls and records every
//! value the kernel injects, so tests can assert on both sides of the
//! resume contract without writing a state machine per case.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use vos_kernel_core::Syscall;

use crate::routine::{Routine, RoutineError, Step};

/// Shared handle to the values a `ScriptRoutine` was resumed with.
pub type InputLog = Rc<RefCell<Vec<Value>>>;

/// A routine that yields a scripted sequence of syscalls, then exits.
pub struct ScriptRoutine {
    script: Vec<Syscall>,
    index: usize,
    exit_code: i64,
    inputs: InputLog,
}

impl ScriptRoutine {
    /// Build a routine that yields `script` in order and completes with
    /// exit code 0.
    pub fn new(script: Vec<Syscall>) -> Self {
        Self {
            script,
            index: 0,
            exit_code: 0,
            inputs: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Set the final exit code.
    pub fn exit_code(mut self, code: i64) -> Self {
        self.exit_code = code;
        self
    }

    /// A handle to the recorded resume inputs. Clone it before moving
    /// the routine into the kernel.
    pub fn inputs(&self) -> InputLog {
        Rc::clone(&self.inputs)
    }

    /// Record inputs into an existing log instead of a fresh one. Lets a
    /// program factory expose the inputs of the instances it builds.
    pub fn record_into(mut self, log: InputLog) -> Self {
        self.inputs = log;
        self
    }
}

impl Routine for ScriptRoutine {
    fn resume(&mut self, input: Value) -> Result<Step, RoutineError> {
        self.inputs.borrow_mut().push(input);
        match self.script.get(self.index) {
            Some(request) => {
                self.index += 1;
                Ok(Step::Yield(request.clone()))
            }
            None => Ok(Step::Done(self.exit_code)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_script_plays_in_order_then_exits() {
        let mut routine = ScriptRoutine::new(vec![Syscall::GetPid, Syscall::Yield]).exit_code(3);
        let inputs = routine.inputs();

        match routine.resume(Value::Null) {
            Ok(Step::Yield(Syscall::GetPid)) => {}
            other => panic!("unexpected step: {:?}", other),
        }
        match routine.resume(json!(1)) {
            Ok(Step::Yield(Syscall::Yield)) => {}
            other => panic!("unexpected step: {:?}", other),
        }
        match routine.resume(Value::Null) {
            Ok(Step::Done(3)) => {}
            other => panic!("unexpected step: {:?}", other),
        }

        assert_eq!(*inputs.borrow(), vec![Value::Null, json!(1), Value::Null]);
    }
}
