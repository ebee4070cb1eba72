//! The resumable-routine contract and the program registry.
//!
//! A userland program is a state machine with one operation: resume it
//! with the result of its previous syscall and observe either the next
//! request, completion, or a crash. The kernel depends on nothing else —
//! programs may be hand-written enums, generated code, anything that
//! implements `Routine`.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use vos_kernel_core::Syscall;

/// What a routine produced when resumed.
#[derive(Clone, Debug)]
pub enum Step {
    /// The routine requests a syscall and suspends
    Yield(Syscall),
    /// The routine finished with an exit code
    Done(i64),
}

/// A routine failure. Crashing a routine never crashes the kernel: the
/// scheduler logs it and terminates the process with exit code 1.
#[derive(Clone, Debug)]
pub struct RoutineError {
    message: String,
}

impl RoutineError {
    /// Create an error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for RoutineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RoutineError {}

impl From<String> for RoutineError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for RoutineError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// A resumable userland program.
pub trait Routine {
    /// Advance by one step. `input` is the result of the previously
    /// yielded syscall (`Value::Null` on the first resume and after
    /// `Yield`).
    fn resume(&mut self, input: Value) -> Result<Step, RoutineError>;
}

/// Builds a fresh routine instance from spawn/exec arguments.
pub type ProgramFactory = Box<dyn Fn(&[Value]) -> Box<dyn Routine>>;

/// Name -> factory table for programs reachable by `spawn`/`exec`.
#[derive(Default)]
pub struct ProgramRegistry {
    programs: BTreeMap<String, ProgramFactory>,
}

impl ProgramRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a factory under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, factory: ProgramFactory) {
        self.programs.insert(name.into(), factory);
    }

    /// Check whether a program is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    /// Instantiate a program with the given arguments.
    pub fn instantiate(&self, name: &str, args: &[Value]) -> Option<Box<dyn Routine>> {
        self.programs.get(name).map(|factory| factory(args))
    }

    /// Registered program names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.programs.keys().map(String::as_str).collect()
    }
}
