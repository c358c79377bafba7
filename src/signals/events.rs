//! Payloads carried by host failure signals.

use crate::types::{capture_stack, ErrorInput, ErrorKind};
use serde_json::Value;
use std::fmt;

/// An error-like value: a message and, when available, a stack.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorObject {
    pub message: String,
    pub stack: Option<String>,
}

impl ErrorObject {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Build from a Rust error, capturing a backtrace if enabled.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let stack = capture_stack();
        Self {
            message: error.to_string(),
            stack: (!stack.is_empty()).then_some(stack),
        }
    }
}

impl fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str("Error")
        } else {
            write!(f, "Error: {}", self.message)
        }
    }
}

/// A failure that escaped every handler.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UncaughtError {
    pub message: String,
    pub filename: Option<String>,
    pub lineno: Option<u32>,
    pub colno: Option<u32>,
    /// Underlying error, when the host has one.
    pub error: Option<ErrorObject>,
}

impl UncaughtError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_location(mut self, filename: impl Into<String>, lineno: u32, colno: u32) -> Self {
        self.filename = Some(filename.into());
        self.lineno = Some(lineno);
        self.colno = Some(colno);
        self
    }

    pub fn with_error(mut self, error: ErrorObject) -> Self {
        self.error = Some(error);
        self
    }

    /// Normalize into an `uncaught` input. Stack is empty without an error object.
    pub fn to_input(&self) -> ErrorInput {
        let mut input = ErrorInput::new(ErrorKind::Uncaught, self.message.clone()).with_stack(
            self.error
                .as_ref()
                .and_then(|e| e.stack.clone())
                .unwrap_or_default(),
        );
        input.filename = self.filename.clone();
        input.lineno = self.lineno;
        input.colno = self.colno;
        input
    }
}

/// Why an asynchronous operation failed.
#[derive(Clone, Debug, PartialEq)]
pub enum RejectionReason {
    Error(ErrorObject),
    Value(Value),
}

impl RejectionReason {
    /// Message for the record: the error's message when non-empty, otherwise
    /// the stringified reason.
    pub fn message(&self) -> String {
        match self {
            RejectionReason::Error(e) if !e.message.is_empty() => e.message.clone(),
            RejectionReason::Error(e) => e.to_string(),
            RejectionReason::Value(value) => match value.get("message") {
                Some(Value::String(m)) if !m.is_empty() => m.clone(),
                _ => stringify(value),
            },
        }
    }

    pub fn stack(&self) -> String {
        match self {
            RejectionReason::Error(e) => e.stack.clone().unwrap_or_default(),
            RejectionReason::Value(value) => value
                .get("stack")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl From<ErrorObject> for RejectionReason {
    fn from(e: ErrorObject) -> Self {
        RejectionReason::Error(e)
    }
}

impl From<Value> for RejectionReason {
    fn from(v: Value) -> Self {
        RejectionReason::Value(v)
    }
}

/// An asynchronous failure nobody observed.
#[derive(Clone, Debug, PartialEq)]
pub struct UnhandledRejection {
    pub reason: RejectionReason,
}

impl UnhandledRejection {
    pub fn new(reason: impl Into<RejectionReason>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Normalize into an `unhandled-promise` input.
    pub fn to_input(&self) -> ErrorInput {
        ErrorInput::new(ErrorKind::UnhandledPromise, self.reason.message())
            .with_stack(self.reason.stack())
    }
}
