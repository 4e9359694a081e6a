//! SCPI event/error taxonomy: codes, messages, wire formatting, FIFO queue.

use std::collections::VecDeque;
use std::fmt;

/// One SCPI error/event code. Negative numbers are reserved by SCPI;
/// 0 indicates no error. Values mirror IEEE 488.2 chapter 21.8.
pub type Code = i16;

pub const CODE_NO_ERROR: Code = 0;
pub const CODE_COMMAND_ERROR: Code = -100;
pub const CODE_SYNTAX_ERROR: Code = -102;
pub const CODE_DATA_TYPE_ERROR: Code = -104;
pub const CODE_GET_NOT_ALLOWED: Code = -105;
pub const CODE_PARAMETER_NOT_ALLOWED: Code = -108;
pub const CODE_MISSING_PARAMETER: Code = -109;
pub const CODE_EXECUTION_ERROR: Code = -200;
pub const CODE_PARAMETER_ERROR: Code = -220;
pub const CODE_DEVICE_ERROR: Code = -300;
pub const CODE_QUERY_ERROR: Code = -400;
pub const CODE_QUERY_INTERRUPTED: Code = -410;
pub const CODE_QUERY_UNTERMINATED: Code = -420;
pub const CODE_QUERY_DEADLOCKED: Code = -430;
pub const CODE_QUERY_UNTERMINATED_INDEFINITE: Code = -440;
pub const CODE_POWER_ON: Code = -500;
pub const CODE_USER_REQUEST: Code = -600;
pub const CODE_REQUEST_CONTROL: Code = -700;
pub const CODE_OPERATION_COMPLETE: Code = -800;

/// Round `code` towards zero to the nearest multiple of `step`.
fn round_code(code: Code, step: Code) -> Code {
    (code / step) * step
}

/// Message for a code that is itself a family head (has its own entry
/// in the source's `MESSAGES` table). Leaf codes with no entry of their
/// own (e.g. -102, -109, -220) are not listed here; they fall through to
/// their enclosing family via `default_message`'s rounding chain.
fn message_for_exact_code(code: Code) -> Option<&'static str> {
    match code {
        CODE_NO_ERROR => Some("No error"),
        CODE_COMMAND_ERROR => Some("Command error"),
        CODE_EXECUTION_ERROR => Some("Execution error"),
        CODE_DEVICE_ERROR => Some("Device-specific error"),
        CODE_QUERY_ERROR => Some("Query error"),
        CODE_QUERY_INTERRUPTED => Some("Query INTERRUPTED"),
        CODE_QUERY_UNTERMINATED => Some("Query UNTERMINATED"),
        CODE_QUERY_DEADLOCKED => Some("Query DEADLOCKED"),
        CODE_QUERY_UNTERMINATED_INDEFINITE => Some("Query UNTERMINATED after indefinite response"),
        CODE_POWER_ON => Some("Power on"),
        CODE_USER_REQUEST => Some("User request"),
        CODE_REQUEST_CONTROL => Some("Request control"),
        CODE_OPERATION_COMPLETE => Some("Operation complete"),
        _ => None,
    }
}

/// Message lookup: try the code itself, then its enclosing decade, then
/// its enclosing hundred, mirroring the source's
/// `(code, round_code(code, 10), round_code(code, 100))` search order.
fn default_message(code: Code) -> &'static str {
    message_for_exact_code(code)
        .or_else(|| message_for_exact_code(round_code(code, 10)))
        .or_else(|| message_for_exact_code(round_code(code, 100)))
        .unwrap_or("Unknown error")
}

/// Which SESR bit an event sets on occurrence, and which summary family
/// it belongs to. Selected by rounding the code towards zero to the
/// nearest multiple of 100 and consulting a fixed table (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    NoError,
    CommandError,
    ExecutionError,
    DeviceError,
    QueryError,
    PowerOnEvent,
    UserRequestEvent,
    RequestControlEvent,
    OperationCompleteEvent,
}

impl Kind {
    fn from_code(code: Code) -> Self {
        match round_code(code, 100) {
            CODE_NO_ERROR if code == 0 => Kind::NoError,
            CODE_COMMAND_ERROR => Kind::CommandError,
            CODE_EXECUTION_ERROR => Kind::ExecutionError,
            CODE_DEVICE_ERROR => Kind::DeviceError,
            CODE_QUERY_ERROR => Kind::QueryError,
            CODE_POWER_ON => Kind::PowerOnEvent,
            CODE_USER_REQUEST => Kind::UserRequestEvent,
            CODE_REQUEST_CONTROL => Kind::RequestControlEvent,
            CODE_OPERATION_COMPLETE => Kind::OperationCompleteEvent,
            _ => Kind::NoError,
        }
    }

    /// Bitmask for the corresponding SESR bit (spec §4.5), 0 if the
    /// event carries no SESR obligation (e.g. `NoError`).
    pub fn sesr_mask(self) -> u8 {
        match self {
            Kind::NoError => 0,
            Kind::OperationCompleteEvent => 1 << 0,
            Kind::RequestControlEvent => 1 << 1,
            Kind::QueryError => 1 << 2,
            Kind::DeviceError => 1 << 3,
            Kind::ExecutionError => 1 << 4,
            Kind::CommandError => 1 << 5,
            Kind::UserRequestEvent => 1 << 6,
            Kind::PowerOnEvent => 1 << 7,
        }
    }
}

/// A queued SCPI error/event: `(code, message, info)`, formatted on the
/// wire as `code,"message[;info]"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct ScpiEvent {
    pub code: Code,
    pub message: String,
    pub info: Option<String>,
}

impl ScpiEvent {
    pub fn new(code: Code) -> Self {
        ScpiEvent {
            code,
            message: default_message(code).to_string(),
            info: None,
        }
    }

    pub fn with_info(code: Code, info: impl Into<String>) -> Self {
        ScpiEvent {
            code,
            message: default_message(code).to_string(),
            info: Some(info.into()),
        }
    }

    pub fn kind(&self) -> Kind {
        Kind::from_code(self.code)
    }

    pub fn no_error() -> Self {
        ScpiEvent::new(CODE_NO_ERROR)
    }

    pub fn command_error(info: impl Into<String>) -> Self {
        ScpiEvent::with_info(CODE_SYNTAX_ERROR, info)
    }

    pub fn execution_error(info: impl Into<String>) -> Self {
        ScpiEvent::with_info(CODE_EXECUTION_ERROR, info)
    }

    pub fn device_error(info: impl Into<String>) -> Self {
        ScpiEvent::with_info(CODE_DEVICE_ERROR, info)
    }

    pub fn query_error(info: impl Into<String>) -> Self {
        ScpiEvent::with_info(CODE_QUERY_ERROR, info)
    }
}

impl fmt::Display for ScpiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.info {
            Some(info) => write!(f, "{},\"{};{}\"", self.code, self.message, info),
            None => write!(f, "{},\"{}\"", self.code, self.message),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScpiEvent>;

/// FIFO error/event queue. Popping an empty queue yields a `NoError`
/// sentinel rather than `None` (spec §3).
#[derive(Debug, Default)]
pub struct ErrorQueue {
    queue: VecDeque<ScpiEvent>,
}

impl ErrorQueue {
    pub fn new() -> Self {
        ErrorQueue::default()
    }

    pub fn push(&mut self, event: ScpiEvent) {
        self.queue.push_back(event);
    }

    pub fn pop(&mut self) -> ScpiEvent {
        self.queue.pop_front().unwrap_or_else(ScpiEvent::no_error)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
