//! Engine-level error handling.
//!
//! Every failure names the operation the caller asked for and carries the
//! backend diagnostic. `Display` renders `"<operation> failed: <diagnostic>"`,
//! which is also the text the boundary surface stores in its error slot.

use crate::port::PortError;
use thiserror::Error;

/// Caller-visible operation, used to prefix diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Open,
    Close,
    Write,
    Read,
    Available,
    Flush,
    ClearInput,
    ClearOutput,
    ClearAll,
    SetTimeout,
    SetRts,
    SetDtr,
    KernelRs485Query,
    SetRs485Config,
    SetRs485Delays,
    ListPorts,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Open => "Open",
            Operation::Close => "Close",
            Operation::Write => "Write",
            Operation::Read => "Read",
            Operation::Available => "Available",
            Operation::Flush => "Flush",
            Operation::ClearInput => "Clear input",
            Operation::ClearOutput => "Clear output",
            Operation::ClearAll => "Clear all",
            Operation::SetTimeout => "Set timeout",
            Operation::SetRts => "Set RTS",
            Operation::SetDtr => "Set DTR",
            Operation::KernelRs485Query => "Kernel RS-485 query",
            Operation::SetRs485Config => "Set RS-485 config",
            Operation::SetRs485Delays => "Set RS-485 delays",
            Operation::ListPorts => "List ports",
        };
        f.write_str(name)
    }
}

/// Failure category.
///
/// A read that times out without data is not a failure and has no kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid parameter, rejected before touching the OS.
    Configuration,
    /// Device missing, busy, or permission denied.
    OpenFailure,
    /// OS-level read, write or control failure.
    Io,
    /// The device or platform cannot do what was asked.
    Unsupported,
    /// The handle is unknown or already closed.
    NotOpen,
}

/// Errors returned by `SerialLink`, `HandleManager` and the call surface.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{operation} failed: {message}")]
    Configuration { operation: Operation, message: String },

    #[error("{operation} failed: {port}: {source}")]
    OpenFailure {
        operation: Operation,
        port: String,
        source: PortError,
    },

    #[error("{operation} failed: {source}")]
    Io {
        operation: Operation,
        source: PortError,
    },

    #[error("{operation} failed: {message}")]
    Unsupported { operation: Operation, message: String },

    #[error("{operation} failed: port not open")]
    NotOpen { operation: Operation },
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn configuration(operation: Operation, message: impl Into<String>) -> Self {
        Self::Configuration {
            operation,
            message: message.into(),
        }
    }

    pub fn not_open(operation: Operation) -> Self {
        Self::NotOpen { operation }
    }

    /// Classify a backend failure raised while performing `operation`.
    pub fn from_port(operation: Operation, error: PortError) -> Self {
        match error {
            PortError::Config(message) => Self::Configuration { operation, message },
            PortError::Unsupported(message) => Self::Unsupported { operation, message },
            source => Self::Io { operation, source },
        }
    }

    /// Classify a failure to open `port`.
    pub fn open_failure(port: impl Into<String>, error: PortError) -> Self {
        match error {
            PortError::Config(message) => Self::Configuration {
                operation: Operation::Open,
                message,
            },
            source => Self::OpenFailure {
                operation: Operation::Open,
                port: port.into(),
                source,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::OpenFailure { .. } => ErrorKind::OpenFailure,
            Self::Io { .. } => ErrorKind::Io,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::NotOpen { .. } => ErrorKind::NotOpen,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::Configuration { operation, .. }
            | Self::OpenFailure { operation, .. }
            | Self::Io { operation, .. }
            | Self::Unsupported { operation, .. }
            | Self::NotOpen { operation } => *operation,
        }
    }
}
