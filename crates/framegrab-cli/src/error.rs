// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Framegrab Developers

use std::fmt;
use std::process::ExitCode;

/// CLI-specific error type with exit code mapping
#[derive(Debug)]
pub enum CliError {
    /// Invalid command-line arguments
    InvalidArgs(String),
    /// Capture device not found or inaccessible
    DeviceNotFound(String),
    /// Operation timed out
    Timeout(String),
    /// General error from the capture engine
    General(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            CliError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            CliError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            CliError::General(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    fn code(&self) -> u8 {
        match self {
            CliError::InvalidArgs(_) => 2,
            CliError::DeviceNotFound(_) => 3,
            CliError::Timeout(_) => 6,
            CliError::General(_) => 1,
        }
    }
}

/// Map framegrab::Error to CliError by failure class
impl From<framegrab::Error> for CliError {
    fn from(err: framegrab::Error) -> Self {
        use framegrab::ErrorKind;

        if let framegrab::Error::Io(io_err) = &err {
            if io_err.kind() == std::io::ErrorKind::TimedOut {
                return CliError::Timeout(err.to_string());
            }
        }

        match err.kind() {
            ErrorKind::DeviceUnavailable => CliError::DeviceNotFound(err.to_string()),
            ErrorKind::NegotiationFailure
            | ErrorKind::ResourceExhaustion
            | ErrorKind::TransientIo
            | ErrorKind::FatalIo => CliError::General(err.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                CliError::DeviceNotFound(err.to_string())
            }
            std::io::ErrorKind::TimedOut => CliError::Timeout(err.to_string()),
            _ => CliError::General(format!("I/O error: {}", err)),
        }
    }
}

/// Helper function to convert result to exit code
pub fn result_to_exit_code<T>(result: Result<T, CliError>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}
