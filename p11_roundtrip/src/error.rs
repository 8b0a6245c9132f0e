/* error.rs : the one error type of both round-trip programs */

use std::io;
use std::num::ParseIntError;
use std::process::ExitCode;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HsmError {
    /// Wrong number of command line arguments; the message is the usage text.
    #[error("Command usage is :-\n{program} <slotId> <slotPin>")]
    Usage { program: String },
    #[error("P11_LIB environment variable not set.")]
    MissingLibrary,
    #[error("Invalid slot id {value:?}: {source}")]
    InvalidSlot { value: String, source: ParseIntError },
    #[error("P11_ROUNDS must be a positive integer, got {0:?}")]
    InvalidRounds(String),
    #[error("Failed to load P11 library. {path}: {source}")]
    LibraryLoad {
        path: String,
        source: cryptoki::error::Error,
    },
    #[error("No slot with id {0} reported by the P11 library")]
    SlotNotFound(u64),
    /// Any non-success status returned by the provider.
    #[error("{call} failed with : {source}")]
    Provider {
        call: &'static str,
        source: cryptoki::error::Error,
    },
    #[error("Decrypted data does not match the plain data")]
    RoundTripMismatch,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl HsmError {
    /// Binds a provider status to the name of the `C_*` function that returned it.
    pub fn provider(call: &'static str) -> impl FnOnce(cryptoki::error::Error) -> Self {
        move |source| HsmError::Provider { call, source }
    }

    /* usage is the one exit path that reports success */
    pub fn exit_code(&self) -> u8 {
        match self {
            HsmError::Usage { .. } => 0,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, HsmError>;

/// Top-level handler shared by both programs: prints the single diagnostic
/// line and maps the error kind to the process exit code.
pub fn finish(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err @ HsmError::Usage { .. }) => {
            println!("{err}");
            ExitCode::from(err.exit_code())
        }
        Err(err) => {
            tracing::error!(error = %err, "aborting");
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_display_and_exit_code() {
        let err = HsmError::Usage { program: "aes_roundtrip".into() };
        assert_eq!(err.to_string(), "Command usage is :-\naes_roundtrip <slotId> <slotPin>");
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    fn test_missing_library_display_and_exit_code() {
        let err = HsmError::MissingLibrary;
        assert_eq!(err.to_string(), "P11_LIB environment variable not set.");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_slot_not_found_display() {
        let err = HsmError::SlotNotFound(7);
        assert_eq!(err.to_string(), "No slot with id 7 reported by the P11 library");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_provider_error_names_the_call() {
        let err = HsmError::provider("C_Login")(cryptoki::error::Error::InvalidValue);
        assert!(err.to_string().starts_with("C_Login failed with : "));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_mismatch_and_io_exit_code() {
        assert_eq!(HsmError::RoundTripMismatch.exit_code(), 1);
        let err = HsmError::from(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
        assert_eq!(err.to_string(), "I/O error: stdin closed");
        assert_eq!(err.exit_code(), 1);
    }
}
