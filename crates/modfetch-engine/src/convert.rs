//! Folds the component crates' own error types into the shared `EngineError`
//! taxonomy. Plain functions, not `From` impls — none of these crates know
//! about each other, so a blanket trait impl here would be an orphan-rule
//! violation anyway; a function is simpler.

use modfetch_policy::EngineError;

pub fn state_err(e: modfetch_state::Error) -> EngineError {
    EngineError::Disk { reason: format!("state store: {e}") }
}

pub fn fs_err(e: modfetch_fs::Error) -> EngineError {
    if e.is_out_of_space() {
        EngineError::Disk { reason: "no space left on device".to_string() }
    } else {
        EngineError::Disk { reason: e.to_string() }
    }
}

pub fn verify_err(e: modfetch_verify::VerificationError) -> EngineError {
    match e {
        modfetch_verify::VerificationError::Mismatch { expected, actual } => EngineError::IntegrityMismatch {
            expected: modfetch_verify::to_hex(&expected),
            actual: modfetch_verify::to_hex(&actual),
        },
        other => EngineError::VerifyFailed { reason: other.to_string() },
    }
}

pub fn finalizer_err(e: modfetch_finalizer::Error) -> EngineError {
    match e {
        modfetch_finalizer::Error::Fs(e) => fs_err(e),
        modfetch_finalizer::Error::Verify(e) => verify_err(e),
        modfetch_finalizer::Error::SafetensorsIncomplete { .. } | modfetch_finalizer::Error::SafetensorsMalformed { .. } => {
            EngineError::VerifyFailed { reason: e.to_string() }
        }
        modfetch_finalizer::Error::Io { .. } => EngineError::Disk { reason: e.to_string() },
    }
}

pub fn io_err(e: std::io::Error) -> EngineError {
    EngineError::Disk { reason: e.to_string() }
}
