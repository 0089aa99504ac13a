//! Final-stage handling for completed downloads: safetensors container
//! reconciliation and atomic publish of a staging file to its destination.

mod error;
mod publish;
mod safetensors;

pub use error::{Error, Result};
pub use publish::{publish, sidecar_path, PublishOptions, PublishOutcome};
pub use safetensors::{deep_validate, dtype_size, parse_header, reconcile_length, SafetensorsHeader, TensorInfo};

/// Returns true when `path`'s extension marks it as a safetensors container.
pub fn is_safetensors(path: &std::path::Path) -> bool {
    path.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("safetensors")).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn detects_safetensors_extension_case_insensitively() {
        assert!(is_safetensors(Path::new("model.SafeTensors")));
        assert!(!is_safetensors(Path::new("model.bin")));
    }
}
