use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};

/// Computes the deterministic staging path for (url, dest) under the given
/// configuration. Pure function of its inputs, per the staging-file invariant.
pub fn staging_path(
    url: &str,
    dest: &Path,
    stage_partials: bool,
    partials_root: Option<&Path>,
) -> PathBuf {
    if !stage_partials {
        let mut path = dest.as_os_str().to_owned();
        path.push(".part");
        return PathBuf::from(path);
    }

    let basename = dest.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let root = partials_root.map(Path::to_path_buf).unwrap_or_else(|| {
        dest.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
    });
    root.join(format!("{basename}.{}.part", staging_key(url, dest)))
}

/// First 12 hex characters of SHA-1(`<url>|<dest>`), the bit-exact staging
/// key used both for the staging filename and (independently) as the state
/// store's internal composite key.
pub fn staging_key(url: &str, dest: &Path) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    hasher.update(b"|");
    hasher.update(dest.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_scheme_appends_part() {
        let dest = Path::new("/downloads/model.bin");
        let path = staging_path("https://x/model.bin", dest, false, None);
        assert_eq!(path, Path::new("/downloads/model.bin.part"));
    }

    #[test]
    fn staging_path_is_pure_function_of_inputs() {
        let dest = Path::new("/downloads/model.bin");
        let a = staging_path("https://x/model.bin", dest, true, Some(Path::new("/tmp/partials")));
        let b = staging_path("https://x/model.bin", dest, true, Some(Path::new("/tmp/partials")));
        assert_eq!(a, b);
    }

    #[test]
    fn staging_dir_scheme_uses_12_hex_chars() {
        let dest = Path::new("/downloads/model.bin");
        let path = staging_path("https://x/model.bin", dest, true, Some(Path::new("/tmp/partials")));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        let key = name.split('.').nth(1).unwrap();
        assert_eq!(key.len(), 12);
    }

    #[test]
    fn different_urls_to_the_same_dest_get_different_staging_keys() {
        let dest = Path::new("/downloads/model.bin");
        let a = staging_key("https://mirror-a/model.bin", dest);
        let b = staging_key("https://mirror-b/model.bin", dest);
        assert_ne!(a, b);
    }
}
