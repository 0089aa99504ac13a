use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Advisory hint for a known registry host, used to render a more useful
/// auth-failure message. Resolving *which* host a URI belongs to is the
/// resolver's job; this is a read-only lookup table keyed by hostname.
#[derive(Debug, Clone, Copy)]
pub struct HostHint {
    pub token_env_var: &'static str,
    pub gated_hint: Option<&'static str>,
}

static KNOWN_HOSTS: Lazy<HashMap<&'static str, HostHint>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        "huggingface.co",
        HostHint {
            token_env_var: "HF_TOKEN",
            gated_hint: Some("(gated repos also require accepting the license on the model page)"),
        },
    );
    m.insert(
        "cdn-lfs.huggingface.co",
        HostHint { token_env_var: "HF_TOKEN", gated_hint: None },
    );
    m
});

pub fn lookup(host: &str) -> Option<HostHint> {
    KNOWN_HOSTS.get(host).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_host_resolves() {
        assert!(lookup("huggingface.co").is_some());
    }

    #[test]
    fn unknown_host_is_none() {
        assert!(lookup("example.com").is_none());
    }
}
