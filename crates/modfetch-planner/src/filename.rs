/// Derives a destination filename from `Content-Disposition`, falling back to
/// the final URL's last path segment, per the precedence in the probe contract:
/// `filename*=UTF-8''...` > `filename="..."` > last path segment > "download".
pub fn derive_filename(content_disposition: Option<&str>, final_url: &str) -> String {
    if let Some(cd) = content_disposition {
        if let Some(name) = extract_filename_star(cd).or_else(|| extract_filename_quoted(cd)) {
            let sanitized = sanitize(&name);
            if !sanitized.is_empty() {
                return sanitized;
            }
        }
    }

    let from_url = final_url
        .split('?')
        .next()
        .unwrap_or(final_url)
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let sanitized = sanitize(from_url);
    if sanitized.is_empty() {
        "download".to_string()
    } else {
        sanitized
    }
}

fn extract_filename_star(cd: &str) -> Option<String> {
    let marker = "filename*=UTF-8''";
    let idx = cd.find(marker)?;
    let rest = &cd[idx + marker.len()..];
    let value = rest.split(';').next().unwrap_or(rest).trim();
    percent_decode(value)
}

fn extract_filename_quoted(cd: &str) -> Option<String> {
    let marker = "filename=";
    let idx = cd.find(marker)?;
    let rest = cd[idx + marker.len()..].trim();
    let rest = rest.strip_prefix('"').unwrap_or(rest);
    let value = rest.split(|c| c == '"' || c == ';').next().unwrap_or(rest).trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn percent_decode(s: &str) -> Option<String> {
    let mut out = Vec::with_capacity(s.len());
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Strips directory separators and disallowed characters so the derived name
/// can never escape the download root.
fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_filename_star_over_plain() {
        let cd = r#"attachment; filename="plain.bin"; filename*=UTF-8''model%20v2.safetensors"#;
        assert_eq!(derive_filename(Some(cd), "https://x/y"), "model v2.safetensors");
    }

    #[test]
    fn falls_back_to_plain_filename() {
        let cd = r#"attachment; filename="weights.bin""#;
        assert_eq!(derive_filename(Some(cd), "https://x/y"), "weights.bin");
    }

    #[test]
    fn falls_back_to_url_last_segment() {
        assert_eq!(derive_filename(None, "https://x.example.com/models/a.bin?sig=abc"), "a.bin");
    }

    #[test]
    fn empty_everything_falls_back_to_download() {
        assert_eq!(derive_filename(None, "https://x.example.com/"), "download");
    }

    #[test]
    fn strips_directory_separators() {
        let cd = r#"attachment; filename="../../etc/passwd""#;
        assert_eq!(derive_filename(Some(cd), "https://x/y"), "....etcpasswd");
    }
}
