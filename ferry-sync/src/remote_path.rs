//! POSIX path arithmetic for remote paths, independent of the local OS.

/// Lexically normalise `path`: collapse repeated slashes, drop `.` segments,
/// resolve `..` where possible and strip trailing slashes.
pub fn clean(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// `base/name`, cleaned.
pub fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        return clean(name);
    }
    clean(&format!("{base}/{name}"))
}

/// Everything but the last element of `path`, cleaned.
pub fn parent(path: &str) -> String {
    let cleaned = clean(path);
    match cleaned.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => cleaned[..idx].to_string(),
        None => ".".to_string(),
    }
}

/// Split into the directory and the last element.
pub fn split(path: &str) -> (String, String) {
    let cleaned = clean(path);
    let name = cleaned.rsplit('/').next().unwrap_or_default().to_string();
    (parent(&cleaned), name)
}
