//! Remote path helpers.
//!
//! Remote paths are always `/`-separated strings, independent of the local
//! platform, so none of these go through `std::path`.

/// Join a directory and an entry name with exactly one `/`.
pub fn join_remote(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

pub fn strip_leading_slashes(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Collapse duplicate separators and drop a trailing one, keeping `/` for
/// the root. Used to key the walker's visited set.
pub fn normalize_dir(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        if path.starts_with('/') || path.is_empty() {
            return "/".to_string();
        }
        return ".".to_string();
    }
    let joined = segments.join("/");
    if path.starts_with('/') {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Absolute upload target for `name` under `base`.
///
/// `base` is trimmed of leading and trailing slashes so exactly one separator
/// sits on each side of it.
pub fn publish_target(base: &str, name: &str) -> String {
    let base = base.trim_matches('/');
    let name = strip_leading_slashes(name);
    if base.is_empty() {
        format!("/{name}")
    } else {
        format!("/{base}/{name}")
    }
}

/// Directory part of an absolute remote path (`/` for top-level entries).
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// Cumulative prefixes of an absolute directory path:
/// `/a/b/c` yields `/a`, `/a/b`, `/a/b/c`.
pub fn ancestor_chain(dir: &str) -> Vec<String> {
    let mut current = String::new();
    dir.split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            current.push('/');
            current.push_str(segment);
            current.clone()
        })
        .collect()
}

/// Check that a file name is a plain relative path that cannot escape the
/// publish base.
pub fn validate_relative_name(name: &str) -> Result<(), String> {
    let trimmed = strip_leading_slashes(name);
    if trimmed.is_empty() {
        return Err("file name must not be empty".to_string());
    }
    for segment in trimmed.split('/') {
        match segment {
            "" => return Err(format!("file name has an empty path segment: {name}")),
            "." | ".." => {
                return Err(format!("file name must not contain '{segment}' segments: {name}"))
            }
            _ => {}
        }
    }
    Ok(())
}
