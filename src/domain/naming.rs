use std::path::{Component, Path};

/// tmux rejects `.` and `:` in session names, and `/` and spaces make
/// targets awkward to type.
pub fn sanitize_session_name(name: &str) -> String {
    name.chars()
        .map(|ch| match ch {
            '/' | '.' | ':' | ' ' => '-',
            other => other,
        })
        .collect()
}

/// The last `depth` components of `path`, joined with `/`.
pub fn display_path(path: &Path, depth: usize) -> String {
    let parts = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>();
    let start = parts.len().saturating_sub(depth.max(1));
    parts[start..].join("/")
}

pub fn session_name_for_path(path: &Path, depth: usize) -> String {
    sanitize_session_name(&display_path(path, depth))
}
