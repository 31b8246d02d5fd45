// src/storage/path_utils.rs

//! Conversions between user-facing storage paths and object keys.

/// Strip leading and trailing slashes. The root (`/` or empty) becomes `""`.
pub fn normalize_path(path: &str) -> String {
    path.trim_matches('/').to_string()
}

/// Join a folder key and a child name without doubling separators.
pub fn join_key(folder: &str, name: &str) -> String {
    let folder = normalize_path(folder);
    let name = name.trim_start_matches('/');
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    }
}

/// Last segment of a key, i.e. the file name.
pub fn file_name(key: &str) -> &str {
    key.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(key)
}

/// Display form of a key, with a leading slash.
pub fn display_path(key: &str) -> String {
    format!("/{}", normalize_path(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_surrounding_slashes() {
        assert_eq!(normalize_path("/logs/"), "logs");
        assert_eq!(normalize_path("//a/b"), "a/b");
        assert_eq!(normalize_path("/"), "");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn join_at_root_uses_bare_name() {
        assert_eq!(join_key("/", "a.csv"), "a.csv");
        assert_eq!(join_key("/logs/", "a.log"), "logs/a.log");
    }

    #[test]
    fn file_name_is_last_segment() {
        assert_eq!(file_name("logs/2024/app.log"), "app.log");
        assert_eq!(file_name("app.log"), "app.log");
    }
}
