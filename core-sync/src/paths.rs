//! Remote path helpers.
//!
//! Remote paths are `/`-delimited and compared after normalization: a single
//! leading slash, no trailing slash, and `/` for the server root.

/// Normalize a folder path: leading `/`, no trailing `/`, empty becomes `/`.
pub fn normalize_folder_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Whether `path` equals `folder` or lies below it. `/` contains everything.
pub fn is_path_under_folder(path: &str, folder: &str) -> bool {
    let folder = normalize_folder_path(folder);
    if folder == "/" {
        return true;
    }
    let path = normalize_folder_path(path);
    path == folder
        || path
            .strip_prefix(folder.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Whether `path` lies under any of `folders`.
pub fn is_path_under_any<'a, I>(path: &str, folders: I) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    folders
        .into_iter()
        .any(|folder| is_path_under_folder(path, folder))
}

/// Directory containing `path`; `/` for top-level entries.
pub fn parent_folder_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) if !trimmed[..idx].trim().is_empty() => trimmed[..idx].to_string(),
        _ => "/".to_string(),
    }
}

/// Last segment of a path, empty for the root.
pub fn folder_name(path: &str) -> &str {
    let trimmed = path.trim().trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// File name without its final extension.
pub fn file_base_name(name: &str) -> &str {
    let name = folder_name(name);
    match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// Lowercase extension after the final `.`, empty when there is none.
pub fn extension_of(name: &str) -> String {
    let name = folder_name(name);
    match name.rfind('.') {
        Some(idx) => name[idx + 1..].to_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folder_path() {
        assert_eq!(normalize_folder_path(""), "/");
        assert_eq!(normalize_folder_path("/"), "/");
        assert_eq!(normalize_folder_path("  Music/ "), "/Music");
        assert_eq!(normalize_folder_path("/Music/Rock/"), "/Music/Rock");
        assert_eq!(normalize_folder_path("///"), "/");
    }

    #[test]
    fn test_path_under_folder() {
        assert!(is_path_under_folder("/Music/A.mp3", "/Music"));
        assert!(is_path_under_folder("/Music", "/Music/"));
        assert!(is_path_under_folder("/Anything/at/all.mp3", "/"));
        assert!(!is_path_under_folder("/Musical/A.mp3", "/Music"));
        assert!(!is_path_under_folder("/Podcasts/A.mp3", "/Music"));

        let folders = vec!["/Podcasts".to_string(), "/Music".to_string()];
        assert!(is_path_under_any("/Music/Live/B.flac", &folders));
        assert!(!is_path_under_any("/Audiobooks/C.m4b", &folders));
    }

    #[test]
    fn test_parent_and_names() {
        assert_eq!(parent_folder_path("/Music/Artist/Song.mp3"), "/Music/Artist");
        assert_eq!(parent_folder_path("/Song.mp3"), "/");
        assert_eq!(parent_folder_path("/Music/Artist/"), "/Music");
        assert_eq!(parent_folder_path("/"), "/");

        assert_eq!(folder_name("/Music/Artist/"), "Artist");
        assert_eq!(folder_name("/"), "");

        assert_eq!(file_base_name("/Music/01 - Intro.MP3"), "01 - Intro");
        assert_eq!(file_base_name("README"), "README");
        assert_eq!(extension_of("/Music/01 - Intro.MP3"), "mp3");
        assert_eq!(extension_of("/Music/notes"), "");
    }
}
