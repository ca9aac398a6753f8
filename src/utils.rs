//! Utility functions for output naming and path manipulation

use crate::config::FileCollisionAction;
use crate::error::{Error, Result};
use crate::playlist::Resolution;
use crate::types::Container;
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Maximum title length kept in file names, in characters
const MAX_TITLE_CHARS: usize = 120;

/// Title used when none survives cleaning
const DEFAULT_TITLE: &str = "video";

/// Characters that are not allowed in file names on common platforms
const RESERVED_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Make `title` safe for use as a file name
///
/// Reserved characters become `_`, the result is cut to 120 characters and
/// trimmed, and an empty result falls back to `video`.
///
/// # Examples
///
/// ```
/// use hls_dl::utils::clean_title;
///
/// assert_eq!(clean_title("Live: Day 1/2"), "Live_ Day 1_2");
/// assert_eq!(clean_title("   "), "video");
/// ```
#[must_use]
pub fn clean_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| if RESERVED_CHARS.contains(&c) { '_' } else { c })
        .take(MAX_TITLE_CHARS)
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Output file name: `<title>[_<W>x<H>].<ext>`
///
/// # Examples
///
/// ```
/// use hls_dl::utils::output_file_name;
/// use hls_dl::playlist::Resolution;
/// use hls_dl::Container;
///
/// let res = Resolution { width: 1920, height: 1080 };
/// assert_eq!(output_file_name(Some("Talk"), Some(res), Container::Mp4), "Talk_1920x1080.mp4");
/// assert_eq!(output_file_name(None, None, Container::Ts), "video.ts");
/// ```
#[must_use]
pub fn output_file_name(
    title: Option<&str>,
    resolution: Option<Resolution>,
    container: Container,
) -> String {
    let title = clean_title(title.unwrap_or_default());
    match resolution {
        Some(resolution) => format!("{title}_{resolution}.{}", container.extension()),
        None => format!("{title}.{}", container.extension()),
    }
}

/// Get a unique path for a file, handling collisions according to the specified action
///
/// A path counts as taken when the file or its in-progress `.part` file exists.
///
/// # Arguments
///
/// * `path` - The desired file path
/// * `action` - How to handle file collisions
///
/// # Returns
///
/// Returns the final path to use. For Rename action, this may have a suffix added.
/// For Overwrite action, returns the original path unchanged.
///
/// # Examples
///
/// ```
/// use hls_dl::utils::get_unique_path;
/// use hls_dl::config::FileCollisionAction;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/movie.mp4");
/// let unique = get_unique_path(path, FileCollisionAction::Rename).unwrap();
/// // If /tmp/movie.mp4 exists, returns /tmp/movie (1).mp4
/// // If that exists too, returns /tmp/movie (2).mp4, etc.
/// ```
pub fn get_unique_path(path: &Path, action: FileCollisionAction) -> Result<PathBuf> {
    get_unique_path_with(path, action, |_| false)
}

/// [`get_unique_path`] that also avoids every path for which `in_use` is true
///
/// Paths in use are never handed out, even with
/// [`FileCollisionAction::Overwrite`]: overwriting replaces finished files,
/// not output another session is still writing.
pub fn get_unique_path_with(
    path: &Path,
    action: FileCollisionAction,
    in_use: impl Fn(&Path) -> bool,
) -> Result<PathBuf> {
    let taken = |candidate: &Path| in_use(candidate) || is_taken(candidate);
    let available = match action {
        FileCollisionAction::Overwrite => !in_use(path),
        FileCollisionAction::Rename => !taken(path),
    };
    if available {
        return Ok(path.to_path_buf());
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
        Error::Other(format!(
            "cannot extract file stem from {}",
            path.display()
        ))
    })?;
    let extension = path.extension().and_then(|e| e.to_str());
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    // Try adding (1), (2), (3), ... until we find a unique name
    for i in 1..=MAX_RENAME_ATTEMPTS {
        let new_name = match extension {
            Some(ext) => format!("{stem} ({i}).{ext}"),
            None => format!("{stem} ({i})"),
        };
        let new_path = parent.join(new_name);
        if !taken(&new_path) {
            return Ok(new_path);
        }
    }

    Err(Error::Io(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!(
            "could not find a unique file name for {} after {MAX_RENAME_ATTEMPTS} attempts",
            path.display()
        ),
    )))
}

fn is_taken(path: &Path) -> bool {
    if path.exists() {
        return true;
    }
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    Path::new(&part).exists()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn test_get_unique_path_no_collision() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clip.ts");

        let result = get_unique_path(&path, FileCollisionAction::Rename).unwrap();
        assert_eq!(result, path);
    }

    #[test]
    fn test_get_unique_path_rename_with_collision() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clip.mp4");
        File::create(&path).unwrap();

        let result = get_unique_path(&path, FileCollisionAction::Rename).unwrap();
        assert_eq!(result, temp_dir.path().join("clip (1).mp4"));
    }

    #[test]
    fn test_get_unique_path_rename_multiple_collisions() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clip.mp4");
        File::create(&path).unwrap();
        File::create(temp_dir.path().join("clip (1).mp4")).unwrap();
        File::create(temp_dir.path().join("clip (2).mp4")).unwrap();

        let result = get_unique_path(&path, FileCollisionAction::Rename).unwrap();
        assert_eq!(result, temp_dir.path().join("clip (3).mp4"));
    }

    #[test]
    fn test_get_unique_path_part_file_counts_as_taken() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clip.ts");
        File::create(temp_dir.path().join("clip.ts.part")).unwrap();

        let result = get_unique_path(&path, FileCollisionAction::Rename).unwrap();
        assert_eq!(result, temp_dir.path().join("clip (1).ts"));
    }

    #[test]
    fn test_get_unique_path_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clip.ts");
        File::create(&path).unwrap();

        let result = get_unique_path(&path, FileCollisionAction::Overwrite).unwrap();
        assert_eq!(result, path);
    }

    #[test]
    fn test_get_unique_path_with_skips_paths_in_use() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clip.ts");
        let busy = path.clone();

        let result =
            get_unique_path_with(&path, FileCollisionAction::Rename, |p| p == busy).unwrap();
        assert_eq!(result, temp_dir.path().join("clip (1).ts"));
    }

    #[test]
    fn test_get_unique_path_with_overwrite_still_avoids_paths_in_use() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clip.ts");
        File::create(&path).unwrap();
        let busy = path.clone();

        // a finished file is overwritten
        let result =
            get_unique_path_with(&path, FileCollisionAction::Overwrite, |_| false).unwrap();
        assert_eq!(result, path);

        // a file another session is writing is not
        let result =
            get_unique_path_with(&path, FileCollisionAction::Overwrite, |p| p == busy).unwrap();
        assert_eq!(result, temp_dir.path().join("clip (1).ts"));
    }

    #[test]
    fn test_clean_title_replaces_reserved_characters() {
        assert_eq!(clean_title(r#"a\b/c:d*e?f"g<h>i|j"#), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn test_clean_title_truncates_and_trims() {
        let long = "x".repeat(200);
        assert_eq!(clean_title(&long).chars().count(), 120);

        // trimming happens after truncation
        let padded = format!("{}   tail", "y".repeat(118));
        assert_eq!(clean_title(&padded), "y".repeat(118));

        assert_eq!(clean_title("  spaced  "), "spaced");
    }

    #[test]
    fn test_clean_title_defaults_to_video() {
        assert_eq!(clean_title(""), "video");
        assert_eq!(clean_title(" \t "), "video");
    }

    #[test]
    fn test_output_file_name() {
        let res = Resolution {
            width: 1280,
            height: 720,
        };
        assert_eq!(
            output_file_name(Some("Keynote?"), Some(res), Container::Ts),
            "Keynote__1280x720.ts"
        );
        assert_eq!(
            output_file_name(Some(""), None, Container::Mp4),
            "video.mp4"
        );
    }
}
