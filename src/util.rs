use std::path::{Path, PathBuf};

use crate::consts::{BLANK_PART, DIR_INDEX};

/// The `(type, directory, file name)` triple every logical path collapses
/// to. This is the lookup key used by the entry store and the layout of
/// the on-disk tree.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct PathTriple {
    pub directory: String,
    pub file_name: String,
    pub type_name: String,
}

/// Normalizes a logical path: backslashes become slashes, the directory is
/// stripped of leading and trailing separators, and a missing directory or
/// extension becomes the blank marker.
pub(crate) fn split_file_path(path: &str) -> PathTriple {
    let path = path.replace('\\', "/");

    let (directory, name) = match path.rfind('/') {
        Some(index) => (&path[..index], &path[index + 1..]),
        None => ("", &path[..]),
    };

    let (file_name, type_name) = match name.rfind('.') {
        Some(index) => (&name[..index], &name[index + 1..]),
        None => (name, ""),
    };

    let directory = directory.trim_matches('/');

    PathTriple {
        directory: if directory.is_empty() {
            BLANK_PART.to_owned()
        } else {
            directory.to_owned()
        },
        file_name: file_name.to_owned(),
        type_name: if type_name.is_empty() {
            BLANK_PART.to_owned()
        } else {
            type_name.to_owned()
        },
    }
}

/// Splits an archive path into its parent directory, its base name with
/// `.vpk` and a trailing `_dir` stripped, and whether the `_dir` marker
/// was present.
pub(crate) fn split_archive_name(path: &Path) -> (PathBuf, String, bool) {
    let dirpath = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let stem = name.strip_suffix(".vpk").unwrap_or(&name);
    let is_dir = stem.ends_with("_dir");
    let prefix = stem.strip_suffix("_dir").unwrap_or(stem).to_owned();

    (dirpath, prefix, is_dir)
}

/// Path of the file backing `chunk_index`: the directory file itself for
/// [`DIR_INDEX`], otherwise the sibling `<base>_NNN.vpk`.
pub(crate) fn archive_path(dirpath: &Path, prefix: &str, chunk_index: u16) -> PathBuf {
    if chunk_index == DIR_INDEX {
        dirpath.join(format!("{}_dir.vpk", prefix))
    } else {
        dirpath.join(format!("{}_{:03}.vpk", prefix, chunk_index))
    }
}

/// Maps a logical archive path to a filesystem path below `prefix`,
/// component by component so the platform separator is used.
pub(crate) fn vpk_path_to_fs(prefix: impl AsRef<Path>, path: &str) -> PathBuf {
    let mut buf = prefix.as_ref().to_path_buf();

    for item in path.split('/').filter(|item| !item.is_empty()) {
        buf.push(item);
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(directory: &str, file_name: &str, type_name: &str) -> PathTriple {
        PathTriple {
            directory: directory.to_owned(),
            file_name: file_name.to_owned(),
            type_name: type_name.to_owned(),
        }
    }

    #[test]
    fn empty_and_extensionless_paths() {
        assert_eq!(split_file_path(""), triple(" ", "", " "));
        assert_eq!(split_file_path("hello"), triple(" ", "hello", " "));
        assert_eq!(split_file_path("hello.txt"), triple(" ", "hello", "txt"));
        assert_eq!(split_file_path("folder/hello"), triple("folder", "hello", " "));
    }

    #[test]
    fn backslashes_collapse_to_slashes() {
        assert_eq!(split_file_path("a/b\\c\\d.txt"), triple("a/b/c", "d", "txt"));
        assert_eq!(
            split_file_path("addons\\chess\\chess.vdf"),
            triple("addons/chess", "chess", "vdf")
        );
    }

    #[test]
    fn leading_and_trailing_separators_are_trimmed() {
        assert_eq!(
            split_file_path("/addons/chess/chess.vdf"),
            triple("addons/chess", "chess", "vdf")
        );
        assert_eq!(
            split_file_path("\\addons/chess/chess.vdf"),
            triple("addons/chess", "chess", "vdf")
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        for path in [
            "addons\\chess\\chess.vdf",
            "/a/b/c.d",
            "hello",
            "x\\y/z",
            "deep/dir/tree/file.tar.gz",
        ] {
            let first = split_file_path(path);

            let mut joined = String::new();
            if first.directory != " " {
                joined.push_str(&first.directory);
                joined.push('/');
            }
            joined.push_str(&first.file_name);
            if first.type_name != " " {
                joined.push('.');
                joined.push_str(&first.type_name);
            }

            assert_eq!(split_file_path(&joined), first, "path: {:?}", path);
        }
    }

    #[test]
    fn archive_paths_are_zero_padded() {
        let dir = Path::new("/data");
        assert_eq!(
            archive_path(dir, "pak01", 7),
            PathBuf::from("/data/pak01_007.vpk")
        );
        assert_eq!(
            archive_path(dir, "pak01", DIR_INDEX),
            PathBuf::from("/data/pak01_dir.vpk")
        );
    }

    #[test]
    fn archive_name_stripping() {
        let (dir, prefix, is_dir) = split_archive_name(Path::new("/data/pak01_dir.vpk"));
        assert_eq!(dir, PathBuf::from("/data"));
        assert_eq!(prefix, "pak01");
        assert!(is_dir);

        let (_, prefix, is_dir) = split_archive_name(Path::new("single.vpk"));
        assert_eq!(prefix, "single");
        assert!(!is_dir);
    }
}
