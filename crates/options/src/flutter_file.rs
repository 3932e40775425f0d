//! Recognizing Dart files and their project roots.

use std::path::{Path, PathBuf};

/// Extension of files handled by the Flutter options.
pub const EXTENSION: &str = "dart";

/// File marking the root of a Dart/Flutter package.
pub const PUBSPEC: &str = "pubspec.yaml";

/// Whether `path` names a Dart source file.
pub fn is_flutter_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(EXTENSION)
}

/// Nearest ancestor directory of `file` holding a `pubspec.yaml`, falling
/// back to the file's own directory.
pub fn discover_root(file: &Path) -> PathBuf {
    let start = file.parent().unwrap_or(file);
    start
        .ancestors()
        .find(|dir| dir.join(PUBSPEC).is_file())
        .unwrap_or(start)
        .to_path_buf()
}
