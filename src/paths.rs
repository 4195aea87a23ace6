use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::Local;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the default output root: `<exe_dir>/output/`
pub fn get_output_dir() -> PathBuf {
    get_exe_dir().join("output")
}

/// Absolute paths pass through; relative ones are taken from the exe directory.
pub fn resolve(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        get_exe_dir().join(path)
    }
}

/// Creates `<root>/YYYYMMDD_HHMMSS/` for one run.
pub fn create_session_dir(root: &Path) -> std::io::Result<PathBuf> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let dir = root.join(timestamp);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Ensures the log directory exists. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_keeps_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve(dir.path()), dir.path());
        assert_eq!(resolve("config.json"), get_exe_dir().join("config.json"));
    }

    #[test]
    fn test_create_session_dir() {
        let root = tempfile::tempdir().unwrap();
        let session = create_session_dir(root.path()).unwrap();
        assert!(session.is_dir());
        assert_eq!(session.file_name().unwrap().len(), "YYYYMMDD_HHMMSS".len());
    }
}
