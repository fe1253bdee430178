//! Where the service reads its config and writes its logs.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "ContasRag";
const APP_DIR_NAME_XDG: &str = "contas-rag";

#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Checkout or install root; holds the fallback `config.yml`.
    pub project_root: PathBuf,
    /// Per-user data directory; holds `config.yml`, `secrets.yaml` and `logs/`.
    pub user_data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub secrets_path: PathBuf,
}

impl AppPaths {
    /// Resolves directories from `CONTAS_RAG_ROOT` / `CONTAS_RAG_DATA_DIR`,
    /// falling back to the manifest or working directory and the platform
    /// data directory.
    pub fn new() -> Self {
        let project_root = env::var_os("CONTAS_RAG_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(default_project_root);
        let user_data_dir = env::var_os("CONTAS_RAG_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_data_dir(&project_root));
        Self::with_dirs(project_root, user_data_dir)
    }

    /// Uses the given directories and creates the data and log directories.
    pub fn with_dirs(project_root: PathBuf, user_data_dir: PathBuf) -> Self {
        let log_dir = user_data_dir.join("logs");
        if let Err(err) = fs::create_dir_all(&log_dir) {
            eprintln!("Failed to create {}: {}", log_dir.display(), err);
        }

        AppPaths {
            secrets_path: user_data_dir.join("secrets.yaml"),
            project_root,
            user_data_dir,
            log_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn default_project_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    if manifest_dir.join("config.yml").exists() {
        return manifest_dir;
    }
    env::current_dir().unwrap_or(manifest_dir)
}

/// Debug builds keep everything next to the checkout.
fn default_data_dir(project_root: &Path) -> PathBuf {
    if cfg!(debug_assertions) {
        return project_root.to_path_buf();
    }

    match env::consts::OS {
        "windows" => env::var_os("LOCALAPPDATA")
            .or_else(|| env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME),
        "macos" => home_dir()
            .join("Library/Application Support")
            .join(APP_DIR_NAME),
        _ => env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| home_dir().join(".local/share"))
            .join(APP_DIR_NAME_XDG),
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
