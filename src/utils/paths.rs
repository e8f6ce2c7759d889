use std::env;
use std::path::PathBuf;

fn normalize_env_path(value: Option<String>) -> Option<PathBuf> {
    let raw = value?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    if lowered == "undefined" || lowered == "null" {
        return None;
    }
    Some(PathBuf::from(trimmed))
}

fn resolve_home_dir() -> Option<PathBuf> {
    env::var("HOME").ok().map(PathBuf::from)
}

fn resolve_xdg_state_dir() -> Option<PathBuf> {
    if let Some(path) = normalize_env_path(env::var("XDG_STATE_HOME").ok()) {
        return Some(path);
    }
    resolve_home_dir().map(|home| home.join(".local").join("state"))
}

pub fn resolve_data_dir() -> PathBuf {
    if let Some(path) = normalize_env_path(env::var("PROBEFLEX_DATA_DIR").ok()) {
        return path;
    }
    if let Some(path) = resolve_xdg_state_dir() {
        return path.join("probeflex");
    }
    env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".probeflex")
}

pub fn resolve_history_db_path() -> PathBuf {
    if let Some(path) = normalize_env_path(env::var("PROBEFLEX_HISTORY_DB").ok()) {
        return path;
    }
    resolve_data_dir().join("history.sqlite3")
}

pub fn resolve_templates_path() -> PathBuf {
    if let Some(path) = normalize_env_path(env::var("PROBEFLEX_TEMPLATES_PATH").ok()) {
        return path;
    }
    resolve_data_dir().join("templates.json")
}
