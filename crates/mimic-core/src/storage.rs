//! Macro persistence: JSON documents holding an ordered list of actions.

use crate::repository::SharedRepository;
use crate::{Action, MacroError, MacroResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File extension used for macros stored by name.
pub const MACRO_EXTENSION: &str = "json";

/// Get the app data directory for mimic.
pub fn get_app_data_dir() -> PathBuf {
    let base = dirs_next::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("mimic")
}

/// Directory holding macros saved by name.
pub fn get_macros_dir() -> PathBuf {
    get_app_data_dir().join("macros")
}

/// Turn a user-supplied macro reference into a path.
///
/// Anything that looks like a path (has a separator or an extension) is used
/// verbatim; a bare name resolves into [`get_macros_dir`].
pub fn resolve_macro_path(reference: &str) -> MacroResult<PathBuf> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err(MacroError::Configuration("file path cannot be empty".into()));
    }
    let path = Path::new(trimmed);
    if path.components().count() > 1 || path.extension().is_some() {
        return Ok(path.to_path_buf());
    }
    Ok(get_macros_dir().join(format!("{}.{}", sanitize_filename(trimmed), MACRO_EXTENSION)))
}

/// List macros saved by name.
pub fn list_macros() -> MacroResult<Vec<String>> {
    let dir = get_macros_dir();
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e == MACRO_EXTENSION).unwrap_or(false) {
            if let Some(name) = path.file_stem() {
                names.push(name.to_string_lossy().to_string());
            }
        }
    }

    names.sort();
    Ok(names)
}

/// Write `actions` to `path`. Refuses an empty sequence.
pub fn save_actions(path: &Path, actions: &[Action]) -> MacroResult<()> {
    check_path(path)?;
    if actions.is_empty() {
        return Err(MacroError::EmptyState("no actions to save".into()));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(actions)?;
    fs::write(path, json)?;

    info!(?path, count = actions.len(), "Saved macro");
    Ok(())
}

/// Read a non-empty action list from `path`.
pub fn load_actions(path: &Path) -> MacroResult<Vec<Action>> {
    check_path(path)?;
    if !path.is_file() {
        return Err(MacroError::NotFound(path.to_path_buf()));
    }

    let json = fs::read_to_string(path)?;
    let actions: Vec<Action> = serde_json::from_str(&json)?;
    if actions.is_empty() {
        return Err(MacroError::EmptyState("loaded file is empty".into()));
    }

    debug!(?path, count = actions.len(), "Loaded macro");
    Ok(actions)
}

fn check_path(path: &Path) -> MacroResult<()> {
    if path.as_os_str().to_string_lossy().trim().is_empty() {
        return Err(MacroError::Configuration("file path cannot be empty".into()));
    }
    Ok(())
}

/// Save/load bound to the live repository.
pub struct MacroStorage {
    repository: SharedRepository,
}

impl MacroStorage {
    pub fn new(repository: SharedRepository) -> Self {
        Self { repository }
    }

    pub fn save(&self, path: &Path) -> MacroResult<()> {
        save_actions(path, &self.repository.snapshot())
    }

    /// Replace the repository content with the file's actions. On any error
    /// the repository is left untouched.
    pub fn load(&self, path: &Path) -> MacroResult<usize> {
        let actions = load_actions(path)?;
        self.repository.replace(&actions);
        Ok(actions.len())
    }
}

/// Sanitize a macro name to be a valid filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::ActionRepository;
    use crate::MouseButton;
    use std::time::Duration;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("My Macro"), "My Macro");
        assert_eq!(sanitize_filename("a:b*c?d"), "a_b_c_d");
    }

    #[test]
    fn test_resolve_macro_path() {
        assert!(matches!(resolve_macro_path("  "), Err(MacroError::Configuration(_))));
        assert_eq!(
            resolve_macro_path("out/run.json").unwrap(),
            PathBuf::from("out/run.json")
        );
        assert_eq!(
            resolve_macro_path("daily").unwrap(),
            get_macros_dir().join("daily.json")
        );
    }

    #[test]
    fn test_save_refuses_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MacroStorage::new(ActionRepository::shared());
        let err = storage.save(&dir.path().join("m.json")).unwrap_err();
        assert!(matches!(err, MacroError::EmptyState(_)));
        assert!(!dir.path().join("m.json").exists());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_actions(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, MacroError::NotFound(_)));
    }

    #[test]
    fn test_load_rejects_empty_and_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.json");
        fs::write(&empty, "[]").unwrap();
        assert!(matches!(load_actions(&empty), Err(MacroError::EmptyState(_))));

        let garbage = dir.path().join("garbage.json");
        fs::write(&garbage, "{ not json").unwrap();
        assert!(matches!(load_actions(&garbage), Err(MacroError::Json(_))));
    }

    #[test]
    fn test_failed_load_keeps_repository() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ActionRepository::shared();
        repo.add(Action::keyboard(Duration::ZERO, 0x41, true));
        let storage = MacroStorage::new(repo.clone());

        assert!(storage.load(&dir.path().join("missing.json")).is_err());
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_load_replaces_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("m.json");
        save_actions(
            &path,
            &[Action::mouse(Duration::from_millis(7), 4, 5, MouseButton::Middle, true, 0)],
        )
        .unwrap();

        let repo = ActionRepository::shared();
        repo.add(Action::keyboard(Duration::ZERO, 0x41, true));
        repo.add(Action::keyboard(Duration::ZERO, 0x41, false));
        let loaded = MacroStorage::new(repo.clone()).load(&path).unwrap();

        assert_eq!(loaded, 1);
        assert_eq!(repo.snapshot()[0].input.button(), Some(MouseButton::Middle));
    }
}
