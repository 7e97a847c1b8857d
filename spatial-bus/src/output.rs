//! Output path resolution, overwrite confirmation and partial-output cleanup.

use std::path::{Path, PathBuf};

use crate::error::{MediaError, Result};
use crate::frame::Eye;

/// Asks whether an existing destination may be replaced.
pub trait OverwritePrompt {
    fn confirm_overwrite(&mut self, path: &Path) -> bool;
}

/// Non-interactive answer to every overwrite question.
#[derive(Debug, Clone, Copy)]
pub struct AssumeAnswer(pub bool);

impl OverwritePrompt for AssumeAnswer {
    fn confirm_overwrite(&mut self, path: &Path) -> bool {
        log::info!(
            "{} exists, {}",
            path.display(),
            if self.0 { "overwriting" } else { "keeping it" }
        );
        self.0
    }
}

/// Makes `path` writable: absent paths pass, existing ones are removed only
/// after the prompt agrees.
pub fn prepare_output(path: &Path, prompt: &mut dyn OverwritePrompt) -> Result<PathBuf> {
    if !path.exists() {
        return Ok(path.to_path_buf());
    }
    log::warn!("file already exists: {}", path.display());
    if !prompt.confirm_overwrite(path) {
        log::error!("aborting, {} left untouched", path.display());
        return Err(MediaError::create_output(path, "file exists and overwrite was declined"));
    }
    std::fs::remove_file(path).map_err(|e| MediaError::create_output(path, e))?;
    Ok(path.to_path_buf())
}

/// `<dir>/<basename>_LEFT.mov` and `<dir>/<basename>_RIGHT.mov`.
pub fn split_output_paths(input: &Path, output_dir: Option<&Path>) -> Result<(PathBuf, PathBuf)> {
    let basename = input
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            MediaError::invalid(format!("input path {} has no file name", input.display()))
        })?;
    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().map_err(|e| MediaError::create_output(".", e))?,
    };
    log::info!("writing output files to {}", dir.display());
    Ok((
        dir.join(format!("{}_LEFT.mov", basename)),
        dir.join(format!("{}_RIGHT.mov", basename)),
    ))
}

/// `output_left.mov` / `output_right.mov` in the current directory.
pub fn extract_output_path(eye: Eye) -> Result<PathBuf> {
    let dir = std::env::current_dir().map_err(|e| MediaError::create_output(".", e))?;
    Ok(dir.join(format!("output_{}.mov", eye.label())))
}

/// Removes tracked outputs on drop unless the run completed.
pub struct OutputGuard {
    paths: Vec<PathBuf>,
    armed: bool,
}

impl OutputGuard {
    /// `remove_on_failure` false makes the guard a no-op.
    pub fn new(remove_on_failure: bool) -> Self {
        Self {
            paths: Vec::new(),
            armed: remove_on_failure,
        }
    }

    pub fn track(&mut self, path: &Path) {
        self.paths.push(path.to_path_buf());
    }

    /// Call once every output is finalized.
    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => log::info!("removed partial output {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("could not remove partial output {}: {}", path.display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recording {
        asked: Vec<PathBuf>,
        answer: bool,
    }

    impl OverwritePrompt for Recording {
        fn confirm_overwrite(&mut self, path: &Path) -> bool {
            self.asked.push(path.to_path_buf());
            self.answer
        }
    }

    #[test]
    fn missing_path_is_not_prompted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.mov");
        let mut prompt = Recording {
            asked: vec![],
            answer: false,
        };
        assert_eq!(prepare_output(&path, &mut prompt).unwrap(), path);
        assert!(prompt.asked.is_empty());
    }

    #[test]
    fn declined_overwrite_keeps_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken.mov");
        std::fs::write(&path, b"original").unwrap();
        let mut prompt = Recording {
            asked: vec![],
            answer: false,
        };
        let err = prepare_output(&path, &mut prompt).unwrap_err();
        assert!(matches!(err, MediaError::CreateOutputError { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"original");
        assert_eq!(prompt.asked, vec![path]);
    }

    #[test]
    fn accepted_overwrite_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken.mov");
        std::fs::write(&path, b"original").unwrap();
        prepare_output(&path, &mut AssumeAnswer(true)).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn split_paths_use_input_basename() {
        let (left, right) =
            split_output_paths(Path::new("/in/clip.final.mov"), Some(Path::new("/out"))).unwrap();
        assert_eq!(left, Path::new("/out/clip.final_LEFT.mov"));
        assert_eq!(right, Path::new("/out/clip.final_RIGHT.mov"));
        assert!(split_output_paths(Path::new("/"), Some(Path::new("/out"))).is_err());
    }

    #[test]
    fn armed_guard_removes_tracked_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("kept.mov");
        let removed = dir.path().join("removed.mov");
        std::fs::write(&kept, b"x").unwrap();
        std::fs::write(&removed, b"x").unwrap();
        {
            let mut guard = OutputGuard::new(false);
            guard.track(&kept);
        }
        {
            let mut guard = OutputGuard::new(true);
            guard.track(&removed);
        }
        assert!(kept.exists());
        assert!(!removed.exists());
    }
}
