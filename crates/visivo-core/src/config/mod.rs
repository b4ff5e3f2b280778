use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};
use serde::Serialize;

pub const DEFAULT_PROJECT_FILE: &str = "project.json";

/// Absolute paths a command runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimePaths {
    pub home_dir: PathBuf,
    pub cwd: PathBuf,
    pub project_file: PathBuf,
}

/// Per-run overrides layered over the project document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunOptions {
    /// Target used by traces that name none, ahead of `defaults.target_name`.
    pub default_target: Option<String>,
}

impl RunOptions {
    #[must_use]
    pub fn with_default_target(name: impl Into<String>) -> Self {
        Self {
            default_target: Some(name.into()),
        }
    }
}

pub fn resolve_runtime_paths(
    home_dir: &Path,
    cwd: &Path,
    project_file: Option<&Path>,
) -> Result<RuntimePaths> {
    for (label, path) in [("home_dir", home_dir), ("cwd", cwd)] {
        if !path.is_absolute() {
            bail!("{label} must be absolute: {}", path.display());
        }
    }

    let home_dir = normalize_lexical(home_dir);
    let cwd = normalize_lexical(cwd);
    let project_file = match project_file {
        Some(path) => resolve_user_path(path, &home_dir, &cwd)?,
        None => cwd.join(DEFAULT_PROJECT_FILE),
    };

    Ok(RuntimePaths {
        home_dir,
        cwd,
        project_file,
    })
}

/// Expands a leading `~` against `home_dir` and anchors relative paths at
/// `cwd`.
pub fn resolve_user_path(path: &Path, home_dir: &Path, cwd: &Path) -> Result<PathBuf> {
    let expanded = expand_home(path, home_dir)?;
    let anchored = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };
    Ok(normalize_lexical(&anchored))
}

fn expand_home(path: &Path, home_dir: &Path) -> Result<PathBuf> {
    let mut components = path.components();
    let Some(Component::Normal(first)) = components.next() else {
        return Ok(path.to_path_buf());
    };

    if first == "~" {
        return Ok(components.fold(home_dir.to_path_buf(), |mut expanded, component| {
            expanded.push(component.as_os_str());
            expanded
        }));
    }
    if first.to_str().is_some_and(|segment| segment.starts_with('~')) {
        bail!(
            "only `~` and `~/...` home expansion is supported: {}",
            path.display()
        );
    }
    Ok(path.to_path_buf())
}

/// Resolves `.` and `..` without touching the filesystem.
fn normalize_lexical(path: &Path) -> PathBuf {
    path.components()
        .fold(PathBuf::new(), |mut normalized, component| {
            match component {
                Component::CurDir => {}
                Component::ParentDir if normalized.pop() => {}
                _ => normalized.push(component.as_os_str()),
            }
            normalized
        })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{RunOptions, resolve_runtime_paths};

    #[test]
    fn project_file_defaults_to_cwd() {
        let paths = resolve_runtime_paths(Path::new("/home/analyst"), Path::new("/srv/bi/"), None)
            .expect("paths should resolve");

        assert_eq!(paths.cwd, Path::new("/srv/bi"));
        assert_eq!(paths.project_file, Path::new("/srv/bi/project.json"));
    }

    #[test]
    fn project_file_expands_home() {
        let paths = resolve_runtime_paths(
            Path::new("/home/analyst"),
            Path::new("/srv/bi"),
            Some(Path::new("~/projects/sales.json")),
        )
        .expect("tilde path should resolve");

        assert_eq!(
            paths.project_file,
            Path::new("/home/analyst/projects/sales.json")
        );
    }

    #[test]
    fn relative_project_file_is_normalized_against_cwd() {
        let paths = resolve_runtime_paths(
            Path::new("/home/analyst"),
            Path::new("/srv/bi"),
            Some(Path::new("./defs/../defs/project.json")),
        )
        .expect("relative path should resolve");

        assert_eq!(paths.project_file, Path::new("/srv/bi/defs/project.json"));
    }

    #[test]
    fn relative_cwd_is_rejected() {
        let error = resolve_runtime_paths(Path::new("/home/analyst"), Path::new("srv"), None)
            .expect_err("relative cwd must fail");
        assert!(error.to_string().contains("cwd must be absolute"), "{error}");
    }

    #[test]
    fn other_users_home_is_rejected() {
        let error = resolve_runtime_paths(
            Path::new("/home/analyst"),
            Path::new("/srv/bi"),
            Some(Path::new("~admin/project.json")),
        )
        .expect_err("~user syntax must fail");
        assert!(error.to_string().contains("home expansion"), "{error}");
    }

    #[test]
    fn run_options_carry_an_optional_default_target() {
        assert_eq!(RunOptions::default().default_target, None);
        assert_eq!(
            RunOptions::with_default_target("local").default_target.as_deref(),
            Some("local")
        );
    }
}
