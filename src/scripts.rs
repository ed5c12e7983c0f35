//! Install-script execution
//!
//! Packages may list scripts under `installers` in their manifest. Each one
//! runs in a child process with the package root as working directory and an
//! environment in which the bundled runtime shadows any system interpreter.
//! Scripts see nothing of the manager except the package id and root.

use crate::platform::current_os;
use crate::{Error, Result};
use std::env;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, info};

/// Lines of script output kept in a failure report
const FAILURE_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct ScriptRunner {
    interpreter: String,
    runtime_dir: Option<PathBuf>,
}

impl ScriptRunner {
    /// `interpreter` runs `.py` scripts; `runtime_dir` is the bundled
    /// environment whose executables take precedence on `PATH`
    pub fn new(interpreter: impl Into<String>, runtime_dir: Option<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            runtime_dir,
        }
    }

    /// Run `installers` in order; the first failure stops the rest
    pub fn run_all(&self, package_id: &str, package_root: &Path, installers: &[String]) -> Result<()> {
        for script in installers {
            info!("Executing installer path {:?}...", script);
            let path = resolve_script(package_root, script)?;
            self.run(package_id, package_root, script, &path)?;
        }
        Ok(())
    }

    fn run(&self, package_id: &str, package_root: &Path, name: &str, path: &Path) -> Result<()> {
        let mut cmd = self.command_for(path);
        cmd.current_dir(package_root)
            .env("PLUGPM_PACKAGE_ID", package_id)
            .env("PLUGPM_PACKAGE_ROOT", package_root)
            .env_remove("PYTHONHOME");

        if let Some(runtime) = self.runtime_dir.as_deref().filter(|d| d.is_dir()) {
            cmd.env("VIRTUAL_ENV", runtime);
            if let Some(path_var) = prepend_path(&runtime.join(current_os().runtime_bin_dir())) {
                cmd.env("PATH", path_var);
            }
        }

        let output = cmd.output().map_err(|e| Error::InstallScriptFailed {
            script: name.to_string(),
            status: format!("could not start: {}", e),
            output: String::new(),
        })?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!(script = name, "{}", line);
        }

        if output.status.success() {
            return Ok(());
        }

        let status = match output.status.code() {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };

        Err(Error::InstallScriptFailed {
            script: name.to_string(),
            status,
            output: failure_tail(&output),
        })
    }

    fn command_for(&self, script: &Path) -> Command {
        match script.extension().and_then(|e| e.to_str()) {
            Some("py") => {
                let mut cmd = Command::new(&self.interpreter);
                cmd.arg(script);
                cmd
            }
            Some("sh") => {
                let mut cmd = Command::new("sh");
                cmd.arg(script);
                cmd
            }
            Some("bat") | Some("cmd") if cfg!(windows) => {
                let mut cmd = Command::new("cmd.exe");
                cmd.arg("/C").arg(script);
                cmd
            }
            _ => Command::new(script),
        }
    }
}

/// Absolute path of a script, refusing anything outside the package root
fn resolve_script(package_root: &Path, script: &str) -> Result<PathBuf> {
    let relative = Path::new(script);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

    if script.is_empty() || escapes {
        return Err(Error::CorruptPackage(format!(
            "installer path {:?} must be relative to the package root",
            script
        )));
    }

    let path = package_root.join(relative);
    if !path.is_file() {
        return Err(Error::CorruptPackage(format!(
            "installer {:?} not found in package",
            script
        )));
    }
    Ok(path)
}

fn prepend_path(dir: &Path) -> Option<OsString> {
    let mut paths = vec![dir.to_path_buf()];
    if let Some(existing) = env::var_os("PATH") {
        paths.extend(env::split_paths(&existing));
    }
    env::join_paths(paths).ok()
}

fn failure_tail(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let start = lines.len().saturating_sub(FAILURE_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_rejects_escaping_paths() {
        let temp_dir = TempDir::new().unwrap();
        for bad in ["../evil.sh", "/etc/passwd", "", "a/../../b.sh"] {
            let err = resolve_script(temp_dir.path(), bad).unwrap_err();
            assert!(matches!(err, Error::CorruptPackage(_)), "{} accepted", bad);
        }
    }

    #[test]
    fn test_resolve_missing_script() {
        let temp_dir = TempDir::new().unwrap();
        let err = resolve_script(temp_dir.path(), "setup.sh").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_in_package_root_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("pkg");
        fs::create_dir_all(root.join("scripts")).unwrap();
        fs::write(root.join("first.sh"), "pwd > cwd.txt\necho first >> order.txt\n").unwrap();
        fs::write(
            root.join("scripts/second.sh"),
            "echo \"$PLUGPM_PACKAGE_ID\" >> order.txt\n",
        )
        .unwrap();

        let runner = ScriptRunner::new("python3", None);
        runner
            .run_all(
                "pkg",
                &root,
                &["first.sh".to_string(), "scripts/second.sh".to_string()],
            )
            .unwrap();

        let order = fs::read_to_string(root.join("order.txt")).unwrap();
        assert_eq!(order, "first\npkg\n");
        let cwd = fs::read_to_string(root.join("cwd.txt")).unwrap();
        assert_eq!(
            fs::canonicalize(cwd.trim()).unwrap(),
            fs::canonicalize(&root).unwrap()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_first_failure_stops_the_rest() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("fail.sh"), "echo broken >&2\nexit 3\n").unwrap();
        fs::write(root.join("after.sh"), "touch after-ran\n").unwrap();

        let runner = ScriptRunner::new("python3", None);
        let err = runner
            .run_all("pkg", root, &["fail.sh".to_string(), "after.sh".to_string()])
            .unwrap_err();

        match err {
            Error::InstallScriptFailed { script, status, output } => {
                assert_eq!(script, "fail.sh");
                assert_eq!(status, "exit code 3");
                assert!(output.contains("broken"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!root.join("after-ran").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_bundled_runtime_shadows_path() {
        let temp_dir = TempDir::new().unwrap();
        let runtime = temp_dir.path().join("runtime");
        fs::create_dir_all(runtime.join("bin")).unwrap();
        let root = temp_dir.path().join("pkg");
        fs::create_dir_all(&root).unwrap();
        fs::write(
            root.join("env.sh"),
            "echo \"$PATH\" > path.txt\necho \"$VIRTUAL_ENV\" > venv.txt\n",
        )
        .unwrap();

        let runner = ScriptRunner::new("python3", Some(runtime.clone()));
        runner.run_all("pkg", &root, &["env.sh".to_string()]).unwrap();

        let path = fs::read_to_string(root.join("path.txt")).unwrap();
        assert!(path.starts_with(&runtime.join("bin").display().to_string()));
        let venv = fs::read_to_string(root.join("venv.txt")).unwrap();
        assert_eq!(venv.trim(), runtime.display().to_string());
    }
}
