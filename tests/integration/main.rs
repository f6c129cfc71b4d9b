//! Integration tests for cached-venv

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    /// Command isolated from the user's config and the runner environment
    fn cached_venv(dir: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("cached-venv");
        cmd.arg("--config")
            .arg(dir.path().join("config.toml"))
            .env("CACHED_VENV_DIR", dir.path().join("store"))
            .env_remove("GITHUB_OUTPUT")
            .env_remove("GITHUB_PATH")
            .env_remove("RUNNER_OS")
            .env_remove("RUNNER_ARCH")
            .env_remove("GITHUB_WORKSPACE");
        cmd
    }

    fn env_args(dir: &TempDir, os: &str) -> Vec<String> {
        vec![
            "--name".to_string(),
            "unit-tests".to_string(),
            "--cache-seed".to_string(),
            "abc123".to_string(),
            "--os".to_string(),
            os.to_string(),
            "--arch".to_string(),
            "X64".to_string(),
            "--workspace".to_string(),
            dir.path().join("ws").display().to_string(),
        ]
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        cached_venv(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Cached Python virtual environments"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        cached_venv(&dir)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("cached-venv"));
    }

    #[test]
    fn key_prints_composite_key() {
        let dir = TempDir::new().unwrap();
        cached_venv(&dir)
            .arg("key")
            .args(env_args(&dir, "Linux"))
            .args(["--python-version", "3.10"])
            .assert()
            .success()
            .stdout("abc123|Linux|X64|cached-venv|3.10|unit-tests\n");
    }

    #[test]
    fn key_rejects_unknown_os() {
        let dir = TempDir::new().unwrap();
        cached_venv(&dir)
            .arg("key")
            .args(env_args(&dir, "plan9"))
            .args(["--python-version", "3.10"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unsupported platform: plan9"));
    }

    #[test]
    fn key_rejects_empty_name() {
        let dir = TempDir::new().unwrap();
        cached_venv(&dir)
            .args(["key", "--name", "", "--cache-seed", "s", "--os", "Linux"])
            .args(["--python-version", "3.10"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("must not be empty"));
    }

    #[test]
    fn key_rejects_name_with_path() {
        let dir = TempDir::new().unwrap();
        cached_venv(&dir)
            .args(["key", "--name", "../escape", "--cache-seed", "s", "--os", "Linux"])
            .args(["--python-version", "3.10"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("single path component"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn key_rejects_multiline_seed() {
        let dir = TempDir::new().unwrap();
        cached_venv(&dir)
            .args(["key", "--name", "n", "--os", "Linux"])
            .args(["--cache-seed", "abc\npython-executable=/evil/python"])
            .args(["--python-version", "3.10"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("line break"));
    }

    #[test]
    fn provision_without_interpreter_fails() {
        let dir = TempDir::new().unwrap();
        cached_venv(&dir)
            .arg("provision")
            .args(env_args(&dir, "Linux"))
            .args(["--python", "definitely-not-a-python-binary"])
            .args(["--python-version", "3.10"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Python interpreter not found"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn config_path_uses_flag() {
        let dir = TempDir::new().unwrap();
        cached_venv(&dir)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let dir = TempDir::new().unwrap();
        cached_venv(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[venv]"))
            .stdout(predicate::str::contains("python3"));
    }

    #[test]
    fn cache_list_empty() {
        let dir = TempDir::new().unwrap();
        cached_venv(&dir)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached environments found."));
    }

    #[cfg(unix)]
    mod with_fake_python {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;

        /// Shell script standing in for `python3 -m venv --upgrade <path>`
        fn fake_interpreter(dir: &Path) -> String {
            let script = dir.join("fake-python");
            std::fs::write(
                &script,
                "#!/bin/sh\n\
                 if [ \"$1\" = \"--version\" ]; then echo 'Python 3.10.4'; exit 0; fi\n\
                 mkdir -p \"$4/bin\" && touch \"$4/bin/python\"\n",
            )
            .unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
            script.display().to_string()
        }

        #[test]
        fn provision_save_then_hit() {
            let dir = TempDir::new().unwrap();
            let python = fake_interpreter(dir.path());
            let env_dir = dir.path().join("ws/.venvs/py3.10/unit-tests");

            let output = cached_venv(&dir)
                .arg("provision")
                .args(env_args(&dir, "Linux"))
                .args(["--python", &python, "--format", "json"])
                .output()
                .unwrap();
            assert!(output.status.success());
            let first: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
            assert_eq!(first["cache_hit"], false);
            assert_eq!(
                first["cache_key"],
                "abc123|Linux|X64|cached-venv|3.10|unit-tests"
            );
            assert!(first["python_executable"]
                .as_str()
                .unwrap()
                .ends_with("/py3.10/unit-tests/bin/python"));
            assert!(env_dir.join("bin/python").exists());

            cached_venv(&dir)
                .arg("save")
                .args(env_args(&dir, "Linux"))
                .args(["--python", &python])
                .assert()
                .success();

            std::fs::remove_dir_all(&env_dir).unwrap();

            // An unusable interpreter proves the second run never creates anything
            cached_venv(&dir)
                .arg("provision")
                .args(env_args(&dir, "Linux"))
                .args(["--python", "definitely-not-a-python-binary"])
                .args(["--python-version", "3.10", "--format", "plain"])
                .assert()
                .success()
                .stdout(predicate::str::contains("cache-hit=true"));
            assert!(env_dir.join("bin/python").exists());

            cached_venv(&dir)
                .args(["cache", "list", "--format", "plain"])
                .assert()
                .success()
                .stdout("abc123|Linux|X64|cached-venv|3.10|unit-tests\n");
        }

        #[test]
        fn provision_writes_github_files() {
            let dir = TempDir::new().unwrap();
            let python = fake_interpreter(dir.path());
            let output_file = dir.path().join("github_output");
            let path_file = dir.path().join("github_path");

            cached_venv(&dir)
                .env("GITHUB_OUTPUT", &output_file)
                .env("GITHUB_PATH", &path_file)
                .arg("provision")
                .args(env_args(&dir, "Windows"))
                .args(["--python", &python])
                .assert()
                .success();

            let outputs = std::fs::read_to_string(&output_file).unwrap();
            assert!(outputs.contains("cache-hit=false\n"));
            assert!(outputs.contains("cache-key=abc123|Windows|X64|cached-venv|3.10|unit-tests\n"));
            assert!(outputs.contains("/py3.10/unit-tests/Scripts/python\n"));

            let path = std::fs::read_to_string(&path_file).unwrap();
            assert!(path.trim_end().ends_with("/py3.10/unit-tests/Scripts"));
        }
    }
}
