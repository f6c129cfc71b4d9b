//! Virtual environment provisioning
//!
//! One linear decision per call: compute the key, try the cache, create the
//! environment on a miss, and report where its interpreter lives.

use crate::cache::{CacheEntryInfo, CacheKey, CacheStore};
use crate::error::{VenvError, VenvResult};
use crate::platform::{OsFamily, PlatformContext};
use crate::python::PythonInterpreter;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Which environment to provision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    /// Environment name, e.g. `unit-tests`
    pub name: String,
    /// Opaque token used to invalidate caches
    pub cache_seed: String,
}

impl ProvisionRequest {
    /// Create a request
    pub fn new(name: impl Into<String>, cache_seed: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cache_seed: cache_seed.into(),
        }
    }
}

/// Location of a virtual environment and its interpreter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentHandle {
    /// Environment root directory
    pub path: PathBuf,
    /// Directory holding the environment's executables
    pub bin_dir: PathBuf,
    /// The environment's `python` executable
    pub executable: PathBuf,
}

impl EnvironmentHandle {
    /// Derive executable paths for an environment rooted at `path`
    pub fn resolve(path: impl Into<PathBuf>, family: OsFamily) -> Self {
        let path = path.into();
        let bin_dir = path.join(family.bin_dir_name());
        let executable = bin_dir.join("python");
        Self {
            path,
            bin_dir,
            executable,
        }
    }

    /// `<workspace>/<venv_root>/py<version>/<name>`
    pub fn env_dir(workspace: &Path, venv_root: &Path, version: &str, name: &str) -> PathBuf {
        workspace
            .join(venv_root)
            .join(format!("py{}", version))
            .join(name)
    }
}

/// Result of a provisioning run
#[derive(Debug, Clone)]
pub struct ProvisionOutcome {
    /// Whether the environment came from the cache
    pub cache_hit: bool,
    /// Key the environment is cached under
    pub cache_key: CacheKey,
    /// Where the environment lives
    pub environment: EnvironmentHandle,
}

/// Provisions cached virtual environments for one job
pub struct VenvProvisioner {
    platform: PlatformContext,
    python: PythonInterpreter,
    venv_root: PathBuf,
    store: Box<dyn CacheStore>,
    restore_enabled: bool,
}

impl VenvProvisioner {
    /// Create a provisioner
    pub fn new(
        platform: PlatformContext,
        python: PythonInterpreter,
        venv_root: impl Into<PathBuf>,
        store: Box<dyn CacheStore>,
    ) -> Self {
        Self {
            platform,
            python,
            venv_root: venv_root.into(),
            store,
            restore_enabled: true,
        }
    }

    /// Skip the cache lookup and always materialize
    pub fn with_restore(mut self, enabled: bool) -> Self {
        self.restore_enabled = enabled;
        self
    }

    /// Platform facts in use
    pub fn platform(&self) -> &PlatformContext {
        &self.platform
    }

    /// Interpreter in use
    pub fn python(&self) -> &PythonInterpreter {
        &self.python
    }

    /// Cache key for `request` on this platform
    pub fn cache_key(&self, request: &ProvisionRequest) -> VenvResult<CacheKey> {
        CacheKey::compute(
            &request.cache_seed,
            &self.platform.os,
            &self.platform.arch,
            self.python.version(),
            &request.name,
        )
    }

    /// Environment location for `name` on this platform
    pub fn environment(&self, name: &str) -> EnvironmentHandle {
        let dir = EnvironmentHandle::env_dir(
            self.platform.workspace(),
            &self.venv_root,
            self.python.version(),
            name,
        );
        EnvironmentHandle::resolve(dir, self.platform.family)
    }

    /// Try to restore `key` into `path`
    pub async fn restore(&self, key: &CacheKey, path: &Path) -> VenvResult<bool> {
        if !self.restore_enabled {
            debug!("Cache restore disabled");
            return Ok(false);
        }
        self.store.restore(key, path).await
    }

    /// Create the environment at `path`. Safe to call on an existing environment.
    pub async fn materialize(&self, path: &Path) -> VenvResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| VenvError::io(format!("creating {}", parent.display()), e))?;
        }

        info!("Creating virtual environment at {}", path.display());
        self.python.create_venv(path).await
    }

    /// Restore or create the environment described by `request`
    pub async fn provision(&self, request: &ProvisionRequest) -> VenvResult<ProvisionOutcome> {
        let cache_key = self.cache_key(request)?;
        let environment = self.environment(&request.name);
        debug!("Cache key: {}", cache_key);

        let cache_hit = self.restore(&cache_key, &environment.path).await?;
        if cache_hit {
            info!("Cache hit for {}", cache_key);
        } else {
            self.materialize(&environment.path).await?;
        }

        Ok(ProvisionOutcome {
            cache_hit,
            cache_key,
            environment,
        })
    }

    /// Publish the environment described by `request` to the cache store
    pub async fn save(&self, request: &ProvisionRequest) -> VenvResult<CacheEntryInfo> {
        let cache_key = self.cache_key(request)?;
        let environment = self.environment(&request.name);
        self.store.save(&cache_key, &environment.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LocalCacheStore;
    use tempfile::TempDir;

    fn provisioner(dir: &TempDir, os: &str, python: PythonInterpreter) -> VenvProvisioner {
        let platform = PlatformContext::new(os, "X64", dir.path().join("ws")).unwrap();
        let store = LocalCacheStore::new(dir.path().join("store"));
        VenvProvisioner::new(platform, python, ".venvs", Box::new(store))
    }

    #[test]
    fn linux_executable_path() {
        let handle = EnvironmentHandle::resolve("/ws/.venvs/py3.10/unit-tests", OsFamily::Linux);
        assert!(handle.executable.ends_with("py3.10/unit-tests/bin/python"));
        assert!(handle.bin_dir.ends_with("unit-tests/bin"));
    }

    #[test]
    fn windows_executable_path() {
        let handle =
            EnvironmentHandle::resolve("/ws/.venvs/py3.10/unit-tests", OsFamily::Windows);
        assert!(handle.executable.ends_with("py3.10/unit-tests/Scripts/python"));
        assert!(handle.bin_dir.ends_with("unit-tests/Scripts"));
    }

    #[test]
    fn scenario_linux() {
        let dir = TempDir::new().unwrap();
        let p = provisioner(&dir, "Linux", PythonInterpreter::with_version("python3", "3.10"));
        let req = ProvisionRequest::new("unit-tests", "abc123");

        assert_eq!(
            p.cache_key(&req).unwrap().as_str(),
            "abc123|Linux|X64|cached-venv|3.10|unit-tests"
        );
        let env = p.environment(&req.name);
        assert_eq!(env.path, dir.path().join("ws/.venvs/py3.10/unit-tests"));
        assert!(env.executable.ends_with("py3.10/unit-tests/bin/python"));
    }

    #[test]
    fn scenario_windows() {
        let dir = TempDir::new().unwrap();
        let p = provisioner(&dir, "Windows", PythonInterpreter::with_version("python3", "3.10"));
        let env = p.environment("unit-tests");
        assert!(env.executable.ends_with("py3.10/unit-tests/Scripts/python"));
    }

    #[tokio::test]
    async fn empty_name_fails_before_touching_disk() {
        let dir = TempDir::new().unwrap();
        let p = provisioner(&dir, "Linux", PythonInterpreter::with_version("python3", "3.10"));
        let err = p
            .provision(&ProvisionRequest::new("", "seed"))
            .await
            .unwrap_err();
        assert!(matches!(err, VenvError::EmptyName));
        assert!(!dir.path().join("ws").exists());
    }

    #[tokio::test]
    async fn name_outside_workspace_is_rejected() {
        let dir = TempDir::new().unwrap();
        let p = provisioner(&dir, "Linux", PythonInterpreter::with_version("python3", "3.10"));
        let victim = dir.path().join("victim");
        std::fs::create_dir_all(&victim).unwrap();
        std::fs::write(victim.join("precious.txt"), "keep me").unwrap();

        let names = [
            victim.display().to_string(),
            "..".to_string(),
            "../../victim".to_string(),
        ];
        for name in names {
            let req = ProvisionRequest::new(name.clone(), "seed");
            let err = p.save(&req).await.unwrap_err();
            assert!(
                matches!(err, VenvError::InvalidPathComponent { field: "name", .. }),
                "save accepted {name:?}"
            );
            let err = p.provision(&req).await.unwrap_err();
            assert!(
                matches!(err, VenvError::InvalidPathComponent { field: "name", .. }),
                "provision accepted {name:?}"
            );
        }

        assert_eq!(
            std::fs::read_to_string(victim.join("precious.txt")).unwrap(),
            "keep me"
        );
        assert!(!dir.path().join("store").exists());
    }

    #[tokio::test]
    async fn missing_interpreter_is_fatal() {
        let dir = TempDir::new().unwrap();
        let p = provisioner(
            &dir,
            "Linux",
            PythonInterpreter::with_version("definitely-not-a-python-binary", "3.10"),
        );
        let err = p
            .provision(&ProvisionRequest::new("unit-tests", "seed"))
            .await
            .unwrap_err();
        assert!(matches!(err, VenvError::InterpreterNotFound { .. }));
    }

    #[tokio::test]
    async fn cache_hit_skips_materialize() {
        let dir = TempDir::new().unwrap();
        // An interpreter that cannot run proves the hit path never calls it
        let p = provisioner(
            &dir,
            "Linux",
            PythonInterpreter::with_version("definitely-not-a-python-binary", "3.10"),
        );
        let req = ProvisionRequest::new("unit-tests", "seed");

        let env = p.environment(&req.name);
        std::fs::create_dir_all(env.bin_dir.clone()).unwrap();
        std::fs::write(&env.executable, "").unwrap();
        p.save(&req).await.unwrap();
        std::fs::remove_dir_all(&env.path).unwrap();

        let outcome = p.provision(&req).await.unwrap();
        assert!(outcome.cache_hit);
        assert!(outcome.environment.executable.exists());
    }

    #[tokio::test]
    async fn restore_disabled_forces_miss() {
        let dir = TempDir::new().unwrap();
        let p = provisioner(&dir, "Linux", PythonInterpreter::with_version("python3", "3.10"))
            .with_restore(false);
        let req = ProvisionRequest::new("unit-tests", "seed");
        let env = p.environment(&req.name);
        std::fs::create_dir_all(&env.path).unwrap();
        p.save(&req).await.unwrap();

        let key = p.cache_key(&req).unwrap();
        assert!(!p.restore(&key, &env.path).await.unwrap());
    }

    #[cfg(unix)]
    mod fake_python {
        use super::*;
        use serial_test::serial;
        use std::os::unix::fs::PermissionsExt;

        /// Shell script standing in for `python3 -m venv --upgrade <path>`
        fn fake_interpreter(dir: &Path) -> String {
            let script = dir.join("fake-python");
            std::fs::write(
                &script,
                "#!/bin/sh\n\
                 if [ \"$1\" = \"--version\" ]; then echo 'Python 3.10.4'; exit 0; fi\n\
                 if [ \"$1 $2 $3\" = \"-m venv --upgrade\" ]; then\n\
                 mkdir -p \"$4/bin\" && touch \"$4/bin/python\" && echo run >> \"$4/runs\"; exit $?\n\
                 fi\n\
                 echo \"unexpected args: $*\" >&2; exit 2\n",
            )
            .unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
            script.display().to_string()
        }

        #[tokio::test]
        #[serial]
        async fn resolve_parses_version() {
            let dir = TempDir::new().unwrap();
            let program = fake_interpreter(dir.path());
            let py = PythonInterpreter::resolve(&program).await.unwrap();
            assert_eq!(py.version(), "3.10");
        }

        #[tokio::test]
        #[serial]
        async fn miss_materializes() {
            let dir = TempDir::new().unwrap();
            let program = fake_interpreter(dir.path());
            let py = PythonInterpreter::resolve(&program).await.unwrap();
            let p = provisioner(&dir, "Linux", py);

            let outcome = p
                .provision(&ProvisionRequest::new("unit-tests", "abc123"))
                .await
                .unwrap();
            assert!(!outcome.cache_hit);
            assert_eq!(
                outcome.cache_key.as_str(),
                "abc123|Linux|X64|cached-venv|3.10|unit-tests"
            );
            assert!(outcome.environment.executable.exists());
        }

        #[tokio::test]
        #[serial]
        async fn materialize_twice_succeeds() {
            let dir = TempDir::new().unwrap();
            let program = fake_interpreter(dir.path());
            let p = provisioner(&dir, "Linux", PythonInterpreter::with_version(program, "3.10"));
            let env = p.environment("unit-tests");

            p.materialize(&env.path).await.unwrap();
            p.materialize(&env.path).await.unwrap();

            let runs = std::fs::read_to_string(env.path.join("runs")).unwrap();
            assert_eq!(runs.lines().count(), 2);
        }

        #[tokio::test]
        #[serial]
        async fn venv_failure_carries_stderr() {
            let dir = TempDir::new().unwrap();
            let script = dir.path().join("broken-python");
            std::fs::write(&script, "#!/bin/sh\necho 'No module named venv' >&2\nexit 1\n")
                .unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

            let p = provisioner(
                &dir,
                "Linux",
                PythonInterpreter::with_version(script.display().to_string(), "3.10"),
            );
            let err = p.materialize(&p.environment("x").path).await.unwrap_err();
            match err {
                VenvError::VenvCreate { stderr, .. } => {
                    assert_eq!(stderr, "No module named venv")
                }
                other => panic!("expected VenvCreate, got {other:?}"),
            }
        }
    }
}
