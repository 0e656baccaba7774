use std::path::{Path, PathBuf};

use prep_aio::process::{run_command_captured, run_command_inherit, CommandSpec};
use prep_common::error::{PrepError, Result};
use prep_common::model::{AcceleratorReport, InstalledPackage};
use tracing::debug;

use super::{PackageManager, ProvisionContext};

const FIND_SPEC: &str = "import importlib.util, sys; \
sys.exit(0 if importlib.util.find_spec(sys.argv[1]) else 1)";

const PROBE: &str = r#"
import importlib, json, sys
try:
    lib = importlib.import_module(sys.argv[1])
except ImportError:
    sys.exit(3)
cuda = lib.cuda
out = {"available": bool(cuda.is_available()), "devices": [],
       "runtime_version": getattr(lib.version, "cuda", None)}
if out["available"]:
    out["devices"] = [cuda.get_device_name(i) for i in range(cuda.device_count())]
print(json.dumps(out))
"#;

/// Exit code the probe script uses when the library cannot be imported.
const PROBE_IMPORT_FAILED: i32 = 3;

/// `python -m pip` inside the target interpreter.
#[derive(Debug, Clone)]
pub struct Pip {
    python: PathBuf,
}

impl Pip {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }

    /// Picks the interpreter: explicit override, then the virtual
    /// environment's own, then whatever is on PATH.
    pub fn for_context(ctx: &ProvisionContext) -> Self {
        if let Some(python) = &ctx.python {
            return Self::new(python);
        }
        if let Some(python) = ctx.virtual_env.as_deref().and_then(venv_python) {
            return Self::new(python);
        }
        let python = which::which("python3")
            .or_else(|_| which::which("python"))
            .unwrap_or_else(|_| PathBuf::from("python"));
        debug!("Using interpreter from PATH: {}", python.display());
        Self::new(python)
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    fn pip(&self) -> CommandSpec {
        CommandSpec::new(&self.python).args(["-m", "pip"])
    }

    fn run_pip(&self, spec: CommandSpec) -> Result<()> {
        let status = run_command_inherit(&spec)?;
        if status.success() {
            Ok(())
        } else {
            Err(PrepError::CommandExec(format!(
                "{} exited with {}",
                spec.display(),
                status
            )))
        }
    }
}

fn venv_python(venv: &Path) -> Option<PathBuf> {
    let candidates = if cfg!(windows) {
        [venv.join("Scripts").join("python.exe"), venv.join("python.exe")]
    } else {
        [venv.join("bin").join("python"), venv.join("bin").join("python3")]
    };
    candidates.into_iter().find(|p| p.is_file())
}

impl PackageManager for Pip {
    fn install_manifest(&self, manifest: &Path) -> Result<()> {
        self.run_pip(
            self.pip()
                .args(["install", "-r"])
                .arg(manifest)
                .arg("--no-deps"),
        )
    }

    fn install(&self, packages: &[String], index_url: Option<&str>) -> Result<()> {
        let mut spec = self.pip().arg("install").args(packages);
        if let Some(url) = index_url {
            spec = spec.args(["--index-url", url]);
        }
        self.run_pip(spec)
    }

    fn is_importable(&self, module: &str) -> Result<bool> {
        let spec = CommandSpec::new(&self.python).args(["-c", FIND_SPEC, module]);
        let output = run_command_captured(&spec)?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(PrepError::CommandExec(format!(
                "{} exited with {}: {}",
                spec.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    fn probe_accelerator(&self, module: &str) -> Result<AcceleratorReport> {
        let spec = CommandSpec::new(&self.python).args(["-c", PROBE, module]);
        let output = run_command_captured(&spec)?;
        match output.status.code() {
            Some(0) => Ok(serde_json::from_slice(&output.stdout)?),
            Some(PROBE_IMPORT_FAILED) => Err(PrepError::Validation(format!(
                "could not import {module} to check accelerator availability"
            ))),
            _ => Err(PrepError::CommandExec(format!(
                "accelerator probe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    fn list_installed(&self) -> Result<Vec<InstalledPackage>> {
        let spec = self.pip().args(["list", "--format=json"]);
        let output = run_command_captured(&spec)?;
        if !output.status.success() {
            return Err(PrepError::CommandExec(format!(
                "{} exited with {}",
                spec.display(),
                output.status
            )));
        }
        parse_pip_list(&output.stdout)
    }
}

/// Parses `pip list --format=json`. Extra keys such as
/// `editable_project_location` are ignored.
pub fn parse_pip_list(raw: &[u8]) -> Result<Vec<InstalledPackage>> {
    let mut packages: Vec<InstalledPackage> = serde_json::from_slice(raw)?;
    packages.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Ok(packages)
}
