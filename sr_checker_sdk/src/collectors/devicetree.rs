//! # Devicetree toolchain
//!
//! Runs `dtc` then `dt-validate` on a blob and keeps their combined output
//! as a derived log, regenerated only when the blob, the bindings or one of
//! the tools is newer. The log is then parsed into raw diagnostics.

use sr_checker_base::cache::{cache_path, RegenPolicy};
use sr_checker_base::classification::{parse_devicetree_log, ParsedLog};
use sr_checker_base::log_reader::{read_log, LogReaderOptions};
use sr_checker_base::results::MetaData;
use sr_checker_base::strategies::{
    which, CollaboratorError, DevicetreeToolchain, SystemCommandExecutor,
};
use sr_config::logging::codes;
use sr_config::{log_debug, log_success};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

pub const DTC_MARKER: &str = "+ DTC";
pub const DT_VALIDATE_MARKER: &str = "+ DT-VALIDATE";
pub const END_MARKER: &str = "+ END";

pub struct DevicetreeTools {
    dtc: String,
    dt_validate: String,
    /// Schema directory handed to `dt-validate -s`
    bindings: Option<PathBuf>,
    /// Logs land next to the blob when unset
    cache_dir: Option<PathBuf>,
    regen: RegenPolicy,
    reader: LogReaderOptions,
    meta: MetaData,
    executor: SystemCommandExecutor,
}

impl DevicetreeTools {
    pub fn new(dtc: impl Into<String>, dt_validate: impl Into<String>, executor: SystemCommandExecutor) -> Self {
        Self {
            dtc: dtc.into(),
            dt_validate: dt_validate.into(),
            bindings: None,
            cache_dir: None,
            regen: RegenPolicy::default(),
            reader: LogReaderOptions::default(),
            meta: MetaData::new(),
            executor,
        }
    }

    pub fn with_bindings(mut self, bindings: Option<PathBuf>) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    pub fn with_regen(mut self, regen: RegenPolicy) -> Self {
        self.regen = regen;
        self
    }

    pub fn with_reader(mut self, reader: LogReaderOptions) -> Self {
        self.reader = reader;
        self
    }

    /// Meta-data appended after the end marker of every generated log
    pub fn with_meta(mut self, meta: MetaData) -> Self {
        self.meta = meta;
        self
    }

    pub fn log_path(&self, blob: &Path) -> PathBuf {
        match &self.cache_dir {
            Some(dir) => cache_path(dir, blob, ".log"),
            None => {
                let mut name = blob.as_os_str().to_owned();
                name.push(".log");
                PathBuf::from(name)
            }
        }
    }

    fn dependencies(&self, blob: &Path) -> Vec<PathBuf> {
        let mut deps = vec![blob.to_path_buf()];
        deps.extend(self.bindings.clone());
        deps.extend(which(&self.dtc));
        deps.extend(which(&self.dt_validate));
        deps
    }

    fn run_tool(&self, tool: &str, args: &[OsString], log: &mut String, path: &Path) -> Result<(), CollaboratorError> {
        let output = self.executor.execute(tool, args)?;
        log.push_str(&output.combined());
        if output.success() {
            return Ok(());
        }
        // Keep what the tool said for whoever reads the log
        fs::write(path, log.as_bytes()).map_err(|e| CollaboratorError::io(path, e))?;
        Err(CollaboratorError::ToolFailed {
            tool: tool.to_string(),
            reason: format!("exit code {} (see {})", output.exit_code, path.display()),
        })
    }

    fn generate(&self, blob: &Path, path: &Path) -> Result<(), CollaboratorError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CollaboratorError::io(parent, e))?;
        }

        let mut log = format!("{}\n", DTC_MARKER);
        let dtc_args: Vec<OsString> = ["-o", "/dev/null", "-O", "dts", "-I", "dtb", "-s", "-f"]
            .iter()
            .map(OsString::from)
            .chain(std::iter::once(blob.as_os_str().to_owned()))
            .collect();
        self.run_tool(&self.dtc, &dtc_args, &mut log, path)?;

        log.push_str(&format!("{}\n", DT_VALIDATE_MARKER));
        let mut validate_args: Vec<OsString> = vec!["-m".into()];
        if let Some(bindings) = &self.bindings {
            validate_args.push("-s".into());
            validate_args.push(bindings.as_os_str().to_owned());
        }
        validate_args.push(blob.as_os_str().to_owned());
        self.run_tool(&self.dt_validate, &validate_args, &mut log, path)?;

        log.push_str(&format!("{}\n", END_MARKER));
        log.push_str(&self.meta.render("+ "));
        fs::write(path, log).map_err(|e| CollaboratorError::io(path, e))?;

        log_success!(
            codes::success::ARTIFACT_REGENERATED,
            "Created devicetree log",
            "path" => path.display()
        );
        Ok(())
    }
}

impl DevicetreeToolchain for DevicetreeTools {
    fn compile_and_validate(&self, blob: &Path) -> Result<ParsedLog, CollaboratorError> {
        let path = self.log_path(blob);

        if self.regen.need_regen(&path, &self.dependencies(blob)) {
            self.generate(blob, &path)?;
        } else {
            log_debug!("Reusing devicetree log", "path" => path.display());
        }

        let lines = read_log(&path, &self.reader).map_err(|e| CollaboratorError::Io {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(parse_devicetree_log(&lines))
    }
}
