//! Cross-compilation of the client binary for one target.

use std::path::{Path, PathBuf};

use crate::arch;
use crate::config::BuildConfig;
use crate::error::{ReleaseError, Result};
use crate::process::Cmd;
use crate::target::Target;
use crate::utils;

/// File name of the intermediate binary: `<name>-<os>-<arch>`.
pub fn binary_name(name: &str, target: &Target) -> String {
    format!("{}-{}-{}", name, target.os, target.arch)
}

/// Drives the Go toolchain.
pub struct Compiler<'a> {
    config: &'a BuildConfig,
}

impl<'a> Compiler<'a> {
    pub fn new(config: &'a BuildConfig) -> Self {
        Self { config }
    }

    /// Build the command for `target`, writing to `output`.
    pub fn command(&self, target: &Target, output: &Path) -> Cmd {
        let compiler_arch = arch::normalize(&target.arch);

        let mut cmd = Cmd::new(&self.config.compiler)
            .args(&self.config.compiler_args)
            .arg("-o")
            .arg(output)
            .env("GOOS", target.os.as_str())
            .env("GOARCH", &compiler_arch.arch)
            .env("CGO_ENABLED", "0")
            .dir(&self.config.source_dir);

        if let Some(revision) = compiler_arch.arm_revision {
            cmd = cmd.env("GOARM", revision.to_string());
        }

        cmd
    }

    /// Compile the client for `target` into `output_dir` and mark it executable.
    pub fn compile(&self, target: &Target, name: &str, output_dir: &Path) -> Result<PathBuf> {
        let output = utils::absolute(&output_dir.join(binary_name(name, target)))?;
        let cmd = self.command(target, &output);

        tracing::info!("Compiling {} for {}", name, target);
        let result = cmd.run()?;

        if !result.success() {
            return Err(ReleaseError::CompileFailure {
                target: target.to_string(),
                code: result.code(),
                stderr: result.diagnostics(),
            });
        }

        if !output.is_file() {
            return Err(ReleaseError::CompileFailure {
                target: target.to_string(),
                code: result.code(),
                stderr: format!("compiler produced no binary at {}", output.display()),
            });
        }

        utils::set_mode(&output, 0o755)?;
        tracing::debug!("Built {}", output.display());

        Ok(output)
    }
}
