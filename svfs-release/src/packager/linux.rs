use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::PackageAssembler;
use crate::config::{FileMapping, PackageSpec};
use crate::error::{ReleaseError, Result};
use crate::process::Cmd;
use crate::target::Target;
use crate::utils;

/// Builds `.deb` and `.rpm` packages with `fpm`.
pub struct LinuxAssembler<'a> {
    fpm: &'a str,
    /// Declared static files, with sources already resolved.
    files: Vec<FileMapping>,
}

impl<'a> LinuxAssembler<'a> {
    pub fn new(fpm: &'a str, files: Vec<FileMapping>) -> Self {
        Self { fpm, files }
    }

    pub fn command(
        &self,
        target: &Target,
        spec: &PackageSpec,
        binary: &Path,
        output_dir: &Path,
    ) -> Cmd {
        Cmd::new(self.fpm).args(fpm_args(target, spec, binary, output_dir, &self.files))
    }
}

/// `<source>=<install path>` pairs: every declared file, then the binary.
pub fn file_mapping_args(files: &[FileMapping], binary: &Path, spec: &PackageSpec) -> Vec<String> {
    files
        .iter()
        .map(|f| format!("{}={}", f.source.display(), f.target))
        .chain(std::iter::once(format!(
            "{}={}",
            binary.display(),
            spec.binary_install_path()
        )))
        .collect()
}

/// Full `fpm` argument list for one target.
pub fn fpm_args(
    target: &Target,
    spec: &PackageSpec,
    binary: &Path,
    output_dir: &Path,
    files: &[FileMapping],
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--force".into(),
        "-s".into(),
        "dir".into(),
        "-t".into(),
        target.format.to_string(),
        "-a".into(),
        target.arch.clone(),
        "-n".into(),
        spec.name.clone(),
        "-p".into(),
        output_dir.display().to_string(),
    ];

    for dep in &spec.dependencies {
        args.push("-d".into());
        args.push(format!("{} {}", dep.name, dep.constraint));
    }

    for (flag, value) in [
        ("--maintainer", &spec.maintainer),
        ("--description", &spec.description),
        ("--license", &spec.license),
        ("--url", &spec.url),
        ("--vendor", &spec.vendor),
        ("--version", &spec.version),
    ] {
        args.push(flag.into());
        args.push(value.clone());
    }

    args.push("--deb-use-file-permissions".into());
    args.push("--rpm-use-file-permissions".into());
    args.extend(file_mapping_args(files, binary, spec));

    args
}

/// Files in `dir` with their modification times.
fn snapshot(dir: &Path) -> Result<BTreeMap<PathBuf, Option<SystemTime>>> {
    Ok(utils::list_files(dir)?
        .into_iter()
        .map(|path| {
            let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();
            (path, modified)
        })
        .collect())
}

impl PackageAssembler for LinuxAssembler<'_> {
    fn kind(&self) -> &'static str {
        "fpm"
    }

    fn assemble(
        &self,
        target: &Target,
        spec: &PackageSpec,
        binary: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        // fpm copies the modes as they are on disk
        for file in &self.files {
            utils::set_mode(&file.source, file.mode)?;
        }

        let before = snapshot(output_dir)?;

        let cmd = self.command(target, spec, binary, output_dir);
        tracing::info!("Packaging {} with {}", target, self.fpm);
        let result = cmd.run()?;

        if !result.success() {
            return Err(ReleaseError::PackagerFailure {
                tool: self.fpm.to_string(),
                target: target.to_string(),
                code: result.code(),
                stderr: result.diagnostics(),
            });
        }

        let produced: Vec<PathBuf> = snapshot(output_dir)?
            .into_iter()
            .filter(|(path, modified)| {
                path != binary
                    && before
                        .get(path)
                        .map_or(true, |previous| previous != modified)
            })
            .map(|(path, _)| path)
            .collect();

        match produced.as_slice() {
            [package] => Ok(package.clone()),
            _ => Err(ReleaseError::PackagerFailure {
                tool: self.fpm.to_string(),
                target: target.to_string(),
                code: result.code(),
                stderr: format!(
                    "expected one package in {}, found {}",
                    output_dir.display(),
                    produced.len()
                ),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::target::{Os, PackageFormat};

    fn spec() -> PackageSpec {
        let mut config = Config::default();
        config.package.maintainer = "Ops Team <ops@example.com>".to_string();
        config.package.vendor = "OVH".to_string();
        config.package.license = "BSD".to_string();
        config.package_spec("1.0.0")
    }

    #[test]
    fn test_file_mapping_args() {
        let config = Config::default();
        let files = config.files_for(&Os::Linux);
        let args = file_mapping_args(&files, Path::new("/rel/svfs-linux-amd64"), &spec());

        assert_eq!(
            args,
            vec![
                "scripts/hubic-application.rb=/usr/local/bin/hubic-application",
                "scripts/mount.svfs=/sbin/mount.svfs",
                "/rel/svfs-linux-amd64=/usr/local/bin/svfs",
            ]
        );
    }

    #[test]
    fn test_fpm_args() {
        let target = Target::new(Os::Linux, PackageFormat::Rpm, "386");
        let args = fpm_args(
            &target,
            &spec(),
            Path::new("/rel/svfs-linux-386"),
            Path::new("/rel"),
            &[],
        );

        let expected: Vec<String> = [
            "--force",
            "-s",
            "dir",
            "-t",
            "rpm",
            "-a",
            "386",
            "-n",
            "svfs",
            "-p",
            "/rel",
            "-d",
            "fuse > 2.8",
            "-d",
            "ruby > 1.9.1",
            "--maintainer",
            "Ops Team <ops@example.com>",
            "--description",
            "The Swift Virtual File System",
            "--license",
            "BSD",
            "--url",
            "https://github.com/ovh/svfs",
            "--vendor",
            "OVH",
            "--version",
            "1.0.0",
            "--deb-use-file-permissions",
            "--rpm-use-file-permissions",
            "/rel/svfs-linux-386=/usr/local/bin/svfs",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        assert_eq!(args, expected);
    }
}
