use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::payload::{self, Owner};
use super::PackageAssembler;
use crate::config::{FileMapping, PackageSpec, ToolsConfig};
use crate::descriptor::{DescriptorValues, Template};
use crate::error::{ReleaseError, Result};
use crate::process::Cmd;
use crate::target::Target;
use crate::utils;

/// root:admin, as the macOS installer expects.
pub const PAYLOAD_OWNER: Owner = Owner { uid: 0, gid: 80 };

const DESCRIPTOR: &str = "PackageInfo";
const BOM: &str = "Bom";
const PAYLOAD: &str = "Payload";

/// `<name>-<version>-<arch>.pkg`
pub fn package_file_name(spec: &PackageSpec, target: &Target) -> String {
    format!("{}-{}-{}.pkg", spec.name, spec.version, target.arch)
}

/// Scratch layout of one flat package build.
///
/// Everything lives under a fresh directory that is removed when the layout
/// is dropped, so a failed build leaves nothing behind.
pub struct MacPackageLayout {
    scratch: TempDir,
    pub root_tree_path: PathBuf,
    pub package_dir: PathBuf,
    pub descriptor_path: PathBuf,
    pub bom_path: PathBuf,
    pub payload_archive_path: PathBuf,
}

impl MacPackageLayout {
    pub fn create(output_dir: &Path, name: &str) -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix(&format!(".{name}-pkg-"))
            .tempdir_in(output_dir)
            .map_err(|e| ReleaseError::fs(output_dir, e))?;

        let root_tree_path = scratch.path().join("root");
        let package_dir = scratch.path().join(format!("{name}.pkg"));
        for dir in [&root_tree_path, &package_dir] {
            fs::create_dir_all(dir).map_err(|e| ReleaseError::fs(dir, e))?;
        }

        Ok(Self {
            descriptor_path: package_dir.join(DESCRIPTOR),
            bom_path: package_dir.join(BOM),
            payload_archive_path: package_dir.join(PAYLOAD),
            root_tree_path,
            package_dir,
            scratch,
        })
    }

    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    /// Remove the scratch directory, reporting failures.
    pub fn close(self) -> Result<()> {
        let path = self.scratch.path().to_path_buf();
        self.scratch.close().map_err(|e| ReleaseError::fs(path, e))
    }
}

/// Assembles macOS flat packages: staging root, `PackageInfo`, `Payload`,
/// `Bom`, then a `xar` container without compression.
pub struct MacAssembler<'a> {
    /// `cpio`, `mkbom` and `xar`.
    tools: &'a ToolsConfig,
    template: &'a Template,
    /// Declared static files, with sources already resolved.
    files: Vec<FileMapping>,
}

impl<'a> MacAssembler<'a> {
    pub fn new(tools: &'a ToolsConfig, template: &'a Template, files: Vec<FileMapping>) -> Self {
        Self {
            tools,
            template,
            files,
        }
    }

    fn stage(&self, layout: &MacPackageLayout, spec: &PackageSpec, binary: &Path) -> Result<()> {
        for file in &self.files {
            let dest = layout.root_tree_path.join(&file.target);
            utils::copy_with_mode(&file.source, &dest, file.mode)?;
        }

        let bin_dest = layout
            .root_tree_path
            .join(spec.install_dir.trim_start_matches('/'))
            .join(&spec.name);
        utils::copy_with_mode(binary, &bin_dest, 0o755)
    }

    fn run_tool(&self, cmd: Cmd, target: &Target) -> Result<()> {
        let result = cmd.run()?;
        if result.success() {
            return Ok(());
        }
        Err(ReleaseError::PackagerFailure {
            tool: cmd.program(),
            target: target.to_string(),
            code: result.code(),
            stderr: result.diagnostics(),
        })
    }

    fn build(
        &self,
        layout: &MacPackageLayout,
        target: &Target,
        spec: &PackageSpec,
        binary: &Path,
        package_path: &Path,
    ) -> Result<()> {
        self.stage(layout, spec, binary)?;

        let values = DescriptorValues::for_tree(&spec.version, Some(&layout.root_tree_path));
        tracing::debug!("Installed size of {}: {} KB", target, values.installed_size);
        fs::write(&layout.descriptor_path, self.template.render(&values))
            .map_err(|e| ReleaseError::fs(&layout.descriptor_path, e))?;

        payload::write_payload(
            &self.tools.cpio,
            &layout.root_tree_path,
            &layout.payload_archive_path,
            PAYLOAD_OWNER,
            target,
        )?;

        let mkbom = Cmd::new(&self.tools.mkbom)
            .arg("-u")
            .arg(PAYLOAD_OWNER.uid.to_string())
            .arg("-g")
            .arg(PAYLOAD_OWNER.gid.to_string())
            .arg(&layout.root_tree_path)
            .arg(&layout.bom_path);
        self.run_tool(mkbom, target)?;

        let xar = Cmd::new(&self.tools.xar)
            .args(["--compression", "none", "-cf"])
            .arg(package_path)
            .args([DESCRIPTOR, BOM, PAYLOAD])
            .dir(&layout.package_dir);
        self.run_tool(xar, target)
    }
}

impl PackageAssembler for MacAssembler<'_> {
    fn kind(&self) -> &'static str {
        "flat package"
    }

    fn assemble(
        &self,
        target: &Target,
        spec: &PackageSpec,
        binary: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        let package_path = utils::absolute(&output_dir.join(package_file_name(spec, target)))?;
        let layout = MacPackageLayout::create(output_dir, &spec.name)?;
        tracing::info!(
            "Assembling {} in {}",
            package_path.display(),
            layout.scratch_path().display()
        );

        // on error the layout is dropped and its directory removed
        self.build(&layout, target, spec, binary, &package_path)?;
        layout.close()?;

        Ok(package_path)
    }
}
