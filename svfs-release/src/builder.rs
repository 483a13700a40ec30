use anyhow::{Context, Result};
use git2::Repository;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::{version_from_tag, Args};
use crate::compiler::Compiler;
use crate::config::{Config, FileMapping, PackageSpec};
use crate::descriptor::{DescriptorValues, Template};
use crate::error::{ReleaseError, Result as ReleaseResult};
use crate::packager::{self, LinuxAssembler, MacAssembler, PackageAssembler};
use crate::target::Target;
use crate::utils;

/// Progress of one target through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Pending,
    Compiled,
    Assembled,
    Cleaned,
    Failed,
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetState::Pending => "pending",
            TargetState::Compiled => "compiled",
            TargetState::Assembled => "assembled",
            TargetState::Cleaned => "cleaned",
            TargetState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

struct TargetRun<'t> {
    target: &'t Target,
    state: TargetState,
}

impl<'t> TargetRun<'t> {
    fn new(target: &'t Target) -> Self {
        Self {
            target,
            state: TargetState::Pending,
        }
    }

    fn advance(&mut self, next: TargetState) {
        tracing::debug!("{}: {} -> {}", self.target, self.state, next);
        self.state = next;
    }
}

pub struct ReleaseBuilder {
    args: Args,
    config: Config,
}

impl ReleaseBuilder {
    pub fn new(args: Args) -> Result<Self> {
        let config_path = Config::locate(args.config.as_deref())?;
        tracing::debug!("Loading configuration from {}", config_path.display());

        let config = Config::load(&config_path).context("Failed to load configuration")?;
        Self::with_config(args, config)
    }

    /// Use an already loaded configuration; command line arguments still win.
    pub fn with_config(args: Args, mut config: Config) -> Result<Self> {
        config.merge_with_args(&args);
        config.validate().context("Invalid configuration")?;
        Ok(Self { args, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Matrix leaves to build, in matrix order, narrowed by `--targets`.
    pub fn targets(&self) -> Result<Vec<Target>> {
        let all = self.config.matrix.targets();
        let Some(filter) = self.args.target_filter()? else {
            return Ok(all);
        };

        if let Some(unknown) = filter.iter().find(|t| !all.contains(t)) {
            anyhow::bail!("Target {} is not part of the release matrix", unknown);
        }

        Ok(all.into_iter().filter(|t| filter.contains(t)).collect())
    }

    /// Build and package every target. Returns the final artifacts.
    pub fn run(&self) -> Result<Vec<PathBuf>> {
        let version = self.get_version()?;
        let spec = self.config.package_spec(&version);
        let targets = self.targets()?;
        tracing::info!(
            "Releasing {} {} for {} targets",
            spec.name,
            spec.version,
            targets.len()
        );

        // The template is read before any target runs
        let template = if targets.iter().any(|t| t.os.capabilities().flat_package) {
            Some(self.descriptor_template()?)
        } else {
            None
        };

        let output_dir = utils::absolute(&self.config.output.dir)?;
        if self.args.dry_run {
            self.plan(&targets, &spec, &output_dir, template.as_ref())?;
            return Ok(Vec::new());
        }

        fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;

        let mut artifacts = Vec::new();
        for target in &targets {
            let assembler = self.assembler(target, template.as_ref())?;
            match self.release_target(target, &spec, assembler.as_ref(), &output_dir) {
                Ok(package) => artifacts.push(package),
                Err(e) => {
                    tracing::error!("Release of {} failed: {}", target, e);
                    return Err(e.into());
                }
            }
        }

        if self.config.output.checksums && !artifacts.is_empty() {
            let checksum_file = packager::generate_checksums(&artifacts, &output_dir)?;
            artifacts.push(checksum_file);
        }

        tracing::info!("Release completed successfully!");
        for artifact in &artifacts {
            tracing::info!("Artifact: {}", artifact.display());
        }

        Ok(artifacts)
    }

    /// Run one target through compile, assemble and cleanup.
    fn release_target(
        &self,
        target: &Target,
        spec: &PackageSpec,
        assembler: &dyn PackageAssembler,
        output_dir: &Path,
    ) -> ReleaseResult<PathBuf> {
        let mut run = TargetRun::new(target);
        tracing::info!("Building for target: {}", target);

        let result = self.advance_target(&mut run, spec, assembler, output_dir);
        if result.is_err() {
            run.advance(TargetState::Failed);
        }
        result
    }

    fn advance_target(
        &self,
        run: &mut TargetRun<'_>,
        spec: &PackageSpec,
        assembler: &dyn PackageAssembler,
        output_dir: &Path,
    ) -> ReleaseResult<PathBuf> {
        let target = run.target;

        let compiler = Compiler::new(&self.config.build);
        let binary = compiler.compile(target, &spec.name, output_dir)?;
        run.advance(TargetState::Compiled);

        tracing::debug!("Assembling {} with {}", target, assembler.kind());
        let package = assembler.assemble(target, spec, &binary, output_dir)?;
        run.advance(TargetState::Assembled);

        Self::cleanup(&binary)?;
        run.advance(TargetState::Cleaned);

        Ok(package)
    }

    /// Remove the intermediate binary once its package exists.
    fn cleanup(binary: &Path) -> ReleaseResult<()> {
        tracing::debug!("Removing {}", binary.display());
        fs::remove_file(binary).map_err(|e| ReleaseError::fs(binary, e))
    }

    fn plan(
        &self,
        targets: &[Target],
        spec: &PackageSpec,
        output_dir: &Path,
        template: Option<&Template>,
    ) -> Result<()> {
        let compiler = Compiler::new(&self.config.build);
        for target in targets {
            let binary = output_dir.join(crate::compiler::binary_name(&spec.name, target));
            let assembler = self.assembler(target, template)?;
            tracing::info!("[dry-run] {}: {}", target, compiler.command(target, &binary));
            tracing::info!("[dry-run] {}: package with {}", target, assembler.kind());
        }
        Ok(())
    }

    /// The configured `PackageInfo` template, or the bundled one.
    fn descriptor_template(&self) -> ReleaseResult<Template> {
        match &self.config.descriptor.template {
            Some(path) => Template::load(&self.config.source_path(path)),
            None => Ok(Template::bundled()),
        }
    }

    /// Pick the assembler the target OS supports.
    fn assembler<'a>(
        &'a self,
        target: &Target,
        template: Option<&'a Template>,
    ) -> ReleaseResult<Box<dyn PackageAssembler + 'a>> {
        let caps = target.os.capabilities();
        let files = self.resolved_files(target);
        let tools = &self.config.tools;

        if caps.native_packager {
            return Ok(Box::new(LinuxAssembler::new(&tools.fpm, files)));
        }

        if caps.flat_package {
            let template = template.ok_or_else(|| {
                ReleaseError::Config(format!("No descriptor template loaded for {target}"))
            })?;
            return Ok(Box::new(MacAssembler::new(tools, template, files)));
        }

        Err(ReleaseError::Config(format!(
            "No package assembler available for {}",
            target.os
        )))
    }

    fn resolved_files(&self, target: &Target) -> Vec<FileMapping> {
        self.config
            .files_for(&target.os)
            .into_iter()
            .map(|mut file| {
                file.source = self.config.source_path(&file.source);
                file
            })
            .collect()
    }

    /// Render a standalone metadata file; there is no package tree, so the
    /// installed size is 0.
    pub fn render(&self, template: &Path, to: &Path) -> Result<()> {
        let version = self.get_version()?;
        let template = Template::load(template)?;
        let values = DescriptorValues::for_tree(&version, None);

        fs::write(to, template.render(&values))
            .with_context(|| format!("Failed to write {}", to.display()))?;
        tracing::info!("Rendered {} for version {}", to.display(), version);
        Ok(())
    }

    /// Get version from args or detect from the tag on HEAD
    fn get_version(&self) -> Result<String> {
        if let Some(version) = self.args.version() {
            return Ok(version);
        }

        let source_dir = &self.config.build.source_dir;
        let repo = Repository::discover(source_dir).with_context(|| {
            format!(
                "Failed to find a git repository at {}. Specify the version explicitly with --tag",
                source_dir.display()
            )
        })?;

        match tag_on_head(&repo)? {
            Some(tag) => {
                tracing::info!("Using tag {} on HEAD", tag);
                Ok(version_from_tag(&tag))
            }
            None => anyhow::bail!(
                "No tag found on current HEAD. Please create a tag first with 'git tag <version>' \
                 or specify one explicitly with --tag"
            ),
        }
    }
}

/// Name of a tag (lightweight or annotated) pointing at HEAD.
fn tag_on_head(repo: &Repository) -> ReleaseResult<Option<String>> {
    let head = repo.head()?.peel_to_commit()?.id();
    let tags = repo.tag_names(None)?;

    for tag in tags.iter().flatten() {
        let commit = repo
            .revparse_single(&format!("refs/tags/{tag}"))
            .and_then(|obj| obj.peel_to_commit());
        if let Ok(commit) = commit {
            if commit.id() == head {
                return Ok(Some(tag.to_string()));
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args() -> Args {
        Args {
            tag: Some("v1.0.0".to_string()),
            output: None,
            targets: None,
            source_dir: None,
            no_checksum: false,
            dry_run: false,
            config: None,
            verbose: false,
        }
    }

    fn commit_all(repo: &Repository, file: &str) -> git2::Oid {
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(file)).unwrap();
        index.write().unwrap();

        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("Test User", "test@example.com").unwrap();

        repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])
            .unwrap()
    }

    #[test]
    fn test_targets_filter_keeps_matrix_order() {
        let mut args = args();
        args.targets = Some(vec![
            "darwin/pkg/amd64".to_string(),
            "linux/deb/armhf".to_string(),
        ]);
        let builder = ReleaseBuilder::with_config(args, Config::default()).unwrap();

        let targets: Vec<String> = builder
            .targets()
            .unwrap()
            .iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(targets, vec!["linux/deb/armhf", "darwin/pkg/amd64"]);
    }

    #[test]
    fn test_targets_filter_rejects_unknown_target() {
        let mut args = args();
        args.targets = Some(vec!["linux/rpm/armhf".to_string()]);
        let builder = ReleaseBuilder::with_config(args, Config::default()).unwrap();

        assert!(builder.targets().is_err());
    }

    #[test]
    fn test_version_from_tag_argument() {
        let builder = ReleaseBuilder::with_config(args(), Config::default()).unwrap();
        assert_eq!(builder.get_version().unwrap(), "1.0.0");
    }

    #[test]
    fn test_version_from_annotated_tag_on_head() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("main.go"), "package main\n").unwrap();
        let oid = commit_all(&repo, "main.go");

        let commit = repo.find_object(oid, None).unwrap();
        let sig = git2::Signature::now("Test User", "test@example.com").unwrap();
        repo.tag("v0.9.1", &commit, &sig, "svfs 0.9.1", false)
            .unwrap();

        assert_eq!(tag_on_head(&repo).unwrap().as_deref(), Some("v0.9.1"));

        let mut args = args();
        args.tag = None;
        args.source_dir = Some(dir.path().to_path_buf());
        let builder = ReleaseBuilder::with_config(args, Config::default()).unwrap();
        assert_eq!(builder.get_version().unwrap(), "0.9.1");
    }

    #[test]
    fn test_no_tag_on_head() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("main.go"), "package main\n").unwrap();
        commit_all(&repo, "main.go");

        assert!(tag_on_head(&repo).unwrap().is_none());
    }

    #[test]
    fn test_missing_template_aborts_before_any_target() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.build.source_dir = dir.path().to_path_buf();
        config.build.compiler = dir.path().join("never-run").display().to_string();
        config.descriptor.template = Some(PathBuf::from("scripts/PackageInfo.tmpl"));
        config.output.dir = dir.path().join("release");

        let builder = ReleaseBuilder::with_config(args(), config).unwrap();
        let err = builder.run().unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ReleaseError>(),
            Some(ReleaseError::TemplateMissing { .. })
        ));
        assert!(!dir.path().join("release").exists());
    }

    #[test]
    fn test_bundled_template_without_configuration() {
        let builder = ReleaseBuilder::with_config(args(), Config::default()).unwrap();
        let template = builder.descriptor_template().unwrap();

        let values = DescriptorValues::for_tree("1.0.0", None);
        assert!(template.render(&values).contains(r#"version="1.0.0""#));
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let dir = tempdir().unwrap();
        let mut args = args();
        args.config = Some(dir.path().join("typo.toml"));

        assert!(ReleaseBuilder::new(args).is_err());
    }

    #[test]
    fn test_explicit_config_is_loaded() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("release.toml");
        fs::write(&config_path, "[package]\nname = \"svfs-nightly\"\n").unwrap();

        let mut args = args();
        args.config = Some(config_path);
        let builder = ReleaseBuilder::new(args).unwrap();
        assert_eq!(builder.config().package.name, "svfs-nightly");
    }

    #[test]
    fn test_render_without_package_tree() {
        let dir = tempdir().unwrap();
        let template = dir.path().join("Dockerfile.tmpl");
        let rendered = dir.path().join("Dockerfile");
        fs::write(&template, "ENV SVFS_VERSION={{version}} SIZE={{installed_size}}\n").unwrap();

        let builder = ReleaseBuilder::with_config(args(), Config::default()).unwrap();
        builder.render(&template, &rendered).unwrap();

        assert_eq!(
            fs::read_to_string(&rendered).unwrap(),
            "ENV SVFS_VERSION=1.0.0 SIZE=0\n"
        );
    }
}
