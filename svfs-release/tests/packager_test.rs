use std::fs;
use std::path::{Path, PathBuf};
use svfs_release::config::{Config, FileMapping};
use svfs_release::packager::{fpm_args, generate_checksums, package_file_name, PAYLOAD_OWNER};
use svfs_release::target::{Os, PackageFormat, Target};
use tempfile::tempdir;

fn linux_files() -> Vec<FileMapping> {
    Config::default().files_for(&Os::Linux)
}

#[test]
fn test_fpm_args() {
    let mut config = Config::default();
    config.package.maintainer = "OVH <svfs@ovh.net>".to_string();
    config.package.license = "BSD".to_string();
    config.package.vendor = "OVH".to_string();
    let spec = config.package_spec("0.9.1");
    let target = Target::new(Os::Linux, PackageFormat::Rpm, "386");

    let args = fpm_args(
        &target,
        &spec,
        Path::new("/out/svfs-linux-386"),
        Path::new("/out"),
        &linux_files(),
    );

    assert_eq!(
        args,
        vec![
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
            "/out",
            "-d",
            "fuse > 2.8",
            "-d",
            "ruby > 1.9.1",
            "--maintainer",
            "OVH <svfs@ovh.net>",
            "--description",
            "The Swift Virtual File System",
            "--license",
            "BSD",
            "--url",
            "https://github.com/ovh/svfs",
            "--vendor",
            "OVH",
            "--version",
            "0.9.1",
            "--deb-use-file-permissions",
            "--rpm-use-file-permissions",
            "scripts/hubic-application.rb=/usr/local/bin/hubic-application",
            "scripts/mount.svfs=/sbin/mount.svfs",
            "/out/svfs-linux-386=/usr/local/bin/svfs",
        ]
    );
}

#[test]
fn test_fpm_args_without_dependencies() {
    let mut config = Config::default();
    config.package.dependencies.clear();
    let spec = config.package_spec("0.9.1");
    let target = Target::new(Os::Linux, PackageFormat::Deb, "armhf");

    let args = fpm_args(
        &target,
        &spec,
        Path::new("/out/svfs-linux-armhf"),
        Path::new("/out"),
        &[],
    );

    assert!(!args.iter().any(|a| a == "-d"));
    // the architecture alias is passed through, not the compiler's name for it
    assert!(args.windows(2).any(|w| w == ["-a", "armhf"]));
    assert_eq!(
        args.last().map(String::as_str),
        Some("/out/svfs-linux-armhf=/usr/local/bin/svfs")
    );
}

#[test]
fn test_package_file_name() {
    let spec = Config::default().package_spec("0.9.1");
    let target = Target::new(Os::Darwin, PackageFormat::Pkg, "386");
    assert_eq!(package_file_name(&spec, &target), "svfs-0.9.1-386.pkg");
}

#[test]
fn test_payload_owner_is_root_admin() {
    assert_eq!((PAYLOAD_OWNER.uid, PAYLOAD_OWNER.gid), (0, 80));
}

#[test]
fn test_generate_checksums() {
    let temp_dir = tempdir().unwrap();

    let file1 = temp_dir.path().join("svfs_0.9.1_amd64.deb");
    let file2 = temp_dir.path().join("svfs-0.9.1-amd64.pkg");
    fs::write(&file1, b"test content 1").unwrap();
    fs::write(&file2, b"test content 2").unwrap();

    let files = vec![file1, file2];

    let checksum_path = generate_checksums(&files, temp_dir.path()).unwrap();

    assert!(checksum_path.exists());
    assert_eq!(checksum_path.file_name().unwrap(), "SHA256SUMS");

    let content = fs::read_to_string(&checksum_path).unwrap();
    assert!(content.contains("svfs_0.9.1_amd64.deb"));
    assert!(content.contains("svfs-0.9.1-amd64.pkg"));

    // Each line should have a hash and filename
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 64);
    }
}

#[test]
fn test_checksum_format() {
    let temp_dir = tempdir().unwrap();

    let file1 = temp_dir.path().join("test.txt");
    fs::write(&file1, b"Hello, World!").unwrap();

    let files = vec![file1];
    let checksum_path = generate_checksums(&files, temp_dir.path()).unwrap();

    let content = fs::read_to_string(&checksum_path).unwrap();
    assert_eq!(
        content,
        "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f  test.txt\n"
    );
}

#[test]
fn test_checksum_missing_artifact() {
    let temp_dir = tempdir().unwrap();
    let files = vec![PathBuf::from("/nonexistent/svfs_0.9.1_amd64.deb")];
    assert!(generate_checksums(&files, temp_dir.path()).is_err());
}
