use std::process::Command;

use sitepub_core::DeployConfig;

use crate::error::BuildError;

/// Why the generator was not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Preview mode: no subprocess may be spawned.
    DryRun,
    /// `build: false`: the deploy directory is used as-is.
    Disabled,
}

/// Outcome of the build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The generator exited 0. `stdout` is its captured output.
    Built { stdout: String },
    Skipped(SkipReason),
}

/// The generator invocation for `config`:
/// `<generator> --source <source_dir> --destination <build_dir> [args…]`,
/// run from `source_dir`.
pub fn generator_command(config: &DeployConfig) -> Command {
    let mut cmd = Command::new(&config.generator);
    cmd.arg("--source")
        .arg(&config.source_dir)
        .arg("--destination")
        .arg(&config.build_dir)
        .args(&config.generator_args)
        .current_dir(&config.source_dir);
    cmd
}

/// Run the generator unless the config says not to.
///
/// Blocks until the subprocess exits. A non-zero exit carries the trimmed
/// stderr so the caller can print a single diagnostic.
pub fn run(config: &DeployConfig) -> Result<BuildOutcome, BuildError> {
    if config.dry_run {
        tracing::warn!("dry-run, skipping generator build");
        return Ok(BuildOutcome::Skipped(SkipReason::DryRun));
    }
    if !config.build {
        tracing::info!("build disabled, using {} as-is", config.build_dir.display());
        return Ok(BuildOutcome::Skipped(SkipReason::Disabled));
    }

    tracing::info!(
        generator = %config.generator,
        source = %config.source_dir.display(),
        "building site"
    );
    let output = generator_command(config)
        .output()
        .map_err(|e| BuildError::Spawn {
            program: config.generator.clone(),
            source: e,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(BuildError::Failed {
            program: config.generator.clone(),
            status: output.status,
            stderr,
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    for line in stdout.lines() {
        tracing::debug!("{line}");
    }
    tracing::info!("site built into {}", config.build_dir.display());
    Ok(BuildOutcome::Built { stdout })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    use sitepub_core::ConfigFile;
    use tempfile::TempDir;

    fn config_with(root: &Path, generator: &str, dry_run: bool) -> DeployConfig {
        fs::create_dir_all(root.join("hugo")).unwrap();
        let layer = ConfigFile {
            bucket: Some("my-site".into()),
            generator: Some(generator.into()),
            ..ConfigFile::default()
        };
        DeployConfig::resolve(root, layer, dry_run).expect("resolve")
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn command_passes_source_and_destination() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_with(tmp.path(), "hugo", false);
        config.generator_args = vec!["--minify".into()];

        let cmd = generator_command(&config);
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(cmd.get_program(), "hugo");
        assert_eq!(
            args,
            vec![
                "--source".to_string(),
                config.source_dir.to_string_lossy().into_owned(),
                "--destination".to_string(),
                config.build_dir.to_string_lossy().into_owned(),
                "--minify".to_string(),
            ]
        );
        assert_eq!(cmd.get_current_dir(), Some(config.source_dir.as_path()));
    }

    #[test]
    fn dry_run_never_spawns() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("hugo").join("public")).unwrap();
        fs::write(tmp.path().join("hugo/public/index.html"), "x").unwrap();
        // A generator that cannot exist proves nothing was spawned.
        let config = config_with(tmp.path(), "sitepub-no-such-generator", true);

        let outcome = run(&config).expect("dry-run build");
        assert_eq!(outcome, BuildOutcome::Skipped(SkipReason::DryRun));
    }

    #[test]
    fn disabled_build_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_with(tmp.path(), "sitepub-no-such-generator", false);
        config.build = false;
        assert_eq!(
            run(&config).unwrap(),
            BuildOutcome::Skipped(SkipReason::Disabled)
        );
    }

    #[test]
    fn missing_generator_is_spawn_error() {
        let tmp = TempDir::new().unwrap();
        let config = config_with(tmp.path(), "sitepub-no-such-generator", false);

        let err = run(&config).unwrap_err();
        assert!(matches!(err, BuildError::Spawn { .. }), "got: {err}");
        assert!(err.to_string().contains("sitepub-no-such-generator"));
    }

    #[test]
    #[cfg(unix)]
    fn non_zero_exit_carries_stderr() {
        let tmp = TempDir::new().unwrap();
        let bin = TempDir::new().unwrap();
        let generator = script(bin.path(), "gen", "echo 'template error in layouts' >&2\nexit 3");
        let config = config_with(tmp.path(), &generator, false);

        let err = run(&config).unwrap_err();
        match &err {
            BuildError::Failed { status, stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "template error in layouts");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn successful_build_writes_destination() {
        let tmp = TempDir::new().unwrap();
        let bin = TempDir::new().unwrap();
        // $4 is the --destination value.
        let generator = script(
            bin.path(),
            "gen",
            "mkdir -p \"$4\" && echo '<h1>ok</h1>' > \"$4/index.html\" && echo 'Total in 12 ms'",
        );
        let config = config_with(tmp.path(), &generator, false);

        let outcome = run(&config).expect("build");
        assert_eq!(
            outcome,
            BuildOutcome::Built {
                stdout: "Total in 12 ms".to_string()
            }
        );
        assert!(config.build_dir.join("index.html").exists());
        config.ensure_deploy_dir_ready().expect("deploy dir ready");
    }
}
