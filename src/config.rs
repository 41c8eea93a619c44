use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use color_eyre::eyre::Result;
use serde::Deserialize;

use crate::{
    enums::ExitPolicy,
    runner::Invocation,
    snapshot::{ScanWindows, DEFAULT_FINDING_WINDOW, DEFAULT_INTERFACE_WINDOW},
    utils::{get_config_dir, get_data_dir},
};

const CONFIG: &str = include_str!("../.config/config.json5");

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scanner: ScannerConfig,
}

impl Config {
    /// Embedded defaults, then user files in the config directory, then `explicit`.
    pub fn new(explicit: Option<&Path>) -> Result<Self, config::ConfigError> {
        let config_dir = get_config_dir();
        let mut builder =
            config::Config::builder().add_source(config::File::from_str(CONFIG, config::FileFormat::Json5));

        let config_files = [
            ("config.json5", config::FileFormat::Json5),
            ("config.json", config::FileFormat::Json),
            ("config.yaml", config::FileFormat::Yaml),
            ("config.toml", config::FileFormat::Toml),
            ("config.ini", config::FileFormat::Ini),
        ];
        let mut found_config = false;
        for (file, format) in &config_files {
            let path = config_dir.join(file);
            if path.exists() {
                found_config = true;
            }
            builder = builder.add_source(config::File::from(path).format(*format).required(false));
        }
        if !found_config {
            log::info!("No user configuration in {}, using defaults", config_dir.display());
        }

        if let Some(path) = explicit {
            log::info!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder.build()?.try_deserialize()
    }
}

/// One external tool: its executable and any launcher arguments placed before the
/// pipeline's own arguments.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ToolConfig {
    pub path: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub install_root: String,
    pub collector: ToolConfig,
    pub analyzer: ToolConfig,
    pub working_dir: String,
    pub snapshot_dir: String,
    pub verbose: bool,
    pub exit_policy: ExitPolicy,
    pub interface_window: usize,
    pub finding_window: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            install_root: String::new(),
            collector: ToolConfig {
                path: "collectors/bin/collector".to_string(),
                args: Vec::new(),
            },
            analyzer: ToolConfig {
                path: "engine/bin/engine".to_string(),
                args: Vec::new(),
            },
            working_dir: String::new(),
            snapshot_dir: String::new(),
            verbose: true,
            exit_policy: ExitPolicy::Lenient,
            interface_window: DEFAULT_INTERFACE_WINDOW,
            finding_window: DEFAULT_FINDING_WINDOW,
        }
    }
}

impl ScannerConfig {
    /// Resolve tool paths and directories once, at startup.
    pub fn resolve(&self) -> ScanSettings {
        let root = if self.install_root.trim().is_empty() {
            executable_dir()
        } else {
            PathBuf::from(self.install_root.trim())
        };
        let snapshot_dir = if self.snapshot_dir.trim().is_empty() {
            get_data_dir().join("snapshots")
        } else {
            PathBuf::from(self.snapshot_dir.trim())
        };
        let working_dir = Some(self.working_dir.trim())
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);

        let settings = ScanSettings {
            collector: ToolSpec::resolve(&root, &self.collector),
            analyzer: ToolSpec::resolve(&root, &self.analyzer),
            working_dir,
            snapshot_dir,
            verbose: self.verbose,
            exit_policy: self.exit_policy,
            windows: ScanWindows {
                interface: self.interface_window.max(1),
                finding: self.finding_window.max(1),
            },
        };
        log::info!(
            "Collector: {}, analyzer: {}, snapshots in {}",
            settings.collector.program.display(),
            settings.analyzer.program.display(),
            settings.snapshot_dir.display()
        );
        settings
    }
}

fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// A resolved tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolSpec {
    pub program: PathBuf,
    pub prefix: Vec<OsString>,
}

impl ToolSpec {
    pub fn new<I, S>(program: impl Into<PathBuf>, prefix: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            prefix: prefix.into_iter().map(Into::into).collect(),
        }
    }

    fn resolve(root: &Path, tool: &ToolConfig) -> Self {
        let path = Path::new(tool.path.trim());
        let program = if path.is_absolute() { path.to_path_buf() } else { root.join(path) };
        Self::new(program, tool.args.iter().cloned())
    }

    /// Launcher prefix first, then `extra`.
    pub fn invocation<I, S>(&self, extra: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Invocation::new(&self.program).args(self.prefix.iter().cloned()).args(extra)
    }
}

/// Everything the enumerator and the orchestrator need, resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanSettings {
    pub collector: ToolSpec,
    pub analyzer: ToolSpec,
    pub working_dir: Option<PathBuf>,
    pub snapshot_dir: PathBuf,
    pub verbose: bool,
    pub exit_policy: ExitPolicy,
    pub windows: ScanWindows,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn embedded_defaults_match_struct_defaults() {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(CONFIG, config::FileFormat::Json5))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.scanner, ScannerConfig::default());
    }

    #[test]
    fn explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("override.toml");
        std::fs::write(
            &path,
            "[scanner]\nexit_policy = \"Strict\"\nfinding_window = 4000\n\n[scanner.collector]\npath = \"/opt/collector\"\nargs = [\"--sandbox\"]\n",
        )
        .unwrap();

        let config = Config::new(Some(&path)).unwrap();
        assert_eq!(config.scanner.exit_policy, ExitPolicy::Strict);
        assert_eq!(config.scanner.finding_window, 4000);
        assert_eq!(config.scanner.interface_window, DEFAULT_INTERFACE_WINDOW);
        assert_eq!(config.scanner.collector.args, vec!["--sandbox".to_string()]);
        assert_eq!(config.scanner.analyzer.path, "engine/bin/engine");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(Config::new(Some(Path::new("/nonexistent/hostscan.toml"))).is_err());
    }

    #[test]
    fn relative_tools_resolve_against_install_root() {
        let scanner = ScannerConfig {
            install_root: "/opt/hostscan".to_string(),
            analyzer: ToolConfig {
                path: "/usr/bin/engine".to_string(),
                args: Vec::new(),
            },
            snapshot_dir: "/tmp/hostscan".to_string(),
            ..ScannerConfig::default()
        };
        let settings = scanner.resolve();
        assert_eq!(settings.collector.program, PathBuf::from("/opt/hostscan/collectors/bin/collector"));
        assert_eq!(settings.analyzer.program, PathBuf::from("/usr/bin/engine"));
        assert_eq!(settings.snapshot_dir, PathBuf::from("/tmp/hostscan"));
        assert_eq!(settings.working_dir, None);
        assert_eq!(settings.windows, ScanWindows::default());
    }

    #[test]
    fn launcher_prefix_comes_before_pipeline_args() {
        let tool = ToolSpec::new("/bin/sh", ["-c", "exit 0", "collector"]);
        let invocation = tool.invocation(["-m", "network"]);
        assert_eq!(invocation.program, PathBuf::from("/bin/sh"));
        assert_eq!(
            invocation.args,
            ["-c", "exit 0", "collector", "-m", "network"].map(OsString::from).to_vec()
        );
    }
}
