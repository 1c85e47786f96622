// Copyright (c) The runlit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::TestThreads;
use crate::{
    directives::DirectiveAnchor,
    errors::{ConfigParseError, ConfigParseErrorKind, ExecutorBuildError},
    executor::ShellExecutor,
    expectation::TargetInfo,
    substitution::BUILTIN_TOKENS,
    test_list::DiscoveryOptions,
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use indexmap::IndexMap;
use serde::Deserialize;
use std::{
    collections::BTreeSet,
    sync::LazyLock,
    time::Duration,
};
use tracing::warn;

/// Gets the number of available CPUs and caches the value.
#[inline]
pub fn get_num_cpus() -> usize {
    static NUM_CPUS: LazyLock<usize> =
        LazyLock::new(|| match std::thread::available_parallelism() {
            Ok(count) => count.into(),
            Err(err) => {
                warn!("unable to determine num-cpus ({err}), assuming 1 logical CPU");
                1
            }
        });

    *NUM_CPUS
}

/// Overall configuration for runlit.
///
/// Relative paths in the configuration are resolved against the root directory passed in to
/// [`from_sources`](Self::from_sources).
#[derive(Clone, Debug)]
pub struct RunlitConfig {
    root: Utf8PathBuf,
    inner: RunlitConfigDeserialize,
}

impl RunlitConfig {
    /// The default location of the config within the root directory: `.config/runlit.toml`.
    pub const CONFIG_PATH: &'static str = ".config/runlit.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// Reads the runlit config from the given file, or if not specified from
    /// `.config/runlit.toml` in the root directory.
    ///
    /// If the file isn't specified and the directory doesn't have `.config/runlit.toml`, uses the
    /// default config options.
    pub fn from_sources(
        root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let root = root.into();
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (inner, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        if !unknown.is_empty() {
            warn_unknown_keys(&config_file, &root, &unknown);
        }

        inner
            .validate()
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        Ok(Self { root, inner })
    }

    /// Returns the default runlit config for the given root directory.
    pub fn default_config(root: impl Into<Utf8PathBuf>) -> Self {
        let (inner, unknown) = Self::build_and_deserialize_config(&Self::make_default_config())
            .expect("default config is always valid");

        // Make sure there aren't any unknown keys in the default config, since it is
        // embedded/shipped with this binary.
        debug_assert!(
            unknown.is_empty(),
            "found unknown keys in default config: {unknown:?}"
        );

        Self {
            root: root.into(),
            inner,
        }
    }

    /// Returns the root directory that relative paths are resolved against.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns the suite directories to search, resolved against the root.
    pub fn suites(&self) -> Vec<Utf8PathBuf> {
        if self.inner.suites.is_empty() {
            vec![self.root.clone()]
        } else {
            self.inner
                .suites
                .iter()
                .map(|suite| self.resolve(suite))
                .collect()
        }
    }

    /// Returns the number of tests to run at once.
    pub fn test_threads(&self) -> TestThreads {
        self.inner.test_threads
    }

    /// Returns the per-test timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    /// Returns where directive markers are recognized.
    pub fn directive_anchor(&self) -> &DirectiveAnchor {
        &self.inner.directive_anchor
    }

    /// Returns the options used to discover tests.
    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            extensions: self.inner.extensions.iter().cloned().collect(),
            exclude: self.inner.exclude.iter().cloned().collect(),
            repeat: self.inner.repeat,
            binaries: self.inner.binaries.clone(),
            list_dir: self.exec_root(),
        }
    }

    /// Returns the working directory tests are run in.
    pub fn exec_root(&self) -> Utf8PathBuf {
        match &self.inner.exec.exec_root {
            Some(exec_root) => self.resolve(exec_root),
            None => self.root.clone(),
        }
    }

    /// Returns the directory prepended to `PATH` for tests, if any.
    pub fn bin_dir(&self) -> Option<Utf8PathBuf> {
        self.inner
            .exec
            .bin_dir
            .as_deref()
            .map(|bin_dir| self.resolve(bin_dir))
    }

    /// Returns a process executor for this configuration.
    pub fn executor(&self) -> Result<ShellExecutor, ExecutorBuildError> {
        let mut executor = ShellExecutor::new(&self.inner.exec.shell, self.exec_root());
        if let Some(bin_dir) = self.bin_dir() {
            executor.set_bin_dir(&bin_dir)?;
        }
        executor.set_timeout(self.timeout());
        Ok(executor)
    }

    /// Returns the target that `XFAIL:`, `XTARGET:` and `REQUIRES:` tags are matched against.
    pub fn target_info(&self) -> TargetInfo {
        TargetInfo {
            triple: self.inner.target.triple.clone(),
            available_features: self.inner.target.available_features.clone(),
        }
    }

    /// Returns user-defined substitutions, in the order they were defined.
    pub fn substitutions(&self) -> &IndexMap<String, String> {
        &self.inner.substitutions
    }

    // ---
    // Helper methods
    // ---

    fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_owned()
        } else {
            self.root.join(path)
        }
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(RunlitConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let config: RunlitConfigDeserialize =
            serde_ignored::deserialize(config, |path: serde_ignored::Path| {
                ignored.insert(path.to_string());
            })
            .map_err(|error| ConfigParseErrorKind::DeserializeError(Box::new(error)))?;

        Ok((config, ignored))
    }
}

fn warn_unknown_keys(config_file: &Utf8Path, root: &Utf8Path, unknown: &BTreeSet<String>) {
    let mut unknown_str = String::new();
    if unknown.len() == 1 {
        // Print this on the same line.
        unknown_str.push_str("key: ");
        unknown_str.extend(unknown.iter().map(String::as_str));
    } else {
        unknown_str.push_str("keys:\n");
        for ignored_key in unknown {
            unknown_str.push('\n');
            unknown_str.push_str("  - ");
            unknown_str.push_str(ignored_key);
        }
    }

    warn!(
        "in config file {}, ignoring unknown configuration {unknown_str}",
        config_file.strip_prefix(root).unwrap_or(config_file),
    );
}

/// Settings for test binaries, under the `[binaries]` table.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BinariesConfig {
    /// Extension-less files whose names end with this suffix are treated as test binaries.
    pub suffix: String,

    /// The argument that makes a test binary print its cases.
    pub list_arg: String,

    /// The prefix of the argument that selects a single case to run.
    pub filter_arg_prefix: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ExecConfig {
    shell: Utf8PathBuf,
    #[serde(default)]
    exec_root: Option<Utf8PathBuf>,
    #[serde(default)]
    bin_dir: Option<Utf8PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TargetConfig {
    #[serde(default)]
    triple: Option<String>,
    #[serde(default)]
    available_features: BTreeSet<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RunlitConfigDeserialize {
    #[serde(default)]
    suites: Vec<Utf8PathBuf>,
    extensions: Vec<String>,
    exclude: Vec<String>,
    test_threads: TestThreads,
    repeat: usize,
    directive_anchor: DirectiveAnchor,
    #[serde(default, with = "humantime_serde")]
    timeout: Option<Duration>,
    binaries: BinariesConfig,
    exec: ExecConfig,
    target: TargetConfig,
    #[serde(default)]
    substitutions: IndexMap<String, String>,
}

impl RunlitConfigDeserialize {
    fn validate(&self) -> Result<(), ConfigParseErrorKind> {
        if self.repeat == 0 {
            return Err(ConfigParseErrorKind::ZeroRepeat);
        }
        for token in self.substitutions.keys() {
            let reason = if !token.starts_with('%') {
                "tokens must start with `%`"
            } else if token.len() < 2 {
                "tokens must have at least one character after `%`"
            } else if BUILTIN_TOKENS.contains(&token.as_str()) {
                "builtin tokens cannot be redefined"
            } else {
                continue;
            };
            return Err(ConfigParseErrorKind::InvalidSubstitutionToken {
                token: token.clone(),
                reason,
            });
        }
        Ok(())
    }
}
