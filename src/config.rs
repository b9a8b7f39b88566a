// src/config.rs

//! Configuration for a rebuild session
//!
//! The detector engine is generic over its pattern tables: everything it
//! matches against - plain failure signatures, pkg-config probes, the
//! ecosystem failure patterns and the lookup tables behind them - is
//! configuration data. `setup_patterns` installs the curated built-in
//! tables; a TOML overrides file can extend or replace individual
//! entries.

use crate::detect::Ecosystem;
use crate::error::{Error, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// A literal requirement emitted when a pattern matches
#[derive(Debug, Clone)]
pub struct PlainRule {
    pub pattern: Regex,
    pub requirement: String,
}

impl PlainRule {
    pub fn new(pattern: &str, requirement: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            requirement: requirement.to_string(),
        })
    }
}

/// A pkg-config coordinate emitted when a pattern matches
#[derive(Debug, Clone)]
pub struct PkgconfigRule {
    pub pattern: Regex,
    pub package: String,
}

impl PkgconfigRule {
    pub fn new(pattern: &str, package: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            package: package.to_string(),
        })
    }
}

/// An ecosystem-failure pattern with one capture group
///
/// The captured identifier is routed through the ecosystem dispatch
/// table; `ecosystem == None` means the failed-commands lookup.
#[derive(Debug, Clone)]
pub struct FailureRule {
    pub pattern: Regex,
    pub verbose: bool,
    pub ecosystem: Option<Ecosystem>,
}

impl FailureRule {
    pub fn new(pattern: &str, verbose: bool, ecosystem: Option<Ecosystem>) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            verbose,
            ecosystem,
        })
    }
}

/// Configuration view consumed by the detector engine and build loop
#[derive(Debug)]
pub struct RebuildConfig {
    /// Also emit `pkgconfig(32<name>)` variants for pkg-config hits
    pub want_32bit: bool,
    /// Round budget: the session stops without success once this many
    /// attempts have been made
    pub max_rounds: u32,
    /// Sandbox chroot configuration name (`mock --root=<name>`)
    pub sandbox_root: String,
    /// Extra arguments appended to every sandbox invocation
    pub sandbox_opts: Vec<String>,
    /// Hard ceiling on a single sandbox invocation
    pub timeout: Duration,
    /// Known build-command substitutes (captured command -> package)
    pub failed_commands: HashMap<String, String>,
    /// Gem-name exceptions (captured gem -> package suffix)
    pub gems: HashMap<String, String>,
    /// Maven-jar exceptions (captured artifact -> package suffix)
    pub maven_jars: HashMap<String, String>,
    pub plain_rules: Vec<PlainRule>,
    pub pkgconfig_rules: Vec<PkgconfigRule>,
    pub failure_rules: Vec<FailureRule>,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            want_32bit: false,
            max_rounds: 20,
            sandbox_root: "clear".to_string(),
            sandbox_opts: Vec::new(),
            timeout: Duration::from_secs(3600), // 1 hour
            failed_commands: HashMap::new(),
            gems: HashMap::new(),
            maven_jars: HashMap::new(),
            plain_rules: Vec::new(),
            pkgconfig_rules: Vec::new(),
            failure_rules: Vec::new(),
        }
    }
}

impl RebuildConfig {
    /// Create a configuration with empty pattern tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the built-in pattern and lookup tables
    ///
    /// The tables are additive: entries loaded from an overrides file
    /// before or after this call are preserved.
    pub fn setup_patterns(&mut self) -> Result<()> {
        for (command, package) in [
            ("lex", "flex"),
            ("yacc", "bison"),
            ("m4", "m4"),
            ("makeinfo", "texinfo"),
            ("msgfmt", "gettext"),
            ("gperf", "gperf"),
            ("help2man", "help2man"),
            ("xmlto", "xmlto"),
            ("asciidoc", "asciidoc"),
            ("gtkdocize", "gtk-doc"),
        ] {
            self.failed_commands
                .entry(command.to_string())
                .or_insert_with(|| package.to_string());
        }

        for (gem, package) in [
            ("test/unit", "test-unit"),
            ("rack/test", "rack-test"),
            ("rspec/core", "rspec-core"),
            ("rspec/mocks", "rspec-mocks"),
            ("active_support", "activesupport"),
        ] {
            self.gems
                .entry(gem.to_string())
                .or_insert_with(|| package.to_string());
        }

        for (artifact, package) in [
            ("aether", "aether-core"),
            ("plexus", "plexus-utils"),
            ("sisu", "sisu-inject"),
        ] {
            self.maven_jars
                .entry(artifact.to_string())
                .or_insert_with(|| package.to_string());
        }

        let plain: &[(&str, &str)] = &[
            (r"checking for Apache .* module support", "httpd-dev"),
            (r"fatal error: openssl/ssl\.h: No such file", "openssl-dev"),
            (r"fatal error: zlib\.h: No such file", "zlib-dev"),
            (r"fatal error: expat\.h: No such file", "expat-dev"),
            (r"fatal error: ffi\.h: No such file", "libffi-dev"),
            (r"fatal error: curl/curl\.h: No such file", "curl-dev"),
            (r"checking for library containing tgetent\.\.\. no", "ncurses-dev"),
            (r"Sorry: TabError: inconsistent use of tabs", "python3-dev"),
        ];
        for (pattern, requirement) in plain {
            self.plain_rules.push(PlainRule::new(pattern, requirement)?);
        }

        let pkgconfig: &[(&str, &str)] = &[
            (r"which: no qmake", "Qt"),
            (r"XInput2 extension not found", "xi"),
            (r"checking for UDEV\.\.\. no", "udev"),
            (r"did not find libusb", "libusb-1.0"),
            (r"checking for x11\.\.\. no", "x11"),
        ];
        for (pattern, package) in pkgconfig {
            self.pkgconfig_rules
                .push(PkgconfigRule::new(pattern, package)?);
        }

        let failures: &[(&str, Option<Ecosystem>)] = &[
            (r"([a-zA-Z0-9\-]+): command not found", None),
            (r"/usr/bin/env: '?([a-zA-Z0-9\-_]+)'?: No such file", None),
            (r"No package '([^']+)' found", Some(Ecosystem::Pkgconfig)),
            (
                r"Package ([a-zA-Z0-9\-_.+]+) was not found in the pkg-config search path",
                Some(Ecosystem::Pkgconfig),
            ),
            (
                r"there is no package called '([^']+)'",
                Some(Ecosystem::R),
            ),
            (
                r"you may need to install the ([a-zA-Z0-9:]+) module",
                Some(Ecosystem::Perl),
            ),
            (
                r"Can't locate ([A-Za-z0-9_/]+)\.pm in @INC",
                Some(Ecosystem::Perl),
            ),
            (
                r"ModuleNotFoundError: No module named '([^'.]+)",
                Some(Ecosystem::Pypi),
            ),
            (
                r"ImportError: No module named ([a-zA-Z0-9_]+)",
                Some(Ecosystem::Pypi),
            ),
            (
                r"Could not find gem '([a-zA-Z0-9\-_]+)",
                Some(Ecosystem::Ruby),
            ),
            (
                r"cannot load such file -- ([a-zA-Z0-9\-_:/]+)",
                Some(Ecosystem::RubyTable),
            ),
            (
                r"Could not find artifact [a-zA-Z0-9\-_.]+:([a-zA-Z0-9\-_]+):",
                Some(Ecosystem::Maven),
            ),
        ];
        for (pattern, ecosystem) in failures {
            self.failure_rules
                .push(FailureRule::new(pattern, false, *ecosystem)?);
        }

        debug!(
            "Pattern tables ready: {} plain, {} pkg-config, {} failure rules",
            self.plain_rules.len(),
            self.pkgconfig_rules.len(),
            self.failure_rules.len()
        );
        Ok(())
    }

    /// Merge operator overrides from a TOML file
    pub fn load_overrides(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)?;
        let overrides: ConfigOverrides = toml::from_str(&raw)?;
        self.apply_overrides(overrides)
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) -> Result<()> {
        if let Some(want_32bit) = overrides.want_32bit {
            self.want_32bit = want_32bit;
        }
        if let Some(max_rounds) = overrides.max_rounds {
            if max_rounds == 0 {
                return Err(Error::Config("max_rounds must be at least 1".to_string()));
            }
            self.max_rounds = max_rounds;
        }
        if let Some(root) = overrides.sandbox_root {
            self.sandbox_root = root;
        }
        if let Some(opts) = overrides.sandbox_opts {
            self.sandbox_opts = opts;
        }
        if let Some(secs) = overrides.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }

        self.failed_commands.extend(overrides.failed_commands);
        self.gems.extend(overrides.gems);
        self.maven_jars.extend(overrides.maven_jars);

        for rule in overrides.plain_rules {
            self.plain_rules
                .push(PlainRule::new(&rule.pattern, &rule.requirement)?);
        }
        for rule in overrides.pkgconfig_rules {
            self.pkgconfig_rules
                .push(PkgconfigRule::new(&rule.pattern, &rule.package)?);
        }
        for rule in overrides.failure_rules {
            let ecosystem = match rule.ecosystem {
                Some(name) => Some(Ecosystem::from_str(&name).map_err(|_| {
                    Error::Config(format!("unknown ecosystem '{}'", name))
                })?),
                None => None,
            };
            self.failure_rules.push(FailureRule::new(
                &rule.pattern,
                rule.verbose,
                ecosystem,
            )?);
        }
        Ok(())
    }
}

/// Raw shape of the TOML overrides file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigOverrides {
    want_32bit: Option<bool>,
    max_rounds: Option<u32>,
    sandbox_root: Option<String>,
    sandbox_opts: Option<Vec<String>>,
    timeout_secs: Option<u64>,
    #[serde(default)]
    failed_commands: HashMap<String, String>,
    #[serde(default)]
    gems: HashMap<String, String>,
    #[serde(default)]
    maven_jars: HashMap<String, String>,
    #[serde(default)]
    plain_rules: Vec<RawPlainRule>,
    #[serde(default)]
    pkgconfig_rules: Vec<RawPkgconfigRule>,
    #[serde(default)]
    failure_rules: Vec<RawFailureRule>,
}

#[derive(Debug, Deserialize)]
struct RawPlainRule {
    pattern: String,
    requirement: String,
}

#[derive(Debug, Deserialize)]
struct RawPkgconfigRule {
    pattern: String,
    package: String,
}

#[derive(Debug, Deserialize)]
struct RawFailureRule {
    pattern: String,
    #[serde(default)]
    verbose: bool,
    ecosystem: Option<String>,
}
