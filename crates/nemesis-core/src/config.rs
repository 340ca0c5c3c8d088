//! Nemesis configuration.
//!
//! A TOML file picks one fault and the settings it runs with:
//!
//! ```toml
//! seed = 42
//! dry_run = true
//!
//! [fault]
//! kind = "pause"
//! process = "etcd"
//! targets = "minority"
//!
//! [ssh]
//! user = "admin"
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::TestContext;
use crate::error::{NemesisError, Result};
use crate::faults::clock::{ClockScrambler, DEFAULT_FAKETIME_PATH};
use crate::faults::network::{IptablesNet, Partitioner};
use crate::faults::process::{
    FixedTargets, KillRestartAction, NodeSelector, Selection, SignalAction, StartStopNemesis,
    Targeter, MAX_PROCESS_NAME_LEN,
};
use crate::node::NodeId;
use crate::remote::{DryRunExecutor, RemoteExecutor, SshConfig, SshExecutor};
use crate::topology::PartitionScheme;
use crate::traits::{BoxedNemesis, Noop};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NemesisConfig {
    /// Fault to run.
    pub fault: FaultConfig,

    /// Seed for every random choice; a fresh seed is drawn when unset.
    pub seed: Option<u64>,

    /// Log commands instead of running them.
    pub dry_run: bool,

    /// SSH connection settings.
    pub ssh: SshConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Which fault to run and its parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FaultConfig {
    /// Do nothing.
    #[default]
    Noop,

    /// Network partition.
    Partition {
        /// Topology of the partition.
        scheme: PartitionScheme,
    },

    /// Random clock offsets.
    ClockSkew {
        /// Bound on each offset, in seconds.
        dt_secs: u32,
        /// faketime configuration file on each node.
        #[serde(default = "default_faketime_path")]
        faketime_path: String,
    },

    /// SIGSTOP/SIGCONT on a process.
    Pause {
        /// Process name, matched exactly with `pkill -x`.
        process: String,
        /// Nodes to pause on.
        #[serde(default)]
        targets: TargetConfig,
    },

    /// SIGKILL on a process, then a restart command.
    KillRestart {
        /// Process name, matched exactly with `pkill -x`.
        process: String,
        /// Shell command bringing the process back.
        restart_command: String,
        /// Nodes to crash.
        #[serde(default)]
        targets: TargetConfig,
    },
}

impl FaultConfig {
    /// Returns the target selection of process faults.
    pub fn targets(&self) -> Option<&TargetConfig> {
        match self {
            FaultConfig::Pause { targets, .. } | FaultConfig::KillRestart { targets, .. } => {
                Some(targets)
            }
            _ => None,
        }
    }
}

fn default_faketime_path() -> String {
    DEFAULT_FAKETIME_PATH.to_string()
}

/// Target selection: a random [`Selection`] or an explicit node list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetConfig {
    /// Random nodes, e.g. `targets = "minority"`.
    Random(Selection),
    /// These nodes, e.g. `targets = ["n2"]`.
    Fixed(Vec<NodeId>),
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig::Random(Selection::One)
    }
}

impl TargetConfig {
    fn targeter(&self, seed: Option<u64>) -> Box<dyn Targeter> {
        match self {
            TargetConfig::Random(selection) => {
                let selector = NodeSelector::new(*selection);
                Box::new(match seed {
                    Some(seed) => selector.with_seed(seed),
                    None => selector,
                })
            }
            TargetConfig::Fixed(nodes) => Box::new(FixedTargets(nodes.clone())),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Log format (pretty, json, compact).
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl NemesisConfig {
    /// Loads configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(invalid(format!("invalid log level: {}", self.logging.level)));
        }

        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(invalid(format!("invalid log format: {}", self.logging.format)));
        }

        match &self.fault {
            FaultConfig::Noop | FaultConfig::Partition { .. } => {}
            FaultConfig::ClockSkew { dt_secs, faketime_path } => {
                if *dt_secs == 0 {
                    return Err(invalid("clock skew dt_secs must be positive"));
                }
                if faketime_path.is_empty() {
                    return Err(invalid("faketime_path is empty"));
                }
            }
            FaultConfig::Pause { process, targets } => {
                check_process(process)?;
                check_targets(targets)?;
            }
            FaultConfig::KillRestart {
                process,
                restart_command,
                targets,
            } => {
                check_process(process)?;
                if restart_command.trim().is_empty() {
                    return Err(invalid("restart_command is empty"));
                }
                check_targets(targets)?;
            }
        }

        Ok(())
    }

    /// Builds the configured nemesis, seeded when a seed is set.
    pub fn build_nemesis(&self) -> Result<BoxedNemesis> {
        self.validate()?;

        let nemesis: BoxedNemesis = match &self.fault {
            FaultConfig::Noop => Box::new(Noop),
            FaultConfig::Partition { scheme } => {
                let partitioner = Partitioner::new(*scheme);
                Box::new(match self.seed {
                    Some(seed) => partitioner.with_seed(seed),
                    None => partitioner,
                })
            }
            FaultConfig::ClockSkew {
                dt_secs,
                faketime_path,
            } => {
                let scrambler = ClockScrambler::new(*dt_secs)?.faketime_path(faketime_path.clone());
                Box::new(match self.seed {
                    Some(seed) => scrambler.with_seed(seed),
                    None => scrambler,
                })
            }
            FaultConfig::Pause { process, targets } => Box::new(StartStopNemesis::new(
                "hammer-time",
                targets.targeter(self.seed),
                SignalAction::new(process.clone()),
            )),
            FaultConfig::KillRestart {
                process,
                restart_command,
                targets,
            } => Box::new(StartStopNemesis::new(
                "kill-restart",
                targets.targeter(self.seed),
                KillRestartAction::new(process.clone(), restart_command.clone()),
            )),
        };

        Ok(nemesis)
    }

    /// Builds the test context for `nodes`.
    ///
    /// Commands go over SSH unless `dry_run` is set. Fails when a fixed
    /// target is not one of `nodes`.
    pub fn build_context(&self, nodes: Vec<NodeId>) -> Result<TestContext> {
        if let Some(TargetConfig::Fixed(targets)) = self.fault.targets() {
            if let Some(stray) = targets.iter().find(|t| !nodes.contains(*t)) {
                return Err(invalid(format!("fixed target {stray} is not in the cluster")));
            }
        }

        let remote: Arc<dyn RemoteExecutor> = if self.dry_run {
            Arc::new(DryRunExecutor::new())
        } else {
            Arc::new(SshExecutor::new(self.ssh.clone()))
        };

        TestContext::builder()
            .nodes(nodes)
            .remote(remote)
            .net(Arc::new(IptablesNet::new()))
            .build()
    }
}

fn invalid(reason: impl Into<String>) -> NemesisError {
    NemesisError::InvalidConfiguration(reason.into())
}

fn check_process(process: &str) -> Result<()> {
    if process.trim().is_empty() {
        return Err(invalid("process name is empty"));
    }
    if process.len() > MAX_PROCESS_NAME_LEN {
        return Err(invalid(format!(
            "process name {process:?} is longer than {MAX_PROCESS_NAME_LEN} characters \
             and would never match exactly"
        )));
    }
    Ok(())
}

fn check_targets(targets: &TargetConfig) -> Result<()> {
    if matches!(targets, TargetConfig::Fixed(nodes) if nodes.is_empty()) {
        return Err(invalid("fixed target list is empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::nodes;
    use crate::operation::{OpValue, Operation};
    use crate::traits::Nemesis;

    #[test]
    fn test_defaults() {
        let config = NemesisConfig::from_toml_str("").unwrap();
        assert_eq!(config, NemesisConfig::default());
        assert_eq!(config.fault, FaultConfig::Noop);
        assert_eq!(config.ssh.user, "root");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_pause() {
        let config = NemesisConfig::from_toml_str(
            r#"
            seed = 7
            dry_run = true

            [fault]
            kind = "pause"
            process = "etcd"
            targets = "minority"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.seed, Some(7));
        assert_eq!(
            config.fault,
            FaultConfig::Pause {
                process: "etcd".to_string(),
                targets: TargetConfig::Random(Selection::Minority),
            }
        );
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_parse_fixed_targets_and_defaults() {
        let config = NemesisConfig::from_toml_str(
            r#"
            [fault]
            kind = "kill-restart"
            process = "etcd"
            restart_command = "systemctl start etcd"
            targets = ["n2", "n3"]
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.fault,
            FaultConfig::KillRestart { targets: TargetConfig::Fixed(ref n), .. } if n.len() == 2
        ));

        let config = NemesisConfig::from_toml_str(
            r#"
            [fault]
            kind = "clock-skew"
            dt_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(
            config.fault,
            FaultConfig::ClockSkew {
                dt_secs: 30,
                faketime_path: "/etc/faketimerc".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        let err = NemesisConfig::from_toml_str("[fault]\nkind = \"meteor\"").unwrap_err();
        assert!(err.is_configuration_error());

        let err = NemesisConfig::from_toml_str("[fault]\nkind = \"partition\"\nscheme = \"thirds\"")
            .unwrap_err();
        assert!(matches!(err, NemesisError::Config(_)));
    }

    #[test]
    fn test_validation() {
        let mut config = NemesisConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = NemesisConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());

        let bad_faults = [
            FaultConfig::ClockSkew {
                dt_secs: 0,
                faketime_path: default_faketime_path(),
            },
            FaultConfig::Pause {
                process: " ".to_string(),
                targets: TargetConfig::default(),
            },
            FaultConfig::Pause {
                process: "etcd".to_string(),
                targets: TargetConfig::Fixed(Vec::new()),
            },
            FaultConfig::KillRestart {
                process: "etcd".to_string(),
                restart_command: String::new(),
                targets: TargetConfig::default(),
            },
            FaultConfig::Pause {
                process: "a-very-long-daemon".to_string(),
                targets: TargetConfig::default(),
            },
        ];
        for fault in bad_faults {
            let config = NemesisConfig {
                fault: fault.clone(),
                ..Default::default()
            };
            let err = config.validate().unwrap_err();
            assert!(err.is_configuration_error(), "{fault:?}");
        }
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = NemesisConfig {
            fault: FaultConfig::Partition {
                scheme: PartitionScheme::MajoritiesRing,
            },
            seed: Some(3),
            ..Default::default()
        };
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("majorities-ring"));
        assert_eq!(NemesisConfig::from_toml_str(&toml_str).unwrap(), config);
    }

    #[test]
    fn test_build_nemesis_names() {
        let cases = [
            (FaultConfig::Noop, "noop"),
            (
                FaultConfig::Partition {
                    scheme: PartitionScheme::Halves,
                },
                "partition",
            ),
            (
                FaultConfig::ClockSkew {
                    dt_secs: 5,
                    faketime_path: default_faketime_path(),
                },
                "clock-scrambler",
            ),
            (
                FaultConfig::Pause {
                    process: "etcd".to_string(),
                    targets: TargetConfig::default(),
                },
                "hammer-time",
            ),
            (
                FaultConfig::KillRestart {
                    process: "etcd".to_string(),
                    restart_command: "systemctl start etcd".to_string(),
                    targets: TargetConfig::default(),
                },
                "kill-restart",
            ),
        ];
        for (fault, name) in cases {
            let config = NemesisConfig {
                fault,
                seed: Some(1),
                ..Default::default()
            };
            assert_eq!(config.build_nemesis().unwrap().name(), name);
        }
    }

    #[tokio::test]
    async fn test_configured_pause_runs_dry() {
        let config = NemesisConfig::from_toml_str(
            r#"
            seed = 5
            dry_run = true

            [fault]
            kind = "pause"
            process = "etcd"
            targets = ["n2"]
            "#,
        )
        .unwrap();

        let ctx = config.build_context(nodes(["n1", "n2", "n3"])).unwrap();
        let nemesis = config.build_nemesis().unwrap();

        nemesis.setup(&ctx).await.unwrap();
        let op = nemesis.invoke(&ctx, Operation::start()).await.unwrap();
        assert_eq!(op.value.to_string(), "{n2 paused etcd}");
        let op = nemesis.invoke(&ctx, Operation::stop()).await.unwrap();
        assert_eq!(op.value.to_string(), "{n2 resumed etcd}");
        let op = nemesis.invoke(&ctx, Operation::stop()).await.unwrap();
        assert_eq!(op.value, OpValue::NotStarted);
        nemesis.teardown(&ctx).await.unwrap();
    }

    #[test]
    fn test_build_context_rejects_empty_cluster() {
        assert!(NemesisConfig::default().build_context(Vec::new()).is_err());
    }

    #[test]
    fn test_build_context_rejects_targets_outside_cluster() {
        let config = NemesisConfig::from_toml_str(
            r#"
            dry_run = true

            [fault]
            kind = "pause"
            process = "etcd"
            targets = ["n2", "n9"]
            "#,
        )
        .unwrap();

        let err = config
            .build_context(nodes(["n1", "n2", "n3"]))
            .unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("n9"));

        assert!(config.build_context(nodes(["n2", "n9"])).is_ok());
    }

    #[test]
    fn test_missing_config_file_is_io_error() {
        let err = NemesisConfig::from_file("/nonexistent/nemesis.toml").unwrap_err();
        assert!(matches!(err, NemesisError::Io(_)));
    }
}
