use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::features::FeatureSet;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Serialisation of the feature matrix on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Jsonl,
}

/// Build per-session gameplay feature matrices from raw event logs
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(
    name = "feature-engineer",
    about = "Build per-session gameplay feature matrices from raw event logs",
    version
)]
pub struct Settings {
    /// Raw event file (.csv / .jsonl) or a directory of them
    #[arg(long, default_value = "input/train.csv")]
    pub events: PathBuf,

    /// Label file with `<session>_q<question>` ids
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// Feature matrix output path
    #[arg(long, default_value = "data/features.csv")]
    pub output: PathBuf,

    /// Label matrix output path (defaults to `true.csv` next to the features)
    #[arg(long)]
    pub label_output: Option<PathBuf>,

    /// Which aggregation passes to run
    #[arg(long, value_enum, default_value_t = FeatureSet::Extended)]
    pub feature_set: FeatureSet,

    /// Output format of the feature matrix
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,

    /// JSON taxonomy file overriding the built-in column sets
    #[arg(long)]
    pub taxonomy: Option<PathBuf>,

    /// Number of questions in the label matrix (1-255)
    #[arg(long, default_value = "18", value_parser = clap::value_parser!(u8).range(1..))]
    pub questions: u8,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used logging parameters saved to
/// `~/.feature-engineer/last_used.json`.
///
/// Only settings that cannot change the written matrices are persisted.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".feature-engineer").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &std::path::Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Full implementation – accepts args and an explicit config path so that
    /// tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::apply_debug(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins.
        if !is_arg_explicitly_set(&matches, "log_level") {
            if let Some(v) = last.log_level {
                settings.log_level = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "log_file") && settings.log_file.is_none() {
            settings.log_file = last.log_file;
        }

        // Saved before `--debug` so a one-off debug run does not stick.
        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        Self::apply_debug(settings)
    }

    /// Where the label matrix goes when `--label-output` is not given.
    pub fn resolved_label_output(&self) -> PathBuf {
        self.label_output.clone().unwrap_or_else(|| {
            self.output
                .parent()
                .map_or_else(|| PathBuf::from("true.csv"), |p| p.join("true.csv"))
        })
    }

    /// `--debug` overrides the log level.
    fn apply_debug(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            log_level: Some(s.log_level.clone()),
            log_file: s.log_file.clone(),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp_config_path(tmp: &TempDir) -> PathBuf {
        LastUsedParams::config_path_in(tmp.path())
    }

    #[test]
    fn test_last_used_params_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let params = LastUsedParams {
            log_level: Some("WARNING".to_string()),
            log_file: Some(PathBuf::from("/var/log/features.log")),
        };
        params.save_to(&path).expect("save");

        let loaded = LastUsedParams::load_from(&path);
        assert_eq!(loaded.log_level.as_deref(), Some("WARNING"));
        assert_eq!(loaded.log_file, Some(PathBuf::from("/var/log/features.log")));
    }

    #[test]
    fn test_last_used_params_default_when_missing() {
        let tmp = TempDir::new().expect("tempdir");
        let loaded = LastUsedParams::load_from(&tmp_config_path(&tmp));
        assert!(loaded.log_level.is_none());
        assert!(loaded.log_file.is_none());
    }

    #[test]
    fn test_last_used_params_clear() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        LastUsedParams::default().save_to(&path).expect("save");
        assert!(path.exists());
        LastUsedParams::clear_at(&path).expect("clear");
        assert!(!path.exists());
    }

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["feature-engineer"]);

        assert_eq!(settings.events, PathBuf::from("input/train.csv"));
        assert!(settings.labels.is_none());
        assert_eq!(settings.output, PathBuf::from("data/features.csv"));
        assert_eq!(settings.feature_set, FeatureSet::Extended);
        assert_eq!(settings.format, OutputFormat::Csv);
        assert!(settings.taxonomy.is_none());
        assert_eq!(settings.questions, 18);
        assert_eq!(settings.log_level, "INFO");
        assert!(!settings.debug);
    }

    #[test]
    fn test_settings_cli_feature_set() {
        let settings = Settings::parse_from(["feature-engineer", "--feature-set", "basic"]);
        assert_eq!(settings.feature_set, FeatureSet::Basic);
    }

    #[test]
    fn test_settings_rejects_zero_questions() {
        let result = Settings::try_parse_from(["feature-engineer", "--questions", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolved_label_output() {
        let settings = Settings::parse_from(["feature-engineer", "--output", "out/f.csv"]);
        assert_eq!(settings.resolved_label_output(), PathBuf::from("out/true.csv"));

        let settings = Settings::parse_from(["feature-engineer", "--label-output", "l.csv"]);
        assert_eq!(settings.resolved_label_output(), PathBuf::from("l.csv"));
    }

    #[test]
    fn test_load_with_last_used_merges_persisted_log_level() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            log_level: Some("WARNING".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings =
            Settings::load_with_last_used_impl(vec!["feature-engineer".into()], &config_path);
        assert_eq!(settings.log_level, "WARNING");
    }

    #[test]
    fn test_load_with_last_used_cli_overrides_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            log_level: Some("WARNING".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(
            vec!["feature-engineer".into(), "--log-level".into(), "ERROR".into()],
            &config_path,
        );
        assert_eq!(settings.log_level, "ERROR");
    }

    #[test]
    fn test_same_arguments_resolve_to_same_settings() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        let args = || -> Vec<std::ffi::OsString> {
            vec!["feature-engineer".into(), "--events".into(), "in.csv".into()]
        };

        let first = Settings::load_with_last_used_impl(args(), &config_path);
        Settings::load_with_last_used_impl(
            [
                "feature-engineer",
                "--feature-set",
                "basic",
                "--format",
                "jsonl",
                "--taxonomy",
                "custom.json",
                "--questions",
                "4",
            ]
            .into_iter()
            .map(Into::into)
            .collect(),
            &config_path,
        );
        let second = Settings::load_with_last_used_impl(args(), &config_path);

        assert_eq!(first, second);
        assert_eq!(second.feature_set, FeatureSet::Extended);
        assert_eq!(second.format, OutputFormat::Csv);
        assert!(second.taxonomy.is_none());
        assert_eq!(second.questions, 18);
    }

    #[test]
    fn test_load_with_last_used_clear_removes_file() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams::default().save_to(&config_path).expect("save");

        Settings::load_with_last_used_impl(
            vec!["feature-engineer".into(), "--clear".into()],
            &config_path,
        );
        assert!(!config_path.exists(), "file must be gone after --clear");
    }

    #[test]
    fn test_load_with_last_used_debug_overrides_log_level() {
        let tmp = TempDir::new().expect("tempdir");
        let settings = Settings::load_with_last_used_impl(
            vec!["feature-engineer".into(), "--debug".into()],
            &tmp_config_path(&tmp),
        );
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_load_with_last_used_persists_after_run() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        Settings::load_with_last_used_impl(
            vec!["feature-engineer".into(), "--log-level".into(), "WARNING".into()],
            &config_path,
        );

        let loaded = LastUsedParams::load_from(&config_path);
        assert_eq!(loaded.log_level.as_deref(), Some("WARNING"));
    }

    #[test]
    fn test_debug_flag_is_not_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        Settings::load_with_last_used_impl(
            vec!["feature-engineer".into(), "--debug".into()],
            &config_path,
        );
        let settings =
            Settings::load_with_last_used_impl(vec!["feature-engineer".into()], &config_path);
        assert_eq!(settings.log_level, "INFO");
    }
}
