//! Guard rails for translating instance options into system parameters.
//!
//! # Design
//! - Clamps or drops invalid values so instance setup never hands the engine
//!   a parameter it would reject.
//! - Collects warnings so callers can surface guard-rail applications.
//! - Keeps the options→parameter mapping in one ordered list.

use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EsentError, EsentResult};
use crate::types::JetParam;

/// Prefix used for engine files when none (or an invalid one) is configured.
pub const DEFAULT_BASE_NAME: &str = "edb";
/// Largest session limit forwarded to the engine.
pub const MAX_SESSIONS_LIMIT: u32 = 30_000;

/// Instance configuration, typically loaded from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceOptions {
    /// Directory for the checkpoint file.
    pub system_path: Option<PathBuf>,
    /// Directory for transaction logs.
    pub log_file_path: Option<PathBuf>,
    /// Directory for the temporary database.
    pub temp_path: Option<PathBuf>,
    /// Three-character prefix for engine files.
    pub base_name: String,
    /// Whether crash recovery runs at initialisation.
    pub recovery: bool,
    /// Reuse log files instead of archiving them.
    pub circular_log: Option<bool>,
    /// Maximum number of sessions the instance hands out.
    pub max_sessions: Option<u32>,
    /// Create missing directories for configured paths.
    pub create_path_if_not_exist: bool,
    /// Suppress informational event-log entries.
    pub no_information_event: bool,
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self {
            system_path: None,
            log_file_path: None,
            temp_path: None,
            base_name: DEFAULT_BASE_NAME.to_string(),
            recovery: true,
            circular_log: None,
            max_sessions: None,
            create_path_if_not_exist: false,
            no_information_event: false,
        }
    }
}

impl InstanceOptions {
    /// Parse options from a JSON document; missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EsentError::InvalidOptions`] when the document is malformed.
    pub fn from_json(json: &str) -> EsentResult<Self> {
        serde_json::from_str(json).map_err(|source| EsentError::InvalidOptions { source })
    }

    /// Options that keep every engine file under `directory`.
    #[must_use]
    pub fn in_directory(directory: &Path) -> Self {
        Self {
            system_path: Some(directory.to_path_buf()),
            log_file_path: Some(directory.to_path_buf()),
            temp_path: Some(directory.to_path_buf()),
            create_path_if_not_exist: true,
            ..Self::default()
        }
    }
}

/// One `JetSetSystemParameter` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemParameter {
    /// Parameter id.
    pub param: JetParam,
    /// Integer argument; zero for string parameters.
    pub int_value: usize,
    /// String argument, if the parameter takes one.
    pub string_value: Option<String>,
}

impl SystemParameter {
    const fn int(param: JetParam, int_value: usize) -> Self {
        Self {
            param,
            int_value,
            string_value: None,
        }
    }

    fn text(param: JetParam, value: impl Into<String>) -> Self {
        Self {
            param,
            int_value: 0,
            string_value: Some(value.into()),
        }
    }
}

/// Planned system parameters plus guard-rail warnings.
#[derive(Debug, Clone, Default)]
pub struct ParameterPlan {
    /// Parameters in the order they are applied.
    pub parameters: Vec<SystemParameter>,
    /// Warnings describing clamp/skip decisions applied to the options.
    pub warnings: Vec<String>,
}

impl ParameterPlan {
    /// Clamp/normalise options into the parameter list.
    #[must_use]
    pub fn from_options(options: &InstanceOptions) -> Self {
        let mut plan = Self::default();

        plan.push_directory(JetParam::SystemPath, "system_path", options.system_path.as_deref());
        plan.push_directory(
            JetParam::LogFilePath,
            "log_file_path",
            options.log_file_path.as_deref(),
        );
        plan.push_directory(JetParam::TempPath, "temp_path", options.temp_path.as_deref());

        let base_name = if is_valid_base_name(&options.base_name) {
            options.base_name.as_str()
        } else {
            plan.warnings.push(format!(
                "base_name {:?} is not three alphanumeric characters; using {DEFAULT_BASE_NAME}",
                options.base_name
            ));
            DEFAULT_BASE_NAME
        };
        plan.parameters
            .push(SystemParameter::text(JetParam::BaseName, base_name));

        plan.parameters.push(SystemParameter::text(
            JetParam::Recovery,
            if options.recovery { "on" } else { "off" },
        ));

        if let Some(circular) = options.circular_log {
            plan.parameters.push(SystemParameter::int(
                JetParam::CircularLog,
                usize::from(circular),
            ));
        }

        if let Some(requested) = options.max_sessions {
            let clamped = requested.clamp(1, MAX_SESSIONS_LIMIT);
            if clamped != requested {
                plan.warnings.push(format!(
                    "max_sessions {requested} is out of range; clamped to {clamped}"
                ));
            }
            plan.parameters.push(SystemParameter::int(
                JetParam::MaxSessions,
                usize::try_from(clamped).unwrap_or(usize::MAX),
            ));
        }

        if options.create_path_if_not_exist {
            plan.parameters
                .push(SystemParameter::int(JetParam::CreatePathIfNotExist, 1));
        }
        if options.no_information_event {
            plan.parameters
                .push(SystemParameter::int(JetParam::NoInformationEvent, 1));
        }

        plan
    }

    fn push_directory(&mut self, param: JetParam, field: &str, path: Option<&Path>) {
        let Some(path) = path else {
            return;
        };
        let Some(text) = path.to_str() else {
            self.warnings
                .push(format!("{field} is not valid UTF-8; leaving engine default"));
            return;
        };
        if text.trim().is_empty() {
            self.warnings
                .push(format!("{field} is empty; leaving engine default"));
            return;
        }
        let mut directory = text.to_string();
        if !directory.ends_with(['/', '\\']) {
            directory.push(MAIN_SEPARATOR);
        }
        self.parameters.push(SystemParameter::text(param, directory));
    }
}

fn is_valid_base_name(name: &str) -> bool {
    name.len() == 3 && name.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(plan: &ParameterPlan, param: JetParam) -> Option<&SystemParameter> {
        plan.parameters.iter().find(|entry| entry.param == param)
    }

    #[test]
    fn defaults_set_base_name_and_recovery_only() {
        let plan = ParameterPlan::from_options(&InstanceOptions::default());
        assert!(plan.warnings.is_empty());
        assert_eq!(
            plan.parameters,
            vec![
                SystemParameter::text(JetParam::BaseName, "edb"),
                SystemParameter::text(JetParam::Recovery, "on"),
            ]
        );
    }

    #[test]
    fn directories_gain_a_trailing_separator() {
        let options = InstanceOptions::in_directory(Path::new("data"));
        let plan = ParameterPlan::from_options(&options);
        let expected = format!("data{MAIN_SEPARATOR}");
        for param in [JetParam::SystemPath, JetParam::LogFilePath, JetParam::TempPath] {
            let entry = find(&plan, param).expect("directory parameter");
            assert_eq!(entry.string_value.as_deref(), Some(expected.as_str()));
        }
        assert!(find(&plan, JetParam::CreatePathIfNotExist).is_some());
    }

    #[test]
    fn guard_rails_clamp_and_warn() {
        let options = InstanceOptions {
            system_path: Some(PathBuf::new()),
            base_name: "toolong".to_string(),
            max_sessions: Some(0),
            recovery: false,
            ..InstanceOptions::default()
        };
        let plan = ParameterPlan::from_options(&options);

        assert_eq!(plan.warnings.len(), 3);
        assert!(find(&plan, JetParam::SystemPath).is_none());
        assert_eq!(
            find(&plan, JetParam::BaseName).and_then(|entry| entry.string_value.as_deref()),
            Some("edb")
        );
        assert_eq!(
            find(&plan, JetParam::MaxSessions).map(|entry| entry.int_value),
            Some(1)
        );
        assert_eq!(
            find(&plan, JetParam::Recovery).and_then(|entry| entry.string_value.as_deref()),
            Some("off")
        );
    }

    #[test]
    fn options_parse_from_partial_json() -> anyhow::Result<()> {
        let options = InstanceOptions::from_json(
            r#"{ "recovery": false, "max_sessions": 64, "circular_log": true }"#,
        )?;
        assert!(!options.recovery);
        assert_eq!(options.max_sessions, Some(64));
        assert_eq!(options.base_name, DEFAULT_BASE_NAME);

        let plan = ParameterPlan::from_options(&options);
        assert_eq!(
            find(&plan, JetParam::CircularLog).map(|entry| entry.int_value),
            Some(1)
        );
        Ok(())
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = InstanceOptions::from_json("{ not json").expect_err("malformed");
        assert!(matches!(err, EsentError::InvalidOptions { .. }));
    }
}
