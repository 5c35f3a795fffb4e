//! Blueprint loading and the selection model.
//!
//! A blueprint is the document that drives one wizard run: global settings (AUR
//! helper, base packages, setup scripts, dotfiles) plus an ordered list of steps,
//! each holding selectable items. YAML is the native format; files ending in `.json`
//! are read as JSON.
//!
//! The wizard mutates item selection in place. Once the pipeline starts, the engine
//! receives a frozen clone and only reads it.

use crate::error::{ProvisionError, Result};
use crate::privilege::{DEFAULT_REFRESH_INTERVAL, SessionMode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use strum::{EnumString, IntoStaticStr};

/// Blueprint read when no `--config` is given.
pub const DEFAULT_BLUEPRINT_PATH: &str = "install_config.yaml";

/// Default compositor config patched when a terminal is chosen.
pub const DEFAULT_TERMINAL_CONFIG: &str = "~/.config/mangowc/config.conf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// At most one item selected
    Single,
    #[default]
    Multi,
}

/// What a step's identifier means to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr)]
#[strum(ascii_case_insensitive)]
pub enum StepKind {
    #[strum(serialize = "helper", serialize = "aur_helper")]
    Helper,
    #[strum(serialize = "dm", serialize = "display_manager")]
    DisplayManager,
    #[strum(serialize = "terminals", serialize = "terminal")]
    Terminals,
    #[strum(serialize = "shell")]
    Shell,
    /// Any other identifier: items are plain packages
    #[strum(serialize = "packages")]
    Packages,
}

impl StepKind {
    pub fn from_id(id: &str) -> Self {
        Self::from_str(id.trim()).unwrap_or(Self::Packages)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    #[serde(rename = "desc", default)]
    pub description: String,
    #[serde(default)]
    pub selected: bool,
}

impl Item {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            selected: false,
        }
    }

    /// Package name made readable: dashes become spaces and a trailing `bin` or
    /// single-digit word is dropped (`sublime-text-4` reads `sublime text`).
    pub fn display_name(&self) -> String {
        let spaced = self.name.replace('-', " ");
        let mut words: Vec<&str> = spaced.split_whitespace().collect();
        if words.len() > 1 {
            if let Some(last) = words.last() {
                let is_digit = last.len() == 1 && last.chars().all(|c| c.is_ascii_digit());
                if *last == "bin" || is_digit {
                    words.pop();
                }
            }
        }
        words.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub mode: SelectionMode,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Step {
    pub fn kind(&self) -> StepKind {
        StepKind::from_id(&self.id)
    }

    /// Flip the selection of item `index`. In single mode every sibling is cleared
    /// first, so at most one item stays selected. Out-of-range indices are ignored.
    pub fn toggle(&mut self, index: usize) {
        let Some(was_selected) = self.items.get(index).map(|item| item.selected) else {
            return;
        };
        if self.mode == SelectionMode::Single {
            for item in &mut self.items {
                item.selected = false;
            }
        }
        self.items[index].selected = !was_selected;
    }

    pub fn selected_items(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(|item| item.selected)
    }

    pub fn has_selection(&self) -> bool {
        self.items.iter().any(|item| item.selected)
    }

    pub fn selected_count(&self) -> usize {
        self.selected_items().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub name: String,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DotfileMapping {
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub dest: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DotfilesConfig {
    #[serde(default)]
    pub repo: Option<String>,
    /// Base directory for relative `dest` paths (defaults to the home directory)
    #[serde(default)]
    pub target_dir: Option<String>,
    #[serde(default)]
    pub items: Vec<DotfileMapping>,
}

impl DotfilesConfig {
    /// The repository URL, if one is configured.
    pub fn repo(&self) -> Option<&str> {
        self.repo
            .as_deref()
            .map(str::trim)
            .filter(|repo| !repo.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeSettings {
    #[serde(default)]
    pub mode: SessionMode,
    #[serde(default = "default_refresh_secs")]
    pub refresh_interval_secs: u64,
}

fn default_refresh_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL.as_secs()
}

impl Default for PrivilegeSettings {
    fn default() -> Self {
        Self {
            mode: SessionMode::default(),
            refresh_interval_secs: default_refresh_secs(),
        }
    }
}

impl PrivilegeSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// AUR helper binary; overwritten by the helper step's choice
    #[serde(rename = "aur_helper", alias = "helper", default)]
    pub helper: String,
    #[serde(default)]
    pub base_packages: Vec<String>,
    #[serde(default)]
    pub external_scripts: Vec<Script>,
    #[serde(default)]
    pub dotfiles: DotfilesConfig,
    #[serde(default = "default_terminal_config")]
    pub terminal_config: String,
    #[serde(default)]
    pub privilege: PrivilegeSettings,
}

fn default_terminal_config() -> String {
    DEFAULT_TERMINAL_CONFIG.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            helper: String::new(),
            base_packages: Vec::new(),
            external_scripts: Vec::new(),
            dotfiles: DotfilesConfig::default(),
            terminal_config: default_terminal_config(),
            privilege: PrivilegeSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blueprint {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Blueprint {
    /// Read and validate a blueprint file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ProvisionError::config(format!("cannot read {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let blueprint: Self = serde_yaml::from_str(content)
            .map_err(|e| ProvisionError::config(format!("malformed blueprint: {}", e)))?;
        blueprint.validate()?;
        Ok(blueprint)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let blueprint: Self = serde_json::from_str(content)
            .map_err(|e| ProvisionError::config(format!("malformed blueprint: {}", e)))?;
        blueprint.validate()?;
        Ok(blueprint)
    }

    /// Check the structural rules a loaded blueprint must satisfy.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            let id = step.id.trim();
            if id.is_empty() {
                return Err(ProvisionError::config(format!("step #{} has no id", index + 1)));
            }
            if !seen.insert(id) {
                return Err(ProvisionError::config(format!("duplicate step id '{}'", id)));
            }
            if step.items.is_empty() {
                return Err(ProvisionError::config(format!("step '{}' has no items", id)));
            }
            if let Some(item) = step.items.iter().find(|item| item.name.trim().is_empty()) {
                return Err(ProvisionError::config(format!(
                    "step '{}' has an item without a name ({})",
                    id, item.description
                )));
            }
            if step.mode == SelectionMode::Single && step.selected_count() > 1 {
                return Err(ProvisionError::config(format!(
                    "single-choice step '{}' preselects more than one item",
                    id
                )));
            }
            if step.kind() == StepKind::Helper && step.mode != SelectionMode::Single {
                return Err(ProvisionError::config(format!(
                    "helper step '{}' must be `type: single`",
                    id
                )));
            }
        }

        if self.settings.helper.trim().is_empty() && self.helper_step_index().is_none() {
            return Err(ProvisionError::config(
                "no AUR helper configured (set settings.aur_helper or add a helper step)",
            ));
        }

        for script in &self.settings.external_scripts {
            if script.command.trim().is_empty() {
                return Err(ProvisionError::config(format!(
                    "script '{}' has an empty command",
                    script.name
                )));
            }
        }

        for mapping in &self.settings.dotfiles.items {
            if mapping.src.trim().is_empty() || mapping.dest.trim().is_empty() {
                return Err(ProvisionError::config(
                    "dotfile mappings need both `src` and `dest`",
                ));
            }
        }

        Ok(())
    }

    pub fn helper(&self) -> &str {
        self.settings.helper.trim()
    }

    pub fn helper_step_index(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| step.kind() == StepKind::Helper)
    }

    /// Every selected item, step by step.
    pub fn selected_items(&self) -> impl Iterator<Item = (&Step, &Item)> {
        self.steps
            .iter()
            .flat_map(|step| step.selected_items().map(move |item| (step, item)))
    }
}
