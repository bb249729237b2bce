//! Fill configuration.
//!
//! A [`FillConfiguration`] is immutable input to one preview or execute
//! run. It is usually loaded from TOML:
//!
//! ```toml
//! categories = ["Walls", "Doors"]
//! modes = ["RoomName", "Level"]
//! base_level = "Level 1"
//! top_level = "Level 2"
//! overwrite_existing = false
//!
//! [targets]
//! room_name = ["ACG-Room-Name"]
//! level = ["ACG-Level"]
//! ```

use crate::error::ConfigError;
use crate::host::ModelHost;
use crate::model::{Category, Level};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// One independent fill capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FillMode {
    Level,
    RoomName,
    RoomNumber,
    Groups,
    /// Legacy mode: room name or number chosen per parameter by its name.
    RoomOnly,
}

impl FillMode {
    /// Execution order. Level runs last because it isolates the updated
    /// elements in the view.
    pub const EXECUTION_ORDER: [FillMode; 5] = [
        FillMode::RoomOnly,
        FillMode::RoomName,
        FillMode::RoomNumber,
        FillMode::Groups,
        FillMode::Level,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            FillMode::Level => "Level",
            FillMode::RoomName => "Room Name",
            FillMode::RoomNumber => "Room Number",
            FillMode::Groups => "Groups",
            FillMode::RoomOnly => "Room (legacy)",
        }
    }
}

impl fmt::Display for FillMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Mode names accepted in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillModeName {
    Level,
    RoomName,
    RoomNumber,
    Groups,
    RoomOnly,
    All,
}

/// Set of active fill modes.
///
/// `All` enables the four current modes; the legacy RoomOnly mode is only
/// active when named explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<FillModeName>", into = "Vec<FillModeName>")]
pub struct FillModes {
    pub level: bool,
    pub room_name: bool,
    pub room_number: bool,
    pub groups: bool,
    pub room_only: bool,
}

impl FillModes {
    pub const ALL: FillModes = FillModes {
        level: true,
        room_name: true,
        room_number: true,
        groups: true,
        room_only: false,
    };

    #[must_use]
    pub fn contains(&self, mode: FillMode) -> bool {
        match mode {
            FillMode::Level => self.level,
            FillMode::RoomName => self.room_name,
            FillMode::RoomNumber => self.room_number,
            FillMode::Groups => self.groups,
            FillMode::RoomOnly => self.room_only,
        }
    }

    pub fn insert(&mut self, mode: FillMode) {
        match mode {
            FillMode::Level => self.level = true,
            FillMode::RoomName => self.room_name = true,
            FillMode::RoomNumber => self.room_number = true,
            FillMode::Groups => self.groups = true,
            FillMode::RoomOnly => self.room_only = true,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active().next().is_none()
    }

    /// Active modes in execution order.
    pub fn active(&self) -> impl Iterator<Item = FillMode> + '_ {
        FillMode::EXECUTION_ORDER
            .into_iter()
            .filter(|mode| self.contains(*mode))
    }

    /// Whether any mode needs room resolution.
    #[must_use]
    pub fn needs_rooms(&self) -> bool {
        self.room_name || self.room_number || self.room_only
    }
}

impl FromIterator<FillMode> for FillModes {
    fn from_iter<I: IntoIterator<Item = FillMode>>(iter: I) -> Self {
        let mut modes = FillModes::default();
        for mode in iter {
            modes.insert(mode);
        }
        modes
    }
}

impl From<Vec<FillModeName>> for FillModes {
    fn from(names: Vec<FillModeName>) -> Self {
        let mut modes = FillModes::default();
        for name in names {
            match name {
                FillModeName::Level => modes.level = true,
                FillModeName::RoomName => modes.room_name = true,
                FillModeName::RoomNumber => modes.room_number = true,
                FillModeName::Groups => modes.groups = true,
                FillModeName::RoomOnly => modes.room_only = true,
                FillModeName::All => {
                    modes.level = true;
                    modes.room_name = true;
                    modes.room_number = true;
                    modes.groups = true;
                }
            }
        }
        modes
    }
}

impl From<FillModes> for Vec<FillModeName> {
    fn from(modes: FillModes) -> Self {
        modes
            .active()
            .map(|mode| match mode {
                FillMode::Level => FillModeName::Level,
                FillMode::RoomName => FillModeName::RoomName,
                FillMode::RoomNumber => FillModeName::RoomNumber,
                FillMode::Groups => FillModeName::Groups,
                FillMode::RoomOnly => FillModeName::RoomOnly,
            })
            .collect()
    }
}

/// Target parameter names per mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterTargets {
    pub level: Vec<String>,
    pub room_name: Vec<String>,
    pub room_number: Vec<String>,
    /// Receives the combined "number: name" value during room name fill.
    pub room_reference: Vec<String>,
    pub groups: Vec<String>,
    pub room_only: Vec<String>,
}

impl ParameterTargets {
    #[must_use]
    pub fn for_mode(&self, mode: FillMode) -> &[String] {
        match mode {
            FillMode::Level => &self.level,
            FillMode::RoomName => &self.room_name,
            FillMode::RoomNumber => &self.room_number,
            FillMode::Groups => &self.groups,
            FillMode::RoomOnly => &self.room_only,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillConfiguration {
    #[serde(default)]
    pub base_level: Option<String>,
    #[serde(default)]
    pub top_level: Option<String>,
    pub categories: Vec<Category>,
    pub modes: FillModes,
    #[serde(default)]
    pub targets: ParameterTargets,
    #[serde(default)]
    pub overwrite_existing: bool,
    /// Also write the group value onto the group instance element.
    #[serde(default)]
    pub include_group_element: bool,
    /// Value used instead of the group name, keyed by group type name.
    #[serde(default)]
    pub group_aliases: BTreeMap<String, String>,
}

/// The two levels bounding the level band.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelBand {
    pub base: Level,
    pub top: Level,
}

impl FillConfiguration {
    #[must_use]
    pub fn new<I, C>(categories: I, modes: FillModes) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Category>,
    {
        Self {
            base_level: None,
            top_level: None,
            categories: categories.into_iter().map(Into::into).collect(),
            modes,
            targets: ParameterTargets::default(),
            overwrite_existing: false,
            include_group_element: false,
            group_aliases: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_levels(mut self, base: impl Into<String>, top: impl Into<String>) -> Self {
        self.base_level = Some(base.into());
        self.top_level = Some(top.into());
        self
    }

    #[must_use]
    pub fn with_targets(mut self, targets: ParameterTargets) -> Self {
        self.targets = targets;
        self
    }

    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite_existing = overwrite;
        self
    }

    #[must_use]
    pub fn with_group_element(mut self, include: bool) -> Self {
        self.include_group_element = include;
        self
    }

    #[must_use]
    pub fn with_group_alias(mut self, group_type: impl Into<String>, alias: impl Into<String>) -> Self {
        self.group_aliases.insert(group_type.into(), alias.into());
        self
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads a configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::FileRead {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Checks the configuration against the model.
    ///
    /// Returns the resolved level band when both levels are named. Level
    /// mode requires them; other modes only check their ordering when given.
    pub fn validate<H: ModelHost + ?Sized>(
        &self,
        host: &H,
    ) -> Result<Option<LevelBand>, ConfigError> {
        if self.modes.is_empty() {
            return Err(ConfigError::NoModes);
        }
        if self.categories.is_empty() {
            return Err(ConfigError::NoCategories);
        }
        for mode in self.modes.active() {
            let targets = self.targets.for_mode(mode);
            if targets.is_empty() {
                return Err(ConfigError::NoTargets { mode });
            }
            if targets.iter().any(|name| name.trim().is_empty()) {
                return Err(ConfigError::EmptyParameterName { mode });
            }
        }
        if self.modes.room_name && self.targets.room_reference.iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigError::EmptyParameterName {
                mode: FillMode::RoomName,
            });
        }

        let band = match (&self.base_level, &self.top_level) {
            (Some(base), Some(top)) => Some(resolve_band(host, base, top)?),
            (None, _) if self.modes.level => {
                return Err(ConfigError::MissingLevel { role: "base" });
            }
            (_, None) if self.modes.level => {
                return Err(ConfigError::MissingLevel { role: "top" });
            }
            _ => None,
        };
        Ok(band)
    }
}

fn resolve_band<H: ModelHost + ?Sized>(
    host: &H,
    base: &str,
    top: &str,
) -> Result<LevelBand, ConfigError> {
    let base = host
        .level_by_name(base)
        .ok_or_else(|| ConfigError::UnknownLevel {
            role: "base",
            name: base.to_string(),
        })?;
    let top = host
        .level_by_name(top)
        .ok_or_else(|| ConfigError::UnknownLevel {
            role: "top",
            name: top.to_string(),
        })?;
    if base.elevation >= top.elevation {
        return Err(ConfigError::InvertedLevels {
            base: base.name,
            base_elevation: base.elevation,
            top: top.name,
            top_elevation: top.elevation,
        });
    }
    Ok(LevelBand { base, top })
}
