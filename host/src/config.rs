use std::{fs, path::Path, path::PathBuf};

use anyhow::{bail, Context, Result};
use parkscript_core::MapSize;
use parkscript_system_dispatcher::ServerInfo;
use parkscript_world::WorldConfig;
use serde::{Deserialize, Serialize};

/// Settings of one script host, usually read from a TOML file.
///
/// Every field has a default, so a file only lists what it changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Map width in tiles.
    pub map_width: u32,
    /// Map height in tiles.
    pub map_height: u32,
    /// Ticks in one in-game day.
    pub ticks_per_day: u32,
    /// Opening cash balance.
    pub initial_cash: i64,
    /// Opening bank loan.
    pub initial_bank_loan: i64,
    /// Largest loan the bank grants.
    pub max_bank_loan: i64,
    /// Ticks a client waits for the server before a request times out.
    pub action_timeout_ticks: u64,
    /// Group given to players that join.
    pub default_group: u8,
    /// Display name of the local player.
    pub player_name: String,
    /// Information advertised when serving.
    pub server: ServerInfo,
    /// File holding plugin storage. Storage is kept in memory when absent.
    pub storage_path: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        let world = WorldConfig::default();
        Self {
            map_width: world.map_size.x(),
            map_height: world.map_size.y(),
            ticks_per_day: world.ticks_per_day,
            initial_cash: world.initial_cash,
            initial_bank_loan: world.initial_bank_loan,
            max_bank_loan: world.max_bank_loan,
            action_timeout_ticks: 1_200,
            default_group: 1,
            player_name: "player".to_owned(),
            server: ServerInfo {
                name: "Park Server".to_owned(),
                ..ServerInfo::default()
            },
            storage_path: None,
        }
    }
}

impl HostConfig {
    /// Parses and validates TOML contents.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).context("failed to parse host config toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates the TOML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read host config at {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("invalid host config at {}", path.display()))
    }

    /// Rejects settings no world can be built from.
    pub fn validate(&self) -> Result<()> {
        if self.map_width == 0 || self.map_height == 0 {
            bail!(
                "map must have at least one tile, got {}x{}",
                self.map_width,
                self.map_height
            );
        }
        if self.ticks_per_day == 0 {
            bail!("ticks_per_day must be positive");
        }
        if self.action_timeout_ticks == 0 {
            bail!("action_timeout_ticks must be positive");
        }
        if self.max_bank_loan < 0 || self.initial_bank_loan < 0 {
            bail!("bank loans cannot be negative");
        }
        Ok(())
    }

    /// Starting parameters of the world.
    #[must_use]
    pub fn world_config(&self) -> WorldConfig {
        WorldConfig {
            map_size: MapSize::new(self.map_width, self.map_height),
            ticks_per_day: self.ticks_per_day,
            initial_cash: self.initial_cash,
            initial_bank_loan: self.initial_bank_loan,
            max_bank_loan: self.max_bank_loan,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = HostConfig::from_toml_str(
            r#"
            map_width = 32
            ticks_per_day = 100

            [server]
            name = "Sunny Meadows"
            greeting = "Mind the ducks"
            "#,
        )
        .expect("valid config");

        assert_eq!(config.map_width, 32);
        assert_eq!(config.map_height, HostConfig::default().map_height);
        assert_eq!(config.server.greeting, "Mind the ducks");
        assert_eq!(config.world_config().map_size, MapSize::new(32, 64));
    }

    #[test]
    fn unknown_keys_and_empty_maps_are_rejected() {
        assert!(HostConfig::from_toml_str("map_widht = 3").is_err());
        let error = HostConfig::from_toml_str("map_width = 0").expect_err("empty map");
        assert!(format!("{error:#}").contains("at least one tile"));
    }
}
