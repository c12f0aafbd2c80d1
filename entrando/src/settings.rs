use anyhow::{bail, Context, Result};
use entrando_game::{EntranceType, GameData, RegionKey};
use entrando_logic::{AgeTime, GlobalState, LogicMode};
use serde::{Deserialize, Serialize};
use strum::VariantNames;

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default)]
pub struct ShuffleSettings {
    pub name: Option<String>,
    pub logic_mode: LogicMode,
    pub starting_age_times: Vec<AgeTime>,
    pub shuffle_dungeon_entrances: DungeonShuffle,
    pub shuffle_overworld_entrances: bool,
    pub shuffle_interior_entrances: InteriorShuffle,
    pub shuffle_grotto_entrances: bool,
    pub shuffle_warp_songs: bool,
    pub shuffle_owl_drops: bool,
    pub shuffle_overworld_spawns: bool,
    pub decouple_entrances: bool,
    // Entrance types listed here are shuffled together in a single pool.
    pub mixed_pools: Vec<EntranceType>,
    pub all_locations_reachable: bool,
    pub extra_required_regions: Vec<String>,
    // When false, only `starting_items` are assumed while validating.
    pub assume_all_items: bool,
    pub starting_items: Vec<String>,
    pub max_pool_attempts: usize,
    pub max_shuffle_attempts: usize,
}

impl Default for ShuffleSettings {
    fn default() -> Self {
        ShuffleSettings {
            name: None,
            logic_mode: LogicMode::Glitchless,
            starting_age_times: vec![AgeTime::ChildDay, AgeTime::AdultDay],
            shuffle_dungeon_entrances: DungeonShuffle::Off,
            shuffle_overworld_entrances: false,
            shuffle_interior_entrances: InteriorShuffle::Off,
            shuffle_grotto_entrances: false,
            shuffle_warp_songs: false,
            shuffle_owl_drops: false,
            shuffle_overworld_spawns: false,
            decouple_entrances: false,
            mixed_pools: vec![],
            all_locations_reachable: true,
            extra_required_regions: vec![],
            assume_all_items: true,
            starting_items: vec![],
            max_pool_attempts: 20,
            max_shuffle_attempts: 10,
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub enum DungeonShuffle {
    #[default]
    Off,
    On,
    IncludeGanon,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub enum InteriorShuffle {
    #[default]
    Off,
    Simple,
    All,
}

impl ShuffleSettings {
    /// Entrance types to shuffle, in pool order.
    pub fn enabled_types(&self) -> Vec<EntranceType> {
        let mut types = vec![];
        if self.shuffle_overworld_spawns {
            types.push(EntranceType::Spawn);
        }
        if self.shuffle_warp_songs {
            types.push(EntranceType::WarpSong);
        }
        if self.shuffle_owl_drops {
            types.push(EntranceType::OwlDrop);
        }
        match self.shuffle_dungeon_entrances {
            DungeonShuffle::Off => {}
            DungeonShuffle::On => types.push(EntranceType::Dungeon),
            DungeonShuffle::IncludeGanon => {
                types.push(EntranceType::Dungeon);
                types.push(EntranceType::GanonDungeon);
            }
        }
        match self.shuffle_interior_entrances {
            InteriorShuffle::Off => {}
            InteriorShuffle::Simple => types.push(EntranceType::Interior),
            InteriorShuffle::All => {
                types.push(EntranceType::Interior);
                types.push(EntranceType::SpecialInterior);
            }
        }
        if self.shuffle_grotto_entrances {
            types.push(EntranceType::GrottoGrave);
        }
        if self.shuffle_overworld_entrances {
            types.push(EntranceType::Overworld);
        }
        types
    }

    pub fn get_extra_required_regions(&self, game_data: &GameData) -> Result<Vec<RegionKey>> {
        self.extra_required_regions
            .iter()
            .map(|name| game_data.get_region_key(name))
            .collect()
    }

    /// Items assumed to be available while validating reachability.
    pub fn get_validation_state(&self, game_data: &GameData) -> Result<GlobalState> {
        if self.assume_all_items {
            return Ok(GlobalState::with_all_items(game_data));
        }
        let mut state = GlobalState::new(game_data);
        for item in &self.starting_items {
            match game_data.item_isv.index_by_key.get(item) {
                Some(&item_id) => state.collect(item_id),
                None => bail!("Unknown starting item {item}"),
            }
        }
        Ok(state)
    }
}

pub fn parse_shuffle_settings(settings_json: &str) -> Result<ShuffleSettings> {
    let settings: ShuffleSettings =
        serde_json::from_str(settings_json).context("Unable to parse shuffle settings")?;
    if settings.max_pool_attempts == 0 || settings.max_shuffle_attempts == 0 {
        bail!("Attempt limits must be positive");
    }
    if settings.starting_age_times.is_empty() {
        bail!("At least one starting age/time is required");
    }
    for t in &settings.mixed_pools {
        if matches!(t, EntranceType::None | EntranceType::Extra | EntranceType::All) {
            bail!(
                "Entrance type {t:?} cannot be mixed (entrance types: {:?})",
                EntranceType::VARIANTS
            );
        }
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_partial_settings() -> Result<()> {
        let settings = parse_shuffle_settings(
            r#"{
                "logic_mode": "Glitched",
                "shuffle_dungeon_entrances": "IncludeGanon",
                "shuffle_interior_entrances": "Simple",
                "mixed_pools": ["Dungeon", "Interior"],
                "max_shuffle_attempts": 3
            }"#,
        )?;
        assert_eq!(settings.logic_mode, LogicMode::Glitched);
        assert_eq!(settings.max_shuffle_attempts, 3);
        assert_eq!(settings.max_pool_attempts, 20);
        assert_eq!(
            settings.enabled_types(),
            vec![
                EntranceType::Dungeon,
                EntranceType::GanonDungeon,
                EntranceType::Interior
            ]
        );
        Ok(())
    }

    #[test]
    fn reject_bad_settings() {
        assert!(parse_shuffle_settings(r#"{"max_pool_attempts": 0}"#).is_err());
        assert!(parse_shuffle_settings(r#"{"starting_age_times": []}"#).is_err());
        assert!(parse_shuffle_settings(r#"{"mixed_pools": ["All"]}"#).is_err());
        assert!(parse_shuffle_settings(r#"{"logic_mode": "Sometimes"}"#).is_err());
    }

    #[test]
    fn default_shuffles_nothing() {
        assert!(ShuffleSettings::default().enabled_types().is_empty());
    }
}
