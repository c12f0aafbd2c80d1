// The changes suggested by this lint usually make the code more cluttered and less clear:
#![allow(clippy::needless_range_loop)]

use anyhow::{bail, ensure, Context, Result};
use hashbrown::{HashMap, HashSet};
use log::info;
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use std::borrow::ToOwned;
use std::hash::Hash;
use std::path::Path;
use strum_macros::{EnumString, VariantNames};

pub type RegionKey = usize; // Index into GameData.region_isv.keys
pub type ItemId = usize; // Index into GameData.item_isv.keys
pub type EventId = usize; // Index into GameData.event_isv.keys
pub type HelperIdx = usize; // Index into GameData.helper_isv.keys (helpers are evaluated in this order)
pub type EntranceIndex = i16; // Stable index from the entrance table, used as the override key
pub type EntranceTableIdx = usize; // Index into GameData.entrance_table

pub const ROOT_REGION: RegionKey = 0;
pub const ROOT_REGION_NAME: &str = "Root";
pub const NONE_REGION_NAME: &str = "None";
pub const NO_ENTRANCE_INDEX: EntranceIndex = -1;
pub const SPOILER_ENTRANCE_GROUP_COUNT: usize = 16;
pub const TRACKER_ENTRANCE_TYPE_COUNT: usize = 4;

#[derive(Default, Clone, Debug)]
pub struct IndexedVec<T: Hash + Eq> {
    pub keys: Vec<T>,
    pub index_by_key: HashMap<T, usize>,
}

impl<T: Hash + Eq> IndexedVec<T> {
    pub fn add<U: ToOwned<Owned = T> + ?Sized>(&mut self, name: &U) -> usize {
        if !self.index_by_key.contains_key(&name.to_owned()) {
            let idx = self.keys.len();
            self.index_by_key.insert(name.to_owned(), self.keys.len());
            self.keys.push(name.to_owned());
            idx
        } else {
            self.index_by_key[&name.to_owned()]
        }
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumString,
    VariantNames,
    Serialize,
    Deserialize,
    PartialOrd,
    Ord,
    Default,
)]
pub enum EntranceType {
    #[default]
    None,
    OwlDrop,
    Spawn,
    WarpSong,
    Dungeon,
    GanonDungeon,
    Interior,
    SpecialInterior,
    GrottoGrave,
    Overworld,
    Extra,
    All,
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumString,
    VariantNames,
    TryFromPrimitive,
    Serialize,
    Deserialize,
    PartialOrd,
    Ord,
    Default,
)]
#[repr(u8)]
pub enum SpoilerEntranceGroup {
    #[default]
    NoGroup,
    KokiriForest,
    LostWoods,
    Kakariko,
    Graveyard,
    DeathMountainTrail,
    DeathMountainCrater,
    GoronCity,
    ZorasDomain,
    HyruleField,
    LonLonRanch,
    LakeHylia,
    GerudoValley,
    HauntedWasteland,
    Market,
    HyruleCastle,
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumString,
    VariantNames,
    TryFromPrimitive,
    Serialize,
    Deserialize,
    Default,
)]
#[repr(u8)]
pub enum TrackerEntranceType {
    #[default]
    Overworld,
    Interior,
    Grotto,
    Dungeon,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    Free,
    Never,
    Child,
    Adult,
    Day,
    Night,
    Item(ItemId),
    Event(EventId),
    Helper(HelperIdx),
    And(Vec<Requirement>),
    Or(Vec<Requirement>),
}

impl Requirement {
    pub fn make_and(reqs: Vec<Requirement>) -> Requirement {
        let mut out_reqs: Vec<Requirement> = vec![];
        for req in reqs {
            if let Requirement::Never = req {
                return Requirement::Never;
            } else if let Requirement::Free = req {
                continue;
            }
            out_reqs.push(req);
        }
        if out_reqs.is_empty() {
            Requirement::Free
        } else if out_reqs.len() == 1 {
            out_reqs.into_iter().next().unwrap()
        } else {
            Requirement::And(out_reqs)
        }
    }

    pub fn make_or(reqs: Vec<Requirement>) -> Requirement {
        let mut out_reqs: Vec<Requirement> = vec![];
        for req in reqs {
            if let Requirement::Never = req {
                continue;
            } else if let Requirement::Free = req {
                return Requirement::Free;
            }
            out_reqs.push(req);
        }
        if out_reqs.is_empty() {
            Requirement::Never
        } else if out_reqs.len() == 1 {
            out_reqs.into_iter().next().unwrap()
        } else {
            Requirement::Or(out_reqs)
        }
    }
}

/// Requirement as written in world data, referring to items, events and helpers by name.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequirementJson {
    Free,
    Never,
    Child,
    Adult,
    Day,
    Night,
    Item(String),
    Event(String),
    Helper(String),
    And(Vec<RequirementJson>),
    Or(Vec<RequirementJson>),
}

/// Condition slots of an exit: slot 0 is evaluated in glitchless logic, and slot 1 is
/// the glitched fallback, consulted only in glitched logic when slot 0 fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConditionSlots {
    pub glitchless: Requirement,
    pub glitched: Option<Requirement>,
}

impl ConditionSlots {
    pub fn free() -> Self {
        ConditionSlots {
            glitchless: Requirement::Free,
            glitched: None,
        }
    }

    pub fn new(glitchless: Requirement) -> Self {
        ConditionSlots {
            glitchless,
            glitched: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExitData {
    pub to: RegionKey,
    pub conditions: ConditionSlots,
}

#[derive(Clone, Debug)]
pub struct RegionData {
    pub key: RegionKey,
    pub name: String,
    pub time_passes: bool,
    pub locations: Vec<String>,
    pub events: Vec<(EventId, Requirement)>,
    pub exits: Vec<ExitData>,
}

/// Static description of a shuffleable entrance.
#[derive(Clone, Debug, Serialize)]
pub struct EntranceData {
    pub index: EntranceIndex,
    pub name: String,
    pub from: RegionKey,
    pub to: RegionKey,
    pub entrance_type: EntranceType,
    pub group: SpoilerEntranceGroup,
    pub tracker_type: TrackerEntranceType,
    pub one_exit: bool,
    pub reverse: Option<EntranceIndex>,
    pub blue_warp: EntranceIndex,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorldJson {
    items: Vec<String>,
    #[serde(default)]
    helpers: Vec<HelperJson>,
    regions: Vec<RegionJson>,
    #[serde(default)]
    entrances: Vec<EntranceJson>,
}

#[derive(Deserialize)]
struct HelperJson {
    name: String,
    requirement: RequirementJson,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegionJson {
    name: String,
    #[serde(default)]
    time_passes: bool,
    #[serde(default)]
    locations: Vec<String>,
    #[serde(default)]
    events: Vec<EventJson>,
    #[serde(default)]
    exits: Vec<ExitJson>,
}

#[derive(Deserialize)]
struct EventJson {
    name: String,
    requirement: RequirementJson,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExitJson {
    to: String,
    requirement: RequirementJson,
    #[serde(default)]
    glitched_requirement: Option<RequirementJson>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntranceJson {
    index: EntranceIndex,
    from: String,
    to: String,
    #[serde(rename = "type")]
    entrance_type: EntranceType,
    #[serde(default)]
    group: SpoilerEntranceGroup,
    #[serde(default)]
    tracker_type: TrackerEntranceType,
    #[serde(default)]
    one_exit: bool,
    #[serde(default)]
    reverse: Option<EntranceIndex>,
    #[serde(default)]
    blue_warp: EntranceIndex,
}

#[derive(Default, Clone, Debug)]
pub struct GameData {
    pub item_isv: IndexedVec<String>,
    pub event_isv: IndexedVec<String>,
    pub helper_isv: IndexedVec<String>,
    pub helpers: Vec<Requirement>, // Corresponds to helper_isv
    pub region_isv: IndexedVec<String>,
    pub regions: Vec<RegionData>, // Corresponds to region_isv
    pub entrance_table: Vec<EntranceData>,
    pub entrance_table_idx_by_index: HashMap<EntranceIndex, EntranceTableIdx>,
}

impl GameData {
    pub fn load(path: &Path) -> Result<GameData> {
        info!("Loading world data from {}", path.display());
        let world_str = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read world data at {}", path.display()))?;
        GameData::from_json_str(&world_str)
            .with_context(|| format!("Unable to process world data at {}", path.display()))
    }

    pub fn from_json_str(world_str: &str) -> Result<GameData> {
        let world_json: WorldJson =
            serde_json::from_str(world_str).context("Unable to parse world data")?;
        let mut game_data = GameData::default();
        for item in &world_json.items {
            game_data.item_isv.add(item);
        }
        game_data.load_helpers(&world_json.helpers)?;
        game_data.load_regions(&world_json.regions)?;
        game_data.load_entrance_table(&world_json.entrances)?;
        info!(
            "Loaded {} regions, {} items, {} helpers, {} table entrances",
            game_data.regions.len(),
            game_data.item_isv.keys.len(),
            game_data.helpers.len(),
            game_data.entrance_table.len()
        );
        Ok(game_data)
    }

    fn load_helpers(&mut self, helpers_json: &[HelperJson]) -> Result<()> {
        for helper in helpers_json {
            // Helpers may only refer to helpers defined before them, so that recomputing
            // them in order always sees up-to-date values.
            let req = self
                .parse_requirement(&helper.requirement)
                .with_context(|| format!("Parsing helper {}", helper.name))?;
            ensure!(
                !self.helper_isv.index_by_key.contains_key(&helper.name),
                "Duplicate helper {}",
                helper.name
            );
            self.helper_isv.add(&helper.name);
            self.helpers.push(req);
        }
        Ok(())
    }

    fn load_regions(&mut self, regions_json: &[RegionJson]) -> Result<()> {
        ensure!(
            regions_json.first().map(|r| r.name.as_str()) == Some(ROOT_REGION_NAME),
            "The first region must be {ROOT_REGION_NAME}"
        );
        for region_json in regions_json {
            ensure!(
                region_json.name != NONE_REGION_NAME,
                "Region name {NONE_REGION_NAME} is reserved"
            );
            if self.region_isv.index_by_key.contains_key(&region_json.name) {
                bail!("Duplicate region {}", region_json.name);
            }
            self.region_isv.add(&region_json.name);
        }
        for (key, region_json) in regions_json.iter().enumerate() {
            let region = self
                .process_region(key, region_json)
                .with_context(|| format!("Processing region {}", region_json.name))?;
            self.regions.push(region);
        }
        Ok(())
    }

    fn process_region(&mut self, key: RegionKey, region_json: &RegionJson) -> Result<RegionData> {
        let mut events: Vec<(EventId, Requirement)> = vec![];
        for event_json in &region_json.events {
            let event_id = self.event_isv.add(&event_json.name);
            let req = self.parse_requirement(&event_json.requirement)?;
            events.push((event_id, req));
        }
        let mut exits: Vec<ExitData> = vec![];
        let mut seen_targets: HashSet<RegionKey> = HashSet::new();
        for exit_json in &region_json.exits {
            let to = self.get_region_key(&exit_json.to)?;
            if !seen_targets.insert(to) {
                bail!("Duplicate exit to {}", exit_json.to);
            }
            let glitchless = self.parse_requirement(&exit_json.requirement)?;
            let glitched = match &exit_json.glitched_requirement {
                Some(r) => Some(self.parse_requirement(r)?),
                None => None,
            };
            exits.push(ExitData {
                to,
                conditions: ConditionSlots {
                    glitchless,
                    glitched,
                },
            });
        }
        Ok(RegionData {
            key,
            name: region_json.name.clone(),
            time_passes: region_json.time_passes,
            locations: region_json.locations.clone(),
            events,
            exits,
        })
    }

    fn load_entrance_table(&mut self, entrances_json: &[EntranceJson]) -> Result<()> {
        for entrance_json in entrances_json {
            ensure!(
                entrance_json.index >= 0,
                "Negative entrance index {}",
                entrance_json.index
            );
            if self
                .entrance_table_idx_by_index
                .contains_key(&entrance_json.index)
            {
                bail!("Duplicate entrance index {}", entrance_json.index);
            }
            let from = self.get_region_key(&entrance_json.from)?;
            let to = self.get_region_key(&entrance_json.to)?;
            if !self.regions[from].exits.iter().any(|e| e.to == to) {
                bail!(
                    "Entrance {} refers to a missing exit {} -> {}",
                    entrance_json.index,
                    entrance_json.from,
                    entrance_json.to
                );
            }
            self.entrance_table_idx_by_index
                .insert(entrance_json.index, self.entrance_table.len());
            self.entrance_table.push(EntranceData {
                index: entrance_json.index,
                name: format!("{} -> {}", entrance_json.from, entrance_json.to),
                from,
                to,
                entrance_type: entrance_json.entrance_type,
                group: entrance_json.group,
                tracker_type: entrance_json.tracker_type,
                one_exit: entrance_json.one_exit,
                reverse: entrance_json.reverse,
                blue_warp: entrance_json.blue_warp,
            });
        }

        // Reverse pairings are declared on the primary side only:
        let mut paired: HashSet<EntranceIndex> = HashSet::new();
        for entrance in &self.entrance_table {
            let Some(reverse) = entrance.reverse else {
                continue;
            };
            let Some(&reverse_idx) = self.entrance_table_idx_by_index.get(&reverse) else {
                bail!(
                    "Entrance {} has unknown reverse {}",
                    entrance.index,
                    reverse
                );
            };
            let reverse_entrance = &self.entrance_table[reverse_idx];
            ensure!(
                reverse_entrance.reverse.is_none(),
                "Entrances {} and {} both declare a reverse",
                entrance.index,
                reverse
            );
            ensure!(
                reverse_entrance.from == entrance.to && reverse_entrance.to == entrance.from,
                "Entrance {} is not the reverse of entrance {}",
                reverse,
                entrance.index
            );
            if !paired.insert(entrance.index) || !paired.insert(reverse) {
                bail!("Entrance {} is paired more than once", entrance.index);
            }
        }
        Ok(())
    }

    pub fn get_region_key(&self, name: &str) -> Result<RegionKey> {
        match self.region_isv.index_by_key.get(name) {
            Some(&key) => Ok(key),
            None => bail!("Unknown region {name}"),
        }
    }

    pub fn get_entrance_data(&self, index: EntranceIndex) -> Option<&EntranceData> {
        self.entrance_table_idx_by_index
            .get(&index)
            .map(|&idx| &self.entrance_table[idx])
    }

    pub fn parse_requirement(&mut self, req_json: &RequirementJson) -> Result<Requirement> {
        Ok(match req_json {
            RequirementJson::Free => Requirement::Free,
            RequirementJson::Never => Requirement::Never,
            RequirementJson::Child => Requirement::Child,
            RequirementJson::Adult => Requirement::Adult,
            RequirementJson::Day => Requirement::Day,
            RequirementJson::Night => Requirement::Night,
            RequirementJson::Item(name) => match self.item_isv.index_by_key.get(name) {
                Some(&item_id) => Requirement::Item(item_id),
                None => bail!("Unknown item {name}"),
            },
            RequirementJson::Event(name) => Requirement::Event(self.event_isv.add(name)),
            RequirementJson::Helper(name) => match self.helper_isv.index_by_key.get(name) {
                Some(&helper_idx) => Requirement::Helper(helper_idx),
                None => bail!("Unknown helper {name} (helpers must be defined before use)"),
            },
            RequirementJson::And(reqs) => Requirement::make_and(
                reqs.iter()
                    .map(|r| self.parse_requirement(r))
                    .collect::<Result<Vec<_>>>()?,
            ),
            RequirementJson::Or(reqs) => Requirement::make_or(
                reqs.iter()
                    .map(|r| self.parse_requirement(r))
                    .collect::<Result<Vec<_>>>()?,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_WORLD: &str = r#"{
        "items": ["Bow", "Hookshot"],
        "helpers": [
            {"name": "CanShoot", "requirement": {"or": [{"item": "Bow"}, {"item": "Hookshot"}]}},
            {"name": "CanShootAsAdult", "requirement": {"and": ["adult", {"helper": "CanShoot"}]}}
        ],
        "regions": [
            {"name": "Root", "exits": [{"to": "Field", "requirement": "free"}]},
            {"name": "Field", "timePasses": true,
             "events": [{"name": "OpenGate", "requirement": {"helper": "CanShoot"}}],
             "exits": [
                {"to": "Root", "requirement": "never"},
                {"to": "House", "requirement": "day", "glitchedRequirement": "free"}
             ]},
            {"name": "House", "locations": ["House Chest"],
             "exits": [{"to": "Field", "requirement": "free"}]}
        ],
        "entrances": [
            {"index": 3, "from": "Field", "to": "House", "type": "Interior", "reverse": 4,
             "group": "HyruleField", "trackerType": "Interior"},
            {"index": 4, "from": "House", "to": "Field", "type": "Interior"}
        ]
    }"#;

    #[test]
    fn load_small_world() -> Result<()> {
        let game_data = GameData::from_json_str(SMALL_WORLD)?;
        assert_eq!(game_data.regions.len(), 3);
        assert_eq!(game_data.regions[ROOT_REGION].name, ROOT_REGION_NAME);
        let field = game_data.get_region_key("Field")?;
        assert!(game_data.regions[field].time_passes);
        assert_eq!(game_data.regions[field].events.len(), 1);
        let house_exit = &game_data.regions[field].exits[1];
        assert_eq!(house_exit.conditions.glitchless, Requirement::Day);
        assert_eq!(house_exit.conditions.glitched, Some(Requirement::Free));
        assert_eq!(
            game_data.helpers[1],
            Requirement::And(vec![Requirement::Adult, Requirement::Helper(0)])
        );
        let entrance = game_data.get_entrance_data(3).unwrap();
        assert_eq!(entrance.name, "Field -> House");
        assert_eq!(entrance.reverse, Some(4));
        assert_eq!(entrance.group, SpoilerEntranceGroup::HyruleField);
        Ok(())
    }

    #[test]
    fn reject_forward_helper_reference() {
        let world = r#"{
            "items": [],
            "helpers": [
                {"name": "A", "requirement": {"helper": "B"}},
                {"name": "B", "requirement": "free"}
            ],
            "regions": [{"name": "Root"}]
        }"#;
        assert!(GameData::from_json_str(world).is_err());
    }

    #[test]
    fn reject_entrance_without_exit() {
        let world = r#"{
            "items": [],
            "regions": [{"name": "Root"}, {"name": "Field"}],
            "entrances": [{"index": 0, "from": "Root", "to": "Field", "type": "Spawn"}]
        }"#;
        assert!(GameData::from_json_str(world).is_err());
    }

    #[test]
    fn make_and_or_simplify() {
        assert_eq!(
            Requirement::make_and(vec![Requirement::Free, Requirement::Child]),
            Requirement::Child
        );
        assert_eq!(
            Requirement::make_and(vec![Requirement::Never, Requirement::Child]),
            Requirement::Never
        );
        assert_eq!(
            Requirement::make_or(vec![Requirement::Never, Requirement::Never]),
            Requirement::Never
        );
        assert_eq!(
            Requirement::make_or(vec![Requirement::Day, Requirement::Free]),
            Requirement::Free
        );
    }

    #[test]
    fn spoiler_group_from_primitive() {
        assert_eq!(
            SpoilerEntranceGroup::try_from(15u8).unwrap(),
            SpoilerEntranceGroup::HyruleCastle
        );
        assert!(SpoilerEntranceGroup::try_from(SPOILER_ENTRANCE_GROUP_COUNT as u8).is_err());
    }
}
