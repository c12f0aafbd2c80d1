use entrando_game::{EntranceIndex, EntranceType, SpoilerEntranceGroup, TrackerEntranceType};
use entrando_logic::{AgeTime, LogicContext, LogicMode};
use serde::{Deserialize, Serialize};

use crate::search::reachable;
use crate::settings::ShuffleSettings;
use crate::shuffle::ShuffleResult;
use crate::world::{EntranceId, World};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SpoilerEntrance {
    pub index: EntranceIndex,
    pub name: String,
    #[serde(rename = "type")]
    pub entrance_type: EntranceType,
    pub group: SpoilerEntranceGroup,
    pub tracker_type: TrackerEntranceType,
    // Exit out of a region with a single way out; trackers usually list only the way in.
    pub one_exit: bool,
    pub from: String,
    pub vanilla_to: String,
    pub to: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SpoilerLog {
    pub settings_name: Option<String>,
    pub seed: usize,
    pub attempt_num: usize,
    pub logic_mode: LogicMode,
    pub no_random_entrances: bool,
    pub entrances: Vec<SpoilerEntrance>,
    // Names of shuffled entrances, grouped by the sphere in which they first extend access.
    pub playthrough: Vec<Vec<String>>,
}

/// Shuffled entrances grouped by search sphere. Entrances that never extend access
/// (their destination was already reached another way) are left out.
pub fn get_playthrough_entrances(
    world: &World,
    ctx: &LogicContext,
    starting_age_times: &[AgeTime],
) -> Vec<Vec<EntranceId>> {
    let result = reachable(world, ctx, starting_age_times);
    let mut spheres: Vec<Vec<EntranceId>> = vec![vec![]; result.num_spheres];
    for (&id, &sphere) in &result.entrance_sphere {
        if world.entrance(id).shuffled {
            spheres[sphere].push(id);
        }
    }
    for sphere in spheres.iter_mut() {
        sphere.sort_by_key(|&id| (world.entrance(id).index(), id));
    }
    spheres.retain(|s| !s.is_empty());
    spheres
}

pub fn get_spoiler_log(result: &ShuffleResult, settings: &ShuffleSettings) -> SpoilerLog {
    let world = &result.world;
    let game_data = world.game_data;
    let mut entrances: Vec<SpoilerEntrance> = vec![];
    for entrance_data in &game_data.entrance_table {
        let Some(id) = world.get_entrance_by_index(entrance_data.index) else {
            continue;
        };
        let entrance = world.entrance(id);
        if !entrance.shuffled {
            continue;
        }
        let to = match entrance.connected_region() {
            Some(r) => world.region(r).name.clone(),
            None => entrando_game::NONE_REGION_NAME.to_string(),
        };
        entrances.push(SpoilerEntrance {
            index: entrance_data.index,
            name: entrance_data.name.clone(),
            entrance_type: entrance_data.entrance_type,
            group: entrance_data.group,
            tracker_type: entrance_data.tracker_type,
            one_exit: entrance_data.one_exit,
            from: world.region(entrance_data.from).name.clone(),
            vanilla_to: world.region(entrance_data.to).name.clone(),
            to,
        });
    }
    entrances.sort_by_key(|e| e.index);

    let playthrough = result
        .playthrough_entrances
        .iter()
        .map(|sphere| {
            sphere
                .iter()
                .map(|&id| world.entrance(id).name().to_string())
                .collect()
        })
        .collect();

    SpoilerLog {
        settings_name: settings.name.clone(),
        seed: result.seed,
        attempt_num: result.attempt_num,
        logic_mode: settings.logic_mode,
        no_random_entrances: result.no_random_entrances,
        entrances,
        playthrough,
    }
}
