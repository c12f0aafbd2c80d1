use std::collections::VecDeque;

use entrando_game::{RegionKey, ROOT_REGION};
use entrando_logic::{AgeTime, AgeTimeAccess, GlobalState, LogicContext};
use hashbrown::{HashMap, HashSet};
use log::debug;

use crate::world::{EntranceId, World};

pub struct SearchResult {
    pub access: Vec<AgeTimeAccess>,      // Corresponds to World.regions
    pub region_sphere: Vec<Option<usize>>, // Sphere in which each region was first reached
    // Sphere in which each entrance was first used to extend access.
    pub entrance_sphere: HashMap<EntranceId, usize>,
    pub global_state: GlobalState,
    pub num_spheres: usize,
}

impl SearchResult {
    pub fn is_reached(&self, region: RegionKey) -> bool {
        self.access[region].any()
    }

    pub fn reached_regions(&self) -> Vec<RegionKey> {
        (0..self.access.len())
            .filter(|&r| self.is_reached(r))
            .collect()
    }
}

/// Breadth-first reachability over regions, tracking each age/time combination
/// separately. Neither the world nor the caller's context is mutated; the search works
/// on its own copy of the context and all state lives in the result.
///
/// Each sphere propagates access as far as the current items and events allow; events
/// unlocked by the newly reached regions are then collected and the next sphere starts.
pub fn reachable(
    world: &World,
    ctx: &LogicContext,
    starting_age_times: &[AgeTime],
) -> SearchResult {
    let mut search_ctx = ctx.clone();
    let ctx = &mut search_ctx;
    let num_regions = world.regions.len();
    let mut access = vec![AgeTimeAccess::default(); num_regions];
    let mut region_sphere: Vec<Option<usize>> = vec![None; num_regions];
    let mut entrance_sphere: HashMap<EntranceId, usize> = HashMap::new();

    access[ROOT_REGION] = AgeTimeAccess::from_age_times(starting_age_times);
    region_sphere[ROOT_REGION] = Some(0);

    let mut sphere = 0;
    loop {
        let mut queue: VecDeque<RegionKey> = (0..num_regions)
            .filter(|&r| access[r].any())
            .collect();
        while let Some(region_key) = queue.pop_front() {
            if world.game_data.regions[region_key].time_passes
                && spread_time_of_day(&mut access[region_key])
            {
                queue.push_back(region_key);
                continue;
            }
            for &exit_id in &world.regions[region_key].exits {
                let entrance = world.entrance(exit_id);
                let Some(dst) = entrance.connected_region() else {
                    continue;
                };
                let mut extended = false;
                for age_time in AgeTime::ALL {
                    if !access[region_key].get(age_time) || access[dst].get(age_time) {
                        continue;
                    }
                    if entrance.check_condition_at_age_time(ctx, age_time, false) {
                        access[dst].set(age_time);
                        extended = true;
                    }
                }
                if extended {
                    if region_sphere[dst].is_none() {
                        region_sphere[dst] = Some(sphere);
                    }
                    entrance_sphere.entry(exit_id).or_insert(sphere);
                    queue.push_back(dst);
                }
            }
        }

        if !collect_events(world, ctx, &access) {
            break;
        }
        sphere += 1;
    }

    SearchResult {
        access,
        region_sphere,
        entrance_sphere,
        global_state: ctx.global.clone(),
        num_spheres: sphere + 1,
    }
}

// Time of day can change freely while standing in the region.
fn spread_time_of_day(access: &mut AgeTimeAccess) -> bool {
    let mut changed = false;
    for age_time in AgeTime::ALL {
        if access.get(age_time) && !access.get(age_time.other_time()) {
            access.set(age_time.other_time());
            changed = true;
        }
    }
    changed
}

fn collect_events(world: &World, ctx: &mut LogicContext, access: &[AgeTimeAccess]) -> bool {
    let mut new_events = vec![];
    for (region_key, region_access) in access.iter().enumerate() {
        if !region_access.any() {
            continue;
        }
        for (event_id, req) in &world.game_data.regions[region_key].events {
            if ctx.global.events[*event_id] || new_events.contains(event_id) {
                continue;
            }
            for age_time in AgeTime::ALL {
                if !region_access.get(age_time) {
                    continue;
                }
                ctx.set_age_time(age_time);
                if ctx.evaluate(req) {
                    debug!(
                        "Event {} collected in {}",
                        world.game_data.event_isv.keys[*event_id], world.regions[region_key].name
                    );
                    new_events.push(*event_id);
                    break;
                }
            }
        }
    }
    for &event_id in &new_events {
        ctx.global.events[event_id] = true;
    }
    !new_events.is_empty()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Validation {
    Ok,
    Unreached(Vec<RegionKey>),
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        *self == Validation::Ok
    }
}

/// Checks that every required region is reachable in the world as currently connected.
/// Placeholders standing in for entrances that are still being shuffled count as free
/// exits from Root, so their destinations are assumed reachable.
pub fn validate_world(
    world: &World,
    ctx: &LogicContext,
    starting_age_times: &[AgeTime],
    required: &RequiredRegions,
) -> Validation {
    let result = reachable(world, ctx, starting_age_times);
    let unreached: Vec<RegionKey> = required
        .regions
        .iter()
        .copied()
        .filter(|&r| !result.is_reached(r))
        .collect();
    if unreached.is_empty() {
        Validation::Ok
    } else {
        Validation::Unreached(unreached)
    }
}

/// The set of regions that must stay reachable for a shuffle to be accepted.
#[derive(Clone, Debug, Default)]
pub struct RequiredRegions {
    pub regions: Vec<RegionKey>,
}

impl RequiredRegions {
    pub fn compute(
        world: &World,
        all_locations_reachable: bool,
        extra_regions: &[RegionKey],
    ) -> RequiredRegions {
        let mut seen: HashSet<RegionKey> = HashSet::new();
        let mut regions = vec![];
        if all_locations_reachable {
            for region_data in &world.game_data.regions {
                if !region_data.locations.is_empty() && seen.insert(region_data.key) {
                    regions.push(region_data.key);
                }
            }
        }
        for &r in extra_regions {
            if seen.insert(r) {
                regions.push(r);
            }
        }
        RequiredRegions { regions }
    }

    pub fn add(&mut self, region: RegionKey) {
        if !self.regions.contains(&region) {
            self.regions.push(region);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entrando_game::GameData;
    use entrando_logic::LogicMode;

    fn game_data() -> GameData {
        GameData::from_json_str(
            r#"{
                "items": ["Lens"],
                "regions": [
                    {"name": "Root", "exits": [{"to": "Field", "requirement": "free"}]},
                    {"name": "Field", "timePasses": true,
                     "events": [{"name": "GateOpen", "requirement": "night"}],
                     "exits": [
                        {"to": "Market", "requirement": "day"},
                        {"to": "Graveyard", "requirement": {"and": ["night", "child"]}},
                        {"to": "Castle", "requirement": {"event": "GateOpen"}}
                     ]},
                    {"name": "Market", "locations": ["Market Pot"]},
                    {"name": "Graveyard", "exits": [{"to": "Tomb", "requirement": {"item": "Lens"}}]},
                    {"name": "Tomb", "locations": ["Tomb Chest"]},
                    {"name": "Castle", "locations": ["Castle Chest"]}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn time_passes_and_events() {
        let game_data = game_data();
        let world = World::new(&game_data);
        let ctx = LogicContext::new(
            &game_data,
            LogicMode::Glitchless,
            GlobalState::new(&game_data),
        );
        let result = reachable(&world, &ctx, &[AgeTime::ChildDay]);
        let market = game_data.get_region_key("Market").unwrap();
        let graveyard = game_data.get_region_key("Graveyard").unwrap();
        let tomb = game_data.get_region_key("Tomb").unwrap();
        let castle = game_data.get_region_key("Castle").unwrap();
        assert!(result.is_reached(market));
        assert!(result.access[graveyard].child_night);
        assert!(!result.access[graveyard].adult_night);
        assert!(!result.is_reached(tomb));
        assert!(result.is_reached(castle));
        assert_eq!(result.region_sphere[castle], Some(1));
        assert_eq!(result.num_spheres, 2);
        assert!(result.global_state.events[0]);
        // The caller's context is left untouched.
        assert!(!ctx.global.events[0]);
    }

    #[test]
    fn validate_reports_unreached() {
        let game_data = game_data();
        let world = World::new(&game_data);
        let ctx = LogicContext::new(
            &game_data,
            LogicMode::Glitchless,
            GlobalState::new(&game_data),
        );
        let required = RequiredRegions::compute(&world, true, &[]);
        assert_eq!(required.regions.len(), 3);
        let tomb = game_data.get_region_key("Tomb").unwrap();
        assert_eq!(
            validate_world(&world, &ctx, &[AgeTime::ChildDay], &required),
            Validation::Unreached(vec![tomb])
        );
        let ctx = LogicContext::new(
            &game_data,
            LogicMode::Glitchless,
            GlobalState::with_all_items(&game_data),
        );
        assert!(validate_world(&world, &ctx, &[AgeTime::ChildDay], &required).is_ok());
    }

    #[test]
    fn placeholder_assumes_destination_reachable() {
        let game_data = game_data();
        let mut world = World::new(&game_data);
        let ctx = LogicContext::new(
            &game_data,
            LogicMode::Glitchless,
            GlobalState::new(&game_data),
        );
        let field = game_data.get_region_key("Field").unwrap();
        let graveyard = game_data.get_region_key("Graveyard").unwrap();
        let tomb = game_data.get_region_key("Tomb").unwrap();
        let tomb_exit = world.get_exit(graveyard, tomb).unwrap();
        let required = RequiredRegions::compute(&world, false, &[tomb]);
        assert!(!validate_world(&world, &ctx, &[AgeTime::AdultDay], &required).is_ok());
        world.assume_reachable(tomb_exit);
        assert!(validate_world(&world, &ctx, &[AgeTime::AdultDay], &required).is_ok());
        let root_field = world.get_exit(ROOT_REGION, field).unwrap();
        world.disconnect(root_field);
        let required = RequiredRegions::compute(&world, false, &[field]);
        assert_eq!(
            validate_world(&world, &ctx, &[AgeTime::AdultDay], &required),
            Validation::Unreached(vec![field])
        );
    }

    #[test]
    fn vanilla_logic_reaches_everything() {
        let game_data = game_data();
        let world = World::new(&game_data);
        let ctx =
            LogicContext::new(&game_data, LogicMode::Vanilla, GlobalState::new(&game_data));
        let result = reachable(&world, &ctx, &[AgeTime::AdultDay]);
        assert_eq!(result.reached_regions().len(), game_data.regions.len());
    }
}
