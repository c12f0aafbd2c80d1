use anyhow::{bail, Result};
use entrando_game::{EntranceType, GameData, RegionKey};
use entrando_logic::LogicContext;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{seq::SliceRandom, RngCore, SeedableRng};

use crate::overrides::{create_entrance_overrides, EntranceOverride};
use crate::search::{validate_world, RequiredRegions, Validation};
use crate::settings::ShuffleSettings;
use crate::spoiler_log::get_playthrough_entrances;
use crate::world::{EntranceId, World};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShuffleOutcome {
    Success,
    Failure,
}

/// Entrances shuffled among each other. A pool holds a single entrance type unless
/// several types are mixed together by the settings.
#[derive(Clone, Debug)]
pub struct EntrancePool {
    pub types: Vec<EntranceType>,
    pub entrances: Vec<EntranceId>,
}

pub struct ShuffleResult<'a> {
    pub world: World<'a>,
    pub seed: usize,
    pub attempt_num: usize,
    pub no_random_entrances: bool,
    pub overrides: Vec<EntranceOverride>,
    pub playthrough_entrances: Vec<Vec<EntranceId>>,
}

pub fn rng_from_seed(seed: usize) -> StdRng {
    let mut rng_seed = [0u8; 32];
    rng_seed[..8].copy_from_slice(&(seed as u64).to_le_bytes());
    StdRng::from_seed(rng_seed)
}

fn is_coupled(world: &World, id: EntranceId) -> bool {
    let entrance = world.entrance(id);
    entrance.reverse().is_some() && !entrance.decoupled
}

// Special interiors and Ganon's dungeon join the pool of their base type.
fn pool_kind(entrance_type: EntranceType) -> EntranceType {
    match entrance_type {
        EntranceType::SpecialInterior => EntranceType::Interior,
        EntranceType::GanonDungeon => EntranceType::Dungeon,
        t => t,
    }
}

pub fn build_pools(world: &World, settings: &ShuffleSettings) -> Vec<EntrancePool> {
    let enabled_types = settings.enabled_types();
    let is_mixed = |t: EntranceType| {
        settings.mixed_pools.contains(&t) || settings.mixed_pools.contains(&pool_kind(t))
    };
    let mut pools: Vec<EntrancePool> = vec![];
    let mixed_types: Vec<EntranceType> = enabled_types
        .iter()
        .copied()
        .filter(|&t| is_mixed(t))
        .collect();
    let num_mixed_pools = if mixed_types.is_empty() { 0 } else { 1 };
    if !mixed_types.is_empty() {
        pools.push(EntrancePool {
            types: mixed_types,
            entrances: vec![],
        });
    }
    for t in enabled_types {
        if is_mixed(t) {
            continue;
        }
        match pools[num_mixed_pools..]
            .iter_mut()
            .find(|p| pool_kind(p.types[0]) == pool_kind(t))
        {
            Some(pool) => pool.types.push(t),
            None => pools.push(EntrancePool {
                types: vec![t],
                entrances: vec![],
            }),
        }
    }

    let mut table_entrances: Vec<EntranceId> = world.entrance_by_index.values().copied().collect();
    table_entrances.sort_by_key(|&id| world.entrance(id).index());
    for id in table_entrances {
        let entrance = world.entrance(id);
        // Coupled pairs are handled through their primary side only.
        if !settings.decouple_entrances && entrance.reverse().is_some() && !entrance.primary {
            continue;
        }
        if let Some(pool) = pools
            .iter_mut()
            .find(|p| p.types.contains(&entrance.entrance_type))
        {
            pool.entrances.push(id);
        }
    }
    pools.retain(|p| !p.entrances.is_empty());
    pools
}

/// Disconnects every entrance of the pool, leaving a placeholder from Root in its place.
/// Returns the placeholders, which are the targets the pool's entrances get connected to.
fn assume_entrance_pool(world: &mut World, pool: &EntrancePool) -> Vec<EntranceId> {
    let mut targets = vec![];
    for &id in &pool.entrances {
        let assumed_forward = world.assume_reachable(id);
        world.set_added_to_pool(id, true);
        if is_coupled(world, id) {
            let Some(reverse) = world.entrance(id).reverse() else {
                unreachable!();
            };
            let assumed_return = world.assume_reachable(reverse);
            world.set_added_to_pool(reverse, true);
            world.bind_two_way(assumed_forward, assumed_return);
        }
        targets.push(assumed_forward);
    }
    targets
}

fn check_entrances_compatibility(world: &World, entrance: EntranceId, target: EntranceId) -> bool {
    let e = world.entrance(entrance);
    let t = world.entrance(target);
    // A disconnected target has already been used.
    let Some(destination) = t.connected_region() else {
        return false;
    };
    if destination == e.parent_region() {
        return false;
    }
    let Some(replaced) = t.replacement() else {
        panic!("Target {} has no replacement", t.name());
    };
    if is_coupled(world, entrance) != is_coupled(world, replaced) {
        return false;
    }
    if is_coupled(world, entrance) && e.reverse() == Some(replaced) {
        return false;
    }
    // A region may have at most one exit into any other region.
    if has_real_exit(world, e.parent_region(), destination) {
        return false;
    }
    if is_coupled(world, entrance) && has_real_exit(world, destination, e.parent_region()) {
        return false;
    }
    true
}

// Placeholders on Root don't count: they are deleted once their pool is confirmed.
fn has_real_exit(world: &World, from: RegionKey, to: RegionKey) -> bool {
    world.region(from).exits.iter().any(|&id| {
        let exit = world.entrance(id);
        exit.connected_region() == Some(to) && !exit.is_placeholder()
    })
}

fn change_connections(world: &mut World, entrance: EntranceId, target: EntranceId) {
    let Some(destination) = world.disconnect(target) else {
        panic!("Target {} is already used", world.entrance(target).name());
    };
    world.connect(entrance, destination);
    let replaced = world.entrance(target).replacement();
    world.set_replacement(entrance, replaced);
    world.set_added_to_pool(entrance, false);
    if is_coupled(world, entrance) {
        let (Some(replaced), Some(entrance_reverse)) = (replaced, world.entrance(entrance).reverse())
        else {
            unreachable!();
        };
        let Some(replaced_reverse) = world.entrance(replaced).reverse() else {
            panic!("{} has no reverse", world.entrance(replaced).name());
        };
        let Some(reverse_assumed) = world.entrance(entrance_reverse).assumed() else {
            panic!("{} was never assumed", world.entrance(entrance_reverse).name());
        };
        let Some(reverse_destination) = world.disconnect(reverse_assumed) else {
            panic!("Reverse target {} is already used", world.entrance(reverse_assumed).name());
        };
        world.connect(replaced_reverse, reverse_destination);
        world.set_replacement(replaced_reverse, Some(entrance_reverse));
        world.set_added_to_pool(replaced_reverse, false);
    }
}

fn confirm_replacement(world: &mut World, entrance: EntranceId, target: EntranceId) {
    world.delete_target(target);
    world.entrance_mut(entrance).shuffled = true;
    debug!(
        "Confirmed {} (replaces {})",
        world.entrance(entrance).name(),
        world.entrance(target).name()
    );
    if is_coupled(world, entrance) {
        let replaced = world.entrance(target).replacement();
        if let Some(replaced_reverse) = replaced.and_then(|r| world.entrance(r).reverse()) {
            world.entrance_mut(replaced_reverse).shuffled = true;
        }
        let reverse_assumed = world
            .entrance(entrance)
            .reverse()
            .and_then(|r| world.entrance(r).assumed());
        if let Some(reverse_assumed) = reverse_assumed {
            world.delete_target(reverse_assumed);
        }
    }
}

/// One pass over the pool: each entrance, in random order, takes the first random target
/// that keeps the world valid. Returns the placements, or `None` if some entrance has no
/// valid target left (the caller undoes the partial placement).
fn shuffle_entrances(
    world: &mut World,
    ctx: &LogicContext,
    settings: &ShuffleSettings,
    required: &RequiredRegions,
    entrances: &[EntranceId],
    targets: &[EntranceId],
    rng: &mut StdRng,
    attempt_num: usize,
) -> Option<Vec<(EntranceId, EntranceId)>> {
    let mut entrances = entrances.to_vec();
    entrances.shuffle(rng);
    let mut targets = targets.to_vec();
    targets.shuffle(rng);

    let mut placements: Vec<(EntranceId, EntranceId)> = vec![];
    for &entrance in &entrances {
        let mut placed = false;
        for &target in &targets {
            if !check_entrances_compatibility(world, entrance, target) {
                continue;
            }
            let mark = world.journal.mark();
            change_connections(world, entrance, target);
            match validate_world(world, ctx, &settings.starting_age_times, required) {
                Validation::Ok => {
                    placements.push((entrance, target));
                    placed = true;
                    break;
                }
                Validation::Unreached(regions) => {
                    debug!(
                        "[attempt {attempt_num}] Rejected {}: {} required regions unreachable",
                        world.entrance(entrance).name(),
                        regions.len()
                    );
                    world.undo_to(mark);
                }
            }
        }
        if !placed {
            debug!(
                "[attempt {attempt_num}] No valid target for {}",
                world.entrance(entrance).name()
            );
            return None;
        }
    }
    Some(placements)
}

fn shuffle_entrance_pool(
    world: &mut World,
    ctx: &LogicContext,
    settings: &ShuffleSettings,
    required: &RequiredRegions,
    pool: &EntrancePool,
    targets: &[EntranceId],
    rng: &mut StdRng,
    attempt_num: usize,
) -> bool {
    for pool_attempt in 1..=settings.max_pool_attempts {
        let mark = world.journal.mark();
        match shuffle_entrances(
            world,
            ctx,
            settings,
            required,
            &pool.entrances,
            targets,
            rng,
            attempt_num,
        ) {
            Some(placements) => {
                for (entrance, target) in placements {
                    confirm_replacement(world, entrance, target);
                }
                info!(
                    "[attempt {attempt_num}] Shuffled pool {:?} ({} entrances) on pool attempt {pool_attempt}",
                    pool.types,
                    pool.entrances.len()
                );
                return true;
            }
            None => {
                world.undo_to(mark);
                debug!(
                    "[attempt {attempt_num}] Pool {:?} attempt {pool_attempt}/{} failed",
                    pool.types, settings.max_pool_attempts
                );
            }
        }
    }
    false
}

/// Shuffles every enabled pool of the world in place. On `Failure` the world is left in
/// an unspecified partially shuffled state and should be discarded.
pub fn shuffle_all_entrances(
    world: &mut World,
    ctx: &LogicContext,
    settings: &ShuffleSettings,
    base_required: &RequiredRegions,
    rng: &mut StdRng,
    attempt_num: usize,
) -> ShuffleOutcome {
    let pools = build_pools(world, settings);
    if pools.is_empty() {
        info!("[attempt {attempt_num}] No entrance pools enabled");
    }

    // Destinations of shuffled entrances must stay reachable once they are moved:
    let mut required = base_required.clone();
    for pool in &pools {
        for &id in &pool.entrances {
            if settings.decouple_entrances {
                world.entrance_mut(id).decoupled = true;
            }
            let entrance = world.entrance(id);
            if let Some(destination) = entrance.connected_region() {
                required.add(destination);
            }
            if is_coupled(world, id) {
                required.add(entrance.parent_region());
            }
        }
    }

    let pool_targets: Vec<Vec<EntranceId>> = pools
        .iter()
        .map(|pool| assume_entrance_pool(world, pool))
        .collect();

    for (pool, targets) in pools.iter().zip(pool_targets.iter()) {
        if !shuffle_entrance_pool(
            world,
            ctx,
            settings,
            &required,
            pool,
            targets,
            rng,
            attempt_num,
        ) {
            info!(
                "[attempt {attempt_num}] Exhausted {} attempts for pool {:?}",
                settings.max_pool_attempts, pool.types
            );
            return ShuffleOutcome::Failure;
        }
    }

    // Every placeholder is gone now, so this checks the final graph on its own.
    match validate_world(world, ctx, &settings.starting_age_times, &required) {
        Validation::Ok => ShuffleOutcome::Success,
        Validation::Unreached(regions) => {
            let names: Vec<&str> = regions
                .iter()
                .map(|&r| world.region(r).name.as_str())
                .collect();
            info!("[attempt {attempt_num}] Final validation failed, unreachable: {names:?}");
            ShuffleOutcome::Failure
        }
    }
}

// Includes preprocessing shared by all attempts:
pub struct EntranceShuffler<'a> {
    pub game_data: &'a GameData,
    pub settings: &'a ShuffleSettings,
    pub base_world: World<'a>,
    pub ctx: LogicContext<'a>,
    pub required: RequiredRegions,
}

impl<'a> EntranceShuffler<'a> {
    pub fn new(game_data: &'a GameData, settings: &'a ShuffleSettings) -> Result<Self> {
        let base_world = World::new(game_data);
        let ctx = LogicContext::new(
            game_data,
            settings.logic_mode,
            settings.get_validation_state(game_data)?,
        );
        let extra_regions = settings.get_extra_required_regions(game_data)?;
        let required = RequiredRegions::compute(
            &base_world,
            settings.all_locations_reachable,
            &extra_regions,
        );
        Ok(EntranceShuffler {
            game_data,
            settings,
            base_world,
            ctx,
            required,
        })
    }

    /// A single attempt on a fresh copy of the world.
    pub fn shuffle(&self, attempt_num: usize, seed: usize) -> Result<ShuffleResult<'a>> {
        let mut rng = rng_from_seed(seed);
        let mut world = self.base_world.clone();
        match shuffle_all_entrances(
            &mut world,
            &self.ctx,
            self.settings,
            &self.required,
            &mut rng,
            attempt_num,
        ) {
            ShuffleOutcome::Success => {}
            ShuffleOutcome::Failure => bail!("[attempt {attempt_num}] Entrance shuffle failed"),
        }
        let overrides = create_entrance_overrides(&world);
        let playthrough_entrances =
            get_playthrough_entrances(&world, &self.ctx, &self.settings.starting_age_times);
        let no_random_entrances = !world.entrances.iter().any(|e| e.shuffled);
        Ok(ShuffleResult {
            world,
            seed,
            attempt_num,
            no_random_entrances,
            overrides,
            playthrough_entrances,
        })
    }
}

/// Retries whole shuffles with fresh randomness derived from `root_seed` until one
/// succeeds or `max_shuffle_attempts` is exhausted.
pub fn generate<'a>(
    game_data: &'a GameData,
    settings: &'a ShuffleSettings,
    root_seed: usize,
) -> Result<ShuffleResult<'a>> {
    let shuffler = EntranceShuffler::new(game_data, settings)?;
    let mut rng = rng_from_seed(root_seed);
    let max_attempts = settings.max_shuffle_attempts;
    for attempt_num in 1..=max_attempts {
        let seed = (rng.next_u64() & 0xFFFFFFFF) as usize;
        info!("Attempt {attempt_num}/{max_attempts}: entrance shuffle seed={seed}");
        match shuffler.shuffle(attempt_num, seed) {
            Ok(result) => return Ok(result),
            Err(e) => info!("Attempt {attempt_num}/{max_attempts}: {e}"),
        }
    }
    bail!("Exhausted entrance shuffle attempts ({max_attempts}); the settings may be unsatisfiable");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::InteriorShuffle;

    fn coupled_game_data() -> GameData {
        GameData::from_json_str(
            r#"{
                "items": [],
                "regions": [
                    {"name": "Root", "exits": [{"to": "Field", "requirement": "free"}]},
                    {"name": "Field", "exits": [
                        {"to": "Shop", "requirement": "free"},
                        {"to": "House", "requirement": "free"},
                        {"to": "Tower", "requirement": "free"}
                    ]},
                    {"name": "Shop", "locations": ["Shop Item"], "exits": [{"to": "Field", "requirement": "free"}]},
                    {"name": "House", "locations": ["House Chest"], "exits": [{"to": "Field", "requirement": "free"}]},
                    {"name": "Tower", "locations": ["Tower Chest"], "exits": [{"to": "Field", "requirement": "free"}]}
                ],
                "entrances": [
                    {"index": 0, "from": "Field", "to": "Shop", "type": "Interior", "reverse": 1},
                    {"index": 1, "from": "Shop", "to": "Field", "type": "Interior"},
                    {"index": 2, "from": "Field", "to": "House", "type": "Interior", "reverse": 3},
                    {"index": 3, "from": "House", "to": "Field", "type": "Interior"},
                    {"index": 4, "from": "Field", "to": "Tower", "type": "Interior", "reverse": 5},
                    {"index": 5, "from": "Tower", "to": "Field", "type": "Interior"}
                ]
            }"#,
        )
        .unwrap()
    }

    fn interior_settings() -> ShuffleSettings {
        ShuffleSettings {
            shuffle_interior_entrances: InteriorShuffle::Simple,
            ..ShuffleSettings::default()
        }
    }

    #[test]
    fn pools_use_primary_entrances() {
        let game_data = coupled_game_data();
        let world = World::new(&game_data);
        let pools = build_pools(&world, &interior_settings());
        assert_eq!(pools.len(), 1);
        let indices: Vec<i16> = pools[0]
            .entrances
            .iter()
            .map(|&id| world.entrance(id).index())
            .collect();
        assert_eq!(indices, vec![0, 2, 4]);

        let decoupled = ShuffleSettings {
            decouple_entrances: true,
            ..interior_settings()
        };
        assert_eq!(build_pools(&world, &decoupled)[0].entrances.len(), 6);
    }

    #[test]
    fn coupled_shuffle_keeps_pairs_consistent() -> Result<()> {
        let game_data = coupled_game_data();
        let settings = interior_settings();
        let shuffler = EntranceShuffler::new(&game_data, &settings)?;
        let result = shuffler.shuffle(1, 7)?;
        let world = &result.world;
        let field: RegionKey = game_data.get_region_key("Field")?;
        let mut destinations = vec![];
        for index in [0, 2, 4] {
            let id = world.get_entrance_by_index(index).unwrap();
            let entrance = world.entrance(id);
            assert!(entrance.shuffled);
            assert!(!entrance.added_to_pool);
            let destination = entrance.connected_region().unwrap();
            destinations.push(destination);
            // Leaving the new destination leads back to Field through the interior's exit:
            let exit = world.get_exit(destination, field).unwrap();
            assert!(world.entrance(exit).shuffled);
            assert_eq!(world.entrance(exit).replacement(), entrance.reverse());
        }
        destinations.sort();
        assert_eq!(
            destinations,
            vec![
                game_data.get_region_key("Shop")?,
                game_data.get_region_key("House")?,
                game_data.get_region_key("Tower")?
            ]
        );
        // No placeholders remain attached to Root:
        assert!(world
            .region(entrando_game::ROOT_REGION)
            .exits
            .iter()
            .all(|&id| !world.entrance(id).is_placeholder()));
        Ok(())
    }

    #[test]
    fn compatibility_rejects_used_and_self_targets() {
        let game_data = coupled_game_data();
        let mut world = World::new(&game_data);
        let settings = interior_settings();
        let pool = build_pools(&world, &settings).remove(0);
        let targets = assume_entrance_pool(&mut world, &pool);
        let shop = pool.entrances[0];
        let house = pool.entrances[1];
        assert!(check_entrances_compatibility(&world, shop, targets[1]));
        change_connections(&mut world, house, targets[1]);
        assert!(!check_entrances_compatibility(&world, shop, targets[1]));
        assert!(world.entrance(house).replacement() == Some(house));
    }
}
