use entrando_game::{
    ConditionSlots, EntranceIndex, EntranceType, GameData, RegionKey, NONE_REGION_NAME,
    NO_ENTRANCE_INDEX, ROOT_REGION,
};
use entrando_logic::{AgeTime, AgeTimeAccess, LogicContext};
use hashbrown::HashMap;
use log::debug;

pub type EntranceId = usize; // Index into World.entrances

#[derive(Clone, Debug)]
pub struct Entrance {
    pub id: EntranceId,
    parent_region: RegionKey,
    connected_region: Option<RegionKey>,
    conditions: ConditionSlots,
    pub entrance_type: EntranceType,
    // Reserved: not used by the shuffle algorithm.
    pub target: Option<EntranceId>,
    reverse: Option<EntranceId>,
    assumed: Option<EntranceId>,
    replacement: Option<EntranceId>,
    index: EntranceIndex,
    pub blue_warp: EntranceIndex,
    pub shuffled: bool,
    pub primary: bool,
    pub added_to_pool: bool,
    pub decoupled: bool,
    name: String,
    name_overridden: bool,
}

impl Entrance {
    pub fn parent_region(&self) -> RegionKey {
        self.parent_region
    }

    pub fn connected_region(&self) -> Option<RegionKey> {
        self.connected_region
    }

    pub fn conditions(&self) -> &ConditionSlots {
        &self.conditions
    }

    pub fn reverse(&self) -> Option<EntranceId> {
        self.reverse
    }

    pub fn assumed(&self) -> Option<EntranceId> {
        self.assumed
    }

    pub fn replacement(&self) -> Option<EntranceId> {
        self.replacement
    }

    pub fn index(&self) -> EntranceIndex {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_placeholder(&self) -> bool {
        self.parent_region == ROOT_REGION
            && self.index == NO_ENTRANCE_INDEX
            && self.replacement.is_some()
    }

    /// Traversability under the context's current age/time, according to its logic mode.
    pub fn conditions_met(&self, ctx: &LogicContext) -> bool {
        ctx.conditions_met(&self.conditions)
    }

    /// Set the logic to a specific age and time of day and see if the condition still holds.
    pub fn check_condition_at_age_time(
        &self,
        ctx: &mut LogicContext,
        age_time: AgeTime,
        pass_anyway: bool,
    ) -> bool {
        ctx.set_age_time(age_time);
        self.conditions_met(ctx) && (self.connected_region.is_some() || pass_anyway)
    }

    /// Checks the condition at every age/time the parent region can be in. With
    /// `all_age_times`, the parent must have full access and every combination must pass;
    /// otherwise a single passing combination is enough.
    pub fn conditions_met_all(
        &self,
        ctx: &mut LogicContext,
        parent_access: &AgeTimeAccess,
        all_age_times: bool,
    ) -> bool {
        if all_age_times && !parent_access.all_access() {
            return false;
        }
        let saved_sim = ctx.sim;
        let mut conditions_met = 0;
        for age_time in AgeTime::ALL {
            if parent_access.get(age_time)
                && self.check_condition_at_age_time(ctx, age_time, all_age_times)
            {
                conditions_met += 1;
            }
        }
        ctx.sim = saved_sim;
        ctx.update_helpers();
        conditions_met > 0 && (!all_age_times || conditions_met == 4)
    }
}

#[derive(Clone, Debug)]
pub struct Region {
    pub key: RegionKey,
    pub name: String,
    pub exits: Vec<EntranceId>,
    // Incoming connections, most recently connected first.
    pub entrances: Vec<EntranceId>,
}

/// Reversible mutation of the entrance graph. Every mutation the shuffle performs goes
/// through one of these, so that undoing a placement replays exact inverses.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GraphCommand {
    Connect {
        entrance: EntranceId,
        region: RegionKey,
        position: usize,
    },
    Disconnect {
        entrance: EntranceId,
        region: RegionKey,
        position: usize,
    },
    SetReplacement {
        entrance: EntranceId,
        old: Option<EntranceId>,
        new: Option<EntranceId>,
    },
    SetAddedToPool {
        entrance: EntranceId,
        old: bool,
        new: bool,
    },
    AddExit {
        entrance: EntranceId,
        region: RegionKey,
        position: usize,
    },
    RemoveExit {
        entrance: EntranceId,
        region: RegionKey,
        position: usize,
    },
}

impl GraphCommand {
    pub fn inverse(self) -> GraphCommand {
        match self {
            GraphCommand::Connect {
                entrance,
                region,
                position,
            } => GraphCommand::Disconnect {
                entrance,
                region,
                position,
            },
            GraphCommand::Disconnect {
                entrance,
                region,
                position,
            } => GraphCommand::Connect {
                entrance,
                region,
                position,
            },
            GraphCommand::SetReplacement { entrance, old, new } => GraphCommand::SetReplacement {
                entrance,
                old: new,
                new: old,
            },
            GraphCommand::SetAddedToPool { entrance, old, new } => GraphCommand::SetAddedToPool {
                entrance,
                old: new,
                new: old,
            },
            GraphCommand::AddExit {
                entrance,
                region,
                position,
            } => GraphCommand::RemoveExit {
                entrance,
                region,
                position,
            },
            GraphCommand::RemoveExit {
                entrance,
                region,
                position,
            } => GraphCommand::AddExit {
                entrance,
                region,
                position,
            },
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CommandLog {
    commands: Vec<GraphCommand>,
}

impl CommandLog {
    pub fn mark(&self) -> usize {
        self.commands.len()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Session-scoped arena of regions and entrances built from the static world data.
#[derive(Clone)]
pub struct World<'a> {
    pub game_data: &'a GameData,
    pub regions: Vec<Region>,     // Corresponds to GameData.regions
    pub entrances: Vec<Entrance>, // Real exits first, then placeholders created while shuffling
    pub entrance_by_index: HashMap<EntranceIndex, EntranceId>,
    pub journal: CommandLog,
}

impl<'a> World<'a> {
    pub fn new(game_data: &'a GameData) -> World<'a> {
        let mut world = World {
            game_data,
            regions: game_data
                .regions
                .iter()
                .map(|r| Region {
                    key: r.key,
                    name: r.name.clone(),
                    exits: vec![],
                    entrances: vec![],
                })
                .collect(),
            entrances: vec![],
            entrance_by_index: HashMap::new(),
            journal: CommandLog::default(),
        };
        for region_data in &game_data.regions {
            for exit in &region_data.exits {
                world.add_exit(region_data.key, exit.to, exit.conditions.clone());
            }
        }
        for entrance_data in &game_data.entrance_table {
            // The loader guarantees that the exit exists.
            let Some(id) = world.get_exit(entrance_data.from, entrance_data.to) else {
                panic!("Missing exit for entrance {}", entrance_data.name);
            };
            let entrance = &mut world.entrances[id];
            entrance.index = entrance_data.index;
            entrance.entrance_type = entrance_data.entrance_type;
            entrance.blue_warp = entrance_data.blue_warp;
            world.entrance_by_index.insert(entrance_data.index, id);
        }
        for entrance_data in &game_data.entrance_table {
            if let Some(reverse_index) = entrance_data.reverse {
                let id = world.entrance_by_index[&entrance_data.index];
                let reverse_id = world.entrance_by_index[&reverse_index];
                world.entrances[id].primary = true;
                world.bind_two_way(id, reverse_id);
            }
        }
        world.journal = CommandLog::default();
        world
    }

    pub fn entrance(&self, id: EntranceId) -> &Entrance {
        &self.entrances[id]
    }

    pub fn entrance_mut(&mut self, id: EntranceId) -> &mut Entrance {
        &mut self.entrances[id]
    }

    pub fn region(&self, key: RegionKey) -> &Region {
        &self.regions[key]
    }

    pub fn get_entrance_by_index(&self, index: EntranceIndex) -> Option<EntranceId> {
        self.entrance_by_index.get(&index).copied()
    }

    fn region_name(&self, key: Option<RegionKey>) -> &str {
        match key {
            Some(k) => &self.regions[k].name,
            None => NONE_REGION_NAME,
        }
    }

    /// Adds an exit from `parent` to `to`, unless one already exists.
    pub fn add_exit(
        &mut self,
        parent: RegionKey,
        to: RegionKey,
        conditions: ConditionSlots,
    ) -> EntranceId {
        if let Some(id) = self.get_exit(parent, to) {
            return id;
        }
        self.create_exit(parent, to, conditions)
    }

    fn create_exit(
        &mut self,
        parent: RegionKey,
        to: RegionKey,
        conditions: ConditionSlots,
    ) -> EntranceId {
        let id = self.entrances.len();
        self.entrances.push(Entrance {
            id,
            parent_region: parent,
            connected_region: None,
            conditions,
            entrance_type: EntranceType::None,
            target: None,
            reverse: None,
            assumed: None,
            replacement: None,
            index: NO_ENTRANCE_INDEX,
            blue_warp: 0,
            shuffled: false,
            primary: false,
            added_to_pool: false,
            decoupled: false,
            name: String::new(),
            name_overridden: false,
        });
        self.regions[parent].exits.push(id);
        self.connect(id, to);
        id
    }

    pub fn get_exit(&self, parent: RegionKey, to: RegionKey) -> Option<EntranceId> {
        self.regions[parent]
            .exits
            .iter()
            .copied()
            .find(|&id| self.entrances[id].connected_region == Some(to))
    }

    /// Overrides the display name, or restores the derived "<parent> -> <connected>" name
    /// when `name` is `None`.
    pub fn set_name(&mut self, id: EntranceId, name: Option<String>) {
        match name {
            Some(n) => {
                let entrance = &mut self.entrances[id];
                entrance.name = n;
                entrance.name_overridden = true;
            }
            None => {
                self.entrances[id].name_overridden = false;
                self.refresh_name(id);
            }
        }
    }

    fn refresh_name(&mut self, id: EntranceId) {
        if self.entrances[id].name_overridden {
            return;
        }
        let entrance = &self.entrances[id];
        let name = format!(
            "{} -> {}",
            self.region_name(Some(entrance.parent_region)),
            self.region_name(entrance.connected_region)
        );
        self.entrances[id].name = name;
    }

    /// Connects the entrance to `region`, registering it at the front of the region's
    /// incoming list.
    pub fn connect(&mut self, id: EntranceId, region: RegionKey) {
        self.execute(GraphCommand::Connect {
            entrance: id,
            region,
            position: 0,
        });
    }

    /// Removes the entrance from its destination's incoming list and returns the previous
    /// destination. Returns `None` without effect if it is not connected.
    pub fn disconnect(&mut self, id: EntranceId) -> Option<RegionKey> {
        let region = self.entrances[id].connected_region?;
        let Some(position) = self.regions[region].entrances.iter().position(|&e| e == id) else {
            panic!(
                "Disconnecting {} which is not registered in {}",
                self.entrances[id].name, self.regions[region].name
            );
        };
        self.execute(GraphCommand::Disconnect {
            entrance: id,
            region,
            position,
        });
        Some(region)
    }

    pub fn set_replacement(&mut self, id: EntranceId, replacement: Option<EntranceId>) {
        let old = self.entrances[id].replacement;
        self.execute(GraphCommand::SetReplacement {
            entrance: id,
            old,
            new: replacement,
        });
    }

    pub fn set_added_to_pool(&mut self, id: EntranceId, added_to_pool: bool) {
        let old = self.entrances[id].added_to_pool;
        self.execute(GraphCommand::SetAddedToPool {
            entrance: id,
            old,
            new: added_to_pool,
        });
    }

    pub fn execute(&mut self, cmd: GraphCommand) {
        self.apply(cmd);
        self.journal.commands.push(cmd);
    }

    fn apply(&mut self, cmd: GraphCommand) {
        match cmd {
            GraphCommand::Connect {
                entrance,
                region,
                position,
            } => {
                assert!(
                    region < self.regions.len(),
                    "Connecting {} to unknown region {region}",
                    self.entrances[entrance].name
                );
                assert!(
                    self.entrances[entrance].connected_region.is_none(),
                    "Connecting {} which is already connected",
                    self.entrances[entrance].name
                );
                assert!(
                    !self.regions[region].entrances.contains(&entrance),
                    "Entrance {} already registered in {}",
                    self.entrances[entrance].name,
                    self.regions[region].name
                );
                self.entrances[entrance].connected_region = Some(region);
                self.regions[region].entrances.insert(position, entrance);
                self.refresh_name(entrance);
            }
            GraphCommand::Disconnect {
                entrance,
                region,
                position,
            } => {
                assert_eq!(self.entrances[entrance].connected_region, Some(region));
                assert_eq!(
                    self.regions[region].entrances.get(position),
                    Some(&entrance),
                    "Disconnecting {} from the wrong position in {}",
                    self.entrances[entrance].name,
                    self.regions[region].name
                );
                self.regions[region].entrances.remove(position);
                self.entrances[entrance].connected_region = None;
                self.refresh_name(entrance);
            }
            GraphCommand::SetReplacement { entrance, new, .. } => {
                self.entrances[entrance].replacement = new;
            }
            GraphCommand::SetAddedToPool { entrance, new, .. } => {
                self.entrances[entrance].added_to_pool = new;
            }
            GraphCommand::AddExit {
                entrance,
                region,
                position,
            } => {
                assert!(
                    !self.regions[region].exits.contains(&entrance),
                    "Exit {} already listed in {}",
                    self.entrances[entrance].name,
                    self.regions[region].name
                );
                self.regions[region].exits.insert(position, entrance);
            }
            GraphCommand::RemoveExit {
                entrance,
                region,
                position,
            } => {
                assert_eq!(
                    self.regions[region].exits.get(position),
                    Some(&entrance),
                    "Removing exit {} from the wrong position in {}",
                    self.entrances[entrance].name,
                    self.regions[region].name
                );
                self.regions[region].exits.remove(position);
            }
        }
    }

    /// Undoes every command recorded after `mark`, most recent first.
    pub fn undo_to(&mut self, mark: usize) {
        while self.journal.commands.len() > mark {
            let cmd = self.journal.commands.pop().unwrap();
            self.apply(cmd.inverse());
        }
    }

    /// Establishes symmetric `reverse` links. Each entrance may only be bound once.
    pub fn bind_two_way(&mut self, a: EntranceId, b: EntranceId) {
        assert!(
            self.entrances[a].reverse.is_none() && self.entrances[b].reverse.is_none(),
            "Entrances {} and {} are already bound",
            self.entrances[a].name,
            self.entrances[b].name
        );
        self.entrances[a].reverse = Some(b);
        self.entrances[b].reverse = Some(a);
    }

    /// Adds a trivially-true placeholder exit from Root into the entrance's current
    /// destination, standing in for `id`.
    pub fn get_new_target(&mut self, id: EntranceId) -> EntranceId {
        let Some(destination) = self.entrances[id].connected_region else {
            panic!(
                "Creating a target for {} which is not connected",
                self.entrances[id].name
            );
        };
        // A fresh placeholder per entrance: a Root exit to the same region may already
        // exist (e.g. a spawn, or another pooled entrance's placeholder).
        let target = self.create_exit(ROOT_REGION, destination, ConditionSlots::free());
        self.entrances[target].replacement = Some(id);
        let name = self.entrances[id].name.clone();
        self.set_name(target, Some(name));
        target
    }

    /// Replaces the entrance by a placeholder from Root into its destination and
    /// disconnects it. Idempotent: the placeholder is created at most once.
    pub fn assume_reachable(&mut self, id: EntranceId) -> EntranceId {
        if let Some(assumed) = self.entrances[id].assumed {
            return assumed;
        }
        let assumed = self.get_new_target(id);
        self.entrances[id].assumed = Some(assumed);
        self.disconnect(id);
        assumed
    }

    /// Removes a placeholder from Root's exits after its replacement was confirmed.
    /// Both steps are journaled, so `undo_to` can bring the placeholder back.
    pub fn delete_target(&mut self, target: EntranceId) {
        self.disconnect(target);
        let parent = self.entrances[target].parent_region;
        if let Some(position) = self.regions[parent].exits.iter().position(|&e| e == target) {
            self.execute(GraphCommand::RemoveExit {
                entrance: target,
                region: parent,
                position,
            });
        }
    }

    pub fn print_age_time_access(&self, id: EntranceId, ctx: &mut LogicContext) {
        let entrance = &self.entrances[id];
        let saved_sim = ctx.sim;
        let mut results = [false; 4];
        for (i, age_time) in AgeTime::ALL.into_iter().enumerate() {
            results[i] = entrance.check_condition_at_age_time(ctx, age_time, false);
        }
        ctx.sim = saved_sim;
        ctx.update_helpers();
        debug!("Name: {}", entrance.name);
        debug!(
            "Child Day: {}\tChild Night: {}\tAdult Day: {}\tAdult Night: {}",
            results[0], results[1], results[2], results[3]
        );
    }
}
