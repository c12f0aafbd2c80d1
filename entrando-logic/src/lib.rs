pub mod helpers;

use entrando_game::{ConditionSlots, GameData, ItemId, Requirement};
use serde::{Deserialize, Serialize};
use strum_macros::{EnumString, VariantNames};

#[derive(
    Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default, EnumString, VariantNames,
)]
pub enum LogicMode {
    NoLogic,
    Vanilla,
    #[default]
    Glitchless,
    Glitched,
}

#[derive(
    Copy,
    Clone,
    Debug,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    EnumString,
    VariantNames,
)]
pub enum AgeTime {
    ChildDay,
    ChildNight,
    AdultDay,
    AdultNight,
}

impl AgeTime {
    pub const ALL: [AgeTime; 4] = [
        AgeTime::ChildDay,
        AgeTime::ChildNight,
        AgeTime::AdultDay,
        AgeTime::AdultNight,
    ];

    pub fn is_child(self) -> bool {
        matches!(self, AgeTime::ChildDay | AgeTime::ChildNight)
    }

    pub fn is_day(self) -> bool {
        matches!(self, AgeTime::ChildDay | AgeTime::AdultDay)
    }

    /// The same age at the opposite time of day.
    pub fn other_time(self) -> AgeTime {
        match self {
            AgeTime::ChildDay => AgeTime::ChildNight,
            AgeTime::ChildNight => AgeTime::ChildDay,
            AgeTime::AdultDay => AgeTime::AdultNight,
            AgeTime::AdultNight => AgeTime::AdultDay,
        }
    }
}

/// Simulated age and time of day under which conditions are evaluated.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SimState {
    pub is_child: bool,
    pub is_adult: bool,
    pub at_day: bool,
    pub at_night: bool,
}

impl SimState {
    pub fn at(age_time: AgeTime) -> SimState {
        SimState {
            is_child: age_time.is_child(),
            is_adult: !age_time.is_child(),
            at_day: age_time.is_day(),
            at_night: !age_time.is_day(),
        }
    }
}

/// Per-region access flags for each age/time combination.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeTimeAccess {
    pub child_day: bool,
    pub child_night: bool,
    pub adult_day: bool,
    pub adult_night: bool,
}

impl AgeTimeAccess {
    pub fn all() -> Self {
        AgeTimeAccess {
            child_day: true,
            child_night: true,
            adult_day: true,
            adult_night: true,
        }
    }

    pub fn from_age_times(age_times: &[AgeTime]) -> Self {
        let mut access = AgeTimeAccess::default();
        for &at in age_times {
            access.set(at);
        }
        access
    }

    pub fn get(&self, age_time: AgeTime) -> bool {
        match age_time {
            AgeTime::ChildDay => self.child_day,
            AgeTime::ChildNight => self.child_night,
            AgeTime::AdultDay => self.adult_day,
            AgeTime::AdultNight => self.adult_night,
        }
    }

    pub fn set(&mut self, age_time: AgeTime) {
        match age_time {
            AgeTime::ChildDay => self.child_day = true,
            AgeTime::ChildNight => self.child_night = true,
            AgeTime::AdultDay => self.adult_day = true,
            AgeTime::AdultNight => self.adult_night = true,
        }
    }

    pub fn any(&self) -> bool {
        self.child_day || self.child_night || self.adult_day || self.adult_night
    }

    pub fn all_access(&self) -> bool {
        self.child_day && self.child_night && self.adult_day && self.adult_night
    }
}

#[derive(Clone, Debug)]
pub struct GlobalState {
    pub items: Vec<bool>,  // Corresponds to GameData.item_isv
    pub events: Vec<bool>, // Corresponds to GameData.event_isv
}

impl GlobalState {
    pub fn new(game_data: &GameData) -> Self {
        GlobalState {
            items: vec![false; game_data.item_isv.keys.len()],
            events: vec![false; game_data.event_isv.keys.len()],
        }
    }

    pub fn with_all_items(game_data: &GameData) -> Self {
        let mut state = GlobalState::new(game_data);
        state.items.fill(true);
        state
    }

    pub fn collect(&mut self, item: ItemId) {
        self.items[item] = true;
    }
}

/// Everything a condition can observe: logic mode, simulated age/time, collected items
/// and events, and the helper values derived from them.
#[derive(Clone, Debug)]
pub struct LogicContext<'a> {
    pub game_data: &'a GameData,
    pub mode: LogicMode,
    pub sim: SimState,
    pub global: GlobalState,
    pub helper_values: Vec<bool>, // Corresponds to GameData.helper_isv
}

impl<'a> LogicContext<'a> {
    pub fn new(game_data: &'a GameData, mode: LogicMode, global: GlobalState) -> Self {
        let mut ctx = LogicContext {
            game_data,
            mode,
            sim: SimState::default(),
            global,
            helper_values: vec![false; game_data.helpers.len()],
        };
        ctx.update_helpers();
        ctx
    }

    /// Force the simulated state to exactly one age and one time of day.
    pub fn set_age_time(&mut self, age_time: AgeTime) {
        self.sim = SimState::at(age_time);
        self.update_helpers();
    }

    pub fn update_helpers(&mut self) {
        for i in 0..self.game_data.helpers.len() {
            let value = helpers::evaluate(&self.game_data.helpers[i], self);
            self.helper_values[i] = value;
        }
    }

    pub fn evaluate(&self, req: &Requirement) -> bool {
        helpers::evaluate(req, self)
    }

    pub fn conditions_met(&self, conditions: &ConditionSlots) -> bool {
        match self.mode {
            LogicMode::NoLogic | LogicMode::Vanilla => true,
            LogicMode::Glitchless => self.evaluate(&conditions.glitchless),
            LogicMode::Glitched => {
                if self.evaluate(&conditions.glitchless) {
                    true
                } else if let Some(glitched) = &conditions.glitched {
                    self.evaluate(glitched)
                } else {
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game_data() -> GameData {
        GameData::from_json_str(
            r#"{
                "items": ["Hookshot"],
                "helpers": [
                    {"name": "AdultHookshot", "requirement": {"and": ["adult", {"item": "Hookshot"}]}}
                ],
                "regions": [{"name": "Root"}]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn sim_state_is_exclusive() {
        for at in AgeTime::ALL {
            let sim = SimState::at(at);
            assert!(sim.is_child != sim.is_adult);
            assert!(sim.at_day != sim.at_night);
        }
    }

    #[test]
    fn helpers_follow_age_time() {
        let game_data = game_data();
        let mut global = GlobalState::new(&game_data);
        global.collect(0);
        let mut ctx = LogicContext::new(&game_data, LogicMode::Glitchless, global);
        ctx.set_age_time(AgeTime::ChildDay);
        assert!(!ctx.evaluate(&Requirement::Helper(0)));
        ctx.set_age_time(AgeTime::AdultNight);
        assert!(ctx.evaluate(&Requirement::Helper(0)));
    }

    #[test]
    fn logic_mode_dispatch() {
        let game_data = game_data();
        let global = GlobalState::new(&game_data);
        let conditions = ConditionSlots {
            glitchless: Requirement::Never,
            glitched: Some(Requirement::Free),
        };
        let mut ctx = LogicContext::new(&game_data, LogicMode::NoLogic, global);
        assert!(ctx.conditions_met(&conditions));
        ctx.mode = LogicMode::Vanilla;
        assert!(ctx.conditions_met(&ConditionSlots::new(Requirement::Never)));
        ctx.mode = LogicMode::Glitchless;
        assert!(!ctx.conditions_met(&conditions));
        ctx.mode = LogicMode::Glitched;
        assert!(ctx.conditions_met(&conditions));
        assert!(!ctx.conditions_met(&ConditionSlots::new(Requirement::Never)));
    }

    #[test]
    fn access_flags() {
        let access = AgeTimeAccess::from_age_times(&[AgeTime::ChildDay, AgeTime::AdultNight]);
        assert!(access.get(AgeTime::ChildDay));
        assert!(!access.get(AgeTime::ChildNight));
        assert!(access.any());
        assert!(!access.all_access());
        assert!(AgeTimeAccess::all().all_access());
    }
}
