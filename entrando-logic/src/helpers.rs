use crate::LogicContext;
use entrando_game::Requirement;

pub fn evaluate(req: &Requirement, ctx: &LogicContext) -> bool {
    match req {
        Requirement::Free => true,
        Requirement::Never => false,
        Requirement::Child => ctx.sim.is_child,
        Requirement::Adult => ctx.sim.is_adult,
        Requirement::Day => ctx.sim.at_day,
        Requirement::Night => ctx.sim.at_night,
        Requirement::Item(item_id) => ctx.global.items[*item_id],
        // Events may be referenced by requirements before any region grants them:
        Requirement::Event(event_id) => ctx.global.events.get(*event_id).copied().unwrap_or(false),
        Requirement::Helper(helper_idx) => ctx.helper_values[*helper_idx],
        Requirement::And(reqs) => reqs.iter().all(|r| evaluate(r, ctx)),
        Requirement::Or(reqs) => reqs.iter().any(|r| evaluate(r, ctx)),
    }
}
