// The changes suggested by this lint usually make the code more cluttered and less clear:
#![allow(clippy::needless_range_loop)]
#![allow(clippy::too_many_arguments)]

pub mod overrides;
pub mod search;
pub mod settings;
pub mod shuffle;
pub mod spoiler_log;
pub mod tracking;
pub mod world;
