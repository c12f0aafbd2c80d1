use anyhow::{bail, Result};
use entrando_game::{EntranceIndex, NO_ENTRANCE_INDEX};
use hashbrown::HashMap;
use serde_derive::{Deserialize, Serialize};

use crate::world::{EntranceId, World};

pub const ENTRANCE_OVERRIDE_SIZE: usize = 10;

/// Redirection record consumed by the game: taking the entrance `index` (and the exit
/// `destination` leading back through it) sends the player where `override_index`
/// (and `override_destination`) used to go.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntranceOverride {
    pub index: EntranceIndex,
    pub destination: EntranceIndex,
    pub blue_warp: EntranceIndex,
    pub override_index: EntranceIndex,
    pub override_destination: EntranceIndex,
}

fn reverse_index(world: &World, id: EntranceId) -> EntranceIndex {
    match world.entrance(id).reverse() {
        Some(reverse) => world.entrance(reverse).index(),
        None => NO_ENTRANCE_INDEX,
    }
}

/// One record per shuffled table entrance, sorted by index.
pub fn create_entrance_overrides(world: &World) -> Vec<EntranceOverride> {
    let mut overrides: Vec<EntranceOverride> = vec![];
    for entrance in &world.entrances {
        if !entrance.shuffled || entrance.index() < 0 {
            continue;
        }
        let Some(replacement) = entrance.replacement() else {
            panic!("Shuffled entrance {} has no replacement", entrance.name());
        };
        // A decoupled reverse has its own record, so the way back is left unspecified here.
        let (destination, override_destination) = if entrance.decoupled {
            (NO_ENTRANCE_INDEX, NO_ENTRANCE_INDEX)
        } else {
            (
                reverse_index(world, entrance.id),
                reverse_index(world, replacement),
            )
        };
        overrides.push(EntranceOverride {
            index: entrance.index(),
            destination,
            blue_warp: entrance.blue_warp,
            override_index: world.entrance(replacement).index(),
            override_destination,
        });
    }
    overrides.sort_by_key(|o| o.index);
    overrides
}

pub fn write_overrides(overrides: &[EntranceOverride]) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::with_capacity(overrides.len() * ENTRANCE_OVERRIDE_SIZE);
    for o in overrides {
        for v in [
            o.index,
            o.destination,
            o.blue_warp,
            o.override_index,
            o.override_destination,
        ] {
            out.extend(v.to_le_bytes());
        }
    }
    out
}

pub fn read_overrides(data: &[u8]) -> Result<Vec<EntranceOverride>> {
    if data.len() % ENTRANCE_OVERRIDE_SIZE != 0 {
        bail!(
            "Override data length {} is not a multiple of {ENTRANCE_OVERRIDE_SIZE}",
            data.len()
        );
    }
    Ok(data
        .chunks_exact(ENTRANCE_OVERRIDE_SIZE)
        .map(|chunk| {
            let field = |i: usize| i16::from_le_bytes([chunk[i * 2], chunk[i * 2 + 1]]);
            EntranceOverride {
                index: field(0),
                destination: field(1),
                blue_warp: field(2),
                override_index: field(3),
                override_destination: field(4),
            }
        })
        .collect())
}

/// Lookup side of the override list, as used when the game takes an entrance.
pub struct EntranceOverrideTable {
    overrides: Vec<EntranceOverride>,
    by_index: HashMap<EntranceIndex, usize>,
}

impl EntranceOverrideTable {
    pub fn new(overrides: Vec<EntranceOverride>) -> Self {
        let by_index = overrides
            .iter()
            .enumerate()
            .map(|(i, o)| (o.index, i))
            .collect();
        EntranceOverrideTable {
            overrides,
            by_index,
        }
    }

    pub fn overrides(&self) -> &[EntranceOverride] {
        &self.overrides
    }

    /// Index of the entrance actually taken when using `index`; unshuffled entrances
    /// resolve to themselves.
    pub fn resolve(&self, index: EntranceIndex) -> EntranceIndex {
        match self.by_index.get(&index) {
            Some(&i) => self.overrides[i].override_index,
            None => index,
        }
    }

    /// Blue warp of the dungeon whose entrance now leads into the given dungeon: after
    /// beating a boss the player returns outside whichever entrance reached it.
    pub fn resolve_blue_warp(
        &self,
        dungeon_entrance_index: EntranceIndex,
    ) -> Option<EntranceIndex> {
        self.overrides
            .iter()
            .find(|o| o.override_index == dungeon_entrance_index)
            .map(|o| o.blue_warp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_layout_is_little_endian() -> Result<()> {
        let overrides = vec![
            EntranceOverride {
                index: 0x0102,
                destination: -1,
                blue_warp: 0,
                override_index: 3,
                override_destination: 4,
            },
            EntranceOverride {
                index: 7,
                destination: 8,
                blue_warp: 9,
                override_index: 10,
                override_destination: -1,
            },
        ];
        let data = write_overrides(&overrides);
        assert_eq!(data.len(), 20);
        assert_eq!(&data[..4], &[0x02, 0x01, 0xFF, 0xFF]);
        assert_eq!(read_overrides(&data)?, overrides);
        assert!(read_overrides(&data[..15]).is_err());
        assert!(read_overrides(&[]).is_ok_and(|o| o.is_empty()));
        Ok(())
    }

    #[test]
    fn table_lookup() {
        let table = EntranceOverrideTable::new(vec![
            EntranceOverride {
                index: 20,
                destination: 21,
                blue_warp: 100,
                override_index: 30,
                override_destination: 31,
            },
            EntranceOverride {
                index: 30,
                destination: 31,
                blue_warp: 200,
                override_index: 20,
                override_destination: 21,
            },
        ]);
        assert_eq!(table.resolve(20), 30);
        assert_eq!(table.resolve(5), 5);
        // Entrance 20 now leads into dungeon 30, so beating dungeon 30 warps back to 20's blue warp.
        assert_eq!(table.resolve_blue_warp(30), Some(100));
        assert_eq!(table.resolve_blue_warp(40), None);
        assert_eq!(table.overrides().len(), 2);
    }
}
