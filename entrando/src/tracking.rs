use entrando_game::{
    EntranceData, EntranceIndex, SPOILER_ENTRANCE_GROUP_COUNT, TRACKER_ENTRANCE_TYPE_COUNT,
};
use hashbrown::HashSet;
use serde::Serialize;

use crate::overrides::EntranceOverride;

/// Per-group counts of shuffled entrances, and where each group starts in the listing
/// returned by `tracked_entrances_by_group`. Counts per tracker type exclude one-exit
/// entrances, which a tracker shows together with the way in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EntranceTrackingData {
    pub entrance_count: usize,
    pub group_entrance_counts: [usize; SPOILER_ENTRANCE_GROUP_COUNT],
    pub group_offsets: [usize; SPOILER_ENTRANCE_GROUP_COUNT],
    pub tracker_type_counts: [usize; TRACKER_ENTRANCE_TYPE_COUNT],
}

fn tracked_entries<'a>(
    entrance_table: &'a [EntranceData],
    overrides: &[EntranceOverride],
) -> Vec<&'a EntranceData> {
    let shuffled: HashSet<EntranceIndex> = overrides.iter().map(|o| o.index).collect();
    entrance_table
        .iter()
        .filter(|e| shuffled.contains(&e.index))
        .collect()
}

pub fn get_entrance_tracking_data(
    entrance_table: &[EntranceData],
    overrides: &[EntranceOverride],
) -> EntranceTrackingData {
    let mut data = EntranceTrackingData::default();
    for entry in tracked_entries(entrance_table, overrides) {
        data.group_entrance_counts[entry.group as usize] += 1;
        data.entrance_count += 1;
        if !entry.one_exit {
            data.tracker_type_counts[entry.tracker_type as usize] += 1;
        }
    }
    let mut offset = 0;
    for group in 0..SPOILER_ENTRANCE_GROUP_COUNT {
        data.group_offsets[group] = offset;
        offset += data.group_entrance_counts[group];
    }
    data
}

/// Indices of the shuffled entrances ordered by group, then by index.
pub fn tracked_entrances_by_group(
    entrance_table: &[EntranceData],
    overrides: &[EntranceOverride],
) -> Vec<EntranceIndex> {
    let mut entries = tracked_entries(entrance_table, overrides);
    entries.sort_by_key(|e| (e.group, e.index));
    entries.iter().map(|e| e.index).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use entrando_game::{EntranceType, SpoilerEntranceGroup, TrackerEntranceType};

    fn entry(index: EntranceIndex, group: SpoilerEntranceGroup) -> EntranceData {
        EntranceData {
            index,
            name: format!("Entrance {index}"),
            from: 0,
            to: 0,
            entrance_type: EntranceType::Interior,
            group,
            tracker_type: TrackerEntranceType::Interior,
            one_exit: index % 2 == 0,
            reverse: None,
            blue_warp: 0,
        }
    }

    fn shuffled(index: EntranceIndex) -> EntranceOverride {
        EntranceOverride {
            index,
            destination: -1,
            blue_warp: 0,
            override_index: index,
            override_destination: -1,
        }
    }

    #[test]
    fn offsets_are_prefix_sums() {
        let table = vec![
            entry(5, SpoilerEntranceGroup::Kakariko),
            entry(1, SpoilerEntranceGroup::KokiriForest),
            entry(2, SpoilerEntranceGroup::Kakariko),
            entry(3, SpoilerEntranceGroup::HyruleCastle),
            entry(4, SpoilerEntranceGroup::KokiriForest),
        ];
        // Entrance 4 was not shuffled.
        let overrides: Vec<EntranceOverride> = [1, 2, 3, 5].into_iter().map(shuffled).collect();
        let data = get_entrance_tracking_data(&table, &overrides);
        assert_eq!(data.entrance_count, 4);
        assert_eq!(data.group_entrance_counts[1], 1);
        assert_eq!(data.group_entrance_counts[3], 2);
        assert_eq!(data.group_entrance_counts[15], 1);
        assert_eq!(data.group_offsets[0], 0);
        assert_eq!(data.group_offsets[2], 1);
        assert_eq!(data.group_offsets[4], 3);
        assert_eq!(data.group_offsets[15], 3);
        // Entrance 2 is a one-exit entrance.
        assert_eq!(data.tracker_type_counts, [0, 3, 0, 0]);

        let listing = tracked_entrances_by_group(&table, &overrides);
        assert_eq!(listing, vec![1, 2, 5, 3]);
        assert_eq!(listing[data.group_offsets[3]], 2);
    }

    #[test]
    fn nothing_shuffled() {
        let table = vec![entry(1, SpoilerEntranceGroup::Market)];
        let data = get_entrance_tracking_data(&table, &[]);
        assert_eq!(data, EntranceTrackingData::default());
        assert!(tracked_entrances_by_group(&table, &[]).is_empty());
    }
}
