//! Aggregates over recorded runs.

use std::collections::BTreeMap;

use serde::Serialize;

use super::types::HistoryRecord;

/// Runs of one dungeon played by one decision provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStats {
    pub provider: String,
    pub runs: u32,
    pub completed: u32,
    pub total_enemies: u64,
}

impl ProviderStats {
    fn new(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            runs: 0,
            completed: 0,
            total_enemies: 0,
        }
    }

    pub fn average_enemies(&self) -> f64 {
        average(self.total_enemies, self.runs)
    }
}

/// Totals for one dungeon with a per-provider breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DungeonStats {
    pub dungeon_id: u32,
    pub dungeon_name: String,
    pub runs: u32,
    pub completed: u32,
    pub total_enemies: u64,
    /// Best average first.
    pub by_provider: Vec<ProviderStats>,
}

impl DungeonStats {
    pub fn average_enemies(&self) -> f64 {
        average(self.total_enemies, self.runs)
    }
}

/// Run history grouped per dungeon, ordered by dungeon id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub dungeons: Vec<DungeonStats>,
}

impl RunStats {
    pub fn from_records(records: &[HistoryRecord]) -> Self {
        let mut dungeons: BTreeMap<u32, (DungeonStats, BTreeMap<&str, ProviderStats>)> =
            BTreeMap::new();

        for record in records {
            let (dungeon, providers) = dungeons.entry(record.dungeon_id).or_insert_with(|| {
                let stats = DungeonStats {
                    dungeon_id: record.dungeon_id,
                    dungeon_name: String::new(),
                    runs: 0,
                    completed: 0,
                    total_enemies: 0,
                    by_provider: Vec::new(),
                };
                (stats, BTreeMap::new())
            });
            if dungeon.dungeon_name.is_empty() {
                dungeon.dungeon_name.clone_from(&record.dungeon_name);
            }

            let provider = providers
                .entry(record.provider.as_str())
                .or_insert_with(|| ProviderStats::new(&record.provider));

            let enemies = u64::from(record.enemies_defeated);
            let completed = u32::from(record.completed);
            dungeon.runs += 1;
            dungeon.completed += completed;
            dungeon.total_enemies += enemies;
            provider.runs += 1;
            provider.completed += completed;
            provider.total_enemies += enemies;
        }

        let dungeons = dungeons
            .into_values()
            .map(|(mut dungeon, providers)| {
                if dungeon.dungeon_name.is_empty() {
                    dungeon.dungeon_name = format!("Dungeon #{}", dungeon.dungeon_id);
                }
                dungeon.by_provider = providers.into_values().collect();
                // Stable sort keeps provider names in order on ties.
                dungeon
                    .by_provider
                    .sort_by(|a, b| b.average_enemies().total_cmp(&a.average_enemies()));
                dungeon
            })
            .collect();

        Self { dungeons }
    }

    pub fn is_empty(&self) -> bool {
        self.dungeons.is_empty()
    }

    pub fn total_runs(&self) -> u32 {
        self.dungeons.iter().map(|d| d.runs).sum()
    }
}

fn average(total: u64, runs: u32) -> f64 {
    if runs == 0 {
        0.0
    } else {
        total as f64 / f64::from(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(dungeon_id: u32, name: &str, provider: &str, enemies: u32, completed: bool) -> HistoryRecord {
        HistoryRecord {
            dungeon_id,
            dungeon_name: name.to_string(),
            juiced: false,
            enemies_defeated: enemies,
            completed,
            item_changes: BTreeMap::new(),
            provider: provider.to_string(),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn empty_history_has_no_stats() {
        let stats = RunStats::from_records(&[]);
        assert!(stats.is_empty());
        assert_eq!(stats.total_runs(), 0);
    }

    #[test]
    fn groups_per_dungeon_in_id_order() {
        let stats = RunStats::from_records(&[
            record(4, "Ashen Vault", "random", 3, false),
            record(1, "Sunken Crypt", "random", 6, true),
            record(4, "Ashen Vault", "random", 7, false),
        ]);

        assert_eq!(stats.total_runs(), 3);
        let ids: Vec<u32> = stats.dungeons.iter().map(|d| d.dungeon_id).collect();
        assert_eq!(ids, [1, 4]);

        let vault = &stats.dungeons[1];
        assert_eq!(vault.dungeon_name, "Ashen Vault");
        assert_eq!(vault.runs, 2);
        assert_eq!(vault.completed, 0);
        assert_eq!(vault.total_enemies, 10);
        assert_eq!(vault.average_enemies(), 5.0);
    }

    #[test]
    fn providers_are_ranked_by_average() {
        let stats = RunStats::from_records(&[
            record(1, "Crypt", "manual", 2, false),
            record(1, "Crypt", "random", 4, false),
            record(1, "Crypt", "random", 9, true),
            record(1, "Crypt", "manual", 4, false),
            record(1, "Crypt", "scripted", 3, false),
        ]);

        let crypt = &stats.dungeons[0];
        assert_eq!(crypt.runs, 5);
        assert_eq!(crypt.completed, 1);

        let ranking: Vec<(&str, u32, f64)> = crypt
            .by_provider
            .iter()
            .map(|p| (p.provider.as_str(), p.runs, p.average_enemies()))
            .collect();
        assert_eq!(
            ranking,
            [("random", 2, 6.5), ("manual", 2, 3.0), ("scripted", 1, 3.0)]
        );
    }

    #[test]
    fn missing_names_fall_back_to_the_id() {
        let stats = RunStats::from_records(&[
            record(9, "", "random", 1, false),
            record(2, "", "random", 1, false),
            record(2, "Bone Pit", "random", 1, false),
        ]);
        assert_eq!(stats.dungeons[0].dungeon_name, "Bone Pit");
        assert_eq!(stats.dungeons[1].dungeon_name, "Dungeon #9");
    }
}
