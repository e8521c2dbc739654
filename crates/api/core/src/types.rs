//! Domain types shared by the API backends and the runtime.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

// ============================================================================
// Action token
// ============================================================================

/// Opaque ordering token issued by the server.
///
/// The server may send it as a string or a number; both are normalized to
/// their string form and echoed back verbatim on the next mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionToken(pub String);

impl ActionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Moves
// ============================================================================

/// A submittable move: one of the three combat moves, or a loot pick.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Move {
    Rock,
    Paper,
    Scissor,
    LootOne,
    LootTwo,
    LootThree,
    LootFour,
}

impl Move {
    pub const COMBAT: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissor];
    pub const LOOT: [Move; 4] = [Move::LootOne, Move::LootTwo, Move::LootThree, Move::LootFour];

    /// Loot pick for a zero-based option index.
    pub fn loot(index: usize) -> Option<Move> {
        Self::LOOT.get(index).copied()
    }

    pub fn is_loot(self) -> bool {
        Self::LOOT.contains(&self)
    }
}

// ============================================================================
// Run state
// ============================================================================

/// Snapshot of one in-progress run, as last reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// Backing entity of the run; `None` means there is no active run.
    pub entity_id: Option<String>,
    pub dungeon_id: u32,
    /// Starts at 1 and never decreases within a run.
    pub room_number: u32,
    pub player_health: i64,
    pub player_max_health: i64,
    /// Set by the server once the final room has been cleared.
    pub completed: bool,
    pub loot_phase: bool,
    pub loot_option_count: usize,
}

impl RunState {
    /// Fresh run positioned in the first room.
    pub fn new(entity_id: impl Into<String>, dungeon_id: u32, health: i64) -> Self {
        Self {
            entity_id: Some(entity_id.into()),
            dungeon_id,
            room_number: 1,
            player_health: health,
            player_max_health: health,
            completed: false,
            loot_phase: false,
            loot_option_count: 0,
        }
    }

    pub fn enemies_defeated(&self) -> u32 {
        self.room_number.saturating_sub(1)
    }

    pub fn is_active(&self) -> bool {
        self.entity_id.is_some()
    }

    /// Whether the run has ended locally: no entity, dead player, or completed.
    pub fn is_over(&self) -> bool {
        !self.is_active() || self.player_health <= 0 || self.completed
    }

    /// Loot phase with at least one option to pick from.
    pub fn in_loot_phase(&self) -> bool {
        self.loot_phase && self.loot_option_count > 0
    }

    /// Moves that make sense for the current phase.
    ///
    /// In loot phase only the first `min(options, 4)` picks are offered,
    /// otherwise the three combat moves.
    pub fn phase_moves(&self) -> Vec<Move> {
        if self.in_loot_phase() {
            Move::LOOT
                .iter()
                .take(self.loot_option_count)
                .copied()
                .collect()
        } else {
            Move::COMBAT.to_vec()
        }
    }

    /// `(floor, room)` pair for display, four rooms per floor.
    pub fn floor_and_room(&self) -> (u32, u32) {
        let index = self.room_number.saturating_sub(1);
        (1 + index / 4, 1 + index % 4)
    }
}

/// Net change of one inventory item caused by a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDelta {
    pub item_id: u32,
    pub amount: i64,
}

/// Server answer to `start_run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStart {
    pub run: Option<RunState>,
    pub action_token: Option<ActionToken>,
}

/// Server answer to `submit_move`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub run: Option<RunState>,
    pub action_token: Option<ActionToken>,
    pub item_deltas: Vec<ItemDelta>,
}

// ============================================================================
// Energy
// ============================================================================

/// Fixed-point energy value scaled by [`RawEnergy::SCALE`].
///
/// The server counts energy in billionths so it can regenerate continuously;
/// players only ever see whole units.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RawEnergy(pub u64);

impl RawEnergy {
    /// Raw units per visible unit.
    pub const SCALE: u64 = 1_000_000_000;

    pub const fn from_units(units: u64) -> Self {
        Self(units.saturating_mul(Self::SCALE))
    }

    /// Human-visible whole units (`floor(raw / SCALE)`).
    pub const fn units(self) -> u64 {
        self.0 / Self::SCALE
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Account energy as last reported by the server. Replaced wholesale on refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyState {
    pub raw: RawEnergy,
    /// Maximum energy in visible units.
    pub capacity: u64,
    /// Regeneration in raw units per second.
    pub regen_per_second: u64,
    /// Boosted ("juiced") accounts may start juiced runs.
    pub boosted: bool,
}

impl EnergyState {
    pub fn visible(&self) -> u64 {
        self.raw.units()
    }

    pub fn capacity_raw(&self) -> RawEnergy {
        RawEnergy::from_units(self.capacity)
    }

    pub fn is_full(&self) -> bool {
        self.raw >= self.capacity_raw()
    }
}

// ============================================================================
// Claimable objects
// ============================================================================

/// Resource categories a claimable object accumulates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ClaimCategory {
    Dust,
    Shard,
    Energy,
}

/// An owned object (ROM) with yield waiting to be claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimableObject {
    pub id: String,
    pub dust_yield: u64,
    pub shard_yield: u64,
    /// Claimable energy in visible units.
    pub energy_yield: u64,
}

impl ClaimableObject {
    pub fn yield_for(&self, category: ClaimCategory) -> u64 {
        match category {
            ClaimCategory::Dust => self.dust_yield,
            ClaimCategory::Shard => self.shard_yield,
            ClaimCategory::Energy => self.energy_yield,
        }
    }

    /// Sum of one category across a collection.
    pub fn total(objects: &[ClaimableObject], category: ClaimCategory) -> u64 {
        objects.iter().map(|o| o.yield_for(category)).sum()
    }
}

// ============================================================================
// Dungeon catalog
// ============================================================================

/// Runs used today, keyed by dungeon id.
pub type DayProgress = BTreeMap<u32, u32>;

/// One entry of today's dungeon catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DungeonInfo {
    pub id: u32,
    pub name: String,
    /// Energy cost of a normal run, in visible units.
    pub energy_cost: u64,
    pub max_runs_per_day: u32,
    pub juiced_max_runs_per_day: u32,
}

impl DungeonInfo {
    /// A juiced run costs three normal runs' worth of energy and daily quota.
    pub const JUICED_MULTIPLIER: u32 = 3;

    pub fn cost(&self, juiced: bool) -> u64 {
        if juiced {
            self.energy_cost * u64::from(Self::JUICED_MULTIPLIER)
        } else {
            self.energy_cost
        }
    }

    /// Daily runs a start consumes.
    pub fn runs_consumed(juiced: bool) -> u32 {
        if juiced { Self::JUICED_MULTIPLIER } else { 1 }
    }

    /// Daily cap for a player; boosted players get the juiced cap.
    pub fn effective_max_runs(&self, boosted: bool) -> u32 {
        if boosted {
            self.juiced_max_runs_per_day
        } else {
            self.max_runs_per_day
        }
    }

    /// Whether a start would be accepted given today's usage and energy.
    ///
    /// Juiced starts need a boosted player; everything else is bounded by the
    /// effective daily cap and the energy cost.
    pub fn can_start(
        &self,
        juiced: bool,
        runs_used: u32,
        visible_energy: u64,
        boosted: bool,
    ) -> bool {
        if juiced && !boosted {
            return false;
        }
        runs_used + Self::runs_consumed(juiced) <= self.effective_max_runs(boosted)
            && visible_energy >= self.cost(juiced)
    }

    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            format!("Dungeon #{}", self.id)
        } else {
            self.name.clone()
        }
    }
}
