//! JSON payloads exchanged with the game service.
//!
//! Field names follow the service's schema (camelCase plus the upper-case
//! `*_CID` component columns); conversions into the domain types sit next to
//! each payload.

use serde::{Deserialize, Serialize};

use client_api_core::{
    ActionToken, ApiError, ClaimCategory, ClaimableObject, DayProgress, DungeonInfo, EnergyState,
    ItemDelta, Move, RawEnergy, RunState,
};

// ============================================================================
// Scalars
// ============================================================================

/// The service sends some identifiers either as strings or as numbers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StringOrNumber {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::Text(s) => s,
            StringOrNumber::Integer(n) => n.to_string(),
            StringOrNumber::Float(f) => f.to_string(),
        }
    }

    fn as_u32(&self) -> Option<u32> {
        match self {
            StringOrNumber::Text(s) => s.trim().parse().ok(),
            StringOrNumber::Integer(n) => u32::try_from(*n).ok(),
            StringOrNumber::Float(f) if *f >= 0.0 => Some(*f as u32),
            StringOrNumber::Float(_) => None,
        }
    }
}

impl From<StringOrNumber> for ActionToken {
    fn from(value: StringOrNumber) -> Self {
        ActionToken(value.into_string())
    }
}

fn non_negative(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

// ============================================================================
// Dungeon state
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stat {
    #[serde(default)]
    pub current: i64,
    #[serde(default, rename = "currentMax")]
    pub current_max: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Player {
    #[serde(default)]
    pub health: Stat,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default)]
    pub loot_phase: bool,
    #[serde(default)]
    pub loot_options: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entity {
    #[serde(default, rename = "docId")]
    pub doc_id: Option<String>,
    #[serde(default, rename = "ID_CID")]
    pub dungeon_id: Option<StringOrNumber>,
    #[serde(default, rename = "ROOM_NUM_CID")]
    pub room_number: Option<u32>,
    #[serde(default, rename = "COMPLETE_CID")]
    pub complete: Option<bool>,
}

/// `{ run, entity }` pair describing the account's dungeon state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DungeonData {
    #[serde(default)]
    pub run: Option<Run>,
    #[serde(default)]
    pub entity: Option<Entity>,
}

impl DungeonData {
    /// Convert into a [`RunState`]; both halves missing means no run.
    pub fn into_run_state(self) -> Result<Option<RunState>, ApiError> {
        let (run, entity) = match (self.run, self.entity) {
            (None, None) => return Ok(None),
            (run, entity) => (run, entity.unwrap_or_default()),
        };

        let dungeon_id = entity
            .dungeon_id
            .as_ref()
            .and_then(StringOrNumber::as_u32)
            .unwrap_or(0);
        let room_number = entity.room_number.unwrap_or(1);
        let completed = entity.complete.unwrap_or(false);

        let Some(run) = run else {
            // Entity without a run: the server has closed it out.
            return Ok(Some(RunState {
                entity_id: None,
                dungeon_id,
                room_number,
                player_health: 0,
                player_max_health: 0,
                completed,
                loot_phase: false,
                loot_option_count: 0,
            }));
        };

        let player = run
            .players
            .first()
            .ok_or_else(|| ApiError::Decode("run has no players".to_string()))?;

        Ok(Some(RunState {
            entity_id: Some(entity.doc_id.unwrap_or_else(|| format!("dungeon-{dungeon_id}"))),
            dungeon_id,
            room_number,
            player_health: player.health.current,
            player_max_health: player.health.current_max,
            completed,
            loot_phase: run.loot_phase,
            loot_option_count: run.loot_options.len(),
        }))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DungeonStateResponse {
    #[serde(default)]
    pub data: DungeonData,
}

// ============================================================================
// Actions (start run / play move)
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionData {
    pub consumables: Vec<u32>,
    pub item_id: u32,
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_juiced: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gear_instance_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub action: String,
    pub action_token: String,
    pub dungeon_id: u32,
    pub data: ActionData,
}

impl ActionRequest {
    pub fn start_run(dungeon_id: u32, juiced: bool, token: Option<&ActionToken>) -> Self {
        Self {
            action: "start_run".to_string(),
            action_token: token.map(|t| t.0.clone()).unwrap_or_default(),
            dungeon_id,
            data: ActionData {
                is_juiced: Some(juiced),
                ..ActionData::default()
            },
        }
    }

    pub fn play_move(mv: Move, dungeon_id: u32, token: Option<&ActionToken>) -> Self {
        Self {
            action: mv.to_string(),
            action_token: token.map(|t| t.0.clone()).unwrap_or_default(),
            dungeon_id,
            data: ActionData {
                gear_instance_ids: Some(Vec::new()),
                ..ActionData::default()
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemBalanceChange {
    pub id: u32,
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<DungeonData>,
    #[serde(default)]
    pub action_token: Option<StringOrNumber>,
    #[serde(default)]
    pub game_item_balance_changes: Option<Vec<ItemBalanceChange>>,
}

fn default_true() -> bool {
    true
}

impl ActionResponse {
    /// Fail on `success = false`, otherwise split into run, token and deltas.
    pub fn into_parts(
        self,
    ) -> Result<(Option<RunState>, Option<ActionToken>, Vec<ItemDelta>), ApiError> {
        if !self.success {
            return Err(ApiError::Rejected(
                self.message
                    .unwrap_or_else(|| "server responded with success=false".to_string()),
            ));
        }

        let run = match self.data {
            Some(data) => data.into_run_state()?,
            None => None,
        };
        let token = self.action_token.map(ActionToken::from);
        let deltas = self
            .game_item_balance_changes
            .unwrap_or_default()
            .into_iter()
            .map(|c| ItemDelta {
                item_id: c.id,
                amount: c.amount,
            })
            .collect();

        Ok((run, token, deltas))
    }
}

// ============================================================================
// Energy
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyParsed {
    pub energy: f64,
    pub max_energy: f64,
    #[serde(default)]
    pub regen_per_second: f64,
    #[serde(default)]
    pub is_player_juiced: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyEntity {
    pub parsed_data: EnergyParsed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnergyResponse {
    #[serde(default)]
    pub entities: Vec<EnergyEntity>,
}

impl EnergyResponse {
    pub fn into_energy(self) -> Result<EnergyState, ApiError> {
        let parsed = self
            .entities
            .into_iter()
            .next()
            .map(|e| e.parsed_data)
            .ok_or_else(|| ApiError::NotFound("energy entity".to_string()))?;

        Ok(EnergyState {
            raw: RawEnergy(non_negative(parsed.energy)),
            capacity: non_negative(parsed.max_energy),
            regen_per_second: non_negative(parsed.regen_per_second),
            boosted: parsed.is_player_juiced,
        })
    }
}

// ============================================================================
// Claimable objects (ROMs)
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactoryStats {
    #[serde(default)]
    pub dust_collectable: f64,
    #[serde(default)]
    pub shard_collectable: f64,
    #[serde(default)]
    pub energy_collectable: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RomEntity {
    pub doc_id: String,
    #[serde(default)]
    pub factory_stats: FactoryStats,
}

impl From<RomEntity> for ClaimableObject {
    fn from(rom: RomEntity) -> Self {
        ClaimableObject {
            id: rom.doc_id,
            dust_yield: non_negative(rom.factory_stats.dust_collectable),
            shard_yield: non_negative(rom.factory_stats.shard_collectable),
            energy_yield: non_negative(rom.factory_stats.energy_collectable),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RomsResponse {
    #[serde(default)]
    pub entities: Vec<RomEntity>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub rom_id: String,
    pub claim_id: String,
}

impl ClaimRequest {
    pub fn new(object_id: &str, category: ClaimCategory) -> Self {
        Self {
            rom_id: object_id.to_string(),
            claim_id: category.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaimResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

// ============================================================================
// Dungeon catalog and daily progress
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct TodayDungeon {
    #[serde(rename = "ID_CID")]
    pub id: StringOrNumber,
    #[serde(default, rename = "NAME_CID")]
    pub name: String,
    #[serde(default, rename = "ENERGY_CID")]
    pub energy_cost: u64,
    #[serde(default, rename = "UINT256_CID")]
    pub max_runs: u32,
    #[serde(default, rename = "juicedMaxRunsPerDay")]
    pub juiced_max_runs: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayResponse {
    #[serde(default)]
    pub dungeon_data_entities: Vec<TodayDungeon>,
}

impl TodayResponse {
    pub fn into_dungeons(self) -> Vec<DungeonInfo> {
        self.dungeon_data_entities
            .into_iter()
            .filter_map(|d| {
                let id = d.id.as_u32()?;
                Some(DungeonInfo {
                    id,
                    name: d.name,
                    energy_cost: d.energy_cost,
                    max_runs_per_day: d.max_runs,
                    juiced_max_runs_per_day: d.juiced_max_runs,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DayProgressEntity {
    #[serde(rename = "ID_CID")]
    pub dungeon_id: StringOrNumber,
    #[serde(default, rename = "UINT256_CID")]
    pub runs: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayProgressResponse {
    #[serde(default)]
    pub day_progress_entities: Vec<DayProgressEntity>,
}

impl DayProgressResponse {
    pub fn into_progress(self) -> DayProgress {
        self.day_progress_entities
            .into_iter()
            .filter_map(|e| Some((e.dungeon_id.as_u32()?, e.runs)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_run_and_entity_means_no_run() {
        let data: DungeonData = serde_json::from_value(json!({ "run": null, "entity": null })).unwrap();
        assert_eq!(data.into_run_state().unwrap(), None);
    }

    #[test]
    fn active_run_is_decoded() {
        let data: DungeonData = serde_json::from_value(json!({
            "run": {
                "players": [
                    { "health": { "current": 7, "currentMax": 12 } },
                    { "health": { "current": 3, "currentMax": 9 } }
                ],
                "lootPhase": true,
                "lootOptions": [{}, {}]
            },
            "entity": { "docId": "abc", "ID_CID": "3", "ROOM_NUM_CID": 5, "COMPLETE_CID": false }
        }))
        .unwrap();

        let run = data.into_run_state().unwrap().unwrap();
        assert_eq!(run.entity_id.as_deref(), Some("abc"));
        assert_eq!(run.dungeon_id, 3);
        assert_eq!(run.room_number, 5);
        assert_eq!(run.player_health, 7);
        assert_eq!(run.player_max_health, 12);
        assert!(run.loot_phase);
        assert_eq!(run.loot_option_count, 2);
        assert_eq!(run.enemies_defeated(), 4);
    }

    #[test]
    fn entity_without_run_is_over() {
        let data: DungeonData =
            serde_json::from_value(json!({ "run": null, "entity": { "ID_CID": 1 } })).unwrap();
        let run = data.into_run_state().unwrap().unwrap();
        assert!(run.is_over());
    }

    #[test]
    fn numeric_action_tokens_are_normalized() {
        let response: ActionResponse = serde_json::from_value(json!({
            "success": true,
            "actionToken": 1712345,
            "data": { "run": null, "entity": null },
            "gameItemBalanceChanges": [{ "id": 2, "amount": -1 }, { "id": 9, "amount": 4 }]
        }))
        .unwrap();

        let (run, token, deltas) = response.into_parts().unwrap();
        assert_eq!(run, None);
        assert_eq!(token, Some(ActionToken::new("1712345")));
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0], ItemDelta { item_id: 2, amount: -1 });
    }

    #[test]
    fn unsuccessful_action_is_rejected() {
        let response: ActionResponse =
            serde_json::from_value(json!({ "success": false, "message": "no energy" })).unwrap();
        assert_eq!(
            response.into_parts().unwrap_err(),
            ApiError::Rejected("no energy".to_string())
        );
    }

    #[test]
    fn energy_payload_is_converted() {
        let response: EnergyResponse = serde_json::from_value(json!({
            "entities": [{ "parsedData": {
                "energy": 123_500_000_000u64,
                "maxEnergy": 240,
                "regenPerSecond": 2_777_778,
                "isPlayerJuiced": true
            }}]
        }))
        .unwrap();

        let energy = response.into_energy().unwrap();
        assert_eq!(energy.visible(), 123);
        assert_eq!(energy.capacity, 240);
        assert_eq!(energy.regen_per_second, 2_777_778);
        assert!(energy.boosted);
    }

    #[test]
    fn request_bodies_use_service_field_names() {
        let token = ActionToken::new("t-1");
        let body = serde_json::to_value(ActionRequest::start_run(4, true, Some(&token))).unwrap();
        assert_eq!(body["action"], "start_run");
        assert_eq!(body["actionToken"], "t-1");
        assert_eq!(body["data"]["isJuiced"], true);

        let body = serde_json::to_value(ActionRequest::play_move(Move::LootTwo, 4, None)).unwrap();
        assert_eq!(body["action"], "loot_two");
        assert_eq!(body["actionToken"], "");

        let body = serde_json::to_value(ClaimRequest::new("rom-1", ClaimCategory::Energy)).unwrap();
        assert_eq!(body, json!({ "romId": "rom-1", "claimId": "energy" }));
    }

    #[test]
    fn catalog_and_progress_skip_unparseable_ids() {
        let today: TodayResponse = serde_json::from_value(json!({
            "dungeonDataEntities": [
                { "ID_CID": 1, "NAME_CID": "Dungetron 5000", "ENERGY_CID": 40, "UINT256_CID": 10, "juicedMaxRunsPerDay": 30 },
                { "ID_CID": "bogus" }
            ]
        }))
        .unwrap();
        let dungeons = today.into_dungeons();
        assert_eq!(dungeons.len(), 1);
        assert_eq!(dungeons[0].cost(true), 120);

        let progress: DayProgressResponse = serde_json::from_value(json!({
            "dayProgressEntities": [{ "ID_CID": "1", "UINT256_CID": 4 }]
        }))
        .unwrap();
        assert_eq!(progress.into_progress().get(&1), Some(&4));
    }
}
