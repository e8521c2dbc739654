//! reqwest implementation of [`GameApi`].

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

use client_api_core::{
    ActionToken, ApiError, ClaimCategory, ClaimableObject, DayProgress, DungeonInfo, EnergyState,
    GameApi, Move, MoveOutcome, RunStart, RunState,
};

use crate::config::HttpApiConfig;
use crate::wire::{
    ActionRequest, ActionResponse, ClaimRequest, ClaimResponse, DayProgressResponse,
    DungeonStateResponse, EnergyResponse, RomsResponse, TodayResponse,
};

const DUNGEON_STATE_PATH: &str = "/api/game/dungeon/state";
const DUNGEON_ACTION_PATH: &str = "/api/game/dungeon/action";
const DUNGEON_TODAY_PATH: &str = "/api/game/dungeon/today";
const ROM_CLAIM_PATH: &str = "/api/roms/factory/claim";

/// Game service client over HTTPS.
///
/// Holds one pooled `reqwest::Client` with the bearer token installed as a
/// default header; the type is cheap to share behind an `Arc`.
pub struct HttpGameApi {
    config: HttpApiConfig,
    http_client: reqwest::Client,
}

impl HttpGameApi {
    pub fn new(config: HttpApiConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.auth_token))
            .map_err(|e| ApiError::Network(format!("invalid auth token header: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn address(&self) -> &str {
        &self.config.address
    }

    fn map_send_error(&self, error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout(self.config.request_timeout)
        } else {
            ApiError::Network(error.to_string())
        }
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::debug!(target: "api::http", path, %status, "request failed");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        // Read text first for better decode errors
        let body = response
            .text()
            .await
            .map_err(|e| self.map_send_error(e))?;

        serde_json::from_str(&body).map_err(|e| {
            let snippet: String = body.chars().take(200).collect();
            ApiError::Decode(format!("{path}: {e}; body: {snippet}"))
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        tracing::trace!(target: "api::http", path, "GET");
        let response = self
            .http_client
            .get(self.config.url(path))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        self.read_json(path, response).await
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        tracing::trace!(target: "api::http", path, "POST");
        let response = self
            .http_client
            .post(self.config.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        self.read_json(path, response).await
    }
}

#[async_trait]
impl GameApi for HttpGameApi {
    async fn start_run(
        &self,
        dungeon_id: u32,
        juiced: bool,
        token: Option<&ActionToken>,
    ) -> Result<RunStart, ApiError> {
        let request = ActionRequest::start_run(dungeon_id, juiced, token);
        let response: ActionResponse = self.post_json(DUNGEON_ACTION_PATH, &request).await?;
        let (run, action_token, _) = response.into_parts()?;

        tracing::info!(target: "api::http", dungeon_id, juiced, "run started");
        Ok(RunStart { run, action_token })
    }

    async fn submit_move(
        &self,
        mv: Move,
        dungeon_id: u32,
        token: Option<&ActionToken>,
    ) -> Result<MoveOutcome, ApiError> {
        let request = ActionRequest::play_move(mv, dungeon_id, token);
        let response: ActionResponse = self.post_json(DUNGEON_ACTION_PATH, &request).await?;
        let (run, action_token, item_deltas) = response.into_parts()?;

        Ok(MoveOutcome {
            run,
            action_token,
            item_deltas,
        })
    }

    async fn fetch_run_state(&self) -> Result<Option<RunState>, ApiError> {
        let response: DungeonStateResponse = self.get_json(DUNGEON_STATE_PATH).await?;
        response.data.into_run_state()
    }

    async fn get_energy(&self, address: &str) -> Result<EnergyState, ApiError> {
        let path = format!("/api/offchain/player/energy/{address}");
        let response: EnergyResponse = self.get_json(&path).await?;
        response.into_energy()
    }

    async fn get_claimables(&self, address: &str) -> Result<Vec<ClaimableObject>, ApiError> {
        tracing::info!(target: "api::http", address, "fetching claimable objects");
        let path = format!("/api/roms/player/{address}");
        let response: RomsResponse = self.get_json(&path).await?;
        Ok(response
            .entities
            .into_iter()
            .map(ClaimableObject::from)
            .collect())
    }

    async fn claim(&self, object_id: &str, category: ClaimCategory) -> Result<(), ApiError> {
        tracing::info!(target: "api::http", object_id, %category, "claiming");
        let request = ClaimRequest::new(object_id, category);
        let response: ClaimResponse = self.post_json(ROM_CLAIM_PATH, &request).await?;

        if response.success {
            Ok(())
        } else {
            Err(ApiError::Rejected(
                response
                    .message
                    .unwrap_or_else(|| format!("claim of {category} from {object_id} refused")),
            ))
        }
    }

    async fn get_today_dungeons(&self) -> Result<Vec<DungeonInfo>, ApiError> {
        let response: TodayResponse = self.get_json(DUNGEON_TODAY_PATH).await?;
        Ok(response.into_dungeons())
    }

    async fn get_day_progress(&self, address: &str) -> Result<DayProgress, ApiError> {
        let path = format!("/api/offchain/player/dayprogress/{address}");
        let response: DayProgressResponse = self.get_json(&path).await?;
        Ok(response.into_progress())
    }
}
