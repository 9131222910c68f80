//! Boundary to the authoritative rules engine.

use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::{
    error::EngineErrorBody,
    protocol::{
        build_route, move_route, new_game_route, place_worker_route, select_god_card_route,
        select_worker_route, skip_second_build_route, SelectGodCardRequest, SelectWorkerQuery,
        SkipSecondBuildRequest, SnapshotPayload, WorkerTargetQuery,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    NewGame,
    SelectGodCard,
    PlaceWorker,
    SelectWorker,
    Move,
    Build,
    SkipSecondBuild,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::NewGame => "new_game",
            Operation::SelectGodCard => "select_god_card",
            Operation::PlaceWorker => "place_worker",
            Operation::SelectWorker => "select_worker",
            Operation::Move => "move",
            Operation::Build => "build",
            Operation::SkipSecondBuild => "skip_second_build",
        }
    }

    /// Shown when the engine gives no message of its own.
    pub fn failure_notice(&self) -> &'static str {
        match self {
            Operation::NewGame => "Failed to start a new game. Please try again.",
            Operation::SelectGodCard => "Error during god card selection.",
            Operation::PlaceWorker => "Failed to place worker.",
            Operation::SelectWorker => "Failed to select worker.",
            Operation::Move => "Failed to move worker.",
            Operation::Build => "Failed to build.",
            Operation::SkipSecondBuild => "Failed to skip second build.",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request/response exchange per engine operation. Implementations must
/// not touch client state; they only report what the engine said.
#[async_trait]
pub trait GameEngine: Send + Sync {
    async fn new_game(&self) -> Result<SnapshotPayload, EngineError>;
    async fn select_god_card(
        &self,
        request: SelectGodCardRequest,
    ) -> Result<SnapshotPayload, EngineError>;
    async fn place_worker(&self, query: WorkerTargetQuery)
        -> Result<SnapshotPayload, EngineError>;
    async fn select_worker(&self, query: SelectWorkerQuery)
        -> Result<SnapshotPayload, EngineError>;
    async fn move_worker(&self, query: WorkerTargetQuery) -> Result<SnapshotPayload, EngineError>;
    async fn build(&self, query: WorkerTargetQuery) -> Result<SnapshotPayload, EngineError>;
    async fn skip_second_build(
        &self,
        request: SkipSecondBuildRequest,
    ) -> Result<SnapshotPayload, EngineError>;
}

/// Talks to the engine's HTTP/JSON surface.
pub struct HttpEngine {
    http: Client,
    base_url: String,
}

impl HttpEngine {
    pub fn new(base_url: &str) -> Result<Self, EngineError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, EngineError> {
        let parsed = Url::parse(base_url).map_err(|error| EngineError::InvalidUrl {
            url: base_url.to_string(),
            reason: error.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(EngineError::InvalidUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, route: &str) -> String {
        format!("{}{route}", self.base_url)
    }

    async fn read_snapshot(
        operation: Operation,
        response: Result<Response, reqwest::Error>,
    ) -> Result<SnapshotPayload, EngineError> {
        let response = response.map_err(|error| {
            warn!(%operation, %error, "engine request failed");
            EngineError::Transport(error.to_string())
        })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| EngineError::Transport(error.to_string()))?;

        if !status.is_success() {
            // Only a structured body is worth showing; plain-text pages such
            // as "Not Found" leave the message empty for the generic notice.
            let message = serde_json::from_str::<EngineErrorBody>(&body)
                .map(|body| body.error)
                .unwrap_or_default();
            warn!(
                %operation,
                status = status.as_u16(),
                %message,
                body = body.trim(),
                "engine returned error status"
            );
            return Err(EngineError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let payload: SnapshotPayload = serde_json::from_str(&body).map_err(|error| {
            warn!(%operation, %error, "engine response is not a snapshot");
            EngineError::Decode(error.to_string())
        })?;
        if let Some(message) = payload.error {
            warn!(%operation, %message, "engine rejected request");
            return Err(EngineError::Rejected(message));
        }
        Ok(payload)
    }
}

#[async_trait]
impl GameEngine for HttpEngine {
    async fn new_game(&self) -> Result<SnapshotPayload, EngineError> {
        debug!(operation = %Operation::NewGame, "engine request");
        let response = self.http.get(self.endpoint(new_game_route())).send().await;
        Self::read_snapshot(Operation::NewGame, response).await
    }

    async fn select_god_card(
        &self,
        request: SelectGodCardRequest,
    ) -> Result<SnapshotPayload, EngineError> {
        debug!(
            operation = %Operation::SelectGodCard,
            player = %request.player_id,
            card = %request.god_card,
            "engine request"
        );
        let response = self
            .http
            .post(self.endpoint(select_god_card_route()))
            .json(&request)
            .send()
            .await;
        Self::read_snapshot(Operation::SelectGodCard, response).await
    }

    async fn place_worker(
        &self,
        query: WorkerTargetQuery,
    ) -> Result<SnapshotPayload, EngineError> {
        debug!(operation = %Operation::PlaceWorker, worker = %query.worker_id, x = query.x, y = query.y, "engine request");
        let response = self
            .http
            .get(self.endpoint(place_worker_route()))
            .query(&query)
            .send()
            .await;
        Self::read_snapshot(Operation::PlaceWorker, response).await
    }

    async fn select_worker(
        &self,
        query: SelectWorkerQuery,
    ) -> Result<SnapshotPayload, EngineError> {
        debug!(operation = %Operation::SelectWorker, worker = %query.worker_id, player = %query.player_id, "engine request");
        let response = self
            .http
            .post(self.endpoint(select_worker_route()))
            .query(&query)
            .send()
            .await;
        Self::read_snapshot(Operation::SelectWorker, response).await
    }

    async fn move_worker(&self, query: WorkerTargetQuery) -> Result<SnapshotPayload, EngineError> {
        debug!(operation = %Operation::Move, worker = %query.worker_id, x = query.x, y = query.y, "engine request");
        let response = self
            .http
            .post(self.endpoint(move_route()))
            .query(&query)
            .send()
            .await;
        Self::read_snapshot(Operation::Move, response).await
    }

    async fn build(&self, query: WorkerTargetQuery) -> Result<SnapshotPayload, EngineError> {
        debug!(operation = %Operation::Build, worker = %query.worker_id, x = query.x, y = query.y, "engine request");
        let response = self
            .http
            .post(self.endpoint(build_route()))
            .query(&query)
            .send()
            .await;
        Self::read_snapshot(Operation::Build, response).await
    }

    async fn skip_second_build(
        &self,
        request: SkipSecondBuildRequest,
    ) -> Result<SnapshotPayload, EngineError> {
        debug!(operation = %Operation::SkipSecondBuild, worker = %request.worker_id, "engine request");
        let response = self
            .http
            .post(self.endpoint(skip_second_build_route()))
            .json(&request)
            .send()
            .await;
        Self::read_snapshot(Operation::SkipSecondBuild, response).await
    }
}
