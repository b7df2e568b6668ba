//! [`GameService`] over HTTP/JSON.
//!
//! The same code runs natively and in the browser (`reqwest` switches to
//! `fetch` on wasm32).
//!
//! ```text
//! 2xx         -> decode body as the endpoint's response type
//! 404         -> ServiceError::SessionNotFound
//! other       -> ServiceError::Rejected { status, error-from-body }
//! no response -> ServiceError::Transport
//! ```

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::error::ServiceError;
use crate::protocol::{
    AgentsResponse, ErrorModel, HealthResponse, LegalMovesResponse, MoveRequest, MoveResponse,
    NewGameRequest, NewGameResponse, RestartResponse, StateResponse,
};
use crate::session::GameService;

#[derive(Clone, Debug)]
pub struct HttpGameService {
    client: Client,
    base_url: String,
}

impl HttpGameService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.base_url.clone())
    }

    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ServiceError> {
        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        trace!(%url, status = status.as_u16(), bytes = body.len(), "response");

        if status == StatusCode::NOT_FOUND {
            debug!(%url, "service answered 404");
            return Err(ServiceError::SessionNotFound);
        }
        if !status.is_success() {
            let error: ErrorModel = serde_json::from_str(&body).unwrap_or_default();
            return Err(ServiceError::Rejected {
                status: status.as_u16(),
                message: error.error.unwrap_or_else(|| status.to_string()),
            });
        }
        serde_json::from_str(&body).map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

impl GameService for HttpGameService {
    async fn create_game(&self, request: &NewGameRequest) -> Result<NewGameResponse, ServiceError> {
        self.send(self.client.post(self.url("/game/new")).json(request))
            .await
    }

    async fn fetch_state(&self, game_id: &str) -> Result<StateResponse, ServiceError> {
        self.send(self.client.get(self.url(&format!("/game/{game_id}/state"))))
            .await
    }

    async fn submit_move(
        &self,
        game_id: &str,
        request: &MoveRequest,
    ) -> Result<MoveResponse, ServiceError> {
        self.send(
            self.client
                .post(self.url(&format!("/game/{game_id}/move")))
                .json(request),
        )
        .await
    }

    async fn restart(&self, game_id: &str) -> Result<RestartResponse, ServiceError> {
        self.send(self.client.post(self.url(&format!("/game/{game_id}/restart"))))
            .await
    }

    async fn legal_moves(&self, game_id: &str) -> Result<LegalMovesResponse, ServiceError> {
        self.send(
            self.client
                .get(self.url(&format!("/game/{game_id}/legal-moves"))),
        )
        .await
    }

    async fn health(&self) -> Result<HealthResponse, ServiceError> {
        self.send(self.client.get(self.url("/health"))).await
    }

    async fn agents(&self) -> Result<AgentsResponse, ServiceError> {
        self.send(self.client.get(self.url("/agents"))).await
    }
}
