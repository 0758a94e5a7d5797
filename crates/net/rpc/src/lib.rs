use std::{net::SocketAddr, str::FromStr};

use axum::{
    Router,
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use slashguard_types::primitives::{H256, Slot};
use tracing::{error, info, warn};

pub mod metrics;
pub mod state;

pub use state::{SlotClock, StateFilter, StateQuery, StateQueryError, SystemSlotClock};

pub async fn start_rpc_server(address: SocketAddr, query: StateQuery) -> Result<(), std::io::Error> {
    let app = build_router(query);

    // Start the axum app
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!(%address, "Started RPC server");
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(query: StateQuery) -> Router {
    let metrics_router = metrics::start_prometheus_metrics_api();
    let debug_router = Router::new()
        .route("/health", get(get_health))
        .route("/debug/states", get(get_debug_state))
        .with_state(query);

    Router::new().merge(metrics_router).merge(debug_router)
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    current_slot: Slot,
    slots_per_epoch: u64,
    weak_subjectivity_period: u64,
}

async fn get_health(State(query): State<StateQuery>) -> Response {
    let config = *query.config();
    let health = Health {
        status: "ok",
        current_slot: query.current_slot(),
        slots_per_epoch: config.slots_per_epoch,
        weak_subjectivity_period: config.weak_subjectivity_period,
    };

    match tokio::task::spawn_blocking(move || query.check_store()).await {
        Ok(Ok(())) => Json(health).into_response(),
        Ok(Err(err)) => {
            warn!(%err, "Store unavailable");
            let health = Health {
                status: "store unavailable",
                ..health
            };
            (StatusCode::SERVICE_UNAVAILABLE, Json(health)).into_response()
        }
        Err(err) => {
            error!(%err, "Health check task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct StateQueryParams {
    block_root: Option<String>,
    slot: Option<Slot>,
}

async fn get_debug_state(
    State(query): State<StateQuery>,
    Query(params): Query<StateQueryParams>,
) -> Response {
    let block_root = match params.block_root.as_deref().map(H256::from_str).transpose() {
        Ok(root) => root,
        Err(err) => {
            return (StatusCode::BAD_REQUEST, format!("Invalid block root: {err}")).into_response();
        }
    };
    let filter = StateFilter {
        block_root,
        slot: params.slot,
    };

    // Store reads are blocking disk I/O
    match tokio::task::spawn_blocking(move || query.get_state(&filter)).await {
        Ok(Ok(encoded)) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            encoded,
        )
            .into_response(),
        Ok(Err(err)) => state_error_response(err),
        Err(err) => {
            error!(%err, "State query task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn state_error_response(err: StateQueryError) -> Response {
    let status = match &err {
        StateQueryError::MissingFilter
        | StateQueryError::AmbiguousFilter
        | StateQueryError::FutureSlot { .. } => StatusCode::BAD_REQUEST,
        StateQueryError::BlockNotFound(_) | StateQueryError::StateNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        StateQueryError::Storage(_) => {
            warn!(%err, "State query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::setup;

    async fn serve(query: StateQuery) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(query)).await.unwrap();
        });
        format!("http://{address}")
    }

    #[tokio::test]
    async fn serves_states_by_slot_and_root() {
        let (query, root, encoded_state) = setup(150);
        let base = serve(query).await;

        for url in [
            format!("{base}/debug/states?slot=100"),
            format!("{base}/debug/states?block_root={root}"),
        ] {
            let response = reqwest::get(&url).await.unwrap();
            assert_eq!(response.status(), reqwest::StatusCode::OK);
            assert_eq!(
                response.headers()["content-type"],
                "application/octet-stream"
            );
            assert_eq!(response.bytes().await.unwrap().to_vec(), encoded_state);
        }
    }

    #[tokio::test]
    async fn maps_query_errors_to_status_codes() {
        let (query, _, _) = setup(150);
        let base = serve(query).await;

        let response = reqwest::get(format!("{base}/debug/states")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        assert!(
            response
                .text()
                .await
                .unwrap()
                .contains("Need to specify either a block root or slot")
        );

        let response = reqwest::get(format!("{base}/debug/states?slot=151"))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        let response = reqwest::get(format!("{base}/debug/states?slot=99"))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

        let response = reqwest::get(format!("{base}/debug/states?block_root=0x1234"))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn serves_health_and_metrics() {
        let (query, _, _) = setup(150);
        let base = serve(query).await;

        let response = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body = response.text().await.unwrap();
        assert!(body.contains(r#""status":"ok""#));
        assert!(body.contains(r#""current_slot":150"#));
        assert!(body.contains(r#""slots_per_epoch":32"#));
        assert!(body.contains(r#""weak_subjectivity_period":54000"#));

        let response = reqwest::get(format!("{base}/metrics")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert!(
            response.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
    }
}
