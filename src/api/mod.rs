use axum::{
    Router,
    extract::Json,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    OperationRecord, PlanInputs, PlannerPolicy, ShortfallRounding, VerificationReport,
    YearSummary, run_plan, verify_plan,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiShortfallRounding {
    #[serde(alias = "floorPlusOne", alias = "floor_plus_one")]
    FloorPlusOne,
    #[serde(alias = "ceil")]
    Ceiling,
}

impl From<ApiShortfallRounding> for ShortfallRounding {
    fn from(value: ApiShortfallRounding) -> Self {
        match value {
            ApiShortfallRounding::FloorPlusOne => ShortfallRounding::FloorPlusOne,
            ApiShortfallRounding::Ceiling => ShortfallRounding::Ceiling,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlanPayload {
    #[serde(flatten)]
    inputs: PlanInputs,
    #[serde(default, rename = "shortfallRounding", alias = "shortfall_rounding")]
    shortfall_rounding: Option<ApiShortfallRounding>,
}

#[derive(Debug, Deserialize)]
struct VerifyPayload {
    #[serde(flatten)]
    inputs: PlanInputs,
    records: Vec<OperationRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanResponse {
    total_cost: f64,
    total_emissions: f64,
    years: Vec<YearSummary>,
    records: Vec<OperationRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponse {
    clean: bool,
    violation_count: usize,
    report: VerificationReport,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct IndexResponse {
    name: &'static str,
    version: &'static str,
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router();

    let listener = TcpListener::bind(addr).await?;
    println!("fleetplan HTTP API listening on http://{addr}");

    axum::serve(listener, app).await
}

fn router() -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/plan", post(plan_handler))
        .route("/api/verify", post(verify_handler))
        .fallback(not_found_handler)
}

async fn index_handler() -> Response {
    json_response(
        StatusCode::OK,
        IndexResponse {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn plan_handler(Json(payload): Json<PlanPayload>) -> Response {
    let policy = PlannerPolicy {
        shortfall_rounding: payload
            .shortfall_rounding
            .map(Into::into)
            .unwrap_or_default(),
    };
    match run_plan(&payload.inputs, policy) {
        Ok(outcome) => json_response(
            StatusCode::OK,
            PlanResponse {
                total_cost: outcome.total_cost,
                total_emissions: outcome.total_emissions,
                years: outcome.years,
                records: outcome.records,
            },
        ),
        Err(err) => error_response(StatusCode::UNPROCESSABLE_ENTITY, &err.to_string()),
    }
}

async fn verify_handler(Json(payload): Json<VerifyPayload>) -> Response {
    match verify_plan(&payload.inputs, &payload.records) {
        Ok(report) => json_response(
            StatusCode::OK,
            VerifyResponse {
                clean: report.is_clean(),
                violation_count: report.violation_count(),
                report,
            },
        ),
        Err(err) => error_response(StatusCode::UNPROCESSABLE_ENTITY, &err.to_string()),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    (status, Json(body)).into_response()
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
