use conjcore::contracts::{NoradId, ScreeningRequest};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

use crate::service::state::{ConjunctionQuery, ServiceError, ServiceState};

/// Largest JSON body accepted on POST routes.
const BODY_LIMIT: u64 = 64 * 1024;

/// Start-screening body; every field may be left out.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunRequest {
    pub asset_ids: Vec<u64>,
    pub time_window_days: u32,
    pub distance_threshold_km: f64,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            asset_ids: Vec::new(),
            time_window_days: 7,
            distance_threshold_km: 5.0,
        }
    }
}

impl From<RunRequest> for ScreeningRequest {
    fn from(body: RunRequest) -> Self {
        ScreeningRequest {
            asset_ids: body.asset_ids,
            time_window_days: body.time_window_days,
            distance_threshold_km: body.distance_threshold_km,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PropagateQuery {
    pub steps: u32,
    pub step_seconds: f64,
}

impl Default for PropagateQuery {
    fn default() -> Self {
        Self {
            steps: 1,
            step_seconds: 60.0,
        }
    }
}

/// The full HTTP surface of the simulated screening service.
pub fn routes(
    state: Arc<ServiceState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let state_filter = warp::any().map(move || Arc::clone(&state));

    let run = warp::path!("api" / "screening" / "run")
        .and(warp::post())
        .and(warp::body::content_length_limit(BODY_LIMIT))
        .and(warp::body::json())
        .and(state_filter.clone())
        .and_then(run_screening);

    let status = warp::path!("api" / "screening" / "status" / u64)
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(screening_status);

    let results = warp::path!("api" / "screening" / "results" / u64)
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(screening_results);

    let propagate = warp::path!("api" / "orbit" / NoradId / "propagate")
        .and(warp::get())
        .and(warp::query::<PropagateQuery>())
        .and(state_filter.clone())
        .and_then(propagate);

    let batch = warp::path!("api" / "orbit" / "propagate-batch")
        .and(warp::post())
        .and(warp::body::content_length_limit(BODY_LIMIT))
        .and(warp::body::json())
        .and(state_filter.clone())
        .and_then(propagate_batch);

    let summary = warp::path!("api" / "conjunctions" / "summary")
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(conjunction_summary);

    let detail = warp::path!("api" / "conjunctions" / u64)
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(conjunction_detail);

    let list = warp::path!("api" / "conjunctions")
        .and(warp::get())
        .and(warp::query::<ConjunctionQuery>())
        .and(state_filter)
        .and_then(list_conjunctions);

    run.or(status)
        .or(results)
        .or(propagate)
        .or(batch)
        .or(summary)
        .or(detail)
        .or(list)
        .with(warp::log("simulator::service"))
}

fn json_reply<T: Serialize>(body: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn error_reply(err: &ServiceError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_reply(&json!({ "detail": err.to_string() }), status)
}

fn respond<T: Serialize>(result: Result<T, ServiceError>) -> Response {
    match result {
        Ok(body) => json_reply(&body, StatusCode::OK),
        Err(err) => error_reply(&err),
    }
}

async fn run_screening(
    body: RunRequest,
    state: Arc<ServiceState>,
) -> Result<Response, Infallible> {
    let request = ScreeningRequest::from(body);
    Ok(respond(state.start_screening(&request).map(|jobs| {
        json!({ "total": jobs.len(), "jobs": jobs })
    })))
}

async fn screening_status(job_id: u64, state: Arc<ServiceState>) -> Result<Response, Infallible> {
    Ok(respond(state.job_status(job_id)))
}

async fn screening_results(
    job_id: u64,
    state: Arc<ServiceState>,
) -> Result<Response, Infallible> {
    Ok(json_reply(&state.job_results(job_id), StatusCode::OK))
}

async fn propagate(
    norad_id: NoradId,
    query: PropagateQuery,
    state: Arc<ServiceState>,
) -> Result<Response, Infallible> {
    Ok(respond(state.propagate(
        norad_id,
        query.steps,
        query.step_seconds,
    )))
}

async fn propagate_batch(
    norad_ids: Vec<NoradId>,
    state: Arc<ServiceState>,
) -> Result<Response, Infallible> {
    Ok(json_reply(&state.propagate_batch(&norad_ids), StatusCode::OK))
}

async fn conjunction_summary(state: Arc<ServiceState>) -> Result<Response, Infallible> {
    Ok(json_reply(&state.summary(), StatusCode::OK))
}

async fn conjunction_detail(id: u64, state: Arc<ServiceState>) -> Result<Response, Infallible> {
    Ok(respond(state.conjunction(id)))
}

async fn list_conjunctions(
    query: ConjunctionQuery,
    state: Arc<ServiceState>,
) -> Result<Response, Infallible> {
    Ok(json_reply(&state.conjunctions(&query), StatusCode::OK))
}
