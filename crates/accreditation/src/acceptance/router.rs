use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    AccreditationStatus, Amount, Criteria, InstitutionId, PollOutcome, Principal, VotingState,
};
use super::errors::ErrorKind;
use super::repository::{EventSink, FundsTransfer, LedgerRepository};
use super::resolver::InstitutionStatusResolver;
use super::service::{AccreditationService, AccreditationServiceError};

/// Header carrying the principal on whose behalf a request is made.
pub const CALLER_HEADER: &str = "x-caller-principal";

type SharedService<R, E, T> = Arc<AccreditationService<R, E, T>>;

/// Router builder exposing the committee, escrow, and voting operations over HTTP.
pub fn acceptance_router<R, E, T>(service: SharedService<R, E, T>) -> Router
where
    R: LedgerRepository + 'static,
    E: EventSink + 'static,
    T: FundsTransfer + 'static,
{
    Router::new()
        .route(
            "/api/v1/committee/members",
            get(committee_handler::<R, E, T>).post(add_member_handler::<R, E, T>),
        )
        .route(
            "/api/v1/committee/members/:principal",
            delete(remove_member_handler::<R, E, T>),
        )
        .route(
            "/api/v1/institutions/:institution_id/fee",
            get(escrow_handler::<R, E, T>).post(pay_fee_handler::<R, E, T>),
        )
        .route(
            "/api/v1/institutions/:institution_id/fee/distribution",
            post(distribute_fee_handler::<R, E, T>),
        )
        .route(
            "/api/v1/institutions/:institution_id/poll",
            get(poll_handler::<R, E, T>),
        )
        .route(
            "/api/v1/institutions/:institution_id/poll/open",
            post(open_vote_handler::<R, E, T>),
        )
        .route(
            "/api/v1/institutions/:institution_id/poll/deadline",
            post(change_deadline_handler::<R, E, T>),
        )
        .route(
            "/api/v1/institutions/:institution_id/poll/ballots",
            post(vote_handler::<R, E, T>),
        )
        .route(
            "/api/v1/institutions/:institution_id/poll/close",
            post(close_vote_handler::<R, E, T>),
        )
        .route(
            "/api/v1/institutions/:institution_id/status",
            get(status_handler::<R, E, T>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AddMemberRequest {
    pub principal: Principal,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PayFeeRequest {
    pub payer: Principal,
    pub amount: Amount,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct VoteRequest {
    pub criteria: Criteria,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CloseVoteRequest {
    pub threshold: u32,
}

/// Sanitized representation of an institution's poll.
#[derive(Debug, Clone, Serialize)]
pub struct PollView {
    pub institution: InstitutionId,
    pub state: VotingState,
    pub state_code: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub ballots_cast: usize,
    pub affirmative_score: u32,
    pub outcome: PollOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
}

pub(crate) async fn committee_handler<R, E, T>(
    State(service): State<SharedService<R, E, T>>,
) -> Response
where
    R: LedgerRepository + 'static,
    E: EventSink + 'static,
    T: FundsTransfer + 'static,
{
    let members = service.committee_members();
    let payload = json!({
        "count": members.len(),
        "members": members,
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn add_member_handler<R, E, T>(
    State(service): State<SharedService<R, E, T>>,
    headers: HeaderMap,
    Json(request): Json<AddMemberRequest>,
) -> Response
where
    R: LedgerRepository + 'static,
    E: EventSink + 'static,
    T: FundsTransfer + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match service.add_committee_member(&caller, request.principal.clone()) {
        Ok(()) => {
            let payload = json!({
                "member": request.principal,
                "count": service.committee_member_count(),
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn remove_member_handler<R, E, T>(
    State(service): State<SharedService<R, E, T>>,
    Path(principal): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: LedgerRepository + 'static,
    E: EventSink + 'static,
    T: FundsTransfer + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match service.remove_committee_member(&caller, Principal(principal)) {
        Ok(()) => {
            let payload = json!({ "count": service.committee_member_count() });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn pay_fee_handler<R, E, T>(
    State(service): State<SharedService<R, E, T>>,
    Path(institution_id): Path<u64>,
    Json(request): Json<PayFeeRequest>,
) -> Response
where
    R: LedgerRepository + 'static,
    E: EventSink + 'static,
    T: FundsTransfer + 'static,
{
    let institution = InstitutionId(institution_id);
    match service.pay_fee(institution, request.payer, request.amount) {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn escrow_handler<R, E, T>(
    State(service): State<SharedService<R, E, T>>,
    Path(institution_id): Path<u64>,
) -> Response
where
    R: LedgerRepository + 'static,
    E: EventSink + 'static,
    T: FundsTransfer + 'static,
{
    let institution = InstitutionId(institution_id);
    let payload = match service.application(institution) {
        Some(record) => json!({
            "institution": institution,
            "paid": record.paid,
            "payer": record.payer,
            "escrowed": record.amount_escrowed,
            "in_transit": record.in_transit,
            "distributed": record.distributed,
        }),
        None => json!({
            "institution": institution,
            "paid": false,
            "escrowed": Amount::ZERO,
            "distributed": false,
        }),
    };
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn open_vote_handler<R, E, T>(
    State(service): State<SharedService<R, E, T>>,
    Path(institution_id): Path<u64>,
) -> Response
where
    R: LedgerRepository + 'static,
    E: EventSink + 'static,
    T: FundsTransfer + 'static,
{
    let institution = InstitutionId(institution_id);
    match service.open_vote(institution) {
        Ok(deadline) => {
            let payload = json!({
                "institution": institution,
                "state": VotingState::Open,
                "deadline": deadline,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn change_deadline_handler<R, E, T>(
    State(service): State<SharedService<R, E, T>>,
    Path(institution_id): Path<u64>,
) -> Response
where
    R: LedgerRepository + 'static,
    E: EventSink + 'static,
    T: FundsTransfer + 'static,
{
    let institution = InstitutionId(institution_id);
    match service.change_deadline(institution) {
        Ok(()) => poll_response(&service, institution),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn vote_handler<R, E, T>(
    State(service): State<SharedService<R, E, T>>,
    Path(institution_id): Path<u64>,
    headers: HeaderMap,
    Json(request): Json<VoteRequest>,
) -> Response
where
    R: LedgerRepository + 'static,
    E: EventSink + 'static,
    T: FundsTransfer + 'static,
{
    let caller = match caller_from(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    let institution = InstitutionId(institution_id);
    match service.vote(&caller, institution, request.criteria) {
        Ok(score) => {
            let payload = json!({
                "institution": institution,
                "voter": caller,
                "affirmative_score": score,
            });
            (StatusCode::ACCEPTED, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn close_vote_handler<R, E, T>(
    State(service): State<SharedService<R, E, T>>,
    Path(institution_id): Path<u64>,
    Json(request): Json<CloseVoteRequest>,
) -> Response
where
    R: LedgerRepository + 'static,
    E: EventSink + 'static,
    T: FundsTransfer + 'static,
{
    let institution = InstitutionId(institution_id);
    match service.close_vote(institution, request.threshold) {
        Ok(_) => poll_response(&service, institution),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn distribute_fee_handler<R, E, T>(
    State(service): State<SharedService<R, E, T>>,
    Path(institution_id): Path<u64>,
) -> Response
where
    R: LedgerRepository + 'static,
    E: EventSink + 'static,
    T: FundsTransfer + 'static,
{
    match service.distribute_fee(InstitutionId(institution_id)) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn poll_handler<R, E, T>(
    State(service): State<SharedService<R, E, T>>,
    Path(institution_id): Path<u64>,
) -> Response
where
    R: LedgerRepository + 'static,
    E: EventSink + 'static,
    T: FundsTransfer + 'static,
{
    poll_response(&service, InstitutionId(institution_id))
}

pub(crate) async fn status_handler<R, E, T>(
    State(service): State<SharedService<R, E, T>>,
    Path(institution_id): Path<u64>,
) -> Response
where
    R: LedgerRepository + 'static,
    E: EventSink + 'static,
    T: FundsTransfer + 'static,
{
    let institution = InstitutionId(institution_id);
    let status: AccreditationStatus = service.resolve(institution);
    let payload = json!({
        "institution": institution,
        "status": status,
        "approved": status == AccreditationStatus::Approved,
    });
    (StatusCode::OK, Json(payload)).into_response()
}

fn poll_response<R, E, T>(
    service: &AccreditationService<R, E, T>,
    institution: InstitutionId,
) -> Response
where
    R: LedgerRepository + 'static,
    E: EventSink + 'static,
    T: FundsTransfer + 'static,
{
    let view = match service.poll(institution) {
        Some(poll) => PollView {
            institution,
            state: poll.state(),
            state_code: poll.state().code(),
            deadline: Some(poll.deadline),
            ballots_cast: poll.voters().len(),
            affirmative_score: poll.affirmative_score,
            outcome: poll.outcome,
            threshold: poll.threshold,
        },
        None => PollView {
            institution,
            state: VotingState::Undetermined,
            state_code: VotingState::Undetermined.code(),
            deadline: None,
            ballots_cast: 0,
            affirmative_score: 0,
            outcome: PollOutcome::Undetermined,
            threshold: None,
        },
    };
    (StatusCode::OK, Json(view)).into_response()
}

fn caller_from(headers: &HeaderMap) -> Result<Principal, Response> {
    headers
        .get(CALLER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(Principal::new)
        .ok_or_else(|| {
            let payload = json!({
                "error": format!("missing {CALLER_HEADER} header"),
            });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        })
}

pub(crate) fn error_response(error: AccreditationServiceError) -> Response {
    match error {
        AccreditationServiceError::Rejected(rejection) => {
            let kind = rejection.kind();
            let status = match kind {
                ErrorKind::Authorization => StatusCode::FORBIDDEN,
                ErrorKind::State | ErrorKind::Timing => StatusCode::CONFLICT,
                ErrorKind::Input => StatusCode::UNPROCESSABLE_ENTITY,
            };
            let payload = json!({
                "error": rejection.to_string(),
                "kind": kind,
            });
            (status, Json(payload)).into_response()
        }
        other => {
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}
