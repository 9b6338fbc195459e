use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::AppState;
use crate::auth::auth::AuthUser;
use crate::engine::{builder, lifecycle, totals};
use crate::engine::builder::BuildOutcome;
use crate::engine::lifecycle::RunDetail;
use crate::engine::totals::Reconciliation;
use crate::model::payroll::{PayrollRun, PayrollStatus};

#[derive(Deserialize, ToSchema)]
pub struct CreatePayroll {
    #[schema(example = 1)]
    pub site_id: u64,

    #[schema(example = 3)]
    pub month: u32,

    #[schema(example = 2025)]
    pub year: i32,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct PayrollQuery {
    #[schema(example = 1)]
    pub site_id: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateStatus {
    pub status: PayrollStatus,
}

#[derive(Deserialize, ToSchema)]
pub struct AddField {
    #[schema(example = 12)]
    pub field_id: u64,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct ReconcileQuery {
    /// Overwrite the stored aggregates with the recomputed ones (Admin).
    pub repair: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/api/payroll",
    request_body = CreatePayroll,
    responses(
        (status = 201, description = "Payroll run built", body = BuildOutcome),
        (status = 400, description = "Invalid pay period"),
        (status = 403),
        (status = 409, description = "A run already exists for this site and month")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn create_payroll(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<CreatePayroll>,
) -> actix_web::Result<impl Responder> {
    let outcome = builder::build_run(
        &auth.context(),
        state.store.as_ref(),
        state.attendance.as_ref(),
        payload.site_id,
        payload.month,
        payload.year,
    )
    .await?;

    Ok(HttpResponse::Created().json(outcome))
}

#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollQuery),
    responses(
        (status = 200, body = [PayrollRun]),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<PayrollQuery>,
) -> actix_web::Result<impl Responder> {
    let runs = lifecycle::list_runs(&auth.context(), state.store.as_ref(), query.site_id).await?;
    Ok(HttpResponse::Ok().json(runs))
}

#[utoipa::path(
    get,
    path = "/api/payroll/{payroll_id}",
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, body = RunDetail),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let detail = lifecycle::get_run(&auth.context(), state.store.as_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[utoipa::path(
    delete,
    path = "/api/payroll/{payroll_id}",
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll deleted", body = MessageResponse),
        (status = 403, description = "Admin only"),
        (status = 404),
        (status = 409, description = "Payroll is approved")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn delete_payroll(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    lifecycle::delete_run(&auth.context(), state.store.as_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Payroll deleted successfully".to_string(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/payroll/{payroll_id}/status",
    request_body = UpdateStatus,
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, body = PayrollRun),
        (status = 403, description = "Approval is Admin only"),
        (status = 409, description = "Transition not allowed")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_status(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<UpdateStatus>,
) -> actix_web::Result<impl Responder> {
    let run = lifecycle::transition_status(
        &auth.context(),
        state.store.as_ref(),
        path.into_inner(),
        body.status,
    )
    .await?;
    Ok(HttpResponse::Ok().json(run))
}

#[utoipa::path(
    post,
    path = "/api/payroll/{payroll_id}/fields",
    request_body = AddField,
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Field added to every entry", body = PayrollRun),
        (status = 404),
        (status = 409, description = "Payroll is approved")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn add_field(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<AddField>,
) -> actix_web::Result<impl Responder> {
    let run = totals::add_field_to_run(
        &auth.context(),
        state.store.as_ref(),
        path.into_inner(),
        body.field_id,
    )
    .await?;
    Ok(HttpResponse::Ok().json(run))
}

#[utoipa::path(
    get,
    path = "/api/payroll/{payroll_id}/reconcile",
    params(
        ("payroll_id", description = "Payroll ID"),
        ReconcileQuery
    ),
    responses(
        (status = 200, body = Reconciliation),
        (status = 409, description = "Stored total diverges from the field values")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn reconcile_payroll(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    query: web::Query<ReconcileQuery>,
) -> actix_web::Result<impl Responder> {
    let report = totals::reconcile_run(
        &auth.context(),
        state.store.as_ref(),
        path.into_inner(),
        query.repair.unwrap_or(false),
    )
    .await?;
    Ok(HttpResponse::Ok().json(report))
}
