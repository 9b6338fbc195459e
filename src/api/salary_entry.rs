use actix_web::{HttpResponse, Responder, web};

use crate::api::AppState;
use crate::auth::auth::AuthUser;
use crate::engine::totals;
use crate::model::payroll::PayrollRun;

#[utoipa::path(
    delete,
    path = "/api/salary-entry/{entry_id}",
    params(
        ("entry_id", description = "Salary entry ID")
    ),
    responses(
        (status = 200, description = "Entry removed, run total adjusted", body = PayrollRun),
        (status = 404),
        (status = 409, description = "Payroll is approved")
    ),
    security(("bearer_auth" = [])),
    tag = "Salary Entry"
)]
pub async fn delete_salary_entry(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let run =
        totals::delete_salary_entry(&auth.context(), state.store.as_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(run))
}
