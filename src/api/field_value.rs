use actix_web::{HttpResponse, Responder, web};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::api::AppState;
use crate::auth::auth::AuthUser;
use crate::engine::totals;
use crate::model::payroll::PayrollRun;

#[derive(Deserialize, ToSchema)]
pub struct EditFieldValue {
    #[schema(example = "1500.00")]
    pub amount: Decimal,
}

#[utoipa::path(
    put,
    path = "/api/field-value/{value_id}",
    request_body = EditFieldValue,
    params(
        ("value_id", description = "Salary field value ID")
    ),
    responses(
        (status = 200, description = "Value edited, run total adjusted by the delta", body = PayrollRun),
        (status = 400, description = "Negative amount"),
        (status = 404),
        (status = 409, description = "Payroll is approved")
    ),
    security(("bearer_auth" = [])),
    tag = "Field Value"
)]
pub async fn update_field_value(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<EditFieldValue>,
) -> actix_web::Result<impl Responder> {
    let run = totals::apply_field_value_edit(
        &auth.context(),
        state.store.as_ref(),
        path.into_inner(),
        body.amount,
    )
    .await?;
    Ok(HttpResponse::Ok().json(run))
}

#[utoipa::path(
    delete,
    path = "/api/field-value/{value_id}",
    params(
        ("value_id", description = "Salary field value ID")
    ),
    responses(
        (status = 200, description = "Value removed, run total adjusted", body = PayrollRun),
        (status = 404),
        (status = 409, description = "Payroll is approved")
    ),
    security(("bearer_auth" = [])),
    tag = "Field Value"
)]
pub async fn delete_field_value(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let run =
        totals::remove_field_value(&auth.context(), state.store.as_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(run))
}
