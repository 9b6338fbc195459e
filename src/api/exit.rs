use actix_web::{HttpResponse, Responder, web};

use crate::api::AppState;
use crate::auth::auth::AuthUser;
use crate::engine::exit::{self, SettlementInputs, SettlementPreview};
use crate::model::exit::{ExitPatch, ExitRecord, NewExit};

#[utoipa::path(
    post,
    path = "/api/exit",
    request_body = NewExit,
    responses(
        (status = 201, description = "Settlement recorded", body = ExitRecord),
        (status = 400, description = "Negative component"),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Exit"
)]
pub async fn create_exit(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<NewExit>,
) -> actix_web::Result<impl Responder> {
    let record = exit::create_exit(&auth.context(), state.store.as_ref(), &payload).await?;
    Ok(HttpResponse::Created().json(record))
}

#[utoipa::path(
    put,
    path = "/api/exit/{exit_id}",
    request_body = ExitPatch,
    params(
        ("exit_id", description = "Exit ID")
    ),
    responses(
        (status = 200, description = "Settlement updated, net pay recomputed", body = ExitRecord),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Exit"
)]
pub async fn update_exit(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<ExitPatch>,
) -> actix_web::Result<impl Responder> {
    let record =
        exit::update_exit(&auth.context(), state.store.as_ref(), path.into_inner(), &body).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    get,
    path = "/api/exit/{exit_id}",
    params(
        ("exit_id", description = "Exit ID")
    ),
    responses(
        (status = 200, body = ExitRecord),
        (status = 403, description = "Employees may only read their own settlement"),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Exit"
)]
pub async fn get_exit(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let record = exit::get_exit(
        &auth.context(),
        state.store.as_ref(),
        path.into_inner(),
        auth.employee_id,
    )
    .await?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    post,
    path = "/api/exit/preview",
    request_body = SettlementInputs,
    responses(
        (status = 200, body = SettlementPreview),
        (status = 400)
    ),
    security(("bearer_auth" = [])),
    tag = "Exit"
)]
pub async fn preview_exit(
    auth: AuthUser,
    body: web::Json<SettlementInputs>,
) -> actix_web::Result<impl Responder> {
    let preview = exit::preview_settlement(&auth.context(), &body)?;
    Ok(HttpResponse::Ok().json(preview))
}
