use std::str::FromStr;

use actix_web::{HttpResponse, Responder, web};

use crate::api::AppState;
use crate::auth::auth::AuthUser;
use crate::engine::error::PayrollError;
use crate::engine::statutory;
use crate::model::statutory::{NewStatutoryRule, StatutoryKind, StatutoryRule};

#[utoipa::path(
    get,
    path = "/api/statutory",
    responses(
        (status = 200, body = [StatutoryRule]),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Statutory"
)]
pub async fn list_rules(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> actix_web::Result<impl Responder> {
    let rules = statutory::list_rules(&auth.context(), state.store.as_ref()).await?;
    Ok(HttpResponse::Ok().json(rules))
}

#[utoipa::path(
    put,
    path = "/api/statutory/{kind}",
    request_body = NewStatutoryRule,
    params(
        ("kind", description = "epf, esi, pt, lwf or statutory_bonus")
    ),
    responses(
        (status = 200, description = "Rule saved", body = StatutoryRule),
        (status = 400, description = "Unknown kind or invalid contribution")
    ),
    security(("bearer_auth" = [])),
    tag = "Statutory"
)]
pub async fn upsert_rule(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<NewStatutoryRule>,
) -> actix_web::Result<impl Responder> {
    let raw = path.into_inner();
    let kind = StatutoryKind::from_str(&raw)
        .map_err(|_| PayrollError::Validation(format!("unknown statutory kind '{}'", raw)))?;

    let rule = statutory::upsert_rule(&auth.context(), state.store.as_ref(), kind, &body).await?;
    Ok(HttpResponse::Ok().json(rule))
}
