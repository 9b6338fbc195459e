use crate::{
    api::{exit, field_value, payroll, salary_entry, statutory},
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use tracing::warn;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = if requests_per_min == 0 {
        warn!("RATE_PROTECTED_PER_MIN is 0, falling back to 1 request per minute");
        1
    } else {
        requests_per_min
    };
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    // period and burst are both non-zero here
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let protected_limiter = build_limiter(config.rate_protected_per_min);

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/payroll")
                    // /payroll
                    .service(
                        web::resource("")
                            .route(web::post().to(payroll::create_payroll))
                            .route(web::get().to(payroll::list_payrolls)),
                    )
                    // /payroll/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(payroll::get_payroll))
                            .route(web::delete().to(payroll::delete_payroll)),
                    )
                    // /payroll/{id}/status
                    .service(
                        web::resource("/{id}/status").route(web::put().to(payroll::update_status)),
                    )
                    // /payroll/{id}/fields
                    .service(web::resource("/{id}/fields").route(web::post().to(payroll::add_field)))
                    // /payroll/{id}/reconcile
                    .service(
                        web::resource("/{id}/reconcile")
                            .route(web::get().to(payroll::reconcile_payroll)),
                    ),
            )
            .service(
                web::resource("/salary-entry/{id}")
                    .route(web::delete().to(salary_entry::delete_salary_entry)),
            )
            .service(
                web::resource("/field-value/{id}")
                    .route(web::put().to(field_value::update_field_value))
                    .route(web::delete().to(field_value::delete_field_value)),
            )
            .service(
                web::scope("/statutory")
                    .service(web::resource("").route(web::get().to(statutory::list_rules)))
                    .service(web::resource("/{kind}").route(web::put().to(statutory::upsert_rule))),
            )
            .service(
                web::scope("/exit")
                    .service(web::resource("").route(web::post().to(exit::create_exit)))
                    .service(web::resource("/preview").route(web::post().to(exit::preview_exit)))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(exit::get_exit))
                            .route(web::put().to(exit::update_exit)),
                    ),
            ),
    );
}
