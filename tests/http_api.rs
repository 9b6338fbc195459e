mod common;

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::web::Data;
use actix_web::{App, test};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

use payroll_engine::api::AppState;
use payroll_engine::auth::jwt::{TokenSubject, generate_access_token};
use payroll_engine::config::Config;
use payroll_engine::model::role::Role;
use payroll_engine::routes;
use payroll_engine::store::memory::MemoryStore;

use common::*;

const SECRET: &str = "test-secret";

fn token(role: Role, employee_id: Option<u64>) -> String {
    generate_access_token(
        TokenSubject {
            user_id: 900 + role.id() as u64,
            username: format!("{:?}", role).to_lowercase(),
            role: role.id(),
            company_id: COMPANY,
            employee_id,
        },
        SECRET,
        3600,
    )
    .unwrap()
}

macro_rules! app {
    ($store:expr) => {{
        let config = Config::for_tests(SECRET);
        let state = AppState::new(Arc::new($store), Arc::new(attendance()));
        test::init_service(
            App::new()
                .app_data(Data::new(state))
                .app_data(Data::new(config.clone()))
                .configure(|cfg| routes::configure(cfg, config.clone())),
        )
        .await
    }};
}

fn request(method: test::TestRequest, uri: &str, bearer: &str) -> test::TestRequest {
    method
        .uri(uri)
        .peer_addr("127.0.0.1:40000".parse().unwrap())
        .insert_header(("Authorization", format!("Bearer {}", bearer)))
}

fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

#[actix_web::test]
async fn missing_token_is_unauthorized() {
    let app = app!(MemoryStore::new());
    let req = test::TestRequest::get()
        .uri("/api/payroll")
        .peer_addr("127.0.0.1:40000".parse().unwrap())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = request(test::TestRequest::get(), "/api/payroll", "not-a-jwt").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn build_edit_and_reconcile_over_http() {
    let store = MemoryStore::new();
    let seeded = store.with_state(|s| seed_basic_site(s, 3)).await;
    let app = app!(store.clone());
    let hr = token(Role::Hr, None);

    let req = request(test::TestRequest::post(), "/api/payroll", &hr)
        .set_json(json!({ "site_id": SITE, "month": 3, "year": 2025 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(decimal(&body["run"]["total_net_amount"]), dec!(2640));
    let payroll_id = body["run"]["id"].as_u64().unwrap();

    let req = request(test::TestRequest::post(), "/api/payroll", &hr)
        .set_json(json!({ "site_id": SITE, "month": 3, "year": 2025 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let value = value_id(&store, payroll_id, seeded.employees[0], "basic").await.unwrap();
    let req = request(test::TestRequest::put(), &format!("/api/field-value/{}", value), &hr)
        .set_json(json!({ "amount": "1200" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(decimal(&body["total_net_amount"]), dec!(2840));

    let req = request(
        test::TestRequest::get(),
        &format!("/api/payroll/{}/reconcile", payroll_id),
        &hr,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["repaired"], json!(false));

    let req = request(test::TestRequest::get(), &format!("/api/payroll/{}", payroll_id), &hr)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["entries"].as_array().unwrap().len(), 3);
}

#[actix_web::test]
async fn approval_needs_admin() {
    let store = MemoryStore::new();
    store.with_state(|s| seed_basic_site(s, 1)).await;
    let app = app!(store);
    let hr = token(Role::Hr, None);
    let admin = token(Role::Admin, None);

    let req = request(test::TestRequest::post(), "/api/payroll", &hr)
        .set_json(json!({ "site_id": SITE, "month": 5, "year": 2025 }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let status_uri = format!("/api/payroll/{}/status", body["run"]["id"].as_u64().unwrap());

    let req = request(test::TestRequest::put(), &status_uri, &hr)
        .set_json(json!({ "status": "pending" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = request(test::TestRequest::put(), &status_uri, &hr)
        .set_json(json!({ "status": "approved" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("permission denied"));

    let req = request(test::TestRequest::put(), &status_uri, &admin)
        .set_json(json!({ "status": "approved" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], json!("approved"));
}

#[actix_web::test]
async fn employees_are_kept_out_of_payroll_reads() {
    let app = app!(MemoryStore::new());
    let employee = token(Role::Employee, Some(7));

    let req = request(test::TestRequest::get(), "/api/payroll", &employee).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn exit_is_visible_to_its_employee_only() {
    let app = app!(MemoryStore::new());
    let hr = token(Role::Hr, None);

    let req = request(test::TestRequest::post(), "/api/exit", &hr)
        .set_json(json!({
            "employee_id": 42,
            "exit_date": "2025-03-31",
            "bonus": "5000",
            "leave_encashment": "2000",
            "gratuity": "10000",
            "deduction": "1500"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(decimal(&body["net_pay"]), dec!(15500));
    let uri = format!("/api/exit/{}", body["id"].as_u64().unwrap());

    let own = token(Role::Employee, Some(42));
    let req = request(test::TestRequest::get(), &uri, &own).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let other = token(Role::Employee, Some(43));
    let req = request(test::TestRequest::get(), &uri, &other).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = request(test::TestRequest::put(), &uri, &hr)
        .set_json(json!({ "deduction": "500" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(decimal(&body["net_pay"]), dec!(16500));
}

#[actix_web::test]
async fn exit_preview_computes_without_storing() {
    let store = MemoryStore::new();
    let app = app!(store);
    let hr = token(Role::Hr, None);

    let req = request(test::TestRequest::post(), "/api/exit/preview", &hr)
        .set_json(json!({
            "bonus": "5000",
            "deduction": "1500",
            "last_monthly_basic": "26000",
            "completed_years": 5,
            "unused_leave_days": "10"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(decimal(&body["gratuity"]), dec!(75000));
    assert_eq!(decimal(&body["net_pay"]), dec!(88500));
}

#[actix_web::test]
async fn statutory_rules_are_upserted_by_kind() {
    let app = app!(MemoryStore::new());
    let hr = token(Role::Hr, None);

    let req = request(test::TestRequest::put(), "/api/statutory/gst", &hr)
        .set_json(json!({
            "value_kind": "percentage",
            "employee_contribution": "0.12",
            "deduction_cycle": "monthly"
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    for contribution in ["0.12", "0.10"] {
        let req = request(test::TestRequest::put(), "/api/statutory/epf", &hr)
            .set_json(json!({
                "value_kind": "percentage",
                "employee_contribution": contribution,
                "employer_contribution": "0.12",
                "deduction_cycle": "monthly",
                "wage_ceiling": "15000"
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    let req = request(test::TestRequest::get(), "/api/statutory", &hr).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let rules = body.as_array().unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0]["kind"], json!("epf"));
    assert_eq!(decimal(&rules[0]["employee_contribution"]), dec!(0.10));
}
