mod common;

use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use payroll_engine::engine::{
    add_field_to_run, apply_field_value_edit, build_run, compute_net_pay, create_exit,
    delete_run, delete_salary_entry, reconcile_run, remove_field_value, transition_status,
    PayrollError,
};
use payroll_engine::model::attendance::AttendanceSummary;
use payroll_engine::model::exit::NewExit;
use payroll_engine::model::payment_field::{CalculationBasis, FieldRef, FieldType};
use payroll_engine::model::payment_template::TemplateAssignment;
use payroll_engine::model::payroll::PayrollStatus;
use payroll_engine::model::statutory::{DeductionCycle, StatutoryKind, ValueKind};
use payroll_engine::store::memory::MemoryStore;

use common::*;

async fn assert_consistent(store: &MemoryStore, payroll_id: u64) {
    assert_eq!(stored_total(store, payroll_id).await, live_total(store, payroll_id).await);
    reconcile_run(&hr(), store, payroll_id, false)
        .await
        .expect("run reconciles");
}

#[actix_web::test]
async fn three_employees_basic_minus_pf() {
    let store = MemoryStore::new();
    store.with_state(|s| seed_basic_site(s, 3)).await;

    let outcome = build_run(&hr(), &store, &attendance(), SITE, 3, 2025).await.unwrap();

    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.run.total_employees, 3);
    assert_eq!(outcome.run.total_net_amount, dec!(2640));
    assert_eq!(outcome.run.status, PayrollStatus::Draft);
    assert_consistent(&store, outcome.run.id).await;
}

#[actix_web::test]
async fn edit_then_add_field_keeps_total_in_step() {
    let store = MemoryStore::new();
    let seeded = store.with_state(|s| seed_basic_site(s, 3)).await;
    let run = build_run(&hr(), &store, &attendance(), SITE, 3, 2025).await.unwrap().run;

    let basic = value_id(&store, run.id, seeded.employees[0], "basic").await.unwrap();
    let edited = apply_field_value_edit(&hr(), &store, basic, dec!(1200)).await.unwrap();
    assert_eq!(edited.total_net_amount, dec!(2840));

    let bonus = store
        .with_state(|s| s.insert_field(fixed("bonus", FieldType::Earning, dec!(500))))
        .await;
    let added = add_field_to_run(&hr(), &store, run.id, bonus).await.unwrap();
    assert_eq!(added.total_net_amount, dec!(4340));
    assert_consistent(&store, run.id).await;

    let again = add_field_to_run(&hr(), &store, run.id, bonus).await.unwrap_err();
    assert!(matches!(again, PayrollError::Validation(_)));
    assert_eq!(stored_total(&store, run.id).await, dec!(4340));
}

#[actix_web::test]
async fn deduction_edit_moves_total_the_other_way() {
    let store = MemoryStore::new();
    let seeded = store.with_state(|s| seed_basic_site(s, 2)).await;
    let run = build_run(&hr(), &store, &attendance(), SITE, 4, 2025).await.unwrap().run;

    let pf = value_id(&store, run.id, seeded.employees[1], "pf").await.unwrap();
    let edited = apply_field_value_edit(&hr(), &store, pf, dec!(200)).await.unwrap();
    // 1760 + (120 - 200)
    assert_eq!(edited.total_net_amount, dec!(1680));

    let removed = remove_field_value(&hr(), &store, pf).await.unwrap();
    assert_eq!(removed.total_net_amount, dec!(1880));
    assert_consistent(&store, run.id).await;
}

#[actix_web::test]
async fn negative_amount_is_rejected_without_touching_total() {
    let store = MemoryStore::new();
    let seeded = store.with_state(|s| seed_basic_site(s, 1)).await;
    let run = build_run(&hr(), &store, &attendance(), SITE, 3, 2025).await.unwrap().run;

    let basic = value_id(&store, run.id, seeded.employees[0], "basic").await.unwrap();
    let err = apply_field_value_edit(&hr(), &store, basic, dec!(-1)).await.unwrap_err();
    assert!(matches!(err, PayrollError::Validation(_)));
    assert_eq!(stored_total(&store, run.id).await, dec!(880));
}

#[actix_web::test]
async fn concurrent_edits_all_land() {
    let store = MemoryStore::new();
    let seeded = store.with_state(|s| seed_basic_site(s, 3)).await;
    let run = build_run(&hr(), &store, &attendance(), SITE, 3, 2025).await.unwrap().run;

    let mut ids = Vec::new();
    for employee_id in &seeded.employees {
        ids.push(value_id(&store, run.id, *employee_id, "basic").await.unwrap());
    }

    let ctx = hr();
    let results = join_all(
        ids.iter()
            .map(|id| apply_field_value_edit(&ctx, &store, *id, dec!(1100))),
    )
    .await;
    assert!(results.iter().all(Result::is_ok));

    assert_eq!(stored_total(&store, run.id).await, dec!(2940));
    assert_consistent(&store, run.id).await;
}

#[actix_web::test]
async fn one_bad_template_does_not_sink_the_run() {
    let store = MemoryStore::new();
    let broken = store
        .with_state(|s| {
            let seeded = seed_basic_site(s, 10);
            let broken = seeded.employees[4];
            s.insert_template(employee_template(broken, assign(&[seeded.basic, 9_999])));
            broken
        })
        .await;

    let outcome = build_run(&hr(), &store, &attendance(), SITE, 3, 2025).await.unwrap();

    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].employee_id, broken);
    assert_eq!(outcome.run.total_employees, 9);
    assert_eq!(outcome.run.total_net_amount, dec!(7920));
    assert!(entry_id(&store, outcome.run.id, broken).await.is_none());
    assert_consistent(&store, outcome.run.id).await;
}

#[actix_web::test]
async fn circular_percentage_bases_fail_that_employee_only() {
    let store = MemoryStore::new();
    let looped = store
        .with_state(|s| {
            let seeded = seed_basic_site(s, 2);
            let a = s.insert_field(derived(
                "hra",
                FieldType::Earning,
                CalculationBasis::PercentageOf {
                    base: FieldRef::Field("conveyance".into()),
                    percentage: dec!(0.1),
                },
            ));
            let b = s.insert_field(derived(
                "conveyance",
                FieldType::Earning,
                CalculationBasis::PercentageOf {
                    base: FieldRef::Field("hra".into()),
                    percentage: dec!(0.1),
                },
            ));
            let looped = seeded.employees[1];
            s.insert_template(employee_template(looped, assign(&[seeded.basic, a, b])));
            looped
        })
        .await;

    let outcome = build_run(&hr(), &store, &attendance(), SITE, 3, 2025).await.unwrap();
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].employee_id, looped);
    assert!(outcome.failures[0].reason.contains("circular"));
    assert_eq!(outcome.run.total_net_amount, dec!(880));
}

#[actix_web::test]
async fn second_build_for_same_month_is_rejected() {
    let store = MemoryStore::new();
    store.with_state(|s| seed_basic_site(s, 2)).await;
    let first = build_run(&hr(), &store, &attendance(), SITE, 3, 2025).await.unwrap();

    let err = build_run(&hr(), &store, &attendance(), SITE, 3, 2025).await.unwrap_err();
    assert!(matches!(err, PayrollError::DuplicateRun { month: 3, year: 2025, .. }));
    assert_eq!(stored_total(&store, first.run.id).await, dec!(1760));
}

#[actix_web::test]
async fn invalid_period_is_rejected() {
    let store = MemoryStore::new();
    let err = build_run(&hr(), &store, &attendance(), SITE, 13, 2025).await.unwrap_err();
    assert!(matches!(err, PayrollError::Validation(_)));
}

#[actix_web::test]
async fn deleting_an_entry_retracts_it_once() {
    let store = MemoryStore::new();
    let seeded = store.with_state(|s| seed_basic_site(s, 3)).await;
    let run = build_run(&hr(), &store, &attendance(), SITE, 3, 2025).await.unwrap().run;
    let entry = entry_id(&store, run.id, seeded.employees[2]).await.unwrap();

    let after = delete_salary_entry(&hr(), &store, entry).await.unwrap();
    assert_eq!(after.total_net_amount, dec!(1760));
    assert_eq!(after.total_employees, 2);

    let err = delete_salary_entry(&hr(), &store, entry).await.unwrap_err();
    assert!(matches!(err, PayrollError::NotFound { .. }));
    assert_eq!(stored_total(&store, run.id).await, dec!(1760));
    assert_consistent(&store, run.id).await;
}

#[actix_web::test]
async fn reconcile_reports_and_repairs_drift() {
    let store = MemoryStore::new();
    store.with_state(|s| seed_basic_site(s, 3)).await;
    let run = build_run(&hr(), &store, &attendance(), SITE, 3, 2025).await.unwrap().run;

    store
        .with_state(|s| {
            if let Some(run) = s.run_mut(run.id) {
                run.total_net_amount += dec!(5);
            }
        })
        .await;

    let err = reconcile_run(&hr(), &store, run.id, false).await.unwrap_err();
    assert!(matches!(
        err,
        PayrollError::Consistency { stored, computed, .. } if stored == dec!(2645) && computed == dec!(2640)
    ));

    let denied = reconcile_run(&hr(), &store, run.id, true).await.unwrap_err();
    assert!(matches!(denied, PayrollError::Permission(_)));

    let report = reconcile_run(&admin(), &store, run.id, true).await.unwrap();
    assert!(report.repaired);
    assert_eq!(report.drift, dec!(5));
    assert_eq!(stored_total(&store, run.id).await, dec!(2640));
    assert_consistent(&store, run.id).await;
}

#[actix_web::test]
async fn approved_run_is_locked() {
    let store = MemoryStore::new();
    let seeded = store.with_state(|s| seed_basic_site(s, 2)).await;
    let run = build_run(&hr(), &store, &attendance(), SITE, 3, 2025).await.unwrap().run;

    let err = transition_status(&hr(), &store, run.id, PayrollStatus::Approved).await.unwrap_err();
    assert!(matches!(err, PayrollError::InvalidTransition { .. } | PayrollError::Permission(_)));

    transition_status(&hr(), &store, run.id, PayrollStatus::Pending).await.unwrap();
    let err = transition_status(&hr(), &store, run.id, PayrollStatus::Approved).await.unwrap_err();
    assert!(matches!(err, PayrollError::Permission(_)));
    let approved = transition_status(&admin(), &store, run.id, PayrollStatus::Approved).await.unwrap();
    assert_eq!(approved.status, PayrollStatus::Approved);

    let basic = value_id(&store, run.id, seeded.employees[0], "basic").await.unwrap();
    let err = apply_field_value_edit(&hr(), &store, basic, dec!(5)).await.unwrap_err();
    assert!(matches!(err, PayrollError::RunLocked(id) if id == run.id));
    let err = delete_run(&admin(), &store, run.id).await.unwrap_err();
    assert!(matches!(err, PayrollError::RunLocked(_)));
    let err = transition_status(&admin(), &store, run.id, PayrollStatus::Draft).await.unwrap_err();
    assert!(matches!(err, PayrollError::InvalidTransition { .. }));

    assert_eq!(stored_total(&store, run.id).await, dec!(1760));
}

#[actix_web::test]
async fn employees_cannot_touch_payroll() {
    let store = MemoryStore::new();
    store.with_state(|s| seed_basic_site(s, 1)).await;
    let ctx = payroll_engine::engine::PayrollContext::new(
        COMPANY,
        77,
        payroll_engine::model::role::Role::Employee,
    );
    let err = build_run(&ctx, &store, &attendance(), SITE, 3, 2025).await.unwrap_err();
    assert!(matches!(err, PayrollError::Permission(_)));
}

#[actix_web::test]
async fn esi_is_skipped_above_its_ceiling() {
    let store = MemoryStore::new();
    let (low, high) = store
        .with_state(|s| {
            let basic = s.insert_field(fixed("basic", FieldType::Earning, dec!(15000)));
            let esi = s.insert_field(statutory_field(
                "esi",
                FieldType::Deduction,
                StatutoryKind::Esi,
                FieldRef::Gross,
            ));
            let mut esi_rule = rule(StatutoryKind::Esi, ValueKind::Percentage, dec!(0.0075), DeductionCycle::Monthly);
            esi_rule.employer_contribution = dec!(0.0325);
            esi_rule.wage_ceiling = Some(dec!(21000));
            s.insert_rule(esi_rule);
            s.insert_template(site_template(SITE, assign(&[basic, esi])));

            let low = s.insert_employee(employee(SITE, "LOW"));
            let high = s.insert_employee(employee(SITE, "HIGH"));
            s.insert_template(employee_template(
                high,
                vec![
                    TemplateAssignment {
                        field_id: basic,
                        position: 0,
                        amount_override: Some(dec!(30000)),
                        percentage_override: None,
                    },
                    TemplateAssignment {
                        field_id: esi,
                        position: 1,
                        amount_override: None,
                        percentage_override: None,
                    },
                ],
            ));
            (low, high)
        })
        .await;

    let outcome = build_run(&hr(), &store, &attendance(), SITE, 3, 2025).await.unwrap();
    let run = outcome.run;
    // employer share only for the employee under the ceiling: 15000 * 0.0325
    assert_eq!(outcome.employer_contributions, dec!(487.50));

    let low_esi = value_id(&store, run.id, low, "esi").await;
    assert!(low_esi.is_some());
    assert!(value_id(&store, run.id, high, "esi").await.is_none());
    // 15000 - 112.50 + 30000
    assert_eq!(run.total_net_amount, dec!(44887.50));
    assert_consistent(&store, run.id).await;
}

#[actix_web::test]
async fn statutory_bonus_only_in_payout_month() {
    let store = MemoryStore::new();
    let worker = store
        .with_state(|s| {
            let basic = s.insert_field(fixed("basic", FieldType::Earning, dec!(1000)));
            let bonus = s.insert_field(statutory_field(
                "statutory_bonus",
                FieldType::Earning,
                StatutoryKind::StatutoryBonus,
                FieldRef::Field("basic".into()),
            ));
            let mut bonus_rule = rule(
                StatutoryKind::StatutoryBonus,
                ValueKind::Percentage,
                dec!(0.0833),
                DeductionCycle::Monthly,
            );
            bonus_rule.payout_month = Some(3);
            s.insert_rule(bonus_rule);
            s.insert_template(site_template(SITE, assign(&[basic, bonus])));
            s.insert_employee(employee(SITE, "EMP-001"))
        })
        .await;

    let february = build_run(&hr(), &store, &attendance(), SITE, 2, 2025).await.unwrap().run;
    assert!(value_id(&store, february.id, worker, "statutory_bonus").await.is_none());
    assert_eq!(february.total_net_amount, dec!(1000));

    let march = build_run(&hr(), &store, &attendance(), SITE, 3, 2025).await.unwrap().run;
    assert!(value_id(&store, march.id, worker, "statutory_bonus").await.is_some());
    assert_eq!(march.total_net_amount, dec!(1083.30));
}

#[actix_web::test]
async fn yearly_rule_charges_once_per_calendar_year() {
    let store = MemoryStore::new();
    let seeded = store
        .with_state(|s| {
            let seeded = seed_basic_site(s, 2);
            let pt = s.insert_field(statutory_field(
                "pt",
                FieldType::Deduction,
                StatutoryKind::Pt,
                FieldRef::Gross,
            ));
            s.insert_rule(rule(StatutoryKind::Pt, ValueKind::Fixed, dec!(200), DeductionCycle::Yearly));
            if let Some(template) = s.template_mut(seeded.template) {
                template.assignments = assign(&[seeded.basic, seeded.pf, pt]);
            }
            seeded
        })
        .await;
    let first = seeded.employees[0];

    let january = build_run(&hr(), &store, &attendance(), SITE, 1, 2025).await.unwrap().run;
    assert_eq!(january.total_net_amount, dec!(1360));

    let february = build_run(&hr(), &store, &attendance(), SITE, 2, 2025).await.unwrap().run;
    assert_eq!(february.total_net_amount, dec!(1760));
    assert_eq!(store.with_state(|s| s.applications().len()).await, 2);

    // dropping the January entry releases that employee's charge for the year
    let entry = entry_id(&store, january.id, first).await.unwrap();
    delete_salary_entry(&hr(), &store, entry).await.unwrap();
    assert_eq!(store.with_state(|s| s.applications().len()).await, 1);

    let march = build_run(&hr(), &store, &attendance(), SITE, 3, 2025).await.unwrap().run;
    assert!(value_id(&store, march.id, first, "pt").await.is_some());
    assert!(value_id(&store, march.id, seeded.employees[1], "pt").await.is_none());
    assert_eq!(march.total_net_amount, dec!(1560));

    let next_year = build_run(&hr(), &store, &attendance(), SITE, 1, 2026).await.unwrap().run;
    assert_eq!(next_year.total_net_amount, dec!(1360));
}

#[actix_web::test]
async fn repeated_yearly_kind_in_one_template_charges_once() {
    let store = MemoryStore::new();
    let seeded = store
        .with_state(|s| {
            let seeded = seed_basic_site(s, 3);
            let lwf = s.insert_field(statutory_field("lwf", FieldType::Deduction, StatutoryKind::Lwf, FieldRef::Gross));
            let arrears = s.insert_field(statutory_field(
                "lwf_arrears",
                FieldType::Deduction,
                StatutoryKind::Lwf,
                FieldRef::Gross,
            ));
            s.insert_rule(rule(StatutoryKind::Lwf, ValueKind::Fixed, dec!(25), DeductionCycle::Yearly));
            s.insert_template(employee_template(
                seeded.employees[2],
                assign(&[seeded.basic, lwf, arrears]),
            ));
            seeded
        })
        .await;
    let odd_one = seeded.employees[2];

    let outcome = build_run(&hr(), &store, &attendance(), SITE, 4, 2025).await.unwrap();
    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.run.total_employees, 3);
    // 880 + 880 + (1000 - 25)
    assert_eq!(outcome.run.total_net_amount, dec!(2735));

    let run = outcome.run.id;
    assert!(value_id(&store, run, odd_one, "lwf").await.is_some());
    assert!(value_id(&store, run, odd_one, "lwf_arrears").await.is_none());
    let applications = store.with_state(|s| s.applications().len()).await;
    assert_eq!(applications, 1);
    assert_consistent(&store, run).await;
}

#[actix_web::test]
async fn added_yearly_field_skips_employees_already_charged() {
    let store = MemoryStore::new();
    let (seeded, pt) = store
        .with_state(|s| {
            let seeded = seed_basic_site(s, 2);
            let mut pt = statutory_field("pt", FieldType::Deduction, StatutoryKind::Pt, FieldRef::Gross);
            pt.default_amount = Some(dec!(200));
            let pt = s.insert_field(pt);
            s.insert_rule(rule(StatutoryKind::Pt, ValueKind::Fixed, dec!(200), DeductionCycle::Yearly));
            if let Some(template) = s.template_mut(seeded.template) {
                template.assignments = assign(&[seeded.basic, seeded.pf, pt]);
            }
            (seeded, pt)
        })
        .await;
    let (charged, released) = (seeded.employees[0], seeded.employees[1]);

    let january = build_run(&hr(), &store, &attendance(), SITE, 1, 2025).await.unwrap().run;
    assert_eq!(january.total_net_amount, dec!(1360));
    let entry = entry_id(&store, january.id, released).await.unwrap();
    delete_salary_entry(&hr(), &store, entry).await.unwrap();
    assert_eq!(store.with_state(|s| s.applications().len()).await, 1);

    store
        .with_state(|s| {
            if let Some(template) = s.template_mut(seeded.template) {
                template.assignments = assign(&[seeded.basic, seeded.pf]);
            }
        })
        .await;
    let february = build_run(&hr(), &store, &attendance(), SITE, 2, 2025).await.unwrap().run;
    assert_eq!(february.total_net_amount, dec!(1760));

    let february = add_field_to_run(&hr(), &store, february.id, pt).await.unwrap();
    // only the employee without a 2025 charge pays
    assert_eq!(february.total_net_amount, dec!(1560));
    assert!(value_id(&store, february.id, charged, "pt").await.is_none());
    assert!(value_id(&store, february.id, released, "pt").await.is_some());
    assert_eq!(store.with_state(|s| s.applications().len()).await, 2);
    assert_consistent(&store, february.id).await;

    store
        .with_state(|s| {
            if let Some(template) = s.template_mut(seeded.template) {
                template.assignments = assign(&[seeded.basic, seeded.pf, pt]);
            }
        })
        .await;
    let march = build_run(&hr(), &store, &attendance(), SITE, 3, 2025).await.unwrap().run;
    assert_eq!(march.total_net_amount, dec!(1760));
}

#[actix_web::test]
async fn prorated_basic_and_overtime_follow_attendance() {
    let store = MemoryStore::new();
    let attendance = attendance();
    let worker = store
        .with_state(|s| {
            let mut basic = fixed("basic", FieldType::Earning, dec!(3100));
            basic.calculation_basis = CalculationBasis::Fixed { prorate: true };
            let basic = s.insert_field(basic);
            let overtime = s.insert_field(derived(
                "overtime",
                FieldType::Earning,
                CalculationBasis::PerOvertimeHour { rate: dec!(150) },
            ));
            s.insert_template(site_template(SITE, assign(&[basic, overtime])));
            s.insert_employee(employee(SITE, "EMP-001"))
        })
        .await;
    attendance
        .set(
            worker,
            AttendanceSummary {
                present_days: dec!(15.5),
                overtime_hours: dec!(4.5),
            },
        )
        .await;

    let run = build_run(&hr(), &store, &attendance, SITE, 3, 2025).await.unwrap().run;
    // 3100 * 15.5 / 31 + 150 * 4.5
    assert_eq!(run.total_net_amount, dec!(2225.00));
    let entry = entry_id(&store, run.id, worker).await.unwrap();
    let present = store
        .with_state(|s| {
            s.entries(run.id)
                .into_iter()
                .find(|e| e.id == entry)
                .map(|e| e.present_days)
        })
        .await;
    assert_eq!(present, Some(dec!(15.5)));
}

#[actix_web::test]
async fn delete_run_releases_everything() {
    let store = MemoryStore::new();
    store.with_state(|s| seed_basic_site(s, 2)).await;
    let run = build_run(&hr(), &store, &attendance(), SITE, 3, 2025).await.unwrap().run;

    let err = delete_run(&hr(), &store, run.id).await.unwrap_err();
    assert!(matches!(err, PayrollError::Permission(_)));

    delete_run(&admin(), &store, run.id).await.unwrap();
    assert!(store.with_state(|s| s.run(run.id).is_none()).await);
    assert!(store.with_state(|s| s.entries(run.id).is_empty()).await);

    // the month is free again
    let rebuilt = build_run(&hr(), &store, &attendance(), SITE, 3, 2025).await.unwrap().run;
    assert_eq!(rebuilt.total_net_amount, dec!(1760));
}

#[actix_web::test]
async fn exit_settlement_scenario() {
    let store = MemoryStore::new();
    let record = create_exit(
        &hr(),
        &store,
        &NewExit {
            employee_id: 42,
            exit_date: chrono::NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            reason: Some("resignation".into()),
            bonus: dec!(5000),
            leave_encashment: dec!(2000),
            gratuity: dec!(10000),
            deduction: dec!(1500),
        },
    )
    .await
    .unwrap();

    assert_eq!(record.net_pay, dec!(15500));
    assert_eq!(
        record.net_pay,
        compute_net_pay(record.bonus, record.leave_encashment, record.gratuity, record.deduction)
    );
    assert_eq!(compute_net_pay(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
}
