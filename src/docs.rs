use crate::api::field_value::EditFieldValue;
use crate::api::payroll::{AddField, CreatePayroll, MessageResponse, PayrollQuery, ReconcileQuery, UpdateStatus};
use crate::engine::builder::{BuildOutcome, EmployeeFailure};
use crate::engine::exit::{SettlementInputs, SettlementPreview};
use crate::engine::lifecycle::{EntryDetail, RunDetail};
use crate::engine::totals::Reconciliation;
use crate::model::exit::{ExitPatch, ExitRecord, NewExit};
use crate::model::payment_field::FieldType;
use crate::model::payroll::{PayrollRun, PayrollStatus};
use crate::model::salary_entry::{SalaryEntry, SalaryFieldValue};
use crate::model::statutory::{DeductionCycle, NewStatutoryRule, StatutoryKind, StatutoryRule, ValueKind};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Payroll Engine API",
        version = "1.0.0",
        description = r#"
## Payroll Aggregation & Statutory Deductions

Builds monthly payroll runs per site from payment templates, attendance and
statutory rules, and keeps every run total equal to the sum of its field
values through edits, additions and removals.

### Key Features
- **Payroll runs**
  - Build, list, view, approve and delete runs; add a field to a whole run
  - Reconcile a stored total against its field values
- **Field values**
  - Edit or remove one earning/deduction line; the run total follows by delta
- **Statutory rules**
  - EPF, ESI, professional tax, LWF and statutory bonus per company
- **Exit settlement**
  - Bonus, leave encashment, gratuity and deductions with live preview

### Security
Every endpoint requires a **JWT Bearer** access token. Writes need the HR or
Admin role; approval and run deletion are Admin only.
"#,
    ),
    paths(
        crate::api::payroll::create_payroll,
        crate::api::payroll::list_payrolls,
        crate::api::payroll::get_payroll,
        crate::api::payroll::delete_payroll,
        crate::api::payroll::update_status,
        crate::api::payroll::add_field,
        crate::api::payroll::reconcile_payroll,

        crate::api::salary_entry::delete_salary_entry,

        crate::api::field_value::update_field_value,
        crate::api::field_value::delete_field_value,

        crate::api::statutory::list_rules,
        crate::api::statutory::upsert_rule,

        crate::api::exit::create_exit,
        crate::api::exit::update_exit,
        crate::api::exit::get_exit,
        crate::api::exit::preview_exit
    ),
    components(
        schemas(
            CreatePayroll,
            PayrollQuery,
            UpdateStatus,
            AddField,
            ReconcileQuery,
            MessageResponse,
            BuildOutcome,
            EmployeeFailure,
            RunDetail,
            EntryDetail,
            Reconciliation,
            PayrollRun,
            PayrollStatus,
            SalaryEntry,
            SalaryFieldValue,
            FieldType,
            EditFieldValue,
            StatutoryRule,
            NewStatutoryRule,
            StatutoryKind,
            ValueKind,
            DeductionCycle,
            ExitRecord,
            NewExit,
            ExitPatch,
            SettlementInputs,
            SettlementPreview
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Payroll", description = "Payroll run APIs"),
        (name = "Salary Entry", description = "Per-employee entries of a run"),
        (name = "Field Value", description = "Earning and deduction lines"),
        (name = "Statutory", description = "Statutory rule configuration"),
        (name = "Exit", description = "Final settlement APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
