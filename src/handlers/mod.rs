pub mod attendance;
pub mod billing;
pub mod client_portal;
pub mod dashboard;
pub mod employees;
pub mod engagement;
pub mod leave;
pub mod okr;
pub mod payroll;
pub mod projects;
pub mod reports;
pub mod tasks;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub employees: Arc<crate::services::employees::EmployeeService>,
    pub attendance: Arc<crate::services::attendance::AttendanceService>,
    pub leave: Arc<crate::services::leave::LeaveService>,
    pub projects: Arc<crate::services::projects::ProjectService>,
    pub tasks: Arc<crate::services::tasks::TaskService>,
    pub dashboard: Arc<crate::services::dashboard::DashboardService>,
    pub payroll: Arc<crate::services::payroll::PayrollService>,
    pub okr: Arc<crate::services::okr::OkrService>,
    pub client_portal: Arc<crate::services::client_portal::ClientPortalService>,
    pub reports: Arc<crate::services::reports::ReportService>,
    pub engagement: Arc<crate::services::engagement::EngagementService>,
    pub billing: Arc<crate::services::billing::BillingService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        let events = Some(event_sender);
        Self {
            employees: Arc::new(crate::services::employees::EmployeeService::new(
                db.clone(),
                events.clone(),
            )),
            attendance: Arc::new(crate::services::attendance::AttendanceService::new(
                db.clone(),
                events.clone(),
            )),
            leave: Arc::new(crate::services::leave::LeaveService::new(
                db.clone(),
                events.clone(),
            )),
            projects: Arc::new(crate::services::projects::ProjectService::new(
                db.clone(),
                events.clone(),
            )),
            tasks: Arc::new(crate::services::tasks::TaskService::new(
                db.clone(),
                events.clone(),
            )),
            dashboard: Arc::new(crate::services::dashboard::DashboardService::new(db.clone())),
            payroll: Arc::new(crate::services::payroll::PayrollService::new(
                db.clone(),
                events.clone(),
            )),
            okr: Arc::new(crate::services::okr::OkrService::new(
                db.clone(),
                events.clone(),
            )),
            client_portal: Arc::new(crate::services::client_portal::ClientPortalService::new(
                db.clone(),
            )),
            reports: Arc::new(crate::services::reports::ReportService::new(db.clone())),
            engagement: Arc::new(crate::services::engagement::EngagementService::new(
                db,
                events.clone(),
            )),
            billing: Arc::new(crate::services::billing::BillingService::new(
                crate::services::billing::BillingSettings::from_app_config(config),
                events,
            )),
        }
    }
}
