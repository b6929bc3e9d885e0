use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Domain events emitted by the services and consumed by the background
/// processor. Delivery is best effort; a full event queue is logged and the
/// triggering request still succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    UserRegistered { user_id: Uuid, email: String },
    EmployeeCreated { employee_id: Uuid },
    EmployeeDeactivated { employee_id: Uuid },
    ClockedIn { employee_id: Uuid, date: NaiveDate },
    ClockedOut { employee_id: Uuid, date: NaiveDate },
    LeaveRequested { leave_id: Uuid, employee_id: Uuid },
    LeaveApproved { leave_id: Uuid, reviewer_id: Uuid },
    LeaveRejected { leave_id: Uuid, reviewer_id: Uuid },
    LeaveCancelled { leave_id: Uuid },
    ProjectCreated { project_id: Uuid },
    TaskCompleted { task_id: Uuid, project_id: Uuid },
    PayrollProcessed { payroll_id: Uuid, employee_id: Uuid },
    PayrollPaid { payroll_id: Uuid, employee_id: Uuid },
    OkrActivated { okr_id: Uuid, employee_id: Uuid },
    OkrCompleted { okr_id: Uuid, employee_id: Uuid },
    RewardClaimed { employee_reward_id: Uuid, employee_id: Uuid },
    MoodRecorded { employee_id: Uuid, date: NaiveDate },
    PaymentReceived { reference: String },
}

/// Sending half of the event channel handed to every service.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        EventSender { tx }
    }

    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.tx
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(e.to_string()))
    }
}

/// Background loop draining the event channel. Runs until every sender is
/// dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("event processor started");
    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(payload) => info!(event = %payload, "event processed"),
            Err(e) => error!(error = %e, "failed to serialize event"),
        }
    }
    info!("event processor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_round_trip_through_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        sender
            .send(Event::ClockedIn {
                employee_id: Uuid::new_v4(),
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            })
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert!(matches!(received, Event::ClockedIn { .. }));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::PaymentReceived {
            reference: "inv_123".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "payment_received");
        assert_eq!(json["reference"], "inv_123");
    }
}
