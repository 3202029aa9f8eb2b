use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{
    Appointment, AppointmentStatus, AvailabilityWindow, CatalogEnums, ConversationMessage,
    ProviderCatalog,
};
use crate::services::availability::RangeDescription;
use crate::services::clock::{LocalNow, MINUTES_PER_DAY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConversationMode {
    Workflow,
    Waiting,
}

/// Today, plus the after-midnight tails of yesterday's windows while they run.
#[derive(Debug, Clone)]
pub struct ScheduleDay {
    pub now: LocalNow,
    pub yesterday_windows: Vec<AvailabilityWindow>,
}

impl ScheduleDay {
    pub fn new(now: LocalNow, yesterday_windows: Vec<AvailabilityWindow>) -> Self {
        Self {
            now,
            yesterday_windows,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date
    }

    pub fn yesterday(&self) -> NaiveDate {
        self.now.date.pred_opt().unwrap_or(self.now.date)
    }

    pub fn holds(&self, appointment: &Appointment) -> bool {
        if appointment.date == self.now.date {
            return true;
        }
        if appointment.date != self.yesterday() {
            return false;
        }
        let minute = self.now.minute_of_day();
        self.yesterday_windows.iter().any(|w| {
            w.crosses_midnight()
                && w.contains(appointment.start_minute)
                && w.to_extended(appointment.start_minute) >= MINUTES_PER_DAY
                && minute <= w.end_minute.max(appointment.end_minute)
        })
    }

    /// A running tail of yesterday comes before today's bookings.
    pub fn current(&self, confirmed: Vec<Appointment>) -> Option<Appointment> {
        let mut held: Vec<Appointment> = confirmed.into_iter().filter(|a| self.holds(a)).collect();
        held.sort_by_key(|a| (a.date, a.start_minute));
        held.into_iter().next()
    }
}

pub fn select_mode(appointment: Option<&Appointment>, day: &ScheduleDay) -> ConversationMode {
    match appointment {
        Some(a) if a.status == AppointmentStatus::Confirmed && day.holds(a) => {
            ConversationMode::Waiting
        }
        _ => ConversationMode::Workflow,
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowRequest {
    pub history: Vec<ConversationMessage>,
    pub today: NaiveDate,
    pub availability: RangeDescription,
    pub booking: Option<CatalogEnums>,
}

#[derive(Debug, Clone)]
pub struct WaitingRequest {
    pub history: Vec<ConversationMessage>,
    pub appointment: Appointment,
}

#[derive(Debug, Clone)]
pub enum InferenceRequest {
    Workflow(WorkflowRequest),
    Waiting(WaitingRequest),
}

impl InferenceRequest {
    pub fn mode(&self) -> ConversationMode {
        match self {
            InferenceRequest::Workflow(_) => ConversationMode::Workflow,
            InferenceRequest::Waiting(_) => ConversationMode::Waiting,
        }
    }
}

pub fn build_request(
    appointment: Option<Appointment>,
    day: &ScheduleDay,
    history: Vec<ConversationMessage>,
    availability: RangeDescription,
    catalog: &ProviderCatalog,
) -> InferenceRequest {
    match appointment {
        Some(appointment) if select_mode(Some(&appointment), day) == ConversationMode::Waiting => {
            InferenceRequest::Waiting(WaitingRequest {
                history,
                appointment,
            })
        }
        _ => {
            let booking = match catalog.enums() {
                Ok(enums) if availability.is_bookable() => Some(enums),
                Ok(_) => None,
                Err(e) => {
                    tracing::error!(error = %e, "catalog cannot back bookings, booking tool disabled");
                    None
                }
            };
            InferenceRequest::Workflow(WorkflowRequest {
                history,
                today: day.today(),
                availability,
                booking,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingReply {
    pub message: String,
    #[serde(default)]
    pub client_arrived: bool,
    #[serde(default = "default_confidence")]
    pub confidence: Confidence,
}

fn default_confidence() -> Confidence {
    Confidence::Low
}

impl WaitingReply {
    pub fn arrival_confirmed(&self) -> bool {
        self.client_arrived && self.confidence != Confidence::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CatalogItem;
    use crate::services::availability::FreeRange;
    use crate::services::clock;
    use chrono::Utc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()
    }

    /// Monday noon, no carry-over from Sunday.
    fn monday() -> ScheduleDay {
        ScheduleDay::new(
            LocalNow {
                date: today(),
                weekday: 1,
                hour: 12,
                minute: 0,
            },
            vec![],
        )
    }

    /// Tuesday at `hour:minute`, after Monday's 18:30-02:00 window.
    fn tuesday_at(hour: u32, minute: u32) -> ScheduleDay {
        ScheduleDay::new(
            LocalNow {
                date: today().succ_opt().unwrap(),
                weekday: 2,
                hour,
                minute,
            },
            vec![AvailabilityWindow::new(1, "18:30", "02:00").unwrap()],
        )
    }

    fn appt(date: NaiveDate, status: AppointmentStatus) -> Appointment {
        appt_at(date, "19:00", status)
    }

    fn appt_at(date: NaiveDate, start: &str, status: AppointmentStatus) -> Appointment {
        let now = Utc::now().naive_utc();
        let start_minute = clock::parse_hhmm(start).unwrap();
        Appointment {
            id: format!("a-{date}-{start}"),
            provider_id: "default".to_string(),
            conversation_id: "+33600000001".to_string(),
            date,
            start_minute,
            end_minute: clock::fold(start_minute + 60),
            duration_minutes: 60,
            extras: vec![],
            total_price: 150,
            status,
            client_arrived: false,
            provider_ready: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn catalog() -> ProviderCatalog {
        ProviderCatalog {
            durations: vec![CatalogItem {
                name: "1h".to_string(),
                price: Some(150),
            }],
            extras: vec![],
        }
    }

    fn open_evening() -> RangeDescription {
        RangeDescription::Available(vec![FreeRange {
            start: 1110,
            end: 1560,
        }])
    }

    #[test]
    fn test_confirmed_today_is_waiting() {
        let a = appt(today(), AppointmentStatus::Confirmed);
        assert_eq!(select_mode(Some(&a), &monday()), ConversationMode::Waiting);
    }

    #[test]
    fn test_other_cases_are_workflow() {
        assert_eq!(select_mode(None, &monday()), ConversationMode::Workflow);

        let yesterday = appt(today().pred_opt().unwrap(), AppointmentStatus::Confirmed);
        assert_eq!(select_mode(Some(&yesterday), &monday()), ConversationMode::Workflow);

        let pending = appt(today(), AppointmentStatus::Pending);
        assert_eq!(select_mode(Some(&pending), &monday()), ConversationMode::Workflow);
    }

    #[test]
    fn test_after_midnight_booking_stays_waiting_until_tail_ends() {
        let tail = appt_at(today(), "01:00", AppointmentStatus::Confirmed);
        assert_eq!(select_mode(Some(&tail), &tuesday_at(0, 45)), ConversationMode::Waiting);
        assert_eq!(select_mode(Some(&tail), &tuesday_at(2, 0)), ConversationMode::Waiting);
        assert_eq!(select_mode(Some(&tail), &tuesday_at(3, 0)), ConversationMode::Workflow);

        // Monday evening bookings are over once the date turns
        let evening = appt_at(today(), "19:00", AppointmentStatus::Confirmed);
        assert_eq!(select_mode(Some(&evening), &tuesday_at(0, 45)), ConversationMode::Workflow);
    }

    #[test]
    fn test_current_prefers_running_tail() {
        let tuesday = today().succ_opt().unwrap();
        let confirmed = vec![
            appt_at(today(), "19:00", AppointmentStatus::Confirmed),
            appt_at(today(), "01:00", AppointmentStatus::Confirmed),
            appt_at(tuesday, "20:00", AppointmentStatus::Confirmed),
        ];

        let current = tuesday_at(0, 45).current(confirmed.clone()).unwrap();
        assert_eq!((current.date, current.start_time()), (today(), "01:00".to_string()));

        let current = tuesday_at(10, 0).current(confirmed).unwrap();
        assert_eq!(current.date, tuesday);
    }

    #[test]
    fn test_waiting_request_carries_no_booking_tool() {
        let a = appt(today(), AppointmentStatus::Confirmed);
        let req = build_request(Some(a), &monday(), vec![], open_evening(), &catalog());
        assert!(matches!(req, InferenceRequest::Waiting(_)));
        assert_eq!(req.mode(), ConversationMode::Waiting);
    }

    #[test]
    fn test_workflow_request_offers_catalog_enums() {
        let req = build_request(None, &monday(), vec![], open_evening(), &catalog());
        let InferenceRequest::Workflow(w) = req else {
            panic!("expected workflow");
        };
        assert_eq!(w.booking.unwrap().durations, vec!["1h"]);
    }

    #[test]
    fn test_empty_catalog_disables_booking_tool() {
        let req = build_request(None, &monday(), vec![], open_evening(), &ProviderCatalog::default());
        let InferenceRequest::Workflow(w) = req else {
            panic!("expected workflow");
        };
        assert!(w.booking.is_none());
    }

    #[test]
    fn test_no_availability_disables_booking_tool() {
        let req = build_request(None, &monday(), vec![], RangeDescription::FullyBooked, &catalog());
        let InferenceRequest::Workflow(w) = req else {
            panic!("expected workflow");
        };
        assert!(w.booking.is_none());
    }

    #[test]
    fn test_low_confidence_arrival_is_not_confirmed() {
        let reply = WaitingReply {
            message: "À tout de suite".to_string(),
            client_arrived: true,
            confidence: Confidence::Low,
        };
        assert!(!reply.arrival_confirmed());

        let reply = WaitingReply {
            confidence: Confidence::Medium,
            ..reply
        };
        assert!(reply.arrival_confirmed());
    }
}
