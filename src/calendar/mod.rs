pub mod google;
pub mod slots;

use async_trait::async_trait;
use chrono::{ DateTime, Duration, NaiveDateTime, TimeZone, Utc };
use chrono_tz::Tz;
use log::{ error, info, warn };
use std::error::Error;
use std::sync::Arc;
use thiserror::Error;

use self::google::GoogleCalendarClient;
use self::slots::{ DayHint, RandomAdmission, SlotAdmission, MAX_SLOTS, SLOT_MINUTES };
use crate::cli::Args;
use crate::locale::Locale;
use crate::models::chat::BookingRecord;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("Calendar auth error: {0}")]
    Auth(String),

    #[error("Calendar HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Calendar API error: HTTP {status}: {body}")]
    Api {
        status: u16,
        body: String,
    },

    #[error("Invalid calendar response: {0}")]
    InvalidResponse(String),

    #[error("Invalid slot datetime '{0}'")]
    InvalidSlot(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reminder {
    pub method: &'static str,
    pub minutes: u32,
}

pub const DEFAULT_REMINDERS: [Reminder; 2] = [
    Reminder { method: "email", minutes: 60 },
    Reminder { method: "popup", minutes: 10 },
];

#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub time_zone: String,
    pub attendee_email: String,
    pub reminders: Vec<Reminder>,
}

/// External calendar the scheduler can consult and write to.
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    async fn query_free_busy(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>
    ) -> Result<Vec<BusyInterval>, CalendarError>;

    /// Returns the created event id, when the backend reports one.
    async fn insert_event(&self, event: &NewEvent) -> Result<Option<String>, CalendarError>;
}

#[async_trait]
pub trait AvailabilityProvider: Send + Sync {
    /// At most six open slot starts, chronologically ordered.
    async fn available_slots(&self, preferred_day: Option<&str>) -> Vec<DateTime<Utc>>;
}

#[async_trait]
pub trait BookingCommitter: Send + Sync {
    /// Only an unparseable `datetime` fails; backend failures still yield a
    /// formatted record without an event id.
    async fn book_slot(
        &self,
        datetime: &str,
        name: &str,
        email: &str,
        locale: Locale
    ) -> Result<BookingRecord, CalendarError>;
}

/// Slot search and booking over an optional real calendar.
pub struct Scheduler {
    calendar: Option<Arc<dyn CalendarBackend>>,
    admission: Arc<dyn SlotAdmission>,
    timezone: Tz,
    company_name: String,
}

impl Scheduler {
    pub fn new(timezone: Tz, company_name: impl Into<String>) -> Self {
        Self {
            calendar: None,
            admission: Arc::new(RandomAdmission::default()),
            timezone,
            company_name: company_name.into(),
        }
    }

    pub fn with_calendar(mut self, calendar: Arc<dyn CalendarBackend>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn with_admission(mut self, admission: Arc<dyn SlotAdmission>) -> Self {
        self.admission = admission;
        self
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn has_calendar(&self) -> bool {
        self.calendar.is_some()
    }

    pub async fn from_args(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let timezone: Tz = args.business_timezone
            .parse()
            .map_err(|e| format!("Invalid BUSINESS_TIMEZONE '{}': {}", args.business_timezone, e))?;
        let scheduler = Self::new(timezone, args.company_name.clone()).with_admission(
            Arc::new(RandomAdmission::new(args.availability_probability))
        );

        let Some(key_path) = args.calendar_key_path() else {
            info!("No calendar credentials configured. Using placeholder availability.");
            return Ok(scheduler);
        };

        match
            GoogleCalendarClient::from_service_account_file(
                key_path,
                args.google_calendar_id.clone(),
                args.google_calendar_base_url.clone()
            ).await
        {
            Ok(client) => {
                info!("Google Calendar connected (calendar id: {})", args.google_calendar_id);
                Ok(scheduler.with_calendar(Arc::new(client)))
            }
            Err(e) => {
                error!(
                    "Failed to initialise Google Calendar from '{}': {}. Using placeholder availability.",
                    key_path,
                    e
                );
                Ok(scheduler)
            }
        }
    }

    /// Accepts RFC 3339 with an offset, or a naive local datetime in the
    /// business timezone.
    pub fn parse_slot(&self, raw: &str) -> Result<DateTime<Utc>, CalendarError> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .and_then(|naive| self.timezone.from_local_datetime(&naive).earliest())
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| CalendarError::InvalidSlot(raw.to_string()))
    }

    /// Renders an offered slot the way the assistant presents options.
    pub fn format_slot_for_display(&self, iso: &str, locale: Locale) -> Result<String, CalendarError> {
        let start = self.parse_slot(iso)?;
        Ok(locale.format_slot(&start.with_timezone(&self.timezone)))
    }

    /// Slot search relative to an explicit `now`.
    pub async fn slots_at(
        &self,
        preferred_day: Option<&str>,
        now: DateTime<Utc>
    ) -> Vec<DateTime<Utc>> {
        let hint = DayHint::parse(preferred_day);
        let today = now.with_timezone(&self.timezone).date_naive();
        let candidates: Vec<_> = slots
            ::candidate_slots(today, &hint, &self.timezone)
            .into_iter()
            .filter(|slot| *slot > now)
            .collect();

        let Some(window_end) = candidates.last().map(|s| *s + Duration::minutes(SLOT_MINUTES)) else {
            return Vec::new();
        };

        if let Some(calendar) = &self.calendar {
            match calendar.query_free_busy(now, window_end).await {
                Ok(busy) => {
                    return candidates
                        .into_iter()
                        .filter(|slot| !busy.iter().any(|b| slots::conflicts(slot, b)))
                        .take(MAX_SLOTS)
                        .collect();
                }
                Err(e) => {
                    error!("Error fetching calendar availability: {}", e);
                }
            }
        }

        candidates
            .into_iter()
            .filter(|slot| self.admission.admit(slot))
            .take(MAX_SLOTS)
            .collect()
    }

    pub async fn book_at(
        &self,
        start: DateTime<Utc>,
        name: &str,
        email: &str,
        locale: Locale
    ) -> BookingRecord {
        let local = start.with_timezone(&self.timezone);
        let mut record = BookingRecord {
            date: locale.format_date(&local),
            time: locale.format_time(&local),
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            external_event_id: None,
        };

        let Some(calendar) = &self.calendar else {
            return record;
        };

        let event = NewEvent {
            summary: format!("Discovery Call - {}", name),
            description: format!(
                "Discovery call with {} ({}) booked via {}",
                name,
                email,
                self.company_name
            ),
            start,
            end: start + Duration::minutes(SLOT_MINUTES),
            time_zone: self.timezone.name().to_string(),
            attendee_email: email.to_string(),
            reminders: DEFAULT_REMINDERS.to_vec(),
        };

        match calendar.insert_event(&event).await {
            Ok(event_id) => {
                if event_id.is_none() {
                    warn!("Calendar accepted the event but returned no id");
                }
                record.external_event_id = event_id;
            }
            Err(e) => error!("Error creating calendar event: {}", e),
        }
        record
    }
}

#[async_trait]
impl AvailabilityProvider for Scheduler {
    async fn available_slots(&self, preferred_day: Option<&str>) -> Vec<DateTime<Utc>> {
        self.slots_at(preferred_day, Utc::now()).await
    }
}

#[async_trait]
impl BookingCommitter for Scheduler {
    async fn book_slot(
        &self,
        datetime: &str,
        name: &str,
        email: &str,
        locale: Locale
    ) -> Result<BookingRecord, CalendarError> {
        let start = self.parse_slot(datetime)?;
        Ok(self.book_at(start, name, email, locale).await)
    }
}
