use chrono::{ DateTime, Datelike, Duration, NaiveDate, SecondsFormat, TimeZone, Utc, Weekday };
use chrono_tz::Tz;
use rand::Rng;

use super::BusyInterval;

/// Local start hours of the daily appointment grid.
pub const SLOT_HOURS: [u32; 6] = [9, 10, 11, 14, 15, 16];
pub const SLOT_MINUTES: i64 = 30;
pub const MAX_SLOTS: usize = 6;
pub const DEFAULT_LOOKAHEAD_DAYS: i64 = 5;

const WEEKDAY_NAMES: [(&str, Weekday); 16] = [
    ("sunday", Weekday::Sun),
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("domingo", Weekday::Sun),
    ("lunes", Weekday::Mon),
    ("martes", Weekday::Tue),
    ("miércoles", Weekday::Wed),
    ("miercoles", Weekday::Wed),
    ("jueves", Weekday::Thu),
    ("viernes", Weekday::Fri),
    ("sábado", Weekday::Sat),
    ("sabado", Weekday::Sat),
];

/// What a free-form day preference resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayHint {
    /// No usable preference: the next business days.
    Unspecified,
    Today,
    Tomorrow,
    Weekday(Weekday),
}

impl DayHint {
    pub fn parse(hint: Option<&str>) -> DayHint {
        let Some(raw) = hint else {
            return DayHint::Unspecified;
        };
        let lower = raw.trim().to_lowercase();
        if lower.is_empty() {
            return DayHint::Unspecified;
        }

        match lower.as_str() {
            "tomorrow" | "mañana" | "manana" => {
                return DayHint::Tomorrow;
            }
            "today" | "hoy" => {
                return DayHint::Today;
            }
            _ => {}
        }

        WEEKDAY_NAMES.iter()
            .find(|(name, _)| lower.contains(name))
            .map(|(_, day)| DayHint::Weekday(*day))
            .unwrap_or(DayHint::Unspecified)
    }

    /// Day offsets from today to generate slots for.
    pub fn day_offsets(&self, today: Weekday) -> Vec<i64> {
        match self {
            DayHint::Unspecified => (1..=DEFAULT_LOOKAHEAD_DAYS).collect(),
            DayHint::Today => vec![0],
            DayHint::Tomorrow => vec![1],
            DayHint::Weekday(target) => vec![days_until(*target, today)],
        }
    }

    pub fn excludes_weekends(&self) -> bool {
        matches!(self, DayHint::Unspecified)
    }
}

/// Days until the next future occurrence of `target`; a day naming today
/// rolls to next week.
pub fn days_until(target: Weekday, today: Weekday) -> i64 {
    let diff = (target.num_days_from_sunday() as i64 - today.num_days_from_sunday() as i64)
        .rem_euclid(7);
    if diff == 0 { 7 } else { diff }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Every grid slot for the hinted days, in chronological order. Local times
/// that do not exist in `tz` (DST gaps) are skipped.
pub fn candidate_slots(today: NaiveDate, hint: &DayHint, tz: &Tz) -> Vec<DateTime<Utc>> {
    let mut slots = Vec::new();
    for offset in hint.day_offsets(today.weekday()) {
        let date = today + Duration::days(offset);
        if hint.excludes_weekends() && is_weekend(date) {
            continue;
        }
        for hour in SLOT_HOURS {
            let Some(naive) = date.and_hms_opt(hour, 0, 0) else {
                continue;
            };
            if let Some(local) = tz.from_local_datetime(&naive).earliest() {
                slots.push(local.with_timezone(&Utc));
            }
        }
    }
    slots
}

/// `[start, start + 30min)` overlaps `[busy.start, busy.end)`.
pub fn conflicts(start: &DateTime<Utc>, busy: &BusyInterval) -> bool {
    let end = *start + Duration::minutes(SLOT_MINUTES);
    *start < busy.end && end > busy.start
}

/// ISO-8601 form handed to the model, e.g. `2025-01-15T14:00:00.000Z`.
pub fn to_iso(slot: &DateTime<Utc>) -> String {
    slot.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Decides whether a free candidate slot is offered.
pub trait SlotAdmission: Send + Sync {
    fn admit(&self, slot: &DateTime<Utc>) -> bool;
}

/// Offers every candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdmitAll;

impl SlotAdmission for AdmitAll {
    fn admit(&self, _slot: &DateTime<Utc>) -> bool {
        true
    }
}

/// Placeholder availability used when no calendar is connected: each slot
/// is offered with a fixed probability.
#[derive(Debug, Clone, Copy)]
pub struct RandomAdmission {
    probability: f64,
}

impl RandomAdmission {
    pub fn new(probability: f64) -> Self {
        let probability = if probability.is_nan() { 0.0 } else { probability.clamp(0.0, 1.0) };
        Self { probability }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl Default for RandomAdmission {
    fn default() -> Self {
        Self::new(0.6)
    }
}

impl SlotAdmission for RandomAdmission {
    fn admit(&self, _slot: &DateTime<Utc>) -> bool {
        rand::thread_rng().gen_bool(self.probability)
    }
}
