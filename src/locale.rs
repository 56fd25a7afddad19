use chrono::{ DateTime, TimeZone, Timelike };
use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;

/// Languages the booking assistant can speak. Every directive and every
/// user-facing message must exist for each variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Es,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLocaleError {
    message: String,
}

impl fmt::Display for ParseLocaleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLocaleError {}

impl FromStr for Locale {
    type Err = ParseLocaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "es" => Ok(Locale::Es),
            _ =>
                Err(ParseLocaleError {
                    message: format!("Unsupported locale: '{}'", s),
                }),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Locale {
    pub const ALL: [Locale; 2] = [Locale::En, Locale::Es];

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Es => "es",
        }
    }

    /// Lenient resolution used at the HTTP boundary. Region suffixes are
    /// ignored (`es-MX` is Spanish) and anything unrecognised is English.
    pub fn from_tag(tag: Option<&str>) -> Locale {
        let Some(tag) = tag else {
            return Locale::default();
        };
        let primary = tag.split(['-', '_']).next().unwrap_or_default();
        primary.parse().unwrap_or_default()
    }

    /// Long date, e.g. `Wednesday, January 15, 2025` or
    /// `miércoles, 15 de enero de 2025`.
    pub fn format_date<Tz>(&self, dt: &DateTime<Tz>) -> String
        where Tz: TimeZone, Tz::Offset: fmt::Display
    {
        match self {
            Locale::En => dt.format("%A, %B %-d, %Y").to_string(),
            Locale::Es =>
                dt.format_localized("%A, %-d de %B de %Y", chrono::Locale::es_ES).to_string(),
        }
    }

    /// 12-hour clock, e.g. `2:00 PM` or `2:00 p. m.`.
    pub fn format_time<Tz>(&self, dt: &DateTime<Tz>) -> String
        where Tz: TimeZone, Tz::Offset: fmt::Display
    {
        let morning = dt.hour() < 12;
        let suffix = match (self, morning) {
            (Locale::En, true) => "AM",
            (Locale::En, false) => "PM",
            (Locale::Es, true) => "a. m.",
            (Locale::Es, false) => "p. m.",
        };
        format!("{} {}", dt.format("%-I:%M"), suffix)
    }

    /// Short human form of a slot used when listing options.
    pub fn format_slot<Tz>(&self, dt: &DateTime<Tz>) -> String
        where Tz: TimeZone, Tz::Offset: fmt::Display
    {
        match self {
            Locale::En => format!("{} at {}", dt.format("%A, %B %-d"), self.format_time(dt)),
            Locale::Es =>
                format!(
                    "{} a las {}",
                    dt.format_localized("%A, %-d de %B", chrono::Locale::es_ES),
                    self.format_time(dt)
                ),
        }
    }

    /// Answer given when no model backend is configured.
    pub fn setup_message(&self, contact_email: &str) -> String {
        match self {
            Locale::En =>
                format!(
                    "Thanks for your interest! We're currently setting up the booking system. Please contact us directly at {} to schedule your demo.",
                    contact_email
                ),
            Locale::Es =>
                format!(
                    "¡Gracias por tu interés! Actualmente estamos configurando el sistema de agendamiento. Por favor contáctanos directamente en {} para agendar tu demo.",
                    contact_email
                ),
        }
    }

    /// Answer given when the model backend cannot be reached.
    pub fn backend_unavailable_message(&self, contact_email: &str) -> String {
        match self {
            Locale::En =>
                format!(
                    "Sorry, our scheduling assistant is unavailable right now. Please email us at {} and we'll get your call booked.",
                    contact_email
                ),
            Locale::Es =>
                format!(
                    "Lo sentimos, nuestro asistente de agendamiento no está disponible en este momento. Escríbenos a {} y agendaremos tu llamada.",
                    contact_email
                ),
        }
    }

    /// Answer given when the tool loop ran out of iterations without a reply.
    pub fn turn_limit_message(&self, contact_email: &str) -> String {
        match self {
            Locale::En =>
                format!(
                    "I couldn't finish scheduling here. Please email us at {} and we'll get your call booked.",
                    contact_email
                ),
            Locale::Es =>
                format!(
                    "No pude completar el agendamiento aquí. Escríbenos a {} y agendaremos tu llamada.",
                    contact_email
                ),
        }
    }

    pub fn internal_error_message(&self) -> &'static str {
        match self {
            Locale::En => "Sorry, there was an error processing your message. Please try again.",
            Locale::Es =>
                "Lo sentimos, hubo un error al procesar tu mensaje. Por favor intenta de nuevo.",
        }
    }

    pub fn rate_limited_message(&self) -> &'static str {
        match self {
            Locale::En =>
                "We're receiving a lot of messages right now. Please try again in a moment.",
            Locale::Es =>
                "Estamos recibiendo muchos mensajes en este momento. Por favor intenta de nuevo en un momento.",
        }
    }
}
