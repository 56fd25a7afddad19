use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use log::debug;
use reqwest::{ Client as HttpClient, Url };
use serde::Deserialize;
use serde_json::{ json, Value as JsonValue };
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use yup_oauth2::authenticator::DefaultAuthenticator;
use yup_oauth2::{ read_service_account_key, ServiceAccountAuthenticator, ServiceAccountKey };

use super::{ BusyInterval, CalendarBackend, CalendarError, NewEvent };

const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, CalendarError>;
}

/// OAuth bearer tokens minted from a Google service-account key. The
/// authenticator is built once and caches the token until it nears expiry.
pub struct ServiceAccountTokenSource {
    auth: DefaultAuthenticator,
}

impl ServiceAccountTokenSource {
    pub async fn from_file(path: &str) -> Result<Self, CalendarError> {
        let key = read_service_account_key(Path::new(path))
            .await
            .map_err(|e| CalendarError::Auth(format!("Failed to load SA key from {}: {}", path, e)))?;
        Self::from_key(key).await
    }

    pub async fn from_key(key: ServiceAccountKey) -> Result<Self, CalendarError> {
        let auth = ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .map_err(|e| CalendarError::Auth(e.to_string()))?;
        Ok(Self { auth })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String, CalendarError> {
        let token = self.auth
            .token(&[CALENDAR_SCOPE])
            .await
            .map_err(|e| CalendarError::Auth(e.to_string()))?;

        token
            .token()
            .ok_or_else(|| CalendarError::Auth("OAuth token was None".to_string()))
            .map(|t| t.to_string())
    }
}

pub struct GoogleCalendarClient {
    http: HttpClient,
    token_source: Arc<dyn TokenSource>,
    calendar_id: String,
    base_url: String,
}

#[derive(Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: HashMap<String, FreeBusyCalendar>,
}

#[derive(Deserialize)]
struct FreeBusyCalendar {
    #[serde(default)]
    busy: Vec<RawBusy>,
}

#[derive(Deserialize)]
struct RawBusy {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct InsertedEvent {
    id: Option<String>,
}

impl GoogleCalendarClient {
    pub fn new(
        token_source: Arc<dyn TokenSource>,
        calendar_id: impl Into<String>,
        base_url: impl Into<String>
    ) -> Self {
        Self {
            http: HttpClient::new(),
            token_source,
            calendar_id: calendar_id.into(),
            base_url: base_url.into(),
        }
    }

    pub async fn from_service_account_file(
        key_path: &str,
        calendar_id: String,
        base_url: String
    ) -> Result<Self, CalendarError> {
        let source = ServiceAccountTokenSource::from_file(key_path).await?;
        // Fail at startup rather than on the first visitor.
        source.access_token().await?;
        Ok(Self::new(Arc::new(source), calendar_id, base_url))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CalendarError> {
        let mut url = Url::parse(&self.base_url).map_err(|e|
            CalendarError::InvalidResponse(format!("Invalid calendar base URL: {}", e))
        )?;
        url.path_segments_mut()
            .map_err(|_| CalendarError::InvalidResponse("Calendar base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, CalendarError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(CalendarError::Api { status: status.as_u16(), body })
    }
}

fn event_body(event: &NewEvent) -> JsonValue {
    let overrides: Vec<JsonValue> = event.reminders
        .iter()
        .map(|r| json!({ "method": r.method, "minutes": r.minutes }))
        .collect();

    json!({
        "summary": event.summary,
        "description": event.description,
        "start": { "dateTime": event.start.to_rfc3339(), "timeZone": event.time_zone },
        "end": { "dateTime": event.end.to_rfc3339(), "timeZone": event.time_zone },
        "attendees": [{ "email": event.attendee_email }],
        "reminders": { "useDefault": false, "overrides": overrides },
    })
}

#[async_trait]
impl CalendarBackend for GoogleCalendarClient {
    async fn query_free_busy(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>
    ) -> Result<Vec<BusyInterval>, CalendarError> {
        let token = self.token_source.access_token().await?;
        let url = self.endpoint(&["freeBusy"])?;
        let body =
            json!({
            "timeMin": time_min.to_rfc3339(),
            "timeMax": time_max.to_rfc3339(),
            "items": [{ "id": self.calendar_id }],
        });

        let resp = self.http.post(url).bearer_auth(token).json(&body).send().await?;
        let parsed = Self::check_status(resp).await?
            .json::<FreeBusyResponse>().await
            .map_err(|e| CalendarError::InvalidResponse(e.to_string()))?;

        let busy: Vec<BusyInterval> = parsed.calendars
            .get(&self.calendar_id)
            .map(|c| {
                c.busy
                    .iter()
                    .map(|b| BusyInterval { start: b.start, end: b.end })
                    .collect()
            })
            .unwrap_or_default();
        debug!("freeBusy returned {} busy intervals", busy.len());
        Ok(busy)
    }

    async fn insert_event(&self, event: &NewEvent) -> Result<Option<String>, CalendarError> {
        let token = self.token_source.access_token().await?;
        let url = self.endpoint(&["calendars", &self.calendar_id, "events"])?;

        let resp = self.http
            .post(url)
            .query(&[("sendUpdates", "all")])
            .bearer_auth(token)
            .json(&event_body(event))
            .send().await?;
        let inserted = Self::check_status(resp).await?
            .json::<InsertedEvent>().await
            .map_err(|e| CalendarError::InvalidResponse(e.to_string()))?;
        Ok(inserted.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::DEFAULT_REMINDERS;
    use chrono::{ Duration, TimeZone };
    use wiremock::matchers::{ body_partial_json, header, method, path, query_param };
    use wiremock::{ Mock, MockServer, ResponseTemplate };

    struct StaticToken;

    #[async_trait]
    impl TokenSource for StaticToken {
        async fn access_token(&self) -> Result<String, CalendarError> {
            Ok("test-token".to_string())
        }
    }

    fn client(base: String) -> GoogleCalendarClient {
        GoogleCalendarClient::new(Arc::new(StaticToken), "team@example.com", base)
    }

    #[tokio::test]
    async fn free_busy_reads_the_configured_calendar() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/freeBusy"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(json!({ "items": [{ "id": "team@example.com" }] })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(
                    json!({
                    "calendars": {
                        "team@example.com": {
                            "busy": [{ "start": "2025-01-16T14:00:00Z", "end": "2025-01-16T15:00:00Z" }]
                        }
                    }
                })
                )
            )
            .mount(&mock_server).await;

        let start = Utc.with_ymd_and_hms(2025, 1, 16, 0, 0, 0).unwrap();
        let busy = client(mock_server.uri())
            .query_free_busy(start, start + Duration::days(1)).await
            .unwrap();

        assert_eq!(busy.len(), 1);
        assert_eq!(busy[0].start, Utc.with_ymd_and_hms(2025, 1, 16, 14, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn insert_event_notifies_attendees() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/calendars/team@example.com/events"))
            .and(query_param("sendUpdates", "all"))
            .and(
                body_partial_json(
                    json!({
                "summary": "Discovery Call - Ada",
                "attendees": [{ "email": "ada@example.com" }],
                "reminders": { "useDefault": false }
            })
                )
            )
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "evt_42" })))
            .mount(&mock_server).await;

        let start = Utc.with_ymd_and_hms(2025, 1, 16, 14, 0, 0).unwrap();
        let event = NewEvent {
            summary: "Discovery Call - Ada".into(),
            description: "Discovery call".into(),
            start,
            end: start + Duration::minutes(30),
            time_zone: "America/New_York".into(),
            attendee_email: "ada@example.com".into(),
            reminders: DEFAULT_REMINDERS.to_vec(),
        };

        let id = client(mock_server.uri()).insert_event(&event).await.unwrap();
        assert_eq!(id.as_deref(), Some("evt_42"));
    }

    #[tokio::test]
    async fn api_failure_surfaces_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/freeBusy"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&mock_server).await;

        let now = Utc::now();
        let err = client(mock_server.uri())
            .query_free_busy(now, now + Duration::hours(1)).await
            .unwrap_err();
        assert!(matches!(err, CalendarError::Api { status: 403, .. }));
    }

    fn test_key(token_uri: String) -> ServiceAccountKey {
        ServiceAccountKey {
            key_type: Some("service_account".into()),
            project_id: None,
            private_key_id: None,
            private_key: include_str!("../../tests/fixtures/service_account_test_key.pem").into(),
            client_email: "booking@test-project.iam.gserviceaccount.com".into(),
            client_id: None,
            auth_uri: None,
            token_uri,
            auth_provider_x509_cert_url: None,
            client_x509_cert_url: None,
        }
    }

    #[tokio::test]
    async fn service_account_token_is_exchanged_once() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(
                    json!({ "access_token": "ya29.cached", "token_type": "Bearer", "expires_in": 3600 })
                )
            )
            .expect(1)
            .mount(&mock_server).await;

        let source = ServiceAccountTokenSource::from_key(
            test_key(format!("{}/token", mock_server.uri()))
        ).await.unwrap();

        assert_eq!(source.access_token().await.unwrap(), "ya29.cached");
        assert_eq!(source.access_token().await.unwrap(), "ya29.cached");
    }

    #[test]
    fn event_body_carries_reminder_overrides() {
        let start = Utc.with_ymd_and_hms(2025, 1, 16, 14, 0, 0).unwrap();
        let body = event_body(
            &(NewEvent {
                summary: "s".into(),
                description: "d".into(),
                start,
                end: start + Duration::minutes(30),
                time_zone: "America/New_York".into(),
                attendee_email: "a@example.com".into(),
                reminders: DEFAULT_REMINDERS.to_vec(),
            })
        );
        assert_eq!(body["reminders"]["overrides"][0], json!({ "method": "email", "minutes": 60 }));
        assert_eq!(body["reminders"]["overrides"][1], json!({ "method": "popup", "minutes": 10 }));
        assert_eq!(body["start"]["timeZone"], "America/New_York");
    }
}
