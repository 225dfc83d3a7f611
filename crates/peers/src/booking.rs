//! HTTP client for the booking peer.
//!
//! Status and service-line changes go through the peer's form-encoded care request endpoints;
//! everything else is JSON.

use crate::http::PeerHttp;
use async_trait::async_trait;
use caremanager_core::gateways::{
    AvailabilityQuery, AvailabilitySlot, AvailabilityStatus, BookingGateway, DispatchLocation,
    DispatchRecord, DispatchStatus, DispatchStatusUpdate, EtaWindow, Market, ServiceLine,
};
use caremanager_core::PeerError;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};

/// Date format the booking peer expects for whole-day availability probes.
const PROBE_DATE_FORMAT: &str = "%m-%d-%Y";
const ASSIGNMENT_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct CareRequestBody {
    id: i64,
    market_id: i64,
    #[serde(default)]
    location: Option<LocationBody>,
    #[serde(default)]
    request_status: Option<RequestStatusBody>,
}

#[derive(Debug, Deserialize)]
struct LocationBody {
    latitude_e6: i32,
    longitude_e6: i32,
}

#[derive(Debug, Deserialize)]
struct RequestStatusBody {
    id: i64,
    name: String,
    #[serde(default)]
    created_at_sec: Option<i64>,
}

impl From<CareRequestBody> for DispatchRecord {
    fn from(body: CareRequestBody) -> Self {
        DispatchRecord {
            id: body.id,
            market_id: body.market_id,
            location: body.location.map(|l| DispatchLocation {
                latitude_e6: l.latitude_e6,
                longitude_e6: l.longitude_e6,
            }),
            current_status: body.request_status.map(|s| DispatchStatus {
                id: s.id,
                name: s.name,
                started_at: s
                    .created_at_sec
                    .and_then(|sec| DateTime::<Utc>::from_timestamp(sec, 0)),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MarketBody {
    id: i64,
    iana_time_zone_name: String,
}

#[derive(Debug, Deserialize)]
struct ServiceLinesBody {
    service_lines: Vec<ServiceLineBody>,
}

#[derive(Debug, Deserialize)]
struct ServiceLineBody {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ShiftTeamBody {
    #[serde(default)]
    member_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct AvailabilityBody {
    availability: String,
}

#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct CheckAvailabilityBody {
    care_request_id: i64,
    market_id: i64,
    latitude: String,
    longitude: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_timestamp_sec: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_timestamp_sec: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
}

#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct EtaRangeBody {
    care_request_status_id: i64,
    starts_at: String,
    ends_at: String,
}

pub(crate) fn availability_body(query: &AvailabilityQuery) -> CheckAvailabilityBody {
    let (start, end, date) = match query.slot {
        AvailabilitySlot::Window(window) => (
            Some(window.start.timestamp()),
            Some(window.end.timestamp()),
            None,
        ),
        AvailabilitySlot::Date(date) => (None, None, Some(format_probe_date(date))),
    };
    CheckAvailabilityBody {
        care_request_id: query.dispatch_id,
        market_id: query.market_id,
        latitude: query.location.latitude().to_string(),
        longitude: query.location.longitude().to_string(),
        start_timestamp_sec: start,
        end_timestamp_sec: end,
        date,
    }
}

pub(crate) fn format_probe_date(date: NaiveDate) -> String {
    date.format(PROBE_DATE_FORMAT).to_string()
}

pub(crate) fn status_form(update: &DispatchStatusUpdate) -> Vec<(&'static str, String)> {
    let mut form = vec![("request_status", update.status.clone())];
    if let Some(comment) = &update.comment {
        form.push(("comment", comment.clone()));
    }
    if let Some(shift_team_id) = update.shift_team_id {
        form.push(("meta_data[shift_team_id]", shift_team_id.to_string()));
    }
    form
}

pub(crate) fn service_line_form(
    service_line_id: i64,
    assignment_date: Option<NaiveDate>,
) -> Vec<(&'static str, String)> {
    let mut form = vec![("care_request[service_line_id]", service_line_id.to_string())];
    if let Some(date) = assignment_date {
        form.push((
            "care_request[assignment_date]",
            date.format(ASSIGNMENT_DATE_FORMAT).to_string(),
        ));
    }
    form
}

pub(crate) fn eta_range_body(dispatch_status_id: i64, window: &EtaWindow) -> EtaRangeBody {
    EtaRangeBody {
        care_request_status_id: dispatch_status_id,
        starts_at: window.start.to_rfc3339_opts(SecondsFormat::Secs, false),
        ends_at: window.end.to_rfc3339_opts(SecondsFormat::Secs, false),
    }
}

/// Booking peer over HTTP.
#[derive(Clone)]
pub struct BookingHttpClient {
    http: PeerHttp,
}

impl BookingHttpClient {
    pub(crate) fn new(http: PeerHttp) -> Self {
        Self { http }
    }
}

#[async_trait]
impl BookingGateway for BookingHttpClient {
    async fn get_dispatch_record(&self, dispatch_id: i64) -> Result<DispatchRecord, PeerError> {
        let req = self
            .http
            .request(Method::GET, &format!("/api/care_requests/{dispatch_id}"));
        let body: CareRequestBody = self.http.send_json(req).await?;
        Ok(body.into())
    }

    async fn get_market(&self, market_id: i64) -> Result<Market, PeerError> {
        let req = self
            .http
            .request(Method::GET, &format!("/api/markets/{market_id}"));
        let body: MarketBody = self.http.send_json(req).await?;
        Ok(Market {
            id: body.id,
            tz_name: body.iana_time_zone_name,
        })
    }

    async fn get_possible_service_lines(
        &self,
        dispatch_id: i64,
    ) -> Result<Vec<ServiceLine>, PeerError> {
        let req = self.http.request(
            Method::GET,
            &format!("/api/care_requests/{dispatch_id}/possible_service_lines"),
        );
        let body: ServiceLinesBody = self.http.send_json(req).await?;
        Ok(body
            .service_lines
            .into_iter()
            .map(|l| ServiceLine {
                id: l.id,
                name: l.name,
            })
            .collect())
    }

    async fn update_service_line(
        &self,
        dispatch_id: i64,
        service_line_id: i64,
        assignment_date: Option<NaiveDate>,
    ) -> Result<(), PeerError> {
        let req = self
            .http
            .request(Method::PATCH, &format!("/api/care_requests/{dispatch_id}"))
            .form(&service_line_form(service_line_id, assignment_date));
        self.http.send_empty(req).await
    }

    async fn check_availability(
        &self,
        query: &AvailabilityQuery,
    ) -> Result<AvailabilityStatus, PeerError> {
        let req = self
            .http
            .request(Method::POST, "/api/markets/check_availability")
            .json(&availability_body(query));
        let body: AvailabilityBody = self.http.send_json(req).await?;
        Ok(AvailabilityStatus(body.availability))
    }

    async fn update_dispatch_status(
        &self,
        dispatch_id: i64,
        update: &DispatchStatusUpdate,
    ) -> Result<(), PeerError> {
        let req = self
            .http
            .request(
                Method::PATCH,
                &format!("/api/care_requests/{dispatch_id}/update_status"),
            )
            .form(&status_form(update));
        self.http.send_empty(req).await
    }

    async fn upsert_eta_window(
        &self,
        dispatch_id: i64,
        dispatch_status_id: i64,
        window: &EtaWindow,
    ) -> Result<(), PeerError> {
        let req = self
            .http
            .request(
                Method::PUT,
                &format!("/api/care_requests/{dispatch_id}/eta_ranges"),
            )
            .json(&eta_range_body(dispatch_status_id, window));
        self.http.send_empty(req).await
    }

    async fn get_shift_team_member_ids(&self, shift_team_id: i64) -> Result<Vec<i64>, PeerError> {
        let req = self
            .http
            .request(Method::GET, &format!("/api/shift_teams/{shift_team_id}"));
        let body: ShiftTeamBody = self.http.send_json(req).await?;
        Ok(body.member_ids)
    }

    async fn duplicate_dispatch(&self, dispatch_id: i64) -> Result<DispatchRecord, PeerError> {
        let req = self.http.request(
            Method::POST,
            &format!("/api/care_requests/{dispatch_id}/duplicate"),
        );
        let body: CareRequestBody = self.http.send_json(req).await?;
        Ok(body.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caremanager_core::config::CoreConfig;
    use caremanager_core::AvailabilityWindow;
    use chrono::TimeZone;

    fn location() -> DispatchLocation {
        DispatchLocation {
            latitude_e6: 39_739_236,
            longitude_e6: -104_990_251,
        }
    }

    #[test]
    fn test_window_probe_body() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let window = AvailabilityWindow::new(start, start + chrono::Duration::hours(1)).unwrap();
        let body = availability_body(&AvailabilityQuery {
            dispatch_id: 42,
            market_id: 159,
            location: location(),
            slot: AvailabilitySlot::Window(window),
        });
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "care_request_id": 42,
                "market_id": 159,
                "latitude": "39.739236",
                "longitude": "-104.990251",
                "start_timestamp_sec": 1_700_000_000,
                "end_timestamp_sec": 1_700_003_600,
            })
        );
    }

    #[test]
    fn test_date_probe_body_uses_month_first_format() {
        let body = availability_body(&AvailabilityQuery {
            dispatch_id: 42,
            market_id: 159,
            location: location(),
            slot: AvailabilitySlot::Date(NaiveDate::from_ymd_opt(2023, 3, 7).unwrap()),
        });
        assert_eq!(body.date.as_deref(), Some("03-07-2023"));
        assert_eq!(body.start_timestamp_sec, None);
    }

    #[test]
    fn test_status_form_fields() {
        let cfg = CoreConfig::default();
        let form = status_form(&DispatchStatusUpdate::new("committed", Some(11), &cfg));
        assert_eq!(
            form,
            vec![
                ("request_status", "committed".to_string()),
                ("meta_data[shift_team_id]", "11".to_string()),
            ]
        );

        let form = status_form(&DispatchStatusUpdate::new("archived", None, &cfg));
        assert_eq!(form[0], ("request_status", "archived".to_string()));
        assert_eq!(form[1].0, "comment");
        assert_eq!(form.len(), 2);
    }

    #[test]
    fn test_service_line_form_fields() {
        assert_eq!(
            service_line_form(9, None),
            vec![("care_request[service_line_id]", "9".to_string())]
        );
        assert_eq!(
            service_line_form(9, NaiveDate::from_ymd_opt(2023, 3, 1)),
            vec![
                ("care_request[service_line_id]", "9".to_string()),
                ("care_request[assignment_date]", "2023-03-01".to_string()),
            ]
        );
    }

    #[test]
    fn test_eta_range_keeps_market_offset() {
        let start = Utc.with_ymd_and_hms(2023, 3, 2, 3, 0, 0).unwrap();
        let window = AvailabilityWindow::new(start, start + chrono::Duration::hours(1)).unwrap();
        let eta = EtaWindow::in_zone(&window, chrono_tz::America::Denver);
        let body = eta_range_body(5, &eta);
        assert_eq!(body.starts_at, "2023-03-01T20:00:00-07:00");
        assert_eq!(body.ends_at, "2023-03-01T21:00:00-07:00");
        assert_eq!(body.care_request_status_id, 5);
    }

    #[test]
    fn test_care_request_decoding() {
        let body: CareRequestBody = serde_json::from_value(serde_json::json!({
            "id": 42,
            "market_id": 159,
            "location": {"latitude_e6": 1, "longitude_e6": 2},
            "request_status": {"id": 8, "name": "accepted", "created_at_sec": 1_700_000_000}
        }))
        .unwrap();
        let record: DispatchRecord = body.into();
        assert_eq!(record.location.unwrap().longitude_e6, 2);
        let status = record.current_status.unwrap();
        assert_eq!(status.name, "accepted");
        assert_eq!(
            status.started_at,
            DateTime::<Utc>::from_timestamp(1_700_000_000, 0)
        );

        let bare: CareRequestBody =
            serde_json::from_value(serde_json::json!({"id": 1, "market_id": 2})).unwrap();
        let record: DispatchRecord = bare.into();
        assert!(record.location.is_none());
        assert!(record.current_status.is_none());
    }
}
