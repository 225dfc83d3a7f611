//! HTTP client for the routing peer.

use crate::http::PeerHttp;
use async_trait::async_trait;
use caremanager_core::gateways::RoutingGateway;
use caremanager_core::{PeerError, RegionSchedule};
use chrono::NaiveDate;
use reqwest::Method;

#[derive(Clone)]
pub struct RoutingHttpClient {
    http: PeerHttp,
}

impl RoutingHttpClient {
    pub(crate) fn new(http: PeerHttp) -> Self {
        Self { http }
    }
}

#[async_trait]
impl RoutingGateway for RoutingHttpClient {
    async fn get_region_schedule(
        &self,
        market_id: i64,
        service_date: Option<NaiveDate>,
    ) -> Result<RegionSchedule, PeerError> {
        let mut req = self
            .http
            .request(Method::GET, &format!("/api/regions/{market_id}/schedule"));
        if let Some(date) = service_date {
            req = req.query(&[("service_date", date.format("%Y-%m-%d").to_string())]);
        }
        self.http.send_json(req).await
    }
}
