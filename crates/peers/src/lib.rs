//! # Care Manager Peers
//!
//! HTTP implementations of the booking and routing peer contracts defined in
//! `caremanager-core`.
//!
//! Errors are mapped onto [`caremanager_core::PeerError`]; nothing here retries.

pub mod booking;
pub mod config;
mod http;
pub mod routing;

pub use booking::BookingHttpClient;
pub use config::{PeerConfig, PeerConfigError};
pub use routing::RoutingHttpClient;

use http::PeerHttp;

/// Builds both peer clients over one shared connection pool.
pub fn connect(
    config: &PeerConfig,
) -> Result<(BookingHttpClient, RoutingHttpClient), PeerConfigError> {
    let client = config.build_client()?;
    let booking = PeerHttp::new(
        client.clone(),
        config.booking_base_url(),
        config.auth_token(),
    );
    let routing = PeerHttp::new(client, config.routing_base_url(), config.auth_token());
    Ok((
        BookingHttpClient::new(booking),
        RoutingHttpClient::new(routing),
    ))
}
