//! Typed facades over the two remote peers.

pub mod booking;
pub mod routing;

pub use booking::{
    AvailabilityQuery, AvailabilitySlot, AvailabilityStatus, BookingGateway, DispatchLocation,
    DispatchRecord, DispatchStatus, DispatchStatusUpdate, EtaWindow, Market, ServiceLine,
};
pub use routing::RoutingGateway;
