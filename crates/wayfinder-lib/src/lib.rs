//! Wayfinder library entry points.
//!
//! This crate holds everything the HTTP services need that is not HTTP glue:
//! validating coordinate pairs, calling the routing provider, re-mapping its
//! geometry into the public `[lat, lng]` order, and the identity collaborator
//! used by the profile endpoints. Services should depend on the items exported
//! here instead of reimplementing them.

#![deny(warnings)]

pub mod coordinate;
pub mod error;
pub mod identity;
pub mod provider;

pub use coordinate::{remap, Coordinate, LatLng, LngLat, RouteRequest, RouteResult};
pub use error::{Error, Result, UPSTREAM_FALLBACK_MESSAGE};
pub use identity::{
    Identity, IdentityStore, MemoryIdentityStore, NewAccount, Profile, ProfileUpdate, Session,
    SessionToken, User, UserId, DEFAULT_HASH_COST, DEFAULT_SESSION_DAYS, MIN_HASH_COST,
};
pub use provider::{
    parse_provider_body, ProviderConfig, RoutingClient, DEFAULT_PROVIDER_URL, DEFAULT_TIMEOUT,
    DEFAULT_VEHICLE,
};
