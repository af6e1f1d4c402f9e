//! Transit service scenarios.
//!
//! Assembles a snapshot of the stops, routes and scheduled departures in an
//! area from the Transitland query API, and classifies stops into WSDOT
//! frequency-of-service tiers.

pub mod departures;
pub mod domain;
pub mod filter;
pub mod graphql;
pub mod headway;
pub mod scenario;
pub mod web;
pub mod wsdot;
