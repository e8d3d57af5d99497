//! Helios lead bot: a scripted sales conversation that captures leads.

pub mod config;
pub mod delivery;
pub mod error;
pub mod extract;
pub mod flow;
pub mod lead;
pub mod routes;
pub mod surface;
