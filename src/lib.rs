//! Payroll aggregation and statutory-deduction service.
//!
//! [`engine`] holds the payroll core, [`store`] its persistence port with
//! MySQL and in-memory adapters, and [`api`] / [`routes`] the actix-web
//! surface.

pub mod api;
pub mod attendance;
pub mod auth;
pub mod config;
pub mod db;
pub mod docs;
pub mod engine;
pub mod model;
pub mod models;
pub mod routes;
pub mod store;
