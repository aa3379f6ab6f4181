//! RepuStore: auto-parts marketplace backend.
//!
//! ## Features
//! - Catalog with vehicle filters and facets
//! - Guest and user carts, merged on sign-in and revalidated against stock
//! - Mercado Pago checkout with idempotent, transactional order creation
//! - Orders, invoices by mail and a sales dashboard
//! - Reviews, favorites, stock entries and suppliers

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod media;
pub mod notifications;
pub mod payments;
pub mod publisher;
pub mod repository;
pub mod routes;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use routes::router;
pub use state::AppState;
