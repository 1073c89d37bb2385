//! API Module
//!
//! HTTP handlers and routing through which a host drives the adapters, the
//! invalidation queue and the realign hook.
//!
//! # Endpoints
//! - `PUT /set`, `GET /get/:key`, `DELETE /del/:key` - Entry access
//! - `GET /invalidations`, `POST /invalidations` - Deferred invalidations
//! - `POST /realign` - Realignment point
//! - `DELETE /cache`, `DELETE /cache/:adapter` - Full clear
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
