//! evidyne-web — HTTP surface for the research session.
//! Exposes:
//!   - JSON state snapshot and transition endpoints
//!   - keyword / document selection toggles
//!   - plain-text report export
//!   - SSE progress stream

pub mod config;
pub mod handlers;
pub mod router;
pub mod sse;
pub mod state;
