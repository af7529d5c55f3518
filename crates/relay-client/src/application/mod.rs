//! Application layer use cases for the relay.
//!
//! - **`detect_direction`** – Turns platform volume notifications (absolute
//!   levels or raw key presses) into [`relay_core::DirectionEvent`]s and keeps
//!   the device volume away from its limits with a debounced midpoint reset.
//!
//! - **`relay_service`** – The façade the host application talks to.  Owns the
//!   connection and the detector subscription for one `start`/`stop` cycle and
//!   forwards connection status changes to an injected [`relay_service::StatusSink`].

pub mod detect_direction;
pub mod relay_service;
