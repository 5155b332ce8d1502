//! # Bizflow Channels
//!
//! Outbound notification delivery for agent steps. Email over SMTP is the
//! only channel agents can address today.

pub mod email;

pub use email::EmailNotifier;
