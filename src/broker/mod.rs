//! Channel registry and fan-out delivery.
//!
//! The [`Broker`] maps channel names to ordered subscriber lists and performs
//! produce/broadcast fan-out against a snapshot of those lists. One broker
//! instance is created by the process composition root and shared by handle
//! with every stream; there is no ambient global registry.

mod registry;

pub use registry::Broker;
