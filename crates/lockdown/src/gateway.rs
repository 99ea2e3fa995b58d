//! Session gateway traits.
//!
//! A gateway opens a [`DeviceSession`] for a device identifier; the session
//! answers domain queries until it is closed. Implementations report every
//! failure per call and never retry on their own.

use std::future::Future;
use std::pin::Pin;

use crate::SessionError;
use crate::types::{Domain, PropertyBag};

/// A boxed future returned by gateway and session methods.
pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opens lockdown sessions to connected devices.
pub trait SessionGateway: Send + Sync + 'static {
    /// Connects to `device_id` and negotiates a trusted session.
    ///
    /// Fails with [`SessionError::Connect`] when the device cannot be reached
    /// and [`SessionError::Handshake`] when the session is refused.
    fn open<'a>(
        &'a self,
        device_id: &'a str,
    ) -> GatewayFuture<'a, Result<Box<dyn DeviceSession>, SessionError>>;
}

/// An open session to one device.
pub trait DeviceSession: Send {
    /// Identifier of the device this session talks to.
    fn device_id(&self) -> &str;

    /// Queries one lockdown domain.
    fn query(&mut self, domain: Domain) -> GatewayFuture<'_, Result<PropertyBag, SessionError>>;

    /// Releases the session. Called exactly once, after the last query.
    fn close(&mut self);
}
