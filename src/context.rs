//! Who triggered a send.
//!
//! The mail service records the caller's IP address and a free-form source
//! label in each log row. Web frameworks fill a [`RequestContext`] from the
//! incoming request; background jobs can use [`RequestContext::default`].

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Request metadata recorded with each delivery attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Value of the `X-Real-IP` header.
    pub real_ip: Option<String>,
    /// Value of the `X-Forwarded-For` header.
    pub forwarded_for: Option<String>,
    /// Peer address of the connection.
    pub remote_addr: Option<String>,
    /// What triggered the send (plugin, job name, ...).
    pub source: String,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn real_ip(mut self, value: impl Into<String>) -> Self {
        self.real_ip = Some(value.into());
        self
    }

    pub fn forwarded_for(mut self, value: impl Into<String>) -> Self {
        self.forwarded_for = Some(value.into());
        self
    }

    pub fn remote_addr(mut self, value: impl Into<String>) -> Self {
        self.remote_addr = Some(value.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Best guess at the client address.
    ///
    /// `X-Real-IP` wins. Otherwise the first `X-Forwarded-For` entry is used,
    /// and only if it is a valid IP (an `ip:port` form is accepted). The
    /// peer address is the last resort. Returns an empty string when
    /// nothing usable is present.
    pub fn client_ip(&self) -> String {
        if let Some(ip) = &self.real_ip {
            return ip.trim().to_string();
        }
        if let Some(forwarded) = &self.forwarded_for {
            let first = forwarded.split(',').next().unwrap_or_default().trim();
            return parse_ip(first).map(|ip| ip.to_string()).unwrap_or_default();
        }
        self.remote_addr
            .as_deref()
            .map(|addr| addr.trim().to_string())
            .unwrap_or_default()
    }
}

fn parse_ip(value: &str) -> Option<IpAddr> {
    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip);
    }
    if let Ok(sock) = value.parse::<std::net::SocketAddr>() {
        return Some(sock.ip());
    }
    None
}
