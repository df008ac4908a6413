//! Distribution engine: claim a ready token, fan the chunk out to everyone else

use contracts::{ConnectionId, ConnectionInfo};
use mio::{Registry, Token};

use crate::endpoint::{Endpoint, Serviced};

/// Bytes accepted by one destination connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub to: ConnectionId,
    pub bytes: usize,
}

/// Result of distributing one chunk
#[derive(Debug, Default)]
pub struct Distribution {
    pub deliveries: Vec<Delivery>,
    /// Connections that failed during the send and were removed
    pub dropped: Vec<ConnectionInfo>,
}

impl Distribution {
    pub fn merge(&mut self, other: Distribution) {
        self.deliveries.extend(other.deliveries);
        self.dropped.extend(other.dropped);
    }

    pub fn bytes_sent(&self) -> usize {
        self.deliveries.iter().map(|d| d.bytes).sum()
    }

    pub fn recipients(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.deliveries.iter().map(|d| d.to)
    }
}

/// Hand `token` to the first endpoint that owns it
pub fn claim_readable(
    endpoints: &mut [Box<dyn Endpoint>],
    token: Token,
    registry: &Registry,
) -> Serviced {
    for endpoint in endpoints.iter_mut() {
        match endpoint.service_readable(token, registry) {
            Serviced::NotOwned => continue,
            serviced => return serviced,
        }
    }
    Serviced::NotOwned
}

pub fn claim_writable(
    endpoints: &mut [Box<dyn Endpoint>],
    token: Token,
    registry: &Registry,
) -> Serviced {
    for endpoint in endpoints.iter_mut() {
        match endpoint.service_writable(token, registry) {
            Serviced::NotOwned => continue,
            serviced => return serviced,
        }
    }
    Serviced::NotOwned
}

/// Any-to-all relay: every endpoint distributes, the origin endpoint skips the sender
pub fn distribute_round(
    endpoints: &mut [Box<dyn Endpoint>],
    data: &[u8],
    registry: &Registry,
) -> Distribution {
    let mut round = Distribution::default();
    for endpoint in endpoints.iter_mut() {
        round.merge(endpoint.distribute(data, registry));
    }
    round
}
