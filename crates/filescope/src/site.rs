//! Local-network classification for `local_orig`.

use filescope_core::{FilesError, Result};
use std::net::IpAddr;

/// Answers whether an address belongs to the monitored site.
pub trait SiteClassifier: Send + Sync {
    /// Whether `addr` is inside one of the local networks
    fn is_local_addr(&self, addr: IpAddr) -> bool;

    /// Whether any local networks are configured at all
    fn has_local_nets(&self) -> bool;
}

/// Classifier used when no local networks are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocalNets;

impl SiteClassifier for NoLocalNets {
    fn is_local_addr(&self, _addr: IpAddr) -> bool {
        false
    }

    fn has_local_nets(&self) -> bool {
        false
    }
}

/// A single CIDR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subnet {
    network: IpAddr,
    prefix: u8,
}

impl Subnet {
    /// Whether the block contains `addr`. Mixed address families never match.
    #[must_use]
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.network, addr) {
            (IpAddr::V4(net), IpAddr::V4(a)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(net) & mask == u32::from(a) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(a)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(self.prefix)).unwrap_or(0);
                u128::from(net) & mask == u128::from(a) & mask
            }
            _ => false,
        }
    }
}

impl std::str::FromStr for Subnet {
    type Err = FilesError;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s.split_once('/').unwrap_or((s, ""));
        let network: IpAddr = addr
            .trim()
            .parse()
            .map_err(|e| FilesError::Config(format!("invalid local net {s}: {e}")))?;
        let max = if network.is_ipv4() { 32 } else { 128 };
        let prefix = if prefix.is_empty() {
            max
        } else {
            prefix
                .trim()
                .parse::<u8>()
                .map_err(|e| FilesError::Config(format!("invalid prefix in {s}: {e}")))?
        };
        if prefix > max {
            return Err(FilesError::Config(format!(
                "prefix /{prefix} too long for {network}"
            )));
        }
        Ok(Self { network, prefix })
    }
}

impl std::fmt::Display for Subnet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// The configured set of local networks.
#[derive(Debug, Clone, Default)]
pub struct LocalNets {
    nets: Vec<Subnet>,
}

impl LocalNets {
    /// Parse a list of CIDR strings.
    pub fn parse<S: AsRef<str>>(cidrs: &[S]) -> Result<Self> {
        let nets = cidrs
            .iter()
            .map(|c| c.as_ref().parse())
            .collect::<Result<Vec<Subnet>>>()?;
        Ok(Self { nets })
    }

    pub fn subnets(&self) -> &[Subnet] {
        &self.nets
    }
}

impl SiteClassifier for LocalNets {
    fn is_local_addr(&self, addr: IpAddr) -> bool {
        self.nets.iter().any(|n| n.contains(addr))
    }

    fn has_local_nets(&self) -> bool {
        !self.nets.is_empty()
    }
}
