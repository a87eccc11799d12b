use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Unique identifier of a file under analysis.
///
/// Assigned once by the extraction engine (usually by hashing a
/// protocol-derived handle) and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fuid(String);

impl Fuid {
    /// Wrap an engine-assigned identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fuid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Fuid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Transport protocol of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// TCP protocol
    Tcp,
    /// UDP protocol
    Udp,
}

impl Default for Transport {
    fn default() -> Self {
        Self::Tcp
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// A tracked network connection that carried (part of) a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Connection unique id (e.g. `CHhAvVGS1DHFjwGM9`)
    pub uid: String,

    /// Originator address
    pub orig_h: IpAddr,

    /// Originator port
    #[serde(default)]
    pub orig_p: u16,

    /// Responder address
    pub resp_h: IpAddr,

    /// Responder port
    #[serde(default)]
    pub resp_p: u16,

    /// Transport protocol
    #[serde(default)]
    pub proto: Transport,
}

impl Connection {
    /// Build a connection from its uid and endpoint addresses.
    pub fn new(uid: impl Into<String>, orig_h: IpAddr, resp_h: IpAddr) -> Self {
        Self {
            uid: uid.into(),
            orig_h,
            orig_p: 0,
            resp_h,
            resp_p: 0,
            proto: Transport::Tcp,
        }
    }

    /// Set the endpoint ports.
    #[must_use]
    pub const fn with_ports(mut self, orig_p: u16, resp_p: u16) -> Self {
        self.orig_p = orig_p;
        self.resp_p = resp_p;
        self
    }

    /// Host that transmitted the file over this connection.
    ///
    /// `file_is_orig` is whether the file was sent by the connection's
    /// originator.
    #[must_use]
    pub const fn transmitter(&self, file_is_orig: bool) -> IpAddr {
        if file_is_orig {
            self.orig_h
        } else {
            self.resp_h
        }
    }

    /// Host that received the file over this connection.
    #[must_use]
    pub const fn receiver(&self, file_is_orig: bool) -> IpAddr {
        if file_is_orig {
            self.resp_h
        } else {
            self.orig_h
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_follows_file_origin() {
        let conn = Connection::new(
            "C1",
            "10.0.0.1".parse().unwrap(),
            "192.0.2.80".parse().unwrap(),
        );
        assert_eq!(conn.transmitter(true), conn.orig_h);
        assert_eq!(conn.receiver(true), conn.resp_h);
        assert_eq!(conn.transmitter(false), conn.resp_h);
        assert_eq!(conn.receiver(false), conn.orig_h);
    }

    #[test]
    fn test_connection_defaults_from_json() {
        let conn: Connection =
            serde_json::from_str(r#"{"uid":"C2","orig_h":"::1","resp_h":"::2"}"#).unwrap();
        assert_eq!(conn.orig_p, 0);
        assert_eq!(conn.proto, Transport::Tcp);
    }

    #[test]
    fn test_with_ports_keeps_hosts() {
        let conn = Connection::new("C3", "10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap())
            .with_ports(40_000, 443);
        assert_eq!((conn.orig_p, conn.resp_p), (40_000, 443));
        assert_eq!(conn.uid, "C3");
        assert_eq!(conn.transmitter(false), conn.resp_h);
    }
}
