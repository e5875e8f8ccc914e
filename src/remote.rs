//! The remote database client seam.
//!
//! The coordinator never speaks to a concrete database driver directly:
//! it calls through [`RemoteConnection`], which is implemented by whatever
//! remote database client the host embeds this crate with. This mirrors
//! the way the engine-handler trait in a storage engine lets a single
//! executor drive interchangeable storage backends.

use std::fmt;
use std::str::FromStr;

use crate::error::{GxactError, Result};

/// The host/port/database identity of one remote node, as embedded in
/// action lines (`postgresql://<host>:<port>/<db>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteEndpoint {
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "postgresql://{}:{}/{}", self.host, self.port, self.database)
    }
}

impl FromStr for RemoteEndpoint {
    type Err = GxactError;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s.strip_prefix("postgresql://").ok_or_else(|| {
            GxactError::CorruptLog(format!("connection string missing postgresql:// prefix: {}", s))
        })?;

        let (host_port, database) = rest.split_once('/').ok_or_else(|| {
            GxactError::CorruptLog(format!("connection string missing database: {}", s))
        })?;

        let (host, port_str) = host_port.rsplit_once(':').ok_or_else(|| {
            GxactError::CorruptLog(format!("connection string missing port: {}", s))
        })?;

        let port: u16 = port_str
            .parse()
            .map_err(|_| GxactError::CorruptLog(format!("invalid port in: {}", s)))?;

        Ok(RemoteEndpoint {
            host: host.to_string(),
            port,
            database: database.to_string(),
        })
    }
}

/// A connection to one remote database node, supporting the handful of
/// operations the coordinator needs: run a statement, report whether the
/// link is broken, expose the endpoint identity, and reset after a break.
///
/// Implementations own the actual driver (a pooled `tokio_postgres`
/// client, a test double, etc). The coordinator holds connections opaquely
/// behind this trait and never assumes a particular driver.
pub trait RemoteConnection: Send {
    /// Execute a SQL statement, returning an error if the remote rejects it
    /// or the link is down.
    fn execute(&mut self, sql: &str) -> Result<()>;

    /// Run the prepared-transaction listing probe and report whether any
    /// row was returned for `member_name`. Per spec, presence of a row
    /// (regardless of any "owner" field in it) means "not yet resolved".
    fn probe_prepared(&mut self, member_name: &str) -> Result<bool>;

    /// Whether the connection is known to be broken (closed, errored).
    fn is_broken(&self) -> bool;

    /// Reopen a broken connection using the endpoint this connection was
    /// created against.
    fn reset(&mut self) -> Result<()>;

    /// The endpoint identity (host/port/database) this connection targets.
    fn endpoint(&self) -> &RemoteEndpoint;
}

/// Opens a fresh [`RemoteConnection`] against `endpoint`. Implemented by
/// whatever driver the host embeds this crate with; used by the recovery
/// worker to reopen connections purely from the URL recorded in the log.
pub trait RemoteConnector: Send + Sync {
    fn connect(&self, endpoint: &RemoteEndpoint) -> Result<Box<dyn RemoteConnection>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_round_trips_through_display_and_parse() {
        let ep = RemoteEndpoint {
            host: "remote-a".into(),
            port: 5432,
            database: "db1".into(),
        };
        let s = ep.to_string();
        assert_eq!(s, "postgresql://remote-a:5432/db1");
        let parsed: RemoteEndpoint = s.parse().unwrap();
        assert_eq!(parsed, ep);
    }

    #[test]
    fn parse_rejects_non_postgresql_scheme() {
        let err = "mysql://remote-a:5432/db1".parse::<RemoteEndpoint>().unwrap_err();
        assert!(matches!(err, GxactError::CorruptLog(_)));
    }

    #[test]
    fn parse_rejects_missing_port() {
        let err = "postgresql://remote-a/db1".parse::<RemoteEndpoint>().unwrap_err();
        assert!(matches!(err, GxactError::CorruptLog(_)));
    }
}
