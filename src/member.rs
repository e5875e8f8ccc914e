//! A single remote session participating in a transaction set.

use crate::remote::{RemoteConnection, RemoteEndpoint};

/// One participating remote node: its connection handle and the derived
/// unique name used in `PREPARE TRANSACTION '<name>'` and its siblings.
///
/// Created at registration, held until the set completes. On INCOMPLETE
/// recovery, the connection is reacquired from the endpoint recorded in
/// the log rather than reused from the live session.
pub struct Member {
    pub name: String,
    pub endpoint: RemoteEndpoint,
    pub connection: Box<dyn RemoteConnection>,
}

impl Member {
    pub fn new(name: String, endpoint: RemoteEndpoint, connection: Box<dyn RemoteConnection>) -> Self {
        Self {
            name,
            endpoint,
            connection,
        }
    }
}

impl std::fmt::Debug for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Member")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
