//! The syncable-entity contract.

use crate::error::{ModelError, ModelResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// A record kind that can be replayed against the backend.
///
/// The remote identifier is `None` until the backend has acknowledged a
/// create. A stored or received value of `0` also means unassigned.
pub trait SyncEntity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Outbox table name for this kind.
    const TABLE: &'static str;

    /// REST resource segment for this kind (`/{resource}/`).
    const RESOURCE: &'static str;

    /// Local identifier.
    fn local_id(&self) -> u64;

    /// Display name. Used when matching local and remote records by name.
    fn name(&self) -> &str;

    /// Assigned remote identifier, if any.
    fn remote_id(&self) -> Option<u64>;

    /// Mutable access to the remote identifier slot.
    fn remote_id_mut(&mut self) -> &mut Option<u64>;

    /// Local id of the category this record refers to, if any.
    fn category_ref(&self) -> Option<u64> {
        None
    }

    /// Returns a copy whose category reference is `category_id`.
    ///
    /// Used to swap the local category id for the remote one before the
    /// record is sent.
    fn with_category_ref(&self, _category_id: Option<u64>) -> Self {
        self.clone()
    }

    /// Assigns the server-issued identifier.
    ///
    /// Re-assigning the same value is a no-op. A different non-zero value is
    /// refused so an acknowledged record never changes identity.
    fn assign_remote_id(&mut self, id: u64) -> ModelResult<()> {
        if id == 0 {
            return Err(ModelError::UnassignedRemoteId);
        }
        let local_id = self.local_id();
        let slot = self.remote_id_mut();
        match slot.filter(|current| *current != 0) {
            Some(current) if current != id => Err(ModelError::RemoteIdConflict {
                local_id,
                current,
                offered: id,
            }),
            _ => {
                *slot = Some(id);
                Ok(())
            }
        }
    }
}

/// Minimal shape of a record returned by the backend.
///
/// Only `id` is required; `localId` and `name` are echoed by some servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    /// Server-issued identifier.
    pub id: u64,
    /// Echo of the client's local identifier.
    #[serde(default)]
    pub local_id: Option<u64>,
    /// Echo of the record name.
    #[serde(default)]
    pub name: Option<String>,
}

impl RemoteRecord {
    /// Decodes a response body.
    pub fn from_json(bytes: &[u8]) -> ModelResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Maps a missing, null or zero `id` to `None`.
pub(crate) fn deserialize_remote_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<u64>::deserialize(deserializer)?;
    Ok(raw.filter(|id| *id != 0))
}
