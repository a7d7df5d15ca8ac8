//! Client Registry - owns inbounds and their ordered client lists
//!
//! Every mutation follows validate → locate → mutate-or-reject → persist.
//! The in-memory change is applied first and rolled back when the repository
//! refuses it, so memory and storage never diverge.
//!
//! Locking: the outer map lock is always taken before a slot lock, never the
//! other way round. Client mutations only touch the map long enough to clone
//! the slot handle; inbound create/replace/delete hold the map write lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::{Client, Inbound};
use crate::error::RegistryError;
use crate::repository::InboundRepository;

/// `None` once the inbound has been deleted
type Slot = Arc<RwLock<Option<Inbound>>>;

#[derive(Default)]
struct Entries {
    by_id: BTreeMap<i64, Slot>,
    tags: HashMap<String, i64>,
}

impl Entries {
    fn from_inbounds(inbounds: Vec<Inbound>) -> Self {
        let mut entries = Self::default();
        for inbound in inbounds {
            entries.tags.insert(inbound.tag.clone(), inbound.id);
            entries
                .by_id
                .insert(inbound.id, Arc::new(RwLock::new(Some(inbound))));
        }
        entries
    }
}

/// In-memory registry of inbounds backed by an [`InboundRepository`]
pub struct ClientRegistry {
    repo: Arc<dyn InboundRepository>,
    entries: RwLock<Entries>,
}

impl ClientRegistry {
    /// Create an empty registry; call [`ClientRegistry::load`] to populate it
    pub fn new(repo: Arc<dyn InboundRepository>) -> Self {
        Self {
            repo,
            entries: RwLock::new(Entries::default()),
        }
    }

    /// Replace the in-memory state with the persisted inbounds
    pub async fn load(&self) -> anyhow::Result<usize> {
        let inbounds = self.repo.list().await?;
        let count = inbounds.len();

        let mut entries = self.entries.write().await;
        // Invalidate handles that in-flight callers may still hold
        for slot in entries.by_id.values() {
            *slot.write().await = None;
        }
        *entries = Entries::from_inbounds(inbounds);

        info!("[Registry] Loaded {} inbounds", count);
        Ok(count)
    }

    async fn slot(&self, inbound_id: i64) -> Result<Slot, RegistryError> {
        self.entries
            .read()
            .await
            .by_id
            .get(&inbound_id)
            .cloned()
            .ok_or(RegistryError::InboundNotFound(inbound_id))
    }

    /// Snapshot of a single inbound
    pub async fn get(&self, inbound_id: i64) -> Result<Inbound, RegistryError> {
        let slot = self.slot(inbound_id).await?;
        let guard = slot.read().await;
        guard
            .clone()
            .ok_or(RegistryError::InboundNotFound(inbound_id))
    }

    /// Snapshot of all inbounds ordered by ID
    pub async fn snapshot(&self) -> Vec<Inbound> {
        let entries = self.entries.read().await;
        let mut inbounds = Vec::with_capacity(entries.by_id.len());
        for slot in entries.by_id.values() {
            if let Some(inbound) = slot.read().await.as_ref() {
                inbounds.push(inbound.clone());
            }
        }
        inbounds
    }

    /// Client list of one inbound
    pub async fn clients(&self, inbound_id: i64) -> Result<Vec<Client>, RegistryError> {
        Ok(self.get(inbound_id).await?.settings.clients)
    }

    // =========================================================================
    // Client mutations
    // =========================================================================

    /// Append a client to an inbound
    pub async fn add_client(&self, inbound_id: i64, client: Client) -> Result<(), RegistryError> {
        let slot = self.slot(inbound_id).await?;
        let mut guard = slot.write().await;
        let inbound = guard
            .as_mut()
            .ok_or(RegistryError::InboundNotFound(inbound_id))?;

        client.validate_for(inbound.protocol)?;

        if inbound.settings.position(&client.id).is_some() {
            return Err(RegistryError::ClientConflict {
                inbound_id,
                client_id: client.id,
            });
        }

        let client_id = client.id.clone();
        inbound.settings.clients.push(client);

        if let Err(e) = self
            .repo
            .update_clients(inbound_id, &inbound.settings.clients)
            .await
        {
            inbound.settings.clients.pop();
            warn!(
                "[Registry] Rolled back add of '{}' to inbound {}: {}",
                client_id, inbound_id, e
            );
            return Err(RegistryError::Persistence {
                inbound_id,
                source: e,
            });
        }

        info!("[Registry] Added client '{}' to inbound {}", client_id, inbound_id);
        Ok(())
    }

    /// Replace the mutable fields of an existing client in place
    ///
    /// Returns the client as stored after the update.
    pub async fn update_client(
        &self,
        inbound_id: i64,
        client: Client,
    ) -> Result<Client, RegistryError> {
        let slot = self.slot(inbound_id).await?;
        let mut guard = slot.write().await;
        let inbound = guard
            .as_mut()
            .ok_or(RegistryError::InboundNotFound(inbound_id))?;

        client.validate_for(inbound.protocol)?;

        let index = inbound
            .settings
            .position(&client.id)
            .ok_or_else(|| RegistryError::ClientNotFound {
                inbound_id,
                client_id: client.id.clone(),
            })?;

        let previous = inbound.settings.clients[index].clone();
        inbound.settings.clients[index].apply_update(&client);

        if let Err(e) = self
            .repo
            .update_clients(inbound_id, &inbound.settings.clients)
            .await
        {
            inbound.settings.clients[index] = previous;
            warn!(
                "[Registry] Rolled back update of '{}' in inbound {}: {}",
                client.id, inbound_id, e
            );
            return Err(RegistryError::Persistence {
                inbound_id,
                source: e,
            });
        }

        info!("[Registry] Updated client '{}' in inbound {}", client.id, inbound_id);
        Ok(inbound.settings.clients[index].clone())
    }

    /// Remove a client, preserving the order of the remaining ones
    ///
    /// Returns the removed client.
    pub async fn delete_client(
        &self,
        inbound_id: i64,
        client_id: &str,
    ) -> Result<Client, RegistryError> {
        let slot = self.slot(inbound_id).await?;
        let mut guard = slot.write().await;
        let inbound = guard
            .as_mut()
            .ok_or(RegistryError::InboundNotFound(inbound_id))?;

        let index =
            inbound
                .settings
                .position(client_id)
                .ok_or_else(|| RegistryError::ClientNotFound {
                    inbound_id,
                    client_id: client_id.to_string(),
                })?;

        let removed = inbound.settings.clients.remove(index);

        if let Err(e) = self
            .repo
            .update_clients(inbound_id, &inbound.settings.clients)
            .await
        {
            inbound.settings.clients.insert(index, removed);
            warn!(
                "[Registry] Rolled back delete of '{}' from inbound {}: {}",
                client_id, inbound_id, e
            );
            return Err(RegistryError::Persistence {
                inbound_id,
                source: e,
            });
        }

        info!("[Registry] Deleted client '{}' from inbound {}", client_id, inbound_id);
        Ok(removed)
    }

    // =========================================================================
    // Inbound mutations
    // =========================================================================

    /// Create an inbound, returning it with the assigned ID
    pub async fn create_inbound(&self, mut inbound: Inbound) -> Result<Inbound, RegistryError> {
        inbound.validate()?;

        let mut entries = self.entries.write().await;
        if entries.tags.contains_key(&inbound.tag) {
            return Err(RegistryError::TagConflict(inbound.tag));
        }

        let id = self
            .repo
            .create(&inbound)
            .await
            .map_err(|source| RegistryError::Persistence {
                inbound_id: inbound.id,
                source,
            })?;
        inbound.id = id;

        entries.tags.insert(inbound.tag.clone(), id);
        entries
            .by_id
            .insert(id, Arc::new(RwLock::new(Some(inbound.clone()))));

        info!("[Registry] Created inbound {} ({})", id, inbound.tag);
        Ok(inbound)
    }

    /// Replace an existing inbound wholesale (tag, protocol, listen, clients)
    pub async fn replace_inbound(&self, inbound: Inbound) -> Result<Inbound, RegistryError> {
        inbound.validate()?;

        let mut entries = self.entries.write().await;
        let slot = entries
            .by_id
            .get(&inbound.id)
            .cloned()
            .ok_or(RegistryError::InboundNotFound(inbound.id))?;

        if let Some(owner) = entries.tags.get(&inbound.tag) {
            if *owner != inbound.id {
                return Err(RegistryError::TagConflict(inbound.tag));
            }
        }

        let mut guard = slot.write().await;
        let current = guard
            .as_mut()
            .ok_or(RegistryError::InboundNotFound(inbound.id))?;

        self.repo
            .update(&inbound)
            .await
            .map_err(|source| RegistryError::Persistence {
                inbound_id: inbound.id,
                source,
            })?;

        entries.tags.remove(&current.tag);
        entries.tags.insert(inbound.tag.clone(), inbound.id);
        *current = inbound.clone();

        info!("[Registry] Replaced inbound {} ({})", inbound.id, inbound.tag);
        Ok(inbound)
    }

    /// Delete an inbound together with its clients
    pub async fn delete_inbound(&self, inbound_id: i64) -> Result<Inbound, RegistryError> {
        let mut entries = self.entries.write().await;
        let slot = entries
            .by_id
            .get(&inbound_id)
            .cloned()
            .ok_or(RegistryError::InboundNotFound(inbound_id))?;

        let mut guard = slot.write().await;
        if guard.is_none() {
            return Err(RegistryError::InboundNotFound(inbound_id));
        }

        self.repo
            .delete(inbound_id)
            .await
            .map_err(|source| RegistryError::Persistence { inbound_id, source })?;

        let removed = guard.take().ok_or(RegistryError::InboundNotFound(inbound_id))?;
        entries.by_id.remove(&inbound_id);
        entries.tags.remove(&removed.tag);

        debug!("[Registry] Inbound {} slot invalidated", inbound_id);
        info!("[Registry] Deleted inbound {} ({})", inbound_id, removed.tag);
        Ok(removed)
    }
}
