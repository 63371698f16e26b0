//! Apply, then commit or revert.
//!
//! `OptimisticList` keeps two views of a collection: the last state the server
//! confirmed, and the displayed state, which is the confirmed state with every
//! in-flight change replayed on top. Reverting a change drops it and replays
//! the rest, so a failed mutation leaves the collection exactly as it would
//! have been had it never been issued. Only one change per entity may be in
//! flight.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{AppError, ErrorKind};
use crate::model::{Entity, EntityId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationKind {
    Create,
    Update,
    Complete,
    Delete,
}

/// What to do with the local list once the server accepts a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reconcile {
    TrustLocal,
    Refetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    pub create: Reconcile,
    pub update: Reconcile,
    pub complete: Reconcile,
    pub delete: Reconcile,
}

impl ReconcilePolicy {
    // Creates re-fetch because the server assigns the id. Completions re-fetch
    // because the server stamps the completion date and moves the streak.
    pub const TASKS: Self = Self {
        create: Reconcile::Refetch,
        update: Reconcile::TrustLocal,
        complete: Reconcile::Refetch,
        delete: Reconcile::TrustLocal,
    };

    pub const PLANS: Self = Self {
        create: Reconcile::Refetch,
        update: Reconcile::TrustLocal,
        complete: Reconcile::TrustLocal,
        delete: Reconcile::TrustLocal,
    };

    pub const STUDY_ITEMS: Self = Self {
        create: Reconcile::Refetch,
        update: Reconcile::TrustLocal,
        complete: Reconcile::Refetch,
        delete: Reconcile::TrustLocal,
    };

    #[must_use]
    pub const fn for_kind(&self, kind: MutationKind) -> Reconcile {
        match kind {
            MutationKind::Create => self.create,
            MutationKind::Update => self.update,
            MutationKind::Complete => self.complete,
            MutationKind::Delete => self.delete,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MutationId(pub String);

impl MutationId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("entity {id} already has a mutation in flight")]
    EntityBusy { id: EntityId },
    #[error("entity {id} not found")]
    NotFound { id: EntityId },
    #[error("entity {id} is already present")]
    DuplicateId { id: EntityId },
    #[error("entity {id} has not been saved yet")]
    NotPersisted { id: EntityId },
}

impl From<MutationError> for AppError {
    fn from(e: MutationError) -> Self {
        let (kind, message) = match &e {
            MutationError::EntityBusy { .. } => {
                (ErrorKind::Conflict, "Please wait for the previous change to finish")
            }
            MutationError::NotFound { .. } => (ErrorKind::NotFound, "Item not found"),
            MutationError::DuplicateId { .. } => (ErrorKind::Internal, "Item already exists"),
            MutationError::NotPersisted { .. } => {
                (ErrorKind::Conflict, "This item is still being saved")
            }
        };
        AppError::new(kind, message).with_context("mutation_error", e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertAt {
    #[default]
    Front,
    Back,
}

#[derive(Debug, Clone, PartialEq)]
enum Change<T> {
    Insert { entity: T, at: InsertAt },
    Replace(T),
    Remove(EntityId),
}

impl<T: Entity> Change<T> {
    fn entity_id(&self) -> &EntityId {
        match self {
            Self::Insert { entity, .. } | Self::Replace(entity) => entity.id(),
            Self::Remove(id) => id,
        }
    }

    fn apply_to(&self, items: &mut Vec<T>) {
        match self {
            Self::Insert { entity, at } => {
                if items.iter().any(|e| e.id() == entity.id()) {
                    return;
                }
                match at {
                    InsertAt::Front => items.insert(0, entity.clone()),
                    InsertAt::Back => items.push(entity.clone()),
                }
            }
            Self::Replace(entity) => {
                if let Some(slot) = items.iter_mut().find(|e| e.id() == entity.id()) {
                    *slot = entity.clone();
                }
            }
            Self::Remove(id) => items.retain(|e| e.id() != id),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingMutation<T> {
    id: MutationId,
    kind: MutationKind,
    change: Change<T>,
}

/// A mutation that has left the in-flight set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled {
    pub entity_id: EntityId,
    pub kind: MutationKind,
}

#[derive(Debug, Clone)]
pub struct OptimisticList<T> {
    confirmed: Vec<T>,
    items: Vec<T>,
    pending: Vec<PendingMutation<T>>,
}

impl<T> Default for OptimisticList<T> {
    fn default() -> Self {
        Self {
            confirmed: Vec::new(),
            items: Vec::new(),
            pending: Vec::new(),
        }
    }
}

impl<T: Entity> OptimisticList<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_items(items: Vec<T>) -> Self {
        Self {
            confirmed: items.clone(),
            items,
            pending: Vec::new(),
        }
    }

    /// The displayed collection.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&T> {
        self.items.iter().find(|e| e.id() == id)
    }

    #[must_use]
    pub fn is_busy(&self, id: &EntityId) -> bool {
        self.pending.iter().any(|p| p.change.entity_id() == id)
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn apply_create(&mut self, entity: T, at: InsertAt) -> Result<MutationId, MutationError> {
        let id = entity.id().clone();
        self.ensure_idle(&id)?;
        if self.get(&id).is_some() {
            return Err(MutationError::DuplicateId { id });
        }

        Ok(self.push(MutationKind::Create, Change::Insert { entity, at }))
    }

    /// Applies `mutate` to a copy of the entity and displays the result.
    pub fn apply_update(
        &mut self,
        id: &EntityId,
        kind: MutationKind,
        mutate: impl FnOnce(&mut T),
    ) -> Result<MutationId, MutationError> {
        self.ensure_persisted_and_idle(id)?;
        let mut updated = self
            .get(id)
            .cloned()
            .ok_or_else(|| MutationError::NotFound { id: id.clone() })?;
        mutate(&mut updated);

        Ok(self.push(kind, Change::Replace(updated)))
    }

    pub fn apply_remove(&mut self, id: &EntityId) -> Result<MutationId, MutationError> {
        self.ensure_persisted_and_idle(id)?;
        if self.get(id).is_none() {
            return Err(MutationError::NotFound { id: id.clone() });
        }

        Ok(self.push(MutationKind::Delete, Change::Remove(id.clone())))
    }

    /// Swaps the local id of a pending create for the id the server assigned,
    /// so the row can be mutated without waiting for a refetch. Other kinds of
    /// mutation are left alone.
    pub fn assign_server_id(&mut self, mutation_id: &MutationId, server_id: i64) -> bool {
        let Some(pending) = self.pending.iter_mut().find(|p| &p.id == mutation_id) else {
            return false;
        };
        let Change::Insert { entity, .. } = &mut pending.change else {
            return false;
        };
        entity.set_id(EntityId::Server(server_id));
        self.rebuild();
        true
    }

    /// The server accepted the mutation; its change becomes part of the
    /// confirmed state. Unknown ids return `None`.
    pub fn commit(&mut self, mutation_id: &MutationId) -> Option<Settled> {
        let pending = self.take(mutation_id)?;
        pending.change.apply_to(&mut self.confirmed);
        self.rebuild();

        Some(Settled {
            entity_id: pending.change.entity_id().clone(),
            kind: pending.kind,
        })
    }

    /// The server rejected the mutation, or could not be reached.
    pub fn revert(&mut self, mutation_id: &MutationId) -> Option<Settled> {
        let pending = self.take(mutation_id)?;
        self.rebuild();

        Some(Settled {
            entity_id: pending.change.entity_id().clone(),
            kind: pending.kind,
        })
    }

    /// Installs a fresh server copy. Mutations still in flight stay displayed
    /// on top of it.
    pub fn replace_all(&mut self, items: Vec<T>) {
        self.confirmed = items;
        self.rebuild();
    }

    fn ensure_idle(&self, id: &EntityId) -> Result<(), MutationError> {
        if self.is_busy(id) {
            return Err(MutationError::EntityBusy { id: id.clone() });
        }
        Ok(())
    }

    fn ensure_persisted_and_idle(&self, id: &EntityId) -> Result<(), MutationError> {
        self.ensure_idle(id)?;
        if id.is_local() {
            return Err(MutationError::NotPersisted { id: id.clone() });
        }
        Ok(())
    }

    fn push(&mut self, kind: MutationKind, change: Change<T>) -> MutationId {
        let id = MutationId::generate();
        change.apply_to(&mut self.items);
        self.pending.push(PendingMutation {
            id: id.clone(),
            kind,
            change,
        });
        id
    }

    fn take(&mut self, mutation_id: &MutationId) -> Option<PendingMutation<T>> {
        let index = self.pending.iter().position(|p| &p.id == mutation_id)?;
        Some(self.pending.remove(index))
    }

    fn rebuild(&mut self) {
        let mut items = self.confirmed.clone();
        for pending in &self.pending {
            pending.change.apply_to(&mut items);
        }
        self.items = items;
    }
}
