//! Material confirmation
//!
//! Tracks a task's (item, quantity) material lines. Lines are added and
//! adjusted individually while unconfirmed; a single confirm-all operation
//! sends the full list to the backend and freezes it on success. Independent
//! of media fulfillment; the two meet only in the completion gate.

use crate::error::{Error, Result};
use fwmp_common::models::MaterialLine;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct BoardInner {
    lines: Vec<MaterialLine>,
    frozen: bool,
}

/// Shared material line board for one task
#[derive(Debug, Clone, Default)]
pub struct MaterialBoard {
    inner: Arc<RwLock<BoardInner>>,
}

impl MaterialBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the board from server data.
    ///
    /// A non-empty list where every line is confirmed means a confirm-all
    /// already succeeded in a previous session; the board starts frozen.
    pub async fn seed(&self, lines: Vec<MaterialLine>) {
        let mut inner = self.inner.write().await;
        inner.frozen = !lines.is_empty() && lines.iter().all(|l| l.confirmed);
        inner.lines = lines;
    }

    pub async fn lines(&self) -> Vec<MaterialLine> {
        self.inner.read().await.lines.clone()
    }

    pub async fn is_frozen(&self) -> bool {
        self.inner.read().await.frozen
    }

    /// Add a material line. Quantity must be at least 1.
    pub async fn add_line(&self, name: String, quantity: u32, unit: String) -> Result<MaterialLine> {
        if quantity < 1 {
            return Err(Error::BadRequest("quantity must be at least 1".to_string()));
        }
        let mut inner = self.inner.write().await;
        if inner.frozen {
            return Err(Error::MaterialsFrozen);
        }
        let line = MaterialLine {
            item_id: Uuid::new_v4(),
            name,
            quantity,
            unit,
            confirmed: false,
        };
        inner.lines.push(line.clone());
        Ok(line)
    }

    /// Adjust a line's quantity. Only allowed while unconfirmed.
    pub async fn set_quantity(&self, item_id: Uuid, quantity: u32) -> Result<()> {
        if quantity < 1 {
            return Err(Error::BadRequest("quantity must be at least 1".to_string()));
        }
        let mut inner = self.inner.write().await;
        if inner.frozen {
            return Err(Error::MaterialsFrozen);
        }
        let line = inner
            .lines
            .iter_mut()
            .find(|l| l.item_id == item_id)
            .ok_or(Error::UnknownMaterial(item_id))?;
        line.quantity = quantity;
        Ok(())
    }

    /// Remove a line. Only allowed while unconfirmed.
    pub async fn remove_line(&self, item_id: Uuid) -> Result<MaterialLine> {
        let mut inner = self.inner.write().await;
        if inner.frozen {
            return Err(Error::MaterialsFrozen);
        }
        let index = inner
            .lines
            .iter()
            .position(|l| l.item_id == item_id)
            .ok_or(Error::UnknownMaterial(item_id))?;
        Ok(inner.lines.remove(index))
    }

    /// The list as it would be confirmed: every line marked confirmed.
    /// Used to build the confirm-all payload before the backend call.
    pub async fn confirmed_payload(&self) -> Vec<MaterialLine> {
        self.inner
            .read()
            .await
            .lines
            .iter()
            .map(|l| MaterialLine {
                confirmed: true,
                ..l.clone()
            })
            .collect()
    }

    /// Freeze the board after a successful confirm-all.
    ///
    /// Local lines flip to confirmed only here, on explicit backend
    /// acknowledgement; a failed confirm-all leaves the board untouched.
    pub async fn mark_confirmed(&self) {
        let mut inner = self.inner.write().await;
        for line in &mut inner.lines {
            line.confirmed = true;
        }
        inner.frozen = true;
    }
}
