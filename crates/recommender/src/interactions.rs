//! Interaction log and the stable id encodings derived from it
//!
//! Row `k` of the trained user (item) embedding table belongs to the `k`-th
//! distinct user (item) id in log order. Ids that never appear in the log
//! have no row.

use crate::error::{RecommendError, Result};
use crate::types::{ExternalId, UserId};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{info, instrument};

/// Dense indices for the users and items of the interaction log
#[derive(Debug, Clone, Default)]
pub struct IdEncoding {
    users: Vec<UserId>,
    user_index: HashMap<UserId, usize>,
    items: Vec<ExternalId>,
    item_index: HashMap<ExternalId, usize>,
}

impl IdEncoding {
    /// Encode `(user_id, item_id)` pairs in first-seen order
    pub fn from_pairs(pairs: impl IntoIterator<Item = (UserId, ExternalId)>) -> Self {
        let mut encoding = Self::default();
        for (user_id, item_id) in pairs {
            if !encoding.user_index.contains_key(&user_id) {
                encoding.user_index.insert(user_id, encoding.users.len());
                encoding.users.push(user_id);
            }
            if !encoding.item_index.contains_key(&item_id) {
                encoding.item_index.insert(item_id, encoding.items.len());
                encoding.items.push(item_id);
            }
        }
        encoding
    }

    /// Read a log CSV with `user_id` and `game_id` columns
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
                .ok_or_else(|| {
                    RecommendError::ModelLoad(format!("interaction log has no '{name}' column"))
                })
        };
        let user_column = position("user_id")?;
        let item_column = position("game_id")?;

        let mut pairs = Vec::new();
        for (row, record) in csv_reader.records().enumerate() {
            let record = record?;
            let user_id = record
                .get(user_column)
                .and_then(|v| v.trim().parse::<UserId>().ok());
            let item_id = record
                .get(item_column)
                .and_then(|v| v.trim().parse::<ExternalId>().ok());
            match (user_id, item_id) {
                (Some(user_id), Some(item_id)) => pairs.push((user_id, item_id)),
                _ => {
                    return Err(RecommendError::ModelLoad(format!(
                        "interaction log row {} has an invalid id",
                        row + 1
                    )))
                }
            }
        }
        Ok(Self::from_pairs(pairs))
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let encoding = Self::from_reader(file)?;
        info!(
            users = encoding.users.len(),
            items = encoding.items.len(),
            "Interaction log encoded"
        );
        Ok(encoding)
    }

    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    pub fn items(&self) -> &[ExternalId] {
        &self.items
    }

    pub fn user_index(&self, user_id: UserId) -> Option<usize> {
        self.user_index.get(&user_id).copied()
    }

    pub fn item_index(&self, item_id: ExternalId) -> Option<usize> {
        self.item_index.get(&item_id).copied()
    }

    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }
}
