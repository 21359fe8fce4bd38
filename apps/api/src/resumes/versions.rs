//! Version chains.
//!
//! Résumés are held in a flat map keyed by id; a version points at its
//! predecessor by key only. Walking a chain is bounded and guarded by a
//! visited set, so a corrupt chain is reported instead of looping.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::models::resume::ResumeRow;

pub const DEFAULT_CHAIN_LIMIT: usize = 256;

#[derive(Debug, Error, PartialEq)]
pub enum ChainError {
    #[error("Resume {0} is not part of this version graph")]
    UnknownStart(Uuid),

    #[error("Version chain starting at {start} loops back to {repeated}")]
    Cycle { start: Uuid, repeated: Uuid },

    #[error("Version chain starting at {start} exceeds {limit} versions")]
    TooLong { start: Uuid, limit: usize },
}

#[derive(Debug, Clone, Default)]
pub struct VersionGraph {
    nodes: HashMap<Uuid, ResumeRow>,
}

impl VersionGraph {
    pub fn new(rows: impl IntoIterator<Item = ResumeRow>) -> Self {
        Self {
            nodes: rows.into_iter().map(|row| (row.id, row)).collect(),
        }
    }

    /// `start` and every predecessor reachable from it, highest version first.
    ///
    /// A predecessor key that is not in the graph ends the chain.
    pub fn chain_from(&self, start: Uuid, limit: usize) -> Result<Vec<ResumeRow>, ChainError> {
        if !self.nodes.contains_key(&start) {
            return Err(ChainError::UnknownStart(start));
        }

        let mut visited = HashSet::new();
        let mut chain = Vec::new();
        let mut cursor = Some(start);

        while let Some(id) = cursor {
            let Some(node) = self.nodes.get(&id) else {
                warn!("Version chain of {start} references missing resume {id}; stopping there");
                break;
            };
            if !visited.insert(id) {
                return Err(ChainError::Cycle { start, repeated: id });
            }
            if chain.len() == limit {
                return Err(ChainError::TooLong { start, limit });
            }
            chain.push(node.clone());
            cursor = node.previous_version;
        }

        chain.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(chain)
    }
}
