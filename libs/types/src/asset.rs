//! Composite asset key
//!
//! Orders are keyed by the asset they sell: the collection identity plus
//! the numeric token id inside that collection. The key orders by
//! collection first, then token, so keyed maps iterate deterministically.

use crate::ids::{CollectionId, TokenId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The (collection, token) pair identifying one non-fungible asset
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AssetKey {
    pub collection: CollectionId,
    pub token: TokenId,
}

impl AssetKey {
    pub fn new(collection: CollectionId, token: TokenId) -> Self {
        Self { collection, token }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.token)
    }
}
