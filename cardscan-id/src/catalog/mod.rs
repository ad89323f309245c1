// Card Catalog
//
// Boundary to the external card database plus the coordinator that decides
// which queries to run. The coordinator gathers candidates; it never ranks
// them (that is the match scorer's job).

pub mod coordinator;
pub mod set_families;
pub mod tcg_client;

use crate::error::SearchError;
use crate::types::CandidateCard;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use coordinator::{SearchAttempt, SearchCoordinator, SearchLevel, SearchOutcome};
pub use tcg_client::PokemonTcgClient;

/// One structured query against the card database
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardQuery {
    pub name: String,
    pub set_name: Option<String>,
    pub number: Option<String>,
    pub hp: Option<String>,
    /// Match names starting with `name` rather than equal to it
    pub wildcard: bool,
}

impl CardQuery {
    pub fn by_name(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_set(mut self, set_name: Option<&str>) -> Self {
        self.set_name = set_name.map(str::to_string);
        self
    }

    pub fn with_number(mut self, number: Option<&str>) -> Self {
        self.number = number.map(str::to_string);
        self
    }

    pub fn with_hp(mut self, hp: Option<&str>) -> Self {
        self.hp = hp.map(str::to_string);
        self
    }
}

impl std::fmt::Display for CardQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "name={}", self.name)?;
        if self.wildcard {
            f.write_str("*")?;
        }
        if let Some(set) = &self.set_name {
            write!(f, " set={}", set)?;
        }
        if let Some(number) = &self.number {
            write!(f, " number={}", number)?;
        }
        if let Some(hp) = &self.hp {
            write!(f, " hp={}", hp)?;
        }
        Ok(())
    }
}

/// A card database that answers structured queries
#[async_trait]
pub trait CardSearchClient: Send + Sync {
    async fn search(&self, query: &CardQuery) -> Result<Vec<CandidateCard>, SearchError>;
}
