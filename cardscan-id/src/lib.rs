//! # cardscan-id - Trading Card Identification
//!
//! Identifies a physical trading card from a photo:
//!
//! 1. `quality` - score the photo (blur, resolution, exposure)
//! 2. `tier` - route the request to a processing tier
//! 3. `vision` - ask a vision-language model what card it sees
//! 4. `parser` - turn the model's free text into typed fields
//! 5. `catalog` - look up candidate cards with fallback strategies
//! 6. `matching` - score candidates and decide found / not found
//!
//! `pipeline::ScanPipeline` ties the stages together with time-budget,
//! retry and cancellation policy. Each request is independent; the only
//! shared state is the immutable `config::ScanConfig`.

pub mod catalog;
pub mod config;
pub mod error;
pub mod imaging;
pub mod matching;
pub mod parser;
pub mod pipeline;
pub mod quality;
pub mod tier;
pub mod types;
pub mod vision;

pub use config::ScanConfig;
pub use error::{Result, ScanError, SearchError, VisionError};
pub use pipeline::ScanPipeline;
pub use types::{ScanOptions, ScanResult};
