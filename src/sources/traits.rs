//! Upstream collaborator traits
//!
//! The directory, aggregator and renderer only ever talk to the provider
//! through these seams. Each trait is small and focused on a single upstream
//! concern so test doubles stay trivial.

use async_trait::async_trait;

use crate::errors::SourceResult;
use crate::models::{Channel, DayAddressing, DayKey, RawChannelRecord, RawProgramEntry};

/// Fetches the full channel list from the provider
#[async_trait]
pub trait ChannelAcquirer: Send + Sync {
    /// Short name used in logs
    fn source_name(&self) -> &str;

    /// Fetch every channel record. An upstream that answers with no records
    /// reports `SourceError::Empty`, never an empty vector.
    async fn fetch_all_channels(&self) -> SourceResult<Vec<RawChannelRecord>>;
}

/// Fetches the programme listing of one channel on one day
#[async_trait]
pub trait ProgramFetcher: Send + Sync {
    /// Dialect name used in logs
    fn dialect_name(&self) -> &str;

    /// How this upstream wants days addressed
    fn addressing(&self) -> DayAddressing;

    /// Fetch one day. A day the upstream has no listing for is reported as
    /// `SourceError::DayNotFound`.
    async fn fetch_day_program(
        &self,
        channel: &Channel,
        day: DayKey,
    ) -> SourceResult<Vec<RawProgramEntry>>;
}

/// Answers whether a logo asset exists for an identity
pub trait LogoExistence: Send + Sync {
    fn logo_exists(&self, identity: &str) -> bool;
}

/// Logo lookups that never find anything, for outputs without logos
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLogos;

impl LogoExistence for NoLogos {
    fn logo_exists(&self, _identity: &str) -> bool {
        false
    }
}
