//! Upstream adapters for channels, guide days and logo assets

pub mod channels;
pub mod epg_date;
pub mod epg_index;
pub mod factory;
pub mod logo;
pub mod traits;

pub use channels::{FileChannelAcquirer, HttpChannelAcquirer};
pub use epg_date::DateProgramFetcher;
pub use epg_index::DayIndexProgramFetcher;
pub use factory::SourceFactory;
pub use logo::LogoDirectory;
pub use traits::{ChannelAcquirer, LogoExistence, NoLogos, ProgramFetcher};
