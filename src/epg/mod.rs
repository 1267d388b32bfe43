//! Electronic programme guide: aggregation and caching

pub mod aggregator;
pub mod store;

pub use aggregator::{EpgAggregator, EpgWindow, build_date_program_list, parse_program_times};
pub use store::{Guide, GuideStore, WindowSettings};
