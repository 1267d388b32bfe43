//! Output documents: playlists and programme guides
//!
//! Rendering is stateless; every call takes the snapshot or guide it renders
//! and the options for that call.

pub mod catchup;
pub mod epg_generator;
pub mod generator;

pub use catchup::{CatchUpMode, CatchUpSettings, CatchUpSourceFormat};
pub use epg_generator::{GuideOptions, render_guide};
pub use generator::{PlaylistFormat, PlaylistOptions, RenderedDocument, render_playlist, resolve_url};
