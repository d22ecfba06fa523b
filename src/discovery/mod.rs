pub mod list_discoverer;
pub mod record;

pub use list_discoverer::{parse_index, resolve_link, ListDiscoverer, LINK_COLUMN};
pub use record::EntityRecord;
