pub mod detail_extractor;
pub mod infobox;
pub mod output_manager;

pub use detail_extractor::{DetailExtractor, DetailOutcome, OutcomeStatus, SavedImage};
pub use infobox::{classify_infobox, ImageRef, ImageRole, InfoboxState};
pub use output_manager::{sanitize_entity_name, ConfigSnapshot, HarvestReport, OutputManager};
