pub mod models;
pub mod site;

pub use models::{Annotation, Article, Category, EnrichedArticle, HistoryEntry, SourceKind, FALLBACK_TAG};
pub use site::SiteStore;
