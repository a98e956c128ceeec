pub mod candidate;
pub mod query;
pub mod text;
pub mod time_serde;

pub use candidate::{
	Candidate, CombineMethod, Corpus, FusionKind, RetrievalMethod, SelectStrategy, StageRecord,
};
pub use query::EnhancedQuery;
