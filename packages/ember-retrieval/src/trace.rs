use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Observability only. Nothing in here feeds back into ranking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineTrace {
	pub enhanced_query: Option<String>,
	pub hyde_used: bool,
	pub search_queries: Vec<String>,
	pub stages: Vec<StageTrace>,
	pub error: Option<String>,
}
impl PipelineTrace {
	pub fn failed(error: String) -> Self {
		Self { error: Some(error), ..Self::default() }
	}

	pub fn push(&mut self, stage: StageTrace) {
		self.stages.push(stage);
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTrace {
	pub stage: String,
	pub input: u32,
	pub output: u32,
	pub elapsed_ms: f64,
	#[serde(default)]
	pub dropped_top_scores: Vec<f32>,
}
impl StageTrace {
	pub fn finished(stage: &str, input: usize, output: usize, started: Instant) -> Self {
		Self {
			stage: stage.to_string(),
			input: input as u32,
			output: output as u32,
			elapsed_ms: started.elapsed().as_secs_f64() * 1_000.0,
			dropped_top_scores: Vec::new(),
		}
	}

	pub fn with_dropped(mut self, dropped_top_scores: Vec<f32>) -> Self {
		self.dropped_top_scores = dropped_top_scores;

		self
	}
}
