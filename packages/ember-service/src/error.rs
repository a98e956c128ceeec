pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Qdrant error: {message}")]
	Qdrant { message: String },
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<ember_storage::Error> for Error {
	fn from(err: ember_storage::Error) -> Self {
		match err {
			ember_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			ember_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			ember_storage::Error::NotFound(message) => Self::NotFound { message },
			ember_storage::Error::Qdrant(inner) => Self::Qdrant { message: inner.to_string() },
		}
	}
}

impl From<ember_retrieval::Error> for Error {
	fn from(err: ember_retrieval::Error) -> Self {
		match err {
			ember_retrieval::Error::Policy { message } => Self::InvalidRequest { message },
			other => Self::Provider { message: other.to_string() },
		}
	}
}
