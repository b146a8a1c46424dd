pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The backend could not be reached or refused the call. Triggers a
	/// fallback step when one exists.
	#[error("Backend unavailable: {0}")]
	Unavailable(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
}
