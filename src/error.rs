use std::any::Any;
use std::any::type_name;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Number of arguments a method accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
	Exact(usize),
	AtLeast(usize),
	Range(usize, usize),
}

impl Arity {
	pub fn accepts(&self, given: usize) -> bool {
		match *self {
			Arity::Exact(n) => given == n,
			Arity::AtLeast(min) => given >= min,
			Arity::Range(min, max) => given >= min && given <= max,
		}
	}
}

impl From<usize> for Arity {
	fn from(value: usize) -> Self {
		Arity::Exact(value)
	}
}

// lets bare integer literals name an exact arity
impl From<i32> for Arity {
	fn from(value: i32) -> Self {
		Arity::Exact(usize::try_from(value).unwrap_or(0))
	}
}

impl fmt::Display for Arity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Arity::Exact(n) => write!(f, "{n}"),
			Arity::AtLeast(min) => write!(f, "{min}+"),
			Arity::Range(min, max) => write!(f, "{min}..={max}"),
		}
	}
}

/// Errors observed by the issuer of a call.
#[derive(thiserror::Error, Debug, Clone)]
pub enum CallError {
	#[error("undefined method `{method}`")]
	NoMethod { method: String },

	#[error("wrong number of arguments for `{method}` (given {given}, expected {expected})")]
	InvalidArguments {
		method: String,
		expected: Arity,
		given: usize,
	},

	#[error("{0}")]
	Failed(Failure),

	#[error("Actor is already dead")]
	DeadActor,

	#[error("Call timed out after {0:?}")]
	Timeout(Duration),

	#[error("No block given")]
	NoBlock,
}

impl CallError {
	/// The execution failure carried by this error, if any.
	pub fn failure(&self) -> Option<&Failure> {
		match self {
			CallError::Failed(failure) => Some(failure),
			_ => None,
		}
	}

	/// Dispatch errors are raised before the target starts executing.
	pub fn is_dispatch(&self) -> bool {
		matches!(
			self,
			CallError::NoMethod { .. } | CallError::InvalidArguments { .. } | CallError::NoBlock
		)
	}
}

#[derive(thiserror::Error, Debug)]
pub enum StartError {
	#[error("Failed to launch actor thread: {0}")]
	Thread(#[from] std::io::Error),
}

/// An error raised by a method body while it was executing.
///
/// Failures cross threads (back to the caller, and out to every linked
/// actor), so they are cheap to clone. The original error value is kept
/// behind [`Failure::downcast_ref`] when one exists.
#[derive(Clone)]
pub struct Failure {
	kind: Cow<'static, str>,
	message: String,
	source: Option<Arc<anyhow::Error>>,
	abort: bool,
}

impl Failure {
	pub fn new(kind: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			message: message.into(),
			source: None,
			abort: false,
		}
	}

	pub fn msg(message: impl Into<String>) -> Self {
		Self::new("RuntimeError", message)
	}

	pub fn from_anyhow(err: anyhow::Error) -> Self {
		Self {
			kind: Cow::Borrowed("anyhow::Error"),
			message: format!("{err:#}"),
			source: Some(Arc::new(err)),
			abort: false,
		}
	}

	pub(crate) fn panic(payload: Box<dyn Any + Send>) -> Self {
		let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
			(*text).to_string()
		} else if let Some(text) = payload.downcast_ref::<String>() {
			text.clone()
		} else {
			"Box<dyn Any>".to_string()
		};
		Self::new("panic", message)
	}

	pub(crate) fn argument(message: impl Into<String>) -> Self {
		Self::new("ArgumentError", message).abort()
	}

	/// Marks the failure as the caller's fault: it is reported to the
	/// caller and the target actor keeps running.
	pub fn abort(mut self) -> Self {
		self.abort = true;
		self
	}

	pub fn is_abort(&self) -> bool {
		self.abort
	}

	pub fn kind(&self) -> &str {
		&self.kind
	}

	pub fn message(&self) -> &str {
		&self.message
	}

	pub fn downcast_ref<E>(&self) -> Option<&E>
	where
		E: fmt::Display + fmt::Debug + Send + Sync + 'static,
	{
		self.source.as_deref().and_then(|err| err.downcast_ref::<E>())
	}
}

impl<E> From<E> for Failure
where
	E: std::error::Error + Send + Sync + 'static,
{
	fn from(err: E) -> Self {
		// a failure forwarded from a nested call keeps its own identity
		if let Some(CallError::Failed(failure)) = (&err as &dyn Any).downcast_ref::<CallError>() {
			return failure.clone();
		}
		Self {
			kind: Cow::Borrowed(type_name::<E>()),
			message: err.to_string(),
			source: Some(Arc::new(anyhow::Error::new(err))),
			abort: false,
		}
	}
}

impl fmt::Debug for Failure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Failure")
			.field("kind", &self.kind)
			.field("message", &self.message)
			.field("abort", &self.abort)
			.finish()
	}
}

impl fmt::Display for Failure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.kind, self.message)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug, thiserror::Error)]
	#[error("disk on fire")]
	struct Smoke;

	#[test]
	fn failure_keeps_original_error() {
		let failure = Failure::from(Smoke);
		assert!(failure.kind().ends_with("Smoke"));
		assert_eq!(failure.message(), "disk on fire");
		assert!(failure.downcast_ref::<Smoke>().is_some());
		assert!(!failure.is_abort());
	}

	#[test]
	fn forwarded_failure_is_not_rewrapped() {
		let original = Failure::from(Smoke).abort();
		let forwarded = Failure::from(CallError::Failed(original));
		assert!(forwarded.kind().ends_with("Smoke"));
		assert!(forwarded.downcast_ref::<Smoke>().is_some());
		assert!(forwarded.is_abort());

		let timeout = Failure::from(CallError::Timeout(Duration::from_millis(5)));
		assert!(timeout.kind().ends_with("CallError"));
		assert!(timeout.downcast_ref::<CallError>().is_some());
	}

	#[test]
	fn arity_bounds() {
		assert!(Arity::Exact(0).accepts(0));
		assert!(!Arity::Exact(0).accepts(1));
		assert!(Arity::AtLeast(1).accepts(4));
		assert!(!Arity::Range(1, 2).accepts(3));
	}

	#[test]
	fn panic_payload_becomes_message() {
		let failure = Failure::panic(Box::new("boom"));
		assert_eq!(failure.kind(), "panic");
		assert_eq!(failure.message(), "boom");
	}
}
