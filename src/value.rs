use std::any::Any;
use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::chain::ChainId;
use crate::error::Failure;

/// A dynamically typed value passed to or returned from an actor method.
#[derive(Clone, Default)]
pub enum Value {
	#[default]
	Nil,
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(String),
	List(Vec<Value>),
	Any(Arc<dyn Any + Send + Sync>),
}

impl Value {
	/// Wraps an arbitrary shareable value (proxies, handles, user structs).
	pub fn any<T: Any + Send + Sync>(value: T) -> Self {
		Value::Any(Arc::new(value))
	}

	pub fn is_nil(&self) -> bool {
		matches!(self, Value::Nil)
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Int(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Str(v) => Some(v),
			_ => None,
		}
	}

	pub fn as_list(&self) -> Option<&[Value]> {
		match self {
			Value::List(v) => Some(v),
			_ => None,
		}
	}

	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		match self {
			Value::Any(v) => v.downcast_ref::<T>(),
			_ => None,
		}
	}

	fn type_label(&self) -> &'static str {
		match self {
			Value::Nil => "nil",
			Value::Bool(_) => "bool",
			Value::Int(_) => "int",
			Value::Float(_) => "float",
			Value::Str(_) => "string",
			Value::List(_) => "list",
			Value::Any(_) => "object",
		}
	}
}

impl fmt::Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Nil => f.write_str("nil"),
			Value::Bool(v) => fmt::Debug::fmt(v, f),
			Value::Int(v) => fmt::Debug::fmt(v, f),
			Value::Float(v) => fmt::Debug::fmt(v, f),
			Value::Str(v) => fmt::Debug::fmt(v, f),
			Value::List(v) => f.debug_list().entries(v).finish(),
			Value::Any(_) => f.write_str("<object>"),
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Nil, Value::Nil) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Int(a), Value::Int(b)) => a == b,
			(Value::Float(a), Value::Float(b)) => a == b,
			(Value::Str(a), Value::Str(b)) => a == b,
			(Value::List(a), Value::List(b)) => a == b,
			(Value::Any(a), Value::Any(b)) => Arc::ptr_eq(a, b),
			_ => false,
		}
	}
}

impl From<()> for Value {
	fn from(_: ()) -> Self {
		Value::Nil
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Value::Int(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Value::Int(value.into())
	}
}

impl From<u32> for Value {
	fn from(value: u32) -> Self {
		Value::Int(value.into())
	}
}

impl From<usize> for Value {
	fn from(value: usize) -> Self {
		Value::Int(value as i64)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Value::Float(value)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::Str(value.to_string())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::Str(value)
	}
}

impl From<ChainId> for Value {
	fn from(value: ChainId) -> Self {
		Value::Str(value.to_string())
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(value: Vec<T>) -> Self {
		Value::List(value.into_iter().map(Into::into).collect())
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map(Into::into).unwrap_or(Value::Nil)
	}
}

/// Conversion out of a [`Value`], used by [`Args::take`].
pub trait FromValue: Sized {
	fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
	fn from_value(value: &Value) -> Option<Self> {
		Some(value.clone())
	}
}

impl FromValue for bool {
	fn from_value(value: &Value) -> Option<Self> {
		match value {
			Value::Bool(v) => Some(*v),
			_ => None,
		}
	}
}

impl FromValue for i64 {
	fn from_value(value: &Value) -> Option<Self> {
		value.as_int()
	}
}

impl FromValue for usize {
	fn from_value(value: &Value) -> Option<Self> {
		value.as_int().and_then(|v| usize::try_from(v).ok())
	}
}

impl FromValue for f64 {
	fn from_value(value: &Value) -> Option<Self> {
		match value {
			Value::Float(v) => Some(*v),
			Value::Int(v) => Some(*v as f64),
			_ => None,
		}
	}
}

impl FromValue for String {
	fn from_value(value: &Value) -> Option<Self> {
		value.as_str().map(str::to_string)
	}
}

impl<T: FromValue> FromValue for Vec<T> {
	fn from_value(value: &Value) -> Option<Self> {
		value.as_list()?.iter().map(T::from_value).collect()
	}
}

/// Ordered arguments of a call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Args(Vec<Value>);

impl Args {
	pub fn new() -> Self {
		Self(Vec::new())
	}

	pub fn push(&mut self, value: impl Into<Value>) {
		self.0.push(value.into());
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn get(&self, index: usize) -> Option<&Value> {
		self.0.get(index)
	}

	/// Extracts argument `index` as `T`. A missing or mistyped argument is
	/// an aborting failure: the caller sees it, the actor survives.
	pub fn take<T: FromValue>(&self, index: usize) -> Result<T, Failure> {
		let value = self
			.0
			.get(index)
			.ok_or_else(|| Failure::argument(format!("missing argument #{index}")))?;
		T::from_value(value).ok_or_else(|| {
			Failure::argument(format!(
				"argument #{index}: expected {}, got {}",
				type_name::<T>(),
				value.type_label()
			))
		})
	}

	/// Extracts a value previously wrapped with [`Value::any`].
	pub fn any<T: Any + Clone>(&self, index: usize) -> Result<T, Failure> {
		self.0
			.get(index)
			.and_then(|value| value.downcast_ref::<T>())
			.cloned()
			.ok_or_else(|| {
				Failure::argument(format!("argument #{index}: expected {}", type_name::<T>()))
			})
	}

	pub fn iter(&self) -> impl Iterator<Item = &Value> {
		self.0.iter()
	}

	pub fn into_vec(self) -> Vec<Value> {
		self.0
	}
}

impl From<Vec<Value>> for Args {
	fn from(values: Vec<Value>) -> Self {
		Self(values)
	}
}

impl FromIterator<Value> for Args {
	fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}

/// Builds an [`Args`] list from anything convertible into [`Value`].
#[macro_export]
macro_rules! args {
	() => {
		$crate::Args::new()
	};
	($($value:expr),+ $(,)?) => {
		$crate::Args::from(vec![$($crate::Value::from($value)),+])
	};
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn typed_extraction() {
		let args = crate::args![5, "five", vec![1, 2]];
		assert_eq!(args.take::<i64>(0).unwrap(), 5);
		assert_eq!(args.take::<String>(1).unwrap(), "five");
		assert_eq!(args.take::<Vec<i64>>(2).unwrap(), vec![1, 2]);
	}

	#[test]
	fn mistyped_argument_aborts() {
		let args = crate::args!["five"];
		let failure = args.take::<i64>(0).unwrap_err();
		assert!(failure.is_abort());
		assert_eq!(failure.kind(), "ArgumentError");

		let missing = args.take::<i64>(3).unwrap_err();
		assert!(missing.message().contains("missing"));
	}

	#[test]
	fn wrapped_objects_round_trip_by_reference() {
		let value = Value::any(String::from("payload"));
		let args = Args::from(vec![value.clone()]);
		assert_eq!(args.any::<String>(0).unwrap(), "payload");
		assert_eq!(value, args.get(0).cloned().unwrap());
		assert!(args.any::<u8>(0).is_err());
	}
}
