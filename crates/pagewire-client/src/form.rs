//! Forms.
//!
//! [`use_form`] wraps a serializable struct (or JSON object) in a reactive
//! [`FormState`]. Every write goes through one commit step that recomputes
//! `is_dirty` and `has_errors`, notifies subscribers once, and writes through
//! to the remember table when a remember key is set.
//!
//! ```
//! use pagewire_client::context::Session;
//! use pagewire_client::form::use_form;
//! use pagewire_client::router::Router;
//! use pagewire_client::testing::MockTransport;
//! use pagewire_core::Page;
//! use serde_json::json;
//! use std::rc::Rc;
//!
//! let router = Router::new(
//!     Session::in_memory("/signup"),
//!     Rc::new(MockTransport::new()),
//!     Page::new("Signup", "/signup"),
//! )
//! .unwrap();
//! let form = use_form(&router, &json!({"email": ""}), None).unwrap();
//!
//! form.set("email", "ada@example.com").unwrap();
//! assert!(form.is_dirty());
//! form.set_defaults();
//! assert!(!form.is_dirty());
//! ```

mod multipart;

pub use multipart::{to_multipart, to_query};
pub use pagewire_core::FileBlob;
pub use pagewire_core::value::has_files;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use ::http::Method;
use futures::future::{AbortHandle, Abortable};
use pagewire_core::reactive::Signal;
use pagewire_core::spawn::spawn_local;
use pagewire_core::value::deep_equal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::router::{Router, RouterError, VisitOptions, VisitOutcome};
use crate::time::sleep;

/// Field names that would shadow form state or operations.
pub const RESERVED_FIELDS: &[&str] = &[
	"data",
	"errors",
	"hasErrors",
	"has_errors",
	"processing",
	"progress",
	"wasSuccessful",
	"was_successful",
	"recentlySuccessful",
	"recently_successful",
	"isDirty",
	"is_dirty",
	"defaults",
	"reset",
	"fill",
	"transform",
	"clearErrors",
	"clear_errors",
	"setError",
	"set_error",
	"submit",
	"get",
	"post",
	"put",
	"patch",
	"delete",
];

/// Errors raised by forms.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
	/// Form data must be a JSON object.
	#[error("form data must serialize to an object")]
	NotAnObject,
	/// A field name collides with form state.
	#[error("{0:?} is a reserved form field name")]
	ReservedField(String),
	/// Data could not be converted.
	#[error("failed to convert form data: {0}")]
	Serde(#[from] serde_json::Error),
	/// The submission failed.
	#[error(transparent)]
	Router(#[from] RouterError),
}

/// Upload progress reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
	/// Bytes sent.
	pub loaded: u64,
	/// Total bytes, when known.
	pub total: Option<u64>,
}

impl Progress {
	/// Percentage sent, when the total is known.
	pub fn percentage(&self) -> Option<f64> {
		match self.total {
			Some(0) => Some(100.0),
			Some(total) => Some(self.loaded as f64 * 100.0 / total as f64),
			None => None,
		}
	}
}

/// Snapshot of a form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
	/// Field values.
	pub data: Map<String, Value>,
	/// Field errors.
	pub errors: BTreeMap<String, String>,
	/// Whether `errors` is non-empty.
	pub has_errors: bool,
	/// Whether a submission is in flight.
	pub processing: bool,
	/// Upload progress of the current submission.
	pub progress: Option<Progress>,
	/// Whether the last submission succeeded.
	pub was_successful: bool,
	/// Like `was_successful`, but reverts after `form.recently_successful_ms`.
	pub recently_successful: bool,
	/// Whether any field differs from its default.
	pub is_dirty: bool,
}

type Transform = Box<dyn FnOnce(Value) -> Value>;

struct FormInner {
	router: Router,
	state: Signal<FormState>,
	defaults: RefCell<Map<String, Value>>,
	transform: RefCell<Option<Transform>>,
	recently_successful: RefCell<Option<AbortHandle>>,
	remember_key: Option<String>,
}

/// A reactive form. Clones share state.
#[derive(Clone)]
pub struct Form {
	inner: Rc<FormInner>,
}

fn check_field(name: &str) -> Result<(), FormError> {
	if RESERVED_FIELDS.contains(&name) {
		return Err(FormError::ReservedField(name.to_string()));
	}
	Ok(())
}

fn to_object(value: Value) -> Result<Map<String, Value>, FormError> {
	match value {
		Value::Object(map) => Ok(map),
		_ => Err(FormError::NotAnObject),
	}
}

fn is_dirty(data: &Map<String, Value>, defaults: &Map<String, Value>) -> bool {
	defaults
		.iter()
		.any(|(key, default)| data.get(key).is_none_or(|value| !deep_equal(value, default)))
}

/// Creates a form from `initial`.
///
/// With a `remember_key`, data and errors saved under that key (for instance
/// before navigating away) are restored, and every change is saved again.
///
/// Fails if `initial` is not an object or uses a [reserved](RESERVED_FIELDS)
/// field name.
pub fn use_form<T>(router: &Router, initial: &T, remember_key: Option<&str>) -> Result<Form, FormError>
where
	T: Serialize + ?Sized,
{
	let defaults = to_object(serde_json::to_value(initial)?)?;
	for name in defaults.keys() {
		check_field(name)?;
	}

	let mut state = FormState {
		data: defaults.clone(),
		..FormState::default()
	};
	if let Some(saved) = remember_key.and_then(|key| router.session().remember().get(key)) {
		if let Some(Value::Object(data)) = saved.get("data") {
			state.data = data.clone();
		}
		state.errors = saved
			.get("errors")
			.cloned()
			.and_then(|errors| serde_json::from_value(errors).ok())
			.unwrap_or_default();
		tracing::debug!(key = ?remember_key, "form restored from remembered state");
	}
	state.has_errors = !state.errors.is_empty();
	state.is_dirty = is_dirty(&state.data, &defaults);

	Ok(Form {
		inner: Rc::new(FormInner {
			router: router.clone(),
			state: Signal::new(state),
			defaults: RefCell::new(defaults),
			transform: RefCell::new(None),
			recently_successful: RefCell::new(None),
			remember_key: remember_key.map(str::to_string),
		}),
	})
}

impl Form {
	/// The state signal.
	pub fn state(&self) -> Signal<FormState> {
		self.inner.state.clone()
	}

	fn commit(&self, f: impl FnOnce(&mut FormState)) -> bool {
		let defaults = self.inner.defaults.borrow().clone();
		let changed = self.inner.state.update(|state| {
			f(state);
			state.has_errors = !state.errors.is_empty();
			state.is_dirty = is_dirty(&state.data, &defaults);
		});
		if changed {
			self.write_through();
		}
		changed
	}

	fn write_through(&self) {
		let Some(key) = &self.inner.remember_key else {
			return;
		};
		let snapshot = self
			.inner
			.state
			.with_untracked(|state| json!({"data": state.data, "errors": state.errors}));
		let session = self.inner.router.session();
		session.remember().insert(key.clone(), snapshot);
		session.history().sync_remember();
	}

	/// Sets one field.
	pub fn set(&self, field: &str, value: impl Serialize) -> Result<(), FormError> {
		check_field(field)?;
		let value = serde_json::to_value(value)?;
		self.commit(|state| {
			state.data.insert(field.to_string(), value);
		});
		Ok(())
	}

	/// Mutates the field map in place, for nested changes.
	pub fn update(&self, f: impl FnOnce(&mut Map<String, Value>)) {
		self.commit(|state| f(&mut state.data));
	}

	/// Current value of one field.
	pub fn field(&self, name: &str) -> Option<Value> {
		self.inner.state.with_untracked(|state| state.data.get(name).cloned())
	}

	/// Field values, restricted to the fields that have a default.
	pub fn data(&self) -> Value {
		let defaults = self.inner.defaults.borrow();
		self.inner.state.with_untracked(|state| {
			Value::Object(
				state
					.data
					.iter()
					.filter(|(key, _)| defaults.contains_key(*key))
					.map(|(key, value)| (key.clone(), value.clone()))
					.collect(),
			)
		})
	}

	/// [`data`](Self::data) deserialized into `T`.
	pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, FormError> {
		Ok(serde_json::from_value(self.data())?)
	}

	/// Restores `fields` (all of them when empty) to their defaults.
	pub fn reset(&self, fields: &[&str]) {
		let defaults = self.inner.defaults.borrow().clone();
		self.commit(|state| {
			if fields.is_empty() {
				state.data = defaults;
				return;
			}
			for field in fields {
				match defaults.get(*field) {
					Some(value) => {
						state.data.insert(field.to_string(), value.clone());
					}
					None => {
						state.data.remove(*field);
					}
				}
			}
		});
	}

	/// Overwrites fields from an object.
	pub fn fill(&self, data: Value) -> Result<(), FormError> {
		let data = to_object(data)?;
		for name in data.keys() {
			check_field(name)?;
		}
		self.commit(|state| state.data.extend(data));
		Ok(())
	}

	/// Overwrites fields from a serializable value.
	pub fn fill_from<T: Serialize + ?Sized>(&self, data: &T) -> Result<(), FormError> {
		self.fill(serde_json::to_value(data)?)
	}

	/// Makes the current values the new defaults.
	pub fn set_defaults(&self) {
		let data = self.inner.state.with_untracked(|state| state.data.clone());
		*self.inner.defaults.borrow_mut() = data;
		self.commit(|_| {});
	}

	/// Sets the default of one field.
	pub fn set_default(&self, field: &str, value: impl Serialize) -> Result<(), FormError> {
		check_field(field)?;
		let value = serde_json::to_value(value)?;
		self.inner.defaults.borrow_mut().insert(field.to_string(), value);
		self.commit(|_| {});
		Ok(())
	}

	/// Merges an object into the defaults.
	pub fn merge_defaults(&self, defaults: Value) -> Result<(), FormError> {
		let defaults = to_object(defaults)?;
		for name in defaults.keys() {
			check_field(name)?;
		}
		self.inner.defaults.borrow_mut().extend(defaults);
		self.commit(|_| {});
		Ok(())
	}

	/// Replaces what the next submission sends. Used once, then discarded.
	pub fn transform(&self, f: impl FnOnce(Value) -> Value + 'static) {
		*self.inner.transform.borrow_mut() = Some(Box::new(f));
	}

	/// Clears the errors of `fields` (all of them when empty).
	pub fn clear_errors(&self, fields: &[&str]) {
		self.commit(|state| {
			if fields.is_empty() {
				state.errors.clear();
			} else {
				state.errors.retain(|field, _| !fields.contains(&field.as_str()));
			}
		});
	}

	/// Sets the error of one field.
	pub fn set_error(&self, field: &str, message: impl Into<String>) {
		let message = message.into();
		self.commit(|state| {
			state.errors.insert(field.to_string(), message);
		});
	}

	/// Merges several errors.
	pub fn set_errors(&self, errors: BTreeMap<String, String>) {
		self.commit(|state| state.errors.extend(errors));
	}

	/// Records upload progress of the running submission.
	pub fn report_progress(&self, progress: Progress) {
		self.commit(|state| state.progress = Some(progress));
	}

	/// Whether any field differs from its default.
	pub fn is_dirty(&self) -> bool {
		self.inner.state.with_untracked(|state| state.is_dirty)
	}

	/// Whether a submission is in flight.
	pub fn processing(&self) -> bool {
		self.inner.state.with_untracked(|state| state.processing)
	}

	/// Current errors.
	pub fn errors(&self) -> BTreeMap<String, String> {
		self.inner.state.with_untracked(|state| state.errors.clone())
	}

	/// Whether there are errors.
	pub fn has_errors(&self) -> bool {
		self.inner.state.with_untracked(|state| state.has_errors)
	}

	/// Whether the last submission succeeded.
	pub fn was_successful(&self) -> bool {
		self.inner.state.with_untracked(|state| state.was_successful)
	}

	/// Whether the last submission succeeded recently.
	pub fn recently_successful(&self) -> bool {
		self.inner.state.with_untracked(|state| state.recently_successful)
	}

	/// Submits the form.
	///
	/// Sends the transformed data if [`transform`](Self::transform) was called,
	/// else [`data`](Self::data), as multipart when it contains files. Errors
	/// are read from the response with the client's error resolver.
	pub async fn submit(&self, method: Method, url: &str, options: VisitOptions) -> Result<VisitOutcome, FormError> {
		self.cancel_recently_successful();
		self.commit(|state| {
			state.was_successful = false;
			state.recently_successful = false;
			state.processing = true;
			state.progress = None;
		});

		let transform = self.inner.transform.borrow_mut().take();
		let data = self.data();
		let payload = match transform {
			Some(transform) => transform(data),
			None => data,
		};

		let error_bag = options.meta().error_bag.clone();
		let router = &self.inner.router;
		let result = router.visit(url, options.method(method).data(payload)).await;

		let client = router.client();
		let errors = match &result {
			Ok(VisitOutcome::Completed { response, .. }) => client.resolve_errors(response, error_bag.as_deref()),
			Err(error) => error
				.response()
				.map(|response| client.resolve_errors(response, error_bag.as_deref()))
				.unwrap_or_default(),
			Ok(_) => BTreeMap::new(),
		};
		let succeeded = errors.is_empty() && matches!(result, Ok(VisitOutcome::Completed { .. }));

		self.commit(|state| {
			state.errors = errors;
			state.processing = false;
			state.progress = None;
			if succeeded {
				state.was_successful = true;
				state.recently_successful = true;
			}
		});
		if succeeded {
			self.schedule_recently_successful_reset();
		}

		Ok(result?)
	}

	/// Submits with `GET`; data goes to the query string.
	pub async fn get(&self, url: &str, options: VisitOptions) -> Result<VisitOutcome, FormError> {
		self.submit(Method::GET, url, options).await
	}

	/// Submits with `POST`.
	pub async fn post(&self, url: &str, options: VisitOptions) -> Result<VisitOutcome, FormError> {
		self.submit(Method::POST, url, options).await
	}

	/// Submits with `PUT`.
	pub async fn put(&self, url: &str, options: VisitOptions) -> Result<VisitOutcome, FormError> {
		self.submit(Method::PUT, url, options).await
	}

	/// Submits with `PATCH`.
	pub async fn patch(&self, url: &str, options: VisitOptions) -> Result<VisitOutcome, FormError> {
		self.submit(Method::PATCH, url, options).await
	}

	/// Submits with `DELETE`.
	pub async fn delete(&self, url: &str, options: VisitOptions) -> Result<VisitOutcome, FormError> {
		self.submit(Method::DELETE, url, options).await
	}

	fn cancel_recently_successful(&self) {
		if let Some(timer) = self.inner.recently_successful.borrow_mut().take() {
			timer.abort();
		}
	}

	fn schedule_recently_successful_reset(&self) {
		let (handle, registration) = AbortHandle::new_pair();
		if let Some(previous) = self.inner.recently_successful.borrow_mut().replace(handle) {
			previous.abort();
		}

		let delay = Duration::from_millis(self.inner.router.session().config().form.recently_successful_ms);
		let form: Weak<FormInner> = Rc::downgrade(&self.inner);
		spawn_local(async move {
			if Abortable::new(sleep(delay), registration).await.is_err() {
				return;
			}
			if let Some(inner) = form.upgrade() {
				Form { inner }.commit(|state| state.recently_successful = false);
			}
		});
	}
}

impl std::fmt::Debug for Form {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Form")
			.field("state", &self.inner.state)
			.field("remember_key", &self.inner.remember_key)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::context::Session;
	use crate::testing::MockTransport;
	use pagewire_core::Page;
	use rstest::rstest;
	use serde::Deserialize;
	use serial_test::serial;

	#[derive(Debug, Serialize, Deserialize, PartialEq)]
	struct Signup {
		email: String,
		newsletter: bool,
	}

	fn router() -> Router {
		Router::new(
			Session::in_memory("/signup"),
			Rc::new(MockTransport::new()),
			Page::new("Signup", "/signup"),
		)
		.unwrap()
	}

	fn signup() -> Signup {
		Signup {
			email: String::new(),
			newsletter: false,
		}
	}

	#[rstest]
	#[serial]
	fn test_dirtiness_follows_defaults() {
		let form = use_form(&router(), &signup(), None).unwrap();
		assert!(!form.is_dirty());

		form.set("email", "ada@example.com").unwrap();
		assert!(form.is_dirty());

		form.reset(&[]);
		assert!(!form.is_dirty());

		form.set("newsletter", true).unwrap();
		form.set_defaults();
		assert!(!form.is_dirty());
		form.reset(&[]);
		assert!(form.data_as::<Signup>().unwrap().newsletter);
	}

	#[rstest]
	#[serial]
	fn test_reset_named_fields() {
		let form = use_form(&router(), &signup(), None).unwrap();
		form.fill(json!({"email": "a@b.c", "newsletter": true})).unwrap();

		form.reset(&["newsletter"]);

		assert_eq!(form.field("email"), Some(json!("a@b.c")));
		assert_eq!(form.field("newsletter"), Some(json!(false)));
	}

	#[rstest]
	#[case(json!({"processing": 1}))]
	#[case(json!({"is_dirty": true}))]
	#[case(json!({"errors": {}}))]
	#[serial]
	fn test_reserved_names_are_rejected(#[case] initial: Value) {
		let error = use_form(&router(), &initial, None).unwrap_err();
		assert!(matches!(error, FormError::ReservedField(_)));
	}

	#[rstest]
	#[serial]
	fn test_non_object_is_rejected() {
		assert!(matches!(use_form(&router(), &json!([1]), None), Err(FormError::NotAnObject)));
	}

	#[rstest]
	#[serial]
	fn test_each_assignment_notifies_once() {
		let form = use_form(&router(), &signup(), None).unwrap();
		let notifications = Rc::new(std::cell::Cell::new(0));
		let _sub = form.state().subscribe({
			let notifications = notifications.clone();
			move |_| notifications.set(notifications.get() + 1)
		});

		form.set("email", "x@y.z").unwrap();
		form.set("email", "x@y.z").unwrap();
		form.set_error("email", "taken");

		// initial run, then one per effective assignment
		assert_eq!(notifications.get(), 3);
		assert!(form.has_errors());
		form.clear_errors(&["email"]);
		assert!(!form.has_errors());
	}

	#[rstest]
	#[serial]
	fn test_data_excludes_fields_without_default() {
		let form = use_form(&router(), &signup(), None).unwrap();
		form.set("extra", 1).unwrap();

		assert!(form.data().get("extra").is_none());
		assert!(!form.is_dirty());
	}

	#[rstest]
	#[serial]
	fn test_remembered_form_survives_recreation() {
		let router = router();
		let form = use_form(&router, &signup(), Some("signup")).unwrap();
		form.set("email", "draft@example.com").unwrap();
		form.set_error("email", "check this");
		drop(form);

		let restored = use_form(&router, &signup(), Some("signup")).unwrap();

		assert_eq!(restored.field("email"), Some(json!("draft@example.com")));
		assert_eq!(restored.errors()["email"], "check this");
		assert!(restored.is_dirty());
	}

	#[rstest]
	fn test_progress_percentage() {
		assert_eq!(Progress { loaded: 50, total: Some(200) }.percentage(), Some(25.0));
		assert_eq!(Progress { loaded: 50, total: None }.percentage(), None);
	}
}
