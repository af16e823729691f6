//! History codec.
//!
//! Turns the current page plus the remember table into a browser history entry
//! and back. Entries of pages with `encryptHistory` (or every entry, when
//! `history.encrypt` is configured) are stored as AES-GCM ciphertext.

mod crypto;

use std::rc::Rc;

use pagewire_core::{Page, ScrollPosition};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::HistoryConfig;
use crate::platform::{Browser, StoredState};
use crate::store::RememberTable;
use crypto::HistoryCipher;

/// Errors raised while encoding or decoding history entries.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
	/// The entry could not be (de)serialized.
	#[error("history entry is malformed: {0}")]
	Malformed(#[from] serde_json::Error),
	/// The entry is encrypted but no key is available in session storage.
	#[error("history encryption key is missing")]
	MissingKey,
	/// The stored key or IV is unusable.
	#[error("history encryption key is invalid: {0}")]
	InvalidKey(String),
	/// Encryption failed.
	#[error("failed to encrypt history entry")]
	Encrypt,
	/// Ciphertext did not authenticate.
	#[error("failed to decrypt history entry")]
	Decrypt,
}

/// What is stored per history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
	/// The page shown at this entry.
	pub page: Page,
	/// Remember table snapshot.
	#[serde(default)]
	pub remember: Map<String, Value>,
	/// Scroll region offsets, saved when leaving the entry.
	#[serde(default)]
	pub scroll_regions: Vec<ScrollPosition>,
}

/// Reads and writes history entries for one session.
pub struct HistoryCodec {
	browser: Rc<dyn Browser>,
	remember: RememberTable,
	config: HistoryConfig,
	cipher: HistoryCipher,
}

impl HistoryCodec {
	/// Creates a codec. Usually obtained from [`Session::history`](crate::context::Session::history).
	pub fn new(browser: Rc<dyn Browser>, remember: RememberTable, config: HistoryConfig) -> Self {
		let cipher = HistoryCipher::new(
			browser.clone(),
			config.key_storage_key.clone(),
			config.iv_storage_key.clone(),
		);
		Self {
			browser,
			remember,
			config,
			cipher,
		}
	}

	/// Decides between replacing the current entry and pushing a new one.
	///
	/// Replaces when the caller asked to preserve history, or when the URL is
	/// unchanged and the caller did not explicitly ask for a push.
	///
	/// ```
	/// use pagewire_client::history::HistoryCodec;
	///
	/// assert!(HistoryCodec::should_replace(None, false, "/a", "/a"));
	/// assert!(!HistoryCodec::should_replace(None, false, "/a", "/b"));
	/// assert!(!HistoryCodec::should_replace(Some(false), false, "/a", "/a"));
	/// assert!(HistoryCodec::should_replace(Some(true), false, "/a", "/b"));
	/// assert!(HistoryCodec::should_replace(Some(false), true, "/a", "/b"));
	/// ```
	pub fn should_replace(
		replace: Option<bool>,
		preserve_history: bool,
		current_url: &str,
		incoming_url: &str,
	) -> bool {
		if preserve_history {
			return true;
		}
		replace.unwrap_or(current_url == incoming_url)
	}

	fn wants_encryption(&self, page: &Page) -> bool {
		page.encrypt_history || self.config.encrypt
	}

	/// Encodes an entry, encrypting it when asked to.
	pub fn encode(&self, entry: &HistoryEntry, encrypt: bool) -> Result<StoredState, HistoryError> {
		if encrypt {
			let plaintext = serde_json::to_vec(entry)?;
			Ok(StoredState::Encrypted(self.cipher.encrypt(&plaintext)?))
		} else {
			Ok(StoredState::Plain(serde_json::to_value(entry)?))
		}
	}

	/// Decodes an entry read from the browser.
	pub fn decode(&self, state: &StoredState) -> Result<HistoryEntry, HistoryError> {
		match state {
			StoredState::Plain(value) => Ok(HistoryEntry::deserialize(value)?),
			StoredState::Encrypted(ciphertext) => {
				let plaintext = self.cipher.decrypt(ciphertext)?;
				Ok(serde_json::from_slice(&plaintext)?)
			}
		}
	}

	/// Writes `page` (with the current remember snapshot) to history.
	///
	/// On a push, the scroll offsets of the entry being left are saved first.
	pub fn push_or_replace(&self, page: &Page, replace: bool) -> Result<(), HistoryError> {
		if !replace {
			self.save_scroll_regions();
		}
		let entry = HistoryEntry {
			page: page.clone(),
			remember: self.remember.snapshot(),
			scroll_regions: Vec::new(),
		};
		let state = self.encode(&entry, self.wants_encryption(page))?;
		if replace {
			self.browser.replace_state(state, &page.url);
		} else {
			self.browser.push_state(state, &page.url);
		}
		tracing::debug!(url = %page.url, replace, "history entry written");
		Ok(())
	}

	/// Rewrites the current entry through `f`, keeping its encryption mode.
	///
	/// A missing or unreadable current entry is left alone.
	fn update_current(&self, f: impl FnOnce(&mut HistoryEntry)) {
		let Some(state) = self.browser.current_state() else {
			return;
		};
		let encrypted = matches!(state, StoredState::Encrypted(_));
		let mut entry = match self.decode(&state) {
			Ok(entry) => entry,
			Err(error) => {
				tracing::debug!(%error, "current history entry is unreadable; not updating");
				return;
			}
		};
		f(&mut entry);
		match self.encode(&entry, encrypted) {
			Ok(state) => self.browser.replace_state(state, &entry.page.url),
			Err(error) => tracing::warn!(%error, "failed to rewrite current history entry"),
		}
	}

	/// Folds the current remember table into the current entry.
	pub fn sync_remember(&self) {
		let snapshot = self.remember.snapshot();
		self.update_current(|entry| entry.remember = snapshot);
	}

	/// Saves the document's scroll region offsets into the current entry.
	pub fn save_scroll_regions(&self) {
		let regions = self.browser.scroll_regions();
		self.update_current(|entry| entry.scroll_regions = regions);
	}

	/// Forgets the session's encryption key and IV.
	///
	/// Entries encrypted with them become permanently unreadable.
	pub fn clear(&self) {
		self.cipher.clear();
		tracing::debug!("history encryption key cleared");
	}
}

impl std::fmt::Debug for HistoryCodec {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HistoryCodec")
			.field("config", &self.config)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::platform::MemoryBrowser;
	use rstest::rstest;
	use serde_json::json;

	fn codec(browser: &Rc<MemoryBrowser>, remember: &RememberTable) -> HistoryCodec {
		HistoryCodec::new(browser.clone(), remember.clone(), HistoryConfig::default())
	}

	#[rstest]
	fn test_plain_entry_round_trip() {
		let browser = Rc::new(MemoryBrowser::new("/"));
		let remember = RememberTable::new();
		remember.insert("form", json!({"name": "Ada"}));
		let codec = codec(&browser, &remember);

		codec
			.push_or_replace(&Page::new("Users", "/users"), false)
			.unwrap();

		let state = browser.current_state().unwrap();
		assert!(matches!(state, StoredState::Plain(_)));
		let entry = codec.decode(&state).unwrap();
		assert_eq!(entry.page.component, "Users");
		assert_eq!(entry.remember["form"], json!({"name": "Ada"}));
		assert_eq!(browser.location(), "/users");
	}

	#[rstest]
	fn test_encrypted_page_is_opaque() {
		let browser = Rc::new(MemoryBrowser::new("/"));
		let codec = codec(&browser, &RememberTable::new());
		let mut page = Page::new("Account", "/account").with_prop("iban", json!("secret"));
		page.encrypt_history = true;

		codec.push_or_replace(&page, true).unwrap();

		let state = browser.current_state().unwrap();
		let StoredState::Encrypted(bytes) = &state else {
			panic!("expected ciphertext");
		};
		assert!(!String::from_utf8_lossy(bytes).contains("secret"));
		assert_eq!(codec.decode(&state).unwrap().page, page);
	}

	#[rstest]
	fn test_cleared_key_makes_entries_unreadable() {
		let browser = Rc::new(MemoryBrowser::new("/"));
		let codec = codec(&browser, &RememberTable::new());
		let mut page = Page::new("Account", "/account");
		page.encrypt_history = true;
		codec.push_or_replace(&page, true).unwrap();
		let state = browser.current_state().unwrap();

		codec.clear();

		assert!(matches!(codec.decode(&state), Err(HistoryError::MissingKey)));
	}

	#[rstest]
	fn test_push_saves_scroll_regions_of_left_entry() {
		let browser = Rc::new(MemoryBrowser::new("/"));
		let codec = codec(&browser, &RememberTable::new());
		codec.push_or_replace(&Page::new("Feed", "/feed"), true).unwrap();
		browser.set_scroll_regions(vec![ScrollPosition {
			top: 120.0,
			left: 0.0,
		}]);

		codec.push_or_replace(&Page::new("Post", "/posts/1"), false).unwrap();
		browser.back();

		let entry = codec.decode(&browser.current_state().unwrap()).unwrap();
		assert_eq!(entry.scroll_regions[0].top, 120.0);
	}

	#[rstest]
	fn test_garbage_plain_state_is_an_error() {
		let codec = codec(&Rc::new(MemoryBrowser::new("/")), &RememberTable::new());
		assert!(matches!(
			codec.decode(&StoredState::Plain(json!({"unexpected": true}))),
			Err(HistoryError::Malformed(_))
		));
	}
}
