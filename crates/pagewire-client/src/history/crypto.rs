//! AES-256-GCM for history entries.
//!
//! The key and IV are generated once per browser session and kept base64-encoded
//! in session storage. Both are session-scoped: once session storage is cleared,
//! entries written with them cannot be read back, and decoding falls back to a
//! network visit.

use std::rc::Rc;

use aes_gcm::{
	Aes256Gcm, Nonce,
	aead::{Aead, KeyInit},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;

use super::HistoryError;
use crate::platform::Browser;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 12;

pub(crate) struct HistoryCipher {
	browser: Rc<dyn Browser>,
	key_name: String,
	iv_name: String,
}

impl HistoryCipher {
	pub(crate) fn new(browser: Rc<dyn Browser>, key_name: String, iv_name: String) -> Self {
		Self {
			browser,
			key_name,
			iv_name,
		}
	}

	fn read_secret<const N: usize>(&self, name: &str) -> Result<Option<[u8; N]>, HistoryError> {
		let Some(encoded) = self.browser.session_get(name) else {
			return Ok(None);
		};
		let bytes = STANDARD
			.decode(encoded)
			.map_err(|e| HistoryError::InvalidKey(e.to_string()))?;
		let secret: [u8; N] = bytes
			.try_into()
			.map_err(|_| HistoryError::InvalidKey(format!("{name} has the wrong length")))?;
		Ok(Some(secret))
	}

	fn load(&self) -> Result<([u8; KEY_LEN], [u8; IV_LEN]), HistoryError> {
		let key = self.read_secret::<KEY_LEN>(&self.key_name)?;
		let iv = self.read_secret::<IV_LEN>(&self.iv_name)?;
		match (key, iv) {
			(Some(key), Some(iv)) => Ok((key, iv)),
			_ => Err(HistoryError::MissingKey),
		}
	}

	fn load_or_create(&self) -> Result<([u8; KEY_LEN], [u8; IV_LEN]), HistoryError> {
		match self.load() {
			Ok(secrets) => Ok(secrets),
			Err(HistoryError::MissingKey) => {
				let mut key = [0u8; KEY_LEN];
				let mut iv = [0u8; IV_LEN];
				let mut rng = rand::thread_rng();
				rng.fill_bytes(&mut key);
				rng.fill_bytes(&mut iv);
				self.browser
					.session_set(&self.key_name, &STANDARD.encode(key));
				self.browser.session_set(&self.iv_name, &STANDARD.encode(iv));
				tracing::debug!("generated history encryption key");
				Ok((key, iv))
			}
			Err(other) => Err(other),
		}
	}

	pub(crate) fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, HistoryError> {
		let (key, iv) = self.load_or_create()?;
		let cipher =
			Aes256Gcm::new_from_slice(&key).map_err(|e| HistoryError::InvalidKey(e.to_string()))?;
		cipher
			.encrypt(&Nonce::from(iv), plaintext)
			.map_err(|_| HistoryError::Encrypt)
	}

	pub(crate) fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, HistoryError> {
		let (key, iv) = self.load()?;
		let cipher =
			Aes256Gcm::new_from_slice(&key).map_err(|e| HistoryError::InvalidKey(e.to_string()))?;
		cipher
			.decrypt(&Nonce::from(iv), ciphertext)
			.map_err(|_| HistoryError::Decrypt)
	}

	pub(crate) fn clear(&self) {
		self.browser.session_remove(&self.key_name);
		self.browser.session_remove(&self.iv_name);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::platform::{Browser, MemoryBrowser};
	use rstest::rstest;

	fn cipher(browser: &Rc<MemoryBrowser>) -> HistoryCipher {
		HistoryCipher::new(browser.clone(), "historyKey".into(), "historyIv".into())
	}

	#[rstest]
	fn test_key_generated_once_per_session() {
		let browser = Rc::new(MemoryBrowser::default());
		let cipher = cipher(&browser);

		let first = cipher.encrypt(b"entry").unwrap();
		let key = browser.session_get("historyKey");
		let second = cipher.encrypt(b"entry").unwrap();

		assert!(key.is_some());
		assert_eq!(browser.session_get("historyKey"), key);
		assert_eq!(first, second);
		assert_eq!(cipher.decrypt(&first).unwrap(), b"entry");
	}

	#[rstest]
	fn test_decrypt_without_key_fails() {
		let browser = Rc::new(MemoryBrowser::default());
		let cipher = cipher(&browser);
		let blob = cipher.encrypt(b"entry").unwrap();

		cipher.clear();

		assert!(matches!(cipher.decrypt(&blob), Err(HistoryError::MissingKey)));
		assert_eq!(browser.session_get("historyIv"), None);
	}

	#[rstest]
	fn test_corrupted_ciphertext_fails() {
		let browser = Rc::new(MemoryBrowser::default());
		let cipher = cipher(&browser);
		let mut blob = cipher.encrypt(b"entry").unwrap();
		blob[0] ^= 0xff;

		assert!(matches!(cipher.decrypt(&blob), Err(HistoryError::Decrypt)));
	}

	#[rstest]
	fn test_malformed_stored_key() {
		let browser = Rc::new(MemoryBrowser::default());
		browser.session_set("historyKey", "not base64!");
		browser.session_set("historyIv", "AAAA");

		assert!(matches!(
			cipher(&browser).decrypt(b"x"),
			Err(HistoryError::InvalidKey(_))
		));
	}
}
