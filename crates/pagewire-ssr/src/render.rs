//! Rendering pages to markup.

use async_trait::async_trait;
use pagewire_core::Page;
use serde::{Deserialize, Serialize};

use crate::error::SsrError;

/// Markup for one page: tags for the document head and the body fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPage {
	/// Head tags (`<title>`, `<meta>`, ...).
	pub head: Vec<String>,
	/// Body markup, including the mount element.
	pub body: String,
}

/// Turns a page into markup.
///
/// Implement this to run real component rendering; [`ShellRenderer`] only
/// emits the mount element so the client renders everything.
#[async_trait]
pub trait Renderer: Send + Sync {
	/// Renders `page`.
	async fn render(&self, page: &Page) -> Result<RenderedPage, SsrError>;
}

/// Emits `<div id="{root_id}" data-page="{page json}"></div>`.
///
/// ```
/// use pagewire_core::Page;
/// use pagewire_ssr::ShellRenderer;
///
/// let shell = ShellRenderer::new("app");
/// let html = shell.shell(&Page::new("Home", "/")).unwrap();
/// assert!(html.starts_with(r#"<div id="app" data-page="{&quot;component&quot;:&quot;Home&quot;"#));
/// ```
#[derive(Debug, Clone)]
pub struct ShellRenderer {
	root_id: String,
}

impl ShellRenderer {
	/// A renderer mounting into `root_id`.
	pub fn new(root_id: impl Into<String>) -> Self {
		Self {
			root_id: root_id.into(),
		}
	}

	/// The mount element for `page`.
	pub fn shell(&self, page: &Page) -> Result<String, SsrError> {
		let payload = page.to_json()?;
		Ok(format!(
			r#"<div id="{}" data-page="{}"></div>"#,
			escape_attribute(&self.root_id),
			escape_attribute(&payload)
		))
	}
}

impl Default for ShellRenderer {
	fn default() -> Self {
		Self::new("app")
	}
}

#[async_trait]
impl Renderer for ShellRenderer {
	async fn render(&self, page: &Page) -> Result<RenderedPage, SsrError> {
		Ok(RenderedPage {
			head: Vec::new(),
			body: self.shell(page)?,
		})
	}
}

fn escape_attribute(value: &str) -> String {
	let mut escaped = String::with_capacity(value.len());
	for c in value.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#39;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			c => escaped.push(c),
		}
	}
	escaped
}
