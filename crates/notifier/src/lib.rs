//! keycycle-notifier: owner notifications
//!
//! Loads an HTML template from the template directory, substitutes the
//! summary's `{{token}}` values and sends the result through SES with both
//! HTML and plain-text bodies.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod render;
mod ses;
mod templates;

pub use render::{render_html, render_text};
pub use ses::{RenderedEmail, SesNotifier, render_email, subject};
pub use templates::TemplateStore;
