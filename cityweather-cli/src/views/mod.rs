//! Plain-text renderings of the list, detail and settings views.

pub mod detail;
pub mod list;
pub mod settings;
