//! String formatting utilities for log output.

/// Shortens an identifier for display.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
/// Counts characters rather than bytes, since order ids are caller supplied.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		Some((idx, _)) => format!("{}..", &id[..idx]),
		None => id.to_string(),
	}
}
