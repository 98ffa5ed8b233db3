//! String formatting utilities.

/// Utility function to truncate a hash or identifier for log output.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		Some((end, _)) => format!("{}..", &id[..end]),
		None => id.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("12345678"), "12345678");
		assert_eq!(truncate_id("123456789"), "12345678..");
		assert_eq!(truncate_id("0x1000000000000000000000000000000000000011"), "0x100000..");
	}

	#[test]
	fn test_truncate_id_multibyte() {
		assert_eq!(truncate_id("ééééééééé"), "éééééééé..");
	}
}
