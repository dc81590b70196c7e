//! Materialized path encoding
//!
//! A path is a concatenation of fixed-width steps, one per tree level. Each
//! step is a base-36 number written with [`ALPHABET`] and left-padded to
//! [`STEP_LEN`] characters, so plain string ordering of paths is a pre-order
//! traversal of the tree and every descendant of a node shares its path as a
//! prefix.
//!
//! ```
//! use reinhardt_cms::path;
//!
//! let root = path::encode_step(1).unwrap();
//! assert_eq!(root, "0001");
//!
//! let child = path::child_path(&root, 11).unwrap();
//! assert_eq!(child, "0001000B");
//! assert_eq!(path::depth(&child), 2);
//! assert_eq!(path::parent_path(&child), Some("0001"));
//! ```

use crate::error::{CmsError, CmsResult};

/// Characters per tree level
pub const STEP_LEN: usize = 4;

/// Digits used for each step, in ascending order
pub const ALPHABET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

const BASE: u64 = 36;

/// Largest step value that fits into [`STEP_LEN`] characters
pub const MAX_STEP: u64 = BASE * BASE * BASE * BASE - 1;

/// Encode a single step
///
/// # Errors
///
/// Returns [`CmsError::Conflict`] when `step` is zero or does not fit into
/// [`STEP_LEN`] characters.
pub fn encode_step(step: u64) -> CmsResult<String> {
	if step == 0 || step > MAX_STEP {
		return Err(CmsError::Conflict(format!(
			"path step {} is outside 1..={}",
			step, MAX_STEP
		)));
	}

	let digits = ALPHABET.as_bytes();
	let mut buf = [b'0'; STEP_LEN];
	let mut rest = step;
	for slot in buf.iter_mut().rev() {
		*slot = digits[(rest % BASE) as usize];
		rest /= BASE;
	}

	Ok(buf.iter().map(|b| *b as char).collect())
}

/// Decode a single step, `None` when it is not a valid step
pub fn decode_step(step: &str) -> Option<u64> {
	if step.len() != STEP_LEN {
		return None;
	}
	step.chars().try_fold(0u64, |acc, c| {
		ALPHABET
			.find(c)
			.map(|digit| acc * BASE + digit as u64)
	})
}

/// Path of the `step`-th child below `parent`
pub fn child_path(parent: &str, step: u64) -> CmsResult<String> {
	Ok(format!("{}{}", parent, encode_step(step)?))
}

/// Tree depth encoded by `path`, 1 for roots
pub fn depth(path: &str) -> usize {
	path.len() / STEP_LEN
}

/// Path of the parent node, `None` for roots
pub fn parent_path(path: &str) -> Option<&str> {
	if path.len() <= STEP_LEN {
		None
	} else {
		Some(&path[..path.len() - STEP_LEN])
	}
}

/// Value of the last step of `path`
pub fn last_step(path: &str) -> Option<u64> {
	if path.len() < STEP_LEN {
		return None;
	}
	decode_step(&path[path.len() - STEP_LEN..])
}

/// Whether `path` lies strictly below `ancestor`
pub fn is_descendant_path(path: &str, ancestor: &str) -> bool {
	path.len() > ancestor.len() && path.starts_with(ancestor)
}

/// Replace the `old_prefix` of `path` with `new_prefix`
pub fn rebase(path: &str, old_prefix: &str, new_prefix: &str) -> String {
	debug_assert!(path.starts_with(old_prefix));
	format!("{}{}", new_prefix, &path[old_prefix.len()..])
}
