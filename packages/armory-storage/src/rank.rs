//! Redis rank arithmetic shared by store implementations.

/// Resolves a `start..=stop` rank range (negative values count from the end) against a
/// collection of `len` members. `None` means the range selects nothing.
pub fn resolve(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
	if len == 0 {
		return None;
	}

	let len = len as isize;
	let start = if start < 0 { (len + start).max(0) } else { start };
	let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

	if stop < 0 || start > stop || start >= len {
		return None;
	}

	Some((start as usize, stop as usize))
}

/// Rank range that keeps only the `keep` highest-scored members when removing by ascending rank.
pub fn excess_beyond(keep: usize) -> (isize, isize) {
	(0, -(keep as isize) - 1)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolves_positive_and_negative_bounds() {
		assert_eq!(resolve(10, 0, 4), Some((0, 4)));
		assert_eq!(resolve(10, 0, -1), Some((0, 9)));
		assert_eq!(resolve(10, -3, -1), Some((7, 9)));
		assert_eq!(resolve(3, 0, 49), Some((0, 2)));
		assert_eq!(resolve(3, 5, 9), None);
		assert_eq!(resolve(0, 0, -1), None);
	}

	#[test]
	fn excess_range_trims_only_overflow() {
		let (start, stop) = excess_beyond(50);

		assert_eq!(resolve(53, start, stop), Some((0, 2)));
		assert_eq!(resolve(50, start, stop), None);
		assert_eq!(resolve(10, start, stop), None);
	}
}
