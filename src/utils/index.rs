/// Default number of decimal places of a CryptoNote atomic amount.
pub const DEFAULT_DECIMALS: u32 = 2;

/// Render a signed atomic amount with `decimals` decimal places, e.g. `-12.05`.
pub fn format_atomic_amount(amount: i128, decimals: u32) -> String {
	let sign = if amount < 0 { "-" } else { "" };
	let magnitude = amount.unsigned_abs();

	if decimals == 0 {
		return format!("{}{}", sign, magnitude);
	}

	let scale = 10u128.pow(decimals);
	format!(
		"{}{}.{:0width$}",
		sign,
		magnitude / scale,
		magnitude % scale,
		width = decimals as usize
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_format_atomic_amount() {
		assert_eq!(format_atomic_amount(0, 2), "0.00");
		assert_eq!(format_atomic_amount(1205, 2), "12.05");
		assert_eq!(format_atomic_amount(-7, 2), "-0.07");
		assert_eq!(format_atomic_amount(42, 0), "42");
		assert_eq!(
			format_atomic_amount(u64::MAX as i128, DEFAULT_DECIMALS),
			"184467440737095516.15"
		);
	}
}
