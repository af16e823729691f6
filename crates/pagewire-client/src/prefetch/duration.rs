use std::time::Duration;

use super::PrefetchError;

/// Parses a cache duration literal.
///
/// Accepts a bare number of milliseconds or a number followed by one of
/// `ms`, `s`, `m`, `h`, `d`, `w`.
///
/// ```
/// use pagewire_client::prefetch::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
/// assert_eq!(parse_duration("1w").unwrap(), Duration::from_secs(7 * 24 * 3600));
/// assert_eq!(parse_duration("250").unwrap(), Duration::from_millis(250));
/// assert!(parse_duration("soon").is_err());
/// ```
pub fn parse_duration(literal: &str) -> Result<Duration, PrefetchError> {
	let trimmed = literal.trim();
	let split = trimmed
		.find(|c: char| !c.is_ascii_digit())
		.unwrap_or(trimmed.len());
	let (digits, unit) = trimmed.split_at(split);
	let invalid = || PrefetchError::InvalidDuration(literal.to_string());

	let amount: u64 = digits.parse().map_err(|_| invalid())?;
	let millis_per_unit: u64 = match unit.trim() {
		"" | "ms" => 1,
		"s" => 1_000,
		"m" => 60_000,
		"h" => 3_600_000,
		"d" => 86_400_000,
		"w" => 604_800_000,
		_ => return Err(invalid()),
	};
	amount
		.checked_mul(millis_per_unit)
		.map(Duration::from_millis)
		.ok_or_else(invalid)
}

/// How long a prefetched response stays usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheFor {
	/// Served without revalidation while younger than this.
	pub ttl: Duration,
	/// After `ttl`, served once more per request while revalidating, for this long.
	pub stale: Option<Duration>,
}

impl CacheFor {
	/// Fresh for `ttl`, then expired.
	pub fn new(ttl: Duration) -> Self {
		Self { ttl, stale: None }
	}

	/// Fresh for `ttl`, then stale-while-revalidate for `stale`.
	pub fn with_stale(ttl: Duration, stale: Duration) -> Self {
		Self {
			ttl,
			stale: Some(stale),
		}
	}

	/// Parses a single duration literal.
	pub fn parse(literal: &str) -> Result<Self, PrefetchError> {
		Ok(Self::new(parse_duration(literal)?))
	}

	/// Parses a `[ttl, stale]` pair of literals.
	///
	/// ```
	/// use pagewire_client::prefetch::CacheFor;
	/// use std::time::Duration;
	///
	/// let cache_for = CacheFor::parse_pair("30s", "1m").unwrap();
	/// assert_eq!(cache_for.ttl, Duration::from_secs(30));
	/// assert_eq!(cache_for.stale, Some(Duration::from_secs(60)));
	/// ```
	pub fn parse_pair(ttl: &str, stale: &str) -> Result<Self, PrefetchError> {
		Ok(Self::with_stale(parse_duration(ttl)?, parse_duration(stale)?))
	}

	/// Parses one or two literals, as accepted by prefetch options.
	pub fn parse_list(literals: &[&str]) -> Result<Self, PrefetchError> {
		match literals {
			[ttl] => Self::parse(ttl),
			[ttl, stale] => Self::parse_pair(ttl, stale),
			_ => Err(PrefetchError::InvalidDuration(literals.join(","))),
		}
	}

	pub(crate) fn ttl_ms(&self) -> u64 {
		millis(self.ttl)
	}

	pub(crate) fn expires_after_ms(&self) -> u64 {
		self.ttl_ms().saturating_add(self.stale.map_or(0, millis))
	}
}

fn millis(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for CacheFor {
	fn default() -> Self {
		Self::new(Duration::from_secs(30))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("0", 0)]
	#[case("500ms", 500)]
	#[case("30s", 30_000)]
	#[case("5m", 300_000)]
	#[case("1h", 3_600_000)]
	#[case("1d", 86_400_000)]
	#[case(" 2w ", 1_209_600_000)]
	fn test_parse_duration(#[case] literal: &str, #[case] millis: u64) {
		assert_eq!(parse_duration(literal).unwrap(), Duration::from_millis(millis));
	}

	#[rstest]
	#[case("")]
	#[case("s")]
	#[case("10y")]
	#[case("-5s")]
	#[case("1.5h")]
	fn test_parse_duration_rejects(#[case] literal: &str) {
		assert_eq!(
			parse_duration(literal),
			Err(PrefetchError::InvalidDuration(literal.to_string()))
		);
	}

	#[rstest]
	fn test_parse_list() {
		assert_eq!(CacheFor::parse_list(&["1m"]).unwrap(), CacheFor::new(Duration::from_secs(60)));
		assert!(CacheFor::parse_list(&[]).is_err());
		assert!(CacheFor::parse_list(&["1s", "2s", "3s"]).is_err());
	}

	#[rstest]
	fn test_default_is_thirty_seconds() {
		assert_eq!(CacheFor::default().ttl, Duration::from_secs(30));
		assert_eq!(CacheFor::default().expires_after_ms(), 30_000);
	}

	#[rstest]
	fn test_huge_windows_saturate() {
		let literal = format!("{}", u64::MAX);
		let cache_for = CacheFor::parse_pair(&literal, &literal).unwrap();

		assert_eq!(cache_for.ttl_ms(), u64::MAX);
		assert_eq!(cache_for.expires_after_ms(), u64::MAX);
		assert_eq!(CacheFor::new(Duration::MAX).ttl_ms(), u64::MAX);
	}
}
