use serde::{Deserialize, Serialize};

/// Fixed cap on corrective iterations for one step.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RetryPolicy {
	max_retries: u8,
}

impl RetryPolicy {
	pub const fn new(max_retries: u8) -> Self {
		Self { max_retries }
	}

	pub const fn max_retries(self) -> u8 {
		self.max_retries
	}

	pub const fn counter(self) -> RetryCounter {
		RetryCounter { used: 0, max: self.max_retries }
	}
}

/// Bounded counter. `try_consume` returns `false` once the budget is spent;
/// the caller must then take its terminal path instead of retrying.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RetryCounter {
	used: u8,
	max: u8,
}

impl RetryCounter {
	pub fn try_consume(&mut self) -> bool {
		if self.used >= self.max {
			return false;
		}

		self.used += 1;

		true
	}

	pub fn exhausted(&self) -> bool {
		self.used >= self.max
	}

	pub fn used(&self) -> u8 {
		self.used
	}

	pub fn reset(&mut self) {
		self.used = 0;
	}
}
