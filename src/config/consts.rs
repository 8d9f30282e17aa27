/// Default interval at which the cooperative wait primitive checks for cancellation (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;
/// Longest poll interval accepted from configuration (milliseconds)
pub const MAX_POLL_INTERVAL_MS: u64 = 1_000;
