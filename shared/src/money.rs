//! Minor-currency-unit helpers.
//!
//! Every monetary field in the platform is an `i64` count of cents.

/// Formats a cent amount as a dollar string, e.g. `5000` -> `"$50.00"`.
///
/// Negative amounts keep the sign in front of the symbol: `-$3.25`.
pub fn format_usd(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}
