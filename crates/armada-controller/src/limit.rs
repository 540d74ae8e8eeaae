//! Resolution of integer-or-percent budget expressions against a count.

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use snafu::{OptionExt, ResultExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Snafu)]
pub enum Error {
    #[snafu(display("invalid limit {value:?}, must be an integer or a percentage ending in '%'"))]
    InvalidExpression { value: String },

    #[snafu(display("failed to parse percentage {value:?}"))]
    ParsePercentage {
        source: std::num::ParseIntError,
        value: String,
    },
}

/// Resolves the first present expression against `count`; later expressions
/// act as defaults.
///
/// - no expression at all resolves to the full `count`
/// - integers are taken verbatim, including 0 and values above `count`
/// - percentages resolve to `count * percent / 100` in integer arithmetic,
///   rounded down
/// - a non-positive `count` or a non-positive percentage result resolves to 1
pub fn limit(count: i32, exprs: &[Option<&IntOrString>]) -> Result<i32> {
    if count <= 0 {
        return Ok(1);
    }

    let Some(expr) = exprs.iter().copied().flatten().next() else {
        return Ok(count);
    };

    match expr {
        IntOrString::Int(value) => Ok(*value),
        IntOrString::String(value) => {
            let percent = value
                .strip_suffix('%')
                .context(InvalidExpressionSnafu { value: value.as_str() })?;
            let percent: i64 = percent
                .trim()
                .parse()
                .context(ParsePercentageSnafu { value: value.as_str() })?;

            // Round down; sub-percent remainders never open extra slots.
            let resolved = i64::from(count) * percent / 100;
            if resolved <= 0 {
                Ok(1)
            } else {
                Ok(i32::try_from(resolved).unwrap_or(i32::MAX))
            }
        }
    }
}
