//! Error types for core domain operations

use thiserror::Error;

/// Errors raised while parsing a cron expression
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CronError {
    /// The expression does not have exactly five fields
    #[error("cron expression \"{0}\" must have 5 fields (minute hour day-of-month month day-of-week)")]
    FieldCount(String),

    /// A field contains a value that cannot be parsed
    #[error("invalid value \"{value}\" in {field} field")]
    InvalidValue {
        /// Which field the value belongs to
        field: &'static str,
        /// The offending text
        value: String,
    },

    /// A value is outside the field's allowed range
    #[error("value {value} out of range {min}-{max} in {field} field")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    /// A step of zero was given
    #[error("step must be greater than 0 in {0} field")]
    ZeroStep(&'static str),
}
