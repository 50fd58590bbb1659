use snafu::Snafu;

/// Errors that can be produced while building or querying a [`FilterInfo`](crate::FilterInfo).
///
/// Mirrors the error taxonomy of the reference filter engine: build-time
/// failures abort the build and free the partial state; `execute` never
/// fails once a `FilterInfo` has been accepted.
#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum Error {
    #[snafu(display("invalid filter parameter: {}", message))]
    InvalidParam { message: String },

    #[snafu(display("malformed filter expression: {}", message))]
    AppError { message: String },

    #[snafu(display("invalid time condition: {}", message))]
    InvalidTimeCondition { message: String },

    #[snafu(display("unsupported type for range comparison: {:?}", data_type))]
    UnsupportedType { data_type: crate::types::DataType },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
