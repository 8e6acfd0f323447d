//! CLI error reporting helpers.

use articleforge_common::errors::{AppError, ErrorBody, ErrorCode};

/// Process exit code for a failed transition, grouped by error class.
pub fn exit_code(err: &AppError) -> i32 {
    match err.code() {
        ErrorCode::Invalid => 2,
        ErrorCode::BadRequest | ErrorCode::ParseError => 3,
        ErrorCode::AlreadyPublished
        | ErrorCode::PreviousVersionUnpublished
        | ErrorCode::PreviousVersionDne => 4,
        ErrorCode::NoRecord => 5,
        _ => 1,
    }
}

/// The `{title, detail}` body printed on failure, matching the HTTP
/// error shape.
pub fn error_body(err: &AppError) -> ErrorBody {
    ErrorBody::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_distinguish_error_classes() {
        assert_eq!(
            exit_code(&AppError::AlreadyPublished { msid: 3, version: 1 }),
            4
        );
        assert_eq!(exit_code(&AppError::no_record("article", 3)), 5);
        assert_eq!(
            exit_code(&AppError::Parse {
                message: "no id".to_string()
            }),
            3
        );
    }
}
