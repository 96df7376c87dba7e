//! SDK error classification
//!
//! Every SDK failure becomes a [`ProviderError`]: not-found codes map to
//! `NotFound`, throttling and server faults to `Transient`, the rest to
//! `Failed` with the service code preserved.

use aws_sdk_iam::error::{ProvideErrorMetadata, SdkError};
use aws_smithy_types::error::display::DisplayErrorContext;
use keycycle_core::ProviderError;

/// Codes meaning the addressed resource does not exist
const NOT_FOUND_CODES: &[&str] = &["NoSuchEntity", "ResourceNotFoundException"];

/// Codes worth retrying
const TRANSIENT_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "RequestThrottled",
    "RequestThrottledException",
    "SlowDown",
    "PriorRequestNotComplete",
    "ServiceUnavailable",
    "ServiceUnavailableException",
    "ServiceFailure",
    "InternalFailure",
    "InternalServiceError",
    "InternalServiceErrorException",
    "RequestTimeout",
    "RequestTimeoutException",
];

/// Map a service error code to a provider error
pub fn classify_code(
    operation: &'static str,
    resource: impl FnOnce() -> String,
    code: Option<&str>,
    message: String,
) -> ProviderError {
    match code {
        Some(code) if NOT_FOUND_CODES.contains(&code) => ProviderError::not_found(resource()),
        Some(code) if TRANSIENT_CODES.contains(&code) => {
            ProviderError::Transient { operation, message }
        }
        code => ProviderError::Failed {
            operation,
            code: code.map(str::to_string),
            message,
        },
    }
}

/// Map an SDK failure to a provider error.
///
/// `resource` names the looked-up resource and is only evaluated for
/// not-found responses.
pub fn sdk_error<E, R>(
    operation: &'static str,
    resource: impl FnOnce() -> String,
    err: SdkError<E, R>,
) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ProviderError::Transient { operation, message }
        }
        SdkError::ServiceError(_) => {
            let message = err.message().map_or(message, str::to_string);
            classify_code(operation, resource, err.code(), message)
        }
        _ => ProviderError::Failed {
            operation,
            code: None,
            message,
        },
    }
}

/// Missing-field error for an SDK response
pub fn missing(operation: &'static str, field: &'static str) -> ProviderError {
    ProviderError::MalformedResponse { operation, field }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn classify(code: Option<&str>) -> ProviderError {
        classify_code(
            "DescribeSecret",
            || "secret User_alice_AccessKey".to_string(),
            code,
            "boom".to_string(),
        )
    }

    #[rstest]
    #[case("NoSuchEntity")]
    #[case("ResourceNotFoundException")]
    fn not_found_codes(#[case] code: &str) {
        let err = classify(Some(code));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "secret User_alice_AccessKey not found");
    }

    #[rstest]
    #[case("Throttling")]
    #[case("ThrottlingException")]
    #[case("ServiceFailure")]
    #[case("InternalServiceError")]
    fn transient_codes(#[case] code: &str) {
        assert!(classify(Some(code)).is_transient());
    }

    #[rstest]
    #[case(Some("AccessDenied"))]
    #[case(Some("LimitExceeded"))]
    #[case(Some("MalformedPolicyDocument"))]
    #[case(None)]
    fn other_codes_fail(#[case] code: Option<&str>) {
        match classify(code) {
            ProviderError::Failed {
                operation,
                code: got,
                ..
            } => {
                assert_eq!(operation, "DescribeSecret");
                assert_eq!(got.as_deref(), code);
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }
}
