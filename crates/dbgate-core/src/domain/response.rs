//! Response envelope: the uniform result of every data access operation.
//!
//! Nothing in the façade reports failure through `Err` or a panic. Instead each
//! operation returns a [`Response`] whose [`ReturnCode`] says what went wrong and
//! whose message says where.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of outcome codes.
///
/// Each failure class has exactly one code. Discriminants start at 1 so the
/// numeric form stays stable for callers that persist or transmit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReturnCode {
    #[default]
    Success = 1,
    PartialSuccess,
    Fail,
    InvalidInput,
    DoesNotExist,
    NoEntitiesMatchQuery,
    MappingFailure,
    StorageUpdateFailure,
    StorageAddFailure,
    StorageRemoveFailure,
    StorageSetNotFound,
}

impl ReturnCode {
    pub fn is_success(self) -> bool {
        self == ReturnCode::Success
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReturnCode::Success => "Success",
            ReturnCode::PartialSuccess => "PartialSuccess",
            ReturnCode::Fail => "Fail",
            ReturnCode::InvalidInput => "InvalidInput",
            ReturnCode::DoesNotExist => "DoesNotExist",
            ReturnCode::NoEntitiesMatchQuery => "NoEntitiesMatchQuery",
            ReturnCode::MappingFailure => "MappingFailure",
            ReturnCode::StorageUpdateFailure => "StorageUpdateFailure",
            ReturnCode::StorageAddFailure => "StorageAddFailure",
            ReturnCode::StorageRemoveFailure => "StorageRemoveFailure",
            ReturnCode::StorageSetNotFound => "StorageSetNotFound",
        }
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default message of a successful response.
pub const SUCCESS_MESSAGE: &str = "Success";

/// Success/failure container returned by every operation.
///
/// Invariants (enforced by construction, fields are private):
/// - `success == (return_code == ReturnCode::Success)`
/// - a successful response always carries `data`
/// - a failed response has a non-empty `return_message`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response<T> {
    data: Option<T>,
    success: bool,
    return_code: ReturnCode,
    return_message: String,
}

impl<T> Response<T> {
    /// The single factory. `success` is derived from `return_code`.
    pub fn build(data: T, return_code: ReturnCode, return_message: impl Into<String>) -> Self {
        Self::assemble(Some(data), return_code, return_message.into())
    }

    pub fn success(data: T) -> Self {
        Self::build(data, ReturnCode::Success, SUCCESS_MESSAGE)
    }

    /// Failed response with no payload.
    pub fn failure(return_code: ReturnCode, return_message: impl Into<String>) -> Self {
        Self::assemble(None, Self::failure_code(return_code), return_message.into())
    }

    /// Failed response that still hands a payload back to the caller.
    pub fn failure_with(data: T, return_code: ReturnCode, return_message: impl Into<String>) -> Self {
        Self::assemble(
            Some(data),
            Self::failure_code(return_code),
            return_message.into(),
        )
    }

    fn assemble(data: Option<T>, return_code: ReturnCode, mut return_message: String) -> Self {
        let success = return_code.is_success();
        if return_message.is_empty() {
            return_message = return_code.as_str().to_string();
        }
        Self {
            data,
            success,
            return_code,
            return_message,
        }
    }

    // A failure built with `Success` would break the invariant on the first read.
    fn failure_code(return_code: ReturnCode) -> ReturnCode {
        if return_code.is_success() {
            ReturnCode::Fail
        } else {
            return_code
        }
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn return_code(&self) -> ReturnCode {
        self.return_code
    }

    pub fn return_message(&self) -> &str {
        &self.return_message
    }

    /// Re-type a failed response, keeping code and message.
    ///
    /// A successful response has nothing to forward and hands its payload back as `Err`.
    pub fn propagate<U>(self) -> Result<Response<U>, T> {
        match self.into_result() {
            Ok(data) => Err(data),
            Err(failure) => Ok(failure.into_response()),
        }
    }

    /// Run `next` on the payload of a successful response; forward a failure unchanged.
    pub fn and_then<U, F>(self, next: F) -> Response<U>
    where
        F: FnOnce(T) -> Response<U>,
    {
        match self.into_result() {
            Ok(data) => next(data),
            Err(failure) => failure.into_response(),
        }
    }

    /// Transform the payload of a successful response.
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        self.and_then(|data| Response::success(f(data)))
    }

    pub fn into_result(self) -> Result<T, Failure> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (_, _) => Err(Failure {
                code: self.return_code,
                message: self.return_message,
            }),
        }
    }
}

impl<T: Default> Response<T> {
    /// Fill an absent failure payload with `T::default()`.
    pub fn or_default_data(mut self) -> Self {
        if self.data.is_none() {
            self.data = Some(T::default());
        }
        self
    }
}

/// Code and message of a failed response, detached from its payload type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub code: ReturnCode,
    pub message: String,
}

impl Failure {
    pub fn into_response<T>(self) -> Response<T> {
        Response::failure(self.code, self.message)
    }

    pub fn into_response_with<T>(self, data: T) -> Response<T> {
        Response::failure_with(data, self.code, self.message)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
