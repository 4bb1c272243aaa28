//! Mapping of application errors onto JSON-RPC error codes.

use docvec_core::AppError;
use rmcp::model::ErrorCode;
use rmcp::ErrorData;

/// The embedding service rejected or failed the query embedding.
pub const EMBEDDING_ERROR: ErrorCode = ErrorCode(-32001);

/// The vector store could not be read.
pub const STORE_ERROR: ErrorCode = ErrorCode(-32002);

pub fn error_code(err: &AppError) -> ErrorCode {
    match err {
        AppError::InvalidArgument(_) => ErrorCode::INVALID_PARAMS,
        AppError::Embedding { .. } => EMBEDDING_ERROR,
        AppError::StoreUnavailable(_) => STORE_ERROR,
        _ => ErrorCode::INTERNAL_ERROR,
    }
}

pub fn to_error_data(err: &AppError) -> ErrorData {
    ErrorData::new(error_code(err), err.to_string(), None)
}
