//! Error tracing extensions
//!
//! Provides utilities for enriching error handling with tracing context.

use std::error::Error as StdError;

use crate::types::SupervisorError;

/// Extension trait for adding tracing context to errors
pub trait ErrorTraceExt {
    /// Log error with its protocol code, client/server classification and source chain
    fn trace_error(&self) -> &Self;
}

impl ErrorTraceExt for SupervisorError {
    fn trace_error(&self) -> &Self {
        let error_code = self.error_code();

        let mut error_chain = Vec::new();
        let mut current_source = self.source();
        while let Some(source) = current_source {
            error_chain.push(source.to_string());
            current_source = source.source();
        }

        tracing::error!(
            error = %self,
            error_code = error_code.code(),
            error_code_name = ?error_code,
            is_client_error = self.is_client_error(),
            error_chain_len = error_chain.len(),
            error_chain = ?error_chain,
            "Error occurred with full context"
        );

        self
    }
}
