use thiserror::Error;

/// Boxed failure produced by a [`JsonCodec`](crate::codec::JsonCodec).
pub type CodecError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("query execution error: {message} (query: {query})")]
    QueryExecutionError { message: String, query: String },
    #[error("binding error: {0}")]
    BindingError(String),
    #[error("encoding error: {0}")]
    EncodingError(#[source] CodecError),
    #[error("decoding error: {0}")]
    DecodingError(#[source] CodecError),
    #[error("node not found: {0}")]
    NodeNotFound(String),
    #[error("template error: {0}")]
    TemplateError(String),
}

impl GraphError {
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        GraphError::ConnectionError(msg.into())
    }

    pub fn query_execution<M: Into<String>, Q: Into<String>>(message: M, query: Q) -> Self {
        GraphError::QueryExecutionError {
            message: message.into(),
            query: query.into(),
        }
    }

    pub fn binding<T: Into<String>>(msg: T) -> Self {
        GraphError::BindingError(msg.into())
    }

    pub fn encoding<E: Into<CodecError>>(err: E) -> Self {
        GraphError::EncodingError(err.into())
    }

    pub fn decoding<E: Into<CodecError>>(err: E) -> Self {
        GraphError::DecodingError(err.into())
    }

    pub fn node_not_found<T: Into<String>>(id: T) -> Self {
        GraphError::NodeNotFound(id.into())
    }

    pub fn template<T: Into<String>>(msg: T) -> Self {
        GraphError::TemplateError(msg.into())
    }
}
