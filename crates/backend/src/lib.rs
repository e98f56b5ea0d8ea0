#![deny(unsafe_code)]

//! Transport seam for the council chat surface: the wire model of conversations and
//! stage results, the stage event protocol, and an HTTP/SSE adapter.

use std::sync::Arc;

mod backend;
mod events;
mod http;
mod model;

pub use backend::{
    BackendConfig, BackendError, BackendResult, BackendWorker, BoxFuture, CouncilBackend,
    CouncilEventStream, CouncilRequest, CouncilStreamHandle, DEFAULT_BASE_URL,
    DEFAULT_IDLE_TIMEOUT,
};
pub use events::{CouncilEvent, parse_wire_event};
pub use http::HttpCouncilBackend;
pub use model::{
    AggregateRanking, Conversation, DEFAULT_CONVERSATION_TITLE, LoadingFlags, Message, Role,
    SendMessageRequest, Stage, StageMetadata, StageOneResponse, StageThreeResult,
    StageTwoRanking,
};

pub fn create_backend(config: BackendConfig) -> BackendResult<Arc<dyn CouncilBackend>> {
    Ok(Arc::new(HttpCouncilBackend::new(config)?))
}
