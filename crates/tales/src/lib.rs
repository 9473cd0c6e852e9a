pub mod auth;
pub mod error;
pub mod publication;
pub mod service;

pub use auth::{AuthorizationRequest, authorization_message, verify_upload_authorization};
pub use error::TaleError;
pub use publication::{PendingPublications, PreparedPublication, PublicationState};
pub use service::{
    CONTENT_UNAVAILABLE_SENTINEL, CreateTaleRequest, FullTale, PrepareTalePublicationRequest,
    PreparedPublicationResponse, RecordBatchPublicationRequest, RecordTalePublicationRequest,
    TalesService,
};
