//! Session read and write-back for a whole request.
//!
//! A [`SessionHandler`] obtains the root session of an inbound request,
//! runs the configured interceptors over it and stores it on the response.

use crate::response::ResponseWithSession;
use crate::serializer::{CookieSessionSerializer, NoSessionSerializer, SessionSerializer};
use crate::session::Session;
use composer_core::{ComposerResult, SessionConfig, SessionStorage};
use http::{request, Response};
use tracing::debug;
use uuid::Uuid;

/// Post-processes a freshly obtained session before anything is merged into it.
pub type Interceptor = Box<dyn Fn(Session, &request::Parts) -> Session + Send + Sync>;

/// Obtains the session of an inbound request and stores it on the response.
pub struct SessionHandler {
    serializer: Box<dyn SessionSerializer>,
    interceptors: Vec<Interceptor>,
}

impl SessionHandler {
    /// A handler backed by `serializer`, without interceptors.
    pub fn new(serializer: impl SessionSerializer + 'static) -> Self {
        Self {
            serializer: Box::new(serializer),
            interceptors: Vec::new(),
        }
    }

    /// A handler that never reads nor writes session state.
    pub fn no_session() -> Self {
        Self::new(NoSessionSerializer)
    }

    /// Builds the handler described by `config`.
    pub fn from_config(config: &SessionConfig) -> Self {
        match config.storage {
            SessionStorage::None => Self::no_session(),
            SessionStorage::Cookie => {
                let handler = Self::new(CookieSessionSerializer::from_config(config));
                if config.generate_id {
                    handler.with_interceptor(session_id_interceptor())
                } else {
                    handler
                }
            }
        }
    }

    /// Appends an interceptor; interceptors run in insertion order.
    pub fn with_interceptor(mut self, interceptor: Interceptor) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// The serializer selected for this handler.
    pub fn serializer(&self) -> &dyn SessionSerializer {
        self.serializer.as_ref()
    }

    /// Obtains the request's root session and runs the interceptors over it.
    pub fn initialize(&self, request: &request::Parts) -> Session {
        let session = Session::Root(self.serializer.read_from(request));
        self.interceptors
            .iter()
            .fold(session, |session, interceptor| interceptor(session, request))
    }

    /// Writes the paired session onto the paired response.
    pub fn store<B>(&self, response: ResponseWithSession<Response<B>>) -> ComposerResult<Response<B>> {
        response.write_session_to_response(self.serializer())
    }
}

/// Stamps a random id on root sessions that have none.
pub fn session_id_interceptor() -> Interceptor {
    Box::new(|session, _request| match session {
        Session::Root(root) if root.id().is_none() => {
            let id = Uuid::new_v4().to_string();
            debug!(session_id = %id, "New session");
            Session::Root(root.with_id(id))
        }
        other => other,
    })
}
