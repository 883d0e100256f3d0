//! Pairing of a computed value with the session that accompanies it.

use crate::serializer::SessionSerializer;
use crate::session::Session;
use composer_core::ComposerResult;
use http::Response;

/// A computed value paired with the session that accompanies it.
#[derive(Debug, Clone)]
pub struct ResponseWithSession<T> {
    payload: T,
    session: Session,
}

impl<T> ResponseWithSession<T> {
    /// Pairs `payload` with `session`.
    pub fn new(payload: T, session: Session) -> Self {
        Self { payload, session }
    }

    /// The computed value.
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// The session accompanying the payload.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Splits the pair.
    pub fn into_parts(self) -> (T, Session) {
        (self.payload, self.session)
    }

    /// Transforms the payload, keeping the session.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResponseWithSession<U> {
        ResponseWithSession {
            payload: f(self.payload),
            session: self.session,
        }
    }
}

impl<B> ResponseWithSession<Response<B>> {
    /// Writes the session onto the wrapped response.
    pub fn write_session_to_response(
        self,
        serializer: &dyn SessionSerializer,
    ) -> ComposerResult<Response<B>> {
        self.session.write_to(self.payload, serializer)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{CookieSessionSerializer, SessionRoot};
    use http::header::SET_COOKIE;
    use http::StatusCode;

    #[test]
    fn test_map_keeps_session() {
        let session = Session::from(SessionRoot::of([("a", "1")]));
        let pair = ResponseWithSession::new("<p>body</p>".to_string(), session.clone());
        let mapped = pair.map(|body| Response::builder().status(StatusCode::OK).body(body).unwrap());
        assert_eq!(mapped.session(), &session);
        assert_eq!(mapped.payload().body(), "<p>body</p>");
    }

    #[test]
    fn test_write_session_to_response() {
        let session = Session::from(SessionRoot::empty().with_id("s-1"));
        let response = Response::builder().status(StatusCode::OK).body("x").unwrap();
        let written = ResponseWithSession::new(response, session)
            .write_session_to_response(&CookieSessionSerializer::new("rdsession"))
            .unwrap();
        let cookie = written.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("rdsession="));
        assert_eq!(*written.body(), "x");
    }
}
