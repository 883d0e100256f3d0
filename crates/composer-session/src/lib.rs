//! Session state carried across composed fragments.
//!
//! Backends publish session entries as `x-rd-<key>` response headers. Each
//! fragment's headers become a [`SessionFragment`]; fragments are merged into
//! the [`SessionRoot`] of the inbound request, which tracks its id and
//! whether anything changed. A [`SessionSerializer`] picked at setup reads the
//! root from the request and writes it back onto the response.

/// Session read and write-back for whole requests.
pub mod handler;
/// Pairing of a computed value with its session.
pub mod response;
/// Pluggable session encodings.
pub mod serializer;
/// Fragment and root sessions and their merge rules.
pub mod session;

pub use handler::{session_id_interceptor, Interceptor, SessionHandler};
pub use response::ResponseWithSession;
pub use serializer::{CookieSessionSerializer, NoSessionSerializer, SessionSerializer};
pub use session::{Session, SessionEntries, SessionFragment, SessionRoot};
