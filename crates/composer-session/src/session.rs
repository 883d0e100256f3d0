//! Fragment and root sessions and their merge rules.

use crate::serializer::SessionSerializer;
use composer_core::{ComposerResult, SESSION_HEADER_PREFIX, SESSION_ID_KEY};
use http::{HeaderMap, HeaderName, HeaderValue, Request, Response};
use std::collections::BTreeMap;
use tracing::warn;

/// Session entries keyed by lower-cased name.
///
/// An empty value is a removal marker: the key reads as absent and removes
/// the key from whatever session it is merged into.
pub type SessionEntries = BTreeMap<String, String>;

/// Session state contributed by a single fragment response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFragment {
    entries: SessionEntries,
}

impl SessionFragment {
    /// A fragment without entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Collects every `x-rd-*` header into a fragment.
    ///
    /// Header names are matched case-insensitively; the key is the name with
    /// the prefix stripped. When a header repeats, its first value wins.
    /// Values that are not visible ASCII are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut entries = SessionEntries::new();
        for (name, value) in headers {
            let Some(key) = session_key(name.as_str()) else {
                continue;
            };
            match value.to_str() {
                Ok(v) => {
                    entries.entry(key).or_insert_with(|| v.to_string());
                }
                Err(_) => warn!(header = %name, "Skipping non-text session header"),
            }
        }
        Self { entries }
    }

    /// Builds a fragment from key/value pairs. Keys are lower-cased.
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
                .collect(),
        }
    }

    /// Case-insensitive lookup. Removed keys read as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        lookup(&self.entries, key)
    }

    /// Entries including removal markers.
    pub fn raw_entries(&self) -> &SessionEntries {
        &self.entries
    }

    /// Merges `other` on top of this fragment. See [`Session::with_values_merged_from`].
    pub fn with_values_merged_from(&self, other: &Session) -> SessionFragment {
        let (entries, _) = merge_entries(&self.entries, other.raw_entries());
        SessionFragment { entries }
    }
}

/// The session of a whole inbound request.
///
/// Tracks whether any merge changed it since it was created. The session id
/// lives under [`SESSION_ID_KEY`] and never changes once set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRoot {
    data: SessionFragment,
    dirty: bool,
}

impl SessionRoot {
    /// A clean root without entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A clean root holding `entries`.
    pub fn of<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            data: SessionFragment::from_entries(entries),
            dirty: false,
        }
    }

    /// Stamps an id on the session. Changing the id makes the session dirty.
    pub fn with_id(&self, id: impl Into<String>) -> SessionRoot {
        let id = id.into();
        let changed = self.id() != Some(id.as_str());
        let mut entries = self.data.entries.clone();
        entries.insert(SESSION_ID_KEY.to_string(), id);
        SessionRoot {
            data: SessionFragment { entries },
            dirty: self.dirty || changed,
        }
    }

    /// The session id, if one was set.
    pub fn id(&self) -> Option<&str> {
        self.data.get(SESSION_ID_KEY)
    }

    /// Whether any merge changed the session since it was created.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Case-insensitive lookup. Removed keys read as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key)
    }

    /// Entries including removal markers.
    pub fn raw_entries(&self) -> &SessionEntries {
        self.data.raw_entries()
    }

    /// Merges `other` on top of this root and recomputes the dirty flag.
    pub fn with_values_merged_from(&self, other: &Session) -> SessionRoot {
        let (entries, changed) = merge_entries(&self.data.entries, other.raw_entries());
        SessionRoot {
            data: SessionFragment { entries },
            dirty: self.dirty || changed,
        }
    }

    /// Lays this root's entries on top of `below`.
    ///
    /// The inverse precedence of [`SessionRoot::with_values_merged_from`]:
    /// this root wins on every key it holds, including its id and its
    /// removal markers. The result is dirty if this root was, or if `below`
    /// contributes a key this root does not set.
    pub fn with_values_merged_beneath(&self, below: &Session) -> SessionRoot {
        let mut entries = below.raw_entries().clone();
        entries.extend(
            self.data
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        let changed = !live(&entries).eq(live(&self.data.entries));
        SessionRoot {
            data: SessionFragment { entries },
            dirty: self.dirty || changed,
        }
    }
}

/// Session state, either from one fragment or for a whole request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    /// State carried by one fragment response.
    Fragment(SessionFragment),
    /// State of the inbound request, with id and dirty tracking.
    Root(SessionRoot),
}

impl Default for Session {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<SessionFragment> for Session {
    fn from(fragment: SessionFragment) -> Self {
        Session::Fragment(fragment)
    }
}

impl From<SessionRoot> for Session {
    fn from(root: SessionRoot) -> Self {
        Session::Root(root)
    }
}

impl Session {
    /// An empty fragment session.
    pub fn empty() -> Self {
        Session::Fragment(SessionFragment::empty())
    }

    /// A fragment session parsed from response headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Session::Fragment(SessionFragment::from_headers(headers))
    }

    /// Case-insensitive lookup. Removed keys read as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        match self {
            Session::Fragment(f) => f.get(key),
            Session::Root(r) => r.get(key),
        }
    }

    /// The session id, if one was set.
    pub fn id(&self) -> Option<&str> {
        self.get(SESSION_ID_KEY)
    }

    /// Always `false` for fragments.
    pub fn is_dirty(&self) -> bool {
        match self {
            Session::Fragment(_) => false,
            Session::Root(r) => r.is_dirty(),
        }
    }

    /// Entries including removal markers.
    pub fn raw_entries(&self) -> &SessionEntries {
        match self {
            Session::Fragment(f) => f.raw_entries(),
            Session::Root(r) => r.raw_entries(),
        }
    }

    /// Entries that are set, without removal markers.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.raw_entries()
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns a session with `other`'s entries overlaid on this one.
    ///
    /// `other` wins on conflicting keys, except for the session id which is
    /// kept once this session has one. A removal marker in `other` removes
    /// the key. The result has the receiver's kind; a root becomes dirty
    /// when a key is added or its value changes.
    pub fn with_values_merged_from(&self, other: &Session) -> Session {
        match self {
            Session::Fragment(f) => Session::Fragment(f.with_values_merged_from(other)),
            Session::Root(r) => Session::Root(r.with_values_merged_from(other)),
        }
    }

    /// Adds one `x-rd-<key>` header per entry to an outgoing request.
    pub fn enrich<B>(&self, mut request: Request<B>) -> Request<B> {
        let headers = request.headers_mut();
        for (key, value) in self.entries() {
            let name = HeaderName::from_bytes(format!("{SESSION_HEADER_PREFIX}{key}").as_bytes());
            match (name, HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(key = %key, "Session entry is not a valid header, not forwarded"),
            }
        }
        request
    }

    /// Writes the session onto `response` through `serializer`.
    pub fn write_to<B>(
        &self,
        response: Response<B>,
        serializer: &dyn SessionSerializer,
    ) -> ComposerResult<Response<B>> {
        let live: SessionEntries = self
            .entries()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let (parts, body) = response.into_parts();
        let parts = serializer.write_to(parts, &live, self.is_dirty())?;
        Ok(Response::from_parts(parts, body))
    }
}

fn session_key(header_name: &str) -> Option<String> {
    let prefix = header_name.get(..SESSION_HEADER_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(SESSION_HEADER_PREFIX) {
        return None;
    }
    let key = &header_name[SESSION_HEADER_PREFIX.len()..];
    (!key.is_empty()).then(|| key.to_ascii_lowercase())
}

fn live(entries: &SessionEntries) -> impl Iterator<Item = (&String, &String)> {
    entries.iter().filter(|(_, v)| !v.is_empty())
}

fn lookup<'a>(entries: &'a SessionEntries, key: &str) -> Option<&'a str> {
    entries
        .get(&key.to_ascii_lowercase())
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

/// Overlays `other` on `base`. Returns the merged entries and whether any
/// key was added, changed or removed.
fn merge_entries(base: &SessionEntries, other: &SessionEntries) -> (SessionEntries, bool) {
    let keep_id = lookup(base, SESSION_ID_KEY).is_some();
    let mut merged = base.clone();
    let mut changed = false;
    for (key, value) in other {
        if keep_id && key == SESSION_ID_KEY {
            continue;
        }
        let before = lookup(base, key);
        let after = Some(value.as_str()).filter(|v| !v.is_empty());
        changed |= before != after;
        merged.insert(key.clone(), value.clone());
    }
    (merged, changed)
}
