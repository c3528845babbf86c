//! Ordered, case-insensitive header storage.

/// An ordered multimap of header fields.
///
/// Keys are compared case-insensitively (`§3`: "keys case-insensitive but
/// original casing preserved for rendering"), but no case-folding happens
/// on insertion — the original bytes off the wire are kept so the renderer
/// can echo back exactly what a handler set.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// An empty header set.
    pub fn new() -> Self {
        Headers {
            entries: Vec::new(),
        }
    }

    pub(crate) fn with_capacity(cap: usize) -> Self {
        Headers {
            entries: Vec::with_capacity(cap),
        }
    }

    /// Append a header, without deduplicating against existing entries of
    /// the same name (matches `§4.E`: "append header, does not deduplicate").
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// The first value for `name`, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in insertion order, case-insensitively.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether `name` is present, case-insensitively.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate all `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of header fields (not distinct names).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no header fields at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// `Connection` header value equal to `keep-alive`, case-insensitively.
    pub(crate) fn connection_is_keep_alive(&self) -> bool {
        self.get("connection")
            .is_some_and(|v| v.eq_ignore_ascii_case("keep-alive"))
    }

    /// `Connection` header value equal to `close`, case-insensitively.
    pub(crate) fn connection_is_close(&self) -> bool {
        self.get("connection")
            .is_some_and(|v| v.eq_ignore_ascii_case("close"))
    }

    /// `Connection` header carries the `upgrade` token, case-insensitively.
    /// `Connection` is comma-separated, so this checks each token rather
    /// than the whole value (some clients send `keep-alive, Upgrade`).
    pub(crate) fn connection_has_upgrade(&self) -> bool {
        self.get("connection")
            .is_some_and(|v| v.split(',').any(|tok| tok.trim().eq_ignore_ascii_case("upgrade")))
    }
}
