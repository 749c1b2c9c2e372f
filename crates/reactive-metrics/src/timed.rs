//! Declarative instrumentation config, the equivalent of a `@Timed`-style
//! annotation placed on an operation or its enclosing type.

/// Instrumentation requested for an operation.
///
/// `extra_tags` is an ordered alternating key/value sequence. An odd-length
/// sequence leaves the trailing key unpaired; it is dropped at resolution
/// time (and logged) rather than failing the call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timed {
    name: String,
    extra_tags: Vec<String>,
}

impl Timed {
    /// Config with the given meter name and no extra tags.
    ///
    /// An empty name is allowed; the default meter name is substituted at
    /// recording time.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra_tags: Vec::new(),
        }
    }

    /// Attach an alternating key/value sequence of extra tags.
    #[must_use]
    pub fn with_extra_tags<S, I>(mut self, tags: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        self.extra_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// The configured meter name, possibly empty.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extra tags paired up in declaration order.
    ///
    /// A dangling trailing key is skipped and logged at warn level.
    pub fn extra_tag_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        let chunks = self.extra_tags.chunks_exact(2);
        if let Some(dangling) = chunks.remainder().first() {
            tracing::warn!(key = %dangling, "ignoring dangling extra tag key without a value");
        }
        chunks.filter_map(|pair| match pair {
            [key, value] => Some((key.as_str(), value.as_str())),
            _ => None,
        })
    }
}
