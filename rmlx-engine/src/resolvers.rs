//! Source resolvers
//!
//! A source resolver turns a declarative source reference into a byte
//! stream. A composite resolver tries registered resolvers in insertion
//! order and returns the first match; returning `None` means "not mine",
//! letting the next resolver try.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;

use rmlx_model::SourceSpec;

use crate::error::{EngineError, EngineResult};

/// An asynchronous chunk stream of source bytes
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Wrap an in-memory buffer as a single-chunk byte stream
pub fn byte_stream_from(bytes: impl Into<Bytes>) -> ByteStream {
    let chunk = bytes.into();
    futures::stream::once(async move { Ok(chunk) }).boxed()
}

/// Collect a byte stream into memory
pub async fn collect_bytes(mut stream: ByteStream) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf)
}

/// Resolves a declarative source reference to a byte stream
///
/// Resolvers are pure with respect to the mapping; they may perform I/O.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Resolve a source reference
    ///
    /// `Ok(None)` means this resolver does not handle the reference.
    async fn resolve(&self, source: &SourceSpec) -> EngineResult<Option<ByteStream>>;
}

/// Tries registered resolvers in insertion order, first match wins
#[derive(Default)]
pub struct CompositeResolver {
    resolvers: Vec<Arc<dyn SourceResolver>>,
}

impl CompositeResolver {
    /// Create a composite over the given resolvers
    pub fn new(resolvers: Vec<Arc<dyn SourceResolver>>) -> Self {
        Self { resolvers }
    }

    /// Append a resolver
    pub fn push(&mut self, resolver: Arc<dyn SourceResolver>) {
        self.resolvers.push(resolver);
    }

    /// Whether any resolvers are registered
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

#[async_trait]
impl SourceResolver for CompositeResolver {
    async fn resolve(&self, source: &SourceSpec) -> EngineResult<Option<ByteStream>> {
        for resolver in &self.resolvers {
            if let Some(stream) = resolver.resolve(source).await? {
                return Ok(Some(stream));
            }
        }
        Ok(None)
    }
}

/// Resolves plain references as paths under a base directory
pub struct FileResolver {
    base: PathBuf,
}

impl FileResolver {
    /// Create a file resolver rooted at `base`
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

#[async_trait]
impl SourceResolver for FileResolver {
    async fn resolve(&self, source: &SourceSpec) -> EngineResult<Option<ByteStream>> {
        let SourceSpec::Reference(reference) = source else {
            return Ok(None);
        };
        let path = self.base.join(reference);

        match tokio::fs::try_exists(&path).await {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(e) => {
                return Err(EngineError::SourceResolution(format!(
                    "cannot stat {}: {e}",
                    path.display()
                )))
            }
        }

        let data = tokio::fs::read(&path).await.map_err(|e| {
            EngineError::SourceResolution(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(Some(byte_stream_from(data)))
    }
}

/// Resolves plain references against registered in-memory assets
///
/// The Rust analog of a classpath resolver: assets are registered under a
/// base prefix (typically embedded at compile time with `include_bytes!`)
/// and looked up by reference relative to that prefix.
#[derive(Default)]
pub struct EmbeddedResolver {
    base: String,
    assets: HashMap<String, Bytes>,
}

impl EmbeddedResolver {
    /// Create a resolver with a base prefix
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            assets: HashMap::new(),
        }
    }

    /// Register an asset under its name relative to the base prefix
    pub fn with_asset(mut self, name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let name = name.into();
        let key = if self.base.is_empty() {
            name
        } else {
            format!("{}/{}", self.base.trim_end_matches('/'), name)
        };
        self.assets.insert(key, bytes.into());
        self
    }

    fn lookup(&self, reference: &str) -> Option<&Bytes> {
        if let Some(asset) = self.assets.get(reference) {
            return Some(asset);
        }
        if self.base.is_empty() {
            return None;
        }
        let key = format!("{}/{}", self.base.trim_end_matches('/'), reference);
        self.assets.get(&key)
    }
}

#[async_trait]
impl SourceResolver for EmbeddedResolver {
    async fn resolve(&self, source: &SourceSpec) -> EngineResult<Option<ByteStream>> {
        let SourceSpec::Reference(reference) = source else {
            return Ok(None);
        };
        Ok(self.lookup(reference).map(|b| byte_stream_from(b.clone())))
    }
}

/// Binds named input streams provided at mapping time
///
/// Resolves `carml:Stream` sources by stream name, and plain references by
/// exact key match. An unnamed stream binds to the designated unnamed
/// input, or to the sole named input when only one exists.
#[derive(Default, Clone)]
pub struct NamedInputResolver {
    named: HashMap<String, Bytes>,
    unnamed: Option<Bytes>,
}

impl NamedInputResolver {
    /// Create an empty binding set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create bindings from a name-to-bytes map
    pub fn from_named(named: HashMap<String, Bytes>) -> Self {
        Self {
            named,
            unnamed: None,
        }
    }

    /// Create a binding for a single unnamed input
    pub fn from_unnamed(bytes: impl Into<Bytes>) -> Self {
        Self {
            named: HashMap::new(),
            unnamed: Some(bytes.into()),
        }
    }

    /// Add a named input
    pub fn with_input(mut self, name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        self.named.insert(name.into(), bytes.into());
        self
    }
}

#[async_trait]
impl SourceResolver for NamedInputResolver {
    async fn resolve(&self, source: &SourceSpec) -> EngineResult<Option<ByteStream>> {
        let bytes = match source {
            SourceSpec::NamedStream(Some(name)) => self.named.get(name),
            SourceSpec::NamedStream(None) => self.unnamed.as_ref().or_else(|| {
                if self.named.len() == 1 {
                    self.named.values().next()
                } else {
                    None
                }
            }),
            SourceSpec::Reference(reference) => self.named.get(reference),
        };
        Ok(bytes.map(|b| byte_stream_from(b.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_file_resolver() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("data.csv")).unwrap();
        writeln!(f, "a,b").unwrap();
        writeln!(f, "1,2").unwrap();

        let resolver = FileResolver::new(dir.path());
        let stream = resolver
            .resolve(&SourceSpec::reference("data.csv"))
            .await
            .unwrap()
            .expect("file found");
        let bytes = collect_bytes(stream).await.unwrap();
        assert_eq!(bytes, b"a,b\n1,2\n");

        let missing = resolver
            .resolve(&SourceSpec::reference("nope.csv"))
            .await
            .unwrap();
        assert!(missing.is_none());

        // Streams are not this resolver's concern.
        let stream_ref = resolver
            .resolve(&SourceSpec::stream("feed"))
            .await
            .unwrap();
        assert!(stream_ref.is_none());
    }

    #[tokio::test]
    async fn test_embedded_resolver() {
        let resolver = EmbeddedResolver::new("mappings").with_asset("people.csv", &b"a\n1\n"[..]);

        let found = resolver
            .resolve(&SourceSpec::reference("people.csv"))
            .await
            .unwrap();
        assert!(found.is_some());

        let by_full_key = resolver
            .resolve(&SourceSpec::reference("mappings/people.csv"))
            .await
            .unwrap();
        assert!(by_full_key.is_some());

        let missing = resolver
            .resolve(&SourceSpec::reference("other.csv"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_named_input_resolver() {
        let resolver = NamedInputResolver::new().with_input("feed", &b"{}"[..]);

        let named = resolver
            .resolve(&SourceSpec::stream("feed"))
            .await
            .unwrap();
        assert!(named.is_some());

        // A single named input also satisfies an unnamed stream.
        let unnamed = resolver
            .resolve(&SourceSpec::unnamed_stream())
            .await
            .unwrap();
        assert!(unnamed.is_some());

        // And an exact-match plain reference.
        let by_key = resolver
            .resolve(&SourceSpec::reference("feed"))
            .await
            .unwrap();
        assert!(by_key.is_some());
    }

    #[tokio::test]
    async fn test_composite_order() {
        let first = NamedInputResolver::new().with_input("x", &b"first"[..]);
        let second = NamedInputResolver::new().with_input("x", &b"second"[..]);
        let composite =
            CompositeResolver::new(vec![Arc::new(first), Arc::new(second)]);

        let stream = composite
            .resolve(&SourceSpec::stream("x"))
            .await
            .unwrap()
            .unwrap();
        let bytes = collect_bytes(stream).await.unwrap();
        assert_eq!(bytes, b"first");
    }
}
