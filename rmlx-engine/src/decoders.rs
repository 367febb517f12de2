//! Logical source decoders
//!
//! A [`LogicalSourceResolver`] turns a byte stream into a record stream
//! according to one reference formulation. The engine selects the resolver
//! by the logical source's reference formulation IRI.
//!
//! Decoder failures surface as [`EngineError::Decoder`]; the owning
//! pipeline stamps its name onto the error before forwarding it.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;

use crate::error::{EngineError, EngineResult};
use crate::records::{select, CsvRecord, JsonRecord, Record};
use crate::resolvers::{collect_bytes, ByteStream};

/// A stream of decoded records
pub type RecordStream = BoxStream<'static, EngineResult<Record>>;

/// Decodes one reference formulation into records
pub trait LogicalSourceResolver: Send + Sync {
    /// Decode a byte source into records under the given iterator
    /// expression
    fn records(&self, iterator: Option<String>, bytes: ByteStream) -> RecordStream;
}

fn decoder_error(message: impl Into<String>) -> EngineError {
    EngineError::Decoder {
        pipeline: String::new(),
        message: message.into(),
    }
}

/// Turn an eagerly decoded batch into a record stream
fn stream_of(records: Vec<EngineResult<Record>>) -> RecordStream {
    futures::stream::iter(records).boxed()
}

/// Stream records produced by a decode future
///
/// The byte source is consumed asynchronously; decoded records are then
/// yielded lazily so bounded downstream buffers still apply backpressure.
fn stream_decoded<F>(decode: F) -> RecordStream
where
    F: std::future::Future<Output = EngineResult<Vec<EngineResult<Record>>>> + Send + 'static,
{
    futures::stream::once(decode)
        .map(|outcome| match outcome {
            Ok(records) => stream_of(records),
            Err(e) => stream_of(vec![Err(e)]),
        })
        .flatten()
        .boxed()
}

/// CSV decoder (`ql:CSV`)
///
/// The first row is the header; each following row becomes one record.
/// The iterator expression is not used for tabular sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvResolver;

impl LogicalSourceResolver for CsvResolver {
    fn records(&self, _iterator: Option<String>, bytes: ByteStream) -> RecordStream {
        stream_decoded(async move {
            let data = collect_bytes(bytes)
                .await
                .map_err(|e| decoder_error(format!("failed to read source: {e}")))?;

            let mut reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .flexible(false)
                .from_reader(data.as_slice());

            let headers: Arc<Vec<String>> = Arc::new(
                reader
                    .headers()
                    .map_err(|e| decoder_error(format!("invalid CSV header: {e}")))?
                    .iter()
                    .map(str::to_string)
                    .collect(),
            );

            let mut records: Vec<EngineResult<Record>> = Vec::new();
            for row in reader.into_records() {
                match row {
                    Ok(row) => {
                        let fields = row.iter().map(str::to_string).collect();
                        records.push(Ok(
                            Arc::new(CsvRecord::new(headers.clone(), fields)) as Record
                        ));
                    }
                    Err(e) => {
                        records.push(Err(decoder_error(format!("invalid CSV row: {e}"))));
                        break;
                    }
                }
            }
            Ok(records)
        })
    }
}

/// JSON decoder (`ql:JSONPath`)
///
/// The document is parsed as a whole; the iterator expression selects the
/// nodes that become records (the document root when absent).
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonPathResolver;

impl LogicalSourceResolver for JsonPathResolver {
    fn records(&self, iterator: Option<String>, bytes: ByteStream) -> RecordStream {
        stream_decoded(async move {
            let data = collect_bytes(bytes)
                .await
                .map_err(|e| decoder_error(format!("failed to read source: {e}")))?;

            let document: serde_json::Value = serde_json::from_slice(&data)
                .map_err(|e| decoder_error(format!("invalid JSON: {e}")))?;

            let path = iterator.as_deref().unwrap_or("$");
            let records = select(&document, path)
                .into_iter()
                .map(|node| Ok(Arc::new(JsonRecord::new(node.clone())) as Record))
                .collect();
            Ok(records)
        })
    }
}
