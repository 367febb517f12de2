//! Logical source pipeline
//!
//! One pipeline per distinct logical source: the source is read exactly
//! once and every record fans out to all triples mappers sharing it. Each
//! mapper runs as its own task fed by a bounded channel, so the slowest
//! mapper throttles the decoder and per-source record order is preserved
//! at every consumer.
//!
//! Decoder errors are fatal to the pipeline: the error (named with the
//! pipeline's source) goes to the output stream and the pipeline stops
//! without signaling join completion, so no partial joins are emitted.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use rmlx_graph::{Statement, Term};
use rmlx_model::LogicalSource;
use rmlx_vocab::{rdf, rr};

use crate::decoders::LogicalSourceResolver;
use crate::error::{EngineError, EngineResult};
use crate::join::{RefObjectMapper, StatementResult};
use crate::resolvers::ByteStream;
use crate::terms::{RecordContext, TermGenerator};

/// Compiled predicate-object map
pub(crate) struct CompiledPom {
    pub(crate) predicate_gens: Vec<TermGenerator>,
    pub(crate) object_gens: Vec<TermGenerator>,
    pub(crate) graph_gens: Vec<TermGenerator>,
    /// Conditioned RefObjectMaps, deferred through the join engine
    pub(crate) ref_mappers: Vec<Arc<RefObjectMapper>>,
    /// Unconditioned RefObjectMaps: the parent's subject generator,
    /// evaluated against the same record
    pub(crate) self_join_gens: Vec<TermGenerator>,
}

/// One TriplesMap compiled against a term generator factory
pub struct TriplesMapper {
    triples_map_id: String,
    subject_gen: TermGenerator,
    classes: Vec<Term>,
    subject_graph_gens: Vec<TermGenerator>,
    poms: Vec<CompiledPom>,
    /// RefObjectMappers for which this TriplesMap is the parent
    incoming: Vec<Arc<RefObjectMapper>>,
    strict: bool,
}

impl TriplesMapper {
    pub(crate) fn new(
        triples_map_id: String,
        subject_gen: TermGenerator,
        classes: Vec<Term>,
        subject_graph_gens: Vec<TermGenerator>,
        poms: Vec<CompiledPom>,
        incoming: Vec<Arc<RefObjectMapper>>,
        strict: bool,
    ) -> Self {
        Self {
            triples_map_id,
            subject_gen,
            classes,
            subject_graph_gens,
            poms,
            incoming,
            strict,
        }
    }

    /// The id of the TriplesMap this mapper executes
    pub fn triples_map_id(&self) -> &str {
        &self.triples_map_id
    }

    pub(crate) fn outgoing(&self) -> impl Iterator<Item = &Arc<RefObjectMapper>> {
        self.poms.iter().flat_map(|pom| pom.ref_mappers.iter())
    }

    pub(crate) fn incoming(&self) -> impl Iterator<Item = &Arc<RefObjectMapper>> {
        self.incoming.iter()
    }

    /// Map one record to its statements
    ///
    /// Subject generation runs first; a record without a subject produces
    /// nothing. `rdf:type` statements precede the record's
    /// predicate-object statements. Conditioned RefObjectMaps route into
    /// the join engine instead of emitting inline.
    pub async fn map_record(&self, ctx: &RecordContext) -> EngineResult<Vec<Statement>> {
        let subjects = self.lenient(&self.subject_gen, ctx)?;
        if subjects.is_empty() {
            return Ok(Vec::new());
        }

        let subject_graphs = self.eval_graphs(&self.subject_graph_gens, ctx)?;

        let mut statements = Vec::new();
        let type_graphs = defaulted(&subject_graphs);
        for subject in &subjects {
            for class in &self.classes {
                for graph in &type_graphs {
                    statements.push(Statement {
                        subject: subject.clone(),
                        predicate: Term::iri(rdf::TYPE),
                        object: class.clone(),
                        graph: graph.clone(),
                    });
                }
            }
        }

        for pom in &self.poms {
            let mut predicates = Vec::new();
            for generator in &pom.predicate_gens {
                predicates.extend(self.lenient(generator, ctx)?);
            }
            if predicates.is_empty() {
                continue;
            }

            let mut combined = subject_graphs.clone();
            for graph in self.eval_graphs(&pom.graph_gens, ctx)? {
                if !combined.contains(&graph) {
                    combined.push(graph);
                }
            }
            let graphs = defaulted(&combined);

            let mut objects = Vec::new();
            for generator in &pom.object_gens {
                objects.extend(self.lenient(generator, ctx)?);
            }
            for generator in &pom.self_join_gens {
                objects.extend(self.lenient(generator, ctx)?);
            }

            for subject in &subjects {
                for predicate in &predicates {
                    for object in &objects {
                        for graph in &graphs {
                            statements.push(Statement {
                                subject: subject.clone(),
                                predicate: predicate.clone(),
                                object: object.clone(),
                                graph: graph.clone(),
                            });
                        }
                    }
                }
            }

            for ref_mapper in &pom.ref_mappers {
                ref_mapper
                    .on_child_record(ctx, &subjects, &predicates, &graphs)
                    .await?;
            }
        }

        for ref_mapper in &self.incoming {
            ref_mapper.on_parent_record(ctx, &subjects).await?;
        }

        Ok(statements)
    }

    /// Run a generator, degrading term errors to warnings unless strict
    fn lenient(&self, generator: &TermGenerator, ctx: &RecordContext) -> EngineResult<Vec<Term>> {
        match generator(ctx) {
            Err(EngineError::TermGeneration(message)) if !self.strict => {
                warn!(
                    triples_map = %self.triples_map_id,
                    %message,
                    "term generation failed; treating term as absent"
                );
                Ok(Vec::new())
            }
            other => other,
        }
    }

    fn eval_graphs(
        &self,
        generators: &[TermGenerator],
        ctx: &RecordContext,
    ) -> EngineResult<Vec<Option<Term>>> {
        let mut graphs = Vec::new();
        for generator in generators {
            for term in self.lenient(generator, ctx)? {
                let graph = if term.as_iri() == Some(rr::DEFAULT_GRAPH) {
                    None
                } else {
                    Some(term)
                };
                if !graphs.contains(&graph) {
                    graphs.push(graph);
                }
            }
        }
        Ok(graphs)
    }
}

fn defaulted(graphs: &[Option<Term>]) -> Vec<Option<Term>> {
    if graphs.is_empty() {
        vec![None]
    } else {
        graphs.to_vec()
    }
}

/// A per-logical-source dataflow
pub struct LogicalSourcePipeline {
    logical_source: LogicalSource,
    name: String,
    decoder: Arc<dyn LogicalSourceResolver>,
    mappers: Vec<Arc<TriplesMapper>>,
    channel_capacity: usize,
}

impl LogicalSourcePipeline {
    pub(crate) fn new(
        logical_source: LogicalSource,
        decoder: Arc<dyn LogicalSourceResolver>,
        mappers: Vec<Arc<TriplesMapper>>,
        channel_capacity: usize,
    ) -> Self {
        let name = logical_source.source.describe();
        Self {
            logical_source,
            name,
            decoder,
            mappers,
            channel_capacity,
        }
    }

    /// The pipeline's source name, used in diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The logical source this pipeline reads
    pub fn logical_source(&self) -> &LogicalSource {
        &self.logical_source
    }

    /// The triples mappers sharing this source
    pub fn mappers(&self) -> &[Arc<TriplesMapper>] {
        &self.mappers
    }

    /// Read the source once and fan records out to every mapper
    pub async fn run(self: Arc<Self>, bytes: ByteStream, out: mpsc::Sender<StatementResult>) {
        debug!(pipeline = %self.name, mappers = self.mappers.len(), "pipeline starting");

        let mut records = self
            .decoder
            .records(self.logical_source.iterator.clone(), bytes);

        let mut senders = Vec::with_capacity(self.mappers.len());
        let mut workers = Vec::with_capacity(self.mappers.len());
        for mapper in &self.mappers {
            let (tx, rx) = mpsc::channel::<Arc<RecordContext>>(self.channel_capacity);
            senders.push(tx);
            workers.push(tokio::spawn(run_mapper(mapper.clone(), rx, out.clone())));
        }

        let mut ordinal = 0u64;
        let mut ok = true;
        while let Some(next) = records.next().await {
            match next {
                Ok(record) => {
                    let ctx = Arc::new(RecordContext::new(record, ordinal));
                    ordinal += 1;
                    let mut closed = false;
                    for tx in &senders {
                        if tx.send(ctx.clone()).await.is_err() {
                            closed = true;
                            break;
                        }
                    }
                    if closed {
                        ok = false;
                        break;
                    }
                }
                Err(e) => {
                    let _ = out.send(Err(e.in_pipeline(&self.name))).await;
                    ok = false;
                    break;
                }
            }
        }

        // Close the fan-out channels so workers drain and finish.
        drop(senders);
        for worker in workers {
            if !matches!(worker.await, Ok(true)) {
                ok = false;
            }
        }

        if !ok {
            debug!(pipeline = %self.name, "pipeline aborted; join completion withheld");
            return;
        }

        // Completion: let every join this pipeline participates in know.
        for mapper in &self.mappers {
            for ref_mapper in mapper.outgoing() {
                if let Err(e) = ref_mapper.complete_child(&out).await {
                    let _ = out.send(Err(e)).await;
                    return;
                }
            }
            for ref_mapper in mapper.incoming() {
                if let Err(e) = ref_mapper.complete_parent(&out).await {
                    let _ = out.send(Err(e)).await;
                    return;
                }
            }
        }

        debug!(pipeline = %self.name, records = ordinal, "pipeline complete");
    }
}

/// Per-mapper worker: evaluates records in arrival order
///
/// Returns `true` on clean completion, `false` on error or cancellation.
async fn run_mapper(
    mapper: Arc<TriplesMapper>,
    mut rx: mpsc::Receiver<Arc<RecordContext>>,
    out: mpsc::Sender<StatementResult>,
) -> bool {
    while let Some(ctx) = rx.recv().await {
        match mapper.map_record(&ctx).await {
            Ok(statements) => {
                for statement in statements {
                    if out.send(Ok(statement)).await.is_err() {
                        return false;
                    }
                }
            }
            Err(e) => {
                let _ = out.send(Err(e)).await;
                return false;
            }
        }
    }
    true
}
