//! Mapper orchestrator
//!
//! [`RmlMapper`] ties the pieces together: given a set of TriplesMaps it
//! validates the configuration, compiles term generators (pure phase, no
//! I/O), groups TriplesMaps into one pipeline per distinct logical source,
//! and on each `map*` call binds the pipelines to resolved byte sources
//! and runs them concurrently.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use rmlx_graph::{DefaultTermFactory, Graph, Statement, TermFactory};
use rmlx_model::{filter_mappable, LogicalSource, TriplesMap};

use crate::decoders::{CsvResolver, JsonPathResolver, LogicalSourceResolver};
use crate::encode::NormalizationForm;
use crate::error::{EngineError, EngineResult};
use crate::functions::Functions;
use crate::join::{
    ChildSideJoinStoreProvider, InMemoryChildSideJoinStoreProvider,
    InMemoryParentSideJoinConditionStoreProvider, ParentSideJoinConditionStoreProvider,
    RefObjectMapper, StatementResult,
};
use crate::pipeline::{CompiledPom, LogicalSourcePipeline, TriplesMapper};
use crate::records::Record;
use crate::resolvers::{
    CompositeResolver, EmbeddedResolver, FileResolver, NamedInputResolver, SourceResolver,
};
use crate::terms::{GeneratorOptions, RecordContext, TermGeneratorFactory};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CHANNEL_CAPACITY: usize = 128;

/// A set of TriplesMap ids restricting a run
pub type TriplesMapFilter = HashSet<String>;

/// Builder for [`RmlMapper`]
pub struct RmlMapperBuilder {
    triples_maps: Vec<TriplesMap>,
    logical_source_resolvers: HashMap<String, Arc<dyn LogicalSourceResolver>>,
    source_resolvers: Vec<Arc<dyn SourceResolver>>,
    functions: Functions,
    term_factory: Arc<dyn TermFactory>,
    normalization_form: NormalizationForm,
    iri_upper_case_percent_encoding: bool,
    child_side_join_store_provider: Arc<dyn ChildSideJoinStoreProvider>,
    parent_side_join_condition_store_provider: Arc<dyn ParentSideJoinConditionStoreProvider>,
    map_to_graph_timeout: Duration,
    strict: bool,
    continue_on_pipeline_error: bool,
    channel_capacity: usize,
}

impl Default for RmlMapperBuilder {
    fn default() -> Self {
        Self {
            triples_maps: Vec::new(),
            logical_source_resolvers: HashMap::new(),
            source_resolvers: Vec::new(),
            functions: Functions::new(),
            term_factory: Arc::new(DefaultTermFactory),
            normalization_form: NormalizationForm::Nfc,
            iri_upper_case_percent_encoding: true,
            child_side_join_store_provider: Arc::new(InMemoryChildSideJoinStoreProvider),
            parent_side_join_condition_store_provider: Arc::new(
                InMemoryParentSideJoinConditionStoreProvider,
            ),
            map_to_graph_timeout: DEFAULT_TIMEOUT,
            strict: false,
            continue_on_pipeline_error: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl RmlMapperBuilder {
    /// Set the TriplesMaps to execute
    pub fn triples_maps(mut self, triples_maps: impl IntoIterator<Item = TriplesMap>) -> Self {
        self.triples_maps = triples_maps.into_iter().collect();
        self
    }

    /// Bind a decoder to a reference formulation IRI
    pub fn logical_source_resolver(
        mut self,
        formulation: impl Into<String>,
        resolver: Arc<dyn LogicalSourceResolver>,
    ) -> Self {
        self.logical_source_resolvers
            .insert(formulation.into(), resolver);
        self
    }

    /// Register the built-in CSV and JSONPath decoders
    pub fn default_logical_source_resolvers(self) -> Self {
        self.logical_source_resolver(rmlx_vocab::ql::CSV, Arc::new(CsvResolver))
            .logical_source_resolver(rmlx_vocab::ql::JSON_PATH, Arc::new(JsonPathResolver))
    }

    /// Append a source resolver; resolvers are tried in insertion order
    pub fn source_resolver(mut self, resolver: Arc<dyn SourceResolver>) -> Self {
        self.source_resolvers.push(resolver);
        self
    }

    /// Append a file-system resolver rooted at `base`
    pub fn file_resolver(self, base: impl Into<std::path::PathBuf>) -> Self {
        self.source_resolver(Arc::new(FileResolver::new(base)))
    }

    /// Append an embedded-asset resolver
    pub fn embedded_resolver(self, resolver: EmbeddedResolver) -> Self {
        self.source_resolver(Arc::new(resolver))
    }

    /// Set the user-defined function registry
    pub fn functions(mut self, functions: Functions) -> Self {
        self.functions = functions;
        self
    }

    /// Plug in a term factory
    pub fn term_factory(mut self, term_factory: Arc<dyn TermFactory>) -> Self {
        self.term_factory = term_factory;
        self
    }

    /// Unicode normalization form for IRI template values (default NFC)
    pub fn normalization_form(mut self, form: NormalizationForm) -> Self {
        self.normalization_form = form;
        self
    }

    /// Upper-case percent-encoding hex digits (default true; false for
    /// backward compatibility with older mappers)
    pub fn iri_upper_case_percent_encoding(mut self, upper_case: bool) -> Self {
        self.iri_upper_case_percent_encoding = upper_case;
        self
    }

    /// Plug in a child-side join store provider
    pub fn child_side_join_store_provider(
        mut self,
        provider: Arc<dyn ChildSideJoinStoreProvider>,
    ) -> Self {
        self.child_side_join_store_provider = provider;
        self
    }

    /// Plug in a parent-side join condition store provider
    pub fn parent_side_join_condition_store_provider(
        mut self,
        provider: Arc<dyn ParentSideJoinConditionStoreProvider>,
    ) -> Self {
        self.parent_side_join_condition_store_provider = provider;
        self
    }

    /// Overall timeout for `map_to_graph` (default 30 s)
    pub fn map_to_graph_timeout(mut self, timeout: Duration) -> Self {
        self.map_to_graph_timeout = timeout;
        self
    }

    /// Promote per-record term generation errors to pipeline failures
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Keep running sibling pipelines after a pipeline fails
    pub fn continue_on_pipeline_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_pipeline_error = continue_on_error;
        self
    }

    /// Capacity of the bounded fan-out and output buffers
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Validate the configuration and compile the mapper
    pub fn build(self) -> EngineResult<RmlMapper> {
        if self.logical_source_resolvers.is_empty() {
            return Err(EngineError::Configuration(
                "no logical source resolvers registered".to_string(),
            ));
        }

        let mappable = filter_mappable(&self.triples_maps);
        if mappable.is_empty() {
            return Err(EngineError::Configuration(
                "no mappable triples maps provided".to_string(),
            ));
        }
        debug!(
            total = self.triples_maps.len(),
            mappable = mappable.len(),
            "building mapper"
        );

        let factory = TermGeneratorFactory::new(GeneratorOptions {
            normalization_form: self.normalization_form,
            iri_upper_case_percent_encoding: self.iri_upper_case_percent_encoding,
            term_factory: self.term_factory,
            functions: Arc::new(self.functions),
        });

        let mapper = RmlMapper {
            triples_maps: mappable,
            factory: Arc::new(factory),
            logical_source_resolvers: self.logical_source_resolvers,
            source_resolver: Arc::new(CompositeResolver::new(self.source_resolvers)),
            child_side_join_store_provider: self.child_side_join_store_provider,
            parent_side_join_condition_store_provider: self
                .parent_side_join_condition_store_provider,
            map_to_graph_timeout: self.map_to_graph_timeout,
            strict: self.strict,
            continue_on_pipeline_error: self.continue_on_pipeline_error,
            channel_capacity: self.channel_capacity,
        };

        // Surface malformed term maps and unbound formulations now rather
        // than on the first run; generator compilations land in the cache.
        mapper.compile_pipelines(None)?;

        Ok(mapper)
    }
}

impl std::fmt::Debug for RmlMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RmlMapper")
            .field("triples_maps", &self.triples_maps)
            .field("strict", &self.strict)
            .field("continue_on_pipeline_error", &self.continue_on_pipeline_error)
            .field("channel_capacity", &self.channel_capacity)
            .field("map_to_graph_timeout", &self.map_to_graph_timeout)
            .finish_non_exhaustive()
    }
}

/// The mapping executor
pub struct RmlMapper {
    triples_maps: Vec<TriplesMap>,
    factory: Arc<TermGeneratorFactory>,
    logical_source_resolvers: HashMap<String, Arc<dyn LogicalSourceResolver>>,
    source_resolver: Arc<CompositeResolver>,
    child_side_join_store_provider: Arc<dyn ChildSideJoinStoreProvider>,
    parent_side_join_condition_store_provider: Arc<dyn ParentSideJoinConditionStoreProvider>,
    map_to_graph_timeout: Duration,
    strict: bool,
    continue_on_pipeline_error: bool,
    channel_capacity: usize,
}

impl RmlMapper {
    /// Start building a mapper
    pub fn builder() -> RmlMapperBuilder {
        RmlMapperBuilder::default()
    }

    /// The mappable TriplesMaps this mapper executes
    pub fn triples_maps(&self) -> &[TriplesMap] {
        &self.triples_maps
    }

    /// Execute all pipelines against the configured source resolvers
    pub fn map(&self) -> ReceiverStream<StatementResult> {
        self.spawn_run(None, None)
    }

    /// Execute a subset of TriplesMaps
    ///
    /// Parents of conditioned RefObjectMaps in the subset are included
    /// automatically.
    pub fn map_filtered(&self, filter: &TriplesMapFilter) -> ReceiverStream<StatementResult> {
        self.spawn_run(None, Some(filter))
    }

    /// Execute with a single unnamed input stream
    pub fn map_input(&self, input: impl Into<Bytes>) -> ReceiverStream<StatementResult> {
        self.spawn_run(Some(NamedInputResolver::from_unnamed(input)), None)
    }

    /// Execute a single unnamed input restricted to a subset of
    /// TriplesMaps
    pub fn map_input_filtered(
        &self,
        input: impl Into<Bytes>,
        filter: &TriplesMapFilter,
    ) -> ReceiverStream<StatementResult> {
        self.spawn_run(Some(NamedInputResolver::from_unnamed(input)), Some(filter))
    }

    /// Execute with named input streams bound by stream name
    pub fn map_named(&self, inputs: HashMap<String, Bytes>) -> ReceiverStream<StatementResult> {
        self.spawn_run(Some(NamedInputResolver::from_named(inputs)), None)
    }

    /// Execute named inputs restricted to a subset of TriplesMaps
    pub fn map_named_filtered(
        &self,
        inputs: HashMap<String, Bytes>,
        filter: &TriplesMapFilter,
    ) -> ReceiverStream<StatementResult> {
        self.spawn_run(Some(NamedInputResolver::from_named(inputs)), Some(filter))
    }

    /// Evaluate the generators against one caller-provided record
    ///
    /// No decoder runs; conditioned RefObjectMaps are skipped (there is no
    /// parent pipeline to join against), unconditioned ones evaluate as
    /// self-joins.
    pub async fn map_item(&self, record: Record) -> EngineResult<Vec<Statement>> {
        self.map_item_filtered(record, None).await
    }

    /// Single-record evaluation restricted to a subset of TriplesMaps
    pub async fn map_item_filtered(
        &self,
        record: Record,
        filter: Option<&TriplesMapFilter>,
    ) -> EngineResult<Vec<Statement>> {
        let groups = self.compile_mappers(filter, false)?;
        let ctx = RecordContext::new(record, 0);
        let mut statements = Vec::new();
        for (_, mappers) in groups {
            for mapper in mappers {
                statements.extend(mapper.map_record(&ctx).await?);
            }
        }
        Ok(statements)
    }

    /// Collect the statement stream into a graph, bounded by the
    /// configured timeout
    pub async fn map_to_graph(&self) -> EngineResult<Graph> {
        self.collect(self.map()).await
    }

    /// Collect a single-unnamed-input run into a graph
    pub async fn map_input_to_graph(&self, input: impl Into<Bytes>) -> EngineResult<Graph> {
        self.collect(self.map_input(input)).await
    }

    /// Collect a named-inputs run into a graph
    pub async fn map_named_to_graph(
        &self,
        inputs: HashMap<String, Bytes>,
    ) -> EngineResult<Graph> {
        self.collect(self.map_named(inputs)).await
    }

    async fn collect(&self, stream: ReceiverStream<StatementResult>) -> EngineResult<Graph> {
        let timeout = self.map_to_graph_timeout;
        let continue_on_error = self.continue_on_pipeline_error;
        let collected = tokio::time::timeout(timeout, async move {
            let mut stream = stream;
            let mut graph = Graph::new();
            while let Some(item) = stream.next().await {
                match item {
                    Ok(statement) => graph.add(statement),
                    Err(e) if continue_on_error => {
                        warn!(error = %e, "pipeline failed; continuing with siblings");
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(graph)
        })
        .await;

        match collected {
            Ok(result) => result,
            Err(_) => Err(EngineError::MappingTimeout(timeout)),
        }
    }

    fn spawn_run(
        &self,
        inputs: Option<NamedInputResolver>,
        filter: Option<&TriplesMapFilter>,
    ) -> ReceiverStream<StatementResult> {
        let (tx, rx) = mpsc::channel(self.channel_capacity);

        match self.compile_pipelines(filter) {
            Err(e) => {
                // Capacity is at least one; the error always fits.
                let _ = tx.try_send(Err(e));
            }
            Ok(pipelines) => {
                let resolver = self.source_resolver.clone();
                let continue_on_error = self.continue_on_pipeline_error;
                tokio::spawn(async move {
                    let mut bound = Vec::with_capacity(pipelines.len());
                    for pipeline in pipelines {
                        let source = pipeline.logical_source().source.clone();
                        let resolved = match &inputs {
                            Some(named) => match named.resolve(&source).await {
                                Ok(Some(stream)) => Ok(Some(stream)),
                                Ok(None) => resolver.resolve(&source).await,
                                Err(e) => Err(e),
                            },
                            None => resolver.resolve(&source).await,
                        };
                        match resolved {
                            Ok(Some(stream)) => bound.push((pipeline, stream)),
                            Ok(None) => {
                                let e = EngineError::SourceResolution(source.describe());
                                if tx.send(Err(e)).await.is_err() || !continue_on_error {
                                    return;
                                }
                            }
                            Err(e) => {
                                if tx.send(Err(e)).await.is_err() || !continue_on_error {
                                    return;
                                }
                            }
                        }
                    }

                    let mut tasks = Vec::with_capacity(bound.len());
                    for (pipeline, stream) in bound {
                        tasks.push(tokio::spawn(pipeline.run(stream, tx.clone())));
                    }
                    for task in tasks {
                        let _ = task.await;
                    }
                });
            }
        }

        ReceiverStream::new(rx)
    }

    /// Compile pipelines for a run: one per distinct logical source
    fn compile_pipelines(
        &self,
        filter: Option<&TriplesMapFilter>,
    ) -> EngineResult<Vec<Arc<LogicalSourcePipeline>>> {
        let groups = self.compile_mappers(filter, true)?;
        groups
            .into_iter()
            .map(|(logical_source, mappers)| {
                let decoder = self
                    .logical_source_resolvers
                    .get(&logical_source.reference_formulation)
                    .cloned()
                    .ok_or_else(|| {
                        EngineError::Configuration(format!(
                            "no logical source resolver bound for reference formulation {}",
                            logical_source.reference_formulation
                        ))
                    })?;
                Ok(Arc::new(LogicalSourcePipeline::new(
                    logical_source,
                    decoder,
                    mappers,
                    self.channel_capacity,
                )))
            })
            .collect()
    }

    /// Compile triples mappers grouped by logical source
    ///
    /// With `include_joins`, conditioned RefObjectMaps get a fresh join
    /// mapper pair per run; without, they are skipped entirely
    /// (`map_item`).
    fn compile_mappers(
        &self,
        filter: Option<&TriplesMapFilter>,
        include_joins: bool,
    ) -> EngineResult<Vec<(LogicalSource, Vec<Arc<TriplesMapper>>)>> {
        let selected_ids = self.selected_ids(filter);
        let selected: Vec<&TriplesMap> = self
            .triples_maps
            .iter()
            .filter(|tm| selected_ids.contains(tm.id.as_str()))
            .collect();
        if selected.is_empty() {
            return Err(EngineError::Configuration(
                "triples map filter selects nothing".to_string(),
            ));
        }

        // Fresh join mappers per run: completion state and stores must not
        // leak between runs.
        let mut child_mappers: HashMap<&str, Vec<(usize, Arc<RefObjectMapper>)>> = HashMap::new();
        let mut parent_mappers: HashMap<&str, Vec<Arc<RefObjectMapper>>> = HashMap::new();
        if include_joins {
            for tm in &selected {
                for (pom_index, pom) in tm.predicate_object_maps.iter().enumerate() {
                    for rom in pom.ref_object_maps().filter(|rom| rom.has_conditions()) {
                        if !self
                            .triples_maps
                            .iter()
                            .any(|candidate| candidate.id == rom.parent_triples_map)
                        {
                            return Err(EngineError::Configuration(format!(
                                "parent triples map {} of {} is not mappable",
                                rom.parent_triples_map, tm.id
                            )));
                        }
                        let ref_mapper = Arc::new(RefObjectMapper::new(
                            rom.clone(),
                            tm.id.clone(),
                            self.child_side_join_store_provider.as_ref(),
                            self.parent_side_join_condition_store_provider.as_ref(),
                        ));
                        child_mappers
                            .entry(tm.id.as_str())
                            .or_default()
                            .push((pom_index, ref_mapper.clone()));
                        parent_mappers
                            .entry(rom.parent_triples_map.as_str())
                            .or_default()
                            .push(ref_mapper);
                    }
                }
            }
        }

        let mut groups: Vec<(LogicalSource, Vec<Arc<TriplesMapper>>)> = Vec::new();
        for tm in &selected {
            let mapper = Arc::new(self.compile_triples_mapper(
                tm,
                child_mappers.remove(tm.id.as_str()).unwrap_or_default(),
                parent_mappers.remove(tm.id.as_str()).unwrap_or_default(),
            )?);

            match groups
                .iter_mut()
                .find(|(ls, _)| *ls == tm.logical_source)
            {
                Some((_, mappers)) => mappers.push(mapper),
                None => groups.push((tm.logical_source.clone(), vec![mapper])),
            }
        }

        Ok(groups)
    }

    fn compile_triples_mapper(
        &self,
        tm: &TriplesMap,
        child_mappers: Vec<(usize, Arc<RefObjectMapper>)>,
        incoming: Vec<Arc<RefObjectMapper>>,
    ) -> EngineResult<TriplesMapper> {
        let subject_gen = self.factory.subject_generator(&tm.subject_map)?;

        for class in &tm.subject_map.classes {
            if !class.is_iri() {
                return Err(EngineError::Configuration(format!(
                    "rr:class value {class} of {} is not an IRI",
                    tm.id
                )));
            }
        }

        let subject_graph_gens = tm
            .subject_map
            .graph_maps
            .iter()
            .map(|gm| self.factory.graph_generator(gm))
            .collect::<EngineResult<Vec<_>>>()?;

        let mut poms = Vec::with_capacity(tm.predicate_object_maps.len());
        for (pom_index, pom) in tm.predicate_object_maps.iter().enumerate() {
            let predicate_gens = pom
                .predicate_maps
                .iter()
                .map(|pm| self.factory.predicate_generator(pm))
                .collect::<EngineResult<Vec<_>>>()?;

            let object_gens = pom
                .object_maps
                .iter()
                .filter_map(|om| om.as_value())
                .map(|om| self.factory.object_generator(om))
                .collect::<EngineResult<Vec<_>>>()?;

            let graph_gens = pom
                .graph_maps
                .iter()
                .map(|gm| self.factory.graph_generator(gm))
                .collect::<EngineResult<Vec<_>>>()?;

            // Unconditioned RefObjectMaps are self-joins over the shared
            // logical source: the parent's subject map evaluates against
            // the same record.
            let mut self_join_gens = Vec::new();
            for rom in pom.ref_object_maps().filter(|rom| !rom.has_conditions()) {
                let parent = self
                    .triples_maps
                    .iter()
                    .find(|candidate| candidate.id == rom.parent_triples_map)
                    .ok_or_else(|| {
                        EngineError::Configuration(format!(
                            "parent triples map {} of {} is not mappable",
                            rom.parent_triples_map, tm.id
                        ))
                    })?;
                if parent.logical_source != tm.logical_source {
                    return Err(EngineError::Configuration(format!(
                        "RefObjectMap of {} has no join conditions but parent {} \
                         reads a different logical source",
                        tm.id, parent.id
                    )));
                }
                self_join_gens.push(self.factory.subject_generator(&parent.subject_map)?);
            }

            let ref_mappers = child_mappers
                .iter()
                .filter(|(index, _)| *index == pom_index)
                .map(|(_, ref_mapper)| ref_mapper.clone())
                .collect();

            poms.push(CompiledPom {
                predicate_gens,
                object_gens,
                graph_gens,
                ref_mappers,
                self_join_gens,
            });
        }

        Ok(TriplesMapper::new(
            tm.id.clone(),
            subject_gen,
            tm.subject_map.classes.clone(),
            subject_graph_gens,
            poms,
            incoming,
            self.strict,
        ))
    }

    /// Selected TriplesMap ids under a filter, closed over conditioned
    /// join parents
    fn selected_ids(&self, filter: Option<&TriplesMapFilter>) -> HashSet<String> {
        let mut selected: HashSet<String> = match filter {
            Some(filter) => self
                .triples_maps
                .iter()
                .filter(|tm| filter.contains(&tm.id))
                .map(|tm| tm.id.clone())
                .collect(),
            None => self.triples_maps.iter().map(|tm| tm.id.clone()).collect(),
        };

        loop {
            let mut added = Vec::new();
            for tm in &self.triples_maps {
                if !selected.contains(&tm.id) {
                    continue;
                }
                for pom in &tm.predicate_object_maps {
                    for rom in pom.ref_object_maps().filter(|rom| rom.has_conditions()) {
                        if !selected.contains(&rom.parent_triples_map) {
                            added.push(rom.parent_triples_map.clone());
                        }
                    }
                }
            }
            if added.is_empty() {
                break;
            }
            selected.extend(added);
        }

        selected
    }
}
