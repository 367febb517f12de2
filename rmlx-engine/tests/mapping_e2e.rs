//! End-to-end mapping execution tests
//!
//! Each test builds a mapping model, binds in-memory sources, and checks
//! the emitted statements.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio_stream::StreamExt;

use rmlx_engine::{
    EngineError, EngineResult, ItemRecord, NormalizationForm, RmlMapper, SourceResolver,
};
use rmlx_graph::{Statement, Term};
use rmlx_model::{
    load_mapping, JoinCondition, LogicalSource, ObjectMap, ObjectMapKind, PredicateMap,
    PredicateObjectMap, RefObjectMap, SourceSpec, SubjectMap, TermMap, TriplesMap,
};
use rmlx_vocab::{ql, rdf};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn csv_source(name: &str) -> LogicalSource {
    LogicalSource::new(SourceSpec::stream(name), ql::CSV)
}

fn people_triples_map() -> TriplesMap {
    TriplesMap::new(
        "http://ex/map/Person",
        csv_source("people"),
        SubjectMap::template("http://ex/{a}"),
    )
    .with_pom(PredicateObjectMap::new(
        PredicateMap::constant_iri("http://ex/p"),
        ObjectMapKind::Value(ObjectMap::reference("b")),
    ))
}

fn mapper_for(triples_maps: Vec<TriplesMap>) -> RmlMapper {
    init_tracing();
    RmlMapper::builder()
        .triples_maps(triples_maps)
        .default_logical_source_resolvers()
        .build()
        .expect("valid mapper")
}

fn inputs(pairs: &[(&str, &'static [u8])]) -> HashMap<String, Bytes> {
    pairs
        .iter()
        .map(|(name, data)| (name.to_string(), Bytes::from_static(data)))
        .collect()
}

fn sorted(mut statements: Vec<Statement>) -> Vec<Statement> {
    statements.sort();
    statements
}

#[tokio::test]
async fn maps_csv_rows_to_triples() {
    let mapper = mapper_for(vec![people_triples_map()]);
    let graph = mapper
        .map_named_to_graph(inputs(&[("people", b"a,b\n1,2\n3,4\n")]))
        .await
        .unwrap();

    let expected = sorted(vec![
        Statement::new(
            Term::iri("http://ex/1"),
            Term::iri("http://ex/p"),
            Term::string("2"),
        ),
        Statement::new(
            Term::iri("http://ex/3"),
            Term::iri("http://ex/p"),
            Term::string("4"),
        ),
    ]);
    assert_eq!(sorted(graph.into_statements()), expected);
}

#[tokio::test]
async fn subject_classes_emit_rdf_type() {
    let tm = TriplesMap::new(
        "http://ex/map/Person",
        csv_source("people"),
        SubjectMap::template("http://ex/{a}").with_class(Term::iri("http://ex/T")),
    )
    .with_pom(PredicateObjectMap::new(
        PredicateMap::constant_iri("http://ex/p"),
        ObjectMapKind::Value(ObjectMap::reference("b")),
    ));

    let mapper = mapper_for(vec![tm]);
    let graph = mapper
        .map_named_to_graph(inputs(&[("people", b"a,b\n1,2\n3,4\n")]))
        .await
        .unwrap();

    let type_statements: Vec<&Statement> = graph
        .iter()
        .filter(|st| st.predicate.as_iri() == Some(rdf::TYPE))
        .collect();
    assert_eq!(type_statements.len(), 2);
    assert!(type_statements
        .iter()
        .all(|st| st.object == Term::iri("http://ex/T")));
    assert_eq!(graph.len(), 4);
}

#[tokio::test]
async fn rdf_type_precedes_pom_statements_per_record() {
    let tm = TriplesMap::new(
        "http://ex/map/Person",
        csv_source("people"),
        SubjectMap::template("http://ex/{a}").with_class(Term::iri("http://ex/T")),
    )
    .with_pom(PredicateObjectMap::new(
        PredicateMap::constant_iri("http://ex/p"),
        ObjectMapKind::Value(ObjectMap::reference("b")),
    ));

    let mapper = mapper_for(vec![tm]);
    let statements: Vec<Statement> = mapper
        .map_named(inputs(&[("people", b"a,b\n1,2\n")]))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<EngineResult<_>>()
        .unwrap();

    assert_eq!(statements.len(), 2);
    assert_eq!(statements[0].predicate, Term::iri(rdf::TYPE));
    assert_eq!(statements[1].predicate, Term::iri("http://ex/p"));
}

#[tokio::test]
async fn unicode_normalization_and_percent_encoding() {
    let mapper = mapper_for(vec![people_triples_map()]);
    let graph = mapper
        .map_named_to_graph(inputs(&[("people", "a,b\nh\u{0065}\u{0301}llo,x\n".as_bytes())]))
        .await
        .unwrap();

    let subjects: Vec<&str> = graph
        .iter()
        .filter_map(|st| st.subject.as_iri())
        .collect();
    assert_eq!(subjects, vec!["http://ex/h%C3%A9llo"]);
}

#[tokio::test]
async fn lower_case_percent_encoding_flag() {
    let mapper = RmlMapper::builder()
        .triples_maps(vec![people_triples_map()])
        .default_logical_source_resolvers()
        .normalization_form(NormalizationForm::Nfc)
        .iri_upper_case_percent_encoding(false)
        .build()
        .unwrap();

    let graph = mapper
        .map_named_to_graph(inputs(&[("people", "a,b\nh\u{e9}llo,x\n".as_bytes())]))
        .await
        .unwrap();

    let subjects: Vec<&str> = graph
        .iter()
        .filter_map(|st| st.subject.as_iri())
        .collect();
    assert_eq!(subjects, vec!["http://ex/h%c3%a9llo"]);
}

#[tokio::test]
async fn join_matches_child_and_parent_rows() {
    let child = TriplesMap::new(
        "http://ex/map/Child",
        csv_source("child"),
        SubjectMap::template("http://ex/child/{id}"),
    )
    .with_pom(PredicateObjectMap::new(
        PredicateMap::constant_iri("http://ex/parent"),
        ObjectMapKind::Ref(RefObjectMap {
            id: None,
            parent_triples_map: "http://ex/map/Parent".to_string(),
            join_conditions: vec![JoinCondition::new("pid", "pid")],
        }),
    ));
    let parent = TriplesMap::new(
        "http://ex/map/Parent",
        csv_source("parent"),
        SubjectMap::template("http://ex/parent/{pid}"),
    );

    let mapper = mapper_for(vec![child, parent]);
    let graph = mapper
        .map_named_to_graph(inputs(&[
            ("child", b"id,pid\n1,7\n2,8\n3,9\n"),
            ("parent", b"pid\n7\n8\n"),
        ]))
        .await
        .unwrap();

    let joined = sorted(
        graph
            .iter()
            .filter(|st| st.predicate.as_iri() == Some("http://ex/parent"))
            .cloned()
            .collect(),
    );
    let expected = sorted(vec![
        Statement::new(
            Term::iri("http://ex/child/1"),
            Term::iri("http://ex/parent"),
            Term::iri("http://ex/parent/7"),
        ),
        Statement::new(
            Term::iri("http://ex/child/2"),
            Term::iri("http://ex/parent"),
            Term::iri("http://ex/parent/8"),
        ),
    ]);
    assert_eq!(joined, expected);
}

#[tokio::test]
async fn self_join_without_conditions_uses_same_record() {
    let parent = TriplesMap::new(
        "http://ex/map/ByName",
        csv_source("people"),
        SubjectMap::template("http://ex/name/{name}"),
    );
    let child = TriplesMap::new(
        "http://ex/map/ById",
        csv_source("people"),
        SubjectMap::template("http://ex/id/{id}"),
    )
    .with_pom(PredicateObjectMap::new(
        PredicateMap::constant_iri("http://ex/sameAs"),
        ObjectMapKind::Ref(RefObjectMap::new("http://ex/map/ByName")),
    ));

    let mapper = mapper_for(vec![child, parent]);
    let graph = mapper
        .map_named_to_graph(inputs(&[("people", b"id,name\n1,ann\n2,bo\n")]))
        .await
        .unwrap();

    let same_as = sorted(
        graph
            .iter()
            .filter(|st| st.predicate.as_iri() == Some("http://ex/sameAs"))
            .cloned()
            .collect(),
    );
    let expected = sorted(vec![
        Statement::new(
            Term::iri("http://ex/id/1"),
            Term::iri("http://ex/sameAs"),
            Term::iri("http://ex/name/ann"),
        ),
        Statement::new(
            Term::iri("http://ex/id/2"),
            Term::iri("http://ex/sameAs"),
            Term::iri("http://ex/name/bo"),
        ),
    ]);
    assert_eq!(same_as, expected);
}

#[tokio::test]
async fn absent_hole_suppresses_object_only() {
    let tm = TriplesMap::new(
        "http://ex/map/Person",
        LogicalSource::new(SourceSpec::stream("people"), ql::JSON_PATH)
            .with_iterator("$.rows[*]"),
        SubjectMap::template("http://ex/{a}"),
    )
    .with_pom(PredicateObjectMap::new(
        PredicateMap::constant_iri("http://ex/p"),
        ObjectMapKind::Value(
            ObjectMap::template("http://ex/{b}").with_term_type(rmlx_model::TermType::Iri),
        ),
    ));

    let mapper = mapper_for(vec![tm]);
    let doc = br#"{"rows": [{"a": "1", "b": null}, {"a": "2", "b": "x"}]}"#;
    let graph = mapper
        .map_named_to_graph(inputs(&[("people", doc)]))
        .await
        .unwrap();

    // Row 1 has a null hole: no object statement. Row 2 is unaffected.
    let expected = vec![Statement::new(
        Term::iri("http://ex/2"),
        Term::iri("http://ex/p"),
        Term::iri("http://ex/x"),
    )];
    assert_eq!(sorted(graph.into_statements()), expected);
}

#[tokio::test]
async fn empty_source_yields_empty_output() {
    let mapper = mapper_for(vec![people_triples_map()]);
    let graph = mapper
        .map_named_to_graph(inputs(&[("people", b"a,b\n")]))
        .await
        .unwrap();
    assert!(graph.is_empty());
}

#[tokio::test]
async fn triples_map_without_poms_yields_only_types() {
    let tm = TriplesMap::new(
        "http://ex/map/Person",
        csv_source("people"),
        SubjectMap::template("http://ex/{a}").with_class(Term::iri("http://ex/T")),
    );

    let mapper = mapper_for(vec![tm]);
    let graph = mapper
        .map_named_to_graph(inputs(&[("people", b"a\n1\n")]))
        .await
        .unwrap();

    let expected = vec![Statement::new(
        Term::iri("http://ex/1"),
        Term::iri(rdf::TYPE),
        Term::iri("http://ex/T"),
    )];
    assert_eq!(graph.into_statements(), expected);
}

#[tokio::test]
async fn no_mappable_triples_maps_fails_build() {
    let bare = TriplesMap::new(
        "http://ex/map/Empty",
        csv_source("people"),
        SubjectMap {
            id: None,
            term_map: TermMap::default(),
            classes: Vec::new(),
            graph_maps: Vec::new(),
        },
    );

    let err = RmlMapper::builder()
        .triples_maps(vec![bare])
        .default_logical_source_resolvers()
        .build()
        .unwrap_err();
    assert!(matches!(err, EngineError::Configuration(_)));
}

#[tokio::test]
async fn missing_logical_source_resolver_fails_build() {
    let err = RmlMapper::builder()
        .triples_maps(vec![people_triples_map()])
        .build()
        .unwrap_err();
    assert!(matches!(err, EngineError::Configuration(_)));
}

#[tokio::test]
async fn unbound_reference_formulation_fails_build() {
    let tm = TriplesMap::new(
        "http://ex/map/Xml",
        LogicalSource::new(SourceSpec::stream("doc"), ql::XPATH),
        SubjectMap::template("http://ex/{id}"),
    );

    let err = RmlMapper::builder()
        .triples_maps(vec![tm])
        .default_logical_source_resolvers()
        .build()
        .unwrap_err();
    assert!(matches!(err, EngineError::Configuration(_)));
}

#[tokio::test]
async fn unresolvable_source_is_an_error() {
    let tm = TriplesMap::new(
        "http://ex/map/Person",
        LogicalSource::new(SourceSpec::reference("nowhere.csv"), ql::CSV),
        SubjectMap::template("http://ex/{a}"),
    );

    let mapper = mapper_for(vec![tm]);
    let err = mapper.map_to_graph().await.unwrap_err();
    assert!(matches!(err, EngineError::SourceResolution(_)));
}

#[tokio::test]
async fn decoder_error_names_pipeline_and_spares_siblings() {
    let good = people_triples_map();
    let bad = TriplesMap::new(
        "http://ex/map/Json",
        LogicalSource::new(SourceSpec::stream("broken"), ql::JSON_PATH),
        SubjectMap::template("http://ex/j/{id}"),
    );

    let mapper = RmlMapper::builder()
        .triples_maps(vec![good, bad])
        .default_logical_source_resolvers()
        .continue_on_pipeline_error(true)
        .build()
        .unwrap();

    let results: Vec<_> = mapper
        .map_named(inputs(&[
            ("people", b"a,b\n1,2\n"),
            ("broken", b"{not json"),
        ]))
        .collect()
        .await;

    let statements: Vec<&Statement> =
        results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let errors: Vec<&EngineError> = results.iter().filter_map(|r| r.as_ref().err()).collect();

    // The healthy pipeline still produced its statement.
    assert_eq!(statements.len(), 1);
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        EngineError::Decoder { pipeline, .. } if pipeline == "stream:broken"
    ));
}

#[tokio::test]
async fn ordering_preserved_within_pipeline() {
    let mapper = mapper_for(vec![people_triples_map()]);

    let results: Vec<Statement> = mapper
        .map_named(inputs(&[("people", b"a,b\n1,x\n2,x\n3,x\n4,x\n")]))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<EngineResult<_>>()
        .unwrap();

    let subjects: Vec<&str> = results
        .iter()
        .filter_map(|st| st.subject.as_iri())
        .collect();
    assert_eq!(
        subjects,
        vec!["http://ex/1", "http://ex/2", "http://ex/3", "http://ex/4"]
    );
}

#[tokio::test]
async fn deterministic_over_repeated_runs() {
    let mapper = mapper_for(vec![people_triples_map()]);
    let data = inputs(&[("people", b"a,b\n1,2\n3,4\n5,6\n")]);

    let mut first = mapper.map_named_to_graph(data.clone()).await.unwrap();
    let mut second = mapper.map_named_to_graph(data).await.unwrap();
    first.sort();
    second.sort();
    assert_eq!(first.statements(), second.statements());
}

#[tokio::test]
async fn graph_maps_scope_statements() {
    let mut subject_map = SubjectMap::template("http://ex/{a}");
    subject_map
        .graph_maps
        .push(rmlx_model::GraphMap::constant_iri("http://ex/g"));
    let tm = TriplesMap::new("http://ex/map/Person", csv_source("people"), subject_map)
        .with_pom(PredicateObjectMap::new(
            PredicateMap::constant_iri("http://ex/p"),
            ObjectMapKind::Value(ObjectMap::reference("b")),
        ));

    let mapper = mapper_for(vec![tm]);
    let graph = mapper
        .map_named_to_graph(inputs(&[("people", b"a,b\n1,2\n")]))
        .await
        .unwrap();

    assert_eq!(graph.len(), 1);
    let statement = graph.iter().next().unwrap();
    assert_eq!(
        statement.graph.as_ref().and_then(|g| g.as_iri()),
        Some("http://ex/g")
    );
}

#[tokio::test]
async fn map_item_evaluates_single_record() {
    let mapper = mapper_for(vec![people_triples_map()]);
    let record = Arc::new(ItemRecord::new().with("a", "9").with("b", "ok"));

    let statements = mapper.map_item(record).await.unwrap();
    assert_eq!(
        statements,
        vec![Statement::new(
            Term::iri("http://ex/9"),
            Term::iri("http://ex/p"),
            Term::string("ok"),
        )]
    );
}

#[tokio::test]
async fn filter_restricts_triples_maps() {
    let other = TriplesMap::new(
        "http://ex/map/Other",
        csv_source("people"),
        SubjectMap::template("http://ex/other/{a}"),
    )
    .with_pom(PredicateObjectMap::new(
        PredicateMap::constant_iri("http://ex/q"),
        ObjectMapKind::Value(ObjectMap::reference("b")),
    ));

    let mapper = mapper_for(vec![people_triples_map(), other]);
    let filter: rmlx_engine::TriplesMapFilter =
        ["http://ex/map/Person".to_string()].into_iter().collect();

    let results: Vec<Statement> = mapper
        .map_named_filtered(inputs(&[("people", b"a,b\n1,2\n")]), &filter)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<EngineResult<_>>()
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].predicate, Term::iri("http://ex/p"));
}

#[tokio::test]
async fn map_to_graph_times_out() {
    struct HangingResolver;

    #[async_trait::async_trait]
    impl SourceResolver for HangingResolver {
        async fn resolve(
            &self,
            _source: &SourceSpec,
        ) -> EngineResult<Option<rmlx_engine::ByteStream>> {
            tokio::time::sleep(std::time::Duration::from_secs(600)).await;
            Ok(None)
        }
    }

    let tm = TriplesMap::new(
        "http://ex/map/Person",
        LogicalSource::new(SourceSpec::reference("slow.csv"), ql::CSV),
        SubjectMap::template("http://ex/{a}"),
    );

    let mapper = RmlMapper::builder()
        .triples_maps(vec![tm])
        .default_logical_source_resolvers()
        .source_resolver(Arc::new(HangingResolver))
        .map_to_graph_timeout(std::time::Duration::from_millis(50))
        .build()
        .unwrap();

    let err = mapper.map_to_graph().await.unwrap_err();
    assert!(matches!(err, EngineError::MappingTimeout(_)));
}

#[tokio::test]
async fn loaded_mapping_executes_end_to_end() {
    // Build the mapping document as a graph, load it, and run it: the
    // full load -> compile -> execute path.
    use rmlx_vocab::{rml, rr};

    let mut g = rmlx_graph::Graph::new();
    let tm = Term::iri("http://ex/map/Person");
    let ls = Term::blank("ls");
    let stream = Term::blank("stream");
    let sm = Term::blank("sm");
    let pom = Term::blank("pom");
    let om = Term::blank("om");

    g.add_triple(tm.clone(), Term::iri(rdf::TYPE), Term::iri(rr::TRIPLES_MAP));
    g.add_triple(tm.clone(), Term::iri(rml::LOGICAL_SOURCE), ls.clone());
    g.add_triple(ls.clone(), Term::iri(rml::SOURCE), stream.clone());
    g.add_triple(
        stream.clone(),
        Term::iri(rmlx_vocab::carml::STREAM_NAME),
        Term::string("people"),
    );
    g.add_triple(
        ls.clone(),
        Term::iri(rml::REFERENCE_FORMULATION),
        Term::iri(ql::CSV),
    );
    g.add_triple(tm.clone(), Term::iri(rr::SUBJECT_MAP), sm.clone());
    g.add_triple(
        sm.clone(),
        Term::iri(rr::TEMPLATE),
        Term::string("http://ex/{a}"),
    );
    g.add_triple(tm.clone(), Term::iri(rr::PREDICATE_OBJECT_MAP), pom.clone());
    g.add_triple(
        pom.clone(),
        Term::iri(rr::PREDICATE),
        Term::iri("http://ex/p"),
    );
    g.add_triple(pom.clone(), Term::iri(rr::OBJECT_MAP), om.clone());
    g.add_triple(om.clone(), Term::iri(rml::REFERENCE), Term::string("b"));

    let triples_maps = load_mapping(&g).unwrap();
    let mapper = mapper_for(triples_maps);
    let graph = mapper
        .map_named_to_graph(inputs(&[("people", b"a,b\n1,2\n")]))
        .await
        .unwrap();

    assert_eq!(
        graph.into_statements(),
        vec![Statement::new(
            Term::iri("http://ex/1"),
            Term::iri("http://ex/p"),
            Term::string("2"),
        )]
    );
}
