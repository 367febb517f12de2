//! Term generators
//!
//! A term generator is a compiled function from a record to zero or more
//! RDF terms. The [`TermGeneratorFactory`] compiles term maps into
//! generators once per mapper; compilation results are cached keyed by the
//! term map's value identity, so triples maps sharing identical term maps
//! share one generator.
//!
//! Generation rules:
//!
//! - A reference or template hole that evaluates to no value produces no
//!   term (never an empty string).
//! - Multi-valued references expand as a Cartesian product over template
//!   holes.
//! - Template values destined for IRIs are Unicode-normalized and
//!   percent-encoded per hole value before substitution.
//! - Blank node identifiers are scoped to the enclosing record: equal
//!   labels within one record denote one node, across records they differ.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use regex::Regex;

use rmlx_graph::{Term, TermFactory};
use rmlx_model::{FunctionMap, GraphMap, ObjectMap, PredicateMap, SubjectMap, TermMap, TermType};
use rmlx_vocab::fno;

use crate::encode::{iri_safe, NormalizationForm};
use crate::error::{EngineError, EngineResult};
use crate::functions::{FunctionArgs, Functions};
use crate::records::Record;
use crate::template::{Segment, Template};

static LANGUAGE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$").expect("valid regex"));

/// One record passing through the engine, with its blank node scope
pub struct RecordContext {
    record: Record,
    ordinal: u64,
}

impl RecordContext {
    /// Wrap a record with its position in the source
    pub fn new(record: Record, ordinal: u64) -> Self {
        Self { record, ordinal }
    }

    /// Evaluate a reference expression against the record
    pub fn eval(&self, expression: &str) -> Vec<String> {
        self.record.eval(expression)
    }

    /// Scope a blank node label to this record
    ///
    /// Equal labels within one record map to equal scoped labels; records
    /// at different ordinals never collide.
    pub fn blank_label(&self, label: &str) -> String {
        format!("r{}-{}", self.ordinal, label)
    }

    /// The underlying record
    pub fn record(&self) -> &Record {
        &self.record
    }
}

/// A compiled term generator
pub type TermGenerator = Arc<dyn Fn(&RecordContext) -> EngineResult<Vec<Term>> + Send + Sync>;

/// Options shared by all generators of one mapper
#[derive(Clone)]
pub struct GeneratorOptions {
    /// Unicode normalization applied to IRI template values
    pub normalization_form: NormalizationForm,
    /// Upper-case percent-encoding hex digits (legacy mappers use lower)
    pub iri_upper_case_percent_encoding: bool,
    /// The term constructor plug-point
    pub term_factory: Arc<dyn TermFactory>,
    /// User-defined function registry
    pub functions: Arc<Functions>,
}

/// Compiles term maps into generators, with per-mapper memoization
pub struct TermGeneratorFactory {
    options: GeneratorOptions,
    cache: Mutex<HashMap<String, TermGenerator>>,
}

impl TermGeneratorFactory {
    /// Create a factory
    pub fn new(options: GeneratorOptions) -> Self {
        Self {
            options,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Generator for a subject map: IRIs or blank nodes
    pub fn subject_generator(&self, subject_map: &SubjectMap) -> EngineResult<TermGenerator> {
        self.generator(
            "subject",
            &subject_map.term_map,
            None,
            None,
            TermType::Iri,
            &[TermType::Iri, TermType::BlankNode],
        )
    }

    /// Generator for a predicate map: IRIs only
    pub fn predicate_generator(&self, predicate_map: &PredicateMap) -> EngineResult<TermGenerator> {
        self.generator(
            "predicate",
            &predicate_map.term_map,
            None,
            None,
            TermType::Iri,
            &[TermType::Iri],
        )
    }

    /// Generator for an object map: any term kind
    ///
    /// The default term type is `Literal` when the map is reference- or
    /// function-valued or declares a datatype or language, `IRI` otherwise.
    pub fn object_generator(&self, object_map: &ObjectMap) -> EngineResult<TermGenerator> {
        let default = if object_map.term_map.reference.is_some()
            || object_map.term_map.function_map.is_some()
            || object_map.datatype.is_some()
            || object_map.language.is_some()
        {
            TermType::Literal
        } else {
            TermType::Iri
        };
        self.generator(
            "object",
            &object_map.term_map,
            object_map.datatype.clone(),
            object_map.language.clone(),
            default,
            &[TermType::Iri, TermType::BlankNode, TermType::Literal],
        )
    }

    /// Generator for a graph map: IRIs only
    pub fn graph_generator(&self, graph_map: &GraphMap) -> EngineResult<TermGenerator> {
        self.generator(
            "graph",
            &graph_map.term_map,
            None,
            None,
            TermType::Iri,
            &[TermType::Iri],
        )
    }

    fn generator(
        &self,
        position: &str,
        term_map: &TermMap,
        datatype: Option<String>,
        language: Option<String>,
        default_type: TermType,
        allowed: &[TermType],
    ) -> EngineResult<TermGenerator> {
        let cache_key = serde_json::to_string(&(position, term_map, &datatype, &language))
            .unwrap_or_default();
        if !cache_key.is_empty() {
            if let Some(generator) = self
                .cache
                .lock()
                .ok()
                .and_then(|cache| cache.get(&cache_key).cloned())
            {
                return Ok(generator);
            }
        }

        let generator =
            self.build_generator(position, term_map, datatype, language, default_type, allowed)?;

        if !cache_key.is_empty() {
            if let Ok(mut cache) = self.cache.lock() {
                cache.insert(cache_key, generator.clone());
            }
        }
        Ok(generator)
    }

    fn build_generator(
        &self,
        position: &str,
        term_map: &TermMap,
        datatype: Option<String>,
        language: Option<String>,
        default_type: TermType,
        allowed: &[TermType],
    ) -> EngineResult<TermGenerator> {
        term_map.validate(position)?;

        let term_type = term_map.effective_term_type(default_type);
        if !allowed.contains(&term_type) {
            return Err(EngineError::Configuration(format!(
                "{position} map cannot generate {term_type:?} terms"
            )));
        }
        if let Some(language) = &language {
            if !LANGUAGE_TAG.is_match(language) {
                return Err(EngineError::Configuration(format!(
                    "invalid language tag {language:?}"
                )));
            }
        }

        if let Some(constant) = &term_map.constant {
            return self.constant_generator(position, constant, allowed);
        }
        if let Some(reference) = &term_map.reference {
            return Ok(self.reference_generator(reference, term_type, datatype, language));
        }
        if let Some(template) = &term_map.template {
            return self.template_generator(template, term_type, datatype, language);
        }
        if let Some(function_map) = &term_map.function_map {
            return self.function_generator(function_map, term_type, datatype, language);
        }

        // No term specification: generates nothing.
        Ok(Arc::new(|_| Ok(Vec::new())))
    }

    fn constant_generator(
        &self,
        position: &str,
        constant: &Term,
        allowed: &[TermType],
    ) -> EngineResult<TermGenerator> {
        let kind = if constant.is_iri() {
            TermType::Iri
        } else if constant.is_blank() {
            TermType::BlankNode
        } else {
            TermType::Literal
        };
        if !allowed.contains(&kind) {
            return Err(EngineError::Configuration(format!(
                "constant {constant} is not a valid {position} term"
            )));
        }
        let constant = constant.clone();
        Ok(Arc::new(move |_| Ok(vec![constant.clone()])))
    }

    fn reference_generator(
        &self,
        reference: &str,
        term_type: TermType,
        datatype: Option<String>,
        language: Option<String>,
    ) -> TermGenerator {
        let reference = reference.to_string();
        let options = self.options.clone();
        Arc::new(move |ctx| {
            let values = ctx.eval(&reference);
            values
                .into_iter()
                .map(|value| make_term(&options, ctx, term_type, &value, &datatype, &language))
                .collect()
        })
    }

    fn template_generator(
        &self,
        template: &str,
        term_type: TermType,
        datatype: Option<String>,
        language: Option<String>,
    ) -> EngineResult<TermGenerator> {
        let template = Template::parse(template)?;
        let options = self.options.clone();
        Ok(Arc::new(move |ctx| {
            let mut expansions = vec![String::new()];
            for segment in template.segments() {
                match segment {
                    Segment::Text(text) => {
                        for expansion in &mut expansions {
                            expansion.push_str(text);
                        }
                    }
                    Segment::Reference(reference) => {
                        let values = ctx.eval(reference);
                        if values.is_empty() {
                            // An absent hole suppresses the whole term.
                            return Ok(Vec::new());
                        }
                        let values: Vec<String> = match term_type {
                            TermType::Iri => values
                                .iter()
                                .map(|v| {
                                    iri_safe(
                                        v,
                                        options.normalization_form,
                                        options.iri_upper_case_percent_encoding,
                                    )
                                })
                                .collect(),
                            _ => values,
                        };
                        expansions = expansions
                            .iter()
                            .flat_map(|prefix| {
                                values.iter().map(move |v| format!("{prefix}{v}"))
                            })
                            .collect();
                    }
                }
            }
            expansions
                .into_iter()
                .map(|value| make_term(&options, ctx, term_type, &value, &datatype, &language))
                .collect()
        }))
    }

    fn function_generator(
        &self,
        function_map: &FunctionMap,
        term_type: TermType,
        datatype: Option<String>,
        language: Option<String>,
    ) -> EngineResult<TermGenerator> {
        let executor = self.function_executor(function_map)?;
        let options = self.options.clone();
        Ok(Arc::new(move |ctx| {
            let results = executor(ctx)?;
            let mut terms = Vec::with_capacity(results.len());
            for result in results {
                let term = match term_type {
                    // A literal result with no declared override keeps its
                    // own datatype and language.
                    TermType::Literal if datatype.is_none() && language.is_none() => result,
                    _ => make_term(
                        &options,
                        ctx,
                        term_type,
                        result.lexical(),
                        &datatype,
                        &language,
                    )?,
                };
                terms.push(term);
            }
            Ok(terms)
        }))
    }

    /// Compile a function map into an executor over the record
    ///
    /// Each predicate-object map of the function value contributes either
    /// the function IRI (`fno:executes`) or one parameter binding.
    fn function_executor(&self, function_map: &FunctionMap) -> EngineResult<TermGenerator> {
        struct CompiledBinding {
            predicate_gens: Vec<TermGenerator>,
            object_gens: Vec<TermGenerator>,
        }

        let mut bindings = Vec::new();
        for pom in &function_map.predicate_object_maps {
            let predicate_gens = pom
                .predicate_maps
                .iter()
                .map(|pm| self.predicate_generator(pm))
                .collect::<EngineResult<Vec<_>>>()?;
            let object_gens = pom
                .object_maps
                .iter()
                .filter_map(|om| om.as_value())
                .map(|om| self.object_generator(om))
                .collect::<EngineResult<Vec<_>>>()?;
            bindings.push(CompiledBinding {
                predicate_gens,
                object_gens,
            });
        }

        let functions = self.options.functions.clone();
        Ok(Arc::new(move |ctx| {
            let mut function_iri: Option<String> = None;
            let mut args = FunctionArgs::new();

            for binding in &bindings {
                let mut objects = Vec::new();
                for generator in &binding.object_gens {
                    objects.extend(generator(ctx)?);
                }
                for generator in &binding.predicate_gens {
                    for predicate in generator(ctx)? {
                        let Some(iri) = predicate.as_iri() else { continue };
                        if iri == fno::EXECUTES || iri == fno::EXECUTES_LEGACY {
                            function_iri = objects.iter().find_map(|t| match t {
                                Term::Iri(iri) => Some(iri.to_string()),
                                Term::Literal { lexical, .. } => Some(lexical.to_string()),
                                Term::BlankNode(_) => None,
                            });
                        } else {
                            args.add(iri, objects.clone());
                        }
                    }
                }
            }

            let function_iri = function_iri.ok_or_else(|| {
                EngineError::TermGeneration(
                    "function map does not bind fno:executes".to_string(),
                )
            })?;
            let function = functions
                .get(&function_iri)
                .map_err(|e| EngineError::TermGeneration(e.to_string()))?;
            function(&args).map_err(|e| EngineError::TermGeneration(e.to_string()))
        }))
    }
}

/// Mint a term of the requested type from a generated value
fn make_term(
    options: &GeneratorOptions,
    ctx: &RecordContext,
    term_type: TermType,
    value: &str,
    datatype: &Option<String>,
    language: &Option<String>,
) -> EngineResult<Term> {
    match term_type {
        TermType::Iri => {
            require_valid_iri(value)?;
            Ok(options.term_factory.iri(value))
        }
        TermType::BlankNode => Ok(options.term_factory.blank_node(&ctx.blank_label(value))),
        TermType::Literal => Ok(options.term_factory.literal(
            value,
            datatype.as_deref(),
            language.as_deref(),
        )),
    }
}

fn require_valid_iri(value: &str) -> EngineResult<()> {
    if value.is_empty() || value.contains(char::is_whitespace) || !value.contains(':') {
        return Err(EngineError::TermGeneration(format!(
            "generated value is not a valid IRI: {value:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ItemRecord;
    use rmlx_graph::DefaultTermFactory;
    use rmlx_model::ObjectMapKind;
    use rmlx_model::PredicateObjectMap;

    fn factory() -> TermGeneratorFactory {
        factory_with(Functions::new())
    }

    fn factory_with(functions: Functions) -> TermGeneratorFactory {
        TermGeneratorFactory::new(GeneratorOptions {
            normalization_form: NormalizationForm::Nfc,
            iri_upper_case_percent_encoding: true,
            term_factory: Arc::new(DefaultTermFactory),
            functions: Arc::new(functions),
        })
    }

    fn ctx(record: ItemRecord) -> RecordContext {
        RecordContext::new(Arc::new(record), 0)
    }

    #[test]
    fn test_subject_template() {
        let factory = factory();
        let generator = factory
            .subject_generator(&SubjectMap::template("http://ex/{id}"))
            .unwrap();

        let terms = generator(&ctx(ItemRecord::new().with("id", "42"))).unwrap();
        assert_eq!(terms, vec![Term::iri("http://ex/42")]);
    }

    #[test]
    fn test_absent_hole_suppresses_term() {
        let factory = factory();
        let generator = factory
            .subject_generator(&SubjectMap::template("http://ex/{id}"))
            .unwrap();

        let terms = generator(&ctx(ItemRecord::new().with("other", "x"))).unwrap();
        assert!(terms.is_empty());
    }

    #[test]
    fn test_template_iri_encoding() {
        let factory = factory();
        let generator = factory
            .subject_generator(&SubjectMap::template("http://ex/{a}"))
            .unwrap();

        let terms = generator(&ctx(ItemRecord::new().with("a", "héllo"))).unwrap();
        assert_eq!(terms, vec![Term::iri("http://ex/h%C3%A9llo")]);
    }

    #[test]
    fn test_template_lower_case_encoding() {
        let mut options = GeneratorOptions {
            normalization_form: NormalizationForm::Nfc,
            iri_upper_case_percent_encoding: true,
            term_factory: Arc::new(DefaultTermFactory),
            functions: Arc::new(Functions::new()),
        };
        options.iri_upper_case_percent_encoding = false;
        let factory = TermGeneratorFactory::new(options);

        let generator = factory
            .subject_generator(&SubjectMap::template("http://ex/{a}"))
            .unwrap();
        let terms = generator(&ctx(ItemRecord::new().with("a", "héllo"))).unwrap();
        assert_eq!(terms, vec![Term::iri("http://ex/h%c3%a9llo")]);
    }

    #[test]
    fn test_multi_valued_cartesian_product() {
        let factory = factory();
        let generator = factory
            .subject_generator(&SubjectMap::template("http://ex/{a}/{b}"))
            .unwrap();

        let record = ItemRecord::new()
            .with_values("a", vec!["1".to_string(), "2".to_string()])
            .with("b", "x");
        let terms = generator(&ctx(record)).unwrap();
        assert_eq!(
            terms,
            vec![Term::iri("http://ex/1/x"), Term::iri("http://ex/2/x")]
        );
    }

    #[test]
    fn test_object_reference_defaults_to_literal() {
        let factory = factory();
        let generator = factory
            .object_generator(&ObjectMap::reference("name"))
            .unwrap();

        let terms = generator(&ctx(ItemRecord::new().with("name", "Alice"))).unwrap();
        assert_eq!(terms, vec![Term::string("Alice")]);
    }

    #[test]
    fn test_object_datatype_and_language() {
        let factory = factory();

        let generator = factory
            .object_generator(
                &ObjectMap::reference("age").with_datatype(rmlx_vocab::xsd::INTEGER),
            )
            .unwrap();
        let terms = generator(&ctx(ItemRecord::new().with("age", "30"))).unwrap();
        assert_eq!(terms, vec![Term::typed("30", rmlx_vocab::xsd::INTEGER)]);

        let generator = factory
            .object_generator(&ObjectMap::reference("greeting").with_language("en"))
            .unwrap();
        let terms = generator(&ctx(ItemRecord::new().with("greeting", "hello"))).unwrap();
        assert_eq!(terms, vec![Term::lang_string("hello", "en")]);
    }

    #[test]
    fn test_invalid_language_tag_rejected() {
        let factory = factory();
        let result =
            factory.object_generator(&ObjectMap::reference("x").with_language("not a tag"));
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn test_blank_node_scoped_to_record() {
        let factory = factory();
        let generator = factory
            .subject_generator(
                &SubjectMap::reference("id").with_term_type(TermType::BlankNode),
            )
            .unwrap();

        let record = Arc::new(ItemRecord::new().with("id", "x"));
        let first = generator(&RecordContext::new(record.clone(), 0)).unwrap();
        let again = generator(&RecordContext::new(record.clone(), 0)).unwrap();
        let other = generator(&RecordContext::new(record, 1)).unwrap();

        // Same record ordinal yields the same node, other records differ.
        assert_eq!(first, again);
        assert_ne!(first, other);
    }

    #[test]
    fn test_subject_literal_rejected() {
        let factory = factory();
        let result = factory.subject_generator(
            &SubjectMap::reference("id").with_term_type(TermType::Literal),
        );
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn test_predicate_constant_must_be_iri() {
        let factory = factory();
        let bad = PredicateMap {
            id: None,
            term_map: TermMap::constant(Term::string("not-an-iri")),
        };
        assert!(matches!(
            factory.predicate_generator(&bad),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn test_reference_iri_must_be_absolute() {
        let factory = factory();
        let generator = factory
            .object_generator(&ObjectMap::reference("url").with_term_type(TermType::Iri))
            .unwrap();

        let err = generator(&ctx(ItemRecord::new().with("url", "not an iri"))).unwrap_err();
        assert!(matches!(err, EngineError::TermGeneration(_)));
    }

    #[test]
    fn test_function_term_map() {
        const TO_UPPER: &str = "http://example.org/fn/toUpperCase";
        const INPUT: &str = "http://example.org/fn/input";

        let mut functions = Functions::new();
        functions.register(TO_UPPER, |args: &FunctionArgs| {
            let input = args.single_string(TO_UPPER, INPUT)?;
            Ok(vec![Term::string(input.to_uppercase())])
        });
        let factory = factory_with(functions);

        let function_map = FunctionMap::new(vec![
            PredicateObjectMap::new(
                PredicateMap::constant_iri(fno::EXECUTES),
                ObjectMapKind::Value(ObjectMap::constant(Term::iri(TO_UPPER))),
            ),
            PredicateObjectMap::new(
                PredicateMap::constant_iri(INPUT),
                ObjectMapKind::Value(ObjectMap::reference("name")),
            ),
        ]);

        let object_map = ObjectMap {
            id: None,
            term_map: TermMap::function(function_map),
            datatype: None,
            language: None,
        };
        let generator = factory.object_generator(&object_map).unwrap();

        let terms = generator(&ctx(ItemRecord::new().with("name", "alice"))).unwrap();
        assert_eq!(terms, vec![Term::string("ALICE")]);
    }

    #[test]
    fn test_unregistered_function_is_term_generation_error() {
        let factory = factory();
        let function_map = FunctionMap::new(vec![PredicateObjectMap::new(
            PredicateMap::constant_iri(fno::EXECUTES),
            ObjectMapKind::Value(ObjectMap::constant(Term::iri("http://ex/fn/missing"))),
        )]);
        let object_map = ObjectMap {
            id: None,
            term_map: TermMap::function(function_map),
            datatype: None,
            language: None,
        };
        let generator = factory.object_generator(&object_map).unwrap();

        let err = generator(&ctx(ItemRecord::new())).unwrap_err();
        assert!(matches!(err, EngineError::TermGeneration(_)));
    }

    #[test]
    fn test_generator_cache_reuses_compilations() {
        let factory = factory();
        let a = factory
            .subject_generator(&SubjectMap::template("http://ex/{id}"))
            .unwrap();
        let b = factory
            .subject_generator(&SubjectMap::template("http://ex/{id}"))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
