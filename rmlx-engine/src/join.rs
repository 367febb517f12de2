//! Join engine
//!
//! RefObjectMaps with join conditions defer their triples until both sides
//! of the join have been observed:
//!
//! - the **child side** buffers, per record, the generated subjects, the
//!   POM's predicates and graphs, and the evaluated child join values;
//! - the **parent side** indexes parent subjects by their evaluated join
//!   values.
//!
//! When both pipelines signal completion, a symmetric hash join runs: for
//! every buffered child row, the parent subjects matching under *all* join
//! conditions are substituted as objects and the resulting statements are
//! emitted.
//!
//! Both stores are behind provider traits so deployments can spill to
//! disk; the defaults are in-memory.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use rmlx_graph::{Statement, Term};
use rmlx_model::RefObjectMap;

use crate::error::{EngineError, EngineResult};
use crate::terms::RecordContext;

/// A statement or a terminal pipeline error
pub type StatementResult = Result<Statement, EngineError>;

/// One buffered child-side row
#[derive(Debug, Clone)]
pub struct ChildSideJoin {
    /// Subjects generated for the child record
    pub subjects: Vec<Term>,
    /// Predicates of the owning predicate-object map
    pub predicates: Vec<Term>,
    /// Graphs the joined statements land in (`None` = default graph)
    pub graphs: Vec<Option<Term>>,
    /// Evaluated join conditions
    pub conditions: Vec<ChildSideJoinCondition>,
}

/// Child-side values of one join condition
#[derive(Debug, Clone)]
pub struct ChildSideJoinCondition {
    /// The parent-side expression this condition matches against
    pub parent_expression: String,
    /// Values of the child-side expression for this record
    pub child_values: Vec<String>,
}

/// Buffers child-side rows until the join runs
#[async_trait]
pub trait ChildSideJoinStore: Send + Sync {
    /// Append a row
    async fn append(&self, row: ChildSideJoin) -> EngineResult<()>;

    /// Take all buffered rows, releasing the store's resources
    async fn drain(&self) -> EngineResult<Vec<ChildSideJoin>>;
}

/// Creates child-side stores, one per RefObjectMap
pub trait ChildSideJoinStoreProvider: Send + Sync {
    /// Create a store; `name` identifies the RefObjectMap for diagnostics
    /// and spill file naming
    fn create(&self, name: &str) -> Arc<dyn ChildSideJoinStore>;
}

/// The in-memory child-side store
#[derive(Default)]
pub struct InMemoryChildSideJoinStore {
    rows: Mutex<Vec<ChildSideJoin>>,
}

#[async_trait]
impl ChildSideJoinStore for InMemoryChildSideJoinStore {
    async fn append(&self, row: ChildSideJoin) -> EngineResult<()> {
        self.rows.lock().await.push(row);
        Ok(())
    }

    async fn drain(&self) -> EngineResult<Vec<ChildSideJoin>> {
        Ok(std::mem::take(&mut *self.rows.lock().await))
    }
}

/// Provider for [`InMemoryChildSideJoinStore`]
#[derive(Debug, Default, Clone, Copy)]
pub struct InMemoryChildSideJoinStoreProvider;

impl ChildSideJoinStoreProvider for InMemoryChildSideJoinStoreProvider {
    fn create(&self, _name: &str) -> Arc<dyn ChildSideJoinStore> {
        Arc::new(InMemoryChildSideJoinStore::default())
    }
}

/// Key of the parent-side condition store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParentSideJoinKey {
    /// The parent-side expression
    pub expression: String,
    /// One evaluated value of that expression
    pub value: String,
}

impl ParentSideJoinKey {
    /// Create a key
    pub fn new(expression: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            value: value.into(),
        }
    }
}

/// Indexes parent subjects by their evaluated join values
#[async_trait]
pub trait ParentSideJoinConditionStore: Send + Sync {
    /// Register a parent subject under a key
    async fn add(&self, key: ParentSideJoinKey, subject: Term) -> EngineResult<()>;

    /// All parent subjects registered under a key
    async fn get(&self, key: &ParentSideJoinKey) -> EngineResult<Vec<Term>>;
}

/// Creates parent-side condition stores, one per RefObjectMap
pub trait ParentSideJoinConditionStoreProvider: Send + Sync {
    /// Create a store for the named RefObjectMap
    fn create(&self, name: &str) -> Arc<dyn ParentSideJoinConditionStore>;
}

/// The in-memory parent-side condition store
#[derive(Default)]
pub struct InMemoryParentSideJoinConditionStore {
    subjects: Mutex<HashMap<ParentSideJoinKey, HashSet<Term>>>,
}

#[async_trait]
impl ParentSideJoinConditionStore for InMemoryParentSideJoinConditionStore {
    async fn add(&self, key: ParentSideJoinKey, subject: Term) -> EngineResult<()> {
        self.subjects
            .lock()
            .await
            .entry(key)
            .or_default()
            .insert(subject);
        Ok(())
    }

    async fn get(&self, key: &ParentSideJoinKey) -> EngineResult<Vec<Term>> {
        Ok(self
            .subjects
            .lock()
            .await
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }
}

/// Provider for [`InMemoryParentSideJoinConditionStore`]
#[derive(Debug, Default, Clone, Copy)]
pub struct InMemoryParentSideJoinConditionStoreProvider;

impl ParentSideJoinConditionStoreProvider for InMemoryParentSideJoinConditionStoreProvider {
    fn create(&self, _name: &str) -> Arc<dyn ParentSideJoinConditionStore> {
        Arc::new(InMemoryParentSideJoinConditionStore::default())
    }
}

#[derive(Debug, Default)]
struct CompletionState {
    child_done: bool,
    parent_done: bool,
    emitted: bool,
}

/// Executes one RefObjectMap's join between its child and parent pipelines
pub struct RefObjectMapper {
    ref_object_map: RefObjectMap,
    child_triples_map: String,
    child_store: Arc<dyn ChildSideJoinStore>,
    parent_store: Arc<dyn ParentSideJoinConditionStore>,
    completion: Mutex<CompletionState>,
}

impl RefObjectMapper {
    /// Create a mapper for one RefObjectMap occurrence
    pub fn new(
        ref_object_map: RefObjectMap,
        child_triples_map: impl Into<String>,
        child_store_provider: &dyn ChildSideJoinStoreProvider,
        parent_store_provider: &dyn ParentSideJoinConditionStoreProvider,
    ) -> Self {
        let child_triples_map = child_triples_map.into();
        let name = format!(
            "{child_triples_map}->{}",
            ref_object_map.parent_triples_map
        );
        Self {
            child_store: child_store_provider.create(&name),
            parent_store: parent_store_provider.create(&name),
            ref_object_map,
            child_triples_map,
            completion: Mutex::new(CompletionState::default()),
        }
    }

    /// The parent TriplesMap this mapper joins against
    pub fn parent_triples_map(&self) -> &str {
        &self.ref_object_map.parent_triples_map
    }

    /// Buffer one child record's contribution
    ///
    /// A join expression evaluating to no value is a data error: the row
    /// is dropped with a warning.
    pub async fn on_child_record(
        &self,
        ctx: &RecordContext,
        subjects: &[Term],
        predicates: &[Term],
        graphs: &[Option<Term>],
    ) -> EngineResult<()> {
        let mut conditions = Vec::with_capacity(self.ref_object_map.join_conditions.len());
        for jc in &self.ref_object_map.join_conditions {
            let child_values = ctx.eval(&jc.child);
            if child_values.is_empty() {
                warn!(
                    triples_map = %self.child_triples_map,
                    expression = %jc.child,
                    "child join expression evaluated to no value; row dropped"
                );
                return Ok(());
            }
            conditions.push(ChildSideJoinCondition {
                parent_expression: jc.parent.clone(),
                child_values,
            });
        }

        self.child_store
            .append(ChildSideJoin {
                subjects: subjects.to_vec(),
                predicates: predicates.to_vec(),
                graphs: graphs.to_vec(),
                conditions,
            })
            .await
    }

    /// Register one parent record's subjects
    pub async fn on_parent_record(
        &self,
        ctx: &RecordContext,
        subjects: &[Term],
    ) -> EngineResult<()> {
        for jc in &self.ref_object_map.join_conditions {
            for value in ctx.eval(&jc.parent) {
                for subject in subjects {
                    self.parent_store
                        .add(
                            ParentSideJoinKey::new(jc.parent.clone(), value.clone()),
                            subject.clone(),
                        )
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Child pipeline completed; joins run once both sides are done
    pub async fn complete_child(
        &self,
        out: &mpsc::Sender<StatementResult>,
    ) -> EngineResult<()> {
        let ready = {
            let mut state = self.completion.lock().await;
            state.child_done = true;
            state.parent_done && !state.emitted && {
                state.emitted = true;
                true
            }
        };
        if ready {
            self.join_and_emit(out).await?;
        }
        Ok(())
    }

    /// Parent pipeline completed; joins run once both sides are done
    pub async fn complete_parent(
        &self,
        out: &mpsc::Sender<StatementResult>,
    ) -> EngineResult<()> {
        let ready = {
            let mut state = self.completion.lock().await;
            state.parent_done = true;
            state.child_done && !state.emitted && {
                state.emitted = true;
                true
            }
        };
        if ready {
            self.join_and_emit(out).await?;
        }
        Ok(())
    }

    /// Symmetric hash join over the buffered rows
    async fn join_and_emit(&self, out: &mpsc::Sender<StatementResult>) -> EngineResult<()> {
        let rows = self.child_store.drain().await?;
        debug!(
            triples_map = %self.child_triples_map,
            parent = %self.ref_object_map.parent_triples_map,
            rows = rows.len(),
            "joining child rows against parent subjects"
        );

        for row in rows {
            // Intersect candidate parents across all conditions.
            let mut matched: Option<HashSet<Term>> = None;
            for condition in &row.conditions {
                let mut candidates = HashSet::new();
                for value in &condition.child_values {
                    let key =
                        ParentSideJoinKey::new(condition.parent_expression.clone(), value.clone());
                    candidates.extend(self.parent_store.get(&key).await?);
                }
                matched = Some(match matched {
                    None => candidates,
                    Some(previous) => previous.intersection(&candidates).cloned().collect(),
                });
                if matched.as_ref().is_some_and(|m| m.is_empty()) {
                    break;
                }
            }

            let Some(parents) = matched else { continue };
            let mut parents: Vec<Term> = parents.into_iter().collect();
            parents.sort();

            for subject in &row.subjects {
                for predicate in &row.predicates {
                    for parent in &parents {
                        for graph in &row.graphs {
                            let statement = Statement {
                                subject: subject.clone(),
                                predicate: predicate.clone(),
                                object: parent.clone(),
                                graph: graph.clone(),
                            };
                            if out.send(Ok(statement)).await.is_err() {
                                // Consumer gone: cancellation.
                                return Ok(());
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
