//! Entity graph storage with in-memory and Neo4j backends

use std::collections::HashMap;

use neo4rs::{query, Graph};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::extractor::EntityKind;
use crate::{Config, Error, Result};

/// Entity node as stored in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Normalized entity name (graph key)
    pub name: String,
    pub kind: EntityKind,
    /// Text excerpts describing the entity, newline-separated after merges
    pub description: String,
    /// Documents the entity was seen in
    pub source_ids: Vec<String>,
    pub occurrences: u64,
}

/// Graph size counters.
#[derive(Debug, Default, Clone, Serialize)]
pub struct GraphStats {
    pub entity_count: u64,
    pub relation_count: u64,
}

/// Entity graph with switchable backend.
pub enum GraphStore {
    Memory(MemoryGraph),
    Neo4j(Neo4jGraph),
}

impl GraphStore {
    pub fn in_memory() -> Self {
        GraphStore::Memory(MemoryGraph::default())
    }

    /// Connect to a Neo4j server and ensure constraints exist.
    pub async fn connect_neo4j(uri: &str, user: &str, password: &str) -> Result<Self> {
        let backend = Neo4jGraph::connect(uri, user, password).await?;
        backend.init_schema().await?;
        Ok(GraphStore::Neo4j(backend))
    }

    /// Pick a backend from configuration. Falls back to in-memory storage
    /// when no Neo4j credentials are available.
    pub async fn from_config(config: &Config) -> Result<Self> {
        match config.graph_backend.as_str() {
            "memory" => Ok(Self::in_memory()),
            _ => {
                if config.neo4j_password.is_empty() {
                    warn!("NEO4J_PASSWORD not set, using in-memory entity graph");
                    return Ok(Self::in_memory());
                }
                info!(uri = %config.neo4j_uri, "Connecting to Neo4j");
                Self::connect_neo4j(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password)
                    .await
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            GraphStore::Memory(_) => "memory",
            GraphStore::Neo4j(_) => "neo4j",
        }
    }

    /// Insert an entity or bump its occurrence counter. The first non-empty
    /// description wins; later sightings only add their source document.
    pub async fn upsert_entity(
        &self,
        name: &str,
        kind: EntityKind,
        description: &str,
        source_id: &str,
    ) -> Result<()> {
        match self {
            GraphStore::Memory(g) => g.upsert_entity(name, kind, description, source_id).await,
            GraphStore::Neo4j(g) => g.upsert_entity(name, kind, description, source_id).await,
        }
    }

    /// Add or strengthen a relation. Pairs are stored in lexicographic order
    /// so both directions accumulate on one edge.
    pub async fn add_relation(
        &self,
        from: &str,
        to: &str,
        relation_type: &str,
        weight: f32,
    ) -> Result<()> {
        if from == to {
            return Ok(());
        }
        let (a, b) = ordered(from, to);
        match self {
            GraphStore::Memory(g) => g.add_relation(&a, &b, relation_type, weight).await,
            GraphStore::Neo4j(g) => g.add_relation(&a, &b, relation_type, weight).await,
        }
    }

    /// Entities connected to `name`, strongest edges first.
    pub async fn neighbors(&self, name: &str, top_k: usize) -> Result<Vec<(String, f32)>> {
        match self {
            GraphStore::Memory(g) => g.neighbors(name, top_k).await,
            GraphStore::Neo4j(g) => g.neighbors(name, top_k).await,
        }
    }

    pub async fn all_entities(&self) -> Result<Vec<EntityRecord>> {
        match self {
            GraphStore::Memory(g) => g.all_entities().await,
            GraphStore::Neo4j(g) => g.all_entities().await,
        }
    }

    pub async fn entity(&self, name: &str) -> Result<Option<EntityRecord>> {
        match self {
            GraphStore::Memory(g) => g.entity(name).await,
            GraphStore::Neo4j(g) => g.entity(name).await,
        }
    }

    /// Fold `source` into `target`: concatenate descriptions, union source
    /// documents, sum occurrences, rewire edges, then delete `source`.
    /// The target keeps its own kind.
    pub async fn merge_entities(&self, source: &str, target: &str) -> Result<()> {
        if source == target {
            return Ok(());
        }
        match self {
            GraphStore::Memory(g) => g.merge_entities(source, target).await,
            GraphStore::Neo4j(g) => g.merge_entities(source, target).await,
        }?;
        info!(source = %source, target = %target, "Merged entities");
        Ok(())
    }

    pub async fn stats(&self) -> Result<GraphStats> {
        match self {
            GraphStore::Memory(g) => g.stats().await,
            GraphStore::Neo4j(g) => g.stats().await,
        }
    }
}

fn ordered(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[derive(Debug, Clone)]
struct EdgeData {
    relation: String,
    weight: f32,
}

#[derive(Debug, Default)]
struct GraphInner {
    nodes: HashMap<String, EntityRecord>,
    edges: HashMap<(String, String), EdgeData>,
}

/// Process-local graph used in tests and when Neo4j is not configured.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    inner: RwLock<GraphInner>,
}

impl MemoryGraph {
    async fn upsert_entity(
        &self,
        name: &str,
        kind: EntityKind,
        description: &str,
        source_id: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.nodes.get_mut(name) {
            Some(record) => {
                record.occurrences += 1;
                if record.description.is_empty() && !description.is_empty() {
                    record.description = description.to_string();
                }
                if !record.source_ids.iter().any(|s| s == source_id) {
                    record.source_ids.push(source_id.to_string());
                }
            }
            None => {
                inner.nodes.insert(
                    name.to_string(),
                    EntityRecord {
                        name: name.to_string(),
                        kind,
                        description: description.to_string(),
                        source_ids: vec![source_id.to_string()],
                        occurrences: 1,
                    },
                );
            }
        }
        Ok(())
    }

    async fn add_relation(
        &self,
        from: &str,
        to: &str,
        relation_type: &str,
        weight: f32,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let edge = inner
            .edges
            .entry((from.to_string(), to.to_string()))
            .or_insert_with(|| EdgeData {
                relation: relation_type.to_string(),
                weight: 0.0,
            });
        edge.weight += weight;
        Ok(())
    }

    async fn neighbors(&self, name: &str, top_k: usize) -> Result<Vec<(String, f32)>> {
        let inner = self.inner.read().await;
        let mut related: Vec<(String, f32)> = inner
            .edges
            .iter()
            .filter_map(|((a, b), edge)| {
                if a == name {
                    Some((b.clone(), edge.weight))
                } else if b == name {
                    Some((a.clone(), edge.weight))
                } else {
                    None
                }
            })
            .collect();
        related.sort_by(|x, y| y.1.partial_cmp(&x.1).unwrap_or(std::cmp::Ordering::Equal));
        related.truncate(top_k);
        Ok(related)
    }

    async fn all_entities(&self) -> Result<Vec<EntityRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.nodes.values().cloned().collect())
    }

    async fn entity(&self, name: &str) -> Result<Option<EntityRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.nodes.get(name).cloned())
    }

    async fn merge_entities(&self, source: &str, target: &str) -> Result<()> {
        let mut inner = self.inner.write().await;

        let source_rec = match inner.nodes.remove(source) {
            Some(rec) => rec,
            None => return Err(Error::GraphDbError(format!("entity not found: {source}"))),
        };
        let Some(target_rec) = inner.nodes.get_mut(target) else {
            inner.nodes.insert(source.to_string(), source_rec);
            return Err(Error::GraphDbError(format!("entity not found: {target}")));
        };

        if !source_rec.description.is_empty() {
            if target_rec.description.is_empty() {
                target_rec.description = source_rec.description.clone();
            } else {
                target_rec.description.push('\n');
                target_rec.description.push_str(&source_rec.description);
            }
        }
        for sid in source_rec.source_ids {
            if !target_rec.source_ids.contains(&sid) {
                target_rec.source_ids.push(sid);
            }
        }
        target_rec.occurrences += source_rec.occurrences;

        // Rewire every edge touching the source. Edges that would become
        // self-loops on the target are dropped.
        let touching: Vec<((String, String), EdgeData)> = inner
            .edges
            .iter()
            .filter(|((a, b), _)| a == source || b == source)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for (key, edge) in touching {
            inner.edges.remove(&key);
            let other = if key.0 == source { key.1 } else { key.0 };
            if other == target {
                continue;
            }
            let new_key = ordered(target, &other);
            let entry = inner.edges.entry(new_key).or_insert_with(|| EdgeData {
                relation: edge.relation.clone(),
                weight: 0.0,
            });
            entry.weight += edge.weight;
        }

        Ok(())
    }

    async fn stats(&self) -> Result<GraphStats> {
        let inner = self.inner.read().await;
        Ok(GraphStats {
            entity_count: inner.nodes.len() as u64,
            relation_count: inner.edges.len() as u64,
        })
    }
}

/// Graph store backed by Neo4j.
pub struct Neo4jGraph {
    graph: Graph,
}

impl Neo4jGraph {
    async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password).await?;
        Ok(Self { graph })
    }

    async fn init_schema(&self) -> Result<()> {
        let statements = [
            "CREATE CONSTRAINT entity_name IF NOT EXISTS FOR (e:Entity) REQUIRE e.name IS UNIQUE",
            "CREATE INDEX entity_kind IF NOT EXISTS FOR (e:Entity) ON (e.kind)",
        ];
        for statement in statements {
            self.graph.run(query(statement)).await?;
        }
        debug!("Neo4j schema initialized");
        Ok(())
    }

    async fn upsert_entity(
        &self,
        name: &str,
        kind: EntityKind,
        description: &str,
        source_id: &str,
    ) -> Result<()> {
        let q = query(
            "MERGE (e:Entity {name: $name})
             ON CREATE SET e.kind = $kind,
                 e.description = $description,
                 e.source_ids = [$source_id],
                 e.occurrences = 1
             ON MATCH SET e.occurrences = e.occurrences + 1,
                 e.source_ids = CASE
                     WHEN $source_id IN e.source_ids THEN e.source_ids
                     ELSE e.source_ids + $source_id
                 END,
                 e.description = CASE
                     WHEN e.description = '' THEN $description
                     ELSE e.description
                 END",
        )
        .param("name", name)
        .param("kind", kind.as_str())
        .param("description", description)
        .param("source_id", source_id);

        self.graph.run(q).await?;
        Ok(())
    }

    async fn add_relation(
        &self,
        from: &str,
        to: &str,
        relation_type: &str,
        weight: f32,
    ) -> Result<()> {
        let q = query(
            "MERGE (a:Entity {name: $from})
             MERGE (b:Entity {name: $to})
             MERGE (a)-[r:RELATED {type: $rel_type}]->(b)
             ON CREATE SET r.weight = $weight
             ON MATCH SET r.weight = r.weight + $weight",
        )
        .param("from", from)
        .param("to", to)
        .param("rel_type", relation_type)
        .param("weight", weight as f64);

        self.graph.run(q).await?;
        Ok(())
    }

    async fn neighbors(&self, name: &str, top_k: usize) -> Result<Vec<(String, f32)>> {
        let q = query(
            "MATCH (e:Entity {name: $name})-[r:RELATED]-(other:Entity)
             RETURN other.name AS name, r.weight AS weight
             ORDER BY r.weight DESC
             LIMIT $limit",
        )
        .param("name", name)
        .param("limit", top_k as i64);

        let mut result = self.graph.execute(q).await?;
        let mut related = Vec::new();
        while let Some(row) = result.next().await? {
            let other: String = row.get("name").unwrap_or_default();
            let weight = row.get::<f64>("weight").unwrap_or(0.0) as f32;
            related.push((other, weight));
        }
        Ok(related)
    }

    async fn all_entities(&self) -> Result<Vec<EntityRecord>> {
        let q = query(
            "MATCH (e:Entity)
             RETURN e.name AS name, e.kind AS kind, e.description AS description,
                    e.source_ids AS source_ids, e.occurrences AS occurrences",
        );

        let mut result = self.graph.execute(q).await?;
        let mut entities = Vec::new();
        while let Some(row) = result.next().await? {
            entities.push(record_from_row(&row));
        }
        Ok(entities)
    }

    async fn entity(&self, name: &str) -> Result<Option<EntityRecord>> {
        let q = query(
            "MATCH (e:Entity {name: $name})
             RETURN e.name AS name, e.kind AS kind, e.description AS description,
                    e.source_ids AS source_ids, e.occurrences AS occurrences",
        )
        .param("name", name);

        let mut result = self.graph.execute(q).await?;
        if let Some(row) = result.next().await? {
            return Ok(Some(record_from_row(&row)));
        }
        Ok(None)
    }

    async fn merge_entities(&self, source: &str, target: &str) -> Result<()> {
        let fold = query(
            "MATCH (s:Entity {name: $source}), (t:Entity {name: $target})
             SET t.description = CASE
                     WHEN s.description = '' THEN t.description
                     WHEN t.description = '' THEN s.description
                     ELSE t.description + '\\n' + s.description
                 END,
                 t.source_ids = t.source_ids +
                     [sid IN s.source_ids WHERE NOT sid IN t.source_ids],
                 t.occurrences = t.occurrences + s.occurrences",
        )
        .param("source", source)
        .param("target", target);
        self.graph.run(fold).await?;

        let rewire = query(
            "MATCH (s:Entity {name: $source})-[r:RELATED]-(other:Entity)
             MATCH (t:Entity {name: $target})
             WHERE other.name <> $target
             MERGE (t)-[nr:RELATED {type: r.type}]->(other)
             ON CREATE SET nr.weight = r.weight
             ON MATCH SET nr.weight = nr.weight + r.weight",
        )
        .param("source", source)
        .param("target", target);
        self.graph.run(rewire).await?;

        let delete = query("MATCH (s:Entity {name: $source}) DETACH DELETE s")
            .param("source", source);
        self.graph.run(delete).await?;

        Ok(())
    }

    async fn stats(&self) -> Result<GraphStats> {
        let q = query(
            "MATCH (e:Entity)
             WITH count(e) AS entity_count
             OPTIONAL MATCH ()-[r:RELATED]->()
             RETURN entity_count, count(r) AS relation_count",
        );

        let mut result = self.graph.execute(q).await?;
        if let Some(row) = result.next().await? {
            return Ok(GraphStats {
                entity_count: row.get::<i64>("entity_count").unwrap_or(0) as u64,
                relation_count: row.get::<i64>("relation_count").unwrap_or(0) as u64,
            });
        }
        Ok(GraphStats::default())
    }
}

fn record_from_row(row: &neo4rs::Row) -> EntityRecord {
    EntityRecord {
        name: row.get("name").unwrap_or_default(),
        kind: EntityKind::parse(&row.get::<String>("kind").unwrap_or_default()),
        description: row.get("description").unwrap_or_default(),
        source_ids: row.get::<Vec<String>>("source_ids").unwrap_or_default(),
        occurrences: row.get::<i64>("occurrences").unwrap_or(0) as u64,
    }
}
