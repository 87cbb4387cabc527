use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::chunker::Chunk;

/// Entity category used for graph nodes and curation grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// All-uppercase acronyms (BGB, DSGVO)
    Organization,
    /// Statute names and section references (Arbeitszeitgesetz, §80)
    Law,
    /// Tokens carrying digits (dates, amounts, article numbers)
    Reference,
    /// Everything else that looks like a named concept
    Concept,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Organization => "organization",
            EntityKind::Law => "law",
            EntityKind::Reference => "reference",
            EntityKind::Concept => "concept",
        }
    }

    /// Parse a stored kind string; unknown values fall back to Concept.
    pub fn parse(value: &str) -> Self {
        match value {
            "organization" => EntityKind::Organization,
            "law" => EntityKind::Law,
            "reference" => EntityKind::Reference,
            _ => EntityKind::Concept,
        }
    }
}

/// Named entity found in text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entity {
    /// Original surface form
    pub name: String,
    /// Lowercased normalized form (graph key)
    pub normalized: String,
    /// Entity category
    pub kind: EntityKind,
    /// Chunk where the entity was found
    pub chunk_id: uuid::Uuid,
    /// Word position inside chunk
    pub position: usize,
}

/// Relation between entities (co-occurrence).
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub relation_type: String,
    pub weight: f32,
}

/// Relation type produced by co-occurrence extraction.
pub const RELATED_TO: &str = "related_to";

/// Light-weight entity extractor with heuristics (no network calls).
#[derive(Debug, Default, Clone)]
pub struct EntityExtractor {
    stopwords: HashSet<String>,
}

impl EntityExtractor {
    pub fn new() -> Self {
        let mut stopwords = HashSet::new();
        for w in [
            "and", "or", "but", "the", "a", "an", "of", "in", "on", "for", "to", "with", "this",
            "that", "what", "how", "when", "where", "who", "why", "does", "can", "has", "have",
            "und", "oder", "aber", "der", "die", "das", "den", "dem", "ein", "eine", "einen",
            "mit", "von", "für", "bei", "nach", "über", "unter", "wenn", "dass", "sich", "auch",
            "sind", "ist", "wird", "werden", "kann", "nicht", "alle", "wie", "was", "wer", "wann",
            "warum", "welche",
        ] {
            stopwords.insert(w.to_string());
        }
        Self { stopwords }
    }

    /// Extract entities and relations from a chunk.
    pub fn extract(&self, chunk: &Chunk) -> (Vec<Entity>, Vec<Relation>) {
        let mut entities = Vec::new();
        let mut seen = HashSet::new();
        let mut relations = Vec::new();

        for (idx, raw_token) in chunk.text.split_whitespace().enumerate() {
            let token = raw_token.trim_matches(|c: char| !c.is_alphanumeric() && c != '§');
            if token.len() < 3 {
                continue;
            }
            let normalized = token.to_lowercase();
            if self.stopwords.contains(&normalized) {
                continue;
            }

            // Heuristic: keep capitalized words, section references, or tokens with digits.
            let is_candidate = token
                .chars()
                .next()
                .map(|c| c.is_uppercase())
                .unwrap_or(false)
                || token.starts_with('§')
                || token.chars().any(|c| c.is_numeric());

            if !is_candidate {
                continue;
            }

            if seen.insert(normalized.clone()) {
                entities.push(Entity {
                    name: token.to_string(),
                    normalized: normalized.clone(),
                    kind: classify(token),
                    chunk_id: chunk.id,
                    position: idx,
                });
            }
        }

        // Build simple co-occurrence relations between neighboring entities
        for pair in entities.windows(2) {
            if let [a, b] = pair {
                relations.push(Relation {
                    from: a.normalized.clone(),
                    to: b.normalized.clone(),
                    relation_type: RELATED_TO.to_string(),
                    weight: 1.0,
                });
            }
        }

        (entities, relations)
    }

    /// Extract just normalized entity names from free text (used for queries).
    pub fn extract_keywords(&self, text: &str) -> Vec<String> {
        let dummy = Chunk::new(
            text.to_string(),
            0,
            text.split_whitespace().count(),
            "query",
        );
        let (entities, _) = self.extract(&dummy);
        entities
            .into_iter()
            .map(|e| e.normalized)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect()
    }
}

fn classify(token: &str) -> EntityKind {
    let lowered = token.to_lowercase();
    if token.starts_with('§') || lowered.ends_with("gesetz") {
        EntityKind::Law
    } else if token.chars().count() >= 2
        && token.chars().all(|c| c.is_alphabetic() && c.is_uppercase())
    {
        EntityKind::Organization
    } else if token.chars().any(|c| c.is_numeric()) {
        EntityKind::Reference
    } else {
        EntityKind::Concept
    }
}
