//! Core records of the identity hypergraph.
//!
//! Design goals:
//! - Closed enumerations for aspects and refinement types; out-of-set
//!   strings are rejected at the parsing boundary.
//! - Records serialize to the snapshot wire format directly.
//! - Inputs (`NewFragment`, `NewEdge`) are separate from stored records so
//!   ids and timestamps are only ever assigned by the store.
//!
//! Unit tests are colocated at the bottom of this file.

use crate::error::GardenError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Identifier for a fragment (opaque string, UUID v4 when store-assigned).
pub type FragmentId = String;

/// Identifier for a refinement edge.
pub type EdgeId = String;

/// Opaque, caller-owned metadata attached to fragments and edges.
pub type Metadata = HashMap<String, serde_json::Value>;

/// The eight dimensions of identity representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityAspect {
    SelfReference,
    MetaReflection,
    CognitiveFunction,
    TechnicalCapability,
    KnowledgeDomain,
    BehavioralPattern,
    PersonalityTrait,
    ValuePrinciple,
}

impl IdentityAspect {
    pub const ALL: [IdentityAspect; 8] = [
        IdentityAspect::SelfReference,
        IdentityAspect::MetaReflection,
        IdentityAspect::CognitiveFunction,
        IdentityAspect::TechnicalCapability,
        IdentityAspect::KnowledgeDomain,
        IdentityAspect::BehavioralPattern,
        IdentityAspect::PersonalityTrait,
        IdentityAspect::ValuePrinciple,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityAspect::SelfReference => "self_reference",
            IdentityAspect::MetaReflection => "meta_reflection",
            IdentityAspect::CognitiveFunction => "cognitive_function",
            IdentityAspect::TechnicalCapability => "technical_capability",
            IdentityAspect::KnowledgeDomain => "knowledge_domain",
            IdentityAspect::BehavioralPattern => "behavioral_pattern",
            IdentityAspect::PersonalityTrait => "personality_trait",
            IdentityAspect::ValuePrinciple => "value_principle",
        }
    }
}

impl fmt::Display for IdentityAspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityAspect {
    type Err = GardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IdentityAspect::ALL
            .iter()
            .copied()
            .find(|aspect| aspect.as_str() == s)
            .ok_or_else(|| GardenError::InvalidAspect(s.to_string()))
    }
}

/// How one fragment's knowledge evolved into, or combined with, another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementType {
    /// Synthesizing new knowledge
    Integration,
    /// Deepening existing knowledge
    Elaboration,
    /// Fixing errors
    Correction,
}

impl RefinementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefinementType::Integration => "integration",
            RefinementType::Elaboration => "elaboration",
            RefinementType::Correction => "correction",
        }
    }
}

impl fmt::Display for RefinementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefinementType {
    type Err = GardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integration" => Ok(RefinementType::Integration),
            "elaboration" => Ok(RefinementType::Elaboration),
            "correction" => Ok(RefinementType::Correction),
            other => Err(GardenError::InvalidRefinementType(other.to_string())),
        }
    }
}

/// A node in the hypergraph: one piece of identity knowledge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentityFragment {
    pub id: FragmentId,
    /// Collaborator that produced the fragment.
    #[serde(alias = "framework_source")]
    pub source: String,
    pub aspect: IdentityAspect,
    pub content: String,
    pub confidence: f64,
    pub keywords: Vec<String>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A directed provenance edge between fragments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefinementEdge {
    pub id: EdgeId,
    pub parent_id: Option<FragmentId>,
    pub child_id: FragmentId,
    pub refinement_type: RefinementType,
    pub confidence_gain: f64,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Timestamp parsing for stored records.
///
/// Records written by this crate carry RFC 3339 timestamps. Older snapshots
/// carry ISO-8601 local times without an offset; those are read as UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}

/// Input for `IndexedMemory::add_fragment`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFragment {
    pub source: String,
    pub aspect: IdentityAspect,
    pub content: String,
    pub confidence: f64,
    /// When `None`, keywords are extracted from `content`.
    pub keywords: Option<Vec<String>>,
    pub metadata: Option<Metadata>,
}

impl NewFragment {
    pub fn new(
        source: impl Into<String>,
        aspect: IdentityAspect,
        content: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            source: source.into(),
            aspect,
            content: content.into(),
            confidence,
            keywords: None,
            metadata: None,
        }
    }

    pub fn with_keywords<I, T>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.keywords = Some(keywords.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Input for `IndexedMemory::add_refinement_edge`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEdge {
    pub parent_id: Option<FragmentId>,
    pub child_id: FragmentId,
    pub refinement_type: RefinementType,
    pub confidence_gain: f64,
    pub metadata: Option<Metadata>,
}

impl NewEdge {
    pub fn new(
        parent_id: Option<FragmentId>,
        child_id: impl Into<FragmentId>,
        refinement_type: RefinementType,
        confidence_gain: f64,
    ) -> Self {
        Self {
            parent_id,
            child_id: child_id.into(),
            refinement_type,
            confidence_gain,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Untyped fragment request as received from outside the crate (batch
/// files, adapters). The aspect is validated when converting into a
/// `NewFragment`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FragmentRequest {
    #[serde(alias = "framework")]
    pub source: String,
    pub aspect: String,
    pub content: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl From<NewFragment> for FragmentRequest {
    fn from(new: NewFragment) -> Self {
        Self {
            source: new.source,
            aspect: new.aspect.as_str().to_string(),
            content: new.content,
            confidence: new.confidence,
            keywords: new.keywords,
            metadata: new.metadata,
        }
    }
}

impl TryFrom<FragmentRequest> for NewFragment {
    type Error = GardenError;

    fn try_from(request: FragmentRequest) -> Result<Self, Self::Error> {
        let aspect = request.aspect.parse::<IdentityAspect>()?;
        Ok(Self {
            source: request.source,
            aspect,
            content: request.content,
            confidence: request.confidence,
            keywords: request.keywords,
            metadata: request.metadata,
        })
    }
}
