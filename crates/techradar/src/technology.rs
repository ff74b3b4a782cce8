//! Core technology types for techradar.
//!
//! This module defines the documents stored in the catalog: a technology,
//! its embedded history, and the stage transitions that make up that history.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A category or stage string that is not part of the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} '{value}', expected one of: {expected}")]
pub struct UnknownVariant {
    /// Which enumeration was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
    /// Comma-separated list of accepted values.
    pub expected: String,
}

/// Classification bucket for a technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Tooling used to build and operate software.
    Tools,
    /// Practices and methods.
    Techniques,
    /// Runtime platforms and infrastructure.
    Platforms,
    /// Programming languages and frameworks.
    #[serde(rename = "Languages & Frameworks")]
    LanguagesAndFrameworks,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Tools,
        Self::Techniques,
        Self::Platforms,
        Self::LanguagesAndFrameworks,
    ];

    /// The persisted and wire form of this category.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tools => "Tools",
            Self::Techniques => "Techniques",
            Self::Platforms => "Platforms",
            Self::LanguagesAndFrameworks => "Languages & Frameworks",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "category",
                value: s.to_string(),
                expected: join_variants(Self::ALL.iter().map(|c| c.as_str())),
            })
    }
}

/// Adoption lifecycle position of a technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Proceed with caution, or stop using.
    Hold,
    /// Worth exploring.
    Assess,
    /// Worth pursuing on a project that can handle the risk.
    Trial,
    /// Recommended default.
    Adopt,
}

impl Stage {
    /// Every stage, in declaration order.
    pub const ALL: [Self; 4] = [Self::Hold, Self::Assess, Self::Trial, Self::Adopt];

    /// The persisted and wire form of this stage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hold => "Hold",
            Self::Assess => "Assess",
            Self::Trial => "Trial",
            Self::Adopt => "Adopt",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "stage",
                value: s.to_string(),
                expected: join_variants(Self::ALL.iter().map(|stage| stage.as_str())),
            })
    }
}

fn join_variants<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

/// A recorded move away from a stage.
///
/// Only the stage being left is stored; the stage being entered is either the
/// `original_stage` of the next transition or the technology's current stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTransition {
    /// The stage the technology was in before this transition.
    pub original_stage: Stage,
    /// When the transition was recorded (server clock).
    pub transition_date: DateTime<Utc>,
    /// Link to the decision record justifying the move.
    pub adr_link: String,
}

/// Audit history embedded in every technology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    /// When the technology entered the catalog. Never changes.
    pub discovery_date: DateTime<Utc>,
    /// Append-only list of transitions, oldest first.
    pub stage_transitions: Vec<StageTransition>,
}

impl History {
    /// Start a fresh history discovered at `discovery_date`.
    #[must_use]
    pub fn new(discovery_date: DateTime<Utc>) -> Self {
        Self {
            discovery_date,
            stage_transitions: Vec::new(),
        }
    }
}

/// A technology tracked by the radar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Technology {
    /// Unique name.
    pub name: String,
    /// Classification bucket.
    pub category: Category,
    /// Current adoption stage.
    pub stage: Stage,
    /// Free-form tags. Order is kept but carries no meaning.
    pub tags: Vec<String>,
    /// Optional link to a page describing the technology.
    pub details_page: Option<String>,
    /// Discovery date and stage transitions.
    pub history: History,
}

impl Technology {
    /// Build a technology from a creation request, discovered at `now`.
    #[must_use]
    pub fn new(request: NewTechnology, now: DateTime<Utc>) -> Self {
        Self {
            name: request.name,
            category: request.category,
            stage: request.stage,
            tags: request.tags,
            details_page: request.details_page,
            history: History::new(now),
        }
    }

    /// Apply an update in place.
    ///
    /// Category, tags and details page are always replaced. When the update
    /// carries a transition, the current stage is recorded as the transition's
    /// original stage before the new stage is set.
    pub fn apply(&mut self, update: TechnologyUpdate, now: DateTime<Utc>) {
        self.category = update.category;
        self.tags = update.tags;
        self.details_page = update.details_page;

        if let Some(transition) = update.stage_transition {
            self.transition(transition, now);
        }
    }

    /// Move to a new stage, recording the stage being left.
    ///
    /// Moving to the current stage is still recorded.
    pub fn transition(&mut self, request: StageTransitionRequest, now: DateTime<Utc>) {
        self.history.stage_transitions.push(StageTransition {
            original_stage: self.stage,
            transition_date: now,
            adr_link: request.adr_link,
        });
        self.stage = request.new_stage;
    }

    /// Every stage this technology has been in, oldest first, ending with the
    /// current stage.
    #[must_use]
    pub fn stage_path(&self) -> Vec<Stage> {
        self.history
            .stage_transitions
            .iter()
            .map(|t| t.original_stage)
            .chain(std::iter::once(self.stage))
            .collect()
    }
}

/// Request to add a technology to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTechnology {
    /// Unique name.
    pub name: String,
    /// Classification bucket.
    pub category: Category,
    /// Initial adoption stage.
    pub stage: Stage,
    /// Tags, empty when omitted.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Optional details page.
    #[serde(default)]
    pub details_page: Option<String>,
}

/// Request to move a technology to a new stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTransitionRequest {
    /// Stage to move to.
    pub new_stage: Stage,
    /// Decision record justifying the move.
    pub adr_link: String,
}

/// Full replacement of the mutable fields of a technology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnologyUpdate {
    /// New category.
    pub category: Category,
    /// New tags. Required; an empty list clears them.
    pub tags: Vec<String>,
    /// New details page.
    #[serde(default)]
    pub details_page: Option<String>,
    /// Optional stage change, recorded in the history.
    #[serde(default)]
    pub stage_transition: Option<StageTransitionRequest>,
}
