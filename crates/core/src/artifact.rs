//! Study artifacts — the typed, provenance-carrying outputs of the engine.
//!
//! Every artifact carries verified citations and a [`Confidence`]. An artifact
//! whose citations are not all grounded is still returned, marked low-confidence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::citation::{Confidence, VerifiedCitation};
use crate::segment::LectureId;

/// An answer to a learner's question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub text: String,
    pub citations: Vec<VerifiedCitation>,
    pub confidence: Confidence,
    /// Generation attempts used
    pub attempts: u32,
}

/// The quiz formats the engine can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizKind {
    MultipleChoice,
    MultipleSelect,
    TrueFalse,
    FillInBlank,
    ShortAnswer,
    Matching,
    Ordering,
    Categorization,
    Debate,
    Numeric,
}

impl QuizKind {
    pub const ALL: [QuizKind; 10] = [
        Self::MultipleChoice,
        Self::MultipleSelect,
        Self::TrueFalse,
        Self::FillInBlank,
        Self::ShortAnswer,
        Self::Matching,
        Self::Ordering,
        Self::Categorization,
        Self::Debate,
        Self::Numeric,
    ];

    /// The tag used on the wire and in schemas.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple_choice",
            Self::MultipleSelect => "multiple_select",
            Self::TrueFalse => "true_false",
            Self::FillInBlank => "fill_in_blank",
            Self::ShortAnswer => "short_answer",
            Self::Matching => "matching",
            Self::Ordering => "ordering",
            Self::Categorization => "categorization",
            Self::Debate => "debate",
            Self::Numeric => "numeric",
        }
    }
}

impl std::fmt::Display for QuizKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuizKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' ', '/'], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| format!("unknown quiz kind '{s}'"))
    }
}

/// Which debater holds the correct position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebateSide {
    #[serde(alias = "a", alias = "person_a", alias = "Person A")]
    A,
    #[serde(alias = "b", alias = "person_b", alias = "Person B")]
    B,
}

/// An item and the category it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedItem {
    pub text: String,
    pub category: String,
}

/// The body of a quiz item; the `type` tag selects the format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuizBody {
    MultipleChoice {
        question: String,
        options: Vec<String>,
        correct_index: usize,
    },
    MultipleSelect {
        question: String,
        options: Vec<String>,
        correct_indices: Vec<usize>,
    },
    TrueFalse {
        statement: String,
        answer: bool,
    },
    FillInBlank {
        /// Text with one `___` per blank
        text: String,
        answers: Vec<String>,
    },
    ShortAnswer {
        question: String,
        model_answer: String,
    },
    Matching {
        prompt: String,
        left: Vec<String>,
        right: Vec<String>,
        /// `[left_index, right_index]` pairs
        pairs: Vec<[usize; 2]>,
    },
    Ordering {
        prompt: String,
        /// Items in their correct order
        items: Vec<String>,
    },
    Categorization {
        prompt: String,
        categories: Vec<String>,
        items: Vec<CategorizedItem>,
    },
    Debate {
        topic: String,
        person_a: String,
        person_b: String,
        correct: DebateSide,
        model_argument: String,
    },
    Numeric {
        question: String,
        answer: f64,
        #[serde(default)]
        tolerance: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },
}

impl QuizBody {
    pub fn kind(&self) -> QuizKind {
        match self {
            Self::MultipleChoice { .. } => QuizKind::MultipleChoice,
            Self::MultipleSelect { .. } => QuizKind::MultipleSelect,
            Self::TrueFalse { .. } => QuizKind::TrueFalse,
            Self::FillInBlank { .. } => QuizKind::FillInBlank,
            Self::ShortAnswer { .. } => QuizKind::ShortAnswer,
            Self::Matching { .. } => QuizKind::Matching,
            Self::Ordering { .. } => QuizKind::Ordering,
            Self::Categorization { .. } => QuizKind::Categorization,
            Self::Debate { .. } => QuizKind::Debate,
            Self::Numeric { .. } => QuizKind::Numeric,
        }
    }
}

/// One quiz question with provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizItem {
    pub body: QuizBody,
    #[serde(default)]
    pub explanation: String,
    pub citations: Vec<VerifiedCitation>,
    pub confidence: Confidence,
}

/// A flashcard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
    /// Whether a paraphrased answer should be accepted when self-testing
    pub paraphrase_ok: bool,
    pub citations: Vec<VerifiedCitation>,
    pub confidence: Confidence,
}

/// A learning objective the learner can tick off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub text: String,
    /// Start of the concept unit the item was generated from
    pub unit_start: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_slide: Option<usize>,
    pub citations: Vec<VerifiedCitation>,
    pub confidence: Confidence,
}

/// One section of a lecture summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarySection {
    pub heading: String,
    pub body: String,
    /// Image references for the export layer to resolve
    #[serde(default)]
    pub image_refs: Vec<String>,
    pub citations: Vec<VerifiedCitation>,
    pub confidence: Confidence,
}

/// Whether a checklist item is covered by the lecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageReport {
    pub item: String,
    pub covered: bool,
    pub explanation: String,
    pub citations: Vec<VerifiedCitation>,
    pub confidence: Confidence,
}

/// Any artifact, for storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "artifact", rename_all = "snake_case")]
pub enum Artifact {
    Answer(Answer),
    Quiz(QuizItem),
    Flashcard(Flashcard),
    Checklist(ChecklistItem),
    Summary(SummarySection),
    Coverage(CoverageReport),
}

impl Artifact {
    pub fn confidence(&self) -> Confidence {
        match self {
            Self::Answer(a) => a.confidence,
            Self::Quiz(q) => q.confidence,
            Self::Flashcard(f) => f.confidence,
            Self::Checklist(c) => c.confidence,
            Self::Summary(s) => s.confidence,
            Self::Coverage(c) => c.confidence,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Answer(_) => "answer",
            Self::Quiz(_) => "quiz",
            Self::Flashcard(_) => "flashcard",
            Self::Checklist(_) => "checklist",
            Self::Summary(_) => "summary",
            Self::Coverage(_) => "coverage",
        }
    }
}

/// A persisted artifact. Lives until the user deletes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub id: String,
    pub lecture_id: LectureId,
    pub created_at: DateTime<Utc>,
    pub artifact: Artifact,
}

impl StoredArtifact {
    pub fn new(lecture_id: LectureId, artifact: Artifact) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            lecture_id,
            created_at: Utc::now(),
            artifact,
        }
    }
}

/// A unit of a batch generation that failed.
#[derive(Debug)]
pub struct UnitFailure {
    /// Index of the concept unit within the batch
    pub unit: usize,
    pub error: crate::Error,
}

/// The outcome of a batch generation: successes plus isolated failures.
#[derive(Debug)]
pub struct Generated<T> {
    pub items: Vec<T>,
    pub failures: Vec<UnitFailure>,
}

impl<T> Generated<T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<T> Default for Generated<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }
}
