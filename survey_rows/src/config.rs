use serde::Serialize;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use snafu::Snafu;

// ********* Sentinels **********

/// The schema version stamped on every mapped payload.
pub const SCHEMA_VERSION: &str = "v2.1";

/// Placeholder for a numeric column that could not be computed.
pub const NO_DATA: &str = "Données indisponibles";

/// Placeholder for a free-text column with nothing left to summarize.
pub const NO_REMARKS: &str = "Aucune remarque – les données indiquent l’absence d’informations.";

/// Placeholder for the requested-topics column when no topic survives filtering.
pub const NO_TOPIC: &str = "Aucune remarque.";

// ********* Input data structures ***********

/// The identity of a session. These fields are always written into the raw
/// payload before it gets mapped, whatever the extraction returned for them.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SessionIdentity {
    pub formation_name: String,
    pub semester: String,
    pub source_link: String,
}

/// How the requested topics are rendered in the output row.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TopicsMode {
    /// The filtered topics, joined as a bullet list.
    List,
    /// One sentence written by the summarizer.
    Sentence,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DeriveOptions {
    pub topics_mode: TopicsMode,
}

impl DeriveOptions {
    pub const DEFAULT_OPTIONS: DeriveOptions = DeriveOptions {
        topics_mode: TopicsMode::List,
    };
}

// ********* Summarization **********

/// A text summarization service.
///
/// The reply is deliberately untyped: a sentence, a mapping with a summary
/// key, or a sequence are all accepted. Any error is absorbed by the caller
/// and turned into a placeholder, it never fails a row.
pub trait Summarizer {
    fn summarize(&self, instruction: &str) -> Result<JSValue, SurveyError>;
}

/// A summarizer that always declines. Every AI-backed column then falls
/// back to its placeholder.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct NoSummarizer;

impl Summarizer for NoSummarizer {
    fn summarize(&self, _instruction: &str) -> Result<JSValue, SurveyError> {
        Err(SurveyError::Summarizer {
            message: "summarization is disabled".to_string(),
        })
    }
}

// ******** Output data structures *********

/// The fixed set of columns of the consolidated spreadsheet, in display order.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Column {
    Formation,
    Semester,
    IntentToFollow,
    RequestedTopics,
    PreTrainingSelfAssessment,
    Profitable,
    ContentSatisfaction,
    HotScore,
    Strengths,
    PointsToAdjust,
    FollowUpTopics,
    FacilitatorEvaluation,
    HotSelfAssessment,
    ColdScore,
    ProgressSelfAssessment,
    ImpactProgression,
    WithHindsight,
    ReportedIssues,
    ProgramAdaptations,
    Synthesis,
    ReportLink,
    CorrectiveActions,
}

impl Column {
    pub const ALL: [Column; 22] = [
        Column::Formation,
        Column::Semester,
        Column::IntentToFollow,
        Column::RequestedTopics,
        Column::PreTrainingSelfAssessment,
        Column::Profitable,
        Column::ContentSatisfaction,
        Column::HotScore,
        Column::Strengths,
        Column::PointsToAdjust,
        Column::FollowUpTopics,
        Column::FacilitatorEvaluation,
        Column::HotSelfAssessment,
        Column::ColdScore,
        Column::ProgressSelfAssessment,
        Column::ImpactProgression,
        Column::WithHindsight,
        Column::ReportedIssues,
        Column::ProgramAdaptations,
        Column::Synthesis,
        Column::ReportLink,
        Column::CorrectiveActions,
    ];

    /// The exact header string. Spreadsheet writers match on it byte for byte.
    pub fn header(&self) -> &'static str {
        match self {
            Column::Formation => "Formation",
            Column::Semester => "Semestre",
            Column::IntentToFollow => "Volonté de suivre cette session",
            Column::RequestedTopics => "Demande particulière de sujet à aborder",
            Column::PreTrainingSelfAssessment => "AutoEvaluation compétence pré-formation",
            Column::Profitable => "formation Profitable",
            Column::ContentSatisfaction => "Satisfaction du contenu",
            Column::HotScore => "Note /10 à chaud",
            Column::Strengths => "Points forts",
            Column::PointsToAdjust => "Points faibles",
            Column::FollowUpTopics => {
                "Sujets non traité à reboucler avec formateur ou nouvelle formation ou attendu"
            }
            Column::FacilitatorEvaluation => "Evaluation formateurs",
            Column::HotSelfAssessment => "Autoanalyse compétence",
            Column::ColdScore => "Note /10 à froid",
            Column::ProgressSelfAssessment => "Auto-analyse progression",
            Column::ImpactProgression => "Impact / Progression des compétences",
            Column::WithHindsight => "Avec le recul",
            Column::ReportedIssues => "Problématiques remontées",
            Column::ProgramAdaptations => "Adaptations de programme",
            Column::Synthesis => "Synthese",
            Column::ReportLink => "Lien du rapport qualité",
            Column::CorrectiveActions => "Actions correctrices",
        }
    }

    /// Columns left blank for manual entry downstream.
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            Column::Synthesis | Column::ReportLink | Column::CorrectiveActions
        )
    }
}

/// Authorship tag attached to every generated row.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct GenerationMeta {
    #[serde(rename = "auteur")]
    pub author: String,
    pub mode: String,
}

impl Default for GenerationMeta {
    fn default() -> Self {
        GenerationMeta {
            author: "IA pro CESU".to_string(),
            mode: "rédaction médicale harmonisée".to_string(),
        }
    }
}

/// The key under which the generation metadata is emitted next to the columns.
pub const META_KEY: &str = "meta_generation";

/// One spreadsheet row. Every column of `Column::ALL` is present exactly once.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DerivedRow {
    cells: Vec<(Column, String)>,
    pub meta: GenerationMeta,
}

impl DerivedRow {
    /// Builds a row from a lookup function. The lookup is called once per column.
    pub fn from_fn(mut f: impl FnMut(Column) -> String) -> DerivedRow {
        DerivedRow {
            cells: Column::ALL.iter().map(|c| (*c, f(*c))).collect(),
            meta: GenerationMeta::default(),
        }
    }

    pub fn get(&self, column: Column) -> &str {
        self.iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v)
            .unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = (Column, &str)> {
        self.cells.iter().map(|(c, v)| (*c, v.as_str()))
    }

    /// The flat mapping handed to spreadsheet writers, headers as keys.
    pub fn to_json(&self) -> JSValue {
        let mut m: JSMap<String, JSValue> = JSMap::new();
        for (c, v) in self.iter() {
            m.insert(c.header().to_string(), JSValue::String(v.to_string()));
        }
        m.insert(
            META_KEY.to_string(),
            serde_json::to_value(&self.meta).unwrap_or(JSValue::Null),
        );
        JSValue::Object(m)
    }
}

// ********* Errors **********

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SurveyError {
    /// The payload cannot be read as a canonical record. The whole record is rejected.
    #[snafu(display("payload does not follow the {version} schema: {source}"))]
    SchemaViolation {
        version: String,
        source: serde_json::Error,
    },
    #[snafu(display("payload is not a JSON object"))]
    NotAnObject {},
    /// Returned by summarization services. Never escapes the derivation engine.
    #[snafu(display("summarizer failed: {message}"))]
    Summarizer { message: String },
}
