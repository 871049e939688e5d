//! The canonical record and its validation.
//!
//! Field names follow the extraction vocabulary. A few fields also accept a
//! machine-friendly spelling (`nb_votants` for `nb votants`, `echele_5` for
//! `echele 5`, ...). Every section is optional: a partial record is valid.

use log::debug;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JSValue;
use snafu::{ensure, ResultExt};

use crate::config::*;
use crate::numeric::parse_voters;

/// The Likert levels of the distribution, in the order they are stored.
pub const LIKERT_LEVELS: [u8; 5] = [5, 4, 3, 2, 1];

// ********* Lenient numeric readers ***********

fn de_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    match Option::<JSValue>::deserialize(d)? {
        None | Some(JSValue::Null) => Ok(None),
        Some(JSValue::Bool(b)) => Err(D::Error::custom(format!(
            "expected a number, found boolean {}",
            b
        ))),
        Some(JSValue::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("number {} is out of range", n))),
        Some(JSValue::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected a number, found {:?}", s))),
        Some(x) => Err(D::Error::custom(format!("expected a number, found {}", x))),
    }
}

fn de_opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    match Option::<JSValue>::deserialize(d)? {
        None | Some(JSValue::Null) => Ok(None),
        Some(JSValue::Bool(b)) => Err(D::Error::custom(format!(
            "expected an integer, found boolean {}",
            b
        ))),
        Some(JSValue::Number(n)) => match (n.as_u64(), n.as_f64()) {
            (Some(x), _) => Ok(Some(x)),
            (None, Some(f)) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
                Ok(Some(f as u64))
            }
            _ => Err(D::Error::custom(format!(
                "expected a non-negative integer, found {}",
                n
            ))),
        },
        Some(JSValue::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected an integer, found {:?}", s))),
        Some(x) => Err(D::Error::custom(format!("expected an integer, found {}", x))),
    }
}

/// Distribution labels are text (`"12 votants"`), numbers are kept as their text.
fn de_opt_label<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    match Option::<JSValue>::deserialize(d)? {
        None | Some(JSValue::Null) => Ok(None),
        Some(JSValue::String(s)) => Ok(Some(s)),
        Some(JSValue::Number(n)) => Ok(Some(n.to_string())),
        Some(x) => Err(D::Error::custom(format!("expected a label, found {}", x))),
    }
}

/// Free-text answers. Null entries are dropped, anything else than text is refused.
fn de_opt_text_list<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<String>>, D::Error> {
    match Option::<Vec<Option<String>>>::deserialize(d)? {
        None => Ok(None),
        Some(l) => Ok(Some(l.into_iter().flatten().collect())),
    }
}

// ********* Shared blocks ***********

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum YesNo {
    #[serde(rename = "oui")]
    Yes,
    #[serde(rename = "non")]
    No,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Levels {
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub totalement: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub en_partie: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub insuffisamment: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub pas_du_tout: Option<f64>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveEntry {
    #[serde(rename = "objectif_label")]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub levels: Option<Levels>,
    #[serde(
        rename = "note_sur_10",
        default,
        deserialize_with = "de_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub score: Option<f64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum MasteryMode {
    #[serde(rename = "4_niveaux")]
    FourLevels,
    #[serde(rename = "notes_sur_10")]
    ScoresOutOf10,
}

/// Read access shared by the three objective-mastery blocks, which only
/// differ by the name of their global score.
pub trait MasteryBlock {
    fn per_objective(&self) -> &[ObjectiveEntry];
    fn global_score(&self) -> Option<f64>;
}

macro_rules! mastery_block {
    ($name:ident, $global_key:literal) => {
        #[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
        pub struct $name {
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub mode: Option<MasteryMode>,
            #[serde(
                rename = "par_objectif",
                default,
                skip_serializing_if = "Option::is_none"
            )]
            pub per_objective: Option<Vec<ObjectiveEntry>>,
            #[serde(
                rename = $global_key,
                default,
                deserialize_with = "de_opt_f64",
                skip_serializing_if = "Option::is_none"
            )]
            pub global_score: Option<f64>,
        }

        impl MasteryBlock for $name {
            fn per_objective(&self) -> &[ObjectiveEntry] {
                self.per_objective.as_deref().unwrap_or(&[])
            }

            fn global_score(&self) -> Option<f64> {
                self.global_score
            }
        }
    };
}

mastery_block!(PreTrainingMastery, "note_globale_objectifs_preformation");
mastery_block!(HotMastery, "note_globale_objectifs_a_chaud");
mastery_block!(ColdMastery, "note_globale_objectifs_a_froid");

// ********* Pre-training ***********

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentToFollow {
    #[serde(
        rename = "nb votants",
        alias = "nb_votants",
        default,
        deserialize_with = "de_opt_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub voters: Option<u64>,
}

/// The wire shape of a distribution item: one key per Likert level.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDistributionItem {
    #[serde(
        rename = "echele 5",
        alias = "echele_5",
        default,
        deserialize_with = "de_opt_label",
        skip_serializing_if = "Option::is_none"
    )]
    pub level_5: Option<String>,
    #[serde(
        rename = "echele 4",
        alias = "echele_4",
        default,
        deserialize_with = "de_opt_label",
        skip_serializing_if = "Option::is_none"
    )]
    pub level_4: Option<String>,
    #[serde(
        rename = "echele 3",
        alias = "echele_3",
        default,
        deserialize_with = "de_opt_label",
        skip_serializing_if = "Option::is_none"
    )]
    pub level_3: Option<String>,
    #[serde(
        rename = "echele 2",
        alias = "echele_2",
        default,
        deserialize_with = "de_opt_label",
        skip_serializing_if = "Option::is_none"
    )]
    pub level_2: Option<String>,
    #[serde(
        rename = "echele 1",
        alias = "echele_1",
        default,
        deserialize_with = "de_opt_label",
        skip_serializing_if = "Option::is_none"
    )]
    pub level_1: Option<String>,
    #[serde(default, deserialize_with = "de_opt_u64", skip_serializing_if = "Option::is_none")]
    pub nb_votants: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub pourcentage: Option<f64>,
}

/// One level of the intent-to-follow distribution.
///
/// Invariant: built from a wire item with exactly one populated level key.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawDistributionItem", into = "RawDistributionItem")]
pub struct DistributionItem {
    /// 5 (best) to 1.
    pub level: u8,
    /// The text stored under the level key, usually `"<n> votants"`.
    pub label: String,
    pub voters: Option<u64>,
    pub percentage: Option<f64>,
}

impl DistributionItem {
    /// The vote count, explicit or read from the label.
    pub fn count(&self) -> Option<u64> {
        self.voters.or_else(|| parse_voters(&self.label))
    }
}

impl TryFrom<RawDistributionItem> for DistributionItem {
    type Error = String;

    fn try_from(raw: RawDistributionItem) -> Result<Self, Self::Error> {
        let populated: Vec<(u8, String)> = [
            (5, raw.level_5),
            (4, raw.level_4),
            (3, raw.level_3),
            (2, raw.level_2),
            (1, raw.level_1),
        ]
        .into_iter()
        .filter_map(|(level, label)| label.map(|l| (level, l)))
        .collect();
        match populated.as_slice() {
            [(level, label)] => Ok(DistributionItem {
                level: *level,
                label: label.clone(),
                voters: raw.nb_votants,
                percentage: raw.pourcentage,
            }),
            _ => Err(format!(
                "each distribution item needs exactly one key among 'echele 5' .. 'echele 1', found {}",
                populated.len()
            )),
        }
    }
}

impl From<DistributionItem> for RawDistributionItem {
    fn from(item: DistributionItem) -> Self {
        let mut raw = RawDistributionItem {
            nb_votants: item.voters,
            pourcentage: item.percentage,
            ..RawDistributionItem::default()
        };
        let slot = match item.level {
            5 => &mut raw.level_5,
            4 => &mut raw.level_4,
            3 => &mut raw.level_3,
            2 => &mut raw.level_2,
            _ => &mut raw.level_1,
        };
        *slot = Some(item.label);
        raw
    }
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreTraining {
    #[serde(
        rename = "volonte_suivi_formation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub intent_to_follow: Option<IntentToFollow>,
    #[serde(
        rename = "souhaitez_vous_suivre_distribution",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub intent_distribution: Option<Vec<DistributionItem>>,
    #[serde(
        rename = "demande_sujets_a_aborder",
        default,
        deserialize_with = "de_opt_text_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub requested_topics: Option<Vec<String>>,
    #[serde(
        rename = "maitrise_objectifs_preformation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub objective_mastery: Option<PreTrainingMastery>,
}

// ********* Hot feedback ***********

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profitability {
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub oui: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub non: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub oui_percent: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub non_percent: Option<f64>,
}

/// The closed set of satisfaction answers.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum SatisfactionLabel {
    #[serde(rename = "Très satisfait(e)")]
    VerySatisfied,
    #[serde(rename = "Satisfait(e)")]
    Satisfied,
    #[serde(rename = "Déçu(e)")]
    Disappointed,
    #[serde(rename = "Sans opinion")]
    NoOpinion,
}

impl SatisfactionLabel {
    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            SatisfactionLabel::VerySatisfied | SatisfactionLabel::Satisfied
        )
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SatisfactionItem {
    pub label: SatisfactionLabel,
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub count: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct HotFeedback {
    #[serde(
        rename = "formation_profitable",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub profitability: Option<Profitability>,
    #[serde(
        rename = "satisfaction_contenu",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub satisfaction: Option<Vec<SatisfactionItem>>,
    #[serde(
        rename = "note_globale_a_chaud",
        default,
        deserialize_with = "de_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub global_score: Option<f64>,
    #[serde(
        rename = "points_forts",
        default,
        deserialize_with = "de_opt_text_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub strengths: Option<Vec<String>>,
    #[serde(
        rename = "points_a_ajuster",
        default,
        deserialize_with = "de_opt_text_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub points_to_adjust: Option<Vec<String>>,
    #[serde(
        rename = "suggestions_complement_sur_formation",
        default,
        deserialize_with = "de_opt_text_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub follow_up_suggestions: Option<Vec<String>>,
    #[serde(
        rename = "appreciations_intervenants",
        default,
        deserialize_with = "de_opt_text_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub facilitator_appreciations: Option<Vec<String>>,
    #[serde(
        rename = "maitrise_objectifs_a_chaud",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub objective_mastery: Option<HotMastery>,
}

// ********* Cold feedback ***********

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColdFeedback {
    #[serde(
        rename = "note_sur_10",
        default,
        deserialize_with = "de_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub global_score: Option<f64>,
    #[serde(
        rename = "maitrise_objectifs_a_froid",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub objective_mastery: Option<ColdMastery>,
    #[serde(
        rename = "elements_les_plus_utiles",
        default,
        deserialize_with = "de_opt_text_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub most_useful: Option<Vec<String>>,
}

// ********* Facilitators ***********

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleAdaptation {
    #[serde(rename = "reponse", default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<YesNo>,
    #[serde(rename = "precisions", default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnplannedContent {
    #[serde(rename = "reponse", default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<YesNo>,
    #[serde(
        rename = "de_quoi_s_agissait_il",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
}

/// Yes/no head counts, as reported by the facilitators.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct YesNoCounts {
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub oui: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub non: Option<f64>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Facilitators {
    #[serde(
        rename = "commentaire_conditions_materielles",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub material_conditions: Option<String>,
    #[serde(
        rename = "commentaire_groupe_apprenants",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub learner_group: Option<String>,
    #[serde(
        rename = "commentaire_organisation_generale",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub general_organization: Option<String>,
    #[serde(
        rename = "adaptation_horaires",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub schedule_adaptation: Option<ScheduleAdaptation>,
    #[serde(
        rename = "precisions_a_noter",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub notes: Option<String>,
    #[serde(
        rename = "explication_modification_programme",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub program_change_explanation: Option<String>,
    #[serde(
        rename = "contenu_non_prevu",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub unplanned_content: Option<UnplannedContent>,
    #[serde(
        rename = "retards_apprenants",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub learner_lateness: Option<YesNoCounts>,
    #[serde(
        rename = "handicap_signale",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub disability_disclosed: Option<YesNoCounts>,
}

// ********* Evaluations ***********

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationResults {
    /// Signed progression on a 0-10 scale.
    #[serde(
        rename = "progression_competences_plus_sur_10",
        default,
        deserialize_with = "de_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub progression_delta: Option<f64>,
}

// ********* The record ***********

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalRecord {
    #[serde(
        rename = "version_prompt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub schema_version: Option<String>,
    #[serde(rename = "Nom formation", alias = "Nom_formation")]
    pub formation_name: String,
    #[serde(rename = " semestre", alias = "semestre")]
    pub semester: String,
    #[serde(rename = "pre_formation", default, skip_serializing_if = "Option::is_none")]
    pub pre_training: Option<PreTraining>,
    #[serde(rename = "a_chaud", default, skip_serializing_if = "Option::is_none")]
    pub hot_feedback: Option<HotFeedback>,
    #[serde(rename = "a_froid", default, skip_serializing_if = "Option::is_none")]
    pub cold_feedback: Option<ColdFeedback>,
    #[serde(rename = "intervenants", default, skip_serializing_if = "Option::is_none")]
    pub facilitators: Option<Facilitators>,
    #[serde(
        rename = "resultats_evaluations",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub evaluation_results: Option<EvaluationResults>,
    #[serde(rename = "meta_extraction", default, skip_serializing_if = "Option::is_none")]
    pub extraction_meta: Option<std::collections::BTreeMap<String, Option<bool>>>,
    #[serde(rename = "lien_vers_formation")]
    pub source_link: String,
}

/// What was found for one of the optional sections.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SectionState {
    Absent,
    Empty,
}

/// Keys that also accept a machine spelling: (display, machine).
const KEY_ALIASES: &[(&str, &str)] = &[
    ("Nom formation", "Nom_formation"),
    (" semestre", "semestre"),
    ("nb votants", "nb_votants"),
    ("echele 5", "echele_5"),
    ("echele 4", "echele_4"),
    ("echele 3", "echele_3"),
    ("echele 2", "echele_2"),
    ("echele 1", "echele_1"),
];

/// Drops the machine spelling of a key wherever the display spelling is also set.
fn drop_shadowed_aliases(js: &mut JSValue) {
    match js {
        JSValue::Object(m) => {
            for (display, machine) in KEY_ALIASES.iter() {
                if m.contains_key(*display) && m.remove(*machine).is_some() {
                    debug!("drop_shadowed_aliases: {:?} shadowed by {:?}", machine, display);
                }
            }
            for v in m.values_mut() {
                drop_shadowed_aliases(v);
            }
        }
        JSValue::Array(l) => {
            for v in l.iter_mut() {
                drop_shadowed_aliases(v);
            }
        }
        _ => {}
    }
}

impl CanonicalRecord {
    /// Reads a mapped payload. Any mismatch rejects the whole record.
    pub fn validate(payload: &JSValue) -> Result<CanonicalRecord, SurveyError> {
        ensure!(payload.is_object(), NotAnObjectSnafu {});
        let mut payload = payload.clone();
        drop_shadowed_aliases(&mut payload);
        let record = CanonicalRecord::deserialize(&payload).context(SchemaViolationSnafu {
            version: SCHEMA_VERSION.to_string(),
        })?;
        debug!(
            "validate: accepted record for {:?} / {:?}",
            record.formation_name, record.semester
        );
        Ok(record)
    }

    /// The record with absent fields left out.
    pub fn to_json(&self) -> JSValue {
        serde_json::to_value(self).unwrap_or(JSValue::Null)
    }

    /// The optional sections that are missing, or present without any field.
    pub fn missing_sections(&self) -> Vec<(&'static str, SectionState)> {
        fn state<T: Serialize>(x: &Option<T>) -> Option<SectionState> {
            match x {
                None => Some(SectionState::Absent),
                Some(v) => match serde_json::to_value(v) {
                    Ok(JSValue::Object(m)) if m.is_empty() => Some(SectionState::Empty),
                    _ => None,
                },
            }
        }
        let all = [
            ("pre_formation", state(&self.pre_training)),
            ("a_chaud", state(&self.hot_feedback)),
            ("a_froid", state(&self.cold_feedback)),
            ("intervenants", state(&self.facilitators)),
            ("resultats_evaluations", state(&self.evaluation_results)),
        ];
        all.into_iter()
            .filter_map(|(name, s)| s.map(|s| (name, s)))
            .collect()
    }
}

/// The file name under which a canonical record is kept: `AFGSU_1_S1_2025.json`.
pub fn canonical_file_name(formation_name: &str, semester: &str) -> String {
    format!(
        "{}_{}.json",
        formation_name.trim().replace(' ', "_"),
        semester.trim().replace(' ', "_")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> JSValue {
        json!({
            "Nom formation": "AFGSU 1",
            " semestre": "S1 2025",
            "lien_vers_formation": "rapport.pdf"
        })
    }

    #[test]
    fn partial_record_is_valid() {
        let r = CanonicalRecord::validate(&minimal()).unwrap();
        assert_eq!(r.formation_name, "AFGSU 1");
        assert!(r.pre_training.is_none());
        assert_eq!(r.missing_sections().len(), 5);
    }

    #[test]
    fn machine_names_are_accepted() {
        let r = CanonicalRecord::validate(&json!({
            "Nom_formation": "AFGSU 2",
            "semestre": "S2",
            "lien_vers_formation": "x.pdf",
            "pre_formation": {"volonte_suivi_formation": {"nb_votants": "12"}}
        }))
        .unwrap();
        assert_eq!(r.semester, "S2");
        let pre = r.pre_training.unwrap();
        assert_eq!(pre.intent_to_follow.unwrap().voters, Some(12));
    }

    #[test]
    fn both_spellings_keep_the_display_one() {
        let mut p = minimal();
        p["semestre"] = json!("S9");
        p["pre_formation"] = json!({
            "volonte_suivi_formation": {"nb votants": 20, "nb_votants": 19},
            "souhaitez_vous_suivre_distribution": [
                {"echele 5": "3 votants", "echele_5": "2 votants", "pourcentage": 15}
            ]
        });
        let r = CanonicalRecord::validate(&p).unwrap();
        assert_eq!(r.semester, "S1 2025");
        let pre = r.pre_training.unwrap();
        assert_eq!(pre.intent_to_follow.unwrap().voters, Some(20));
        let dist = pre.intent_distribution.unwrap();
        assert_eq!(dist[0].level, 5);
        assert_eq!(dist[0].count(), Some(3));
    }

    #[test]
    fn missing_identity_is_rejected() {
        let mut p = minimal();
        p.as_object_mut().unwrap().remove("lien_vers_formation");
        assert!(matches!(
            CanonicalRecord::validate(&p),
            Err(SurveyError::SchemaViolation { .. })
        ));
        assert!(matches!(
            CanonicalRecord::validate(&json!([1, 2])),
            Err(SurveyError::NotAnObject {})
        ));
    }

    #[test]
    fn distribution_needs_exactly_one_level() {
        let mut p = minimal();
        p["pre_formation"] = json!({"souhaitez_vous_suivre_distribution": [
            {"echele 5": "3 votants", "echele 4": "1 votants", "pourcentage": 10}
        ]});
        assert!(CanonicalRecord::validate(&p).is_err());

        p["pre_formation"] = json!({"souhaitez_vous_suivre_distribution": [{"pourcentage": 10}]});
        assert!(CanonicalRecord::validate(&p).is_err());

        p["pre_formation"] = json!({"souhaitez_vous_suivre_distribution": [
            {"echele_3": "3 votants", "pourcentage": "10.5"}
        ]});
        let r = CanonicalRecord::validate(&p).unwrap();
        let dist = r.pre_training.unwrap().intent_distribution.unwrap();
        assert_eq!(dist[0].level, 3);
        assert_eq!(dist[0].count(), Some(3));
        assert_eq!(dist[0].percentage, Some(10.5));
    }

    #[test]
    fn numbers_are_checked() {
        let mut p = minimal();
        p["a_chaud"] = json!({"note_globale_a_chaud": true});
        assert!(CanonicalRecord::validate(&p).is_err());

        p["a_chaud"] = json!({"note_globale_a_chaud": "huit"});
        assert!(CanonicalRecord::validate(&p).is_err());

        p["a_chaud"] = json!({"note_globale_a_chaud": "8.5"});
        let r = CanonicalRecord::validate(&p).unwrap();
        assert_eq!(r.hot_feedback.unwrap().global_score, Some(8.5));

        p["a_chaud"] = serde_json::Value::Null;
        p["pre_formation"] = json!({"volonte_suivi_formation": {"nb votants": 12.5}});
        assert!(CanonicalRecord::validate(&p).is_err());
        p["pre_formation"] = json!({"volonte_suivi_formation": {"nb votants": false}});
        assert!(CanonicalRecord::validate(&p).is_err());
    }

    #[test]
    fn satisfaction_labels_are_closed() {
        let mut p = minimal();
        p["a_chaud"] = json!({"satisfaction_contenu": [{"label": "Ravi(e)", "count": 2}]});
        assert!(CanonicalRecord::validate(&p).is_err());

        p["a_chaud"] = json!({"satisfaction_contenu": [{"label": "Déçu(e)", "count": 2}]});
        let r = CanonicalRecord::validate(&p).unwrap();
        let items = r.hot_feedback.unwrap().satisfaction.unwrap();
        assert_eq!(items[0].label, SatisfactionLabel::Disappointed);
    }

    #[test]
    fn null_answers_are_dropped() {
        let mut p = minimal();
        p["a_froid"] = json!({"elements_les_plus_utiles": ["gestes", null, "bilan"]});
        let r = CanonicalRecord::validate(&p).unwrap();
        assert_eq!(
            r.cold_feedback.unwrap().most_useful.unwrap(),
            vec!["gestes".to_string(), "bilan".to_string()]
        );
    }

    #[test]
    fn empty_section_is_reported() {
        let mut p = minimal();
        p["a_froid"] = json!({});
        p["a_chaud"] = json!({"note_globale_a_chaud": 7});
        let r = CanonicalRecord::validate(&p).unwrap();
        let missing = r.missing_sections();
        assert!(missing.contains(&("a_froid", SectionState::Empty)));
        assert!(missing.contains(&("pre_formation", SectionState::Absent)));
        assert!(!missing.iter().any(|(n, _)| *n == "a_chaud"));
    }

    #[test]
    fn canonical_json_uses_display_names() {
        let mut p = minimal();
        p["pre_formation"] = json!({"souhaitez_vous_suivre_distribution": [
            {"echele_5": "4 votants", "pourcentage": null}
        ]});
        let r = CanonicalRecord::validate(&p).unwrap();
        let js = r.to_json();
        assert_eq!(js["Nom formation"], json!("AFGSU 1"));
        assert_eq!(
            js["pre_formation"]["souhaitez_vous_suivre_distribution"][0],
            json!({"echele 5": "4 votants"})
        );
        assert!(js.get("a_chaud").is_none());
    }

    #[test]
    fn file_name() {
        assert_eq!(
            canonical_file_name(" AFGSU 1 ", "S1 2025"),
            "AFGSU_1_S1_2025.json"
        );
    }
}
