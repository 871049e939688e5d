//! Computes every column of the spreadsheet row from a canonical record.
//!
//! Numeric columns are computed by rules only. Free-text columns are filtered
//! first and only reach the summarizer when something is left. A column that
//! cannot be filled takes one of two sentinels: `NO_DATA` for numbers,
//! `NO_REMARKS` (or `NO_TOPIC`) for text.

use log::debug;
use serde_json::Value as JSValue;

use crate::config::*;
use crate::numeric::{
    format_progression, format_score, intent_summary, mean_score_over_10, round_int, safe_number,
};
use crate::schema::*;
use crate::text::{clean_list, is_noise, summarize_text};

const LIST_INSTRUCTION: &str = "Rédige un résumé concis, professionnel et médicalisé (1 à 2 phrases maximum), \
sans puces, sans listes, sans redondances. Ne crée aucune information non présente.";

const TOPICS_INSTRUCTION: &str = "À partir de la liste suivante, rédige un résumé concis (1 à 2 phrases maximum) \
mettant en avant uniquement les thèmes médicaux ou de formation évoqués. \
commence par la phrase : Parmi les demandes de sujet a abordées, il y a. \
Ne mentionne jamais les noms de personnes. Utilise un vocabulaire professionnel et médical, \
sans puces ni redondances.";

const PROSE_INSTRUCTION: &str = "À partir de ce texte brut, rédige une synthèse courte et professionnelle, \
vocabulaire médical, sans listes, en 1 à 2 phrases.";

/// Separator of the requested topics when they are rendered as a list.
pub const TOPIC_SEPARATOR: &str = " • ";

fn list_prompt(instruction: &str, title: &str, items: &[String]) -> String {
    format!(
        "{}\n\nThème: {}\nÉléments bruts:\n- {}",
        instruction,
        title,
        items.join("\n- ")
    )
}

fn prose_prompt(title: &str, text: &str) -> String {
    format!("{}\n\nThème: {}\n\nTexte:\n{}", PROSE_INSTRUCTION, title, text)
}

/// Summarizes a free-text list under a topic title. Nothing is sent when
/// filtering leaves the list empty.
pub fn summarize_list(summarizer: &dyn Summarizer, title: &str, items: &[String]) -> String {
    let clean = clean_list(items);
    if clean.is_empty() {
        debug!("summarize_list: {}: nothing left after filtering", title);
        return NO_REMARKS.to_string();
    }
    debug!("summarize_list: {}: {} items", title, clean.len());
    let res = summarize_text(summarizer, &list_prompt(LIST_INSTRUCTION, title, &clean));
    if res.is_empty() {
        NO_REMARKS.to_string()
    } else {
        res
    }
}

/// Writes a short synthesis of a prose span. Blank spans are not sent.
pub fn synthesize_from_text(summarizer: &dyn Summarizer, title: &str, text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        debug!("synthesize_from_text: {}: empty text", title);
        return NO_REMARKS.to_string();
    }
    let res = summarize_text(summarizer, &prose_prompt(title, text));
    if res.is_empty() {
        NO_REMARKS.to_string()
    } else {
        res
    }
}

/// The share of positive answers ("Très satisfait(e)" and "Satisfait(e)").
///
/// Computed from the counts. When no item carries a count, the percentages
/// of the positive labels are added instead.
pub fn satisfaction_ratio(items: &[SatisfactionItem]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let total: f64 = items.iter().map(|i| safe_number(&i.count)).sum();
    if total == 0.0 {
        let pct: f64 = items
            .iter()
            .filter(|i| i.label.is_positive())
            .map(|i| safe_number(&i.percent))
            .sum();
        debug!("satisfaction_ratio: no counts, using percentages: {}", pct);
        return Some(format!("{} %", round_int(pct)));
    }
    let positive: f64 = items
        .iter()
        .filter(|i| i.label.is_positive())
        .map(|i| safe_number(&i.count))
        .sum();
    Some(format!("{} %", round_int(100.0 * positive / total)))
}

pub fn profitability_percent(profitability: &Profitability) -> Option<String> {
    profitability
        .oui_percent
        .map(|p| format!("{} %", round_int(p)))
}

/// Mean of the per-objective scores, else the global score of the block.
fn mastery_column<M: MasteryBlock>(block: Option<&M>) -> String {
    block
        .and_then(|b| {
            mean_score_over_10(b.per_objective()).or_else(|| format_score(b.global_score()))
        })
        .unwrap_or_else(|| NO_DATA.to_string())
}

fn or_no_data(x: Option<String>) -> String {
    x.unwrap_or_else(|| NO_DATA.to_string())
}

fn opt_list(l: &Option<Vec<String>>) -> &[String] {
    l.as_deref().unwrap_or(&[])
}

fn trimmed(s: &Option<String>) -> &str {
    s.as_deref().map(|s| s.trim()).unwrap_or("")
}

/// The schedule adaptation as JSON text, or nothing if the block carries no field.
fn schedule_text(schedule: Option<&ScheduleAdaptation>) -> String {
    match schedule.map(serde_json::to_value) {
        Some(Ok(JSValue::Object(m))) if !m.is_empty() => JSValue::Object(m).to_string(),
        _ => "".to_string(),
    }
}

/// Joins the informative spans; noise such as a lone "RAS" is left out.
fn join_spans(spans: &[&str]) -> String {
    spans
        .iter()
        .map(|s| s.trim())
        .filter(|s| !is_noise(s))
        .collect::<Vec<&str>>()
        .join(" ")
}

struct Derivation<'a> {
    record: &'a CanonicalRecord,
    options: &'a DeriveOptions,
    summarizer: &'a dyn Summarizer,
}

impl<'a> Derivation<'a> {
    fn pre(&self) -> Option<&'a PreTraining> {
        self.record.pre_training.as_ref()
    }

    fn hot(&self) -> Option<&'a HotFeedback> {
        self.record.hot_feedback.as_ref()
    }

    fn cold(&self) -> Option<&'a ColdFeedback> {
        self.record.cold_feedback.as_ref()
    }

    fn facilitators(&self) -> Option<&'a Facilitators> {
        self.record.facilitators.as_ref()
    }

    fn intent(&self) -> String {
        let pre = match self.pre() {
            Some(pre) => pre,
            None => return NO_DATA.to_string(),
        };
        let dist = pre.intent_distribution.as_deref().unwrap_or(&[]);
        let total = pre.intent_to_follow.as_ref().and_then(|i| i.voters);
        or_no_data(intent_summary(dist, total))
    }

    fn requested_topics(&self) -> String {
        let raw = self.pre().map(|p| opt_list(&p.requested_topics)).unwrap_or(&[]);
        let topics = clean_list(raw);
        if topics.is_empty() {
            debug!("requested_topics: no topic left after filtering");
            return NO_TOPIC.to_string();
        }
        match self.options.topics_mode {
            TopicsMode::List => topics.join(TOPIC_SEPARATOR),
            TopicsMode::Sentence => {
                let prompt = list_prompt(
                    TOPICS_INSTRUCTION,
                    "Demande particulière de sujet à aborder",
                    &topics,
                );
                let res = summarize_text(self.summarizer, &prompt);
                if res.is_empty() {
                    NO_TOPIC.to_string()
                } else {
                    res
                }
            }
        }
    }

    fn hot_list(&self, title: &str, f: impl Fn(&HotFeedback) -> &Option<Vec<String>>) -> String {
        let items = self.hot().map(|h| opt_list(f(h))).unwrap_or(&[]);
        summarize_list(self.summarizer, title, items)
    }

    fn reported_issues(&self) -> String {
        let text = match self.facilitators() {
            Some(f) => join_spans(&[
                trimmed(&f.material_conditions),
                trimmed(&f.learner_group),
                trimmed(&f.general_organization),
            ]),
            None => "".to_string(),
        };
        synthesize_from_text(self.summarizer, "Problématiques remontées", &text)
    }

    fn program_adaptations(&self) -> String {
        let text = match self.facilitators() {
            Some(f) => join_spans(&[
                schedule_text(f.schedule_adaptation.as_ref()).as_str(),
                trimmed(&f.program_change_explanation),
            ]),
            None => "".to_string(),
        };
        synthesize_from_text(self.summarizer, "Adaptations de programme", &text)
    }

    fn column(&self, column: Column) -> String {
        match column {
            Column::Formation => self.record.formation_name.trim().to_string(),
            Column::Semester => self.record.semester.trim().to_string(),
            Column::IntentToFollow => self.intent(),
            Column::RequestedTopics => self.requested_topics(),
            Column::PreTrainingSelfAssessment => {
                mastery_column(self.pre().and_then(|p| p.objective_mastery.as_ref()))
            }
            Column::Profitable => or_no_data(
                self.hot()
                    .and_then(|h| h.profitability.as_ref())
                    .and_then(profitability_percent),
            ),
            Column::ContentSatisfaction => or_no_data(
                self.hot()
                    .and_then(|h| h.satisfaction.as_deref())
                    .and_then(satisfaction_ratio),
            ),
            Column::HotScore => or_no_data(format_score(self.hot().and_then(|h| h.global_score))),
            Column::Strengths => self.hot_list("Points forts", |h| &h.strengths),
            Column::PointsToAdjust => self.hot_list("Points faibles", |h| &h.points_to_adjust),
            Column::FollowUpTopics => self.hot_list("Sujets non traités / à re-boucler", |h| {
                &h.follow_up_suggestions
            }),
            Column::FacilitatorEvaluation => {
                self.hot_list("Évaluation formateurs", |h| &h.facilitator_appreciations)
            }
            Column::HotSelfAssessment => {
                mastery_column(self.hot().and_then(|h| h.objective_mastery.as_ref()))
            }
            Column::ColdScore => or_no_data(format_score(self.cold().and_then(|c| c.global_score))),
            Column::ProgressSelfAssessment => {
                mastery_column(self.cold().and_then(|c| c.objective_mastery.as_ref()))
            }
            Column::ImpactProgression => or_no_data(format_progression(
                self.record
                    .evaluation_results
                    .as_ref()
                    .and_then(|e| e.progression_delta),
            )),
            Column::WithHindsight => {
                let items = self.cold().map(|c| opt_list(&c.most_useful)).unwrap_or(&[]);
                summarize_list(self.summarizer, "Avec le recul", items)
            }
            Column::ReportedIssues => self.reported_issues(),
            Column::ProgramAdaptations => self.program_adaptations(),
            Column::Synthesis | Column::ReportLink | Column::CorrectiveActions => "".to_string(),
        }
    }
}

/// Builds the spreadsheet row of a record.
///
/// Columns are computed in display order, so summarizer calls always happen
/// in the same order for the same record.
pub fn derive_row(
    record: &CanonicalRecord,
    options: &DeriveOptions,
    summarizer: &dyn Summarizer,
) -> DerivedRow {
    debug!(
        "derive_row: {:?} / {:?} options: {:?}",
        record.formation_name, record.semester, options
    );
    let d = Derivation {
        record,
        options,
        summarizer,
    };
    DerivedRow::from_fn(|c| d.column(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    struct FakeSummarizer {
        reply: JSValue,
        calls: RefCell<Vec<String>>,
    }

    impl FakeSummarizer {
        fn new(reply: JSValue) -> FakeSummarizer {
            FakeSummarizer {
                reply,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Summarizer for FakeSummarizer {
        fn summarize(&self, instruction: &str) -> Result<JSValue, SurveyError> {
            self.calls.borrow_mut().push(instruction.to_string());
            Ok(self.reply.clone())
        }
    }

    fn record(extra: JSValue) -> CanonicalRecord {
        let mut payload = json!({
            "Nom formation": " AFGSU 1 ",
            " semestre": "S1 2025",
            "lien_vers_formation": "rapport.pdf"
        });
        if let (JSValue::Object(m), JSValue::Object(e)) = (&mut payload, extra) {
            m.extend(e);
        }
        CanonicalRecord::validate(&payload).unwrap()
    }

    #[test]
    fn empty_record_gives_sentinels() {
        let s = FakeSummarizer::new(json!("unused"));
        let row = derive_row(&record(json!({})), &DeriveOptions::DEFAULT_OPTIONS, &s);
        assert!(s.calls.borrow().is_empty());
        assert_eq!(row.get(Column::Formation), "AFGSU 1");
        assert_eq!(row.get(Column::IntentToFollow), NO_DATA);
        assert_eq!(row.get(Column::RequestedTopics), NO_TOPIC);
        assert_eq!(row.get(Column::ContentSatisfaction), NO_DATA);
        assert_eq!(row.get(Column::ImpactProgression), NO_DATA);
        assert_eq!(row.get(Column::Strengths), NO_REMARKS);
        assert_eq!(row.get(Column::ReportedIssues), NO_REMARKS);
        assert_eq!(row.get(Column::ProgramAdaptations), NO_REMARKS);
        for c in Column::ALL.iter().filter(|c| c.is_reserved()) {
            assert_eq!(row.get(*c), "");
        }
    }

    #[test]
    fn stoplisted_text_is_never_sent() {
        let s = FakeSummarizer::new(json!("Résumé."));
        let row = derive_row(
            &record(json!({"a_chaud": {"points_forts": ["RAS", "-"]}})),
            &DeriveOptions::DEFAULT_OPTIONS,
            &s,
        );
        assert_eq!(row.get(Column::Strengths), NO_REMARKS);
        assert!(s.calls.borrow().is_empty());
    }

    #[test]
    fn list_prompt_carries_title_and_items() {
        let s = FakeSummarizer::new(json!({"résumé": "Formation très appréciée."}));
        let row = derive_row(
            &record(json!({"a_chaud": {"points_forts": ["Pratique", "pratique", "Mannequins"]}})),
            &DeriveOptions::DEFAULT_OPTIONS,
            &s,
        );
        assert_eq!(row.get(Column::Strengths), "Formation très appréciée.");
        let calls = s.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains("Thème: Points forts"));
        assert!(calls[0].ends_with("Éléments bruts:\n- Pratique\n- Mannequins"));
    }

    #[test]
    fn failing_summarizer_degrades_to_sentinel() {
        let row = derive_row(
            &record(json!({
                "a_froid": {"elements_les_plus_utiles": ["Les cas pratiques"]},
                "intervenants": {"commentaire_groupe_apprenants": "Groupe hétérogène"}
            })),
            &DeriveOptions::DEFAULT_OPTIONS,
            &NoSummarizer,
        );
        assert_eq!(row.get(Column::WithHindsight), NO_REMARKS);
        assert_eq!(row.get(Column::ReportedIssues), NO_REMARKS);
    }

    #[test]
    fn numeric_columns() {
        let row = derive_row(
            &record(json!({
                "pre_formation": {
                    "volonte_suivi_formation": {"nb votants": 20},
                    "souhaitez_vous_suivre_distribution": [
                        {"echele 5": "10 votants", "pourcentage": 50.0},
                        {"echele 4": "5 votants", "pourcentage": 25.0},
                        {"echele 3": "3 votants", "pourcentage": 15.0},
                        {"echele 2": "1 votants", "pourcentage": 5.0},
                        {"echele 1": "1 votants", "pourcentage": 5.0}
                    ],
                    "maitrise_objectifs_preformation": {
                        "mode": "notes_sur_10",
                        "par_objectif": [
                            {"objectif_label": "A", "note_sur_10": 8},
                            {"objectif_label": "B", "note_sur_10": 6},
                            {"objectif_label": "C", "note_sur_10": null}
                        ]
                    }
                },
                "a_chaud": {
                    "formation_profitable": {"oui_percent": 92.5},
                    "satisfaction_contenu": [
                        {"label": "Très satisfait(e)", "count": 6},
                        {"label": "Satisfait(e)", "count": 2},
                        {"label": "Déçu(e)", "count": 1},
                        {"label": "Sans opinion", "count": 0}
                    ],
                    "note_globale_a_chaud": 8.46,
                    "maitrise_objectifs_a_chaud": {"note_globale_objectifs_a_chaud": 7}
                },
                "a_froid": {"note_sur_10": "9"},
                "resultats_evaluations": {"progression_competences_plus_sur_10": 1.25}
            })),
            &DeriveOptions::DEFAULT_OPTIONS,
            &NoSummarizer,
        );
        assert_eq!(
            row.get(Column::IntentToFollow),
            "75 % favorables, 15 % neutre, 10 % non favorables"
        );
        assert_eq!(row.get(Column::PreTrainingSelfAssessment), "7.0/10");
        assert_eq!(row.get(Column::Profitable), "92 %");
        assert_eq!(row.get(Column::ContentSatisfaction), "89 %");
        assert_eq!(row.get(Column::HotScore), "8.5/10");
        assert_eq!(row.get(Column::HotSelfAssessment), "7.0/10");
        assert_eq!(row.get(Column::ColdScore), "9.0/10");
        assert_eq!(row.get(Column::ProgressSelfAssessment), NO_DATA);
        assert_eq!(row.get(Column::ImpactProgression), "+1.25/10");
    }

    #[test]
    fn satisfaction_from_percentages() {
        let items: Vec<SatisfactionItem> = serde_json::from_value(json!([
            {"label": "Très satisfait(e)", "percent": 60.4},
            {"label": "Satisfait(e)", "percent": 30},
            {"label": "Déçu(e)", "percent": 9.6}
        ]))
        .unwrap();
        assert_eq!(satisfaction_ratio(&items).as_deref(), Some("90 %"));
        assert_eq!(satisfaction_ratio(&[]), None);
    }

    #[test]
    fn topics_as_list_or_sentence() {
        let r = record(json!({"pre_formation": {
            "demande_sujets_a_aborder": ["Pédiatrie", "ras", "Brûlures", "pédiatrie"]
        }}));
        let s = FakeSummarizer::new(json!(
            "Parmi les demandes de sujet a abordées, il y a la pédiatrie."
        ));
        let row = derive_row(&r, &DeriveOptions::DEFAULT_OPTIONS, &s);
        assert_eq!(row.get(Column::RequestedTopics), "Pédiatrie • Brûlures");
        assert!(s.calls.borrow().is_empty());

        let sentence = DeriveOptions {
            topics_mode: TopicsMode::Sentence,
        };
        let row = derive_row(&r, &sentence, &s);
        assert_eq!(
            row.get(Column::RequestedTopics),
            "Parmi les demandes de sujet a abordées, il y a la pédiatrie."
        );
        let calls = s.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains("Ne mentionne jamais les noms de personnes."));
        assert!(calls[0].contains("Thème: Demande particulière de sujet à aborder"));
    }

    #[test]
    fn prose_columns() {
        let s = FakeSummarizer::new(json!("Synthèse."));
        let row = derive_row(
            &record(json!({"intervenants": {
                "commentaire_conditions_materielles": "  Salle trop petite ",
                "commentaire_organisation_generale": "Retard au démarrage",
                "adaptation_horaires": {"reponse": "oui", "precisions": "Fin à 16h"}
            }})),
            &DeriveOptions::DEFAULT_OPTIONS,
            &s,
        );
        assert_eq!(row.get(Column::ReportedIssues), "Synthèse.");
        assert_eq!(row.get(Column::ProgramAdaptations), "Synthèse.");
        let calls = s.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].ends_with("Texte:\nSalle trop petite Retard au démarrage"));
        assert!(calls[1].contains("Thème: Adaptations de programme"));
        assert!(calls[1].contains(r#""precisions":"Fin à 16h""#));
    }

    #[test]
    fn noise_spans_are_not_sent() {
        let s = FakeSummarizer::new(json!("Synthèse."));
        let row = derive_row(
            &record(json!({"intervenants": {
                "commentaire_conditions_materielles": "RAS",
                "commentaire_groupe_apprenants": " néant ",
                "explication_modification_programme": "Ajout d'un atelier garrot",
                "adaptation_horaires": {}
            }})),
            &DeriveOptions::DEFAULT_OPTIONS,
            &s,
        );
        assert_eq!(row.get(Column::ReportedIssues), NO_REMARKS);
        assert_eq!(row.get(Column::ProgramAdaptations), "Synthèse.");
        let calls = s.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].ends_with("Texte:\nAjout d'un atelier garrot"));
    }

    #[test]
    fn empty_schedule_block_is_not_sent() {
        let s = FakeSummarizer::new(json!("Synthèse."));
        let row = derive_row(
            &record(json!({"intervenants": {"adaptation_horaires": {}}})),
            &DeriveOptions::DEFAULT_OPTIONS,
            &s,
        );
        assert_eq!(row.get(Column::ProgramAdaptations), NO_REMARKS);
        assert!(s.calls.borrow().is_empty());
    }

    #[test]
    fn row_json_has_every_header() {
        let row = derive_row(&record(json!({})), &DeriveOptions::DEFAULT_OPTIONS, &NoSummarizer);
        let columns: Vec<Column> = row.iter().map(|(c, _)| c).collect();
        assert_eq!(columns, Column::ALL.to_vec());
        let js = row.to_json();
        let m = js.as_object().unwrap();
        assert_eq!(m.len(), Column::ALL.len() + 1);
        let keys: Vec<&String> = m.keys().collect();
        assert_eq!(keys[0], "Formation");
        assert_eq!(keys[21], "Actions correctrices");
        assert_eq!(js[META_KEY]["auteur"], json!("IA pro CESU"));
    }
}
