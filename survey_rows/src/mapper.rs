//! Brings an extraction payload into the canonical shape.
//!
//! The extraction model answers either with the current layout or with the
//! older freeform one. The payload is classified once, up front, and only a
//! legacy payload is restructured. Two normalization passes then run on both
//! kinds, and the result is stamped with the current schema version.

use log::{debug, info};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;

use crate::config::*;
use crate::numeric::{format_voters, parse_voters, round_to, safe_float};
use crate::schema::LIKERT_LEVELS;

/// The layout of an incoming payload.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum PayloadShape {
    /// Already keyed like the canonical record.
    AlreadyCanonical,
    /// The first extraction layout (`souhaitez_vous_suivre`, `profitable`, ...).
    LegacyV1,
}

/// A payload in canonical layout, not validated yet.
#[derive(PartialEq, Debug, Clone)]
pub struct MappedPayload {
    pub shape: PayloadShape,
    pub payload: JSValue,
}

/// Satisfaction labels as they are sometimes spelled by the extraction.
const SATISFACTION_VARIANTS: [(&str, &str); 7] = [
    ("Très satisfait-e", "Très satisfait(e)"),
    ("Tres satisfait(e)", "Très satisfait(e)"),
    ("Satisfait-e", "Satisfait(e)"),
    ("Déçu-e", "Déçu(e)"),
    ("Deçu(e)", "Déçu(e)"),
    ("Sans-opinion", "Sans opinion"),
    ("Sans opinion ", "Sans opinion"),
];

pub fn classify_payload(raw: &JSValue) -> PayloadShape {
    match raw.get("pre_formation") {
        Some(JSValue::Object(pre)) if pre.contains_key("volonte_suivi_formation") => {
            PayloadShape::AlreadyCanonical
        }
        _ => PayloadShape::LegacyV1,
    }
}

/// Writes the session identity over whatever the extraction produced.
pub fn force_identity(raw: &mut JSValue, identity: &SessionIdentity) {
    if !raw.is_object() {
        *raw = JSValue::Object(JSMap::new());
    }
    if let JSValue::Object(m) = raw {
        // The machine spellings would clash with the display names on validation.
        m.remove("Nom_formation");
        m.remove("semestre");
        m.insert("Nom formation".to_string(), json!(identity.formation_name));
        m.insert(" semestre".to_string(), json!(identity.semester));
        m.insert("lien_vers_formation".to_string(), json!(identity.source_link));
    }
}

pub fn map_to_canonical(raw: JSValue) -> MappedPayload {
    let shape = classify_payload(&raw);
    info!("map_to_canonical: detected shape {:?}", shape);
    let mut payload = match shape {
        PayloadShape::AlreadyCanonical => raw,
        PayloadShape::LegacyV1 => restructure_legacy(&raw),
    };
    if !payload.is_object() {
        payload = JSValue::Object(JSMap::new());
    }

    normalize_satisfaction_labels(&mut payload);
    fill_missing_percentages(&mut payload);

    payload["version_prompt"] = json!(SCHEMA_VERSION);
    MappedPayload { shape, payload }
}

// ********* Legacy restructuring ***********

/// The value under a key, null counting as missing.
fn get<'a>(obj: &'a JSValue, key: &str) -> Option<&'a JSValue> {
    obj.get(key).filter(|v| !v.is_null())
}

/// The first of several keys that holds a value.
fn first_of(obj: &JSValue, keys: &[&str]) -> JSValue {
    keys.iter()
        .find_map(|k| get(obj, k))
        .cloned()
        .unwrap_or(JSValue::Null)
}

fn section<'a>(obj: &'a JSValue, key: &str) -> Option<&'a JSValue> {
    get(obj, key).filter(|v| v.is_object())
}

/// Rebuilds the five distribution items, 5 to 1, from entries indexed by
/// their label.
fn rebuild_distribution(old_dist: &[JSValue]) -> JSValue {
    let by_label: Vec<(String, &JSValue)> = old_dist
        .iter()
        .filter(|d| d.is_object())
        .map(|d| {
            let label = match d.get("label") {
                Some(JSValue::String(s)) => s.trim().to_string(),
                Some(JSValue::Null) | None => "".to_string(),
                Some(other) => other.to_string(),
            };
            (label, d)
        })
        .collect();

    let items: Vec<JSValue> = LIKERT_LEVELS
        .iter()
        .map(|level| {
            let entry = by_label
                .iter()
                .rev()
                .find(|(label, _)| *label == level.to_string())
                .map(|(_, d)| *d);
            let count = entry.and_then(|d| d.get("count"));
            let percent = entry.and_then(|d| d.get("percent"));
            let label = format_voters(&count.cloned()).unwrap_or_default();
            let mut item = JSMap::new();
            item.insert(format!("echele {}", level), json!(label));
            item.insert(
                "pourcentage".to_string(),
                json!(safe_float(&percent.cloned())),
            );
            JSValue::Object(item)
        })
        .collect();
    JSValue::Array(items)
}

fn mastery_block(old: Option<&JSValue>, global_key: &str) -> JSValue {
    match old {
        Some(mo) => json!({
            "mode": first_of(mo, &["mode"]),
            "par_objectif": first_of(mo, &["par_objectif"]),
            global_key: first_of(mo, &["note_globale_objectifs_sur_10", global_key]),
        }),
        None => JSValue::Null,
    }
}

fn restructure_pre_training(old_pre: &JSValue) -> JSValue {
    let svs = section(old_pre, "souhaitez_vous_suivre").cloned().unwrap_or(json!({}));
    let voters_total = first_of(&svs, &["voters_total", "votants"]);

    let distribution = match get(old_pre, "souhaitez_vous_suivre_distribution") {
        Some(JSValue::Array(l)) if !l.is_empty() => rebuild_distribution(l),
        _ => JSValue::Null,
    };

    let mastery = section(old_pre, "maitrise_objectifs")
        .or_else(|| section(old_pre, "maitrise_objectifs_preformation"));

    json!({
        "volonte_suivi_formation": {"nb votants": voters_total},
        "souhaitez_vous_suivre_distribution": distribution,
        "demande_sujets_a_aborder": first_of(old_pre, &["sujets_a_aborder", "demande_sujets_a_aborder"]),
        "maitrise_objectifs_preformation": mastery_block(
            mastery,
            "note_globale_objectifs_preformation",
        ),
    })
}

fn restructure_hot(old_hot: &JSValue) -> JSValue {
    let mastery = section(old_hot, "maitrise_objectifs")
        .or_else(|| section(old_hot, "maitrise_objectifs_a_chaud"));
    json!({
        "formation_profitable": first_of(old_hot, &["profitable", "formation_profitable"]),
        "satisfaction_contenu": first_of(old_hot, &["satisfaction_contenu"]),
        "note_globale_a_chaud": first_of(old_hot, &["impression_globale_note_sur_10", "note_globale_a_chaud"]),
        "points_forts": first_of(old_hot, &["points_forts"]),
        "points_a_ajuster": first_of(old_hot, &["points_a_ajuster"]),
        "suggestions_complement_sur_formation": first_of(
            old_hot,
            &["suggestions_complement", "suggestions_complement_sur_formation"],
        ),
        "appreciations_intervenants": first_of(old_hot, &["appreciations_intervenants"]),
        "maitrise_objectifs_a_chaud": mastery_block(mastery, "note_globale_objectifs_a_chaud"),
    })
}

fn restructure_cold(old_cold: &JSValue) -> JSValue {
    let mastery = section(old_cold, "maitrise_objectifs")
        .or_else(|| section(old_cold, "maitrise_objectifs_a_froid"));
    let mut mastery_js = mastery_block(mastery, "note_globale_objectifs_a_froid");
    // The global score may sit next to the block in the old layout.
    if let Some(g) = get(old_cold, "note_globale_objectifs_a_froid") {
        if mastery_js.is_null() {
            mastery_js = json!({ "note_globale_objectifs_a_froid": g });
        } else if mastery_js["note_globale_objectifs_a_froid"].is_null() {
            mastery_js["note_globale_objectifs_a_froid"] = g.clone();
        }
    }
    json!({
        "note_sur_10": first_of(old_cold, &["note_sur_10"]),
        "maitrise_objectifs_a_froid": mastery_js,
        "elements_les_plus_utiles": first_of(old_cold, &["elements_les_plus_utiles"]),
    })
}

/// Key-by-key translation of the legacy layout. Sections missing from the
/// input stay missing.
fn restructure_legacy(raw: &JSValue) -> JSValue {
    let mut out = JSMap::new();
    out.insert(
        "Nom formation".to_string(),
        first_of(raw, &["Nom formation", "Nom_formation"]),
    );
    out.insert(
        " semestre".to_string(),
        first_of(raw, &[" semestre", "semestre"]),
    );
    out.insert(
        "lien_vers_formation".to_string(),
        first_of(raw, &["lien_vers_formation"]),
    );

    if let Some(pre) = section(raw, "pre_formation") {
        out.insert("pre_formation".to_string(), restructure_pre_training(pre));
    }
    if let Some(hot) = section(raw, "a_chaud") {
        out.insert("a_chaud".to_string(), restructure_hot(hot));
    }
    if let Some(cold) = section(raw, "a_froid") {
        out.insert("a_froid".to_string(), restructure_cold(cold));
    }
    for k in ["intervenants", "resultats_evaluations", "meta_extraction"] {
        if let Some(v) = get(raw, k) {
            out.insert(k.to_string(), v.clone());
        }
    }
    JSValue::Object(out)
}

// ********* Normalization passes ***********

/// Remaps known misspellings of the satisfaction labels. Unknown labels are left alone.
pub fn normalize_satisfaction_label(label: &str) -> &str {
    SATISFACTION_VARIANTS
        .iter()
        .find(|(variant, _)| *variant == label)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(label)
}

fn normalize_satisfaction_labels(payload: &mut JSValue) {
    let items = match payload
        .get_mut("a_chaud")
        .and_then(|h| h.get_mut("satisfaction_contenu"))
    {
        Some(JSValue::Array(items)) => items,
        _ => return,
    };
    for it in items.iter_mut() {
        let normalized = match it.get("label") {
            Some(JSValue::String(lbl)) => {
                let n = normalize_satisfaction_label(lbl);
                if n != lbl.as_str() {
                    Some(n.to_string())
                } else {
                    None
                }
            }
            _ => None,
        };
        if let Some(n) = normalized {
            debug!("normalize_satisfaction_labels: {:?} -> {:?}", it["label"], n);
            it["label"] = json!(n);
        }
    }
}

/// Fills a missing percentage from the `"<n> votants"` label and the total
/// number of voters, rounded to one decimal.
fn fill_missing_percentages(payload: &mut JSValue) {
    let pre = match payload.get_mut("pre_formation") {
        Some(pre) if pre.is_object() => pre,
        _ => return,
    };
    let total = pre
        .get("volonte_suivi_formation")
        .map(|v| first_of(v, &["nb votants", "nb_votants"]))
        .and_then(|t| safe_float(&t))
        .filter(|t| *t > 0.0);
    let total = match total {
        Some(t) => t,
        None => return,
    };
    let items = match pre.get_mut("souhaitez_vous_suivre_distribution") {
        Some(JSValue::Array(items)) => items,
        _ => return,
    };
    for item in items.iter_mut() {
        let obj = match item.as_object_mut() {
            Some(obj) => obj,
            None => continue,
        };
        let label = obj.iter().find_map(|(k, v)| match v {
            JSValue::String(s) if k.starts_with("echele ") || k.starts_with("echele_") => {
                Some(s.clone())
            }
            _ => None,
        });
        let n = match label.as_deref().and_then(parse_voters) {
            Some(n) => n,
            None => continue,
        };
        if obj.get("pourcentage").map_or(true, |p| p.is_null()) {
            let pct = round_to(100.0 * (n as f64) / total, 1);
            debug!("fill_missing_percentages: {} / {} -> {}", n, total, pct);
            obj.insert("pourcentage".to_string(), json!(pct));
        }
    }
}
