/*!

This is the long-form manual for `survey_rows` and `qualrow`.

## Pipeline

A quality-survey report goes through the following steps:
1. the extraction model returns a JSON payload (not covered here)
2. the session identity (formation name, semester, link to the report) is
   written into the payload
3. the payload is mapped to the canonical layout and stamped with the
   schema version `v2.1`
4. the canonical record is validated
5. one spreadsheet row is derived from the record
6. the row is appended to a table (CSV file) or printed as JSON

Only step 4 may reject a payload. Every other problem ends up as a
placeholder in the row.

## Input layouts

Two layouts are accepted. A payload whose `pre_formation` section contains
`volonte_suivi_formation` is read as canonical. Anything else is read as the
first extraction layout and restructured:

| first layout                                        | canonical                                             |
|-----------------------------------------------------|-------------------------------------------------------|
| `pre_formation.souhaitez_vous_suivre.voters_total`  | `pre_formation.volonte_suivi_formation."nb votants"`  |
| `pre_formation.souhaitez_vous_suivre_distribution`  | same key, one item per level `"echele 5"` .. `"echele 1"` |
| `pre_formation.sujets_a_aborder`                    | `pre_formation.demande_sujets_a_aborder`              |
| `pre_formation.maitrise_objectifs`                  | `pre_formation.maitrise_objectifs_preformation`       |
| `a_chaud.profitable`                                | `a_chaud.formation_profitable`                        |
| `a_chaud.impression_globale_note_sur_10`            | `a_chaud.note_globale_a_chaud`                        |
| `a_chaud.suggestions_complement`                    | `a_chaud.suggestions_complement_sur_formation`        |
| `a_chaud.maitrise_objectifs`                        | `a_chaud.maitrise_objectifs_a_chaud`                  |
| `a_froid.maitrise_objectifs`                        | `a_froid.maitrise_objectifs_a_froid`                  |

In the first layout, distribution entries look like
`{"label": "5", "count": 10, "percent": 50}`. They become
`{"echele 5": "10 votants", "pourcentage": 50.0}`.

A missing percentage is computed back from the `"<n> votants"` label and the
total number of voters, rounded to one decimal.

## Columns

| column                                   | computed from                                           |
|------------------------------------------|---------------------------------------------------------|
| `Volonté de suivre cette session`        | distribution, as favorable (5, 4) / neutral (3) / unfavorable (2, 1) shares adding up to 100 |
| `Demande particulière de sujet à aborder`| requested topics, as a list or as one sentence          |
| `AutoEvaluation compétence pré-formation`| mean of the objective scores, else the global score     |
| `formation Profitable`                   | `oui_percent`                                           |
| `Satisfaction du contenu`                | share of `Très satisfait(e)` and `Satisfait(e)` answers |
| `Note /10 à chaud`, `Note /10 à froid`   | global scores                                           |
| `Impact / Progression des compétences`   | progression delta, up to 2 decimals (`+1.25/10`)        |
| free-text columns                        | summarized by the language model                        |
| `Synthese`, `Lien du rapport qualité`, `Actions correctrices` | always empty, filled by hand      |

Numeric columns that cannot be computed read `Données indisponibles`. Free-text
columns with nothing to say read
`Aucune remarque – les données indiquent l’absence d’informations.`.

Free-text answers are filtered before they are summarized: non-informative
answers (`RAS`, `rien`, `je ne sais pas`, ...) and answers of two characters or
less are dropped, bullets are removed and duplicates are merged without regard
to case.

## Configuration

`qualrow` accepts an optional configuration file in JSON:

```json
{
  "summarizer": {
    "endpoint": "https://api.openai.com/v1/chat/completions",
    "model": "gpt-4.1-mini",
    "apiKeyEnv": "OPENAI_API_KEY",
    "temperature": 0.0
  },
  "output": {
    "csvPath": "formations.csv",
    "templatePath": "modele.xlsx",
    "sheetName": "Formations"
  },
  "topicsAsList": true
}
```

All the fields are optional. Command line arguments take precedence over the
configuration file.

 */
