use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use survey_rows::*;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::qualrow::config_reader::*;
use crate::qualrow::io_common::*;

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_xlsx;
pub mod summarizer_http;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum QualrowError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the JSON content of {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing {what}"))]
    SerializingJson {
        source: serde_json::Error,
        what: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Worksheet {sheet} not found"))]
    MissingSheet { sheet: String },
    #[snafu(display("No header row found in worksheet {sheet}"))]
    EmptyExcel { sheet: String },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error writing CSV file {path}"))]
    CsvWrite { source: csv::Error, path: String },
    #[snafu(display("The {field} of the session is neither given nor found in the payload"))]
    MissingIdentity { field: String },
    #[snafu(display("Environment variable {var} is not set (use --offline to skip summarization)"))]
    MissingApiKey { var: String },
    #[snafu(display("Error building the HTTP client"))]
    HttpClient { source: reqwest::Error },
    #[snafu(display("The survey was rejected"))]
    Survey { source: SurveyError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type QualrowResult<T> = Result<T, QualrowError>;

pub fn read_json(path: &str) -> QualrowResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(js)
}

fn pretty_json(js: &JSValue, what: &str) -> QualrowResult<String> {
    serde_json::to_string_pretty(js).context(SerializingJsonSnafu { what })
}

fn write_json(path: &str, js: &JSValue) -> QualrowResult<()> {
    let pretty = pretty_json(js, path)?;
    fs::write(path, pretty).context(WritingFileSnafu { path })
}

/// Identity text from the command line, or else from the payload.
fn identity_field(
    given: &Option<String>,
    raw: &JSValue,
    keys: &[&str],
    field: &str,
) -> QualrowResult<String> {
    if let Some(x) = given {
        return Ok(x.trim().to_string());
    }
    let found = keys
        .iter()
        .filter_map(|k| raw.get(*k).and_then(|v| v.as_str()))
        .map(|s| s.trim())
        .find(|s| !s.is_empty());
    match found {
        Some(x) => Ok(x.to_string()),
        None => MissingIdentitySnafu { field }.fail(),
    }
}

fn build_identity(args: &Args, raw: &JSValue) -> QualrowResult<SessionIdentity> {
    let source_link = match &args.source {
        Some(s) => s.clone(),
        None => simplify_file_name(&args.input)?,
    };
    Ok(SessionIdentity {
        formation_name: identity_field(
            &args.formation,
            raw,
            &["Nom formation", "Nom_formation"],
            "formation name",
        )?,
        semester: identity_field(&args.semester, raw, &[" semestre", "semestre"], "semester")?,
        source_link,
    })
}

fn build_summarizer(settings: &RunSettings) -> QualrowResult<Box<dyn Summarizer>> {
    if settings.offline {
        info!("build_summarizer: offline mode, no summarization");
        return Ok(Box::new(NoSummarizer));
    }
    let api_key = match std::env::var(&settings.api_key_env) {
        Ok(k) if !k.trim().is_empty() => k,
        _ => {
            return MissingApiKeySnafu {
                var: settings.api_key_env.clone(),
            }
            .fail()
        }
    };
    let s = summarizer_http::ChatSummarizer::new(
        settings.endpoint.clone(),
        settings.model.clone(),
        api_key,
        settings.temperature,
    )?;
    Ok(Box::new(s))
}

/// Where the canonical payload goes: the path itself, or a file named after
/// the session when the path is a directory.
fn canonical_path(out: &str, record: &CanonicalRecord) -> String {
    let p = Path::new(out);
    if p.is_dir() {
        let full: PathBuf = p.join(canonical_file_name(
            &record.formation_name,
            &record.semester,
        ));
        full.display().to_string()
    } else {
        out.to_string()
    }
}

fn append_to_table(settings: &RunSettings, row: &JSValue) -> QualrowResult<()> {
    let csv_path = match &settings.csv_path {
        Some(p) => p,
        None => return Ok(()),
    };
    let headers: Vec<String> = match &settings.template_path {
        Some(t) => io_xlsx::read_template_headers(t, &settings.sheet_name)?,
        None => Column::ALL.iter().map(|c| c.header().to_string()).collect(),
    };
    let report = io_csv::append_row(csv_path, &headers, row)?;
    info!("append_to_table: appended a row to {}", csv_path);
    if !report.ignored_keys.is_empty() {
        warn!(
            "append_to_table: keys without a matching column (ignored): {:?}",
            report.ignored_keys
        );
    }
    if !report.blank_columns.is_empty() {
        warn!(
            "append_to_table: columns without a value (left blank): {:?}",
            report.blank_columns
        );
    }
    Ok(())
}

pub fn run_report(args: &Args) -> QualrowResult<()> {
    let config = match &args.config {
        Some(p) => read_config(p)?,
        None => QualrowConfig::default(),
    };
    info!("config: {:?}", config);
    let settings = RunSettings::resolve(args, &config);
    debug!("settings: {:?}", settings);

    let raw = read_json(&args.input)?;
    let identity = build_identity(args, &raw)?;
    info!("identity: {:?}", identity);

    let summarizer = build_summarizer(&settings)?;
    let options = DeriveOptions {
        topics_mode: settings.topics_mode,
    };
    let processed =
        process_payload(raw, &identity, &options, summarizer.as_ref()).context(SurveySnafu {})?;
    info!("shape of the input: {:?}", processed.shape);

    if let Some(out) = &args.canonical_out {
        let p = canonical_path(out, &processed.canonical);
        write_json(&p, &processed.canonical.to_json())?;
        info!("canonical payload written to {}", p);
    }

    let row_js = processed.row.to_json();
    let pretty_row = pretty_json(&row_js, "the derived row")?;
    match args.out.as_deref() {
        None | Some("stdout") | Some("") => println!("{}", pretty_row),
        Some(p) => {
            fs::write(p, &pretty_row).context(WritingFileSnafu { path: p })?;
            info!("row written to {}", p);
        }
    }

    append_to_table(&settings, &row_js)?;

    // The reference row, if provided for comparison
    if let Some(reference_p) = &args.reference {
        let reference = read_json(reference_p)?;
        let pretty_reference = pretty_json(&reference, reference_p)?;
        if pretty_reference != pretty_row {
            warn!("Found differences with the reference row");
            print_diff(pretty_reference.as_str(), pretty_row.as_str(), "\n");
            whatever!("Difference detected between derived row and reference row")
        }
    }

    Ok(())
}
