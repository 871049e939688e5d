use crate::args::Args;
use crate::qualrow::*;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_SHEET_NAME: &str = "Formations";

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummarizerSettings {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    /// The environment variable holding the API key.
    #[serde(rename = "apiKeyEnv")]
    pub api_key_env: Option<String>,
    pub temperature: Option<f64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "csvPath")]
    pub csv_path: Option<String>,
    #[serde(rename = "templatePath")]
    pub template_path: Option<String>,
    #[serde(rename = "sheetName")]
    pub sheet_name: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualrowConfig {
    #[serde(default)]
    pub summarizer: SummarizerSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(rename = "topicsAsList")]
    pub topics_as_list: Option<bool>,
}

/// The settings of one run, once the command line and the configuration file are merged.
#[derive(PartialEq, Debug, Clone)]
pub struct RunSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f64,
    pub offline: bool,
    pub csv_path: Option<String>,
    pub template_path: Option<String>,
    pub sheet_name: String,
    pub topics_mode: TopicsMode,
}

impl RunSettings {
    /// Command line values take precedence over the configuration file.
    pub fn resolve(args: &Args, config: &QualrowConfig) -> RunSettings {
        let topics_mode = if args.topics_as_sentence || config.topics_as_list == Some(false) {
            TopicsMode::Sentence
        } else {
            TopicsMode::List
        };
        RunSettings {
            endpoint: config
                .summarizer
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: config
                .summarizer
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key_env: config
                .summarizer
                .api_key_env
                .clone()
                .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
            temperature: config.summarizer.temperature.unwrap_or(0.0),
            offline: args.offline,
            csv_path: args.csv.clone().or_else(|| config.output.csv_path.clone()),
            template_path: args
                .template
                .clone()
                .or_else(|| config.output.template_path.clone()),
            sheet_name: args
                .sheet_name
                .clone()
                .or_else(|| config.output.sheet_name.clone())
                .unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string()),
            topics_mode,
        }
    }
}

pub fn read_config(path: &str) -> QualrowResult<QualrowConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_config: {:?}", contents);
    let config: QualrowConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(config)
}
