use clap::Parser;

/// Turns the extraction of a training quality-survey report into one row of the consolidated spreadsheet.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON payload returned by the extraction of the report. Both the current and the first
    /// extraction layouts are accepted.
    #[clap(short, long, value_parser)]
    pub input: String,

    /// (file path, optional) A JSON configuration file. See the manual of the survey_rows crate for the format.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// The name of the training session. If not given, the name found in the payload is used.
    #[clap(long, value_parser)]
    pub formation: Option<String>,

    /// The semester of the session (for example 'S1 2025'). If not given, the value found in the payload is used.
    #[clap(long, value_parser)]
    pub semester: Option<String>,

    /// The link to the source report. Defaults to the file name of the input.
    #[clap(long, value_parser)]
    pub source: Option<String>,

    /// If passed as an argument, the requested topics are written as one sentence by the summarizer instead of a list.
    #[clap(long, takes_value = false)]
    pub topics_as_sentence: bool,

    /// (file or directory path, optional) If specified, the validated canonical payload is written there in JSON
    /// format. In a directory, the file is named after the formation and the semester.
    #[clap(long, value_parser)]
    pub canonical_out: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the row will be written in JSON format to the given
    /// location. By default, it is printed on the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path, optional) A CSV table to which the row is appended. The table is created if needed.
    /// Setting this option overrides the path that may be specified with the --config option.
    #[clap(long, value_parser)]
    pub csv: Option<String>,

    /// (file path, optional) An Excel workbook whose first non-empty row of the sheet gives the columns of
    /// a new CSV table.
    #[clap(long, value_parser)]
    pub template: Option<String>,

    /// (default Formations) When using an Excel template, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub sheet_name: Option<String>,

    /// (file path) A reference row in JSON format. If provided, qualrow will check that the derived row
    /// matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// If passed as an argument, no summarization service is called. Free-text columns get their placeholder.
    #[clap(long, takes_value = false)]
    pub offline: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
