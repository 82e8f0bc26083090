use anyhow::{Context, Result};
use clap::{Arg, Command};
use humdrum::{AnalysisOptions, HumdrumFile, LineView};

#[derive(Debug, PartialEq)]
enum OutputFormat {
    Text,
    Csv,
    Xml,
    View(LineView),
}

fn parse_output_format(name: &str) -> Result<OutputFormat> {
    match name.to_lowercase().as_str() {
        "text" => Ok(OutputFormat::Text),
        "csv" => Ok(OutputFormat::Csv),
        "xml" => Ok(OutputFormat::Xml),
        "tracks" => Ok(OutputFormat::View(LineView::TrackInfo)),
        "spines" => Ok(OutputFormat::View(LineView::SpineInfo)),
        "durations" => Ok(OutputFormat::View(LineView::DurationInfo)),
        "recip" => Ok(OutputFormat::View(LineView::RecipInfo)),
        "datatypes" => Ok(OutputFormat::View(LineView::DataTypeInfo)),
        _ => Err(anyhow::anyhow!("Unsupported output format: {}", name)),
    }
}

fn main() -> Result<()> {
    let matches = Command::new("humdrum")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Humdrum spine and rhythm analyzer")
        .arg(
            Arg::new("input")
                .help("Input file (Humdrum, or CSV with --csv)")
                .required(true)
                .value_name("INPUT_FILE")
                .index(1),
        )
        .arg(
            Arg::new("verbose")
                .help("Enable verbose output")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("csv")
                .help("Read the input as CSV")
                .long("csv")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("separator")
                .help("CSV field separator")
                .long("separator")
                .value_name("SEPARATOR")
                .default_value(","),
        )
        .arg(
            Arg::new("format")
                .help("Output: text, csv, xml, tracks, spines, durations, recip or datatypes")
                .long("format")
                .short('f')
                .value_name("FORMAT")
                .default_value("text"),
        )
        .arg(
            Arg::new("xml-id-prefix")
                .help("Prefix for xml:id attributes")
                .long("xml-id-prefix")
                .value_name("PREFIX"),
        )
        .arg(
            Arg::new("no-rhythm")
                .help("Skip rhythm and meter analysis")
                .long("no-rhythm")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let input_file = matches
        .get_one::<String>("input")
        .context("Missing input file")?;
    let verbose = matches.get_flag("verbose");
    let read_csv = matches.get_flag("csv");
    let separator = matches
        .get_one::<String>("separator")
        .map(String::as_str)
        .unwrap_or(",");
    let format_name = matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text");
    let no_rhythm = matches.get_flag("no-rhythm");

    let output_format = parse_output_format(format_name)
        .with_context(|| format!("Failed to select output format: {}", format_name))?;

    let options = AnalysisOptions {
        analyze_rhythm: !no_rhythm,
        analyze_meter: !no_rhythm,
        xml_id_prefix: matches
            .get_one::<String>("xml-id-prefix")
            .cloned()
            .unwrap_or_default(),
        ..AnalysisOptions::default()
    };

    if verbose {
        eprintln!("Reading file: {}", input_file);
    }
    let content = std::fs::read_to_string(input_file)
        .with_context(|| format!("Failed to read input file: {}", input_file))?;

    let file = if read_csv {
        humdrum::parser::HumdrumParser::with_options(options)
            .parse_csv(&content, separator)
            .with_context(|| format!("Failed to parse CSV file: {}", input_file))?
    } else {
        humdrum::parse_humdrum_with(&content, options)
            .with_context(|| format!("Failed to parse Humdrum file: {}", input_file))?
    };

    if verbose {
        eprintln!(
            "Lines: {}, tracks: {}, duration: {} quarter notes",
            file.line_count(),
            file.max_track(),
            file.score_duration()
        );
    }

    print!("{}", render(&file, &output_format, separator));
    Ok(())
}

fn render(file: &HumdrumFile, format: &OutputFormat, separator: &str) -> String {
    match format {
        OutputFormat::Text => file.to_string(),
        OutputFormat::Csv => file.to_csv(separator),
        OutputFormat::Xml => file.to_xml(),
        OutputFormat::View(view) => file.display_view(*view).to_string(),
    }
}
