//! delimited-stream CLI - read delimited text files and print their records

use clap::Parser;
use delimited_stream::{
    CharSource, Charset, CsvReader, DEFAULT_CAPACITY, DelimiterSet, ReaderBuilder, WriterBuilder,
    unembrace,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Streaming reader for delimited text.
///
/// Reads files with arbitrary (multi-character) column, row, quote and comment
/// delimiters and prints their records.
#[derive(Parser, Debug)]
#[command(name = "delimited-stream")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input file(s) to read
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Column delimiter
    #[arg(short = 'c', long, default_value = ";")]
    column: String,

    /// Row delimiter
    #[arg(long, default_value = "\\n")]
    row: String,

    /// Quote delimiter
    #[arg(short = 'q', long, default_value = "\"")]
    quote: String,

    /// Comment delimiter (empty to disable)
    #[arg(long, default_value = "#")]
    comment: String,

    /// Disable quoting
    #[arg(long, conflicts_with = "quote")]
    no_quote: bool,

    /// Buffer capacity in characters
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    buffer_size: usize,

    /// Drop the first row
    #[arg(long)]
    skip_header: bool,

    /// Require the first row to hold these column names
    #[arg(long, value_delimiter = ',', value_name = "NAME,...")]
    verify_header: Option<Vec<String>>,

    /// Input encoding label (e.g. utf-8, latin1, utf-16le) or 'auto'
    #[arg(long, default_value = "utf-8")]
    encoding: String,

    /// Return an unterminated quoted field at end of file instead of failing
    #[arg(long)]
    lenient: bool,

    /// Output format: text (default), json, or csv
    #[arg(short = 'f', long, default_value = "text")]
    format: OutputFormat,

    /// Only output the number of records
    #[arg(long)]
    count: bool,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Csv,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let builder = match reader_builder(&args) {
        Ok(builder) => builder,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut exit_code = ExitCode::SUCCESS;

    for file in &args.files {
        if let Err(e) = read_file(file, &builder, &args) {
            eprintln!("Error processing {}: {}", file.display(), e);
            exit_code = ExitCode::FAILURE;
        }
    }

    exit_code
}

/// Expand `\t`, `\n`, `\r` and `\\` so control characters can be given on
/// the command line.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn reader_builder(args: &Args) -> delimited_stream::Result<ReaderBuilder> {
    let quote = if args.no_quote {
        String::new()
    } else {
        unescape(&args.quote)
    };
    let delimiters = DelimiterSet::new(
        unescape(&args.column),
        unescape(&args.row),
        quote,
        unescape(&args.comment),
    )?;

    let mut builder = ReaderBuilder::new();
    builder
        .delimiters(delimiters)
        .buffer_capacity(args.buffer_size)
        .skip_header(args.skip_header)
        .charset(Charset::from_label(&args.encoding)?)
        .strict_quotes(!args.lenient);
    if let Some(ref names) = args.verify_header {
        builder.verify_header(names);
    }
    Ok(builder)
}

fn read_file(
    path: &Path,
    builder: &ReaderBuilder,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = builder.from_path(path)?;
    debug!(path = %path.display(), "reading");

    if args.count {
        while reader.read_row()?.is_some() {}
        print_count(path, reader.row_count(), args.format);
        return Ok(());
    }

    match args.format {
        OutputFormat::Text => print_text_output(path, &mut reader),
        OutputFormat::Json => print_json_output(path, &mut reader),
        OutputFormat::Csv => print_csv_output(&mut reader),
    }
}

fn next_values<S: CharSource>(
    reader: &mut CsvReader<S>,
) -> delimited_stream::Result<Option<Vec<String>>> {
    let Some(record) = reader.read_record()? else {
        return Ok(None);
    };
    let quote = reader.delimiters().quote();
    Ok(Some(record.iter().map(|f| unembrace(quote, f)).collect()))
}

fn print_count(path: &Path, count: u64, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}: {} records", path.display(), count),
        OutputFormat::Json => println!(
            r#"{{"file":{},"count":{}}}"#,
            json_string(&path.display().to_string()),
            count
        ),
        OutputFormat::Csv => println!("{},{}", path.display(), count),
    }
}

fn print_text_output<S: CharSource>(
    path: &Path,
    reader: &mut CsvReader<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut out = io::stdout().lock();
    writeln!(out, "File: {}", path.display())?;

    let mut header_printed = false;
    while let Some(values) = next_values(reader)? {
        if !header_printed {
            if let Some(headers) = reader.headers() {
                writeln!(out, "  Header: {}", headers.join(" | "))?;
            }
            header_printed = true;
        }
        writeln!(out, "  {}: {}", reader.row_count(), values.join(" | "))?;
    }
    if !header_printed {
        if let Some(headers) = reader.headers() {
            writeln!(out, "  Header: {}", headers.join(" | "))?;
        }
    }
    writeln!(out, "  Records: {}", reader.row_count())?;
    writeln!(out)?;
    Ok(())
}

fn json_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn json_array(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| json_string(v)).collect();
    format!("[{}]", items.join(","))
}

fn print_json_output<S: CharSource>(
    path: &Path,
    reader: &mut CsvReader<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut out = io::stdout().lock();
    write!(
        out,
        r#"{{"file":{},"records":["#,
        json_string(&path.display().to_string())
    )?;

    let mut first = true;
    while let Some(values) = next_values(reader)? {
        if !first {
            write!(out, ",")?;
        }
        first = false;
        write!(out, "{}", json_array(&values))?;
    }

    let headers = reader
        .headers()
        .map_or_else(|| "null".to_string(), json_array);
    writeln!(
        out,
        r#"],"headers":{},"count":{}}}"#,
        headers,
        reader.row_count()
    )?;
    Ok(())
}

fn print_csv_output<S: CharSource>(
    reader: &mut CsvReader<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = WriterBuilder::new()
        .delimiters(DelimiterSet::new(",", "\n", "\"", "")?)
        .from_writer(io::stdout().lock());

    while let Some(values) = next_values(reader)? {
        writer.write_record(&values)?;
    }
    writer.close()?;
    Ok(())
}
