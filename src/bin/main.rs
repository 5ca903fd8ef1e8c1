use autocomplete_core::config::{self, Config, Overrides, SourceKind};
use autocomplete_core::core::tokenizer::{LetterTokenizer, MelodyTokenizer, SentenceTokenizer, Tokenizer};
use autocomplete_core::ingest::{self, IngestError};
use autocomplete_core::persistence::{load_from_disk, save_to_disk};
use autocomplete_core::core::types::CacheCeiling;
use autocomplete_core::{Aggregation, AutocompleteEngine, BatchPolicy, Completion, Record, StrategyKind};
use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "complete")]
#[command(about = "Weighted prefix autocompletion over text, sentences and melodies")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Corpus file, overriding [source].file.
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    /// letters, sentences or melodies.
    #[arg(long, global = true)]
    kind: Option<SourceKind>,

    /// sum or average.
    #[arg(long, global = true)]
    aggregation: Option<Aggregation>,

    /// simple or complex.
    #[arg(long, global = true)]
    strategy: Option<StrategyKind>,

    /// Per-node cache size for the complex strategy, or "unbounded".
    #[arg(long, global = true)]
    cache_ceiling: Option<CacheCeiling>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the best completions of one prefix.
    Query {
        prefix: String,

        /// Number of completions, defaults to [query].limit.
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Complete prefixes typed on stdin until ':q'.
    Repl,

    /// Ingest the corpus and write an engine snapshot.
    Build {
        #[arg(long)]
        out: PathBuf,
    },

    /// Generate a sample config file.
    NewConfig {
        #[arg(short, long, default_value = "config.toml")]
        path: PathBuf,
    },
}

fn main() {
    init_logger();
    let cli = Cli::parse();

    if let Commands::NewConfig { path } = &cli.command {
        match config::generate_sample(path) {
            Ok(()) => log::info!("config file generated: {}", path.display()),
            Err(e) => {
                log::error!("error generating config: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let config = match resolve_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            log::error!("error loading config: {}", e);
            std::process::exit(1);
        }
    };

    let result = match config.source.kind {
        SourceKind::Letters => Session::open(LetterTokenizer, &config, &cli.command, |path| {
            let reader = BufReader::new(File::open(path)?);
            Ok((ingest::read_lines(reader, &LetterTokenizer)?, HashMap::new()))
        })
        .and_then(|s| s.run(cli.command, &config)),
        SourceKind::Sentences => Session::open(SentenceTokenizer, &config, &cli.command, |path| {
            let records = ingest::read_weighted_csv(File::open(path)?, &SentenceTokenizer)?;
            Ok((records, HashMap::new()))
        })
        .and_then(|s| s.run(cli.command, &config)),
        SourceKind::Melodies => Session::open(MelodyTokenizer, &config, &cli.command, |path| {
            let melodies = ingest::read_melodies(File::open(path)?)?;
            let mut names: HashMap<Vec<i32>, Vec<String>> = HashMap::new();
            for melody in &melodies {
                names.entry(melody.intervals()).or_default().push(melody.name.clone());
            }
            Ok((ingest::melody_records(&melodies), names))
        })
        .and_then(|s| s.run(cli.command, &config)),
    };

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .format_timestamp_millis()
        .init();
}

/// File config first, then command-line overrides.
fn resolve_config(cli: &Cli) -> Result<Config, config::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => config::load(path)?,
        None => Config::default(),
    };
    config.apply(Overrides {
        file: cli.file.clone(),
        kind: cli.kind,
        aggregation: cli.aggregation,
        strategy: cli.strategy,
        cache_ceiling: cli.cache_ceiling,
    })?;
    Ok(config)
}

/// Display names for sequences, e.g. the melodies sharing an interval pattern.
type Labels<S> = HashMap<Vec<S>, Vec<String>>;

struct Session<T: Tokenizer> {
    tokenizer: T,
    engine: AutocompleteEngine<T::Symbol>,
    labels: Labels<T::Symbol>,
}

impl<T> Session<T>
where
    T: Tokenizer,
    T::Symbol: Serialize + DeserializeOwned,
{
    /// Loads the configured snapshot when there is one and it was built with
    /// the requested engine settings, otherwise ingests the corpus file.
    fn open<F>(tokenizer: T, config: &Config, command: &Commands, read: F) -> Result<Self, Box<dyn Error>>
    where
        F: FnOnce(&Path) -> Result<(Vec<Record<T::Symbol>>, Labels<T::Symbol>), IngestError>,
    {
        let snapshot = config.existing_snapshot();
        if let (Some(path), false) = (snapshot, matches!(command, Commands::Build { .. })) {
            let engine: AutocompleteEngine<T::Symbol> = load_from_disk(path)?;
            if engine.is_built_with(&config.engine) {
                return Ok(Self { tokenizer, engine, labels: HashMap::new() });
            }
            log::warn!(
                "snapshot {} was built with {:?}, rebuilding from {} with {:?}",
                path.display(),
                engine.config(),
                config.source.file.display(),
                config.engine
            );
        }

        let mut engine = AutocompleteEngine::new(config.engine)?;
        let (records, labels) = read(&config.source.file)
            .map_err(|e| format!("reading {}: {}", config.source.file.display(), e))?;
        engine.insert_batch(records, BatchPolicy::Skip)?;
        Ok(Self { tokenizer, engine, labels })
    }

    fn run(self, command: Commands, config: &Config) -> Result<(), Box<dyn Error>> {
        match command {
            Commands::Query { prefix, limit, json } => {
                let limit = limit.unwrap_or(config.query.limit);
                let completions = self.complete(&prefix, limit)?;
                if json {
                    println!("{}", self.to_json(&completions)?);
                } else {
                    self.print_table(&completions);
                }
            }
            Commands::Repl => self.repl(config.query.limit)?,
            Commands::Build { out } => save_to_disk(&self.engine, &out)?,
            Commands::NewConfig { .. } => {}
        }
        Ok(())
    }

    fn complete(&self, raw: &str, limit: usize) -> Result<Vec<Completion<T::Symbol>>, Box<dyn Error>> {
        let prefix = self.tokenizer.tokenize(raw);
        Ok(self.engine.autocomplete(&prefix, limit)?)
    }

    fn describe(&self, sequence: &[T::Symbol]) -> String {
        let rendered = self.tokenizer.render(sequence);
        match self.labels.get(sequence) {
            Some(names) => format!("{} ({})", names.join(", "), rendered),
            None => rendered,
        }
    }

    fn to_json(&self, completions: &[Completion<T::Symbol>]) -> serde_json::Result<String> {
        let rows: Vec<serde_json::Value> = completions
            .iter()
            .map(|c| serde_json::json!({ "completion": self.describe(&c.sequence), "score": c.score }))
            .collect();
        serde_json::to_string_pretty(&rows)
    }

    fn print_table(&self, completions: &[Completion<T::Symbol>]) {
        if completions.is_empty() {
            println!("{}", "No completions found.".dark_grey());
            return;
        }
        for (i, completion) in completions.iter().enumerate() {
            println!(
                "  {:>3}. {}  {}",
                i + 1,
                self.describe(&completion.sequence).bold(),
                format!("{:.3}", completion.score).cyan()
            );
        }
    }

    fn repl(&self, limit: usize) -> io::Result<()> {
        let mut stdout = io::stdout();
        println!("{}", "Weighted autocomplete. Type a prefix, ':q' to quit.".green());
        println!(
            "{} sequences indexed, {:?} aggregation, {:?} strategy",
            self.engine.len(),
            self.engine.aggregation(),
            self.engine.strategy()
        );

        let stdin = io::stdin();
        loop {
            print!("\n> ");
            stdout.flush()?;
            let mut input = String::new();
            if stdin.lock().read_line(&mut input)? == 0 {
                break;
            }
            let prefix = input.trim_end_matches(&['\n', '\r'][..]);
            if prefix == ":q" {
                break;
            }
            match self.complete(prefix, limit) {
                Ok(completions) => self.print_table(&completions),
                Err(e) => println!("{}", e.to_string().red()),
            }
        }
        Ok(())
    }
}
