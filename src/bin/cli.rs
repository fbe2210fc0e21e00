use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pickdeldia::odds_api::OddsApiClient;
use pickdeldia::prompt::{format_matches, PromptTemplate};
use pickdeldia::validator::{validate_matches, ValidationPolicy};
use pickdeldia::{
    init_tracing, AnalysisError, AnalysisRequest, AnalysisResult, Config, MatchAnalyzer,
    MatchRecord,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cli", about = "Sports betting analysis with Gemini")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze the matches in a JSON file
    Analyze {
        /// `{"matches": [...]}` or a bare array of matches
        file: PathBuf,
        /// Render incomplete matches as placeholders instead of rejecting the batch
        #[arg(long)]
        permissive: bool,
        /// Print the prompt without calling the model
        #[arg(long)]
        dry_run: bool,
    },
    /// Analyze the fixtures The Odds API lists for a league and day
    Fixtures {
        /// Sport key, e.g. soccer_mexico_ligamx
        #[arg(long)]
        league: String,
        /// Day in YYYY-MM-DD (UTC)
        #[arg(long)]
        date: String,
    },
    /// Ask the model a free-text question
    Ask {
        #[arg(required = true)]
        prompt: Vec<String>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MatchFile {
    Matches(Vec<MatchRecord>),
    Request(AnalysisRequest),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Command::Analyze {
            file,
            permissive,
            dry_run,
        } => analyze(&file, permissive, dry_run).await,
        Command::Fixtures { league, date } => fixtures(&league, &date).await,
        Command::Ask { prompt } => ask(&prompt.join(" ")).await,
    }
}

async fn analyze(file: &Path, permissive: bool, dry_run: bool) -> Result<()> {
    let request = load_matches(file)?;

    if dry_run {
        let policy = if permissive {
            ValidationPolicy::Permissive
        } else {
            ValidationPolicy::Strict
        };
        let matches = validate_matches(request.matches.as_deref(), policy)
            .map_err(|e| anyhow::anyhow!("Datos inválidos: {}", e))?;
        let batch = format_matches(matches, &PromptTemplate::default());
        println!("{}", batch.prompt);
        return Ok(());
    }

    let mut config = Config::from_env()?;
    if permissive {
        config.policy = ValidationPolicy::Permissive;
    }
    let analyzer = MatchAnalyzer::from_config(&config)?;

    println!("Analyzing {} matches...\n", request.matches.as_ref().map_or(0, Vec::len));
    let result = analyzer.analyze(&request).await.map_err(report)?;
    print_result(&result);

    Ok(())
}

async fn fixtures(league: &str, date: &str) -> Result<()> {
    let config = Config::from_env()?;
    let odds_config = config
        .odds_api
        .clone()
        .context("ODDS_API_KEY not set in .env file")?;
    let analyzer = MatchAnalyzer::from_config(&config)?;

    println!("Fetching {} fixtures for {}...\n", league, date);
    let result = analyzer
        .analyze_fixtures(league, date)
        .await
        .map_err(report)?;
    print_result(&result);

    // Check API usage
    println!();
    OddsApiClient::new(&odds_config)?.check_usage().await?;

    Ok(())
}

async fn ask(prompt: &str) -> Result<()> {
    let config = Config::from_env()?;
    let analyzer = MatchAnalyzer::from_config(&config)?;

    let answer = analyzer.chat(prompt).await.map_err(report)?;
    println!("{}", answer);

    Ok(())
}

fn load_matches(file: &Path) -> Result<AnalysisRequest> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let parsed: MatchFile = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse matches in {}", file.display()))?;

    Ok(match parsed {
        MatchFile::Matches(matches) => AnalysisRequest::new(matches),
        MatchFile::Request(request) => request,
    })
}

fn print_result(result: &AnalysisResult) {
    println!("PARTIDOS ANALIZADOS\n");
    for (i, line) in result.partidos_analizados.iter().enumerate() {
        println!("{}. {}", i + 1, line);
    }

    println!("\nRECOMENDACIÓN\n");
    println!("{}", result.recomendacion);
}

/// Keep the upstream cause visible on the command line
fn report(err: AnalysisError) -> anyhow::Error {
    match err.details() {
        Some(details) => anyhow::anyhow!("{}: {}", err, details),
        None => err.into(),
    }
}
