use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Evidence-synthesis pipeline for antibiotic therapy plans
#[derive(Parser, Debug)]
#[command(
    name = "abxplan",
    about = "Builds a tiered antibiotic therapy plan from clinical sources",
    version,
    author,
    long_about = "abxplan searches (or reads) clinical sources for a patient context, extracts \
                  therapy recommendations with an LLM, ranks and unifies them into first choice, \
                  second choice and alternative tiers, and fills missing dosing fields from a \
                  drug reference site."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Run the pipeline for one patient context",
        long_about = "Runs search, extraction, ranking, synthesis and enrichment, then writes the \
                      plan as JSON.\n\n\
                      Examples:\n  \
                      abxplan run --input params.json\n  \
                      abxplan run --input params.json --sources search.json --output plan.json\n  \
                      abxplan run --input params.json --provider openai --model gpt-4o --no-enrich"
    )]
    Run(RunArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[arg(short = 'i', long, value_name = "FILE", help = "Input parameters JSON")]
    pub input: PathBuf,

    #[arg(
        short = 's',
        long,
        value_name = "FILE",
        help = "Use cached search results instead of querying the search backend"
    )]
    pub sources: Option<PathBuf>,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write the plan JSON to a file instead of stdout"
    )]
    pub output: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Save the sources used for this run")]
    pub save_search: Option<PathBuf>,

    #[arg(
        short = 'p',
        long,
        value_name = "PROVIDER",
        help = "LLM provider (ollama, openai, claude, gemini, groq)"
    )]
    pub provider: Option<String>,

    #[arg(short = 'm', long, value_name = "MODEL", help = "Model name for the provider")]
    pub model: Option<String>,

    #[arg(long, help = "Skip reference-site enrichment")]
    pub no_enrich: bool,
}
