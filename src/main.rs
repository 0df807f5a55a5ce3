use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};

use defectmine_core::{DefectmineConfig, DefectmineError, OutputFormat, RawTicket, Release, ReleaseTimeline};
use defectmine_dataset::report::{summarize, write_dataset};
use defectmine_dataset::{build_dataset, BuildOptions, DatasetInputs};
use defectmine_history::{match_releases_to_tags, GitHistory};
use defectmine_jira::{parse, JiraClient};

const DEFAULT_CONFIG_PATH: &str = ".defectmine.toml";

#[derive(Parser)]
#[command(
    name = "defectmine",
    version,
    about = "Defect-prediction dataset builder",
    long_about = "defectmine reconciles Jira tickets, git commits, and project releases into a\n\
                   chronologically consistent defect dataset, estimating unknown injected\n\
                   versions with the Proportion technique.\n\n\
                   Examples:\n  \
                     defectmine init                              Create a .defectmine.toml config file\n  \
                     defectmine build --project BOOKKEEPER        Fetch from Jira and build the dataset\n  \
                     defectmine build --releases-file project.json --issues-file issues.json\n  \
                     defectmine match --project BOOKKEEPER        Show which tag each release maps to"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .defectmine.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

/// Where releases and tickets come from, shared by `build` and `match`.
#[derive(clap::Args)]
struct SourceArgs {
    /// Repository path (default: [git] path from config, or current directory)
    #[arg(long)]
    path: Option<PathBuf>,

    /// Jira project key (default: [project] key from config)
    #[arg(long)]
    project: Option<String>,

    /// Read project versions from a saved Jira project response instead of the API
    #[arg(long)]
    releases_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Build the defect dataset
    #[command(long_about = "Build the defect dataset.\n\n\
        Matches releases to tags, partitions commit history into per-release windows,\n\
        links commits to the tickets they mention, estimates unknown injected versions\n\
        with the Proportion technique, and writes the result as JSON files.\n\n\
        Examples:\n  defectmine build --project BOOKKEEPER\n  \
        defectmine build --releases-file project.json --issues-file issues.json --out data")]
    Build {
        #[command(flatten)]
        source: SourceArgs,

        /// Read issues from a saved Jira search response instead of the API
        #[arg(long)]
        issues_file: Option<PathBuf>,

        /// Output directory (default: [output] dir from config)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Branch to mine instead of HEAD
        #[arg(long)]
        branch: Option<String>,

        /// Proportion used when no ticket yields a sample
        #[arg(long)]
        default_p: Option<f64>,

        /// Fail instead of keeping partial partitions when a range query fails
        #[arg(long)]
        strict: bool,
    },
    /// Show the release-to-tag matching
    #[command(long_about = "Show the release-to-tag matching.\n\n\
        Pairs each release with the first tag whose name contains, or is contained in,\n\
        the release name, and lists releases no tag matched.")]
    Match {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Create a default .defectmine.toml configuration file
    #[command(long_about = "Create a default .defectmine.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .defectmine.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mdefectmine\x1b[0m v{version}: releases, commits, and tickets in one defect dataset\n");

        println!("Quick start:");
        println!("  \x1b[36mdefectmine init\x1b[0m                        Create a .defectmine.toml config file");
        println!("  \x1b[36mdefectmine build --project KEY\x1b[0m         Build the dataset for a Jira project\n");

        println!("All commands:");
        println!("  \x1b[32mbuild\x1b[0m   Match, partition, link, and estimate; write JSON output");
        println!("  \x1b[32mmatch\x1b[0m   Show the release-to-tag matching");
        println!("  \x1b[32minit\x1b[0m    Create default configuration\n");
    } else {
        println!("defectmine v{version}: releases, commits, and tickets in one defect dataset\n");

        println!("Quick start:");
        println!("  defectmine init                        Create a .defectmine.toml config file");
        println!("  defectmine build --project KEY         Build the dataset for a Jira project\n");

        println!("All commands:");
        println!("  build   Match, partition, link, and estimate; write JSON output");
        println!("  match   Show the release-to-tag matching");
        println!("  init    Create default configuration\n");
    }

    println!("Run 'defectmine <command> --help' for details.");
}

/// Route `tracing` events to stderr; `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<DefectmineConfig> {
    match path {
        Some(path) => match DefectmineConfig::from_file(path) {
            Err(e @ DefectmineError::FileNotFound(_)) => Err(miette::miette!(
                help = "Run 'defectmine init' to create a default .defectmine.toml",
                "{e}"
            )),
            result => result
                .into_diagnostic()
                .wrap_err(format!("loading {}", path.display())),
        },
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                DefectmineConfig::from_file(default_path)
                    .into_diagnostic()
                    .wrap_err(format!("loading {DEFAULT_CONFIG_PATH}"))
            } else {
                Ok(DefectmineConfig::default())
            }
        }
    }
}

fn spinner(message: &'static str, use_color: bool) -> Option<indicatif::ProgressBar> {
    if !use_color || !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
    {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err(format!("reading {}", path.display()))
}

fn require_project(flag: Option<&str>, config: &DefectmineConfig) -> Result<String> {
    match flag.or(config.project.key.as_deref()) {
        Some(key) => Ok(key.to_string()),
        None => miette::bail!(miette::miette!(
            help = "Pass --project or set [project] key in .defectmine.toml",
            "no Jira project key configured"
        )),
    }
}

async fn load_releases(
    source: &SourceArgs,
    config: &DefectmineConfig,
    client: &JiraClient,
    use_color: bool,
) -> Result<Vec<Release>> {
    if let Some(path) = &source.releases_file {
        return parse::parse_releases(&read_file(path)?)
            .into_diagnostic()
            .wrap_err(format!("parsing {}", path.display()));
    }

    let project = require_project(source.project.as_deref(), config)?;
    let pb = spinner("Fetching project versions...", use_color);
    let releases = client.fetch_releases(&project).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    releases.into_diagnostic()
}

async fn load_tickets(
    issues_file: Option<&Path>,
    project: Option<&str>,
    config: &DefectmineConfig,
    client: &JiraClient,
    timeline: &ReleaseTimeline,
    use_color: bool,
) -> Result<Vec<RawTicket>> {
    if let Some(path) = issues_file {
        return parse::parse_tickets(&read_file(path)?, timeline)
            .into_diagnostic()
            .wrap_err(format!("parsing {}", path.display()));
    }

    let project = require_project(project, config)?;
    let pb = spinner("Fetching tickets...", use_color);
    let tickets = client.fetch_tickets(&project, timeline).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    tickets.into_diagnostic()
}

fn open_history(path: &Path) -> Result<GitHistory> {
    tracing::debug!(path = %path.display(), "opening repository");
    GitHistory::open(path).into_diagnostic().map_err(|e| {
        miette::miette!(
            help = "Run defectmine from inside a git repository, or specify --path to one",
            "{e}"
        )
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    match cli.command {
        None => {
            print_welcome(use_color);
            return Ok(());
        }
        Some(Command::Build {
            ref source,
            ref issues_file,
            ref out,
            ref branch,
            default_p,
            strict,
        }) => {
            let client = JiraClient::new(&config.jira).into_diagnostic()?;
            let repo_path = source.path.as_deref().unwrap_or(config.git.path.as_path());
            let history = open_history(repo_path)?;

            let releases = load_releases(source, &config, &client, use_color).await?;
            let timeline = ReleaseTimeline::new(releases.clone());
            let tickets = load_tickets(
                issues_file.as_deref(),
                source.project.as_deref(),
                &config,
                &client,
                &timeline,
                use_color,
            )
            .await?;

            let branch = branch.as_deref().or(config.git.branch.as_deref());
            let commits = history.commits(branch).into_diagnostic()?;
            let tags = history.tags().into_diagnostic()?;

            let default_p = default_p.unwrap_or(config.proportion.default_p);
            if !default_p.is_finite() || default_p < 0.0 {
                miette::bail!("--default-p must be a non-negative number, got {default_p}");
            }
            let options = BuildOptions {
                default_p,
                keep_partial: config.partition.keep_partial && !strict,
            };
            let inputs = DatasetInputs {
                releases,
                tags,
                commits,
                tickets,
                source: history,
            };
            let dataset = build_dataset(inputs, options).into_diagnostic()?;

            let out_dir = out.as_deref().unwrap_or(config.output.dir.as_path());
            write_dataset(out_dir, &dataset)
                .into_diagnostic()
                .wrap_err(format!("writing dataset to {}", out_dir.display()))?;

            let summary = summarize(&dataset);
            match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&summary).into_diagnostic()?
                    );
                }
                OutputFormat::Markdown => {
                    print!("{}", summary.to_markdown());
                }
                OutputFormat::Text => {
                    print!("{summary}");
                    println!("Wrote dataset to {}", out_dir.display());
                }
            }
        }
        Some(Command::Match { ref source }) => {
            let client = JiraClient::new(&config.jira).into_diagnostic()?;
            let repo_path = source.path.as_deref().unwrap_or(config.git.path.as_path());
            let history = open_history(repo_path)?;

            let releases = load_releases(source, &config, &client, use_color).await?;
            let timeline = ReleaseTimeline::new(releases);
            let tags = history.tags().into_diagnostic()?;
            let matches = match_releases_to_tags(timeline.as_slice(), &tags);

            match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&matches).into_diagnostic()?
                    );
                }
                OutputFormat::Markdown => {
                    println!("# Release Tags\n");
                    println!("| Release | Date | Tag |");
                    println!("|---------|------|-----|");
                    for pair in &matches.pairs {
                        println!(
                            "| {} | {} | {} |",
                            pair.release.name,
                            pair.release.date.format("%Y-%m-%d"),
                            pair.tag.name
                        );
                    }
                    for release in &matches.unmatched {
                        println!(
                            "| {} | {} | _none_ |",
                            release.name,
                            release.date.format("%Y-%m-%d")
                        );
                    }
                }
                OutputFormat::Text => {
                    for pair in &matches.pairs {
                        println!("{:<30} {}", pair.release.to_string(), pair.tag.name);
                    }
                    if !matches.unmatched.is_empty() {
                        println!("\nUnmatched releases:");
                        for release in &matches.unmatched {
                            println!("  {release}");
                        }
                    }
                    println!(
                        "\n{} of {} releases matched to {} tags",
                        matches.pairs.len(),
                        timeline.len(),
                        tags.len()
                    );
                }
            }
        }
        Some(Command::Init) => {
            let path = Path::new(DEFAULT_CONFIG_PATH);
            if path.exists() {
                miette::bail!("{DEFAULT_CONFIG_PATH} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {DEFAULT_CONFIG_PATH} with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "defectmine", &mut std::io::stdout());
        }
    }

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# defectmine configuration

[project]
# Jira project key
# key = "BOOKKEEPER"

[jira]
# base_url = "https://issues.apache.org/jira"
# jql = "issuetype = Bug AND status in (Resolved, Closed) AND resolution = Fixed"
# page_size = 100

[git]
# path = "."
# branch = "master"

[proportion]
# Used when no ticket has a known injected version
# default_p = 0.5

[partition]
# Keep windows computed before a failing range query
# keep_partial = true

[output]
# dir = "defectmine-out"
"#;
