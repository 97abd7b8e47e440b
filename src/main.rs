use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use gitdoc::config::{CONFIG_FILE, GitdocConfig};
use gitdoc::{ActingUser, DocError, DocumentDraft, GitEngine, Orchestrator};

/// Write JSON documents into a git repository, one commit per change.
///
/// Every successful write prints the document with its new version (a
/// commit id). Pass that version back with --version on the next update
/// or delete; if someone else changed the document in between, the write
/// is rejected with a merge conflict instead of overwriting their change.
#[derive(Parser)]
#[command(name = "gitdoc")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (missing file means defaults)
    #[arg(long, global = true, default_value = CONFIG_FILE, env = "GITDOC_CONFIG")]
    config: PathBuf,

    /// Repository path, overriding `store.repo`
    #[arg(long, global = true, env = "GITDOC_REPO")]
    repo: Option<PathBuf>,

    /// Branch to write to, overriding `store.branch`
    #[arg(long, global = true, env = "GITDOC_BRANCH")]
    branch: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Author {
    /// Name of the person making the change
    #[arg(long, env = "GITDOC_AUTHOR_NAME")]
    author_name: String,

    /// Email of the person making the change
    #[arg(long, env = "GITDOC_AUTHOR_EMAIL")]
    author_email: String,
}

impl Author {
    fn to_user(&self) -> ActingUser {
        ActingUser::new(self.author_name.as_str(), self.author_email.as_str())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a document; an id is generated unless --id is given
    Create {
        #[arg(long = "type")]
        doc_type: String,
        #[arg(long)]
        id: Option<String>,
        /// Attributes as a JSON value
        #[arg(long, default_value = "{}")]
        attributes: String,
        #[command(flatten)]
        author: Author,
    },

    /// Replace the attributes of a document
    Update {
        #[arg(long = "type")]
        doc_type: String,
        #[arg(long)]
        id: String,
        /// The version the change is based on
        #[arg(long)]
        version: Option<String>,
        /// Attributes as a JSON value
        #[arg(long)]
        attributes: String,
        #[command(flatten)]
        author: Author,
    },

    /// Delete a document
    Delete {
        #[arg(long = "type")]
        doc_type: String,
        #[arg(long)]
        id: String,
        /// Only delete if unchanged since this version
        #[arg(long)]
        version: Option<String>,
        #[command(flatten)]
        author: Author,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _telemetry = gitdoc::telemetry::init(cli.verbose);

    let config = GitdocConfig::load(&cli.config)?;
    let repo = cli.repo.clone().unwrap_or_else(|| config.store.repo.clone());
    let branch = cli.branch.clone().unwrap_or_else(|| config.store.branch.clone());

    let engine = GitEngine::new().with_max_ref_retries(config.engine.max_ref_retries);
    let store = Orchestrator::new(engine, repo).with_short_id_len(config.commit.short_id_len);

    match run(&store, &branch, cli.command) {
        Ok(output) => {
            if let Some(doc) = output {
                println!("{}", serde_json::to_string_pretty(&doc)?);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(RunError::Doc(err)) => {
            eprintln!("{}", serde_json::to_string_pretty(&err.to_error_object())?);
            Ok(ExitCode::from(exit_code(&err)))
        }
        Err(RunError::Input(err)) => Err(err),
    }
}

enum RunError {
    Doc(DocError),
    Input(anyhow::Error),
}

impl From<DocError> for RunError {
    fn from(err: DocError) -> Self {
        Self::Doc(err)
    }
}

impl From<anyhow::Error> for RunError {
    fn from(err: anyhow::Error) -> Self {
        Self::Input(err)
    }
}

fn run(
    store: &Orchestrator<GitEngine>,
    branch: &str,
    command: Commands,
) -> Result<Option<gitdoc::Document>, RunError> {
    match command {
        Commands::Create {
            doc_type,
            id,
            attributes,
            author,
        } => {
            let mut draft = DocumentDraft::new(doc_type.as_str(), parse_attributes(&attributes)?);
            draft.id = id;
            Ok(Some(store.create(branch, &author.to_user(), &doc_type, draft)?))
        }
        Commands::Update {
            doc_type,
            id,
            version,
            attributes,
            author,
        } => {
            let mut draft =
                DocumentDraft::new(doc_type.as_str(), parse_attributes(&attributes)?).with_id(&id);
            if let Some(version) = version {
                draft = draft.with_version(version);
            }
            Ok(Some(store.update(branch, &author.to_user(), &doc_type, &id, draft)?))
        }
        Commands::Delete {
            doc_type,
            id,
            version,
            author,
        } => {
            store.delete(
                branch,
                &author.to_user(),
                version.as_deref(),
                &doc_type,
                Some(&id),
            )?;
            Ok(None)
        }
    }
}

fn parse_attributes(raw: &str) -> anyhow::Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("--attributes is not valid JSON: {raw}"))
}

/// 4xx statuses exit with 1, conflicts with 3 (worth retrying after a
/// re-read), everything else with 2.
fn exit_code(err: &DocError) -> u8 {
    if err.is_retryable() {
        3
    } else if err.status() < 500 {
        1
    } else {
        2
    }
}
