//! Review command - run an evidence-grounded review end to end

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tokio::sync::mpsc;
use tracing::warn;

use shrike_core::diff::{collect_hunks, parse_diff};
use shrike_core::git::{slug_from_remote, GitFileSource, GitRepo};
use shrike_core::llm::{ChatClient, HttpEmbedder, LazyRerankScorer, QdrantIndex};
use shrike_core::render::WebhookNotifier;
use shrike_core::services::{FileSource, NullFileSource, Publisher};
use shrike_core::stages::FileAuditSink;
use shrike_core::workflow::RunReport;
use shrike_core::{
    Config, DecisionPrompt, DecisionRequest, HumanDecision, HumanGate, ReviewWorkflow, Secrets,
    Services, WorkflowState,
};
use shrike_github::{GitHubClient, PrRef, PrState};

/// Arguments for the review command
#[derive(Args, Debug)]
pub struct ReviewArgs {
    /// Pull request to review (owner/repo#N or a GitHub PR URL).
    /// Omit to review a local revision range instead.
    pub pr: Option<String>,

    /// Path to the local checkout used for context retrieval
    #[arg(short = 'C', long, default_value = ".")]
    pub repo: PathBuf,

    /// Base revision for local mode (defaults to the default branch)
    #[arg(long)]
    pub base: Option<String>,

    /// Head revision for local mode
    #[arg(long, default_value = "HEAD")]
    pub head: String,

    /// Approve without prompting (non-interactive runs)
    #[arg(long)]
    pub auto_approve: bool,

    /// Skip publishing and notification; the audit record is still written
    #[arg(long)]
    pub dry_run: bool,
}

impl ReviewArgs {
    /// Execute the review command
    pub async fn execute(&self, verbose: bool, config: &Config) -> anyhow::Result<()> {
        match &self.pr {
            Some(reference) => self.review_pr(reference, verbose, config).await,
            None => self.review_local(verbose, config).await,
        }
    }

    /// Review a GitHub pull request
    async fn review_pr(
        &self,
        reference: &str,
        verbose: bool,
        config: &Config,
    ) -> anyhow::Result<()> {
        let pr_ref = PrRef::parse(reference)?;

        let client = GitHubClient::new(&pr_ref.owner, &pr_ref.repo)?;
        client.test_connection().await?;

        let pr = client.get_pr(pr_ref.number).await?;
        if pr.merged {
            println!("Note: {} is already merged", pr_ref);
        } else if pr.state == PrState::Closed {
            println!("Note: {} is closed", pr_ref);
        }

        let diff = client.get_pr_diff(pr_ref.number).await?;
        let files = parse_diff(&diff);
        let hunks = collect_hunks(&files, config.retrieval.max_hunk_lines);
        if hunks.is_empty() {
            println!("No reviewable changes in {}", pr_ref);
            return Ok(());
        }

        println!(
            "Reviewing {}: {} ({} hunks across {} files)",
            pr_ref,
            pr.title,
            hunks.len(),
            files.len()
        );

        let state = WorkflowState::new(&pr_ref.owner, &pr_ref.repo)
            .with_pr(pr_ref.number, pr.head_sha.clone())
            .with_base(pr.base_sha.clone())
            .with_hunks(hunks);

        // Local context needs a checkout with the base commit; without one
        // the local source degrades to empty.
        let files_source: Arc<dyn FileSource> = match GitRepo::open(&self.repo) {
            Ok(repo) => Arc::new(GitFileSource::new(&repo)),
            Err(e) => {
                warn!(error = %e, "No local checkout available, reviewing without local context");
                Arc::new(NullFileSource)
            }
        };

        let publisher: Option<Arc<dyn Publisher>> = if self.dry_run {
            println!("[dry run] publishing and notification disabled");
            None
        } else {
            Some(Arc::new(client))
        };

        self.run(state, files_source, publisher, verbose, config)
            .await
    }

    /// Review a revision range in a local repository
    async fn review_local(&self, verbose: bool, config: &Config) -> anyhow::Result<()> {
        let repo = GitRepo::open(&self.repo)?;
        let base = match &self.base {
            Some(base) => base.clone(),
            None => repo.default_branch()?,
        };

        let base_sha = repo.resolve(&base)?;
        let head_sha = repo.resolve(&self.head)?;
        if base_sha == head_sha {
            println!(
                "Nothing to review: {} and {} point at the same commit",
                base, self.head
            );
            return Ok(());
        }

        let diff = repo.diff_text(&base, &self.head, config.retrieval.context_lines)?;
        let files = parse_diff(&diff);
        let hunks = collect_hunks(&files, config.retrieval.max_hunk_lines);
        if hunks.is_empty() {
            println!("No reviewable changes between {} and {}", base, self.head);
            return Ok(());
        }

        // Name the run after the origin remote when there is one
        let (owner, name) = repo
            .default_remote()
            .ok()
            .and_then(|remote| slug_from_remote(&remote.url))
            .unwrap_or_else(|| ("local".to_string(), dir_name(&repo)));

        println!(
            "Reviewing {}..{} in {} ({} hunks across {} files)",
            base,
            self.head,
            repo.root().display(),
            hunks.len(),
            files.len()
        );

        let mut state = WorkflowState::new(owner, name)
            .with_base(base_sha)
            .with_hunks(hunks);
        state.pr_sha = Some(head_sha);

        let files_source: Arc<dyn FileSource> = Arc::new(GitFileSource::new(&repo));

        // Local runs have no PR to comment on
        self.run(state, files_source, None, verbose, config).await
    }

    /// Wire services and drive the workflow to completion
    async fn run(
        &self,
        state: WorkflowState,
        files: Arc<dyn FileSource>,
        publisher: Option<Arc<dyn Publisher>>,
        verbose: bool,
        config: &Config,
    ) -> anyhow::Result<()> {
        let secrets = Secrets::load()?;

        let generator = Arc::new(ChatClient::new(&config.llm)?);
        let embedder = Arc::new(HttpEmbedder::new(&config.embedding)?);
        let code_index = Arc::new(QdrantIndex::new(
            &config.vector.url,
            &config.vector.code_collection,
            secrets.vector_api_key(),
        )?);
        let conventions_index = Arc::new(QdrantIndex::new(
            &config.vector.url,
            &config.vector.conventions_collection,
            secrets.vector_api_key(),
        )?);
        let audit = Arc::new(FileAuditSink::new(&config.persist.data_dir));

        let mut services = Services::new(
            files,
            code_index,
            conventions_index,
            embedder,
            generator,
            audit,
        );
        if let Some(url) = &config.rerank.url {
            services = services.with_scorer(Arc::new(LazyRerankScorer::new(url)));
        }
        if let Some(publisher) = publisher {
            services = services.with_publisher(publisher);
        }
        if !self.dry_run && config.notify.enabled {
            if let Some(webhook) = secrets.webhook_url() {
                services = services.with_notifier(Arc::new(WebhookNotifier::new(
                    webhook,
                    config.notify.channel.clone(),
                )));
            }
        }

        let (gate, gate_task) = if self.auto_approve {
            (HumanGate::auto_approve(), None)
        } else {
            let (gate, requests) = HumanGate::channel();
            (gate, Some(spawn_terminal_gate(requests)))
        };

        if verbose {
            tracing::info!(run_id = %state.run_id, "Services wired, starting workflow");
        }

        let workflow = ReviewWorkflow::new(services, config.clone(), gate);
        let report = workflow.run(state).await?;

        if let Some(task) = gate_task {
            task.abort();
        }

        print_report(&report);
        Ok(())
    }
}

fn dir_name(repo: &GitRepo) -> String {
    repo.root()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "repository".to_string())
}

fn print_report(report: &RunReport) {
    let state = &report.state;
    let elapsed = chrono::Utc::now() - state.started_at;
    println!();
    println!(
        "Review complete in {}s: {} issue(s), {} fix task(s)",
        elapsed.num_seconds(),
        state.issues.len(),
        state.fix_tasks.len()
    );
    if let Some(guardrail) = &state.guardrail {
        if guardrail.pass {
            println!("Guardrail checks: passed");
        } else {
            println!("Guardrail checks: FAILED");
            for reason in &guardrail.blocking_reasons {
                println!("  - {}", reason);
            }
        }
    }
    if let Some(decision) = &state.decision {
        println!("Decision: {}", decision.action);
    }
    if let Some(url) = &state.posted_comment_url {
        println!("Posted: {}", url);
    }
    if !state.errors.is_empty() {
        println!("Degradations ({}):", state.errors.len());
        for error in &state.errors {
            println!("  - {}", error);
        }
    }
    println!("Audit record: {}", report.record_path.display());
}

/// Answer gate requests from the terminal until the run finishes
fn spawn_terminal_gate(mut requests: mpsc::Receiver<DecisionRequest>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(DecisionRequest { prompt, respond }) = requests.recv().await {
            let decision = tokio::task::spawn_blocking(move || read_decision(&prompt))
                .await
                .unwrap_or_else(|e| {
                    HumanDecision::reject(Some(format!("decision prompt failed: {}", e)))
                });
            let _ = respond.send(decision);
        }
    })
}

/// Prompt on the terminal until a valid choice is made
fn read_decision(prompt: &DecisionPrompt) -> HumanDecision {
    println!();
    println!("{}", prompt.summary);
    println!();
    println!("Options:");
    println!("  1) approve   post the full review");
    println!("  2) edit      adjust the comment in $EDITOR before posting");
    println!("  3) reject    discard without posting");
    println!("  4) summary   post a condensed summary only");

    let stdin = std::io::stdin();
    loop {
        print!("Decision [1-4]: ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => {
                // EOF: nobody is driving this terminal
                return HumanDecision::reject(Some("stdin closed before a decision".to_string()));
            }
            Ok(_) => {}
        }
        match line.trim().to_lowercase().as_str() {
            "1" | "approve" | "a" => return HumanDecision::approve(),
            "2" | "edit" | "e" => match edit_in_editor(&prompt.draft_comment) {
                Ok(content) => return HumanDecision::edit(content),
                Err(e) => println!("Editor failed: {}. Choose again.", e),
            },
            "3" | "reject" | "r" => {
                print!("Feedback (optional): ");
                let _ = std::io::stdout().flush();
                let mut feedback = String::new();
                let _ = stdin.lock().read_line(&mut feedback);
                let feedback = feedback.trim();
                let feedback = (!feedback.is_empty()).then(|| feedback.to_string());
                return HumanDecision::reject(feedback);
            }
            "4" | "summary" | "s" => return HumanDecision::summary_only(),
            other => println!("Unrecognized choice '{}'", other),
        }
    }
}

/// Open the draft comment in $EDITOR and return the edited text
fn edit_in_editor(draft: &str) -> std::io::Result<String> {
    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    let mut file = tempfile::Builder::new()
        .prefix("shrike-review-")
        .suffix(".md")
        .tempfile()?;
    file.write_all(draft.as_bytes())?;
    let path = file.into_temp_path();

    let status = std::process::Command::new(&editor).arg(&path).status()?;
    if !status.success() {
        return Err(std::io::Error::other(format!(
            "{} exited with {}",
            editor, status
        )));
    }

    std::fs::read_to_string(&path)
}
