//! `review` command: ingest a diff, run the configured passes, resolve
//! findings against diff-addressable lines, and publish (or print) the
//! result.

use crate::agent::{Agent, CfaAgent};
use crate::budget::{Budget, BudgetLimits};
use crate::cache::ResultCache;
use crate::cli::ReviewArgs;
use crate::config::Config;
use crate::diff::store::{DiffStore, LocalDiffMode};
use crate::diff::ChangeSet;
use crate::ignore::IgnoreMatcher;
use crate::line_resolver::{DriftSeverity, LineMap};
use crate::pipeline::{group_adjacent, run_pipeline};
use crate::preflight::run_preflight;
use crate::reporter::ado::AdoReporter;
use crate::reporter::github::GithubReporter;
use crate::reporter::{build_inline_comments, OverallStatus, ReportPayload, Reporter, SummaryElement};
use crate::runner::{PassRunner, RunIdentity};
use crate::types::{stable_fingerprint, Finding, Severity};
use crate::utils::progress::ProgressReporter;
use anyhow::{anyhow, Context, Result};
use is_terminal::IsTerminal;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

pub async fn run(args: ReviewArgs, config: &Config, config_path: &str) -> Result<()> {
    let store = DiffStore::new(&args.repo);
    let mut change_set = if let Some(range) = &args.range {
        store.get_diff_from_spec(range)?
    } else if args.staged {
        store.get_local_diff(LocalDiffMode::Staged, &config.git.default_base_ref)?
    } else if args.working_tree {
        store.get_local_diff(LocalDiffMode::WorkingTree, &config.git.default_base_ref)?
    } else {
        store.get_diff(&config.git.default_base_ref, "HEAD")?
    };

    apply_ignore_filters(&mut change_set, &args.repo, config)?;

    let preflight = run_preflight(config, config_path);
    for warning in &preflight.warnings {
        warn!(%warning, "preflight warning");
    }
    if !preflight.valid {
        return Err(anyhow!("preflight failed: {}", preflight.errors.join("; ")));
    }

    let config_toml = toml::to_string(config)?;
    let config_hash = stable_fingerprint(&[config_toml.as_str()]);
    let identity = RunIdentity {
        pr: args.pr.clone(),
        head_sha: change_set.head_sha.clone(),
        config_hash,
        is_direct_main_branch_push: args.main_branch_push,
    };

    let mut agents: HashMap<String, Box<dyn Agent>> = HashMap::new();
    agents.insert("cfa-core".to_string(), Box::new(CfaAgent));

    let mut budget = Budget::new(BudgetLimits::from(&config.budget));
    let cache_path = args.repo.join(".router-cache/results.json");
    let mut cache = ResultCache::load(cache_path).await.context("loading result cache")?;
    let now_unix_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;

    let mut progress = ProgressReporter::new(std::io::stdout().is_terminal());
    progress.start_scan(change_set.files.len());

    let reporter = if args.dry_run {
        None
    } else {
        build_reporter(config, &args, &change_set)?
    };
    if let Some(reporter) = &reporter {
        reporter.start_status().await?;
    }

    let runner = PassRunner::new(identity, args.repo.clone());
    let outcome = runner
        .run(config, &change_set, &agents, &mut budget, &mut cache, now_unix_ms)
        .await?;
    cache.save().await.context("saving result cache")?;
    progress.finish(&format!("analyzed {} file(s)", change_set.files.len()));

    let line_map = LineMap::build(&change_set);
    let complete = resolve_lines(&line_map, outcome.complete, args.additions_only);
    let partial = resolve_lines(&line_map, outcome.partial, args.additions_only);

    let drift_stats = line_map.normalize_for_diff(&complete, args.additions_only, true);
    let drift = line_map.compute_drift(&drift_stats);

    let pipeline_output = run_pipeline(complete, partial, config.reporter.line_proximity_threshold);

    info!(
        complete = pipeline_output.complete.len(),
        partial = pipeline_output.partial.len(),
        drift_percent = drift.degradation_percent,
        "review complete"
    );

    if args.dry_run {
        print_findings(&pipeline_output.complete, &pipeline_output.partial);
        return Ok(());
    }

    let fail_on_severity = config.reporter.fail_on_severity.unwrap_or(Severity::Warning);
    let status = overall_status(&pipeline_output.complete, fail_on_severity);
    let mut summary = build_summary(&pipeline_output.complete, &pipeline_output.partial, status);

    let drift_active = drift.severity == DriftSeverity::Severe;
    let inline_comments = if drift_active {
        summary.body_markdown.push_str(
            "\n**Drift gate active**: too many findings landed off the diff to place inline comments reliably; see the full finding list above.\n",
        );
        Vec::new()
    } else {
        let groups = group_adjacent(&pipeline_output.complete, config.reporter.line_proximity_threshold.unwrap_or(crate::pipeline::LINE_PROXIMITY_THRESHOLD));
        build_inline_comments(&groups, config.reporter.max_inline_comments)
    };

    let payload = ReportPayload {
        summary,
        inline_comments,
        drift: Some(drift),
    };

    match reporter {
        Some(reporter) => reporter.publish(&payload).await?,
        None => print_findings(&pipeline_output.complete, &pipeline_output.partial),
    }

    if status == OverallStatus::Failure {
        std::process::exit(1);
    }
    Ok(())
}

fn apply_ignore_filters(change_set: &mut ChangeSet, repo: &std::path::Path, config: &Config) -> Result<()> {
    let mut matcher = IgnoreMatcher::new();
    if let Some(ignore_file) = &config.ignore.ignore_file {
        let path = repo.join(ignore_file);
        if let Ok(contents) = std::fs::read_to_string(&path) {
            matcher.load_ignore_file(&contents);
        }
    }
    matcher.load_excludes(&config.ignore.exclude);
    matcher.load_includes(&config.ignore.include);
    change_set
        .files
        .retain(|f| !matcher.is_ignored(std::path::Path::new(&f.path)));
    Ok(())
}

/// Snaps each finding's line onto the nearest diff-addressable line, or
/// drops the line entirely (downstream grouping then treats it as
/// file-level) when no nearby line exists.
fn resolve_lines(line_map: &LineMap, findings: Vec<Finding>, additions_only: bool) -> Vec<Finding> {
    findings
        .into_iter()
        .map(|mut f| {
            let Some(line) = f.line else { return f };
            match line_map.validate(&f.file, line, additions_only, true) {
                crate::line_resolver::LineValidation::Valid => f,
                crate::line_resolver::LineValidation::Invalid { nearest, .. } => {
                    f.line = nearest;
                    f
                }
            }
        })
        .collect()
}

/// Gates on the worst severity present against `fail_on_severity`: an
/// error always fails; a warning fails when `fail_on_severity` is error or
/// warning; an info finding fails only when `fail_on_severity` is info
/// exactly. Anything not meeting its failing threshold that still has
/// findings reports neutral rather than success.
fn overall_status(complete: &[Finding], fail_on_severity: Severity) -> OverallStatus {
    let has_error = complete.iter().any(|f| f.severity == Severity::Error);
    let has_warning = complete.iter().any(|f| f.severity == Severity::Warning);
    let has_info = complete.iter().any(|f| f.severity == Severity::Info);

    if has_error {
        return OverallStatus::Failure;
    }
    if has_warning && fail_on_severity <= Severity::Warning {
        return OverallStatus::Failure;
    }
    if has_info && fail_on_severity == Severity::Info {
        return OverallStatus::Failure;
    }
    if has_warning || has_info {
        OverallStatus::Neutral
    } else {
        OverallStatus::Success
    }
}

fn build_summary(complete: &[Finding], partial: &[Finding], status: OverallStatus) -> SummaryElement {
    let errors = complete.iter().filter(|f| f.severity == Severity::Error).count();
    let warnings = complete.iter().filter(|f| f.severity == Severity::Warning).count();
    let infos = complete.iter().filter(|f| f.severity == Severity::Info).count();
    let mut body = format!(
        "**{errors}** error(s), **{warnings}** warning(s), **{infos}** info finding(s).\n"
    );
    if !partial.is_empty() {
        body.push_str(&format!(
            "\n{} additional finding(s) came from a degraded run and are informational only.\n",
            partial.len()
        ));
    }
    SummaryElement {
        title: "Review router findings".to_string(),
        body_markdown: body,
        status,
    }
}

fn print_findings(complete: &[Finding], partial: &[Finding]) {
    for f in complete {
        println!(
            "{} {}:{} [{}] {}",
            f.severity,
            f.file,
            f.line.map(|l| l.to_string()).unwrap_or_else(|| "-".to_string()),
            f.rule_id,
            f.message
        );
    }
    for f in partial {
        println!(
            "(partial) {} {}:{} [{}] {}",
            f.severity,
            f.file,
            f.line.map(|l| l.to_string()).unwrap_or_else(|| "-".to_string()),
            f.rule_id,
            f.message
        );
    }
}

fn build_reporter(
    config: &Config,
    args: &ReviewArgs,
    change_set: &ChangeSet,
) -> Result<Option<Box<dyn Reporter>>> {
    if config.reporter.github.enabled {
        let token = std::env::var("GITHUB_TOKEN").context("GITHUB_TOKEN is required to publish to github")?;
        let pr_number: u64 = args.pr.parse().context("--pr must be numeric to publish to github")?;
        let api_base_url = config
            .reporter
            .github
            .api_base_url
            .clone()
            .unwrap_or_else(|| "https://api.github.com".to_string());
        return Ok(Some(Box::new(GithubReporter::new(
            api_base_url,
            config.reporter.github.repository.clone(),
            token,
            pr_number,
            change_set.check_sha.clone(),
        ))));
    }
    if config.reporter.ado.enabled {
        let token = std::env::var("AZURE_DEVOPS_TOKEN")
            .or_else(|_| std::env::var("SYSTEM_ACCESSTOKEN"))
            .context("AZURE_DEVOPS_TOKEN is required to publish to azure devops")?;
        let pr_id: u64 = args.pr.parse().context("--pr must be numeric to publish to azure devops")?;
        return Ok(Some(Box::new(AdoReporter::new(
            config.reporter.ado.organization.clone(),
            config.reporter.ado.project.clone(),
            config.reporter.ado.repository.clone(),
            pr_id,
            token,
        ))));
    }
    Ok(None)
}
