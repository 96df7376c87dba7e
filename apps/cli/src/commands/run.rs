use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;
use futures::StreamExt;
use keycycle_aws::{AssumeRoleSessionProvider, IamAccountScanner, RetryPolicy};
use keycycle_core::{Pipeline, RunReport, Settings, TriggerEvent, parse_events};
use keycycle_notifier::{SesNotifier, TemplateStore};
use tokio::io::AsyncReadExt;
use tracing::Instrument;

#[derive(Args)]
pub struct RunArgs {
    /// Trigger record(s) as JSON: one object or an array. `-` reads stdin.
    #[arg(long, conflicts_with_all = ["account", "name", "email", "dry_run", "force_rotate_user"])]
    event: Option<PathBuf>,

    /// Account id to evaluate
    #[arg(long, required_unless_present = "event", requires_all = ["name", "email"])]
    account: Option<String>,

    /// Account name used in notifications
    #[arg(long)]
    name: Option<String>,

    /// Notification recipient
    #[arg(long)]
    email: Option<String>,

    /// Report actions without applying them
    #[arg(long)]
    dry_run: bool,

    /// Rotate this user's keys regardless of age (repeatable)
    #[arg(long, value_name = "USER")]
    force_rotate_user: Vec<String>,

    /// Accounts evaluated in parallel
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    concurrency: u16,
}

pub async fn execute(args: RunArgs, config: Option<&Path>, root: tracing::Span) -> Result<()> {
    let settings = Settings::load(config).context("invalid settings")?;
    let events = read_events(&args).await?;
    tracing::info!(accounts = events.len(), "Starting account runs");

    let pipeline = build_pipeline(&settings).await?;
    let concurrency = usize::from(args.concurrency);

    let results: Vec<(TriggerEvent, Result<RunReport, keycycle_core::RunError>)> =
        futures::stream::iter(events)
            .map(|event| {
                let pipeline = pipeline.clone();
                async move {
                    let result = pipeline.run(&event).await;
                    (event, result)
                }
                .instrument(root.clone())
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

    let mut run_failures = 0;
    let mut action_failures = 0;
    for (event, result) in &results {
        match result {
            Ok(report) => {
                let failed = report.execution.as_ref().map_or(0, |e| e.failed());
                action_failures += failed;
                println!(
                    "{account} ({name}): {mode}, {actions} action(s), {pending} pending, {failed} failed, notified: {notified}",
                    account = report.account_id,
                    name = event.name,
                    mode = report.mode,
                    actions = report.actions.len(),
                    pending = report.pending.len(),
                    notified = report.notified,
                );
                if let Some(execution) = &report.execution {
                    for (spec, error) in execution.failures() {
                        tracing::error!(
                            account = %report.account_id,
                            user = %spec.key.user_name,
                            key_id = %spec.key.access_key_id,
                            action = %spec.action,
                            error = %error,
                            "Action failed"
                        );
                    }
                }
            }
            Err(e) => {
                run_failures += 1;
                tracing::error!(account = %event.account, error = %e, "Account run failed");
                println!("{} ({}): failed: {e}", event.account, event.name);
            }
        }
    }

    if run_failures > 0 || action_failures > 0 {
        bail!(
            "{run_failures} of {} account run(s) failed, {action_failures} action(s) failed",
            results.len()
        );
    }
    Ok(())
}

async fn read_events(args: &RunArgs) -> Result<Vec<TriggerEvent>> {
    if let Some(path) = &args.event {
        let input = if path.as_os_str() == "-" {
            let mut input = String::new();
            tokio::io::stdin()
                .read_to_string(&mut input)
                .await
                .context("failed to read trigger records from stdin")?;
            input
        } else {
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?
        };
        return parse_events(&input).context("rejected trigger input");
    }

    let record = serde_json::json!({
        "account": args.account,
        "name": args.name,
        "email": args.email,
        "dryrun": args.dry_run,
        "forceRotateUsers": args.force_rotate_user,
    });
    let event = TriggerEvent::from_value(record).context("rejected trigger arguments")?;
    Ok(vec![event])
}

async fn build_pipeline(settings: &Settings) -> Result<Pipeline> {
    let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let retry = RetryPolicy::default();

    let sessions = AssumeRoleSessionProvider::new(
        aws.clone(),
        settings.iam_assumed_role_name.clone(),
        settings.role_session_name.clone(),
        retry,
    );
    let scanner = IamAccountScanner::new(settings.iam_exemption_group.clone());
    let notifier = SesNotifier::from_config(
        &aws,
        settings.sender_email.clone(),
        TemplateStore::new(&settings.template_dir),
    );

    Pipeline::new(
        settings,
        Arc::new(sessions),
        Arc::new(scanner),
        Arc::new(notifier),
    )
    .context("invalid retention window")
}
