use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use crate::cli::RunArgs;
use crate::error::CommandError;
use crate::events::Event;
use crate::exit_codes::exit;
use crate::fsops;
use crate::index;
use crate::ledger::RollbackLedger;
use crate::model::{self, GenerationPlan};
use crate::reporter::Reporter;
use crate::tasks::TaskRunner;
use crate::validate;

/// Manifest and root after CLI overrides and validation.
struct Prepared {
    plan: GenerationPlan,
    root: PathBuf,
    index: Option<PathBuf>,
}

fn prepare(args: &RunArgs) -> Result<Prepared> {
    let mut plan = model::load_plan(&args.manifest)
        .context("failed to load manifest")
        .map_err(|e| CommandError::invalid_input(format!("{e:#}")))?;
    if let Some(root) = &args.root {
        plan.root = root.clone();
    }
    plan.validate().map_err(CommandError::invalid_input)?;
    let root = crate::resolve::resolve_root(&plan.root)?;
    if !root.is_dir() {
        return Err(CommandError::invalid_input(format!(
            "root is not a directory: {}",
            root.display()
        ))
        .into());
    }
    let index = validate::resolve_index(&plan, &root).map_err(CommandError::invalid_input)?;
    Ok(Prepared { plan, root, index })
}

pub async fn generate(args: RunArgs) -> Result<i32> {
    let mut reporter = Reporter::new(args.json);
    let Prepared { plan, root, index } = prepare(&args)?;
    let files = validate::normalize_generate(&plan, &root).map_err(CommandError::invalid_input)?;

    let ledger = RollbackLedger::with_base(&root);
    let mut runner = TaskRunner::new();
    let files = files.into_iter().map(|f| (f.target, f.content)).collect();
    for task in fsops::write_files_tasks(&ledger, &root, files, args.force) {
        runner.push(task);
    }

    run(
        "generate",
        &args,
        ledger,
        runner,
        root,
        index,
        plan.content_bytes(),
        &mut reporter,
    )
    .await
}

pub async fn destroy(args: RunArgs) -> Result<i32> {
    let mut reporter = Reporter::new(args.json);
    let Prepared { plan, root, index } = prepare(&args)?;
    let targets = validate::normalize_destroy(&plan, &root).map_err(CommandError::invalid_input)?;

    let ledger = RollbackLedger::with_base(&root);
    let mut runner = TaskRunner::new();
    for task in fsops::delete_files_tasks(&ledger, &root, targets) {
        runner.push(task);
    }

    run("destroy", &args, ledger, runner, root, index, 0, &mut reporter).await
}

#[allow(clippy::too_many_arguments)]
async fn run(
    command: &str,
    args: &RunArgs,
    ledger: RollbackLedger,
    mut runner: TaskRunner,
    root: PathBuf,
    index: Option<PathBuf>,
    bytes: u64,
    reporter: &mut Reporter,
) -> Result<i32> {
    let run_id = uuid::Uuid::new_v4();
    if let Some(index_path) = index {
        runner.push(index::update_index_task(&ledger, root, index_path));
    }
    let rollback = args.rollback_armed();
    if rollback {
        ledger.attach_to_task_runner(&mut runner);
    }

    reporter.record(Event::RunStarted {
        run_id,
        command: command.to_string(),
        tasks: runner.len(),
        rollback,
    });
    info!(%run_id, command, tasks = runner.len(), rollback, "starting run");

    let started = Instant::now();
    match runner.run(reporter).await {
        Ok(_) => {
            reporter.record(Event::RunCompleted {
                run_id,
                at: chrono::Utc::now(),
            });
            if !reporter.json_mode() {
                println!("{}", reporter.summary(bytes, started.elapsed()));
            }
            Ok(exit::SUCCESS)
        }
        Err(failure) => {
            reporter.record(Event::RunAborted {
                run_id,
                at: chrono::Utc::now(),
            });
            Err(failure.into())
        }
    }
}
