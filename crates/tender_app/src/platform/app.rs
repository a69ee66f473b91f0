use std::time::Duration;

use anyhow::{bail, Context};
use pipeline_logging::{pipeline_info, pipeline_warn};
use tender_core::{update, AppState, ConversionState, GenerationJob, JobStage, Msg, SyncStatus};
use tender_engine::{EngineHandle, ExportDir};

use super::config::AppConfig;
use super::effects::EffectRunner;
use super::output::save_job;
use super::report::{print_notice, Reporter};
use crate::args::Args;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run_app(args: Args) -> anyhow::Result<()> {
    let config = AppConfig::from_args(&args)?;
    pipeline_logging::initialize(config.log.into(), config.level_filter()?, &config.log_file);
    match &config.loaded_from {
        Some(path) => pipeline_info!("loaded settings from {}", path.display()),
        None => pipeline_info!("no settings file at {}; using defaults", args.config.display()),
    }

    let request = config.generation_request()?;
    let target = config.target(&request);
    let title = config.title(&request);

    let out = ExportDir::open(&config.output_dir)
        .with_context(|| format!("output directory {}", config.output_dir.display()))?;

    let engine = EngineHandle::new(config.engine_settings()).context("starting engine")?;
    let mut session = Session::new(EffectRunner::new(engine), target.clone());
    pipeline_info!("starting {} for {target}", request.kind);
    session.dispatch(Msg::StartGeneration {
        target: target.clone(),
        request,
    });

    let mut manual_sync_sent = false;
    loop {
        let msg = session.runner.next_msg(POLL_INTERVAL);
        session.dispatch(msg);

        let Some(job) = session.state.job(&target) else {
            bail!("job for {target} disappeared");
        };
        if !is_settled(job) {
            continue;
        }
        let sync_failed = job
            .sync_record()
            .is_some_and(|record| record.status() == SyncStatus::Failed);
        if sync_failed && config.retry_sync && !manual_sync_sent {
            manual_sync_sent = true;
            pipeline_info!("retrying sync for {target}");
            session.dispatch(Msg::SyncRequested {
                target: target.clone(),
            });
            continue;
        }
        break;
    }

    let Some(job) = session.state.job(&target) else {
        bail!("job for {target} disappeared");
    };
    match job.stage() {
        JobStage::Completed => {
            let saved = save_job(&out, job, &title)?;
            println!("saved {}", saved.markdown.display());
            if let Some(html) = saved.editable_html {
                println!("saved {}", html.display());
            }
            Ok(())
        }
        stage => bail!(
            "generation ended as {stage:?}: {}",
            job.failure_reason().unwrap_or("no reason given")
        ),
    }
}

/// The stream is over and neither conversion nor sync is still outstanding.
fn is_settled(job: &GenerationJob) -> bool {
    if !job.stage().is_terminal() {
        return false;
    }
    let converting = matches!(job.conversion(), ConversionState::Pending { .. });
    let syncing = job
        .sync_record()
        .is_some_and(|record| record.status() == SyncStatus::Syncing);
    !converting && !syncing
}

struct Session {
    state: AppState,
    runner: EffectRunner,
    reporter: Reporter,
    target: String,
}

impl Session {
    fn new(runner: EffectRunner, target: String) -> Self {
        Self {
            state: AppState::new(),
            runner,
            reporter: Reporter::new(),
            target,
        }
    }

    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        let was_dirty = state.consume_dirty();
        self.state = state;

        for notice in self.runner.enqueue(effects) {
            print_notice(&notice);
        }
        if was_dirty {
            match self.state.job(&self.target) {
                Some(job) => {
                    for line in self.reporter.lines(job) {
                        println!("{line}");
                    }
                }
                None => pipeline_warn!("no job for {} after update", self.target),
            }
        }
    }
}
