use crate::config::Config;
use crate::engine::Engine;
use crate::report::Reporter;
use anyhow::{Context, Result, bail};
use glob::glob;
use rayon::prelude::*;
use std::{fs, num::NonZeroUsize, thread};

pub struct Manager {
    cfg: Config,
}

impl Manager {
    pub fn new(cfg: Config) -> Result<Self> {
        cfg.validate().context("failed to validate config")?;
        log::info!("{cfg:#?}");

        if cfg.run.simulations > 1 && cfg.run.identity != 0 {
            log::warn!("ignoring identity {} with multiple simulations", cfg.run.identity);
        }

        Ok(Self { cfg })
    }

    pub fn run_simulations(&self) -> Result<()> {
        let identities = self.cfg.run_identities();

        let header = identities.contains(&0);
        let reporter = Reporter::create(self.cfg.output.report_file.as_ref(), header)
            .context("failed to create reporter")?;

        self.run_with_reporter(&identities, &reporter)
    }

    /// Run every identity on the worker pool, isolating failures to their run.
    pub fn run_with_reporter(&self, identities: &[usize], reporter: &Reporter) -> Result<()> {
        let n_threads = self.n_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|i_thread| format!("contagion-worker-{i_thread}"))
            .build()
            .context("failed to build worker pool")?;
        log::info!("running {} simulations on {n_threads} threads", identities.len());

        let failed: Vec<usize> = pool.install(|| {
            identities
                .par_iter()
                .filter_map(|&identity| match self.run_simulation(identity, reporter) {
                    Ok(()) => None,
                    Err(error) => {
                        log::error!("run {identity} failed: {error:#?}");
                        Some(identity)
                    }
                })
                .collect()
        });

        reporter.flush().context("failed to flush reports")?;

        if !failed.is_empty() {
            bail!("{} of {} runs failed: {failed:?}", failed.len(), identities.len());
        }

        Ok(())
    }

    fn run_simulation(&self, identity: usize, reporter: &Reporter) -> Result<()> {
        let mut engine = Engine::new(identity, self.cfg.clone())
            .with_context(|| format!("failed to create engine of run {identity}"))?;
        log::info!("starting run {} ({:?} infection)", engine.identity(), engine.infection());

        engine
            .perform_simulation(reporter)
            .with_context(|| format!("failed to perform run {identity}"))?;

        log::info!(
            "finished run {identity}: {} agents, {} infections, {} infection deaths",
            engine.population().len(),
            engine.total_infections(),
            engine.infection_deaths()
        );

        Ok(())
    }

    /// Remove every agent dump file and return how many were removed.
    pub fn clean_dumps(&self) -> Result<usize> {
        let pattern = self.cfg.output.dump_pattern();
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;

        let mut count = 0;
        for file in glob(pattern).context("failed to glob dump files")? {
            let file = file.context("failed to read glob entry")?;
            fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
            count += 1;
        }
        log::info!("removed {count} dump files");

        Ok(count)
    }

    fn n_threads(&self) -> usize {
        match self.cfg.run.threads {
            0 => thread::available_parallelism().map_or(1, NonZeroUsize::get),
            n_threads => n_threads,
        }
    }
}
