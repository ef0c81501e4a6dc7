use crate::config::{Config, InfectionMethod};
use crate::model::{Population, State};
use crate::report::{Reporter, write_agent_dump};
use crate::rng::RandomStream;
use crate::stats::{Record, Statistics};
use anyhow::{Context, Result};

/// Infection sampling algorithm of a run, resolved once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Infection {
    /// Random pairs of agents meet; a susceptible agent meeting an infectious one is infected.
    Pairwise,
    /// Susceptible agents among the first `encounters` positions are infected
    /// if the agent at the matching position after a shuffle is infectious.
    ScanShuffle,
}

impl Infection {
    /// Resolve the method for run `identity`: even runs pair, odd runs scan.
    pub fn resolve(method: InfectionMethod, identity: usize) -> Self {
        match method {
            InfectionMethod::One => Infection::Pairwise,
            InfectionMethod::Two => Infection::ScanShuffle,
            InfectionMethod::Both if identity % 2 == 0 => Infection::Pairwise,
            InfectionMethod::Both => Infection::ScanShuffle,
        }
    }
}

/// Simulation engine.
///
/// Holds the configuration, agent store, counters and random stream of a
/// single run, and applies the event pipeline to them.
pub struct Engine {
    identity: usize,
    cfg: Config,
    pop: Population,
    total_infections: usize,
    infection_deaths: usize,
    rng: RandomStream,
    infection: Infection,
}

impl Engine {
    /// Create the engine of run `identity`, seeding its random stream with the identity.
    pub fn new(identity: usize, cfg: Config) -> Result<Self> {
        let mut rng = RandomStream::new(identity as u64);

        let pop = Population::new(cfg.init.n_agents, cfg.init.n_infections, &mut rng)
            .context("failed to create initial population")?;

        let infection = Infection::resolve(cfg.model.infection_method, identity);

        Ok(Self {
            identity,
            total_infections: cfg.init.n_infections,
            infection_deaths: 0,
            cfg,
            pop,
            rng,
            infection,
        })
    }

    pub fn identity(&self) -> usize {
        self.identity
    }

    pub fn infection(&self) -> Infection {
        self.infection
    }

    pub fn population(&self) -> &Population {
        &self.pop
    }

    pub fn total_infections(&self) -> usize {
        self.total_infections
    }

    pub fn infection_deaths(&self) -> usize {
        self.infection_deaths
    }

    pub fn statistics(&self) -> Statistics {
        Statistics::from_agents(self.pop.agents())
    }

    pub fn record(&self, iteration: usize) -> Record {
        Record {
            identity: self.identity,
            iteration,
            stats: self.statistics(),
            total_infections: self.total_infections,
            infection_deaths: self.infection_deaths,
        }
    }

    /// Run every iteration, reporting at iteration 0, every report interval and the end.
    pub fn perform_simulation(&mut self, reporter: &Reporter) -> Result<()> {
        let n_iter = self.cfg.run.iterations;
        let report_interval = self.cfg.output.report_interval;

        self.report(0, reporter)?;

        for i_iter in 0..n_iter {
            self.perform_step()
                .with_context(|| format!("failed to perform iteration {i_iter}"))?;

            if i_iter != 0 && i_iter % report_interval == 0 {
                self.report(i_iter, reporter)?;

                let progress = 100.0 * i_iter as f64 / n_iter as f64;
                log::debug!("run {} completed {progress:06.2}%", self.identity);
            }
        }

        if n_iter > 0 {
            self.report(n_iter, reporter)?;
        }

        Ok(())
    }

    /// Apply the event pipeline once.
    pub fn perform_step(&mut self) -> Result<()> {
        self.grow().context("failed to grow population")?;
        self.infect().context("failed to infect agents")?;
        self.recover();
        self.vaccinate();
        self.regress();
        self.die();
        debug_assert_eq!(self.statistics().total(), self.pop.len());
        Ok(())
    }

    fn report(&mut self, iteration: usize, reporter: &Reporter) -> Result<()> {
        reporter
            .emit(&self.record(iteration))
            .with_context(|| format!("failed to report iteration {iteration}"))?;

        let steps_per_dump = self.cfg.output.output_agents;
        if steps_per_dump > 0 && iteration > 0 && iteration % steps_per_dump == 0 {
            let file = self.cfg.output.dump_file(self.identity, iteration);
            write_agent_dump(&file, self.pop.sorted_by_identity())
                .with_context(|| format!("failed to dump agents to {file:?}"))?;
            log::info!("wrote {file:?}");
        }

        Ok(())
    }

    /// Add `round(growth * non-dead)` susceptible agents.
    pub fn grow(&mut self) -> Result<()> {
        let n_alive = self.pop.count_not_state(State::Dead);
        let n_new = (self.cfg.model.growth * n_alive as f64).round() as usize;
        self.pop.grow(n_new)
    }

    pub fn infect(&mut self) -> Result<()> {
        match self.infection {
            Infection::Pairwise => self.infect_pairwise(),
            Infection::ScanShuffle => self.infect_scan_shuffle(),
        }
    }

    fn infect_pairwise(&mut self) -> Result<()> {
        if self.pop.is_empty() {
            return Ok(());
        }
        let n_agt = self.pop.len() as u64;

        for _ in 0..self.cfg.model.encounters {
            let i_agt_a = self.rng.bounded(n_agt)? as usize;
            let i_agt_b = self.rng.bounded(n_agt)? as usize;

            match (self.pop.state(i_agt_a), self.pop.state(i_agt_b)) {
                (State::Susceptible, State::Infectious) => {
                    self.pop.set_state(i_agt_a, State::Infectious);
                    self.total_infections += 1;
                }
                (State::Infectious, State::Susceptible) => {
                    self.pop.set_state(i_agt_b, State::Infectious);
                    self.total_infections += 1;
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn infect_scan_shuffle(&mut self) -> Result<()> {
        // Only the first `encounters` positions are scanned, however many match.
        let n_scan = self.cfg.model.encounters.min(self.pop.len());
        let i_agt_sus: Vec<usize> = (0..n_scan)
            .filter(|&i_agt| self.pop.state(i_agt) == State::Susceptible)
            .collect();

        self.pop.shuffle(&mut self.rng)?;

        // Positions before the shuffle are paired with positions after it.
        for (i_pos, &i_agt) in i_agt_sus.iter().enumerate() {
            // Only dead, recovered and vaccinated targets are skipped;
            // an infectious target is counted again.
            if self.pop.state(i_pos) == State::Infectious
                && matches!(self.pop.state(i_agt), State::Susceptible | State::Infectious)
            {
                self.pop.set_state(i_agt, State::Infectious);
                self.total_infections += 1;
            }
        }

        Ok(())
    }

    pub fn recover(&mut self) {
        let prob = self.cfg.model.recovery_prob;
        for agt in self.pop.agents_mut() {
            if agt.state() == State::Infectious && self.rng.uniform01() < prob {
                agt.set_state(State::Recovered);
            }
        }
    }

    pub fn vaccinate(&mut self) {
        let prob = self.cfg.model.vaccination_prob;
        for agt in self.pop.agents_mut() {
            if agt.state() == State::Susceptible && self.rng.uniform01() < prob {
                agt.set_state(State::Vaccinated);
            }
        }
    }

    /// Return vaccinated and recovered agents to the susceptible state.
    pub fn regress(&mut self) {
        let prob = self.cfg.model.regression_prob;
        for agt in self.pop.agents_mut() {
            if matches!(agt.state(), State::Vaccinated | State::Recovered)
                && self.rng.uniform01() < prob
            {
                agt.set_state(State::Susceptible);
            }
        }
    }

    pub fn die(&mut self) {
        let prob_sus = self.cfg.model.death_prob_susceptible;
        let prob_inf = self.cfg.model.death_prob_infectious;
        for agt in self.pop.agents_mut() {
            match agt.state() {
                State::Susceptible => {
                    if self.rng.uniform01() < prob_sus {
                        agt.set_state(State::Dead);
                    }
                }
                State::Infectious => {
                    if self.rng.uniform01() < prob_inf {
                        agt.set_state(State::Dead);
                        self.infection_deaths += 1;
                    }
                }
                _ => {}
            }
        }
    }
}
