//! Agents and the agent store.

use crate::rng::RandomStream;
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::fmt;

/// Health state of an agent.
///
/// `Dead` is absorbing: no event moves an agent out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum State {
    #[serde(rename = "S")]
    Susceptible,
    #[serde(rename = "I")]
    Infectious,
    #[serde(rename = "R")]
    Recovered,
    #[serde(rename = "V")]
    Vaccinated,
    #[serde(rename = "D")]
    Dead,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            State::Susceptible => "S",
            State::Infectious => "I",
            State::Recovered => "R",
            State::Vaccinated => "V",
            State::Dead => "D",
        };
        f.write_str(letter)
    }
}

/// Member of the simulated population.
///
/// The identity is the agent's position of origin and is never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Agent {
    #[serde(rename = "id")]
    identity: usize,
    state: State,
}

impl Agent {
    /// Create a new agent with a given identity and state.
    pub fn new(identity: usize, state: State) -> Self {
        Self { identity, state }
    }

    /// Get the identity of the agent.
    pub fn identity(&self) -> usize {
        self.identity
    }

    /// Get the current state of the agent.
    pub fn state(&self) -> State {
        self.state
    }

    /// Set the current state of the agent.
    pub fn set_state(&mut self, state: State) {
        debug_assert!(
            self.state != State::Dead || state == State::Dead,
            "agent {} cannot leave the dead state",
            self.identity
        );
        self.state = state;
    }
}

/// Append-only store of agents.
///
/// Agents are never removed; dead agents stay as inert records.
#[derive(Debug, Clone)]
pub struct Population {
    agt_vec: Vec<Agent>,
}

impl Population {
    /// Create `n_agt` susceptible agents, shuffle them and mark the first
    /// `n_inf` as infectious.
    pub fn new(n_agt: usize, n_inf: usize, rng: &mut RandomStream) -> Result<Self> {
        if n_inf > n_agt {
            bail!("number of infections ({n_inf}) exceeds number of agents ({n_agt})");
        }

        let mut agt_vec = Vec::new();
        agt_vec
            .try_reserve_exact(n_agt)
            .context("failed to allocate agent storage")?;
        agt_vec.extend((0..n_agt).map(|identity| Agent::new(identity, State::Susceptible)));

        rng.shuffle(&mut agt_vec)
            .context("failed to shuffle initial agents")?;
        for agt in &mut agt_vec[..n_inf] {
            agt.set_state(State::Infectious);
        }

        Ok(Self { agt_vec })
    }

    pub fn len(&self) -> usize {
        self.agt_vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agt_vec.is_empty()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agt_vec
    }

    pub fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agt_vec
    }

    pub fn state(&self, i_agt: usize) -> State {
        self.agt_vec[i_agt].state()
    }

    pub fn set_state(&mut self, i_agt: usize, state: State) {
        self.agt_vec[i_agt].set_state(state);
    }

    /// Count agents in the given state.
    pub fn count_state(&self, state: State) -> usize {
        self.agt_vec.iter().filter(|agt| agt.state == state).count()
    }

    /// Count agents not in the given state.
    pub fn count_not_state(&self, state: State) -> usize {
        self.agt_vec.len() - self.count_state(state)
    }

    /// Append `n_new` susceptible agents with fresh identities.
    ///
    /// Storage grows by at least half its current capacity whenever it is
    /// exceeded; allocation failure is returned as an error.
    pub fn grow(&mut self, n_new: usize) -> Result<()> {
        let n_agt = self.agt_vec.len();
        let n_req = n_agt
            .checked_add(n_new)
            .context("number of agents overflows")?;

        let cap = self.agt_vec.capacity();
        if n_req > cap {
            let n_cap = n_req.max(cap + cap / 2);
            self.agt_vec
                .try_reserve_exact(n_cap - n_agt)
                .with_context(|| format!("failed to grow agent storage to {n_cap}"))?;
        }

        // Identities are dense, so the next one is the current length.
        self.agt_vec
            .extend((n_agt..n_req).map(|identity| Agent::new(identity, State::Susceptible)));

        Ok(())
    }

    /// Permute the whole store, dead agents included.
    pub fn shuffle(&mut self, rng: &mut RandomStream) -> Result<()> {
        rng.shuffle(&mut self.agt_vec)
    }

    /// Agents ordered by identity, without reordering the store.
    pub fn sorted_by_identity(&self) -> Vec<&Agent> {
        let mut sorted: Vec<_> = self.agt_vec.iter().collect();
        sorted.sort_by_key(|agt| agt.identity());
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identities(pop: &Population) -> Vec<usize> {
        let mut ids: Vec<_> = pop.agents().iter().map(Agent::identity).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn new_population_seeds_infections() {
        let mut rng = RandomStream::new(9);
        let pop = Population::new(100, 10, &mut rng).unwrap();
        assert_eq!(pop.len(), 100);
        assert_eq!(pop.count_state(State::Infectious), 10);
        assert_eq!(pop.count_state(State::Susceptible), 90);
        assert_eq!(identities(&pop), (0..100).collect::<Vec<_>>());

        // Infectious agents are the first ones after shuffling.
        assert!(
            pop.agents()[..10]
                .iter()
                .all(|agt| agt.state() == State::Infectious)
        );
    }

    #[test]
    fn new_population_is_deterministic() {
        let pop_a = Population::new(50, 5, &mut RandomStream::new(4)).unwrap();
        let pop_b = Population::new(50, 5, &mut RandomStream::new(4)).unwrap();
        assert_eq!(pop_a.agents(), pop_b.agents());
    }

    #[test]
    fn new_population_rejects_too_many_infections() {
        let mut rng = RandomStream::new(0);
        assert!(Population::new(5, 6, &mut rng).is_err());
    }

    #[test]
    fn grow_appends_fresh_identities() {
        let mut rng = RandomStream::new(1);
        let mut pop = Population::new(10, 2, &mut rng).unwrap();
        pop.grow(5).unwrap();
        assert_eq!(pop.len(), 15);
        assert_eq!(identities(&pop), (0..15).collect::<Vec<_>>());
        assert!(
            pop.agents()[10..]
                .iter()
                .all(|agt| agt.state() == State::Susceptible)
        );
        pop.grow(0).unwrap();
        assert_eq!(pop.len(), 15);
    }

    #[test]
    fn grow_amortizes_capacity() {
        let mut rng = RandomStream::new(1);
        let mut pop = Population::new(100, 0, &mut rng).unwrap();
        pop.grow(1).unwrap();
        assert!(pop.agt_vec.capacity() >= 150);
        let cap = pop.agt_vec.capacity();
        pop.grow(cap - pop.len()).unwrap();
        assert_eq!(pop.agt_vec.capacity(), cap);
    }

    #[test]
    fn shuffle_keeps_identities() {
        let mut rng = RandomStream::new(2);
        let mut pop = Population::new(64, 8, &mut rng).unwrap();
        pop.set_state(40, State::Dead);
        let before = identities(&pop);
        pop.shuffle(&mut rng).unwrap();
        assert_eq!(identities(&pop), before);
        assert_eq!(pop.count_state(State::Dead), 1);
        assert_eq!(pop.count_state(State::Infectious), 8);
    }

    #[test]
    fn sorted_view_leaves_store_order() {
        let mut rng = RandomStream::new(8);
        let pop = Population::new(20, 0, &mut rng).unwrap();
        let order: Vec<_> = pop.agents().iter().map(Agent::identity).collect();
        let sorted: Vec<_> = pop
            .sorted_by_identity()
            .iter()
            .map(|agt| agt.identity())
            .collect();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
        let order_after: Vec<_> = pop.agents().iter().map(Agent::identity).collect();
        assert_eq!(order, order_after);
    }

    #[test]
    fn state_letters() {
        let letters: String = [
            State::Susceptible,
            State::Infectious,
            State::Recovered,
            State::Vaccinated,
            State::Dead,
        ]
        .iter()
        .map(State::to_string)
        .collect();
        assert_eq!(letters, "SIRVD");
    }
}
