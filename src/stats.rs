use crate::model::{Agent, State};
use std::fmt;

/// Number of agents in each state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Statistics {
    pub susceptible: usize,
    pub infectious: usize,
    pub recovered: usize,
    pub vaccinated: usize,
    pub dead: usize,
}

impl Statistics {
    /// Count every agent in a single pass.
    pub fn from_agents(agt_vec: &[Agent]) -> Self {
        let mut stats = Self::default();
        for agt in agt_vec {
            match agt.state() {
                State::Susceptible => stats.susceptible += 1,
                State::Infectious => stats.infectious += 1,
                State::Recovered => stats.recovered += 1,
                State::Vaccinated => stats.vaccinated += 1,
                State::Dead => stats.dead += 1,
            }
        }
        stats
    }

    pub fn total(&self) -> usize {
        self.susceptible + self.infectious + self.recovered + self.vaccinated + self.dead
    }
}

/// One report line of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub identity: usize,
    pub iteration: usize,
    pub stats: Statistics,
    pub total_infections: usize,
    pub infection_deaths: usize,
}

impl Record {
    pub const HEADER: &'static str = "#,iter,S,I,R,V,D,TI,TID";
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        write!(
            f,
            "{},{},{},{},{},{},{},{},{}",
            self.identity,
            self.iteration,
            s.susceptible,
            s.infectious,
            s.recovered,
            s.vaccinated,
            s.dead,
            self.total_infections,
            self.infection_deaths
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_each_state() {
        let agt_vec = vec![
            Agent::new(0, State::Susceptible),
            Agent::new(1, State::Infectious),
            Agent::new(2, State::Infectious),
            Agent::new(3, State::Recovered),
            Agent::new(4, State::Vaccinated),
            Agent::new(5, State::Dead),
            Agent::new(6, State::Dead),
            Agent::new(7, State::Dead),
        ];
        let stats = Statistics::from_agents(&agt_vec);
        assert_eq!(
            stats,
            Statistics {
                susceptible: 1,
                infectious: 2,
                recovered: 1,
                vaccinated: 1,
                dead: 3,
            }
        );
        assert_eq!(stats.total(), agt_vec.len());
    }

    #[test]
    fn formats_report_line() {
        let record = Record {
            identity: 3,
            iteration: 200,
            stats: Statistics {
                susceptible: 90,
                infectious: 10,
                recovered: 0,
                vaccinated: 2,
                dead: 1,
            },
            total_infections: 12,
            infection_deaths: 1,
        };
        assert_eq!(record.to_string(), "3,200,90,10,0,2,1,12,1");
        assert_eq!(Record::HEADER.split(',').count(), 9);
    }
}
