//! Response tallying for one status request

use std::collections::{HashMap, HashSet};

use flightsurety_common::{Address, FlightStatus};
use serde::{Deserialize, Serialize};

/// Per-status response sets with first-to-threshold detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseTally {
    threshold: usize,
    by_status: HashMap<FlightStatus, Vec<Address>>,
    responders: HashSet<Address>,
}

/// Result of recording one response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyOutcome {
    /// Response counted, `count` oracles now agree on the status
    Counted { count: usize },
    /// This response brought the status to the threshold
    Reached,
    /// The oracle already answered
    Duplicate,
}

impl ResponseTally {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            by_status: HashMap::new(),
            responders: HashSet::new(),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Record `oracle` reporting `status`
    ///
    /// Only the response that brings a status to exactly the threshold
    /// reports `Reached`, so arrival order decides between statuses.
    pub fn record(&mut self, oracle: Address, status: FlightStatus) -> TallyOutcome {
        if !self.responders.insert(oracle) {
            return TallyOutcome::Duplicate;
        }
        let reporters = self.by_status.entry(status).or_default();
        reporters.push(oracle);

        if reporters.len() == self.threshold {
            TallyOutcome::Reached
        } else {
            TallyOutcome::Counted {
                count: reporters.len(),
            }
        }
    }

    /// Undo the most recent `record` of `oracle`
    pub fn withdraw(&mut self, oracle: &Address, status: FlightStatus) {
        if self.responders.remove(oracle) {
            if let Some(reporters) = self.by_status.get_mut(&status) {
                reporters.retain(|r| r != oracle);
            }
        }
    }

    pub fn has_responded(&self, oracle: &Address) -> bool {
        self.responders.contains(oracle)
    }

    /// Oracles that reported `status`, in arrival order
    pub fn reporters(&self, status: FlightStatus) -> &[Address] {
        self.by_status
            .get(&status)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn count(&self, status: FlightStatus) -> usize {
        self.reporters(status).len()
    }

    pub fn total_responses(&self) -> usize {
        self.responders.len()
    }

    /// Drop every recorded response, keeping the threshold
    pub fn clear(&mut self) {
        self.by_status.clear();
        self.responders.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle(i: usize) -> Address {
        Address::derive(&format!("oracle-{i}"))
    }

    #[test]
    fn test_first_status_to_threshold_wins() {
        let mut tally = ResponseTally::new(3);
        let sequence = [
            FlightStatus::OnTime,
            FlightStatus::LateAirline,
            FlightStatus::LateAirline,
            FlightStatus::OnTime,
            FlightStatus::LateAirline,
        ];
        let mut reached = None;
        for (i, status) in sequence.into_iter().enumerate() {
            if tally.record(oracle(i), status) == TallyOutcome::Reached {
                reached = Some((i, status));
                break;
            }
        }
        assert_eq!(reached, Some((4, FlightStatus::LateAirline)));
        assert_eq!(tally.count(FlightStatus::OnTime), 2);
    }

    #[test]
    fn test_duplicate_regardless_of_status() {
        let mut tally = ResponseTally::new(3);
        assert_eq!(
            tally.record(oracle(0), FlightStatus::OnTime),
            TallyOutcome::Counted { count: 1 }
        );
        assert_eq!(tally.record(oracle(0), FlightStatus::LateWeather), TallyOutcome::Duplicate);
        assert_eq!(tally.total_responses(), 1);
    }

    #[test]
    fn test_withdraw_undoes_record() {
        let mut tally = ResponseTally::new(1);
        assert_eq!(tally.record(oracle(0), FlightStatus::OnTime), TallyOutcome::Reached);
        tally.withdraw(&oracle(0), FlightStatus::OnTime);
        assert!(!tally.has_responded(&oracle(0)));
        assert_eq!(tally.count(FlightStatus::OnTime), 0);
        assert_eq!(tally.record(oracle(0), FlightStatus::OnTime), TallyOutcome::Reached);
    }
}
