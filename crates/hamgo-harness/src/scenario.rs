//! Scenario builder and world state.
//!
//! A scenario declares nodes, the messages each one publishes, and the faults
//! on the links between them, then runs synchronization rounds. Every round,
//! each node requests from every other node and ingests the (possibly
//! corrupted) response. An oracle must be supplied before a scenario can run.
//!
//! ```text
//! Scenario::new("name")
//!     .node("ALPHA").node("BRAVO")
//!     .publish("BRAVO", b"hello")
//!     .fault(0, "ALPHA", Fault::GarbleEntry { index: 0 })
//!     .rounds(3)
//!     .oracle(Box::new(|world| ...))
//!     .run()
//! ```

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::{
    fault::{Fault, FaultInjector},
    sim_contact::SimContact,
    sim_node::SimNode,
};

/// Verification run against the final world state.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;

/// Counters accumulated over a scenario run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Rounds executed
    pub rounds: usize,
    /// Request/response exchanges completed or attempted
    pub exchanges: usize,
    /// Messages recovered from responses, duplicates included
    pub delivered: usize,
    /// Messages that were new to the receiving node
    pub stored: usize,
    /// Messages responders left out because the envelope was full
    pub deferred: usize,
    /// Diagnostics reported while decoding requests and responses
    pub diagnostics: usize,
    /// Responses that had a fault applied
    pub faults: usize,
    /// Responses rejected outright at the envelope level
    pub rejected: usize,
    /// First round after which every node held every message
    pub converged_after: Option<usize>,
}

/// All nodes in a scenario plus run statistics.
#[derive(Debug, Default)]
pub struct World {
    nodes: Vec<SimNode>,
    index: BTreeMap<String, usize>,
    stats: SyncStats,
}

impl World {
    /// Empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Its node id is its position, starting at 1.
    pub fn add_node(&mut self, callsign: impl Into<String>) -> &mut SimNode {
        let callsign = callsign.into();
        let id = self.nodes.len() as u32 + 1;
        self.index.insert(callsign.clone(), self.nodes.len());
        self.nodes.push(SimNode::new(SimContact::new(id, callsign)));
        let last = self.nodes.len() - 1;
        &mut self.nodes[last]
    }

    /// Node by callsign.
    pub fn node(&self, callsign: &str) -> Option<&SimNode> {
        self.index.get(callsign).map(|&i| &self.nodes[i])
    }

    /// Mutable node by callsign.
    pub fn node_mut(&mut self, callsign: &str) -> Option<&mut SimNode> {
        self.index.get(callsign).map(|&i| &mut self.nodes[i])
    }

    /// All nodes, in insertion order.
    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    /// Run statistics so far.
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Every `(source, seq)` cached by any node.
    pub fn known_messages(&self) -> BTreeSet<(SimContact, u64)> {
        self.nodes.iter().flat_map(|node| node.cached_keys()).collect()
    }

    /// True when every node holds every known message.
    pub fn converged(&self) -> bool {
        let known = self.known_messages();
        self.nodes.iter().all(|node| known.iter().all(|(source, seq)| node.has(source, *seq)))
    }

    /// Let `requester` sync from `responder` once.
    ///
    /// `pick` sees the encoded response and chooses the fault to apply to it
    /// in flight.
    pub fn exchange(
        &mut self,
        requester: usize,
        responder: usize,
        pick: impl FnOnce(&[u8]) -> Fault,
    ) -> Result<(), String> {
        self.stats.exchanges += 1;

        let request = self.nodes[requester].request().map_err(|e| {
            format!("{} failed to build request: {e}", self.nodes[requester].contact())
        })?;

        let answer = self.nodes[responder]
            .answer(&request)
            .map_err(|e| format!("{} rejected request: {e}", self.nodes[responder].contact()))?;
        self.stats.diagnostics += answer.diagnostics.len();
        self.stats.deferred += answer.value.deferred;

        let fault = pick(&answer.value.response);
        if fault != Fault::None {
            self.stats.faults += 1;
        }
        let response = fault.apply(&answer.value.response);

        let node = &mut self.nodes[requester];
        match node.accept(&response) {
            Ok(report) => {
                self.stats.delivered += report.received;
                self.stats.stored += report.stored;
                self.stats.diagnostics += report.diagnostics.len();
            },
            Err(e) => {
                debug!(node = %node.contact(), ?fault, error = %e, "response rejected");
                self.stats.rejected += 1;
            },
        }
        Ok(())
    }
}

/// Common oracles.
pub mod oracle {
    use super::OracleFn;

    /// Every node holds every message any node holds.
    pub fn converged() -> OracleFn {
        Box::new(|world| {
            if world.converged() {
                Ok(())
            } else {
                Err(format!("not converged after {} rounds", world.stats().rounds))
            }
        })
    }

    /// No response was rejected at the envelope level.
    pub fn no_rejections() -> OracleFn {
        Box::new(|world| match world.stats().rejected {
            0 => Ok(()),
            n => Err(format!("{n} responses rejected")),
        })
    }

    /// All of `oracles` must pass, checked in order.
    pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
        Box::new(move |world| oracles.iter().try_for_each(|oracle| oracle(world)))
    }
}

/// Scenario builder.
///
/// Must call `.oracle()` to get a [`RunnableScenario`].
pub struct Scenario {
    name: String,
    nodes: Vec<String>,
    published: Vec<(String, Vec<u8>)>,
    scripted: BTreeMap<(usize, String), Fault>,
    injector: FaultInjector,
    rounds: usize,
    stop_when_converged: bool,
}

impl Scenario {
    /// Create a new scenario with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            published: Vec::new(),
            scripted: BTreeMap::new(),
            injector: FaultInjector::clean(),
            rounds: 1,
            stop_when_converged: false,
        }
    }

    /// Add a node. Callsigns must be uppercase ASCII letters or digits.
    pub fn node(mut self, callsign: impl Into<String>) -> Self {
        self.nodes.push(callsign.into());
        self
    }

    /// Have `callsign` publish a message before the first round.
    pub fn publish(mut self, callsign: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.published.push((callsign.into(), body.into()));
        self
    }

    /// Apply `fault` to every response `requester` receives in `round`.
    ///
    /// Scripted faults take precedence over the random injector.
    pub fn fault(mut self, round: usize, requester: impl Into<String>, fault: Fault) -> Self {
        self.scripted.insert((round, requester.into()), fault);
        self
    }

    /// Draw faults for unscripted responses from `injector`.
    pub fn faults(mut self, injector: FaultInjector) -> Self {
        self.injector = injector;
        self
    }

    /// Run exactly `rounds` rounds.
    pub fn rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self.stop_when_converged = false;
        self
    }

    /// Run until every node holds every message, for at most `max_rounds`.
    pub fn until_converged(mut self, max_rounds: usize) -> Self {
        self.rounds = max_rounds;
        self.stop_when_converged = true;
        self
    }

    /// Set the oracle function and return a runnable scenario.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario and return the final world.
    ///
    /// Fails if a node is unknown, a request cannot be built or answered, or
    /// the oracle rejects the final state.
    pub fn run(self) -> Result<World, String> {
        let Self { mut scenario, oracle } = self;
        let name = scenario.name.clone();

        let mut world = World::new();
        for callsign in &scenario.nodes {
            world.add_node(callsign.clone());
        }

        for (callsign, body) in std::mem::take(&mut scenario.published) {
            let node = world
                .node_mut(&callsign)
                .ok_or_else(|| format!("Scenario '{name}': unknown node {callsign}"))?;
            node.publish(body);
        }

        for (_, callsign) in scenario.scripted.keys() {
            if world.node(callsign).is_none() {
                return Err(format!("Scenario '{name}': fault targets unknown node {callsign}"));
            }
        }

        let names = scenario.nodes.clone();
        for round in 0..scenario.rounds {
            for (requester, requester_name) in names.iter().enumerate() {
                let scripted = scenario.scripted.get(&(round, requester_name.clone())).copied();
                for responder in (0..names.len()).filter(|&r| r != requester) {
                    let injector = &mut scenario.injector;
                    world
                        .exchange(requester, responder, |response| {
                            scripted.unwrap_or_else(|| injector.next_fault(response))
                        })
                        .map_err(|e| format!("Scenario '{name}' round {round}: {e}"))?;
                }
            }

            world.stats.rounds = round + 1;
            let converged = world.converged();
            if converged && world.stats.converged_after.is_none() {
                world.stats.converged_after = Some(round + 1);
            }
            info!(scenario = %name, round, converged, "round complete");

            if converged && scenario.stop_when_converged {
                break;
            }
        }

        oracle(&world).map_err(|e| format!("Scenario '{name}' oracle failed: {e}"))?;
        Ok(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_tracks_nodes_by_callsign() {
        let mut world = World::new();
        world.add_node("ALPHA");
        world.add_node("BRAVO");

        assert_eq!(world.node("BRAVO").map(|n| n.contact().node_id), Some(2));
        assert!(world.node("CHARLIE").is_none());
    }

    #[test]
    fn empty_world_is_converged() {
        let mut world = World::new();
        world.add_node("ALPHA");
        assert!(world.converged());
    }

    #[test]
    fn unknown_publisher_fails() {
        let result = Scenario::new("bad")
            .node("ALPHA")
            .publish("ZULU", b"x".to_vec())
            .oracle(Box::new(|_| Ok(())))
            .run();

        assert!(result.is_err());
    }

    #[test]
    fn oracle_failure_is_reported() {
        let result = Scenario::new("strict")
            .node("ALPHA")
            .oracle(Box::new(|_| Err("nope".to_string())))
            .run();

        assert_eq!(result.err(), Some("Scenario 'strict' oracle failed: nope".to_string()));
    }
}
