//! Detection of pathological tool-call repetition.
//!
//! Keeps a bounded ring of recent call records per agent behind one
//! mutex. The orchestrator records every execution and asks whether
//! the latest failure is part of a consecutive-failure streak for the
//! same `(tool, params)`; interleaved calls to other tools do not
//! break the streak, a success on the same tool does.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

#[derive(Debug, Clone)]
struct CallRecord {
    tool: String,
    params_hash: String,
    success: bool,
}

#[derive(Default)]
struct Registry {
    histories: HashMap<String, VecDeque<CallRecord>>,
    last_activity: HashMap<String, DateTime<Utc>>,
}

pub struct LoopDetector {
    inner: Mutex<Registry>,
    max_history: usize,
    threshold: usize,
    agent_ttl: Duration,
    max_agents: usize,
}

impl LoopDetector {
    pub fn new(
        max_history: usize,
        threshold: usize,
        agent_ttl: Duration,
        max_agents: usize,
    ) -> Self {
        Self {
            inner: Mutex::new(Registry::default()),
            max_history: max_history.max(1),
            threshold: threshold.max(1),
            agent_ttl,
            max_agents: max_agents.max(1),
        }
    }

    /// Record one executed call. Also the point where inactive agents
    /// are evicted.
    pub fn record(&self, agent_id: &str, tool: &str, params_hash: &str, success: bool) {
        let now = Utc::now();
        let mut registry = self.inner.lock();

        let history = registry.histories.entry(agent_id.to_string()).or_default();
        history.push_back(CallRecord {
            tool: tool.to_string(),
            params_hash: params_hash.to_string(),
            success,
        });
        while history.len() > self.max_history {
            history.pop_front();
        }
        registry.last_activity.insert(agent_id.to_string(), now);

        self.evict(&mut registry, now);
    }

    /// Whether the agent has accumulated `threshold` consecutive
    /// failures for this `(tool, params_hash)`.
    pub fn detect_repeated_failures(&self, agent_id: &str, tool: &str, params_hash: &str) -> bool {
        let registry = self.inner.lock();
        let Some(history) = registry.histories.get(agent_id) else {
            return false;
        };

        let mut failures = 0usize;
        for record in history.iter().rev() {
            if record.tool != tool {
                continue;
            }
            if record.success {
                break;
            }
            if record.params_hash == params_hash {
                failures += 1;
                if failures >= self.threshold {
                    return true;
                }
            }
        }
        false
    }

    /// Drop the history of an agent, typically after its run finished.
    pub fn forget(&self, agent_id: &str) {
        let mut registry = self.inner.lock();
        registry.histories.remove(agent_id);
        registry.last_activity.remove(agent_id);
    }

    fn evict(&self, registry: &mut Registry, now: DateTime<Utc>) {
        let ttl = chrono::Duration::from_std(self.agent_ttl).unwrap_or(chrono::Duration::MAX);
        let expired: Vec<String> = registry
            .last_activity
            .iter()
            .filter(|(_, last)| now - **last > ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            registry.histories.remove(&id);
            registry.last_activity.remove(&id);
        }

        while registry.histories.len() > self.max_agents {
            let Some(oldest) = registry
                .last_activity
                .iter()
                .min_by_key(|(_, last)| **last)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            registry.histories.remove(&oldest);
            registry.last_activity.remove(&oldest);
        }
    }
}
