//! One-slot admission gate: at most one request is processed at a time.
//!
//! The gate lives on the interactive thread next to the result receiver, so
//! admitting and completing never race and need no lock.

use std::collections::VecDeque;
use std::str::FromStr;

use serde::Deserialize;

use crate::request::{ProcessingRequest, RequestId};

/// What happens to a request that arrives while another one is processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionPolicy {
    #[default]
    Reject,
    Queue,
}

impl FromStr for AdmissionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(AdmissionPolicy::Reject),
            "queue" => Ok(AdmissionPolicy::Queue),
            other => Err(format!("unknown admission policy {other:?} (expected reject or queue)")),
        }
    }
}

#[derive(Debug)]
pub enum Admission {
    /// The slot was free; the caller must start this request now.
    Start(ProcessingRequest),
    /// Waiting behind the in-flight request. `position` is 1-based.
    Queued { id: RequestId, position: usize },
    /// Turned away; carries the request back and the one holding the slot.
    Rejected {
        request: ProcessingRequest,
        in_flight: RequestId,
    },
}

#[derive(Debug)]
pub struct AdmissionGate {
    policy: AdmissionPolicy,
    queue_depth: usize,
    in_flight: Option<RequestId>,
    pending: VecDeque<ProcessingRequest>,
}

impl AdmissionGate {
    pub fn new(policy: AdmissionPolicy, queue_depth: usize) -> Self {
        Self {
            policy,
            queue_depth,
            in_flight: None,
            pending: VecDeque::new(),
        }
    }

    pub fn try_admit(&mut self, request: ProcessingRequest) -> Admission {
        let Some(in_flight) = self.in_flight else {
            self.in_flight = Some(request.id());
            return Admission::Start(request);
        };
        match self.policy {
            AdmissionPolicy::Queue if self.pending.len() < self.queue_depth => {
                let id = request.id();
                self.pending.push_back(request);
                Admission::Queued {
                    id,
                    position: self.pending.len(),
                }
            }
            _ => Admission::Rejected { request, in_flight },
        }
    }

    /// Free the slot held by `id` and hand out the next queued request, which
    /// now holds the slot. Completing an id that does not hold the slot is a no-op.
    pub fn complete(&mut self, id: RequestId) -> Option<ProcessingRequest> {
        if self.in_flight != Some(id) {
            return None;
        }
        self.in_flight = None;
        let next = self.pending.pop_front()?;
        self.in_flight = Some(next.id());
        Some(next)
    }

    /// Drop every queued request, returning how many were dropped.
    pub fn clear_pending(&mut self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        n
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<RequestId> {
        self.in_flight
    }

    pub fn queued(&self) -> usize {
        self.pending.len()
    }
}
