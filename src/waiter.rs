//! Waiter Table — request/response correlation, spec.md §4.6.

use tokio::sync::oneshot;

use crate::types::{Response, ResponseKind};

type Predicate = Box<dyn Fn(&Response) -> bool + Send + Sync>;

struct Entry {
    id: u64,
    kind: ResponseKind,
    predicate: Option<Predicate>,
    tx: oneshot::Sender<Response>,
}

/// Ordered sequence of outstanding awaiters. Each entry is fulfilled by the
/// first matching, still-unfilled entry encountered during a scan; a
/// delivered response fills at most one waiter.
#[derive(Default)]
pub(crate) struct WaiterTable {
    entries: Vec<Entry>,
    next_id: u64,
}

impl WaiterTable {
    pub fn new() -> Self {
        Self { entries: Vec::new(), next_id: 0 }
    }

    /// Registers a new waiter for `kind`, optionally filtered by `predicate`
    /// (e.g. matching `ac_phase` for `ACResponse`). Returns an id (for
    /// removal on timeout) and the receiver that resolves when fulfilled.
    pub fn register(
        &mut self,
        kind: ResponseKind,
        predicate: Option<Predicate>,
    ) -> (u64, oneshot::Receiver<Response>) {
        let id = self.next_id;
        self.next_id += 1;
        let (tx, rx) = oneshot::channel();
        self.entries.push(Entry { id, kind, predicate, tx });
        (id, rx)
    }

    /// Removes a waiter that timed out without being fulfilled. A no-op if
    /// it was already fulfilled (and thus already removed).
    pub fn remove(&mut self, id: u64) {
        self.entries.retain(|e| e.id != id);
    }

    /// Attempts to fulfill the first matching, unfilled waiter with
    /// `response`. Returns `true` if a waiter consumed it. The response is
    /// always also delivered to the application handler regardless of the
    /// return value (spec.md §4.6: "Responses not claimed by any waiter are
    /// still delivered to the application handler").
    pub fn try_fulfill(&mut self, response: &Response) -> bool {
        let kind = response.kind();
        if let Some(pos) = self.entries.iter().position(|e| {
            e.kind == kind && e.predicate.as_ref().map_or(true, |p| p(response))
        }) {
            let entry = self.entries.remove(pos);
            let _ = entry.tx.send(*response);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ACResponse, DeviceState};

    fn ac(phase: u8) -> Response {
        Response::Ac(ACResponse {
            ac_phase: phase,
            ac_num_phases: 2,
            device_state: DeviceState::InvertFull,
            ac_mains_voltage: 230.0,
            ac_mains_current: 1.0,
            ac_inverter_voltage: 230.0,
            ac_inverter_current: 1.0,
            ac_mains_frequency: 50.0,
        })
    }

    #[test]
    fn first_fit_by_phase_predicate() {
        let mut table = WaiterTable::new();
        let (_id1, mut rx1) = table.register(
            ResponseKind::Ac,
            Some(Box::new(|r: &Response| matches!(r, Response::Ac(a) if a.ac_phase == 1))),
        );
        let (_id2, mut rx2) = table.register(
            ResponseKind::Ac,
            Some(Box::new(|r: &Response| matches!(r, Response::Ac(a) if a.ac_phase == 2))),
        );

        assert!(table.try_fulfill(&ac(2)));
        assert_eq!(rx2.try_recv().unwrap(), ac(2));
        assert!(rx1.try_recv().is_err());
    }

    #[test]
    fn a_response_fills_at_most_one_waiter() {
        let mut table = WaiterTable::new();
        let (_id1, mut rx1) = table.register(ResponseKind::Version, None);
        let (_id2, mut rx2) = table.register(ResponseKind::Version, None);

        let version = Response::Version(crate::types::VersionResponse { version: 42 });
        assert!(table.try_fulfill(&version));
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn unmatched_response_is_not_consumed() {
        let mut table = WaiterTable::new();
        let (_id, _rx) = table.register(ResponseKind::Dc, None);
        assert!(!table.try_fulfill(&ac(1)));
    }

    #[test]
    fn removing_a_timed_out_waiter_prevents_late_fulfillment() {
        let mut table = WaiterTable::new();
        let (id, rx) = table.register(ResponseKind::Version, None);
        table.remove(id);
        drop(rx);
        let version = Response::Version(crate::types::VersionResponse { version: 1 });
        assert!(!table.try_fulfill(&version));
    }
}
