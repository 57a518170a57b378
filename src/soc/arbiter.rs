//! Round-Robin Bus Arbiter.
//!
//! The arbiter tracks which masters have a request pending and which master
//! currently owns the bus. Ownership is handed out one transaction at a time
//! in round-robin order starting after the previous owner, so a master with
//! a pending request waits for at most `masters - 1` other transactions.

use crate::soc::transaction::MasterId;

/// Grant and pending-request state of the bus.
#[derive(Clone, Debug)]
pub struct Arbiter {
    pending: Vec<bool>,
    owner: Option<MasterId>,
    last_granted: Option<MasterId>,
}

impl Arbiter {
    /// Creates an arbiter for `masters` request ports.
    pub fn new(masters: usize) -> Self {
        Self {
            pending: vec![false; masters],
            owner: None,
            last_granted: None,
        }
    }

    /// Number of master ports.
    pub fn masters(&self) -> usize {
        self.pending.len()
    }

    /// Raises the request line of `master`.
    pub fn request(&mut self, master: MasterId) {
        if let Some(p) = self.pending.get_mut(master) {
            *p = true;
        }
    }

    /// Returns `true` while `master` has a request line raised.
    pub fn is_pending(&self, master: MasterId) -> bool {
        self.pending.get(master).copied().unwrap_or(false)
    }

    /// Current bus owner.
    pub fn owner(&self) -> Option<MasterId> {
        self.owner
    }

    /// Master granted most recently.
    pub fn last_granted(&self) -> Option<MasterId> {
        self.last_granted
    }

    /// Grants the bus to the next pending master in round-robin order.
    ///
    /// # Returns
    ///
    /// The granted master, or `None` if the bus is owned or nobody requests.
    pub fn grant(&mut self) -> Option<MasterId> {
        if self.owner.is_some() {
            return None;
        }
        let n = self.pending.len();
        let start = self.last_granted.map_or(0, |m| m + 1);
        let winner = (0..n).map(|i| (start + i) % n).find(|&m| self.pending[m])?;

        self.pending[winner] = false;
        self.owner = Some(winner);
        self.last_granted = Some(winner);
        Some(winner)
    }

    /// Releases the bus held by `master` at transaction completion.
    pub fn release(&mut self, master: MasterId) {
        if self.owner == Some(master) {
            self.owner = None;
        }
    }

    /// Drops all requests and the current grant.
    pub fn reset(&mut self) {
        self.pending.iter_mut().for_each(|p| *p = false);
        self.owner = None;
        self.last_granted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_between_contending_masters() {
        let mut arb = Arbiter::new(3);
        let mut order = Vec::new();
        for _ in 0..6 {
            for m in 0..3 {
                if !arb.is_pending(m) {
                    arb.request(m);
                }
            }
            let m = arb.grant().unwrap();
            order.push(m);
            arb.release(m);
        }
        assert_eq!(order, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn no_grant_while_owned() {
        let mut arb = Arbiter::new(2);
        arb.request(0);
        arb.request(1);
        assert_eq!(arb.grant(), Some(0));
        assert_eq!(arb.grant(), None);
        arb.release(0);
        assert_eq!(arb.grant(), Some(1));
    }

    #[test]
    fn idle_arbiter_grants_nothing() {
        let mut arb = Arbiter::new(2);
        assert_eq!(arb.grant(), None);
        assert_eq!(arb.owner(), None);
    }
}
