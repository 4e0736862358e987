//! Activation Gate
//!
//! The gate decides when a [`SharedState`](super::SharedState) should run
//! its upstream producer. It is a reference count with a debounce:
//!
//! 1. The first observer to attach activates the gate.
//!
//! 2. When the last observer detaches, the gate hands out an
//!    [`IdleTicket`]. The owner sleeps for the grace period and then
//!    presents the ticket to [`ActivationGate::expire`].
//!
//! 3. Any attach in between bumps the generation, which invalidates the
//!    ticket. The producer keeps running uninterrupted.
//!
//! The gate holds no lock and spawns nothing. The owner keeps it behind the
//! same mutex as the producer handle, so a start/stop decision and the
//! matching spawn/abort can never interleave with another decision.

use std::time::Duration;

/// What the owner must do after an observer attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The gate was idle: start the producer.
    Start,
    /// The producer is already running (or still inside its grace window).
    Running,
}

/// What the owner must do after an observer detaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Other observers remain.
    Held,
    /// The last observer left. Wait out the grace period, then call
    /// [`ActivationGate::expire`] with the ticket.
    Idle(IdleTicket),
}

/// Proof that the gate went idle at a particular generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleTicket {
    generation: u64,
}

/// Reference-counted activation gate with a debounced shutdown.
#[derive(Debug)]
pub struct ActivationGate {
    grace: Duration,
    observers: usize,
    generation: u64,
    active: bool,
    activations: u64,
}

impl ActivationGate {
    /// Create an idle gate that stays active for `grace` after the last
    /// observer leaves.
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            observers: 0,
            generation: 0,
            active: false,
            activations: 0,
        }
    }

    /// The grace period.
    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Record an attach.
    pub fn acquire(&mut self) -> Activation {
        self.observers += 1;
        self.generation = self.generation.wrapping_add(1);

        if self.active {
            Activation::Running
        } else {
            self.active = true;
            self.activations += 1;
            Activation::Start
        }
    }

    /// Record a detach.
    pub fn release(&mut self) -> Release {
        debug_assert!(self.observers > 0, "release without matching acquire");
        self.observers = self.observers.saturating_sub(1);

        if self.observers == 0 {
            self.generation = self.generation.wrapping_add(1);
            Release::Idle(IdleTicket {
                generation: self.generation,
            })
        } else {
            Release::Held
        }
    }

    /// Close the grace window opened by `ticket`.
    ///
    /// Returns `true` when the owner must stop the producer: nobody
    /// reattached since the ticket was issued and the gate is still active.
    pub fn expire(&mut self, ticket: IdleTicket) -> bool {
        if self.active && self.observers == 0 && self.generation == ticket.generation {
            self.active = false;
            true
        } else {
            false
        }
    }

    /// Whether the producer should currently be running.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.observers
    }

    /// How many times the gate went from idle to active.
    pub fn activation_count(&self) -> u64 {
        self.activations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> ActivationGate {
        ActivationGate::new(Duration::from_secs(5))
    }

    #[test]
    fn first_acquire_starts() {
        let mut gate = gate();
        assert!(!gate.is_active());

        assert_eq!(gate.acquire(), Activation::Start);
        assert!(gate.is_active());
        assert_eq!(gate.acquire(), Activation::Running);
        assert_eq!(gate.observer_count(), 2);
        assert_eq!(gate.activation_count(), 1);
    }

    #[test]
    fn last_release_issues_ticket() {
        let mut gate = gate();
        gate.acquire();
        gate.acquire();

        assert_eq!(gate.release(), Release::Held);
        let Release::Idle(ticket) = gate.release() else {
            panic!("expected idle");
        };

        assert!(gate.expire(ticket));
        assert!(!gate.is_active());
    }

    #[test]
    fn reattach_inside_grace_invalidates_ticket() {
        let mut gate = gate();
        gate.acquire();
        let Release::Idle(ticket) = gate.release() else {
            panic!("expected idle");
        };

        // Reattach before the grace period elapses.
        assert_eq!(gate.acquire(), Activation::Running);
        assert!(!gate.expire(ticket));
        assert!(gate.is_active());
        assert_eq!(gate.activation_count(), 1);
    }

    #[test]
    fn stale_ticket_after_bounce_is_ignored() {
        let mut gate = gate();
        gate.acquire();
        let Release::Idle(first) = gate.release() else {
            panic!("expected idle");
        };
        gate.acquire();
        let Release::Idle(second) = gate.release() else {
            panic!("expected idle");
        };

        assert!(!gate.expire(first));
        assert!(gate.expire(second));
    }

    #[test]
    fn expiry_then_acquire_restarts() {
        let mut gate = gate();
        gate.acquire();
        let Release::Idle(ticket) = gate.release() else {
            panic!("expected idle");
        };
        assert!(gate.expire(ticket));

        assert_eq!(gate.acquire(), Activation::Start);
        assert_eq!(gate.activation_count(), 2);
    }
}
