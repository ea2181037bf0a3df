use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::info;

struct Slot {
    ticket: u64,
    /// Set once the job has been spawned
    handle: Option<JoinHandle<()>>,
}

impl Slot {
    fn is_stale(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(false)
    }
}

/// At most one running conversion per user.
///
/// A slot is claimed before any slow work starts and freed when its
/// [`Reservation`] is dropped, so two commands racing for the same user
/// cannot both get through.
#[derive(Default)]
pub struct ConversionSlots {
    slots: DashMap<u64, Slot>,
    next_ticket: AtomicU64,
}

impl ConversionSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the user's slot, or `None` if a conversion is already running
    pub fn try_reserve(self: &Arc<Self>, user_id: u64) -> Option<Reservation> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let slot = Slot {
            ticket,
            handle: None,
        };

        match self.slots.entry(user_id) {
            Entry::Occupied(mut existing) => {
                if !existing.get().is_stale() {
                    return None;
                }
                existing.insert(slot);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
            }
        }

        Some(Reservation {
            slots: Arc::clone(self),
            user_id,
            ticket,
        })
    }

    /// Remember the spawned job so it can be aborted. Ignored when the
    /// reservation has already been released.
    pub fn attach(&self, user_id: u64, ticket: u64, handle: JoinHandle<()>) {
        if let Some(mut slot) = self.slots.get_mut(&user_id) {
            if slot.ticket == ticket {
                slot.handle = Some(handle);
            }
        }
    }

    pub fn is_active(&self, user_id: u64) -> bool {
        self.slots
            .get(&user_id)
            .map(|slot| !slot.is_stale())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Abort every running job, for shutdown
    pub fn abort_all(&self) {
        let running: Vec<_> = self
            .slots
            .iter()
            .filter_map(|slot| slot.handle.as_ref().map(|h| h.abort_handle()))
            .collect();

        for handle in &running {
            handle.abort();
        }
        if !running.is_empty() {
            info!("Aborted {} running conversions", running.len());
        }
    }

    fn release(&self, user_id: u64, ticket: u64) {
        self.slots.remove_if(&user_id, |_, slot| slot.ticket == ticket);
    }
}

/// A claimed slot; dropping it frees the slot
pub struct Reservation {
    slots: Arc<ConversionSlots>,
    user_id: u64,
    ticket: u64,
}

impl Reservation {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.slots.release(self.user_id, self.ticket);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_one_reservation_per_user() {
        let slots = Arc::new(ConversionSlots::new());

        let first = slots.try_reserve(1).unwrap();
        assert!(slots.try_reserve(1).is_none());
        assert!(slots.is_active(1));

        let other = slots.try_reserve(2);
        assert!(other.is_some());

        drop(first);
        assert!(!slots.is_active(1));
        assert!(slots.try_reserve(1).is_some());
    }

    #[test]
    fn test_concurrent_reservations_admit_one() {
        let slots = Arc::new(ConversionSlots::new());

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let slots = slots.clone();
                std::thread::spawn(move || slots.try_reserve(7))
            })
            .collect();

        let reservations: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        let admitted = reservations.iter().filter(|r| r.is_some()).count();
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn test_job_that_finishes_before_attach_leaves_no_slot() {
        let slots = Arc::new(ConversionSlots::new());
        let reservation = slots.try_reserve(3).unwrap();
        let ticket = reservation.ticket();

        let handle = tokio::spawn(async move {
            drop(reservation);
        });
        while !handle.is_finished() {
            tokio::task::yield_now().await;
        }
        slots.attach(3, ticket, handle);

        assert!(slots.is_empty());
        assert!(!slots.is_active(3));
    }

    #[tokio::test]
    async fn test_stale_release_does_not_free_newer_reservation() {
        let slots = Arc::new(ConversionSlots::new());
        let old = slots.try_reserve(4).unwrap();
        let old_ticket = old.ticket();
        drop(old);

        let _current = slots.try_reserve(4).unwrap();
        slots.release(4, old_ticket);
        slots.attach(4, old_ticket, tokio::spawn(async {}));

        assert!(slots.is_active(4));
        assert!(slots.try_reserve(4).is_none());
    }

    #[tokio::test]
    async fn test_abort_all_frees_slots() {
        let slots = Arc::new(ConversionSlots::new());
        let reservation = slots.try_reserve(5).unwrap();
        let ticket = reservation.ticket();

        let handle = tokio::spawn(async move {
            let _reservation = reservation;
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        slots.attach(5, ticket, handle);
        assert!(slots.is_active(5));

        slots.abort_all();
        for _ in 0..100 {
            if slots.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(slots.is_empty());
    }
}
