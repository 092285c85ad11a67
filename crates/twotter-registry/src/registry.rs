//! The client registry: who is online and where to reach them.
//!
//! # Concurrency note
//!
//! `ClientRegistry` is NOT thread-safe by itself. It is a plain `HashMap`
//! owned by the server and reached only through the server's single
//! registry mutex, which serializes the dispatch task and the maintenance
//! sweep. Keeping the lock outside lets each server operation hold it across
//! several registry calls (check-then-register, snapshot-then-sweep) as one
//! atomic step.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::Instant;
use twotter_protocol::ClientId;

use crate::Registration;

/// Maps each online client id to its address and liveness timestamp.
///
/// ## Lifecycle
///
/// ```text
/// HELLO ──→ register() ──→ [online] ──→ unregister()    (BYE)
///                             │  ↑
///                     touch() └──┘
///                             │
///                             └────→ sweep_expired()    (idle > ttl)
/// ```
#[derive(Debug, Default)]
pub struct ClientRegistry {
    /// One entry per id. Keyed by id, so two addresses for one id cannot
    /// exist.
    entries: HashMap<ClientId, Registration>,
}

impl ClientRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` at `addr`, stamped with the current time.
    ///
    /// Returns `false` without changing anything if `id` is already
    /// registered, whatever its address.
    pub fn register(&mut self, id: ClientId, addr: SocketAddr) -> bool {
        self.register_at(id, addr, Instant::now())
    }

    /// [`register`](Self::register) with an explicit timestamp.
    pub fn register_at(
        &mut self,
        id: ClientId,
        addr: SocketAddr,
        now: Instant,
    ) -> bool {
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(
            id,
            Registration {
                addr,
                last_seen: now,
            },
        );
        tracing::debug!(%id, %addr, "client registered");
        true
    }

    /// Refreshes the liveness timestamp of an existing entry. Unknown ids
    /// are ignored.
    pub fn touch(&mut self, id: ClientId) {
        self.touch_at(id, Instant::now());
    }

    /// [`touch`](Self::touch) with an explicit timestamp.
    pub fn touch_at(&mut self, id: ClientId, now: Instant) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.last_seen = now;
        }
    }

    /// Removes `id`. Returns the removed entry, if there was one.
    pub fn unregister(&mut self, id: ClientId) -> Option<Registration> {
        let removed = self.entries.remove(&id);
        if removed.is_some() {
            tracing::debug!(%id, "client unregistered");
        }
        removed
    }

    /// The address `id` is registered at.
    pub fn lookup(&self, id: ClientId) -> Option<SocketAddr> {
        self.entries.get(&id).map(|entry| entry.addr)
    }

    /// Full entry for `id`, including its liveness timestamp.
    pub fn get(&self, id: ClientId) -> Option<&Registration> {
        self.entries.get(&id)
    }

    /// `true` if `id` is registered.
    pub fn contains(&self, id: ClientId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Every registered address: the broadcast target set.
    ///
    /// This is a snapshot. Callers send after releasing the server's lock,
    /// so later registry changes do not affect the fan-out in progress.
    pub fn all_addresses(&self) -> Vec<SocketAddr> {
        self.entries.values().map(|entry| entry.addr).collect()
    }

    /// Every registered id in ascending order.
    pub fn online_ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Removes and returns every id idle for longer than `ttl` as of `now`.
    ///
    /// The returned ids are sorted so callers log them in a stable order.
    pub fn sweep_expired(&mut self, now: Instant, ttl: Duration) -> Vec<ClientId> {
        let mut expired = Vec::new();
        self.entries.retain(|id, entry| {
            if entry.is_expired(now, ttl) {
                expired.push(*id);
                false
            } else {
                true
            }
        });
        expired.sort_unstable();

        for id in &expired {
            tracing::info!(%id, "registration expired");
        }
        expired
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nobody is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `ClientRegistry`.
    //!
    //! Naming follows `test_{function}_{scenario}_{expected}`.
    //!
    //! Time-dependent behavior uses the `_at` variants with explicit
    //! instants, so "300 seconds later" is just `t0 + 300s` and nothing
    //! sleeps.

    use super::*;

    fn cid(id: u32) -> ClientId {
        ClientId(id)
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    const TTL: Duration = Duration::from_secs(300);

    // =====================================================================
    // register()
    // =====================================================================

    #[test]
    fn test_register_new_id_returns_true() {
        let mut reg = ClientRegistry::new();

        assert!(reg.register(cid(1), addr(1000)));

        assert_eq!(reg.lookup(cid(1)), Some(addr(1000)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_register_duplicate_id_returns_false_and_keeps_original() {
        // A second registration must not move the id to a new address.
        let mut reg = ClientRegistry::new();
        let t0 = Instant::now();
        reg.register_at(cid(1), addr(1000), t0);

        let accepted = reg.register_at(cid(1), addr(2000), t0 + Duration::from_secs(5));

        assert!(!accepted);
        assert_eq!(reg.lookup(cid(1)), Some(addr(1000)));
        assert_eq!(reg.get(cid(1)).unwrap().last_seen, t0, "no mutation on conflict");
    }

    #[test]
    fn test_register_after_unregister_succeeds() {
        let mut reg = ClientRegistry::new();
        reg.register(cid(1), addr(1000));
        reg.unregister(cid(1));

        assert!(reg.register(cid(1), addr(2000)));
        assert_eq!(reg.lookup(cid(1)), Some(addr(2000)));
    }

    #[test]
    fn test_register_unregister_sequence_keeps_one_address_per_id() {
        let mut reg = ClientRegistry::new();
        let ops: [(bool, u32, u16); 8] = [
            (true, 1, 1),
            (true, 2, 2),
            (true, 1, 3),
            (false, 1, 0),
            (true, 1, 4),
            (true, 2, 5),
            (false, 3, 0),
            (true, 3, 6),
        ];
        for (is_register, id, port) in ops {
            if is_register {
                reg.register(cid(id), addr(port));
            } else {
                reg.unregister(cid(id));
            }
        }

        assert_eq!(reg.online_ids(), vec![cid(1), cid(2), cid(3)]);
        assert_eq!(reg.lookup(cid(1)), Some(addr(4)));
        assert_eq!(reg.lookup(cid(2)), Some(addr(2)));
        assert_eq!(reg.lookup(cid(3)), Some(addr(6)));
        assert_eq!(reg.all_addresses().len(), reg.len());
    }

    // =====================================================================
    // touch() / unregister() / lookup()
    // =====================================================================

    #[test]
    fn test_touch_updates_last_seen() {
        let mut reg = ClientRegistry::new();
        let t0 = Instant::now();
        reg.register_at(cid(1), addr(1000), t0);

        reg.touch_at(cid(1), t0 + Duration::from_secs(10));

        assert_eq!(reg.get(cid(1)).unwrap().last_seen, t0 + Duration::from_secs(10));
    }

    #[test]
    fn test_touch_unknown_id_is_noop() {
        let mut reg = ClientRegistry::new();
        reg.touch(cid(9));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_unregister_unknown_id_returns_none() {
        let mut reg = ClientRegistry::new();
        assert!(reg.unregister(cid(9)).is_none());
    }

    #[test]
    fn test_lookup_unknown_id_returns_none() {
        let reg = ClientRegistry::new();
        assert_eq!(reg.lookup(cid(1)), None);
        assert!(!reg.contains(cid(1)));
    }

    #[test]
    fn test_all_addresses_lists_every_entry() {
        let mut reg = ClientRegistry::new();
        reg.register(cid(1), addr(1000));
        reg.register(cid(2), addr(2000));

        let mut addrs = reg.all_addresses();
        addrs.sort();

        assert_eq!(addrs, vec![addr(1000), addr(2000)]);
    }

    #[test]
    fn test_online_ids_sorted_ascending() {
        let mut reg = ClientRegistry::new();
        for id in [30, 4, 17] {
            reg.register(cid(id), addr(id as u16));
        }
        assert_eq!(reg.online_ids(), vec![cid(4), cid(17), cid(30)]);
    }

    // =====================================================================
    // sweep_expired()
    // =====================================================================

    #[test]
    fn test_sweep_removes_entry_idle_longer_than_ttl() {
        let mut reg = ClientRegistry::new();
        let t0 = Instant::now();
        reg.register_at(cid(1), addr(1000), t0);

        let removed = reg.sweep_expired(t0 + Duration::from_secs(301), TTL);

        assert_eq!(removed, vec![cid(1)]);
        assert!(reg.all_addresses().is_empty());
    }

    #[test]
    fn test_sweep_keeps_entry_touched_within_window() {
        let mut reg = ClientRegistry::new();
        let t0 = Instant::now();
        reg.register_at(cid(1), addr(1000), t0);
        reg.register_at(cid(2), addr(2000), t0);
        reg.touch_at(cid(1), t0 + Duration::from_secs(200));

        let removed = reg.sweep_expired(t0 + Duration::from_secs(400), TTL);

        assert_eq!(removed, vec![cid(2)]);
        assert_eq!(reg.all_addresses(), vec![addr(1000)]);
    }

    #[test]
    fn test_sweep_boundary_exactly_ttl_survives() {
        let mut reg = ClientRegistry::new();
        let t0 = Instant::now();
        reg.register_at(cid(1), addr(1000), t0);

        assert!(reg.sweep_expired(t0 + TTL, TTL).is_empty());
        assert!(reg.contains(cid(1)));
    }

    #[test]
    fn test_sweep_on_empty_registry_returns_empty() {
        let mut reg = ClientRegistry::new();
        assert!(reg.sweep_expired(Instant::now(), TTL).is_empty());
    }

    #[test]
    fn test_swept_id_can_register_again() {
        let mut reg = ClientRegistry::new();
        let t0 = Instant::now();
        reg.register_at(cid(1), addr(1000), t0);
        reg.sweep_expired(t0 + Duration::from_secs(301), TTL);

        assert!(reg.register_at(cid(1), addr(3000), t0 + Duration::from_secs(302)));
        assert_eq!(reg.lookup(cid(1)), Some(addr(3000)));
    }
}
