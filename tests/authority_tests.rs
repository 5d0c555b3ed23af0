//! LockAuthority and AuthorityBusAgent tests

#[cfg(test)]
mod tests {
    use gate_sync::{
        protocol::{subjects, GateBreach, GateToggle, InitializeGateLocks, ToggleBreach, ToggleLock},
        ClientEvent, Dispatch, Envelope, GateError, LockAuthority, LockSnapshot, ObserverId,
    };

    const A: ObserverId = ObserverId(1);
    const B: ObserverId = ObserverId(2);

    fn authority() -> LockAuthority {
        let mut auth = LockAuthority::new();
        auth.connect(A, "Alice");
        auth.connect(B, "Bob");
        auth
    }

    fn toggle(gate_id: i32, locked: bool) -> Envelope {
        ClientEvent::Toggle(GateToggle { gate_id, locked })
            .into_envelope()
            .unwrap()
    }

    fn decode_snapshot(envelope: &Envelope) -> LockSnapshot {
        assert_eq!(envelope.channel, subjects::INITIALIZE_GATE_LOCKS);
        let msg: InitializeGateLocks = serde_json::from_value(envelope.payload.clone()).unwrap();
        LockSnapshot::decode(&msg.snapshot).unwrap()
    }

    // -----------------------------------------------------------------------
    // Toggle
    // -----------------------------------------------------------------------

    #[test]
    fn toggle_records_and_broadcasts() {
        let mut auth = authority();
        auth.toggle_lock(A, 0, false).unwrap();

        assert_eq!(auth.lock_state(0), Some(false));
        let dispatches = auth.drain_dispatches();
        assert_eq!(dispatches.len(), 1);
        match &dispatches[0] {
            Dispatch::Broadcast(env) => {
                assert_eq!(env.channel, subjects::TOGGLE_LOCK);
                let msg: ToggleLock = serde_json::from_value(env.payload.clone()).unwrap();
                assert_eq!(msg, ToggleLock { gate_id: 0, locked: false });
            }
            other => panic!("expected broadcast, got {:?}", other),
        }
        assert!(auth.drain_dispatches().is_empty());
    }

    #[test]
    fn last_toggle_wins() {
        let mut auth = authority();
        auth.toggle_lock(A, 1, false).unwrap();
        auth.toggle_lock(B, 1, true).unwrap();
        assert_eq!(auth.lock_state(1), Some(true));
        assert_eq!(auth.drain_dispatches().len(), 2);
        assert_eq!(auth.stats().toggles, 2);
    }

    #[test]
    fn repeated_toggle_is_still_broadcast() {
        let mut auth = authority();
        auth.toggle_lock(A, 0, true).unwrap();
        auth.toggle_lock(A, 0, true).unwrap();
        assert_eq!(auth.drain_dispatches().len(), 2);
    }

    #[test]
    fn unknown_gate_ids_are_recorded() {
        let mut auth = authority();
        auth.toggle_lock(A, 42, false).unwrap();
        assert_eq!(auth.lock_state(42), Some(false));
    }

    // -----------------------------------------------------------------------
    // Breach
    // -----------------------------------------------------------------------

    #[test]
    fn breach_forces_locked_and_replies_to_originator() {
        let mut auth = authority();
        auth.toggle_lock(A, 0, false).unwrap();
        auth.drain_dispatches();

        auth.breach(B, 0).unwrap();
        assert_eq!(auth.lock_state(0), Some(true));

        let dispatches = auth.drain_dispatches();
        assert_eq!(dispatches.len(), 1);
        match &dispatches[0] {
            Dispatch::To(observer, env) => {
                assert_eq!(*observer, B);
                assert_eq!(env.channel, subjects::TOGGLE_BREACH);
                let msg: ToggleBreach = serde_json::from_value(env.payload.clone()).unwrap();
                assert_eq!(msg.gate_id, 0);
            }
            other => panic!("expected unicast, got {:?}", other),
        }
    }

    // -----------------------------------------------------------------------
    // Late join
    // -----------------------------------------------------------------------

    #[test]
    fn empty_table_sends_no_snapshot() {
        let mut auth = authority();
        auth.request_initial_state(A).unwrap();
        assert!(auth.drain_dispatches().is_empty());
        assert_eq!(auth.stats().snapshots_sent, 0);
    }

    #[test]
    fn late_joiner_receives_one_snapshot() {
        let mut auth = authority();
        auth.toggle_lock(A, 0, false).unwrap();
        auth.toggle_lock(A, 2, true).unwrap();
        auth.drain_dispatches();

        let c = ObserverId(3);
        auth.connect(c, "Carol");
        auth.request_initial_state(c).unwrap();
        auth.request_initial_state(c).unwrap();

        let dispatches = auth.drain_dispatches();
        assert_eq!(dispatches.len(), 1);
        let Dispatch::To(observer, env) = &dispatches[0] else {
            panic!("expected unicast");
        };
        assert_eq!(*observer, c);
        let snapshot = decode_snapshot(env);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get(0), Some(false));
        assert_eq!(snapshot.get(2), Some(true));
    }

    #[test]
    fn reconnect_allows_another_snapshot() {
        let mut auth = authority();
        auth.toggle_lock(A, 0, false).unwrap();
        auth.request_initial_state(B).unwrap();
        auth.disconnect(B);
        auth.connect(B, "Bob");
        auth.request_initial_state(B).unwrap();

        let snapshots = auth
            .drain_dispatches()
            .into_iter()
            .filter(|d| matches!(d, Dispatch::To(o, _) if *o == B))
            .count();
        assert_eq!(snapshots, 2);
    }

    // -----------------------------------------------------------------------
    // Inbound surface
    // -----------------------------------------------------------------------

    #[test]
    fn unknown_observer_is_ignored() {
        let mut auth = LockAuthority::new();
        let handlers = LockAuthority::handlers();
        auth.handle(&handlers, ObserverId(9), &toggle(0, false));

        assert_eq!(auth.lock_state(0), None);
        assert!(auth.drain_dispatches().is_empty());
    }

    #[test]
    fn unknown_observer_gets_no_snapshot() {
        let mut auth = authority();
        auth.toggle_lock(A, 0, false).unwrap();
        auth.drain_dispatches();

        let stranger = ObserverId(9);
        assert!(matches!(
            auth.request_initial_state(stranger),
            Err(GateError::UnknownObserver(o)) if o == stranger
        ));
        let handlers = LockAuthority::handlers();
        let request = ClientEvent::InitializeLocks.into_envelope().unwrap();
        auth.handle(&handlers, stranger, &request);

        assert!(auth.drain_dispatches().is_empty());
        assert_eq!(auth.stats().snapshots_sent, 0);

        // Once connected, the same observer is served normally.
        auth.connect(stranger, "Sam");
        auth.handle(&handlers, stranger, &request);
        assert_eq!(auth.drain_dispatches().len(), 1);
    }

    #[test]
    fn bad_payloads_and_channels_are_swallowed() {
        let mut auth = authority();
        let handlers = LockAuthority::handlers();

        let bad = Envelope {
            channel: subjects::GATE_TOGGLE.to_string(),
            payload: serde_json::json!({ "gate_id": "zero" }),
        };
        auth.handle(&handlers, A, &bad);
        let unknown = Envelope {
            channel: "Gate.Explode".to_string(),
            payload: serde_json::Value::Null,
        };
        auth.handle(&handlers, A, &unknown);

        assert!(auth.drain_dispatches().is_empty());
        assert_eq!(auth.stats().tracked_gates, 0);
    }

    #[test]
    fn handlers_cover_every_client_channel() {
        let mut auth = authority();
        let handlers = LockAuthority::handlers();

        auth.handle(&handlers, A, &toggle(1, false));
        auth.handle(
            &handlers,
            A,
            &ClientEvent::Breach(GateBreach { gate_id: 2 }).into_envelope().unwrap(),
        );
        auth.handle(&handlers, B, &ClientEvent::InitializeLocks.into_envelope().unwrap());
        // A payload-less request is accepted too.
        auth.handle(
            &handlers,
            A,
            &Envelope {
                channel: subjects::GATE_INITIALIZE_LOCKS.to_string(),
                payload: serde_json::Value::Null,
            },
        );

        let stats = auth.stats();
        assert_eq!(stats.toggles, 1);
        assert_eq!(stats.breaches, 1);
        assert_eq!(stats.snapshots_sent, 2);
        assert_eq!(stats.connected_observers, 2);
        assert_eq!(auth.drain_dispatches().len(), 4);
    }

    // -----------------------------------------------------------------------
    // Bus agent
    // -----------------------------------------------------------------------

    #[cfg(feature = "server")]
    mod agent {
        use super::*;
        use gate_sync::{AuthorityBusAgent, AuthorityBusConfig, Inbound};
        use parking_lot::Mutex;
        use std::sync::Arc;
        use tokio::sync::mpsc;

        fn drain(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Vec<Envelope> {
            let mut out = Vec::new();
            while let Ok(env) = rx.try_recv() {
                out.push(env);
            }
            out
        }

        #[test]
        fn agent_routes_broadcasts_and_replies() {
            tokio_test::block_on(async {
                let authority = Arc::new(Mutex::new(LockAuthority::new()));
                let agent = AuthorityBusAgent::new(AuthorityBusConfig::default(), Arc::clone(&authority));

                let (tx, rx) = mpsc::channel(32);
                let (a_tx, mut a_rx) = mpsc::unbounded_channel();
                let (b_tx, mut b_rx) = mpsc::unbounded_channel();

                tx.send(Inbound::Connect { observer: A, name: "Alice".into(), outbound: a_tx })
                    .await
                    .unwrap();
                tx.send(Inbound::Connect { observer: B, name: "Bob".into(), outbound: b_tx })
                    .await
                    .unwrap();
                tx.send(Inbound::Event { observer: A, envelope: toggle(0, false) })
                    .await
                    .unwrap();
                tx.send(Inbound::Event {
                    observer: B,
                    envelope: ClientEvent::Breach(GateBreach { gate_id: 1 }).into_envelope().unwrap(),
                })
                .await
                .unwrap();
                tx.send(Inbound::Event {
                    observer: B,
                    envelope: ClientEvent::InitializeLocks.into_envelope().unwrap(),
                })
                .await
                .unwrap();
                drop(tx);

                agent.run(rx).await.unwrap();

                let to_a = drain(&mut a_rx);
                assert_eq!(to_a.len(), 1);
                assert_eq!(to_a[0].channel, subjects::TOGGLE_LOCK);

                let to_b = drain(&mut b_rx);
                let channels: Vec<_> = to_b.iter().map(|e| e.channel.as_str()).collect();
                assert_eq!(
                    channels,
                    vec![subjects::TOGGLE_LOCK, subjects::TOGGLE_BREACH, subjects::INITIALIZE_GATE_LOCKS]
                );
                let snapshot = decode_snapshot(&to_b[2]);
                assert_eq!(snapshot.get(0), Some(false));
                assert_eq!(snapshot.get(1), Some(true));

                assert_eq!(authority.lock().stats().connected_observers, 2);
            });
        }

        #[test]
        fn closed_connection_is_dropped() {
            tokio_test::block_on(async {
                let authority = Arc::new(Mutex::new(LockAuthority::new()));
                let agent = AuthorityBusAgent::new(AuthorityBusConfig::default(), Arc::clone(&authority));

                let (tx, rx) = mpsc::channel(8);
                let (a_tx, a_rx) = mpsc::unbounded_channel();
                drop(a_rx);

                tx.send(Inbound::Connect { observer: A, name: "Alice".into(), outbound: a_tx })
                    .await
                    .unwrap();
                tx.send(Inbound::Event { observer: A, envelope: toggle(0, true) })
                    .await
                    .unwrap();
                drop(tx);

                agent.run(rx).await.unwrap();

                let auth = authority.lock();
                assert!(!auth.is_connected(A));
                assert_eq!(auth.lock_state(0), Some(true));
            });
        }

        #[test]
        fn disconnect_removes_observer() {
            tokio_test::block_on(async {
                let authority = Arc::new(Mutex::new(LockAuthority::new()));
                let agent = AuthorityBusAgent::new(AuthorityBusConfig::default(), Arc::clone(&authority));

                let (tx, rx) = mpsc::channel(8);
                let (a_tx, _a_rx) = mpsc::unbounded_channel();
                tx.send(Inbound::Connect { observer: A, name: "Alice".into(), outbound: a_tx })
                    .await
                    .unwrap();
                tx.send(Inbound::Disconnect { observer: A }).await.unwrap();
                tx.send(Inbound::Event { observer: A, envelope: toggle(0, false) })
                    .await
                    .unwrap();
                drop(tx);

                agent.run(rx).await.unwrap();

                let auth = authority.lock();
                assert!(!auth.is_connected(A));
                assert_eq!(auth.lock_state(0), None);
            });
        }
    }
}
