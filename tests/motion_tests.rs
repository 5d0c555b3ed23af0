//! Motion and obstruction engine tests

#[cfg(test)]
mod tests {
    use gate_sync::{
        protocol::{subjects, ToggleLock},
        registry::NoDimensions,
        ControlState, EntityHandle, Envelope, GameWorld, GateCatalogEntry, GateClient, GateDefinition, GateId,
        GateRegistry, GateSyncConfig, Interaction, MemoryWorld, MotionPhase, ObserverSession, OpeningDirection,
        Vec3,
    };
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    const YARD: GateId = 5;

    fn yard_registry() -> Arc<GateRegistry> {
        let entry = GateCatalogEntry {
            id: YARD,
            model: "prop_gate_airport_01".into(),
            closed_position: Vec3::zero(),
            opening: OpeningDirection::RightToLeft,
            permissions: vec!["Yard.Staff".into()],
            heading: 0.0,
            access_range: 150.0,
            travel_distance: Some(5.0),
            locked: true,
        };
        Arc::new(GateRegistry::from_catalog([entry], &NoDimensions).unwrap())
    }

    struct Rig {
        client: GateClient<MemoryWorld>,
        gate: GateDefinition,
        entity: EntityHandle,
        now: Instant,
    }

    impl Rig {
        /// Joined staff observer at the yard gate; gate promoted and at rest.
        fn new() -> Self {
            let registry = yard_registry();
            let gate = registry.get(YARD).unwrap().clone();
            let config = GateSyncConfig::default();

            let mut world = MemoryWorld::new();
            let entity = world.spawn_gates(&registry)[0];
            world.observer = Vec3::zero().offset(config.control_offset);
            world.grant("Yard.Staff");

            let mut session = ObserverSession::new(registry, config);
            session.mark_joined();
            let mut rig = Self {
                client: GateClient::new(session, world),
                gate,
                entity,
                now: Instant::now(),
            };
            rig.client.control_tick(rig.now).unwrap();
            assert_eq!(rig.motion(), MotionPhase::AtTarget);
            rig
        }

        fn advance(&mut self, ms: u64) {
            self.now += Duration::from_millis(ms);
        }

        fn motion(&mut self) -> MotionPhase {
            self.client.motion_tick(self.now).unwrap().phase
        }

        fn press(&mut self) -> bool {
            self.client.host_mut().set_pressed(true);
            let report = self.client.control_tick(self.now).unwrap();
            self.client.host_mut().set_pressed(false);
            match report.state {
                ControlState::Tracking(_, Interaction::Toggled { locked }) => locked,
                other => panic!("expected toggle, got {:?}", other),
            }
        }

        fn position(&self) -> Vec3 {
            self.client.host().position(self.entity).unwrap()
        }

        fn world(&mut self) -> &mut MemoryWorld {
            self.client.host_mut()
        }
    }

    // -----------------------------------------------------------------------
    // Resting and stepping
    // -----------------------------------------------------------------------

    #[test]
    fn first_tick_rests_and_freezes_the_gate() {
        let rig = Rig::new();
        let entity = rig.client.host().entity(rig.entity).unwrap();
        assert!(entity.frozen);
        assert!(entity.recording_collisions);
        assert_eq!(entity.position, rig.gate.closed_position);
        assert!(rig.client.session().active().unwrap().resting_applied);
    }

    #[test]
    fn at_target_backs_off() {
        let mut rig = Rig::new();
        let report = rig.client.motion_tick(rig.now).unwrap();
        assert_eq!(report.phase, MotionPhase::AtTarget);
        assert_eq!(report.next_tick, GateSyncConfig::default().motion_at_target_interval());
    }

    #[test]
    fn gate_steps_toward_open_then_arrives() {
        let mut rig = Rig::new();
        assert!(!rig.press());
        let open = rig.gate.open_position();

        let start = rig.position();
        assert_eq!(rig.motion(), MotionPhase::Stepped);
        let moved = rig.position();
        let step = moved.distance_squared_2d(&start).sqrt();
        assert!((step - 0.015).abs() < 1e-4, "step was {}", step);
        assert!(moved.distance_squared_2d(&open) < start.distance_squared_2d(&open));
        assert_eq!(moved.z, start.z);

        let mut phase = MotionPhase::Stepped;
        for _ in 0..1000 {
            rig.advance(16);
            phase = rig.motion();
            if phase != MotionPhase::Stepped {
                break;
            }
        }
        assert_eq!(phase, MotionPhase::Arrived);
        assert_eq!(rig.position(), open);
        assert_eq!(rig.motion(), MotionPhase::AtTarget);
    }

    #[test]
    fn locking_slides_back_to_closed() {
        let mut rig = Rig::new();
        rig.press();
        let open = rig.gate.open_position();
        let entity = rig.entity;
        rig.world().move_entity(entity, open);

        assert!(rig.press());
        let start = rig.position();
        assert_eq!(rig.motion(), MotionPhase::Stepped);
        let closed = rig.gate.closed_position;
        assert!(rig.position().distance_squared_2d(&closed) < start.distance_squared_2d(&closed));
    }

    #[test]
    fn near_target_snaps_onto_it() {
        let mut rig = Rig::new();
        rig.press();
        let open = rig.gate.open_position();
        let entity = rig.entity;
        rig.world().move_entity(entity, Vec3::new(open.x + 0.05, open.y, open.z));

        assert_eq!(rig.motion(), MotionPhase::Arrived);
        assert_eq!(rig.position(), open);
    }

    #[test]
    fn runaway_position_is_clamped() {
        let mut rig = Rig::new();
        let entity = rig.entity;
        rig.world().move_entity(entity, Vec3::new(40.0, 3.0, 0.0));

        assert_eq!(rig.motion(), MotionPhase::Clamped);
        assert_eq!(rig.position(), rig.gate.closed_position);
    }

    #[test]
    fn lost_entity_drops_the_context() {
        let mut rig = Rig::new();
        let entity = rig.entity;
        rig.world().despawn(entity);

        assert_eq!(rig.motion(), MotionPhase::Lost);
        assert!(rig.client.session().active().is_none());
        assert_eq!(rig.motion(), MotionPhase::NoGate);
    }

    // -----------------------------------------------------------------------
    // Obstruction
    // -----------------------------------------------------------------------

    #[test]
    fn contact_holds_the_gate_in_place() {
        let mut rig = Rig::new();
        let vehicle = rig.world().spawn_vehicle(Vec3::new(0.5, 0.0, 0.0));
        rig.press();
        assert_eq!(rig.client.session().active().unwrap().obstruction, Some(vehicle));

        let entity = rig.entity;
        rig.world().set_touching(entity, vehicle, true);
        let report = rig.client.motion_tick(rig.now).unwrap();
        assert_eq!(report.phase, MotionPhase::Held);
        assert_eq!(report.next_tick, GateSyncConfig::default().obstruction_retry_interval());
        let held_at = rig.position();

        for _ in 0..5 {
            rig.advance(100);
            assert_eq!(rig.motion(), MotionPhase::Held);
            assert_eq!(rig.position(), held_at);
        }

        rig.world().set_touching(entity, vehicle, false);
        rig.advance(100);
        assert_eq!(rig.motion(), MotionPhase::Stepped);
        assert_ne!(rig.position(), held_at);
        assert!(rig.client.session().active().unwrap().hold.is_none());
    }

    #[test]
    fn closing_gate_waits_for_the_occupant_to_leave() {
        let mut rig = Rig::new();
        rig.press();
        let entity = rig.entity;
        let open = rig.gate.open_position();
        rig.world().move_entity(entity, open);

        let vehicle = rig.world().spawn_vehicle(Vec3::new(0.5, 0.0, 0.0));
        assert!(rig.press());
        rig.world().set_collided(entity, true);
        assert_eq!(rig.motion(), MotionPhase::Held);
        let held_at = rig.position();

        // Still colliding, and the occupant is still there until the next poll.
        rig.world().move_entity(vehicle, Vec3::new(500.0, 0.0, 0.0));
        rig.advance(100);
        assert_eq!(rig.motion(), MotionPhase::Held);
        assert_eq!(rig.position(), held_at);

        rig.advance(200);
        assert_eq!(rig.motion(), MotionPhase::Stepped);
        let closed = rig.gate.closed_position;
        assert!(rig.position().distance_squared_2d(&closed) < held_at.distance_squared_2d(&closed));
        assert_eq!(rig.client.session().active().unwrap().target, closed);
    }

    #[test]
    fn retarget_abandons_the_hold() {
        let mut rig = Rig::new();
        let vehicle = rig.world().spawn_vehicle(Vec3::new(0.5, 0.0, 0.0));
        rig.press();
        let entity = rig.entity;
        rig.world().set_touching(entity, vehicle, true);
        assert_eq!(rig.motion(), MotionPhase::Held);
        let held_at = rig.position();

        // Another observer locks it again.
        let relock = Envelope::new(subjects::TOGGLE_LOCK, &ToggleLock { gate_id: YARD, locked: true }).unwrap();
        rig.client.deliver(&relock);
        let closed = rig.gate.closed_position;
        assert_eq!(rig.client.session().active().unwrap().target, closed);

        // The hold is dropped without waiting for contact to end; the gate is
        // one step from closed, so it snaps straight back.
        rig.advance(100);
        assert_eq!(rig.motion(), MotionPhase::Arrived);
        assert_ne!(rig.position(), held_at);
        assert_eq!(rig.position(), closed);
        assert!(rig.client.session().active().unwrap().hold.is_none());
    }

    #[test]
    fn distant_vehicle_is_not_an_obstruction() {
        let mut rig = Rig::new();
        let vehicle = rig.world().spawn_vehicle(Vec3::new(150.0, 0.0, 0.0));
        rig.press();
        let entity = rig.entity;
        rig.world().set_touching(entity, vehicle, true);

        assert_eq!(rig.client.session().active().unwrap().obstruction, None);
        assert_eq!(rig.motion(), MotionPhase::Stepped);
    }
}
