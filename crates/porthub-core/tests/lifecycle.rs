use porthub_core::{
    Admission, AgentId, AgentRegistry, Channel, ChannelId, ChannelOrigin, Context, EventKind,
    HandlerError, IdentityKey, PartialKey, RegistryEvent,
};
use std::sync::{Arc, Mutex};

const EXT: &str = "chrome-extension://abcdefghijklmnop";

#[derive(Debug, Clone)]
struct Port {
    id: ChannelId,
    name: String,
    origin: Option<ChannelOrigin>,
}

impl Channel for Port {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn origin(&self) -> Option<&ChannelOrigin> {
        self.origin.as_ref()
    }
}

fn port(id: u64, tab: Option<u64>, frame: Option<u64>, url: &str) -> Port {
    Port {
        id: ChannelId(id),
        name: format!("port-{id}"),
        origin: Some(ChannelOrigin {
            tab_id: tab,
            frame_id: frame,
            url: Some(url.to_owned()),
        }),
    }
}

fn frame(id: u64, tab: u64, frame_id: u64) -> Port {
    port(id, Some(tab), Some(frame_id), "https://example.com/article")
}

/// Counts events by kind and keeps the last disconnect snapshot.
#[derive(Default)]
struct Recorder {
    setups: usize,
    messages: usize,
    disconnects: Vec<porthub_core::AgentInfo>,
}

fn recorder(registry: &AgentRegistry<Port>) -> Arc<Mutex<Recorder>> {
    let rec: Arc<Mutex<Recorder>> = Arc::default();
    for kind in [EventKind::Setup, EventKind::Message, EventKind::Disconnect] {
        let sink = Arc::clone(&rec);
        registry.subscribe(kind, move |_, event| {
            let mut rec = sink.lock().map_err(|_| HandlerError::msg("poisoned"))?;
            match event {
                RegistryEvent::Setup { .. } => rec.setups += 1,
                RegistryEvent::Message { .. } => rec.messages += 1,
                RegistryEvent::Disconnect { agent } => rec.disconnects.push(agent.clone()),
            }
            Ok(())
        });
    }
    rec
}

fn accepted(admission: Admission) -> AgentId {
    match admission {
        Admission::Accepted { agent_id, .. } => agent_id,
        Admission::Rejected { reason } => panic!("unexpected rejection: {reason}"),
    }
}

// ── 1. distinct sub-owners stay distinct ─────────────────────────────

#[test]
fn five_frames_in_one_tab_are_five_agents() {
    let registry = AgentRegistry::default();
    let ids: Vec<AgentId> = (0..5)
        .map(|i| accepted(registry.connect(frame(i, 42, i))))
        .collect();

    let all = registry.all();
    assert_eq!(all.len(), 5);
    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 5);
    assert!(all.iter().all(|a| a.channels.len() == 1));
    assert!(registry.is_consistent());
}

// ── 2-4. merge and reference counting ────────────────────────────────

#[test]
fn identical_keys_merge_then_count_down() {
    let registry = AgentRegistry::default();
    let rec = recorder(&registry);

    let first = accepted(registry.connect(frame(1, 9, 0)));
    let before = registry.get(&first).expect("present").last_active_at;
    let second = accepted(registry.connect(frame(2, 9, 0)));

    // 2. one agent, two channels
    assert_eq!(first, second);
    assert_eq!(registry.all().len(), 1);
    assert_eq!(registry.channels_of(&first).len(), 2);
    assert!(registry.get(&first).expect("present").last_active_at >= before);

    // 3. releasing one keeps the agent
    assert!(registry.disconnect(ChannelId(1)));
    assert!(registry.get(&first).is_some());
    assert_eq!(registry.channels_of(&first).len(), 1);
    assert!(rec.lock().expect("lock").disconnects.is_empty());

    // 4. releasing the last destroys it
    assert!(registry.disconnect(ChannelId(2)));
    assert!(registry.get(&first).is_none());
    assert!(registry.get_by_key(&IdentityKey::new(Context::ContentPage, 9, 0)).is_none());
    assert!(registry.all().is_empty());
    assert!(!registry.has_channel(ChannelId(2)));

    let rec = rec.lock().expect("lock");
    assert_eq!(rec.setups, 2);
    assert_eq!(rec.disconnects.len(), 1);
    assert_eq!(rec.disconnects[0].id, first);
    assert_eq!(rec.disconnects[0].key, IdentityKey::new(Context::ContentPage, 9, 0));
}

// ── 5. owner query spans contexts ────────────────────────────────────

#[test]
fn owner_query_returns_every_agent_in_tab() {
    let registry = AgentRegistry::default();
    registry.connect(frame(1, 77, 0));
    registry.connect(frame(2, 77, 4));
    registry.connect(port(3, Some(77), Some(0), &format!("{EXT}/sidepanel.html")));
    registry.connect(port(4, Some(77), Some(0), &format!("{EXT}/devtools.html")));
    registry.connect(frame(5, 78, 0));

    let hits = registry.query(&PartialKey::any().owner(77));
    assert_eq!(hits.len(), 4);

    let contexts: Vec<Context> = hits.iter().map(|a| a.key.context).collect();
    assert_eq!(
        contexts,
        vec![
            Context::ContentPage,
            Context::ContentPage,
            Context::SidePanel,
            Context::Devtools,
        ]
    );
}

// ── 6. unknown ids ───────────────────────────────────────────────────

#[test]
fn removal_of_unknown_ids_changes_nothing() {
    let registry = AgentRegistry::default();
    let rec = recorder(&registry);
    let id = accepted(registry.connect(frame(1, 3, 0)));
    let snapshot: Vec<_> = registry.all().iter().map(|a| a.info()).collect();

    let ghost = AgentId::from("00000000-0000-0000-0000-000000000000");
    assert!(!registry.release(&ghost, ChannelId(1)));
    assert!(!registry.force_remove(&ghost));
    assert!(!registry.disconnect(ChannelId(99)));

    let after: Vec<_> = registry.all().iter().map(|a| a.info()).collect();
    assert_eq!(snapshot, after);
    assert_eq!(registry.channels_of(&id).len(), 1);
    assert!(rec.lock().expect("lock").disconnects.is_empty());
}

// ── 7. messages route to the owning agent ────────────────────────────

#[test]
fn messages_carry_owner_snapshot() {
    let registry = AgentRegistry::default();
    let owners: Arc<Mutex<Vec<Context>>> = Arc::default();
    let sink = Arc::clone(&owners);
    registry.subscribe(EventKind::Message, move |_, event| {
        sink.lock()
            .map_err(|_| HandlerError::msg("poisoned"))?
            .push(event.agent().key.context);
        Ok(())
    });

    registry.connect(port(1, None, None, &format!("{EXT}/popup.html")));
    registry.connect(frame(2, 5, 0));

    assert!(registry.deliver(ChannelId(2), serde_json::json!({ "kind": "scroll" })));
    assert!(registry.deliver(ChannelId(1), serde_json::json!("open")));
    assert!(!registry.deliver(ChannelId(3), serde_json::json!(null)));

    assert_eq!(
        owners.lock().expect("lock").as_slice(),
        &[Context::ContentPage, Context::Popup]
    );
}

// ── 8. re-entrant handlers ───────────────────────────────────────────

#[test]
fn disconnect_handler_can_admit_replacement() {
    let registry: AgentRegistry<Port> = AgentRegistry::default();
    registry.subscribe(EventKind::Disconnect, |reg, event| {
        if event.agent().key.context == Context::Popup {
            let key = IdentityKey::new(Context::Unknown, 0, 0);
            reg.admit(port(100, None, None, "about:blank"), key);
        }
        Ok(())
    });

    registry.connect(port(1, None, None, &format!("{EXT}/popup.html")));
    registry.disconnect(ChannelId(1));

    assert_eq!(registry.len(), 1);
    assert!(registry.has_channel(ChannelId(100)));
    assert_eq!(registry.by_context(Context::Unknown).len(), 1);
    assert!(registry.is_consistent());
}

#[test]
fn setup_handler_releasing_its_own_channel() {
    let registry: AgentRegistry<Port> = AgentRegistry::default();
    let rec = recorder(&registry);
    registry.subscribe(EventKind::Setup, |reg, event| {
        if let RegistryEvent::Setup { agent, channel } = event {
            if channel.name() == "port-1" {
                reg.release(&agent.id, channel.id());
            }
        }
        Ok(())
    });

    registry.connect(frame(1, 2, 0));

    assert!(registry.is_empty());
    let rec = rec.lock().expect("lock");
    assert_eq!(rec.setups, 1);
    assert_eq!(rec.disconnects.len(), 1);
}

// ── 9. rejection ─────────────────────────────────────────────────────

#[test]
fn channel_without_sender_is_never_stored() {
    let registry = AgentRegistry::default();
    let rec = recorder(&registry);
    let bare = Port {
        id: ChannelId(1),
        name: "bare".into(),
        origin: None,
    };

    assert!(matches!(registry.connect(bare), Admission::Rejected { .. }));
    assert!(registry.is_empty());
    assert!(!registry.has_channel_named("bare"));
    assert_eq!(rec.lock().expect("lock").setups, 0);
}
