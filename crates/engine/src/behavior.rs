use std::collections::HashMap;

use thiserror::Error;

/// Upper bound on independent behavior tracks per owner.
pub const MAX_TRACKS: usize = 4;

/// Interned behavior state name. Resolved once when content loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u16);

impl StateId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Returned by a state handler to tell the track what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Keep the current state on top.
    Continue,
    /// Suspend the current state beneath a new one.
    Push(StateId),
    /// Swap the current state for a new one.
    Replace(StateId),
    /// Pop the current state. An emptied track is dropped at end of tick.
    Terminate,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BehaviorError {
    #[error("behavior state '{name}' is already registered")]
    DuplicateState { name: String },
    #[error("behavior state registry is full ({capacity} states)")]
    RegistryFull { capacity: usize },
    #[error("cannot add behavior track: limit of {limit} reached")]
    TrackLimit { limit: usize },
}

/// Ordered independent stacks of states. Every stored stack is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BehaviorTracks {
    stacks: Vec<Vec<StateId>>,
}

impl BehaviorTracks {
    /// One single-entry track per initial state.
    pub fn with_initial(
        states: impl IntoIterator<Item = StateId>,
    ) -> Result<Self, BehaviorError> {
        let mut tracks = Self::default();
        for state in states {
            tracks.add_track(state)?;
        }
        Ok(tracks)
    }

    pub fn add_track(&mut self, initial: StateId) -> Result<(), BehaviorError> {
        if self.stacks.len() >= MAX_TRACKS {
            return Err(BehaviorError::TrackLimit { limit: MAX_TRACKS });
        }
        self.stacks.push(vec![initial]);
        Ok(())
    }

    pub fn reset_to(
        &mut self,
        states: impl IntoIterator<Item = StateId>,
    ) -> Result<(), BehaviorError> {
        *self = Self::with_initial(states)?;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.stacks.clear();
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn track(&self, index: usize) -> Option<&[StateId]> {
        self.stacks.get(index).map(Vec::as_slice)
    }

    /// Active state of a track.
    pub fn top(&self, index: usize) -> Option<StateId> {
        self.stacks.get(index).and_then(|stack| stack.last().copied())
    }

    pub fn contains(&self, state: StateId) -> bool {
        self.stacks.iter().any(|stack| stack.last() == Some(&state))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackTickReport {
    pub executed: usize,
    pub unhandled: usize,
    pub dropped_tracks: usize,
}

impl TrackTickReport {
    pub fn merge(&mut self, other: TrackTickReport) {
        self.executed += other.executed;
        self.unhandled += other.unhandled;
        self.dropped_tracks += other.dropped_tracks;
    }
}

/// Runs one tick over every track: pop the active state, hand it to `step`,
/// apply the returned signal. `None` from `step` means the state has no
/// handler and is treated as [`ControlSignal::Continue`]. Emptied tracks are
/// removed only after all tracks ran.
pub fn run_tracks<F>(tracks: &mut BehaviorTracks, mut step: F) -> TrackTickReport
where
    F: FnMut(StateId) -> Option<ControlSignal>,
{
    let mut report = TrackTickReport::default();
    for stack in &mut tracks.stacks {
        let Some(current) = stack.pop() else {
            continue;
        };
        report.executed += 1;
        let signal = step(current).unwrap_or_else(|| {
            report.unhandled += 1;
            ControlSignal::Continue
        });
        match signal {
            ControlSignal::Continue => stack.push(current),
            ControlSignal::Push(next) => {
                stack.push(current);
                stack.push(next);
            }
            ControlSignal::Replace(next) => stack.push(next),
            ControlSignal::Terminate => {}
        }
    }

    let before = tracks.stacks.len();
    tracks.stacks.retain(|stack| !stack.is_empty());
    report.dropped_tracks = before - tracks.stacks.len();
    report
}

#[derive(Debug, Clone)]
struct StateEntry<H> {
    name: String,
    handler: Option<H>,
}

/// Name to handler table. Ids are dense and stable for the registry's life.
#[derive(Debug, Clone)]
pub struct StateRegistry<H> {
    entries: Vec<StateEntry<H>>,
    by_name: HashMap<String, StateId>,
}

impl<H> Default for StateRegistry<H> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            by_name: HashMap::new(),
        }
    }
}

impl<H> StateRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to `name`. A name previously reserved with
    /// [`StateRegistry::declare`] keeps its id.
    pub fn register(&mut self, name: &str, handler: H) -> Result<StateId, BehaviorError> {
        let id = self.declare(name)?;
        let entry = &mut self.entries[id.index()];
        if entry.handler.is_some() {
            return Err(BehaviorError::DuplicateState {
                name: name.to_string(),
            });
        }
        entry.handler = Some(handler);
        Ok(id)
    }

    /// Reserves an id for `name` without a handler.
    pub fn declare(&mut self, name: &str) -> Result<StateId, BehaviorError> {
        if let Some(id) = self.by_name.get(name) {
            return Ok(*id);
        }
        let raw = u16::try_from(self.entries.len()).map_err(|_| BehaviorError::RegistryFull {
            capacity: u16::MAX as usize + 1,
        })?;
        let id = StateId(raw);
        self.entries.push(StateEntry {
            name: name.to_string(),
            handler: None,
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Option<StateId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: StateId) -> Option<&str> {
        self.entries.get(id.index()).map(|entry| entry.name.as_str())
    }

    pub fn handler(&self, id: StateId) -> Option<&H> {
        self.entries
            .get(id.index())
            .and_then(|entry| entry.handler.as_ref())
    }

    pub fn is_handled(&self, id: StateId) -> bool {
        self.handler(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names reserved without a handler.
    pub fn unhandled_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|entry| entry.handler.is_none())
            .map(|entry| entry.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids<const N: usize>(registry: &mut StateRegistry<()>, names: [&str; N]) -> [StateId; N] {
        names.map(|name| registry.register(name, ()).expect("register"))
    }

    #[test]
    fn continue_keeps_state_on_top() {
        let mut registry = StateRegistry::new();
        let [a] = ids(&mut registry, ["a"]);
        let mut tracks = BehaviorTracks::with_initial([a]).expect("tracks");
        let report = run_tracks(&mut tracks, |_| Some(ControlSignal::Continue));
        assert_eq!(report.executed, 1);
        assert_eq!(tracks.track(0), Some(&[a][..]));
    }

    #[test]
    fn terminate_reduces_depth_by_one_and_drops_empty_track_same_tick() {
        let mut registry = StateRegistry::new();
        let [a, b] = ids(&mut registry, ["a", "b"]);
        let mut tracks = BehaviorTracks::with_initial([a]).expect("tracks");
        run_tracks(&mut tracks, |_| Some(ControlSignal::Push(b)));
        assert_eq!(tracks.track(0), Some(&[a, b][..]));

        let report = run_tracks(&mut tracks, |_| Some(ControlSignal::Terminate));
        assert_eq!(tracks.track(0), Some(&[a][..]));
        assert_eq!(report.dropped_tracks, 0);

        let report = run_tracks(&mut tracks, |_| Some(ControlSignal::Terminate));
        assert_eq!(report.dropped_tracks, 1);
        assert!(tracks.is_empty());
    }

    #[test]
    fn pushed_state_resumes_suspended_state_after_terminate() {
        let mut registry = StateRegistry::new();
        let [normal, hurt] = ids(&mut registry, ["normal", "hurt"]);
        let mut tracks = BehaviorTracks::with_initial([normal]).expect("tracks");
        let mut invoked = Vec::new();
        let mut hurt_ticks = 2;
        for _ in 0..5 {
            run_tracks(&mut tracks, |state| {
                invoked.push(state);
                if state == normal {
                    if invoked.len() == 1 {
                        return Some(ControlSignal::Push(hurt));
                    }
                    return Some(ControlSignal::Continue);
                }
                hurt_ticks -= 1;
                if hurt_ticks == 0 {
                    Some(ControlSignal::Terminate)
                } else {
                    Some(ControlSignal::Continue)
                }
            });
        }
        assert_eq!(invoked, vec![normal, hurt, hurt, normal, normal]);
        assert_eq!(tracks.track(0), Some(&[normal][..]));
    }

    #[test]
    fn replace_discards_current_state() {
        let mut registry = StateRegistry::new();
        let [load, base] = ids(&mut registry, ["load", "base"]);
        let mut tracks = BehaviorTracks::with_initial([load]).expect("tracks");
        run_tracks(&mut tracks, |_| Some(ControlSignal::Replace(base)));
        assert_eq!(tracks.track(0), Some(&[base][..]));
    }

    #[test]
    fn unhandled_state_behaves_as_continue() {
        let mut registry: StateRegistry<()> = StateRegistry::new();
        let ghost = registry.declare("ghost").expect("declare");
        let mut tracks = BehaviorTracks::with_initial([ghost]).expect("tracks");
        let report = run_tracks(&mut tracks, |_| None);
        assert_eq!(report.unhandled, 1);
        assert_eq!(tracks.top(0), Some(ghost));
    }

    #[test]
    fn tracks_do_not_observe_each_others_transition_within_a_tick() {
        let mut registry = StateRegistry::new();
        let [a, b, c] = ids(&mut registry, ["a", "b", "c"]);
        let mut tracks = BehaviorTracks::with_initial([a, b]).expect("tracks");
        let mut seen = Vec::new();
        let report = run_tracks(&mut tracks, |state| {
            seen.push(state);
            if state == a {
                Some(ControlSignal::Terminate)
            } else {
                Some(ControlSignal::Push(c))
            }
        });
        assert_eq!(seen, vec![a, b]);
        assert_eq!(report.dropped_tracks, 1);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks.track(0), Some(&[b, c][..]));
    }

    #[test]
    fn track_limit_is_enforced() {
        let mut registry = StateRegistry::new();
        let [a] = ids(&mut registry, ["a"]);
        let mut tracks = BehaviorTracks::default();
        for _ in 0..MAX_TRACKS {
            tracks.add_track(a).expect("add");
        }
        assert_eq!(
            tracks.add_track(a),
            Err(BehaviorError::TrackLimit { limit: MAX_TRACKS })
        );
    }

    #[test]
    fn registry_rejects_duplicates_and_keeps_declared_ids() {
        let mut registry = StateRegistry::new();
        let declared = registry.declare("seek").expect("declare");
        assert!(!registry.is_handled(declared));
        let registered = registry.register("seek", 7_u8).expect("register");
        assert_eq!(declared, registered);
        assert_eq!(registry.handler(registered), Some(&7));
        assert_eq!(registry.name(registered), Some("seek"));
        assert_eq!(
            registry.register("seek", 8),
            Err(BehaviorError::DuplicateState {
                name: "seek".to_string()
            })
        );
        assert_eq!(registry.lookup("missing"), None);
        assert_eq!(registry.unhandled_names().count(), 0);
    }
}
