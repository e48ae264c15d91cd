pub mod store;

pub use store::PolicyStore;

use std::fmt;
use std::str::FromStr;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::geometry::Region;

/// Modifier predicate. Matching is exact over shift/control/alt/command
/// (`SUPER`); an empty mask matches only when none of them are held.
pub type ModifierMask = KeyModifiers;

const MATCHED_MODIFIERS: KeyModifiers = KeyModifiers::SHIFT
    .union(KeyModifiers::CONTROL)
    .union(KeyModifiers::ALT)
    .union(KeyModifiers::SUPER);

fn modifiers_match(policy: ModifierMask, held: KeyModifiers) -> bool {
    policy.intersection(MATCHED_MODIFIERS) == held.intersection(MATCHED_MODIFIERS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyAction {
    PropagateToHost,
    PropagateToOverlay,
    /// Host takes the event only where the overlay pixel is transparent.
    PropagateByAlpha,
}

impl fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PolicyAction::PropagateToHost => "host",
            PolicyAction::PropagateToOverlay => "overlay",
            PolicyAction::PropagateByAlpha => "alpha",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    KeyDown,
    LeftMouseDown,
    RightMouseDown,
    MiddleMouseDown,
}

impl EventKind {
    pub fn is_pointer(self) -> bool {
        !matches!(self, EventKind::KeyDown)
    }
}

impl From<MouseButton> for EventKind {
    fn from(button: MouseButton) -> Self {
        match button {
            MouseButton::Left => EventKind::LeftMouseDown,
            MouseButton::Right => EventKind::RightMouseDown,
            MouseButton::Middle => EventKind::MiddleMouseDown,
        }
    }
}

/// The two independent policy families the host keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PolicyKind {
    Keyboard,
    Pointer,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 2] = [PolicyKind::Keyboard, PolicyKind::Pointer];
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Keyboard => write!(f, "keyboard"),
            PolicyKind::Pointer => write!(f, "pointer"),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyboard" | "key" => Ok(PolicyKind::Keyboard),
            "pointer" | "mouse" => Ok(PolicyKind::Pointer),
            _ => Err(PolicyError::UnknownKind(s.to_string())),
        }
    }
}

/// What the host does with an event no rule matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropagationMode {
    AlwaysToHost,
    NeverToHost,
    /// Host receives the event unless the overlay holds keyboard focus.
    Focus,
    /// Host receives the event where the overlay pixel is transparent.
    Alpha,
}

impl PropagationMode {
    pub fn default_for(kind: PolicyKind) -> Self {
        match kind {
            PolicyKind::Keyboard => PropagationMode::Focus,
            PolicyKind::Pointer => PropagationMode::Alpha,
        }
    }

    /// Mode installed while a kind is suspended.
    pub fn permissive() -> Self {
        PropagationMode::AlwaysToHost
    }
}

impl fmt::Display for PropagationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PropagationMode::AlwaysToHost => "always",
            PropagationMode::NeverToHost => "never",
            PropagationMode::Focus => "focus",
            PropagationMode::Alpha => "alpha",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyboardPolicy {
    pub action: PolicyAction,
    pub modifiers: ModifierMask,
    pub key: KeyCode,
}

impl KeyboardPolicy {
    pub fn new(action: PolicyAction, modifiers: ModifierMask, key: KeyCode) -> Self {
        Self {
            action,
            modifiers,
            key,
        }
    }

    pub fn event_kind(&self) -> EventKind {
        EventKind::KeyDown
    }

    pub fn matches(&self, key: &KeyEvent) -> bool {
        key.code == self.key && modifiers_match(self.modifiers, key.modifiers)
    }
}

impl fmt::Display for KeyboardPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = modifier_names(self.modifiers);
        let code = match self.key {
            KeyCode::Char(c) => c.to_ascii_uppercase().to_string(),
            KeyCode::F(n) => format!("F{}", n),
            other => format!("{:?}", other),
        };
        parts.push(code);
        write!(f, "{} -> {}", parts.join("+"), self.action)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointerPolicy {
    pub action: PolicyAction,
    pub event_kind: EventKind,
    pub modifiers: ModifierMask,
    /// `None` matches anywhere in the window.
    pub region: Option<Region>,
}

impl PointerPolicy {
    pub fn new(
        action: PolicyAction,
        event_kind: EventKind,
        modifiers: ModifierMask,
        region: Option<Region>,
    ) -> Self {
        Self {
            action,
            event_kind,
            modifiers,
            region,
        }
    }

    pub fn matches(&self, event: &PointerEvent) -> bool {
        event.kind == self.event_kind
            && modifiers_match(self.modifiers, event.modifiers)
            && self
                .region
                .is_none_or(|region| region.contains(event.x, event.y))
    }
}

impl fmt::Display for PointerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = modifier_names(self.modifiers);
        parts.push(format!("{:?}", self.event_kind));
        match self.region {
            Some(r) => write!(
                f,
                "{} in {}x{}+{}+{} -> {}",
                parts.join("+"),
                r.width,
                r.height,
                r.x,
                r.y,
                self.action
            ),
            None => write!(f, "{} anywhere -> {}", parts.join("+"), self.action),
        }
    }
}

fn modifier_names(mods: ModifierMask) -> Vec<String> {
    let mut parts = Vec::new();
    if mods.contains(KeyModifiers::SUPER) {
        parts.push("Cmd".to_string());
    }
    if mods.contains(KeyModifiers::CONTROL) {
        parts.push("Ctrl".to_string());
    }
    if mods.contains(KeyModifiers::SHIFT) {
        parts.push("Shift".to_string());
    }
    if mods.contains(KeyModifiers::ALT) {
        parts.push("Alt".to_string());
    }
    parts
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Policy {
    Keyboard(KeyboardPolicy),
    Pointer(PointerPolicy),
}

impl Policy {
    pub fn kind(&self) -> PolicyKind {
        match self {
            Policy::Keyboard(_) => PolicyKind::Keyboard,
            Policy::Pointer(_) => PolicyKind::Pointer,
        }
    }

    pub fn action(&self) -> PolicyAction {
        match self {
            Policy::Keyboard(p) => p.action,
            Policy::Pointer(p) => p.action,
        }
    }

    pub fn matches(&self, event: &InputEvent) -> bool {
        match (self, event) {
            (Policy::Keyboard(p), InputEvent::Key(key)) => p.matches(key),
            (Policy::Pointer(p), InputEvent::Pointer(pointer)) => p.matches(pointer),
            _ => false,
        }
    }

    pub fn as_keyboard(&self) -> Option<&KeyboardPolicy> {
        match self {
            Policy::Keyboard(p) => Some(p),
            Policy::Pointer(_) => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&PointerPolicy> {
        match self {
            Policy::Pointer(p) => Some(p),
            Policy::Keyboard(_) => None,
        }
    }
}

impl From<KeyboardPolicy> for Policy {
    fn from(policy: KeyboardPolicy) -> Self {
        Policy::Keyboard(policy)
    }
}

impl From<PointerPolicy> for Policy {
    fn from(policy: PointerPolicy) -> Self {
        Policy::Pointer(policy)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Keyboard(p) => p.fmt(f),
            Policy::Pointer(p) => p.fmt(f),
        }
    }
}

/// Opaque handle returned when a list is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PolicyListId(u64);

impl PolicyListId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PolicyListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An installed batch of rules. Never edited in place: replacing a list
/// means removing its id and installing a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyList {
    pub id: PolicyListId,
    pub kind: PolicyKind,
    pub policies: Vec<Policy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub kind: EventKind,
    pub modifiers: KeyModifiers,
    pub x: i32,
    pub y: i32,
}

impl PointerEvent {
    pub fn new(kind: EventKind, modifiers: KeyModifiers, x: i32, y: i32) -> Self {
        Self {
            kind,
            modifiers,
            x,
            y,
        }
    }

    /// Button presses only; moves, drags and releases are never arbitrated.
    pub fn from_mouse(mouse: &MouseEvent) -> Option<Self> {
        match mouse.kind {
            MouseEventKind::Down(button) => Some(Self {
                kind: button.into(),
                modifiers: mouse.modifiers,
                x: i32::from(mouse.column),
                y: i32::from(mouse.row),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyEvent),
    Pointer(PointerEvent),
}

impl InputEvent {
    pub fn kind(&self) -> PolicyKind {
        match self {
            InputEvent::Key(_) => PolicyKind::Keyboard,
            InputEvent::Pointer(_) => PolicyKind::Pointer,
        }
    }
}

/// Outcome of evaluating a master list against one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// A rule matched; carries the index into the master list.
    Rule { index: usize, action: PolicyAction },
    /// Nothing matched; the host applies its default mode.
    Fallback(PropagationMode),
}

/// Ordered concatenation of every installed list of one kind, in install
/// order, as the host evaluates it.
///
/// Evaluation is first-match-wins from the top. Rules from an earlier list
/// beat rules from a later one; within a list the earlier rule wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterPolicyList {
    kind: PolicyKind,
    policies: Vec<Policy>,
}

impl MasterPolicyList {
    pub(crate) fn new(kind: PolicyKind, policies: Vec<Policy>) -> Self {
        Self { kind, policies }
    }

    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn keyboard(&self) -> Vec<KeyboardPolicy> {
        self.policies
            .iter()
            .filter_map(Policy::as_keyboard)
            .cloned()
            .collect()
    }

    pub fn pointer(&self) -> Vec<PointerPolicy> {
        self.policies
            .iter()
            .filter_map(Policy::as_pointer)
            .cloned()
            .collect()
    }

    pub fn first_match(&self, event: &InputEvent) -> Option<(usize, &Policy)> {
        self.policies
            .iter()
            .enumerate()
            .find(|(_, policy)| policy.matches(event))
    }

    pub fn route(&self, event: &InputEvent, mode: PropagationMode) -> Route {
        match self.first_match(event) {
            Some((index, policy)) => Route::Rule {
                index,
                action: policy.action(),
            },
            None => Route::Fallback(mode),
        }
    }
}
