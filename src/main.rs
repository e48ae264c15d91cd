use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::{Mutex, watch};
use tracing::Level;

use policy_arbiter::config::{ArbiterConfig, Platform};
use policy_arbiter::geometry::{Bounds, Region, ViewTransform};
use policy_arbiter::host::{HostPort, ModalState, RecordingHost, descriptor};
use policy_arbiter::state::{DocumentView, EditorState, Guide, Orientation, SelectedLayer, Tool};
use policy_arbiter::{
    EventKind, HostError, HostEvent, InputEvent, KeyboardPolicy, PointerEvent, PointerPolicy,
    PolicyCoordinator, PolicyKind, PropagationMode, Reinstaller, Route, tracing_sub,
};

#[derive(Parser, Debug)]
#[command(
    name = "policy-arbiter",
    version = env!("CARGO_PKG_VERSION"),
    about = "Replays an editing session and shows where each click is routed"
)]
struct Cli {
    /// Inset of the overlay rectangle inside the selection, in pixels.
    #[arg(long, value_name = "PX", default_value_t = policy_arbiter::constants::BORDER_INSET)]
    inset: i32,

    /// Outset of the rotation band around the selection, in pixels.
    #[arg(long, value_name = "PX", default_value_t = policy_arbiter::constants::BORDER_OUTSET)]
    outset: i32,

    /// Half-thickness of guide grab strips, in pixels.
    #[arg(long, value_name = "PX", default_value_t = policy_arbiter::constants::GUIDE_HALF_THICKNESS)]
    guide_thickness: i32,

    /// Quiet period before border and guide policies are recomputed.
    #[arg(long, value_name = "MS", default_value_t = 150)]
    debounce_ms: u64,

    /// Platform family whose modifiers to emulate (mac or other).
    #[arg(long)]
    platform: Option<String>,

    /// Log verbosity (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Append logs to this file instead of stderr.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

impl TryFrom<&Cli> for ArbiterConfig {
    type Error = String;

    fn try_from(cli: &Cli) -> Result<Self, Self::Error> {
        let platform = match &cli.platform {
            Some(name) => name.parse::<Platform>().map_err(|e| e.to_string())?,
            None => Platform::current(),
        };
        let log_level = cli
            .log_level
            .parse::<Level>()
            .map_err(|_| format!("unknown log level {:?}", cli.log_level))?;
        let config = ArbiterConfig {
            border_inset: cli.inset,
            border_outset: cli.outset,
            guide_half_thickness: cli.guide_thickness,
            debounce: Duration::from_millis(cli.debounce_ms),
            platform,
            log_level,
        };
        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}

/// Logs every host call as a JSON descriptor before handing it on.
struct TracingHost {
    inner: RecordingHost,
}

#[async_trait]
impl HostPort for TracingHost {
    async fn set_keyboard_policy(&self, policies: Vec<KeyboardPolicy>) -> Result<(), HostError> {
        if let Ok(json) = descriptor::keyboard(&policies) {
            tracing::info!(descriptor = %json, "setKeyboardEventPropagationPolicy");
        }
        self.inner.set_keyboard_policy(policies).await
    }

    async fn set_pointer_policy(&self, policies: Vec<PointerPolicy>) -> Result<(), HostError> {
        if let Ok(json) = descriptor::pointer(&policies) {
            tracing::info!(descriptor = %json, "setPointerEventPropagationPolicy");
        }
        self.inner.set_pointer_policy(policies).await
    }

    async fn set_keyboard_mode(&self, mode: PropagationMode) -> Result<(), HostError> {
        let json = descriptor::mode(PolicyKind::Keyboard, mode);
        tracing::info!(descriptor = %json, "setKeyboardPropagationMode");
        self.inner.set_keyboard_mode(mode).await
    }

    async fn set_pointer_mode(&self, mode: PropagationMode) -> Result<(), HostError> {
        let json = descriptor::mode(PolicyKind::Pointer, mode);
        tracing::info!(descriptor = %json, "setPointerPropagationMode");
        self.inner.set_pointer_mode(mode).await
    }

    async fn keyboard_mode(&self) -> Result<PropagationMode, HostError> {
        self.inner.keyboard_mode().await
    }
}

type SharedCoordinator = Arc<Mutex<PolicyCoordinator<TracingHost>>>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();
    let config = ArbiterConfig::try_from(&cli)
        .map_err(|msg| io::Error::new(io::ErrorKind::InvalidInput, msg))?;
    tracing_sub::init(config.log_level, cli.log_file.as_deref())?;

    let settle = config.debounce * 2;
    let host = TracingHost {
        inner: RecordingHost::new(),
    };
    let coordinator: SharedCoordinator =
        Arc::new(Mutex::new(PolicyCoordinator::new(host, config.clone())));

    {
        let mut c = coordinator.lock().await;
        c.set_mode(PolicyKind::Keyboard, None).await.map_err(io::Error::other)?;
        c.set_mode(PolicyKind::Pointer, None).await.map_err(io::Error::other)?;
        // space-drag pans the canvas in the host even while the overlay has focus
        c.add_keydown_policy(true, KeyCode::Char(' '), KeyModifiers::NONE)
            .await
            .map_err(io::Error::other)?;
    }

    let (states, rx) = watch::channel(EditorState::default());
    let handle = Reinstaller::new(coordinator.clone(), config.debounce).start(rx);

    let mut doc = DocumentView::new(1, Region::new(0, 40, 1200, 760));
    doc.guides = vec![
        Guide {
            id: 1,
            layer_id: 0,
            orientation: Orientation::Vertical,
            position: 600.0,
        },
        Guide {
            id: 2,
            layer_id: 42,
            orientation: Orientation::Horizontal,
            position: 300.0,
        },
    ];
    doc.transform = ViewTransform::new(1.0, 0.0, 40.0);

    step(&coordinator, &states, "document opened", EditorState::with_document(doc.clone()), settle).await;

    doc.selection = vec![SelectedLayer::layer(7, Bounds::new(100.0, 60.0, 200.0, 110.0))];
    doc.top_level_ancestors = vec![42];
    step(&coordinator, &states, "layer selected", EditorState::with_document(doc.clone()), settle).await;

    doc.transform = ViewTransform::new(2.0, -100.0, 0.0);
    step(&coordinator, &states, "zoomed to 200%", EditorState::with_document(doc.clone()), settle).await;

    let mut board = SelectedLayer::artboard(9, Bounds::new(0.0, 0.0, 400.0, 400.0));
    board.child_bounds = Some(Bounds::new(20.0, 20.0, 380.0, 380.0));
    doc.selection.push(board);
    step(&coordinator, &states, "artboard added to selection", EditorState::with_document(doc.clone()), settle).await;

    let mut pen = EditorState::with_document(doc.clone());
    pen.tool = Tool::Pen;
    pen.vector_mask_mode = true;
    step(&coordinator, &states, "pen tool, vector mask editing", pen, settle).await;

    {
        let mut c = coordinator.lock().await;
        let entering = HostEvent::ToolModalStateChanged {
            state: ModalState::TextEntry,
            active: true,
        };
        c.handle_host_event(&entering).await.map_err(io::Error::other)?;
        report(&c, "text entry (suspended)");
        let leaving = HostEvent::ToolModalStateChanged {
            state: ModalState::TextEntry,
            active: false,
        };
        c.handle_host_event(&leaving).await.map_err(io::Error::other)?;
        report(&c, "text entry finished (restored)");
        c.handle_host_event(&HostEvent::GeometryChanged)
            .await
            .map_err(io::Error::other)?;
    }
    tokio::time::sleep(settle).await;
    report(&*coordinator.lock().await, "canvas resized (recomputed)");

    step(&coordinator, &states, "document closed", EditorState::default(), settle).await;

    handle.stop();
    Ok(())
}

async fn step(
    coordinator: &SharedCoordinator,
    states: &watch::Sender<EditorState>,
    label: &str,
    state: EditorState,
    settle: Duration,
) {
    states.send_replace(state);
    tokio::time::sleep(settle).await;
    report(&*coordinator.lock().await, label);
}

fn report(coordinator: &PolicyCoordinator<TracingHost>, label: &str) {
    println!("== {}", label);
    for kind in PolicyKind::ALL {
        let master = coordinator.master_policy_list(kind);
        println!(
            "   {} ({} rules, mode {})",
            kind,
            master.len(),
            coordinator.store().mode(kind)
        );
        for policy in master.policies() {
            println!("     {}", policy);
        }
    }
    let probes = [
        ("click 150,100", pointer(EventKind::LeftMouseDown, KeyModifiers::NONE, 150, 100)),
        ("shift-click 98,98", pointer(EventKind::LeftMouseDown, KeyModifiers::SHIFT, 98, 98)),
        ("click 80,70", pointer(EventKind::LeftMouseDown, KeyModifiers::NONE, 80, 70)),
        ("click on guide 600,500", pointer(EventKind::LeftMouseDown, KeyModifiers::NONE, 600, 500)),
        (
            "ctrl right-click 10,10",
            pointer(EventKind::RightMouseDown, KeyModifiers::CONTROL, 10, 10),
        ),
        (
            "space",
            InputEvent::Key(KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE)),
        ),
    ];
    for (name, event) in probes {
        let verdict = match coordinator.route(&event) {
            Route::Rule { index, action } => format!("{} (rule {})", action, index),
            Route::Fallback(mode) => format!("default mode {}", mode),
        };
        println!("   {:<24} -> {}", name, verdict);
    }
}

fn pointer(kind: EventKind, modifiers: KeyModifiers, x: i32, y: i32) -> InputEvent {
    InputEvent::Pointer(PointerEvent::new(kind, modifiers, x, y))
}
