//! Terminal rendition of the two-track screen.
//!
//! Two text rows show the loaded values, two "buttons" show the trigger
//! values. Commands on stdin: `live`, `state`, `hide`, `show`, `quit`.

use std::error::Error;
use std::sync::Arc;

use statecast_core::config::Config;
use statecast_core::controller::PresentationController;
use statecast_core::fetch::{FetchService, SimulatedFetcher};
use statecast_core::reactive::{distinct_until_changed, Subscription};
use statecast_core::snapshot::{FileSnapshot, MemorySnapshot, SnapshotStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy)]
enum Widget {
    LiveText,
    StateText,
    LiveButton,
    StateButton,
}

type UiSender = mpsc::UnboundedSender<(Widget, String)>;

#[derive(Debug, Default)]
struct Screen {
    live_text: String,
    state_text: String,
    live_button: String,
    state_button: String,
}

impl Screen {
    fn update(&mut self, widget: Widget, value: String) {
        let slot = match widget {
            Widget::LiveText => &mut self.live_text,
            Widget::StateText => &mut self.state_text,
            Widget::LiveButton => &mut self.live_button,
            Widget::StateButton => &mut self.state_button,
        };
        *slot = value;
    }

    fn render(&self) {
        println!(
            "live  | text {:>8} | button [{:>8}]",
            self.live_text, self.live_button
        );
        println!(
            "state | text {:>8} | button [{:>8}]",
            self.state_text, self.state_button
        );
    }
}

/// Observer that hands deduplicated values to the UI task.
fn render_into(ui: &UiSender, widget: Widget) -> impl Fn(&String) + Send + Sync + 'static {
    let ui = ui.clone();
    distinct_until_changed(move |value: &String| {
        let _ = ui.send((widget, value.clone()));
    })
}

fn attach_state(controller: &PresentationController, ui: &UiSender) -> [Subscription; 2] {
    [
        controller
            .loaded_state()
            .observe(render_into(ui, Widget::StateText)),
        controller
            .triggered_state()
            .observe(render_into(ui, Widget::StateButton)),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let snapshot: Arc<dyn SnapshotStore> = match &config.snapshot_path {
        Some(path) => Arc::new(FileSnapshot::open(path)?),
        None => Arc::new(MemorySnapshot::new()),
    };
    let fetch = FetchService::new(SimulatedFetcher::new(config.fetch_delay()));
    let controller = PresentationController::new(&config, fetch, snapshot)?;

    let (ui, mut updates) = mpsc::unbounded_channel();
    let _live = [
        controller
            .loaded_live()
            .observe(render_into(&ui, Widget::LiveText)),
        controller
            .triggered_live()
            .observe(render_into(&ui, Widget::LiveButton)),
    ];
    let mut state_views = Some(attach_state(&controller, &ui));
    let mut failures = controller.failures();

    println!("commands: live | state | hide | show | quit");
    let mut screen = Screen::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            Some((widget, value)) = updates.recv() => {
                screen.update(widget, value);
                screen.render();
            }
            Ok(failure) = failures.recv() => {
                println!("{} {:?} fetch failed: {}", failure.track, failure.channel, failure.error);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "live" => controller.trigger_live(),
                    "state" => controller.trigger_state(),
                    "hide" => {
                        state_views = None;
                        println!("state views detached");
                    }
                    "show" => {
                        if state_views.is_none() {
                            state_views = Some(attach_state(&controller, &ui));
                        }
                    }
                    "quit" => break,
                    "" => {}
                    other => println!("unknown command {other:?}"),
                }
            }
        }
    }

    drop(state_views);
    controller.shutdown();
    Ok(())
}
