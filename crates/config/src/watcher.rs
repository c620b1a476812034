use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Quiet period after a change before a reload is signalled; editors tend to
/// write a file in several steps.
const SETTLE: Duration = Duration::from_millis(200);

/// Watches the config file and sends `()` once per burst of writes.
///
/// The parent directory is watched rather than the file itself so that
/// editors which save by rename are still noticed. Dropping the watcher
/// stops the background task.
///
/// # Example
/// ```no_run
/// # async fn demo() {
/// let (_watcher, mut rx) = twin_config::ConfigWatcher::spawn("/home/user/.config/twin/twin.toml");
/// while rx.recv().await.is_some() {
///     println!("config changed — reloading");
/// }
/// # }
/// ```
pub struct ConfigWatcher {
    path: PathBuf,
    task: JoinHandle<()>,
}

impl ConfigWatcher {
    pub fn spawn(path: impl AsRef<Path>) -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        let path = path.as_ref().to_path_buf();
        let task = tokio::spawn(watch_loop(path.clone(), tx));
        (Self { path, task }, rx)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn watch_loop(path: PathBuf, tx: mpsc::Sender<()>) {
    use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

    let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) else {
        error!("Config path '{}' has no parent directory; not watching", path.display());
        return;
    };
    let file_name = path.file_name().map(ToOwned::to_owned);

    let (event_tx, mut event_rx) = mpsc::channel::<notify::Result<Event>>(16);

    let mut watcher = match RecommendedWatcher::new(
        move |res| {
            let _ = event_tx.blocking_send(res);
        },
        Config::default().with_poll_interval(Duration::from_secs(2)),
    ) {
        Ok(w) => w,
        Err(e) => {
            error!("Failed to create filesystem watcher: {e}");
            return;
        }
    };

    if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
        warn!("Cannot watch '{}': {e}; live reload disabled", dir.display());
        return;
    }

    info!("Watching config file: {}", path.display());

    while let Some(event) = event_rx.recv().await {
        let event = match event {
            Ok(e) => e,
            Err(e) => {
                warn!("Watcher error: {e}");
                continue;
            }
        };
        let touches_config = event
            .paths
            .iter()
            .any(|p| p.file_name().map(ToOwned::to_owned) == file_name);
        if !touches_config || !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            continue;
        }

        // Swallow the rest of the burst.
        tokio::time::sleep(SETTLE).await;
        while event_rx.try_recv().is_ok() {}

        debug!("Config change detected");
        if tx.send(()).await.is_err() {
            break; // receiver dropped
        }
    }
}
