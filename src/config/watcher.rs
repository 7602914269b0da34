//! Hot reload of the configuration file.
//!
//! The parent directory is watched rather than the file itself, so saves
//! that replace the file by rename are still seen. Every change is re-read
//! and re-validated; only a config that differs from the last one delivered
//! is sent on.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ServiceConfig;

/// Watches one config file and emits each new valid configuration.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ServiceConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end of its updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ServiceConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching on notify's background thread.
    ///
    /// Reloads stop when the returned handle is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let directory = watch_root(&self.path);
        let file_name = self.path.file_name().map(OsString::from);
        let path = self.path;
        let tx = self.update_tx;
        let mut last_sent = load_config(&path).ok();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = %e, "Config watch error");
                        return;
                    }
                };
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    return;
                }
                let touches_config = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(OsString::from) == file_name);
                if !touches_config {
                    return;
                }

                match load_config(&path) {
                    Ok(config) if last_sent.as_ref() == Some(&config) => {
                        tracing::debug!(path = %path.display(), "Config unchanged, skipping reload");
                    }
                    Ok(config) => {
                        tracing::info!(path = %path.display(), "Config file changed, reloading");
                        last_sent = Some(config.clone());
                        let _ = tx.send(config);
                    }
                    Err(e) => {
                        tracing::error!(
                            path = %path.display(),
                            error = %e,
                            "Reloaded config rejected, keeping current configuration"
                        );
                    }
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&directory, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %directory.display(), "Config watcher started");
        Ok(watcher)
    }
}

fn watch_root(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn next_update(
        updates: &mut mpsc::UnboundedReceiver<ServiceConfig>,
        wanted: &[&str],
    ) -> ServiceConfig {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let update = tokio::time::timeout_at(deadline, updates.recv())
                .await
                .expect("no config update received")
                .expect("watcher channel closed");
            // A single write can surface as a truncate event followed by a data event.
            if update.cors.allowed_origins == wanted {
                return update;
            }
        }
    }

    #[tokio::test]
    async fn test_reload_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task-relay.toml");
        std::fs::write(&path, "[cors]\nallowed_origins = []\n").unwrap();

        let (watcher, mut updates) = ConfigWatcher::new(&path);
        let _guard = watcher.run().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::write(&path, "[cors]\nallowed_origins = [\"http://reloaded.example\"]\n").unwrap();
        next_update(&mut updates, &["http://reloaded.example"]).await;
    }

    #[tokio::test]
    async fn test_reload_after_rename_replace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task-relay.toml");
        std::fs::write(&path, "[cors]\nallowed_origins = []\n").unwrap();

        let (watcher, mut updates) = ConfigWatcher::new(&path);
        let _guard = watcher.run().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let staged = dir.path().join("task-relay.toml.new");
        std::fs::write(&staged, "[cors]\nallowed_origins = [\"https://renamed.example\"]\n").unwrap();
        std::fs::rename(&staged, &path).unwrap();

        next_update(&mut updates, &["https://renamed.example"]).await;
    }

    #[tokio::test]
    async fn test_invalid_edit_is_not_delivered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task-relay.toml");
        std::fs::write(&path, "").unwrap();

        let (watcher, mut updates) = ConfigWatcher::new(&path);
        let _guard = watcher.run().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::write(&path, "[timeouts]\nrequest_secs = 0\n").unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        std::fs::write(&path, "[cors]\nallowed_origins = [\"https://valid.example\"]\n").unwrap();

        let update = next_update(&mut updates, &["https://valid.example"]).await;
        assert_eq!(update.timeouts.request_secs, 60);
    }

    #[test]
    fn test_watch_root() {
        assert_eq!(watch_root(Path::new("task-relay.toml")), PathBuf::from("."));
        assert_eq!(watch_root(Path::new("/etc/app/x.toml")), PathBuf::from("/etc/app"));
    }
}
