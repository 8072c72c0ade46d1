use std::{path::PathBuf, time::Duration};

use tokio::sync::mpsc;

use crate::store::ServerStore;

pub const TUNNEL_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Polls `redstone.json` and sends each new tunnel address written by another task or process.
///
/// The task ends once the receiver is dropped.
pub fn watch_tunnel_url(
    dir: PathBuf,
    known: Option<String>,
    every: Duration,
) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(4);

    tokio::spawn(async move {
        let mut last = known;
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            if tx.is_closed() {
                break;
            }

            let current = match ServerStore::load(&dir) {
                Ok(record) => record.tunnel_url,
                Err(e) => {
                    tracing::debug!("Tunnel watcher could not read record: {}", e);
                    continue;
                }
            };

            if let Some(url) = current {
                if last.as_deref() != Some(url.as_str()) {
                    last = Some(url.clone());
                    if tx.send(url).await.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("Tunnel watcher for {} stopped", dir.display());
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ServerRecord, ServerType};

    #[tokio::test]
    async fn picks_up_address_written_later() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().to_path_buf();
        let record = ServerRecord::new("s", ServerType::Vanilla, "1.20.1", 1024, &dir);
        ServerStore::save(&dir, &record).unwrap();

        let mut rx = watch_tunnel_url(dir.clone(), None, Duration::from_millis(20));

        ServerStore::update_tunnel_url(&dir, Some("abc.gl.joinmc.link")).unwrap();

        let url = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(url.as_deref(), Some("abc.gl.joinmc.link"));
    }

    #[tokio::test]
    async fn known_address_is_not_repeated() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().to_path_buf();
        let mut record = ServerRecord::new("s", ServerType::Vanilla, "1.20.1", 1024, &dir);
        record.tunnel_url = Some("bore.pub:41000".into());
        ServerStore::save(&dir, &record).unwrap();

        let mut rx = watch_tunnel_url(
            dir.clone(),
            Some("bore.pub:41000".into()),
            Duration::from_millis(20),
        );

        let nothing = tokio::time::timeout(Duration::from_millis(150), rx.recv()).await;
        assert!(nothing.is_err());
    }
}
