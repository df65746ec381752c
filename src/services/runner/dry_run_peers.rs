use crate::error::Result;
use crate::events::Shape;
use crate::services::shape_source::DryRunShapeSource;
use crate::services::store::{StoreBackend, StoreChanges};
use crate::services::WindowCoordinator;
use serde_json::json;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::info;

use super::r#trait::RegistryTask;

const MAX_PEERS: usize = 3;
const PEER_PERIOD: Duration = Duration::from_millis(500);
// Каждые столько периодов один эмулируемый участник приходит или уходит
const CHURN_EVERY: u64 = 10;

struct Peer {
    coordinator: WindowCoordinator,
    changes: StoreChanges,
}

/// Dry-run: эмулирует соседние процессы в том же хранилище
pub struct DryRunPeers {
    backend: StoreBackend,
    seed: Shape,
}

impl DryRunPeers {
    pub fn new(backend: StoreBackend, seed: Shape) -> Self {
        Self { backend, seed }
    }

    fn spawn_peer(&self, index: usize) -> Result<Peer> {
        let (store, mut changes) = self.backend.connect()?;
        super::discard_pending(&mut changes);

        let offset = 250 * (index as i32 + 1);
        let seed = Shape::new(self.seed.x + offset, self.seed.y, self.seed.width, self.seed.height);
        let coordinator = WindowCoordinator::new(store, Arc::new(DryRunShapeSource::new(seed)));
        let id = coordinator.register(json!({ "dry_run": true, "peer": index }))?;
        info!("Dry-run: эмулируемый участник id {} пришёл", id);

        Ok(Peer {
            coordinator,
            changes,
        })
    }

    async fn run_impl(self) -> Result<()> {
        info!("Dry-run режим - соседние процессы эмулируются");

        let mut peers: Vec<Peer> = Vec::new();
        let mut spawned = 0usize;
        let mut step = 0u64;
        let mut ticker = interval(PEER_PERIOD);

        loop {
            ticker.tick().await;
            step += 1;

            for peer in peers.iter_mut() {
                while let Ok(change) = peer.changes.try_recv() {
                    peer.coordinator.handle_store_change(change);
                }
                peer.coordinator.tick()?;
            }

            if step % CHURN_EVERY != 0 {
                continue;
            }

            if peers.len() < MAX_PEERS {
                peers.push(self.spawn_peer(spawned)?);
                spawned += 1;
            } else {
                let peer = peers.remove(0);
                peer.coordinator.deregister()?;
                info!(
                    "Dry-run: эмулируемый участник id {} ушёл",
                    peer.coordinator.id().unwrap_or_default()
                );
            }
        }
    }
}

#[async_trait::async_trait]
impl RegistryTask for DryRunPeers {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
