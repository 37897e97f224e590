use crate::use_cases::types::HubEvent;
use tokio::sync::mpsc;

/// Shared handler state: connections only ever talk to the hub queue.
#[derive(Clone)]
pub struct AppState {
    pub hub_tx: mpsc::Sender<HubEvent>,
}
