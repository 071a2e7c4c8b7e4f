//! Application callback slots.
//!
//! Slots hold `Arc<dyn Fn>` handlers behind a read lock; invocation clones
//! the handler out first, so a callback may re-enter the engine (broadcast,
//! register another callback) without deadlocking.

use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::warn;

use crate::core::envelope::Envelope;
use crate::error::constants;
use crate::protocol::membership::Host;
use crate::transport::connection::Connection;

type ReceiveConnectionFn = dyn Fn(&str, &Connection) + Send + Sync + 'static;
type EnterNetworkFn = dyn Fn(&Value) + Send + Sync + 'static;
type DisconnectFn = dyn Fn(&Host, &Connection) + Send + Sync + 'static;
type DataFn = dyn Fn(&Envelope, &Connection) + Send + Sync + 'static;

#[derive(Default)]
pub(crate) struct Callbacks {
    receive_connection: RwLock<Option<Arc<ReceiveConnectionFn>>>,
    enter_network: RwLock<Option<Arc<EnterNetworkFn>>>,
    disconnect: RwLock<Option<Arc<DisconnectFn>>>,
    data: RwLock<Option<Arc<DataFn>>>,
}

fn store<T: ?Sized>(slot: &RwLock<Option<Arc<T>>>, handler: Arc<T>) {
    match slot.write() {
        Ok(mut guard) => *guard = Some(handler),
        Err(_) => warn!("{}", constants::ERR_CALLBACK_WRITE_LOCK),
    }
}

fn load<T: ?Sized>(slot: &RwLock<Option<Arc<T>>>) -> Option<Arc<T>> {
    match slot.read() {
        Ok(guard) => guard.clone(),
        Err(_) => {
            warn!("{}", constants::ERR_CALLBACK_READ_LOCK);
            None
        }
    }
}

impl Callbacks {
    pub fn set_receive_connection(&self, handler: Arc<ReceiveConnectionFn>) {
        store(&self.receive_connection, handler);
    }

    pub fn set_enter_network(&self, handler: Arc<EnterNetworkFn>) {
        store(&self.enter_network, handler);
    }

    pub fn set_disconnect(&self, handler: Arc<DisconnectFn>) {
        store(&self.disconnect, handler);
    }

    pub fn set_data(&self, handler: Arc<DataFn>) {
        store(&self.data, handler);
    }

    pub fn receive_connection(&self, peer_name: &str, connection: &Connection) {
        if let Some(handler) = load(&self.receive_connection) {
            handler(peer_name, connection);
        }
    }

    pub fn enter_network(&self, state: &Value) {
        if let Some(handler) = load(&self.enter_network) {
            handler(state);
        }
    }

    pub fn disconnect(&self, host: &Host, connection: &Connection) {
        if let Some(handler) = load(&self.disconnect) {
            handler(host, connection);
        }
    }

    pub fn data(&self, envelope: &Envelope, connection: &Connection) {
        if let Some(handler) = load(&self.data) {
            handler(envelope, connection);
        }
    }
}
