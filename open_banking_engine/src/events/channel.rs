//! Simple stateless pub-sub event channel
//!
//! Producers hand events to a single [`EventHandler`], which runs the handler function for each one on its own task.
//! The handler is stateless: all it receives is the event itself. This is what decouples slow side effects (like
//! writing the audit trail) from the request that caused them.
//!
//! The handler shuts down by itself once every [`EventProducer`] has been dropped, after waiting for in-flight jobs.
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use log::*;
use tokio::sync::mpsc::{self, error::TrySendError};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // Without our own sender, the channel closes when the last producer goes away
        drop(self.sender);
        let jobs = Arc::new(AtomicI64::new(0));
        while let Some(ev) = self.listener.recv().await {
            let handler = Arc::clone(&self.handler);
            jobs.fetch_add(1, Ordering::SeqCst);
            let job = jobs.clone();
            tokio::spawn(async move {
                (handler)(ev).await;
                job.fetch_sub(1, Ordering::SeqCst);
            });
        }
        while jobs.load(Ordering::SeqCst) > 0 {
            debug!("📬️ Waiting for {} jobs to complete", jobs.load(Ordering::SeqCst));
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    /// Hands the event over without waiting. If the channel is full or closed the event is dropped and `false` is
    /// returned.
    pub fn try_publish_event(&self, event: E) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("📬️ Event channel is full. The event has been dropped.");
                false
            },
            Err(TrySendError::Closed(_)) => {
                error!("📬️ Event channel is closed. The event has been dropped.");
                false
            },
        }
    }
}
