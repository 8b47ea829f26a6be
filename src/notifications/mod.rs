//! Out-of-band order notifications.
//!
//! Notifications are produced after a transaction has committed and handed to
//! a small pool of background workers through a bounded queue. Enqueueing never
//! waits: if the queue is full or closed the notification is dropped and
//! logged. Worker-side failures are logged as well and never reach the caller
//! that placed or updated the order.

pub mod message;
pub mod nats;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::aggregates::Order;
use crate::store::{CustomerContact, CustomerDirectory};

pub use message::EmailMessage;
pub use nats::NatsNotifier;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("failed to encode notification: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to render notification")]
    Render(#[from] std::fmt::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("notification queue closed")]
    QueueClosed,
}

/// Delivery channel for order notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_order_confirmed(&self, order: &Order, customer_email: &str, customer_name: &str) -> Result<(), NotificationError>;

    async fn notify_order_status_changed(&self, order: &Order, customer_email: &str, customer_name: &str) -> Result<(), NotificationError>;

    async fn notify_admin_new_order(&self, order: &Order, admin_email: &str, customer: Option<&CustomerContact>) -> Result<(), NotificationError>;
}

/// Writes notifications to the log instead of sending them.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    fn emit(&self, kind: &str, order_id: i64, message: EmailMessage) {
        info!(kind, order_id, to = %message.to, subject = %message.subject, "notification (log only)");
        debug!(body = %message.body);
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_order_confirmed(&self, order: &Order, customer_email: &str, customer_name: &str) -> Result<(), NotificationError> {
        self.emit("order_confirmed", order.id, message::order_confirmation(order, customer_email, customer_name)?);
        Ok(())
    }

    async fn notify_order_status_changed(&self, order: &Order, customer_email: &str, customer_name: &str) -> Result<(), NotificationError> {
        self.emit("order_status_changed", order.id, message::order_status_update(order, customer_email, customer_name)?);
        Ok(())
    }

    async fn notify_admin_new_order(&self, order: &Order, admin_email: &str, customer: Option<&CustomerContact>) -> Result<(), NotificationError> {
        self.emit("admin_new_order", order.id, message::admin_new_order(order, admin_email, customer)?);
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    /// Recipient of the new-order notice. Disabled when `None`.
    pub admin_email: Option<String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self { Self { workers: 2, queue_capacity: 256, admin_email: None } }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum JobKind { OrderConfirmed, OrderStatusChanged }

#[derive(Debug)]
struct NotificationJob { kind: JobKind, order: Order }

/// Cloneable handle used by services to schedule notifications.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<NotificationJob>,
}

/// Owns the worker tasks. `join` returns once every dispatcher clone is dropped
/// and the queue has drained.
pub struct DispatcherWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl DispatcherWorkers {
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "notification worker panicked");
            }
        }
    }
}

struct WorkerContext {
    notifier: Arc<dyn Notifier>,
    customers: Arc<dyn CustomerDirectory>,
    admin_email: Option<String>,
}

impl NotificationDispatcher {
    pub fn spawn(notifier: Arc<dyn Notifier>, customers: Arc<dyn CustomerDirectory>, config: DispatcherConfig) -> (Self, DispatcherWorkers) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let ctx = Arc::new(WorkerContext { notifier, customers, admin_email: config.admin_email });
        let handles = (0..config.workers.max(1))
            .map(|worker| tokio::spawn(run_worker(worker, receiver.clone(), ctx.clone())))
            .collect();
        (Self { sender }, DispatcherWorkers { handles })
    }

    pub fn order_confirmed(&self, order: Order) {
        self.enqueue(NotificationJob { kind: JobKind::OrderConfirmed, order });
    }

    pub fn order_status_changed(&self, order: Order) {
        self.enqueue(NotificationJob { kind: JobKind::OrderStatusChanged, order });
    }

    fn enqueue(&self, job: NotificationJob) {
        let (kind, order_id) = (job.kind, job.order.id);
        match self.sender.try_send(job) {
            Ok(()) => debug!(?kind, order_id, "notification queued"),
            Err(mpsc::error::TrySendError::Full(_)) => warn!(?kind, order_id, "notification queue full, dropping"),
            Err(mpsc::error::TrySendError::Closed(_)) => warn!(?kind, order_id, error = %NotificationError::QueueClosed, "dropping notification"),
        }
    }
}

async fn run_worker(worker: usize, receiver: Arc<Mutex<mpsc::Receiver<NotificationJob>>>, ctx: Arc<WorkerContext>) {
    loop {
        let job = receiver.lock().await.recv().await;
        let Some(job) = job else { break };
        ctx.deliver(job).await;
    }
    debug!(worker, "notification worker stopped");
}

impl WorkerContext {
    async fn deliver(&self, job: NotificationJob) {
        let order = &job.order;
        let customer = match self.customers.get_customer_by_id(order.customer_id).await {
            Ok(customer) => customer,
            Err(e) => {
                warn!(order_id = order.id, error = %e, "customer lookup failed, skipping notification");
                return;
            }
        };

        if job.kind == JobKind::OrderConfirmed {
            if let Some(admin) = &self.admin_email {
                if let Err(e) = self.notifier.notify_admin_new_order(order, admin, customer.as_ref()).await {
                    warn!(order_id = order.id, error = %e, "failed to send admin new-order notification");
                }
            }
        }

        let Some(contact) = customer else {
            info!(order_id = order.id, customer_id = order.customer_id, "unknown customer, skipping notification");
            return;
        };
        let Some(email) = contact.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) else {
            info!(order_id = order.id, customer_id = order.customer_id, "customer has no email, skipping notification");
            return;
        };

        let sent = match job.kind {
            JobKind::OrderConfirmed => self.notifier.notify_order_confirmed(order, email, &contact.name).await,
            JobKind::OrderStatusChanged => self.notifier.notify_order_status_changed(order, email, &contact.name).await,
        };
        match sent {
            Ok(()) => debug!(kind = ?job.kind, order_id = order.id, "notification sent"),
            Err(e) => warn!(kind = ?job.kind, order_id = order.id, error = %e, "failed to send notification"),
        }
    }
}
