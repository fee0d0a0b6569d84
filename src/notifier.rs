//! Queues expense notifications and emails them from a background worker so
//! that submissions never wait on the mail relay.

use std::sync::Arc;

use lettre::message::Mailbox;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    email::{
        EmailMessage, SendEmail,
        template::{notification_subject, render_expense_notification},
    },
    expense::{NewExpense, NewExpenseItem},
};

/// Everything the notification email needs, captured at submission time.
///
/// The worker owns its copy of the data, so the HTTP handler can return
/// without keeping the submission alive.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseNotification {
    /// The ID the expense record was created with.
    pub pago_id: i64,
    /// The store or location the expense belongs to.
    pub local: String,
    /// The date entered on the submission form.
    pub fecha: String,
    /// The username of the submitting user.
    pub usuario: String,
    /// The line items.
    pub items: Vec<NewExpenseItem>,
    /// The sum of the item amounts.
    pub total: f64,
}

impl ExpenseNotification {
    /// Capture the notification data for a freshly created expense record.
    pub fn new(pago_id: i64, expense: &NewExpense) -> Self {
        Self {
            pago_id,
            local: expense.local.clone(),
            fecha: expense.fecha.clone(),
            usuario: expense.usuario_registro.clone(),
            items: expense.items.clone(),
            total: expense.total(),
        }
    }
}

/// The mailboxes notification emails are sent between.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// The sender mailbox.
    pub from: Mailbox,
    /// The finance inbox notifications go to.
    pub to: Mailbox,
    /// An optional second recipient.
    pub cc: Option<Mailbox>,
}

impl NotifierConfig {
    #[cfg(test)]
    pub(crate) fn test() -> Self {
        Self {
            from: "Gastos <gastos@example.com>".parse().unwrap(),
            to: "Finanzas <finanzas@example.com>".parse().unwrap(),
            cc: None,
        }
    }
}

/// A cloneable handle for queueing notification emails.
///
/// Dropping every handle shuts the worker down once its queue is drained.
#[derive(Debug, Clone)]
pub struct Notifier {
    jobs: mpsc::UnboundedSender<ExpenseNotification>,
}

impl Notifier {
    /// Start the background worker and return a handle to it.
    ///
    /// The returned [JoinHandle] resolves once every [Notifier] clone has
    /// been dropped and the remaining queue has been worked off.
    pub fn spawn(
        sender: Arc<dyn SendEmail>,
        config: NotifierConfig,
    ) -> (Self, JoinHandle<()>) {
        let (jobs, queue) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(queue, sender, config));

        (Self { jobs }, worker)
    }

    /// Queue the notification email for a created expense record.
    ///
    /// Never blocks and never fails the caller: if the worker is gone the
    /// notification is logged and dropped, since the expense itself has
    /// already been committed.
    pub fn dispatch(&self, notification: ExpenseNotification) {
        if self.jobs.send(notification).is_err() {
            tracing::warn!("the notification worker is gone, dropping notification email");
        }
    }
}

async fn run_worker(
    mut queue: mpsc::UnboundedReceiver<ExpenseNotification>,
    sender: Arc<dyn SendEmail>,
    config: NotifierConfig,
) {
    while let Some(notification) = queue.recv().await {
        let pago_id = notification.pago_id;

        let mut to = vec![config.to.clone()];
        if let Some(cc) = &config.cc {
            to.push(cc.clone());
        }

        let message = EmailMessage {
            subject: notification_subject(&notification),
            body: render_expense_notification(&notification),
            from: config.from.clone(),
            to,
            is_html: true,
        };

        match sender.send(message).await {
            // The expense is already committed, so a failed email is logged
            // and dropped rather than retried.
            Ok(()) => tracing::info!(pago_id, "notification email sent"),
            Err(error) => {
                tracing::error!(pago_id, "could not send notification email: {error}");
            }
        }
    }
}

#[cfg(test)]
mod notifier_tests {
    use std::sync::Arc;

    use crate::{
        email::MockSender,
        expense::{NewExpense, NewExpenseItem},
    };

    use super::{ExpenseNotification, Notifier, NotifierConfig};

    fn get_test_notification(pago_id: i64) -> ExpenseNotification {
        ExpenseNotification::new(
            pago_id,
            &NewExpense {
                local: "Store A".to_owned(),
                fecha: "2024-01-15".to_owned(),
                usuario_registro: "Lucas Ortiz".to_owned(),
                items: vec![NewExpenseItem {
                    concepto: "Supplies".to_owned(),
                    importe: 25.50,
                    observacion: String::new(),
                }],
            },
        )
    }

    #[tokio::test]
    async fn worker_sends_queued_notifications_and_exits_when_handles_drop() {
        let sender = MockSender::new();
        let (notifier, worker) = Notifier::spawn(Arc::new(sender.clone()), NotifierConfig::test());

        notifier.dispatch(get_test_notification(1));
        notifier.dispatch(get_test_notification(2));
        drop(notifier);

        worker.await.unwrap();

        let messages = sender.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].subject, "Nueva Solicitud de Gastos - Store A");
        assert!(messages[0].is_html);
        assert_eq!(messages[0].to.len(), 1);
    }

    #[tokio::test]
    async fn cc_recipient_is_included_when_configured() {
        let sender = MockSender::new();
        let config = NotifierConfig {
            cc: Some("Gerencia <gerencia@example.com>".parse().unwrap()),
            ..NotifierConfig::test()
        };
        let (notifier, worker) = Notifier::spawn(Arc::new(sender.clone()), config);

        notifier.dispatch(get_test_notification(1));
        drop(notifier);
        worker.await.unwrap();

        let messages = sender.messages();
        assert_eq!(messages[0].to.len(), 2);
    }

    #[tokio::test]
    async fn dispatch_after_worker_shutdown_does_not_panic() {
        let sender = MockSender::new();
        let (notifier, worker) = Notifier::spawn(Arc::new(sender), NotifierConfig::test());

        worker.abort();
        let _ = worker.await;

        notifier.dispatch(get_test_notification(1));
    }

    #[test]
    fn notification_captures_the_total() {
        let notification = get_test_notification(1);

        assert_eq!(notification.total, 25.50);
    }
}
