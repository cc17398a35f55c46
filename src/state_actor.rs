use crate::{NewStatus, NotificationOutcome, StatusRecord};
use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Owns the status log. Every read and write goes through its mailbox, so
/// appends are applied in the order they are received.
struct StatusLogActor {
    receiver: mpsc::Receiver<StatusLogMessage>,
    records: VecDeque<StatusRecord>,
    capacity: usize,
    next_id: u64,
}

impl StatusLogActor {
    fn new(receiver: mpsc::Receiver<StatusLogMessage>, capacity: usize) -> Self {
        Self {
            receiver,
            records: VecDeque::new(),
            capacity: capacity.max(1),
            next_id: 1,
        }
    }

    fn append(&mut self, new: NewStatus) -> StatusRecord {
        let record = StatusRecord {
            id: self.next_id,
            status: new.status,
            timestamp: new.timestamp,
            notification: new.notification,
        };
        self.next_id += 1;

        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record.clone());
        record
    }

    fn set_notification(&mut self, id: u64, outcome: NotificationOutcome) -> bool {
        // Ids are assigned in increasing order, so the deque is sorted by id.
        match self.records.binary_search_by_key(&id, |record| record.id) {
            Ok(index) => {
                self.records[index].notification = outcome;
                true
            }
            Err(_) => false,
        }
    }

    fn handle_message(&mut self, msg: StatusLogMessage) {
        // Send errors mean the caller stopped waiting for the reply. We can safely ignore these.
        match msg {
            StatusLogMessage::Append { new, respond_to } => {
                let _ = respond_to.send(self.append(new));
            }
            StatusLogMessage::Latest { respond_to } => {
                let _ = respond_to.send(self.records.back().cloned());
            }
            StatusLogMessage::Records { respond_to } => {
                let _ = respond_to.send(self.records.iter().cloned().collect());
            }
            StatusLogMessage::SetNotification {
                id,
                outcome,
                respond_to,
            } => {
                let _ = respond_to.send(self.set_notification(id, outcome));
            }
        }
    }

    async fn run(&mut self) {
        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg);
        }
    }
}

/// Cloneable handle to the status log actor.
#[derive(Clone, Debug)]
pub struct StatusLogHandle {
    sender: mpsc::Sender<StatusLogMessage>,
}

impl StatusLogHandle {
    /// Spawns the actor. At most `capacity` records are kept; the oldest is
    /// evicted first.
    #[must_use]
    pub fn new(capacity: usize, mailbox: usize) -> Self {
        let (sender, receiver) = mpsc::channel(mailbox.max(1));
        let mut actor = StatusLogActor::new(receiver, capacity);
        tokio::spawn(async move { actor.run().await });

        Self { sender }
    }

    pub async fn append(&self, new: NewStatus) -> Result<StatusRecord, StatusLogError> {
        self.request(|respond_to| StatusLogMessage::Append { new, respond_to })
            .await
    }

    /// The current status, if anything has been reported yet.
    pub async fn latest(&self) -> Result<Option<StatusRecord>, StatusLogError> {
        self.request(|respond_to| StatusLogMessage::Latest { respond_to })
            .await
    }

    /// Every retained record, oldest first.
    pub async fn records(&self) -> Result<Vec<StatusRecord>, StatusLogError> {
        self.request(|respond_to| StatusLogMessage::Records { respond_to })
            .await
    }

    /// Returns `false` if the record has already been evicted.
    pub async fn set_notification(
        &self,
        id: u64,
        outcome: NotificationOutcome,
    ) -> Result<bool, StatusLogError> {
        self.request(|respond_to| StatusLogMessage::SetNotification {
            id,
            outcome,
            respond_to,
        })
        .await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> StatusLogMessage,
    ) -> Result<T, StatusLogError> {
        let (send, recv) = oneshot::channel();
        self.sender
            .send(build(send))
            .await
            .map_err(|_| StatusLogError::Closed)?;
        recv.await.map_err(|_| StatusLogError::Closed)
    }
}

#[derive(Debug)]
enum StatusLogMessage {
    Append {
        new: NewStatus,
        respond_to: oneshot::Sender<StatusRecord>,
    },
    Latest {
        respond_to: oneshot::Sender<Option<StatusRecord>>,
    },
    Records {
        respond_to: oneshot::Sender<Vec<StatusRecord>>,
    },
    SetNotification {
        id: u64,
        outcome: NotificationOutcome,
        respond_to: oneshot::Sender<bool>,
    },
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum StatusLogError {
    #[error("Status log is no longer running")]
    Closed,
}
