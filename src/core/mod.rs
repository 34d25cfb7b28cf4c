// SPDX-License-Identifier: MIT

pub mod dispatch;
pub mod enqueue;
pub mod message;
pub mod presence;
pub mod retry;
pub mod store;
pub mod types;
pub mod worker;

pub use dispatch::DispatchOutcome;
pub use enqueue::enqueue;
pub use message::{Agent, Message};
pub use presence::{FastPathReceiver, FastPathSender, PresenceEvent};
pub use retry::RetryScheduler;
pub use store::{AgentDirectory, MessageStore, PresenceStore};
pub use types::{AgentId, AgentStatus, MessageId, MessageStatus};
pub use worker::DeliveryWorker;
