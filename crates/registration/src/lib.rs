//! Registration saga for new users.
//!
//! Registering a user touches four parties that share no transaction: the
//! primary store, the audit trail, and two downstream services. The saga
//! runs synchronously and in memory:
//! 1. Check the email is not taken
//! 2. Insert the record and its audit entry as one local unit
//! 3. Notify every downstream endpoint (each call retried by [`RetryPolicy`])
//! 4. If any endpoint failed, delete the local record and retract the
//!    notification from every endpoint that did accept it
//!
//! Compensation is best-effort. Nothing is persisted about the saga itself,
//! so a crash between steps can leave the parties disagreeing.

pub mod client;
pub mod compensation;
pub mod dto;
pub mod error;
pub mod messages;
pub mod notifier;
pub mod orchestrator;
pub mod payload;
pub mod retry;
pub mod service;
pub mod state;

pub use client::{
    CallResponse, DownstreamClient, Endpoint, HttpDownstreamClient, InMemoryDownstreamClient,
};
pub use compensation::{CompensationController, FinalOutcome};
pub use dto::{InsertUserDto, UpdateUserDto, UserDto};
pub use error::{DownstreamError, RegistrationError};
pub use notifier::{DownstreamNotifier, EndpointOutcome, FanOut};
pub use orchestrator::{RegistrationOrchestrator, RegistrationReport};
pub use payload::NotificationPayload;
pub use retry::{RetryAttempt, RetryHook, RetryOutcome, RetryPolicy};
pub use service::UserService;
pub use state::{FailureKind, RegistrationState};
