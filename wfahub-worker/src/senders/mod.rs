/// Delivery backends for campaign email
///
/// The orchestrator never talks to SMTP directly. It asks a
/// [`SenderProvider`] for the [`Sender`] of each claimed campaign and hands it
/// merged messages, which keeps the send loop testable without a mail server.
///
/// # Sender Types
///
/// - **SMTP**: the campaign's SMTP configuration, else the owner's own, else
///   the system default
/// - **Mock**: records messages and replays scripted failures (tests and demos)

pub mod mock;
pub mod sender_trait;
pub mod smtp;

pub use mock::{MockSender, MockSenderProvider};
pub use sender_trait::{SendError, SendResult, Sender, SenderError, SenderProvider};
pub use smtp::{SmtpSender, SmtpSenderProvider};
