//! Remote channels for trove
//!
//! - [`TransferGateway`]: put/get/list/delete/exists addressed by remote folder
//!   and name, implemented over SFTP ([`SftpGateway`]) and over a local
//!   directory ([`LocalDirGateway`]).
//! - [`Notifier`]: send an HTML message with an optional attachment,
//!   implemented over SMTP with implicit TLS ([`SmtpNotifier`]).
//!
//! All calls block the calling thread.

pub mod error;
pub mod gateway;
pub mod local;
pub mod notify;
pub mod sftp;
pub mod smtp;

pub use error::{RemoteError, Result};
pub use gateway::{remote_join, RemoteEntry, TransferGateway};
pub use local::LocalDirGateway;
pub use notify::{is_valid_email, validate_email_syntax, Delivery, Notification, Notifier};
pub use sftp::{SftpGateway, SftpSettings};
pub use smtp::{SmtpNotifier, SmtpSettings};
