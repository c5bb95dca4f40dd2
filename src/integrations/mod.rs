//! Clients for third-party HTTP services: the email relay and the CNPJ/CEP lookups.

pub mod lookup;
pub mod mailer;
pub mod templates;

pub use lookup::{AddressInfo, CompanyInfo, LookupClient, LookupError};
pub use mailer::{Email, Mailer, MailerError};
