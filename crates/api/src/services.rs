//! External service abstractions.
//!
//! Each service is abstracted behind a trait to enable mocking in tests.
//!
//! ## Services
//!
//! - **telegram** - Chat replies via the Telegram Bot API
//!
//! Handlers do not call the notifier directly; replies and login notices go
//! through `Dispatcher::notify`, which logs delivery failures instead of
//! failing the request.

mod telegram;

pub use telegram::{Notifier, TelegramNotifier};

#[cfg(test)]
pub use telegram::MockNotifier;
