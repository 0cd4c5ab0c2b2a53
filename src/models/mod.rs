mod ebook_purchase;
mod enrollment;
mod payment;
mod webhook_event;

pub use ebook_purchase::*;
pub use enrollment::*;
pub use payment::*;
pub use webhook_event::*;
