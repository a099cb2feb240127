pub mod manager;
pub mod finance;
pub mod invoice;
pub mod orchestrator;
pub mod reference;

pub use manager::{BookingDetail, BookingService, NewBooking, WebhookDisposition};
pub use finance::{summarize_vendor, VendorSummary};
pub use invoice::{build_invoice, build_invoice_today, TextInvoiceRenderer};
pub use orchestrator::PaymentOrchestrator;
pub use reference::generate_reference;
