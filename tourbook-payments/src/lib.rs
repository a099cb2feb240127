pub mod manual;
pub mod paypal;
pub mod signature;
pub mod stripe;

pub use manual::ManualPaymentAdapter;
pub use paypal::{PaypalAdapter, PaypalConfig};
pub use stripe::{StripeAdapter, StripeConfig};
