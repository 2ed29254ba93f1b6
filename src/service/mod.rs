pub mod crew_rate;
pub mod pricing;
pub mod reconcile;
pub mod rental_curve;
pub mod sync;

pub use pricing::PricingService;
pub use reconcile::{GroupLookup, ReconcileService};
pub use sync::SyncService;
