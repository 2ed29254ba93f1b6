pub mod booking;
pub mod company;
pub mod offer;
pub mod reconcile;
pub mod sync;

pub use booking::{
    BookingSnapshot, CrewPeriod, CrewPeriodRow, EquipmentReservation, EquipmentReservationRow,
    SourceKind, VehicleReservationRow,
};
pub use company::{CompanyPricingConfig, CompanyPricingRow, DEFAULT_DISTANCE_INCREMENT_KM};
pub use offer::{
    BillingMode, CrewLine, CrewLineRow, EquipmentLine, EquipmentLineRow, GroupMember,
    GroupMemberRow, OfferComposition, OfferHeader, OfferTotals, TransportLine, TransportLineRow,
};
pub use reconcile::{ChangeRecord, CrewKey, EquipmentKey, ReconcileDiff, ReconcileReport};
pub use sync::{RemovalSummary, ReplacedCounts, SyncOutcome, SyncPlan};
