//! Flexible assets whose energy content is planned and dispatched.

/// Load-shifting portfolio modelled as a fictitious storage.
pub mod load_shift;
/// Stationary energy storage model.
pub mod storage;
/// Consumer tariff for load-shifting planners.
pub mod tariff;
pub mod types;

// Re-export the main types for convenience
pub use load_shift::LoadShiftPortfolio;
pub use storage::StorageDevice;
pub use tariff::EndUserTariff;
pub use types::Device;
pub use types::DeviceContext;
