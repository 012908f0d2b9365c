// Core ledger services
pub mod inventory;
pub mod products;
pub mod sales;

// Analytics
pub mod forecasting;

// Service factory for dependency injection
pub mod factory;
