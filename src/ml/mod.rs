/*!
 * # Demand Modelling
 *
 * Deterministic models that turn the sales ledger into forward-looking
 * numbers. Everything here is pure: the services load history from the
 * store, the model computes, the services persist the result.
 */

/// Next-day demand forecasting model (used by the forecasting service)
pub mod demand;
