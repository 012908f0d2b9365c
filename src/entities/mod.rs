pub mod forecast;
pub mod inventory_balance;
pub mod product;
pub mod sale;
