pub mod factories;
pub mod provider_mocks;
pub mod store_mocks;
