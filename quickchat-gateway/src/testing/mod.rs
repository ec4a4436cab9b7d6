// ABOUTME: Test doubles for the backend traits.
// ABOUTME: MockGateway records calls and can fail or hold requests; MockAuth issues fixed tokens.

mod mock_gateway;

pub use mock_gateway::{GatewayCall, MockAuth, MockGateway};
