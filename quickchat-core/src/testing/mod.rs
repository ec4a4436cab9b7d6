// ABOUTME: Test doubles for the platform SDK traits.
// ABOUTME: MockChatClient counts connects and disconnects; MockChannel scripts membership and events.

mod mock_channel;
mod mock_client;

pub use mock_channel::MockChannel;
pub use mock_client::MockChatClient;
