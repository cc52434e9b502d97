// chat-test-utils: shared test utilities for the chat core.
//
// Provides a thin WebSocket test client and a token signer for exercising a
// running chat endpoint in integration tests without a real auth issuer.

pub mod mock_chat_client;
pub mod token;

pub use mock_chat_client::MockChatClient;
pub use token::sign_test_token;
