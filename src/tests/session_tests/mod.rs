// Session Tests Module - Testing the chat session controller
// All tests run on tokio's paused clock against in-memory fakes:
// - helpers: MockTransport, MockApi, payload builders and the test harness
// - lifecycle_tests: Connect ordering, auth failures, reconnects, disconnects, stale events
// - messaging_tests: Optimistic sends, inbound routing, read receipts, status and presence updates
// - polling_tests: Active conversation poller, summary refresh, fetch guards and pane errors

mod helpers;
mod polling_tests;
